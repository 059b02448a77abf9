//! Certificate signature and chain verification.
//!
//! Successful signature checks are remembered in a bounded LRU cache keyed
//! on the exact bytes of the certificate and its issuer, so repeated
//! verification of the same pair skips the cryptography.

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use der::Encode;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use crate::cert::Certificate;
use crate::cert::extensions::BasicConstraints;
use crate::error::{CertGateError, Result};
use crate::key::PublicKey;
use crate::keyusage::{KeyUsageActivity, KeyUsageCheckerHandle};

/// Number of verified (certificate, issuer) pairs remembered by default.
pub const DEFAULT_CACHE_SIZE: u64 = 500;

static GLOBAL_VERIFIER: LazyLock<ArcSwap<CertVerifier>> =
    LazyLock::new(|| ArcSwap::from_pointee(CertVerifier::new(DEFAULT_CACHE_SIZE)));

/// Checks the signature on a certificate against a public key.
pub trait SignatureProvider: Send + Sync {
    /// A short name for diagnostics.
    fn name(&self) -> &str;

    /// Verifies that `cert` was signed with the private half of `signer`.
    fn verify_signature(&self, cert: &Certificate, signer: &PublicKey) -> Result<()>;
}

/// [`SignatureProvider`] backed by the RustCrypto `rsa`, `p256` and `p384` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoSignatureProvider;

impl SignatureProvider for RustCryptoSignatureProvider {
    fn name(&self) -> &str {
        "rustcrypto"
    }

    fn verify_signature(&self, cert: &Certificate, signer: &PublicKey) -> Result<()> {
        let algorithm = cert.signature_algorithm()?;
        let tbs_der = cert
            .inner
            .tbs_certificate
            .to_der()
            .map_err(|e| CertGateError::Provider(e.to_string()))?;
        let signature = cert.inner.signature.as_bytes().ok_or_else(|| {
            CertGateError::CertificateInvalid("signature has unused bits".to_string())
        })?;
        signer.verify(&tbs_der, signature, algorithm)
    }
}

/// Cache key: a certificate and the certificate that signed it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VerifiedCert {
    cert: Vec<u8>,
    issuer: Vec<u8>,
}

impl VerifiedCert {
    fn new(cert: &Certificate, issuer: &Certificate) -> Self {
        Self {
            cert: cert.as_der().to_vec(),
            issuer: issuer.as_der().to_vec(),
        }
    }
}

/// Verifies certificates and chains, remembering successful signature checks.
pub struct CertVerifier {
    cache: Cache<VerifiedCert, ()>,
    checker: KeyUsageCheckerHandle,
    provider: Arc<dyn SignatureProvider>,
}

impl std::fmt::Debug for CertVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertVerifier")
            .field("cache_capacity", &self.cache.policy().max_capacity())
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl CertVerifier {
    /// Creates a verifier consulting the process-wide key usage checker.
    pub fn new(cache_size: u64) -> Self {
        Self::with_checker(cache_size, KeyUsageCheckerHandle::global().clone())
    }

    pub fn with_checker(cache_size: u64, checker: KeyUsageCheckerHandle) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(cache_size)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
            checker,
            provider: Arc::new(RustCryptoSignatureProvider),
        }
    }

    /// Replaces the signature provider used when none is passed to
    /// [`CertVerifier::cached_verify`].
    pub fn with_provider(mut self, provider: Arc<dyn SignatureProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// The process-wide verifier.
    pub fn global() -> Arc<CertVerifier> {
        GLOBAL_VERIFIER.load_full()
    }

    /// Replaces the process-wide verifier, discarding its cache.
    pub fn set_global(verifier: CertVerifier) {
        GLOBAL_VERIFIER.store(Arc::new(verifier));
    }

    /// True if `cert` verifies against `signing_cert`. Never fails; any error
    /// counts as not verified.
    pub fn is_verified(&self, cert: &Certificate, signing_cert: &Certificate) -> bool {
        match self.cached_verify(cert, signing_cert, None) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("certificate '{}' not verified: {e}", cert.subject_name());
                false
            }
        }
    }

    /// Verifies the signature on `cert` with the public key of `signing_cert`.
    ///
    /// A pair that verified before is accepted from the cache without any
    /// further checks. Otherwise the signer must be permitted
    /// [`KeyUsageActivity::VerifyClientCert`], and only a successful
    /// verification is remembered.
    pub fn cached_verify(
        &self,
        cert: &Certificate,
        signing_cert: &Certificate,
        provider: Option<&dyn SignatureProvider>,
    ) -> Result<()> {
        let key = VerifiedCert::new(cert, signing_cert);
        if self.cache.contains_key(&key) {
            tracing::trace!("verification of '{}' found in cache", cert.subject_name());
            return Ok(());
        }

        self.checker
            .current()
            .require_activity(KeyUsageActivity::VerifyClientCert, Some(signing_cert))?;

        let signer = signing_cert.subject_public_key()?;
        let provider = provider.unwrap_or(self.provider.as_ref());
        provider.verify_signature(cert, &signer)?;

        tracing::trace!(
            "verified '{}' against '{}' with {}",
            cert.subject_name(),
            signing_cert.subject_name(),
            provider.name()
        );
        self.cache.insert(key, ());
        Ok(())
    }

    /// Walks `chain` from the leaf until a certificate issued by `trusted` is
    /// verified.
    ///
    /// Every certificate walked must be within its validity period and every
    /// issuer's basic constraints must allow the certificates below it.
    /// A consistent chain that never reaches `trusted` fails with
    /// [`CertGateError::CertificateUntrusted`].
    pub fn verify_certificate_chain(&self, chain: &[Certificate], trusted: &Certificate) -> Result<()> {
        let Some(leaf) = chain.first() else {
            return Err(CertGateError::InvalidInput(
                "empty certificate chain".to_string(),
            ));
        };
        if leaf == trusted {
            return Ok(());
        }

        for (i, cert) in chain.iter().enumerate() {
            cert.check_validity()?;
            match chain.get(i + 1) {
                Some(issuer) => {
                    check_issuer_constraints(issuer, i)?;
                    self.cached_verify(cert, issuer, None)?;
                    if issuer == trusted {
                        return Ok(());
                    }
                }
                None if cert.inner.tbs_certificate.issuer == trusted.inner.tbs_certificate.subject => {
                    check_issuer_constraints(trusted, i)?;
                    return self.cached_verify(cert, trusted, None).map_err(|e| {
                        CertGateError::CertificateUntrusted(format!(
                            "unable to verify '{}' with trusted certificate '{}': {e}",
                            cert.subject_name(),
                            trusted.subject_name()
                        ))
                    });
                }
                None => {}
            }
        }

        Err(CertGateError::CertificateUntrusted(format!(
            "trusted certificate '{}' not found in chain for '{}'",
            trusted.subject_name(),
            leaf.subject_name()
        )))
    }
}

/// Checks that `issuer` may sign a certificate with `intermediates` CA
/// certificates between it and the leaf.
fn check_issuer_constraints(issuer: &Certificate, intermediates: usize) -> Result<()> {
    match issuer.basic_constraints()? {
        None => Ok(()),
        Some(BasicConstraints { is_ca: false, .. }) => Err(CertGateError::CertificateInvalid(
            format!("issuer '{}' is not a CA", issuer.subject_name()),
        )),
        Some(BasicConstraints {
            max_path_length: Some(path_length),
            ..
        }) if usize::from(path_length) < intermediates => {
            Err(CertGateError::PathLengthExceeded(format!(
                "issuer '{}' allows {path_length} intermediate CAs, chain has {intermediates}",
                issuer.subject_name()
            )))
        }
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cert::CertificateWithPrivateKey;
    use crate::cert::extensions::KeyUsages;
    use crate::cert::params::{CertGenParams, DistinguishedName};
    use crate::issuer::Issuer;
    use crate::key::KeyPair;
    use crate::keyusage::{KeyUsageChecker, KeyUsagePolicy};

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl SignatureProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn verify_signature(&self, cert: &Certificate, signer: &PublicKey) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            RustCryptoSignatureProvider.verify_signature(cert, signer)
        }
    }

    fn enforcing_verifier() -> CertVerifier {
        let checker = KeyUsageChecker::new(Some(KeyUsagePolicy::default_policy().unwrap()), None);
        CertVerifier::with_checker(16, KeyUsageCheckerHandle::new(checker))
    }

    fn ca(cn: &str, path_length: Option<u8>) -> CertificateWithPrivateKey {
        let key = KeyPair::generate_ecdsa_p256();
        let params = CertGenParams::builder()
            .subject_dn(DistinguishedName::builder().common_name(cn).build())
            .make_ca_cert(true)
            .maybe_basic_constraints_path_length(path_length)
            .build();
        let cert = Certificate::new_self_signed(&params, &key).unwrap();
        CertificateWithPrivateKey::new(cert, key).unwrap()
    }

    fn issue_ca(
        issuer: &CertificateWithPrivateKey,
        cn: &str,
        path_length: Option<u8>,
    ) -> CertificateWithPrivateKey {
        let key = KeyPair::generate_ecdsa_p256();
        let params = CertGenParams::builder()
            .subject_dn(DistinguishedName::builder().common_name(cn).build())
            .make_ca_cert(true)
            .maybe_basic_constraints_path_length(path_length)
            .build();
        let cert = issuer.issue(&params, &key.public_key()).unwrap();
        CertificateWithPrivateKey::new(cert, key).unwrap()
    }

    fn issue_leaf(issuer: &CertificateWithPrivateKey, cn: &str) -> Certificate {
        let key = KeyPair::generate_ecdsa_p256();
        let params = CertGenParams::builder()
            .subject_dn(DistinguishedName::builder().common_name(cn).build())
            .build();
        issuer.issue(&params, &key.public_key()).unwrap()
    }

    #[test]
    fn positive_results_are_cached() {
        let verifier = enforcing_verifier();
        let provider = CountingProvider::default();
        let root = ca("root", None);
        let leaf = issue_leaf(&root, "leaf");

        verifier.cached_verify(&leaf, &root.cert, Some(&provider)).unwrap();
        verifier.cached_verify(&leaf, &root.cert, Some(&provider)).unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(verifier.is_verified(&leaf, &root.cert));
    }

    #[test]
    fn negative_results_are_not_cached() {
        let verifier = enforcing_verifier();
        let provider = CountingProvider::default();
        let root = ca("root", None);
        let impostor = ca("root", None);
        let leaf = issue_leaf(&root, "leaf");

        for _ in 0..2 {
            assert!(matches!(
                verifier.cached_verify(&leaf, &impostor.cert, Some(&provider)),
                Err(CertGateError::SignatureMismatch(_))
            ));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(!verifier.is_verified(&leaf, &impostor.cert));
    }

    #[test]
    fn least_recently_verified_pair_is_evicted() {
        let checker = KeyUsageChecker::new(Some(KeyUsagePolicy::default_policy().unwrap()), None);
        let verifier = CertVerifier::with_checker(1, KeyUsageCheckerHandle::new(checker));
        let provider = CountingProvider::default();
        let root = ca("root", None);
        let first = issue_leaf(&root, "first");
        let second = issue_leaf(&root, "second");

        verifier.cached_verify(&first, &root.cert, Some(&provider)).unwrap();
        verifier.cache.run_pending_tasks();
        verifier.cached_verify(&second, &root.cert, Some(&provider)).unwrap();
        verifier.cache.run_pending_tasks();
        assert_eq!(verifier.cache.entry_count(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        verifier.cached_verify(&first, &root.cert, Some(&provider)).unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn concurrent_verification_shares_the_cache() {
        let verifier = enforcing_verifier();
        let provider = CountingProvider::default();
        let root = ca("root", None);
        let leaves: Vec<Certificate> = (0..4).map(|i| issue_leaf(&root, &format!("leaf {i}"))).collect();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for leaf in &leaves {
                        verifier.cached_verify(leaf, &root.cert, Some(&provider)).unwrap();
                    }
                });
            }
        });

        // Threads racing on a pair before it is cached may each verify it.
        let calls = provider.calls.load(Ordering::SeqCst);
        assert!((4..=32).contains(&calls), "{calls}");
        for leaf in &leaves {
            verifier.cached_verify(leaf, &root.cert, Some(&provider)).unwrap();
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls);
    }

    #[test]
    fn signer_must_be_permitted_to_verify_certificates() {
        let verifier = enforcing_verifier();
        let key = KeyPair::generate_ecdsa_p256();
        let params = CertGenParams::builder()
            .subject_dn(DistinguishedName::builder().common_name("not a ca").build())
            .include_key_usage(true)
            .key_usage_bits(KeyUsages::DigitalSignature.into())
            .build();
        let cert = Certificate::new_self_signed(&params, &key).unwrap();
        let signer = CertificateWithPrivateKey::new(cert, key).unwrap();
        let leaf = issue_leaf(&signer, "leaf");

        assert!(matches!(
            verifier.cached_verify(&leaf, &signer.cert, None),
            Err(CertGateError::KeyUsageDenied {
                activity: KeyUsageActivity::VerifyClientCert,
                ..
            })
        ));
    }

    #[test]
    fn chain_to_trusted_root() {
        let verifier = enforcing_verifier();
        let root = ca("root", None);
        let intermediate = issue_ca(&root, "intermediate", Some(0));
        let leaf = issue_leaf(&intermediate, "leaf");

        let chain = vec![leaf.clone(), intermediate.cert.clone(), root.cert.clone()];
        verifier.verify_certificate_chain(&chain, &root.cert).unwrap();

        // The anchor itself may be left out of the chain.
        let chain = vec![leaf, intermediate.cert.clone()];
        verifier.verify_certificate_chain(&chain, &root.cert).unwrap();

        verifier
            .verify_certificate_chain(&[root.cert.clone()], &root.cert)
            .unwrap();
    }

    #[test]
    fn path_length_is_enforced() {
        let verifier = enforcing_verifier();
        let root = ca("root", Some(0));
        let intermediate = issue_ca(&root, "intermediate", None);
        let leaf = issue_leaf(&intermediate, "leaf");

        let chain = vec![leaf, intermediate.cert, root.cert.clone()];
        let err = verifier.verify_certificate_chain(&chain, &root.cert).unwrap_err();
        assert!(matches!(err, CertGateError::PathLengthExceeded(_)));
        assert!(err.is_certificate_invalid());
    }

    #[test]
    fn missing_anchor_is_untrusted_not_invalid() {
        let verifier = enforcing_verifier();
        let root = ca("root", None);
        let other_root = ca("other root", None);
        let leaf = issue_leaf(&root, "leaf");

        let err = verifier
            .verify_certificate_chain(&[leaf, root.cert], &other_root.cert)
            .unwrap_err();
        assert!(matches!(err, CertGateError::CertificateUntrusted(_)));
        assert!(!err.is_certificate_invalid());
    }

    #[test]
    fn empty_chain_is_rejected() {
        let verifier = enforcing_verifier();
        let root = ca("root", None);
        assert!(matches!(
            verifier.verify_certificate_chain(&[], &root.cert),
            Err(CertGateError::InvalidInput(_))
        ));
    }
}
