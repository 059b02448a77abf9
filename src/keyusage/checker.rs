use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;

use super::{KeyUsageActivity, KeyUsagePolicy};
use crate::cert::extensions::{ExtendedKeyUsage, KeyUsage, ToAndFromX509Extension};
use crate::cert::{Certificate, check_for_mismatching_key};
use crate::error::{CertGateError, Result};
use crate::key::CryptoKey;

/// Enforcement mode that turns every check into a pass.
pub const ENFORCEMENT_MODE_IGNORE: &str = "IGNORE";

static GLOBAL_CHECKER: LazyLock<KeyUsageCheckerHandle> =
    LazyLock::new(|| KeyUsageCheckerHandle::new(KeyUsageChecker::with_default_policy(None)));

/// Decides whether a certificate may be used for an activity.
///
/// Only extensions marked critical are enforced. A checker without a policy
/// denies everything a critical extension would have to vouch for.
#[derive(Debug, Clone)]
pub struct KeyUsageChecker {
    policy: Option<KeyUsagePolicy>,
    enforce_policy: bool,
}

impl KeyUsageChecker {
    /// Creates a checker. Enforcement is off when `enforcement_mode` is
    /// `"IGNORE"` in any case.
    pub fn new(policy: Option<KeyUsagePolicy>, enforcement_mode: Option<&str>) -> Self {
        let enforce_policy =
            !enforcement_mode.is_some_and(|mode| mode.eq_ignore_ascii_case(ENFORCEMENT_MODE_IGNORE));
        if !enforce_policy {
            tracing::debug!("key usage enforcement disabled");
        }
        Self {
            policy,
            enforce_policy,
        }
    }

    /// Creates a checker over the built-in policy.
    ///
    /// If the built-in policy cannot be parsed the checker is left without a
    /// policy and so fails closed.
    pub fn with_default_policy(enforcement_mode: Option<&str>) -> Self {
        let policy = match KeyUsagePolicy::default_policy() {
            Ok(policy) => Some(policy),
            Err(e) => {
                tracing::error!("unable to load default key usage policy: {e}");
                None
            }
        };
        Self::new(policy, enforcement_mode)
    }

    pub fn policy(&self) -> Option<&KeyUsagePolicy> {
        self.policy.as_ref()
    }

    pub fn is_enforcing(&self) -> bool {
        self.enforce_policy
    }

    /// The process-wide checker in effect right now.
    pub fn get_default() -> Arc<KeyUsageChecker> {
        KeyUsageCheckerHandle::global().current()
    }

    /// Replaces the process-wide checker. Checks already running keep the
    /// checker they started with.
    pub fn set_default(checker: KeyUsageChecker) {
        KeyUsageCheckerHandle::global().replace(checker);
    }

    /// True if `cert` may be used for `activity`.
    pub fn permits_activity(&self, activity: KeyUsageActivity, cert: Option<&Certificate>) -> bool {
        if !self.enforce_policy {
            return true;
        }
        let Some(cert) = cert else {
            tracing::debug!("no certificate supplied for {activity}, denying");
            return false;
        };

        let key_usage_critical = cert.is_extension_critical(&KeyUsage::OID);
        let extended_key_usage_critical = cert.is_extension_critical(&ExtendedKeyUsage::OID);
        if !key_usage_critical && !extended_key_usage_critical {
            return true;
        }

        let Some(policy) = self.policy.as_ref() else {
            tracing::warn!(
                "no key usage policy loaded, denying {activity} for '{}'",
                cert.subject_name()
            );
            return false;
        };

        if key_usage_critical {
            let bits = match cert.key_usage() {
                Ok(Some(KeyUsage(bits))) => bits,
                Ok(None) => Default::default(),
                Err(e) => {
                    tracing::warn!(
                        "unable to decode key usage of '{}': {e}",
                        cert.subject_name()
                    );
                    return false;
                }
            };
            if !policy.is_key_usage_permitted_for_activity(activity, bits) {
                tracing::debug!(
                    "key usage {:?} of '{}' does not permit {activity}",
                    bits,
                    cert.subject_name()
                );
                return false;
            }
        }

        if extended_key_usage_critical {
            let purposes = match cert.extended_key_usage() {
                Ok(Some(eku)) => eku.usage,
                Ok(None) => Vec::new(),
                Err(e) => {
                    tracing::warn!(
                        "unable to decode extended key usage of '{}': {e}",
                        cert.subject_name()
                    );
                    return false;
                }
            };
            if !policy.is_extended_key_usage_permitted_for_activity(activity, &purposes) {
                tracing::debug!(
                    "extended key usage of '{}' does not permit {activity}",
                    cert.subject_name()
                );
                return false;
            }
        }

        true
    }

    pub fn require_activity(&self, activity: KeyUsageActivity, cert: Option<&Certificate>) -> Result<()> {
        if self.permits_activity(activity, cert) {
            Ok(())
        } else {
            Err(CertGateError::KeyUsageDenied {
                activity,
                subject: cert.map(Certificate::subject_name).unwrap_or_default(),
            })
        }
    }

    /// Checks `activity` for the use of `key`.
    ///
    /// Public keys are checked against `cert`, which must hold the same key.
    /// Private and symmetric keys are not constrained by certificate key usage.
    pub fn require_activity_for_key(
        &self,
        activity: KeyUsageActivity,
        cert: Option<&Certificate>,
        key: CryptoKey<'_>,
    ) -> Result<()> {
        match key {
            CryptoKey::Public(public_key) => {
                if let Some(cert) = cert {
                    check_for_mismatching_key(cert, public_key)?;
                }
                self.require_activity(activity, cert)
            }
            CryptoKey::Private(_) | CryptoKey::Symmetric(_) => Ok(()),
            CryptoKey::Other(algorithm) => Err(CertGateError::UnsupportedKeyType(algorithm.to_string())),
        }
    }
}

/// Shared, atomically replaceable reference to a [`KeyUsageChecker`].
#[derive(Debug, Clone)]
pub struct KeyUsageCheckerHandle(Arc<ArcSwap<KeyUsageChecker>>);

impl KeyUsageCheckerHandle {
    pub fn new(checker: KeyUsageChecker) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(checker)))
    }

    /// The handle behind [`KeyUsageChecker::get_default`].
    pub fn global() -> &'static KeyUsageCheckerHandle {
        &GLOBAL_CHECKER
    }

    pub fn current(&self) -> Arc<KeyUsageChecker> {
        self.0.load_full()
    }

    pub fn replace(&self, checker: KeyUsageChecker) {
        self.0.store(Arc::new(checker));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::{ExtendedKeyUsageOption, FlagSet, KeyUsages};
    use crate::cert::params::{CertGenParams, DistinguishedName};
    use crate::key::KeyPair;

    fn cert_with(
        key: &KeyPair,
        bits: Option<FlagSet<KeyUsages>>,
        critical: bool,
        purposes: Option<Vec<ExtendedKeyUsageOption>>,
    ) -> Certificate {
        let params = CertGenParams::builder()
            .subject_dn(DistinguishedName::builder().common_name("checker.test").build())
            .include_key_usage(bits.is_some())
            .maybe_key_usage_bits(bits)
            .key_usage_critical(critical)
            .include_extended_key_usage(purposes.is_some())
            .maybe_extended_key_usage_oids(
                purposes.map(|purposes| purposes.into_iter().map(Into::into).collect()),
            )
            .extended_key_usage_critical(critical)
            .build();
        Certificate::new_self_signed(&params, key).unwrap()
    }

    fn server_policy() -> KeyUsagePolicy {
        KeyUsagePolicy::from_json_str(
            r#"{"permits":[{"action":"sslServerRemote","requirements":["keyEncipherment"]}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn critical_key_usage_is_enforced() {
        let key = KeyPair::generate_ecdsa_p256();
        let checker = KeyUsageChecker::new(Some(server_policy()), None);

        let signing_only = cert_with(&key, Some(KeyUsages::DigitalSignature.into()), true, None);
        assert!(!checker.permits_activity(KeyUsageActivity::SslServerRemote, Some(&signing_only)));

        let both = cert_with(
            &key,
            Some(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment),
            true,
            None,
        );
        assert!(checker.permits_activity(KeyUsageActivity::SslServerRemote, Some(&both)));
    }

    #[test]
    fn non_critical_extensions_are_not_enforced() {
        let key = KeyPair::generate_ecdsa_p256();
        let checker = KeyUsageChecker::new(None, None);
        let cert = cert_with(
            &key,
            Some(KeyUsages::DigitalSignature.into()),
            false,
            Some(vec![ExtendedKeyUsageOption::EmailProtection]),
        );
        for activity in KeyUsageActivity::ALL {
            assert!(checker.permits_activity(activity, Some(&cert)));
        }
    }

    #[test]
    fn missing_policy_fails_closed() {
        let key = KeyPair::generate_ecdsa_p256();
        let checker = KeyUsageChecker::new(None, Some("enforce"));
        let cert = cert_with(&key, Some(KeyUsages::KeyCertSign.into()), true, None);
        assert!(!checker.permits_activity(KeyUsageActivity::VerifyClientCert, Some(&cert)));
        assert!(!checker.permits_activity(KeyUsageActivity::VerifyClientCert, None));
    }

    #[test]
    fn ignore_mode_permits_everything() {
        let key = KeyPair::generate_ecdsa_p256();
        let checker = KeyUsageChecker::new(None, Some("ignore"));
        assert!(!checker.is_enforcing());
        let cert = cert_with(
            &key,
            Some(KeyUsages::DecipherOnly.into()),
            true,
            Some(vec![ExtendedKeyUsageOption::TimeStamping]),
        );
        for activity in KeyUsageActivity::ALL {
            assert!(checker.permits_activity(activity, Some(&cert)));
            assert!(checker.permits_activity(activity, None));
        }
    }

    #[test]
    fn both_critical_extensions_must_pass() {
        let key = KeyPair::generate_ecdsa_p256();
        let policy = KeyUsagePolicy::from_json_str(
            r#"{"permits":[
                {"action":"sslClientRemote","requirements":["digitalSignature"]},
                {"action":"sslClientRemote","requirements":["id-kp-clientAuth"]}]}"#,
        )
        .unwrap();
        let checker = KeyUsageChecker::new(Some(policy), None);

        let good = cert_with(
            &key,
            Some(KeyUsages::DigitalSignature.into()),
            true,
            Some(vec![ExtendedKeyUsageOption::ClientAuth]),
        );
        assert!(checker.permits_activity(KeyUsageActivity::SslClientRemote, Some(&good)));

        let wrong_purpose = cert_with(
            &key,
            Some(KeyUsages::DigitalSignature.into()),
            true,
            Some(vec![ExtendedKeyUsageOption::ServerAuth]),
        );
        assert!(!checker.permits_activity(KeyUsageActivity::SslClientRemote, Some(&wrong_purpose)));
    }

    #[test]
    fn require_activity_reports_the_subject() {
        let key = KeyPair::generate_ecdsa_p256();
        let checker = KeyUsageChecker::new(Some(server_policy()), None);
        let cert = cert_with(&key, Some(KeyUsages::DigitalSignature.into()), true, None);
        match checker.require_activity(KeyUsageActivity::SslServerRemote, Some(&cert)) {
            Err(CertGateError::KeyUsageDenied { activity, subject }) => {
                assert_eq!(activity, KeyUsageActivity::SslServerRemote);
                assert!(subject.contains("checker.test"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn require_activity_for_key_dispatches_on_key_kind() {
        let key = KeyPair::generate_ecdsa_p256();
        let other_key = KeyPair::generate_ecdsa_p256();
        let checker = KeyUsageChecker::new(Some(server_policy()), None);
        let cert = cert_with(&key, Some(KeyUsages::KeyEncipherment.into()), true, None);
        let activity = KeyUsageActivity::SslServerRemote;

        checker
            .require_activity_for_key(activity, Some(&cert), CryptoKey::Public(&key.public_key()))
            .unwrap();
        assert!(matches!(
            checker.require_activity_for_key(
                activity,
                Some(&cert),
                CryptoKey::Public(&other_key.public_key())
            ),
            Err(CertGateError::KeyMismatch(_))
        ));
        checker
            .require_activity_for_key(KeyUsageActivity::SignXml, Some(&cert), CryptoKey::Private(&key))
            .unwrap();
        checker
            .require_activity_for_key(activity, None, CryptoKey::Symmetric("AES"))
            .unwrap();
        assert!(matches!(
            checker.require_activity_for_key(activity, Some(&cert), CryptoKey::Other("DSA")),
            Err(CertGateError::UnsupportedKeyType(_))
        ));
    }

    #[test]
    fn handle_swaps_atomically() {
        let handle = KeyUsageCheckerHandle::new(KeyUsageChecker::new(None, None));
        let before = handle.current();
        handle.replace(KeyUsageChecker::new(None, Some("IGNORE")));
        assert!(before.is_enforcing());
        assert!(!handle.current().is_enforcing());
    }
}
