pub mod attribute;
pub mod dn;
pub mod extensions;
pub mod generator;
pub mod params;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use der::asn1::{Any, AnyRef};
use der::{Decode, Encode, EncodePem};
use extensions::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectKeyIdentifier,
    ToAndFromX509Extension,
};
use params::{CertGenParams, DistinguishedName, ExtensionParam};
use sha2::Digest;
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::ext::Extension;

use crate::error::{CertGateError, Result};
use crate::issuer::{CertificateIssuer, Issuer};
use crate::key::{KeyFamily, KeyPair, PublicKey};
use crate::oid;

const PEM_CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Hash functions used by the supported signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => sha1::Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => sha2::Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }
}

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-1 with RSA encryption. Only for legacy relying parties.
    Sha1WithRSA,
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
    /// SHA-384 with RSA encryption.
    Sha384WithRSA,
    /// SHA-512 with RSA encryption.
    Sha512WithRSA,
    /// SHA-1 with ECDSA. Only for legacy relying parties.
    Sha1WithECDSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA.
    Sha384WithECDSA,
    /// SHA-512 with ECDSA.
    Sha512WithECDSA,
}

impl SignatureAlgorithm {
    pub const ALL: [SignatureAlgorithm; 8] = [
        SignatureAlgorithm::Sha1WithRSA,
        SignatureAlgorithm::Sha256WithRSA,
        SignatureAlgorithm::Sha384WithRSA,
        SignatureAlgorithm::Sha512WithRSA,
        SignatureAlgorithm::Sha1WithECDSA,
        SignatureAlgorithm::Sha256WithECDSA,
        SignatureAlgorithm::Sha384WithECDSA,
        SignatureAlgorithm::Sha512WithECDSA,
    ];

    pub fn oid(&self) -> const_oid::ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha1WithRSA => oid::SHA1_WITH_RSA,
            SignatureAlgorithm::Sha256WithRSA => oid::SHA256_WITH_RSA,
            SignatureAlgorithm::Sha384WithRSA => oid::SHA384_WITH_RSA,
            SignatureAlgorithm::Sha512WithRSA => oid::SHA512_WITH_RSA,
            SignatureAlgorithm::Sha1WithECDSA => oid::ECDSA_WITH_SHA1,
            SignatureAlgorithm::Sha256WithECDSA => oid::ECDSA_WITH_SHA256,
            SignatureAlgorithm::Sha384WithECDSA => oid::ECDSA_WITH_SHA384,
            SignatureAlgorithm::Sha512WithECDSA => oid::ECDSA_WITH_SHA512,
        }
    }

    pub fn from_oid(oid: &const_oid::ObjectIdentifier) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.oid() == *oid)
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            SignatureAlgorithm::Sha1WithRSA
            | SignatureAlgorithm::Sha256WithRSA
            | SignatureAlgorithm::Sha384WithRSA
            | SignatureAlgorithm::Sha512WithRSA => KeyFamily::Rsa,
            _ => KeyFamily::Ec,
        }
    }

    pub fn hash(&self) -> HashAlgorithm {
        match self {
            SignatureAlgorithm::Sha1WithRSA | SignatureAlgorithm::Sha1WithECDSA => {
                HashAlgorithm::Sha1
            }
            SignatureAlgorithm::Sha256WithRSA | SignatureAlgorithm::Sha256WithECDSA => {
                HashAlgorithm::Sha256
            }
            SignatureAlgorithm::Sha384WithRSA | SignatureAlgorithm::Sha384WithECDSA => {
                HashAlgorithm::Sha384
            }
            SignatureAlgorithm::Sha512WithRSA | SignatureAlgorithm::Sha512WithECDSA => {
                HashAlgorithm::Sha512
            }
        }
    }

    /// The conventional name, e.g. "SHA384withRSA" or "SHA256withECDSA".
    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1WithRSA => "SHA1withRSA",
            SignatureAlgorithm::Sha256WithRSA => "SHA256withRSA",
            SignatureAlgorithm::Sha384WithRSA => "SHA384withRSA",
            SignatureAlgorithm::Sha512WithRSA => "SHA512withRSA",
            SignatureAlgorithm::Sha1WithECDSA => "SHA1withECDSA",
            SignatureAlgorithm::Sha256WithECDSA => "SHA256withECDSA",
            SignatureAlgorithm::Sha384WithECDSA => "SHA384withECDSA",
            SignatureAlgorithm::Sha512WithECDSA => "SHA512withECDSA",
        }
    }

    /// Default algorithm for a signing key: SHA-384, or SHA-1 for legacy peers.
    pub fn preferred_for(family: KeyFamily, legacy: bool) -> Self {
        match (family, legacy) {
            (KeyFamily::Rsa, false) => SignatureAlgorithm::Sha384WithRSA,
            (KeyFamily::Rsa, true) => SignatureAlgorithm::Sha1WithRSA,
            (KeyFamily::Ec, false) => SignatureAlgorithm::Sha384WithECDSA,
            (KeyFamily::Ec, true) => SignatureAlgorithm::Sha1WithECDSA,
        }
    }
}

impl std::fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA algorithms carry explicit NULL parameters (RFC 4055); ECDSA
    /// algorithms omit them (RFC 5758).
    fn from(value: SignatureAlgorithm) -> Self {
        let parameters = match value.family() {
            KeyFamily::Rsa => Some(Any::from(AnyRef::NULL)),
            KeyFamily::Ec => None,
        };
        x509_cert::spki::AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters,
        }
    }
}

/// Digest used for certificate fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintAlgorithm {
    Sha1,
    Sha256,
}

/// Output format of a certificate fingerprint.
///
/// * `Hex` - "SHA1:0A:1B:..." with the digest name prefixed.
/// * `RawHex` - "0A1B..." with no prefix or separators.
/// * `Base64` - standard base64 of the digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintFormat {
    Hex,
    RawHex,
    Base64,
}

/// Days remaining until a certificate expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CertificateExpiry {
    pub days: i64,
}

/// Represents an X.509 certificate.
///
/// The DER encoding the certificate was decoded from is retained, so that
/// equality and cache keys follow the exact bytes that were signed.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
    der: Vec<u8>,
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl Certificate {
    pub fn from_inner(inner: CertificateInner) -> Result<Self> {
        let der = inner
            .to_der()
            .map_err(|e| CertGateError::EncodingError(e.to_string()))?;
        Ok(Self { inner, der })
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)?;
        Ok(Self {
            inner,
            der: der.to_vec(),
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let block = pem::parse(pem)?;
        if block.tag() != PEM_CERTIFICATE_TAG {
            return Err(CertGateError::DecodingError(format!(
                "expected a CERTIFICATE PEM block, found {}",
                block.tag()
            )));
        }
        Self::from_der(block.contents())
    }

    /// Decodes a certificate from either PEM or DER.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if looks_like_pem(bytes) {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| CertGateError::DecodingError(e.to_string()))?;
            Self::from_pem(text)
        } else {
            Self::from_der(bytes)
        }
    }

    /// Decodes a chain given as concatenated PEM blocks (leaf first) or as a
    /// single DER certificate.
    pub fn decode_chain(bytes: &[u8]) -> Result<Vec<Self>> {
        if !looks_like_pem(bytes) {
            return Ok(vec![Self::from_der(bytes)?]);
        }
        let chain = pem::parse_many(bytes)?
            .into_iter()
            .filter(|block| block.tag() == PEM_CERTIFICATE_TAG)
            .map(|block| Self::from_der(block.contents()))
            .collect::<Result<Vec<_>>>()?;
        if chain.is_empty() {
            return Err(CertGateError::DecodingError(
                "no CERTIFICATE PEM blocks found".to_string(),
            ));
        }
        Ok(chain)
    }

    /// Creates a new self-signed certificate.
    pub fn new_self_signed(params: &CertGenParams, key: &KeyPair) -> Result<Self> {
        generator::ParamsCertificateGenerator::new(params.clone())
            .generate_certificate(&key.public_key(), key, None)
    }

    /// Returns the DER encoding of the certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.der.clone())
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CertGateError::EncodingError(e.to_string()))
    }

    /// Subject DN in RFC 4514 form.
    pub fn subject_name(&self) -> String {
        self.inner.tbs_certificate.subject.to_string()
    }

    /// Issuer DN in RFC 4514 form.
    pub fn issuer_name(&self) -> String {
        self.inner.tbs_certificate.issuer.to_string()
    }

    /// Whether the subject carries every attribute in `pattern` (`*` values
    /// match anything). See [`dn::dn_matches_pattern`].
    pub fn subject_matches(&self, pattern: &str) -> Result<bool> {
        dn::dn_matches_pattern(&self.subject_name(), pattern)
    }

    pub fn subject_dn(&self) -> DistinguishedName {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn not_before(&self) -> Result<OffsetDateTime> {
        x509_time_to_offset(&self.inner.tbs_certificate.validity.not_before)
    }

    pub fn not_after(&self) -> Result<OffsetDateTime> {
        x509_time_to_offset(&self.inner.tbs_certificate.validity.not_after)
    }

    /// The algorithm the certificate is signed with.
    ///
    /// The outer algorithm identifier must agree with the one inside the
    /// signed part.
    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        let outer = &self.inner.signature_algorithm.oid;
        if *outer != self.inner.tbs_certificate.signature.oid {
            return Err(CertGateError::CertificateInvalid(format!(
                "signature algorithm {outer} does not match {} in the signed data",
                self.inner.tbs_certificate.signature.oid
            )));
        }
        SignatureAlgorithm::from_oid(outer).ok_or_else(|| {
            CertGateError::UnsupportedAlgorithm(format!("signature algorithm {outer}"))
        })
    }

    pub fn subject_public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    pub fn extensions(&self) -> &[Extension] {
        self.inner
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default()
    }

    pub fn extension(&self, oid: &const_oid::ObjectIdentifier) -> Option<&Extension> {
        self.extensions().iter().find(|ext| ext.extn_id == *oid)
    }

    pub fn is_extension_critical(&self, oid: &const_oid::ObjectIdentifier) -> bool {
        self.extension(oid).is_some_and(|ext| ext.critical)
    }

    /// Decodes extension `E` if present.
    pub fn decode_extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.extension(&E::OID)
            .map(|ext| ExtensionParam::from_x509_extension(ext).to_extension::<E>())
            .transpose()
    }

    pub fn key_usage(&self) -> Result<Option<KeyUsage>> {
        self.decode_extension::<KeyUsage>()
    }

    pub fn extended_key_usage(&self) -> Result<Option<ExtendedKeyUsage>> {
        self.decode_extension::<ExtendedKeyUsage>()
    }

    pub fn basic_constraints(&self) -> Result<Option<BasicConstraints>> {
        self.decode_extension::<BasicConstraints>()
    }

    /// The subject key identifier from the extension, or derived from the
    /// public key when the extension is absent.
    pub fn subject_key_identifier(&self) -> Result<Vec<u8>> {
        match self.decode_extension::<SubjectKeyIdentifier>()? {
            Some(ski) => Ok(ski.0),
            None => Ok(extensions::key_identifier(
                self.inner
                    .tbs_certificate
                    .subject_public_key_info
                    .subject_public_key
                    .raw_bytes(),
            )),
        }
    }

    /// True if the certificate may sign other certificates: keyCertSign is
    /// asserted and basic constraints allow at least one more CA below it.
    pub fn is_ca_capable(&self) -> bool {
        let key_cert_sign = matches!(
            self.key_usage(),
            Ok(Some(KeyUsage(bits))) if bits.contains(KeyUsages::KeyCertSign)
        );
        let ca = matches!(
            self.basic_constraints(),
            Ok(Some(BasicConstraints { is_ca: true, max_path_length })) if max_path_length != Some(0)
        );
        key_cert_sign && ca
    }

    /// Checks the validity period against the current time.
    pub fn check_validity(&self) -> Result<CertificateExpiry> {
        self.check_validity_at(OffsetDateTime::now_utc())
    }

    pub fn check_validity_at(&self, now: OffsetDateTime) -> Result<CertificateExpiry> {
        let not_before = self.not_before()?;
        let not_after = self.not_after()?;
        if now < not_before {
            return Err(CertGateError::CertificateExpired(format!(
                "certificate '{}' is not valid before {not_before}",
                self.subject_name()
            )));
        }
        if now > not_after {
            return Err(CertGateError::CertificateExpired(format!(
                "certificate '{}' expired at {not_after}",
                self.subject_name()
            )));
        }
        Ok(CertificateExpiry {
            days: (not_after - now).whole_days(),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.check_validity().is_ok()
    }

    pub fn fingerprint(&self, algorithm: FingerprintAlgorithm, format: FingerprintFormat) -> String {
        let (name, digest) = match algorithm {
            FingerprintAlgorithm::Sha1 => ("SHA1", HashAlgorithm::Sha1.digest(&self.der)),
            FingerprintAlgorithm::Sha256 => ("SHA256", HashAlgorithm::Sha256.digest(&self.der)),
        };
        match format {
            FingerprintFormat::Base64 => STANDARD.encode(digest),
            FingerprintFormat::RawHex => hex::encode_upper(digest),
            FingerprintFormat::Hex => {
                let pairs: Vec<String> = digest.iter().map(|b| hex::encode_upper([*b])).collect();
                format!("{name}:{}", pairs.join(":"))
            }
        }
    }

    /// Common name values of the subject, most significant first.
    pub fn common_names(&self) -> Vec<String> {
        common_names(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer_common_names(&self) -> Vec<String> {
        common_names(&self.inner.tbs_certificate.issuer)
    }
}

fn common_names(name: &x509_cert::name::Name) -> Vec<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .filter(|atv| atv.oid == oid::COMMON_NAME)
        .filter_map(|atv| params::directory_string(&atv.value))
        .collect()
}

pub(crate) fn x509_time_to_offset(time: &x509_cert::time::Time) -> Result<OffsetDateTime> {
    let secs = i64::try_from(time.to_unix_duration().as_secs())
        .map_err(|e| CertGateError::DecodingError(e.to_string()))?;
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| CertGateError::DecodingError(e.to_string()))
}

/// True if `bytes` look like PEM text rather than DER.
pub fn looks_like_pem(bytes: &[u8]) -> bool {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => return false,
    };
    text.trim_start().starts_with("-----BEGIN ")
}

/// Compares two optional certificates by encoding. Two absent certificates are equal.
pub fn certs_are_equal(a: Option<&Certificate>, b: Option<&Certificate>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.as_der() == b.as_der(),
        (None, None) => true,
        _ => false,
    }
}

/// Fails with [`CertGateError::KeyMismatch`] if `key` is not the certificate's
/// subject public key.
pub fn check_for_mismatching_key(cert: &Certificate, key: &PublicKey) -> Result<()> {
    let cert_key = cert.subject_public_key()?;
    if cert_key.family() != key.family() {
        return Err(CertGateError::KeyMismatch(format!(
            "certificate '{}' holds a {} key, not {}",
            cert.subject_name(),
            cert_key.family().name(),
            key.family().name()
        )));
    }
    if cert_key != *key {
        return Err(CertGateError::KeyMismatch(format!(
            "key does not belong to certificate '{}'",
            cert.subject_name()
        )));
    }
    Ok(())
}

/// A certificate together with the private key for its subject public key.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl CertificateWithPrivateKey {
    pub fn new(cert: Certificate, key: KeyPair) -> Result<Self> {
        check_for_mismatching_key(&cert, &key.public_key())?;
        Ok(Self { cert, key })
    }
}

impl CertificateWithPrivateKey {
    /// Borrows this pair as a [`CertificateIssuer`].
    pub fn as_issuer(&self) -> CertificateIssuer<'_> {
        CertificateIssuer::new(&self.cert, &self.key)
    }
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> x509_cert::name::Name {
        self.as_issuer().issuer_name()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn issuer_key_identifier(&self) -> Result<Vec<u8>> {
        self.as_issuer().issuer_key_identifier()
    }

    fn issuer_certificate(&self) -> Option<&Certificate> {
        Some(&self.cert)
    }
}
