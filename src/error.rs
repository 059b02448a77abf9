//! use certgate::error::CertGateError;

use thiserror::Error;

use crate::keyusage::KeyUsageActivity;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CertGateError>;

/// Represents errors that can occur in the certgate library.
///
/// Policy decisions never surface as errors on their own: a checker that cannot
/// decide denies the activity, and only `require_*` calls turn that denial into
/// [`CertGateError::KeyUsageDenied`].
#[derive(Debug, Error)]
pub enum CertGateError {
    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed key usage policy declaration.
    #[error("Invalid key usage policy: {0}")]
    PolicyParseError(String),

    /// The key usage policy does not permit the activity for this certificate.
    #[error("Key usage policy does not permit {activity} for certificate '{subject}'")]
    KeyUsageDenied {
        activity: KeyUsageActivity,
        subject: String,
    },

    /// A key does not belong to the certificate it was presented with.
    #[error("Key does not match certificate: {0}")]
    KeyMismatch(String),

    /// Key algorithm family other than RSA, EC or symmetric.
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// Signature or key algorithm that is not supported.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature on a certificate did not verify.
    #[error("Signature verification failed: {0}")]
    SignatureMismatch(String),

    /// The signature provider failed for a reason other than a bad signature.
    #[error("Signature provider error: {0}")]
    Provider(String),

    /// An issuing CA's basic constraints forbid the chain below it.
    #[error("Certificate path length exceeded: {0}")]
    PathLengthExceeded(String),

    /// A certificate is outside its validity period.
    #[error("Certificate expired or not yet valid: {0}")]
    CertificateExpired(String),

    /// Error related to certificate contents.
    #[error("Invalid certificate: {0}")]
    CertificateInvalid(String),

    /// The chain is consistent but does not lead to the trust anchor.
    #[error("Certificate untrusted: {0}")]
    CertificateUntrusted(String),

    /// Failure while generating keys or certificates.
    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

impl CertGateError {
    /// Returns true for errors that mean a certificate or chain is broken, as
    /// opposed to merely untrusted or denied by policy.
    pub fn is_certificate_invalid(&self) -> bool {
        matches!(
            self,
            CertGateError::DecodingError(_)
                | CertGateError::SignatureMismatch(_)
                | CertGateError::UnsupportedAlgorithm(_)
                | CertGateError::PathLengthExceeded(_)
                | CertGateError::CertificateInvalid(_)
        )
    }
}

impl From<der::Error> for CertGateError {
    /// Converts a `der::Error` into a `CertGateError`.
    fn from(err: der::Error) -> Self {
        CertGateError::DecodingError(err.to_string())
    }
}

impl From<pem::PemError> for CertGateError {
    fn from(err: pem::PemError) -> Self {
        CertGateError::DecodingError(err.to_string())
    }
}

impl From<serde_json::Error> for CertGateError {
    fn from(err: serde_json::Error) -> Self {
        CertGateError::PolicyParseError(err.to_string())
    }
}

/// The stage of key or certificate generation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorErrorKind {
    Encoding,
    Algorithm,
    Signature,
    Key,
    Provider,
}

impl std::fmt::Display for GeneratorErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GeneratorErrorKind::Encoding => "encoding",
            GeneratorErrorKind::Algorithm => "algorithm",
            GeneratorErrorKind::Signature => "signature",
            GeneratorErrorKind::Key => "key",
            GeneratorErrorKind::Provider => "provider",
        };
        f.write_str(name)
    }
}

/// Error raised by the key and certificate generators.
///
/// The underlying cryptographic or encoding failure is kept as the source.
#[derive(Debug, Error)]
#[error("Unable to generate {target}: {kind} error: {source}")]
pub struct GeneratorError {
    pub kind: GeneratorErrorKind,
    target: &'static str,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl GeneratorError {
    pub(crate) fn certificate<E>(kind: GeneratorErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            target: "certificate",
            source: source.into(),
        }
    }

    pub(crate) fn key_pair<E>(kind: GeneratorErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            target: "key pair",
            source: source.into(),
        }
    }
}
