use bon::Builder;

use super::KeyPair;
use crate::error::{CertGateError, GeneratorError, GeneratorErrorKind, Result};

pub const DEFAULT_KEY_ALGORITHM: &str = "RSA";
pub const DEFAULT_RSA_KEY_SIZE: usize = 2048;
pub const DEFAULT_NAMED_CURVE: &str = "secp384r1";

/// Parameters for generating a key pair.
///
/// # Fields
/// * `algorithm` - "RSA" or "EC" (case-insensitive). Defaults to "RSA".
/// * `key_size` - RSA modulus size in bits. Defaults to 2048.
/// * `named_curve` - EC curve name. Defaults to "secp384r1".
#[derive(Clone, Debug, Builder)]
pub struct KeyGenParams {
    #[builder(into, default = DEFAULT_KEY_ALGORITHM.to_string())]
    pub algorithm: String,
    #[builder(default = DEFAULT_RSA_KEY_SIZE)]
    pub key_size: usize,
    #[builder(into, default = DEFAULT_NAMED_CURVE.to_string())]
    pub named_curve: String,
}

impl Default for KeyGenParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The elliptic curves key pairs can be generated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedCurve {
    P256,
    P384,
}

impl NamedCurve {
    /// Resolves a curve by its SEC, ANSI X9.62 or NIST name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "secp256r1" | "prime256v1" | "p-256" | "p256" => Some(NamedCurve::P256),
            "secp384r1" | "p-384" | "p384" => Some(NamedCurve::P384),
            _ => None,
        }
    }
}

/// Generates key pairs from [`KeyGenParams`].
///
/// A generator owns its parameters; build one per call rather than sharing
/// an instance between threads that adjust its parameters.
#[derive(Clone, Debug, Default)]
pub struct ParamsKeyGenerator {
    params: KeyGenParams,
}

impl ParamsKeyGenerator {
    pub fn new(params: KeyGenParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KeyGenParams {
        &self.params
    }

    /// Generates a key pair of the configured algorithm.
    pub fn generate_key_pair(&self) -> Result<KeyPair> {
        let algorithm = self.params.algorithm.to_ascii_uppercase();
        tracing::debug!(
            "generating {} key pair (size {}, curve {})",
            algorithm,
            self.params.key_size,
            self.params.named_curve
        );
        match algorithm.as_str() {
            "RSA" => KeyPair::generate_rsa(self.params.key_size),
            "EC" | "ECDSA" => match NamedCurve::from_name(&self.params.named_curve) {
                Some(NamedCurve::P256) => Ok(KeyPair::generate_ecdsa_p256()),
                Some(NamedCurve::P384) => Ok(KeyPair::generate_ecdsa_p384()),
                None => Err(GeneratorError::key_pair(
                    GeneratorErrorKind::Algorithm,
                    CertGateError::UnsupportedAlgorithm(format!(
                        "named curve {}",
                        self.params.named_curve
                    )),
                )
                .into()),
            },
            _ => Err(GeneratorError::key_pair(
                GeneratorErrorKind::Algorithm,
                CertGateError::UnsupportedAlgorithm(self.params.algorithm.clone()),
            )
            .into()),
        }
    }
}
