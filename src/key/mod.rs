pub mod params;

use der::Encode;
use p256::ecdsa::{
    Signature as P256Signature, SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey,
};
use p384::ecdsa::{
    Signature as P384Signature, SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey,
};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use pkcs8::DecodePublicKey;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Digest;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::{HashAlgorithm, SignatureAlgorithm};
use crate::error::{CertGateError, GeneratorError, GeneratorErrorKind, Result};
use crate::oid;

/// The asymmetric algorithm family of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    Ec,
}

impl KeyFamily {
    /// The algorithm name reported for keys of this family (e.g. "RSA").
    pub fn name(&self) -> &'static str {
        match self {
            KeyFamily::Rsa => "RSA",
            KeyFamily::Ec => "EC",
        }
    }
}

/// Supported key types for certificate operations.
#[derive(Debug, Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| GeneratorError::key_pair(GeneratorErrorKind::Key, e))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P256SigningKey::random(&mut rng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P384SigningKey::random(&mut rng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            KeyPair::Rsa { .. } => KeyFamily::Rsa,
            KeyPair::EcdsaP256 { .. } | KeyPair::EcdsaP384 { .. } => KeyFamily::Ec,
        }
    }

    /// Returns the public half of this key pair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_key_pair(self)
    }

    /// Returns the SubjectPublicKeyInfo of the public half of this key pair.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().to_spki()
    }

    /// Signs `data` with the given signature algorithm.
    ///
    /// ECDSA signatures are returned DER encoded, as X.509 expects them.
    pub fn sign_data(&self, data: &[u8], algorithm: SignatureAlgorithm) -> Result<Vec<u8>> {
        if algorithm.family() != self.family() {
            return Err(CertGateError::UnsupportedAlgorithm(format!(
                "{} cannot be used with a {} key",
                algorithm.name(),
                self.family().name()
            )));
        }
        match self {
            KeyPair::Rsa { private, .. } => match algorithm.hash() {
                HashAlgorithm::Sha1 => sign_rsa::<sha1::Sha1>(private, data),
                HashAlgorithm::Sha256 => sign_rsa::<sha2::Sha256>(private, data),
                HashAlgorithm::Sha384 => sign_rsa::<sha2::Sha384>(private, data),
                HashAlgorithm::Sha512 => sign_rsa::<sha2::Sha512>(private, data),
            },
            KeyPair::EcdsaP256 { signing_key, .. } => {
                let signature: P256Signature = signing_key
                    .sign_prehash(&algorithm.hash().digest(data))
                    .map_err(|e| CertGateError::Provider(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                let signature: P384Signature = signing_key
                    .sign_prehash(&algorithm.hash().digest(data))
                    .map_err(|e| CertGateError::Provider(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }
}

fn sign_rsa<D>(private: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>>
where
    D: Digest + const_oid::AssociatedOid,
{
    let signing_key = rsa::pkcs1v15::SigningKey::<D>::new(private.clone());
    let signature = signing_key
        .try_sign(data)
        .map_err(|e| CertGateError::Provider(e.to_string()))?;
    Ok(signature.to_vec())
}

fn verify_rsa<D>(public: &RsaPublicKey, data: &[u8], signature: &[u8]) -> Result<()>
where
    D: Digest + const_oid::AssociatedOid,
{
    let verifying_key = rsa::pkcs1v15::VerifyingKey::<D>::new(public.clone());
    let signature = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|e| CertGateError::SignatureMismatch(e.to_string()))?;
    verifying_key
        .verify(data, &signature)
        .map_err(|e| CertGateError::SignatureMismatch(e.to_string()))
}

/// A public key of one of the supported families.
#[derive(Debug, Clone, PartialEq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(*verifying_key),
        }
    }

    /// Decodes a public key from a certificate's SubjectPublicKeyInfo.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        match spki.algorithm.oid {
            oid::RSA_ENCRYPTION => RsaPublicKey::from_public_key_der(&der)
                .map(PublicKey::Rsa)
                .map_err(|e| CertGateError::DecodingError(e.to_string())),
            oid::EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .and_then(|params| params.decode_as::<const_oid::ObjectIdentifier>().ok());
                match curve {
                    Some(oid::SECP256R1) => P256VerifyingKey::from_public_key_der(&der)
                        .map(PublicKey::EcdsaP256)
                        .map_err(|e| CertGateError::DecodingError(e.to_string())),
                    Some(oid::SECP384R1) => P384VerifyingKey::from_public_key_der(&der)
                        .map(PublicKey::EcdsaP384)
                        .map_err(|e| CertGateError::DecodingError(e.to_string())),
                    Some(other) => Err(CertGateError::UnsupportedAlgorithm(format!(
                        "named curve {other}"
                    ))),
                    None => Err(CertGateError::DecodingError(
                        "EC public key without named curve".to_string(),
                    )),
                }
            }
            other => Err(CertGateError::UnsupportedKeyType(format!(
                "public key algorithm {other}"
            ))),
        }
    }

    /// Encodes this key as a SubjectPublicKeyInfo.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone()),
            PublicKey::EcdsaP256(verifying_key) => SubjectPublicKeyInfoOwned::from_key(*verifying_key),
            PublicKey::EcdsaP384(verifying_key) => SubjectPublicKeyInfoOwned::from_key(*verifying_key),
        };
        spki.map_err(|e| CertGateError::EncodingError(e.to_string()))
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            PublicKey::Rsa(_) => KeyFamily::Rsa,
            PublicKey::EcdsaP256(_) | PublicKey::EcdsaP384(_) => KeyFamily::Ec,
        }
    }

    /// Verifies `signature` over `data`.
    ///
    /// A well-formed signature that does not match yields
    /// [`CertGateError::SignatureMismatch`]; an algorithm this key cannot
    /// check yields [`CertGateError::UnsupportedAlgorithm`].
    pub fn verify(&self, data: &[u8], signature: &[u8], algorithm: SignatureAlgorithm) -> Result<()> {
        if algorithm.family() != self.family() {
            return Err(CertGateError::UnsupportedAlgorithm(format!(
                "{} cannot be verified with a {} key",
                algorithm.name(),
                self.family().name()
            )));
        }
        match self {
            PublicKey::Rsa(public) => match algorithm.hash() {
                HashAlgorithm::Sha1 => verify_rsa::<sha1::Sha1>(public, data, signature),
                HashAlgorithm::Sha256 => verify_rsa::<sha2::Sha256>(public, data, signature),
                HashAlgorithm::Sha384 => verify_rsa::<sha2::Sha384>(public, data, signature),
                HashAlgorithm::Sha512 => verify_rsa::<sha2::Sha512>(public, data, signature),
            },
            PublicKey::EcdsaP256(verifying_key) => {
                let signature = P256Signature::from_der(signature)
                    .map_err(|e| CertGateError::SignatureMismatch(e.to_string()))?;
                verifying_key
                    .verify_prehash(&algorithm.hash().digest(data), &signature)
                    .map_err(|e| CertGateError::SignatureMismatch(e.to_string()))
            }
            PublicKey::EcdsaP384(verifying_key) => {
                let signature = P384Signature::from_der(signature)
                    .map_err(|e| CertGateError::SignatureMismatch(e.to_string()))?;
                verifying_key
                    .verify_prehash(&algorithm.hash().digest(data), &signature)
                    .map_err(|e| CertGateError::SignatureMismatch(e.to_string()))
            }
        }
    }
}

/// Key material presented to the key usage checker.
///
/// X.509 key usage constrains only what a certificate's public key may be
/// used for, so only [`CryptoKey::Public`] is ever checked against policy.
#[derive(Debug, Clone, Copy)]
pub enum CryptoKey<'a> {
    Public(&'a PublicKey),
    Private(&'a KeyPair),
    /// A secret key, identified by its algorithm name (e.g. "AES").
    Symmetric(&'a str),
    /// Any other key, identified by its algorithm name.
    Other(&'a str),
}
