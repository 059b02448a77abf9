//! # certgate - Certificate and Key Usage Policy Engine
//!
//! certgate generates keys and X.509 v3 certificates, verifies certificate
//! chains, and decides whether a certificate may be used for a given
//! cryptographic activity. It is built on the RustCrypto crates and
//! `x509-cert`; no OpenSSL is needed outside of tests.
//!
//! ## Supported Key Types
//!
//! - **RSA**: any modulus size accepted by the `rsa` crate (2048 bits by default)
//! - **ECDSA**: P-256 and P-384 curves
//!
//! Signatures use SHA-384 by default, or SHA-1 when legacy signatures are
//! preferred (see [`cert::generator::set_prefer_legacy_signature`]).
//!
//! ## Key Features
//!
//! - **Parameterized generation**: key pairs from [`key::params::KeyGenParams`],
//!   self-signed or CA-signed certificates from [`cert::params::CertGenParams`]
//! - **Cached verification**: successful signature checks are remembered per
//!   (certificate, issuer) pair in a bounded LRU cache
//! - **Key usage policy**: declarative JSON rules deciding which key usage bits
//!   and extended key usage purposes allow which [`KeyUsageActivity`]
//! - **Attribute extraction**: named, read-only certificate attributes for
//!   display and policy logic
//! - **DN utilities**: attribute maps, `*` wildcard matching and validation of
//!   DN strings, plus CSR unwrapping ([`cert::dn`])
//!
//! ## Quick Start
//!
//! ### Generating a Self-Signed CA Certificate
//!
//! ```rust,no_run
//! use certgate::{
//!     cert::params::{CertGenParams, DistinguishedName},
//!     key::params::KeyGenParams,
//! };
//!
//! # fn main() -> Result<(), certgate::error::CertGateError> {
//! let key_pair = certgate::generate_key_pair(&KeyGenParams::default())?;
//!
//! let params = CertGenParams::builder()
//!     .subject_dn(
//!         DistinguishedName::builder()
//!             .common_name("Example CA")
//!             .organization("Example Corp")
//!             .country("US")
//!             .build(),
//!     )
//!     .make_ca_cert(true)
//!     .build();
//!
//! let ca_cert = certgate::generate_certificate(&params, &key_pair.public_key(), &key_pair, None)?;
//! println!("Certificate:\n{}", ca_cert.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Issuing and Verifying a Chain
//!
//! ```rust,no_run
//! use certgate::{
//!     cert::{Certificate, CertificateWithPrivateKey, params::{CertGenParams, DistinguishedName}},
//!     issuer::Issuer,
//!     key::KeyPair,
//! };
//!
//! # fn main() -> Result<(), certgate::error::CertGateError> {
//! let ca_key = KeyPair::generate_ecdsa_p384();
//! let ca_params = CertGenParams::builder()
//!     .subject_dn(DistinguishedName::builder().common_name("Example CA").build())
//!     .make_ca_cert(true)
//!     .build();
//! let ca = CertificateWithPrivateKey::new(Certificate::new_self_signed(&ca_params, &ca_key)?, ca_key)?;
//!
//! let server_key = KeyPair::generate_ecdsa_p256();
//! let server_params = CertGenParams::builder()
//!     .subject_dn(DistinguishedName::builder().common_name("server.example.com").build())
//!     .include_authority_key_identifier(true)
//!     .build();
//! let server_cert = ca.issue(&server_params, &server_key.public_key())?;
//!
//! assert!(certgate::verify(&server_cert, &ca.cert));
//! certgate::verify_chain(&[server_cert, ca.cert.clone()], &ca.cert)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Checking an Activity
//!
//! ```rust,no_run
//! use certgate::{KeyUsageActivity, cert::Certificate};
//!
//! # fn main() -> Result<(), certgate::error::CertGateError> {
//! let cert = Certificate::decode(&std::fs::read("server.pem").unwrap())?;
//! if certgate::check_activity(KeyUsageActivity::SslServerRemote, Some(&cert)) {
//!     println!("{} may act as a TLS server", cert.subject_name());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`cert`]: Certificate handling, extensions, generation and attribute extraction
//! - [`config`]: Process-wide configuration
//! - [`error`]: Error types
//! - [`issuer`]: Certificate issuer abstraction
//! - [`key`]: Key pair and public key handling
//! - [`keyusage`]: Key usage policy and checker
//! - [`oid`]: Object identifiers and their well-known names
//! - [`tbs_certificate`]: Low-level certificate structure manipulation
//! - [`verify`]: Cached signature and chain verification

pub mod cert;
pub mod config;
pub mod error;
pub mod issuer;
pub mod key;
pub mod keyusage;
pub mod oid;
pub mod tbs_certificate;
pub mod verify;

pub use cert::attribute::extract_attribute;
pub use keyusage::KeyUsageActivity;

use cert::Certificate;
use cert::generator::ParamsCertificateGenerator;
use cert::params::CertGenParams;
use error::Result;
use key::params::{KeyGenParams, ParamsKeyGenerator};
use key::{KeyPair, PublicKey};
use keyusage::KeyUsageChecker;
use verify::CertVerifier;

/// Generates a key pair as described by `params`.
pub fn generate_key_pair(params: &KeyGenParams) -> Result<KeyPair> {
    ParamsKeyGenerator::new(params.clone()).generate_key_pair()
}

/// Generates a certificate for `subject_public_key`, signed by
/// `issuer_private_key`. Without `issuer_certificate` the certificate is
/// self-signed.
pub fn generate_certificate(
    params: &CertGenParams,
    subject_public_key: &PublicKey,
    issuer_private_key: &KeyPair,
    issuer_certificate: Option<&Certificate>,
) -> Result<Certificate> {
    ParamsCertificateGenerator::new(params.clone()).generate_certificate(
        subject_public_key,
        issuer_private_key,
        issuer_certificate,
    )
}

/// True if `cert` was signed by `signing_cert`, checked through the
/// process-wide verifier.
pub fn verify(cert: &Certificate, signing_cert: &Certificate) -> bool {
    CertVerifier::global().is_verified(cert, signing_cert)
}

/// Like [`verify`], reporting why verification failed.
pub fn try_verify(cert: &Certificate, signing_cert: &Certificate) -> Result<()> {
    CertVerifier::global().cached_verify(cert, signing_cert, None)
}

/// Verifies `chain` (leaf first) up to `trusted` using the process-wide verifier.
pub fn verify_chain(chain: &[Certificate], trusted: &Certificate) -> Result<()> {
    CertVerifier::global().verify_certificate_chain(chain, trusted)
}

/// True if the process-wide key usage checker permits `activity` for `cert`.
pub fn check_activity(activity: KeyUsageActivity, cert: Option<&Certificate>) -> bool {
    KeyUsageChecker::get_default().permits_activity(activity, cert)
}

/// Like [`check_activity`], failing with
/// [`error::CertGateError::KeyUsageDenied`] when the activity is not permitted.
pub fn require_activity(activity: KeyUsageActivity, cert: Option<&Certificate>) -> Result<()> {
    KeyUsageChecker::get_default().require_activity(activity, cert)
}
