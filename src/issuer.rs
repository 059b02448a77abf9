use crate::cert::Certificate;
use crate::cert::extensions::SubjectKeyIdentifier;
use crate::cert::generator::ParamsCertificateGenerator;
use crate::cert::params::CertGenParams;
use crate::error::Result;
use crate::key::{KeyPair, PublicKey};

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> x509_cert::name::Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the key identifier placed in the authority key identifier
    /// extension of issued certificates.
    fn issuer_key_identifier(&self) -> Result<Vec<u8>>;

    /// Returns the issuer's own certificate, if it has one.
    fn issuer_certificate(&self) -> Option<&Certificate> {
        None
    }

    /// Issues a certificate for `subject_public_key` described by `params`.
    fn issue(&self, params: &CertGenParams, subject_public_key: &PublicKey) -> Result<Certificate> {
        ParamsCertificateGenerator::new(params.clone()).generate_with_issuer(subject_public_key, self)
    }
}

/// Issuer of a self-signed certificate: the subject signs for itself.
pub struct SelfIssuer<'a> {
    name: x509_cert::name::Name,
    subject_public_key: &'a PublicKey,
    key: &'a KeyPair,
}

impl<'a> SelfIssuer<'a> {
    pub fn new(
        name: x509_cert::name::Name,
        subject_public_key: &'a PublicKey,
        key: &'a KeyPair,
    ) -> Self {
        Self {
            name,
            subject_public_key,
            key,
        }
    }
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> x509_cert::name::Name {
        self.name.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn issuer_key_identifier(&self) -> Result<Vec<u8>> {
        Ok(SubjectKeyIdentifier::from_public_key(self.subject_public_key)?.0)
    }
}

/// Issuer backed by an existing CA certificate and its private key.
pub struct CertificateIssuer<'a> {
    cert: &'a Certificate,
    key: &'a KeyPair,
}

impl<'a> CertificateIssuer<'a> {
    pub fn new(cert: &'a Certificate, key: &'a KeyPair) -> Self {
        Self { cert, key }
    }
}

impl Issuer for CertificateIssuer<'_> {
    fn issuer_name(&self) -> x509_cert::name::Name {
        self.cert.inner.tbs_certificate.subject.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn issuer_key_identifier(&self) -> Result<Vec<u8>> {
        self.cert.subject_key_identifier()
    }

    fn issuer_certificate(&self) -> Option<&Certificate> {
        Some(self.cert)
    }
}
