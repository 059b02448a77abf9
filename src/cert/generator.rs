use std::sync::atomic::{AtomicBool, Ordering};

use der::Encode;
use der::asn1::BitString;
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;

use super::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages,
    SubjectDirectoryAttributes, SubjectKeyIdentifier,
};
use super::params::{CertGenParams, ExtensionParam};
use super::{Certificate, SignatureAlgorithm, check_for_mismatching_key};
use crate::error::{CertGateError, GeneratorError, GeneratorErrorKind, Result};
use crate::issuer::{CertificateIssuer, Issuer, SelfIssuer};
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::TbsCertificate;

static PREFER_LEGACY_SIGNATURE: AtomicBool = AtomicBool::new(false);

/// Makes generators default to SHA-1 signatures, for relying parties that
/// cannot check anything newer.
pub fn set_prefer_legacy_signature(prefer: bool) {
    PREFER_LEGACY_SIGNATURE.store(prefer, Ordering::Relaxed);
}

pub fn prefer_legacy_signature() -> bool {
    PREFER_LEGACY_SIGNATURE.load(Ordering::Relaxed)
}

fn wrap(kind: GeneratorErrorKind) -> impl FnOnce(CertGateError) -> CertGateError {
    move |e| match e {
        CertGateError::Generator(_) => e,
        other => GeneratorError::certificate(kind, other).into(),
    }
}

/// Generates X.509 v3 certificates from [`CertGenParams`].
///
/// A generator owns its parameters; build one per call rather than sharing
/// an instance between threads that adjust its parameters.
#[derive(Clone, Debug)]
pub struct ParamsCertificateGenerator {
    params: CertGenParams,
}

impl ParamsCertificateGenerator {
    pub fn new(params: CertGenParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CertGenParams {
        &self.params
    }

    /// Generates a certificate for `subject_public_key` signed with
    /// `issuer_private_key`.
    ///
    /// Without an issuer certificate the result is self-signed: the issuer
    /// name is the subject name and the authority key identifier is derived
    /// from the subject public key.
    pub fn generate_certificate(
        &self,
        subject_public_key: &PublicKey,
        issuer_private_key: &KeyPair,
        issuer_certificate: Option<&Certificate>,
    ) -> Result<Certificate> {
        match issuer_certificate {
            Some(cert) => self.generate_with_issuer(
                subject_public_key,
                &CertificateIssuer::new(cert, issuer_private_key),
            ),
            None => {
                let name = self
                    .params
                    .subject_dn
                    .as_x509_name()
                    .map_err(wrap(GeneratorErrorKind::Encoding))?;
                self.generate_with_issuer(
                    subject_public_key,
                    &SelfIssuer::new(name, subject_public_key, issuer_private_key),
                )
            }
        }
    }

    /// Generates a certificate for `subject_public_key` signed by `issuer`.
    pub fn generate_with_issuer<I: Issuer + ?Sized>(
        &self,
        subject_public_key: &PublicKey,
        issuer: &I,
    ) -> Result<Certificate> {
        let signing_key = issuer.signing_key();
        if let Some(issuer_cert) = issuer.issuer_certificate() {
            check_for_mismatching_key(issuer_cert, &signing_key.public_key())
                .map_err(wrap(GeneratorErrorKind::Key))?;
        }

        let signature_algorithm = match self.params.signature_algorithm {
            Some(algorithm) if algorithm.family() != signing_key.family() => {
                return Err(GeneratorError::certificate(
                    GeneratorErrorKind::Algorithm,
                    CertGateError::UnsupportedAlgorithm(format!(
                        "{algorithm} cannot be used with a {} issuer key",
                        signing_key.family().name()
                    )),
                )
                .into());
            }
            Some(algorithm) => algorithm,
            None => SignatureAlgorithm::preferred_for(signing_key.family(), prefer_legacy_signature()),
        };

        let validity = self
            .params
            .resolve_validity(OffsetDateTime::now_utc())
            .map_err(wrap(GeneratorErrorKind::Encoding))?;
        let subject = self
            .params
            .subject_dn
            .as_x509_name()
            .map_err(wrap(GeneratorErrorKind::Encoding))?;
        let extensions = self
            .build_extensions(subject_public_key, issuer)
            .map_err(wrap(GeneratorErrorKind::Encoding))?;

        let tbs_cert = TbsCertificate {
            serial_number: self.params.resolve_serial_number(),
            signature_algorithm,
            issuer: issuer.issuer_name(),
            not_before: validity.not_before,
            not_after: validity.not_after,
            subject,
            subject_public_key: subject_public_key.clone(),
            extensions,
        };

        let tbs_cert_inner = tbs_cert
            .to_tbs_certificate_inner()
            .map_err(wrap(GeneratorErrorKind::Encoding))?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| GeneratorError::certificate(GeneratorErrorKind::Encoding, e))?;

        let signature = signing_key
            .sign_data(&tbs_der, signature_algorithm)
            .map_err(|e| match e {
                CertGateError::Provider(_) => wrap(GeneratorErrorKind::Provider)(e),
                _ => wrap(GeneratorErrorKind::Signature)(e),
            })?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algorithm.into(),
            signature: BitString::from_bytes(&signature)
                .map_err(|e| GeneratorError::certificate(GeneratorErrorKind::Encoding, e))?,
        };

        let cert = Certificate::from_inner(cert_inner).map_err(wrap(GeneratorErrorKind::Encoding))?;
        tracing::debug!(
            "generated certificate '{}' issued by '{}' ({})",
            cert.subject_name(),
            cert.issuer_name(),
            signature_algorithm
        );
        Ok(cert)
    }

    fn build_extensions<I: Issuer + ?Sized>(
        &self,
        subject_public_key: &PublicKey,
        issuer: &I,
    ) -> Result<Vec<ExtensionParam>> {
        let params = &self.params;
        let mut extensions = Vec::new();

        if params.make_ca_cert {
            let basic_constraints = BasicConstraints {
                is_ca: true,
                max_path_length: params.basic_constraints_path_length,
            };
            extensions.push(ExtensionParam::from_extension(basic_constraints, true)?);
        } else if params.include_basic_constraints {
            let basic_constraints = BasicConstraints {
                is_ca: params.basic_constraints_ca,
                max_path_length: params
                    .basic_constraints_path_length
                    .filter(|_| params.basic_constraints_ca),
            };
            extensions.push(ExtensionParam::from_extension(
                basic_constraints,
                params.basic_constraints_critical,
            )?);
        }

        if params.include_key_usage || params.make_ca_cert {
            let mut bits = params.key_usage_bits;
            if params.make_ca_cert {
                bits |= KeyUsages::KeyCertSign | KeyUsages::CRLSign;
            }
            if bits.is_empty() {
                return Err(CertGateError::InvalidInput(
                    "key usage extension requested with no usage bits".to_string(),
                ));
            }
            let critical = params.key_usage_critical || !params.include_key_usage;
            extensions.push(ExtensionParam::from_extension(KeyUsage(bits), critical)?);
        }

        if params.include_extended_key_usage {
            if params.extended_key_usage_oids.is_empty() {
                return Err(CertGateError::InvalidInput(
                    "extended key usage extension requested with no purposes".to_string(),
                ));
            }
            let eku = ExtendedKeyUsage {
                usage: params.extended_key_usage_oids.clone(),
            };
            extensions.push(ExtensionParam::from_extension(
                eku,
                params.extended_key_usage_critical,
            )?);
        }

        if params.include_subject_key_identifier {
            let ski = SubjectKeyIdentifier::from_public_key(subject_public_key)?;
            extensions.push(ExtensionParam::from_extension(ski, false)?);
        }

        if params.include_authority_key_identifier {
            let aki = AuthorityKeyIdentifier {
                key_identifier: issuer.issuer_key_identifier()?,
                authority_cert_issuer: None,
                authority_cert_serial_number: None,
            };
            extensions.push(ExtensionParam::from_extension(aki, false)?);
        }

        if params.include_subject_directory_attributes {
            let attributes = SubjectDirectoryAttributes {
                country_of_citizenship: params.country_of_citizenship.clone(),
            };
            extensions.push(ExtensionParam::from_extension(
                attributes,
                params.subject_directory_attributes_critical,
            )?);
        }

        extensions.extend(params.extensions.iter().cloned());
        Ok(extensions)
    }
}
