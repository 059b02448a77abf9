use std::time::Duration;
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::serial_number::SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::ExtensionParam;
use crate::error::{CertGateError, Result};
use crate::key::PublicKey;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `not_before` - The start of the certificate's validity period.
/// * `not_after` - The end of the certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
pub struct TbsCertificate {
    /// Certificate serial number, big-endian unsigned
    pub serial_number: u64,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: x509_cert::name::Name,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub subject: x509_cert::name::Name,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let algorithm_id: x509_cert::spki::AlgorithmIdentifierOwned =
            self.signature_algorithm.into();

        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509_extension)
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: offset_to_x509_time(self.not_before)?,
            not_after: offset_to_x509_time(self.not_after)?,
        };

        // SerialNumber wants the DER INTEGER content octets; a leading zero
        // keeps values with the top bit set positive.
        let serial_bytes = self.serial_number.to_be_bytes();
        let first = serial_bytes
            .iter()
            .position(|b| *b != 0)
            .unwrap_or(serial_bytes.len() - 1);
        let mut serial = Vec::with_capacity(9);
        if serial_bytes[first] & 0x80 != 0 {
            serial.push(0);
        }
        serial.extend_from_slice(&serial_bytes[first..]);
        let serial_number = SerialNumber::new(&serial)?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: algorithm_id,
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if extensions.is_empty() {
                None
            } else {
                Some(extensions)
            },
        })
    }
}

/// RFC 5280 4.1.2.5: UTCTime through 2049, GeneralizedTime from 2050 on.
pub(crate) fn offset_to_x509_time(value: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let secs = u64::try_from(value.unix_timestamp()).map_err(|_| {
        CertGateError::InvalidInput(format!("{value} is before the Unix epoch"))
    })?;
    let date_time = der::DateTime::from_unix_duration(Duration::from_secs(secs))?;
    if value.year() < 2050 {
        Ok(x509_cert::time::Time::UtcTime(der::asn1::UtcTime::from_date_time(date_time)?))
    } else {
        Ok(x509_cert::time::Time::GeneralTime(
            der::asn1::GeneralizedTime::from_date_time(date_time),
        ))
    }
}
