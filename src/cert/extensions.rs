use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{Any, Ia5String, OctetString, PrintableStringRef, SetOfVec},
    oid::ObjectIdentifier,
};
use x509_cert::attr::Attribute;
use x509_cert::ext::pkix::name::GeneralName;

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

use crate::error::{CertGateError, Result};
use crate::key::PublicKey;
use crate::oid;

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use certgate::cert::extensions::SubjectAltName;
/// use certgate::cert::extensions::ToAndFromX509Extension;
/// let san = SubjectAltName { names: vec!["example.com".to_string()] };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// Only DNS names are carried; other name forms are skipped on decode.
///
/// # Fields
/// * `names` - A list of DNS names.
#[derive(Debug, Clone)]
pub struct SubjectAltName {
    pub names: Vec<String>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let san = x509_cert::ext::pkix::SubjectAltName(
            self.names
                .iter()
                .map(|name| {
                    Ia5String::try_from(name.clone())
                        .map(GeneralName::DnsName)
                        .map_err(|e| CertGateError::InvalidInput(e.to_string()))
                })
                .collect::<Result<Vec<_>>>()?,
        );

        Ok(san.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let names = san
            .0
            .iter()
            .filter_map(|name| match name {
                GeneralName::DnsName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect();
        Ok(Self { names })
    }
}

/// Represents the Basic Constraints extension.
///
/// This extension indicates whether the certificate is a CA certificate and its path length.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed below this one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ku = X509KeyUsage::from(self.0);
        Ok(ku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// Represents the Extended Key Usage extension.
///
/// Purposes are kept as raw OIDs so that private or unusual purposes survive
/// a decode; [`ExtendedKeyUsageOption`] names the common ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedKeyUsage {
    pub usage: Vec<ObjectIdentifier>,
}

impl ExtendedKeyUsage {
    pub fn from_options(options: &[ExtendedKeyUsageOption]) -> Self {
        Self {
            usage: options.iter().map(|v| (*v).into()).collect(),
        }
    }

    pub fn contains(&self, purpose: &ObjectIdentifier) -> bool {
        self.usage.contains(purpose)
    }
}

impl ToAndFromX509Extension for ExtendedKeyUsage {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::ExtendedKeyUsage::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage(self.usage.clone());
        Ok(eku.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(extension)?;
        Ok(Self { usage: eku.0 })
    }
}

/// Represents an option for the Extended Key Usage extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtendedKeyUsageOption {
    Any,
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
    OcspSigning,
}

impl From<ExtendedKeyUsageOption> for ObjectIdentifier {
    fn from(value: ExtendedKeyUsageOption) -> Self {
        match value {
            ExtendedKeyUsageOption::Any => oid::ANY_EXTENDED_KEY_USAGE,
            ExtendedKeyUsageOption::OcspSigning => oid::KP_OCSP_SIGNING,
            ExtendedKeyUsageOption::ServerAuth => oid::KP_SERVER_AUTH,
            ExtendedKeyUsageOption::ClientAuth => oid::KP_CLIENT_AUTH,
            ExtendedKeyUsageOption::CodeSigning => oid::KP_CODE_SIGNING,
            ExtendedKeyUsageOption::EmailProtection => oid::KP_EMAIL_PROTECTION,
            ExtendedKeyUsageOption::TimeStamping => oid::KP_TIME_STAMPING,
        }
    }
}

/// Represents the Subject Key Identifier extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl SubjectKeyIdentifier {
    /// Derives the identifier as the SHA-1 hash of the subject public key bits
    /// (RFC 5280 section 4.2.1.2, method 1).
    pub fn from_public_key(public_key: &PublicKey) -> Result<Self> {
        let spki = public_key.to_spki()?;
        Ok(Self(key_identifier(spki.subject_public_key.raw_bytes())))
    }
}

/// SHA-1 key identifier over raw public key bits.
pub(crate) fn key_identifier(public_key_bits: &[u8]) -> Vec<u8> {
    <sha1::Sha1 as sha1::Digest>::digest(public_key_bits).to_vec()
}

impl ToAndFromX509Extension for SubjectKeyIdentifier {
    const OID: ObjectIdentifier = oid::SUBJECT_KEY_IDENTIFIER;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier(OctetString::new(self.0.clone())?);
        Ok(ski.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(extension)?;
        Ok(Self(ski.0.as_bytes().to_vec()))
    }
}

/// Represents the Authority Key Identifier (AKI) extension.
///
/// This extension identifies the public key corresponding to the private key used to sign the certificate.
///
/// # Fields
/// * `key_identifier` - The key identifier.
/// * `authority_cert_issuer` - The name of the issuer's issuer, if known.
/// * `authority_cert_serial_number` - The issuer's certificate serial number, if known.
#[derive(Debug, Clone)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Vec<u8>,
    pub authority_cert_issuer: Option<x509_cert::name::Name>,
    pub authority_cert_serial_number: Option<Vec<u8>>,
}

impl ToAndFromX509Extension for AuthorityKeyIdentifier {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::AuthorityKeyIdentifier::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(self.key_identifier.as_slice())?),
            authority_cert_issuer: self
                .authority_cert_issuer
                .clone()
                .map(|name| vec![GeneralName::DirectoryName(name)]),
            authority_cert_serial_number: self
                .authority_cert_serial_number
                .as_deref()
                .map(x509_cert::serial_number::SerialNumber::new)
                .transpose()?,
        };

        Ok(aki.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(extension)?;

        let authority_cert_issuer = aki.authority_cert_issuer.as_ref().and_then(|names| {
            names.iter().find_map(|name| match name {
                GeneralName::DirectoryName(dn) => Some(dn.clone()),
                _ => None,
            })
        });

        Ok(Self {
            key_identifier: aki
                .key_identifier
                .map(|id| id.as_bytes().to_vec())
                .unwrap_or_default(),
            authority_cert_issuer,
            authority_cert_serial_number: aki
                .authority_cert_serial_number
                .map(|sn| sn.as_bytes().to_vec()),
        })
    }
}

/// Represents the Subject Directory Attributes extension, restricted to the
/// countryOfCitizenship attribute (RFC 3739).
///
/// Older issuers put citizenship under the plain country name attribute type;
/// both are accepted on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectDirectoryAttributes {
    pub country_of_citizenship: Vec<String>,
}

impl ToAndFromX509Extension for SubjectDirectoryAttributes {
    const OID: ObjectIdentifier = oid::SUBJECT_DIRECTORY_ATTRIBUTES;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        if self.country_of_citizenship.is_empty() {
            return Err(CertGateError::InvalidInput(
                "subject directory attributes need at least one country".to_string(),
            ));
        }
        let attributes = self
            .country_of_citizenship
            .iter()
            .map(|code| {
                if code.len() != 2 {
                    return Err(CertGateError::InvalidInput(format!(
                        "'{code}' is not a two letter country code"
                    )));
                }
                let value = Any::encode_from(&PrintableStringRef::new(code)?)?;
                Ok(Attribute {
                    oid: oid::COUNTRY_OF_CITIZENSHIP,
                    values: SetOfVec::try_from(vec![value])?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(attributes.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let attributes = Vec::<Attribute>::from_der(extension)?;
        let country_of_citizenship = attributes
            .iter()
            .filter(|attr| {
                attr.oid == oid::COUNTRY_OF_CITIZENSHIP || attr.oid == oid::COUNTRY_NAME
            })
            .flat_map(|attr| attr.values.iter())
            .filter_map(super::params::directory_string)
            .collect();
        Ok(Self {
            country_of_citizenship,
        })
    }
}
