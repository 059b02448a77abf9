use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{Any, PrintableStringRef, SetOfVec, Utf8StringRef};
use der::{Tag, Tagged};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::SignatureAlgorithm;
use super::extensions::{FlagSet, KeyUsages, ToAndFromX509Extension};
use crate::error::{CertGateError, Result};
use crate::oid;

/// Days of validity given to generated certificates unless told otherwise (5 years).
pub const DEFAULT_DAYS_UNTIL_EXPIRY: i64 = 5 * 365;

/// How far in the past a generated certificate's `notBefore` is placed, to
/// tolerate clock skew between the generator and its relying parties.
pub const NOT_BEFORE_BACKDATE: Duration = Duration::minutes(10);

/// Distinguished name parameters for building an X.509 certificate.
///
/// This struct represents the subject or issuer name in a certificate.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The country (C).
/// * `state` - The state or province (ST).
/// * `locality` - The locality or city (L).
/// * `organization` - The organization (O).
/// * `organization_unit` - The organizational unit (OU).
/// * `email_address` - The PKCS#9 email address (EMAILADDRESS).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
#[builder(on(String, into))]
pub struct DistinguishedName {
    pub common_name: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
    pub email_address: Option<String>,
}

impl DistinguishedName {
    /// Converts the distinguished name to an X.509-compatible format.
    ///
    /// Only the components that are set are encoded, most significant first.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        let components = [
            (oid::COUNTRY_NAME, self.country.as_deref()),
            (oid::STATE_OR_PROVINCE_NAME, self.state.as_deref()),
            (oid::LOCALITY_NAME, self.locality.as_deref()),
            (oid::ORGANIZATION_NAME, self.organization.as_deref()),
            (oid::ORGANIZATIONAL_UNIT_NAME, self.organization_unit.as_deref()),
            (oid::COMMON_NAME, Some(self.common_name.as_str())),
            (oid::EMAIL_ADDRESS, self.email_address.as_deref()),
        ];

        let mut rdns = Vec::new();
        for (attr_type, value) in components {
            let Some(value) = value else { continue };
            if value.is_empty() && attr_type != oid::COMMON_NAME {
                continue;
            }
            let value = match attr_type {
                oid::COUNTRY_NAME => Any::encode_from(&PrintableStringRef::new(value)?)?,
                oid::EMAIL_ADDRESS => Any::encode_from(&der::asn1::Ia5StringRef::new(value)?)?,
                _ => Any::encode_from(&Utf8StringRef::new(value)?)?,
            };
            let atv = AttributeTypeAndValue {
                oid: attr_type,
                value,
            };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Components without a field here are ignored; when a component repeats
    /// the last occurrence wins.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Self {
        let mut dn = DistinguishedName::default();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let Some(value) = directory_string(&attr.value) else {
                    continue;
                };
                match attr.oid {
                    oid::COMMON_NAME => dn.common_name = value,
                    oid::COUNTRY_NAME => dn.country = Some(value),
                    oid::STATE_OR_PROVINCE_NAME => dn.state = Some(value),
                    oid::LOCALITY_NAME => dn.locality = Some(value),
                    oid::ORGANIZATION_NAME => dn.organization = Some(value),
                    oid::ORGANIZATIONAL_UNIT_NAME => dn.organization_unit = Some(value),
                    oid::EMAIL_ADDRESS => dn.email_address = Some(value),
                    _ => {}
                }
            }
        }
        dn
    }
}

/// Decodes a directory string attribute value as text.
///
/// Returns `None` for value types that are not character strings.
pub(crate) fn directory_string(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String
        | Tag::PrintableString
        | Tag::Ia5String
        | Tag::TeletexString
        | Tag::VisibleString => std::str::from_utf8(value.value()).ok().map(str::to_string),
        Tag::BmpString => {
            let units: Vec<u16> = value
                .value()
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).ok()
        }
        _ => None,
    }
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
#[derive(Clone, Debug)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }

    pub(crate) fn to_x509_extension(&self) -> Result<x509_cert::ext::Extension> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: der::asn1::OctetString::new(self.value.clone())?,
        })
    }

    pub(crate) fn from_x509_extension(ext: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }
}

/// Parameters for generating an X.509 certificate.
///
/// Every optional extension is added only when its `include_*` flag is set,
/// and each has its own criticality. Defaults are security relevant: five
/// years of validity starting ten minutes ago, a random positive 64-bit
/// serial number, and SHA-384 with the signing key's algorithm family.
#[derive(Clone, Debug, Builder)]
pub struct CertGenParams {
    pub subject_dn: DistinguishedName,
    /// Signature algorithm; chosen from the issuer key when unset.
    pub signature_algorithm: Option<SignatureAlgorithm>,
    /// Serial number; random when unset.
    pub serial_number: Option<u64>,
    pub not_before: Option<OffsetDateTime>,
    pub not_after: Option<OffsetDateTime>,
    #[builder(default = DEFAULT_DAYS_UNTIL_EXPIRY)]
    pub days_until_expiry: i64,

    /// Shorthand for a CA certificate: forces a CA basic constraints extension
    /// and adds `keyCertSign` and `cRLSign` to the key usage.
    #[builder(default)]
    pub make_ca_cert: bool,

    #[builder(default)]
    pub include_basic_constraints: bool,
    #[builder(default)]
    pub basic_constraints_ca: bool,
    pub basic_constraints_path_length: Option<u8>,
    #[builder(default = true)]
    pub basic_constraints_critical: bool,

    #[builder(default)]
    pub include_key_usage: bool,
    #[builder(default)]
    pub key_usage_bits: FlagSet<KeyUsages>,
    #[builder(default = true)]
    pub key_usage_critical: bool,

    #[builder(default)]
    pub include_extended_key_usage: bool,
    #[builder(default)]
    pub extended_key_usage_oids: Vec<ObjectIdentifier>,
    #[builder(default)]
    pub extended_key_usage_critical: bool,

    #[builder(default)]
    pub include_subject_key_identifier: bool,
    #[builder(default)]
    pub include_authority_key_identifier: bool,

    #[builder(default)]
    pub include_subject_directory_attributes: bool,
    /// ISO 3166 country codes for the countryOfCitizenship attribute.
    #[builder(default)]
    pub country_of_citizenship: Vec<String>,
    #[builder(default)]
    pub subject_directory_attributes_critical: bool,

    /// Additional pre-encoded extensions, appended after the generated ones.
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

impl CertGenParams {
    /// Resolves the validity period relative to `now`.
    ///
    /// An explicit `not_after` wins over `days_until_expiry`, which counts
    /// from the resolved `not_before`.
    pub fn resolve_validity(&self, now: OffsetDateTime) -> Result<Validity> {
        let not_before = self.not_before.unwrap_or(now - NOT_BEFORE_BACKDATE);
        let not_after = match self.not_after {
            Some(not_after) => not_after,
            None => self
                .days_until_expiry
                .checked_mul(86_400)
                .map(Duration::seconds)
                .and_then(|lifetime| not_before.checked_add(lifetime))
                .ok_or_else(|| {
                    CertGateError::InvalidInput(format!(
                        "{} days of validity from {not_before} is out of range",
                        self.days_until_expiry
                    ))
                })?,
        };
        if not_after <= not_before {
            return Err(CertGateError::InvalidInput(format!(
                "notAfter ({not_after}) must be later than notBefore ({not_before})"
            )));
        }
        Ok(Validity {
            not_before,
            not_after,
        })
    }

    /// Resolves the serial number, drawing a random positive value when unset.
    pub fn resolve_serial_number(&self) -> u64 {
        self.serial_number
            .unwrap_or_else(|| (rand::random::<u64>() >> 1).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinguished_name_round_trips_through_x509() {
        let dn = DistinguishedName::builder()
            .common_name("server, with comma")
            .organization("Example Corp")
            .country("US")
            .build();
        let x509 = dn.as_x509_name().unwrap();
        assert_eq!(x509.0.len(), 3);
        let decoded = DistinguishedName::from_x509_name(&x509);
        assert_eq!(decoded, dn);
    }

    #[test]
    fn unset_components_are_omitted() {
        let dn = DistinguishedName::builder().common_name("solo").build();
        let x509 = dn.as_x509_name().unwrap();
        assert_eq!(x509.0.len(), 1);
        assert_eq!(x509.to_string(), "CN=solo");
    }

    #[test]
    fn default_validity_is_backdated_five_years() {
        let params = CertGenParams::builder()
            .subject_dn(DistinguishedName::builder().common_name("x").build())
            .build();
        let now = OffsetDateTime::now_utc();
        let validity = params.resolve_validity(now).unwrap();
        assert_eq!(now - validity.not_before, Duration::minutes(10));
        assert_eq!(
            validity.not_after - validity.not_before,
            Duration::days(DEFAULT_DAYS_UNTIL_EXPIRY)
        );
    }

    #[test]
    fn inverted_validity_is_rejected() {
        let now = OffsetDateTime::now_utc();
        let params = CertGenParams::builder()
            .subject_dn(DistinguishedName::builder().common_name("x").build())
            .not_before(now)
            .not_after(now - Duration::days(1))
            .build();
        assert!(matches!(
            params.resolve_validity(now),
            Err(CertGateError::InvalidInput(_))
        ));
    }

    #[test]
    fn unrepresentable_lifetime_is_rejected() {
        let params = CertGenParams::builder()
            .subject_dn(DistinguishedName::builder().common_name("x").build())
            .days_until_expiry(3_000_000)
            .build();
        assert!(matches!(
            params.resolve_validity(OffsetDateTime::now_utc()),
            Err(CertGateError::InvalidInput(_))
        ));

        let params = CertGenParams::builder()
            .subject_dn(DistinguishedName::builder().common_name("x").build())
            .days_until_expiry(i64::MAX)
            .build();
        assert!(params.resolve_validity(OffsetDateTime::now_utc()).is_err());
    }

    #[test]
    fn random_serial_numbers_are_positive() {
        let params = CertGenParams::builder()
            .subject_dn(DistinguishedName::builder().common_name("x").build())
            .build();
        for _ in 0..32 {
            let serial = params.resolve_serial_number();
            assert!(serial > 0 && serial <= i64::MAX as u64);
        }
    }
}
