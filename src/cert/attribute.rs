//! Read-only attribute extraction over a parsed certificate.
//!
//! Every attribute has a canonical name (e.g. `subject.dn`, `keyUsage.crlSign`)
//! and may have legacy names kept for old policy documents. Lookup is case
//! insensitive. Extraction never fails: problems are logged and the attribute
//! simply yields no value.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use der::{Decode, Encode};
use rsa::BigUint;
use time::OffsetDateTime;
use time::macros::format_description;
use x509_cert::ext::pkix::name::GeneralName;

use super::extensions::{KeyUsage, KeyUsages, SubjectDirectoryAttributes};
use super::params::directory_string;
use super::{Certificate, HashAlgorithm, SignatureAlgorithm};
use crate::oid;

/// One extracted attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(text) => f.write_str(text),
            AttributeValue::Bytes(bytes) => write!(f, "#{}", hex::encode(bytes)),
            AttributeValue::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// Extracted values keyed by attribute name.
pub type AttributeValues = BTreeMap<String, Vec<AttributeValue>>;

/// Which name of the certificate a DN attribute reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSide {
    Issuer,
    Subject,
}

impl NameSide {
    pub fn prefix(&self) -> &'static str {
        match self {
            NameSide::Issuer => "issuer",
            NameSide::Subject => "subject",
        }
    }

    fn name<'a>(&self, cert: &'a Certificate) -> &'a x509_cert::name::Name {
        match self {
            NameSide::Issuer => &cert.inner.tbs_certificate.issuer,
            NameSide::Subject => &cert.inner.tbs_certificate.subject,
        }
    }

    fn alt_name_oid(&self) -> const_oid::ObjectIdentifier {
        match self {
            NameSide::Issuer => oid::ISSUER_ALT_NAME,
            NameSide::Subject => oid::SUBJECT_ALT_NAME,
        }
    }
}

/// Alternative name forms exposed as attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltNameKind {
    Email,
    Dns,
    Uri,
    /// otherName, exposed as base64 of its DER encoding
    Other,
}

impl AltNameKind {
    fn suffix(&self) -> &'static str {
        match self {
            AltNameKind::Email => "Email",
            AltNameKind::Dns => "DNS",
            AltNameKind::Uri => "URI",
            AltNameKind::Other => "Other",
        }
    }
}

/// Key usage bits in bit-string order, with their attribute names.
pub const KEY_USAGE_BITS: [(&str, KeyUsages); 9] = [
    ("digitalSignature", KeyUsages::DigitalSignature),
    ("nonRepudiation", KeyUsages::NonRepudiation),
    ("keyEncipherment", KeyUsages::KeyEncipherment),
    ("dataEncipherment", KeyUsages::DataEncipherment),
    ("keyAgreement", KeyUsages::KeyAgreement),
    ("keyCertSign", KeyUsages::KeyCertSign),
    ("crlSign", KeyUsages::CRLSign),
    ("encipherOnly", KeyUsages::EncipherOnly),
    ("decipherOnly", KeyUsages::DecipherOnly),
];

/// A certificate attribute that can be extracted by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateAttribute {
    Der,
    Base64,
    Pem,
    SignatureAlgorithmName,
    SignatureAlgorithmOid,
    Serial,
    NotAfter,
    NotBefore,
    Name(NameSide),
    CanonicalName(NameSide),
    Rfc2253Name(NameSide),
    /// The name split into components, see [`CertificateAttribute::extract_values`].
    DnComponents(NameSide),
    AltName(NameSide, AltNameKind),
    SubjectPublicKeyAlgorithm,
    SubjectPublicKey,
    SubjectKeyIdentifier,
    ThumbprintSha1,
    CountryOfCitizenship,
    KeyUsageCriticality,
    /// Index into [`KEY_USAGE_BITS`].
    KeyUsageBit(usize),
    ExtendedKeyUsageCriticality,
    ExtendedKeyUsageValues,
    CertificatePolicies,
}

const KEY_USAGE_NONE: &str = "none";
const KEY_USAGE_NONCRIT: &str = "noncrit";
const KEY_USAGE_CRITICAL: &str = "critical";

/// Short names kept as direct children of `issuer.` and `subject.`.
const LEGACY_DN_SUFFIXES: [&str; 8] = ["cn", "l", "st", "o", "ou", "c", "street", "dc"];

static REGISTRY: LazyLock<HashMap<String, CertificateAttribute>> = LazyLock::new(|| {
    let mut registry = HashMap::new();
    for attribute in CertificateAttribute::all() {
        registry.insert(attribute.name().to_ascii_lowercase(), attribute);
        for legacy in attribute.legacy_names() {
            registry.insert(legacy.to_ascii_lowercase(), attribute);
        }
    }
    registry
});

impl CertificateAttribute {
    /// Every attribute, in presentation order.
    pub fn all() -> Vec<CertificateAttribute> {
        use CertificateAttribute::*;
        let mut all = vec![
            Der,
            Base64,
            Pem,
            SignatureAlgorithmName,
            SignatureAlgorithmOid,
            Serial,
            NotAfter,
            NotBefore,
        ];
        for side in [NameSide::Issuer, NameSide::Subject] {
            all.extend([Name(side), CanonicalName(side), Rfc2253Name(side), DnComponents(side)]);
            if side == NameSide::Subject {
                all.extend([SubjectPublicKeyAlgorithm, SubjectPublicKey, SubjectKeyIdentifier]);
            }
            for kind in [AltNameKind::Email, AltNameKind::Dns, AltNameKind::Uri, AltNameKind::Other] {
                all.push(AltName(side, kind));
            }
        }
        all.extend([ThumbprintSha1, CountryOfCitizenship, KeyUsageCriticality]);
        all.extend((0..KEY_USAGE_BITS.len()).map(KeyUsageBit));
        all.extend([
            ExtendedKeyUsageCriticality,
            ExtendedKeyUsageValues,
            CertificatePolicies,
        ]);
        all
    }

    /// Canonical attribute name.
    pub fn name(&self) -> String {
        use CertificateAttribute::*;
        match self {
            Der => "der".to_string(),
            Base64 => "base64".to_string(),
            Pem => "pem".to_string(),
            SignatureAlgorithmName => "signatureAlgorithmName".to_string(),
            SignatureAlgorithmOid => "signatureAlgorithmOID".to_string(),
            Serial => "serial".to_string(),
            NotAfter => "notAfter".to_string(),
            NotBefore => "notBefore".to_string(),
            Name(side) => side.prefix().to_string(),
            CanonicalName(side) => format!("{}.canonical", side.prefix()),
            Rfc2253Name(side) => format!("{}.rfc2253", side.prefix()),
            DnComponents(side) => format!("{}.dn", side.prefix()),
            AltName(side, kind) => format!("{}AltName{}", side.prefix(), kind.suffix()),
            SubjectPublicKeyAlgorithm => "subjectPublicKeyAlgorithm".to_string(),
            SubjectPublicKey => "subjectPublicKey".to_string(),
            SubjectKeyIdentifier => "subjectKeyIdentifier".to_string(),
            ThumbprintSha1 => "thumbprintSHA1".to_string(),
            CountryOfCitizenship => "countryOfCitizenship".to_string(),
            KeyUsageCriticality => "keyUsageCriticality".to_string(),
            KeyUsageBit(index) => format!("keyUsage.{}", KEY_USAGE_BITS[*index].0),
            ExtendedKeyUsageCriticality => "extendedKeyUsageCriticality".to_string(),
            ExtendedKeyUsageValues => "extendedKeyUsageValues".to_string(),
            CertificatePolicies => "certificatePolicies".to_string(),
        }
    }

    /// Names accepted for backward compatibility.
    pub fn legacy_names(&self) -> Vec<String> {
        use CertificateAttribute::*;
        match self {
            CanonicalName(side) => vec![format!("{}.dn.canonical", side.prefix())],
            Rfc2253Name(side) => vec![format!("{}.dn.rfc2253", side.prefix())],
            DnComponents(side) => LEGACY_DN_SUFFIXES
                .iter()
                .map(|suffix| format!("{}.{suffix}", side.prefix()))
                .chain([format!("{}Email", side.prefix())])
                .collect(),
            KeyUsageBit(6) => vec!["keyUsage.cRLSign".to_string()],
            KeyUsageCriticality => vec!["keyUsage.criticality".to_string()],
            ExtendedKeyUsageCriticality => vec!["extendedKeyUsage.criticality".to_string()],
            ExtendedKeyUsageValues => vec!["extendedKeyUsage".to_string()],
            _ => vec![],
        }
    }

    /// True for attributes whose values are keyed under the attribute name
    /// plus a suffix.
    pub fn is_prefixed(&self) -> bool {
        matches!(self, CertificateAttribute::DnComponents(_))
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            CertificateAttribute::DnComponents(_)
                | CertificateAttribute::CountryOfCitizenship
                | CertificateAttribute::ExtendedKeyUsageValues
                | CertificateAttribute::CertificatePolicies
        )
    }

    /// Looks up an attribute by canonical or legacy name (case-insensitive).
    ///
    /// Unknown names below `issuer.` or `subject.` resolve to the DN
    /// components of that name, so `subject.dn.2.o` and `subject.uid` work.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if let Some(attribute) = REGISTRY.get(&lower) {
            return Some(*attribute);
        }
        if lower.starts_with("issuer.") {
            Some(CertificateAttribute::DnComponents(NameSide::Issuer))
        } else if lower.starts_with("subject.") {
            Some(CertificateAttribute::DnComponents(NameSide::Subject))
        } else {
            None
        }
    }

    /// Translates a legacy name to the key its values are filed under.
    fn key_for(&self, requested: &str) -> String {
        let lower = requested.to_ascii_lowercase();
        match self {
            CertificateAttribute::DnComponents(side) => {
                let prefix = side.prefix();
                if lower == format!("{prefix}email") {
                    return format!("{prefix}.dn.emailaddress");
                }
                let dn = format!("{prefix}.dn");
                if lower == dn || lower.starts_with(&format!("{dn}.")) {
                    return lower;
                }
                match lower.strip_prefix(&format!("{prefix}.")) {
                    Some(suffix) if !suffix.is_empty() => format!("{dn}.{suffix}"),
                    _ => dn,
                }
            }
            _ => self.name().to_ascii_lowercase(),
        }
    }

    /// Extracts this attribute's values.
    ///
    /// Most attributes produce one key, their own name. DN components
    /// produce the full name under `<prefix>.dn` and, for each RDN at
    /// position N (1-based, in encoding order), `<prefix>.dn.N` (the RDN as
    /// text), `<prefix>.dn.N.<type>` and `<prefix>.dn.<type>`. Types are
    /// lower-cased short names, or `oid.<dotted>` for unnamed types.
    pub fn extract_values(&self, cert: &Certificate) -> AttributeValues {
        use CertificateAttribute::*;
        let name = self.name();
        let single = |value: Option<AttributeValue>| -> AttributeValues {
            let mut values = AttributeValues::new();
            values.insert(name.clone(), value.into_iter().collect());
            values
        };
        match self {
            Der => single(Some(AttributeValue::Bytes(cert.as_der().to_vec()))),
            Base64 => single(Some(STANDARD.encode(cert.as_der()).into())),
            Pem => single(
                cert.to_pem()
                    .map_err(|e| tracing::warn!("unable to PEM encode certificate: {e}"))
                    .ok()
                    .map(AttributeValue::from),
            ),
            SignatureAlgorithmName => {
                let oid = cert.inner.signature_algorithm.oid;
                let value = SignatureAlgorithm::from_oid(&oid)
                    .map(|alg| alg.name().to_string())
                    .unwrap_or_else(|| oid.to_string());
                single(Some(value.into()))
            }
            SignatureAlgorithmOid => {
                single(Some(cert.inner.signature_algorithm.oid.to_string().into()))
            }
            Serial => single(Some(decimal(cert.serial_number()).into())),
            NotAfter => single(format_time(cert.not_after()).map(AttributeValue::from)),
            NotBefore => single(format_time(cert.not_before()).map(AttributeValue::from)),
            Name(side) => single(Some(display_name(side.name(cert), ", ", false).into())),
            CanonicalName(side) => single(Some(canonical_name(side.name(cert)).into())),
            Rfc2253Name(side) => single(Some(display_name(side.name(cert), ",", true).into())),
            DnComponents(side) => dn_components(side.name(cert), &name),
            AltName(side, kind) => single(alt_name(cert, *side, *kind).map(AttributeValue::from)),
            SubjectPublicKeyAlgorithm => {
                let algorithm = cert.inner.tbs_certificate.subject_public_key_info.algorithm.oid;
                let value = match algorithm {
                    oid::RSA_ENCRYPTION => "RSA".to_string(),
                    oid::EC_PUBLIC_KEY => "EC".to_string(),
                    other => other.to_string(),
                };
                single(Some(value.into()))
            }
            SubjectPublicKey => single(
                cert.inner
                    .tbs_certificate
                    .subject_public_key_info
                    .to_der()
                    .map_err(|e| tracing::warn!("unable to encode subject public key: {e}"))
                    .ok()
                    .map(|der| STANDARD.encode(der).into()),
            ),
            SubjectKeyIdentifier => single(
                cert.subject_key_identifier()
                    .map_err(|e| tracing::debug!("no subject key identifier: {e}"))
                    .ok()
                    .map(|ski| STANDARD.encode(ski).into()),
            ),
            ThumbprintSha1 => {
                single(Some(STANDARD.encode(HashAlgorithm::Sha1.digest(cert.as_der())).into()))
            }
            CountryOfCitizenship => {
                let countries = match cert.decode_extension::<SubjectDirectoryAttributes>() {
                    Ok(Some(attributes)) => attributes.country_of_citizenship,
                    Ok(None) => vec![],
                    Err(e) => {
                        tracing::debug!("unable to decode subject directory attributes: {e}");
                        vec![]
                    }
                };
                let mut values = AttributeValues::new();
                values.insert(name.clone(), countries.into_iter().map(AttributeValue::from).collect());
                values
            }
            KeyUsageCriticality => single(Some(
                criticality(cert, &oid::KEY_USAGE, cert.key_usage().ok().flatten().is_some())
                    .into(),
            )),
            KeyUsageBit(index) => {
                let bit = KEY_USAGE_BITS[*index].1;
                let set = match cert.key_usage() {
                    Ok(Some(KeyUsage(bits))) => bits.contains(bit),
                    _ => false,
                };
                single(Some(set.into()))
            }
            ExtendedKeyUsageCriticality => single(Some(
                criticality(
                    cert,
                    &oid::EXTENDED_KEY_USAGE,
                    cert.extended_key_usage().ok().flatten().is_some(),
                )
                .into(),
            )),
            ExtendedKeyUsageValues => {
                let purposes = match cert.extended_key_usage() {
                    Ok(Some(eku)) => eku.usage,
                    Ok(None) => vec![],
                    Err(e) => {
                        tracing::warn!("unable to decode extended key usage: {e}");
                        vec![]
                    }
                };
                let mut values = AttributeValues::new();
                values.insert(
                    name.clone(),
                    purposes.iter().map(|p| p.to_string().into()).collect(),
                );
                values
            }
            CertificatePolicies => {
                let mut values = AttributeValues::new();
                values.insert(name.clone(), certificate_policies(cert));
                values
            }
        }
    }

    /// Like [`Self::extract_values`], with the values also filed under each
    /// legacy name.
    pub fn extract_values_including_legacy_names(&self, cert: &Certificate) -> AttributeValues {
        let mut values = self.extract_values(cert);
        let mut legacy_values = AttributeValues::new();
        for legacy in self.legacy_names() {
            let new_name = self.key_for(&legacy);
            let mut found = false;
            for (key, value) in values.iter() {
                if let Some(rest) = key.to_ascii_lowercase().strip_prefix(&new_name) {
                    found = true;
                    legacy_values.insert(format!("{legacy}{rest}"), value.clone());
                }
            }
            if !found {
                legacy_values.insert(legacy, vec![]);
            }
        }
        values.extend(legacy_values);
        values
    }
}

impl fmt::Display for CertificateAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Extracts the values of the attribute called `name` (canonical, legacy or
/// DN component name). Returns `None` for unknown names and for attributes
/// the certificate has no value for.
pub fn extract_attribute(cert: &Certificate, name: &str) -> Option<Vec<AttributeValue>> {
    let attribute = CertificateAttribute::from_name(name)?;
    let key = attribute.key_for(name);
    attribute
        .extract_values(cert)
        .into_iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(&key))
        .map(|(_, values)| values)
        .filter(|values| !values.is_empty())
}

fn criticality(cert: &Certificate, oid: &const_oid::ObjectIdentifier, present: bool) -> &'static str {
    if !present {
        KEY_USAGE_NONE
    } else if cert.is_extension_critical(oid) {
        KEY_USAGE_CRITICAL
    } else {
        KEY_USAGE_NONCRIT
    }
}

fn certificate_policies(cert: &Certificate) -> Vec<AttributeValue> {
    let Some(ext) = cert.extension(&oid::CERTIFICATE_POLICIES) else {
        return vec![];
    };
    match x509_cert::ext::pkix::CertificatePolicies::from_der(ext.extn_value.as_bytes()) {
        Ok(policies) => policies
            .0
            .iter()
            .map(|policy| policy.policy_identifier.to_string().into())
            .collect(),
        Err(e) => {
            tracing::warn!("failed to parse certificate policies: {e}");
            vec![]
        }
    }
}

fn alt_name(cert: &Certificate, side: NameSide, kind: AltNameKind) -> Option<String> {
    let ext = cert.extension(&side.alt_name_oid())?;
    // SubjectAltName and IssuerAltName share the GeneralNames syntax.
    let names = match x509_cert::ext::pkix::name::GeneralNames::from_der(ext.extn_value.as_bytes()) {
        Ok(names) => names,
        Err(e) => {
            tracing::debug!("could not extract {} alternative names: {e}", side.prefix());
            return None;
        }
    };
    names.iter().find_map(|name| match (kind, name) {
        (AltNameKind::Email, GeneralName::Rfc822Name(value)) => Some(value.to_string()),
        (AltNameKind::Dns, GeneralName::DnsName(value)) => Some(value.to_string()),
        (AltNameKind::Uri, GeneralName::UniformResourceIdentifier(value)) => {
            Some(value.to_string())
        }
        (AltNameKind::Other, GeneralName::OtherName(other)) => other
            .to_der()
            .map_err(|e| tracing::warn!("error extracting otherName: {e}"))
            .ok()
            .map(|der| STANDARD.encode(der)),
        _ => None,
    })
}

fn dn_components(name: &x509_cert::name::Name, prefix: &str) -> AttributeValues {
    let mut values = AttributeValues::new();
    let mut add = |key: String, value: String| {
        values.entry(key).or_default().push(AttributeValue::Text(value));
    };
    add(prefix.to_string(), display_name(name, ", ", false));
    for (index, rdn) in name.0.iter().enumerate() {
        let position = index + 1;
        add(format!("{prefix}.{position}"), rdn_string(rdn, false));
        for atv in rdn.0.iter() {
            let type_name = match oid::dn_attribute_name(&atv.oid) {
                Some(short) => short.to_ascii_lowercase(),
                None => format!("oid.{}", atv.oid),
            };
            let value = atv_value(atv);
            add(format!("{prefix}.{position}.{type_name}"), value.clone());
            add(format!("{prefix}.{type_name}"), value);
        }
    }
    values
}

/// RFC 2253 attribute keywords; anything else is written as a dotted OID.
const RFC2253_KEYWORDS: [&str; 9] = ["CN", "L", "ST", "O", "OU", "C", "STREET", "DC", "UID"];

fn atv_type(atv: &x509_cert::attr::AttributeTypeAndValue, rfc2253_only: bool) -> String {
    match oid::dn_attribute_name(&atv.oid) {
        Some(short) if !rfc2253_only || RFC2253_KEYWORDS.contains(&short) => short.to_string(),
        _ => atv.oid.to_string(),
    }
}

fn atv_value(atv: &x509_cert::attr::AttributeTypeAndValue) -> String {
    match directory_string(&atv.value) {
        Some(text) => text,
        None => match atv.value.to_der() {
            Ok(der) => format!("#{}", hex::encode(&der)),
            Err(_) => String::new(),
        },
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        let needs_escape = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';')
            || (i == 0 && (c == '#' || c == ' '))
            || (i == last && c == ' ');
        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn rdn_string(rdn: &x509_cert::name::RelativeDistinguishedName, rfc2253_only: bool) -> String {
    rdn.0
        .iter()
        .map(|atv| {
            let value = match directory_string(&atv.value) {
                Some(text) => escape(&text),
                None => atv_value(atv),
            };
            format!("{}={value}", atv_type(atv, rfc2253_only))
        })
        .collect::<Vec<_>>()
        .join("+")
}

/// Most significant RDN last, as names are conventionally written.
fn display_name(name: &x509_cert::name::Name, separator: &str, rfc2253_only: bool) -> String {
    name.0
        .iter()
        .rev()
        .map(|rdn| rdn_string(rdn, rfc2253_only))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Lower-cased, whitespace-collapsed form for comparing names.
fn canonical_name(name: &x509_cert::name::Name) -> String {
    name.0
        .iter()
        .rev()
        .map(|rdn| {
            let mut parts: Vec<String> = rdn
                .0
                .iter()
                .map(|atv| {
                    let value = match directory_string(&atv.value) {
                        Some(text) => escape(
                            &text
                                .split_whitespace()
                                .collect::<Vec<_>>()
                                .join(" ")
                                .to_lowercase(),
                        ),
                        None => atv_value(atv),
                    };
                    format!("{}={value}", atv_type(atv, true).to_ascii_lowercase())
                })
                .collect();
            parts.sort();
            parts.join("+")
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn format_time(time: crate::error::Result<OffsetDateTime>) -> Option<String> {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    time.and_then(|t| {
        t.format(&format)
            .map_err(|e| crate::error::CertGateError::EncodingError(e.to_string()))
    })
    .map_err(|e| tracing::warn!("unable to format certificate time: {e}"))
    .ok()
}

/// Decimal rendering of a big-endian unsigned integer.
fn decimal(bytes: &[u8]) -> String {
    BigUint::from_bytes_be(bytes).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_serials() {
        assert_eq!(decimal(&[0]), "0");
        assert_eq!(decimal(&[0x10, 0x92]), "4242");
        assert_eq!(
            decimal(&[
                0x33, 0xa6, 0x04, 0x7f, 0xb1, 0x55, 0x63, 0x1f, 0xed, 0x67, 0x21, 0x17, 0x81, 0x50,
                0xa8, 0x99
            ]),
            "68652640310044618358965661752471103641"
        );
    }

    #[test]
    fn names_resolve_case_insensitively_with_legacy_aliases() {
        use CertificateAttribute::*;
        assert_eq!(CertificateAttribute::from_name("SUBJECT"), Some(Name(NameSide::Subject)));
        assert_eq!(
            CertificateAttribute::from_name("issuer.dn.canonical"),
            Some(CanonicalName(NameSide::Issuer))
        );
        assert_eq!(CertificateAttribute::from_name("keyUsage.cRLSign"), Some(KeyUsageBit(6)));
        assert_eq!(CertificateAttribute::from_name("keyusage.crlsign"), Some(KeyUsageBit(6)));
        assert_eq!(
            CertificateAttribute::from_name("extendedKeyUsage"),
            Some(ExtendedKeyUsageValues)
        );
        assert_eq!(
            CertificateAttribute::from_name("subject.dn.3.oid.1.2.3"),
            Some(DnComponents(NameSide::Subject))
        );
        assert_eq!(
            CertificateAttribute::from_name("issuerEmail"),
            Some(DnComponents(NameSide::Issuer))
        );
        assert_eq!(CertificateAttribute::from_name("nonsense"), None);
    }

    #[test]
    fn legacy_names_map_to_component_keys() {
        let attr = CertificateAttribute::DnComponents(NameSide::Issuer);
        assert_eq!(attr.key_for("issuer.cn"), "issuer.dn.cn");
        assert_eq!(attr.key_for("issuerEmail"), "issuer.dn.emailaddress");
        assert_eq!(attr.key_for("issuer.dn.2.o"), "issuer.dn.2.o");
        assert_eq!(attr.key_for("issuer.dn"), "issuer.dn");
    }

    #[test]
    fn every_attribute_name_round_trips() {
        for attribute in CertificateAttribute::all() {
            assert_eq!(CertificateAttribute::from_name(&attribute.name()), Some(attribute));
        }
    }

    #[test]
    fn escaping_special_characters() {
        assert_eq!(escape("a,b"), "a\\,b");
        assert_eq!(escape("#x"), "\\#x");
        assert_eq!(escape(" x "), "\\ x\\ ");
    }
}
