//! Object identifiers used by the generators, the verifier and the policy engine.

use const_oid::ObjectIdentifier;

// Signature algorithms
pub use const_oid::db::rfc5912::{
    ECDSA_WITH_SHA_256 as ECDSA_WITH_SHA256, ECDSA_WITH_SHA_384 as ECDSA_WITH_SHA384,
    ECDSA_WITH_SHA_512 as ECDSA_WITH_SHA512, SHA_1_WITH_RSA_ENCRYPTION as SHA1_WITH_RSA,
    SHA_256_WITH_RSA_ENCRYPTION as SHA256_WITH_RSA, SHA_384_WITH_RSA_ENCRYPTION as SHA384_WITH_RSA,
    SHA_512_WITH_RSA_ENCRYPTION as SHA512_WITH_RSA,
};
/// ecdsa-with-SHA1 (ANSI X9.62), absent from the OID database.
pub const ECDSA_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");

// Public key algorithms and curves
pub use const_oid::db::rfc5912::{
    ID_EC_PUBLIC_KEY as EC_PUBLIC_KEY, RSA_ENCRYPTION, SECP_256_R_1 as SECP256R1,
    SECP_384_R_1 as SECP384R1,
};

// Extended key usage purposes
pub use const_oid::db::rfc5280::{
    ANY_EXTENDED_KEY_USAGE, ID_KP_CLIENT_AUTH as KP_CLIENT_AUTH,
    ID_KP_CODE_SIGNING as KP_CODE_SIGNING, ID_KP_EMAIL_PROTECTION as KP_EMAIL_PROTECTION,
    ID_KP_OCSP_SIGNING as KP_OCSP_SIGNING, ID_KP_SERVER_AUTH as KP_SERVER_AUTH,
    ID_KP_TIME_STAMPING as KP_TIME_STAMPING,
};

// Certificate extensions
pub use const_oid::db::rfc5280::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER as AUTHORITY_KEY_IDENTIFIER,
    ID_CE_BASIC_CONSTRAINTS as BASIC_CONSTRAINTS,
    ID_CE_CERTIFICATE_POLICIES as CERTIFICATE_POLICIES, ID_CE_EXT_KEY_USAGE as EXTENDED_KEY_USAGE,
    ID_CE_ISSUER_ALT_NAME as ISSUER_ALT_NAME, ID_CE_KEY_USAGE as KEY_USAGE,
    ID_CE_SUBJECT_ALT_NAME as SUBJECT_ALT_NAME,
    ID_CE_SUBJECT_DIRECTORY_ATTRIBUTES as SUBJECT_DIRECTORY_ATTRIBUTES,
    ID_CE_SUBJECT_KEY_IDENTIFIER as SUBJECT_KEY_IDENTIFIER,
};

// Directory attributes
pub use const_oid::db::rfc3280::EMAIL_ADDRESS;
pub use const_oid::db::rfc4519::{
    COMMON_NAME, COUNTRY_NAME, DOMAIN_COMPONENT, LOCALITY_NAME, ORGANIZATION_NAME,
    ORGANIZATIONAL_UNIT_NAME, SERIAL_NUMBER, ST as STATE_OR_PROVINCE_NAME,
    STREET as STREET_ADDRESS, USER_ID,
};
/// countryOfCitizenship (RFC 3739), absent from the OID database.
pub const COUNTRY_OF_CITIZENSHIP: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.9.4");

/// Well-known names accepted for extended key usage purposes in policy declarations.
pub const EXTENDED_KEY_USAGE_NAMES: &[(&str, ObjectIdentifier)] = &[
    ("anyExtendedKeyUsage", ANY_EXTENDED_KEY_USAGE),
    ("id-kp-serverAuth", KP_SERVER_AUTH),
    ("id-kp-clientAuth", KP_CLIENT_AUTH),
    ("id-kp-codeSigning", KP_CODE_SIGNING),
    ("id-kp-emailProtection", KP_EMAIL_PROTECTION),
    ("id-kp-timeStamping", KP_TIME_STAMPING),
    ("id-kp-OCSPSigning", KP_OCSP_SIGNING),
];

/// Short names for directory attribute types, as used in DN strings.
pub const DN_ATTRIBUTE_NAMES: &[(&str, ObjectIdentifier)] = &[
    ("CN", COMMON_NAME),
    ("C", COUNTRY_NAME),
    ("L", LOCALITY_NAME),
    ("ST", STATE_OR_PROVINCE_NAME),
    ("STREET", STREET_ADDRESS),
    ("O", ORGANIZATION_NAME),
    ("OU", ORGANIZATIONAL_UNIT_NAME),
    ("DC", DOMAIN_COMPONENT),
    ("UID", USER_ID),
    ("SERIALNUMBER", SERIAL_NUMBER),
    ("EMAILADDRESS", EMAIL_ADDRESS),
];

/// Looks up the short DN name for an attribute type.
pub fn dn_attribute_name(oid: &ObjectIdentifier) -> Option<&'static str> {
    DN_ATTRIBUTE_NAMES
        .iter()
        .find(|(_, candidate)| candidate == oid)
        .map(|(name, _)| *name)
}

/// Looks up a well-known extended key usage name (case-insensitive).
pub fn extended_key_usage_by_name(name: &str) -> Option<ObjectIdentifier> {
    EXTENDED_KEY_USAGE_NAMES
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map(|(_, oid)| *oid)
}
