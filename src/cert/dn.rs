//! Distinguished name string helpers: attribute maps, wildcard matching and
//! validation, plus CSR unwrapping.

use std::collections::BTreeMap;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use der::Encode;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::RdnSequence;

use super::params::directory_string;
use crate::error::{CertGateError, Result};
use crate::oid;

const CSR_PEM_TAGS: &[&str] = &["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];

/// Matches any value of an attribute in [`dn_matches_pattern`].
pub const WILDCARD: &str = "*";

fn parse(dn: &str) -> Result<RdnSequence> {
    RdnSequence::from_str(dn)
        .map_err(|e| CertGateError::InvalidInput(format!("malformed DN {dn:?}: {e}")))
}

/// Attribute components in the order they were written.
fn components(rdns: &RdnSequence) -> impl Iterator<Item = &AttributeTypeAndValue> {
    rdns.0.iter().rev().flat_map(|rdn| rdn.0.iter())
}

fn type_name(atv: &AttributeTypeAndValue) -> String {
    oid::dn_attribute_name(&atv.oid)
        .map(str::to_string)
        .unwrap_or_else(|| atv.oid.to_string())
}

fn value_text(atv: &AttributeTypeAndValue) -> String {
    directory_string(&atv.value).unwrap_or_else(|| match atv.value.to_der() {
        Ok(der) => format!("#{}", hex::encode(der)),
        Err(_) => String::new(),
    })
}

/// Splits a DN string into its attribute types and their values.
///
/// Types are keyed by their upper-case short name (`CN`, `O`, `ST`, ...) or by
/// dotted OID when there is none. Repeated types keep every value in DN order.
pub fn dn_to_attribute_map(dn: &str) -> Result<BTreeMap<String, Vec<String>>> {
    let rdns = parse(dn)?;
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for atv in components(&rdns) {
        map.entry(type_name(atv)).or_default().push(value_text(atv));
    }
    Ok(map)
}

/// Whether `dn` carries every attribute in `pattern`.
///
/// A pattern value of `*` only requires the attribute type to be present.
/// Attribute order is ignored. A DN that does not parse never matches; a
/// pattern that does not parse is an error.
pub fn dn_matches_pattern(dn: &str, pattern: &str) -> Result<bool> {
    let wanted = dn_to_attribute_map(pattern)?;
    let Ok(actual) = dn_to_attribute_map(dn) else {
        tracing::debug!(dn, "DN does not parse, treating as no match");
        return Ok(false);
    };
    Ok(wanted.iter().all(|(name, values)| {
        actual.get(name).is_some_and(|present| {
            values
                .iter()
                .all(|value| value == WILDCARD || present.contains(value))
        })
    }))
}

/// Describes what is wrong with `dn`, or `None` when every component is a
/// recognized attribute type.
pub fn dn_validation_message(dn: &str) -> Option<String> {
    let rdns = match parse(dn) {
        Ok(rdns) => rdns,
        Err(e) => return Some(e.to_string()),
    };
    let unrecognized: Vec<String> = components(&rdns)
        .filter(|atv| oid::dn_attribute_name(&atv.oid).is_none())
        .map(ToString::to_string)
        .collect();
    if unrecognized.is_empty() {
        None
    } else {
        Some(format!(
            "Unrecognized DN components: {}",
            unrecognized.join(", ")
        ))
    }
}

pub fn is_valid_dn(dn: &str) -> bool {
    dn_validation_message(dn).is_none()
}

/// Unwraps a certificate signing request to DER.
///
/// Accepts a `CERTIFICATE REQUEST` or `NEW CERTIFICATE REQUEST` PEM block, or
/// the bare base64 body of one.
pub fn csr_pem_to_der(bytes: &[u8]) -> Result<Vec<u8>> {
    if let Ok(block) = pem::parse(bytes) {
        if CSR_PEM_TAGS.contains(&block.tag()) {
            return Ok(block.into_contents());
        }
        return Err(CertGateError::DecodingError(format!(
            "expected a CERTIFICATE REQUEST PEM block, found {}",
            block.tag()
        )));
    }
    let body: Vec<u8> = bytes
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    match STANDARD.decode(&body) {
        Ok(der) if !der.is_empty() => Ok(der),
        _ => Err(CertGateError::DecodingError(
            "CSR does not appear to be PEM encoded".to_string(),
        )),
    }
}
