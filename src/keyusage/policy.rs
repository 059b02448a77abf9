use std::collections::{HashMap, HashSet};
use std::io::Read;

use const_oid::ObjectIdentifier;
use serde::{Deserialize, Serialize};

use super::KeyUsageActivity;
use crate::cert::extensions::{FlagSet, KeyUsages};
use crate::error::{CertGateError, Result};
use crate::oid;

const DEFAULT_POLICY: &str = include_str!("default_policy.json");

/// Key usage bit names accepted as requirement tokens.
const KEY_USAGE_TOKENS: [(&str, KeyUsages); 9] = [
    ("digitalSignature", KeyUsages::DigitalSignature),
    ("nonRepudiation", KeyUsages::NonRepudiation),
    ("keyEncipherment", KeyUsages::KeyEncipherment),
    ("dataEncipherment", KeyUsages::DataEncipherment),
    ("keyAgreement", KeyUsages::KeyAgreement),
    ("keyCertSign", KeyUsages::KeyCertSign),
    ("cRLSign", KeyUsages::CRLSign),
    ("encipherOnly", KeyUsages::EncipherOnly),
    ("decipherOnly", KeyUsages::DecipherOnly),
];

/// Serialized form of a policy: an ordered list of permits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyUsagePolicyDeclaration {
    #[serde(default)]
    pub permits: Vec<PermitDeclaration>,
}

/// One permit as written: an optional activity and its requirement tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitDeclaration {
    /// Activity name; absent means every activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Key usage bit names, well-known purpose names or dotted OIDs.
    #[serde(default)]
    pub requirements: Vec<String>,
}

/// A single requirement token after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    KeyUsage(KeyUsages),
    KeyPurpose(ObjectIdentifier),
}

impl Requirement {
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if let Some((_, bit)) = KEY_USAGE_TOKENS.iter().find(|(name, _)| *name == token) {
            return Ok(Requirement::KeyUsage(*bit));
        }
        if let Some(purpose) = oid::extended_key_usage_by_name(token) {
            return Ok(Requirement::KeyPurpose(purpose));
        }
        if token.starts_with(|c: char| c.is_ascii_digit()) {
            return ObjectIdentifier::new(token)
                .map(Requirement::KeyPurpose)
                .map_err(|e| CertGateError::PolicyParseError(format!("bad OID '{token}': {e}")));
        }
        Err(CertGateError::PolicyParseError(format!(
            "unrecognized requirement '{token}'"
        )))
    }
}

/// A parsed permit: which activity it covers and what the certificate must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitRule {
    activity: Option<KeyUsageActivity>,
    key_usage: FlagSet<KeyUsages>,
    key_purposes: Vec<ObjectIdentifier>,
}

impl PermitRule {
    pub fn new(
        activity: Option<KeyUsageActivity>,
        key_usage: FlagSet<KeyUsages>,
        key_purposes: Vec<ObjectIdentifier>,
    ) -> Self {
        Self {
            activity,
            key_usage,
            key_purposes,
        }
    }

    fn from_declaration(permit: &PermitDeclaration) -> Result<Self> {
        let activity = permit
            .action
            .as_deref()
            .map(str::parse::<KeyUsageActivity>)
            .transpose()?;
        let mut key_usage = FlagSet::<KeyUsages>::default();
        let mut key_purposes = Vec::new();
        for token in &permit.requirements {
            match Requirement::parse(token)? {
                Requirement::KeyUsage(bit) => key_usage |= bit,
                Requirement::KeyPurpose(purpose) => key_purposes.push(purpose),
            }
        }
        Ok(Self::new(activity, key_usage, key_purposes))
    }

    /// The activity this rule covers, or `None` for every activity.
    pub fn activity(&self) -> Option<KeyUsageActivity> {
        self.activity
    }

    pub fn required_key_usage(&self) -> FlagSet<KeyUsages> {
        self.key_usage
    }

    pub fn required_key_purposes(&self) -> &[ObjectIdentifier] {
        &self.key_purposes
    }

    pub fn is_blanket(&self) -> bool {
        self.key_usage.is_empty() && self.key_purposes.is_empty()
    }

    pub fn is_allow_any_key_purpose(&self) -> bool {
        self.key_purposes.is_empty()
    }

    pub fn is_key_usage(&self) -> bool {
        !self.key_usage.is_empty()
    }

    fn permits_key_usage(&self, bits: FlagSet<KeyUsages>) -> bool {
        bits.contains(self.key_usage)
    }

    fn permits_key_purposes(&self, purposes: &[ObjectIdentifier]) -> bool {
        self.is_allow_any_key_purpose()
            || self
                .key_purposes
                .iter()
                .all(|required| purposes.contains(required))
    }
}

/// Which certificate key usages and purposes permit which activities.
///
/// Rules are filed once, at parse time, into exactly one of three buckets:
/// blanket permits (no requirements), key usage rules (any key usage bit
/// required; purpose requirements on such a rule are not consulted), and
/// extended key usage rules. A rule without an activity is filed under
/// every activity. Any one matching rule permits the activity.
#[derive(Debug, Clone)]
pub struct KeyUsagePolicy {
    blanket_permits: HashSet<KeyUsageActivity>,
    key_usage_permits: HashMap<KeyUsageActivity, Vec<PermitRule>>,
    extended_key_usage_permits: HashMap<KeyUsageActivity, Vec<PermitRule>>,
    declaration: KeyUsagePolicyDeclaration,
}

impl KeyUsagePolicy {
    pub fn from_declaration(declaration: &KeyUsagePolicyDeclaration) -> Result<Self> {
        let mut blanket_permits = HashSet::new();
        let mut key_usage_permits: HashMap<KeyUsageActivity, Vec<PermitRule>> = HashMap::new();
        let mut extended_key_usage_permits: HashMap<KeyUsageActivity, Vec<PermitRule>> =
            HashMap::new();

        for permit in &declaration.permits {
            let rule = PermitRule::from_declaration(permit)?;
            let activities = match rule.activity {
                Some(activity) => vec![activity],
                None => KeyUsageActivity::ALL.to_vec(),
            };
            for activity in activities {
                if rule.is_blanket() {
                    blanket_permits.insert(activity);
                } else if rule.is_key_usage() {
                    key_usage_permits
                        .entry(activity)
                        .or_default()
                        .push(rule.clone());
                } else {
                    extended_key_usage_permits
                        .entry(activity)
                        .or_default()
                        .push(rule.clone());
                }
            }
        }

        tracing::trace!(
            "parsed key usage policy with {} permits",
            declaration.permits.len()
        );
        Ok(Self {
            blanket_permits,
            key_usage_permits,
            extended_key_usage_permits,
            declaration: declaration.clone(),
        })
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        let declaration: KeyUsagePolicyDeclaration = serde_json::from_str(source)?;
        Self::from_declaration(&declaration)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let declaration: KeyUsagePolicyDeclaration = serde_json::from_reader(reader)?;
        Self::from_declaration(&declaration)
    }

    /// The policy built into the crate.
    pub fn default_policy() -> Result<Self> {
        Self::from_json_str(DEFAULT_POLICY)
    }

    /// The declaration this policy was parsed from.
    pub fn declaration(&self) -> &KeyUsagePolicyDeclaration {
        &self.declaration
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.declaration)
            .map_err(|e| CertGateError::EncodingError(e.to_string()))
    }

    pub fn is_blanket_permitted(&self, activity: KeyUsageActivity) -> bool {
        self.blanket_permits.contains(&activity)
    }

    /// True if a certificate with key usage `bits` may be used for `activity`.
    pub fn is_key_usage_permitted_for_activity(
        &self,
        activity: KeyUsageActivity,
        bits: FlagSet<KeyUsages>,
    ) -> bool {
        self.is_blanket_permitted(activity)
            || self
                .key_usage_permits
                .get(&activity)
                .is_some_and(|rules| rules.iter().any(|rule| rule.permits_key_usage(bits)))
    }

    /// True if a certificate with key purposes `purposes` may be used for `activity`.
    pub fn is_extended_key_usage_permitted_for_activity(
        &self,
        activity: KeyUsageActivity,
        purposes: &[ObjectIdentifier],
    ) -> bool {
        self.is_blanket_permitted(activity)
            || self
                .extended_key_usage_permits
                .get(&activity)
                .is_some_and(|rules| rules.iter().any(|rule| rule.permits_key_purposes(purposes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(json: &str) -> KeyUsagePolicy {
        KeyUsagePolicy::from_json_str(json).unwrap()
    }

    #[test]
    fn default_policy_parses() {
        let policy = KeyUsagePolicy::default_policy().unwrap();
        assert!(policy.is_key_usage_permitted_for_activity(
            KeyUsageActivity::VerifyClientCert,
            KeyUsages::KeyCertSign.into()
        ));
        assert!(!policy.is_key_usage_permitted_for_activity(
            KeyUsageActivity::VerifyClientCert,
            KeyUsages::DigitalSignature.into()
        ));
    }

    #[test]
    fn required_bits_must_be_a_subset() {
        let policy = policy(
            r#"{"permits":[{"action":"sslServerRemote","requirements":["keyEncipherment","digitalSignature"]}]}"#,
        );
        let both = KeyUsages::KeyEncipherment | KeyUsages::DigitalSignature;
        assert!(policy.is_key_usage_permitted_for_activity(KeyUsageActivity::SslServerRemote, both));
        assert!(policy.is_key_usage_permitted_for_activity(
            KeyUsageActivity::SslServerRemote,
            both | KeyUsages::DataEncipherment
        ));
        assert!(!policy.is_key_usage_permitted_for_activity(
            KeyUsageActivity::SslServerRemote,
            KeyUsages::KeyEncipherment.into()
        ));
        assert!(!policy.is_key_usage_permitted_for_activity(KeyUsageActivity::SignXml, both));
    }

    #[test]
    fn rules_combine_with_or_in_any_order() {
        let forward = policy(
            r#"{"permits":[
                {"action":"signXml","requirements":["digitalSignature"]},
                {"action":"signXml","requirements":["nonRepudiation"]}]}"#,
        );
        let backward = policy(
            r#"{"permits":[
                {"action":"signXml","requirements":["nonRepudiation"]},
                {"action":"signXml","requirements":["digitalSignature"]}]}"#,
        );
        for bits in [
            FlagSet::from(KeyUsages::DigitalSignature),
            FlagSet::from(KeyUsages::NonRepudiation),
            FlagSet::from(KeyUsages::KeyAgreement),
        ] {
            assert_eq!(
                forward.is_key_usage_permitted_for_activity(KeyUsageActivity::SignXml, bits),
                backward.is_key_usage_permitted_for_activity(KeyUsageActivity::SignXml, bits)
            );
        }
        assert!(forward.is_key_usage_permitted_for_activity(
            KeyUsageActivity::SignXml,
            KeyUsages::NonRepudiation.into()
        ));
    }

    #[test]
    fn wildcard_blanket_permits_every_activity() {
        let policy = policy(r#"{"permits":[{"requirements":[]}]}"#);
        for activity in KeyUsageActivity::ALL {
            assert!(policy.is_blanket_permitted(activity));
            assert!(policy.is_key_usage_permitted_for_activity(activity, FlagSet::default()));
            assert!(policy.is_extended_key_usage_permitted_for_activity(activity, &[]));
        }
    }

    #[test]
    fn purpose_rules() {
        let policy = policy(
            r#"{"permits":[
                {"action":"sslClientRemote","requirements":["id-kp-clientAuth","1.3.6.1.4.1.99999.7"]},
                {"action":"verifyCrl","requirements":["anyExtendedKeyUsage"]}]}"#,
        );
        let private = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.7");
        assert!(policy.is_extended_key_usage_permitted_for_activity(
            KeyUsageActivity::SslClientRemote,
            &[oid::KP_SERVER_AUTH, oid::KP_CLIENT_AUTH, private]
        ));
        assert!(!policy.is_extended_key_usage_permitted_for_activity(
            KeyUsageActivity::SslClientRemote,
            &[oid::KP_CLIENT_AUTH]
        ));
        assert!(!policy.is_extended_key_usage_permitted_for_activity(
            KeyUsageActivity::VerifyCrl,
            &[oid::KP_CLIENT_AUTH]
        ));
        assert!(policy.is_extended_key_usage_permitted_for_activity(
            KeyUsageActivity::VerifyCrl,
            &[oid::ANY_EXTENDED_KEY_USAGE]
        ));
    }

    #[test]
    fn mixed_rule_is_filed_as_key_usage_only() {
        let policy = policy(
            r#"{"permits":[{"action":"signXml","requirements":["digitalSignature","id-kp-codeSigning"]}]}"#,
        );
        assert!(policy.is_key_usage_permitted_for_activity(
            KeyUsageActivity::SignXml,
            KeyUsages::DigitalSignature.into()
        ));
        assert!(!policy.is_extended_key_usage_permitted_for_activity(
            KeyUsageActivity::SignXml,
            &[oid::KP_CODE_SIGNING]
        ));
    }

    #[test]
    fn key_usage_only_rule_does_not_count_as_any_purpose() {
        let policy = policy(r#"{"permits":[{"requirements":["keyCertSign"]}]}"#);
        assert!(!policy.is_extended_key_usage_permitted_for_activity(
            KeyUsageActivity::VerifyClientCert,
            &[oid::KP_SERVER_AUTH]
        ));
    }

    #[test]
    fn malformed_declarations_are_rejected() {
        for json in [
            r#"{"permits":[{"action":"fly","requirements":[]}]}"#,
            r#"{"permits":[{"requirements":["digitalsignature"]}]}"#,
            r#"{"permits":[{"requirements":["1.2.x"]}]}"#,
            r#"{"permits":[{"requirements":["3.1.2"]}]}"#,
            r#"{"permits":[{"requirements":["serverAuth"]}]}"#,
            r#"{"permits":"#,
        ] {
            assert!(
                matches!(
                    KeyUsagePolicy::from_json_str(json),
                    Err(CertGateError::PolicyParseError(_))
                ),
                "{json}"
            );
        }
    }

    #[test]
    fn declaration_round_trips_through_json() {
        let policy = KeyUsagePolicy::default_policy().unwrap();
        let json = policy.to_json_string().unwrap();
        let reparsed = KeyUsagePolicy::from_json_str(&json).unwrap();
        assert_eq!(reparsed.declaration(), policy.declaration());
    }

    #[test]
    fn rule_classification() {
        let blanket = PermitRule::new(None, FlagSet::default(), vec![]);
        assert!(blanket.is_blanket());
        assert!(blanket.is_allow_any_key_purpose());
        assert!(!blanket.is_key_usage());

        let purpose = PermitRule::new(
            Some(KeyUsageActivity::SignXml),
            FlagSet::default(),
            vec![oid::KP_CODE_SIGNING],
        );
        assert!(!purpose.is_blanket());
        assert!(!purpose.is_allow_any_key_purpose());
        assert_eq!(purpose.activity(), Some(KeyUsageActivity::SignXml));
        assert_eq!(purpose.required_key_purposes(), &[oid::KP_CODE_SIGNING]);
        assert!(purpose.required_key_usage().is_empty());
    }
}
