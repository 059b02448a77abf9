//! Process-wide settings: key usage enforcement, signature defaults and the
//! verification cache.
//!
//! ```
//! use certgate::config::Config;
//!
//! let config = Config::from_json_str(r#"{"enforcement_mode": "IGNORE"}"#).unwrap();
//! assert!(!config.build_checker().unwrap().is_enforcing());
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::cert::generator::set_prefer_legacy_signature;
use crate::error::{CertGateError, Result};
use crate::keyusage::{KeyUsageChecker, KeyUsagePolicy};
use crate::verify::{CertVerifier, DEFAULT_CACHE_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(on(String, into))]
pub struct Config {
    /// `"IGNORE"` (any case) turns key usage enforcement off.
    #[serde(default)]
    pub enforcement_mode: Option<String>,
    /// JSON policy declaration to load instead of the built-in one.
    #[serde(default)]
    #[builder(into)]
    pub policy_file: Option<PathBuf>,
    /// Literal JSON policy declaration; takes precedence over `policy_file`.
    #[serde(default)]
    pub policy_text: Option<String>,
    #[serde(default)]
    #[builder(default)]
    pub prefer_legacy_signature: bool,
    #[serde(default = "default_verify_cache_size")]
    #[builder(default = DEFAULT_CACHE_SIZE)]
    pub verify_cache_size: u64,
}

fn default_verify_cache_size() -> u64 {
    DEFAULT_CACHE_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

impl Config {
    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source)
            .map_err(|e| CertGateError::InvalidInput(format!("invalid configuration: {e}")))
    }

    /// Loads the configured policy: `policy_text`, then `policy_file`, then
    /// the built-in policy.
    pub fn load_policy(&self) -> Result<KeyUsagePolicy> {
        if let Some(text) = &self.policy_text {
            return KeyUsagePolicy::from_json_str(text);
        }
        if let Some(path) = &self.policy_file {
            let file = File::open(path).map_err(|e| {
                CertGateError::InvalidInput(format!(
                    "unable to open policy file {}: {e}",
                    path.display()
                ))
            })?;
            tracing::debug!("loading key usage policy from {}", path.display());
            return KeyUsagePolicy::from_reader(BufReader::new(file));
        }
        KeyUsagePolicy::default_policy()
    }

    pub fn build_checker(&self) -> Result<KeyUsageChecker> {
        Ok(KeyUsageChecker::new(
            Some(self.load_policy()?),
            self.enforcement_mode.as_deref(),
        ))
    }

    /// Makes this configuration current for the whole process.
    ///
    /// Replaces the default key usage checker and the global verifier, whose
    /// cache starts out empty. Nothing is changed if the policy cannot be
    /// loaded.
    pub fn install(&self) -> Result<()> {
        let checker = self.build_checker()?;
        KeyUsageChecker::set_default(checker);
        set_prefer_legacy_signature(self.prefer_legacy_signature);
        CertVerifier::set_global(CertVerifier::new(self.verify_cache_size));
        tracing::debug!(
            "installed configuration (enforcement mode {:?}, cache size {})",
            self.enforcement_mode,
            self.verify_cache_size
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::KeyUsages;
    use crate::keyusage::KeyUsageActivity;

    #[test]
    fn defaults_from_empty_document() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.verify_cache_size, DEFAULT_CACHE_SIZE);
        assert!(!config.prefer_legacy_signature);
        assert!(config.build_checker().unwrap().is_enforcing());
    }

    #[test]
    fn policy_text_wins_over_file() {
        let config = Config::builder()
            .policy_text(r#"{"permits":[{"action":"verifyCrl","requirements":["keyAgreement"]}]}"#)
            .policy_file("/nonexistent/policy.json")
            .build();
        let policy = config.load_policy().unwrap();
        assert!(policy.is_key_usage_permitted_for_activity(
            KeyUsageActivity::VerifyCrl,
            KeyUsages::KeyAgreement.into()
        ));
        assert!(!policy.is_key_usage_permitted_for_activity(
            KeyUsageActivity::VerifyCrl,
            KeyUsages::CRLSign.into()
        ));
    }

    #[test]
    fn missing_policy_file_is_an_error() {
        let config = Config::builder().policy_file("/nonexistent/policy.json").build();
        assert!(matches!(config.load_policy(), Err(CertGateError::InvalidInput(_))));
    }

    #[test]
    fn policy_file_is_read() {
        let path = std::env::temp_dir().join(format!("certgate-policy-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"permits":[{"requirements":[]}]}"#).unwrap();
        let config = Config::builder().policy_file(path.clone()).build();
        let policy = config.load_policy().unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(policy.is_blanket_permitted(KeyUsageActivity::SignXml));
    }

    #[test]
    fn malformed_config_is_rejected() {
        assert!(matches!(
            Config::from_json_str(r#"{"verify_cache_size": "lots"}"#),
            Err(CertGateError::InvalidInput(_))
        ));
    }
}
