use std::fmt;
use std::str::FromStr;

use crate::error::CertGateError;

/// A cryptographic operation gated by key usage policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyUsageActivity {
    SignXml,
    VerifyXml,
    EncryptXml,
    DecryptXml,
    SslServerRemote,
    SslClientRemote,
    VerifyClientCert,
    VerifyCrl,
}

impl KeyUsageActivity {
    pub const ALL: [KeyUsageActivity; 8] = [
        KeyUsageActivity::SignXml,
        KeyUsageActivity::VerifyXml,
        KeyUsageActivity::EncryptXml,
        KeyUsageActivity::DecryptXml,
        KeyUsageActivity::SslServerRemote,
        KeyUsageActivity::SslClientRemote,
        KeyUsageActivity::VerifyClientCert,
        KeyUsageActivity::VerifyCrl,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            KeyUsageActivity::SignXml => "signXml",
            KeyUsageActivity::VerifyXml => "verifyXml",
            KeyUsageActivity::EncryptXml => "encryptXml",
            KeyUsageActivity::DecryptXml => "decryptXml",
            KeyUsageActivity::SslServerRemote => "sslServerRemote",
            KeyUsageActivity::SslClientRemote => "sslClientRemote",
            KeyUsageActivity::VerifyClientCert => "verifyClientCert",
            KeyUsageActivity::VerifyCrl => "verifyCrl",
        }
    }
}

impl fmt::Display for KeyUsageActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyUsageActivity {
    type Err = CertGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|activity| activity.name() == s)
            .ok_or_else(|| CertGateError::PolicyParseError(format!("unknown activity '{s}'")))
    }
}
