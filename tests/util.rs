#![allow(dead_code)]

use certgate::cert::extensions::{ExtendedKeyUsageOption, FlagSet, KeyUsages};
use certgate::cert::params::{CertGenParams, DistinguishedName};
use certgate::cert::{Certificate, CertificateWithPrivateKey};
use certgate::issuer::Issuer;
use certgate::key::KeyPair;

pub fn init_tracing() {
    // It's necessary to specify EnvFilter::from_default_env in order to use RUST_LOG env var.
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_line_number(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_test_writer()
        .try_init();
}

pub fn subject(cn: &str) -> DistinguishedName {
    DistinguishedName::builder()
        .common_name(cn)
        .organization("Example Corp")
        .country("US")
        .build()
}

pub fn generate_ca_cert() -> CertificateWithPrivateKey {
    let ca_key = KeyPair::generate_ecdsa_p256();
    let params = CertGenParams::builder()
        .subject_dn(subject("myca.local"))
        .make_ca_cert(true)
        .include_subject_key_identifier(true)
        .build();
    let cert = Certificate::new_self_signed(&params, &ca_key).unwrap();
    CertificateWithPrivateKey::new(cert, ca_key).unwrap()
}

/// Issues a TLS server certificate with critical key usage and extended key usage.
pub fn issue_server_cert(
    ca: &CertificateWithPrivateKey,
    cn: &str,
    bits: FlagSet<KeyUsages>,
) -> (Certificate, KeyPair) {
    let key = KeyPair::generate_ecdsa_p256();
    let params = CertGenParams::builder()
        .subject_dn(subject(cn))
        .include_key_usage(true)
        .key_usage_bits(bits)
        .include_extended_key_usage(true)
        .extended_key_usage_oids(vec![ExtendedKeyUsageOption::ServerAuth.into()])
        .extended_key_usage_critical(true)
        .include_subject_key_identifier(true)
        .include_authority_key_identifier(true)
        .build();
    let cert = ca.issue(&params, &key.public_key()).unwrap();
    (cert, key)
}
