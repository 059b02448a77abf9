mod util;

use certgate::cert::Certificate;
use certgate::cert::extensions::KeyUsages;
use certgate::cert::params::CertGenParams;
use certgate::issuer::Issuer;
use certgate::key::KeyPair;
use certgate::verify::CertVerifier;
use regex::Regex;
use std::fs;
use std::process::Command;

/// This will run once at load time (i.e. presumably before main function is called).
#[ctor::ctor]
fn overall_init() {
    util::init_tracing();
}

#[test]
fn test_openssl_validate_cert() {
    // Generate a CA certificate and a server certificate signed by it
    let ca_cert_with_key = util::generate_ca_cert();
    let (server_cert, _) = util::issue_server_cert(
        &ca_cert_with_key,
        "server.myca.local",
        KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment,
    );

    let dir = std::env::temp_dir().join(format!("certgate-openssl-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("Failed to create temporary directory");
    let ca_path = dir.join("ca_cert.pem");
    let cert_path = dir.join("server_cert.pem");
    fs::write(&ca_path, ca_cert_with_key.cert.to_pem().unwrap()).expect("Failed to write CA certificate");
    fs::write(&cert_path, server_cert.to_pem().unwrap()).expect("Failed to write server certificate");

    // Use OpenSSL CLI to print the generated certificate
    let output = Command::new("openssl")
        .arg("x509")
        .arg("-in")
        .arg(&cert_path)
        .arg("-noout")
        .arg("-text")
        .output()
        .expect("Failed to execute OpenSSL command");
    assert!(
        output.status.success(),
        "OpenSSL command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let output_text = String::from_utf8_lossy(&output.stdout);

    assert!(output_text.contains("Version: 3 (0x2)"), "Version field is incorrect");
    assert!(
        Regex::new(r"Issuer: .*CN ?= ?myca\.local").unwrap().is_match(&output_text),
        "Issuer field is incorrect"
    );
    assert!(
        Regex::new(r"Subject: .*CN ?= ?server\.myca\.local").unwrap().is_match(&output_text),
        "Subject field is incorrect"
    );
    assert!(
        output_text.contains("Signature Algorithm: ecdsa-with-SHA384"),
        "Signature Algorithm field is incorrect"
    );
    assert!(
        Regex::new(r"X509v3 Key Usage: critical\s+Digital Signature, Key Encipherment")
            .unwrap()
            .is_match(&output_text),
        "Key usage is incorrect"
    );
    assert!(
        Regex::new(r"X509v3 Extended Key Usage: critical\s+TLS Web Server Authentication")
            .unwrap()
            .is_match(&output_text),
        "Extended key usage is incorrect"
    );
    assert!(Regex::new(r"Not Before: .+").unwrap().is_match(&output_text));
    assert!(Regex::new(r"Not After : .+").unwrap().is_match(&output_text));

    // And let OpenSSL verify the chain
    let output = Command::new("openssl")
        .arg("verify")
        .arg("-CAfile")
        .arg(&ca_path)
        .arg(&cert_path)
        .output()
        .expect("Failed to execute OpenSSL command");
    assert!(
        output.status.success(),
        "OpenSSL verify failed: {}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    fs::remove_dir_all(&dir).expect("Failed to remove test certificates");
}

#[test]
fn test_openssl_crate_validate_cert() {
    let ca_cert_with_key = util::generate_ca_cert();
    let server_key = KeyPair::generate_rsa(2048).unwrap();
    let params = CertGenParams::builder()
        .subject_dn(util::subject("server.myca.local"))
        .serial_number(1)
        .include_subject_key_identifier(true)
        .include_authority_key_identifier(true)
        .build();
    let server_cert = ca_cert_with_key.issue(&params, &server_key.public_key()).unwrap();

    use openssl::x509::X509;
    let x509 = X509::from_pem(server_cert.to_pem().unwrap().as_bytes()).expect("Failed to parse PEM");
    let ca_x509 = X509::from_der(ca_cert_with_key.cert.as_der()).expect("Failed to parse DER");

    let common_name = |name: &openssl::x509::X509NameRef| {
        name.entries_by_nid(openssl::nid::Nid::COMMONNAME)
            .next()
            .unwrap()
            .data()
            .as_utf8()
            .unwrap()
            .to_string()
    };
    assert_eq!(common_name(x509.subject_name()), "server.myca.local", "Subject CN mismatch");
    assert_eq!(common_name(x509.issuer_name()), "myca.local", "Issuer CN mismatch");
    assert_eq!(x509.version(), 2, "X509 version should be 3 (0-based index)");

    let serial = x509.serial_number().to_bn().unwrap().to_dec_str().unwrap();
    assert_eq!(serial.to_string(), "1", "Serial number should be 1");

    assert_eq!(
        x509.signature_algorithm().object().nid(),
        openssl::nid::Nid::ECDSA_WITH_SHA384,
        "Signature algorithm should be ecdsa-with-SHA384"
    );

    let ca_public_key = ca_x509.public_key().unwrap();
    assert!(x509.verify(&ca_public_key).unwrap(), "Signature does not verify");
    assert_eq!(
        x509.subject_key_id().unwrap().as_slice(),
        server_cert.subject_key_identifier().unwrap().as_slice()
    );
    assert_eq!(
        x509.authority_key_id().unwrap().as_slice(),
        ca_cert_with_key.cert.subject_key_identifier().unwrap().as_slice()
    );
}

/// Certificates made by OpenSSL decode and verify.
#[test]
fn test_verify_openssl_generated_cert() {
    use openssl::asn1::Asn1Time;
    use openssl::bn::BigNum;
    use openssl::hash::MessageDigest;
    use openssl::pkey::PKey;
    use openssl::rsa::Rsa;
    use openssl::x509::{X509Builder, X509NameBuilder};

    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "openssl root").unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&BigNum::from_u32(7).unwrap().to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    let der = builder.build().to_der().unwrap();

    let cert = Certificate::decode(&der).unwrap();
    assert_eq!(cert.common_names(), vec!["openssl root".to_string()]);
    assert_eq!(cert.serial_number(), &[7]);

    let verifier = CertVerifier::with_checker(
        4,
        certgate::keyusage::KeyUsageCheckerHandle::new(
            certgate::keyusage::KeyUsageChecker::with_default_policy(None),
        ),
    );
    verifier.cached_verify(&cert, &cert, None).unwrap();
    verifier.verify_certificate_chain(&[cert.clone()], &cert).unwrap();
}
