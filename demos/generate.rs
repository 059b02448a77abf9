use certgate::KeyUsageActivity;
use certgate::cert::extensions::{ExtendedKeyUsageOption, KeyUsages};
use certgate::cert::params::{CertGenParams, DistinguishedName};
use certgate::error::CertGateError;
use certgate::key::params::KeyGenParams;

fn main() -> Result<(), CertGateError> {
    // CA key on the default curve (secp384r1)
    let ca_key = certgate::generate_key_pair(&KeyGenParams::builder().algorithm("EC").build())?;

    let ca_params = CertGenParams::builder()
        .subject_dn(
            DistinguishedName::builder()
                .common_name("My Test CA")
                .organization("Example Corp")
                .country("US")
                .build(),
        )
        .serial_number(1)
        .days_until_expiry(3650)
        .make_ca_cert(true)
        .basic_constraints_path_length(0)
        .include_subject_key_identifier(true)
        .build();
    let ca_cert = certgate::generate_certificate(&ca_params, &ca_key.public_key(), &ca_key, None)?;

    println!("CA Certificate PEM:\n{}", ca_cert.to_pem()?);

    let server_key = certgate::generate_key_pair(&KeyGenParams::default())?;
    let server_params = CertGenParams::builder()
        .subject_dn(DistinguishedName::builder().common_name("myserver.local").build())
        .serial_number(2)
        .days_until_expiry(825)
        .include_key_usage(true)
        .key_usage_bits(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment)
        .include_extended_key_usage(true)
        .extended_key_usage_oids(vec![ExtendedKeyUsageOption::ServerAuth.into()])
        .include_subject_key_identifier(true)
        .include_authority_key_identifier(true)
        .build();
    let server_cert = certgate::generate_certificate(
        &server_params,
        &server_key.public_key(),
        &ca_key,
        Some(&ca_cert),
    )?;

    println!("Server Certificate PEM:\n{}", server_cert.to_pem()?);

    certgate::verify_chain(&[server_cert.clone(), ca_cert.clone()], &ca_cert)?;
    println!("Chain verified up to {}", ca_cert.subject_name());

    for activity in [
        KeyUsageActivity::SslServerRemote,
        KeyUsageActivity::SslClientRemote,
        KeyUsageActivity::VerifyClientCert,
    ] {
        println!(
            "{activity}: {}",
            if certgate::check_activity(activity, Some(&server_cert)) {
                "permitted"
            } else {
                "denied"
            }
        );
    }

    Ok(())
}
