//! Key pair, CSR, certificate and CRL handling.
//!
//! Uses rcgen to generate keys and CSRs and x509-parser to validate what the
//! CA hands back.

use chrono::{DateTime, Utc};
use rcgen::{
    CertificateParams, DistinguishedName, DnType, Ia5String, KeyPair, RsaKeySize, SanType,
    PKCS_RSA_SHA256,
};
use x509_parser::prelude::*;
use x509_parser::revocation_list::CertificateRevocationList;

use certboot_core::EnrollError;

const CERTIFICATE_TAG: &str = "CERTIFICATE";
const CRL_TAG: &str = "X509 CRL";

/// Generate the host's RSA 4096 key pair.
pub fn generate_key_pair() -> Result<KeyPair, EnrollError> {
    KeyPair::generate_rsa_for(&PKCS_RSA_SHA256, RsaKeySize::_4096)
        .map_err(|e| EnrollError::KeyGeneration(e.to_string()))
}

/// Build a PEM-encoded CSR with subject `CN=<certname>`.
///
/// When `dns_alt_names` is non-empty the request carries a subjectAltName
/// extension listing them as DNS names in the given order.
pub fn build_csr(
    key_pair: &KeyPair,
    certname: &str,
    dns_alt_names: &[String],
) -> Result<String, EnrollError> {
    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, certname);
    params.distinguished_name = dn;

    params.subject_alt_names = dns_alt_names
        .iter()
        .map(|name| {
            Ia5String::try_from(name.as_str())
                .map(SanType::DnsName)
                .map_err(|e| {
                    EnrollError::Configuration(format!("invalid DNS alt name '{}': {}", name, e))
                })
        })
        .collect::<Result<_, _>>()?;

    params
        .serialize_request(key_pair)
        .and_then(|csr| csr.pem())
        .map_err(|e| EnrollError::KeyGeneration(format!("failed to build CSR: {}", e)))
}

/// The subjectPublicKey bits of a key pair, for matching against a
/// certificate's [`CertificateInfo::public_key`].
pub fn public_key_bits(key_pair: &KeyPair) -> Vec<u8> {
    key_pair.public_key_raw().to_vec()
}

/// Summary of a parsed certificate.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_after: Option<DateTime<Utc>>,
    /// subjectPublicKey bits.
    pub public_key: Vec<u8>,
    /// DER encoding, for installing as a trust root.
    pub der: Vec<u8>,
}

/// Summary of a parsed revocation list.
#[derive(Debug, Clone)]
pub struct CrlInfo {
    pub issuer: String,
    pub last_update: Option<DateTime<Utc>>,
    pub revoked: usize,
}

/// Parse every certificate in a PEM bundle.
///
/// Each block must be a certificate with a readable subject and issuer, and
/// the bundle must hold at least one.
pub fn parse_certificates(pem_text: &str) -> Result<Vec<CertificateInfo>, String> {
    let blocks = ::pem::parse_many(pem_text).map_err(|e| format!("invalid PEM: {}", e))?;
    if blocks.is_empty() {
        return Err("no PEM certificate found".to_string());
    }

    blocks
        .iter()
        .map(|block| {
            if block.tag() != CERTIFICATE_TAG {
                return Err(format!("unexpected PEM block '{}'", block.tag()));
            }
            let (_, cert) = X509Certificate::from_der(block.contents())
                .map_err(|e| format!("failed to parse certificate: {:?}", e))?;

            let subject = cert.subject().to_string();
            let issuer = cert.issuer().to_string();
            if subject.is_empty() || issuer.is_empty() {
                return Err("certificate has an empty subject or issuer".to_string());
            }

            Ok(CertificateInfo {
                subject,
                issuer,
                serial: cert.raw_serial_as_string(),
                not_after: DateTime::<Utc>::from_timestamp(cert.validity().not_after.timestamp(), 0),
                public_key: cert.public_key().subject_public_key.data.to_vec(),
                der: block.contents().to_vec(),
            })
        })
        .collect()
}

/// Parse every CRL in a PEM bundle. The bundle must hold at least one.
pub fn parse_crls(pem_text: &str) -> Result<Vec<CrlInfo>, String> {
    let blocks = ::pem::parse_many(pem_text).map_err(|e| format!("invalid PEM: {}", e))?;
    if blocks.is_empty() {
        return Err("no PEM CRL found".to_string());
    }

    blocks
        .iter()
        .map(|block| {
            if block.tag() != CRL_TAG {
                return Err(format!("unexpected PEM block '{}'", block.tag()));
            }
            let (_, crl) = CertificateRevocationList::from_der(block.contents())
                .map_err(|e| format!("failed to parse CRL: {:?}", e))?;

            Ok(CrlInfo {
                issuer: crl.issuer().to_string(),
                last_update: DateTime::<Utc>::from_timestamp(crl.last_update().timestamp(), 0),
                revoked: crl.iter_revoked_certificates().count(),
            })
        })
        .collect()
}
