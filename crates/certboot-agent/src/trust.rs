//! Trust bootstrap: CA certificate and CRL.
//!
//! The CA certificate is downloaded without verifying the server, because no
//! anchor exists yet to verify it against. This trust-on-first-use exception
//! covers that single request; the CRL and everything after it are verified
//! against the certificate fetched here.

use tracing::{info, warn};

use certboot_core::{EnrollError, SslLayout};

use crate::artifacts::{self, PUBLIC_MODE};
use crate::client::CaApi;
use crate::pki::{self, CertificateInfo, CrlInfo};

/// CA certificates and revocation lists established for one run.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    pub ca_certificates: Vec<CertificateInfo>,
    pub crls: Vec<CrlInfo>,
}

/// Fetch the CA certificate and CRL, persist both, and switch `ca` over to
/// verified transport.
pub async fn bootstrap_trust<C>(ca: &mut C, layout: &SslLayout) -> Result<TrustAnchor, EnrollError>
where
    C: CaApi + ?Sized,
{
    let ca_certificates = fetch_ca_certificate(&*ca, layout).await?;

    let roots: Vec<Vec<u8>> = ca_certificates.iter().map(|c| c.der.clone()).collect();
    ca.install_trust(&roots)
        .map_err(|e| EnrollError::TrustBootstrap(e.to_string()))?;

    let crls = fetch_crl(&*ca, layout).await?;

    Ok(TrustAnchor {
        ca_certificates,
        crls,
    })
}

/// Download the CA certificate (unverified), write it to `certs/ca.pem`, and
/// validate the written file.
pub async fn fetch_ca_certificate<C>(
    ca: &C,
    layout: &SslLayout,
) -> Result<Vec<CertificateInfo>, EnrollError>
where
    C: CaApi + ?Sized,
{
    warn!("Fetching CA certificate without TLS verification (trust on first use)");

    let response = ca
        .fetch_ca_certificate()
        .await
        .map_err(|e| EnrollError::TrustBootstrap(format!("CA certificate download: {}", e)))?;
    if !response.is_success() {
        return Err(EnrollError::TrustBootstrap(format!(
            "CA certificate download returned HTTP {}",
            response.status
        )));
    }

    let path = layout.ca_certificate();
    artifacts::write_replace(&path, &response.body, PUBLIC_MODE)?;

    let written = artifacts::read(&path)?;
    let certs = pki::parse_certificates(&written).map_err(|reason| {
        EnrollError::TrustBootstrap(format!("{} is not a valid CA certificate: {}", path.display(), reason))
    })?;

    for cert in &certs {
        info!(
            subject = %cert.subject,
            issuer = %cert.issuer,
            path = %path.display(),
            "CA certificate stored"
        );
    }
    Ok(certs)
}

/// Download the CRL over verified transport, write it to `crl.pem`, and
/// validate it.
pub async fn fetch_crl<C>(ca: &C, layout: &SslLayout) -> Result<Vec<CrlInfo>, EnrollError>
where
    C: CaApi + ?Sized,
{
    let response = ca
        .fetch_crl()
        .await
        .map_err(|e| EnrollError::TrustBootstrap(format!("CRL download: {}", e)))?;
    if !response.is_success() {
        return Err(EnrollError::TrustBootstrap(format!(
            "CRL download returned HTTP {}",
            response.status
        )));
    }

    let crls = pki::parse_crls(&response.body)
        .map_err(|reason| EnrollError::TrustBootstrap(format!("invalid CRL: {}", reason)))?;

    let path = layout.crl();
    artifacts::write_replace(&path, &response.body, PUBLIC_MODE)?;

    for crl in &crls {
        info!(
            issuer = %crl.issuer,
            revoked = crl.revoked,
            path = %path.display(),
            "CRL stored"
        );
    }
    Ok(crls)
}
