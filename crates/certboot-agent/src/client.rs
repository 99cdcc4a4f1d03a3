//! HTTP client for the CA's v1 API.
//!
//! | Operation           | Method | Path                                 |
//! |---------------------|--------|--------------------------------------|
//! | Fetch CA cert       | GET    | `/certificate/ca`                    |
//! | Fetch CRL           | GET    | `/certificate_revocation_list/ca`    |
//! | Fetch signed cert   | GET    | `/certificate/<name>`                |
//! | Submit CSR          | PUT    | `/certificate_request/<name>`        |
//!
//! The CA certificate is fetched before any trust anchor exists, so that one
//! request skips TLS verification (trust on first use). Every later request
//! verifies the CA against the anchor installed with [`CaApi::install_trust`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client, Method};
use tracing::debug;

use certboot_core::{EnrollmentConfig, RetryPolicy};

use crate::error::TransportError;
use crate::retry::retry_if;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Status and body of a CA response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaResponse {
    pub status: u16,
    pub body: String,
}

impl CaResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Operations the enrollment needs from a CA.
#[async_trait]
pub trait CaApi: Send + Sync {
    /// Fetch the CA certificate bundle without verifying the server.
    async fn fetch_ca_certificate(&self) -> Result<CaResponse, TransportError>;

    /// Verify every later request against these DER-encoded CA certificates.
    fn install_trust(&mut self, ca_certs_der: &[Vec<u8>]) -> Result<(), TransportError>;

    /// Fetch the CA's revocation list.
    async fn fetch_crl(&self) -> Result<CaResponse, TransportError>;

    /// Fetch the signed certificate for a name, if any.
    async fn fetch_certificate(&self, certname: &str) -> Result<CaResponse, TransportError>;

    /// Submit a PEM-encoded CSR for a name.
    async fn submit_csr(&self, certname: &str, csr_pem: &str)
        -> Result<CaResponse, TransportError>;
}

/// [`CaApi`] over HTTPS with reqwest.
pub struct HttpCaClient {
    base_url: String,
    retry: RetryPolicy,
    bootstrap: Client,
    verified: Option<Client>,
}

impl HttpCaClient {
    /// Create a client for the CA named in the configuration.
    pub fn new(config: &EnrollmentConfig) -> Result<Self, TransportError> {
        Self::with_base_url(&config.ca_base_url(), config.retry)
    }

    /// Create a client for an explicit base URL.
    pub fn with_base_url(base_url: &str, retry: RetryPolicy) -> Result<Self, TransportError> {
        // Trust on first use: no anchor exists yet, so this client is only
        // ever used for the CA certificate download.
        let bootstrap = base_builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| TransportError::Tls(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
            bootstrap,
            verified: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn verified(&self) -> Result<&Client, TransportError> {
        self.verified.as_ref().ok_or(TransportError::Untrusted)
    }

    /// Send a request, retrying the failures `retryable` accepts.
    async fn send_with_retry(
        &self,
        client: &Client,
        method: Method,
        url: &str,
        body: Option<&str>,
        retryable: fn(&TransportError) -> bool,
    ) -> Result<CaResponse, TransportError> {
        retry_if(&self.retry, url, retryable, || {
            send_once(client, method.clone(), url, body)
        })
        .await
    }
}

#[async_trait]
impl CaApi for HttpCaClient {
    async fn fetch_ca_certificate(&self) -> Result<CaResponse, TransportError> {
        let url = self.url("/certificate/ca");
        self.send_with_retry(&self.bootstrap, Method::GET, &url, None, TransportError::is_transient)
            .await
    }

    fn install_trust(&mut self, ca_certs_der: &[Vec<u8>]) -> Result<(), TransportError> {
        let mut builder = base_builder().tls_built_in_root_certs(false);
        for der in ca_certs_der {
            let cert = Certificate::from_der(der).map_err(|e| TransportError::Tls(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        self.verified = Some(client);
        Ok(())
    }

    async fn fetch_crl(&self) -> Result<CaResponse, TransportError> {
        let url = self.url("/certificate_revocation_list/ca");
        self.send_with_retry(self.verified()?, Method::GET, &url, None, TransportError::is_transient)
            .await
    }

    async fn fetch_certificate(&self, certname: &str) -> Result<CaResponse, TransportError> {
        let url = self.url(&format!("/certificate/{}", certname));
        self.send_with_retry(self.verified()?, Method::GET, &url, None, TransportError::is_transient)
            .await
    }

    async fn submit_csr(
        &self,
        certname: &str,
        csr_pem: &str,
    ) -> Result<CaResponse, TransportError> {
        let url = self.url(&format!("/certificate_request/{}", certname));
        // A PUT that timed out may already be queued on the CA; resending it
        // would come back as a duplicate request.
        self.send_with_retry(
            self.verified()?,
            Method::PUT,
            &url,
            Some(csr_pem),
            TransportError::is_connect_failure,
        )
        .await
    }
}

fn base_builder() -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
}

async fn send_once(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<&str>,
) -> Result<CaResponse, TransportError> {
    debug!(method = %method, url = %url, "CA request");

    let mut request = client
        .request(method, url)
        .header(reqwest::header::ACCEPT, "text/plain");
    if let Some(body) = body {
        request = request
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body.to_string());
    }

    let response = request
        .send()
        .await
        .map_err(|e| TransportError::from_reqwest(url, e))?;
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| TransportError::from_reqwest(url, e))?;

    debug!(url = %url, status, bytes = body.len(), "CA response");
    Ok(CaResponse { status, body })
}
