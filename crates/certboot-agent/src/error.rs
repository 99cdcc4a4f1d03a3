//! Transport errors.

use thiserror::Error;

/// Errors talking to the CA over HTTP.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be established (refused, reset, DNS).
    #[error("connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    /// The request timed out after the connection was established. The CA
    /// may already have acted on it.
    #[error("request to {url} timed out: {message}")]
    Timeout { url: String, message: String },

    /// Any other request failure, including TLS verification.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The TLS client could not be configured.
    #[error("TLS configuration failed: {0}")]
    Tls(String),

    /// A verified request was attempted before a trust anchor was installed.
    #[error("no CA trust anchor installed")]
    Untrusted,
}

impl TransportError {
    /// Classify a reqwest error for a URL.
    ///
    /// A connect timeout is reported by reqwest as both a connect and a
    /// timeout error; it is a `Connect` here since nothing reached the CA.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        let message = error_chain(&err);
        if err.is_connect() {
            Self::Connect { url, message }
        } else if err.is_timeout() {
            Self::Timeout { url, message }
        } else {
            Self::Request { url, message }
        }
    }

    /// Returns true for connection-level failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Timeout { .. })
    }

    /// Returns true when the request never reached the CA, so resending a
    /// non-idempotent request is safe.
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }
}

/// reqwest hides the interesting part (refused, certificate unknown) in the
/// source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
