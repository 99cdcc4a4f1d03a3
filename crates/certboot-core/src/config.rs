//! Enrollment configuration.
//!
//! Raw inputs are collected once (by the CLI) into [`ConfigInputs`] and
//! resolved into an immutable [`EnrollmentConfig`]. Nothing here reads the
//! process environment; the local hostname is supplied by the caller.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::EnrollError;
use crate::san::{parse_dns_alt_names, validate_dns_alt_name};

/// Default CA host name.
pub const DEFAULT_CA_HOST: &str = "puppet";

/// Default CA port.
pub const DEFAULT_CA_PORT: u16 = 8140;

/// Default SSL root directory.
pub const DEFAULT_SSL_ROOT: &str = "/etc/puppetlabs/puppet/ssl";

/// Default wait for a signed certificate (seconds).
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 120;

/// Default interval between polls for the signed certificate (seconds).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Unresolved inputs, each optional.
#[derive(Debug, Clone, Default)]
pub struct ConfigInputs {
    /// Explicit certificate name.
    pub certname: Option<String>,
    /// Certificate name from the environment-equivalent source.
    pub certname_env: Option<String>,
    pub ca_host: Option<String>,
    pub ca_port: Option<u16>,
    pub ssl_root: Option<PathBuf>,
    pub wait_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    /// Comma-separated DNS names.
    pub dns_alt_names: Option<String>,
    pub retry: Option<RetryPolicy>,
}

/// Transport retry policy for connection-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

/// Resolved, immutable enrollment configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentConfig {
    /// Certificate name; never empty.
    pub certname: String,
    pub ca_host: String,
    pub ca_port: u16,
    pub ssl_root: PathBuf,
    pub wait_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Ordered DNS alternative names; empty means no SAN extension.
    pub dns_alt_names: Vec<String>,
    pub retry: RetryPolicy,
}

impl EnrollmentConfig {
    /// Resolve inputs into a configuration.
    ///
    /// The certificate name comes from the explicit input, then the
    /// environment-equivalent input, then `hostname()`. Blank candidates fall
    /// through to the next source.
    pub fn resolve<F>(inputs: ConfigInputs, hostname: F) -> Result<Self, EnrollError>
    where
        F: FnOnce() -> Option<String>,
    {
        let certname = first_non_blank(inputs.certname)
            .or_else(|| first_non_blank(inputs.certname_env))
            .or_else(|| first_non_blank(hostname()))
            .ok_or_else(|| {
                EnrollError::Configuration(
                    "certificate name is empty after falling back to the local hostname"
                        .to_string(),
                )
            })?;
        validate_certname(&certname)?;

        let ca_host = first_non_blank(inputs.ca_host).unwrap_or_else(|| DEFAULT_CA_HOST.to_string());

        let poll_interval_secs = inputs
            .poll_interval_secs
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if poll_interval_secs == 0 {
            return Err(EnrollError::Configuration(
                "poll interval must be at least one second".to_string(),
            ));
        }

        let retry = inputs.retry.unwrap_or_default();
        if retry.attempts == 0 {
            return Err(EnrollError::Configuration(
                "retry attempts must be at least one".to_string(),
            ));
        }

        // Rejected here so an unusable name never leaves keys behind.
        let dns_alt_names = parse_dns_alt_names(inputs.dns_alt_names.as_deref().unwrap_or(""));
        for name in &dns_alt_names {
            validate_dns_alt_name(name)?;
        }

        Ok(Self {
            certname,
            ca_host,
            ca_port: inputs.ca_port.unwrap_or(DEFAULT_CA_PORT),
            ssl_root: inputs
                .ssl_root
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SSL_ROOT)),
            wait_timeout_secs: inputs.wait_timeout_secs.unwrap_or(DEFAULT_WAIT_TIMEOUT_SECS),
            poll_interval_secs,
            dns_alt_names,
            retry,
        })
    }

    /// Base URL of the CA's v1 API.
    pub fn ca_base_url(&self) -> String {
        format!("https://{}:{}/puppet-ca/v1", self.ca_host, self.ca_port)
    }

    /// Interval between polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn first_non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Certificate names become file names and URL path segments on the CA.
fn validate_certname(certname: &str) -> Result<(), EnrollError> {
    if certname.chars().any(|c| c == '/' || c.is_whitespace()) {
        return Err(EnrollError::Configuration(format!(
            "certificate name '{}' must not contain '/' or whitespace",
            certname
        )));
    }
    if certname.chars().any(|c| c.is_uppercase()) {
        return Err(EnrollError::Configuration(format!(
            "certificate name '{}' must be lower case",
            certname
        )));
    }
    if certname == "." || certname == ".." {
        return Err(EnrollError::Configuration(format!(
            "certificate name '{}' is not a valid file name",
            certname
        )));
    }
    Ok(())
}
