//! certboot Core Domain Types
//!
//! This crate contains the pure domain of first-time certificate enrollment
//! against a Puppet-style CA, with no dependencies on:
//! - Network/HTTP
//! - Key generation or X.509 parsing
//! - Process environment
//!
//! The agent crate drives these types against a live CA.

pub mod config;
pub mod error;
pub mod layout;
pub mod response;
pub mod san;
pub mod state;

// Re-export commonly used types
pub use config::{ConfigInputs, EnrollmentConfig, RetryPolicy};
pub use error::EnrollError;
pub use layout::SslLayout;
pub use response::{is_certificate_body, SubmissionOutcome, CERTIFICATE_HEADER};
pub use san::{parse_dns_alt_names, san_extension_value, validate_dns_alt_name};
pub use state::EnrollmentState;
