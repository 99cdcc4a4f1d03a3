//! Enrollment errors.

use std::path::PathBuf;

use thiserror::Error;

/// Every way a single enrollment run can end without a signed certificate.
///
/// All variants are terminal: the run aborts and nothing is cleaned up, so an
/// operator can inspect the keys and CSR that were left behind.
#[derive(Debug, Error)]
pub enum EnrollError {
    /// Unusable inputs, e.g. no certificate name could be resolved.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// CA certificate or CRL unreachable or unparsable.
    #[error("could not establish trust in the CA: {0}")]
    TrustBootstrap(String),

    /// The CA already holds a signed certificate for this name.
    #[error("the CA already has a signed certificate for '{certname}'; refusing to enroll again")]
    AlreadyEnrolled { certname: String },

    /// Key or CSR files already occupy the target paths.
    #[error("refusing to overwrite existing identity artifacts: {}", display_paths(.paths))]
    ArtifactExists { paths: Vec<PathBuf> },

    /// The CA already holds an unsigned request for this name.
    #[error("the CA already has a pending certificate request for '{certname}': {message}")]
    DuplicatePendingRequest { certname: String, message: String },

    /// CA policy forbids subject alternative names.
    #[error("the CA refused the requested subject alternative names for '{certname}': {message}")]
    AltNamesRejected { certname: String, message: String },

    /// No signed certificate appeared before the wait budget ran out.
    #[error("certificate for '{certname}' was not signed within {waited_secs} seconds")]
    EnrollmentTimeout { certname: String, waited_secs: u64 },

    /// The persisted certificate is not a readable X.509 certificate.
    #[error("invalid certificate at {path}: {reason}")]
    InvalidCertificate { path: PathBuf, reason: String },

    /// The CA could not be reached for a step after transport retries.
    #[error("CA request '{operation}' failed: {message}")]
    CaUnreachable { operation: &'static str, message: String },

    /// Local key pair or CSR construction failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Reading or writing an artifact failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl EnrollError {
    /// Build an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this kind of failure. Zero is reserved for success.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::TrustBootstrap(_) => 3,
            Self::AlreadyEnrolled { .. } => 4,
            Self::ArtifactExists { .. } => 5,
            Self::DuplicatePendingRequest { .. } => 6,
            Self::AltNamesRejected { .. } => 7,
            Self::EnrollmentTimeout { .. } => 8,
            Self::InvalidCertificate { .. } => 9,
            Self::KeyGeneration(_) | Self::Io { .. } => 10,
            Self::CaUnreachable { .. } => 11,
            Self::InvalidStateTransition { .. } => 70,
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_kind() {
        let errors = [
            EnrollError::Configuration("x".into()),
            EnrollError::TrustBootstrap("x".into()),
            EnrollError::AlreadyEnrolled {
                certname: "h".into(),
            },
            EnrollError::ArtifactExists { paths: vec![] },
            EnrollError::DuplicatePendingRequest {
                certname: "h".into(),
                message: String::new(),
            },
            EnrollError::AltNamesRejected {
                certname: "h".into(),
                message: String::new(),
            },
            EnrollError::EnrollmentTimeout {
                certname: "h".into(),
                waited_secs: 0,
            },
            EnrollError::InvalidCertificate {
                path: PathBuf::from("/x"),
                reason: String::new(),
            },
            EnrollError::CaUnreachable {
                operation: "poll",
                message: String::new(),
            },
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn test_artifact_exists_lists_paths() {
        let err = EnrollError::ArtifactExists {
            paths: vec![PathBuf::from("/ssl/a.pem"), PathBuf::from("/ssl/b.pem")],
        };
        assert_eq!(
            err.to_string(),
            "refusing to overwrite existing identity artifacts: /ssl/a.pem, /ssl/b.pem"
        );
    }
}
