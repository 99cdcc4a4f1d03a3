//! On-disk layout of the SSL directory.
//!
//! ```text
//! <ssl_root>/
//!   certs/ca.pem
//!   certs/<name>.pem
//!   certificate_requests/<name>.pem
//!   private_keys/<name>.pem
//!   public_keys/<name>.pem
//!   crl.pem
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EnrollError;

/// Paths of every artifact for one certificate name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslLayout {
    root: PathBuf,
    certname: String,
}

impl SslLayout {
    pub fn new(root: impl Into<PathBuf>, certname: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            certname: certname.into(),
        }
    }

    pub fn certs_dir(&self) -> PathBuf {
        self.root.join("certs")
    }

    pub fn private_keys_dir(&self) -> PathBuf {
        self.root.join("private_keys")
    }

    pub fn public_keys_dir(&self) -> PathBuf {
        self.root.join("public_keys")
    }

    pub fn requests_dir(&self) -> PathBuf {
        self.root.join("certificate_requests")
    }

    pub fn private_key(&self) -> PathBuf {
        self.private_keys_dir().join(self.file_name())
    }

    pub fn public_key(&self) -> PathBuf {
        self.public_keys_dir().join(self.file_name())
    }

    pub fn certificate_request(&self) -> PathBuf {
        self.requests_dir().join(self.file_name())
    }

    pub fn certificate(&self) -> PathBuf {
        self.certs_dir().join(self.file_name())
    }

    pub fn ca_certificate(&self) -> PathBuf {
        self.certs_dir().join("ca.pem")
    }

    pub fn crl(&self) -> PathBuf {
        self.root.join("crl.pem")
    }

    /// Files that together make up this host's identity and must not be
    /// overwritten: private key, public key, and CSR.
    pub fn identity_artifacts(&self) -> [PathBuf; 3] {
        [
            self.private_key(),
            self.public_key(),
            self.certificate_request(),
        ]
    }

    /// Identity artifacts that already exist on disk.
    pub fn existing_identity_artifacts(&self) -> Vec<PathBuf> {
        self.identity_artifacts()
            .into_iter()
            .filter(|path| path.exists())
            .collect()
    }

    /// Fail with [`EnrollError::ArtifactExists`] if any identity artifact is
    /// already present.
    pub fn ensure_no_identity_artifacts(&self) -> Result<(), EnrollError> {
        let existing = self.existing_identity_artifacts();
        if existing.is_empty() {
            Ok(())
        } else {
            Err(EnrollError::ArtifactExists { paths: existing })
        }
    }

    /// Create the root and every artifact directory. Existing directories are
    /// left alone. `private_keys/` is restricted to its owner and group on Unix.
    pub fn ensure_directories(&self) -> Result<(), EnrollError> {
        for dir in [
            self.root.clone(),
            self.certs_dir(),
            self.public_keys_dir(),
            self.requests_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| EnrollError::io(&dir, e))?;
        }

        let private = self.private_keys_dir();
        create_private_dir(&private).map_err(|e| EnrollError::io(&private, e))
    }

    fn file_name(&self) -> String {
        format!("{}.pem", self.certname)
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    if path.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new().recursive(true).mode(0o750).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}
