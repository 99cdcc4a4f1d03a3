//! Writing artifacts into the SSL directory.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use certboot_core::EnrollError;

/// Mode for private keys.
pub const PRIVATE_MODE: u32 = 0o600;

/// Mode for certificates, public keys, CSRs and the CRL.
pub const PUBLIC_MODE: u32 = 0o644;

/// Write a file that must not exist yet.
///
/// An existing file is reported as [`EnrollError::ArtifactExists`] and left
/// untouched.
pub fn write_new(path: &Path, contents: &str, mode: u32) -> Result<(), EnrollError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    set_mode(&mut options, mode);

    let mut file = options.open(path).map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            EnrollError::ArtifactExists {
                paths: vec![path.to_path_buf()],
            }
        } else {
            EnrollError::io(path, e)
        }
    })?;
    file.write_all(contents.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| EnrollError::io(path, e))
}

/// Write a file, replacing any previous content.
pub fn write_replace(path: &Path, contents: &str, mode: u32) -> Result<(), EnrollError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    set_mode(&mut options, mode);

    let mut file = options.open(path).map_err(|e| EnrollError::io(path, e))?;
    file.write_all(contents.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| EnrollError::io(path, e))
}

/// Read a file back as text.
pub fn read(path: &Path) -> Result<String, EnrollError> {
    fs::read_to_string(path).map_err(|e| EnrollError::io(path, e))
}

#[cfg(unix)]
fn set_mode(options: &mut OpenOptions, mode: u32) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(mode);
}

#[cfg(not(unix))]
fn set_mode(_options: &mut OpenOptions, _mode: u32) {}
