//! Webhook Shared Secret
//!
//! A 256-bit random secret, persisted base64-encoded so it can be pasted into
//! the GitHub hook settings. GitHub keys its HMAC with that text, so the
//! encoded form is what we sign with.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use thiserror::Error;
use tracing::info;
use zeroize::Zeroizing;

/// Raw secret size in bytes.
pub const SECRET_SIZE: usize = 256 / 8;

/// Errors loading or creating the secret file.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("failed to read secret file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write secret file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("secret file {} is not valid base64", .path.display())]
    Encoding { path: PathBuf },
    #[error(
        "secret in {} is not the expected size; want {expected} bytes, found {found}",
        .path.display()
    )]
    Size {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}

/// The HMAC key shared with GitHub.
pub struct WebhookSecret {
    encoded: Zeroizing<String>,
}

impl WebhookSecret {
    /// Wrap an already base64-encoded secret, validating its decoded size.
    pub fn from_encoded(encoded: &str, origin: &Path) -> Result<Self, SecretError> {
        let encoded = encoded.trim();
        let raw = Zeroizing::new(STANDARD.decode(encoded).map_err(|_| {
            SecretError::Encoding {
                path: origin.to_path_buf(),
            }
        })?);
        if raw.len() != SECRET_SIZE {
            return Err(SecretError::Size {
                path: origin.to_path_buf(),
                expected: SECRET_SIZE,
                found: raw.len(),
            });
        }
        Ok(Self {
            encoded: Zeroizing::new(encoded.to_string()),
        })
    }

    /// Generate a fresh random secret.
    pub fn generate() -> Self {
        let mut raw = Zeroizing::new([0u8; SECRET_SIZE]);
        rand::thread_rng().fill_bytes(&mut *raw);
        Self {
            encoded: Zeroizing::new(STANDARD.encode(&*raw)),
        }
    }

    /// Read the secret at `path`, creating it (mode 0400) on first run.
    pub fn load_or_generate(path: &Path) -> Result<Self, SecretError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_encoded(&Zeroizing::new(contents), path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let secret = Self::generate();
                secret.persist(path)?;
                let shown = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
                info!(path = %shown.display(), "Generated a new webhook secret");
                Ok(secret)
            }
            Err(source) => Err(SecretError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn persist(&self, path: &Path) -> Result<(), SecretError> {
        let to_err = |source| SecretError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o400);
        }
        let mut file = options.open(path).map_err(to_err)?;
        file.write_all(self.encoded.as_bytes()).map_err(to_err)?;
        file.sync_all().map_err(to_err)
    }

    /// Key bytes for HMAC computation.
    pub fn key(&self) -> &[u8] {
        self.encoded.as_bytes()
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_has_expected_shape() {
        let secret = WebhookSecret::generate();
        // base64 of 32 bytes is 44 chars
        assert_eq!(secret.key().len(), 44);
        assert_eq!(STANDARD.decode(secret.key()).unwrap().len(), SECRET_SIZE);
    }

    #[test]
    fn generates_once_then_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webhook.secret");

        let first = WebhookSecret::load_or_generate(&path).unwrap();
        let second = WebhookSecret::load_or_generate(&path).unwrap();
        assert_eq!(first.key(), second.key());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o400);
        }
    }

    #[test]
    fn trailing_newline_is_tolerated() {
        let encoded = STANDARD.encode([7u8; SECRET_SIZE]);
        let secret =
            WebhookSecret::from_encoded(&format!("{encoded}\n"), Path::new("test")).unwrap();
        assert_eq!(secret.key(), encoded.as_bytes());
    }

    #[test]
    fn wrong_size_is_rejected() {
        let encoded = STANDARD.encode([7u8; 16]);
        let err = WebhookSecret::from_encoded(&encoded, Path::new("test")).unwrap_err();
        assert!(matches!(
            err,
            SecretError::Size {
                expected: 32,
                found: 16,
                ..
            }
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = WebhookSecret::from_encoded("not base64!!", Path::new("test")).unwrap_err();
        assert!(matches!(err, SecretError::Encoding { .. }));
    }

    #[test]
    fn debug_is_redacted() {
        let secret = WebhookSecret::generate();
        let shown = format!("{secret:?}");
        assert!(!shown.contains(std::str::from_utf8(secret.key()).unwrap()));
    }
}
