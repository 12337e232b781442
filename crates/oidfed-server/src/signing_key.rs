//! Persistence of the node's federation signing key.
//!
//! The key file holds the base64url-encoded 32-byte Ed25519 seed on a single
//! line. A missing file is created with a freshly generated key.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use oidfed_statement::StatementSigner;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading or creating the key file.
#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("failed to access signing key file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("signing key file {path} is not a base64url-encoded 32-byte seed")]
    Invalid { path: String },
}

/// Loads the signer stored at `path`, generating and storing a new key if
/// the file does not exist.
pub fn load_or_generate(path: &Path) -> Result<StatementSigner, KeyFileError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => decode(path, &contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let signer = StatementSigner::generate();
            store(path, &signer)?;
            tracing::info!(path = %path.display(), kid = signer.kid(), "generated federation signing key");
            Ok(signer)
        }
        Err(source) => Err(io_error(path, source)),
    }
}

fn decode(path: &Path, contents: &str) -> Result<StatementSigner, KeyFileError> {
    let invalid = || KeyFileError::Invalid {
        path: path.display().to_string(),
    };
    let bytes = URL_SAFE_NO_PAD.decode(contents.trim()).map_err(|_| invalid())?;
    let seed: [u8; 32] = bytes.try_into().map_err(|_| invalid())?;
    Ok(StatementSigner::from_bytes(&seed))
}

fn store(path: &Path, signer: &StatementSigner) -> Result<(), KeyFileError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(path, e))?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| io_error(path, e))?;
    writeln!(file, "{}", URL_SAFE_NO_PAD.encode(signer.to_bytes())).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: std::io::Error) -> KeyFileError {
    KeyFileError::Io {
        path: path.display().to_string(),
        source,
    }
}
