//! The wallet key file: a single hex-encoded private key on one line.
//!
//! This is the thin "private-key provider" seam the ledger core consumes —
//! node orchestration loads a key once at startup and hands the resulting
//! hex string to the wallet / transaction-signing code, never the file path
//! itself.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::gen_priv_key;

#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("failed to read wallet file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write wallet file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("wallet file is empty")]
    Empty,
}

/// Load the private key from `path`, generating and persisting a fresh one
/// if the file does not exist yet (first-run convenience, matching the
/// teacher's pattern of lazily materializing local state on first use).
pub fn load_or_create(path: impl AsRef<Path>) -> Result<String, KeyFileError> {
    let path = path.as_ref();
    if path.exists() {
        let contents = fs::read_to_string(path).map_err(|source| KeyFileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let key = contents.trim();
        if key.is_empty() {
            return Err(KeyFileError::Empty);
        }
        return Ok(key.to_string());
    }

    let key = gen_priv_key();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = fs::create_dir_all(parent);
        }
    }
    fs::write(path, &key).map_err(|source| KeyFileError::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_key_on_first_use_and_reloads_same_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("private_key");

        let first = load_or_create(&path).unwrap();
        let second = load_or_create(&path).unwrap();
        assert_eq!(first, second);
    }
}
