//! Parsing and persistence of `transfer.info`, `me.info`, and `priv.key`.
//!
//! Plain three-line text files, not a generic config schema — handled with
//! `std::fs` directly rather than the `config` crate, since the rest of
//! this binary is deliberately synchronous and there is no nested/typed
//! structure to deserialize.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const TRANSFER_INFO: &str = "transfer.info";
const ME_INFO: &str = "me.info";
const PRIV_KEY: &str = "priv.key";

const MAX_USERNAME_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("I/O error reading {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
}

impl ConfigError {
    fn malformed(path: &Path, reason: impl fmt::Display) -> Self {
        ConfigError::Malformed { path: path.to_path_buf(), reason: reason.to_string() }
    }
}

/// Bootstrap parameters loaded from `transfer.info`: where to connect, who
/// we are, and what file to upload.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub server_port: u16,
    pub username: String,
    pub file_path: PathBuf,
}

impl ClientConfig {
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(TRANSFER_INFO);
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io { path: path.clone(), source })?;
        let mut lines = contents.lines();

        let addr_line = lines
            .next()
            .ok_or_else(|| ConfigError::malformed(&path, "missing address:port line"))?
            .trim();
        let (server_addr, port_str) = addr_line
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::malformed(&path, "address line must be host:port"))?;
        let server_port: u16 = port_str
            .parse()
            .map_err(|_| ConfigError::malformed(&path, format!("invalid port: {port_str}")))?;
        if server_port == 0 {
            return Err(ConfigError::malformed(&path, "port must be greater than zero"));
        }

        let username = lines
            .next()
            .ok_or_else(|| ConfigError::malformed(&path, "missing username line"))?
            .trim()
            .to_string();
        validate_username(&username).map_err(|reason| ConfigError::malformed(&path, reason))?;

        let file_path = lines
            .next()
            .ok_or_else(|| ConfigError::malformed(&path, "missing file path line"))?
            .trim()
            .to_string();
        if file_path.is_empty() {
            return Err(ConfigError::malformed(&path, "file path line is empty"));
        }

        Ok(Self {
            server_addr: server_addr.to_string(),
            server_port,
            username,
            file_path: PathBuf::from(file_path),
        })
    }
}

fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(format!("username must be 1..={MAX_USERNAME_LEN} characters, got {}", username.len()));
    }
    if !username.chars().all(|c| c.is_alphanumeric() || c.is_whitespace()) {
        return Err("username must be alphanumeric or whitespace only".to_string());
    }
    Ok(())
}

/// Identity persisted after the first successful key exchange: `me.info`
/// holds all three fields, `priv.key` duplicates the private key alone.
#[derive(Debug, Clone)]
pub struct StoredIdentity {
    pub username: String,
    pub client_id: [u8; 16],
    pub private_key_b64: String,
}

impl StoredIdentity {
    /// `Ok(None)` means first run — no prior registration to resume from.
    pub fn load(dir: &Path) -> Result<Option<Self>, ConfigError> {
        let path = dir.join(ME_INFO);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io { path: path.clone(), source })?;
        let mut lines = contents.lines();

        let username = lines
            .next()
            .ok_or_else(|| ConfigError::malformed(&path, "missing username line"))?
            .trim()
            .to_string();

        let id_hex = lines
            .next()
            .ok_or_else(|| ConfigError::malformed(&path, "missing client id line"))?
            .trim();
        let id_bytes = hex::decode(id_hex).map_err(|e| ConfigError::malformed(&path, format!("invalid client id hex: {e}")))?;
        if id_bytes.len() != 16 {
            return Err(ConfigError::malformed(&path, format!("client id must be 16 bytes, got {}", id_bytes.len())));
        }
        let mut client_id = [0u8; 16];
        client_id.copy_from_slice(&id_bytes);

        let private_key_b64 = lines
            .next()
            .ok_or_else(|| ConfigError::malformed(&path, "missing private key line"))?
            .trim()
            .to_string();
        if private_key_b64.len() > filexfer_protocol::wire::PRIVATE_KEY_BASE64_MAX {
            return Err(ConfigError::malformed(
                &path,
                format!("private key exceeds {} base64 chars", filexfer_protocol::wire::PRIVATE_KEY_BASE64_MAX),
            ));
        }

        Ok(Some(Self { username, client_id, private_key_b64 }))
    }

    /// Write both `me.info` and `priv.key`, mirroring the reference
    /// client's `storeClientInfo`.
    pub fn persist(&self, dir: &Path) -> Result<(), ConfigError> {
        let me_info = dir.join(ME_INFO);
        let body = format!("{}\n{}\n{}\n", self.username, hex::encode(self.client_id), self.private_key_b64);
        fs::write(&me_info, body).map_err(|source| ConfigError::Io { path: me_info.clone(), source })?;

        let priv_key = dir.join(PRIV_KEY);
        fs::write(&priv_key, format!("{}\n", self.private_key_b64))
            .map_err(|source| ConfigError::Io { path: priv_key.clone(), source })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_well_formed_transfer_info() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TRANSFER_INFO), "127.0.0.1:1234\nalice\n./payload.bin\n").unwrap();
        let cfg = ClientConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.server_addr, "127.0.0.1");
        assert_eq!(cfg.server_port, 1234);
        assert_eq!(cfg.username, "alice");
        assert_eq!(cfg.file_path, PathBuf::from("./payload.bin"));
    }

    #[test]
    fn rejects_non_numeric_port() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TRANSFER_INFO), "127.0.0.1:notaport\nalice\n./payload.bin\n").unwrap();
        assert!(ClientConfig::load(dir.path()).is_err());
    }

    #[test]
    fn rejects_overlong_username() {
        let dir = tempfile::tempdir().unwrap();
        let long_name = "a".repeat(101);
        fs::write(dir.path().join(TRANSFER_INFO), format!("127.0.0.1:1234\n{long_name}\n./payload.bin\n")).unwrap();
        assert!(ClientConfig::load(dir.path()).is_err());
    }

    #[test]
    fn rejects_missing_third_line() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TRANSFER_INFO), "127.0.0.1:1234\nalice\n").unwrap();
        assert!(ClientConfig::load(dir.path()).is_err());
    }

    #[test]
    fn identity_missing_file_is_first_run_not_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StoredIdentity::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn identity_roundtrips_through_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let identity = StoredIdentity {
            username: "bob".to_string(),
            client_id: [0xAB; 16],
            private_key_b64: "c3VwZXJzZWNyZXQ=".to_string(),
        };
        identity.persist(dir.path()).unwrap();
        assert!(dir.path().join(PRIV_KEY).exists());

        let loaded = StoredIdentity::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.client_id, identity.client_id);
        assert_eq!(loaded.private_key_b64, identity.private_key_b64);
    }
}
