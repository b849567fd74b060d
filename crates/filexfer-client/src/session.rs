//! Process-wide session state: identity, key material, the selected file,
//! and the per-phase retry discipline.

use filexfer_protocol::wire::CLIENT_ID_SIZE;
use rsa::RsaPrivateKey;
use std::path::{Path, PathBuf};

/// Client identity: the server-assigned id (all zero until registration
/// completes) and the username loaded from config.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: [u8; CLIENT_ID_SIZE],
    pub username: String,
}

impl Identity {
    pub fn new(username: String) -> Self {
        Self { id: [0; CLIENT_ID_SIZE], username }
    }

    pub fn is_registered(&self) -> bool {
        self.id != [0; CLIENT_ID_SIZE]
    }
}

/// RSA/AES key material for the session. The RSA key pair is generated
/// fresh on first registration; `rsa_private_b64` is the only form
/// persisted and the only form reloaded on reconnect. `aes_key` is only
/// ever constructed after a successful key exchange or reconnect, so it is
/// carried as a plain value rather than an `Option` the caller has to
/// unwrap.
pub struct KeyMaterial {
    pub rsa_private: RsaPrivateKey,
    pub rsa_private_b64: String,
    pub aes_key: [u8; 16],
}

/// The file selected for upload: its path, its wire-form name, and its
/// plaintext size (must fit in a `u32` and, per the wire format's
/// packet-count field, ≤ 65535 bytes of plaintext).
#[derive(Debug, Clone)]
pub struct FileSelection {
    pub path: PathBuf,
    pub wire_name: [u8; 255],
    pub plaintext_size: u32,
}

pub const MAX_PLAINTEXT_SIZE: u64 = 65535;

impl FileSelection {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let len = metadata.len();
        if len == 0 || len > MAX_PLAINTEXT_SIZE {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("file size {len} out of range (1..={MAX_PLAINTEXT_SIZE})"),
            ));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            wire_name: filexfer_protocol::wire::pad_field(file_name.as_bytes()),
            plaintext_size: len as u32,
        })
    }
}

/// Populated once per upload attempt: the whole file, encrypted in
/// memory, plus the chunk count and the locally computed CRC to compare
/// against the server's.
pub struct UploadContext {
    pub ciphertext: Vec<u8>,
    pub total_packets: u16,
    pub crc_local: u32,
}

/// Tracks attempts within a single protocol phase (register, exchange
/// keys, reconnect, upload, crc-status). Reset at the start of each
/// distinct phase rather than living as ambient global state.
#[derive(Debug, Clone, Copy)]
pub struct RetryCounter {
    attempt: u32,
}

pub const MAX_RETRIES: u32 = 3;

impl RetryCounter {
    pub fn new() -> Self {
        Self { attempt: 1 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn has_remaining_attempts(&self) -> bool {
        self.attempt <= MAX_RETRIES
    }

    pub fn advance(&mut self) {
        self.attempt += 1;
    }
}

impl Default for RetryCounter {
    fn default() -> Self {
        Self::new()
    }
}
