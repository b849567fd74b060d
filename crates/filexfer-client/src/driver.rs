//! The outer state machine: initialize → (register+exchange-keys |
//! reconnect) → upload → CRC accept/retry/abort. Each phase retries its
//! own operation up to three times before the whole run is declared
//! fatal.

use crate::config::{ClientConfig, StoredIdentity};
use crate::ops;
use crate::session::{FileSelection, Identity, KeyMaterial, RetryCounter};
use filexfer_protocol::error::ProtocolError;
use filexfer_protocol::transport::FrameTransport;
use filexfer_protocol::wire::RequestCode;
use tracing::{error, info};

/// How the whole run ended: accepted, aborted after exhausting CRC
/// retries, or fatally errored out of some other phase.
pub enum Outcome {
    Accept,
    Abort,
}

/// A fatal, unretryable failure: the terminal error plus every per-attempt
/// message accumulated before it. Carrying the log alongside the error
/// (rather than just the last attempt's error) is what lets the top level
/// print the full accumulated history, mirroring the reference client's
/// `_errMessage` accumulation in `ClientHandle::reportErrorAndDecrementRetries`.
#[derive(Debug)]
pub struct RunFailure {
    pub error: ProtocolError,
    pub log: Vec<String>,
}

impl RunFailure {
    /// A failure with no prior attempt history (config, transport setup,
    /// key loading — anything that fails before a retried phase begins).
    fn fatal(error: ProtocolError) -> Self {
        Self { error, log: Vec::new() }
    }

    /// A failure that occurred after `log` had already accumulated
    /// per-attempt messages.
    fn with_log(error: ProtocolError, log: &[String]) -> Self {
        Self { error, log: log.to_vec() }
    }
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "FATAL ERROR:")?;
        if self.log.is_empty() {
            writeln!(f, "  {}", self.error)
        } else {
            for line in &self.log {
                writeln!(f, "  {line}")?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Retries `op` up to [`crate::session::MAX_RETRIES`] times, appending a
/// message to `log` on each failure. Returns the first success, or a
/// [`RunFailure`] carrying every accumulated attempt message once the
/// budget is exhausted.
fn retry_phase<T>(
    log: &mut Vec<String>,
    phase: &str,
    mut op: impl FnMut(u32) -> filexfer_protocol::Result<T>,
) -> Result<T, RunFailure> {
    let mut counter = RetryCounter::new();
    loop {
        match op(counter.attempt()) {
            Ok(value) => return Ok(value),
            Err(err) => {
                log.push(format!("{phase} attempt {}: {err}", counter.attempt()));
                if !counter.has_remaining_attempts() {
                    return Err(RunFailure { error: err, log: log.clone() });
                }
                counter.advance();
            }
        }
    }
}

/// Drives one full session to completion. Returns `Outcome::Accept` on a
/// clean upload, `Outcome::Abort` after exhausting CRC retries, or a
/// [`RunFailure`] — carrying the full per-attempt log — for any other
/// fatal phase failure (config, connect, crypto, or a retried phase that
/// exhausted its budget).
pub fn run(config_dir: &std::path::Path) -> Result<Outcome, RunFailure> {
    let mut log: Vec<String> = Vec::new();

    let config = ClientConfig::load(config_dir)
        .map_err(|e| RunFailure::fatal(ProtocolError::Config(e.to_string())))?;
    let stored_identity = StoredIdentity::load(config_dir)
        .map_err(|e| RunFailure::fatal(ProtocolError::Config(e.to_string())))?;

    let transport = FrameTransport::new(config.server_addr.clone(), config.server_port).map_err(RunFailure::fatal)?;
    let file = FileSelection::load(&config.file_path)
        .map_err(|e| RunFailure::fatal(ProtocolError::FileIo(e.to_string())))?;

    let (identity, keys) = match stored_identity {
        Some(stored) => {
            info!("identity file present, attempting reconnection");
            let private_key =
                filexfer_protocol::crypto::rsa::private_key_from_base64(&stored.private_key_b64).map_err(RunFailure::fatal)?;
            let identity = Identity { id: stored.client_id, username: stored.username.clone() };
            let keys = retry_phase(&mut log, "reconnect", |_| {
                ops::reconnect(&transport, identity.id, &identity.username, private_key.clone(), stored.private_key_b64.clone())
            })?;
            (identity, keys)
        }
        None => {
            info!("no identity file, registering as a new client");
            let mut identity = Identity::new(config.username.clone());
            let client_id = retry_phase(&mut log, "register", |_| ops::register(&transport, &identity.username))?;
            identity.id = client_id;

            let keys = retry_phase(&mut log, "exchange-keys", |_| {
                ops::send_public_key(&transport, identity.id, &identity.username)
            })?;

            let to_persist = StoredIdentity {
                username: identity.username.clone(),
                client_id: identity.id,
                private_key_b64: keys.rsa_private_b64.clone(),
            };
            to_persist
                .persist(config_dir)
                .map_err(|e| RunFailure::with_log(ProtocolError::Config(e.to_string()), &log))?;

            (identity, keys)
        }
    };

    run_upload(&transport, &identity, &keys, &file, &mut log)
}

fn run_upload(
    transport: &FrameTransport,
    identity: &Identity,
    keys: &KeyMaterial,
    file: &FileSelection,
    log: &mut Vec<String>,
) -> Result<Outcome, RunFailure> {
    let aes_key = keys.aes_key;

    // UPLOAD: first attempt.
    let upload = ops::prepare_upload(file, &aes_key).map_err(|e| RunFailure::with_log(e, log))?;
    let mut crc_mismatch = retry_phase(log, "upload", |_| ops::send_file(transport, identity.id, file, &upload))?;

    if !crc_mismatch {
        retry_phase(log, "crc-status", |_| ops::send_crc_status(transport, identity.id, RequestCode::CrcValid, file))?;
        info!("sending a valid crc succeeded, server responded with a confirmation");
        return Ok(Outcome::Accept);
    }

    // MISMATCH(n)/RESEND(n): up to three resend rounds.
    for attempt in 1..=3u32 {
        retry_phase(log, "crc-status", |_| {
            ops::send_crc_status(transport, identity.id, RequestCode::CrcInvalidResend, file)
        })?;

        let resend_upload = ops::prepare_upload(file, &aes_key).map_err(|e| RunFailure::with_log(e, log))?;
        crc_mismatch = retry_phase(log, "resend", |_| ops::send_file(transport, identity.id, file, &resend_upload))?;

        if !crc_mismatch {
            retry_phase(log, "crc-status", |_| ops::send_crc_status(transport, identity.id, RequestCode::CrcValid, file))?;
            info!("sending a valid crc succeeded, server responded with a confirmation");
            return Ok(Outcome::Accept);
        }
        log.push(format!("CRC mismatch on resend attempt {attempt}"));
    }

    // ABORT: three mismatched resends, give up.
    retry_phase(log, "crc-status", |_| ops::send_crc_status(transport, identity.id, RequestCode::CrcInvalidAbort, file))?;
    error!("FATAL ERROR:");
    for line in log.iter() {
        error!("  {line}");
    }
    Ok(Outcome::Abort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MAX_RETRIES;
    use filexfer_protocol::crypto::{aes, crc32, rsa as rsa_crypto};
    use filexfer_protocol::wire::{CLIENT_ID_SIZE, FILE_NAME_SIZE, PACKET_SIZE};
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Spawns a one-connection-per-request fake server. `respond` is
    /// invoked once per accepted connection with the decoded opcode,
    /// client id, and payload, and returns `(response_code, response_payload)`.
    fn spawn_fake_server(
        mut respond: impl FnMut(u16, [u8; CLIENT_ID_SIZE], &[u8]) -> (u16, Vec<u8>) + Send + 'static,
    ) -> (String, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(s) => s,
                    Err(_) => break,
                };
                let mut first = [0u8; PACKET_SIZE];
                if stream.read_exact(&mut first).is_err() {
                    continue;
                }
                let mut client_id = [0u8; CLIENT_ID_SIZE];
                client_id.copy_from_slice(&first[0..16]);
                let code = u16::from_le_bytes([first[17], first[18]]);
                let payload_size =
                    u32::from_le_bytes([first[19], first[20], first[21], first[22]]) as usize;
                let total_len = 23 + payload_size;
                let total_packets = total_len.div_ceil(PACKET_SIZE);

                let mut buf = first.to_vec();
                let mut ok = true;
                for _ in 1..total_packets {
                    let mut packet = [0u8; PACKET_SIZE];
                    if stream.read_exact(&mut packet).is_err() {
                        ok = false;
                        break;
                    }
                    buf.extend_from_slice(&packet);
                }
                if !ok {
                    continue;
                }
                buf.truncate(total_len);
                let payload = &buf[23..];

                let (resp_code, resp_payload) = respond(code, client_id, payload);
                let mut out = Vec::with_capacity(7 + resp_payload.len());
                out.push(3u8);
                out.extend_from_slice(&resp_code.to_le_bytes());
                out.extend_from_slice(&(resp_payload.len() as u32).to_le_bytes());
                out.extend_from_slice(&resp_payload);

                let mut sent = 0;
                while sent < out.len() {
                    let take = (out.len() - sent).min(PACKET_SIZE);
                    let mut packet = [0u8; PACKET_SIZE];
                    packet[..take].copy_from_slice(&out[sent..sent + take]);
                    if stream.write_all(&packet).is_err() {
                        break;
                    }
                    sent += take;
                }
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
        });
        ("127.0.0.1".to_string(), port)
    }

    fn message_ack_payload(client_id: [u8; CLIENT_ID_SIZE]) -> Vec<u8> {
        client_id.to_vec()
    }

    fn file_received_payload(
        client_id: [u8; CLIENT_ID_SIZE],
        content_size: u32,
        file_name: [u8; FILE_NAME_SIZE],
        cksum: u32,
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + 4 + FILE_NAME_SIZE + 4);
        out.extend_from_slice(&client_id);
        out.extend_from_slice(&content_size.to_le_bytes());
        out.extend_from_slice(&file_name);
        out.extend_from_slice(&cksum.to_le_bytes());
        out
    }

    fn test_key_material() -> KeyMaterial {
        KeyMaterial {
            rsa_private: rsa_crypto::generate_keypair().unwrap().0,
            rsa_private_b64: String::new(),
            aes_key: [7u8; 16],
        }
    }

    #[test]
    fn happy_upload_single_chunk_ends_in_accept() {
        let client_id = [0xAB; CLIENT_ID_SIZE];
        let keys = test_key_material();
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("payload.bin");
        std::fs::write(&file_path, b"hello\n").unwrap();
        let file = FileSelection::load(&file_path).unwrap();

        let plaintext = std::fs::read(&file_path).unwrap();
        let local_crc = crc32::memcrc(&plaintext);
        let ciphertext_len = aes::encrypt_cbc_zero_pad(&keys.aes_key, &plaintext).unwrap().len() as u32;
        let wire_name = file.wire_name;

        let (host, port) = spawn_fake_server(move |code, cid, _payload| match code {
            828 => (1603, file_received_payload(cid, ciphertext_len, wire_name, local_crc)),
            900 => (1604, message_ack_payload(cid)),
            other => panic!("unexpected request code in test: {other}"),
        });

        let transport = FrameTransport::new(host, port).unwrap();
        let identity = Identity { id: client_id, username: "alice".to_string() };
        let mut log = Vec::new();

        let outcome = run_upload(&transport, &identity, &keys, &file, &mut log).unwrap();
        assert!(matches!(outcome, Outcome::Accept));
        assert!(log.is_empty());
    }

    #[test]
    fn three_crc_mismatches_end_in_abort_with_full_log() {
        let client_id = [0xCD; CLIENT_ID_SIZE];
        let keys = test_key_material();
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("payload.bin");
        std::fs::write(&file_path, b"mismatched\n").unwrap();
        let file = FileSelection::load(&file_path).unwrap();

        let plaintext = std::fs::read(&file_path).unwrap();
        let local_crc = crc32::memcrc(&plaintext);
        let ciphertext_len = aes::encrypt_cbc_zero_pad(&keys.aes_key, &plaintext).unwrap().len() as u32;
        let wire_name = file.wire_name;
        let wrong_crc = !local_crc;

        let (host, port) = spawn_fake_server(move |code, cid, _payload| match code {
            828 => (1603, file_received_payload(cid, ciphertext_len, wire_name, wrong_crc)),
            900 | 901 | 902 => (1604, message_ack_payload(cid)),
            other => panic!("unexpected request code in test: {other}"),
        });

        let transport = FrameTransport::new(host, port).unwrap();
        let identity = Identity { id: client_id, username: "bob".to_string() };
        let mut log = Vec::new();

        let outcome = run_upload(&transport, &identity, &keys, &file, &mut log).unwrap();
        assert!(matches!(outcome, Outcome::Abort));
        assert_eq!(
            log.iter().filter(|l| l.starts_with("CRC mismatch on resend attempt")).count(),
            3
        );
    }

    #[test]
    fn upload_exhausting_retries_surfaces_the_full_attempt_log() {
        let client_id = [0x11; CLIENT_ID_SIZE];
        let keys = test_key_material();
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("payload.bin");
        std::fs::write(&file_path, b"boom\n").unwrap();
        let file = FileSelection::load(&file_path).unwrap();

        // The server always answers with a generic error, so every attempt
        // of the "upload" phase fails with the same `ProtocolError`.
        let (host, port) = spawn_fake_server(move |_code, cid, _payload| (1607, message_ack_payload(cid)));

        let transport = FrameTransport::new(host, port).unwrap();
        let identity = Identity { id: client_id, username: "mallory".to_string() };
        let mut log = Vec::new();

        let failure = run_upload(&transport, &identity, &keys, &file, &mut log).unwrap_err();
        assert!(matches!(failure.error, ProtocolError::ServerGenericError));
        assert_eq!(failure.log.len(), MAX_RETRIES as usize);
        assert!(failure.log.iter().all(|l| l.starts_with("upload attempt")));
        // the log handed back on the error is exactly what's threaded through `log`
        assert_eq!(failure.log, log);
    }

    #[test]
    fn run_failure_display_prints_every_attempt_line() {
        let failure = RunFailure {
            error: ProtocolError::ServerGenericError,
            log: vec!["upload attempt 1: boom".to_string(), "upload attempt 2: boom".to_string()],
        };
        let rendered = failure.to_string();
        assert!(rendered.starts_with("FATAL ERROR:\n"));
        assert!(rendered.contains("upload attempt 1: boom"));
        assert!(rendered.contains("upload attempt 2: boom"));
    }

    #[test]
    fn run_failure_display_falls_back_to_the_error_when_log_is_empty() {
        let failure = RunFailure::fatal(ProtocolError::Config("bad port".to_string()));
        assert_eq!(failure.to_string(), "FATAL ERROR:\n  config error: bad port\n");
    }
}
