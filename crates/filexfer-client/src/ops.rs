//! One function per request/response pair. Each builds a typed request,
//! pushes it through the transport, decodes the response, and validates
//! it against the expected code and payload size before handing the
//! caller a typed result.

use crate::session::{FileSelection, KeyMaterial, UploadContext};
use filexfer_protocol::crypto::{aes, crc32, rsa as rsa_crypto};
use filexfer_protocol::error::{ProtocolError, Result};
use filexfer_protocol::transport::FrameTransport;
use filexfer_protocol::wire::{
    self, AesKeyResponse, CrcStatusRequest, FileReceivedResponse, MessageAckResponse, ReconnectRequest,
    RegisterOkResponse, RegisterRequest, RequestCode, ResponseCode, ResponseHeader, SendFileRequest,
    SendPublicKeyRequest, CLIENT_ID_SIZE,
};
use tracing::{debug, info, warn};

/// Fails fast on the three response codes that are refusals regardless of
/// what the caller expected, otherwise enforces `expected_code` and the
/// code's fixed payload size.
fn validate_header(header: &ResponseHeader, expected_code: ResponseCode, expected_payload_size: usize) -> Result<()> {
    match ResponseCode::from_u16(header.code) {
        Some(ResponseCode::RegistrationFailed) => return Err(ProtocolError::RegistrationRefused),
        Some(ResponseCode::RequestForReconnectionDenied) => return Err(ProtocolError::ReconnectDenied),
        Some(ResponseCode::GenericError) => return Err(ProtocolError::ServerGenericError),
        _ => {}
    }
    if header.code != expected_code as u16 {
        return Err(ProtocolError::Protocol(format!(
            "unexpected response code: expected {}, got {}",
            expected_code as u16, header.code
        )));
    }
    if header.payload_size as usize != expected_payload_size {
        return Err(ProtocolError::Protocol(format!(
            "unexpected payload size for code {}: expected {}, got {}",
            header.code, expected_payload_size, header.payload_size
        )));
    }
    Ok(())
}

fn split_header_and_payload(response: &[u8]) -> Result<(ResponseHeader, &[u8])> {
    let mut cursor = response;
    let header = ResponseHeader::parse(&mut cursor)?;
    Ok((header, cursor))
}

/// Register op (825 → 1600/1601): returns the server-assigned client id.
pub fn register(transport: &FrameTransport, username: &str) -> Result<[u8; CLIENT_ID_SIZE]> {
    let request = RegisterRequest { client_name: wire::pad_field(username.as_bytes()) };
    let expected_len = ResponseHeader::SIZE + RegisterOkResponse::PAYLOAD_SIZE;
    let response = transport.communicate(&request.to_bytes(), expected_len)?;
    let (header, payload) = split_header_and_payload(&response)?;
    validate_header(&header, ResponseCode::RegistrationSucceeded, RegisterOkResponse::PAYLOAD_SIZE)?;
    let parsed = RegisterOkResponse::parse(payload)?;
    info!(client_id = %hex::encode(parsed.client_id), "registration succeeded");
    Ok(parsed.client_id)
}

/// SendPublicKey op (826 → 1602): generates a fresh RSA-1024 key pair,
/// sends the public key, and unwraps the server's AES session key.
pub fn send_public_key(
    transport: &FrameTransport,
    client_id: [u8; CLIENT_ID_SIZE],
    username: &str,
) -> Result<KeyMaterial> {
    let (private_key, public_key) = rsa_crypto::generate_keypair()?;
    let wire_public_key = rsa_crypto::public_key_to_wire_bytes(&public_key)?;
    let rsa_private_b64 = rsa_crypto::private_key_to_base64(&private_key)?;

    let request = SendPublicKeyRequest {
        client_id,
        client_name: wire::pad_field(username.as_bytes()),
        public_key: wire_public_key,
    };
    let expected_len = ResponseHeader::SIZE + AesKeyResponse::PAYLOAD_SIZE;
    let response = transport.communicate(&request.to_bytes(), expected_len)?;
    let (header, payload) = split_header_and_payload(&response)?;
    validate_header(&header, ResponseCode::ReceivedPublicKeyAndSendingAes, AesKeyResponse::PAYLOAD_SIZE)?;
    let parsed = AesKeyResponse::parse(payload)?;

    let aes_key = rsa_crypto::decrypt_wrapped_aes_key(&private_key, &parsed.wrapped_aes_key)?;
    info!("exchange keys succeeded");
    Ok(KeyMaterial { rsa_private: private_key, rsa_private_b64, aes_key })
}

/// Reconnect op (827 → 1605/1606): resumes a session using a persisted
/// private key instead of generating a new one.
pub fn reconnect(
    transport: &FrameTransport,
    client_id: [u8; CLIENT_ID_SIZE],
    username: &str,
    rsa_private: rsa::RsaPrivateKey,
    rsa_private_b64: String,
) -> Result<KeyMaterial> {
    let request = ReconnectRequest { client_id, client_name: wire::pad_field(username.as_bytes()) };
    let expected_len = ResponseHeader::SIZE + AesKeyResponse::PAYLOAD_SIZE;
    let response = transport.communicate(&request.to_bytes(), expected_len)?;
    let (header, payload) = split_header_and_payload(&response)?;
    validate_header(&header, ResponseCode::ApprovedRequestToReconnectSendingAes, AesKeyResponse::PAYLOAD_SIZE)?;
    let parsed = AesKeyResponse::parse(payload)?;

    if parsed.client_id != client_id {
        return Err(ProtocolError::Protocol("reconnect response echoed a different client id".into()));
    }
    let aes_key = rsa_crypto::decrypt_wrapped_aes_key(&rsa_private, &parsed.wrapped_aes_key)?;
    info!("reconnection succeeded");
    Ok(KeyMaterial { rsa_private, rsa_private_b64, aes_key })
}

/// Prepares one upload attempt: reads the plaintext, computes its CRC,
/// encrypts it, and chunks the ciphertext.
pub fn prepare_upload(file: &FileSelection, aes_key: &[u8; 16]) -> Result<UploadContext> {
    let plaintext = std::fs::read(&file.path).map_err(|e| ProtocolError::FileIo(e.to_string()))?;
    let crc_local = crc32::memcrc(&plaintext);
    let ciphertext = aes::encrypt_cbc_zero_pad(aes_key, &plaintext)?;
    let total_packets = filexfer_protocol::chunk::total_packets(ciphertext.len());
    Ok(UploadContext { ciphertext, total_packets, crc_local })
}

/// SendFile op (828 → 1603 on the last packet, 1604 on every other one).
/// Sends every chunk in order; returns `Ok(crc_mismatch)` where
/// `crc_mismatch` is whether the server's CRC disagreed with ours.
pub fn send_file(
    transport: &FrameTransport,
    client_id: [u8; CLIENT_ID_SIZE],
    file: &FileSelection,
    upload: &UploadContext,
) -> Result<bool> {
    let mut crc_mismatch = false;
    for chunk in filexfer_protocol::chunk::chunks(upload.ciphertext.len()) {
        let is_last = chunk.packet_number == upload.total_packets;
        let mut content = [0u8; wire::CHUNK_SIZE];
        content[..chunk.len].copy_from_slice(&upload.ciphertext[chunk.offset..chunk.offset + chunk.len]);

        let request = SendFileRequest {
            client_id,
            content_size: upload.ciphertext.len() as u32,
            orig_file_size: file.plaintext_size,
            packet_number: chunk.packet_number,
            total_packets: upload.total_packets,
            file_name: file.wire_name,
            chunk: content,
            chunk_len: chunk.len,
        };

        if is_last {
            let expected_len = ResponseHeader::SIZE + FileReceivedResponse::PAYLOAD_SIZE;
            let response = transport.communicate(&request.to_bytes(), expected_len)?;
            let (header, payload) = split_header_and_payload(&response)?;
            validate_header(&header, ResponseCode::FileReceivedProperlyWithCrc, FileReceivedResponse::PAYLOAD_SIZE)?;
            let parsed = FileReceivedResponse::parse(payload)?;

            if parsed.client_id != client_id
                || parsed.content_size != upload.ciphertext.len() as u32
                || parsed.file_name != file.wire_name
            {
                return Err(ProtocolError::Protocol("final file-received response echoed mismatched fields".into()));
            }
            crc_mismatch = parsed.cksum != upload.crc_local;
            if crc_mismatch {
                warn!(server_crc = parsed.cksum, local_crc = upload.crc_local, "CRC mismatch");
            } else {
                info!("sending a file succeeded, server responded with a valid CRC");
            }
        } else {
            let expected_len = ResponseHeader::SIZE + MessageAckResponse::PAYLOAD_SIZE;
            let response = transport.communicate(&request.to_bytes(), expected_len)?;
            let (header, payload) = split_header_and_payload(&response)?;
            validate_header(&header, ResponseCode::ApprovedGettingMessageThanks, MessageAckResponse::PAYLOAD_SIZE)?;
            let parsed = MessageAckResponse::parse(payload)?;
            if parsed.client_id != client_id {
                return Err(ProtocolError::Protocol("intermediate ack echoed a different client id".into()));
            }
            debug!(packet_number = chunk.packet_number, total = upload.total_packets, "chunk acknowledged");
        }
    }
    Ok(crc_mismatch)
}

/// SendCRCStatus op (900/901/902 → 1604): report CRC valid, invalid (retry),
/// or invalid (giving up), verifying the server echoes our client id.
pub fn send_crc_status(
    transport: &FrameTransport,
    client_id: [u8; CLIENT_ID_SIZE],
    code: RequestCode,
    file: &FileSelection,
) -> Result<()> {
    let request = CrcStatusRequest { client_id, code, file_name: file.wire_name };
    let expected_len = ResponseHeader::SIZE + MessageAckResponse::PAYLOAD_SIZE;
    let response = transport.communicate(&request.to_bytes(), expected_len)?;
    let (header, payload) = split_header_and_payload(&response)?;
    validate_header(&header, ResponseCode::ApprovedGettingMessageThanks, MessageAckResponse::PAYLOAD_SIZE)?;
    let parsed = MessageAckResponse::parse(payload)?;
    if parsed.client_id != client_id {
        return Err(ProtocolError::Protocol("CRC status ack echoed a different client id".into()));
    }
    Ok(())
}
