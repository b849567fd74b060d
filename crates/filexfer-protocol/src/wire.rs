//! Fixed-layout, little-endian request/response structs.
//!
//! Every struct here packs and unpacks to the byte-exact layout the server
//! expects: no derive-based serialization, just explicit `BufMut`/`Buf`
//! calls in field order, mirroring how the rest of this workspace encodes
//! its own wire structs.

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut, BytesMut};

pub const CLIENT_VERSION: u8 = 3;

pub const CLIENT_ID_SIZE: usize = 16;
pub const CLIENT_NAME_SIZE: usize = 255;
pub const FILE_NAME_SIZE: usize = 255;
pub const RSA_KEY_SIZE: usize = 160;
pub const WRAPPED_AES_KEY_SIZE: usize = 128;
pub const AES_KEY_SIZE: usize = 16;
pub const CHUNK_SIZE: usize = 734;
pub const PRIVATE_KEY_BASE64_MAX: usize = 856;
pub const PACKET_SIZE: usize = 1024;

/// Request opcodes, matching the server's `ERequestCode` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RequestCode {
    Registration = 825,
    SendingPublicKey = 826,
    Reconnection = 827,
    SendingFile = 828,
    CrcValid = 900,
    CrcInvalidResend = 901,
    CrcInvalidAbort = 902,
}

/// Response opcodes, matching the server's `EResponseCode` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ResponseCode {
    RegistrationSucceeded = 1600,
    RegistrationFailed = 1601,
    ReceivedPublicKeyAndSendingAes = 1602,
    FileReceivedProperlyWithCrc = 1603,
    ApprovedGettingMessageThanks = 1604,
    ApprovedRequestToReconnectSendingAes = 1605,
    RequestForReconnectionDenied = 1606,
    GenericError = 1607,
}

impl ResponseCode {
    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            1600 => Self::RegistrationSucceeded,
            1601 => Self::RegistrationFailed,
            1602 => Self::ReceivedPublicKeyAndSendingAes,
            1603 => Self::FileReceivedProperlyWithCrc,
            1604 => Self::ApprovedGettingMessageThanks,
            1605 => Self::ApprovedRequestToReconnectSendingAes,
            1606 => Self::RequestForReconnectionDenied,
            1607 => Self::GenericError,
            _ => return None,
        })
    }
}

/// Pad or truncate `s` into a fixed-size, nul-terminated wire field.
///
/// Truncates rather than erroring on overlong input; callers validate
/// length (e.g. username ≤ 100 chars) before this ever gets used.
pub fn pad_field<const N: usize>(s: &[u8]) -> [u8; N] {
    let mut field = [0u8; N];
    let n = s.len().min(N);
    field[..n].copy_from_slice(&s[..n]);
    field
}

/// Read a nul-padded field back out as a `String`, stopping at the first
/// nul byte (or end of field if there is none).
pub fn field_to_string<const N: usize>(field: &[u8; N]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(N);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// 23-byte request header: client id, protocol version, opcode, payload size.
#[derive(Debug, Clone)]
pub struct RequestHeader {
    pub client_id: [u8; CLIENT_ID_SIZE],
    pub version: u8,
    pub code: u16,
    pub payload_size: u32,
}

impl RequestHeader {
    pub const SIZE: usize = CLIENT_ID_SIZE + 1 + 2 + 4;

    pub fn new(client_id: [u8; CLIENT_ID_SIZE], code: RequestCode, payload_size: u32) -> Self {
        Self {
            client_id,
            version: CLIENT_VERSION,
            code: code as u16,
            payload_size,
        }
    }

    pub fn put(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.client_id);
        buf.put_u8(self.version);
        buf.put_u16_le(self.code);
        buf.put_u32_le(self.payload_size);
    }
}

/// 7-byte response header: protocol version, opcode, payload size.
#[derive(Debug, Clone)]
pub struct ResponseHeader {
    pub version: u8,
    pub code: u16,
    pub payload_size: u32,
}

impl ResponseHeader {
    pub const SIZE: usize = 1 + 2 + 4;

    pub fn parse(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(ProtocolError::Protocol(format!(
                "short response header: need {} bytes, have {}",
                Self::SIZE,
                buf.remaining()
            )));
        }
        Ok(Self {
            version: buf.get_u8(),
            code: buf.get_u16_le(),
            payload_size: buf.get_u32_le(),
        })
    }
}

/// Request 825: register a brand-new client identity.
pub struct RegisterRequest {
    pub client_name: [u8; CLIENT_NAME_SIZE],
}

impl RegisterRequest {
    pub fn to_bytes(&self) -> BytesMut {
        let header = RequestHeader::new([0; CLIENT_ID_SIZE], RequestCode::Registration, CLIENT_NAME_SIZE as u32);
        let mut buf = BytesMut::with_capacity(RequestHeader::SIZE + CLIENT_NAME_SIZE);
        header.put(&mut buf);
        buf.put_slice(&self.client_name);
        buf
    }
}

/// Response to 825: 16-byte assigned client id.
pub struct RegisterOkResponse {
    pub client_id: [u8; CLIENT_ID_SIZE],
}

impl RegisterOkResponse {
    pub const PAYLOAD_SIZE: usize = CLIENT_ID_SIZE;

    pub fn parse(mut payload: &[u8]) -> Result<Self> {
        if payload.remaining() < Self::PAYLOAD_SIZE {
            return Err(ProtocolError::Protocol("short RegisterOk payload".into()));
        }
        let mut client_id = [0u8; CLIENT_ID_SIZE];
        payload.copy_to_slice(&mut client_id);
        Ok(Self { client_id })
    }
}

/// Request 826: hand the server this client's RSA public key.
pub struct SendPublicKeyRequest {
    pub client_id: [u8; CLIENT_ID_SIZE],
    pub client_name: [u8; CLIENT_NAME_SIZE],
    pub public_key: [u8; RSA_KEY_SIZE],
}

impl SendPublicKeyRequest {
    pub const PAYLOAD_SIZE: u32 = (CLIENT_NAME_SIZE + RSA_KEY_SIZE) as u32;

    pub fn to_bytes(&self) -> BytesMut {
        let header = RequestHeader::new(self.client_id, RequestCode::SendingPublicKey, Self::PAYLOAD_SIZE);
        let mut buf = BytesMut::with_capacity(RequestHeader::SIZE + CLIENT_NAME_SIZE + RSA_KEY_SIZE);
        header.put(&mut buf);
        buf.put_slice(&self.client_name);
        buf.put_slice(&self.public_key);
        buf
    }
}

/// Request 827: resume a session with an already-registered client id.
pub struct ReconnectRequest {
    pub client_id: [u8; CLIENT_ID_SIZE],
    pub client_name: [u8; CLIENT_NAME_SIZE],
}

impl ReconnectRequest {
    pub fn to_bytes(&self) -> BytesMut {
        let header = RequestHeader::new(self.client_id, RequestCode::Reconnection, CLIENT_NAME_SIZE as u32);
        let mut buf = BytesMut::with_capacity(RequestHeader::SIZE + CLIENT_NAME_SIZE);
        header.put(&mut buf);
        buf.put_slice(&self.client_name);
        buf
    }
}

/// Response to 826/827 on success: echoed client id plus the wrapped AES key.
pub struct AesKeyResponse {
    pub client_id: [u8; CLIENT_ID_SIZE],
    pub wrapped_aes_key: [u8; WRAPPED_AES_KEY_SIZE],
}

impl AesKeyResponse {
    pub const PAYLOAD_SIZE: usize = CLIENT_ID_SIZE + WRAPPED_AES_KEY_SIZE;

    pub fn parse(mut payload: &[u8]) -> Result<Self> {
        if payload.remaining() < Self::PAYLOAD_SIZE {
            return Err(ProtocolError::Protocol("short AesKey payload".into()));
        }
        let mut client_id = [0u8; CLIENT_ID_SIZE];
        payload.copy_to_slice(&mut client_id);
        let mut wrapped_aes_key = [0u8; WRAPPED_AES_KEY_SIZE];
        payload.copy_to_slice(&mut wrapped_aes_key);
        Ok(Self { client_id, wrapped_aes_key })
    }
}

/// Request 828: one chunk of the encrypted file.
pub struct SendFileRequest {
    pub client_id: [u8; CLIENT_ID_SIZE],
    pub content_size: u32,
    pub orig_file_size: u32,
    pub packet_number: u16,
    pub total_packets: u16,
    pub file_name: [u8; FILE_NAME_SIZE],
    pub chunk: [u8; CHUNK_SIZE],
    pub chunk_len: usize,
}

impl SendFileRequest {
    const FIXED_PAYLOAD_HEADER: usize = 4 + 4 + 2 + 2 + FILE_NAME_SIZE;

    pub fn to_bytes(&self) -> BytesMut {
        let payload_size = (Self::FIXED_PAYLOAD_HEADER + self.chunk_len) as u32;
        let header = RequestHeader::new(self.client_id, RequestCode::SendingFile, payload_size);
        let mut buf = BytesMut::with_capacity(RequestHeader::SIZE + Self::FIXED_PAYLOAD_HEADER + CHUNK_SIZE);
        header.put(&mut buf);
        buf.put_u32_le(self.content_size);
        buf.put_u32_le(self.orig_file_size);
        buf.put_u16_le(self.packet_number);
        buf.put_u16_le(self.total_packets);
        buf.put_slice(&self.file_name);
        buf.put_slice(&self.chunk);
        buf
    }
}

/// Response to the final 828 packet: server's independently computed CRC.
pub struct FileReceivedResponse {
    pub client_id: [u8; CLIENT_ID_SIZE],
    pub content_size: u32,
    pub file_name: [u8; FILE_NAME_SIZE],
    pub cksum: u32,
}

impl FileReceivedResponse {
    pub const PAYLOAD_SIZE: usize = CLIENT_ID_SIZE + 4 + FILE_NAME_SIZE + 4;

    pub fn parse(mut payload: &[u8]) -> Result<Self> {
        if payload.remaining() < Self::PAYLOAD_SIZE {
            return Err(ProtocolError::Protocol("short FileReceived payload".into()));
        }
        let mut client_id = [0u8; CLIENT_ID_SIZE];
        payload.copy_to_slice(&mut client_id);
        let content_size = payload.get_u32_le();
        let mut file_name = [0u8; FILE_NAME_SIZE];
        payload.copy_to_slice(&mut file_name);
        let cksum = payload.get_u32_le();
        Ok(Self { client_id, content_size, file_name, cksum })
    }
}

/// Response carrying just an echoed client id (intermediate 828 acks, and
/// the ack for 900/901/902).
pub struct MessageAckResponse {
    pub client_id: [u8; CLIENT_ID_SIZE],
}

impl MessageAckResponse {
    pub const PAYLOAD_SIZE: usize = CLIENT_ID_SIZE;

    pub fn parse(mut payload: &[u8]) -> Result<Self> {
        if payload.remaining() < Self::PAYLOAD_SIZE {
            return Err(ProtocolError::Protocol("short MessageAck payload".into()));
        }
        let mut client_id = [0u8; CLIENT_ID_SIZE];
        payload.copy_to_slice(&mut client_id);
        Ok(Self { client_id })
    }
}

/// Requests 900/901/902: report CRC status (valid, invalid-resend, invalid-abort).
pub struct CrcStatusRequest {
    pub client_id: [u8; CLIENT_ID_SIZE],
    pub code: RequestCode,
    pub file_name: [u8; FILE_NAME_SIZE],
}

impl CrcStatusRequest {
    pub fn to_bytes(&self) -> BytesMut {
        let header = RequestHeader::new(self.client_id, self.code, FILE_NAME_SIZE as u32);
        let mut buf = BytesMut::with_capacity(RequestHeader::SIZE + FILE_NAME_SIZE);
        header.put(&mut buf);
        buf.put_slice(&self.file_name);
        buf
    }
}
