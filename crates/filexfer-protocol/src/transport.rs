//! Blocking, one-shot-per-call TCP framing over fixed 1024-byte packets.

use crate::error::{ProtocolError, Result};
use crate::wire::PACKET_SIZE;
use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpStream};
use std::str::FromStr;
use tracing::debug;

/// Validate a host string the way the reference client does: the literal
/// `localhost`/`LOCALHOST`, or an IPv4 dotted-quad. No DNS resolution of
/// arbitrary hostnames.
pub fn is_valid_address(host: &str) -> bool {
    host == "localhost" || host == "LOCALHOST" || Ipv4Addr::from_str(host).is_ok()
}

/// A port is valid if it parses as an integer greater than zero.
pub fn is_valid_port(port: &str) -> bool {
    port.parse::<i64>().is_ok_and(|p| p > 0)
}

/// Connects fresh for every `communicate` call and tears the connection
/// down on the way out, success or failure.
pub struct FrameTransport {
    host: String,
    port: u16,
}

impl FrameTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        if !is_valid_address(&host) {
            return Err(ProtocolError::Config(format!("invalid address: {host}")));
        }
        if port == 0 {
            return Err(ProtocolError::Config("port must be greater than zero".into()));
        }
        Ok(Self { host, port })
    }

    /// Open a connection, send `request`, read back exactly
    /// `expected_recv_len` logical bytes, then close. One TCP connection
    /// lives for the duration of this call and no longer.
    pub fn communicate(&self, request: &[u8], expected_recv_len: usize) -> Result<Vec<u8>> {
        let addr = format!("{}:{}", self.host, self.port);
        debug!(%addr, send_len = request.len(), expected_recv_len, "opening transport connection");
        let mut stream = TcpStream::connect(&addr)?;
        let result = (|| {
            send_framed(&mut stream, request)?;
            recv_framed(&mut stream, expected_recv_len)
        })();
        let _ = stream.shutdown(std::net::Shutdown::Both);
        result
    }
}

/// Send `data` in fixed 1024-byte packets, zero-padding the final packet.
fn send_framed(stream: &mut TcpStream, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(ProtocolError::Transport("refusing to send an empty request".into()));
    }
    let mut sent = 0usize;
    while sent < data.len() {
        let take = (data.len() - sent).min(PACKET_SIZE);
        let mut packet = [0u8; PACKET_SIZE];
        packet[..take].copy_from_slice(&data[sent..sent + take]);
        convert_endianness(&mut packet);
        stream.write_all(&packet)?;
        sent += take;
    }
    Ok(())
}

/// Receive exactly `want` logical bytes, reading the wire in fixed
/// 1024-byte packets and copying `min(bytes_read, remaining)` of each into
/// the logical buffer, matching the reference client's `receiveData`.
fn recv_framed(stream: &mut TcpStream, want: usize) -> Result<Vec<u8>> {
    if want == 0 {
        return Err(ProtocolError::Transport("refusing to receive zero bytes".into()));
    }
    let mut out = Vec::with_capacity(want);
    while out.len() < want {
        let mut packet = [0u8; PACKET_SIZE];
        let read = stream.read(&mut packet)?;
        if read == 0 {
            return Err(ProtocolError::Transport("connection closed before response completed".into()));
        }
        convert_endianness(&mut packet);
        let remaining = want - out.len();
        let take = read.min(remaining);
        out.extend_from_slice(&packet[..take]);
    }
    Ok(out)
}

/// Reinterpret the packet as a sequence of `u32` words and pass each
/// through `htonl`, but only on a big-endian host — exactly mirroring the
/// reference transport's `convertEndianess`. On a little-endian host this
/// is skipped entirely; on a big-endian host `htonl` is the identity
/// transform, so in practice this never changes a byte. It is kept
/// field-layout-unaware (word-wise, not struct-aware) on purpose: that is
/// the wire behavior this client must interoperate with.
#[cfg(target_endian = "big")]
fn convert_endianness(packet: &mut [u8; PACKET_SIZE]) {
    for word in packet.chunks_exact_mut(4) {
        let native = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]);
        let net = native.to_be();
        word.copy_from_slice(&net.to_ne_bytes());
    }
}

#[cfg(not(target_endian = "big"))]
fn convert_endianness(_packet: &mut [u8; PACKET_SIZE]) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_validation() {
        assert!(is_valid_address("localhost"));
        assert!(is_valid_address("LOCALHOST"));
        assert!(is_valid_address("127.0.0.1"));
        assert!(!is_valid_address("not-an-address"));
        assert!(!is_valid_address("::1"));
    }

    #[test]
    fn port_validation() {
        assert!(is_valid_port("1234"));
        assert!(!is_valid_port("0"));
        assert!(!is_valid_port("-1"));
        assert!(!is_valid_port("abc"));
    }

    #[test]
    fn transport_rejects_invalid_address() {
        assert!(FrameTransport::new("not-an-address", 1234).is_err());
    }

    #[test]
    fn transport_rejects_zero_port() {
        assert!(FrameTransport::new("localhost", 0).is_err());
    }

    #[test]
    fn convert_endianness_is_a_documented_no_op_on_this_host() {
        let mut packet = [0u8; PACKET_SIZE];
        packet[0] = 0xDE;
        packet[1] = 0xAD;
        packet[2] = 0xBE;
        packet[3] = 0xEF;
        let before = packet;
        convert_endianness(&mut packet);
        assert_eq!(packet, before);
    }
}
