//! Cryptographic primitives: RSA key exchange, AES-CBC file encryption,
//! and the CRC-32 variant compared against the server's checksum.

pub mod aes;
pub mod crc32;
pub mod rsa;
