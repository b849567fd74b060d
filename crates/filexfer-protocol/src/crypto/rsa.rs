//! RSA-1024 key-pair generation, public-key serialization, and private-key
//! unwrapping of the server-supplied AES session key.

use crate::error::{ProtocolError, Result};
use crate::wire::{AES_KEY_SIZE, RSA_KEY_SIZE, WRAPPED_AES_KEY_SIZE};
use base64::Engine;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

const RSA_BITS: usize = 1024;

/// Generate a fresh RSA-1024 key pair.
pub fn generate_keypair() -> Result<(RsaPrivateKey, RsaPublicKey)> {
    let mut rng = OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, RSA_BITS)
        .map_err(|e| ProtocolError::CryptoOp(format!("RSA keygen failed: {e}")))?;
    let public_key = RsaPublicKey::from(&private_key);
    Ok((private_key, public_key))
}

/// Serialize `public_key` to its PKCS#1 DER wire form and confirm it is
/// exactly [`RSA_KEY_SIZE`] bytes, the fixed width the wire format expects.
pub fn public_key_to_wire_bytes(public_key: &RsaPublicKey) -> Result<[u8; RSA_KEY_SIZE]> {
    let der = public_key
        .to_pkcs1_der()
        .map_err(|e| ProtocolError::CryptoOp(format!("RSA public key DER encoding failed: {e}")))?;
    let bytes = der.as_bytes();
    if bytes.len() != RSA_KEY_SIZE {
        return Err(ProtocolError::CryptoSize {
            what: "RSA public key",
            expected: RSA_KEY_SIZE,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; RSA_KEY_SIZE];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Base64-encode `private_key`'s PKCS#1 DER form for persistence.
pub fn private_key_to_base64(private_key: &RsaPrivateKey) -> Result<String> {
    let der = private_key
        .to_pkcs1_der()
        .map_err(|e| ProtocolError::CryptoOp(format!("RSA private key DER encoding failed: {e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(der.as_bytes()))
}

/// Inverse of [`private_key_to_base64`], used on the reconnect path.
pub fn private_key_from_base64(encoded: &str) -> Result<RsaPrivateKey> {
    let der = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ProtocolError::CryptoOp(format!("invalid base64 private key: {e}")))?;
    RsaPrivateKey::from_pkcs1_der(&der)
        .map_err(|e| ProtocolError::CryptoOp(format!("invalid RSA private key DER: {e}")))
}

/// RSA-decrypt the server-supplied wrapped AES key (PKCS#1 v1.5) and take
/// the first 16 bytes of the plaintext as the AES session key.
pub fn decrypt_wrapped_aes_key(
    private_key: &RsaPrivateKey,
    wrapped: &[u8; WRAPPED_AES_KEY_SIZE],
) -> Result<[u8; AES_KEY_SIZE]> {
    let decrypted = private_key
        .decrypt(Pkcs1v15Encrypt, wrapped)
        .map_err(|e| ProtocolError::CryptoOp(format!("RSA decryption of wrapped AES key failed: {e}")))?;
    if decrypted.len() < AES_KEY_SIZE {
        return Err(ProtocolError::CryptoSize {
            what: "decrypted AES key",
            expected: AES_KEY_SIZE,
            actual: decrypted.len(),
        });
    }
    let mut key = [0u8; AES_KEY_SIZE];
    key.copy_from_slice(&decrypted[..AES_KEY_SIZE]);
    Ok(key)
}
