//! AES-128-CBC with a fixed all-zero IV and zero-padding.
//!
//! This is not "insecure default" carelessness — it is the exact pipeline
//! this wire protocol requires to interoperate with the server, reproduced
//! bit-for-bit rather than upgraded. Block chaining is done by hand with
//! `aes::Aes128`'s block primitive, the same way the rest of this
//! workspace's crypto layer drives the `aes` crate directly rather than
//! reaching for a CBC-mode crate.

use crate::error::{ProtocolError, Result};
use crate::wire::AES_KEY_SIZE;
use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray};

const BLOCK_SIZE: usize = 16;
const ZERO_IV: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Zero-pad `data` to a multiple of 16 bytes, then AES-128-CBC encrypt it
/// with an all-zero IV. Returns ciphertext of length `data.len()` rounded
/// up to the next multiple of 16 (or exactly 16 if `data` is empty).
pub fn encrypt_cbc_zero_pad(key: &[u8; AES_KEY_SIZE], data: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128::new(GenericArray::from_slice(key));

    let padded_len = data.len().div_ceil(BLOCK_SIZE).max(1) * BLOCK_SIZE;
    let mut padded = vec![0u8; padded_len];
    padded[..data.len()].copy_from_slice(data);

    let mut out = Vec::with_capacity(padded_len);
    let mut prev = ZERO_IV;
    for block in padded.chunks_exact(BLOCK_SIZE) {
        let mut xored = [0u8; BLOCK_SIZE];
        for i in 0..BLOCK_SIZE {
            xored[i] = block[i] ^ prev[i];
        }
        let mut ga = GenericArray::clone_from_slice(&xored);
        cipher.encrypt_block(&mut ga);
        prev.copy_from_slice(&ga);
        out.extend_from_slice(&ga);
    }
    Ok(out)
}

/// Inverse of [`encrypt_cbc_zero_pad`]. Does not strip the zero padding —
/// the caller knows the original plaintext length independently (it is
/// carried on the wire as `origFileSize`) and truncates to that.
pub fn decrypt_cbc_zero_pad(key: &[u8; AES_KEY_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() % BLOCK_SIZE != 0 || ciphertext.is_empty() {
        return Err(ProtocolError::CryptoSize {
            what: "AES-CBC ciphertext",
            expected: BLOCK_SIZE,
            actual: ciphertext.len(),
        });
    }
    let cipher = Aes128::new(GenericArray::from_slice(key));

    let mut out = Vec::with_capacity(ciphertext.len());
    let mut prev = ZERO_IV;
    for block in ciphertext.chunks_exact(BLOCK_SIZE) {
        let mut ga = GenericArray::clone_from_slice(block);
        cipher.decrypt_block(&mut ga);
        let mut plain = [0u8; BLOCK_SIZE];
        for i in 0..BLOCK_SIZE {
            plain[i] = ga[i] ^ prev[i];
        }
        prev.copy_from_slice(block);
        out.extend_from_slice(&plain);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; AES_KEY_SIZE] = *b"0123456789abcdef";

    #[test]
    fn roundtrip_non_block_aligned_input() {
        let plaintext = b"hello\n";
        let ciphertext = encrypt_cbc_zero_pad(&KEY, plaintext).unwrap();
        assert_eq!(ciphertext.len(), 16);
        let decrypted = decrypt_cbc_zero_pad(&KEY, &ciphertext).unwrap();
        assert_eq!(&decrypted[..plaintext.len()], plaintext);
        assert!(decrypted[plaintext.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn roundtrip_block_aligned_input() {
        let plaintext = vec![0x42u8; 32];
        let ciphertext = encrypt_cbc_zero_pad(&KEY, &plaintext).unwrap();
        assert_eq!(ciphertext.len(), 32);
        let decrypted = decrypt_cbc_zero_pad(&KEY, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn ciphertext_length_is_always_a_multiple_of_block_size() {
        for len in 0..40 {
            let data = vec![0u8; len];
            let ciphertext = encrypt_cbc_zero_pad(&KEY, &data).unwrap();
            assert_eq!(ciphertext.len() % 16, 0);
        }
    }

    #[test]
    fn decrypt_rejects_non_block_aligned_ciphertext() {
        let bad = vec![0u8; 17];
        assert!(decrypt_cbc_zero_pad(&KEY, &bad).is_err());
    }
}
