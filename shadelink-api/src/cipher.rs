use core::fmt;

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use serde::{Deserialize, Serialize};

/// Key and nonce are both normalized to one AES block
pub const BLOCK_SIZE: usize = 16;

/// Session credential attached to privileged requests, rendered as uppercase hex.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible = self.0.get(..4).unwrap_or(&self.0);
        write!(f, "AccessToken({visible}…)")
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives access tokens from gateway-issued session nonces.
///
/// The shared secret is zero-padded (or truncated) to a single AES-128 key;
/// each nonce is treated the same way and encrypted as one block without
/// chaining or padding.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes128,
}

impl TokenCipher {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let key = to_block(secret.as_ref());

        Self {
            cipher: Aes128::new(&GenericArray::from(key)),
        }
    }

    pub fn derive(&self, nonce: impl AsRef<[u8]>) -> AccessToken {
        let mut block = GenericArray::from(to_block(nonce.as_ref()));
        self.cipher.encrypt_block(&mut block);

        AccessToken(hex::encode_upper(block))
    }
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

/// One-shot form of [`TokenCipher::derive`]
pub fn derive_access_token(secret: impl AsRef<[u8]>, nonce: impl AsRef<[u8]>) -> AccessToken {
    TokenCipher::new(secret).derive(nonce)
}

fn to_block(input: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    let len = input.len().min(BLOCK_SIZE);
    block[..len].copy_from_slice(&input[..len]);
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fips_197_vector() {
        let key: Vec<u8> = (0u8..16).collect();
        let plaintext = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];

        let token = derive_access_token(&key, plaintext);
        assert_eq!(token.as_str(), "69C4E0D86A7B0430D8CDB78070B4C55A");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let cipher = TokenCipher::new("74ae544c-d16e-4c");
        let first = cipher.derive("A1B2C3D4E5F60718");
        let second = cipher.derive("A1B2C3D4E5F60718");

        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), BLOCK_SIZE * 2);
        assert!(
            first
                .as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_inputs_change_output() {
        let base = derive_access_token("secret-key", "nonce-1");
        assert_ne!(base, derive_access_token("secret-key", "nonce-2"));
        assert_ne!(base, derive_access_token("other-key", "nonce-1"));
    }

    #[test]
    fn test_padding_and_truncation() {
        // Short inputs are zero-padded to a full block
        assert_eq!(
            derive_access_token("abc", "xyz"),
            derive_access_token(b"abc\0\0\0\0\0\0\0\0\0\0\0\0\0", b"xyz\0\0\0\0\0\0\0\0\0\0\0\0\0")
        );

        // Bytes past the first block are ignored
        assert_eq!(
            derive_access_token("0123456789abcdefIGNORED", "fedcba9876543210"),
            derive_access_token("0123456789abcdef", "fedcba9876543210tail")
        );
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let token = derive_access_token("secret", "nonce");
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains(token.as_str()));
    }
}
