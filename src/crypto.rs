//! At-rest encryption for journal entry bodies.
//!
//! AES-256-GCM with a fresh random 96-bit nonce per entry. Ciphertext, nonce
//! and authentication tag are stored as three separate hex columns; an entry
//! is never persisted or decrypted without all three. Tag verification
//! failure is surfaced as `AppError::Integrity`, never as garbage plaintext.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};

use crate::error::{AppError, AppResult};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypted representation of one entry body, hex-encoded for storage.
#[derive(Debug, Clone)]
pub struct EncryptedEntry {
    pub ciphertext: String,
    pub nonce: String,
    pub tag: String,
}

pub struct EntryCipher {
    cipher: Aes256Gcm,
}

impl EntryCipher {
    /// Builds the cipher from a 64-hex-char (32 byte) key. Fatal at startup
    /// if the key is missing or malformed.
    pub fn from_hex(key_hex: &str) -> AppResult<Self> {
        let key = hex::decode(key_hex.trim())
            .map_err(|_| AppError::Config("ENCRYPTION_KEY is not valid hex".into()))?;
        if key.len() != KEY_LEN {
            return Err(AppError::Config(format!(
                "ENCRYPTION_KEY must be {} bytes ({} hex chars), got {} bytes",
                KEY_LEN,
                KEY_LEN * 2,
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| AppError::Config("ENCRYPTION_KEY rejected by cipher".into()))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> AppResult<EncryptedEntry> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        // The AEAD API appends the 16-byte tag to the ciphertext; split it
        // off so the stored schema keeps the three fields separate.
        let mut sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| AppError::Integrity)?;
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(EncryptedEntry {
            ciphertext: hex::encode(sealed),
            nonce: hex::encode(nonce),
            tag: hex::encode(tag),
        })
    }

    pub fn decrypt(&self, ciphertext_hex: &str, nonce_hex: &str, tag_hex: &str) -> AppResult<String> {
        let ciphertext = hex::decode(ciphertext_hex).map_err(|_| AppError::Integrity)?;
        let nonce = hex::decode(nonce_hex).map_err(|_| AppError::Integrity)?;
        let tag = hex::decode(tag_hex).map_err(|_| AppError::Integrity)?;

        if nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(AppError::Integrity);
        }

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), sealed.as_slice())
            .map_err(|_| AppError::Integrity)?;

        String::from_utf8(plaintext).map_err(|_| AppError::Integrity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> EntryCipher {
        EntryCipher::from_hex(&"ab".repeat(32)).unwrap()
    }

    /// Flip one bit in the middle of a hex string.
    fn corrupt(hex_str: &str) -> String {
        let mut bytes = hex::decode(hex_str).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x01;
        hex::encode(bytes)
    }

    #[test]
    fn roundtrip() {
        let cipher = test_cipher();
        let entry = cipher.encrypt("Today was a quiet, good day.").unwrap();
        let plaintext = cipher
            .decrypt(&entry.ciphertext, &entry.nonce, &entry.tag)
            .unwrap();
        assert_eq!(plaintext, "Today was a quiet, good day.");
    }

    #[test]
    fn roundtrip_empty_and_unicode() {
        let cipher = test_cipher();
        for text in ["", "émotions — 日記 📓", "line1\nline2"] {
            let entry = cipher.encrypt(text).unwrap();
            assert_eq!(
                cipher
                    .decrypt(&entry.ciphertext, &entry.nonce, &entry.tag)
                    .unwrap(),
                text
            );
        }
    }

    #[test]
    fn nonce_is_fresh_per_call() {
        let cipher = test_cipher();
        let a = cipher.encrypt("same text").unwrap();
        let b = cipher.encrypt("same text").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = test_cipher();
        let entry = cipher.encrypt("private thoughts").unwrap();
        let result = cipher.decrypt(&corrupt(&entry.ciphertext), &entry.nonce, &entry.tag);
        assert!(matches!(result, Err(AppError::Integrity)));
    }

    #[test]
    fn tampered_nonce_fails() {
        let cipher = test_cipher();
        let entry = cipher.encrypt("private thoughts").unwrap();
        let result = cipher.decrypt(&entry.ciphertext, &corrupt(&entry.nonce), &entry.tag);
        assert!(matches!(result, Err(AppError::Integrity)));
    }

    #[test]
    fn tampered_tag_fails() {
        let cipher = test_cipher();
        let entry = cipher.encrypt("private thoughts").unwrap();
        let result = cipher.decrypt(&entry.ciphertext, &entry.nonce, &corrupt(&entry.tag));
        assert!(matches!(result, Err(AppError::Integrity)));
    }

    #[test]
    fn wrong_key_fails() {
        let cipher = test_cipher();
        let other = EntryCipher::from_hex(&"cd".repeat(32)).unwrap();
        let entry = cipher.encrypt("private thoughts").unwrap();
        assert!(other
            .decrypt(&entry.ciphertext, &entry.nonce, &entry.tag)
            .is_err());
    }

    #[test]
    fn malformed_fields_fail_loudly() {
        let cipher = test_cipher();
        let entry = cipher.encrypt("x").unwrap();
        // not hex
        assert!(cipher.decrypt("zz", &entry.nonce, &entry.tag).is_err());
        // truncated nonce / tag
        assert!(cipher.decrypt(&entry.ciphertext, "aabb", &entry.tag).is_err());
        assert!(cipher.decrypt(&entry.ciphertext, &entry.nonce, "aabb").is_err());
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(matches!(
            EntryCipher::from_hex("not-hex"),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            EntryCipher::from_hex(&"ab".repeat(16)),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            EntryCipher::from_hex(&"ab".repeat(33)),
            Err(AppError::Config(_))
        ));
    }
}
