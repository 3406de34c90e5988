use crate::error::SyncError;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use database::EncryptedCredentials;
use core_types::BrokerCredentials;

pub const ENCRYPTION_KEY_ENV_VAR: &str = "ENCRYPTION_KEY";

const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

/// Encrypts broker credentials at rest with AES-256-GCM.
///
/// Each value is stored as `hex(nonce):hex(tag):hex(ciphertext)` with a fresh
/// random nonce, so encrypting the same text twice never yields the same string.
#[derive(Clone)]
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    /// Builds a vault from a 64-character hex key (32 bytes).
    pub fn from_hex(key: &str) -> Result<Self, SyncError> {
        let trimmed = key.trim();
        if trimmed.len() != 64 {
            return Err(SyncError::Vault(format!(
                "{ENCRYPTION_KEY_ENV_VAR} must be a 64-character hex string (32 bytes)"
            )));
        }
        let bytes = hex::decode(trimmed)
            .map_err(|_| SyncError::Vault(format!("{ENCRYPTION_KEY_ENV_VAR} is not valid hex")))?;
        let cipher = Aes256Gcm::new_from_slice(&bytes)
            .map_err(|_| SyncError::Vault("Failed to initialize cipher.".to_string()))?;
        Ok(Self { cipher })
    }

    /// Reads the key from `ENCRYPTION_KEY`.
    pub fn from_env() -> Result<Self, SyncError> {
        let key = std::env::var(ENCRYPTION_KEY_ENV_VAR).unwrap_or_default();
        Self::from_hex(&key)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, SyncError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| SyncError::Vault("Failed to encrypt value.".to_string()))?;

        // aes-gcm appends the tag to the ciphertext.
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LENGTH);
        Ok(format!(
            "{}:{}:{}",
            hex::encode(nonce),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, SyncError> {
        let invalid = || SyncError::Vault("Invalid encrypted string format".to_string());

        let parts: Vec<&str> = stored.split(':').collect();
        let [nonce, tag, ciphertext] = parts.as_slice() else {
            return Err(invalid());
        };
        let nonce = hex::decode(nonce).map_err(|_| invalid())?;
        let tag = hex::decode(tag).map_err(|_| invalid())?;
        let ciphertext = hex::decode(ciphertext).map_err(|_| invalid())?;
        if nonce.len() != NONCE_LENGTH || tag.len() != TAG_LENGTH {
            return Err(invalid());
        }

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), sealed.as_ref())
            .map_err(|_| SyncError::Vault("Failed to decrypt value.".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| SyncError::Vault("Decrypted value is not valid UTF-8.".to_string()))
    }

    pub fn seal(&self, credentials: &BrokerCredentials) -> Result<EncryptedCredentials, SyncError> {
        Ok(EncryptedCredentials {
            username: self.encrypt(&credentials.username)?,
            password: self.encrypt(&credentials.password)?,
            cid: self.encrypt(&credentials.cid)?,
            secret: self.encrypt(&credentials.secret)?,
        })
    }

    pub fn open(&self, stored: &EncryptedCredentials) -> Result<BrokerCredentials, SyncError> {
        Ok(BrokerCredentials {
            username: self.decrypt(&stored.username)?,
            password: self.decrypt(&stored.password)?,
            cid: self.decrypt(&stored.cid)?,
            secret: self.decrypt(&stored.secret)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn stored_values_have_three_hex_parts() {
        let vault = CredentialVault::from_hex(KEY).unwrap();
        let stored = vault.encrypt("hunter2").unwrap();
        let parts: Vec<&str> = stored.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), NONCE_LENGTH * 2);
        assert_eq!(parts[1].len(), TAG_LENGTH * 2);
        assert_eq!(vault.decrypt(&stored).unwrap(), "hunter2");
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let vault = CredentialVault::from_hex(KEY).unwrap();
        assert_ne!(vault.encrypt("cid").unwrap(), vault.encrypt("cid").unwrap());
    }

    #[test]
    fn wrong_key_cannot_decrypt() {
        let vault = CredentialVault::from_hex(KEY).unwrap();
        let other = CredentialVault::from_hex(&"ab".repeat(32)).unwrap();
        let stored = vault.encrypt("secret").unwrap();
        assert!(matches!(other.decrypt(&stored), Err(SyncError::Vault(_))));
    }

    #[test]
    fn tampered_tag_is_rejected() {
        let vault = CredentialVault::from_hex(KEY).unwrap();
        let stored = vault.encrypt("secret").unwrap();
        let mut parts: Vec<String> = stored.split(':').map(String::from).collect();
        parts[1] = "00".repeat(TAG_LENGTH);
        assert!(vault.decrypt(&parts.join(":")).is_err());
    }

    #[test]
    fn malformed_values_are_rejected() {
        let vault = CredentialVault::from_hex(KEY).unwrap();
        assert!(vault.decrypt("not-encrypted").is_err());
        assert!(vault.decrypt("zz:zz:zz").is_err());
    }

    #[test]
    fn short_keys_are_rejected() {
        assert!(CredentialVault::from_hex("abcd").is_err());
        assert!(CredentialVault::from_hex(&"zz".repeat(32)).is_err());
    }
}
