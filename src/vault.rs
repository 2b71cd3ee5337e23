//! Encrypted persistence of the reverse codebook
//!
//! Layout: `salt(16) ‖ nonce(12) ‖ AES-256-GCM(bincode(reverse map))`,
//! with the key derived via PBKDF2-HMAC-SHA-256 at 100 000 iterations.
//! Only the reverse map is persisted; the writer already holds the
//! forward view, and a reader with a vault can invert it if it ever
//! needs byte→id again.

use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::codebook::ReverseMap;
use crate::error::{Error, Result};

const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Conventional vault file name for a playlist base name
pub fn vault_path(base: &str) -> PathBuf {
    PathBuf::from(format!("{}_Decoder.gob", base))
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Seal the reverse map under the password and write it to `path`.
pub fn save(path: &Path, reverse: &ReverseMap, password: &str) -> Result<()> {
    let plaintext =
        bincode::serialize(reverse).map_err(|e| Error::Crypto(format!("serialize: {}", e)))?;

    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| Error::Crypto(format!("cipher init: {}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|_| Error::Crypto("encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    std::fs::write(path, out)?;

    tracing::info!(path = %path.display(), "decoder vault written");
    Ok(())
}

/// Open a vault file with the password and recover the reverse map.
///
/// A failed tag check means the password is wrong or the file was
/// altered; it is reported distinctly from structural corruption.
pub fn load(path: &Path, password: &str) -> Result<ReverseMap> {
    let data = std::fs::read(path)?;
    if data.len() < SALT_SIZE + NONCE_SIZE {
        return Err(Error::Crypto("vault file corrupted or too short".to_string()));
    }

    let (salt, rest) = data.split_at(SALT_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

    let key = derive_key(password, salt);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| Error::Crypto(format!("cipher init: {}", e)))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::VaultAuthentication)?;

    bincode::deserialize(&plaintext).map_err(|e| Error::Crypto(format!("deserialize: {}", e)))
}
