//! Password-derived byte↔resource codebook
//!
//! A password deterministically selects 256 distinct resource ids: the
//! SHA-256 of the password seeds a PCG stream per modifier, each stream
//! yields a short alphanumeric search query, and search results are
//! assigned to byte values in arrival order until all 256 are covered.
//!
//! Determinism is best-effort: the provider's search results drift over
//! time, which is why the reverse map is also persisted in the vault.

use std::collections::HashMap;

use rand::Rng;
use rand_pcg::Pcg64;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::provider::{PlaylistProvider, ProviderError};

/// byte value → resource id, used by the writer
pub type ForwardMap = HashMap<u8, String>;
/// resource id → byte value, used by the reader
pub type ReverseMap = HashMap<String, u8>;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The 256-entry bijection between byte values and resource ids
pub struct Codebook {
    forward: ForwardMap,
    reverse: ReverseMap,
}

impl Codebook {
    /// Derive the codebook from the password by querying the provider.
    ///
    /// Never returns partial: the loop runs until all 256 byte values
    /// are assigned or the token is cancelled. Terminal API errors on a
    /// single search are logged and skipped to the next modifier.
    pub async fn build(
        provider: &dyn PlaylistProvider,
        password: &str,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let seed = base_seed(password);
        let query_len = provider.limits().query_len;

        let mut forward = ForwardMap::with_capacity(256);
        let mut reverse = ReverseMap::with_capacity(256);
        let mut modifier: u64 = 0;

        while forward.len() < 256 {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled.into());
            }

            let query = seed_query(seed, modifier, query_len);
            modifier = modifier.wrapping_add(1);

            let candidates = match provider.search(&query, cancel).await {
                Ok(candidates) => candidates,
                Err(ProviderError::Cancelled) => return Err(ProviderError::Cancelled.into()),
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "search failed, moving on");
                    continue;
                }
            };

            for id in candidates {
                if forward.len() == 256 {
                    break;
                }
                if id.is_empty() {
                    continue;
                }
                if reverse.contains_key(&id) {
                    tracing::debug!(id = %id, "collision, skipping");
                    continue;
                }

                let byte = forward.len() as u8;
                reverse.insert(id.clone(), byte);
                forward.insert(byte, id);
            }

            tracing::info!("codebook {}/256", forward.len());
        }

        Ok(Self { forward, reverse })
    }

    pub fn forward(&self) -> &ForwardMap {
        &self.forward
    }

    pub fn reverse(&self) -> &ReverseMap {
        &self.reverse
    }

    /// Discard the forward view, keeping the decoder side
    pub fn into_reverse(self) -> ReverseMap {
        self.reverse
    }
}

/// First 8 bytes of SHA-256(password), big-endian
pub fn base_seed(password: &str) -> u64 {
    let digest = Sha256::digest(password.as_bytes());
    let head: [u8; 8] = digest[..8].try_into().expect("SHA-256 digest is 32 bytes");
    u64::from_be_bytes(head)
}

/// Fixed-length alphanumeric query from a PCG(seed + modifier, 0) stream
pub fn seed_query(base_seed: u64, modifier: u64, len: usize) -> String {
    let mut rng = Pcg64::new(u128::from(base_seed.wrapping_add(modifier)), 0);

    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
