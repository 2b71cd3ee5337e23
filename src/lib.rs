//! tunefs — store arbitrary files as linked playlists
//!
//! A password deterministically selects 256 media resources on a hosting
//! service (Spotify or YouTube); each payload byte maps to one resource
//! appended to a playlist, and playlists are chained through their
//! description fields. The head playlist id and the password are all a
//! reader needs; the encrypted vault file makes decoding independent of
//! the provider's search staying stable.

pub mod auth;
pub mod cli;
pub mod codebook;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod transport;
pub mod vault;

pub use crate::error::{Error, Result};
