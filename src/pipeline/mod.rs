//! Writer and reader pipelines
//!
//! Both sides share the same topology: a driver on the chain-order path,
//! a bounded job channel, and a small pool of workers talking to the
//! provider. The writer's driver creates and links playlists before any
//! append touches them; the reader's driver assigns sequence numbers at
//! dispatch time and reassembles results through a reorder buffer.

pub mod reader;
pub mod writer;

pub use reader::read_chain;
pub use writer::write_file;

use std::time::Duration;

/// Workers per pipeline
pub(crate) const NUM_WORKERS: usize = 3;

/// Reader idle timer; safety net for a quiet results channel
pub(crate) const IDLE_CHECK: Duration = Duration::from_secs(10);

/// All chunks destined for one playlist
#[derive(Debug)]
pub struct WriteJob {
    pub playlist_id: String,
    pub chunks: Vec<Vec<u8>>,
}

/// One playlist to fetch, tagged with its position in the chain
#[derive(Debug)]
pub struct ReadJob {
    pub sequence: usize,
    pub playlist_id: String,
}

/// Decoded contents of one playlist
#[derive(Debug)]
pub struct ReadResult {
    pub sequence: usize,
    pub data: Vec<u8>,
    /// Successor reported by the worker; the driver walks the chain
    /// itself, this is only informational
    pub next_id: Option<String>,
}
