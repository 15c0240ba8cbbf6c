//! # Runtime Configuration
//!
//! Tunables shared by the tracker and the peers. The default payload cap fits
//! a swarm snapshot of several hundred-segment files.

use std::time::Duration;

/// Default number of segments fetched per download round.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default maximum payload size accepted by the transport, in bytes.
pub const DEFAULT_MAX_PAYLOAD: usize = 40_000;

/// Default pause between download rounds that found nothing to fetch, in
/// milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Settings for one simulated swarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of segments a peer fetches between two tracker round-trips
    pub batch_size: usize,
    /// Largest payload the transport will carry
    pub max_payload: usize,
    /// Pause before asking the tracker again when a round found nothing to fetch
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            batch_size: DEFAULT_BATCH_SIZE,
            max_payload: DEFAULT_MAX_PAYLOAD,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}
