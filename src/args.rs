//! # Command-Line Arguments
//!
//! ## Arguments
//!
//! - `<dir>`: directory holding the peer manifests `in1.txt`, `in2.txt`, ...
//! - `-n, --peers <N>`: number of peers (defaults to the manifests found)
//! - `-o, --output <DIR>`: where completed files are written (defaults to `<dir>`)
//! - `-b, --batch-size <N>`: segments fetched per download round
//! - `--max-payload <BYTES>`: largest message the transport carries
//! - `--poll-interval-ms <MS>`: pause between idle download rounds
//!
//! ## Example
//!
//! ```bash
//! swarmsim tests/swarm1
//! swarmsim tests/swarm1 -n 3 -o /tmp/out
//! ```

use swarmsim::config::{Config, DEFAULT_BATCH_SIZE, DEFAULT_MAX_PAYLOAD, DEFAULT_POLL_INTERVAL_MS};

use clap::Parser;

use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Simulate a BitTorrent-style swarm of peers around a single tracker."
)]
pub struct Args {
    /// Directory holding the peer manifests (in1.txt, in2.txt, ...)
    pub dir: PathBuf,

    /// Number of peers (defaults to the number of manifests found)
    #[arg(short = 'n', long)]
    pub peers: Option<u32>,

    /// Directory for completed files (defaults to the manifest directory)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Segments fetched per download round
    #[arg(short = 'b', long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Largest message payload the transport carries, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,

    /// Pause between download rounds that found nothing to fetch, in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
}

impl Args {
    /// Swarm settings selected on the command line.
    pub fn config(&self) -> Config {
        Config {
            batch_size: self.batch_size,
            max_payload: self.max_payload,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}
