//! # Swarm Launcher
//!
//! Wires a whole simulated swarm together in one process:
//!
//! 1. **Network**: one [`Switchboard`] for the tracker and peers `1..=N`
//! 2. **Tracker thread**: runs the tracker state machine
//! 3. **Peer threads**: one [`PeerSession`] per manifest, peer `i + 1` for
//!    manifest `i`
//! 4. **Collection**: joins every thread and gathers the final state
//!
//! The run returns once every peer has been stopped by the tracker.

use crate::config::Config;
use crate::files::FileTable;
use crate::manifest::Manifest;
use crate::output::CompletionSink;
use crate::peer::*;
use crate::registry::Registry;
use crate::tracker::Tracker;
use crate::transport::Switchboard;

use anyhow::{anyhow, Context, Result};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Final state of a finished swarm.
#[derive(Debug, Clone)]
pub struct SwarmReport {
    /// The tracker's registry when it stopped
    pub registry: Registry,
    /// Each peer's file table when it stopped
    pub peers: BTreeMap<PeerId, FileTable>,
}

/// Run a swarm of `manifests.len()` peers to completion.
///
/// # Arguments
///
/// * `config` - Swarm settings.
/// * `manifests` - One manifest per peer, in peer order.
/// * `sink` - Receiver of every completed file.
///
/// # Errors
///
/// Returns the first error of the tracker or of any peer. A participant that
/// fails leaves the others waiting for it, so errors are only reported for
/// failures the swarm can still reach the end of.
pub fn run(config: Config, manifests: Vec<Manifest>, sink: Arc<dyn CompletionSink>) -> Result<SwarmReport> {
    let nb_peers = manifests.len() as u32;
    let peer_ids: Vec<PeerId> = (1..=nb_peers).map(PeerId::new).collect();

    let mut switchboard = Switchboard::new((0..=nb_peers).map(PeerId::new), config.max_payload);

    let tracker_endpoint = switchboard
        .endpoint(PeerId::TRACKER)
        .ok_or_else(|| anyhow!("no endpoint for the tracker"))?;
    let tracker = Tracker::new(tracker_endpoint, peer_ids.clone());
    let tracker_handle = thread::Builder::new()
        .name("tracker".to_string())
        .spawn(move || tracker.run())
        .context("could not spawn tracker")?;

    let mut handles: Vec<(PeerId, JoinHandle<Result<FileTable>>)> = Vec::new();
    for (id, manifest) in peer_ids.into_iter().zip(manifests) {
        let endpoint = switchboard
            .endpoint(id)
            .ok_or_else(|| anyhow!("no endpoint for peer {id}"))?;
        let session = PeerSession::new(endpoint, manifest, Arc::clone(&sink), config.clone());

        let handle = thread::Builder::new()
            .name(format!("peer-{id}"))
            .spawn(move || session.run())
            .with_context(|| format!("could not spawn peer {id}"))?;
        handles.push((id, handle));
    }

    let mut peers = BTreeMap::new();
    for (id, handle) in handles {
        let files = handle
            .join()
            .map_err(|_| anyhow!("peer {id} panicked"))?
            .with_context(|| format!("peer {id} failed"))?;
        peers.insert(id, files);
    }

    let registry = tracker_handle
        .join()
        .map_err(|_| anyhow!("tracker panicked"))?
        .context("tracker failed")?;

    info!("Swarm of {} peers finished", nb_peers);

    Ok(SwarmReport { registry, peers })
}
