//! # Tracker
//!
//! The tracker is participant `0`. It never exchanges segments itself; it
//! keeps the [`Registry`] of who owns what and answers peers' questions about
//! it.
//!
//! ## State Machine
//!
//! ```text
//! Registering --(all inventories in, acks sent)--> Serving
//! Serving     --(every peer sent Done)-----------> Draining
//! Draining    --(stop sent to every peer)--------> Stopped
//! ```
//!
//! - **Registering**: only inventories are accepted, one per peer
//! - **Serving**: swarm requests are answered with a snapshot, progress
//!   updates extend the registry, and Done counts down the live peers
//! - **Draining**: late progress updates are applied, then every upload
//!   worker is told to stop
//!
//! Anything else a peer sends is a protocol violation and ends the run.

use crate::error::ProtocolError;
use crate::message::*;
use crate::peer::PeerId;
use crate::registry::Registry;
use crate::segment::SegmentReport;
use crate::transport::*;

use anyhow::{Context, Result};

use std::collections::BTreeSet;

/// Tags the tracker listens on while serving.
///
/// Progress updates come first so that a peer's update is applied before a
/// swarm request it sent afterwards, whenever both are waiting.
const SERVING_TAGS: [Tag; 9] = [
    Tag::ProgressUpdate,
    Tag::SwarmRequest,
    Tag::Done,
    Tag::Inventory,
    Tag::InventoryAck,
    Tag::SwarmSnapshot,
    Tag::SegmentRequest,
    Tag::SegmentReply,
    Tag::Stop,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Registering,
    Serving,
    Draining,
    Stopped,
}

pub struct Tracker<T: Transport> {
    transport: T,
    /// Every peer of the swarm
    peers: Vec<PeerId>,
    registry: Registry,
    state: TrackerState,
    registered: BTreeSet<PeerId>,
    finished: BTreeSet<PeerId>,
}

impl<T: Transport> Tracker<T> {
    /// Creates a tracker for the given peers.
    ///
    /// # Arguments
    ///
    /// * `transport` - The tracker's transport.
    /// * `peers` - Identifiers of every peer expected to register.
    ///
    pub fn new(transport: T, peers: Vec<PeerId>) -> Tracker<T> {
        Tracker {
            transport,
            peers,
            registry: Registry::new(),
            state: TrackerState::Registering,
            registered: BTreeSet::new(),
            finished: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run the state machine until every peer has been stopped.
    ///
    /// # Returns
    ///
    /// The final registry.
    pub fn run(mut self) -> Result<Registry> {
        info!("Tracker waiting for {} peers", self.peers.len());

        while self.state != TrackerState::Stopped {
            self.step()?;
        }

        info!("Tracker stopped");

        Ok(self.registry)
    }

    /// Perform one unit of work in the current state.
    pub fn step(&mut self) -> Result<()> {
        match self.state {
            TrackerState::Registering => self.register_next(),
            TrackerState::Serving => self.serve_next(),
            TrackerState::Draining => self.drain(),
            TrackerState::Stopped => Ok(()),
        }
    }

    fn transition(&mut self, next: TrackerState) {
        debug!("Tracker {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn is_member(&self, peer: PeerId) -> bool {
        self.peers.contains(&peer)
    }

    fn register_next(&mut self) -> Result<()> {
        if self.registered.len() == self.peers.len() {
            for peer in &self.peers {
                self.transport
                    .send_message(*peer, &Message::InventoryAck)
                    .with_context(|| format!("could not acknowledge peer {peer}"))?;
            }
            self.transition(TrackerState::Serving);
            return Ok(());
        }

        let (source, message) = self.transport.receive_message(Source::Any, &[])?;
        trace!("Tracker received {:?} from peer {}", message.tag(), source);

        match message {
            Message::Inventory { files } if self.is_member(source) => {
                if !self.registered.insert(source) {
                    return Err(ProtocolError::DuplicateInventory(source).into());
                }
                self.registry.register_inventory(source, &files);
                debug!(
                    "Peer {} registered {} files ({}/{})",
                    source,
                    files.len(),
                    self.registered.len(),
                    self.peers.len()
                );
                Ok(())
            }
            other => Err(ProtocolError::UnexpectedMessage {
                tag: other.tag(),
                source_peer: source,
                state: "registering",
            }
            .into()),
        }
    }

    fn serve_next(&mut self) -> Result<()> {
        if self.finished.len() == self.peers.len() {
            self.transition(TrackerState::Draining);
            return Ok(());
        }

        let (source, message) = self.transport.receive_message(Source::Any, &SERVING_TAGS)?;
        trace!("Tracker received {:?} from peer {}", message.tag(), source);

        if !self.is_member(source) {
            return Err(unexpected(&message, source, "serving"));
        }

        match message {
            Message::SwarmRequest { files } => {
                let snapshot = Message::SwarmSnapshot {
                    files: self.registry.snapshot(&files),
                };
                self.transport
                    .send_message(source, &snapshot)
                    .with_context(|| format!("could not send swarm snapshot to peer {source}"))
            }
            Message::ProgressUpdate {
                segments,
                completed,
            } => {
                self.apply_update(source, &segments, &completed);
                Ok(())
            }
            Message::Done => {
                if !self.finished.insert(source) {
                    return Err(ProtocolError::DuplicateDone(source).into());
                }
                debug!(
                    "Peer {} done ({}/{})",
                    source,
                    self.finished.len(),
                    self.peers.len()
                );
                Ok(())
            }
            other => Err(unexpected(&other, source, "serving")),
        }
    }

    fn apply_update(&mut self, peer: PeerId, segments: &[SegmentReport], completed: &[String]) {
        self.registry.record_update(peer, segments);
        for file in completed {
            debug!("Tracker recorded {:?} as completed by peer {}", file, peer);
            self.registry.record_completed(peer, file);
        }
    }

    fn drain(&mut self) -> Result<()> {
        // A peer's last update may still be queued behind its Done
        while let Some((source, message)) = self.transport.try_receive_message(&[Tag::ProgressUpdate])? {
            if let Message::ProgressUpdate {
                segments,
                completed,
            } = message
            {
                self.apply_update(source, &segments, &completed);
            }
        }

        for peer in &self.peers {
            self.transport
                .send_message(*peer, &Message::Stop)
                .with_context(|| format!("could not stop peer {peer}"))?;
        }

        self.transition(TrackerState::Stopped);

        Ok(())
    }
}

fn unexpected(message: &Message, source: PeerId, state: &'static str) -> anyhow::Error {
    ProtocolError::UnexpectedMessage {
        tag: message.tag(),
        source_peer: source,
        state,
    }
    .into()
}
