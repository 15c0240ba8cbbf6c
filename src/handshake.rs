//! # Registration Handshake
//!
//! Before it may download or upload anything, a peer declares its inventory
//! to the tracker and waits for the tracker's acknowledgment.
//!
//! ## Exchange
//!
//! ```text
//! peer                         tracker
//!  |  INVENTORY (owned files)     |
//!  |----------------------------->|
//!  |                              |  waits for every peer's inventory
//!  |  INVENTORY_ACK               |
//!  |<-----------------------------|
//! ```
//!
//! The acknowledgment is only sent once all peers have registered, so every
//! swarm snapshot a peer receives afterwards already reflects the full initial
//! swarm.

use crate::message::*;
use crate::peer::PeerId;
use crate::segment::FileManifest;
use crate::transport::*;

use anyhow::{Context, Result};

/// Declare `files` to the tracker and block until it acknowledges.
///
/// # Arguments
///
/// * `transport` - The peer's transport.
/// * `files` - Files the peer owns.
///
pub fn register_with_tracker<T: Transport + ?Sized>(transport: &T, files: &[FileManifest]) -> Result<()> {
    let inventory = Message::Inventory {
        files: files.to_vec(),
    };
    transport
        .send_message(PeerId::TRACKER, &inventory)
        .context("could not send inventory to tracker")?;

    debug!(
        "Peer {} declared {} owned files, waiting for tracker",
        transport.local_id(),
        files.len()
    );

    transport
        .receive_message(Source::Peer(PeerId::TRACKER), &[Tag::InventoryAck])
        .context("could not receive inventory acknowledgment")?;

    Ok(())
}
