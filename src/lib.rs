//! # Swarmsim
//!
//! A simulated BitTorrent-style swarm: one tracker and many peers exchanging
//! hash-identified file segments over an in-memory transport.
//!
//! ## Architecture
//!
//! - **Tracker**: keeps the registry of who owns which segments and answers
//!   swarm requests
//! - **Peers**: each runs a download worker and an upload worker on their own
//!   threads, sharing the peer's file table
//! - **Transport**: blocking, tagged point-to-point messages between
//!   participants
//!
//! [`swarm::run`] builds a whole swarm from peer manifests and runs it to
//! completion.

#[macro_use]
extern crate log;

pub mod config;
pub mod download;
pub mod error;
pub mod files;
pub mod handshake;
pub mod manifest;
pub mod message;
pub mod output;
pub mod peer;
pub mod registry;
pub mod segment;
pub mod selection;
pub mod swarm;
pub mod tracker;
pub mod transport;
pub mod upload;
