//! # Segments and Swarm Records
//!
//! Plain data carried between the tracker and the peers. A segment is the
//! atomic unit of a file: it is identified by `(file, index)` and fingerprinted
//! by a fixed-width hash string that never changes once assigned.
//!
//! ## Records
//!
//! - **FileManifest**: a file a peer declares it owns, with the segments it holds
//! - **FileSwarm**: the tracker's view of one file (hash list plus who owns what)
//! - **SegmentReport**: one newly acquired segment, reported back to the tracker
//! - **SegmentWork**: one fetch the download worker is about to perform

use crate::peer::PeerId;

/// A single hash-identified segment of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    /// Zero-based position of the segment in its file
    pub index: u32,
    /// Content fingerprint of the segment
    pub hash: String,
}

impl Segment {
    pub fn new(index: u32, hash: impl Into<String>) -> Segment {
        Segment {
            index,
            hash: hash.into(),
        }
    }
}

/// A file declared in a peer's inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileManifest {
    /// Name of the file, unique across the swarm
    pub name: String,
    /// Segments the declaring peer owns, not necessarily a prefix of the file
    pub segments: Vec<Segment>,
}

impl FileManifest {
    pub fn new(name: impl Into<String>, segments: Vec<Segment>) -> FileManifest {
        FileManifest {
            name: name.into(),
            segments,
        }
    }

    /// Build a manifest owning segments `0..hashes.len()`, in order.
    pub fn complete<S: Into<String>>(name: impl Into<String>, hashes: Vec<S>) -> FileManifest {
        let segments = hashes
            .into_iter()
            .enumerate()
            .map(|(index, hash)| Segment::new(index as u32, hash))
            .collect();

        FileManifest::new(name, segments)
    }
}

/// Segment indices of one file owned by one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerHoldings {
    pub peer: PeerId,
    /// Owned indices, ascending
    pub indices: Vec<u32>,
}

impl PeerHoldings {
    pub fn owns(&self, index: u32) -> bool {
        self.indices.binary_search(&index).is_ok()
    }
}

/// The tracker's answer about one file.
///
/// An empty `hashes` list means no peer owns any segment of the file yet, and
/// the requester has to ask again later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSwarm {
    pub name: String,
    /// Hash of every segment of the file, indexed by segment number
    pub hashes: Vec<String>,
    /// Every peer that owns at least one segment, by ascending peer id
    pub peers: Vec<PeerHoldings>,
}

impl FileSwarm {
    /// Total number of segments, or 0 while the file is not discoverable.
    pub fn total_segments(&self) -> u32 {
        self.hashes.len() as u32
    }
}

/// A segment a peer has acquired since its last report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReport {
    pub file: String,
    pub index: u32,
    pub hash: String,
}

/// A segment the download worker has decided to fetch, and from whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentWork {
    pub file: String,
    pub index: u32,
    pub hash: String,
    /// Peer selected to serve the segment
    pub donor: PeerId,
}

impl SegmentWork {
    /// Turn a finished fetch into the record reported to the tracker.
    pub fn into_report(self) -> SegmentReport {
        SegmentReport {
            file: self.file,
            index: self.index,
            hash: self.hash,
        }
    }
}
