//! # Tracker Registry
//!
//! The tracker's record of which peer owns which segments of which file:
//! `file -> peer -> segments`. Records only ever grow. A segment reported twice
//! by the same peer is stored once.
//!
//! ## Seed Rule
//!
//! The peer holding the most segments of a file (lowest id on ties) is the
//! seed. Its hashes are authoritative for the file's hash list. The total
//! segment count is the seed's count, extended if another peer has recorded
//! an index past the seed's range, and any index the seed lacks takes its hash
//! from the first other peer that recorded it.
//!
//! The registry is owned by the tracker's single thread and needs no locking.

use crate::peer::PeerId;
use crate::segment::*;

use std::collections::{BTreeMap, BTreeSet};

/// Segments of one file owned by one peer, by index.
type Holdings = BTreeMap<u32, String>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registry {
    files: BTreeMap<String, BTreeMap<PeerId, Holdings>>,
    completed: BTreeMap<PeerId, BTreeSet<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Record the inventory a peer declared at registration.
    pub fn register_inventory(&mut self, peer: PeerId, files: &[FileManifest]) {
        for file in files {
            for segment in &file.segments {
                self.insert(&file.name, peer, segment.index, &segment.hash);
            }
        }
    }

    /// Record segments a peer acquired since its last update.
    pub fn record_update(&mut self, peer: PeerId, reports: &[SegmentReport]) {
        for report in reports {
            self.insert(&report.file, peer, report.index, &report.hash);
        }
    }

    /// Remember that `peer` finished downloading `file`.
    pub fn record_completed(&mut self, peer: PeerId, file: &str) {
        self.completed
            .entry(peer)
            .or_default()
            .insert(file.to_string());
    }

    /// Files `peer` reported as fully downloaded.
    pub fn completed_files(&self, peer: PeerId) -> Vec<String> {
        self.completed
            .get(&peer)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn insert(&mut self, file: &str, peer: PeerId, index: u32, hash: &str) {
        self.files
            .entry(file.to_string())
            .or_default()
            .entry(peer)
            .or_default()
            .entry(index)
            .or_insert_with(|| hash.to_string());
    }

    /// Indices of `file` that `peer` is recorded as owning, ascending.
    pub fn owned_indices(&self, file: &str, peer: PeerId) -> Vec<u32> {
        self.files
            .get(file)
            .and_then(|peers| peers.get(&peer))
            .map(|holdings| holdings.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Answer a swarm request for the given files.
    ///
    /// Each requested file appears once in the answer, in request order. A
    /// file nobody owns comes back with no hashes and no peers.
    pub fn snapshot(&self, names: &[String]) -> Vec<FileSwarm> {
        names.iter().map(|name| self.file_swarm(name)).collect()
    }

    fn file_swarm(&self, name: &str) -> FileSwarm {
        let peers = match self.files.get(name) {
            Some(peers) => peers,
            None => {
                return FileSwarm {
                    name: name.to_string(),
                    hashes: vec![],
                    peers: vec![],
                }
            }
        };

        // Largest record wins, the first (lowest id) on ties
        let seed = peers
            .iter()
            .fold(None, |best: Option<&Holdings>, (_, holdings)| match best {
                Some(best) if best.len() >= holdings.len() => Some(best),
                _ => Some(holdings),
            });

        let seed_len = seed.map(|holdings| holdings.len()).unwrap_or(0) as u32;
        let highest = peers
            .values()
            .filter_map(|holdings| holdings.keys().next_back())
            .max()
            .map(|index| index + 1)
            .unwrap_or(0);
        let total = seed_len.max(highest);

        let hashes = (0..total)
            .map(|index| {
                seed.and_then(|holdings| holdings.get(&index))
                    .or_else(|| peers.values().find_map(|holdings| holdings.get(&index)))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect();

        let peers = peers
            .iter()
            .map(|(peer, holdings)| PeerHoldings {
                peer: *peer,
                indices: holdings.keys().copied().collect(),
            })
            .collect();

        FileSwarm {
            name: name.to_string(),
            hashes,
            peers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(file: &str, index: u32, hash: &str) -> SegmentReport {
        SegmentReport {
            file: file.to_string(),
            index,
            hash: hash.to_string(),
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn inventory_is_visible_in_snapshots() {
        let mut registry = Registry::new();
        registry.register_inventory(PeerId::new(1), &[FileManifest::complete("file1", vec!["h0", "h1", "h2"])]);

        let swarm = &registry.snapshot(&names(&["file1"]))[0];

        assert_eq!(swarm.hashes, names(&["h0", "h1", "h2"]));
        assert_eq!(
            swarm.peers,
            vec![PeerHoldings {
                peer: PeerId::new(1),
                indices: vec![0, 1, 2],
            }]
        );
    }

    #[test]
    fn unknown_file_has_no_peers_and_no_segments() {
        let registry = Registry::new();

        let swarm = &registry.snapshot(&names(&["ghost"]))[0];

        assert_eq!(swarm.name, "ghost");
        assert_eq!(swarm.total_segments(), 0);
        assert!(swarm.peers.is_empty());
    }

    #[test]
    fn updates_extend_a_peer_record() {
        let mut registry = Registry::new();
        registry.register_inventory(PeerId::new(1), &[FileManifest::complete("file1", vec!["h0", "h1"])]);

        registry.record_update(PeerId::new(2), &[report("file1", 1, "h1")]);
        registry.record_update(PeerId::new(2), &[report("file1", 0, "h0")]);

        assert_eq!(registry.owned_indices("file1", PeerId::new(2)), vec![0, 1]);
    }

    #[test]
    fn duplicate_reports_are_stored_once() {
        let mut registry = Registry::new();

        registry.record_update(PeerId::new(2), &[report("file1", 0, "h0")]);
        registry.record_update(PeerId::new(2), &[report("file1", 0, "h0"), report("file1", 0, "h0")]);

        assert_eq!(registry.owned_indices("file1", PeerId::new(2)), vec![0]);
    }

    #[test]
    fn records_only_grow() {
        let mut registry = Registry::new();
        registry.register_inventory(PeerId::new(1), &[FileManifest::complete("file1", vec!["h0", "h1", "h2"])]);

        let mut previous = registry.owned_indices("file1", PeerId::new(2));
        for index in [2, 0, 2, 1] {
            registry.record_update(PeerId::new(2), &[report("file1", index, "h")]);

            let current = registry.owned_indices("file1", PeerId::new(2));
            assert!(previous.iter().all(|index| current.contains(index)));
            previous = current;
        }
        assert_eq!(registry.owned_indices("file1", PeerId::new(1)), vec![0, 1, 2]);
    }

    #[test]
    fn seed_hashes_are_authoritative() {
        let mut registry = Registry::new();
        registry.record_update(PeerId::new(1), &[report("file1", 0, "stale")]);
        registry.register_inventory(PeerId::new(2), &[FileManifest::complete("file1", vec!["h0", "h1"])]);

        let swarm = &registry.snapshot(&names(&["file1"]))[0];

        assert_eq!(swarm.hashes, names(&["h0", "h1"]));
        assert_eq!(swarm.peers.len(), 2);
    }

    #[test]
    fn disjoint_holdings_combine_into_the_full_file() {
        let mut registry = Registry::new();
        let hashes: Vec<String> = (0..10).map(|index| format!("h{index}")).collect();
        let (low, high): (Vec<_>, Vec<_>) = hashes
            .iter()
            .enumerate()
            .map(|(index, hash)| Segment::new(index as u32, hash.clone()))
            .partition(|segment| segment.index < 5);

        registry.register_inventory(PeerId::new(1), &[FileManifest::new("file1", low)]);
        registry.register_inventory(PeerId::new(2), &[FileManifest::new("file1", high)]);

        let swarm = &registry.snapshot(&names(&["file1"]))[0];

        assert_eq!(swarm.hashes, hashes);
        assert_eq!(swarm.peers[1].indices, vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn snapshot_is_stable_without_updates() {
        let mut registry = Registry::new();
        registry.register_inventory(PeerId::new(1), &[FileManifest::complete("file1", vec!["h0", "h1"])]);
        registry.record_update(PeerId::new(3), &[report("file1", 1, "h1")]);

        let request = names(&["file1", "file2"]);

        assert_eq!(registry.snapshot(&request), registry.snapshot(&request));
    }

    #[test]
    fn completed_files_are_remembered_per_peer() {
        let mut registry = Registry::new();

        registry.record_completed(PeerId::new(2), "file1");
        registry.record_completed(PeerId::new(2), "file1");

        assert_eq!(registry.completed_files(PeerId::new(2)), names(&["file1"]));
        assert!(registry.completed_files(PeerId::new(1)).is_empty());
    }
}
