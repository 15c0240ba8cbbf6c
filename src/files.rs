//! # Client File State
//!
//! Per-peer view of every file the peer owns or wants.
//!
//! ## Ownership Record
//!
//! For each file the table keeps, per segment index, the segment hash and
//! whether the peer owns it:
//!
//! - **Owned files** are loaded complete from the manifest
//! - **Wanted files** start with zero known segments and are populated the
//!   first time a swarm snapshot reveals their size and hashes
//!
//! ## Invariants
//!
//! - An owned segment never becomes unowned and its hash never changes
//! - `missing(file) == total(file) - owned(file)` at all times
//! - A file with an unknown total (0) is still pending, not complete

use crate::segment::*;

use std::collections::BTreeMap;

/// One slot of a file's ownership record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSlot {
    pub hash: String,
    pub owned: bool,
}

/// Ownership record of a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRecord {
    /// Number of segments in the file, 0 while unknown
    total: u32,
    /// Segment index -> slot
    segments: BTreeMap<u32, SegmentSlot>,
    /// Segments not owned yet
    missing: u32,
}

impl FileRecord {
    pub fn total_segments(&self) -> u32 {
        self.total
    }

    pub fn missing_segments(&self) -> u32 {
        self.missing
    }

    pub fn owned_segments(&self) -> u32 {
        self.segments.values().filter(|slot| slot.owned).count() as u32
    }

    pub fn slot(&self, index: u32) -> Option<&SegmentSlot> {
        self.segments.get(&index)
    }

    /// Still has to be fetched, or is not discoverable yet.
    pub fn is_pending(&self) -> bool {
        self.total == 0 || self.missing > 0
    }

    /// Lowest-index segment not owned yet.
    pub fn first_missing(&self) -> Option<Segment> {
        self.segments
            .iter()
            .find(|(_, slot)| !slot.owned)
            .map(|(index, slot)| Segment::new(*index, slot.hash.clone()))
    }

    /// Hashes of every segment, in index order.
    pub fn hashes(&self) -> Vec<String> {
        self.segments.values().map(|slot| slot.hash.clone()).collect()
    }

    fn owns_hash(&self, hash: &str) -> bool {
        self.segments
            .values()
            .any(|slot| slot.owned && slot.hash == hash)
    }
}

/// Ownership records of every file a peer knows about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTable {
    files: BTreeMap<String, FileRecord>,
}

impl FileTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Record a file the peer owns, marking every declared segment owned.
    ///
    /// The record only covers the declared segments: a peer declaring part of
    /// a file has that many segments in total, keyed by their real indices,
    /// and never fetches the rest.
    pub fn add_owned(&mut self, manifest: &FileManifest) {
        let record = self.files.entry(manifest.name.clone()).or_default();

        for segment in &manifest.segments {
            record.segments.insert(
                segment.index,
                SegmentSlot {
                    hash: segment.hash.clone(),
                    owned: true,
                },
            );
        }
        record.total = record.segments.len() as u32;
        record.missing = record.total - record.owned_segments();
    }

    /// Record a file the peer wants, with its size still unknown.
    pub fn add_wanted(&mut self, name: &str) {
        self.files.entry(name.to_string()).or_default();
    }

    pub fn get(&self, name: &str) -> Option<&FileRecord> {
        self.files.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileRecord)> {
        self.files.iter()
    }

    /// Names of files that still need segments or are not discovered yet.
    pub fn pending_files(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|(_, record)| record.is_pending())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Total number of segments still missing across every discovered file.
    pub fn missing_total(&self) -> u32 {
        self.files.values().map(|record| record.missing).sum()
    }

    /// Whether every file is discovered and complete.
    pub fn is_complete(&self) -> bool {
        self.files.values().all(|record| !record.is_pending())
    }

    /// Adopt the size and hashes of files discovered by a swarm snapshot.
    ///
    /// Only files whose total was unknown are touched; for them every segment
    /// starts not owned. Files the snapshot reports as empty stay unknown.
    ///
    /// # Returns
    ///
    /// The number of segments newly added to the files' missing counts.
    pub fn merge_snapshot(&mut self, swarms: &[FileSwarm]) -> u32 {
        let mut discovered = 0;

        for swarm in swarms {
            let record = match self.files.get_mut(&swarm.name) {
                Some(record) if record.total == 0 => record,
                _ => continue,
            };
            if swarm.hashes.is_empty() {
                continue;
            }

            for (index, hash) in swarm.hashes.iter().enumerate() {
                record
                    .segments
                    .entry(index as u32)
                    .or_insert_with(|| SegmentSlot {
                        hash: hash.clone(),
                        owned: false,
                    });
            }
            record.total = swarm.total_segments();
            record.missing = record.total - record.owned_segments();
            discovered += record.missing;

            debug!(
                "Discovered {:?}: {} segments, {} missing",
                swarm.name, record.total, record.missing
            );
        }

        discovered
    }

    /// First file, in name order, that has segments left to fetch.
    pub fn next_incomplete(&self) -> Option<(&String, &FileRecord)> {
        self.files.iter().find(|(_, record)| record.missing > 0)
    }

    /// Mark a segment as owned.
    ///
    /// # Returns
    ///
    /// `Some(true)` if this completed the file, `Some(false)` otherwise, and
    /// `None` if the segment is unknown or was already owned.
    pub fn mark_owned(&mut self, name: &str, index: u32) -> Option<bool> {
        let record = self.files.get_mut(name)?;
        let slot = record.segments.get_mut(&index)?;
        if slot.owned {
            return None;
        }

        slot.owned = true;
        record.missing -= 1;

        Some(record.missing == 0)
    }

    /// Whether the peer owns the segment of `name` with this hash.
    pub fn owns(&self, name: &str, hash: &str) -> bool {
        self.files
            .get(name)
            .map(|record| record.owns_hash(hash))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerId;

    fn swarm(name: &str, hashes: &[&str]) -> FileSwarm {
        FileSwarm {
            name: name.to_string(),
            hashes: hashes.iter().map(|hash| hash.to_string()).collect(),
            peers: vec![PeerHoldings {
                peer: PeerId::new(1),
                indices: (0..hashes.len() as u32).collect(),
            }],
        }
    }

    fn assert_missing_invariant(table: &FileTable) {
        for (name, record) in table.iter() {
            assert_eq!(
                record.missing_segments(),
                record.total_segments() - record.owned_segments(),
                "missing count drifted for {name}"
            );
        }
    }

    #[test]
    fn owned_files_start_complete() {
        let mut table = FileTable::new();
        table.add_owned(&FileManifest::complete("file1", vec!["h0", "h1"]));

        let record = table.get("file1").unwrap();
        assert_eq!(record.total_segments(), 2);
        assert_eq!(record.missing_segments(), 0);
        assert!(table.is_complete());
        assert!(table.pending_files().is_empty());
    }

    #[test]
    fn partially_owned_files_cover_only_declared_segments() {
        let mut table = FileTable::new();
        let upper_half = (5..10)
            .map(|index| Segment::new(index, format!("h{index}")))
            .collect();
        table.add_owned(&FileManifest::new("file1", upper_half));

        let record = table.get("file1").unwrap();
        assert_eq!(record.total_segments(), 5);
        assert_eq!(record.missing_segments(), 0);
        assert_eq!(record.slot(0), None);
        assert_eq!(record.slot(7).map(|slot| slot.hash.as_str()), Some("h7"));
        assert!(table.owns("file1", "h9"));
        assert!(table.pending_files().is_empty());
        assert_missing_invariant(&table);
    }

    #[test]
    fn wanted_files_stay_pending_until_discovered() {
        let mut table = FileTable::new();
        table.add_wanted("file2");

        assert_eq!(table.pending_files(), vec!["file2".to_string()]);
        assert_eq!(table.merge_snapshot(&[swarm("file2", &[])]), 0);
        assert_eq!(table.pending_files(), vec!["file2".to_string()]);
        assert!(!table.is_complete());
    }

    #[test]
    fn snapshot_reveals_size_and_hashes_once() {
        let mut table = FileTable::new();
        table.add_wanted("file2");

        assert_eq!(table.merge_snapshot(&[swarm("file2", &["a", "b", "c"])]), 3);
        assert_eq!(table.merge_snapshot(&[swarm("file2", &["a", "b", "c"])]), 0);

        let record = table.get("file2").unwrap();
        assert_eq!(record.total_segments(), 3);
        assert_eq!(record.missing_segments(), 3);
        assert_eq!(record.first_missing(), Some(Segment::new(0, "a")));
        assert_missing_invariant(&table);
    }

    #[test]
    fn snapshot_ignores_files_already_known() {
        let mut table = FileTable::new();
        table.add_owned(&FileManifest::complete("file1", vec!["h0"]));

        assert_eq!(table.merge_snapshot(&[swarm("file1", &["x", "y"])]), 0);
        assert_eq!(table.get("file1").unwrap().hashes(), vec!["h0".to_string()]);
    }

    #[test]
    fn marking_segments_keeps_the_missing_count_exact() {
        let mut table = FileTable::new();
        table.add_wanted("file2");
        table.merge_snapshot(&[swarm("file2", &["a", "b", "c"])]);

        assert_eq!(table.mark_owned("file2", 1), Some(false));
        assert_missing_invariant(&table);
        assert_eq!(table.get("file2").unwrap().first_missing(), Some(Segment::new(0, "a")));

        assert_eq!(table.mark_owned("file2", 1), None);
        assert_eq!(table.mark_owned("file2", 0), Some(false));
        assert_eq!(table.mark_owned("file2", 2), Some(true));
        assert_missing_invariant(&table);
        assert!(table.is_complete());
        assert!(table.owns("file2", "b"));
    }

    #[test]
    fn unknown_segments_cannot_be_marked() {
        let mut table = FileTable::new();
        table.add_wanted("file2");

        assert_eq!(table.mark_owned("file2", 0), None);
        assert_eq!(table.mark_owned("nope", 0), None);
    }

    #[test]
    fn next_incomplete_walks_files_in_name_order() {
        let mut table = FileTable::new();
        table.add_wanted("b_file");
        table.add_wanted("a_file");
        table.merge_snapshot(&[swarm("b_file", &["x"]), swarm("a_file", &["y"])]);

        assert_eq!(table.next_incomplete().map(|(name, _)| name.as_str()), Some("a_file"));
        assert_eq!(table.missing_total(), 2);
    }
}
