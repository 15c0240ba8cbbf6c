//! # Donor Selection
//!
//! Picks which peer to ask for a segment. Among the peers the swarm snapshot
//! lists as owning the segment, the one this downloader has sent the fewest
//! requests to wins; ties go to the first candidate in snapshot order.
//!
//! The request counts only shape how load spreads across donors. Any owning
//! peer is a correct answer.

use crate::error::SelectionError;
use crate::peer::PeerId;
use crate::segment::FileSwarm;

use std::collections::HashMap;

/// Requests issued to each donor by one download worker.
#[derive(Debug, Default, Clone)]
pub struct RequestLoad {
    issued: HashMap<PeerId, u32>,
}

impl RequestLoad {
    pub fn new() -> Self {
        Default::default()
    }

    /// Number of requests already sent to `peer`.
    pub fn issued(&self, peer: PeerId) -> u32 {
        self.issued.get(&peer).copied().unwrap_or(0)
    }

    /// Select a donor for segment `index` and count the request against it.
    ///
    /// # Arguments
    ///
    /// * `swarm` - Snapshot of the file's swarm.
    /// * `index` - Segment to fetch.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::NoDonor`] if no peer in the snapshot owns the
    /// segment. That means the snapshot is stale or inconsistent, and
    /// skipping the segment would stall the download.
    pub fn select_donor(&mut self, swarm: &FileSwarm, index: u32) -> Result<PeerId, SelectionError> {
        let donor = swarm
            .peers
            .iter()
            .filter(|holdings| holdings.owns(index))
            .map(|holdings| holdings.peer)
            .fold(None, |best: Option<PeerId>, candidate| match best {
                Some(best) if self.issued(best) <= self.issued(candidate) => Some(best),
                _ => Some(candidate),
            })
            .ok_or_else(|| SelectionError::NoDonor {
                file: swarm.name.clone(),
                index,
            })?;

        *self.issued.entry(donor).or_insert(0) += 1;

        Ok(donor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::PeerHoldings;

    fn swarm(owners: &[(u32, &[u32])]) -> FileSwarm {
        FileSwarm {
            name: "file1".to_string(),
            hashes: vec!["h".to_string(); 4],
            peers: owners
                .iter()
                .map(|(peer, indices)| PeerHoldings {
                    peer: PeerId::new(*peer),
                    indices: indices.to_vec(),
                })
                .collect(),
        }
    }

    #[test]
    fn only_owning_peers_are_selected() {
        let swarm = swarm(&[(1, &[0]), (2, &[1, 2])]);
        let mut load = RequestLoad::new();

        assert_eq!(load.select_donor(&swarm, 2), Ok(PeerId::new(2)));
        assert_eq!(load.select_donor(&swarm, 0), Ok(PeerId::new(1)));
    }

    #[test]
    fn ties_go_to_the_first_peer_in_snapshot_order() {
        let swarm = swarm(&[(3, &[0]), (1, &[0])]);
        let mut load = RequestLoad::new();

        assert_eq!(load.select_donor(&swarm, 0), Ok(PeerId::new(3)));
    }

    #[test]
    fn requests_spread_evenly_across_donors() {
        let swarm = swarm(&[(1, &[0]), (2, &[0]), (3, &[0])]);
        let mut load = RequestLoad::new();

        for _ in 0..20 {
            load.select_donor(&swarm, 0).unwrap();

            let counts: Vec<u32> = (1..=3).map(|peer| load.issued(PeerId::new(peer))).collect();
            let min = *counts.iter().min().unwrap();
            assert!(counts.iter().all(|count| count - min <= 1), "uneven load: {counts:?}");
        }
    }

    #[test]
    fn load_from_other_segments_biases_selection() {
        let swarm = swarm(&[(1, &[0, 1]), (2, &[1])]);
        let mut load = RequestLoad::new();

        assert_eq!(load.select_donor(&swarm, 0), Ok(PeerId::new(1)));
        assert_eq!(load.select_donor(&swarm, 1), Ok(PeerId::new(2)));
        assert_eq!(load.issued(PeerId::new(1)), 1);
        assert_eq!(load.issued(PeerId::new(2)), 1);
    }

    #[test]
    fn segment_without_owner_is_an_error() {
        let swarm = swarm(&[(1, &[0])]);
        let mut load = RequestLoad::new();

        assert_eq!(
            load.select_donor(&swarm, 3),
            Err(SelectionError::NoDonor {
                file: "file1".to_string(),
                index: 3,
            })
        );
        assert_eq!(load.issued(PeerId::new(1)), 0);
    }
}
