use swarmsim::config::Config;
use swarmsim::manifest::*;
use swarmsim::output::{MemorySink, OutputDir};
use swarmsim::peer::PeerId;
use swarmsim::segment::{FileManifest, Segment};
use swarmsim::swarm;

use std::fs;
use std::sync::Arc;

fn hashes(prefix: &str, count: u32) -> Vec<String> {
    (0..count).map(|index| format!("{prefix}{index}")).collect()
}

fn wanting(names: &[&str]) -> Manifest {
    Manifest::new(vec![], names.iter().map(|name| name.to_string()).collect())
}

#[test]
fn downloader_gets_every_segment_of_a_seeded_file() {
    let sink = Arc::new(MemorySink::new());
    let manifests = vec![
        Manifest::new(vec![FileManifest::complete("F", vec!["h0", "h1", "h2"])], vec![]),
        wanting(&["F"]),
    ];

    let report = swarm::run(Config::default(), manifests, sink.clone()).unwrap();

    let record = report.peers[&PeerId::new(2)].get("F").unwrap();
    assert_eq!(record.owned_segments(), 3);
    assert_eq!(record.missing_segments(), 0);
    assert_eq!(report.registry.owned_indices("F", PeerId::new(2)), vec![0, 1, 2]);
    assert_eq!(report.registry.completed_files(PeerId::new(2)), vec!["F".to_string()]);
    assert_eq!(
        sink.hashes_of(PeerId::new(2), "F").unwrap(),
        Some(hashes("h", 3))
    );
}

#[test]
fn disjoint_halves_combine_into_the_whole_file() {
    let all = hashes("h", 10);
    let segments: Vec<Segment> = all
        .iter()
        .enumerate()
        .map(|(index, hash)| Segment::new(index as u32, hash.clone()))
        .collect();
    let (low, high) = segments.split_at(5);

    let sink = Arc::new(MemorySink::new());
    let manifests = vec![
        Manifest::new(vec![FileManifest::new("F", low.to_vec())], vec![]),
        Manifest::new(vec![FileManifest::new("F", high.to_vec())], vec![]),
        wanting(&["F"]),
    ];

    let report = swarm::run(Config::default(), manifests, sink.clone()).unwrap();

    assert_eq!(sink.hashes_of(PeerId::new(3), "F").unwrap(), Some(all));
    assert_eq!(
        report.registry.owned_indices("F", PeerId::new(3)),
        (0..10).collect::<Vec<u32>>()
    );
}

#[test]
fn every_peer_finishes_in_a_larger_swarm() {
    let sink = Arc::new(MemorySink::new());
    let manifests = vec![
        Manifest::new(
            vec![FileManifest::complete("alpha", hashes("a", 25))],
            vec!["beta".to_string(), "gamma".to_string()],
        ),
        Manifest::new(
            vec![FileManifest::complete("beta", hashes("b", 12))],
            vec!["alpha".to_string()],
        ),
        Manifest::new(
            vec![FileManifest::complete("gamma", hashes("g", 7))],
            vec!["alpha".to_string(), "beta".to_string()],
        ),
        wanting(&["alpha", "beta", "gamma"]),
    ];
    let config = Config {
        batch_size: 4,
        ..Config::default()
    };

    let report = swarm::run(config, manifests, sink.clone()).unwrap();

    assert_eq!(report.peers.len(), 4);
    for files in report.peers.values() {
        for (name, record) in files.iter() {
            assert_eq!(record.missing_segments(), 0, "{name} incomplete");
        }
        assert!(files.is_complete());
    }
    assert_eq!(
        sink.hashes_of(PeerId::new(4), "alpha").unwrap(),
        Some(hashes("a", 25))
    );
    // 2 files for peer 1, 1 for peer 2, 2 for peer 3, 3 for peer 4
    assert_eq!(sink.completions().unwrap().len(), 8);
}

#[test]
fn downloaders_also_serve_what_they_fetched() {
    // Peers 2 and 3 fetch a few segments per round, so each one shows up in
    // the other's snapshots as a donor before the file is complete.
    let sink = Arc::new(MemorySink::new());
    let manifests = vec![
        Manifest::new(vec![FileManifest::complete("chain", hashes("c", 9))], vec![]),
        wanting(&["chain"]),
        wanting(&["chain"]),
    ];
    let config = Config {
        batch_size: 2,
        ..Config::default()
    };

    let report = swarm::run(config, manifests, sink).unwrap();

    for peer in [PeerId::new(2), PeerId::new(3)] {
        assert!(report.peers[&peer].is_complete());
        assert_eq!(report.registry.owned_indices("chain", peer).len(), 9);
    }
}

#[test]
fn manifests_on_disk_produce_output_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("in1.txt"), "1\nfile1 3\nh0\nh1\nh2\n0\n").unwrap();
    fs::write(dir.path().join("in2.txt"), "0\n1\nfile1\n").unwrap();

    let nb_peers = count_manifests(dir.path());
    let manifests = (1..=nb_peers)
        .map(|id| Manifest::load(&manifest_path(dir.path(), PeerId::new(id))).unwrap())
        .collect();

    let output = OutputDir::new(dir.path());
    swarm::run(Config::default(), manifests, Arc::new(output)).unwrap();

    let written = fs::read_to_string(dir.path().join("client2_file1")).unwrap();
    assert_eq!(written, "h0\nh1\nh2\n");
    assert!(!dir.path().join("client1_file1").exists());
}
