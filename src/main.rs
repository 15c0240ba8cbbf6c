//! # Swarmsim
//!
//! Runs a simulated BitTorrent-style swarm from a directory of peer
//! manifests.
//!
//! ## Usage
//!
//! ```bash
//! swarmsim <dir>
//! swarmsim <dir> -n <peers> -o <output_dir>
//! ```
//!
//! Peer `N` reads `<dir>/in<N>.txt` and writes every file it completes to
//! `<output_dir>/client<N>_<file>`.

#[macro_use]
extern crate log;

mod args;

use args::Args;
use swarmsim::manifest::*;
use swarmsim::output::OutputDir;
use swarmsim::peer::PeerId;
use swarmsim::swarm;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use std::fs;
use std::sync::Arc;

fn run(args: Args) -> Result<()> {
    // Check manifest directory exists
    if !args.dir.is_dir() {
        return Err(anyhow!(
            "could not find manifest directory: {}",
            args.dir.display()
        ));
    }

    // Get number of peers, defaults to the manifests found
    let nb_peers = match args.peers {
        Some(nb_peers) => nb_peers,
        None => count_manifests(&args.dir),
    };
    if nb_peers == 0 {
        return Err(anyhow!("no peer manifests in {}", args.dir.display()));
    }

    // Load every manifest before starting anything
    let manifests = (1..=nb_peers)
        .map(|id| Manifest::load(&manifest_path(&args.dir, PeerId::new(id))))
        .collect::<Result<Vec<_>>>()?;

    // Prepare output directory
    let output_dir = args.output.clone().unwrap_or_else(|| args.dir.clone());
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("could not create output directory '{}'", output_dir.display()))?;

    info!("Starting swarm of {} peers", nb_peers);

    let report = swarm::run(args.config(), manifests, Arc::new(OutputDir::new(output_dir.clone())))?;

    for (peer, files) in &report.peers {
        let completed = report.registry.completed_files(*peer);
        let owned: u32 = files.iter().map(|(_, record)| record.owned_segments()).sum();
        println!(
            "Peer {}: {} files, {} segments owned, completed [{}]",
            peer,
            files.iter().count(),
            owned,
            completed.join(", ")
        );
    }

    println!("Saved in \"{}\".", output_dir.display());

    Ok(())
}

fn main() {
    // Initialize logger
    pretty_env_logger::init_timed();

    // Parse arguments
    let args = Args::parse();

    // Run program, eventually exit failure
    if let Err(error) = run(args) {
        eprintln!("Error: {:#}", error);
        std::process::exit(1);
    }

    // Exit success
    std::process::exit(0);
}
