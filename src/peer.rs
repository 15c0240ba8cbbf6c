//! # Swarm Peers
//!
//! This module defines the participant identifier shared by the tracker and
//! the peers, and the [`PeerSession`] that runs one peer from registration to
//! shutdown.
//!
//! ## Identifiers
//!
//! Participant `0` is always the tracker; peers are numbered `1..=N`.
//!
//! ## Peer Lifecycle
//!
//! 1. **Registration**: declare owned files, wait for the tracker's ack
//! 2. **Exchange**: an upload thread serves other peers while a download
//!    thread fetches every wanted file
//! 3. **Shutdown**: the download thread tells the tracker it is done; the
//!    upload thread keeps serving until the tracker says stop
//!
//! Both threads share the peer's [`FileTable`] behind a mutex.

use crate::config::Config;
use crate::download::DownloadWorker;
use crate::files::FileTable;
use crate::handshake::*;
use crate::manifest::Manifest;
use crate::output::CompletionSink;
use crate::segment::FileManifest;
use crate::transport::Transport;
use crate::upload::UploadWorker;

use anyhow::{anyhow, Context, Result};

use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Identifier of a swarm participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u32);

impl PeerId {
    /// The tracker's identifier.
    pub const TRACKER: PeerId = PeerId(0);

    pub const fn new(id: u32) -> PeerId {
        PeerId(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runs one peer of the swarm.
pub struct PeerSession<T: Transport + 'static> {
    id: PeerId,
    transport: Arc<T>,
    /// Files declared to the tracker at registration
    owned: Vec<FileManifest>,
    files: Arc<Mutex<FileTable>>,
    sink: Arc<dyn CompletionSink>,
    config: Config,
}

impl<T: Transport + 'static> PeerSession<T> {
    /// Creates a new peer session.
    ///
    /// # Arguments
    ///
    /// * `transport` - The peer's transport; its local id is the peer id.
    /// * `manifest` - Files the peer owns and wants.
    /// * `sink` - Receiver of completed files.
    /// * `config` - Swarm settings.
    ///
    pub fn new(
        transport: T,
        manifest: Manifest,
        sink: Arc<dyn CompletionSink>,
        config: Config,
    ) -> PeerSession<T> {
        let mut table = FileTable::new();
        for file in &manifest.owned {
            table.add_owned(file);
        }
        for name in &manifest.wanted {
            table.add_wanted(name);
        }

        PeerSession {
            id: transport.local_id(),
            transport: Arc::new(transport),
            owned: manifest.owned,
            files: Arc::new(Mutex::new(table)),
            sink,
            config,
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Register, exchange segments until done, and wait for the tracker's stop.
    ///
    /// # Returns
    ///
    /// The peer's file table once both workers have finished.
    pub fn run(self) -> Result<FileTable> {
        register_with_tracker(self.transport.as_ref(), &self.owned)?;
        info!("Peer {} registered with the tracker", self.id);

        let upload = UploadWorker::new(Arc::clone(&self.transport), Arc::clone(&self.files));
        let upload_handle = thread::Builder::new()
            .name(format!("peer-{}-upload", self.id))
            .spawn(move || upload.start_upload())
            .context("could not spawn upload worker")?;

        let download = DownloadWorker::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.files),
            Arc::clone(&self.sink),
            self.config.batch_size,
            self.config.poll_interval,
        );
        let download_handle = thread::Builder::new()
            .name(format!("peer-{}-download", self.id))
            .spawn(move || download.start_download())
            .context("could not spawn download worker")?;

        let downloaded = join_worker(download_handle, "download")?;
        let served = join_worker(upload_handle, "upload")?;

        info!(
            "Peer {} stopped: {} segments downloaded, {} served",
            self.id, downloaded, served
        );

        let files = self
            .files
            .lock()
            .map_err(|_| anyhow!("file table lock poisoned"))?;

        Ok(files.clone())
    }
}

fn join_worker(handle: JoinHandle<Result<u32>>, role: &str) -> Result<u32> {
    handle
        .join()
        .map_err(|_| anyhow!("{role} worker panicked"))?
        .with_context(|| format!("{role} worker failed"))
}
