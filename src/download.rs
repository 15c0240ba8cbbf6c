//! # Download Worker
//!
//! This module implements the download role of a peer: it keeps asking the
//! tracker who owns what, fetches missing segments directly from other peers,
//! and reports its progress, until every wanted file is complete.
//!
//! ## Download Round
//!
//! 1. **Swarm request**: ask the tracker about every file that is missing
//!    segments or whose size is still unknown
//! 2. **Discovery**: adopt size and hashes of newly discoverable files
//! 3. **Fetching**: fetch up to `batch_size` missing segments, lowest index
//!    first, each from the least-loaded donor that owns it
//! 4. **Reporting**: send one progress update with every segment acquired in
//!    the round, plus the names of files completed in the round
//!
//! Rounds repeat until nothing is missing and every file is discovered, then
//! the worker tells the tracker it is done.
//!
//! ## Locking
//!
//! The file table is shared with the upload worker. It is locked only between
//! network calls, never across one: a worker blocked on a donor while holding
//! the lock would stall that peer's uploads, and two such peers would
//! deadlock.

use crate::error::{ProtocolError, SelectionError};
use crate::files::FileTable;
use crate::message::*;
use crate::output::CompletionSink;
use crate::peer::PeerId;
use crate::segment::*;
use crate::selection::RequestLoad;
use crate::transport::*;

use anyhow::{anyhow, Context, Result};

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Segments acquired during one round.
#[derive(Debug, Default)]
struct RoundReport {
    segments: Vec<SegmentReport>,
    completed: Vec<String>,
}

impl RoundReport {
    fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.completed.is_empty()
    }
}

/// Drives segment acquisition for one peer.
pub struct DownloadWorker<T: Transport + ?Sized> {
    /// Identifier of the downloading peer
    id: PeerId,
    /// Transport shared with the upload worker
    transport: Arc<T>,
    /// File table shared with the upload worker
    files: Arc<Mutex<FileTable>>,
    /// Where completed files are handed off
    sink: Arc<dyn CompletionSink>,
    /// Requests issued to each donor so far
    load: RequestLoad,
    /// Maximum number of segments fetched per round
    batch_size: usize,
    /// Pause between rounds that had nothing to fetch
    poll_interval: Duration,
}

impl<T: Transport + ?Sized> DownloadWorker<T> {
    /// Creates a new download worker.
    ///
    /// # Arguments
    ///
    /// * `transport` - The peer's transport.
    /// * `files` - The peer's file table.
    /// * `sink` - Receiver of completed files.
    /// * `batch_size` - Maximum number of segments fetched per round.
    /// * `poll_interval` - Pause between rounds that had nothing to fetch.
    ///
    pub fn new(
        transport: Arc<T>,
        files: Arc<Mutex<FileTable>>,
        sink: Arc<dyn CompletionSink>,
        batch_size: usize,
        poll_interval: Duration,
    ) -> DownloadWorker<T> {
        DownloadWorker {
            id: transport.local_id(),
            transport,
            files,
            sink,
            load: RequestLoad::new(),
            batch_size: batch_size.max(1),
            poll_interval,
        }
    }

    /// Run download rounds until every file is complete, then send Done.
    ///
    /// # Returns
    ///
    /// The number of segments downloaded.
    pub fn start_download(mut self) -> Result<u32> {
        let mut needed: u32 = 0;
        let mut downloaded: u32 = 0;
        let mut round = 0;

        loop {
            round += 1;

            let pending = self.lock_files()?.pending_files();
            if pending.is_empty() {
                break;
            }

            let swarms = self.request_swarm(pending)?;
            needed += self.lock_files()?.merge_snapshot(&swarms);

            let batch = (needed as usize).min(self.batch_size);
            debug!(
                "Peer {} round {}: {} segments needed, fetching {}",
                self.id, round, needed, batch
            );

            let mut report = RoundReport::default();
            for _ in 0..batch {
                let work = self.next_work(&swarms)?;
                self.fetch_segment(&work)?;
                self.store_segment(work, &mut report)?;
                needed -= 1;
                downloaded += 1;
            }
            debug_assert_eq!(needed, self.lock_files()?.missing_total());

            if !report.is_empty() {
                self.report_progress(report)?;
            }

            if batch == 0 && !self.poll_interval.is_zero() {
                thread::sleep(self.poll_interval);
            }
        }

        self.transport
            .send_message(PeerId::TRACKER, &Message::Done)
            .context("could not send done to tracker")?;

        info!(
            "Peer {} finished downloading: {} segments in {} rounds",
            self.id, downloaded, round
        );

        Ok(downloaded)
    }

    fn lock_files(&self) -> Result<MutexGuard<'_, FileTable>> {
        self.files
            .lock()
            .map_err(|_| anyhow!("file table lock poisoned"))
    }

    /// Ask the tracker about `pending` files and wait for its snapshot.
    fn request_swarm(&self, pending: Vec<String>) -> Result<Vec<FileSwarm>> {
        self.transport
            .send_message(PeerId::TRACKER, &Message::SwarmRequest { files: pending })
            .context("could not send swarm request")?;

        let (source, message) = self
            .transport
            .receive_message(Source::Peer(PeerId::TRACKER), &[Tag::SwarmSnapshot])
            .context("could not receive swarm snapshot")?;

        match message {
            Message::SwarmSnapshot { files } => Ok(files),
            other => Err(ProtocolError::UnexpectedMessage {
                tag: other.tag(),
                source_peer: source,
                state: "waiting for a swarm snapshot",
            }
            .into()),
        }
    }

    /// Pick the next segment to fetch and the donor to fetch it from.
    fn next_work(&mut self, swarms: &[FileSwarm]) -> Result<SegmentWork> {
        let (file, segment) = {
            let files = self.lock_files()?;
            let (name, record) = files
                .next_incomplete()
                .ok_or_else(|| anyhow!("peer {} has nothing left to fetch", self.id))?;
            let segment = record
                .first_missing()
                .ok_or_else(|| anyhow!("{name:?} is missing segments but has none unowned"))?;
            (name.clone(), segment)
        };

        let swarm = swarms
            .iter()
            .find(|swarm| swarm.name == file)
            .ok_or_else(|| SelectionError::UnknownFile(file.clone()))?;
        let donor = self.load.select_donor(swarm, segment.index)?;

        Ok(SegmentWork {
            file,
            index: segment.index,
            hash: segment.hash,
            donor,
        })
    }

    /// Request one segment from its donor and wait for the reply.
    fn fetch_segment(&self, work: &SegmentWork) -> Result<()> {
        trace!(
            "Peer {} requesting {:?}#{} from peer {}",
            self.id,
            work.file,
            work.index,
            work.donor
        );

        let request = Message::SegmentRequest {
            file: work.file.clone(),
            hash: work.hash.clone(),
        };
        self.transport
            .send_message(work.donor, &request)
            .with_context(|| format!("could not request segment from peer {}", work.donor))?;

        let (source, reply) = self
            .transport
            .receive_message(Source::Peer(work.donor), &[Tag::SegmentReply])
            .with_context(|| format!("could not receive segment from peer {}", work.donor))?;

        match reply {
            Message::SegmentReply { file, hash } if file == work.file && hash == work.hash => Ok(()),
            Message::SegmentReply { hash, .. } => Err(ProtocolError::MismatchedReply {
                donor: source,
                expected: work.hash.clone(),
                got: hash,
            }
            .into()),
            other => Err(ProtocolError::UnexpectedMessage {
                tag: other.tag(),
                source_peer: source,
                state: "waiting for a segment",
            }
            .into()),
        }
    }

    /// Mark a fetched segment owned and hand off the file if it is complete.
    fn store_segment(&self, work: SegmentWork, report: &mut RoundReport) -> Result<()> {
        let completed_hashes = {
            let mut files = self.lock_files()?;
            match files.mark_owned(&work.file, work.index) {
                Some(true) => files.get(&work.file).map(|record| record.hashes()),
                Some(false) => None,
                None => {
                    return Err(anyhow!(
                        "segment {:?}#{} was fetched twice",
                        work.file,
                        work.index
                    ))
                }
            }
        };

        if let Some(hashes) = completed_hashes {
            info!("Peer {} completed {:?}", self.id, work.file);
            self.sink.file_completed(self.id, &work.file, &hashes)?;
            report.completed.push(work.file.clone());
        }

        report.segments.push(work.into_report());

        Ok(())
    }

    /// Tell the tracker about the segments acquired this round.
    fn report_progress(&self, report: RoundReport) -> Result<()> {
        let update = Message::ProgressUpdate {
            segments: report.segments,
            completed: report.completed,
        };

        self.transport
            .send_message(PeerId::TRACKER, &update)
            .context("could not send progress update")
    }
}
