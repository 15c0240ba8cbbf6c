//! # Upload Worker
//!
//! Serves segment requests from other peers until the tracker says stop.
//! A request is answered with a reply echoing the file name and hash; the
//! payload itself is simulated, so the reply is the proof of transfer.

use crate::error::ProtocolError;
use crate::files::FileTable;
use crate::message::*;
use crate::peer::PeerId;
use crate::transport::*;

use anyhow::{anyhow, Result};

use std::sync::{Arc, Mutex};

/// Answers segment requests for one peer.
pub struct UploadWorker<T: Transport + ?Sized> {
    transport: Arc<T>,
    /// File table shared with the download worker
    files: Arc<Mutex<FileTable>>,
}

impl<T: Transport + ?Sized> UploadWorker<T> {
    pub fn new(transport: Arc<T>, files: Arc<Mutex<FileTable>>) -> UploadWorker<T> {
        UploadWorker { transport, files }
    }

    /// Serve requests until a stop message from the tracker arrives.
    ///
    /// # Returns
    ///
    /// The number of requests served.
    pub fn start_upload(&self) -> Result<u32> {
        let id = self.transport.local_id();
        let mut served = 0;

        loop {
            let (source, message) = self
                .transport
                .receive_message(Source::Any, &[Tag::SegmentRequest, Tag::Stop])?;

            match message {
                Message::Stop if source == PeerId::TRACKER => break,
                Message::SegmentRequest { file, hash } => {
                    self.serve(source, file, hash)?;
                    served += 1;
                }
                other => {
                    return Err(ProtocolError::UnexpectedMessage {
                        tag: other.tag(),
                        source_peer: source,
                        state: "uploading",
                    }
                    .into())
                }
            }
        }

        debug!("Peer {} stopped uploading after {} requests", id, served);

        Ok(served)
    }

    fn serve(&self, requester: PeerId, file: String, hash: String) -> Result<()> {
        let owned = self
            .files
            .lock()
            .map_err(|_| anyhow!("file table lock poisoned"))?
            .owns(&file, &hash);

        // The tracker only lists owners, so this means the snapshot was wrong.
        // Reply anyway so the requester is not left waiting.
        if !owned {
            warn!(
                "Peer {} asked peer {} for {:?} segment {} it does not own",
                requester,
                self.transport.local_id(),
                file,
                hash
            );
        }

        trace!(
            "Peer {} serving {:?} segment {} to peer {}",
            self.transport.local_id(),
            file,
            hash,
            requester
        );

        self.transport
            .send_message(requester, &Message::SegmentReply { file, hash })
    }
}
