//! # Tracker and Peer Wire Messages
//!
//! This module defines the closed set of messages exchanged by the tracker and
//! the peers, and their binary encoding.
//!
//! ## Message Structure
//!
//! The message kind travels beside the payload as a [`Tag`], so a payload is
//! only the record itself:
//!
//! - **Counts and indices**: 4 bytes (big-endian u32)
//! - **Peer ids**: 4 bytes (big-endian u32)
//! - **Strings**: 1 byte length prefix, then the UTF-8 bytes
//!
//! ## Message Types
//!
//! | Tag | Direction | Payload |
//! |-----|-----------|---------|
//! | INVENTORY | peer → tracker | files, each with name and `(index, hash)` segments |
//! | INVENTORY_ACK | tracker → peer | none |
//! | SWARM_REQUEST | peer → tracker | names of files of interest |
//! | SWARM_SNAPSHOT | tracker → peer | per file: name, hashes, per peer owned indices |
//! | PROGRESS_UPDATE | peer → tracker | new `(file, index, hash)` triples, completed file names |
//! | SEGMENT_REQUEST | peer → peer | file name, segment hash |
//! | SEGMENT_REPLY | peer → peer | file name, segment hash (echo) |
//! | DONE | peer → tracker | none |
//! | STOP | tracker → peer | none |
//!
//! ## Field Widths
//!
//! File names are at most [`MAX_FILENAME`] bytes and hashes at most
//! [`HASH_SIZE`] bytes. Wider values are rejected on both encode and decode,
//! never truncated.

use crate::error::ProtocolError;
use crate::peer::PeerId;
use crate::segment::*;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};

use std::io::Cursor;

/// Maximum width of a file name in bytes.
pub const MAX_FILENAME: usize = 15;
/// Maximum width of a segment hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Message kind, used by the transport to route a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Inventory,
    InventoryAck,
    SwarmRequest,
    SwarmSnapshot,
    ProgressUpdate,
    SegmentRequest,
    SegmentReply,
    Done,
    Stop,
}

impl Tag {
    /// Every tag, in routing-table order.
    pub const ALL: [Tag; 9] = [
        Tag::Inventory,
        Tag::InventoryAck,
        Tag::SwarmRequest,
        Tag::SwarmSnapshot,
        Tag::ProgressUpdate,
        Tag::SegmentRequest,
        Tag::SegmentReply,
        Tag::Done,
        Tag::Stop,
    ];

    /// Position of the tag in [`Tag::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Inventory { files: Vec<FileManifest> },
    InventoryAck,
    SwarmRequest { files: Vec<String> },
    SwarmSnapshot { files: Vec<FileSwarm> },
    ProgressUpdate {
        segments: Vec<SegmentReport>,
        completed: Vec<String>,
    },
    SegmentRequest { file: String, hash: String },
    SegmentReply { file: String, hash: String },
    Done,
    Stop,
}

impl Message {
    /// Tag the transport should carry this message on.
    pub fn tag(&self) -> Tag {
        match self {
            Message::Inventory { .. } => Tag::Inventory,
            Message::InventoryAck => Tag::InventoryAck,
            Message::SwarmRequest { .. } => Tag::SwarmRequest,
            Message::SwarmSnapshot { .. } => Tag::SwarmSnapshot,
            Message::ProgressUpdate { .. } => Tag::ProgressUpdate,
            Message::SegmentRequest { .. } => Tag::SegmentRequest,
            Message::SegmentReply { .. } => Tag::SegmentReply,
            Message::Done => Tag::Done,
            Message::Stop => Tag::Stop,
        }
    }

    /// Serialize the message payload.
    ///
    /// Fails if a file name or hash is wider than the agreed limit, or if a
    /// count does not fit in 32 bits.
    pub fn serialize(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Encoder::default();

        match self {
            Message::Inventory { files } => {
                out.put_count("files", files.len())?;
                for file in files {
                    out.put_name(&file.name)?;
                    out.put_count("segments", file.segments.len())?;
                    for segment in &file.segments {
                        out.put_u32(segment.index);
                        out.put_hash(&segment.hash)?;
                    }
                }
            }
            Message::SwarmRequest { files } => {
                out.put_count("files", files.len())?;
                for name in files {
                    out.put_name(name)?;
                }
            }
            Message::SwarmSnapshot { files } => {
                out.put_count("files", files.len())?;
                for file in files {
                    out.put_name(&file.name)?;
                    out.put_count("hashes", file.hashes.len())?;
                    for hash in &file.hashes {
                        out.put_hash(hash)?;
                    }
                    out.put_count("peers", file.peers.len())?;
                    for holdings in &file.peers {
                        out.put_u32(holdings.peer.get());
                        out.put_count("indices", holdings.indices.len())?;
                        for index in &holdings.indices {
                            out.put_u32(*index);
                        }
                    }
                }
            }
            Message::ProgressUpdate {
                segments,
                completed,
            } => {
                out.put_count("segments", segments.len())?;
                for report in segments {
                    out.put_name(&report.file)?;
                    out.put_u32(report.index);
                    out.put_hash(&report.hash)?;
                }
                out.put_count("completed", completed.len())?;
                for name in completed {
                    out.put_name(name)?;
                }
            }
            Message::SegmentRequest { file, hash } | Message::SegmentReply { file, hash } => {
                out.put_name(file)?;
                out.put_hash(hash)?;
            }
            Message::InventoryAck | Message::Done | Message::Stop => {}
        }

        Ok(out.buf)
    }
}

/// Deserialize a message payload received on `tag`.
///
/// # Arguments
///
/// * `tag` - The tag the payload was carried on.
/// * `payload` - The payload bytes.
///
pub fn deserialize_message(tag: Tag, payload: &[u8]) -> Result<Message, ProtocolError> {
    let mut input = Decoder::new(tag, payload);

    let message = match tag {
        Tag::Inventory => {
            let nb_files = input.get_u32("files")?;
            let mut files = Vec::new();
            for _ in 0..nb_files {
                let name = input.get_name()?;
                let nb_segments = input.get_u32("segments")?;
                let mut segments = Vec::new();
                for _ in 0..nb_segments {
                    let index = input.get_u32("segment index")?;
                    let hash = input.get_hash()?;
                    segments.push(Segment { index, hash });
                }
                files.push(FileManifest { name, segments });
            }
            Message::Inventory { files }
        }
        Tag::SwarmRequest => {
            let nb_files = input.get_u32("files")?;
            let mut files = Vec::new();
            for _ in 0..nb_files {
                files.push(input.get_name()?);
            }
            Message::SwarmRequest { files }
        }
        Tag::SwarmSnapshot => {
            let nb_files = input.get_u32("files")?;
            let mut files = Vec::new();
            for _ in 0..nb_files {
                let name = input.get_name()?;
                let nb_hashes = input.get_u32("hashes")?;
                let mut hashes = Vec::new();
                for _ in 0..nb_hashes {
                    hashes.push(input.get_hash()?);
                }
                let nb_peers = input.get_u32("peers")?;
                let mut peers = Vec::new();
                for _ in 0..nb_peers {
                    let peer = PeerId::new(input.get_u32("peer id")?);
                    let nb_indices = input.get_u32("indices")?;
                    let mut indices = Vec::new();
                    for _ in 0..nb_indices {
                        indices.push(input.get_u32("segment index")?);
                    }
                    peers.push(PeerHoldings { peer, indices });
                }
                files.push(FileSwarm {
                    name,
                    hashes,
                    peers,
                });
            }
            Message::SwarmSnapshot { files }
        }
        Tag::ProgressUpdate => {
            let nb_segments = input.get_u32("segments")?;
            let mut segments = Vec::new();
            for _ in 0..nb_segments {
                let file = input.get_name()?;
                let index = input.get_u32("segment index")?;
                let hash = input.get_hash()?;
                segments.push(SegmentReport { file, index, hash });
            }
            let nb_completed = input.get_u32("completed")?;
            let mut completed = Vec::new();
            for _ in 0..nb_completed {
                completed.push(input.get_name()?);
            }
            Message::ProgressUpdate {
                segments,
                completed,
            }
        }
        Tag::SegmentRequest => Message::SegmentRequest {
            file: input.get_name()?,
            hash: input.get_hash()?,
        },
        Tag::SegmentReply => Message::SegmentReply {
            file: input.get_name()?,
            hash: input.get_hash()?,
        },
        Tag::InventoryAck => Message::InventoryAck,
        Tag::Done => Message::Done,
        Tag::Stop => Message::Stop,
    };

    input.finish()?;

    Ok(message)
}

#[derive(Default)]
struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn put_u32(&mut self, value: u32) {
        let mut raw = [0; 4];
        BigEndian::write_u32(&mut raw, value);
        self.buf.extend_from_slice(&raw);
    }

    fn put_count(&mut self, field: &'static str, count: usize) -> Result<(), ProtocolError> {
        let count = u32::try_from(count).map_err(|_| ProtocolError::CountOverflow { field, count })?;
        self.put_u32(count);
        Ok(())
    }

    fn put_str(&mut self, field: &'static str, value: &str, limit: usize) -> Result<(), ProtocolError> {
        let bytes = value.as_bytes();
        if bytes.len() > limit {
            return Err(ProtocolError::FieldTooWide {
                field,
                len: bytes.len(),
                limit,
            });
        }
        // Limits are well below 256, the length fits in one byte
        self.buf.push(bytes.len() as u8);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn put_name(&mut self, name: &str) -> Result<(), ProtocolError> {
        self.put_str("file name", name, MAX_FILENAME)
    }

    fn put_hash(&mut self, hash: &str) -> Result<(), ProtocolError> {
        self.put_str("segment hash", hash, HASH_SIZE)
    }
}

struct Decoder<'a> {
    tag: Tag,
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Decoder<'a> {
    fn new(tag: Tag, payload: &'a [u8]) -> Self {
        Decoder {
            tag,
            cursor: Cursor::new(payload),
        }
    }

    fn truncated(&self, field: &'static str) -> ProtocolError {
        ProtocolError::Truncated {
            tag: self.tag,
            field,
        }
    }

    fn get_u32(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        self.cursor
            .read_u32::<BigEndian>()
            .map_err(|_| self.truncated(field))
    }

    fn get_str(&mut self, field: &'static str, limit: usize) -> Result<String, ProtocolError> {
        let len = self.cursor.read_u8().map_err(|_| self.truncated(field))? as usize;
        if len > limit {
            return Err(ProtocolError::FieldTooWide { field, limit, len });
        }

        let payload: &'a [u8] = *self.cursor.get_ref();
        let start = self.cursor.position() as usize;
        let bytes = payload
            .get(start..start + len)
            .ok_or_else(|| self.truncated(field))?;
        let value = std::str::from_utf8(bytes)
            .map_err(|_| ProtocolError::InvalidText { field })?
            .to_string();
        self.cursor.set_position((start + len) as u64);

        Ok(value)
    }

    fn get_name(&mut self) -> Result<String, ProtocolError> {
        self.get_str("file name", MAX_FILENAME)
    }

    fn get_hash(&mut self) -> Result<String, ProtocolError> {
        self.get_str("segment hash", HASH_SIZE)
    }

    /// Fail if any bytes are left after the record.
    fn finish(self) -> Result<(), ProtocolError> {
        let extra = self.cursor.get_ref().len() - self.cursor.position() as usize;
        if extra > 0 {
            return Err(ProtocolError::TrailingBytes {
                tag: self.tag,
                extra,
            });
        }
        Ok(())
    }
}
