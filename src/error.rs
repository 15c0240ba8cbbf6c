//! # Swarm Error Taxonomy
//!
//! Typed errors for the seams between components. Services propagate them
//! through `anyhow::Result`, so callers that care about the kind of failure
//! can still `downcast_ref` to one of these.
//!
//! | Kind | Type | Raised by |
//! |------|------|-----------|
//! | Protocol violation | [`ProtocolError`] | codec, tracker, workers |
//! | Transport failure | [`TransportError`] | transport implementations |
//! | Logical impossibility | [`SelectionError`] | peer selection |
//! | Bad input manifest | [`ManifestError`] | manifest reader |
//!
//! None of these are retried. The swarm is assumed trusted and homogeneous,
//! so every error is fatal for the participant that hits it.

use crate::message::Tag;
use crate::peer::PeerId;

use thiserror::Error;

/// A message did not have the shape its tag promises, or arrived when the
/// receiving state machine did not expect it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A variable-width field exceeds the agreed maximum width.
    #[error("field '{field}' is {len} bytes wide, limit is {limit}")]
    FieldTooWide {
        field: &'static str,
        len: usize,
        limit: usize,
    },

    /// A count does not fit in the wire representation.
    #[error("count for '{field}' overflows the wire format: {count}")]
    CountOverflow { field: &'static str, count: usize },

    /// The payload ended before the record was complete.
    #[error("payload for {tag:?} ended early while reading '{field}'")]
    Truncated { tag: Tag, field: &'static str },

    /// The payload carried bytes beyond the end of the record.
    #[error("payload for {tag:?} has {extra} trailing bytes")]
    TrailingBytes { tag: Tag, extra: usize },

    /// A string field is not valid UTF-8.
    #[error("field '{field}' is not valid UTF-8")]
    InvalidText { field: &'static str },

    /// The tag is valid but not acceptable in the current state.
    #[error("unexpected {tag:?} from peer {source_peer} while {state}")]
    UnexpectedMessage {
        tag: Tag,
        source_peer: PeerId,
        state: &'static str,
    },

    /// A peer registered its inventory twice.
    #[error("peer {0} registered its inventory twice")]
    DuplicateInventory(PeerId),

    /// A peer declared completion twice.
    #[error("peer {0} sent Done twice")]
    DuplicateDone(PeerId),

    /// A segment reply does not echo the segment that was requested.
    #[error("peer {donor} answered for '{got}' while '{expected}' was requested")]
    MismatchedReply {
        donor: PeerId,
        expected: String,
        got: String,
    },
}

/// The transport could not carry a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No route is known for this participant.
    #[error("no route to peer {0}")]
    UnknownPeer(PeerId),

    /// The payload exceeds the transport's maximum message size.
    #[error("payload of {len} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { len: usize, limit: usize },

    /// The other side of the channel has gone away.
    #[error("channel for {0:?} is disconnected")]
    Disconnected(Tag),

    /// A receive pinned to a source got a message from someone else.
    #[error("expected a message from peer {expected}, got one from peer {got}")]
    UnexpectedSource { expected: PeerId, got: PeerId },
}

/// Peer selection was asked for a segment that no swarm member owns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no peer in the swarm of '{file}' owns segment {index}")]
    NoDonor { file: String, index: u32 },

    #[error("the swarm snapshot does not mention '{0}'")]
    UnknownFile(String),
}

/// A peer manifest could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("manifest ended early, expected {0}")]
    UnexpectedEnd(&'static str),

    #[error("expected {what}, found '{found}'")]
    InvalidNumber { what: &'static str, found: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_too_wide_names_the_field_and_limit() {
        let err = ProtocolError::FieldTooWide {
            field: "file name",
            len: 20,
            limit: 15,
        };

        let err_msg = format!("{err}");

        assert!(
            err_msg.contains("'file name' is 20 bytes wide, limit is 15"),
            "Error message did not contain expected text: {err_msg}"
        );
    }

    #[test]
    fn selection_error_mentions_file_and_segment() {
        let err = SelectionError::NoDonor {
            file: "file1".to_string(),
            index: 7,
        };

        assert_eq!(
            format!("{err}"),
            "no peer in the swarm of 'file1' owns segment 7"
        );
    }

    #[test]
    fn errors_survive_a_round_trip_through_anyhow() {
        let err: anyhow::Error = TransportError::UnknownPeer(PeerId::new(9)).into();

        assert_eq!(
            err.downcast_ref::<TransportError>(),
            Some(&TransportError::UnknownPeer(PeerId::new(9)))
        );
    }
}
