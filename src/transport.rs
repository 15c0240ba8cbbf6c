//! # Point-to-Point Transport
//!
//! The tracker and the peers only ever talk through the [`Transport`] trait: a
//! reliable, ordered, blocking send and receive between participants, with
//! every message carried on a [`Tag`].
//!
//! ## In-Memory Switchboard
//!
//! [`Switchboard`] is the in-process implementation used by the simulator:
//!
//! - **One channel per (participant, tag)**: an unbounded crossbeam channel, so
//!   sends never block and every stream stays ordered
//! - **Fan-in receive**: a receive over several tags polls their channels in
//!   the caller's order, and parks on a `crossbeam_channel::Select` until one
//!   of them is ready
//! - **Routing**: each [`Endpoint`] resolves a destination [`PeerId`] to that
//!   participant's channel table
//!
//! There are no timeouts. A participant that never answers stalls whoever is
//! waiting on it.

use crate::error::TransportError;
use crate::message::*;
use crate::peer::PeerId;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Select, Sender, TryRecvError};

use std::collections::HashMap;
use std::sync::Arc;

/// A payload as delivered to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Participant that sent the payload
    pub source: PeerId,
    /// Tag the payload was carried on
    pub tag: Tag,
    /// Encoded message
    pub payload: Vec<u8>,
}

/// Which sender a receive accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Any,
    Peer(PeerId),
}

/// Blocking point-to-point messaging between participants.
pub trait Transport: Send + Sync {
    /// Identifier of the participant this transport belongs to.
    fn local_id(&self) -> PeerId;

    /// Send `payload` on `tag` to `dest`.
    fn send(&self, dest: PeerId, tag: Tag, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Block until a message carried on one of `tags` arrives.
    ///
    /// An empty `tags` slice accepts every tag. When several tags have a
    /// message waiting, the earliest tag in `tags` wins. With
    /// [`Source::Peer`], a message from any other sender is an error: every
    /// exchange in this protocol has a single counterpart at a time.
    fn receive(&self, source: Source, tags: &[Tag]) -> Result<Envelope, TransportError>;

    /// Take a message already waiting on one of `tags`, without blocking.
    ///
    /// Tags are tried in the given order.
    fn try_receive(&self, tags: &[Tag]) -> Result<Option<Envelope>, TransportError>;

    /// Serialize `message` and send it on its own tag.
    fn send_message(&self, dest: PeerId, message: &Message) -> Result<()> {
        let payload = message.serialize()?;
        self.send(dest, message.tag(), payload)?;
        Ok(())
    }

    /// Receive and deserialize the next message on one of `tags`.
    fn receive_message(&self, source: Source, tags: &[Tag]) -> Result<(PeerId, Message)> {
        let envelope = self.receive(source, tags)?;
        let message = deserialize_message(envelope.tag, &envelope.payload)?;
        Ok((envelope.source, message))
    }

    /// Non-blocking counterpart of [`Transport::receive_message`].
    fn try_receive_message(&self, tags: &[Tag]) -> Result<Option<(PeerId, Message)>> {
        match self.try_receive(tags)? {
            Some(envelope) => {
                let message = deserialize_message(envelope.tag, &envelope.payload)?;
                Ok(Some((envelope.source, message)))
            }
            None => Ok(None),
        }
    }
}

type Route = Vec<Sender<Envelope>>;

/// Builds the channels of an in-memory network and hands out endpoints.
pub struct Switchboard {
    routes: Arc<HashMap<PeerId, Route>>,
    inboxes: HashMap<PeerId, Vec<Receiver<Envelope>>>,
    max_payload: usize,
}

impl Switchboard {
    /// Create a network connecting every participant in `ids`.
    ///
    /// # Arguments
    ///
    /// * `ids` - Participants, tracker included.
    /// * `max_payload` - Largest payload any participant may send, in bytes.
    ///
    pub fn new(ids: impl IntoIterator<Item = PeerId>, max_payload: usize) -> Switchboard {
        let mut routes = HashMap::new();
        let mut inboxes = HashMap::new();

        for id in ids {
            let (senders, receivers): (Vec<_>, Vec<_>) =
                Tag::ALL.iter().map(|_| unbounded::<Envelope>()).unzip();
            routes.insert(id, senders);
            inboxes.insert(id, receivers);
        }

        Switchboard {
            routes: Arc::new(routes),
            inboxes,
            max_payload,
        }
    }

    /// Take the endpoint of participant `id`.
    ///
    /// Each endpoint can be taken once; it returns `None` afterwards, or if
    /// `id` is not part of the network.
    pub fn endpoint(&mut self, id: PeerId) -> Option<Endpoint> {
        let inbox = self.inboxes.remove(&id)?;

        Some(Endpoint {
            id,
            routes: Arc::clone(&self.routes),
            inbox,
            max_payload: self.max_payload,
        })
    }
}

/// One participant's attachment to a [`Switchboard`].
pub struct Endpoint {
    id: PeerId,
    routes: Arc<HashMap<PeerId, Route>>,
    inbox: Vec<Receiver<Envelope>>,
    max_payload: usize,
}

impl Transport for Endpoint {
    fn local_id(&self) -> PeerId {
        self.id
    }

    fn send(&self, dest: PeerId, tag: Tag, payload: Vec<u8>) -> Result<(), TransportError> {
        if payload.len() > self.max_payload {
            return Err(TransportError::PayloadTooLarge {
                len: payload.len(),
                limit: self.max_payload,
            });
        }

        let route = self
            .routes
            .get(&dest)
            .ok_or(TransportError::UnknownPeer(dest))?;

        trace!("{} -> {}: {:?} ({} bytes)", self.id, dest, tag, payload.len());

        route[tag.index()]
            .send(Envelope {
                source: self.id,
                tag,
                payload,
            })
            .map_err(|_| TransportError::Disconnected(tag))
    }

    fn receive(&self, source: Source, tags: &[Tag]) -> Result<Envelope, TransportError> {
        let tags: &[Tag] = if tags.is_empty() { &Tag::ALL } else { tags };

        let envelope = loop {
            if let Some(envelope) = self.try_receive(tags)? {
                break envelope;
            }

            let mut select = Select::new();
            for tag in tags {
                select.recv(&self.inbox[tag.index()]);
            }
            select.ready();
        };

        match source {
            Source::Peer(expected) if expected != envelope.source => {
                Err(TransportError::UnexpectedSource {
                    expected,
                    got: envelope.source,
                })
            }
            _ => Ok(envelope),
        }
    }

    fn try_receive(&self, tags: &[Tag]) -> Result<Option<Envelope>, TransportError> {
        let tags: &[Tag] = if tags.is_empty() { &Tag::ALL } else { tags };

        for tag in tags {
            match self.inbox[tag.index()].try_recv() {
                Ok(envelope) => return Ok(Some(envelope)),
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Disconnected) => return Err(TransportError::Disconnected(*tag)),
            }
        }

        Ok(None)
    }
}
