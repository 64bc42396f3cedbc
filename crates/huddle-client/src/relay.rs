//! Boundary to the external relay/signaling service.
//!
//! The relay is opaque: it assigns identities, places and delivers calls, and
//! reports per-call media and lifecycle notifications. Everything it reports
//! flows back through a [`RelaySink`] as [`RelayEvent`]s tagged with the
//! session epoch they belong to.

use huddle_common::{CallId, Error, PeerId, RelayErrorKind, RoomToken};
use huddle_media::{LocalMediaStream, RemoteStream};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RelayError {
    pub kind: RelayErrorKind,
    pub message: String,
}

impl RelayError {
    pub fn new(kind: RelayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Builds an error from the relay's string `type` field.
    pub fn from_type(kind: &str, message: impl Into<String>) -> Self {
        Self::new(RelayErrorKind::from_type(kind), message)
    }
}

impl From<RelayError> for Error {
    fn from(err: RelayError) -> Self {
        Error::relay(err.kind, err.message)
    }
}

/// Per-call notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Stream(RemoteStream),
    Closed,
    Errored(String),
}

#[derive(Debug)]
pub enum RelayEvent<C> {
    /// The relay assigned this session's identity.
    Opened(PeerId),
    IncomingCall(C),
    Call { call_id: CallId, event: CallEvent },
    Error(RelayError),
    /// Lost the signaling connection; existing calls may survive.
    Disconnected,
}

#[derive(Debug)]
pub struct SessionEvent<C> {
    pub epoch: u64,
    pub event: RelayEvent<C>,
}

/// Handle a relay uses to report notifications for one session.
pub struct RelaySink<C> {
    epoch: u64,
    tx: mpsc::UnboundedSender<SessionEvent<C>>,
}

impl<C> RelaySink<C> {
    pub fn new(epoch: u64, tx: mpsc::UnboundedSender<SessionEvent<C>>) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Queues a notification. Returns false once the controller is gone.
    pub fn emit(&self, event: RelayEvent<C>) -> bool {
        self.tx
            .send(SessionEvent {
                epoch: self.epoch,
                event,
            })
            .is_ok()
    }
}

impl<C> Clone for RelaySink<C> {
    fn clone(&self) -> Self {
        Self {
            epoch: self.epoch,
            tx: self.tx.clone(),
        }
    }
}

/// One leg of a peer-to-peer call as the relay exposes it.
pub trait CallLeg {
    fn id(&self) -> CallId;
    fn peer(&self) -> &PeerId;
    /// Accepts an inbound call, sending `stream` to the caller.
    fn answer(&mut self, stream: &LocalMediaStream);
    /// Hangs up. Must be idempotent.
    fn close(&mut self);
}

/// The relay/signaling collaborator.
///
/// `open` may be called again after `destroy`; each open starts a new session
/// with a fresh identity delivered as [`RelayEvent::Opened`].
pub trait Relay {
    type Call: CallLeg;

    async fn open(&mut self, sink: RelaySink<Self::Call>) -> Result<(), RelayError>;

    fn dial(&mut self, target: &PeerId, stream: &LocalMediaStream)
        -> Result<Self::Call, RelayError>;

    /// Releases the session. Outstanding calls must already be closed.
    fn destroy(&mut self);

    /// Publishes `me` under `room` and returns the members already present.
    fn register_room(&mut self, room: &RoomToken, me: &PeerId) -> Result<Vec<PeerId>, RelayError> {
        let _ = (room, me);
        Err(RelayError::new(
            RelayErrorKind::Unsupported,
            "relay has no room directory",
        ))
    }

    fn unregister_room(&mut self, room: &RoomToken, me: &PeerId) {
        let _ = (room, me);
    }
}
