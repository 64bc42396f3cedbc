//! Peer session manager: one relay session and its assigned identity.

use huddle_common::{Error, PeerId, Result, RoomToken};
use huddle_media::LocalMediaStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::calls::CallRegistry;
use crate::relay::{Relay, RelaySink, SessionEvent};

pub struct PeerSession<R: Relay> {
    relay: R,
    tx: mpsc::UnboundedSender<SessionEvent<R::Call>>,
    epoch: u64,
    open: bool,
    identity: Option<PeerId>,
}

impl<R: Relay> PeerSession<R> {
    pub fn new(relay: R, tx: mpsc::UnboundedSender<SessionEvent<R::Call>>) -> Self {
        Self {
            relay,
            tx,
            epoch: 0,
            open: false,
            identity: None,
        }
    }

    /// Opens a fresh relay session. The identity arrives later through
    /// [`PeerSession::on_opened`].
    pub async fn open(&mut self) -> Result<()> {
        if self.open {
            debug!("reopening relay session {}", self.epoch);
            self.relay.destroy();
        }
        self.epoch += 1;
        self.identity = None;
        self.open = false;

        let sink = RelaySink::new(self.epoch, self.tx.clone());
        self.relay.open(sink).await.map_err(|err| {
            warn!("relay open failed: {}", err);
            Error::from(err)
        })?;
        self.open = true;
        debug!("relay session {} opening", self.epoch);
        Ok(())
    }

    /// Records the identity announced for `epoch`. Stale epochs are ignored.
    pub fn on_opened(&mut self, epoch: u64, id: PeerId) -> bool {
        if !self.is_current(epoch) || !self.open {
            return false;
        }
        info!("My peer ID is: {}", id);
        self.identity = Some(id);
        true
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn identity(&self) -> Option<&PeerId> {
        self.identity.as_ref()
    }

    pub fn dial(&mut self, target: &PeerId, stream: &LocalMediaStream) -> Result<R::Call> {
        if self.identity.is_none() {
            return Err(Error::not_ready("relay session has no identity yet"));
        }
        info!("Attempting to connect to user: {}", target);
        Ok(self.relay.dial(target, stream)?)
    }

    pub fn register_room(&mut self, room: &RoomToken) -> Result<Vec<PeerId>> {
        let me = self
            .identity
            .clone()
            .ok_or_else(|| Error::not_ready("relay session has no identity yet"))?;
        Ok(self.relay.register_room(room, &me)?)
    }

    pub fn unregister_room(&mut self, room: &RoomToken) {
        if let Some(me) = self.identity.clone() {
            self.relay.unregister_room(room, &me);
        }
    }

    /// Hangs up every call, then releases the relay session. Notifications
    /// still in flight for it become stale.
    pub fn close(&mut self, calls: &mut CallRegistry<R::Call>) {
        let closed = calls.close_all();
        if self.open {
            self.relay.destroy();
            info!("closed relay session {} ({} calls)", self.epoch, closed);
        }
        self.open = false;
        self.identity = None;
        self.epoch += 1;
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    pub fn relay_mut(&mut self) -> &mut R {
        &mut self.relay
    }
}
