//! Call wiring: the peer → call mapping and per-call notification dispatch.

use std::collections::HashMap;

use huddle_common::{CallId, PeerId};
use huddle_media::RemoteStream;
use tracing::{debug, info, warn};

use crate::relay::{CallEvent, CallLeg};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Outbound,
    Inbound,
}

struct CallEntry<C> {
    call: C,
    direction: CallDirection,
    remote: Option<RemoteStream>,
}

/// What the controller should do after a call notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallAction {
    Show { peer: PeerId, stream: RemoteStream },
    Teardown { peer: PeerId },
    /// Unknown or already torn-down call.
    Ignored,
}

/// Active calls keyed by remote identity. At most one call per peer.
pub struct CallRegistry<C: CallLeg> {
    calls: HashMap<PeerId, CallEntry<C>>,
}

impl<C: CallLeg> CallRegistry<C> {
    pub fn new() -> Self {
        Self {
            calls: HashMap::new(),
        }
    }

    /// Registers `call` for its peer. A previous call to the same peer is
    /// closed and replaced.
    pub fn attach(&mut self, call: C, direction: CallDirection) {
        let peer = call.peer().clone();
        let call_id = call.id();
        info!("attached {:?} call {} with {}", direction, call_id, peer);

        let entry = CallEntry {
            call,
            direction,
            remote: None,
        };
        if let Some(mut previous) = self.calls.insert(peer.clone(), entry) {
            if previous.call.id() != call_id {
                debug!("replacing call {} with {}", previous.call.id(), peer);
                previous.call.close();
            }
        }
    }

    /// Applies one notification. Closed and errored both tear the call down,
    /// and only the first terminal notification for a call does anything.
    pub fn dispatch(&mut self, call_id: CallId, event: CallEvent) -> CallAction {
        let Some(peer) = self.peer_for(call_id) else {
            debug!("ignoring {} for unknown call {}", event_name(&event), call_id);
            return CallAction::Ignored;
        };

        match event {
            CallEvent::Stream(stream) => {
                if let Some(entry) = self.calls.get_mut(&peer) {
                    entry.remote = Some(stream.clone());
                }
                CallAction::Show { peer, stream }
            }
            CallEvent::Closed => {
                info!("call {} with {} closed", call_id, peer);
                self.calls.remove(&peer);
                CallAction::Teardown { peer }
            }
            CallEvent::Errored(reason) => {
                warn!("call {} with {} failed: {}", call_id, peer, reason);
                if let Some(mut entry) = self.calls.remove(&peer) {
                    entry.call.close();
                }
                CallAction::Teardown { peer }
            }
        }
    }

    /// Removes and hangs up the call with `peer`, if any.
    pub fn remove(&mut self, peer: &PeerId) -> bool {
        match self.calls.remove(peer) {
            Some(mut entry) => {
                entry.call.close();
                true
            }
            None => false,
        }
    }

    /// Hangs up every call. Returns how many were open.
    pub fn close_all(&mut self) -> usize {
        let count = self.calls.len();
        for (peer, mut entry) in self.calls.drain() {
            debug!("closing call {} with {}", entry.call.id(), peer);
            entry.call.close();
        }
        count
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.calls.contains_key(peer)
    }

    pub fn call_id(&self, peer: &PeerId) -> Option<CallId> {
        self.calls.get(peer).map(|e| e.call.id())
    }

    pub fn direction(&self, peer: &PeerId) -> Option<CallDirection> {
        self.calls.get(peer).map(|e| e.direction)
    }

    pub fn remote_stream(&self, peer: &PeerId) -> Option<&RemoteStream> {
        self.calls.get(peer).and_then(|e| e.remote.as_ref())
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.calls.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn peer_for(&self, call_id: CallId) -> Option<PeerId> {
        self.calls
            .iter()
            .find(|(_, e)| e.call.id() == call_id)
            .map(|(peer, _)| peer.clone())
    }
}

impl<C: CallLeg> Default for CallRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn event_name(event: &CallEvent) -> &'static str {
    match event {
        CallEvent::Stream(_) => "stream",
        CallEvent::Closed => "close",
        CallEvent::Errored(_) => "error",
    }
}
