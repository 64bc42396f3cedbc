//! In-process relay. Every participant sharing one [`LoopbackNetwork`] can
//! reach every other; used by the demo and by tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use huddle_common::{CallId, PeerId, RelayErrorKind, RoomToken};
use huddle_media::{LocalMediaStream, RemoteStream};
use tracing::{debug, info};
use uuid::Uuid;

use crate::relay::{CallEvent, CallLeg, Relay, RelayError, RelayEvent, RelaySink};
use crate::types::RelayConfig;

/// One `dial` as the network saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialRecord {
    pub from: PeerId,
    pub to: PeerId,
    pub stream_id: String,
}

struct CallRecord {
    caller: PeerId,
    callee: PeerId,
    caller_stream: RemoteStream,
    closed: bool,
}

#[derive(Default)]
struct NetworkState {
    peers: HashMap<PeerId, RelaySink<LoopbackCall>>,
    calls: HashMap<CallId, CallRecord>,
    rooms: HashMap<String, Vec<PeerId>>,
    dials: Vec<DialRecord>,
}

impl NetworkState {
    fn emit(&self, peer: &PeerId, event: RelayEvent<LoopbackCall>) {
        match self.peers.get(peer) {
            Some(sink) => {
                if !sink.emit(event) {
                    debug!("loopback: {} no longer listening", peer);
                }
            }
            None => debug!("loopback: dropping notification for offline peer {}", peer),
        }
    }

    fn close_call(&mut self, call_id: CallId) {
        let Some(record) = self.calls.get_mut(&call_id) else {
            return;
        };
        if record.closed {
            return;
        }
        record.closed = true;
        let (caller, callee) = (record.caller.clone(), record.callee.clone());
        for peer in [caller, callee] {
            self.emit(
                &peer,
                RelayEvent::Call {
                    call_id,
                    event: CallEvent::Closed,
                },
            );
        }
    }
}

/// Shared switchboard for loopback relays.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A relay endpoint attached to this network.
    pub fn relay(&self, config: RelayConfig) -> LoopbackRelay {
        LoopbackRelay {
            network: self.clone(),
            config,
            me: None,
        }
    }

    pub fn dials(&self) -> Vec<DialRecord> {
        self.lock().dials.clone()
    }

    pub fn is_online(&self, peer: &PeerId) -> bool {
        self.lock().peers.contains_key(peer)
    }

    /// Calls that are neither closed nor errored.
    pub fn open_calls(&self) -> usize {
        self.lock().calls.values().filter(|c| !c.closed).count()
    }

    pub fn room_members(&self, room: &RoomToken) -> Vec<PeerId> {
        self.lock()
            .rooms
            .get(room.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Drops `peer`'s signaling link without ending its calls.
    pub fn disconnect(&self, peer: &PeerId) {
        self.lock().emit(peer, RelayEvent::Disconnected);
    }

    /// Delivers a relay-level error to `peer`.
    pub fn report_error(&self, peer: &PeerId, error: RelayError) {
        self.lock().emit(peer, RelayEvent::Error(error));
    }
}

pub struct LoopbackRelay {
    network: LoopbackNetwork,
    config: RelayConfig,
    me: Option<PeerId>,
}

impl LoopbackRelay {
    pub fn identity(&self) -> Option<&PeerId> {
        self.me.as_ref()
    }

    pub fn network(&self) -> &LoopbackNetwork {
        &self.network
    }

    fn generate_id() -> PeerId {
        PeerId::new(Uuid::new_v4().simple().to_string())
    }
}

impl Relay for LoopbackRelay {
    type Call = LoopbackCall;

    async fn open(&mut self, sink: RelaySink<LoopbackCall>) -> Result<(), RelayError> {
        if self.me.is_some() {
            self.destroy();
        }

        let id = match self.config.requested_id.as_deref() {
            Some(requested) => PeerId::from(requested),
            None => Self::generate_id(),
        };

        let mut state = self.network.lock();
        if state.peers.contains_key(&id) {
            return Err(RelayError::new(
                RelayErrorKind::UnavailableId,
                format!("ID \"{id}\" is taken"),
            ));
        }
        info!(
            "loopback relay {} (key {}, debug {}) assigned {}",
            self.config.endpoint(),
            self.config.key,
            self.config.debug,
            id
        );
        state.peers.insert(id.clone(), sink.clone());
        drop(state);

        sink.emit(RelayEvent::Opened(id.clone()));
        self.me = Some(id);
        Ok(())
    }

    fn dial(&mut self, target: &PeerId, stream: &LocalMediaStream) -> Result<LoopbackCall, RelayError> {
        let me = self
            .me
            .clone()
            .ok_or_else(|| RelayError::new(RelayErrorKind::Disconnected, "relay is not open"))?;

        let call_id = CallId::new();
        let mut state = self.network.lock();
        state.dials.push(DialRecord {
            from: me.clone(),
            to: target.clone(),
            stream_id: stream.id().to_string(),
        });

        if !state.peers.contains_key(target) {
            state.emit(
                &me,
                RelayEvent::Error(RelayError::new(
                    RelayErrorKind::PeerUnavailable,
                    format!("Could not connect to peer {target}"),
                )),
            );
            state.emit(
                &me,
                RelayEvent::Call {
                    call_id,
                    event: CallEvent::Errored("peer unavailable".to_string()),
                },
            );
        } else {
            state.calls.insert(
                call_id,
                CallRecord {
                    caller: me.clone(),
                    callee: target.clone(),
                    caller_stream: stream.share(),
                    closed: false,
                },
            );
            let inbound = LoopbackCall {
                id: call_id,
                local: target.clone(),
                remote: me.clone(),
                network: self.network.clone(),
            };
            state.emit(target, RelayEvent::IncomingCall(inbound));
        }

        Ok(LoopbackCall {
            id: call_id,
            local: me,
            remote: target.clone(),
            network: self.network.clone(),
        })
    }

    fn destroy(&mut self) {
        let Some(me) = self.me.take() else {
            return;
        };
        let mut state = self.network.lock();
        state.peers.remove(&me);
        for members in state.rooms.values_mut() {
            members.retain(|p| *p != me);
        }
        let involved: Vec<CallId> = state
            .calls
            .iter()
            .filter(|(_, c)| !c.closed && (c.caller == me || c.callee == me))
            .map(|(id, _)| *id)
            .collect();
        for call_id in involved {
            state.close_call(call_id);
        }
        debug!("loopback relay released {}", me);
    }

    fn register_room(&mut self, room: &RoomToken, me: &PeerId) -> Result<Vec<PeerId>, RelayError> {
        let mut state = self.network.lock();
        let members = state.rooms.entry(room.as_str().to_string()).or_default();
        let present: Vec<PeerId> = members.iter().filter(|p| *p != me).cloned().collect();
        if !members.contains(me) {
            members.push(me.clone());
        }
        Ok(present)
    }

    fn unregister_room(&mut self, room: &RoomToken, me: &PeerId) {
        let mut state = self.network.lock();
        if let Some(members) = state.rooms.get_mut(room.as_str()) {
            members.retain(|p| p != me);
            if members.is_empty() {
                state.rooms.remove(room.as_str());
            }
        }
    }
}

/// One side of a loopback call.
pub struct LoopbackCall {
    id: CallId,
    local: PeerId,
    remote: PeerId,
    network: LoopbackNetwork,
}

impl CallLeg for LoopbackCall {
    fn id(&self) -> CallId {
        self.id
    }

    fn peer(&self) -> &PeerId {
        &self.remote
    }

    /// Each side receives one stream notification per track, like a
    /// browser firing `stream` once per incoming track.
    fn answer(&mut self, stream: &LocalMediaStream) {
        let state = self.network.lock();
        let Some(record) = state.calls.get(&self.id) else {
            return;
        };
        if record.closed || record.callee != self.local {
            return;
        }

        let callee_stream = stream.share();
        let caller_stream = record.caller_stream.clone();
        for (peer, remote) in [(&record.caller, &callee_stream), (&record.callee, &caller_stream)] {
            for _ in 0..remote.tracks.len().max(1) {
                state.emit(
                    peer,
                    RelayEvent::Call {
                        call_id: self.id,
                        event: CallEvent::Stream(remote.clone()),
                    },
                );
            }
        }
    }

    fn close(&mut self) {
        self.network.lock().close_call(self.id);
    }
}

impl std::fmt::Debug for LoopbackCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackCall")
            .field("id", &self.id)
            .field("local", &self.local)
            .field("remote", &self.remote)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::SessionEvent;
    use huddle_media::{ConstraintProfile, SyntheticPlatform};
    use tokio::sync::mpsc;

    type Events = mpsc::UnboundedReceiver<SessionEvent<LoopbackCall>>;

    async fn open(network: &LoopbackNetwork, id: &str) -> (LoopbackRelay, Events) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut relay = network.relay(RelayConfig {
            requested_id: Some(id.to_string()),
            ..RelayConfig::default()
        });
        relay.open(RelaySink::new(1, tx)).await.unwrap();
        (relay, rx)
    }

    fn local(platform: &SyntheticPlatform) -> LocalMediaStream {
        let profile = ConstraintProfile::basic();
        LocalMediaStream::new(platform.open_stream(&profile), profile)
    }

    fn drain(rx: &mut Events) -> Vec<RelayEvent<LoopbackCall>> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev.event);
        }
        out
    }

    #[tokio::test]
    async fn test_open_announces_requested_id() {
        let network = LoopbackNetwork::new();
        let (relay, mut rx) = open(&network, "A1").await;
        assert_eq!(relay.identity(), Some(&PeerId::from("A1")));
        assert!(matches!(drain(&mut rx).as_slice(), [RelayEvent::Opened(id)] if id.as_str() == "A1"));
        assert!(network.is_online(&PeerId::from("A1")));
    }

    #[tokio::test]
    async fn test_taken_id_is_rejected() {
        let network = LoopbackNetwork::new();
        let (_a, _rx) = open(&network, "A1").await;
        let (tx, _rx2) = mpsc::unbounded_channel();
        let mut relay = network.relay(RelayConfig {
            requested_id: Some("A1".into()),
            ..RelayConfig::default()
        });
        let err = relay.open(RelaySink::new(1, tx)).await.unwrap_err();
        assert_eq!(err.kind, RelayErrorKind::UnavailableId);
    }

    #[tokio::test]
    async fn test_dial_unknown_peer() {
        let network = LoopbackNetwork::new();
        let platform = SyntheticPlatform::new();
        let (mut relay, mut rx) = open(&network, "A1").await;
        drain(&mut rx);

        let stream = local(&platform);
        let call = relay.dial(&PeerId::from("nobody"), &stream).unwrap();
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], RelayEvent::Error(e) if e.kind == RelayErrorKind::PeerUnavailable));
        assert!(matches!(
            &events[1],
            RelayEvent::Call { call_id, event: CallEvent::Errored(_) } if *call_id == call.id()
        ));
        assert_eq!(network.dials()[0].stream_id, stream.id());
    }

    #[tokio::test]
    async fn test_answer_and_close_reach_both_sides() {
        let network = LoopbackNetwork::new();
        let platform = SyntheticPlatform::new();
        let (mut a, mut a_rx) = open(&network, "A1").await;
        let (_b, mut b_rx) = open(&network, "B2").await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        let a_stream = local(&platform);
        let mut outbound = a.dial(&PeerId::from("B2"), &a_stream).unwrap();
        let mut inbound = match drain(&mut b_rx).pop() {
            Some(RelayEvent::IncomingCall(call)) => call,
            other => panic!("expected incoming call, got {other:?}"),
        };
        assert_eq!(inbound.peer(), &PeerId::from("A1"));
        assert_eq!(inbound.id(), outbound.id());

        let b_stream = local(&platform);
        inbound.answer(&b_stream);
        let to_a = drain(&mut a_rx);
        assert_eq!(to_a.len(), 2);
        assert!(to_a.iter().all(|e| matches!(
            e,
            RelayEvent::Call { event: CallEvent::Stream(s), .. } if s.id == b_stream.id()
        )));
        assert_eq!(drain(&mut b_rx).len(), 2);
        assert_eq!(network.open_calls(), 1);

        outbound.close();
        outbound.close();
        inbound.close();
        assert_eq!(drain(&mut a_rx).len(), 1);
        assert_eq!(drain(&mut b_rx).len(), 1);
        assert_eq!(network.open_calls(), 0);
    }

    #[tokio::test]
    async fn test_destroy_closes_calls_and_leaves_rooms() {
        let network = LoopbackNetwork::new();
        let platform = SyntheticPlatform::new();
        let room = RoomToken::parse("standup").unwrap();
        let (mut a, mut a_rx) = open(&network, "A1").await;
        let (mut b, mut b_rx) = open(&network, "B2").await;

        assert!(a.register_room(&room, &PeerId::from("A1")).unwrap().is_empty());
        assert_eq!(
            b.register_room(&room, &PeerId::from("B2")).unwrap(),
            vec![PeerId::from("A1")]
        );

        let stream = local(&platform);
        let _call = a.dial(&PeerId::from("B2"), &stream).unwrap();
        drain(&mut a_rx);
        drain(&mut b_rx);

        a.destroy();
        assert!(!network.is_online(&PeerId::from("A1")));
        assert_eq!(network.room_members(&room), vec![PeerId::from("B2")]);
        assert!(matches!(
            drain(&mut b_rx).as_slice(),
            [RelayEvent::Call { event: CallEvent::Closed, .. }]
        ));

        b.unregister_room(&room, &PeerId::from("B2"));
        assert!(network.room_members(&room).is_empty());
    }
}
