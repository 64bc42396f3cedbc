//! End-to-end room flows over the loopback relay.

use huddle_client::{
    CallEvent, CallLeg, ClientConfig, LoopbackNetwork, LoopbackRelay, RecordingSurface, Relay,
    RelayEvent, RelaySink, RendezvousMode, Room, RoomState,
};
use huddle_common::{Error, PeerId, RoomToken};
use huddle_media::{ConstraintProfile, LocalMediaStream, SyntheticPlatform};
use tokio::sync::mpsc;

type TestRoom = Room<SyntheticPlatform, LoopbackRelay, RecordingSurface>;

fn config(id: &str, rendezvous: RendezvousMode) -> ClientConfig {
    let mut config = ClientConfig {
        rendezvous,
        ..ClientConfig::default()
    };
    config.relay.requested_id = Some(id.to_string());
    config
}

async fn ready_room(network: &LoopbackNetwork, id: &str, rendezvous: RendezvousMode) -> TestRoom {
    let config = config(id, rendezvous);
    let relay = network.relay(config.relay.clone());
    let mut room = Room::new(config, SyntheticPlatform::new(), relay, RecordingSurface::new());
    room.initialize().await.unwrap();
    room.pump();
    room
}

#[tokio::test]
async fn test_two_party_call_lifecycle() {
    let network = LoopbackNetwork::new();
    let mut a = ready_room(&network, "A1", RendezvousMode::DirectDial).await;
    assert_eq!(a.identity(), Some(&PeerId::from("A1")));

    a.join("room1").unwrap();
    let dials = network.dials();
    assert_eq!(dials.len(), 1);
    assert_eq!(dials[0].to, PeerId::from("room1"));
    assert_eq!(dials[0].stream_id, a.local_stream().unwrap().id());

    // Nobody is registered as "room1".
    a.pump();
    assert!(a.calls().is_empty());
    assert!(a
        .surface()
        .errors()
        .contains(&"Connection error: peer-unavailable"));
    assert_eq!(a.state(), RoomState::Joined);

    // B2 calls in directly.
    let platform = SyntheticPlatform::new();
    let (tx, mut b_events) = mpsc::unbounded_channel();
    let mut b = network.relay(config("B2", RendezvousMode::DirectDial).relay);
    b.open(RelaySink::new(1, tx)).await.unwrap();
    let profile = ConstraintProfile::basic();
    let b_stream = LocalMediaStream::new(platform.open_stream(&profile), profile);
    let mut b_call = b.dial(&PeerId::from("A1"), &b_stream).unwrap();

    a.pump();
    let b2 = PeerId::from("B2");
    assert_eq!(a.views().len(), 1);
    assert_eq!(a.surface().views_created(&b2), 1);
    assert_eq!(a.views().get(&b2).unwrap().label, "Peer: B2...");
    assert_eq!(
        a.calls().remote_stream(&b2).map(|s| s.id.as_str()),
        Some(b_stream.id())
    );

    // B2 received A's stream in answer.
    let mut streams = 0;
    while let Ok(ev) = b_events.try_recv() {
        if let RelayEvent::Call {
            event: CallEvent::Stream(s),
            ..
        } = ev.event
        {
            assert_eq!(s.id, a.local_stream().unwrap().id());
            streams += 1;
        }
    }
    assert!(streams >= 1);

    b_call.close();
    a.pump();
    assert!(a.views().is_empty());
    assert!(!a.calls().contains(&b2));
    assert_eq!(a.surface().views_destroyed(&b2), 1);
}

#[tokio::test]
async fn test_shutdown_releases_everything() {
    let network = LoopbackNetwork::new();
    let mut host = ready_room(&network, "host", RendezvousMode::DirectDial).await;
    host.join("standup").unwrap();
    host.pump();

    let mut guests = Vec::new();
    for id in ["g1", "g2", "g3"] {
        let mut guest = ready_room(&network, id, RendezvousMode::DirectDial).await;
        guest.join("host").unwrap();
        guests.push(guest);
    }
    host.pump();
    for guest in guests.iter_mut() {
        guest.pump();
        assert_eq!(guest.views().len(), 1);
    }
    assert_eq!(host.calls().len(), 3);
    assert_eq!(host.views().len(), 3);

    host.shutdown();
    assert!(host.calls().is_empty());
    assert!(host.views().is_empty());
    assert!(host.local_stream().is_none());
    assert_eq!(host.platform().live_tracks(), 0);
    assert_eq!(host.surface().last_status(), Some(""));

    for guest in guests.iter_mut() {
        guest.pump();
        assert!(guest.views().is_empty());
        assert!(guest.calls().is_empty());
    }
    assert_eq!(network.open_calls(), 0);
}

#[tokio::test]
async fn test_leave_then_rejoin() {
    let network = LoopbackNetwork::new();
    let mut a = ready_room(&network, "A1", RendezvousMode::DirectDial).await;
    a.join("room1").unwrap();

    a.leave().await.unwrap();
    assert_eq!(a.state(), RoomState::Idle);
    // The new identity has not arrived yet.
    assert!(matches!(a.join("room1"), Err(Error::NotReady(_))));

    a.pump();
    assert_eq!(a.identity(), Some(&PeerId::from("A1")));
    // Only the fresh stream is live.
    assert_eq!(a.platform().live_tracks(), 2);
    a.join("room1").unwrap();
    assert_eq!(a.surface().last_status(), Some("Room: room1 (Your ID: A1)"));
}

#[tokio::test]
async fn test_directory_room_connects_everyone() {
    let network = LoopbackNetwork::new();
    let room = RoomToken::parse("standup").unwrap();
    let mut rooms = Vec::new();
    for id in ["p1", "p2", "p3"] {
        let mut participant = ready_room(&network, id, RendezvousMode::Directory).await;
        participant.join("standup").unwrap();
        rooms.push(participant);
    }
    assert_eq!(network.room_members(&room).len(), 3);

    // Incoming calls need a pump, answers need another.
    for _ in 0..2 {
        for participant in rooms.iter_mut() {
            participant.pump();
        }
    }
    for participant in &rooms {
        assert_eq!(participant.views().len(), 2, "{:?}", participant.identity());
        assert_eq!(participant.calls().len(), 2);
    }

    rooms[0].leave().await.unwrap();
    assert_eq!(network.room_members(&room).len(), 2);
    for participant in rooms.iter_mut().skip(1) {
        participant.pump();
        assert_eq!(participant.views().len(), 1);
    }
}

#[tokio::test]
async fn test_directory_unsupported_relay_keeps_idle() {
    struct NoDirectory(LoopbackRelay);

    impl Relay for NoDirectory {
        type Call = <LoopbackRelay as Relay>::Call;

        async fn open(&mut self, sink: RelaySink<Self::Call>) -> Result<(), huddle_client::RelayError> {
            self.0.open(sink).await
        }

        fn dial(
            &mut self,
            target: &PeerId,
            stream: &LocalMediaStream,
        ) -> Result<Self::Call, huddle_client::RelayError> {
            self.0.dial(target, stream)
        }

        fn destroy(&mut self) {
            self.0.destroy()
        }
    }

    let network = LoopbackNetwork::new();
    let config = config("A1", RendezvousMode::Directory);
    let relay = NoDirectory(network.relay(config.relay.clone()));
    let mut a = Room::new(config, SyntheticPlatform::new(), relay, RecordingSurface::new());
    a.initialize().await.unwrap();
    a.pump();

    let err = a.join("standup").unwrap_err();
    assert!(matches!(err, Error::Relay { .. }));
    assert_eq!(a.state(), RoomState::Idle);
    assert!(a.surface().errors().contains(&"Connection error: unsupported"));
}

#[tokio::test]
async fn test_repeat_call_from_peer_replaces_view() {
    let network = LoopbackNetwork::new();
    let mut a = ready_room(&network, "A1", RendezvousMode::DirectDial).await;
    a.join("room1").unwrap();
    a.pump();

    let platform = SyntheticPlatform::new();
    let (tx, _b_events) = mpsc::unbounded_channel();
    let mut b = network.relay(config("B2", RendezvousMode::DirectDial).relay);
    b.open(RelaySink::new(1, tx)).await.unwrap();
    let profile = ConstraintProfile::basic();
    let first = LocalMediaStream::new(platform.open_stream(&profile), profile.clone());
    let second = LocalMediaStream::new(platform.open_stream(&profile), profile);

    let _first_call = b.dial(&PeerId::from("A1"), &first).unwrap();
    a.pump();
    let b2 = PeerId::from("B2");
    assert_eq!(a.views().get(&b2).unwrap().stream_id, first.id());

    let second_call = b.dial(&PeerId::from("A1"), &second).unwrap();
    a.pump();
    assert_eq!(a.views().len(), 1);
    assert_eq!(a.views().get(&b2).unwrap().stream_id, second.id());
    assert_eq!(a.calls().call_id(&b2), Some(second_call.id()));
    assert_eq!(a.surface().views_created(&b2), 2);
    assert_eq!(a.surface().views_destroyed(&b2), 1);
    assert_eq!(network.open_calls(), 1);
}
