//! Room lifecycle controller.
//!
//! Owns the whole session context: local stream, relay session, call map and
//! remote views. Everything runs on one task; relay notifications arrive on a
//! single queue and are filtered by session epoch before they touch state.

use huddle_common::{Error, PeerId, Result, RoomToken};
use huddle_media::{LocalMediaStream, MediaAcquirer, MediaPlatform, PermissionProber};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::calls::{CallAction, CallDirection, CallRegistry};
use crate::relay::{CallLeg, Relay, RelayEvent, SessionEvent};
use crate::session::PeerSession;
use crate::surface::{ControlState, Notice, Surface};
use crate::types::{ClientConfig, RendezvousMode, RoomState};
use crate::views::RemoteViewRegistry;

/// User intent delivered to [`Room::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCommand {
    Join(String),
    Leave,
    Retry,
    Shutdown,
}

enum Next<C> {
    Event(SessionEvent<C>),
    Command(Option<RoomCommand>),
}

pub struct Room<M: MediaPlatform, R: Relay, S: Surface> {
    config: ClientConfig,
    platform: M,
    acquirer: MediaAcquirer,
    session: PeerSession<R>,
    events: mpsc::UnboundedReceiver<SessionEvent<R::Call>>,
    calls: CallRegistry<R::Call>,
    views: RemoteViewRegistry,
    surface: S,
    local: Option<LocalMediaStream>,
    state: RoomState,
    room: Option<RoomToken>,
}

impl<M: MediaPlatform, R: Relay, S: Surface> Room<M, R, S> {
    pub fn new(config: ClientConfig, platform: M, relay: R, surface: S) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let acquirer = MediaAcquirer::new(PermissionProber::new(config.probe), config.upgrade());
        Self {
            config,
            platform,
            acquirer,
            session: PeerSession::new(relay, tx),
            events,
            calls: CallRegistry::new(),
            views: RemoteViewRegistry::new(),
            surface,
            local: None,
            state: RoomState::Idle,
            room: None,
        }
    }

    /// Acquires media, then opens the relay session. Steps already done are
    /// skipped, so this doubles as the retry path.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.local.is_none() {
            self.acquire_media().await?;
        }
        if !self.session.is_open() {
            self.open_session().await?;
        }
        self.refresh_controls();
        Ok(())
    }

    async fn acquire_media(&mut self) -> Result<()> {
        let profile = self.config.profile.clone();
        match self.acquirer.acquire(&self.platform, &profile).await {
            Ok(stream) => {
                self.surface.attach_local_preview(&stream);
                self.local = Some(stream);
                Ok(())
            }
            Err(err) => {
                warn!("Error accessing media devices: {}", err);
                let err = err.into_error(self.config.user_agent);
                self.surface.notify(Notice::error(err.to_string()));
                self.refresh_controls();
                Err(err)
            }
        }
    }

    async fn open_session(&mut self) -> Result<()> {
        info!("opening relay session via {}", self.config.relay.endpoint());
        if let Err(err) = self.session.open().await {
            self.surface.notify(connection_notice(&err));
            self.refresh_controls();
            return Err(err);
        }
        Ok(())
    }

    /// User-initiated retry of whatever initialization step is missing.
    pub async fn retry(&mut self) -> Result<()> {
        info!("retrying initialization");
        self.initialize().await
    }

    pub fn is_ready(&self) -> bool {
        self.local.is_some() && self.session.identity().is_some()
    }

    /// Joins `raw_token`. Rejects synchronously, without dialing, when not
    /// ready or when the token is blank.
    pub fn join(&mut self, raw_token: &str) -> Result<()> {
        if self.state != RoomState::Idle {
            return Err(Error::invalid_input("already in a room; leave it first"));
        }
        if !self.is_ready() {
            return Err(Error::not_ready(
                "video initialization not complete, please try again",
            ));
        }
        let token = RoomToken::parse(raw_token)?;
        let me = match self.session.identity() {
            Some(id) => id.clone(),
            None => return Err(Error::not_ready("relay session has no identity yet")),
        };

        self.state = RoomState::Joining;
        let targets = match self.config.rendezvous {
            RendezvousMode::DirectDial => vec![token.as_peer_id()],
            RendezvousMode::Directory => match self.session.register_room(&token) {
                Ok(members) => members,
                Err(err) => {
                    self.state = RoomState::Idle;
                    self.surface.notify(connection_notice(&err));
                    return Err(err);
                }
            },
        };

        for target in targets.iter().filter(|t| **t != me) {
            let Some(stream) = self.local.as_ref() else {
                break;
            };
            match self.session.dial(target, stream) {
                Ok(call) => self.calls.attach(call, CallDirection::Outbound),
                Err(err) => {
                    warn!("dial {} failed: {}", target, err);
                    self.surface.notify(connection_notice(&err));
                }
            }
        }

        self.state = RoomState::Joined;
        self.surface
            .set_status(&format!("Room: {} (Your ID: {})", token, me));
        info!("joined room {} as {} ({} outbound calls)", token, me, self.calls.len());
        self.room = Some(token);
        self.refresh_controls();
        Ok(())
    }

    /// Tears everything down, then re-initializes for the next join.
    pub async fn leave(&mut self) -> Result<()> {
        self.teardown();
        self.initialize().await
    }

    /// Tears everything down without re-initializing.
    pub fn shutdown(&mut self) {
        self.teardown();
        info!("room controller shut down");
    }

    fn teardown(&mut self) {
        self.state = RoomState::Idle;
        if let Some(room) = self.room.take() {
            if self.config.rendezvous == RendezvousMode::Directory {
                self.session.unregister_room(&room);
            }
            info!("left room {}", room);
        }

        self.session.close(&mut self.calls);
        let cleared = self.views.clear(&mut self.surface);
        if let Some(mut stream) = self.local.take() {
            stream.stop();
            self.surface.detach_local_preview();
        }
        debug!("teardown cleared {} remote views", cleared);

        self.surface.set_status("");
        self.refresh_controls();
    }

    /// Applies one relay notification.
    pub fn handle_event(&mut self, event: SessionEvent<R::Call>) {
        if !self.session.is_current(event.epoch) {
            debug!("ignoring notification from stale session {}", event.epoch);
            if let RelayEvent::IncomingCall(mut call) = event.event {
                call.close();
            }
            return;
        }

        match event.event {
            RelayEvent::Opened(id) => {
                if self.session.on_opened(event.epoch, id) {
                    self.refresh_controls();
                }
            }
            RelayEvent::IncomingCall(call) => self.on_incoming_call(call),
            RelayEvent::Call { call_id, event } => match self.calls.dispatch(call_id, event) {
                CallAction::Show { peer, stream } => {
                    self.views.show(&peer, &stream, &mut self.surface);
                }
                CallAction::Teardown { peer } => {
                    self.views.hide(&peer, &mut self.calls, &mut self.surface);
                }
                CallAction::Ignored => {}
            },
            RelayEvent::Error(err) => {
                warn!("PeerJS error: {}", err);
                self.surface
                    .notify(Notice::error(format!("Connection error: {}", err.kind)));
                if err.kind.is_session_fatal() {
                    self.release_session();
                }
            }
            RelayEvent::Disconnected => {
                warn!("relay connection lost");
                self.release_session();
                self.surface.notify(Notice::error(
                    "Connection to the relay was lost. Retry to reconnect.",
                ));
            }
        }
    }

    /// The relay session is gone. Calls made through it are hung up and the
    /// room is left; the local stream stays for `retry()`.
    fn release_session(&mut self) {
        if let Some(room) = self.room.take() {
            if self.config.rendezvous == RendezvousMode::Directory {
                self.session.unregister_room(&room);
            }
            info!("dropped out of room {}", room);
        }
        self.session.close(&mut self.calls);
        self.views.clear(&mut self.surface);
        self.state = RoomState::Idle;
        self.surface.set_status("");
        self.refresh_controls();
    }

    fn on_incoming_call(&mut self, mut call: R::Call) {
        let peer = call.peer().clone();
        if self.state != RoomState::Joined || self.local.is_none() {
            info!("declining call from {} while not in a room", peer);
            call.close();
            return;
        }

        if self.calls.contains(&peer) {
            if !self.replaces_existing(&peer) {
                info!("declining call from {}, already connected", peer);
                call.close();
                return;
            }
            self.views.hide(&peer, &mut self.calls, &mut self.surface);
        }

        if let Some(stream) = self.local.as_ref() {
            info!("answering call from {}", peer);
            call.answer(stream);
            self.calls.attach(call, CallDirection::Inbound);
        }
    }

    /// Whether an inbound call from `peer` should replace the call already
    /// registered for it. A peer calling again replaces its old call. When
    /// both sides dialed each other, the call placed by the lower identity
    /// survives on both ends.
    fn replaces_existing(&self, peer: &PeerId) -> bool {
        match (self.calls.direction(peer), self.session.identity()) {
            (Some(CallDirection::Outbound), Some(me)) => peer.as_str() < me.as_str(),
            _ => true,
        }
    }

    /// Applies every queued notification. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Runs the controller until `Shutdown` or the command channel closes.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<RoomCommand>) -> Self {
        if let Err(err) = self.initialize().await {
            warn!("initialization incomplete: {}", err);
        }

        loop {
            let next = tokio::select! {
                biased;
                Some(event) = self.events.recv() => Next::Event(event),
                command = commands.recv() => Next::Command(command),
            };

            match next {
                Next::Event(event) => self.handle_event(event),
                Next::Command(Some(RoomCommand::Join(token))) => {
                    if let Err(err) = self.join(&token) {
                        let notice = if err.is_validation() {
                            Notice::info(err.to_string())
                        } else {
                            Notice::error(err.to_string())
                        };
                        self.surface.notify(notice);
                    }
                }
                Next::Command(Some(RoomCommand::Leave)) => {
                    if let Err(err) = self.leave().await {
                        warn!("re-initialization after leave failed: {}", err);
                    }
                }
                Next::Command(Some(RoomCommand::Retry)) => {
                    if let Err(err) = self.retry().await {
                        warn!("retry failed: {}", err);
                    }
                }
                Next::Command(Some(RoomCommand::Shutdown)) | Next::Command(None) => break,
            }
        }

        self.shutdown();
        self
    }

    fn refresh_controls(&mut self) {
        let controls = ControlState {
            join_enabled: self.state == RoomState::Idle && self.is_ready(),
            leave_enabled: self.state != RoomState::Idle,
        };
        self.surface.set_controls(controls);
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn identity(&self) -> Option<&PeerId> {
        self.session.identity()
    }

    pub fn room(&self) -> Option<&RoomToken> {
        self.room.as_ref()
    }

    pub fn local_stream(&self) -> Option<&LocalMediaStream> {
        self.local.as_ref()
    }

    pub fn calls(&self) -> &CallRegistry<R::Call> {
        &self.calls
    }

    pub fn views(&self) -> &RemoteViewRegistry {
        &self.views
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn platform(&self) -> &M {
        &self.platform
    }

    pub fn relay(&self) -> &R {
        self.session.relay()
    }

    pub fn relay_mut(&mut self) -> &mut R {
        self.session.relay_mut()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

fn connection_notice(err: &Error) -> Notice {
    match err {
        Error::Relay { kind, .. } => Notice::error(format!("Connection error: {kind}")),
        other => Notice::error(format!("Connection error: {other}")),
    }
}
