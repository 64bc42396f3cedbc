#![forbid(unsafe_code)]
#![allow(async_fn_in_trait)]

//! Room client for Huddle.
//!
//! [`Room`] drives the lifecycle: acquire local media, open a relay session,
//! join a room by dialing, wire every call to a remote view, and tear it all
//! down on leave. The relay and the UI are reached only through the [`Relay`]
//! and [`Surface`] traits.

pub mod calls;
pub mod loopback;
pub mod relay;
pub mod room;
pub mod session;
pub mod surface;
pub mod types;
pub mod views;

pub use calls::{CallAction, CallDirection, CallRegistry};
pub use loopback::{DialRecord, LoopbackCall, LoopbackNetwork, LoopbackRelay};
pub use relay::{CallEvent, CallLeg, Relay, RelayError, RelayEvent, RelaySink, SessionEvent};
pub use room::{Room, RoomCommand};
pub use session::PeerSession;
pub use surface::{ControlState, LogSurface, Notice, NoticeLevel, RecordingSurface, Surface, SurfaceOp};
pub use types::{ClientConfig, RelayConfig, RendezvousMode, RoomState};
pub use views::{RemoteViewEntry, RemoteViewRegistry};
