use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::helpers::truncate_chars;

/// Number of identity characters shown in a remote view label.
pub const PEER_LABEL_CHARS: usize = 5;

/// Opaque participant identity assigned by the relay when a session opens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short label shown under a remote video, e.g. `Peer: b2c4f...`.
    pub fn label(&self) -> String {
        format!("Peer: {}...", truncate_chars(&self.0, PEER_LABEL_CHARS))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Relay-assigned identifier of one call leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User-entered room name, trimmed and guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomToken(String);

impl RoomToken {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_input("please enter a room name"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Direct-dial rendezvous: the room name doubles as the remote identity.
    pub fn as_peer_id(&self) -> PeerId {
        PeerId::new(self.0.clone())
    }
}

impl fmt::Display for RoomToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomToken {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RoomToken> for String {
    fn from(token: RoomToken) -> Self {
        token.0
    }
}

/// Error classification reported by the relay/signaling service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelayErrorKind {
    BrowserIncompatible,
    Disconnected,
    InvalidId,
    InvalidKey,
    Network,
    PeerUnavailable,
    SslUnavailable,
    ServerError,
    SocketError,
    SocketClosed,
    UnavailableId,
    #[serde(rename = "webrtc")]
    WebRtc,
    /// The relay does not implement the requested capability.
    Unsupported,
    Other,
}

impl RelayErrorKind {
    /// Translates the relay's string `type` field; unknown names map to `Other`.
    pub fn from_type(name: &str) -> Self {
        match name {
            "browser-incompatible" => Self::BrowserIncompatible,
            "disconnected" => Self::Disconnected,
            "invalid-id" => Self::InvalidId,
            "invalid-key" => Self::InvalidKey,
            "network" => Self::Network,
            "peer-unavailable" => Self::PeerUnavailable,
            "ssl-unavailable" => Self::SslUnavailable,
            "server-error" => Self::ServerError,
            "socket-error" => Self::SocketError,
            "socket-closed" => Self::SocketClosed,
            "unavailable-id" => Self::UnavailableId,
            "webrtc" => Self::WebRtc,
            "unsupported" => Self::Unsupported,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BrowserIncompatible => "browser-incompatible",
            Self::Disconnected => "disconnected",
            Self::InvalidId => "invalid-id",
            Self::InvalidKey => "invalid-key",
            Self::Network => "network",
            Self::PeerUnavailable => "peer-unavailable",
            Self::SslUnavailable => "ssl-unavailable",
            Self::ServerError => "server-error",
            Self::SocketError => "socket-error",
            Self::SocketClosed => "socket-closed",
            Self::UnavailableId => "unavailable-id",
            Self::WebRtc => "webrtc",
            Self::Unsupported => "unsupported",
            Self::Other => "other",
        }
    }

    /// Whether the whole session is gone (as opposed to a single call failing).
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::BrowserIncompatible
                | Self::InvalidId
                | Self::InvalidKey
                | Self::SslUnavailable
                | Self::ServerError
                | Self::SocketError
                | Self::SocketClosed
                | Self::UnavailableId
        )
    }
}

impl fmt::Display for RelayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_token_rejects_blank() {
        assert!(matches!(RoomToken::parse(""), Err(Error::InvalidInput(_))));
        assert!(matches!(
            RoomToken::parse("   "),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_room_token_trims() {
        let token = RoomToken::parse("  room1 ").unwrap();
        assert_eq!(token.as_str(), "room1");
        assert_eq!(token.as_peer_id(), PeerId::from("room1"));
    }

    #[test]
    fn test_peer_label_truncates() {
        assert_eq!(PeerId::from("b2c4f9e1").label(), "Peer: b2c4f...");
        assert_eq!(PeerId::from("B2").label(), "Peer: B2...");
    }

    #[test]
    fn test_relay_error_kind_names() {
        for kind in [
            RelayErrorKind::PeerUnavailable,
            RelayErrorKind::WebRtc,
            RelayErrorKind::SocketClosed,
            RelayErrorKind::Unsupported,
        ] {
            assert_eq!(RelayErrorKind::from_type(kind.as_str()), kind);
        }
        assert_eq!(
            RelayErrorKind::from_type("something-new"),
            RelayErrorKind::Other
        );
        let json = serde_json::to_string(&RelayErrorKind::WebRtc).unwrap();
        assert_eq!(json, "\"webrtc\"");
    }

    #[test]
    fn test_room_token_deserialize_validates() {
        let ok: RoomToken = serde_json::from_str("\" lobby \"").unwrap();
        assert_eq!(ok.as_str(), "lobby");
        assert!(serde_json::from_str::<RoomToken>("\"  \"").is_err());
    }
}
