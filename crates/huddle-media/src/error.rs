//! Media acquisition failures and their user-facing remediation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed classification of capture failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorKind {
    Denied,
    NotFound,
    Busy,
    Other,
}

impl MediaErrorKind {
    /// Maps a platform error name (`NotAllowedError`, ...) onto the taxonomy.
    pub fn from_name(name: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => Self::Denied,
            "NotFoundError" | "DevicesNotFoundError" => Self::NotFound,
            "NotReadableError" | "TrackStartError" => Self::Busy,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Denied => "permission denied",
            Self::NotFound => "device not found",
            Self::Busy => "device busy",
            Self::Other => "media failure",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct MediaError {
    pub kind: MediaErrorKind,
    pub detail: String,
}

impl MediaError {
    pub fn new(kind: MediaErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Builds an error from the platform's `name` and `message` fields.
    pub fn from_platform(name: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let detail = if message.is_empty() {
            name.to_string()
        } else {
            format!("{name}: {message}")
        };
        Self::new(MediaErrorKind::from_name(name), detail)
    }

    pub fn denied(detail: impl Into<String>) -> Self {
        Self::new(MediaErrorKind::Denied, detail)
    }

    pub fn other(detail: impl Into<String>) -> Self {
        Self::new(MediaErrorKind::Other, detail)
    }

    /// Human-readable next step for the user, optionally tailored to a browser.
    pub fn remediation(&self, agent: Option<UserAgent>) -> String {
        let base = match self.kind {
            MediaErrorKind::Denied => {
                "Camera or microphone access was blocked. Allow access for this site and try again."
                    .to_string()
            }
            MediaErrorKind::NotFound => {
                "No camera or microphone was found. Connect a device and try again.".to_string()
            }
            MediaErrorKind::Busy => {
                "Your camera or microphone is in use by another application. Close it and try again."
                    .to_string()
            }
            MediaErrorKind::Other => format!(
                "Could not access camera or microphone ({}). Please check permissions.",
                self.detail
            ),
        };

        match agent.and_then(|agent| agent.instructions(self.kind)) {
            Some(extra) => format!("{base} {extra}"),
            None => base,
        }
    }

    /// Converts into the crate-wide taxonomy, carrying the remediation text.
    pub fn into_error(self, agent: Option<UserAgent>) -> huddle_common::Error {
        use huddle_common::Error;

        let message = self.remediation(agent);
        match self.kind {
            MediaErrorKind::Denied => Error::PermissionDenied(message),
            MediaErrorKind::NotFound => Error::DeviceNotFound(message),
            MediaErrorKind::Busy => Error::DeviceBusy(message),
            MediaErrorKind::Other => Error::Media(message),
        }
    }
}

impl From<MediaError> for huddle_common::Error {
    fn from(err: MediaError) -> Self {
        err.into_error(None)
    }
}

/// Browser family, used only to pick remediation instructions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserAgent {
    Chrome,
    Edge,
    Firefox,
    Safari,
    Other,
}

impl UserAgent {
    /// Detects the browser family from a `User-Agent` string.
    pub fn detect(ua: &str) -> Self {
        // Edge and Chrome both advertise "Chrome/", Chrome and Safari both "Safari/".
        if ua.contains("Edg/") {
            Self::Edge
        } else if ua.contains("Firefox/") {
            Self::Firefox
        } else if ua.contains("Chrome/") || ua.contains("CriOS/") {
            Self::Chrome
        } else if ua.contains("Safari/") {
            Self::Safari
        } else {
            Self::Other
        }
    }

    fn instructions(&self, kind: MediaErrorKind) -> Option<&'static str> {
        match (self, kind) {
            (Self::Chrome, MediaErrorKind::Denied) => Some(
                "In Chrome, click the camera icon in the address bar and choose \"Always allow\", then reload.",
            ),
            (Self::Edge, MediaErrorKind::Denied) => Some(
                "In Edge, select the lock icon in the address bar and set Camera and Microphone to Allow.",
            ),
            (Self::Firefox, MediaErrorKind::Denied) => Some(
                "In Firefox, click the permissions icon left of the address bar and clear the blocked camera and microphone entries.",
            ),
            (Self::Safari, MediaErrorKind::Denied) => Some(
                "In Safari, open Settings > Websites > Camera and Microphone and set this site to Allow.",
            ),
            (Self::Firefox, MediaErrorKind::Busy) => {
                Some("Firefox cannot share a camera that another browser is using.")
            }
            _ => None,
        }
    }
}
