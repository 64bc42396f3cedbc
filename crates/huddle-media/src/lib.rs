#![forbid(unsafe_code)]
#![allow(async_fn_in_trait)]

//! Local capture for Huddle.
//!
//! The host platform (a browser's `mediaDevices`, a native capture stack, or
//! the in-process [`SyntheticPlatform`]) sits behind [`MediaPlatform`]. Streams
//! it hands out are wrapped in [`LocalMediaStream`], which stops every track
//! when dropped so a replaced or discarded stream cannot keep hardware busy.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod acquire;
pub mod error;
pub mod permission;

mod synthetic;

pub use acquire::MediaAcquirer;
pub use error::{MediaError, MediaErrorKind, UserAgent};
pub use permission::{PermissionProber, ProbeOutcome, ProbeStrategy};
pub use synthetic::{SyntheticPlatform, SyntheticStream};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub width: u16,
    pub height: u16,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Requested audio/video quality parameters for one capture request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConstraintProfile {
    pub audio: bool,
    pub video: bool,
    pub resolution: Option<Resolution>,
    pub frame_rate: Option<u16>,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl ConstraintProfile {
    /// Plain audio + video with platform defaults.
    pub fn basic() -> Self {
        Self {
            audio: true,
            video: true,
            resolution: None,
            frame_rate: None,
            echo_cancellation: false,
            noise_suppression: false,
        }
    }

    /// Conservative first request, likely to succeed on weak hardware.
    pub fn low() -> Self {
        Self {
            resolution: Some(Resolution {
                width: 640,
                height: 360,
            }),
            frame_rate: Some(15),
            ..Self::basic()
        }
    }

    /// Richer follow-up request tried once the low profile is live.
    pub fn hd() -> Self {
        Self {
            resolution: Some(Resolution {
                width: 1280,
                height: 720,
            }),
            frame_rate: Some(30),
            echo_cancellation: true,
            noise_suppression: true,
            ..Self::basic()
        }
    }

    /// Smallest request that still triggers the platform permission prompt.
    pub fn trial(audio: bool, video: bool) -> Self {
        Self {
            audio,
            video,
            resolution: video.then_some(Resolution {
                width: 160,
                height: 120,
            }),
            frame_rate: None,
            echo_cancellation: false,
            noise_suppression: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.audio && !self.video
    }

    pub fn kinds(&self) -> Vec<MediaKind> {
        let mut kinds = Vec::with_capacity(2);
        if self.audio {
            kinds.push(MediaKind::Audio);
        }
        if self.video {
            kinds.push(MediaKind::Video);
        }
        kinds
    }
}

impl Default for ConstraintProfile {
    fn default() -> Self {
        Self::basic()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn device_noun(&self) -> &'static str {
        match self {
            Self::Audio => "microphone",
            Self::Video => "camera",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_id: String,
    pub kind: MediaKind,
    /// Empty until the user has granted access at least once.
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackInfo {
    pub kind: MediaKind,
    pub label: String,
}

/// A live capture handed out by the platform.
pub trait CaptureStream: Send {
    fn id(&self) -> &str;
    fn tracks(&self) -> Vec<TrackInfo>;
    /// Releases the underlying hardware tracks. Must be idempotent.
    fn stop(&mut self);
}

/// Host media capabilities consumed by the prober and the acquirer.
///
/// Implementations translate the host's error names exactly once, into
/// [`MediaError`], at this boundary.
pub trait MediaPlatform {
    type Stream: CaptureStream + 'static;

    async fn get_user_media(&self, profile: &ConstraintProfile)
        -> Result<Self::Stream, MediaError>;

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, MediaError>;

    /// `None` when the host has no permission registry.
    async fn query_permission(&self, kind: MediaKind) -> Option<PermissionState>;
}

/// The session's own capture. Stops its tracks when dropped.
pub struct LocalMediaStream {
    inner: Box<dyn CaptureStream>,
    profile: ConstraintProfile,
    stopped: bool,
}

impl LocalMediaStream {
    pub fn new(inner: impl CaptureStream + 'static, profile: ConstraintProfile) -> Self {
        Self {
            inner: Box::new(inner),
            profile,
            stopped: false,
        }
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn profile(&self) -> &ConstraintProfile {
        &self.profile
    }

    pub fn tracks(&self) -> Vec<TrackInfo> {
        self.inner.tracks()
    }

    pub fn is_live(&self) -> bool {
        !self.stopped
    }

    pub fn stop(&mut self) {
        if !self.stopped {
            self.inner.stop();
            self.stopped = true;
            tracing::debug!("stopped local stream {}", self.inner.id());
        }
    }

    /// Description of this stream as a remote participant receives it.
    pub fn share(&self) -> RemoteStream {
        RemoteStream {
            id: self.inner.id().to_string(),
            tracks: self.inner.tracks(),
        }
    }
}

impl Drop for LocalMediaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for LocalMediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalMediaStream")
            .field("id", &self.inner.id())
            .field("profile", &self.profile)
            .field("stopped", &self.stopped)
            .finish()
    }
}

/// Media received from a remote participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
    pub tracks: Vec<TrackInfo>,
}

impl RemoteStream {
    pub fn has_video(&self) -> bool {
        self.tracks.iter().any(|t| t.kind == MediaKind::Video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_kinds() {
        assert_eq!(
            ConstraintProfile::basic().kinds(),
            vec![MediaKind::Audio, MediaKind::Video]
        );
        let audio_only = ConstraintProfile {
            video: false,
            ..ConstraintProfile::basic()
        };
        assert_eq!(audio_only.kinds(), vec![MediaKind::Audio]);
        assert!(ConstraintProfile::trial(false, false).is_empty());
        assert!(ConstraintProfile::trial(true, false).resolution.is_none());
    }

    #[test]
    fn test_profile_partial_json_uses_defaults() {
        let profile: ConstraintProfile =
            serde_json::from_str(r#"{"video": false, "echo_cancellation": true}"#).unwrap();
        assert!(profile.audio);
        assert!(!profile.video);
        assert!(profile.echo_cancellation);
    }

    #[test]
    fn test_local_stream_stops_on_drop() {
        let platform = SyntheticPlatform::new();
        let stream = platform.open_stream(&ConstraintProfile::basic());
        let stream = LocalMediaStream::new(stream, ConstraintProfile::basic());
        assert_eq!(platform.live_tracks(), 2);
        assert!(stream.share().has_video());
        drop(stream);
        assert_eq!(platform.live_tracks(), 0);
    }

    #[test]
    fn test_local_stream_stop_is_idempotent() {
        let platform = SyntheticPlatform::new();
        let mut stream =
            LocalMediaStream::new(platform.open_stream(&ConstraintProfile::low()), ConstraintProfile::low());
        stream.stop();
        stream.stop();
        assert!(!stream.is_live());
        drop(stream);
        assert_eq!(platform.live_tracks(), 0);
    }
}
