//! Presentation boundary: remote video surfaces, local preview, controls.

use huddle_common::PeerId;
use huddle_media::{LocalMediaStream, RemoteStream};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlState {
    pub join_enabled: bool,
    pub leave_enabled: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Message for the user, e.g. a failure with its remediation text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Everything the room controller asks of the host UI.
pub trait Surface {
    fn create_remote_view(&mut self, peer: &PeerId, label: &str, stream: &RemoteStream);
    fn destroy_remote_view(&mut self, peer: &PeerId);
    fn attach_local_preview(&mut self, stream: &LocalMediaStream);
    fn detach_local_preview(&mut self);
    fn set_controls(&mut self, controls: ControlState);
    fn set_status(&mut self, text: &str);
    fn notify(&mut self, notice: Notice);
}

/// Surface that only writes to the log. Used by headless hosts.
#[derive(Debug, Default)]
pub struct LogSurface {
    name: String,
}

impl LogSurface {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Surface for LogSurface {
    fn create_remote_view(&mut self, peer: &PeerId, label: &str, stream: &RemoteStream) {
        let media = if stream.has_video() { "video" } else { "audio only" };
        info!(
            "[{}] + remote view {} ({}, {} tracks) [{}]",
            self.name,
            peer,
            media,
            stream.tracks.len(),
            label
        );
    }

    fn destroy_remote_view(&mut self, peer: &PeerId) {
        info!("[{}] - remote view {}", self.name, peer);
    }

    fn attach_local_preview(&mut self, stream: &LocalMediaStream) {
        info!("[{}] local preview -> {}", self.name, stream.id());
    }

    fn detach_local_preview(&mut self) {
        info!("[{}] local preview detached", self.name);
    }

    fn set_controls(&mut self, controls: ControlState) {
        info!(
            "[{}] controls: join={} leave={}",
            self.name, controls.join_enabled, controls.leave_enabled
        );
    }

    fn set_status(&mut self, text: &str) {
        info!("[{}] status: {}", self.name, text);
    }

    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("[{}] {}", self.name, notice.message),
            NoticeLevel::Error => error!("[{}] {}", self.name, notice.message),
        }
    }
}

/// One call made against a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    CreateView { peer: PeerId, label: String },
    DestroyView { peer: PeerId },
    AttachPreview { stream_id: String },
    DetachPreview,
    Controls(ControlState),
    Status(String),
    Notify(Notice),
}

/// Surface that records every operation, for assertions.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub ops: Vec<SurfaceOp>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn views_created(&self, peer: &PeerId) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SurfaceOp::CreateView { peer: p, .. } if p == peer))
            .count()
    }

    pub fn views_destroyed(&self, peer: &PeerId) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SurfaceOp::DestroyView { peer: p } if p == peer))
            .count()
    }

    pub fn last_status(&self) -> Option<&str> {
        self.ops.iter().rev().find_map(|op| match op {
            SurfaceOp::Status(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn last_controls(&self) -> Option<ControlState> {
        self.ops.iter().rev().find_map(|op| match op {
            SurfaceOp::Controls(c) => Some(*c),
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Notify(n) if n.level == NoticeLevel::Error => Some(n.message.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn create_remote_view(&mut self, peer: &PeerId, label: &str, _stream: &RemoteStream) {
        self.ops.push(SurfaceOp::CreateView {
            peer: peer.clone(),
            label: label.to_string(),
        });
    }

    fn destroy_remote_view(&mut self, peer: &PeerId) {
        self.ops.push(SurfaceOp::DestroyView { peer: peer.clone() });
    }

    fn attach_local_preview(&mut self, stream: &LocalMediaStream) {
        self.ops.push(SurfaceOp::AttachPreview {
            stream_id: stream.id().to_string(),
        });
    }

    fn detach_local_preview(&mut self) {
        self.ops.push(SurfaceOp::DetachPreview);
    }

    fn set_controls(&mut self, controls: ControlState) {
        self.ops.push(SurfaceOp::Controls(controls));
    }

    fn set_status(&mut self, text: &str) {
        self.ops.push(SurfaceOp::Status(text.to_string()));
    }

    fn notify(&mut self, notice: Notice) {
        self.ops.push(SurfaceOp::Notify(notice));
    }
}
