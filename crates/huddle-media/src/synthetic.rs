//! In-process capture platform standing in for real camera and microphone
//! hardware.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;
use uuid::Uuid;

use crate::{
    CaptureStream, ConstraintProfile, DeviceInfo, MediaError, MediaKind, MediaPlatform,
    PermissionState, TrackInfo,
};

/// In-process capture platform for demos and tests.
///
/// Requests succeed unless a failure was scripted with
/// [`SyntheticPlatform::fail_next`] or access was denied. Live tracks are counted so callers can
/// assert that nothing was leaked.
pub struct SyntheticPlatform {
    permissions: Mutex<HashMap<MediaKind, PermissionState>>,
    permission_registry: bool,
    devices: Mutex<Vec<DeviceInfo>>,
    scripted: Mutex<VecDeque<Option<(String, String)>>>,
    requests: Mutex<Vec<ConstraintProfile>>,
    live: Arc<AtomicUsize>,
}

impl SyntheticPlatform {
    /// Platform with a camera and a microphone, access already granted.
    pub fn new() -> Self {
        let mut permissions = HashMap::new();
        permissions.insert(MediaKind::Audio, PermissionState::Granted);
        permissions.insert(MediaKind::Video, PermissionState::Granted);
        Self {
            permissions: Mutex::new(permissions),
            permission_registry: true,
            devices: Mutex::new(vec![
                DeviceInfo {
                    device_id: "synthetic-mic".into(),
                    kind: MediaKind::Audio,
                    label: "Synthetic Microphone".into(),
                },
                DeviceInfo {
                    device_id: "synthetic-cam".into(),
                    kind: MediaKind::Video,
                    label: "Synthetic Camera".into(),
                },
            ]),
            scripted: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Platform without a permission registry (query reports unsupported).
    pub fn without_permission_registry() -> Self {
        Self {
            permission_registry: false,
            ..Self::new()
        }
    }

    pub fn set_permission(&self, kind: MediaKind, state: PermissionState) {
        lock(&self.permissions).insert(kind, state);
    }

    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        *lock(&self.devices) = devices;
    }

    /// Queues a failure with this platform error name for an upcoming
    /// `get_user_media` call.
    pub fn fail_next(&self, name: &str, message: &str) {
        lock(&self.scripted).push_back(Some((name.to_string(), message.to_string())));
    }

    /// Queues a success, so a later scripted failure hits a later request.
    pub fn succeed_next(&self) {
        lock(&self.scripted).push_back(None);
    }

    /// Number of tracks handed out and not yet stopped.
    pub fn live_tracks(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Profiles passed to `get_user_media`, in call order.
    pub fn requests(&self) -> Vec<ConstraintProfile> {
        lock(&self.requests).clone()
    }

    /// Opens a stream directly, bypassing scripted failures.
    pub fn open_stream(&self, profile: &ConstraintProfile) -> SyntheticStream {
        let tracks: Vec<TrackInfo> = profile
            .kinds()
            .into_iter()
            .map(|kind| TrackInfo {
                kind,
                label: match kind {
                    MediaKind::Audio => "Synthetic Microphone".to_string(),
                    MediaKind::Video => match profile.resolution {
                        Some(res) => format!("Synthetic Camera ({res})"),
                        None => "Synthetic Camera".to_string(),
                    },
                },
            })
            .collect();
        self.live.fetch_add(tracks.len(), Ordering::SeqCst);
        SyntheticStream {
            id: Uuid::new_v4().to_string(),
            tracks,
            live: Arc::clone(&self.live),
            stopped: false,
        }
    }
}

impl Default for SyntheticPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaPlatform for SyntheticPlatform {
    type Stream = SyntheticStream;

    async fn get_user_media(
        &self,
        profile: &ConstraintProfile,
    ) -> Result<SyntheticStream, MediaError> {
        lock(&self.requests).push(profile.clone());

        let scripted = lock(&self.scripted).pop_front().flatten();
        if let Some((name, message)) = scripted {
            debug!("synthetic platform failing request with {}", name);
            return Err(MediaError::from_platform(&name, message));
        }

        for kind in profile.kinds() {
            if lock(&self.permissions).get(&kind) == Some(&PermissionState::Denied) {
                return Err(MediaError::from_platform(
                    "NotAllowedError",
                    format!("{} access denied", kind.device_noun()),
                ));
            }
            if !lock(&self.devices).iter().any(|d| d.kind == kind) {
                return Err(MediaError::from_platform(
                    "NotFoundError",
                    format!("no {} attached", kind.device_noun()),
                ));
            }
        }

        Ok(self.open_stream(profile))
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, MediaError> {
        Ok(lock(&self.devices).clone())
    }

    async fn query_permission(&self, kind: MediaKind) -> Option<PermissionState> {
        if !self.permission_registry {
            return None;
        }
        Some(
            lock(&self.permissions)
                .get(&kind)
                .copied()
                .unwrap_or(PermissionState::Prompt),
        )
    }
}

/// Stream handed out by [`SyntheticPlatform`]. Dropping it without `stop()`
/// leaves its tracks counted as live.
pub struct SyntheticStream {
    id: String,
    tracks: Vec<TrackInfo>,
    live: Arc<AtomicUsize>,
    stopped: bool,
}

impl CaptureStream for SyntheticStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        self.tracks.clone()
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live.fetch_sub(self.tracks.len(), Ordering::SeqCst);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
