//! Best-effort permission probing ahead of the real capture request.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    ConstraintProfile, LocalMediaStream, MediaErrorKind, MediaKind, MediaPlatform,
    PermissionState,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeStrategy {
    /// Ask the platform permission registry.
    #[default]
    Query,
    /// Labelled devices imply access was granted before.
    EnumerateDevices,
    /// Open and immediately release a tiny stream to surface the prompt early.
    TrialStream,
    Disabled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Granted,
    Denied,
    /// The platform will ask the user on the real request.
    Prompt,
    Unsupported,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionProber {
    strategy: ProbeStrategy,
}

impl PermissionProber {
    pub fn new(strategy: ProbeStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ProbeStrategy {
        self.strategy
    }

    /// Probes access for the kinds `profile` asks for. Never acquires a stream
    /// that outlives the call.
    pub async fn probe<P: MediaPlatform>(
        &self,
        platform: &P,
        profile: &ConstraintProfile,
    ) -> ProbeOutcome {
        let kinds = profile.kinds();
        let outcome = match self.strategy {
            ProbeStrategy::Disabled => ProbeOutcome::Unsupported,
            ProbeStrategy::Query => query(platform, &kinds).await,
            ProbeStrategy::EnumerateDevices => enumerate(platform, &kinds).await,
            ProbeStrategy::TrialStream => trial(platform, profile).await,
        };
        debug!("permission probe ({:?}) -> {:?}", self.strategy, outcome);
        outcome
    }
}

async fn query<P: MediaPlatform>(platform: &P, kinds: &[MediaKind]) -> ProbeOutcome {
    let mut states = Vec::with_capacity(kinds.len());
    for kind in kinds {
        states.push(platform.query_permission(*kind).await);
    }

    if states.iter().all(Option::is_none) {
        return ProbeOutcome::Unsupported;
    }
    if states.contains(&Some(PermissionState::Denied)) {
        return ProbeOutcome::Denied;
    }
    if states.iter().all(|s| *s == Some(PermissionState::Granted)) {
        ProbeOutcome::Granted
    } else {
        ProbeOutcome::Prompt
    }
}

async fn enumerate<P: MediaPlatform>(platform: &P, kinds: &[MediaKind]) -> ProbeOutcome {
    let devices = match platform.enumerate_devices().await {
        Ok(devices) => devices,
        Err(err) => {
            debug!("device enumeration unavailable: {}", err);
            return ProbeOutcome::Unsupported;
        }
    };

    // A missing device is the acquirer's NotFound to report, not a denial.
    let labelled = kinds.iter().all(|kind| {
        devices
            .iter()
            .any(|d| d.kind == *kind && !d.label.is_empty())
    });
    if labelled {
        ProbeOutcome::Granted
    } else {
        ProbeOutcome::Prompt
    }
}

async fn trial<P: MediaPlatform>(platform: &P, profile: &ConstraintProfile) -> ProbeOutcome {
    let trial_profile = ConstraintProfile::trial(profile.audio, profile.video);
    match platform.get_user_media(&trial_profile).await {
        Ok(stream) => {
            // Released at the end of this arm.
            let _trial = LocalMediaStream::new(stream, trial_profile);
            info!("trial stream granted, releasing it");
            ProbeOutcome::Granted
        }
        Err(err) if err.kind == MediaErrorKind::Denied => ProbeOutcome::Denied,
        Err(err) => {
            debug!("trial stream failed, deferring to real request: {}", err);
            ProbeOutcome::Unsupported
        }
    }
}
