//! Local stream acquisition with an optional one-shot quality upgrade.

use tracing::{info, warn};

use crate::{
    ConstraintProfile, LocalMediaStream, MediaError, MediaPlatform, PermissionProber,
    ProbeOutcome,
};

#[derive(Debug, Clone, Default)]
pub struct MediaAcquirer {
    prober: PermissionProber,
    upgrade: Option<ConstraintProfile>,
}

impl MediaAcquirer {
    pub fn new(prober: PermissionProber, upgrade: Option<ConstraintProfile>) -> Self {
        Self { prober, upgrade }
    }

    /// Acquires a stream for `profile`, then tries the upgrade profile once.
    ///
    /// A failed upgrade keeps the base stream. A successful one stops the base
    /// stream before it is discarded.
    pub async fn acquire<P: MediaPlatform>(
        &self,
        platform: &P,
        profile: &ConstraintProfile,
    ) -> Result<LocalMediaStream, MediaError> {
        if profile.is_empty() {
            return Err(MediaError::other(
                "constraint profile requests neither audio nor video",
            ));
        }

        if self.prober.probe(platform, profile).await == ProbeOutcome::Denied {
            return Err(MediaError::denied(
                "permission registry reports camera or microphone as blocked",
            ));
        }

        let base = platform.get_user_media(profile).await?;
        let base = LocalMediaStream::new(base, profile.clone());
        info!("acquired local stream {} ({} tracks)", base.id(), base.tracks().len());

        let Some(upgrade) = self.upgrade.as_ref() else {
            return Ok(base);
        };
        if upgrade == profile {
            return Ok(base);
        }

        match platform.get_user_media(upgrade).await {
            Ok(stream) => {
                let upgraded = LocalMediaStream::new(stream, upgrade.clone());
                info!(
                    "upgraded local stream {} -> {}",
                    base.id(),
                    upgraded.id()
                );
                drop(base);
                Ok(upgraded)
            }
            Err(err) => {
                warn!("quality upgrade failed, keeping base stream: {}", err);
                Ok(base)
            }
        }
    }
}
