use std::path::Path;

use huddle_common::helpers::env_bool;
use huddle_common::{Error, Result};
use huddle_media::{ConstraintProfile, ProbeStrategy, UserAgent};
use serde::{Deserialize, Serialize};

/// Highest relay debug verbosity.
pub const MAX_RELAY_DEBUG: u8 = 3;

/// Connection options for the relay/signaling service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    /// `None` uses the relay's public cloud endpoint.
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: String,
    pub secure: bool,
    pub key: String,
    /// 0 = errors only .. 3 = everything.
    pub debug: u8,
    /// Ask the relay for a specific identity instead of a random one.
    pub requested_id: Option<String>,
}

impl RelayConfig {
    pub fn endpoint(&self) -> String {
        let Some(host) = self.host.as_deref() else {
            return "default cloud relay".to_string();
        };
        let scheme = if self.secure { "wss" } else { "ws" };
        let port = self.port.unwrap_or(if self.secure { 443 } else { 80 });
        format!("{scheme}://{host}:{port}{}", self.path)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            path: "/".to_string(),
            secure: true,
            key: "peerjs".to_string(),
            debug: MAX_RELAY_DEBUG,
            requested_id: None,
        }
    }
}

/// How a room token turns into peers to dial.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RendezvousMode {
    /// Dial the room token as if it were a peer identity (two-party rooms).
    #[default]
    DirectDial,
    /// Register in the relay's room directory and dial every member.
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub relay: RelayConfig,
    pub profile: ConstraintProfile,
    pub upgrade_profile: ConstraintProfile,
    pub upgrade_quality: bool,
    pub probe: ProbeStrategy,
    pub rendezvous: RendezvousMode,
    pub user_agent: Option<UserAgent>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            profile: ConstraintProfile::low(),
            upgrade_profile: ConstraintProfile::hd(),
            upgrade_quality: true,
            probe: ProbeStrategy::Query,
            rendezvous: RendezvousMode::DirectDial,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Loads a JSON config file; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `HUDDLE_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.upgrade_quality = env_bool("HUDDLE_UPGRADE_QUALITY", self.upgrade_quality);
        self.relay.secure = env_bool("HUDDLE_RELAY_SECURE", self.relay.secure);
        if env_bool("HUDDLE_ROOM_DIRECTORY", false) {
            self.rendezvous = RendezvousMode::Directory;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.profile.is_empty() {
            return Err(Error::config("profile must request audio or video"));
        }
        if self.upgrade_quality && self.upgrade_profile.is_empty() {
            return Err(Error::config("upgrade_profile must request audio or video"));
        }
        if self.relay.debug > MAX_RELAY_DEBUG {
            return Err(Error::config(format!(
                "relay.debug must be 0..={MAX_RELAY_DEBUG}"
            )));
        }
        if self.relay.port == Some(0) {
            return Err(Error::config("relay.port must be non-zero"));
        }
        if !self.relay.path.starts_with('/') {
            return Err(Error::config("relay.path must start with '/'"));
        }
        if matches!(self.relay.requested_id.as_deref(), Some(id) if id.trim().is_empty()) {
            return Err(Error::config("relay.requested_id must not be blank"));
        }
        Ok(())
    }

    /// The profile tried after the base stream is live, if upgrading is on.
    pub fn upgrade(&self) -> Option<ConstraintProfile> {
        self.upgrade_quality.then(|| self.upgrade_profile.clone())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Idle,
    Joining,
    Joined,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.upgrade(), Some(ConstraintProfile::hd()));
        assert_eq!(config.relay.endpoint(), "default cloud relay");
    }

    #[test]
    fn test_endpoint() {
        let relay = RelayConfig {
            host: Some("signal.example.com".into()),
            path: "/peerjs".into(),
            ..RelayConfig::default()
        };
        assert_eq!(relay.endpoint(), "wss://signal.example.com:443/peerjs");

        let plain = RelayConfig {
            host: Some("localhost".into()),
            port: Some(9000),
            secure: false,
            ..RelayConfig::default()
        };
        assert_eq!(plain.endpoint(), "ws://localhost:9000/");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ClientConfig::default();
        config.relay.debug = 7;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = ClientConfig::default();
        config.profile = ConstraintProfile::trial(false, false);
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.relay.requested_id = Some("  ".into());
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.upgrade_quality = false;
        config.upgrade_profile = ConstraintProfile::trial(false, false);
        config.validate().unwrap();
        assert_eq!(config.upgrade(), None);
    }

    #[test]
    fn test_load_partial_file() {
        let path = std::env::temp_dir().join(format!(
            "huddle-config-{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"{"rendezvous": "directory", "probe": "trial-stream", "relay": {"host": "relay.local", "port": 9000}}"#,
        )
        .unwrap();

        let config = ClientConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.rendezvous, RendezvousMode::Directory);
        assert_eq!(config.probe, ProbeStrategy::TrialStream);
        assert_eq!(config.relay.port, Some(9000));
        assert_eq!(config.relay.key, "peerjs");
        assert_eq!(config.profile, ConstraintProfile::low());
    }

    #[test]
    fn test_load_invalid_json() {
        let path = std::env::temp_dir().join(format!(
            "huddle-config-bad-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{ not json").unwrap();
        let err = ClientConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, Error::Config(_)));
    }
}
