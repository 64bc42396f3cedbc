//! Huddle CLI tools: loopback demo, permission probing, diagnostics.

#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use huddle_client::{ClientConfig, LogSurface, LoopbackNetwork, RendezvousMode, Room};
use huddle_media::{
    ConstraintProfile, MediaError, MediaKind, PermissionProber, PermissionState, ProbeStrategy,
    SyntheticPlatform, UserAgent,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(about = "Huddle CLI tools")]
struct Args {
    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info", env = "HUDDLE_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a room with in-process participants over the loopback relay
    Demo {
        /// Room name to join
        #[arg(short, long, default_value = "lobby")]
        room: String,

        /// Number of participants
        #[arg(short, long, default_value_t = 3)]
        participants: usize,

        /// How participants find each other
        #[arg(short, long, value_enum)]
        mode: Option<Mode>,

        /// JSON client config
        #[arg(short, long, env = "HUDDLE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Run a permission probe against the synthetic platform
    Probe {
        #[arg(short, long, value_enum, default_value = "query")]
        strategy: Strategy,

        /// Device kinds the platform reports as blocked
        #[arg(long, value_enum)]
        deny: Vec<Kind>,

        /// Simulate a host without a permission registry
        #[arg(long)]
        no_registry: bool,
    },

    /// Print the user-facing text for a capture error name
    Remedy {
        /// Platform error name, e.g. NotAllowedError
        #[arg(short, long)]
        error: String,

        /// Browser User-Agent string
        #[arg(short, long)]
        user_agent: Option<String>,
    },

    /// Print the effective client configuration
    Config {
        #[arg(short, long, env = "HUDDLE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Direct,
    Directory,
}

impl From<Mode> for RendezvousMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Direct => RendezvousMode::DirectDial,
            Mode::Directory => RendezvousMode::Directory,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Strategy {
    Query,
    EnumerateDevices,
    TrialStream,
    Disabled,
}

impl From<Strategy> for ProbeStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Query => ProbeStrategy::Query,
            Strategy::EnumerateDevices => ProbeStrategy::EnumerateDevices,
            Strategy::TrialStream => ProbeStrategy::TrialStream,
            Strategy::Disabled => ProbeStrategy::Disabled,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Audio,
    Video,
}

impl From<Kind> for MediaKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Audio => MediaKind::Audio,
            Kind::Video => MediaKind::Video,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    let mut config = match path {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ClientConfig::default(),
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    huddle_common::init_tracing_with_default(&args.log_level);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match args.command {
        Command::Demo {
            room,
            participants,
            mode,
            config,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(mode) = mode {
                config.rendezvous = mode.into();
            }
            rt.block_on(run_demo(config, &room, participants))?;
        }
        Command::Probe {
            strategy,
            deny,
            no_registry,
        } => {
            let platform = if no_registry {
                SyntheticPlatform::without_permission_registry()
            } else {
                SyntheticPlatform::new()
            };
            for kind in deny {
                platform.set_permission(kind.into(), PermissionState::Denied);
            }

            let prober = PermissionProber::new(strategy.into());
            let outcome = rt.block_on(prober.probe(&platform, &ConstraintProfile::basic()));
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Command::Remedy { error, user_agent } => {
            let agent = user_agent.as_deref().map(UserAgent::detect);
            let err = MediaError::from_platform(&error, String::new());
            println!("{}: {}", err.kind, err.remediation(agent));
        }
        Command::Config { config } => {
            let config = load_config(config.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::Version => {
            println!("huddle {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

async fn run_demo(config: ClientConfig, room: &str, participants: usize) -> Result<()> {
    anyhow::ensure!(participants >= 2, "a demo needs at least two participants");

    let network = LoopbackNetwork::new();
    let mut rooms = Vec::with_capacity(participants);
    for i in 0..participants {
        let mut config = config.clone();
        // Direct dial: the first participant takes the room name so the
        // others can dial it.
        if i == 0 && config.rendezvous == RendezvousMode::DirectDial {
            config.relay.requested_id = Some(room.trim().to_string());
        }
        let relay = network.relay(config.relay.clone());
        let surface = LogSurface::new(format!("p{i}"));
        let mut participant = Room::new(config, SyntheticPlatform::new(), relay, surface);
        participant.initialize().await?;
        participant.pump();
        rooms.push(participant);
    }

    for participant in rooms.iter_mut() {
        participant.join(room)?;
    }
    // Offers, then answers.
    for _ in 0..2 {
        for participant in rooms.iter_mut() {
            participant.pump();
        }
    }

    for participant in &rooms {
        let identity = participant
            .identity()
            .map(ToString::to_string)
            .unwrap_or_default();
        println!(
            "{identity}: {} remote views, {} calls",
            participant.views().len(),
            participant.calls().len()
        );
    }

    info!("first participant leaving");
    rooms[0].leave().await?;
    for participant in rooms.iter_mut().skip(1) {
        participant.pump();
    }
    for participant in rooms.iter().skip(1) {
        println!(
            "after leave: {} has {} remote views",
            participant
                .identity()
                .map(ToString::to_string)
                .unwrap_or_default(),
            participant.views().len()
        );
    }

    for participant in rooms.iter_mut() {
        participant.shutdown();
    }
    println!("open calls after shutdown: {}", network.open_calls());
    Ok(())
}
