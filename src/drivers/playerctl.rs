//! Primary source backed by the streaming daemon, driven through `playerctl`

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use super::process::{self, CommandError};
use super::{PrimarySample, PrimarySource, TrackInfo, TransportCommand};
use crate::config::PrimaryConfig;
use crate::state::PlaybackStatus;

/// MPRIS player controlled via the `playerctl` CLI
pub struct PlayerctlSource {
    player: String,
    daemon_binary: String,
    daemon_args: Vec<String>,
    restart_delay: Duration,
}

impl PlayerctlSource {
    pub fn new(config: &PrimaryConfig) -> Self {
        Self {
            player: config.player.clone(),
            daemon_binary: config.daemon_binary.clone(),
            daemon_args: config.daemon_args.clone(),
            restart_delay: Duration::from_millis(config.restart_delay_ms),
        }
    }

    async fn playerctl(&self, args: &[&str]) -> Result<String, CommandError> {
        let mut full = vec!["-p", self.player.as_str()];
        full.extend_from_slice(args);
        process::run("playerctl", &full).await
    }

    async fn metadata(&self, key: &str) -> Result<String> {
        self.playerctl(&["metadata", key])
            .await
            .with_context(|| format!("Failed to read {}", key))
    }
}

#[async_trait]
impl PrimarySource for PlayerctlSource {
    async fn volume(&self) -> Result<u8> {
        let raw = self.playerctl(&["volume"]).await?;
        parse_volume(&raw).with_context(|| format!("Unexpected volume output '{}'", raw))
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        let value = format!("{:.2}", f64::from(volume.min(100)) / 100.0);
        debug!("Setting primary volume to {}%", volume);
        self.playerctl(&["volume", &value]).await?;
        Ok(())
    }

    async fn transport(&self, command: TransportCommand) -> Result<()> {
        let verb = match command {
            TransportCommand::PlayPause => "play-pause",
            TransportCommand::Next => "next",
            TransportCommand::Previous => "previous",
        };
        self.playerctl(&[verb]).await?;
        Ok(())
    }

    async fn track_info(&self) -> Result<TrackInfo> {
        let mut info = TrackInfo {
            title: self.metadata("xesam:title").await?,
            artist: self.metadata("xesam:artist").await?,
            album: self.metadata("xesam:album").await?,
            art_url: self.metadata("mpris:artUrl").await.unwrap_or_default(),
            ..TrackInfo::default()
        };

        let length = self.metadata("mpris:length").await.unwrap_or_default();
        info.duration_sec = parse_micros(&length);
        // Position fails while stopped
        info.position_sec = self.position().await.unwrap_or(0.0);
        Ok(info)
    }

    async fn position(&self) -> Result<f64> {
        let raw = self.playerctl(&["position"]).await?;
        raw.parse::<f64>()
            .with_context(|| format!("Unexpected position output '{}'", raw))
    }

    async fn status(&self) -> Result<PlaybackStatus> {
        match self.playerctl(&["status"]).await {
            Ok(raw) => Ok(PlaybackStatus::parse(&raw)),
            // playerctl exits non-zero when the player is not on the bus
            Err(CommandError::Failed { .. }) => Ok(PlaybackStatus::Unknown),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_session_active(&self) -> Result<bool> {
        Ok(self.sample().await?.active)
    }

    async fn sample(&self) -> Result<PrimarySample> {
        let players = process::run("playerctl", &["-l"]).await.unwrap_or_default();
        if !lists_player(&players, &self.player) {
            return Ok(PrimarySample::OFFLINE);
        }
        let status = self.status().await?;
        Ok(PrimarySample {
            active: holds_session(status),
            status,
        })
    }

    async fn disconnect_session(&self) -> Result<()> {
        info!("Kicking primary session (restarting {})", self.daemon_binary);
        process::run_quiet("pkill", &["-x", &self.daemon_binary]).await;
        tokio::time::sleep(self.restart_delay).await;
        process::spawn_detached(&self.daemon_binary, &self.daemon_args)?;
        Ok(())
    }
}

/// `playerctl volume` prints 0.0..=1.0
fn parse_volume(raw: &str) -> Option<u8> {
    let value: f64 = raw.trim().parse().ok()?;
    Some((value * 100.0).round().clamp(0.0, 100.0) as u8)
}

/// `mpris:length` is in microseconds
fn parse_micros(raw: &str) -> f64 {
    raw.trim().parse::<f64>().map(|us| us / 1_000_000.0).unwrap_or(0.0)
}

/// Playing or paused means a client is connected
fn holds_session(status: PlaybackStatus) -> bool {
    matches!(status, PlaybackStatus::Playing | PlaybackStatus::Paused)
}

/// Player names in `playerctl -l` may carry an instance suffix (`spotifyd.instance123`)
fn lists_player(listing: &str, player: &str) -> bool {
    listing.lines().any(|line| {
        let line = line.trim();
        line == player || line.starts_with(&format!("{}.", player))
    })
}
