//! External collaborators (streaming daemon, Bluetooth stack, mixer, LEDs, OS tools)
//!
//! The controller only ever talks to these traits. Production implementations
//! wrap subprocesses, D-Bus and UDP; tests substitute the recording fakes in
//! [`fake`].
//!
//! Note: All methods take &self to support `Arc<dyn Trait>`. Implementations
//! use interior mutability for any state they keep.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::state::{PeerId, PlaybackStatus};

/// Metadata of the track currently playing on a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(rename = "image_url")]
    pub art_url: String,
    pub duration_sec: f64,
    pub position_sec: f64,
}

impl Default for TrackInfo {
    fn default() -> Self {
        Self {
            title: "Unknown Title".to_string(),
            artist: "Unknown Artist".to_string(),
            album: "Unknown Album".to_string(),
            art_url: String::new(),
            duration_sec: 0.0,
            position_sec: 0.0,
        }
    }
}

/// Transport command forwarded to whichever source is current
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    PlayPause,
    Next,
    Previous,
}

/// A Wi-Fi network seen by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiNetwork {
    pub ssid: String,
    /// Signal strength in percent
    #[serde(rename = "level")]
    pub signal: u8,
}

/// One liveness reading of the primary source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimarySample {
    /// A client holds a session
    pub active: bool,
    pub status: PlaybackStatus,
}

impl PrimarySample {
    /// What an unreachable primary source looks like
    pub const OFFLINE: PrimarySample = PrimarySample {
        active: false,
        status: PlaybackStatus::Unknown,
    };
}

/// The local streaming daemon and its transport/volume/metadata interface
#[async_trait]
pub trait PrimarySource: Send + Sync {
    /// Volume in percent (0-100)
    async fn volume(&self) -> Result<u8>;

    async fn set_volume(&self, volume: u8) -> Result<()>;

    async fn transport(&self, command: TransportCommand) -> Result<()>;

    async fn track_info(&self) -> Result<TrackInfo>;

    /// Playback position in seconds
    async fn position(&self) -> Result<f64>;

    async fn status(&self) -> Result<PlaybackStatus>;

    /// A client is connected and holds a session (playing or paused)
    async fn is_session_active(&self) -> Result<bool>;

    /// Liveness and playback status from a single status query
    async fn sample(&self) -> Result<PrimarySample>;

    /// Drop the connected client by restarting the daemon
    async fn disconnect_session(&self) -> Result<()>;
}

/// The short-range wireless stack
#[async_trait]
pub trait SecondarySource: Send + Sync {
    /// Connected audio peers, in a stable order
    async fn connected_peers(&self) -> Result<Vec<PeerId>>;

    async fn disconnect(&self, peer: &PeerId) -> Result<()>;

    async fn set_discoverable(&self, on: bool) -> Result<()>;

    async fn set_pairable(&self, on: bool) -> Result<()>;

    async fn set_radio_power(&self, on: bool) -> Result<()>;

    /// Transport volume in percent (0-100)
    async fn set_volume(&self, volume: u8) -> Result<()>;

    async fn transport(&self, command: TransportCommand) -> Result<()>;

    async fn track_info(&self) -> Result<TrackInfo>;

    async fn status(&self) -> Result<PlaybackStatus>;
}

/// The audio mixing engine's EQ parameters
#[async_trait]
pub trait Mixer: Send + Sync {
    /// Fire-and-forget: a send error is reported, never retried
    async fn set_gain(&self, band_id: i32, value: f32) -> Result<()>;
}

/// LEDs and the amplifier mute line
#[async_trait]
pub trait Indicators: Send + Sync {
    async fn set_amp_mute(&self, muted: bool) -> Result<()>;

    /// Render the volume bar (turns itself off after a while)
    async fn show_volume(&self, volume: u8) -> Result<()>;

    /// Light the main LED for `duration`, returning once it is off again
    async fn pulse(&self, duration: Duration) -> Result<()>;
}

/// OS-level tools: sound playback, daemon lifecycle, sink volume, Wi-Fi
#[async_trait]
pub trait SystemTools: Send + Sync {
    async fn play_sound(&self, path: &Path) -> Result<()>;

    /// (Re)start the streaming daemon at the given initial volume
    async fn start_primary_daemon(&self, initial_volume: u8) -> Result<()>;

    /// Set the hardware sink volume in percent
    async fn set_hardware_volume(&self, percent: u8) -> Result<()>;

    async fn scan_wifi(&self) -> Result<Vec<WifiNetwork>>;

    async fn connect_wifi(&self, ssid: &str, password: &str) -> Result<()>;

    async fn current_ssid(&self) -> Result<Option<String>>;

    async fn start_hotspot(&self, ssid: &str) -> Result<()>;
}

/// Every collaborator the controller needs, bundled for injection
#[derive(Clone)]
pub struct Collaborators {
    pub primary: Arc<dyn PrimarySource>,
    pub secondary: Arc<dyn SecondarySource>,
    pub mixer: Arc<dyn Mixer>,
    pub indicators: Arc<dyn Indicators>,
    pub system: Arc<dyn SystemTools>,
}

pub mod bluez;
pub mod indicators;
pub mod osc;
pub mod playerctl;
pub mod process;
pub mod sysfs_gpio;
pub mod system;

#[cfg(test)]
pub mod fake;

pub use bluez::BluezSource;
pub use indicators::{GpioIndicators, LogIndicators};
pub use osc::OscMixer;
pub use playerctl::PlayerctlSource;
pub use system::ShellTools;
