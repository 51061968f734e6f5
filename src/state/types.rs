//! Appliance state type definitions
//!
//! Defines the playback source selector, playback status, EQ presets,
//! button identities and the [`ApplianceState`] record itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::time::Instant;

use super::task::ScheduledTask;

/// Lowest accepted EQ preset (full cut)
pub const PRESET_MIN: i8 = -6;
/// Highest accepted EQ preset (full boost)
pub const PRESET_MAX: i8 = 6;

/// Which audio source currently owns playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Local streaming daemon
    #[default]
    Primary,
    /// Paired short-range wireless device
    Secondary,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Primary => write!(f, "primary"),
            Source::Secondary => write!(f, "secondary"),
        }
    }
}

/// Playback status as reported by a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl PlaybackStatus {
    /// Parse a status string as printed by media players ("Playing", "paused", ...)
    ///
    /// Anything unrecognized maps to [`PlaybackStatus::Unknown`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "playing" => PlaybackStatus::Playing,
            "paused" => PlaybackStatus::Paused,
            "stopped" => PlaybackStatus::Stopped,
            _ => PlaybackStatus::Unknown,
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackStatus::Playing => write!(f, "Playing"),
            PlaybackStatus::Paused => write!(f, "Paused"),
            PlaybackStatus::Stopped => write!(f, "Stopped"),
            PlaybackStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Identity of a secondary-source peer (its Bluetooth address)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// EQ band addressed by presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqBand {
    Bass,
    Treble,
}

impl EqBand {
    /// All bands in application order
    pub fn all() -> &'static [EqBand] {
        &[EqBand::Bass, EqBand::Treble]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EqBand::Bass => "bass",
            EqBand::Treble => "treble",
        }
    }
}

impl fmt::Display for EqBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EqBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bass" => Ok(EqBand::Bass),
            "treble" => Ok(EqBand::Treble),
            other => Err(format!("unknown EQ band '{}'", other)),
        }
    }
}

/// Stored preset per band, each in `PRESET_MIN..=PRESET_MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EqPreset {
    pub bass: i8,
    pub treble: i8,
}

impl EqPreset {
    pub fn get(&self, band: EqBand) -> i8 {
        match band {
            EqBand::Bass => self.bass,
            EqBand::Treble => self.treble,
        }
    }

    /// Store a preset for a band, clamped to the accepted range
    pub fn set(&mut self, band: EqBand, preset: i8) {
        let preset = preset.clamp(PRESET_MIN, PRESET_MAX);
        match band {
            EqBand::Bass => self.bass = preset,
            EqBand::Treble => self.treble = preset,
        }
    }
}

/// Physical buttons on the appliance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    VolumeUp,
    VolumeDown,
    Play,
}

impl ButtonId {
    pub fn all() -> &'static [ButtonId] {
        &[ButtonId::VolumeUp, ButtonId::VolumeDown, ButtonId::Play]
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonId::VolumeUp => write!(f, "UP"),
            ButtonId::VolumeDown => write!(f, "DOWN"),
            ButtonId::Play => write!(f, "PLAY"),
        }
    }
}

impl FromStr for ButtonId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "vol+" | "volume_up" => Ok(ButtonId::VolumeUp),
            "down" | "vol-" | "volume_down" => Ok(ButtonId::VolumeDown),
            "play" => Ok(ButtonId::Play),
            other => Err(format!("unknown button '{}'", other)),
        }
    }
}

/// "Was held" markers for the volume buttons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldFlags {
    pub up: bool,
    pub down: bool,
}

impl HeldFlags {
    pub fn get(&self, button: ButtonId) -> bool {
        match button {
            ButtonId::VolumeUp => self.up,
            ButtonId::VolumeDown => self.down,
            ButtonId::Play => false,
        }
    }

    pub fn set(&mut self, button: ButtonId, held: bool) {
        match button {
            ButtonId::VolumeUp => self.up = held,
            ButtonId::VolumeDown => self.down = held,
            ButtonId::Play => {}
        }
    }
}

/// Transient per-button bookkeeping
#[derive(Debug, Default)]
pub struct InputCombo {
    /// Play presses accumulated in the current combo window
    pub tap_count: u32,
    /// Pending multi-click resolution (at most one)
    pub combo_timer: Option<ScheduledTask>,
    /// Volume button currently holding priority
    pub active_button: Option<ButtonId>,
    pub held: HeldFlags,
}

impl InputCombo {
    /// When the pending combo window closes, if one is open
    pub fn combo_deadline(&self) -> Option<Instant> {
        self.combo_timer.as_ref().map(ScheduledTask::deadline)
    }
}

/// The single shared appliance record
#[derive(Debug)]
pub struct ApplianceState {
    /// Logical master volume, always within 0..=100
    pub volume: u8,
    pub source: Source,
    /// Admitted secondary-source peer
    pub secondary_owner: Option<PeerId>,
    pub eq_enabled: bool,
    pub preset: EqPreset,
    pub input: InputCombo,
    /// Armed while the primary source sits connected-but-paused
    pub idle_disconnect: Option<ScheduledTask>,
}

impl ApplianceState {
    pub fn new(volume: u8, source: Source, eq_enabled: bool, preset: EqPreset) -> Self {
        Self {
            volume: clamp_volume(i32::from(volume)),
            source,
            secondary_owner: None,
            eq_enabled,
            preset,
            input: InputCombo::default(),
            idle_disconnect: None,
        }
    }

    pub fn idle_disconnect_deadline(&self) -> Option<Instant> {
        self.idle_disconnect.as_ref().map(ScheduledTask::deadline)
    }
}

impl Default for ApplianceState {
    fn default() -> Self {
        Self::new(50, Source::Primary, true, EqPreset::default())
    }
}

/// Clamp any requested volume into 0..=100
pub fn clamp_volume(target: i32) -> u8 {
    target.clamp(0, 100) as u8
}
