//! Configuration management for the speaker core
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! Every section carries serde defaults, so an absent file or an empty
//! document yields a working configuration for the reference hardware.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub buttons: ButtonsConfig,
    #[serde(default)]
    pub indicators: IndicatorsConfig,
    #[serde(default)]
    pub primary: PrimaryConfig,
    #[serde(default)]
    pub bluetooth: BluetoothConfig,
    #[serde(default)]
    pub mixer: MixerConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// HTTP API binding
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

/// Timing constants for the supervisory loop, the input debouncer and
/// collaborator calls (all durations in milliseconds)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,
    #[serde(default = "default_ramp_ms")]
    pub ramp_ms: u64,
    #[serde(default = "default_multi_click_ms")]
    pub multi_click_ms: u64,
    #[serde(default = "default_play_hold_ms")]
    pub play_hold_ms: u64,
    #[serde(default = "default_idle_disconnect_secs")]
    pub idle_disconnect_secs: u64,
    #[serde(default = "default_led_timeout_ms")]
    pub led_timeout_ms: u64,
    #[serde(default = "default_collaborator_timeout_ms")]
    pub collaborator_timeout_ms: u64,
    #[serde(default = "default_volume_step")]
    pub volume_step: u8,
}

/// Which input backend feeds button edges
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputBackend {
    #[default]
    Gpio,
    Console,
    None,
}

/// Physical button wiring
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ButtonsConfig {
    #[serde(default)]
    pub backend: InputBackend,
    #[serde(default = "default_volume_up_pin")]
    pub volume_up_pin: u32,
    #[serde(default = "default_volume_down_pin")]
    pub volume_down_pin: u32,
    #[serde(default = "default_play_pin")]
    pub play_pin: u32,
    /// Line level that means "pressed"
    #[serde(default = "default_true")]
    pub active_high: bool,
    #[serde(default = "default_bounce_ms")]
    pub bounce_ms: u64,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
}

/// Which indicator backend renders LEDs and the amp mute line
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorBackend {
    #[default]
    Gpio,
    Log,
}

/// LED and amplifier mute wiring
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndicatorsConfig {
    #[serde(default)]
    pub backend: IndicatorBackend,
    #[serde(default = "default_volume_led_pins")]
    pub volume_led_pins: Vec<u32>,
    #[serde(default = "default_main_led_pin")]
    pub main_led_pin: u32,
    #[serde(default = "default_mute_pin")]
    pub mute_pin: u32,
    /// Level written to the mute line to silence the amplifier
    #[serde(default = "default_true")]
    pub mute_active_high: bool,
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
}

/// Primary source (streaming daemon) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrimaryConfig {
    /// Player name as listed by the media control tool
    #[serde(default = "default_player_name")]
    pub player: String,
    #[serde(default = "default_daemon_binary")]
    pub daemon_binary: String,
    #[serde(default)]
    pub daemon_args: Vec<String>,
    /// Delay between stopping and restarting the daemon on a forced disconnect
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
}

/// Secondary source (Bluetooth) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BluetoothConfig {
    #[serde(default = "default_adapter")]
    pub adapter: String,
}

/// Audio mixing engine control endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MixerConfig {
    #[serde(default = "default_mixer_host")]
    pub host: String,
    #[serde(default = "default_mixer_port")]
    pub port: u16,
    /// Plugin index of the graphic EQ inside the mixer
    #[serde(default)]
    pub eq_plugin: i32,
}

/// OS audio settings and feedback sounds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Hardware sink volume (percent) set at boot; software volume does the rest
    #[serde(default = "default_hardware_volume")]
    pub hardware_volume: u8,
    /// Substrings identifying the hardware sink in the sound server's list
    #[serde(default = "default_sink_keywords")]
    pub sink_keywords: Vec<String>,
    #[serde(default)]
    pub chime: Option<PathBuf>,
    #[serde(default = "default_hotspot_ssid")]
    pub hotspot_ssid: String,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            tracing::info!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.api.port == 0 {
            anyhow::bail!("api.port cannot be 0");
        }

        let t = &self.timing;
        if t.tick_ms == 0 {
            anyhow::bail!("timing.tick_ms must be greater than 0");
        }
        if t.ramp_ms == 0 {
            anyhow::bail!("timing.ramp_ms must be greater than 0");
        }
        if t.collaborator_timeout_ms == 0 {
            anyhow::bail!("timing.collaborator_timeout_ms must be greater than 0");
        }
        if t.play_hold_ms <= t.hold_ms {
            anyhow::bail!(
                "timing.play_hold_ms ({}) must be longer than timing.hold_ms ({})",
                t.play_hold_ms,
                t.hold_ms
            );
        }
        if t.volume_step == 0 || t.volume_step > 100 {
            anyhow::bail!("timing.volume_step must be within 1..=100 (got {})", t.volume_step);
        }

        let b = &self.buttons;
        if b.backend == InputBackend::Gpio {
            let pins = [b.volume_up_pin, b.volume_down_pin, b.play_pin];
            if pins[0] == pins[1] || pins[0] == pins[2] || pins[1] == pins[2] {
                anyhow::bail!("buttons: each button needs its own GPIO line (got {:?})", pins);
            }
        }

        if self.indicators.volume_led_pins.is_empty() {
            anyhow::bail!("indicators.volume_led_pins must list at least one line");
        }

        if self.primary.player.trim().is_empty() {
            anyhow::bail!("primary.player cannot be empty");
        }
        if self.primary.daemon_binary.trim().is_empty() {
            anyhow::bail!("primary.daemon_binary cannot be empty");
        }

        if self.bluetooth.adapter.trim().is_empty() {
            anyhow::bail!("bluetooth.adapter cannot be empty");
        }

        if self.mixer.port == 0 {
            anyhow::bail!("mixer.port cannot be 0");
        }

        if self.audio.hardware_volume > 100 {
            anyhow::bail!(
                "audio.hardware_volume must be within 0..=100 (got {})",
                self.audio.hardware_volume
            );
        }

        Ok(())
    }

    /// Address the HTTP API binds to
    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api.host, self.api.port)
            .parse()
            .with_context(|| format!("Invalid API bind address {}:{}", self.api.host, self.api.port))
    }
}

impl TimingConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn ramp(&self) -> Duration {
        Duration::from_millis(self.ramp_ms)
    }

    pub fn multi_click(&self) -> Duration {
        Duration::from_millis(self.multi_click_ms)
    }

    pub fn play_hold(&self) -> Duration {
        Duration::from_millis(self.play_hold_ms)
    }

    pub fn idle_disconnect(&self) -> Duration {
        Duration::from_secs(self.idle_disconnect_secs)
    }

    pub fn led_timeout(&self) -> Duration {
        Duration::from_millis(self.led_timeout_ms)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            hold_ms: default_hold_ms(),
            ramp_ms: default_ramp_ms(),
            multi_click_ms: default_multi_click_ms(),
            play_hold_ms: default_play_hold_ms(),
            idle_disconnect_secs: default_idle_disconnect_secs(),
            led_timeout_ms: default_led_timeout_ms(),
            collaborator_timeout_ms: default_collaborator_timeout_ms(),
            volume_step: default_volume_step(),
        }
    }
}

impl Default for ButtonsConfig {
    fn default() -> Self {
        Self {
            backend: InputBackend::default(),
            volume_up_pin: default_volume_up_pin(),
            volume_down_pin: default_volume_down_pin(),
            play_pin: default_play_pin(),
            active_high: true,
            bounce_ms: default_bounce_ms(),
            poll_ms: default_poll_ms(),
            gpio_root: default_gpio_root(),
        }
    }
}

impl Default for IndicatorsConfig {
    fn default() -> Self {
        Self {
            backend: IndicatorBackend::default(),
            volume_led_pins: default_volume_led_pins(),
            main_led_pin: default_main_led_pin(),
            mute_pin: default_mute_pin(),
            mute_active_high: true,
            gpio_root: default_gpio_root(),
        }
    }
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            player: default_player_name(),
            daemon_binary: default_daemon_binary(),
            daemon_args: Vec::new(),
            restart_delay_ms: default_restart_delay_ms(),
        }
    }
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
        }
    }
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            host: default_mixer_host(),
            port: default_mixer_port(),
            eq_plugin: 0,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            hardware_volume: default_hardware_volume(),
            sink_keywords: default_sink_keywords(),
            chime: None,
            hotspot_ssid: default_hotspot_ssid(),
        }
    }
}

// Default value functions
fn default_api_host() -> String { "0.0.0.0".to_string() }
fn default_api_port() -> u16 { 8000 }
fn default_tick_ms() -> u64 { 2000 }
fn default_hold_ms() -> u64 { 600 }
fn default_ramp_ms() -> u64 { 100 }
fn default_multi_click_ms() -> u64 { 400 }
fn default_play_hold_ms() -> u64 { 2000 }
fn default_idle_disconnect_secs() -> u64 { 300 }
fn default_led_timeout_ms() -> u64 { 3000 }
fn default_collaborator_timeout_ms() -> u64 { 3000 }
fn default_volume_step() -> u8 { 5 }
fn default_volume_up_pin() -> u32 { 5 }
fn default_volume_down_pin() -> u32 { 13 }
fn default_play_pin() -> u32 { 6 }
fn default_true() -> bool { true }
fn default_bounce_ms() -> u64 { 50 }
fn default_poll_ms() -> u64 { 10 }
fn default_gpio_root() -> PathBuf { PathBuf::from("/sys/class/gpio") }
fn default_volume_led_pins() -> Vec<u32> { vec![16, 12, 25, 24] }
fn default_main_led_pin() -> u32 { 23 }
fn default_mute_pin() -> u32 { 26 }
fn default_player_name() -> String { "spotifyd".to_string() }
fn default_daemon_binary() -> String { "spotifyd".to_string() }
fn default_restart_delay_ms() -> u64 { 1000 }
fn default_adapter() -> String { "hci0".to_string() }
fn default_mixer_host() -> String { "127.0.0.1".to_string() }
fn default_mixer_port() -> u16 { 22752 }
fn default_hardware_volume() -> u8 { 80 }
fn default_sink_keywords() -> Vec<String> { vec!["hifiberry".to_string(), "snd_rpi".to_string()] }
fn default_hotspot_ssid() -> String { "Setup".to_string() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config.api.port, 8000);
        assert_eq!(config.timing.tick_ms, 2000);
        assert_eq!(config.timing.hold_ms, 600);
        assert_eq!(config.timing.multi_click_ms, 400);
        assert_eq!(config.timing.idle_disconnect_secs, 300);
        assert_eq!(config.buttons.play_pin, 6);
        assert_eq!(config.indicators.volume_led_pins, vec![16, 12, 25, 24]);
        assert_eq!(config.mixer.port, 22752);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let yaml = r#"
api:
  port: 9000
timing:
  tick_ms: 500
buttons:
  backend: console
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.timing.tick_ms, 500);
        assert_eq!(config.timing.ramp_ms, 100);
        assert_eq!(config.buttons.backend, InputBackend::Console);
        assert_eq!(config.buttons.volume_up_pin, 5);
    }

    #[test]
    fn test_rejects_duplicate_button_lines() {
        let yaml = r#"
buttons:
  volume_up_pin: 5
  volume_down_pin: 5
"#;
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("own GPIO line"));
    }

    #[test]
    fn test_rejects_play_hold_shorter_than_hold() {
        let yaml = r#"
timing:
  hold_ms: 800
  play_hold_ms: 500
"#;
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_zero_volume_step() {
        let yaml = "timing:\n  volume_step: 0\n";
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_api_addr() {
        let config = AppConfig::default();
        assert_eq!(config.api_addr().unwrap().port(), 8000);
    }

    #[tokio::test]
    async fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("absent.yaml"))
            .await
            .unwrap();
        assert_eq!(config.primary.player, "spotifyd");
    }
}
