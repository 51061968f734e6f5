//! OS tools: chime playback, daemon start, sink volume and Wi-Fi management

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info, warn};

use super::process;
use super::{SystemTools, WifiNetwork};
use crate::config::{AudioConfig, PrimaryConfig};

/// Chime volume on the sound server scale (0..=65536)
const CHIME_VOLUME: u32 = 16384;

/// Wireless interface used for scans and the setup hotspot
const WIFI_IFACE: &str = "wlan0";

/// [`SystemTools`] implemented with the usual Linux command-line tools
/// (`paplay`, `pactl`, `pamixer`, `nmcli`, `iwgetid`)
pub struct ShellTools {
    daemon_binary: String,
    daemon_args: Vec<String>,
    sink_keywords: Vec<String>,
}

impl ShellTools {
    pub fn new(primary: &PrimaryConfig, audio: &AudioConfig) -> Self {
        Self {
            daemon_binary: primary.daemon_binary.clone(),
            daemon_args: primary.daemon_args.clone(),
            sink_keywords: audio.sink_keywords.clone(),
        }
    }

    /// Name of the hardware output sink, skipping loopbacks
    async fn find_hardware_sink(&self) -> Result<Option<String>> {
        let listing = process::run("pactl", &["list", "short", "sinks"]).await?;
        Ok(pick_hardware_sink(&listing, &self.sink_keywords))
    }
}

#[async_trait]
impl SystemTools for ShellTools {
    async fn play_sound(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            warn!("Sound file not found: {}", path.display());
            return Ok(());
        }
        process::spawn_detached(
            "paplay",
            &[
                path.display().to_string(),
                format!("--volume={}", CHIME_VOLUME),
            ],
        )?;
        Ok(())
    }

    async fn start_primary_daemon(&self, initial_volume: u8) -> Result<()> {
        process::run_quiet("pkill", &["-x", &self.daemon_binary]).await;
        let mut args = self.daemon_args.clone();
        args.push("--initial-volume".to_string());
        args.push(initial_volume.min(100).to_string());
        process::spawn_detached(&self.daemon_binary, &args)?;
        info!("🎵 Started {} (initial volume {}%)", self.daemon_binary, initial_volume);
        Ok(())
    }

    async fn set_hardware_volume(&self, percent: u8) -> Result<()> {
        let Some(sink) = self.find_hardware_sink().await? else {
            anyhow::bail!("no hardware sink found");
        };
        debug!("Setting hardware sink {} to {}%", sink, percent);
        process::run(
            "pamixer",
            &["--sink", &sink, "--set-volume", &percent.min(100).to_string()],
        )
        .await
        .context("Failed to set hardware volume")?;
        Ok(())
    }

    async fn scan_wifi(&self) -> Result<Vec<WifiNetwork>> {
        let listing = process::run("nmcli", &["-t", "-f", "SSID,SIGNAL", "dev", "wifi"])
            .await
            .context("Wi-Fi scan failed")?;
        Ok(parse_wifi_scan(&listing))
    }

    async fn connect_wifi(&self, ssid: &str, password: &str) -> Result<()> {
        info!("📶 Connecting to Wi-Fi '{}'", ssid);
        process::run("nmcli", &["dev", "wifi", "connect", ssid, "password", password])
            .await
            .with_context(|| format!("Failed to connect to '{}'", ssid))?;
        Ok(())
    }

    async fn current_ssid(&self) -> Result<Option<String>> {
        match process::run("iwgetid", &["-r"]).await {
            Ok(ssid) if !ssid.is_empty() => Ok(Some(ssid)),
            Ok(_) => Ok(None),
            // iwgetid exits non-zero when not associated
            Err(process::CommandError::Failed { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn start_hotspot(&self, ssid: &str) -> Result<()> {
        info!("📶 Opening setup hotspot '{}'", ssid);
        process::run(
            "nmcli",
            &[
                "dev", "wifi", "hotspot", "ifname", WIFI_IFACE, "con-name", ssid, "ssid", ssid,
                "band", "bg",
            ],
        )
        .await
        .context("Failed to create hotspot")?;
        Ok(())
    }
}

/// Pick the first non-loopback sink matching one of the keywords
fn pick_hardware_sink(listing: &str, keywords: &[String]) -> Option<String> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter(|name| !name.contains("loopback") && !name.contains("aloop"))
        .find(|name| {
            keywords.iter().any(|k| name.contains(k.as_str()))
                || (name.contains("alsa_output") && name.contains("platform"))
        })
        .map(str::to_string)
}

/// Parse terse `SSID:SIGNAL` lines, dropping hidden networks and duplicates
fn parse_wifi_scan(listing: &str) -> Vec<WifiNetwork> {
    let mut networks: Vec<WifiNetwork> = Vec::new();
    for line in listing.lines() {
        // SSIDs may contain escaped colons, the signal is always last
        let Some((ssid, signal)) = line.trim().rsplit_once(':') else {
            continue;
        };
        let ssid = ssid.replace("\\:", ":");
        if ssid.is_empty() {
            continue;
        }
        let signal = signal.trim().parse::<u8>().unwrap_or(0);
        match networks.iter_mut().find(|n| n.ssid == ssid) {
            Some(existing) => existing.signal = existing.signal.max(signal),
            None => networks.push(WifiNetwork { ssid, signal }),
        }
    }
    networks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wifi_scan() {
        let listing = "Home:82\n:40\nCafe\\: Guest:35\nHome:90\n";
        let networks = parse_wifi_scan(listing);
        assert_eq!(
            networks,
            vec![
                WifiNetwork { ssid: "Home".into(), signal: 90 },
                WifiNetwork { ssid: "Cafe: Guest".into(), signal: 35 },
            ]
        );
    }

    #[test]
    fn test_pick_hardware_sink_skips_loopback() {
        let listing = "\
0\talsa_output.platform-snd_aloop.0.analog-stereo\tmodule-alsa-card.c\ts16le 2ch 44100Hz\tIDLE
1\talsa_output.platform-soc_sound.stereo-fallback\tmodule-alsa-card.c\ts32le 2ch 48000Hz\tRUNNING
";
        let keywords = vec!["hifiberry".to_string()];
        assert_eq!(
            pick_hardware_sink(listing, &keywords).as_deref(),
            Some("alsa_output.platform-soc_sound.stereo-fallback")
        );
    }

    #[test]
    fn test_pick_hardware_sink_none() {
        assert_eq!(pick_hardware_sink("0\tnull\tmodule-null-sink.c", &[]), None);
    }
}
