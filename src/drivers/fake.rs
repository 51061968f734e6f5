//! Deterministic recording collaborators for tests

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{
    Collaborators, Indicators, Mixer, PrimarySample, PrimarySource, SecondarySource, SystemTools,
    TrackInfo, TransportCommand, WifiNetwork,
};
use crate::state::{PeerId, PlaybackStatus};

/// How a fake answers calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Behavior {
    #[default]
    Ok,
    Fail,
    /// Never answers (exercises collaborator timeouts)
    Hang,
    /// Answers after a delay
    Slow(Duration),
}

async fn apply(behavior: Behavior) -> Result<()> {
    match behavior {
        Behavior::Ok => Ok(()),
        Behavior::Fail => bail!("collaborator unavailable"),
        Behavior::Hang => {
            std::future::pending::<()>().await;
            Ok(())
        }
        Behavior::Slow(delay) => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

// ===== Primary source =====

#[derive(Debug)]
pub struct PrimaryState {
    pub active: bool,
    pub status: PlaybackStatus,
    pub volume: u8,
    pub track: TrackInfo,
    pub behavior: Behavior,
    pub calls: Vec<String>,
    /// Status queries answered, liveness included
    pub status_reads: usize,
}

pub struct FakePrimary {
    pub state: Mutex<PrimaryState>,
}

impl FakePrimary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PrimaryState {
                active: false,
                status: PlaybackStatus::Unknown,
                volume: 50,
                track: TrackInfo::default(),
                behavior: Behavior::Ok,
                calls: Vec::new(),
                status_reads: 0,
            }),
        })
    }

    pub fn set_session(&self, active: bool, status: PlaybackStatus) {
        let mut state = self.state.lock();
        state.active = active;
        state.status = status;
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        self.state.lock().behavior = behavior;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| c.as_str() == call).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn record(&self, call: impl Into<String>) -> Behavior {
        let mut state = self.state.lock();
        state.calls.push(call.into());
        state.behavior
    }

    fn read_status(&self) -> Behavior {
        let mut state = self.state.lock();
        state.status_reads += 1;
        state.behavior
    }
}

#[async_trait]
impl PrimarySource for FakePrimary {
    async fn volume(&self) -> Result<u8> {
        apply(self.record("volume")).await?;
        Ok(self.state.lock().volume)
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        apply(self.record(format!("set_volume {}", volume))).await?;
        self.state.lock().volume = volume;
        Ok(())
    }

    async fn transport(&self, command: TransportCommand) -> Result<()> {
        apply(self.record(format!("{:?}", command))).await
    }

    async fn track_info(&self) -> Result<TrackInfo> {
        apply(self.record("track_info")).await?;
        Ok(self.state.lock().track.clone())
    }

    async fn position(&self) -> Result<f64> {
        apply(self.record("position")).await?;
        Ok(self.state.lock().track.position_sec)
    }

    // Status queries are polled every tick; counted, not recorded

    async fn status(&self) -> Result<PlaybackStatus> {
        apply(self.read_status()).await?;
        Ok(self.state.lock().status)
    }

    async fn is_session_active(&self) -> Result<bool> {
        apply(self.read_status()).await?;
        Ok(self.state.lock().active)
    }

    async fn sample(&self) -> Result<PrimarySample> {
        apply(self.read_status()).await?;
        let state = self.state.lock();
        Ok(PrimarySample {
            active: state.active,
            status: state.status,
        })
    }

    async fn disconnect_session(&self) -> Result<()> {
        apply(self.record("disconnect_session")).await?;
        self.set_session(false, PlaybackStatus::Stopped);
        Ok(())
    }
}

// ===== Secondary source =====

#[derive(Debug, Default)]
pub struct SecondaryState {
    pub peers: Vec<PeerId>,
    pub discoverable: Option<bool>,
    pub pairable: Option<bool>,
    pub radio: Option<bool>,
    pub volume: Option<u8>,
    pub status: PlaybackStatus,
    pub track: TrackInfo,
    pub behavior: Behavior,
    pub calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeSecondary {
    pub state: Mutex<SecondaryState>,
}

impl FakeSecondary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connect(&self, address: &str) {
        self.state.lock().peers.push(PeerId::new(address));
    }

    pub fn drop_peer(&self, address: &str) {
        self.state.lock().peers.retain(|p| p.as_str() != address);
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.state.lock().peers.clone()
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        self.state.lock().behavior = behavior;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| c.as_str() == call).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn record(&self, call: impl Into<String>) -> Behavior {
        let mut state = self.state.lock();
        state.calls.push(call.into());
        state.behavior
    }
}

#[async_trait]
impl SecondarySource for FakeSecondary {
    async fn connected_peers(&self) -> Result<Vec<PeerId>> {
        let behavior = self.state.lock().behavior;
        apply(behavior).await?;
        Ok(self.peers())
    }

    async fn disconnect(&self, peer: &PeerId) -> Result<()> {
        apply(self.record(format!("disconnect {}", peer))).await?;
        self.state.lock().peers.retain(|p| p != peer);
        Ok(())
    }

    async fn set_discoverable(&self, on: bool) -> Result<()> {
        apply(self.record(format!("discoverable {}", on))).await?;
        self.state.lock().discoverable = Some(on);
        Ok(())
    }

    async fn set_pairable(&self, on: bool) -> Result<()> {
        apply(self.record(format!("pairable {}", on))).await?;
        self.state.lock().pairable = Some(on);
        Ok(())
    }

    async fn set_radio_power(&self, on: bool) -> Result<()> {
        apply(self.record(format!("radio {}", on))).await?;
        self.state.lock().radio = Some(on);
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        apply(self.record(format!("set_volume {}", volume))).await?;
        self.state.lock().volume = Some(volume);
        Ok(())
    }

    async fn transport(&self, command: TransportCommand) -> Result<()> {
        apply(self.record(format!("{:?}", command))).await
    }

    async fn track_info(&self) -> Result<TrackInfo> {
        let behavior = self.state.lock().behavior;
        apply(behavior).await?;
        Ok(self.state.lock().track.clone())
    }

    async fn status(&self) -> Result<PlaybackStatus> {
        let behavior = self.state.lock().behavior;
        apply(behavior).await?;
        Ok(self.state.lock().status)
    }
}

// ===== Mixer =====

#[derive(Default)]
pub struct FakeMixer {
    pub sent: Mutex<Vec<(i32, f32)>>,
}

impl FakeMixer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take(&self) -> Vec<(i32, f32)> {
        std::mem::take(&mut *self.sent.lock())
    }
}

#[async_trait]
impl Mixer for FakeMixer {
    async fn set_gain(&self, band_id: i32, value: f32) -> Result<()> {
        self.sent.lock().push((band_id, value));
        Ok(())
    }
}

// ===== Indicators =====

#[derive(Default)]
pub struct FakeIndicators {
    pub mute: Mutex<Vec<bool>>,
    pub volumes: Mutex<Vec<u8>>,
    pub pulses: Mutex<Vec<Duration>>,
}

impl FakeIndicators {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last_mute(&self) -> Option<bool> {
        self.mute.lock().last().copied()
    }

    pub fn pulse_count(&self) -> usize {
        self.pulses.lock().len()
    }

    pub fn clear(&self) {
        self.mute.lock().clear();
        self.volumes.lock().clear();
        self.pulses.lock().clear();
    }
}

#[async_trait]
impl Indicators for FakeIndicators {
    async fn set_amp_mute(&self, muted: bool) -> Result<()> {
        self.mute.lock().push(muted);
        Ok(())
    }

    async fn show_volume(&self, volume: u8) -> Result<()> {
        self.volumes.lock().push(volume);
        Ok(())
    }

    async fn pulse(&self, duration: Duration) -> Result<()> {
        self.pulses.lock().push(duration);
        Ok(())
    }
}

// ===== System tools =====

#[derive(Default)]
pub struct FakeSystem {
    pub calls: Mutex<Vec<String>>,
    pub networks: Mutex<Vec<WifiNetwork>>,
    pub ssid: Mutex<Option<String>>,
}

impl FakeSystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl SystemTools for FakeSystem {
    async fn play_sound(&self, path: &Path) -> Result<()> {
        self.record(format!("play_sound {}", path.display()));
        Ok(())
    }

    async fn start_primary_daemon(&self, initial_volume: u8) -> Result<()> {
        self.record(format!("start_primary_daemon {}", initial_volume));
        Ok(())
    }

    async fn set_hardware_volume(&self, percent: u8) -> Result<()> {
        self.record(format!("set_hardware_volume {}", percent));
        Ok(())
    }

    async fn scan_wifi(&self) -> Result<Vec<WifiNetwork>> {
        self.record("scan_wifi");
        Ok(self.networks.lock().clone())
    }

    async fn connect_wifi(&self, ssid: &str, _password: &str) -> Result<()> {
        self.record(format!("connect_wifi {}", ssid));
        Ok(())
    }

    async fn current_ssid(&self) -> Result<Option<String>> {
        Ok(self.ssid.lock().clone())
    }

    async fn start_hotspot(&self, ssid: &str) -> Result<()> {
        self.record(format!("start_hotspot {}", ssid));
        Ok(())
    }
}

/// Concrete handles to the fakes behind a [`Collaborators`] bundle
pub struct Fakes {
    pub primary: Arc<FakePrimary>,
    pub secondary: Arc<FakeSecondary>,
    pub mixer: Arc<FakeMixer>,
    pub indicators: Arc<FakeIndicators>,
    pub system: Arc<FakeSystem>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            primary: FakePrimary::new(),
            secondary: FakeSecondary::new(),
            mixer: FakeMixer::new(),
            indicators: FakeIndicators::new(),
            system: FakeSystem::new(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            primary: self.primary.clone(),
            secondary: self.secondary.clone(),
            mixer: self.mixer.clone(),
            indicators: self.indicators.clone(),
            system: self.system.clone(),
        }
    }
}
