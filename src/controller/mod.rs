//! The source arbitration and access control engine
//!
//! [`Controller`] owns the single [`ApplianceState`] and is the only way to
//! mutate it. Every operation follows the same discipline:
//!
//! 1. take the state lock, mutate, copy out what the side effects need,
//!    release the lock;
//! 2. persist the durable fields (volume, source, EQ) through the settings
//!    store and wait until they are on disk;
//! 3. call the collaborators, each call bounded by the configured timeout.
//!
//! Collaborator failures are logged and swallowed; no operation here ever
//! returns an error for them.
//!
//! Lock order is settings store, then appliance state. Nothing calls into the
//! settings store while holding the state lock.

mod admission;
mod arbiter;
mod boot;
mod buttons;
mod device;
mod eq;
mod media;
mod snapshot;
mod supervisor;
mod volume;

#[cfg(test)]
mod tests;

pub use arbiter::{PrimarySample, Transition};
pub use eq::{mixer_param, translate_gains, EqError, MIXER_EQ_BANDS};
pub use media::MediaAction;
pub use snapshot::{DeviceInfo, EqState, FullState, PartialState};

use parking_lot::Mutex;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;

use crate::config::{AppConfig, TimingConfig};
use crate::drivers::{Collaborators, Indicators, Mixer, PrimarySource, SecondarySource, SystemTools};
use crate::settings::SettingsStore;
use crate::state::{ApplianceState, EqPreset, PeerId, Source};

/// The control core shared by the supervisory loop, button tasks and API handlers
pub struct Controller {
    state: Mutex<ApplianceState>,
    settings: SettingsStore,
    primary: Arc<dyn PrimarySource>,
    secondary: Arc<dyn SecondarySource>,
    mixer: Arc<dyn Mixer>,
    indicators: Arc<dyn Indicators>,
    system: Arc<dyn SystemTools>,
    timing: TimingConfig,
    chime: Option<PathBuf>,
    /// Wakes the supervisory loop for an out-of-cadence tick
    wake: Notify,
}

impl Controller {
    /// Build the controller from persisted settings
    pub fn new(settings: SettingsStore, collaborators: Collaborators, config: &AppConfig) -> Arc<Self> {
        let persisted = settings.get_all();
        let state = ApplianceState::new(
            persisted.volume,
            persisted.source,
            persisted.eq_enabled,
            persisted.preset(),
        );

        Arc::new(Self {
            state: Mutex::new(state),
            settings,
            primary: collaborators.primary,
            secondary: collaborators.secondary,
            mixer: collaborators.mixer,
            indicators: collaborators.indicators,
            system: collaborators.system,
            timing: config.timing.clone(),
            chime: config.audio.chime.clone(),
            wake: Notify::new(),
        })
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn system(&self) -> &Arc<dyn SystemTools> {
        &self.system
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    // ===== Read accessors =====

    pub fn volume(&self) -> u8 {
        self.state.lock().volume
    }

    pub fn current_source(&self) -> Source {
        self.state.lock().source
    }

    pub fn secondary_owner(&self) -> Option<PeerId> {
        self.state.lock().secondary_owner.clone()
    }

    pub fn eq_enabled(&self) -> bool {
        self.state.lock().eq_enabled
    }

    pub fn eq_preset(&self) -> EqPreset {
        self.state.lock().preset
    }

    pub fn idle_disconnect_armed(&self) -> bool {
        self.idle_disconnect_deadline().is_some()
    }

    /// When the paused primary session gets dropped, if the timer is armed
    pub fn idle_disconnect_deadline(&self) -> Option<Instant> {
        self.state.lock().idle_disconnect_deadline()
    }

    /// Ask the supervisory loop to run a tick now
    pub fn request_tick(&self) {
        self.wake.notify_one();
    }

    // ===== Internals =====

    /// Run a collaborator call under the configured timeout
    ///
    /// Failures and timeouts are logged and yield `None`.
    pub(crate) async fn call<T>(
        &self,
        what: &str,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> Option<T> {
        self.call_within(what, self.timing.collaborator_timeout(), fut)
            .await
    }

    pub(crate) async fn call_within<T>(
        &self,
        what: &str,
        limit: Duration,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> Option<T> {
        match tokio::time::timeout(limit, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("⚠️  {} failed: {:#}", what, e);
                None
            }
            Err(_) => {
                warn!("⚠️  {} timed out after {:?}", what, limit);
                None
            }
        }
    }

    /// Write the durable fields of the current state to the settings file
    pub(crate) async fn persist(&self) {
        let result = self
            .settings
            .update(|s| {
                let st = self.state.lock();
                s.volume = st.volume;
                s.source = st.source;
                s.eq_enabled = st.eq_enabled;
                s.current_eq_bass = st.preset.bass;
                s.current_eq_treble = st.preset.treble;
            })
            .await;

        if let Err(e) = result {
            warn!("Failed to persist settings: {}", e);
        }
    }
}
