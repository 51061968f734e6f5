//! The supervisory loop

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use super::{Controller, MediaAction};
use crate::input::InputCommand;
use crate::state::Source;

/// Feedback pulse for each ramp step
const STEP_PULSE: Duration = Duration::from_millis(20);

impl Controller {
    /// One supervisory pass
    ///
    /// Sample the primary source, arbitrate, apply the mute policy, update the
    /// idle timer, then guard admission while the secondary source is current.
    pub async fn tick(self: &Arc<Self>) {
        let sample = self.sample_primary().await;
        trace!(?sample, "Tick");

        self.arbitrate(sample).await;
        self.apply_mute_policy(sample).await;
        self.update_idle_timer(sample);

        if self.current_source() == Source::Secondary {
            self.enforce_admission().await;
        }
    }

    /// Execute a command resolved by the input debouncer
    pub async fn handle_input(self: &Arc<Self>, command: InputCommand) {
        debug!(?command, "Input");
        match command {
            InputCommand::SyncVolume => self.sync_volume().await,
            InputCommand::VolumeStep(delta) => {
                self.adjust_volume(delta).await;
                self.pulse(STEP_PULSE).await;
            }
            InputCommand::RampStep(button, delta) => {
                // Steps queued behind a slow device call go stale on release
                if !self.is_active_button(button) {
                    trace!(%button, "Ramp step dropped after release");
                    return;
                }
                self.adjust_volume(delta).await;
                self.pulse(STEP_PULSE).await;
            }
            InputCommand::PlayTaps(taps) => {
                if let Some(action) = MediaAction::from_tap_count(taps) {
                    let controller = Arc::clone(self);
                    tokio::spawn(async move { controller.media_action(action).await });
                }
            }
            InputCommand::LongPress => {
                let controller = Arc::clone(self);
                tokio::spawn(async move { controller.long_press().await });
            }
        }
    }

    /// Run until shutdown
    ///
    /// Ticks run on the configured cadence and on request. Input commands
    /// are handled in order on their own task so a slow tick never stalls a
    /// volume ramp.
    pub async fn run(
        self: Arc<Self>,
        mut commands: mpsc::Receiver<InputCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let input = {
            let controller = Arc::clone(&self);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        command = commands.recv() => match command {
                            Some(command) => controller.handle_input(command).await,
                            None => break,
                        },
                        _ = shutdown.changed() => break,
                    }
                }
            })
        };

        let mut interval = tokio::time::interval(self.timing.tick());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🔁 Supervisory loop running every {:?}", self.timing.tick());

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = self.wake.notified() => {
                    self.tick().await;
                    interval.reset();
                }
                _ = shutdown.changed() => {
                    info!("Supervisory loop stopping");
                    break;
                }
            }
        }

        input.abort();
    }
}
