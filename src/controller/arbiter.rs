//! Source arbitration, mute policy and idle disconnect

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{Controller, MediaAction};
pub use crate::drivers::PrimarySample;
use crate::state::{PlaybackStatus, ScheduledTask, Source, TaskId};

const TRANSITION_PULSE: Duration = Duration::from_secs(1);

/// A change of the current source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    ToPrimary,
    ToSecondary,
}

impl Controller {
    /// Query session liveness and playback status in one reading
    ///
    /// A failed liveness query counts as no session.
    pub async fn sample_primary(&self) -> PrimarySample {
        self.call("primary session query", self.primary.sample())
            .await
            .unwrap_or(PrimarySample::OFFLINE)
    }

    /// Switch sources if the sample calls for it
    ///
    /// The primary source always wins: an active session takes over from the
    /// secondary source immediately.
    pub async fn arbitrate(&self, sample: PrimarySample) -> Option<Transition> {
        let transition = {
            let mut st = self.state.lock();
            match (st.source, sample.active) {
                (Source::Secondary, true) => {
                    st.source = Source::Primary;
                    Some(Transition::ToPrimary)
                }
                (Source::Primary, false) => {
                    st.source = Source::Secondary;
                    st.secondary_owner = None;
                    Some(Transition::ToSecondary)
                }
                _ => None,
            }
        };

        let transition = transition?;
        self.persist().await;

        match transition {
            Transition::ToPrimary => {
                info!(source = ?Source::Primary, "🔀 Primary source connected, taking over");
                self.call("secondary radio", self.secondary.set_radio_power(false))
                    .await;
                self.play_chime().await;
            }
            Transition::ToSecondary => {
                info!(source = ?Source::Secondary, "🔀 Primary source gone, secondary source open");
                self.call("secondary radio", self.secondary.set_radio_power(true))
                    .await;
                self.call("secondary discoverable", self.secondary.set_discoverable(true))
                    .await;
                self.call("secondary pairable", self.secondary.set_pairable(true))
                    .await;
            }
        }
        self.pulse(TRANSITION_PULSE).await;

        Some(transition)
    }

    /// Drive the amplifier mute line from the current playback status
    ///
    /// Primary: muted unless playing. Secondary: follows the reported status,
    /// and when the stack reports none, unmuted only while a peer is admitted.
    pub async fn apply_mute_policy(&self, sample: PrimarySample) -> bool {
        let (source, admitted) = {
            let st = self.state.lock();
            (st.source, st.secondary_owner.is_some())
        };

        let muted = match source {
            Source::Primary => sample.status != PlaybackStatus::Playing,
            Source::Secondary => {
                let status = self
                    .call("secondary status", self.secondary.status())
                    .await
                    .unwrap_or_default();
                match status {
                    PlaybackStatus::Playing => false,
                    PlaybackStatus::Paused | PlaybackStatus::Stopped => true,
                    PlaybackStatus::Unknown => !admitted,
                }
            }
        };

        self.call("amplifier mute", self.indicators.set_amp_mute(muted))
            .await;
        muted
    }

    /// Arm or cancel the idle-disconnect timer
    ///
    /// Armed once while the primary session sits paused; any other reading
    /// cancels it.
    pub fn update_idle_timer(self: &Arc<Self>, sample: PrimarySample) {
        let paused = sample.active && sample.status == PlaybackStatus::Paused;
        let delay = self.timing.idle_disconnect();

        let mut st = self.state.lock();
        if st.source == Source::Primary && paused {
            if st.idle_disconnect.is_none() {
                let controller = Arc::downgrade(self);
                st.idle_disconnect = Some(ScheduledTask::spawn_after(delay, move |id| async move {
                    if let Some(controller) = controller.upgrade() {
                        controller.idle_expired(id).await;
                    }
                }));
                info!("⏸️  Primary paused, disconnecting in {:?} unless resumed", delay);
            }
        } else if let Some(timer) = st.idle_disconnect.take() {
            timer.cancel();
            debug!("Idle disconnect cancelled");
        }
    }

    async fn idle_expired(&self, id: TaskId) {
        let fired = {
            let mut st = self.state.lock();
            match st.idle_disconnect.take() {
                Some(timer) if timer.id() == id => {
                    timer.detach();
                    true
                }
                other => {
                    st.idle_disconnect = other;
                    false
                }
            }
        };

        if fired {
            info!("⏹️  Primary idle too long");
            self.media_action(MediaAction::KickPrimary).await;
        }
    }

    async fn play_chime(&self) {
        let Some(chime) = self.chime.as_deref() else {
            return;
        };
        if self.settings.get(|s| s.sounds) {
            self.call("chime", self.system.play_sound(chime)).await;
        }
    }
}
