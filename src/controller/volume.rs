//! Volume translation

use tracing::debug;

use super::Controller;
use crate::state::{clamp_volume, PlaybackStatus, Source};

impl Controller {
    /// Set the logical volume to `target`, clamped to 0..=100
    ///
    /// With `immediate` the value is pushed to the current source; without it
    /// only state, settings and the volume bar follow (used when the value was
    /// read back from the source itself).
    pub async fn set_volume(&self, target: i32, immediate: bool) -> u8 {
        self.change_volume(|_| target, immediate).await
    }

    /// Step the volume by `delta`, clamped to 0..=100
    pub async fn adjust_volume(&self, delta: i32) -> u8 {
        self.change_volume(|current| i32::from(current).saturating_add(delta), true)
            .await
    }

    /// Pull the primary source's own volume into state
    ///
    /// Only while the primary source is current and holds a session; clients
    /// can change the volume from their side.
    pub async fn sync_volume(&self) {
        if self.current_source() != Source::Primary {
            return;
        }
        let active = self
            .call("primary session query", self.primary.is_session_active())
            .await
            .unwrap_or(false);
        if !active {
            return;
        }
        if let Some(volume) = self.call("primary volume query", self.primary.volume()).await {
            if volume != self.volume() {
                debug!(volume, "Synced volume from primary source");
                self.set_volume(i32::from(volume), false).await;
            }
        }
    }

    /// Read-modify-write of `volume` under one lock, then side effects
    async fn change_volume(&self, compute: impl FnOnce(u8) -> i32, push: bool) -> u8 {
        let (applied, source) = {
            let mut st = self.state.lock();
            st.volume = clamp_volume(compute(st.volume));
            (st.volume, st.source)
        };
        debug!(volume = applied, %source, "Volume");

        if push {
            match source {
                Source::Primary => {
                    self.call("primary set_volume", self.primary.set_volume(applied))
                        .await;
                }
                Source::Secondary => {
                    self.call("secondary set_volume", self.secondary.set_volume(applied))
                        .await;
                }
            }
        }

        self.persist().await;
        self.call("volume display", self.indicators.show_volume(applied))
            .await;
        applied
    }

    /// Playback status of whichever source is current
    pub(crate) async fn current_status(&self) -> PlaybackStatus {
        let status = match self.current_source() {
            Source::Primary => self.call("primary status", self.primary.status()).await,
            Source::Secondary => {
                self.call("secondary status", self.secondary.status())
                    .await
            }
        };
        status.unwrap_or_default()
    }
}
