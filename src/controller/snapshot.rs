//! Read-only views for the network API

use serde::Serialize;

use super::Controller;
use crate::drivers::TrackInfo;
use crate::state::{PeerId, PlaybackStatus, Source};

/// Everything the companion app shows on its main screen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullState {
    pub volume: u8,
    pub mode: Source,
    pub status: PlaybackStatus,
    pub track: TrackInfo,
    pub eq_enabled: bool,
    pub secondary_owner: Option<PeerId>,
}

/// The fast-changing subset polled during playback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialState {
    pub volume: u8,
    pub status: PlaybackStatus,
    pub position: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EqState {
    pub bass: i8,
    pub treble: i8,
    pub eq_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub status: &'static str,
    pub name: String,
    pub id: String,
    pub master: bool,
}

impl Controller {
    pub async fn full_state(&self) -> FullState {
        self.sync_volume().await;

        let track = match self.current_source() {
            Source::Primary => self.call("primary track", self.primary.track_info()).await,
            Source::Secondary => {
                self.call("secondary track", self.secondary.track_info())
                    .await
            }
        };
        let status = self.current_status().await;

        let st = self.state.lock();
        FullState {
            volume: st.volume,
            mode: st.source,
            status,
            track: track.unwrap_or_default(),
            eq_enabled: st.eq_enabled,
            secondary_owner: st.secondary_owner.clone(),
        }
    }

    pub async fn partial_state(&self) -> PartialState {
        self.sync_volume().await;

        let position = match self.current_source() {
            Source::Primary => self.call("primary position", self.primary.position()).await,
            Source::Secondary => self
                .call("secondary track", self.secondary.track_info())
                .await
                .map(|track| track.position_sec),
        };
        let status = self.current_status().await;

        PartialState {
            volume: self.volume(),
            status,
            position: position.unwrap_or(0.0),
        }
    }

    pub fn eq_state(&self) -> EqState {
        let st = self.state.lock();
        EqState {
            bass: st.preset.bass,
            treble: st.preset.treble,
            eq_enabled: st.eq_enabled,
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.settings.get(|s| DeviceInfo {
            status: "online",
            name: s.device_name.clone(),
            id: s.device_id.clone(),
            master: s.master,
        })
    }
}
