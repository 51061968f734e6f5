//! Media actions routed to whichever source is current

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::Controller;
use crate::drivers::TransportCommand;
use crate::state::Source;

const SHORT_PULSE: Duration = Duration::from_millis(100);
const PULSE_GAP: Duration = Duration::from_millis(150);
const LONG_PULSE: Duration = Duration::from_secs(1);
const PAIRING_PULSES: usize = 5;
/// Settle time between pairing mode and the safety kick of the primary
const PAIRING_SETTLE: Duration = Duration::from_millis(500);

/// Actions a button gesture or the API can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaAction {
    PlayPause,
    Next,
    Prev,
    /// Drop the streaming client by restarting the daemon
    KickPrimary,
    /// Open the secondary source for a new peer
    PairingMode,
}

impl MediaAction {
    /// Resolve a multi-click count (1, 2, 3 or more presses)
    pub fn from_tap_count(taps: u32) -> Option<Self> {
        match taps {
            0 => None,
            1 => Some(MediaAction::PlayPause),
            2 => Some(MediaAction::Next),
            _ => Some(MediaAction::Prev),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaAction::PlayPause => "play_pause",
            MediaAction::Next => "next",
            MediaAction::Prev => "prev",
            MediaAction::KickPrimary => "kick_primary",
            MediaAction::PairingMode => "pairing_mode",
        }
    }

    fn transport(&self) -> Option<TransportCommand> {
        match self {
            MediaAction::PlayPause => Some(TransportCommand::PlayPause),
            MediaAction::Next => Some(TransportCommand::Next),
            MediaAction::Prev => Some(TransportCommand::Previous),
            MediaAction::KickPrimary | MediaAction::PairingMode => None,
        }
    }

    /// Main LED pulses acknowledging a transport action
    fn pulse_count(&self) -> usize {
        match self {
            MediaAction::PlayPause => 1,
            MediaAction::Next => 2,
            MediaAction::Prev => 3,
            MediaAction::KickPrimary | MediaAction::PairingMode => 0,
        }
    }
}

impl fmt::Display for MediaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "play_pause" => Ok(MediaAction::PlayPause),
            "next" => Ok(MediaAction::Next),
            "prev" => Ok(MediaAction::Prev),
            "kick_primary" => Ok(MediaAction::KickPrimary),
            "pairing_mode" => Ok(MediaAction::PairingMode),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

impl Controller {
    /// Run a media action to completion
    pub async fn media_action(&self, action: MediaAction) {
        info!(%action, "▶️  Media action");
        match action {
            MediaAction::KickPrimary => self.kick_primary().await,
            MediaAction::PairingMode => self.pairing_mode().await,
            _ => self.transport(action).await,
        }
    }

    /// Long press of the play button
    ///
    /// With the primary source current its client is dropped. Otherwise the
    /// secondary source is reopened for pairing, then the primary is kicked
    /// as well in case it was half-connected.
    pub async fn long_press(&self) {
        match self.current_source() {
            Source::Primary => self.media_action(MediaAction::KickPrimary).await,
            Source::Secondary => {
                self.media_action(MediaAction::PairingMode).await;
                tokio::time::sleep(PAIRING_SETTLE).await;
                self.media_action(MediaAction::KickPrimary).await;
            }
        }
    }

    async fn transport(&self, action: MediaAction) {
        let Some(command) = action.transport() else {
            return;
        };

        match self.current_source() {
            Source::Primary => {
                self.call("primary transport", self.primary.transport(command))
                    .await;
            }
            Source::Secondary => {
                self.call("secondary transport", self.secondary.transport(command))
                    .await;
            }
        }

        if action == MediaAction::PlayPause {
            // The mute policy follows the new playback status right away
            self.request_tick();
        }
        self.pulses(action.pulse_count(), SHORT_PULSE).await;
    }

    async fn kick_primary(&self) {
        self.pulses(2, SHORT_PULSE).await;
        info!("🔌 Disconnecting primary source client");
        self.call("primary disconnect", self.primary.disconnect_session())
            .await;
    }

    async fn pairing_mode(&self) {
        info!("📡 Entering pairing mode");
        self.pulse(LONG_PULSE).await;

        self.state.lock().secondary_owner = None;

        if let Some(peers) = self
            .call("secondary peers", self.secondary.connected_peers())
            .await
        {
            for peer in peers {
                self.call("secondary disconnect", self.secondary.disconnect(&peer))
                    .await;
            }
        }

        self.call("secondary radio", self.secondary.set_radio_power(true))
            .await;
        self.call("secondary discoverable", self.secondary.set_discoverable(true))
            .await;
        self.call("secondary pairable", self.secondary.set_pairable(true))
            .await;

        self.pulses(PAIRING_PULSES, SHORT_PULSE).await;
    }

    pub(crate) async fn pulse(&self, duration: Duration) {
        self.call("indicator pulse", self.indicators.pulse(duration))
            .await;
    }

    async fn pulses(&self, count: usize, duration: Duration) {
        for i in 0..count {
            if i > 0 {
                tokio::time::sleep(PULSE_GAP).await;
            }
            self.pulse(duration).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_counts_resolve() {
        assert_eq!(MediaAction::from_tap_count(0), None);
        assert_eq!(MediaAction::from_tap_count(1), Some(MediaAction::PlayPause));
        assert_eq!(MediaAction::from_tap_count(2), Some(MediaAction::Next));
        assert_eq!(MediaAction::from_tap_count(3), Some(MediaAction::Prev));
        assert_eq!(MediaAction::from_tap_count(9), Some(MediaAction::Prev));
    }

    #[test]
    fn test_action_names_round_trip() {
        for action in [
            MediaAction::PlayPause,
            MediaAction::Next,
            MediaAction::Prev,
            MediaAction::KickPrimary,
            MediaAction::PairingMode,
        ] {
            assert_eq!(action.as_str().parse::<MediaAction>(), Ok(action));
            assert_eq!(
                serde_json::to_value(action).unwrap(),
                serde_json::json!(action.as_str())
            );
        }
        assert!("pause".parse::<MediaAction>().is_err());
    }
}
