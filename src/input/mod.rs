//! Physical button input
//!
//! Backends ([`gpio`], [`console`]) produce raw [`ButtonEvent`] edges. The
//! [`debouncer`] turns them into [`InputCommand`]s for the supervisory loop,
//! resolving taps, holds, ramps, multi-clicks and button priority.

pub mod console;
pub mod debouncer;
pub mod gpio;

pub use debouncer::Debouncer;

use crate::state::ButtonId;

/// Edge reported by an input backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Pressed,
    Released,
}

/// A raw, already bounce-filtered, button edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: ButtonId,
    pub edge: Edge,
}

impl ButtonEvent {
    pub fn pressed(button: ButtonId) -> Self {
        Self {
            button,
            edge: Edge::Pressed,
        }
    }

    pub fn released(button: ButtonId) -> Self {
        Self {
            button,
            edge: Edge::Released,
        }
    }
}

/// Commands resolved from button gestures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    /// Pull the source's volume before stepping it
    SyncVolume,
    /// Relative volume change in percent
    VolumeStep(i32),
    /// One step of a held button's ramp; stale once the button lets go
    RampStep(ButtonId, i32),
    /// Multi-click window closed with this many presses
    PlayTaps(u32),
    /// Play held past the long-press threshold
    LongPress,
}
