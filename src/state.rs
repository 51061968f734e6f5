//! Shared appliance state
//!
//! This module defines the single in-process record that every execution
//! context (supervisory loop, button tasks, API handlers, timers) reads and
//! mutates through the [`Controller`](crate::controller::Controller). Nothing
//! outside the controller holds a reference to it directly.

mod task;
mod types;

pub use task::{ScheduledTask, TaskId};
pub use types::{
    clamp_volume, ApplianceState, ButtonId, EqBand, EqPreset, HeldFlags, InputCombo,
    PlaybackStatus, PeerId, Source, PRESET_MAX, PRESET_MIN,
};
