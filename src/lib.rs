//! Control core of a networked speaker appliance
//!
//! The [`controller`] arbitrates between the local streaming daemon (primary
//! source) and Bluetooth (secondary source), admits a single Bluetooth peer,
//! and translates volume/EQ/transport commands from the buttons ([`input`])
//! and the companion app ([`api`]) into calls on the [`drivers`].

pub mod api;
pub mod config;
pub mod controller;
pub mod drivers;
pub mod input;
pub mod paths;
pub mod settings;
pub mod state;
