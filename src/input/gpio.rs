//! sysfs GPIO button poller

use anyhow::Result;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use super::{ButtonEvent, Edge};
use crate::config::ButtonsConfig;
use crate::drivers::sysfs_gpio::{Direction, SysfsPin};
use crate::state::ButtonId;

/// Bounce filter for one line
///
/// A new level is reported once the raw reading has held it for the whole
/// bounce interval.
#[derive(Debug, Clone, Copy)]
pub struct BounceFilter {
    stable: bool,
    candidate: bool,
    since: Instant,
}

impl BounceFilter {
    pub fn new(level: bool, now: Instant) -> Self {
        Self {
            stable: level,
            candidate: level,
            since: now,
        }
    }

    /// Feed one reading; returns the new stable level when it changes
    pub fn update(&mut self, raw: bool, now: Instant, bounce: Duration) -> Option<bool> {
        if raw != self.candidate {
            self.candidate = raw;
            self.since = now;
        }
        if self.candidate != self.stable && now.duration_since(self.since) >= bounce {
            self.stable = self.candidate;
            return Some(self.stable);
        }
        None
    }
}

/// Read failures of one line, so a dead line is reported once
#[derive(Debug, Default)]
struct ReadHealth {
    failing: bool,
}

impl ReadHealth {
    /// Record a read outcome; true when the line went bad or recovered
    fn record(&mut self, ok: bool) -> bool {
        let changed = self.failing == ok;
        self.failing = !ok;
        changed
    }
}

struct Line {
    button: ButtonId,
    pin: SysfsPin,
    filter: BounceFilter,
    health: ReadHealth,
}

/// Polls the three button lines and emits filtered edges
pub struct GpioButtons {
    lines: Vec<Line>,
    active_high: bool,
    bounce: Duration,
    poll: Duration,
}

impl GpioButtons {
    pub async fn open(config: &ButtonsConfig) -> Result<Self> {
        let pins = [
            (ButtonId::VolumeUp, config.volume_up_pin),
            (ButtonId::VolumeDown, config.volume_down_pin),
            (ButtonId::Play, config.play_pin),
        ];

        let now = Instant::now();
        let mut lines = Vec::with_capacity(pins.len());
        for (button, number) in pins {
            let pin = SysfsPin::open(&config.gpio_root, number, Direction::In).await?;
            let level = pin.read().await? == config.active_high;
            lines.push(Line {
                button,
                pin,
                filter: BounceFilter::new(level, now),
                health: ReadHealth::default(),
            });
        }

        info!(
            "🔘 Buttons on GPIO {} (up), {} (down), {} (play)",
            config.volume_up_pin, config.volume_down_pin, config.play_pin
        );
        Ok(Self {
            lines,
            active_high: config.active_high,
            bounce: Duration::from_millis(config.bounce_ms),
            poll: Duration::from_millis(config.poll_ms),
        })
    }

    /// Poll until shutdown or until the debouncer goes away
    pub async fn run(mut self, events: mpsc::Sender<ButtonEvent>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => return,
            }

            let now = Instant::now();
            for line in &mut self.lines {
                let raw = match line.pin.read().await {
                    Ok(raw) => {
                        if line.health.record(true) {
                            info!(button = %line.button, "GPIO {} readable again", line.pin.pin());
                        }
                        raw == self.active_high
                    }
                    Err(e) => {
                        if line.health.record(false) {
                            warn!("⚠️  {:#}", e);
                        }
                        continue;
                    }
                };
                let Some(pressed) = line.filter.update(raw, now, self.bounce) else {
                    continue;
                };
                let edge = if pressed { Edge::Pressed } else { Edge::Released };
                let event = ButtonEvent {
                    button: line.button,
                    edge,
                };
                if events.send(event).await.is_err() {
                    return;
                }
            }
        }
    }
}
