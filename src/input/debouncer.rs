//! Button gesture state machines
//!
//! Each button gets its own lane task fed with that button's edges.
//!
//! Volume buttons: `Idle -> Pressed -> {Tap, HeldRepeating}`. A release
//! before the hold threshold is a tap (one step), honored only if the button
//! still holds priority. Past the threshold the button takes priority and
//! steps on every ramp interval while it keeps it. The release after a hold
//! is swallowed.
//!
//! Play button: presses accumulate into a multi-click count resolved when
//! the window after the last release closes. Holding past the long-press
//! threshold discards the count and reports a long press instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{ButtonEvent, Edge, InputCommand};
use crate::config::TimingConfig;
use crate::controller::Controller;
use crate::state::ButtonId;

const LANE_CAPACITY: usize = 16;

pub struct Debouncer {
    controller: Arc<Controller>,
    commands: mpsc::Sender<InputCommand>,
    hold: Duration,
    ramp: Duration,
    multi_click: Duration,
    play_hold: Duration,
    step: i32,
}

impl Debouncer {
    pub fn new(
        controller: Arc<Controller>,
        commands: mpsc::Sender<InputCommand>,
        timing: &TimingConfig,
    ) -> Self {
        Self {
            controller,
            commands,
            hold: timing.hold(),
            ramp: timing.ramp(),
            multi_click: timing.multi_click(),
            play_hold: timing.play_hold(),
            step: i32::from(timing.volume_step),
        }
    }

    /// Route raw edges to the per-button lanes until the event stream ends
    pub async fn run(self, mut events: mpsc::Receiver<ButtonEvent>) {
        let this = Arc::new(self);
        let mut lanes = HashMap::new();
        let mut tasks = Vec::new();

        for &button in ButtonId::all() {
            let (tx, rx) = mpsc::channel(LANE_CAPACITY);
            let lane = Arc::clone(&this);
            let task = match button {
                ButtonId::Play => tokio::spawn(lane.play_lane(rx)),
                _ => tokio::spawn(lane.volume_lane(button, rx)),
            };
            lanes.insert(button, tx);
            tasks.push(task);
        }
        info!("🎛️  Button debouncer running");

        while let Some(event) = events.recv().await {
            debug!(button = %event.button, edge = ?event.edge, "Button edge");
            let Some(lane) = lanes.get(&event.button) else {
                continue;
            };
            if lane.send(event.edge).await.is_err() {
                warn!(button = %event.button, "Button lane stopped");
            }
        }

        drop(lanes);
        for task in tasks {
            let _ = task.await;
        }
        debug!("Button debouncer stopped");
    }

    async fn volume_lane(self: Arc<Self>, button: ButtonId, mut edges: mpsc::Receiver<Edge>) {
        let delta = match button {
            ButtonId::VolumeDown => -self.step,
            _ => self.step,
        };

        while wait_press(&mut edges).await {
            let claimed = self.controller.try_claim_button(button);

            // Pressed
            let hold = tokio::time::sleep(self.hold);
            tokio::pin!(hold);
            let tapped = tokio::select! {
                open = wait_release(&mut edges) => Some(open),
                _ = &mut hold => None,
            };

            if let Some(open) = tapped {
                if claimed && self.controller.is_active_button(button) {
                    self.send(InputCommand::SyncVolume).await;
                    self.send(InputCommand::VolumeStep(delta)).await;
                } else {
                    debug!(%button, "Tap dropped, another button has priority");
                }
                self.controller.release_button(button);
                if !open {
                    return;
                }
                continue;
            }

            // HeldRepeating
            self.controller.force_claim_button(button);
            self.controller.set_held(button, true);
            self.send(InputCommand::SyncVolume).await;

            let mut ramp = tokio::time::interval(self.ramp);
            ramp.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let open = loop {
                tokio::select! {
                    open = wait_release(&mut edges) => break open,
                    _ = ramp.tick() => {
                        if self.controller.is_active_button(button) {
                            self.send(InputCommand::RampStep(button, delta)).await;
                        }
                    }
                }
            };

            if self.controller.take_held(button) {
                debug!(%button, "Release after hold swallowed");
            }
            self.controller.release_button(button);
            if !open {
                return;
            }
        }
    }

    async fn play_lane(self: Arc<Self>, mut edges: mpsc::Receiver<Edge>) {
        while wait_press(&mut edges).await {
            let taps = self.controller.register_play_press();
            debug!(taps, "Play press");

            let hold = tokio::time::sleep(self.play_hold);
            tokio::pin!(hold);
            let open = tokio::select! {
                open = wait_release(&mut edges) => {
                    self.controller.arm_combo_timer(self.multi_click, self.commands.clone());
                    open
                }
                _ = &mut hold => {
                    self.controller.clear_taps();
                    self.send(InputCommand::LongPress).await;
                    wait_release(&mut edges).await
                }
            };

            if !open {
                return;
            }
        }
    }

    async fn send(&self, command: InputCommand) {
        if self.commands.send(command).await.is_err() {
            warn!(?command, "Input command channel closed");
        }
    }
}

/// Wait for the next press; false once the lane is closed
async fn wait_press(edges: &mut mpsc::Receiver<Edge>) -> bool {
    wait_for(edges, Edge::Pressed).await
}

/// Wait for the next release; false once the lane is closed
async fn wait_release(edges: &mut mpsc::Receiver<Edge>) -> bool {
    wait_for(edges, Edge::Released).await
}

async fn wait_for(edges: &mut mpsc::Receiver<Edge>, wanted: Edge) -> bool {
    while let Some(edge) = edges.recv().await {
        if edge == wanted {
            return true;
        }
    }
    false
}
