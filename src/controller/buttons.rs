//! Button priority and multi-click bookkeeping kept in the shared state

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::Controller;
use crate::input::InputCommand;
use crate::state::{ButtonId, ScheduledTask, TaskId};

impl Controller {
    /// Claim volume priority unless another button holds it
    pub fn try_claim_button(&self, button: ButtonId) -> bool {
        let mut st = self.state.lock();
        match st.input.active_button {
            None => {
                st.input.active_button = Some(button);
                true
            }
            Some(active) => active == button,
        }
    }

    /// Take volume priority from whichever button holds it
    pub fn force_claim_button(&self, button: ButtonId) {
        let previous = self.state.lock().input.active_button.replace(button);
        if previous.is_some_and(|p| p != button) {
            debug!(%button, "Button took priority");
        }
    }

    pub fn is_active_button(&self, button: ButtonId) -> bool {
        self.state.lock().input.active_button == Some(button)
    }

    /// Give up priority if `button` still holds it
    pub fn release_button(&self, button: ButtonId) {
        let mut st = self.state.lock();
        if st.input.active_button == Some(button) {
            st.input.active_button = None;
        }
    }

    pub fn set_held(&self, button: ButtonId, held: bool) {
        self.state.lock().input.held.set(button, held);
    }

    /// Clear the "was held" marker, reporting whether it was set
    pub fn take_held(&self, button: ButtonId) -> bool {
        let mut st = self.state.lock();
        let held = st.input.held.get(button);
        st.input.held.set(button, false);
        held
    }

    /// Count a play press; the pending window is cancelled until release
    pub fn register_play_press(&self) -> u32 {
        let mut st = self.state.lock();
        st.input.tap_count += 1;
        st.input.combo_timer = None;
        st.input.tap_count
    }

    /// (Re)start the multi-click window
    ///
    /// When it closes, the accumulated count is consumed and sent as
    /// [`InputCommand::PlayTaps`].
    pub fn arm_combo_timer(self: &Arc<Self>, window: Duration, commands: mpsc::Sender<InputCommand>) {
        let controller = Arc::downgrade(self);
        let timer = ScheduledTask::spawn_after(window, move |id| async move {
            let Some(taps) = controller.upgrade().and_then(|c| c.take_taps(id)) else {
                return;
            };
            if commands.send(InputCommand::PlayTaps(taps)).await.is_err() {
                warn!("Input command channel closed, dropping {} taps", taps);
            }
        });

        // Replacing the slot cancels any previous window
        self.state.lock().input.combo_timer = Some(timer);
    }

    /// Drop accumulated taps and any pending window
    pub fn clear_taps(&self) {
        let mut st = self.state.lock();
        st.input.tap_count = 0;
        st.input.combo_timer = None;
    }

    pub fn tap_count(&self) -> u32 {
        self.state.lock().input.tap_count
    }

    pub fn combo_pending(&self) -> bool {
        self.combo_deadline().is_some()
    }

    /// When the open multi-click window closes
    pub fn combo_deadline(&self) -> Option<Instant> {
        self.state.lock().input.combo_deadline()
    }

    fn take_taps(&self, id: TaskId) -> Option<u32> {
        let mut st = self.state.lock();
        match st.input.combo_timer.take() {
            Some(timer) if timer.id() == id => {
                timer.detach();
                Some(std::mem::take(&mut st.input.tap_count))
            }
            other => {
                st.input.combo_timer = other;
                None
            }
        }
    }
}
