//! Single-peer admission on the secondary source

use tracing::info;

use super::Controller;
use crate::state::{PeerId, Source};

/// What one guard pass decided
#[derive(Debug, Default, PartialEq, Eq)]
struct Verdict {
    /// New discoverable/pairable setting, if it changes
    open: Option<bool>,
    evict: Vec<PeerId>,
}

impl Controller {
    /// Enforce the single-peer policy against the connected peers
    ///
    /// The first peer seen without an owner is admitted and the device goes
    /// invisible. A departed owner reopens the device. With an owner, every
    /// other peer is disconnected. Without one nobody is evicted this pass;
    /// the next pass admits deterministically.
    pub async fn enforce_admission(&self) {
        let Some(peers) = self
            .call("secondary peers", self.secondary.connected_peers())
            .await
        else {
            return;
        };

        let verdict = {
            let mut st = self.state.lock();
            if st.source != Source::Secondary {
                return;
            }
            let mut verdict = Verdict::default();

            match st.secondary_owner.clone() {
                None => {
                    if let Some(first) = peers.first() {
                        info!(peer = %first, "🔒 Secondary source admitted");
                        st.secondary_owner = Some(first.clone());
                        verdict.open = Some(false);
                    }
                }
                Some(owner) if !peers.contains(&owner) => {
                    info!(peer = %owner, "🔓 Secondary owner left, reopening");
                    st.secondary_owner = None;
                    verdict.open = Some(true);
                }
                Some(_) => {}
            }

            if let Some(owner) = &st.secondary_owner {
                verdict.evict = peers.iter().filter(|p| *p != owner).cloned().collect();
            }
            verdict
        };

        if let Some(open) = verdict.open {
            self.call("secondary discoverable", self.secondary.set_discoverable(open))
                .await;
            self.call("secondary pairable", self.secondary.set_pairable(open))
                .await;
        }

        for peer in &verdict.evict {
            info!(peer = %peer, "🚫 Evicting extra secondary peer");
            self.call("secondary disconnect", self.secondary.disconnect(peer))
                .await;
        }
    }
}
