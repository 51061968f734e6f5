//! Startup sequence

use tracing::info;

use super::Controller;
use crate::state::Source;

impl Controller {
    /// Bring the appliance into a known state before the loop starts
    ///
    /// The amplifier stays muted while the streaming daemon restarts at the
    /// stored volume, then the sink volume, EQ and volume are restored. With
    /// no Wi-Fi remembered and none connected a setup hotspot is opened.
    pub async fn boot(&self, hardware_volume: u8, hotspot_ssid: &str) {
        info!("🚀 Booting control core");

        self.call("amplifier mute", self.indicators.set_amp_mute(true))
            .await;
        self.call("hardware volume", self.system.set_hardware_volume(0))
            .await;
        self.call(
            "start primary daemon",
            self.system.start_primary_daemon(self.volume()),
        )
        .await;
        self.call(
            "hardware volume",
            self.system.set_hardware_volume(hardware_volume),
        )
        .await;

        if self.current_source() == Source::Secondary {
            self.call("secondary radio", self.secondary.set_radio_power(true))
                .await;
        }

        self.reapply_eq().await;
        self.sync_volume().await;

        let remembered = self.settings.get(|s| s.wifi.is_configured());
        if !remembered {
            let connected = self
                .call("current ssid", self.system.current_ssid())
                .await
                .flatten();
            if connected.is_none() {
                info!("📶 No Wi-Fi configured, opening hotspot '{}'", hotspot_ssid);
                self.call("hotspot", self.system.start_hotspot(hotspot_ssid))
                    .await;
            }
        }

        info!("✅ Control core ready");
    }
}
