//! Device identity, settings reset and Wi-Fi

use std::time::Duration;
use tracing::info;

use super::Controller;
use crate::drivers::WifiNetwork;
use crate::settings::{SettingsError, WifiSettings};

/// Scans take a few seconds on most adapters
const WIFI_SCAN_TIMEOUT: Duration = Duration::from_secs(20);
const WIFI_CONNECT_TIMEOUT: Duration = Duration::from_secs(45);

impl Controller {
    pub async fn rename_device(&self, name: &str) -> Result<(), SettingsError> {
        self.settings
            .update(|s| s.device_name = name.to_string())
            .await?;
        info!("🏷️  Device renamed to '{}'", name);
        Ok(())
    }

    /// Restore default settings and bring the running state in line
    ///
    /// Device identity and Wi-Fi credentials survive; the current source is
    /// left to the arbiter.
    pub async fn reset_settings(&self) -> Result<(), SettingsError> {
        let defaults = self.settings.reset_to_default().await?;
        {
            let mut st = self.state.lock();
            st.eq_enabled = defaults.eq_enabled;
            st.preset = defaults.preset();
        }
        self.set_volume(i32::from(defaults.volume), true).await;
        self.reapply_eq().await;
        Ok(())
    }

    pub async fn scan_wifi(&self) -> Vec<WifiNetwork> {
        self.call_within("wifi scan", WIFI_SCAN_TIMEOUT, self.system.scan_wifi())
            .await
            .unwrap_or_default()
    }

    /// Remember the credentials, then join the network
    pub async fn connect_wifi(&self, ssid: &str, password: &str) -> Result<(), SettingsError> {
        let wifi = WifiSettings {
            ssid: ssid.to_string(),
            password: password.to_string(),
        };
        self.settings.update(|s| s.wifi = wifi).await?;

        info!("📶 Joining Wi-Fi '{}'", ssid);
        self.call_within(
            "wifi connect",
            WIFI_CONNECT_TIMEOUT,
            self.system.connect_wifi(ssid, password),
        )
        .await;
        Ok(())
    }
}
