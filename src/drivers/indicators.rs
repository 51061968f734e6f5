//! LED and amplifier-mute rendering
//!
//! Two backends: [`GpioIndicators`] drives the real lines through sysfs,
//! [`LogIndicators`] only traces what would be shown (bench use).

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::sysfs_gpio::{Direction, SysfsPin};
use super::Indicators;
use crate::config::IndicatorsConfig;
use crate::state::ScheduledTask;

/// Which volume-bar segments are lit for `volume` over `segments` LEDs
///
/// A partially covered segment counts as lit.
pub fn volume_segments(volume: u8, segments: usize) -> Vec<bool> {
    let fraction = f64::from(volume.min(100)) / 100.0;
    (0..segments)
        .map(|i| fraction > i as f64 / segments as f64)
        .collect()
}

/// Indicators on sysfs GPIO lines
pub struct GpioIndicators {
    volume_leds: Arc<Vec<SysfsPin>>,
    main_led: SysfsPin,
    mute: SysfsPin,
    mute_active_high: bool,
    led_timeout: Duration,
    /// Last level written to the mute line
    muted: Mutex<Option<bool>>,
    /// Auto-off for the volume bar
    fade: Mutex<Option<ScheduledTask>>,
}

impl GpioIndicators {
    pub async fn open(config: &IndicatorsConfig, led_timeout: Duration) -> Result<Self> {
        let root = &config.gpio_root;
        let mut volume_leds = Vec::with_capacity(config.volume_led_pins.len());
        for pin in &config.volume_led_pins {
            volume_leds.push(SysfsPin::open(root, *pin, Direction::Out).await?);
        }
        let main_led = SysfsPin::open(root, config.main_led_pin, Direction::Out).await?;
        let mute = SysfsPin::open(root, config.mute_pin, Direction::Out).await?;

        Ok(Self {
            volume_leds: Arc::new(volume_leds),
            main_led,
            mute,
            mute_active_high: config.mute_active_high,
            led_timeout,
            muted: Mutex::new(None),
            fade: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Indicators for GpioIndicators {
    async fn set_amp_mute(&self, muted: bool) -> Result<()> {
        if *self.muted.lock() == Some(muted) {
            return Ok(());
        }
        self.mute.write(muted == self.mute_active_high).await?;
        *self.muted.lock() = Some(muted);
        info!("🔈 Amp {}", if muted { "MUTED" } else { "LIVE" });
        Ok(())
    }

    async fn show_volume(&self, volume: u8) -> Result<()> {
        let lit = volume_segments(volume, self.volume_leds.len());
        for (led, on) in self.volume_leds.iter().zip(lit) {
            led.write(on).await?;
        }

        let leds = Arc::clone(&self.volume_leds);
        let fade = ScheduledTask::spawn_after(self.led_timeout, move |_| async move {
            for led in leds.iter() {
                if let Err(e) = led.write(false).await {
                    warn!("Failed to turn off volume LED: {:#}", e);
                }
            }
        });
        // Replacing the slot cancels the previous auto-off
        *self.fade.lock() = Some(fade);
        Ok(())
    }

    async fn pulse(&self, duration: Duration) -> Result<()> {
        self.main_led.write(true).await?;
        tokio::time::sleep(duration).await;
        self.main_led.write(false).await
    }
}

/// Indicators that only log (no LED hardware)
#[derive(Default)]
pub struct LogIndicators {
    muted: Mutex<Option<bool>>,
}

impl LogIndicators {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Indicators for LogIndicators {
    async fn set_amp_mute(&self, muted: bool) -> Result<()> {
        let mut last = self.muted.lock();
        if *last != Some(muted) {
            info!("🔈 Amp {}", if muted { "MUTED" } else { "LIVE" });
            *last = Some(muted);
        }
        Ok(())
    }

    async fn show_volume(&self, volume: u8) -> Result<()> {
        let bar: String = volume_segments(volume, 4)
            .into_iter()
            .map(|on| if on { '#' } else { '.' })
            .collect();
        debug!("Volume [{}] {}%", bar, volume);
        Ok(())
    }

    async fn pulse(&self, duration: Duration) -> Result<()> {
        trace!("Pulse {:?}", duration);
        tokio::time::sleep(duration).await;
        Ok(())
    }
}
