//! EQ translation: presets to per-frequency mixer gains

use thiserror::Error;
use tracing::{debug, error, info};

use super::Controller;
use crate::settings::EqTables;
use crate::state::{EqBand, EqPreset};

/// EQ frequency (Hz) to parameter id of the mixer's 16-band graphic EQ
pub const MIXER_EQ_BANDS: [(&str, i32); 16] = [
    ("16", 14),
    ("25", 18),
    ("40", 22),
    ("63", 26),
    ("100", 30),
    ("160", 34),
    ("250", 38),
    ("400", 42),
    ("630", 46),
    ("1000", 50),
    ("1600", 54),
    ("2500", 58),
    ("4000", 62),
    ("6300", 66),
    ("10000", 70),
    ("16000", 74),
];

/// Mixer parameter id for a frequency key
pub fn mixer_param(frequency: &str) -> Option<i32> {
    MIXER_EQ_BANDS
        .iter()
        .find(|(key, _)| *key == frequency)
        .map(|(_, param)| *param)
}

/// Configuration errors in the EQ gain tables
#[derive(Debug, Error, PartialEq)]
pub enum EqError {
    #[error("no gain table for {band} at level {level}")]
    MissingTable { band: EqBand, level: u8 },

    #[error("{band} table has unknown frequency '{key}'")]
    UnknownFrequency { band: EqBand, key: String },
}

/// Gains to transmit for `band` at `preset`
///
/// Negative presets use the table for `|preset|` with every gain inverted to
/// `1 - g`. The whole table is validated before anything is returned, so a
/// broken table transmits nothing.
pub fn translate_gains(tables: &EqTables, band: EqBand, preset: i8) -> Result<Vec<(i32, f32)>, EqError> {
    let level = preset.unsigned_abs();
    let table = tables
        .gains(band, level)
        .ok_or(EqError::MissingTable { band, level })?;

    table
        .iter()
        .map(|(key, gain)| {
            let param = mixer_param(key).ok_or_else(|| EqError::UnknownFrequency {
                band,
                key: key.clone(),
            })?;
            let value = if preset < 0 { (1.0 - gain) as f32 } else { *gain as f32 };
            Ok((param, value))
        })
        .collect()
}

impl Controller {
    /// Store and apply a preset for one band
    ///
    /// The preset is clamped to -6..=6 and persisted. With EQ disabled it is
    /// only stored; [`Controller::set_eq_enabled`] restores it later.
    pub async fn set_eq_gain(&self, band: EqBand, preset: i8) {
        let (stored, enabled) = {
            let mut st = self.state.lock();
            st.preset.set(band, preset);
            (st.preset.get(band), st.eq_enabled)
        };
        info!(%band, preset = stored, "🎚️  EQ preset");

        self.persist().await;
        if enabled {
            self.apply_eq_preset(band, stored).await;
        }
    }

    /// Transmit the gains for `band` at `preset` without touching state
    pub async fn apply_eq_preset(&self, band: EqBand, preset: i8) {
        let gains = match self.settings.get(|s| translate_gains(&s.eq_presets, band, preset)) {
            Ok(gains) => gains,
            Err(e) => {
                error!("EQ configuration error: {}", e);
                return;
            }
        };

        debug!(%band, preset, count = gains.len(), "Sending EQ gains");
        for (param, value) in gains {
            self.call("mixer set_gain", self.mixer.set_gain(param, value))
                .await;
        }
    }

    /// Switch the EQ on or off
    ///
    /// Off flattens both bands but keeps the stored presets; on re-applies
    /// them exactly.
    pub async fn set_eq_enabled(&self, on: bool) {
        self.state.lock().eq_enabled = on;
        info!(enabled = on, "🎚️  EQ");
        self.persist().await;
        self.reapply_eq().await;
    }

    /// Push the current EQ state to the mixer (boot, mixer restart)
    pub async fn reapply_eq(&self) {
        let (enabled, preset) = {
            let st = self.state.lock();
            (st.eq_enabled, st.preset)
        };
        let applied = if enabled { preset } else { EqPreset::default() };
        for &band in EqBand::all() {
            self.apply_eq_preset(band, applied.get(band)).await;
        }
    }
}
