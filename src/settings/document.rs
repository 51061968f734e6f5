//! Persisted settings document and the shipped EQ gain tables

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::state::{EqBand, EqPreset, Source};

/// Frequencies (Hz) covered by the bass presets
const BASS_FREQUENCIES: [&str; 7] = ["16", "25", "40", "63", "100", "160", "250"];
/// Frequencies (Hz) covered by the treble presets
const TREBLE_FREQUENCIES: [&str; 6] = ["1600", "2500", "4000", "6300", "10000", "16000"];
/// Normalized gain per preset magnitude 0..=6 (0.5 is flat)
const LEVEL_GAINS: [f64; 7] = [0.5, 0.51, 0.53, 0.54, 0.56, 0.57, 0.59];

/// Gain table for one preset magnitude: frequency key (Hz) -> normalized gain
pub type GainTable = BTreeMap<String, f64>;

/// Per-band gain tables indexed by preset magnitude
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EqTables(BTreeMap<String, BTreeMap<u8, GainTable>>);

impl EqTables {
    /// Gains for a band at a preset magnitude
    pub fn gains(&self, band: EqBand, level: u8) -> Option<&GainTable> {
        self.0.get(band.as_str()).and_then(|levels| levels.get(&level))
    }

    pub fn insert(&mut self, band: &str, level: u8, table: GainTable) {
        self.0.entry(band.to_string()).or_default().insert(level, table);
    }
}

impl Default for EqTables {
    fn default() -> Self {
        let mut tables = EqTables(BTreeMap::new());
        for (level, gain) in LEVEL_GAINS.iter().enumerate() {
            let level = level as u8;
            let bass = BASS_FREQUENCIES.iter().map(|f| (f.to_string(), *gain)).collect();
            let treble = TREBLE_FREQUENCIES.iter().map(|f| (f.to_string(), *gain)).collect();
            tables.insert("bass", level, bass);
            tables.insert("treble", level, treble);
        }
        tables
    }
}

/// Wi-Fi credentials remembered for the companion app
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiSettings {
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

impl WifiSettings {
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }
}

/// The persisted settings document
///
/// Unknown keys in an existing file are dropped on the next write; missing
/// keys take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub device_name: String,
    pub device_id: String,
    pub volume: u8,
    /// Play the confirmation chime on source switches
    pub sounds: bool,
    pub wifi: WifiSettings,
    pub eq_presets: EqTables,
    pub current_eq_bass: i8,
    pub current_eq_treble: i8,
    pub eq_enabled: bool,
    pub source: Source,
    pub master: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_name: "Speaker".to_string(),
            device_id: uuid::Uuid::new_v4().simple().to_string(),
            volume: 50,
            sounds: true,
            wifi: WifiSettings::default(),
            eq_presets: EqTables::default(),
            current_eq_bass: 0,
            current_eq_treble: 0,
            eq_enabled: true,
            source: Source::Primary,
            master: true,
        }
    }
}

impl Settings {
    /// Stored presets as a single value
    pub fn preset(&self) -> EqPreset {
        let mut preset = EqPreset::default();
        preset.set(EqBand::Bass, self.current_eq_bass);
        preset.set(EqBand::Treble, self.current_eq_treble);
        preset
    }

    /// Defaults that keep the device identity and network credentials
    pub fn reset_from(&self) -> Self {
        Self {
            device_id: self.device_id.clone(),
            wifi: self.wifi.clone(),
            ..Self::default()
        }
    }
}
