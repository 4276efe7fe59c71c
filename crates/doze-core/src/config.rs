use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::gesture::GestureConfig;
use crate::sensor::{virtual_sensor::DEFAULT_MAXIMUM_RANGE, SensorPreference};

const SETTINGS_FILE: &str = "doze.toml";

/// Get the local data directory for doze.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("doze");
    Ok(path)
}

/// Default location of the settings file
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn settings_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(SETTINGS_FILE))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSection {
    pub handwave: bool,
    pub pocket: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSection {
    pub wakeup: bool,
    pub maximum_range: f32,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            wakeup: true,
            maximum_range: DEFAULT_MAXIMUM_RANGE,
        }
    }
}

/// Persisted doze settings
///
/// Both gestures start disabled, like unset system toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gestures: GestureSection,
    pub sensor: SensorSection,
}

impl Settings {
    /// Keys accepted by [`Settings::get`] and [`Settings::set`]
    pub const KEYS: [&'static str; 4] = [
        "gestures.handwave",
        "gestures.pocket",
        "sensor.wakeup",
        "sensor.maximum_range",
    ];

    /// Load settings from the default location, falling back to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load() -> Result<Self> {
        Self::load_from(&settings_path()?)
    }

    /// Load settings from `path`; a missing file yields defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(settings)
    }

    /// Save settings to the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save(&self) -> Result<()> {
        self.save_to(&settings_path()?)
    }

    /// Save settings to `path`, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        log::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    #[must_use]
    pub const fn gesture_config(&self) -> GestureConfig {
        GestureConfig::new(self.gestures.handwave, self.gestures.pocket)
    }

    #[must_use]
    pub const fn sensor_preference(&self) -> SensorPreference {
        SensorPreference {
            wakeup: self.sensor.wakeup,
            maximum_range: self.sensor.maximum_range,
        }
    }

    /// Read a value by dotted key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "gestures.handwave" => Some(self.gestures.handwave.to_string()),
            "gestures.pocket" => Some(self.gestures.pocket.to_string()),
            "sensor.wakeup" => Some(self.sensor.wakeup.to_string()),
            "sensor.maximum_range" => Some(self.sensor.maximum_range.to_string()),
            _ => None,
        }
    }

    /// Update a value by dotted key
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys or values of the wrong type
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "gestures.handwave" => self.gestures.handwave = parse_bool(key, value)?,
            "gestures.pocket" => self.gestures.pocket = parse_bool(key, value)?,
            "sensor.wakeup" => self.sensor.wakeup = parse_bool(key, value)?,
            "sensor.maximum_range" => {
                let range: f32 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} expects a number, got '{value}'"))?;
                if !range.is_finite() || range <= 0.0 {
                    bail!("{key} must be a positive number, got '{value}'");
                }
                self.sensor.maximum_range = range;
            }
            _ => bail!(
                "Unknown setting '{key}'. Valid keys: {}",
                Self::KEYS.join(", ")
            ),
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => bail!("{key} expects true or false, got '{value}'"),
    }
}
