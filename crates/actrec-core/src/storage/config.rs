//! TOML-based application configuration.
//!
//! Stores recording preferences:
//! - Audio cue toggles and sound names
//! - Flip-to-finish gesture settings
//! - Distance tracking filters and signal-loss tolerance
//! - Session clock and proximity behaviour
//!
//! Configuration is stored at `~/.config/actrec/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::sensors::{FlipAxis, GestureSource};

/// Audio cue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuesConfig {
    #[serde(default = "default_true")]
    pub repetition_enabled: bool,
    #[serde(default = "default_repetition_sound")]
    pub repetition_sound: String,
    /// Also click when a repetition is taken back.
    #[serde(default)]
    pub decrease_enabled: bool,
    #[serde(default = "default_true")]
    pub finish_enabled: bool,
    #[serde(default = "default_finish_sound")]
    pub finish_sound: String,
}

/// Flip-to-finish configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureConfig {
    #[serde(default)]
    pub finish_on_flip: bool,
    #[serde(default)]
    pub source: GestureSource,
    #[serde(default)]
    pub axis: FlipAxis,
    #[serde(default = "default_grace_window_ms")]
    pub grace_window_ms: u64,
    /// Gravity component (m/s²) that counts as facing up or down.
    #[serde(default = "default_accel_threshold")]
    pub accel_threshold: f64,
    #[serde(default = "default_rotation_threshold_deg")]
    pub rotation_threshold_deg: f64,
}

/// Distance tracking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceConfig {
    #[serde(default = "default_signal_grace_ms")]
    pub signal_grace_ms: u64,
    #[serde(default = "default_max_plausible_speed_ms")]
    pub max_plausible_speed_ms: f64,
    /// Zero accepts fixes of any accuracy.
    #[serde(default = "default_max_fix_accuracy_m")]
    pub max_fix_accuracy_m: f64,
}

/// Live session behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Default cover-to-finish threshold for hosts that do not ask per
    /// session. Zero disables.
    #[serde(default)]
    pub finish_on_covering_ms: u64,
    #[serde(default = "default_true")]
    pub hide_on_proximity: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/actrec/config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cues: CuesConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub distance: DistanceConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_repetition_sound() -> String {
    "click".into()
}
fn default_finish_sound() -> String {
    "finish".into()
}
fn default_grace_window_ms() -> u64 {
    3_000
}
fn default_accel_threshold() -> f64 {
    7.0
}
fn default_rotation_threshold_deg() -> f64 {
    60.0
}
fn default_signal_grace_ms() -> u64 {
    10_000
}
fn default_max_plausible_speed_ms() -> f64 {
    100.0
}
fn default_max_fix_accuracy_m() -> f64 {
    100.0
}
fn default_tick_interval_ms() -> u64 {
    1_000
}

impl Default for CuesConfig {
    fn default() -> Self {
        Self {
            repetition_enabled: true,
            repetition_sound: default_repetition_sound(),
            decrease_enabled: false,
            finish_enabled: true,
            finish_sound: default_finish_sound(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            finish_on_flip: false,
            source: GestureSource::default(),
            axis: FlipAxis::default(),
            grace_window_ms: default_grace_window_ms(),
            accel_threshold: default_accel_threshold(),
            rotation_threshold_deg: default_rotation_threshold_deg(),
        }
    }
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            signal_grace_ms: default_signal_grace_ms(),
            max_plausible_speed_ms: default_max_plausible_speed_ms(),
            max_fix_accuracy_m: default_max_fix_accuracy_m(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            finish_on_covering_ms: 0,
            hide_on_proximity: true,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the
    /// field's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}
