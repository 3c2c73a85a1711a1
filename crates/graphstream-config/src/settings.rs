// SPDX-License-Identifier: Apache-2.0
//! The concrete settings value loaded through [`crate::config::ConfigStore`]
//! at startup and hot-reloaded one field at a time via the `settings_update`
//! control message (`spec.md` §6.3).

use graphstream_kernel::{KernelError, KernelParams};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session/transport limits recognised under `spec.md` §6.4.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionLimits {
    /// Messages permitted per `message_time_window_ms`. Default 60.
    pub message_rate_limit: u32,
    /// Rate-limit window, milliseconds. Default 1000.
    pub message_time_window_ms: u64,
    /// Maximum accepted inbound message size, bytes.
    pub max_message_size: usize,
    /// Bound on the per-session outbound queue, items. Default ≥ 100.
    pub max_queue_size: usize,
    /// Maximum reconnect attempts before the client gives up (unless the
    /// previous state was `READY`, which resets the counter on success).
    pub max_retries: u32,
    /// Initial reconnect backoff, milliseconds, before doubling.
    pub retry_delay_ms: u64,
    /// Frames at or below this size are sent uncompressed.
    pub compression_threshold: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            message_rate_limit: 60,
            message_time_window_ms: 1000,
            max_message_size: 1 << 20,
            max_queue_size: 100,
            max_retries: 5,
            retry_delay_ms: 1000,
            compression_threshold: graphstream_proto::DEFAULT_COMPRESSION_THRESHOLD,
        }
    }
}

/// Simulation-loop settings recognised under `spec.md` §6.4, distinct from
/// the per-pair physics constants carried in [`KernelParams`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Snapshot emission rate, Hz. Range 1-120, default 60.
    pub update_rate_hz: f32,
    /// Sphere radius new positions are drawn within on randomization.
    pub randomize_radius: f32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            update_rate_hz: 60.0,
            randomize_radius: 5.0,
        }
    }
}

/// Failure validating or applying a settings change. The previous value is
/// always retained by the caller on error, per `spec.md` §7's
/// `ValidationFailed`.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum SettingsError {
    /// `category` is not one of `"physics"`, `"session"`, or `"simulation"`.
    #[error("unknown settings category {category:?}")]
    UnknownCategory {
        /// The offending category string.
        category: String,
    },
    /// `setting` is not a recognised field of its category.
    #[error("unknown setting {setting:?} in category {category:?}")]
    UnknownSetting {
        /// The category the lookup was scoped to.
        category: String,
        /// The offending field name.
        setting: String,
    },
    /// `value` could not be deserialized into the target field's type.
    #[error("value for {category}.{setting} does not match the expected type")]
    TypeMismatch {
        /// The category the lookup was scoped to.
        category: String,
        /// The field name whose type didn't match.
        setting: String,
    },
    /// The deserialized value violates the field's documented range.
    #[error(transparent)]
    Kernel(#[from] KernelError),
    /// A session/simulation field fell outside its documented range.
    #[error("parameter {parameter} = {value} is outside the valid range [{min}, {max}]")]
    OutOfRange {
        /// Name of the offending field.
        parameter: &'static str,
        /// The rejected value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
}

/// Every recognised configuration knob, grouped exactly as `spec.md` §6.4
/// groups them: physics, session/transport, and simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineSettings {
    /// Force-directed kernel parameters (`spec.md` §4.4).
    pub physics: KernelParams,
    /// Session/transport limits (`spec.md` §6.4).
    pub session: SessionLimits,
    /// Simulation-loop settings (`spec.md` §6.4).
    pub simulation: SimulationSettings,
}

impl EngineSettings {
    /// Validates every field. `physics` delegates to
    /// [`KernelParams::validate`]; `session`/`simulation` fields are
    /// checked against the ranges named in `spec.md` §4.5/§6.4.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.physics.validate()?;
        check_range(
            "update_rate_hz",
            f64::from(self.simulation.update_rate_hz),
            1.0,
            120.0,
        )?;
        if self.session.message_rate_limit == 0 {
            return Err(SettingsError::OutOfRange {
                parameter: "message_rate_limit",
                value: 0.0,
                min: 1.0,
                max: f64::from(u32::MAX),
            });
        }
        if self.session.max_queue_size == 0 {
            return Err(SettingsError::OutOfRange {
                parameter: "max_queue_size",
                value: 0.0,
                min: 1.0,
                max: usize::MAX as f64,
            });
        }
        Ok(())
    }

    /// Applies a single `{category, setting, value}` change (the payload
    /// shape of both `settings` and `settings_update`, `spec.md` §6.3),
    /// validating the resulting value before committing it. On any error
    /// `self` is left unmodified.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if `category`/`setting` are unrecognised,
    /// `value` doesn't deserialize to the field's type, or the new value
    /// falls outside its documented range.
    pub fn apply_update(
        &mut self,
        category: &str,
        setting: &str,
        value: &Value,
    ) -> Result<(), SettingsError> {
        let mut candidate = *self;
        match category {
            "physics" => candidate.physics = apply_physics_field(&candidate.physics, setting, value)?,
            "session" => {
                candidate.session = apply_session_field(&candidate.session, setting, value)?;
            }
            "simulation" => {
                candidate.simulation = apply_simulation_field(&candidate.simulation, setting, value)?;
            }
            other => {
                return Err(SettingsError::UnknownCategory {
                    category: other.to_owned(),
                })
            }
        }
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }
}

fn check_range(parameter: &'static str, value: f64, min: f64, max: f64) -> Result<(), SettingsError> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            parameter,
            value,
            min,
            max,
        })
    }
}

fn as_f32(category: &str, setting: &str, value: &Value) -> Result<f32, SettingsError> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| SettingsError::TypeMismatch {
            category: category.to_owned(),
            setting: setting.to_owned(),
        })
}

fn apply_physics_field(
    current: &KernelParams,
    setting: &str,
    value: &Value,
) -> Result<KernelParams, SettingsError> {
    let mut next = *current;
    let v = as_f32("physics", setting, value)?;
    match setting {
        "attraction" => next.attraction = v,
        "repulsion" => next.repulsion = v,
        "spring" => next.spring = v,
        "damping" => next.damping = v,
        "max_velocity" => next.max_velocity = v,
        "collision_radius" => next.collision_radius = v,
        "bounds_size" => next.bounds_size = v,
        "iterations" => next.iterations = v as u32,
        other => {
            return Err(SettingsError::UnknownSetting {
                category: "physics".into(),
                setting: other.to_owned(),
            })
        }
    }
    next.validate()?;
    Ok(next)
}

fn apply_session_field(
    current: &SessionLimits,
    setting: &str,
    value: &Value,
) -> Result<SessionLimits, SettingsError> {
    let mut next = *current;
    let type_err = || SettingsError::TypeMismatch {
        category: "session".into(),
        setting: setting.to_owned(),
    };
    match setting {
        "message_rate_limit" => next.message_rate_limit = value.as_u64().ok_or_else(type_err)? as u32,
        "message_time_window_ms" => next.message_time_window_ms = value.as_u64().ok_or_else(type_err)?,
        "max_message_size" => next.max_message_size = value.as_u64().ok_or_else(type_err)? as usize,
        "max_queue_size" => next.max_queue_size = value.as_u64().ok_or_else(type_err)? as usize,
        "max_retries" => next.max_retries = value.as_u64().ok_or_else(type_err)? as u32,
        "retry_delay_ms" => next.retry_delay_ms = value.as_u64().ok_or_else(type_err)?,
        "compression_threshold" => next.compression_threshold = value.as_u64().ok_or_else(type_err)? as usize,
        other => {
            return Err(SettingsError::UnknownSetting {
                category: "session".into(),
                setting: other.to_owned(),
            })
        }
    }
    Ok(next)
}

fn apply_simulation_field(
    current: &SimulationSettings,
    setting: &str,
    value: &Value,
) -> Result<SimulationSettings, SettingsError> {
    let mut next = *current;
    match setting {
        "update_rate_hz" => next.update_rate_hz = as_f32("simulation", setting, value)?,
        "randomize_radius" => next.randomize_radius = as_f32("simulation", setting, value)?,
        other => {
            return Err(SettingsError::UnknownSetting {
                category: "simulation".into(),
                setting: other.to_owned(),
            })
        }
    }
    Ok(next)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(EngineSettings::default().validate().is_ok());
    }

    #[test]
    fn apply_update_rejects_unknown_category_and_leaves_settings_untouched() {
        let mut settings = EngineSettings::default();
        let before = settings;
        let err = settings
            .apply_update("rendering", "fov", &Value::from(90))
            .unwrap_err();
        assert!(matches!(err, SettingsError::UnknownCategory { .. }));
        assert_eq!(settings, before);
    }

    #[test]
    fn apply_update_rejects_out_of_range_physics_value() {
        let mut settings = EngineSettings::default();
        let before = settings;
        let err = settings
            .apply_update("physics", "damping", &Value::from(5.0))
            .unwrap_err();
        assert!(matches!(err, SettingsError::Kernel(_)));
        assert_eq!(settings, before);
    }

    #[test]
    fn apply_update_commits_a_valid_physics_change() {
        let mut settings = EngineSettings::default();
        settings
            .apply_update("physics", "damping", &Value::from(0.9))
            .unwrap();
        assert_eq!(settings.physics.damping, 0.9);
    }

    #[test]
    fn apply_update_commits_a_valid_session_change() {
        let mut settings = EngineSettings::default();
        settings
            .apply_update("session", "max_queue_size", &Value::from(250))
            .unwrap();
        assert_eq!(settings.session.max_queue_size, 250);
    }

    #[test]
    fn apply_update_rejects_unknown_setting_within_a_known_category() {
        let mut settings = EngineSettings::default();
        let err = settings
            .apply_update("physics", "gravity", &Value::from(1.0))
            .unwrap_err();
        assert!(matches!(err, SettingsError::UnknownSetting { .. }));
    }
}
