// SPDX-License-Identifier: Apache-2.0
//! Textual control messages multiplexed on the same transport as binary
//! frames: readiness, pause, randomize, loading status, settings.
//!
//! Both directions share one tagged enum. Unknown `type` values deserialize
//! into [`ControlMessage::Unknown`] instead of failing, so a receiver can
//! ignore them with a debug log rather than dropping the connection —
//! versioning is additive only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A control-channel message, either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Server → client. Permits binary traffic to begin.
    #[serde(rename = "connection_established")]
    ConnectionEstablished {
        /// Server-side send timestamp, milliseconds since the Unix epoch.
        timestamp: i64,
    },

    /// Server → client. Physics-driven updates are inhibited; client should
    /// show progress.
    #[serde(rename = "loading")]
    Loading {
        /// Human-readable status text.
        message: String,
    },

    /// Server → client. Updates are now flowing.
    #[serde(rename = "updatesStarted")]
    UpdatesStarted {
        /// Server-side send timestamp, milliseconds since the Unix epoch.
        timestamp: i64,
    },

    /// Server → client. Authoritative single-setting change.
    #[serde(rename = "settings")]
    Settings {
        /// Setting group, e.g. `"physics"`.
        category: String,
        /// Setting name within the category.
        setting: String,
        /// New value, typed per setting.
        value: Value,
    },

    /// Client → server. Request a one-shot snapshot and enter streaming mode.
    #[serde(rename = "requestInitialData")]
    RequestInitialData,

    /// Client → server. Gate server-side reseeding.
    #[serde(rename = "enableRandomization")]
    EnableRandomization {
        /// Whether randomization is enabled.
        enabled: bool,
    },

    /// Client → server. Pause or resume physics.
    #[serde(rename = "pauseSimulation")]
    PauseSimulation {
        /// `true` to pause, `false` to resume.
        enabled: bool,
    },

    /// Client → server. Request an immediate kernel tick.
    #[serde(rename = "applyForces")]
    ApplyForces {
        /// Client-side send timestamp, milliseconds since the Unix epoch.
        timestamp: i64,
        /// Always `true`; present for schema parity with the original
        /// request shape.
        #[serde(rename = "forceCalculation")]
        force_calculation: bool,
    },

    /// Client → server. Proposed single-setting change.
    #[serde(rename = "settings_update")]
    SettingsUpdate {
        /// Setting group, e.g. `"physics"`.
        category: String,
        /// Setting name within the category.
        setting: String,
        /// Proposed value, typed per setting.
        value: Value,
    },

    /// Catch-all for any `type` this build doesn't recognise.
    #[serde(other)]
    Unknown,
}

impl ControlMessage {
    /// Serializes to a single-line UTF-8 JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error only if a `value` payload is non-serializable,
    /// which cannot happen for [`serde_json::Value`].
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a UTF-8 JSON text frame. A `type` this build doesn't
    /// recognise deserializes to [`ControlMessage::Unknown`] rather than
    /// erroring.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not well-formed JSON or is missing the
    /// `type` discriminator entirely.
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn connection_established_round_trips() {
        let msg = ControlMessage::ConnectionEstablished { timestamp: 1000 };
        let text = msg.to_text().unwrap();
        assert_eq!(text, r#"{"type":"connection_established","timestamp":1000}"#);
        assert_eq!(ControlMessage::from_text(&text).unwrap(), msg);
    }

    #[test]
    fn unrecognised_type_parses_as_unknown_instead_of_erroring() {
        let text = r#"{"type":"somethingFromTheFuture","payload":42}"#;
        assert_eq!(
            ControlMessage::from_text(text).unwrap(),
            ControlMessage::Unknown
        );
    }

    #[test]
    fn settings_update_carries_an_arbitrary_json_value() {
        let msg = ControlMessage::SettingsUpdate {
            category: "physics".into(),
            setting: "damping".into(),
            value: Value::from(0.9),
        };
        let text = msg.to_text().unwrap();
        assert_eq!(ControlMessage::from_text(&text).unwrap(), msg);
    }

    #[test]
    fn apply_forces_round_trips() {
        let msg = ControlMessage::ApplyForces {
            timestamp: 42,
            force_calculation: true,
        };
        let text = msg.to_text().unwrap();
        assert_eq!(ControlMessage::from_text(&text).unwrap(), msg);
    }

    #[test]
    fn request_initial_data_has_no_fields() {
        let msg = ControlMessage::RequestInitialData;
        let text = msg.to_text().unwrap();
        assert_eq!(text, r#"{"type":"requestInitialData"}"#);
        assert_eq!(ControlMessage::from_text(&text).unwrap(), msg);
    }
}
