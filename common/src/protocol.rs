use serde::{Deserialize, Serialize};

use crate::{
    error::SyncError,
    types::{AlertEvent, ThresholdSet},
};

pub const WS_PATH: &str = "/ws";

pub fn endpoint_for_host(host: &str) -> String {
    format!("ws://{host}{WS_PATH}")
}

/// An inbound state frame. The first frame on a connection is a snapshot,
/// every later one is a delta; both share this shape and absent fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFrame {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub smoke_level: Option<f64>,
    pub flame_reading: Option<f64>,
    pub is_alert_active: Option<bool>,
    pub thresholds: Option<ThresholdSet>,
    pub manual_override_active: Option<bool>,
    pub manual_ventilation_on: Option<bool>,
    pub history: Option<Vec<AlertEvent>>,
    pub new_alert_event: Option<AlertEvent>,
}

pub fn parse_state_frame(text: &str) -> Result<StateFrame, SyncError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|err| SyncError::MalformedMessage(err.to_string()))?;
    if !value.is_object() {
        return Err(SyncError::MalformedMessage(
            "frame is not a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|err| SyncError::MalformedMessage(err.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    UpdateThresholds {
        thresholds: ThresholdSet,
    },
    ManualVentilation {
        #[serde(rename = "override")]
        manual_override: bool,
        state: bool,
    },
}

impl Command {
    /// `state` only means something while the override is engaged.
    pub fn manual_ventilation(manual_override: bool, state: bool) -> Self {
        Self::ManualVentilation {
            manual_override,
            state: manual_override && state,
        }
    }

    pub fn encode(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(|err| SyncError::Encode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::types::SensorKind;

    #[test]
    fn parses_delta_with_alert_event() {
        let frame = parse_state_frame(
            r#"{
                "temperature": 41.5,
                "isAlertActive": true,
                "newAlertEvent": { "sensorKind": "TEMPERATURE", "value": 41.5, "timestamp": "12:00:01" },
                "somethingNew": 1
            }"#,
        )
        .unwrap();

        assert_eq!(
            frame,
            StateFrame {
                temperature: Some(41.5),
                is_alert_active: Some(true),
                new_alert_event: Some(AlertEvent {
                    sensor_kind: SensorKind::Temperature,
                    value: 41.5,
                    timestamp: "12:00:01".to_string(),
                }),
                ..StateFrame::default()
            }
        );
    }

    #[test]
    fn null_thresholds_mean_unset() {
        let frame = parse_state_frame(
            r#"{ "thresholds": { "temperature": 35, "humidity": null, "smoke": 300 } }"#,
        )
        .unwrap();

        assert_eq!(
            frame.thresholds,
            Some(ThresholdSet {
                temperature: Some(35.0),
                humidity: None,
                smoke: Some(300.0),
                flame: None,
            })
        );
    }

    #[test]
    fn rejects_invalid_json_and_non_objects() {
        for text in ["{\"temperature\": ", "[1, 2, 3]", "42", "\"hello\"", "null"] {
            assert!(
                matches!(parse_state_frame(text), Err(SyncError::MalformedMessage(_))),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_type_mismatch_on_known_field() {
        let result = parse_state_frame(r#"{ "temperature": "hot" }"#);
        assert!(matches!(result, Err(SyncError::MalformedMessage(_))));

        let result = parse_state_frame(r#"{ "newAlertEvent": { "sensorKind": "WIND", "value": 1 } }"#);
        assert!(matches!(result, Err(SyncError::MalformedMessage(_))));
    }

    #[test]
    fn encodes_threshold_command() {
        let command = Command::UpdateThresholds {
            thresholds: ThresholdSet {
                temperature: Some(35.0),
                humidity: Some(60.0),
                smoke: None,
                flame: Some(500.0),
            },
        };
        let value: serde_json::Value = serde_json::from_str(&command.encode().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "command": "update_thresholds",
                "thresholds": { "temperature": 35.0, "humidity": 60.0, "smoke": null, "flame": 500.0 }
            })
        );
    }

    #[test]
    fn ventilation_state_is_cleared_without_override() {
        let value: serde_json::Value =
            serde_json::from_str(&Command::manual_ventilation(false, true).encode().unwrap())
                .unwrap();
        assert_eq!(
            value,
            json!({ "command": "manual_ventilation", "override": false, "state": false })
        );

        let value: serde_json::Value =
            serde_json::from_str(&Command::manual_ventilation(true, true).encode().unwrap())
                .unwrap();
        assert_eq!(
            value,
            json!({ "command": "manual_ventilation", "override": true, "state": true })
        );
    }

    #[test]
    fn endpoint_uses_ws_path() {
        assert_eq!(endpoint_for_host("10.0.0.2"), "ws://10.0.0.2/ws");
    }
}
