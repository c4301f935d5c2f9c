use serde::Serialize;

use crate::types::{plain_number, RemoteState, SensorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    AtLeast,
    AtMost,
}

impl Comparison {
    pub fn for_sensor(kind: SensorKind) -> Self {
        match kind {
            SensorKind::Temperature | SensorKind::Humidity | SensorKind::Smoke => Self::AtLeast,
            // Flame sensors read lower the closer the flame is.
            SensorKind::Flame => Self::AtMost,
        }
    }

    pub fn holds(self, reading: f64, threshold: f64) -> bool {
        match self {
            Self::AtLeast => reading >= threshold,
            Self::AtMost => reading <= threshold,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::AtLeast => "≥",
            Self::AtMost => "≤",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAlert {
    pub sensor: SensorKind,
    pub label: &'static str,
    pub reading: f64,
    pub threshold: f64,
    pub comparison: Comparison,
    #[serde(rename = "displayValue")]
    pub display_value: String,
}

/// Result of one evaluation pass. `conditions` lists every sensor currently
/// past its threshold; they are shown as active only when the node's global
/// alert flag agrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertReport {
    pub conditions: Vec<ActiveAlert>,
    #[serde(rename = "nodeAlertActive")]
    pub node_alert_active: bool,
    pub active: bool,
}

impl AlertReport {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn displayed(&self) -> &[ActiveAlert] {
        if self.active {
            self.conditions.as_slice()
        } else {
            &[]
        }
    }

    pub fn sensors(&self) -> Vec<SensorKind> {
        self.conditions.iter().map(|alert| alert.sensor).collect()
    }
}

pub struct AlertEvaluator;

impl AlertEvaluator {
    pub fn evaluate(state: &RemoteState) -> AlertReport {
        let conditions: Vec<ActiveAlert> = SensorKind::ALL
            .into_iter()
            .filter_map(|kind| Self::check(state, kind))
            .collect();
        let active = state.is_alert_active && !conditions.is_empty();

        AlertReport {
            conditions,
            node_alert_active: state.is_alert_active,
            active,
        }
    }

    pub fn check(state: &RemoteState, kind: SensorKind) -> Option<ActiveAlert> {
        let threshold = state.thresholds.get(kind)?;
        let reading = state.reading(kind);
        let comparison = Comparison::for_sensor(kind);
        if !comparison.holds(reading, threshold) {
            return None;
        }

        Some(ActiveAlert {
            sensor: kind,
            label: alert_label(kind),
            reading,
            threshold,
            comparison,
            display_value: display_value(kind, reading, threshold),
        })
    }
}

fn alert_label(kind: SensorKind) -> &'static str {
    match kind {
        SensorKind::Temperature => "High temperature",
        SensorKind::Humidity => "High humidity",
        SensorKind::Smoke => "Smoke / gas detected",
        SensorKind::Flame => "Flame detected",
    }
}

fn display_value(kind: SensorKind, reading: f64, threshold: f64) -> String {
    let symbol = Comparison::for_sensor(kind).symbol();
    let limit = plain_number(threshold);
    match kind {
        SensorKind::Temperature => format!("{reading:.1}°C ({symbol} {limit}°C)"),
        SensorKind::Humidity => format!("{reading:.1}% ({symbol} {limit}%)"),
        SensorKind::Smoke => format!("{} ppm ({symbol} {limit} ppm)", plain_number(reading)),
        SensorKind::Flame => format!("Value: {} ({symbol} {limit})", plain_number(reading)),
    }
}
