use serde::{Deserialize, Serialize};

use crate::history::HistoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorKind {
    Temperature,
    Humidity,
    Smoke,
    Flame,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::Smoke,
        SensorKind::Flame,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "TEMPERATURE",
            Self::Humidity => "HUMIDITY",
            Self::Smoke => "SMOKE",
            Self::Flame => "FLAME",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::Smoke => "Smoke/Gas",
            Self::Flame => "Flame",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%",
            Self::Smoke => "ppm",
            Self::Flame => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    #[serde(rename = "sensorKind")]
    pub sensor_kind: SensorKind,
    pub value: f64,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub smoke: Option<f64>,
    pub flame: Option<f64>,
}

impl ThresholdSet {
    pub fn get(&self, kind: SensorKind) -> Option<f64> {
        match kind {
            SensorKind::Temperature => self.temperature,
            SensorKind::Humidity => self.humidity,
            SensorKind::Smoke => self.smoke,
            SensorKind::Flame => self.flame,
        }
    }

    pub fn apply_edit(&mut self, edit: &ThresholdEdit) -> bool {
        let mut changed = false;
        for (slot, value) in [
            (&mut self.temperature, edit.temperature),
            (&mut self.humidity, edit.humidity),
            (&mut self.smoke, edit.smoke),
            (&mut self.flame, edit.flame),
        ] {
            let Some(value) = value.filter(|value| value.is_finite()) else {
                continue;
            };
            if *slot != Some(value) {
                *slot = Some(value);
                changed = true;
            }
        }
        changed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEdit {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub smoke: Option<f64>,
    #[serde(default)]
    pub flame: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteState {
    pub temperature: f64,
    pub humidity: f64,
    #[serde(rename = "smokeLevel")]
    pub smoke_level: f64,
    #[serde(rename = "flameReading")]
    pub flame_reading: f64,
    #[serde(rename = "isAlertActive")]
    pub is_alert_active: bool,
    pub thresholds: ThresholdSet,
    #[serde(rename = "manualOverrideActive")]
    pub manual_override_active: bool,
    #[serde(rename = "manualVentilationOn")]
    pub manual_ventilation_on: bool,
    pub history: HistoryStore,
}

impl RemoteState {
    pub fn new(history_cap: usize) -> Self {
        Self {
            temperature: 0.0,
            humidity: 0.0,
            smoke_level: 0.0,
            flame_reading: 0.0,
            is_alert_active: false,
            thresholds: ThresholdSet::default(),
            manual_override_active: false,
            manual_ventilation_on: false,
            history: HistoryStore::new(history_cap),
        }
    }

    pub fn reading(&self, kind: SensorKind) -> f64 {
        match kind {
            SensorKind::Temperature => self.temperature,
            SensorKind::Humidity => self.humidity,
            SensorKind::Smoke => self.smoke_level,
            SensorKind::Flame => self.flame_reading,
        }
    }
}

impl Default for RemoteState {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_HISTORY_CAP)
    }
}

pub fn plain_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
