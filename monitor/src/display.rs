use chrono::{DateTime, Utc};
use hazard_common::{
    types::plain_number, AlertEvent, AlertReport, ConnectionState, ConnectionStatus,
    DisplayAdapter, RemoteState, SensorKind, ThresholdSet,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct Readings {
    pub temperature: String,
    pub humidity: String,
    pub smoke: String,
    pub flame: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdLabels {
    pub temperature: String,
    pub humidity: String,
    pub smoke: String,
    pub flame: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryLine {
    pub time: String,
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub readings: Readings,
    pub thresholds: ThresholdLabels,
    pub ventilation: &'static str,
    #[serde(rename = "alertBanner")]
    pub alert_banner: Vec<String>,
    pub history: Vec<HistoryLine>,
    pub connection: String,
}

impl Dashboard {
    pub fn build(state: &RemoteState, alerts: &AlertReport, status: &ConnectionStatus) -> Self {
        Self {
            readings: readings(state),
            thresholds: threshold_labels(&state.thresholds),
            ventilation: ventilation_label(state),
            alert_banner: alerts
                .displayed()
                .iter()
                .map(|alert| format!("{}: {}", alert.label, alert.display_value))
                .collect(),
            history: state.history.iter().map(history_line).collect(),
            connection: connection_text(status),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorView {
    pub state: RemoteState,
    pub alerts: AlertReport,
    pub status: ConnectionStatus,
    pub dashboard: Dashboard,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MonitorView {
    pub fn new(state: RemoteState, alerts: AlertReport, status: ConnectionStatus) -> Self {
        let dashboard = Dashboard::build(&state, &alerts, &status);
        Self {
            state,
            alerts,
            status,
            dashboard,
            updated_at: None,
        }
    }
}

pub struct MonitorDisplay {
    view: watch::Sender<MonitorView>,
    shown: Vec<SensorKind>,
}

impl MonitorDisplay {
    pub fn new(view: watch::Sender<MonitorView>) -> Self {
        Self {
            view,
            shown: Vec::new(),
        }
    }
}

impl DisplayAdapter for MonitorDisplay {
    fn render(&mut self, state: &RemoteState, alerts: &AlertReport) {
        let shown: Vec<SensorKind> = alerts.displayed().iter().map(|alert| alert.sensor).collect();
        if shown != self.shown {
            if shown.is_empty() {
                info!("alerts cleared, system normal");
            }
            for alert in alerts.displayed() {
                warn!(sensor = alert.sensor.as_str(), "{}: {}", alert.label, alert.display_value);
            }
            self.shown = shown;
        }

        self.view.send_modify(|view| {
            let dashboard = Dashboard::build(state, alerts, &view.status);
            log_dashboard(&dashboard);
            view.state = state.clone();
            view.alerts = alerts.clone();
            view.dashboard = dashboard;
            view.updated_at = Some(Utc::now());
        });
    }

    fn connection_changed(&mut self, status: &ConnectionStatus) {
        let text = connection_text(status);
        info!(state = status.state.as_str(), "{text}");
        self.view.send_modify(|view| {
            view.status = *status;
            view.dashboard.connection = text;
        });
    }
}

fn log_dashboard(dashboard: &Dashboard) {
    let readings = &dashboard.readings;
    debug!(
        temperature = %readings.temperature,
        humidity = %readings.humidity,
        smoke = %readings.smoke,
        flame = %readings.flame,
        ventilation = dashboard.ventilation,
        "{}",
        dashboard_summary(dashboard)
    );
}

pub fn dashboard_summary(dashboard: &Dashboard) -> String {
    let ThresholdLabels {
        temperature,
        humidity,
        smoke,
        flame,
    } = &dashboard.thresholds;
    let newest = dashboard
        .history
        .first()
        .map(|line| format!("{} {} {}", line.time, line.label, line.value))
        .unwrap_or_else(|| "none".to_string());
    format!(
        "thresholds {temperature} / {humidity} / {smoke} / {flame}, history {} entries, newest {newest}",
        dashboard.history.len()
    )
}

pub fn readings(state: &RemoteState) -> Readings {
    let flame = match state.thresholds.flame {
        Some(limit) if state.flame_reading < limit => "FLAME!".to_string(),
        _ => plain_number(state.flame_reading),
    };

    Readings {
        temperature: format!("{:.1} °C", state.temperature),
        humidity: format!("{:.1} %", state.humidity),
        smoke: format!("{:.0} ppm", state.smoke_level),
        flame,
    }
}

pub fn threshold_labels(thresholds: &ThresholdSet) -> ThresholdLabels {
    let label = |value: Option<f64>, prefix: &str, suffix: &str| match value {
        Some(value) => format!("{prefix}{}{suffix}", plain_number(value)),
        None => "--".to_string(),
    };

    ThresholdLabels {
        temperature: label(thresholds.temperature, "", " °C"),
        humidity: label(thresholds.humidity, "", " %"),
        smoke: label(thresholds.smoke, "", " ppm"),
        flame: label(thresholds.flame, "≤ ", ""),
    }
}

pub fn ventilation_label(state: &RemoteState) -> &'static str {
    match (state.manual_override_active, state.manual_ventilation_on) {
        (false, _) => "Automatic",
        (true, true) => "Forced ON",
        (true, false) => "Forced OFF",
    }
}

pub fn history_line(event: &AlertEvent) -> HistoryLine {
    let time = if event.timestamp.is_empty() {
        "??".to_string()
    } else {
        event.timestamp.clone()
    };
    let unit = event.sensor_kind.unit();
    let value = if unit.is_empty() {
        format!("{:.1}", event.value)
    } else {
        format!("{:.1} {unit}", event.value)
    };

    HistoryLine {
        time,
        label: event.sensor_kind.label(),
        value,
    }
}

pub fn connection_text(status: &ConnectionStatus) -> String {
    match status.state {
        ConnectionState::Idle => "Disconnected".to_string(),
        ConnectionState::Connecting => "Connecting…".to_string(),
        ConnectionState::Open if status.awaiting_snapshot => "Loading data…".to_string(),
        ConnectionState::Open => "Connected".to_string(),
        ConnectionState::Closed => "Connection lost".to_string(),
        ConnectionState::Reconnecting => match status.retry_in_ms {
            Some(delay_ms) => format!(
                "Connection lost, reconnecting in {:.1}s (attempt {})",
                delay_ms as f64 / 1000.0,
                status.attempts
            ),
            None => "Connection lost, reconnecting".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazard_common::AlertEvaluator;

    fn state() -> RemoteState {
        RemoteState {
            temperature: 23.46,
            humidity: 51.0,
            smoke_level: 123.6,
            flame_reading: 320.0,
            thresholds: ThresholdSet {
                temperature: Some(35.0),
                humidity: Some(62.5),
                smoke: None,
                flame: Some(500.0),
            },
            ..RemoteState::default()
        }
    }

    #[test]
    fn readings_format_per_sensor() {
        let readings = readings(&state());
        assert_eq!(readings.temperature, "23.5 °C");
        assert_eq!(readings.humidity, "51.0 %");
        assert_eq!(readings.smoke, "124 ppm");
        assert_eq!(readings.flame, "FLAME!");
    }

    #[test]
    fn flame_card_shows_raw_value_at_threshold() {
        let mut state = state();
        state.flame_reading = 500.0;
        assert_eq!(readings(&state).flame, "500");
    }

    #[test]
    fn threshold_labels_mark_unset_values() {
        let labels = threshold_labels(&state().thresholds);
        assert_eq!(labels.temperature, "35 °C");
        assert_eq!(labels.humidity, "62.5 %");
        assert_eq!(labels.smoke, "--");
        assert_eq!(labels.flame, "≤ 500");
    }

    #[test]
    fn ventilation_label_reflects_override() {
        let mut state = state();
        assert_eq!(ventilation_label(&state), "Automatic");
        state.manual_override_active = true;
        assert_eq!(ventilation_label(&state), "Forced OFF");
        state.manual_ventilation_on = true;
        assert_eq!(ventilation_label(&state), "Forced ON");
    }

    #[test]
    fn history_line_falls_back_on_missing_time() {
        let line = history_line(&AlertEvent {
            sensor_kind: SensorKind::Humidity,
            value: 71.26,
            timestamp: String::new(),
        });
        assert_eq!(
            line,
            HistoryLine {
                time: "??".to_string(),
                label: "Humidity",
                value: "71.3 %".to_string(),
            }
        );
    }

    #[test]
    fn reconnect_text_shows_delay_and_attempt() {
        let status = ConnectionStatus {
            state: ConnectionState::Reconnecting,
            attempts: 2,
            retry_in_ms: Some(2_000),
            awaiting_snapshot: false,
        };
        assert_eq!(
            connection_text(&status),
            "Connection lost, reconnecting in 2.0s (attempt 2)"
        );
    }

    #[test]
    fn summary_lists_thresholds_and_newest_event() {
        let mut state = state();
        state.history.push_newest(AlertEvent {
            sensor_kind: SensorKind::Smoke,
            value: 410.0,
            timestamp: "09:10:00".to_string(),
        });
        state.history.push_newest(AlertEvent {
            sensor_kind: SensorKind::Temperature,
            value: 36.0,
            timestamp: "09:12:00".to_string(),
        });
        let dashboard = Dashboard::build(
            &state,
            &AlertEvaluator::evaluate(&state),
            &ConnectionStatus {
                state: ConnectionState::Open,
                attempts: 0,
                retry_in_ms: None,
                awaiting_snapshot: false,
            },
        );

        assert_eq!(
            dashboard_summary(&dashboard),
            "thresholds 35 °C / 62.5 % / -- / ≤ 500, history 2 entries, newest 09:12:00 Temperature 36.0 °C"
        );
    }

    #[test]
    fn render_publishes_view() {
        let mut state = state();
        state.is_alert_active = true;
        state.temperature = 40.0;
        let alerts = AlertEvaluator::evaluate(&state);
        let status = ConnectionStatus {
            state: ConnectionState::Open,
            attempts: 0,
            retry_in_ms: None,
            awaiting_snapshot: false,
        };

        let (tx, rx) = watch::channel(MonitorView::new(
            RemoteState::default(),
            AlertReport::default(),
            status,
        ));
        let mut display = MonitorDisplay::new(tx);
        display.render(&state, &alerts);

        let view = rx.borrow();
        assert!(view.updated_at.is_some());
        assert_eq!(view.dashboard.connection, "Connected");
        assert_eq!(
            view.dashboard.alert_banner,
            vec![
                "High temperature: 40.0°C (≥ 35°C)".to_string(),
                "Flame detected: Value: 320 (≤ 500)".to_string(),
            ]
        );
    }
}
