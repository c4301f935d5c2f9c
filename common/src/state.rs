use crate::{protocol::StateFrame, types::RemoteState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaOutcome {
    pub recorded_event: bool,
    pub evicted_event: bool,
    pub ignored_history: bool,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    state: RemoteState,
}

impl StateStore {
    pub fn new(history_cap: usize) -> Self {
        Self {
            state: RemoteState::new(history_cap),
        }
    }

    pub fn state(&self) -> &RemoteState {
        &self.state
    }

    pub fn history_cap(&self) -> usize {
        self.state.history.cap()
    }

    /// Replaces the whole state. Fields the snapshot omits fall back to their defaults;
    /// a one-shot `newAlertEvent` on a snapshot is not recorded, the snapshot history
    /// already carries it. Returns how many history entries exceeded the cap.
    pub fn apply_snapshot(&mut self, frame: StateFrame) -> usize {
        let StateFrame {
            temperature,
            humidity,
            smoke_level,
            flame_reading,
            is_alert_active,
            thresholds,
            manual_override_active,
            manual_ventilation_on,
            history,
            new_alert_event: _,
        } = frame;

        let mut next = RemoteState::new(self.history_cap());
        next.temperature = temperature.unwrap_or_default();
        next.humidity = humidity.unwrap_or_default();
        next.smoke_level = smoke_level.unwrap_or_default();
        next.flame_reading = flame_reading.unwrap_or_default();
        next.is_alert_active = is_alert_active.unwrap_or_default();
        next.thresholds = thresholds.unwrap_or_default();
        next.manual_override_active = manual_override_active.unwrap_or_default();
        next.manual_ventilation_on = manual_ventilation_on.unwrap_or_default();
        let dropped = next.history.replace(history.unwrap_or_default());

        self.state = next;
        dropped
    }

    pub fn apply_delta(&mut self, frame: StateFrame) -> DeltaOutcome {
        // Exhaustive destructure: a new frame field has to be handled here.
        let StateFrame {
            temperature,
            humidity,
            smoke_level,
            flame_reading,
            is_alert_active,
            thresholds,
            manual_override_active,
            manual_ventilation_on,
            history,
            new_alert_event,
        } = frame;

        let mut outcome = DeltaOutcome {
            ignored_history: history.is_some(),
            ..DeltaOutcome::default()
        };

        if let Some(event) = new_alert_event {
            outcome.recorded_event = true;
            outcome.evicted_event = self.state.history.push_newest(event).is_some();
        }

        let state = &mut self.state;
        if let Some(value) = temperature {
            state.temperature = value;
        }
        if let Some(value) = humidity {
            state.humidity = value;
        }
        if let Some(value) = smoke_level {
            state.smoke_level = value;
        }
        if let Some(value) = flame_reading {
            state.flame_reading = value;
        }
        if let Some(value) = is_alert_active {
            state.is_alert_active = value;
        }
        if let Some(value) = thresholds {
            state.thresholds = value;
        }
        if let Some(value) = manual_override_active {
            state.manual_override_active = value;
        }
        if let Some(value) = manual_ventilation_on {
            state.manual_ventilation_on = value;
        }

        outcome
    }

    pub(crate) fn thresholds_mut(&mut self) -> &mut crate::types::ThresholdSet {
        &mut self.state.thresholds
    }
}
