use std::collections::VecDeque;

use serde::{Serialize, Serializer};

use crate::{config::DEFAULT_HISTORY_CAP, types::AlertEvent};

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStore {
    events: VecDeque<AlertEvent>,
    cap: usize,
}

impl HistoryStore {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            events: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn newest(&self) -> Option<&AlertEvent> {
        self.events.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlertEvent> {
        self.events.iter()
    }

    pub fn push_newest(&mut self, event: AlertEvent) -> Option<AlertEvent> {
        self.events.push_front(event);
        if self.events.len() > self.cap {
            self.events.pop_back()
        } else {
            None
        }
    }

    pub fn replace(&mut self, events: Vec<AlertEvent>) -> usize {
        let dropped = events.len().saturating_sub(self.cap);
        self.events = events.into_iter().take(self.cap).collect();
        dropped
    }

    pub fn to_vec(&self) -> Vec<AlertEvent> {
        self.events.iter().cloned().collect()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl Serialize for HistoryStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.events.iter())
    }
}
