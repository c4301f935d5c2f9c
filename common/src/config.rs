use serde::{Deserialize, Serialize};

use crate::protocol::endpoint_for_host;

pub const DEFAULT_HISTORY_CAP: usize = 50;
pub const MAX_HISTORY_CAP: usize = 500;
pub const DEFAULT_NODE_HOST: &str = "192.168.4.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
        }
    }
}

impl BackoffPolicy {
    pub fn delay_ms(&self, attempts: u32) -> u64 {
        2u64.checked_pow(attempts)
            .and_then(|factor| self.base_delay_ms.checked_mul(factor))
            .map_or(self.max_delay_ms, |delay| delay.min(self.max_delay_ms))
    }

    pub fn sanitize(&mut self) {
        if self.base_delay_ms == 0 {
            self.base_delay_ms = 1;
        }
        if self.max_delay_ms < self.base_delay_ms {
            self.max_delay_ms = self.base_delay_ms;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub endpoint_url: String,
    pub history_cap: usize,
    pub reconnect: BackoffPolicy,
    pub http_port: u16,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoint_url: endpoint_for_host(DEFAULT_NODE_HOST),
            history_cap: DEFAULT_HISTORY_CAP,
            reconnect: BackoffPolicy::default(),
            http_port: 8080,
        }
    }
}

impl MonitorConfig {
    pub fn sanitize(&mut self) {
        if self.endpoint_url.trim().is_empty() {
            self.endpoint_url = endpoint_for_host(DEFAULT_NODE_HOST);
        }
        self.history_cap = self.history_cap.clamp(1, MAX_HISTORY_CAP);
        self.reconnect.sanitize();
        if self.http_port == 0 {
            self.http_port = 8080;
        }
    }

    pub fn restart_required(&self, other: &MonitorConfig) -> bool {
        self != other
    }
}
