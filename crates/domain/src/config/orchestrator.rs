use serde::{Deserialize, Serialize};
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn orchestration (aggregation, guard, generation)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Debounce window after the most recent user message.
    #[serde(default = "d_2000")]
    pub aggregation_window_ms: u64,
    /// Upper bound on how long a burst may keep extending the window,
    /// measured from the first message of the burst.
    #[serde(default = "d_6000")]
    pub aggregation_max_ms: u64,
    /// Delay used once a burst has already reached `aggregation_max_ms`.
    #[serde(default = "d_200")]
    pub cap_flush_delay_ms: u64,
    /// Number of stored messages loaded as conversation history.
    #[serde(default = "d_20")]
    pub history_limit: usize,
    /// Bound on a single completion-engine call.
    #[serde(default = "d_60000")]
    pub completion_timeout_ms: u64,
    /// What to do when the aggregation timer fires while a generation is
    /// already running for the conversation.
    #[serde(default)]
    pub busy_policy: BusyPolicy,
    /// How long a finished typing entry stays visible to pollers.
    #[serde(default = "d_30000")]
    pub typing_idle_ttl_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            aggregation_window_ms: 2_000,
            aggregation_max_ms: 6_000,
            cap_flush_delay_ms: 200,
            history_limit: 20,
            completion_timeout_ms: 60_000,
            busy_policy: BusyPolicy::RerunAfter,
            typing_idle_ttl_ms: 30_000,
        }
    }
}

impl OrchestratorConfig {
    pub fn aggregation_window(&self) -> Duration {
        Duration::from_millis(self.aggregation_window_ms)
    }
    pub fn aggregation_max(&self) -> Duration {
        Duration::from_millis(self.aggregation_max_ms)
    }
    pub fn cap_flush_delay(&self) -> Duration {
        Duration::from_millis(self.cap_flush_delay_ms)
    }
    pub fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }
    pub fn typing_idle_ttl(&self) -> Duration {
        Duration::from_millis(self.typing_idle_ttl_ms)
    }
}

/// Policy for an aggregation timer that fires while the generation guard is
/// held by another run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Drop the firing; the burst is only answered if a later message opens
    /// a new window.
    Skip,
    /// Remember the firing and open a fresh window as soon as the running
    /// generation releases the guard.
    #[default]
    RerunAfter,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Background post-processing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Maximum number of post-processing jobs running at once.
    #[serde(default = "d_4")]
    pub workers: usize,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_200() -> u64 {
    200
}
fn d_2000() -> u64 {
    2_000
}
fn d_6000() -> u64 {
    6_000
}
fn d_30000() -> u64 {
    30_000
}
fn d_60000() -> u64 {
    60_000
}
fn d_20() -> usize {
    20
}
fn d_4() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: OrchestratorConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.aggregation_window(), Duration::from_secs(2));
        assert_eq!(cfg.aggregation_max(), Duration::from_secs(6));
        assert_eq!(cfg.cap_flush_delay(), Duration::from_millis(200));
        assert_eq!(cfg.busy_policy, BusyPolicy::RerunAfter);
    }

    #[test]
    fn busy_policy_parses_snake_case() {
        let cfg: OrchestratorConfig = toml::from_str(r#"busy_policy = "skip""#).unwrap();
        assert_eq!(cfg.busy_policy, BusyPolicy::Skip);
    }
}
