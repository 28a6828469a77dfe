use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding `store.json`.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
    /// When false the store is purely in-memory.
    #[serde(default = "d_true")]
    pub persist: bool,
    #[serde(default = "d_30")]
    pub flush_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            persist: true,
            flush_interval_secs: 30,
        }
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_true() -> bool {
    true
}
fn d_30() -> u64 {
    30
}
