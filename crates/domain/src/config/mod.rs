mod context;
mod delivery;
mod llm;
mod observability;
mod orchestrator;
mod server;
mod store;

pub use context::*;
pub use delivery::*;
pub use llm::*;
pub use observability::*;
pub use orchestrator::*;
pub use server::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::companion::CompanionProfile;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Companion profiles seeded into the store at startup.
    #[serde(default)]
    pub companions: Vec<CompanionProfile>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.max_concurrent_requests == 0 {
            errors.push(ConfigError::error(
                "server.max_concurrent_requests",
                "must be at least 1",
            ));
        }
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        // ── orchestrator ────────────────────────────────────────────
        let orch = &self.orchestrator;
        if orch.aggregation_window_ms == 0 {
            errors.push(ConfigError::error(
                "orchestrator.aggregation_window_ms",
                "window must be greater than 0",
            ));
        }
        if orch.aggregation_window_ms > orch.aggregation_max_ms {
            errors.push(ConfigError::error(
                "orchestrator.aggregation_max_ms",
                format!(
                    "max ({}) must not be shorter than the window ({})",
                    orch.aggregation_max_ms, orch.aggregation_window_ms
                ),
            ));
        }
        if orch.history_limit == 0 {
            errors.push(ConfigError::warning(
                "orchestrator.history_limit",
                "no history will be sent to the model",
            ));
        }
        if orch.completion_timeout_ms == 0 {
            errors.push(ConfigError::error(
                "orchestrator.completion_timeout_ms",
                "timeout must be greater than 0",
            ));
        }

        // ── delivery ────────────────────────────────────────────────
        let d = &self.delivery;
        if d.max_chunks == 0 {
            errors.push(ConfigError::error("delivery.max_chunks", "must be at least 1"));
        }
        if d.max_words_per_chunk == 0 {
            errors.push(ConfigError::error(
                "delivery.max_words_per_chunk",
                "must be at least 1",
            ));
        }
        if d.min_delay_ms > d.max_delay_ms {
            errors.push(ConfigError::error(
                "delivery.min_delay_ms",
                "min_delay_ms must not exceed max_delay_ms",
            ));
        }
        if !(d.jitter_min > 0.0 && d.jitter_min <= d.jitter_max) {
            errors.push(ConfigError::error(
                "delivery.jitter_min",
                "jitter range must satisfy 0 < jitter_min <= jitter_max",
            ));
        }

        // ── background / llm / observability ───────────────────────
        if self.background.workers == 0 {
            errors.push(ConfigError::error("background.workers", "must be at least 1"));
        }
        if self.llm.base_url.is_empty() {
            errors.push(ConfigError::error("llm.base_url", "base_url must not be empty"));
        }
        if self.llm.model.is_empty() {
            errors.push(ConfigError::error("llm.model", "model must not be empty"));
        }
        if self.context.timezone.parse::<chrono_tz::Tz>().is_err() {
            errors.push(ConfigError::warning(
                "context.timezone",
                format!("unknown timezone {:?}, UTC will be used", self.context.timezone),
            ));
        }
        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "sample_rate must be within 0.0 and 1.0",
            ));
        }

        // ── companions ──────────────────────────────────────────────
        let mut seen = HashSet::new();
        for (i, c) in self.companions.iter().enumerate() {
            if c.id.is_empty() {
                errors.push(ConfigError::error(
                    format!("companions[{i}].id"),
                    "companion id must not be empty",
                ));
            } else if !seen.insert(c.id.as_str()) {
                errors.push(ConfigError::error(
                    format!("companions[{i}].id"),
                    format!("duplicate companion id {:?}", c.id),
                ));
            }
            if c.name.is_empty() {
                errors.push(ConfigError::warning(
                    format!("companions[{i}].name"),
                    "companion has no display name",
                ));
            }
        }

        errors
    }

    /// True when `validate` reports no error-level issues.
    pub fn is_valid(&self) -> bool {
        !self
            .validate()
            .iter()
            .any(|e| e.severity == ConfigSeverity::Error)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_only(cfg: &Config) -> Vec<ConfigError> {
        cfg.validate()
            .into_iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.is_valid(), "{:?}", cfg.validate());
    }

    #[test]
    fn empty_toml_parses_to_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 8420);
        assert_eq!(cfg.orchestrator.aggregation_window_ms, 2_000);
        assert_eq!(cfg.delivery.max_chunks, 5);
        assert!(cfg.companions.is_empty());
    }

    #[test]
    fn window_longer_than_max_is_rejected() {
        let mut cfg = Config::default();
        cfg.orchestrator.aggregation_window_ms = 7_000;
        let errs = errors_only(&cfg);
        assert!(errs
            .iter()
            .any(|e| e.field == "orchestrator.aggregation_max_ms"));
    }

    #[test]
    fn inverted_delay_bounds_are_rejected() {
        let mut cfg = Config::default();
        cfg.delivery.min_delay_ms = 7_000;
        cfg.delivery.jitter_min = 2.0;
        let errs = errors_only(&cfg);
        assert!(errs.iter().any(|e| e.field == "delivery.min_delay_ms"));
        assert!(errs.iter().any(|e| e.field == "delivery.jitter_min"));
    }

    #[test]
    fn wildcard_cors_is_only_a_warning() {
        let mut cfg = Config::default();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, ConfigSeverity::Warning);
        assert!(cfg.is_valid());
    }

    #[test]
    fn duplicate_companions_are_rejected() {
        let cfg: Config = toml::from_str(
            r#"
            [[companions]]
            id = "mira"
            name = "Mira"

            [[companions]]
            id = "mira"
            name = "Mira again"
        "#,
        )
        .unwrap();
        let errs = errors_only(&cfg);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "companions[1].id");
    }

    #[test]
    fn display_includes_severity_tag() {
        let e = ConfigError::warning("a.b", "careful");
        assert_eq!(e.to_string(), "[WARN] a.b: careful");
    }
}
