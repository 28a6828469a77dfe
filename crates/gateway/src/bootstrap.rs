//! AppState construction and background-task spawning extracted from `main.rs`.
//!
//! `serve` boots through [`build_app_state`]; integration tests use
//! [`build_app_state_with_engine`] to swap in a scripted engine.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use kd_domain::config::{Config, ConfigSeverity};
use kd_providers::{CompletionEngine, OpenAiCompatProvider, ProviderEngine};
use kd_store::{ConversationStore, InMemoryStore};

use crate::runtime::TurnOrchestrator;
use crate::state::AppState;

/// How often finished typing entries are swept.
const TYPING_PRUNE_INTERVAL: Duration = Duration::from_secs(10);

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`] backed by the configured completion endpoint.
pub async fn build_app_state(
    config: Arc<Config>,
    config_path: String,
    shutdown_tx: Arc<tokio::sync::Notify>,
) -> anyhow::Result<AppState> {
    check_config(&config)?;

    let provider = OpenAiCompatProvider::from_config(&config.llm)
        .context("initializing completion provider")?;
    let engine: Arc<dyn CompletionEngine> =
        Arc::new(ProviderEngine::new(Arc::new(provider), &config.llm));
    tracing::info!(
        provider = %config.llm.provider_id,
        model = %config.llm.model,
        mini_model = %config.llm.mini_model,
        "completion engine ready"
    );

    assemble(config, config_path, shutdown_tx, engine).await
}

/// Same as [`build_app_state`] with a caller-supplied engine.
pub async fn build_app_state_with_engine(
    config: Arc<Config>,
    config_path: String,
    shutdown_tx: Arc<tokio::sync::Notify>,
    engine: Arc<dyn CompletionEngine>,
) -> anyhow::Result<AppState> {
    check_config(&config)?;
    assemble(config, config_path, shutdown_tx, engine).await
}

async fn assemble(
    config: Arc<Config>,
    config_path: String,
    shutdown_tx: Arc<tokio::sync::Notify>,
    engine: Arc<dyn CompletionEngine>,
) -> anyhow::Result<AppState> {
    // ── Conversation store ───────────────────────────────────────────
    let store = if config.store.persist {
        Arc::new(
            InMemoryStore::open(&config.store.state_path)
                .context("opening conversation store")?,
        )
    } else {
        tracing::info!("store persistence disabled, state is volatile");
        Arc::new(InMemoryStore::new())
    };

    // ── Seed companions ──────────────────────────────────────────────
    for profile in &config.companions {
        store
            .upsert_companion(profile.clone())
            .await
            .with_context(|| format!("seeding companion {}", profile.id))?;
    }
    if !config.companions.is_empty() {
        tracing::info!(companions = config.companions.len(), "companion profiles seeded");
    }

    // ── Turn orchestrator ────────────────────────────────────────────
    let dyn_store: Arc<dyn ConversationStore> = store.clone();
    let orchestrator = TurnOrchestrator::new(&config, dyn_store, engine);
    tracing::info!(
        window_ms = config.orchestrator.aggregation_window_ms,
        max_ms = config.orchestrator.aggregation_max_ms,
        busy_policy = ?config.orchestrator.busy_policy,
        workers = orchestrator.background().workers(),
        "turn orchestrator ready"
    );

    Ok(AppState {
        config,
        config_path,
        store,
        orchestrator,
        shutdown_tx,
        started_at: chrono::Utc::now(),
    })
}

/// Log every issue; bail when any is an error.
fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// Spawn the periodic maintenance loops. They stop when `cancel` fires.
pub fn spawn_background_tasks(state: &AppState, cancel: CancellationToken) {
    // ── Periodic store flush ─────────────────────────────────────────
    if state.config.store.persist {
        let store = state.store.clone();
        let every = Duration::from_secs(state.config.store.flush_interval_secs.max(1));
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = store.flush() {
                            tracing::warn!(error = %e, "store flush failed");
                        }
                    }
                }
            }
        });
    }

    // ── Typing entry pruning ─────────────────────────────────────────
    {
        let orchestrator = state.orchestrator.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TYPING_PRUNE_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let pruned = orchestrator.typing().prune_idle();
                        if pruned > 0 {
                            tracing::debug!(pruned, "idle typing entries evicted");
                        }
                    }
                }
            }
        });
    }
}
