//! Bounded pool for post-reply work (memory extraction, intelligence
//! refresh).
//!
//! Jobs are fire-and-forget from the caller's point of view, but every
//! outcome is counted in [`BackgroundStats`] and broadcast as a
//! [`BackgroundEvent`], and [`BackgroundPool::wait_idle`] lets callers block
//! until the queue drains.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, Notify, Semaphore};
use tokio::time::Instant;
use tracing::Instrument;

use kd_domain::error::Result;
use kd_domain::trace::TraceEvent;

/// Capacity of the event broadcast channel; slow subscribers lag.
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    MemoryExtraction,
    IntelligenceRefresh,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MemoryExtraction => "memory_extraction",
            Self::IntelligenceRefresh => "intelligence_refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackgroundEvent {
    pub conversation_id: String,
    pub kind: JobKind,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackgroundStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Queued or running.
    pub in_flight: usize,
}

pub struct BackgroundPool {
    workers: usize,
    semaphore: Arc<Semaphore>,
    stats: Arc<Mutex<BackgroundStats>>,
    events: broadcast::Sender<BackgroundEvent>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl BackgroundPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            workers,
            semaphore: Arc::new(Semaphore::new(workers)),
            stats: Arc::new(Mutex::new(BackgroundStats::default())),
            events,
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue `job`. It runs once a worker slot frees up; failures and panics
    /// are logged, counted and broadcast, never propagated.
    pub fn submit<F>(&self, conversation_id: &str, kind: JobKind, job: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        {
            let mut stats = self.stats.lock();
            stats.submitted += 1;
            stats.in_flight += 1;
        }

        let semaphore = self.semaphore.clone();
        let stats = self.stats.clone();
        let events = self.events.clone();
        let in_flight = self.in_flight.clone();
        let idle = self.idle.clone();
        let conversation_id = conversation_id.to_owned();

        let span = tracing::info_span!(
            "background_job",
            conversation_id = %conversation_id,
            kind = kind.as_str(),
        );

        tokio::spawn(
            async move {
                let permit = semaphore.acquire_owned().await;
                let started = Instant::now();

                let outcome = match permit {
                    // Own task so a panicking job is reported, not lost.
                    Ok(_permit) => match tokio::spawn(job.in_current_span()).await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(join) => Err(format!("job aborted: {join}")),
                    },
                    Err(_) => Err("worker pool closed".to_string()),
                };
                let duration_ms = started.elapsed().as_millis() as u64;

                match &outcome {
                    Ok(()) => tracing::debug!(duration_ms, "background job finished"),
                    Err(e) => tracing::warn!(error = %e, duration_ms, "background job failed"),
                }
                {
                    let mut stats = stats.lock();
                    stats.in_flight = stats.in_flight.saturating_sub(1);
                    if outcome.is_ok() {
                        stats.succeeded += 1;
                    } else {
                        stats.failed += 1;
                    }
                }

                TraceEvent::BackgroundTaskFinished {
                    conversation_id: conversation_id.clone(),
                    kind: kind.as_str().to_owned(),
                    ok: outcome.is_ok(),
                    duration_ms,
                }
                .emit();
                // No subscribers is fine.
                let _ = events.send(BackgroundEvent {
                    conversation_id,
                    kind,
                    ok: outcome.is_ok(),
                    error: outcome.err(),
                    duration_ms,
                });

                if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                    idle.notify_waiters();
                }
            }
            .instrument(span),
        );
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackgroundEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> BackgroundStats {
        *self.stats.lock()
    }

    /// Resolve once no job is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kd_domain::error::Error;
    use std::time::Duration;

    #[tokio::test]
    async fn records_success_and_failure() {
        let pool = BackgroundPool::new(2);
        let mut events = pool.subscribe();

        pool.submit("c1", JobKind::MemoryExtraction, async { Ok(()) });
        pool.submit("c1", JobKind::IntelligenceRefresh, async {
            Err(Error::Other("classifier down".into()))
        });
        pool.wait_idle().await;

        let stats = pool.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.in_flight, 0);

        let mut seen = vec![events.recv().await.unwrap(), events.recv().await.unwrap()];
        seen.sort_by_key(|e| e.ok);
        assert!(!seen[0].ok);
        assert_eq!(seen[0].kind, JobKind::IntelligenceRefresh);
        assert!(seen[0].error.as_deref().unwrap().contains("classifier down"));
        assert!(seen[1].ok);
    }

    #[tokio::test]
    async fn panicking_job_is_counted_as_failure() {
        let pool = BackgroundPool::new(1);
        pool.submit("c", JobKind::MemoryExtraction, async { panic!("boom") });
        pool.wait_idle().await;
        assert_eq!(pool.stats().failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded_by_workers() {
        let pool = BackgroundPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..6 {
            let running = running.clone();
            let peak = peak.clone();
            pool.submit("c", JobKind::MemoryExtraction, async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }
        pool.wait_idle().await;
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(pool.stats().succeeded, 6);
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_empty() {
        let pool = BackgroundPool::new(1);
        pool.wait_idle().await;
        assert_eq!(pool.stats(), BackgroundStats::default());
    }
}
