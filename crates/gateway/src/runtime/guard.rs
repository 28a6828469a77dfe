//! Per-conversation generation guard.
//!
//! At most one reply generation runs per conversation. A firing that finds
//! the guard held either gives up or leaves a rerun flag behind, which the
//! holder collects when it releases.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Default)]
struct GuardState {
    active: HashSet<String>,
    pending_rerun: HashSet<String>,
}

/// Manages per-conversation generation flags.
#[derive(Default)]
pub struct GenerationGuard {
    inner: Mutex<GuardState>,
}

/// Outcome of [`GenerationGuard::acquire`].
pub enum Acquire {
    Acquired(GenerationPermit),
    Busy { rerun_queued: bool },
}

impl GenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim the flag. `false` when a generation is already
    /// running for this conversation.
    pub fn try_acquire(&self, conversation_id: &str) -> bool {
        self.inner.lock().active.insert(conversation_id.to_owned())
    }

    /// Clear the flag. Safe to call when nothing is held. Returns whether a
    /// rerun was requested while the flag was held; the request is consumed.
    pub fn release(&self, conversation_id: &str) -> bool {
        let mut inner = self.inner.lock();
        inner.active.remove(conversation_id);
        inner.pending_rerun.remove(conversation_id)
    }

    /// Claim the flag and wrap it in a permit that releases on drop. When
    /// busy and `queue_rerun` is set, the rerun flag is recorded under the
    /// same lock so the holder cannot miss it.
    pub fn acquire(self: &Arc<Self>, conversation_id: &str, queue_rerun: bool) -> Acquire {
        let mut inner = self.inner.lock();
        if inner.active.insert(conversation_id.to_owned()) {
            return Acquire::Acquired(GenerationPermit {
                guard: Arc::clone(self),
                conversation_id: conversation_id.to_owned(),
                released: false,
            });
        }
        if queue_rerun {
            inner.pending_rerun.insert(conversation_id.to_owned());
        }
        Acquire::Busy {
            rerun_queued: queue_rerun,
        }
    }

    pub fn is_active(&self, conversation_id: &str) -> bool {
        self.inner.lock().active.contains(conversation_id)
    }

    /// Number of generations currently in flight.
    pub fn active_count(&self) -> usize {
        self.inner.lock().active.len()
    }
}

/// Held for the duration of one generation. Dropping it releases the guard
/// on every exit path, including a panicking task.
pub struct GenerationPermit {
    guard: Arc<GenerationGuard>,
    conversation_id: String,
    released: bool,
}

impl GenerationPermit {
    /// Release explicitly and report whether a rerun was requested.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.guard.release(&self.conversation_id)
    }
}

impl Drop for GenerationPermit {
    fn drop(&mut self) {
        if !self.released {
            self.guard.release(&self.conversation_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let guard = GenerationGuard::new();
        assert!(guard.try_acquire("c1"));
        assert!(!guard.try_acquire("c1"));
        assert!(guard.try_acquire("c2"));
        assert_eq!(guard.active_count(), 2);

        guard.release("c1");
        assert!(guard.try_acquire("c1"));
    }

    #[test]
    fn release_without_hold_is_harmless() {
        let guard = GenerationGuard::new();
        assert!(!guard.release("ghost"));
        assert!(!guard.release("ghost"));
        assert!(guard.try_acquire("ghost"));
        assert!(!guard.try_acquire("ghost"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acquire_has_one_winner() {
        let guard = Arc::new(GenerationGuard::new());
        let barrier = Arc::new(tokio::sync::Barrier::new(16));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let guard = guard.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                guard.try_acquire("c")
            }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[test]
    fn permit_releases_on_drop() {
        let guard = Arc::new(GenerationGuard::new());
        match guard.acquire("c", false) {
            Acquire::Acquired(permit) => {
                assert!(guard.is_active("c"));
                drop(permit);
            }
            Acquire::Busy { .. } => panic!("expected to acquire"),
        }
        assert!(!guard.is_active("c"));
    }

    #[test]
    fn busy_acquire_queues_rerun_for_holder() {
        let guard = Arc::new(GenerationGuard::new());
        let Acquire::Acquired(permit) = guard.acquire("c", true) else {
            panic!("expected to acquire");
        };
        assert!(matches!(
            guard.acquire("c", true),
            Acquire::Busy { rerun_queued: true }
        ));
        assert!(permit.release());
        assert!(!guard.is_active("c"));

        // Consumed by the release above.
        let Acquire::Acquired(permit) = guard.acquire("c", true) else {
            panic!("expected to acquire");
        };
        assert!(!permit.release());
    }

    #[test]
    fn skip_policy_leaves_no_rerun() {
        let guard = Arc::new(GenerationGuard::new());
        let Acquire::Acquired(permit) = guard.acquire("c", false) else {
            panic!("expected to acquire");
        };
        assert!(matches!(
            guard.acquire("c", false),
            Acquire::Busy { rerun_queued: false }
        ));
        assert!(!permit.release());
    }
}
