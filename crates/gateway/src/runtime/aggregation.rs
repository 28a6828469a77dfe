//! Aggregation scheduler: debounce bursts of user messages into one turn.
//!
//! Each conversation has at most one open window and one pending timer. A
//! new message moves the deadline to `window` after itself, but never past
//! `window_start + max`; a message that arrives once the cap has already
//! been reached schedules a short `cap_flush` firing instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use kd_domain::config::OrchestratorConfig;
use kd_domain::trace::TraceEvent;

/// Invoked with the conversation id when a window closes. Must not block.
pub type FireFn = Arc<dyn Fn(String) + Send + Sync>;

struct Window {
    started: Instant,
    epoch: u64,
    timer: AbortHandle,
}

/// What [`AggregationScheduler::on_user_message`] decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub delay: Duration,
    /// Time since the first message of the burst.
    pub window_age: Duration,
    /// The deadline was pulled in by the burst cap.
    pub capped: bool,
}

pub struct AggregationScheduler {
    window: Duration,
    max: Duration,
    cap_flush: Duration,
    windows: Arc<Mutex<HashMap<String, Window>>>,
    on_fire: FireFn,
}

impl AggregationScheduler {
    pub fn new(cfg: &OrchestratorConfig, on_fire: FireFn) -> Self {
        Self {
            window: cfg.aggregation_window(),
            max: cfg.aggregation_max(),
            cap_flush: cfg.cap_flush_delay(),
            windows: Arc::new(Mutex::new(HashMap::new())),
            on_fire,
        }
    }

    /// Open or extend the window for `conversation_id` and (re)arm its
    /// timer. Any previously pending timer is cancelled.
    pub fn on_user_message(&self, conversation_id: &str) -> Scheduled {
        let now = Instant::now();
        let mut windows = self.windows.lock();

        let (started, epoch) = match windows.get(conversation_id) {
            Some(w) => {
                w.timer.abort();
                (w.started, w.epoch + 1)
            }
            None => (now, 0),
        };

        let window_age = now.saturating_duration_since(started);
        let scheduled = next_firing(self.window, self.max, self.cap_flush, window_age);

        let timer = self.arm(conversation_id, started, epoch, scheduled.delay);
        windows.insert(
            conversation_id.to_owned(),
            Window {
                started,
                epoch,
                timer,
            },
        );
        drop(windows);

        TraceEvent::AggregationScheduled {
            conversation_id: conversation_id.to_owned(),
            delay_ms: scheduled.delay.as_millis() as u64,
            window_age_ms: window_age.as_millis() as u64,
            capped: scheduled.capped,
        }
        .emit();

        scheduled
    }

    /// Close the window without firing.
    pub fn cancel(&self, conversation_id: &str) -> bool {
        match self.windows.lock().remove(conversation_id) {
            Some(w) => {
                w.timer.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, conversation_id: &str) -> bool {
        self.windows.lock().contains_key(conversation_id)
    }

    pub fn pending_count(&self) -> usize {
        self.windows.lock().len()
    }

    fn arm(&self, conversation_id: &str, started: Instant, epoch: u64, delay: Duration) -> AbortHandle {
        let windows = Arc::clone(&self.windows);
        let on_fire = Arc::clone(&self.on_fire);
        let id = conversation_id.to_owned();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // A reschedule may have raced the abort; only the current epoch fires.
            {
                let mut windows = windows.lock();
                match windows.get(&id) {
                    Some(w) if w.epoch == epoch => {
                        windows.remove(&id);
                    }
                    _ => return,
                }
            }

            TraceEvent::AggregationFired {
                conversation_id: id.clone(),
                window_age_ms: started.elapsed().as_millis() as u64,
            }
            .emit();
            on_fire(id);
        });
        handle.abort_handle()
    }
}

/// Delay until the window should close, given how long it has been open.
fn next_firing(window: Duration, max: Duration, cap_flush: Duration, window_age: Duration) -> Scheduled {
    if window_age >= max {
        return Scheduled {
            delay: cap_flush,
            window_age,
            capped: true,
        };
    }
    let remaining = max - window_age;
    Scheduled {
        delay: window.min(remaining),
        window_age,
        capped: remaining < window,
    }
}

impl Drop for AggregationScheduler {
    fn drop(&mut self) {
        for (_, w) in self.windows.lock().drain() {
            w.timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (FireFn, Arc<Mutex<Vec<(String, Instant)>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let f: FireFn = Arc::new(move |id| sink.lock().push((id, Instant::now())));
        (f, fired)
    }

    fn scheduler(on_fire: FireFn) -> AggregationScheduler {
        AggregationScheduler::new(&OrchestratorConfig::default(), on_fire)
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn single_message_fires_after_window() {
        let (f, fired) = recorder();
        let s = scheduler(f);
        let t0 = Instant::now();

        let d = s.on_user_message("c");
        assert_eq!(d.delay, Duration::from_secs(2));
        assert!(!d.capped);

        sleep_ms(1_999).await;
        assert!(fired.lock().is_empty());
        sleep_ms(2).await;

        let fired = fired.lock();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1 - t0, Duration::from_secs(2));
        assert!(!s.is_pending("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_restarts_from_last_message() {
        let (f, fired) = recorder();
        let s = scheduler(f);
        let t0 = Instant::now();

        s.on_user_message("c");
        sleep_ms(1_000).await;
        s.on_user_message("c");
        sleep_ms(800).await;
        s.on_user_message("c");

        sleep_ms(1_000).await; // t = 2.8s
        assert!(fired.lock().is_empty());
        sleep_ms(1_500).await;

        let fired = fired.lock();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1 - t0, Duration::from_millis(3_800));
    }

    #[tokio::test(start_paused = true)]
    async fn continuous_burst_is_capped() {
        let (f, fired) = recorder();
        let s = scheduler(f);
        let t0 = Instant::now();

        // Every 1.5s; without the cap the last one would push firing to 6.5s.
        for _ in 0..3 {
            s.on_user_message("c");
            sleep_ms(1_500).await;
        }
        let last = s.on_user_message("c"); // t = 4.5s
        assert!(last.capped);
        assert_eq!(last.delay, Duration::from_millis(1_500));

        sleep_ms(1_400).await; // t = 5.9s
        assert!(fired.lock().is_empty());
        sleep_ms(200).await;
        let fired = fired.lock();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1 - t0, Duration::from_secs(6));
    }

    #[test]
    fn next_firing_rules() {
        let w = Duration::from_secs(2);
        let max = Duration::from_secs(6);
        let flush = Duration::from_millis(200);

        let fresh = next_firing(w, max, flush, Duration::ZERO);
        assert_eq!(fresh.delay, w);
        assert!(!fresh.capped);

        let near_cap = next_firing(w, max, flush, Duration::from_millis(4_500));
        assert_eq!(near_cap.delay, Duration::from_millis(1_500));
        assert!(near_cap.capped);

        let past_cap = next_firing(w, max, flush, Duration::from_millis(6_000));
        assert_eq!(past_cap.delay, flush);
        assert!(past_cap.capped);
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_timer_per_conversation() {
        let (f, fired) = recorder();
        let s = scheduler(f);
        for _ in 0..5 {
            s.on_user_message("c");
            sleep_ms(100).await;
        }
        assert_eq!(s.pending_count(), 1);
        sleep_ms(5_000).await;
        assert_eq!(fired.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn conversations_are_independent() {
        let (f, fired) = recorder();
        let s = scheduler(f);
        s.on_user_message("a");
        sleep_ms(1_000).await;
        s.on_user_message("b");
        sleep_ms(1_001).await;
        assert_eq!(fired.lock().len(), 1);
        assert_eq!(fired.lock()[0].0, "a");
        sleep_ms(1_000).await;
        assert_eq!(fired.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let (f, fired) = recorder();
        let s = scheduler(f);
        s.on_user_message("c");
        assert!(s.cancel("c"));
        assert!(!s.cancel("c"));
        sleep_ms(3_000).await;
        assert!(fired.lock().is_empty());
    }
}
