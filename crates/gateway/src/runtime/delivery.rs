//! Response delivery simulator.
//!
//! Splits one completion into chat-sized chunks and stores them one by one
//! with a human-looking typing pause between them, keeping the typing
//! tracker in step.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use kd_domain::companion::PersonalityTraits;
use kd_domain::config::DeliveryConfig;
use kd_domain::conversation::{Message, NewMessage};
use kd_domain::error::Error;
use kd_domain::trace::TraceEvent;
use kd_store::ConversationStore;

use super::typing::TypingTracker;

const HIGH_CONFIDENCE_FACTOR: f64 = 0.9;
const HIGH_INTELLIGENCE_FACTOR: f64 = 0.95;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chunking
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Split on runs of terminal punctuation followed by whitespace (or the end
/// of the text). Punctuation stays with its sentence; "3.5" is not a break.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if !is_terminal(c) {
            continue;
        }
        while let Some(&next) = chars.peek() {
            if is_terminal(next) {
                current.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if chars.peek().map_or(true, |n| n.is_whitespace()) {
            let s = current.trim();
            if !s.is_empty() {
                sentences.push(s.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Pack a reply into at most `max_chunks` chunks.
pub fn split_reply(reply: &str, cfg: &DeliveryConfig) -> Vec<String> {
    let max_chunks = cfg.max_chunks.max(1);
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(reply) {
        if current.is_empty() {
            current = sentence;
            continue;
        }
        let fits = current.chars().count() + 1 + sentence.chars().count() <= cfg.max_chunk_chars;
        // The last permitted chunk absorbs everything that remains.
        if fits || chunks.len() + 1 >= max_chunks {
            current.push(' ');
            current.push_str(&sentence);
        } else {
            chunks.push(std::mem::take(&mut current));
            current = sentence;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    if chunks.len() == 1 && reply.trim().chars().count() > cfg.word_split_threshold_chars {
        return split_words(&chunks[0], cfg.max_words_per_chunk.max(1), max_chunks);
    }
    chunks
}

fn split_words(text: &str, per_chunk: usize, max_chunks: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks: Vec<String> = words.chunks(per_chunk).map(|w| w.join(" ")).collect();
    if chunks.len() > max_chunks {
        let rest = chunks.split_off(max_chunks - 1).join(" ");
        chunks.push(rest);
    }
    chunks
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Typing cadence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Typing pause for `chunk` before the next one, with the jitter factor
/// supplied by the caller.
pub fn typing_delay(
    chunk: &str,
    traits: &PersonalityTraits,
    jitter: f64,
    cfg: &DeliveryConfig,
) -> Duration {
    let words = chunk.split_whitespace().count();
    let mut ms = cfg.base_delay_ms as f64 + cfg.per_word_delay_ms as f64 * words as f64;
    if chunk.trim_end().ends_with(is_terminal) {
        ms += cfg.punctuation_pause_ms as f64;
    }
    if chunk.trim().contains('\n') {
        ms += cfg.line_break_pause_ms as f64;
    }
    if traits.high_confidence() {
        ms *= HIGH_CONFIDENCE_FACTOR;
    }
    if traits.high_intelligence() {
        ms *= HIGH_INTELLIGENCE_FACTOR;
    }
    ms *= jitter;

    let min = cfg.min_delay_ms as f64;
    let max = cfg.max_delay_ms as f64;
    ms = ms.clamp(min, max);
    if words <= cfg.short_chunk_words && ms > cfg.short_chunk_threshold_ms as f64 {
        ms = (ms - cfg.short_chunk_reduction_ms as f64).max(min);
    }
    Duration::from_millis(ms.round() as u64)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delivery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ResponseDelivery {
    cfg: DeliveryConfig,
    store: Arc<dyn ConversationStore>,
    typing: Arc<TypingTracker>,
    rng: Mutex<StdRng>,
}

impl ResponseDelivery {
    pub fn new(
        cfg: DeliveryConfig,
        store: Arc<dyn ConversationStore>,
        typing: Arc<TypingTracker>,
    ) -> Self {
        Self::with_rng(cfg, store, typing, StdRng::from_entropy())
    }

    /// Fixed jitter sequence, for reproducible pacing.
    pub fn seeded(
        cfg: DeliveryConfig,
        store: Arc<dyn ConversationStore>,
        typing: Arc<TypingTracker>,
        seed: u64,
    ) -> Self {
        Self::with_rng(cfg, store, typing, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        cfg: DeliveryConfig,
        store: Arc<dyn ConversationStore>,
        typing: Arc<TypingTracker>,
        rng: StdRng,
    ) -> Self {
        Self {
            cfg,
            store,
            typing,
            rng: Mutex::new(rng),
        }
    }

    fn jitter(&self) -> f64 {
        let (lo, hi) = (self.cfg.jitter_min, self.cfg.jitter_max);
        if hi <= lo {
            return lo;
        }
        self.rng.lock().gen_range(lo..=hi)
    }

    /// Store `reply` as a sequence of companion chunks. Sleeps between
    /// chunks, never after the last one.
    ///
    /// A store failure stops the sequence and marks the typing entry
    /// finished; the chunks stored before it are returned alongside the
    /// error. A reply with no text clears the typing entry and stores
    /// nothing.
    pub async fn deliver(
        &self,
        conversation_id: &str,
        reply: &str,
        traits: &PersonalityTraits,
    ) -> Delivery {
        let chunks = split_reply(reply, &self.cfg);
        let total = chunks.len();
        let mut delivery = Delivery {
            messages: Vec::with_capacity(total),
            planned: total,
            error: None,
        };
        if total == 0 {
            self.typing.clear(conversation_id);
            return delivery;
        }
        self.typing.set_total(conversation_id, total);

        for (index, text) in chunks.into_iter().enumerate() {
            let is_last = index + 1 == total;
            let delay = if is_last {
                Duration::ZERO
            } else {
                typing_delay(&text, traits, self.jitter(), &self.cfg)
            };

            let message = match self
                .store
                .append_message(NewMessage::companion_chunk(conversation_id, text, index, total))
                .await
            {
                Ok(m) => m,
                Err(e) => {
                    self.typing.stop(conversation_id);
                    delivery.error = Some(e);
                    break;
                }
            };
            self.typing.update(conversation_id, index, total);

            TraceEvent::ChunkDelivered {
                conversation_id: conversation_id.to_owned(),
                chunk_index: index,
                chunk_total: total,
                delay_ms: delay.as_millis() as u64,
            }
            .emit();
            delivery.messages.push(message);

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        delivery
    }

    /// Longest pause that can separate two chunks of one reply.
    pub fn max_gap(&self) -> Duration {
        Duration::from_millis(self.cfg.max_delay_ms)
    }
}

/// Outcome of [`ResponseDelivery::deliver`].
#[derive(Debug)]
pub struct Delivery {
    /// Chunks stored, in order.
    pub messages: Vec<Message>,
    /// Chunks the reply was split into.
    pub planned: usize,
    /// Set when storing a chunk failed; later chunks were not attempted.
    pub error: Option<Error>,
}

impl Delivery {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.messages.len() == self.planned
    }
}
