use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response delivery (chunking + typing cadence)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "d_5")]
    pub max_chunks: usize,
    /// Soft cap on characters per chunk when packing sentences.
    #[serde(default = "d_150")]
    pub max_chunk_chars: usize,
    /// A single-chunk reply longer than this is re-split by words.
    #[serde(default = "d_200")]
    pub word_split_threshold_chars: usize,
    #[serde(default = "d_30")]
    pub max_words_per_chunk: usize,

    #[serde(default = "d_750")]
    pub base_delay_ms: u64,
    #[serde(default = "d_90")]
    pub per_word_delay_ms: u64,
    #[serde(default = "d_250")]
    pub punctuation_pause_ms: u64,
    #[serde(default = "d_350")]
    pub line_break_pause_ms: u64,
    #[serde(default = "d_1000")]
    pub min_delay_ms: u64,
    #[serde(default = "d_6000")]
    pub max_delay_ms: u64,
    #[serde(default = "d_jitter_min")]
    pub jitter_min: f64,
    #[serde(default = "d_jitter_max")]
    pub jitter_max: f64,
    /// Chunks with at most this many words count as "short".
    #[serde(default = "d_4")]
    pub short_chunk_words: usize,
    #[serde(default = "d_400")]
    pub short_chunk_reduction_ms: u64,
    /// The short-chunk reduction only applies above this delay.
    #[serde(default = "d_1200")]
    pub short_chunk_threshold_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_chunks: 5,
            max_chunk_chars: 150,
            word_split_threshold_chars: 200,
            max_words_per_chunk: 30,
            base_delay_ms: 750,
            per_word_delay_ms: 90,
            punctuation_pause_ms: 250,
            line_break_pause_ms: 350,
            min_delay_ms: 1_000,
            max_delay_ms: 6_000,
            jitter_min: 0.9,
            jitter_max: 1.3,
            short_chunk_words: 4,
            short_chunk_reduction_ms: 400,
            short_chunk_threshold_ms: 1_200,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_4() -> usize {
    4
}
fn d_5() -> usize {
    5
}
fn d_30() -> usize {
    30
}
fn d_150() -> usize {
    150
}
fn d_200() -> usize {
    200
}
fn d_90() -> u64 {
    90
}
fn d_250() -> u64 {
    250
}
fn d_350() -> u64 {
    350
}
fn d_400() -> u64 {
    400
}
fn d_750() -> u64 {
    750
}
fn d_1000() -> u64 {
    1_000
}
fn d_1200() -> u64 {
    1_200
}
fn d_6000() -> u64 {
    6_000
}
fn d_jitter_min() -> f64 {
    0.9
}
fn d_jitter_max() -> f64 {
    1.3
}
