use serde::Serialize;

/// Structured trace events emitted across all Kindred crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    MessageStored {
        conversation_id: String,
        message_id: String,
        sender: String,
    },
    AggregationScheduled {
        conversation_id: String,
        delay_ms: u64,
        window_age_ms: u64,
        capped: bool,
    },
    AggregationFired {
        conversation_id: String,
        window_age_ms: u64,
    },
    GenerationSkipped {
        conversation_id: String,
        rerun_queued: bool,
    },
    GenerationStarted {
        conversation_id: String,
        history_len: usize,
    },
    GenerationFinished {
        conversation_id: String,
        chunks: usize,
        duration_ms: u64,
        ok: bool,
    },
    ChunkDelivered {
        conversation_id: String,
        chunk_index: usize,
        chunk_total: usize,
        delay_ms: u64,
    },
    ContextBuilt {
        conversation_id: String,
        total_chars: usize,
        layers: usize,
        memories_included: usize,
    },
    EmotionAnalyzed {
        conversation_id: String,
        primary: String,
        intensity: f32,
        fallback: bool,
    },
    MemoriesExtracted {
        conversation_id: String,
        extracted: usize,
        retained: usize,
    },
    BackgroundTaskFinished {
        conversation_id: String,
        kind: String,
        ok: bool,
        duration_ms: u64,
    },
    LlmRequest {
        provider: String,
        model: String,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "kd_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let ev = TraceEvent::AggregationFired {
            conversation_id: "c1".into(),
            window_age_ms: 3800,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "AggregationFired");
        assert_eq!(json["window_age_ms"], 3800);
    }
}
