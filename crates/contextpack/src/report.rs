use serde::{Deserialize, Serialize};

use crate::layers::Layer;

/// Per-layer size within an assembled prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerReport {
    pub layer: Layer,
    pub chars: usize,
}

/// Machine-readable summary of one prompt build; returned alongside the
/// prompt and by GET /v1/conversations/:id/context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextReport {
    pub layers: Vec<LayerReport>,
    pub total_chars: usize,
    pub memories_included: usize,
    pub topics_included: usize,
    /// Detected user emotion the situational and style layers used.
    pub emotion: String,
    pub reaction: String,
}
