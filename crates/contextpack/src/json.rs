//! Pull a JSON object out of a model reply that may wrap it in prose or
//! code fences.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex"));

/// Outermost `{...}` span of `raw`, parsed into `T`.
pub fn extract<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let span = JSON_OBJECT.find(raw)?;
    serde_json::from_str(span.as_str()).ok()
}
