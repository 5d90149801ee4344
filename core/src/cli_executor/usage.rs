//! Token accounting across the usage field names different Codex CLI
//! versions have emitted.
//!
//! Supported layouts:
//! - Responses API: `input_tokens`, `output_tokens`, `input_tokens_details`
//! - Chat Completions: `prompt_tokens`, `completion_tokens`, `prompt_tokens_details`
//! - Anthropic-style cache fields: `cache_creation_input_tokens`, `cache_read_input_tokens`
//! - `codex exec --json`: `cached_input_tokens`, `reasoning_output_tokens`

use serde_json::Value;

use super::types::StreamChunk;
use super::types::TokenCounts;
use super::types::UsageSummary;
use crate::model_info::ModelDescriptor;

const INPUT_KEYS: &[&str] = &["input_tokens", "prompt_tokens"];
const OUTPUT_KEYS: &[&str] = &["output_tokens", "completion_tokens"];
const CACHE_WRITE_KEYS: &[&str] = &["cache_creation_input_tokens", "cache_write_tokens"];
const CACHE_READ_KEYS: &[&str] = &[
    "cache_read_input_tokens",
    "cached_input_tokens",
    "cache_read_tokens",
];
const INPUT_DETAIL_KEYS: &[&str] = &["input_tokens_details", "prompt_tokens_details"];
const OUTPUT_DETAIL_KEYS: &[&str] = &["output_tokens_details", "completion_tokens_details"];

/// Turn a raw usage object into a priced [`StreamChunk::Usage`].
///
/// Returns `None` when there is no usage object at all.
pub fn normalize_usage(usage: Option<&Value>, model: &ModelDescriptor) -> Option<StreamChunk> {
    let counts = resolve_token_counts(usage?)?;
    Some(StreamChunk::Usage(UsageSummary::priced(
        counts,
        &model.pricing,
    )))
}

/// Resolve token counts from whichever field names are present.
///
/// Absent fields count as zero. Returns `None` for anything but a JSON object.
pub fn resolve_token_counts(usage: &Value) -> Option<TokenCounts> {
    if !usage.is_object() {
        return None;
    }

    let input_details = first_object(usage, INPUT_DETAIL_KEYS);

    let mut input_tokens = first_count(usage, INPUT_KEYS);
    if input_tokens == 0
        && let Some(details) = input_details
    {
        // Some providers only report the cached / uncached split.
        let split = count(details, "cached_tokens") + count(details, "cache_miss_tokens");
        if split > 0 {
            input_tokens = split;
        }
    }

    let mut cache_read_tokens = first_count(usage, CACHE_READ_KEYS);
    if cache_read_tokens == 0
        && let Some(details) = input_details
    {
        cache_read_tokens = count(details, "cached_tokens");
    }

    let reasoning_tokens = first_object(usage, OUTPUT_DETAIL_KEYS)
        .and_then(|details| details.get("reasoning_tokens"))
        .or_else(|| usage.get("reasoning_output_tokens"))
        .and_then(as_count);

    Some(TokenCounts {
        input_tokens,
        output_tokens: first_count(usage, OUTPUT_KEYS),
        cache_write_tokens: first_count(usage, CACHE_WRITE_KEYS),
        cache_read_tokens,
        reasoning_tokens,
    })
}

fn first_object<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find(|v| v.is_object())
}

/// First key that holds a number wins; zero if none does.
fn first_count(value: &Value, keys: &[&str]) -> u64 {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(as_count))
        .next()
        .unwrap_or(0)
}

fn count(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(as_count).unwrap_or(0)
}

/// Non-negative integer view of a JSON number. Negative values clamp to
/// zero and fractional values round.
fn as_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if value.as_i64().is_some() {
        return Some(0);
    }
    value.as_f64().map(|f| if f > 0.0 { f.round() as u64 } else { 0 })
}
