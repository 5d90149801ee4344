//! Normalize `codex exec --json` output into [`StreamChunk`]s.
//!
//! Different CLI versions describe the same content with different event
//! shapes. Each shape is handled by one entry in [`RULES`]; the first rule
//! whose guard matches an event decides what it produces, even if that is
//! nothing.

use serde_json::Value;

use super::types::CliError;
use super::types::StreamChunk;
use super::usage::normalize_usage;
use crate::model_info::ModelDescriptor;

const TEXT_DELTA_TYPES: &[&str] = &["response.output_text.delta", "response.text.delta"];
const REASONING_DELTA_TYPES: &[&str] = &[
    "response.reasoning.delta",
    "response.reasoning_text.delta",
    "response.reasoning_summary.delta",
    "response.reasoning_summary_text.delta",
];
const TOOL_CALL_DELTA_TYPES: &[&str] = &[
    "response.function_call_arguments.delta",
    "response.tool_call_arguments.delta",
];
const OUTPUT_ITEM_TYPES: &[&str] = &["response.output_item.added", "response.output_item.done"];
const COMPLETED_TYPES: &[&str] = &["response.completed", "response.done"];

const GENERIC_ERROR_MESSAGE: &str = "Codex CLI reported an error";

/// A guard plus translator. Returns `None` when the event is not this
/// rule's shape, `Some(chunks)` (possibly empty) when it is.
type Rule = fn(&Value, &ModelDescriptor) -> Option<Vec<StreamChunk>>;

/// Evaluated in order, first match wins.
const RULES: &[(&str, Rule)] = &[
    ("text_delta", text_delta),
    ("reasoning_delta", reasoning_delta),
    ("tool_call_delta", tool_call_delta),
    ("output_item", output_item),
    ("response_completed", response_completed),
    ("chat_completion_delta", chat_completion_delta),
    ("legacy_msg", legacy_msg),
    ("exec_item", exec_item),
    ("turn_completed", turn_completed),
    ("fallback", fallback),
];

/// Parse one stdout line. Blank and non-JSON lines yield `None`.
pub fn parse_event_line(line: &str) -> Option<Value> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Skipping non-JSON line from Codex CLI ({e}): {trimmed}");
            None
        }
    }
}

/// Fail if the event signals an error.
///
/// Any of these counts: a type containing "error", `status == "error"`, or a
/// non-empty `error` field. The legacy `msg` envelope is checked the same
/// way.
pub fn check_event_error(event: &Value) -> Result<(), CliError> {
    if signals_error(event) {
        return Err(CliError::ProtocolEvent {
            message: error_message(event),
        });
    }
    if let Some(msg) = event.get("msg").filter(|m| m.is_object())
        && signals_error(msg)
    {
        return Err(CliError::ProtocolEvent {
            message: error_message(msg),
        });
    }
    Ok(())
}

fn signals_error(event: &Value) -> bool {
    let type_signal = event_type(event).is_some_and(|t| t.contains("error"));
    let status_signal = event
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("error"));
    let field_signal = event.get("error").is_some_and(is_non_empty);
    type_signal || status_signal || field_signal
}

/// Map one event to zero or more chunks.
pub fn normalize_event(event: &Value, model: &ModelDescriptor) -> Vec<StreamChunk> {
    for (name, rule) in RULES {
        if let Some(chunks) = rule(event, model) {
            tracing::trace!("Event matched {name} rule, {} chunk(s)", chunks.len());
            return chunks;
        }
    }
    Vec::new()
}

fn error_message(event: &Value) -> String {
    let error = event.get("error");
    error
        .and_then(|e| e.get("message"))
        .and_then(non_empty_str)
        .or_else(|| error.and_then(non_empty_str))
        .or_else(|| event.get("message").and_then(non_empty_str))
        .unwrap_or(GENERIC_ERROR_MESSAGE)
        .to_string()
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn event_type(event: &Value) -> Option<String> {
    event
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
}

fn type_is(event: &Value, types: &[&str]) -> bool {
    event_type(event).is_some_and(|t| types.contains(&t.as_str()))
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
}

fn text_delta(event: &Value, _: &ModelDescriptor) -> Option<Vec<StreamChunk>> {
    if !type_is(event, TEXT_DELTA_TYPES) {
        return None;
    }
    Some(
        event
            .get("delta")
            .and_then(non_empty_str)
            .map(StreamChunk::text)
            .into_iter()
            .collect(),
    )
}

fn reasoning_delta(event: &Value, _: &ModelDescriptor) -> Option<Vec<StreamChunk>> {
    if !type_is(event, REASONING_DELTA_TYPES) {
        return None;
    }
    Some(
        event
            .get("delta")
            .and_then(non_empty_str)
            .map(StreamChunk::reasoning)
            .into_iter()
            .collect(),
    )
}

fn tool_call_delta(event: &Value, _: &ModelDescriptor) -> Option<Vec<StreamChunk>> {
    if !type_is(event, TOOL_CALL_DELTA_TYPES) {
        return None;
    }

    let index = ["index", "output_index"]
        .iter()
        .find_map(|key| event.get(*key).and_then(Value::as_u64))
        .unwrap_or(0);

    Some(vec![StreamChunk::ToolCallPartial {
        index,
        id: str_field(event, &["call_id", "tool_call_id", "id"]).map(str::to_string),
        name: str_field(event, &["name", "function_name"]).map(str::to_string),
        arguments_fragment: str_field(event, &["delta", "arguments"])
            .unwrap_or_default()
            .to_string(),
    }])
}

fn output_item(event: &Value, _: &ModelDescriptor) -> Option<Vec<StreamChunk>> {
    if !type_is(event, OUTPUT_ITEM_TYPES) {
        return None;
    }
    Some(event.get("item").map(item_chunks).unwrap_or_default())
}

fn response_completed(event: &Value, model: &ModelDescriptor) -> Option<Vec<StreamChunk>> {
    if !type_is(event, COMPLETED_TYPES) {
        return None;
    }
    let usage = event
        .get("response")
        .and_then(|r| r.get("usage"))
        .filter(|u| u.is_object())
        .or_else(|| event.get("usage"));
    Some(normalize_usage(usage, model).into_iter().collect())
}

fn chat_completion_delta(event: &Value, _: &ModelDescriptor) -> Option<Vec<StreamChunk>> {
    let choice = event.get("choices")?.as_array()?.first()?;
    Some(
        choice
            .get("delta")
            .and_then(|d| d.get("content"))
            .and_then(non_empty_str)
            .map(StreamChunk::text)
            .into_iter()
            .collect(),
    )
}

/// `{"id": "0", "msg": {"type": "agent_message_delta", "delta": "..."}}`
fn legacy_msg(event: &Value, model: &ModelDescriptor) -> Option<Vec<StreamChunk>> {
    let msg = event.get("msg").filter(|m| m.is_object())?;
    let text = |key: &str| msg.get(key).and_then(non_empty_str);

    let chunk = match event_type(msg).as_deref() {
        Some("agent_message_delta") => text("delta").map(StreamChunk::text),
        Some("agent_message") => text("message").map(StreamChunk::text),
        Some("agent_reasoning_delta") => text("delta").map(StreamChunk::reasoning),
        Some("agent_reasoning") => text("text").map(StreamChunk::reasoning),
        Some("token_count") => {
            let usage = msg
                .get("info")
                .and_then(|info| info.get("last_token_usage"))
                .or_else(|| msg.get("info").filter(|info| info.is_object()))
                .unwrap_or(msg);
            normalize_usage(Some(usage), model)
        }
        _ => None,
    };
    Some(chunk.into_iter().collect())
}

/// `{"type": "item.completed", "item": {"type": "agent_message", "text": "..."}}`
///
/// Only completed items carry final text; started and updated events are
/// consumed without output.
fn exec_item(event: &Value, _: &ModelDescriptor) -> Option<Vec<StreamChunk>> {
    let kind = event_type(event)?;
    if !kind.starts_with("item.") {
        return None;
    }
    if kind != "item.completed" {
        return Some(Vec::new());
    }
    Some(event.get("item").map(item_chunks).unwrap_or_default())
}

fn turn_completed(event: &Value, model: &ModelDescriptor) -> Option<Vec<StreamChunk>> {
    if !type_is(event, &["turn.completed"]) {
        return None;
    }
    Some(normalize_usage(event.get("usage"), model).into_iter().collect())
}

/// Minimal shapes from older CLI builds: a bare item, a message, plain text,
/// or a top-level usage object.
fn fallback(event: &Value, model: &ModelDescriptor) -> Option<Vec<StreamChunk>> {
    if let Some(item) = event.get("item").filter(|i| i.is_object()) {
        let chunks = item_chunks(item);
        if !chunks.is_empty() {
            return Some(chunks);
        }
    }

    match event.get("message") {
        Some(Value::String(text)) if !text.is_empty() => {
            return Some(vec![StreamChunk::text(text.as_str())]);
        }
        Some(message @ Value::Object(_)) => {
            let chunks = content_block_chunks(message);
            if !chunks.is_empty() {
                return Some(chunks);
            }
        }
        _ => {}
    }

    if let Some(text) = event.get("text").and_then(non_empty_str) {
        return Some(vec![StreamChunk::text(text)]);
    }

    normalize_usage(event.get("usage"), model).map(|chunk| vec![chunk])
}

fn item_chunks(item: &Value) -> Vec<StreamChunk> {
    let text = item.get("text").and_then(non_empty_str);
    match event_type(item).as_deref() {
        Some("text" | "output_text" | "agent_message") => {
            text.map(StreamChunk::text).into_iter().collect()
        }
        Some("reasoning") => match text {
            Some(text) => vec![StreamChunk::reasoning(text)],
            None => item
                .get("summary")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|part| part.get("text").and_then(non_empty_str))
                .map(StreamChunk::reasoning)
                .collect(),
        },
        Some("message") => content_block_chunks(item),
        _ => Vec::new(),
    }
}

/// One text chunk per `output_text`/`text` block in `content`.
fn content_block_chunks(message: &Value) -> Vec<StreamChunk> {
    message
        .get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|block| {
            matches!(
                block.get("type").and_then(Value::as_str),
                Some("output_text" | "text")
            )
        })
        .filter_map(|block| block.get("text").and_then(non_empty_str))
        .map(StreamChunk::text)
        .collect()
}
