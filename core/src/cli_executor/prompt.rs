//! Translate chat messages into the payload `codex exec` reads from stdin.
//!
//! The Codex CLI cannot take image input through this path, so every image
//! block is replaced by a text placeholder naming what was dropped.

use serde::Serialize;

use super::types::CliError;
use crate::context_manager::ContentBlock;
use crate::context_manager::ImageSource;
use crate::context_manager::Message;
use crate::context_manager::MessageContent;
use crate::context_manager::MessageRole;
use crate::context_manager::ToolResultContent;

/// Request body written to the CLI's standard input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub messages: Vec<StructuredMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredMessage {
    pub role: MessageRole,
    pub content: StructuredContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StructuredContent {
    Text(String),
    Blocks(Vec<PayloadBlock>),
}

/// Content block kinds the CLI accepts. There is deliberately no image kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadBlock {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        content: ToolResultPayload,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolResultPayload {
    Text(String),
    Blocks(Vec<TextPart>),
}

/// A `{"type": "text", "text": ...}` block nested inside a tool result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "text")]
pub struct TextPart {
    pub text: String,
}

impl PromptPayload {
    /// Serialize to the JSON text written on stdin.
    pub fn to_wire(&self) -> Result<String, CliError> {
        serde_json::to_string(self).map_err(|e| CliError::Internal {
            message: format!("Failed to serialize prompt payload: {e}"),
        })
    }
}

/// Build the CLI payload from a system prompt and chat history.
///
/// The system prompt is trimmed and omitted when empty. String content
/// passes through untouched; block content goes through [`translate_block`].
pub fn build_prompt(system_prompt: &str, messages: &[Message]) -> Result<PromptPayload, CliError> {
    let system_prompt = system_prompt.trim();
    let system_prompt = (!system_prompt.is_empty()).then(|| system_prompt.to_string());

    let messages = messages
        .iter()
        .map(|message| {
            let content = match &message.content {
                MessageContent::Text(text) => StructuredContent::Text(text.clone()),
                MessageContent::Blocks(blocks) => StructuredContent::Blocks(
                    blocks
                        .iter()
                        .map(translate_block)
                        .collect::<Result<Vec<_>, _>>()?,
                ),
            };
            Ok(StructuredMessage {
                role: message.role,
                content,
            })
        })
        .collect::<Result<Vec<_>, CliError>>()?;

    Ok(PromptPayload {
        system_prompt,
        messages,
    })
}

/// Map one chat content block to the CLI's block kinds.
pub fn translate_block(block: &ContentBlock) -> Result<PayloadBlock, CliError> {
    match block {
        ContentBlock::Text { text } => Ok(PayloadBlock::Text { text: text.clone() }),
        ContentBlock::Image { source } => Ok(PayloadBlock::Text {
            text: image_placeholder(source),
        }),
        ContentBlock::ToolUse { id, name, input } => Ok(PayloadBlock::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: input.clone(),
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            ..
        } => {
            let content = match content {
                ToolResultContent::Text(text) => ToolResultPayload::Text(text.clone()),
                ToolResultContent::Blocks(blocks) => {
                    let mut parts = Vec::new();
                    render_tool_result_blocks(blocks, &mut parts);
                    ToolResultPayload::Blocks(parts)
                }
            };
            Ok(PayloadBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content,
            })
        }
        ContentBlock::Unsupported => Err(CliError::MalformedMessage {
            details: "content block has an unrecognized type".to_string(),
        }),
    }
}

/// Flatten nested tool-result content to text parts. Images become
/// placeholders, every other non-text kind is dropped.
fn render_tool_result_blocks(blocks: &[ContentBlock], parts: &mut Vec<TextPart>) {
    for block in blocks {
        match block {
            ContentBlock::Text { text } => parts.push(TextPart { text: text.clone() }),
            ContentBlock::Image { source } => parts.push(TextPart {
                text: image_placeholder(source),
            }),
            ContentBlock::ToolResult { content, .. } => match content {
                ToolResultContent::Text(text) => parts.push(TextPart { text: text.clone() }),
                ToolResultContent::Blocks(inner) => render_tool_result_blocks(inner, parts),
            },
            ContentBlock::ToolUse { .. } | ContentBlock::Unsupported => {}
        }
    }
}

fn image_placeholder(source: &ImageSource) -> String {
    let media_type = source.media_type.as_deref().unwrap_or("unknown media type");
    format!(
        "[Image ({}): {media_type} not supported by Codex CLI]",
        source.kind
    )
}
