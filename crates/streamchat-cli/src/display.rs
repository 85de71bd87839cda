//! Display utilities for CLI output formatting
//!
//! Every conversation item renders through [`render_item`], one arm per kind.

use colored::{ColoredString, Colorize};

use streamchat::{InputRole, ResponseInputItem, ResponseOutputItem, SendOutcome};

const MAX_OUTPUT_CHARS: usize = 200;

/// Truncates `text` to [`MAX_OUTPUT_CHARS`] characters on a char boundary
fn truncate(text: &str) -> String {
    let count = text.chars().count();
    if count <= MAX_OUTPUT_CHARS {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .nth(MAX_OUTPUT_CHARS)
        .map_or(text.len(), |(idx, _)| idx);
    format!("{}... ({count} chars)", &text[..cut])
}

fn role_label(role: InputRole) -> ColoredString {
    match role {
        InputRole::User => "You".bright_cyan().bold(),
        InputRole::System => "System".bright_black(),
        InputRole::Developer => "Developer".bright_black(),
    }
}

/// Renders a conversation item as one or more terminal lines
pub fn render_item(item: &ResponseInputItem) -> String {
    match item {
        ResponseInputItem::Input(message) => {
            format!("{}: {}", role_label(message.role), message.content)
        }
        ResponseInputItem::Output(ResponseOutputItem::Message(message)) => {
            let mut out = format!("{}\n{}", "Assistant".bright_magenta().bold(), message.text());
            let citations: Vec<_> = message
                .content
                .iter()
                .flat_map(|block| block.annotations.iter().flatten())
                .filter_map(|annotation| {
                    annotation
                        .url
                        .as_deref()
                        .or(annotation.file_id.as_deref())
                        .or(annotation.container_file_id.as_deref())
                })
                .collect();
            for (idx, source) in citations.iter().enumerate() {
                out.push_str(&format!("\n  [{}] {}", idx + 1, source.bright_blue()));
            }
            out
        }
        ResponseInputItem::Output(ResponseOutputItem::ToolCall(call)) => {
            let mut out = format!("  ├─○ Tool Call: {}", call.name.bright_green());
            if let Some(args) = call.parsed_arguments() {
                for (key, value) in args {
                    let value = truncate(&value.to_string());
                    out.push_str(&format!("\n  │   {}: {value}", key.dimmed()));
                }
            } else if !call.arguments.is_empty() {
                out.push_str(&format!("\n  │   {}", truncate(&call.arguments)));
            }
            out
        }
        ResponseInputItem::Output(ResponseOutputItem::ToolCallOutput(output)) => {
            match &output.error {
                Some(error) => format!(
                    "  ├─✗ Tool Result {}: {}",
                    output.tool_call_id.bright_red(),
                    truncate(error)
                ),
                None => format!(
                    "  ├─✓ Tool Result {}: {}",
                    output.tool_call_id.bright_green(),
                    truncate(&output.output)
                ),
            }
        }
        ResponseInputItem::Output(ResponseOutputItem::Reasoning(reasoning)) => {
            format!("  {} {}", "Thinking:".yellow(), reasoning.summary.italic())
        }
        ResponseInputItem::Output(ResponseOutputItem::Error(error)) => {
            format!("{} [{}] {}", "Error".red().bold(), error.code, error.message)
        }
        ResponseInputItem::Output(unknown @ ResponseOutputItem::Unknown(_)) => {
            format!("  {} {}", "Unsupported item:".dimmed(), unknown.kind().dimmed())
        }
    }
}

/// Renders the end-of-send status line, if there is anything to report
pub fn render_outcome(outcome: &SendOutcome) -> Option<String> {
    match outcome {
        SendOutcome::Completed { .. } => None,
        SendOutcome::Cancelled => Some("(cancelled)".dimmed().to_string()),
        SendOutcome::Failed { .. } => Some("(request failed)".red().to_string()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use streamchat::{ErrorItem, ResponseInputMessage, ToolCall};

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(MAX_OUTPUT_CHARS + 5);
        let truncated = truncate(&text);
        assert!(truncated.starts_with(&"é".repeat(MAX_OUTPUT_CHARS)));
        assert!(truncated.ends_with(&format!("({} chars)", MAX_OUTPUT_CHARS + 5)));
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn test_render_user_message() {
        plain();
        let item = ResponseInputItem::from(ResponseInputMessage::user("hello"));
        assert_eq!(render_item(&item), "You: hello");
    }

    #[test]
    fn test_render_error_item() {
        plain();
        let item = ResponseInputItem::from(ResponseOutputItem::Error(ErrorItem::new(
            "STREAM_ERROR",
            "boom",
        )));
        assert_eq!(render_item(&item), "Error [STREAM_ERROR] boom");
    }

    #[test]
    fn test_render_tool_call_lists_arguments() {
        plain();
        let item = ResponseInputItem::from(ResponseOutputItem::ToolCall(ToolCall {
            id: "c1".to_string(),
            name: "search".to_string(),
            arguments: r#"{"q":"rust"}"#.to_string(),
            ..Default::default()
        }));
        let rendered = render_item(&item);
        assert!(rendered.contains("Tool Call: search"));
        assert!(rendered.contains(r#"q: "rust""#));
    }

    #[test]
    fn test_render_unknown_uses_type() {
        plain();
        let item = ResponseInputItem::from(ResponseOutputItem::Unknown(
            serde_json::json!({"type": "web_search_call"}),
        ));
        assert!(render_item(&item).contains("web_search_call"));
    }

    #[test]
    fn test_completed_outcome_is_silent() {
        assert_eq!(render_outcome(&SendOutcome::Completed { appended: 2 }), None);
        assert!(render_outcome(&SendOutcome::Cancelled).is_some());
    }
}
