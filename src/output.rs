//! JSON response types and text formatting for CLI output.

use mnemo::{Message, RetrievedMemory};
use serde::Serialize;

/// Longest content preview shown in text listings, in characters.
pub const PREVIEW_CHARS: usize = 120;

/// Response for a saved message.
#[derive(Serialize)]
pub struct SaveResponse {
    pub status: String,
    pub id: i64,
    pub conversation_id: String,
}

/// Response for semantic retrieval.
#[derive(Serialize)]
pub struct RetrieveResponse {
    pub results: Vec<RetrievedMemory>,
}

/// Response for a conversation's history.
#[derive(Serialize)]
pub struct HistoryResponse {
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

/// Response for keyword search.
#[derive(Serialize)]
pub struct SearchResponse {
    pub keyword: String,
    pub results: Vec<Message>,
}

/// Response for a forgotten conversation.
#[derive(Serialize)]
pub struct ForgetResponse {
    pub status: String,
    pub conversation_id: String,
    pub deleted: usize,
}

/// Response for import operations.
#[derive(Serialize)]
pub struct ImportResponse {
    pub status: String,
    pub total_messages: usize,
    pub imported: usize,
    pub skipped_invalid: usize,
    pub conversations: usize,
}

/// Response for errors.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Print a value as formatted JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize JSON: {}", e);
            std::process::exit(1);
        }
    }
}

/// Single-line preview of `text`, cut at `max` characters with a trailing ellipsis.
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.replace(['\r', '\n'], " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut cut: String = flat.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// `[timestamp] role: content` line used by history and search listings.
pub fn format_message(message: &Message) -> String {
    format!(
        "{} [{}] {}: {}",
        message.id,
        message.timestamp,
        message.role,
        preview(&message.content, PREVIEW_CHARS)
    )
}
