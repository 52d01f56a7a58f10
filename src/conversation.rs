//! Conversation id sanitization and message validation.

use tracing::warn;

use crate::errors::Error;

/// Conversation id used when none is given or nothing valid is left after sanitizing.
pub const DEFAULT_CONVERSATION_ID: &str = "default";

/// Roles that chat clients conventionally use. Anything else is accepted but logged.
pub const KNOWN_ROLES: [&str; 3] = ["user", "assistant", "system"];

/// Reduce a raw conversation id to alphanumerics, `_`, `-` and `.`.
///
/// Falls back to [`DEFAULT_CONVERSATION_ID`] when no valid character remains,
/// so the same raw id always maps to the same stored key.
///
/// # Example
/// ```
/// use mnemo::conversation::sanitize_conversation_id;
///
/// assert_eq!(sanitize_conversation_id("conv@#$%"), "conv");
/// assert_eq!(sanitize_conversation_id("@#$%"), "default");
/// ```
pub fn sanitize_conversation_id(raw: &str) -> String {
    let safe: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();

    if safe.is_empty() {
        DEFAULT_CONVERSATION_ID.to_string()
    } else {
        safe
    }
}

/// Check that role, content and conversation id are all non-empty text.
///
/// Every failing field is reported at once. An unconventional role passes
/// validation and is logged at warn level.
///
/// # Errors
///
/// Returns `Error::Validation` naming each empty field.
pub fn validate_message(role: &str, content: &str, conversation_id: &str) -> Result<(), Error> {
    let fields: Vec<&'static str> = [
        ("role", role),
        ("content", content),
        ("conversation_id", conversation_id),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect();

    if !fields.is_empty() {
        return Err(Error::invalid(fields));
    }

    if !KNOWN_ROLES.contains(&role) {
        warn!(role, expected = ?KNOWN_ROLES, "unusual message role");
    }
    Ok(())
}
