use serde_json::Value;

use super::merge::deep_merge;
use crate::types::{ContextDelta, InboundMessage, MessageInput, MessageParams, MessageResponse};

/// Event type that is forwarded even without text.
pub const WELCOME_TYPE: &str = "welcome";

/// Platform-generated events that never reach the assistant.
pub const IGNORED_TYPES: &[&str] = &["presence_change", "reconnect_url"];

/// Whether an inbound event must be answered locally instead of forwarded.
pub fn is_suppressed(message: &InboundMessage) -> bool {
    (message.non_empty_text().is_none() && message.message_type != WELCOME_TYPE)
        || IGNORED_TYPES.contains(&message.message_type.as_str())
        || message.reply_to.is_some()
        || message.bot_id.is_some()
}

/// Replace tab, newline and carriage return with a space each.
pub fn sanitize_text(text: &str) -> String {
    text.replace(&['\t', '\n', '\r'][..], " ")
}

/// Context to send: the delta alone when nothing is stored, the stored
/// context deep-merged with the delta otherwise.
pub fn resolve_context(prior: Option<Value>, delta: Option<&ContextDelta>) -> Option<Value> {
    match (prior, delta) {
        (prior, None) => prior,
        (None, Some(delta)) => Some(Value::Object(delta.clone())),
        (Some(prior), Some(delta)) => Some(deep_merge(prior, Value::Object(delta.clone()))),
    }
}

/// Assemble the outbound payload for one forwarded message.
pub fn build_payload(
    assistant_id: &str,
    session_id: &str,
    message: &InboundMessage,
    prior: Option<Value>,
    delta: Option<&ContextDelta>,
) -> MessageParams {
    MessageParams {
        assistant_id: assistant_id.to_string(),
        session_id: session_id.to_string(),
        input: message
            .non_empty_text()
            .map(|t| MessageInput::text(sanitize_text(t))),
        context: resolve_context(prior, delta),
    }
}

/// True iff `response` holds an intent named in `patterns` whose confidence
/// reaches `minimum_confidence`.
pub fn intents_match(
    patterns: &[&str],
    response: Option<&MessageResponse>,
    minimum_confidence: f64,
) -> bool {
    let Some(response) = response else {
        return false;
    };
    response
        .all_intents()
        .any(|i| i.confidence >= minimum_confidence && patterns.contains(&i.intent.as_str()))
}
