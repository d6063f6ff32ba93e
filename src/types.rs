use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-supplied partial context, deep-merged into the stored context.
pub type ContextDelta = Map<String, Value>;

/// Inbound chat event as handed over by the bot framework.
///
/// The framework fills the first five fields; the middleware writes back
/// either `watson_data` or `watson_error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watson_data: Option<MessageResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watson_error: Option<String>,
}

fn default_message_type() -> String {
    "message_received".into()
}

impl InboundMessage {
    /// A plain user message with the default event type.
    pub fn text(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            message_type: default_message_type(),
            user: user.into(),
            ..Default::default()
        }
    }

    /// A text-less event of the given type.
    pub fn event(user: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            user: user.into(),
            ..Default::default()
        }
    }

    /// Text if present and non-empty.
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// Outbound request for the assistant message endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageParams {
    pub assistant_id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<MessageInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageInput {
    #[serde(default = "default_input_type")]
    pub message_type: String,
    pub text: String,
}

fn default_input_type() -> String {
    "text".into()
}

impl MessageInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message_type: default_input_type(),
            text: text.into(),
        }
    }
}

/// Body returned by the assistant message endpoint.
///
/// Only the fields the middleware inspects are typed; everything else is
/// carried through `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub output: MessageOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intents: Vec<RuntimeIntent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageResponse {
    /// Placeholder attached to events that are never forwarded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Intents from both the top level and `output.intents`.
    pub fn all_intents(&self) -> impl Iterator<Item = &RuntimeIntent> {
        self.intents.iter().chain(self.output.intents.iter())
    }

    /// Plain text of every `generic` text item plus any legacy `text` lines.
    pub fn output_text(&self) -> Vec<String> {
        let mut lines = self.output.text.clone();
        lines.extend(
            self.output
                .generic
                .iter()
                .filter(|g| g.get("response_type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|g| g.get("text").and_then(|t| t.as_str()))
                .map(String::from),
        );
        lines
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageOutput {
    #[serde(default)]
    pub text: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generic: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intents: Vec<RuntimeIntent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An intent recognized by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeIntent {
    pub intent: String,
    pub confidence: f64,
}

/// Body returned by the create-session endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}
