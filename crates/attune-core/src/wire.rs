//! JSON frames exchanged with the assistant backend.
//!
//! Outbound frames are a closed set. Inbound frames are decoded once at the
//! boundary into [`InboundMessage`]; any `type` the client does not model is
//! kept as [`InboundMessage::Unknown`] so newer servers keep working.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::documents::{Adaptations, PersonalityProfile, UiConfiguration};
use crate::errors::ParseError;
use crate::task::TaskDraft;

/// Frames the client sends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Chat { message: String, context: String },
    UiUpdate { context: String },
}

impl OutboundMessage {
    pub fn chat(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Chat {
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn ui_update(context: impl Into<String>) -> Self {
        Self::UiUpdate {
            context: context.into(),
        }
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::UiUpdate { .. } => "ui_update",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Tasks block of a `chat_response`: `{"tasks": [...]}`.
///
/// Entries stay raw until [`TaskBatch::drafts`] so one malformed task does
/// not invalidate the whole frame. A null or non-array `tasks` is an empty
/// batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskBatch {
    #[serde(default, deserialize_with = "lenient_entries")]
    pub tasks: Vec<Value>,
}

impl TaskBatch {
    pub fn drafts(&self) -> impl Iterator<Item = Result<TaskDraft, serde_json::Error>> + '_ {
        self.tasks
            .iter()
            .map(|raw| TaskDraft::deserialize(raw))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Reply to a `chat` frame.
///
/// Each field decodes on its own. A null or mistyped field is dropped with a
/// warning and the rest of the push still applies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default, deserialize_with = "lenient_text")]
    pub response: String,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub personality_profile: Option<PersonalityProfile>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub tasks: Option<TaskBatch>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub ui_config: Option<UiConfiguration>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub adaptations: Option<Adaptations>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            warn!(
                field = std::any::type_name::<T>(),
                error = %e,
                "ignoring malformed chat_response field"
            );
            Ok(None)
        }
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Null => Ok(String::new()),
        other => {
            warn!(value = %other, "chat_response text is not a string");
            Ok(String::new())
        }
    }
}

fn lenient_entries<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(entries) => Ok(entries),
        Value::Null => Ok(Vec::new()),
        other => {
            warn!(value = %other, "task list is not an array");
            Ok(Vec::new())
        }
    }
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    ChatResponse(ChatResponse),
    UiConfig(UiConfiguration),
    /// Any other `type`; `payload` is the whole frame, `type` included.
    Unknown { kind: String, payload: Value },
}

pub const CHAT_RESPONSE: &str = "chat_response";
pub const UI_CONFIG: &str = "ui_config";

impl InboundMessage {
    /// Decode one raw text frame.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(raw).map_err(ParseError::InvalidJson)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ParseError> {
        let Value::Object(mut fields) = value else {
            return Err(ParseError::NotAnObject);
        };
        let kind = match fields.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Err(ParseError::MissingType),
        };

        match kind.as_str() {
            CHAT_RESPONSE => {
                let _ = fields.remove("type");
                Ok(Self::ChatResponse(ChatResponse::from_fields(fields)))
            }
            UI_CONFIG => {
                let _ = fields.remove("type");
                Ok(Self::UiConfig(ui_config_document(fields)))
            }
            _ => Ok(Self::Unknown {
                kind,
                payload: Value::Object(fields),
            }),
        }
    }

    /// Event name this frame is published under: its literal `type`.
    pub fn kind(&self) -> &str {
        match self {
            Self::ChatResponse(_) => CHAT_RESPONSE,
            Self::UiConfig(_) => UI_CONFIG,
            Self::Unknown { kind, .. } => kind,
        }
    }
}

impl ChatResponse {
    /// Decode the fields of a `chat_response` frame, `type` already removed.
    /// Never fails: every field is lenient, so a bad field costs only that
    /// field.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(fields)).unwrap_or_else(|e| {
            warn!(error = %e, "unreadable chat_response, keeping an empty reply");
            Self::default()
        })
    }
}

/// The server wraps pushed configuration as `{"type":"ui_config","ui_config":{..}}`;
/// a bare `{"type":"ui_config", ...fields}` is accepted as well. A wrapper
/// that is null or not an object is discarded.
fn ui_config_document(mut fields: Map<String, Value>) -> UiConfiguration {
    match fields.remove(UI_CONFIG) {
        Some(Value::Object(inner)) => UiConfiguration::from_map(inner),
        Some(Value::Null) | None => UiConfiguration::from_map(fields),
        Some(other) => {
            warn!(value = %other, "ignoring non-object ui_config wrapper");
            UiConfiguration::from_map(fields)
        }
    }
}
