//! Shared types for the attune session client: wire frames, session
//! documents, tasks and chat messages. No I/O lives here.

pub mod documents;
pub mod errors;
pub mod ids;
pub mod message;
pub mod task;
pub mod wire;

pub use documents::{merge_shallow, Adaptations, PersonalityProfile, UiConfiguration};
pub use errors::ParseError;
pub use ids::{MessageId, TaskId};
pub use message::{ChatMessage, MessageRole};
pub use task::{Task, TaskDraft, TaskPriority, TaskStatus};
pub use wire::{ChatResponse, InboundMessage, OutboundMessage, TaskBatch};
