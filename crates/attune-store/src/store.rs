//! The session state store: the single writer of session state.
//!
//! The store subscribes to a session's [`EventDispatcher`] and folds pushes
//! into its documents. Every mutation takes the write lock once, so each
//! inbound frame is applied atomically and in arrival order.

use std::sync::Arc;

use attune_client::events::{self, SessionEvent};
use attune_client::{BootstrapDocuments, EventDispatcher, Listener};
use attune_core::wire::{ChatResponse, InboundMessage, CHAT_RESPONSE, UI_CONFIG};
use attune_core::{
    Adaptations, ChatMessage, MessageId, PersonalityProfile, Task, TaskId, TaskStatus,
    UiConfiguration,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::resolver::ConfigResolver;
use crate::tasks::{self, TaskCounts, TaskFilter, TaskGroup, TaskGrouping};

pub const RECONNECT_EXHAUSTED_MESSAGE: &str = "maximum reconnection attempts reached";

/// Connection status as the view layer shows it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionView {
    pub connected: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub profile: PersonalityProfile,
    pub adaptations: Adaptations,
    pub ui_config: UiConfiguration,
    pub tasks: Vec<Task>,
    pub messages: Vec<ChatMessage>,
    pub connection: ConnectionView,
    /// Kind of the most recent document push (`chat_response`/`ui_config`).
    pub last_message: Option<String>,
    pub bootstrap_error: Option<String>,
}

/// What one `chat_response` changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatResponseOutcome {
    pub message_id: Option<MessageId>,
    pub tasks_added: Vec<TaskId>,
    pub tasks_skipped: usize,
}

/// Listener registrations made by [`SessionStore::attach`].
pub struct StoreSubscription {
    registrations: Vec<(&'static str, Listener<SessionEvent>)>,
}

impl StoreSubscription {
    /// Remove every listener this subscription registered.
    pub fn detach(self, dispatcher: &EventDispatcher) {
        for (event_type, listener) in &self.registrations {
            let _ = dispatcher.unsubscribe(event_type, listener);
        }
    }
}

#[derive(Default)]
pub struct SessionStore {
    state: RwLock<SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the document pushes and lifecycle events of a session.
    pub fn attach(self: &Arc<Self>, dispatcher: &EventDispatcher) -> StoreSubscription {
        let names = [
            CHAT_RESPONSE,
            UI_CONFIG,
            events::CONNECTED,
            events::DISCONNECTED,
            events::ERROR,
            events::MAX_RECONNECT_ATTEMPTS_REACHED,
        ];
        let registrations = names
            .into_iter()
            .map(|name| {
                let store = Arc::clone(self);
                let listener = dispatcher.on(name, move |event: &SessionEvent| {
                    store.apply_event(event);
                    Ok(())
                });
                (name, listener)
            })
            .collect();
        StoreSubscription { registrations }
    }

    /// Fold one session event into the state. Events the store does not
    /// track are ignored.
    pub fn apply_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Message(InboundMessage::ChatResponse(resp)) => {
                let _ = self.apply_chat_response(resp);
            }
            SessionEvent::Message(InboundMessage::UiConfig(doc)) => {
                self.apply_ui_config(doc.clone());
            }
            SessionEvent::Message(InboundMessage::Unknown { kind, .. }) => {
                debug!(kind = %kind, "ignoring untracked message");
            }
            SessionEvent::Connected => {
                let mut state = self.state.write();
                state.connection.connected = true;
                state.connection.error = None;
            }
            SessionEvent::Disconnected => {
                self.state.write().connection.connected = false;
            }
            SessionEvent::Error(e) => {
                self.state.write().connection.error = Some(e.to_string());
            }
            SessionEvent::ReconnectExhausted { .. } => {
                let mut state = self.state.write();
                state.connection.connected = false;
                state.connection.error = Some(RECONNECT_EXHAUSTED_MESSAGE.to_owned());
            }
        }
    }

    /// Apply a `chat_response`: one assistant message, shallow merges of the
    /// carried documents, and every carried task appended as new.
    pub fn apply_chat_response(&self, resp: &ChatResponse) -> ChatResponseOutcome {
        let mut outcome = ChatResponseOutcome::default();
        let mut state = self.state.write();

        let message = ChatMessage::assistant(resp.response.clone());
        outcome.message_id = Some(message.id.clone());
        state.messages.push(message);

        if let Some(profile) = &resp.personality_profile {
            state.profile.merge(profile.clone());
        }
        if let Some(batch) = &resp.tasks {
            for (index, draft) in batch.drafts().enumerate() {
                match draft {
                    Ok(draft) => {
                        let task = Task::from_draft(TaskId::new(), draft);
                        outcome.tasks_added.push(task.id.clone());
                        state.tasks.push(task);
                    }
                    Err(e) => {
                        outcome.tasks_skipped += 1;
                        warn!(index, error = %e, "skipping malformed task");
                    }
                }
            }
        }
        if let Some(ui_config) = &resp.ui_config {
            state.ui_config.merge(ui_config.clone());
        }
        if let Some(adaptations) = &resp.adaptations {
            state.adaptations.merge(adaptations.clone());
        }
        state.last_message = Some(CHAT_RESPONSE.to_owned());

        debug!(
            tasks_added = outcome.tasks_added.len(),
            tasks_skipped = outcome.tasks_skipped,
            "applied chat_response"
        );
        outcome
    }

    pub fn apply_ui_config(&self, doc: UiConfiguration) {
        let mut state = self.state.write();
        state.ui_config.merge(doc);
        state.last_message = Some(UI_CONFIG.to_owned());
    }

    /// Install bootstrap documents, replacing whatever was held.
    pub fn load_bootstrap(&self, docs: BootstrapDocuments) {
        let mut state = self.state.write();
        state.profile = docs.profile;
        state.adaptations = docs.adaptations;
        state.ui_config = docs.ui_config;
        state.bootstrap_error = None;
        info!(
            profile_keys = state.profile.as_map().len(),
            "bootstrap documents loaded"
        );
    }

    pub fn record_bootstrap_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "bootstrap failed");
        self.state.write().bootstrap_error = Some(message);
    }

    /// Record the user's own chat turn.
    pub fn record_user_message(&self, content: impl Into<String>) -> MessageId {
        let message = ChatMessage::user(content);
        let id = message.id.clone();
        self.state.write().messages.push(message);
        id
    }

    /// Flip a task between completed and not: completed becomes todo,
    /// anything else becomes completed. Returns the new status.
    pub fn toggle_task_status(&self, id: &TaskId) -> Result<TaskStatus, StoreError> {
        self.update_task_status(id, TaskStatus::toggled)
    }

    pub fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError> {
        self.update_task_status(id, |_| status).map(|_| ())
    }

    fn update_task_status(
        &self,
        id: &TaskId,
        next: impl FnOnce(TaskStatus) -> TaskStatus,
    ) -> Result<TaskStatus, StoreError> {
        let mut state = self.state.write();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| StoreError::TaskNotFound(id.clone()))?;
        task.draft.status = next(task.draft.status);
        debug!(task_id = %id, status = %task.draft.status, "task status updated");
        Ok(task.draft.status)
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn profile(&self) -> PersonalityProfile {
        self.state.read().profile.clone()
    }

    pub fn adaptations(&self) -> Adaptations {
        self.state.read().adaptations.clone()
    }

    pub fn ui_config(&self) -> UiConfiguration {
        self.state.read().ui_config.clone()
    }

    /// Resolver over the current UI configuration.
    pub fn resolver(&self) -> ConfigResolver {
        ConfigResolver::new(self.ui_config())
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.read().tasks.clone()
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.state.read().tasks.iter().find(|t| &t.id == id).cloned()
    }

    pub fn filtered_tasks(&self, filter: TaskFilter) -> Vec<Task> {
        tasks::filter_tasks(&self.state.read().tasks, filter)
    }

    pub fn grouped_tasks(&self, filter: TaskFilter, grouping: TaskGrouping) -> Vec<TaskGroup> {
        tasks::group_tasks(self.filtered_tasks(filter), grouping)
    }

    pub fn task_counts(&self) -> TaskCounts {
        TaskCounts::tally(&self.state.read().tasks)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.read().messages.clone()
    }

    pub fn connection(&self) -> ConnectionView {
        self.state.read().connection.clone()
    }

    pub fn last_message(&self) -> Option<String> {
        self.state.read().last_message.clone()
    }

    pub fn bootstrap_error(&self) -> Option<String> {
        self.state.read().bootstrap_error.clone()
    }

    pub fn trait_value(&self, name: &str) -> f64 {
        self.state.read().profile.trait_value(name)
    }

    pub fn confidence_score(&self, category: &str) -> f64 {
        self.state.read().profile.confidence_score(category)
    }

    pub fn preference(&self, name: &str) -> Option<Value> {
        self.state.read().profile.preference(name).cloned()
    }

    pub fn communication_style(&self, name: &str) -> Option<Value> {
        self.state.read().profile.communication_style(name).cloned()
    }

    pub fn ui_preference(&self, name: &str) -> Option<Value> {
        self.state.read().profile.ui_preference(name).cloned()
    }

    pub fn has_personality_data(&self) -> bool {
        !self.state.read().profile.is_empty()
    }

    /// `<agent>_adaptations.<name>`, if the server suggested it.
    pub fn adaptation_suggestion(&self, agent: &str, name: &str) -> Option<Value> {
        self.state.read().adaptations.suggestion(agent, name).cloned()
    }
}
