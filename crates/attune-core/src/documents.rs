//! The three server-authored session documents.
//!
//! Each document is an open JSON object. The client recognises a handful of
//! top-level keys and exposes typed, defaulted accessors for them, but never
//! drops keys it does not understand.
//!
//! Inbound pushes combine with the stored document through a *shallow*
//! top-level merge: every key present in the incoming object replaces the
//! stored value for that key wholesale; keys absent from the incoming object
//! are left untouched. Nested objects are never merged recursively.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shallow top-level merge of `incoming` into `target`.
pub fn merge_shallow(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        let _ = target.insert(key, value);
    }
}

macro_rules! document {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Map<String, Value>);

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn from_map(map: Map<String, Value>) -> Self {
                Self(map)
            }

            pub fn as_map(&self) -> &Map<String, Value> {
                &self.0
            }

            pub fn into_map(self) -> Map<String, Value> {
                self.0
            }

            pub fn get(&self, key: &str) -> Option<&Value> {
                self.0.get(key)
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Shallow top-level merge; see the module docs.
            pub fn merge(&mut self, incoming: Self) {
                merge_shallow(&mut self.0, incoming.0);
            }

            /// Look up `key` inside the top-level object `section`.
            pub fn nested(&self, section: &str, key: &str) -> Option<&Value> {
                self.0.get(section)?.as_object()?.get(key)
            }
        }

        impl From<Map<String, Value>> for $name {
            fn from(map: Map<String, Value>) -> Self {
                Self(map)
            }
        }
    };
}

document!(
    /// Personality profile: `traits`, `preferences`, `communication_style`,
    /// `ui_preferences`, `confidence_scores`, `interaction_history`.
    PersonalityProfile
);

document!(
    /// Behavioural adaptations keyed by agent scope (`<agent>_adaptations`).
    Adaptations
);

document!(
    /// UI configuration: `theme`, `layout`, `animations`, `components`.
    UiConfiguration
);

const DEFAULT_TRAIT_SCORE: f64 = 0.5;
const DEFAULT_CONFIDENCE_SCORE: f64 = 0.0;

impl PersonalityProfile {
    /// Trait score in `[0, 1]`; 0.5 when the trait is absent or not numeric.
    pub fn trait_value(&self, name: &str) -> f64 {
        self.nested("traits", name)
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_TRAIT_SCORE)
    }

    /// Confidence score in `[0, 1]`; 0 when the category is absent.
    pub fn confidence_score(&self, category: &str) -> f64 {
        self.nested("confidence_scores", category)
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_CONFIDENCE_SCORE)
    }

    pub fn preference(&self, name: &str) -> Option<&Value> {
        self.nested("preferences", name)
    }

    pub fn communication_style(&self, name: &str) -> Option<&Value> {
        self.nested("communication_style", name)
    }

    pub fn ui_preference(&self, name: &str) -> Option<&Value> {
        self.nested("ui_preferences", name)
    }

    /// All numeric trait scores, in key order.
    pub fn trait_scores(&self) -> Vec<(&str, f64)> {
        self.0
            .get("traits")
            .and_then(Value::as_object)
            .map(|traits| {
                traits
                    .iter()
                    .filter_map(|(k, v)| v.as_f64().map(|score| (k.as_str(), score)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn interaction_history(&self) -> &[Value] {
        self.0
            .get("interaction_history")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl Adaptations {
    /// Suggestion `name` from the `<agent>_adaptations` scope.
    pub fn suggestion(&self, agent: &str, name: &str) -> Option<&Value> {
        self.nested(&format!("{agent}_adaptations"), name)
    }

    /// Agent scopes present, without the `_adaptations` suffix.
    pub fn agents(&self) -> Vec<&str> {
        self.0
            .keys()
            .filter_map(|k| k.strip_suffix("_adaptations"))
            .collect()
    }
}

impl UiConfiguration {
    /// Top-level section as an object, if present and an object.
    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.0.get(name)?.as_object()
    }

    /// String value at `section.key`.
    pub fn nested_str(&self, section: &str, key: &str) -> Option<&str> {
        self.nested(section, key)?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(value: Value) -> PersonalityProfile {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn merge_replaces_present_keys_only() {
        let mut stored = profile(json!({
            "traits": {"openness": 0.9, "extraversion": 0.2},
            "preferences": {"tone": "formal"}
        }));
        stored.merge(profile(json!({"traits": {"openness": 0.1}})));

        assert_eq!(stored.trait_value("openness"), 0.1);
        // Nested object replaced wholesale, not merged.
        assert_eq!(stored.trait_value("extraversion"), 0.5);
        assert_eq!(stored.preference("tone"), Some(&json!("formal")));
    }

    #[test]
    fn merge_with_empty_is_noop() {
        let mut stored = profile(json!({"traits": {"openness": 0.9}}));
        let before = stored.clone();
        stored.merge(PersonalityProfile::new());
        assert_eq!(stored, before);
    }

    #[test]
    fn trait_defaults_to_half() {
        let p = PersonalityProfile::new();
        assert_eq!(p.trait_value("openness"), 0.5);
    }

    #[test]
    fn zero_trait_is_not_defaulted() {
        let p = profile(json!({"traits": {"neuroticism": 0.0}}));
        assert_eq!(p.trait_value("neuroticism"), 0.0);
    }

    #[test]
    fn confidence_defaults_to_zero() {
        let p = profile(json!({"confidence_scores": {"traits": 0.7}}));
        assert_eq!(p.confidence_score("traits"), 0.7);
        assert_eq!(p.confidence_score("preferences"), 0.0);
    }

    #[test]
    fn accessors_tolerate_wrong_shapes() {
        let p = profile(json!({"traits": "oops", "interaction_history": 4}));
        assert_eq!(p.trait_value("openness"), 0.5);
        assert!(p.trait_scores().is_empty());
        assert!(p.interaction_history().is_empty());
    }

    #[test]
    fn trait_scores_skip_non_numeric() {
        let p = profile(json!({"traits": {"a": 0.3, "b": "high"}}));
        assert_eq!(p.trait_scores(), vec![("a", 0.3)]);
    }

    #[test]
    fn adaptation_suggestion_by_agent_scope() {
        let a: Adaptations = serde_json::from_value(json!({
            "chat_adaptations": {"response_tone": "friendly"},
            "ui_adaptations": {"layout": "minimal"}
        }))
        .unwrap();
        assert_eq!(a.suggestion("chat", "response_tone"), Some(&json!("friendly")));
        assert_eq!(a.suggestion("task", "anything"), None);
        assert_eq!(a.agents(), vec!["chat", "ui"]);
    }

    #[test]
    fn ui_section_lookup() {
        let ui: UiConfiguration =
            serde_json::from_value(json!({"layout": {"type": "minimal"}, "theme": 3})).unwrap();
        assert_eq!(ui.nested_str("layout", "type"), Some("minimal"));
        assert!(ui.section("theme").is_none());
        assert!(ui.section("components").is_none());
    }
}
