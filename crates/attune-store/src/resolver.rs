//! Render-ready view parameters derived from the UI configuration document.
//!
//! Every accessor is total: a missing or mistyped key at any depth resolves
//! to the documented default instead of failing.

use attune_core::UiConfiguration;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::tasks::TaskGrouping;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    Minimal,
    #[default]
    Standard,
    Detailed,
}

impl LayoutKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "minimal" => Self::Minimal,
            "detailed" => Self::Detailed,
            _ => Self::Standard,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Detailed => "detailed",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationLevel {
    #[default]
    None,
    Subtle,
    Full,
}

impl AnimationLevel {
    pub fn parse(s: &str) -> Self {
        match s {
            "subtle" => Self::Subtle,
            "full" => Self::Full,
            _ => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Subtle => "subtle",
            Self::Full => "full",
        }
    }
}

/// Animation timing in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AnimationParams {
    pub level: AnimationLevel,
    pub container_duration: f64,
    pub item_duration: f64,
    /// Delay between sibling entrances; non-zero only at `Full`.
    pub stagger_children: f64,
    pub layout_animation: bool,
    pub enable_hover: bool,
    pub enable_page_transitions: bool,
}

const CONTAINER_DURATION: f64 = 0.5;
const ITEM_DURATION: f64 = 0.3;
const STAGGER_CHILDREN: f64 = 0.1;

impl AnimationParams {
    pub fn for_level(level: AnimationLevel) -> Self {
        let animated = level != AnimationLevel::None;
        let full = level == AnimationLevel::Full;
        Self {
            level,
            container_duration: if animated { CONTAINER_DURATION } else { 0.0 },
            item_duration: if animated { ITEM_DURATION } else { 0.0 },
            stagger_children: if full { STAGGER_CHILDREN } else { 0.0 },
            layout_animation: full,
            enable_hover: false,
            enable_page_transitions: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThemeParams {
    pub color_scheme: String,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub accent_color: Option<String>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
}

impl Default for ThemeParams {
    fn default() -> Self {
        Self {
            color_scheme: "auto".to_owned(),
            primary_color: None,
            secondary_color: None,
            accent_color: None,
            background_color: None,
            text_color: None,
        }
    }
}

impl ThemeParams {
    /// CSS custom properties a theme consumer writes, present colors only.
    pub fn css_variables(&self) -> Vec<(&'static str, String)> {
        [
            ("--color-primary", &self.primary_color),
            ("--color-secondary", &self.secondary_color),
            ("--color-accent", &self.accent_color),
            ("--color-background", &self.background_color),
            ("--color-text", &self.text_color),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.clone().map(|v| (name, v)))
        .collect()
    }
}

/// Display options for one component. Empty when the component is not
/// configured.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ComponentOptions(Map<String, Value>);

impl ComponentOptions {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.0.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

pub const CHAT_INTERFACE: &str = "chatInterface";
pub const TASK_DISPLAY: &str = "taskDisplay";
pub const PERSONALITY_PANEL: &str = "personalityPanel";

/// Everything the view layer needs from one configuration, resolved at once.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedView {
    pub layout: LayoutKind,
    pub animation: AnimationParams,
    pub theme: ThemeParams,
    pub chat_interface: ComponentOptions,
    pub task_display: ComponentOptions,
    pub personality_panel: ComponentOptions,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigResolver {
    config: UiConfiguration,
}

impl ConfigResolver {
    pub fn new(config: UiConfiguration) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UiConfiguration {
        &self.config
    }

    pub fn layout(&self) -> LayoutKind {
        self.config
            .nested_str("layout", "type")
            .map(LayoutKind::parse)
            .unwrap_or_default()
    }

    pub fn animation_level(&self) -> AnimationLevel {
        self.config
            .nested_str("animations", "level")
            .map(AnimationLevel::parse)
            .unwrap_or_default()
    }

    pub fn animation(&self) -> AnimationParams {
        let flag = |key| {
            self.config
                .nested("animations", key)
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };
        AnimationParams {
            enable_hover: flag("enableHover"),
            enable_page_transitions: flag("enablePageTransitions"),
            ..AnimationParams::for_level(self.animation_level())
        }
    }

    pub fn theme(&self) -> ThemeParams {
        let color = |key| self.config.nested_str("theme", key).map(str::to_owned);
        ThemeParams {
            color_scheme: self
                .config
                .nested_str("theme", "colorScheme")
                .unwrap_or("auto")
                .to_owned(),
            primary_color: color("primaryColor"),
            secondary_color: color("secondaryColor"),
            accent_color: color("accentColor"),
            background_color: color("backgroundColor"),
            text_color: color("textColor"),
        }
    }

    pub fn theme_variables(&self) -> Vec<(&'static str, String)> {
        self.theme().css_variables()
    }

    pub fn component(&self, name: &str) -> ComponentOptions {
        match self.config.nested("components", name) {
            Some(Value::Object(options)) => ComponentOptions(options.clone()),
            _ => ComponentOptions::default(),
        }
    }

    /// `taskDisplay.groupBy`, defaulting to no grouping.
    pub fn task_grouping(&self) -> TaskGrouping {
        TaskGrouping::parse(self.component(TASK_DISPLAY).str_or("groupBy", ""))
    }

    pub fn resolve(&self) -> ResolvedView {
        ResolvedView {
            layout: self.layout(),
            animation: self.animation(),
            theme: self.theme(),
            chat_interface: self.component(CHAT_INTERFACE),
            task_display: self.component(TASK_DISPLAY),
            personality_panel: self.component(PERSONALITY_PANEL),
        }
    }
}
