//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`AttuneSettings::default()`]
//! 2. If `~/.attune/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `ATTUNE_*` environment variable overrides (highest priority)

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::AttuneSettings;

/// Resolve the path to the settings file (`~/.attune/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".attune").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<AttuneSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<AttuneSettings> {
    let defaults = serde_json::to_value(AttuneSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: AttuneSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
///
/// Only settings files are merged this way; session documents use the
/// shallow merge in `attune_core::documents`.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `ATTUNE_*` overrides. A value that does not parse, or falls outside
/// its range, is ignored with a warning and the file/default value stays.
pub fn apply_env_overrides(settings: &mut AttuneSettings) {
    if let Some(v) = env_override("ATTUNE_BASE_URL", parse_text) {
        settings.server.base_url = v;
    }
    if let Some(v) = env_override("ATTUNE_WS_URL", parse_text) {
        settings.server.ws_url = Some(v);
    }
    if let Some(v) = env_override("ATTUNE_RECONNECT_BASE_DELAY_MS", |s| {
        parse_in_range(s, 1..=600_000)
    }) {
        settings.reconnect.base_delay_ms = v;
    }
    if let Some(v) = env_override("ATTUNE_RECONNECT_MAX_ATTEMPTS", |s| parse_in_range(s, 0..=1000)) {
        settings.reconnect.max_attempts = v;
    }
    if let Some(v) = env_override("ATTUNE_MANUAL_RECONNECT_DELAY_MS", |s| {
        parse_in_range(s, 0..=600_000)
    }) {
        settings.reconnect.manual_delay_ms = v;
    }
    if let Some(v) = env_override("ATTUNE_HTTP_TIMEOUT_MS", |s| parse_in_range(s, 100..=3_600_000)) {
        settings.http.timeout_ms = v;
    }
    if let Some(v) = env_override("ATTUNE_LOG_LEVEL", parse_text) {
        settings.logging.level = v;
    }
    if let Some(v) = env_override("ATTUNE_LOG_JSON", parse_bool) {
        settings.logging.json = v;
    }
}

fn env_override<T>(name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!(key = name, value = %raw, "ignoring invalid environment override");
    }
    parsed
}

/// Non-empty text, trimmed.
pub fn parse_text(val: &str) -> Option<String> {
    let val = val.trim();
    (!val.is_empty()).then(|| val.to_owned())
}

/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, any case.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// An integer inside `range`.
pub fn parse_in_range<T>(val: &str, range: RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    val.trim().parse().ok().filter(|n| range.contains(n))
}
