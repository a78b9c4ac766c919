//! # attune-settings
//!
//! Client configuration loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`AttuneSettings::default()`]
//! 2. **User file** — `~/.attune/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `ATTUNE_*` overrides (highest priority)
//!
//! ```no_run
//! let settings = attune_settings::load_settings().unwrap_or_default();
//! println!("connecting to {}", settings.server.ws_url().unwrap());
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
