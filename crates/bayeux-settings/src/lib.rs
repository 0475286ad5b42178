//! # bayeux-settings
//!
//! Configuration for the Bayeux long-polling client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`BayeuxSettings::default()`]
//! 2. **Settings file**: a JSON file deep-merged over defaults
//! 3. **Environment variables**: `BAYEUX_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use bayeux_settings::load_settings_from_path;
//!
//! let settings = load_settings_from_path("bayeux.json".as_ref()).unwrap();
//! println!("poll interval: {:?}", settings.poll_interval());
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings, load_settings_from_path};
pub use types::*;
