//! # helm-settings
//!
//! Configuration for the helm operator console, loaded in three layers
//! (lowest priority first):
//! 1. **Compiled defaults**: [`HelmSettings::default()`]
//! 2. **User file**: `~/.helm/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `HELM_*` overrides
//!
//! The synchronization core itself reads no files or environment; the
//! console binary loads settings here and hands the result to
//! `helm-client`.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
