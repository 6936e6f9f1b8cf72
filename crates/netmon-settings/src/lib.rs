//! # netmon-settings
//!
//! Configuration for the netmon server, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`NetmonSettings::default()`]
//! 2. **User file**: `~/.netmon/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `NETMON_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings_from_path, merge_into, settings_path};
pub use types::*;
