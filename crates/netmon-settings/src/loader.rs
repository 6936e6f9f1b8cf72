//! Layered settings loading.
//!
//! Compiled defaults, then the JSON settings file merged key by key, then
//! `NETMON_*` environment variables, then validation. Only keys present in
//! the file change anything; `null` leaves the default in place.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::NetmonSettings;

/// Environment lookup, injectable for tests.
type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Longest accepted period: one week.
const MAX_PERIOD_MINUTES: u64 = 7 * 24 * 60;

/// Default settings file: `~/.netmon/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".netmon").join("settings.json")
}

/// Load from `path` with environment overrides.
///
/// A missing file means defaults. An unreadable or malformed file, or a
/// result that fails [`NetmonSettings::validate`], is an error.
pub fn load_settings_from_path(path: &Path) -> Result<NetmonSettings> {
    load_with(path, &|name| std::env::var(name).ok())
}

fn load_with(path: &Path, env: EnvLookup<'_>) -> Result<NetmonSettings> {
    let parse_err = |source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let mut settings = match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "loading settings file");
            let file: Value = serde_json::from_str(&content).map_err(parse_err)?;
            let mut merged = serde_json::to_value(NetmonSettings::default()).map_err(parse_err)?;
            merge_into(&mut merged, file);
            serde_json::from_value(merged).map_err(parse_err)?
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            NetmonSettings::default()
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    apply_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Merge `overlay` into `base` in place.
///
/// Objects merge per key, recursively. Anything else in `overlay` replaces
/// the `base` value wholesale, except `null`, which is skipped.
pub fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_into(slot, value),
                    None if value.is_null() => {}
                    None => {
                        let _ = base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply `NETMON_*` variables read through `env`.
///
/// Empty values are ignored. Unparseable or out-of-range values are ignored
/// with a warning, keeping the file or default value.
pub fn apply_overrides(settings: &mut NetmonSettings, env: EnvLookup<'_>) {
    let server = &mut settings.server;
    let measurement = &mut settings.measurement;
    let logging = &mut settings.logging;

    if let Some(v) = text(env, "NETMON_HOST") {
        server.host = v;
    }
    if let Some(v) = parsed(env, "NETMON_PORT", |v| in_range(v, 1..=u16::MAX)) {
        server.port = v;
    }
    if let Some(v) = text(env, "NETMON_STATIC_DIR") {
        server.static_dir = Some(v);
    }
    if let Some(v) = text(env, "NETMON_COMMAND") {
        measurement.command = v;
    }
    if let Some(v) = parsed(env, "NETMON_SERVER_ID", |v| v.parse::<u32>().ok()) {
        measurement.server_id = Some(v);
    }
    if let Some(v) = parsed(env, "NETMON_PERIOD_MINUTES", |v| {
        in_range(v, 1..=MAX_PERIOD_MINUTES)
    }) {
        measurement.period_minutes = v;
    }
    if let Some(v) = text(env, "NETMON_LOG_LEVEL") {
        logging.level = v;
    }
    if let Some(v) = parsed(env, "NETMON_LOG_JSON", parse_bool) {
        logging.json = v;
    }
}

fn text(env: EnvLookup<'_>, name: &str) -> Option<String> {
    env(name).filter(|v| !v.trim().is_empty())
}

fn parsed<T>(env: EnvLookup<'_>, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let raw = text(env, name)?;
    let value = parse(raw.trim());
    if value.is_none() {
        warn!(var = name, value = %raw, "ignoring invalid environment override");
    }
    value
}

/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, any case.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn in_range<T: FromStr + PartialOrd>(val: &str, range: RangeInclusive<T>) -> Option<T> {
    val.parse().ok().filter(|n| range.contains(n))
}
