//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BayeuxSettings::default()`]
//! 2. If a settings file is given and exists, deep-merge its values over defaults
//! 3. Apply `BAYEUX_*` environment variable overrides (highest priority)

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::BayeuxSettings;

/// Load defaults with env var overrides and no settings file.
pub fn load_settings() -> Result<BayeuxSettings> {
    let mut settings = BayeuxSettings::default();
    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<BayeuxSettings> {
    let defaults = serde_json::to_value(BayeuxSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: BayeuxSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply `BAYEUX_*` environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (file/default value is kept).
pub fn apply_env_overrides(settings: &mut BayeuxSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides using an arbitrary variable lookup.
pub fn apply_overrides_from(
    settings: &mut BayeuxSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("BAYEUX_POLL_INTERVAL_MS") {
        match parse_u64_range(&v, 0, 3_600_000) {
            Some(n) => settings.poll_interval_ms = n,
            None => warn_invalid("BAYEUX_POLL_INTERVAL_MS", &v),
        }
    }
    if let Some(v) = read("BAYEUX_QUEUE_CAPACITY") {
        match parse_usize_range(&v, 1, 1_000_000) {
            Some(n) => settings.queue_capacity = n,
            None => warn_invalid("BAYEUX_QUEUE_CAPACITY", &v),
        }
    }
    if let Some(v) = read("BAYEUX_REQUEST_TIMEOUT_MS") {
        match parse_u64_range(&v, 1, 3_600_000) {
            Some(n) => settings.request_timeout_ms = Some(n),
            None => warn_invalid("BAYEUX_REQUEST_TIMEOUT_MS", &v),
        }
    }
    if let Some(v) = read("BAYEUX_DELIVERY") {
        match serde_json::from_value(Value::String(v.clone())) {
            Ok(policy) => settings.delivery = policy,
            Err(_) => warn_invalid("BAYEUX_DELIVERY", &v),
        }
    }
    if let Some(v) = read("BAYEUX_ADVICE") {
        match serde_json::from_value(Value::String(v.clone())) {
            Ok(policy) => settings.advice = policy,
            Err(_) => warn_invalid("BAYEUX_ADVICE", &v),
        }
    }
    if let Some(v) = read("BAYEUX_LOG_LEVEL") {
        settings.log_level = v;
    }
}

fn warn_invalid(key: &str, value: &str) {
    tracing::warn!(key, value, "invalid env var, ignoring");
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;
    use crate::types::{AdvicePolicy, DeliveryPolicy};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_simple_override() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": 10});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 10);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        assert_eq!(deep_merge(target, source)["a"], 1);
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"outer": {"x": 1, "y": 2}});
        let source = serde_json::json!({"outer": {"y": 3}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["outer"]["x"], 1);
        assert_eq!(merged["outer"]["y"], 3);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/bayeux.json")).unwrap();
        assert_eq!(settings.queue_capacity, 100);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bayeux.json");
        std::fs::write(&path, r#"{"pollIntervalMs": 250, "advice": "follow"}"#).unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.poll_interval_ms, 250);
        assert_eq!(settings.advice, AdvicePolicy::Follow);
        assert_eq!(settings.delivery, DeliveryPolicy::Block);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bayeux.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_zero_capacity_is_corrected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bayeux.json");
        std::fs::write(&path, r#"{"queueCapacity": 0}"#).unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.queue_capacity, 1);
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut s = BayeuxSettings::default();
        apply_overrides_from(
            &mut s,
            env(&[
                ("BAYEUX_POLL_INTERVAL_MS", "500"),
                ("BAYEUX_QUEUE_CAPACITY", "8"),
                ("BAYEUX_REQUEST_TIMEOUT_MS", "45000"),
                ("BAYEUX_DELIVERY", "dropWhenFull"),
                ("BAYEUX_ADVICE", "follow"),
                ("BAYEUX_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(s.poll_interval_ms, 500);
        assert_eq!(s.queue_capacity, 8);
        assert_eq!(s.request_timeout_ms, Some(45_000));
        assert_eq!(s.delivery, DeliveryPolicy::DropWhenFull);
        assert_eq!(s.advice, AdvicePolicy::Follow);
        assert_eq!(s.log_level, "debug");
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut s = BayeuxSettings::default();
        apply_overrides_from(
            &mut s,
            env(&[
                ("BAYEUX_QUEUE_CAPACITY", "0"),
                ("BAYEUX_POLL_INTERVAL_MS", "soon"),
                ("BAYEUX_DELIVERY", "sometimes"),
                ("BAYEUX_LOG_LEVEL", ""),
            ]),
        );
        assert_eq!(s, BayeuxSettings::default());
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u64_range("10", 0, 100), Some(10));
        assert_eq!(parse_u64_range("101", 0, 100), None);
        assert_eq!(parse_usize_range("-1", 0, 100), None);
        assert_eq!(parse_usize_range("1", 1, 1), Some(1));
    }
}
