//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `RELAY_*` environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use relay_core::Backend;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::RelaySettings;

/// Resolve the default settings file path (`~/.relay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".relay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults (plus overrides). Invalid
/// JSON or a value that fails validation is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
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

/// Apply `RELAY_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_overrides_from<F>(settings: &mut RelaySettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("RELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("RELAY_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("RELAY_WS_PATH") {
        settings.server.ws_path = v;
    }
    if let Some(v) = env.u64("RELAY_HEARTBEAT_INTERVAL_MS", 1000, 600_000) {
        settings.server.heartbeat_interval_ms = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = env.u64("RELAY_IDLE_TIMEOUT_MS", 1000, 86_400_000) {
        settings.session.idle_timeout_ms = v;
    }
    if let Some(v) = env.string("RELAY_REMINDER_MESSAGE") {
        settings.session.reminder_message = v;
    }
    if let Some(v) = env.string("RELAY_DEFAULT_BACKEND") {
        match v.parse::<Backend>() {
            Ok(backend) => settings.session.default_backend = backend,
            Err(e) => tracing::warn!(key = "RELAY_DEFAULT_BACKEND", error = %e, "ignoring"),
        }
    }
    if let Some(v) = env.enumeration("RELAY_PARTIAL_ANSWERS") {
        settings.session.partial_answers = v;
    }
    if let Some(v) = env.enumeration("RELAY_CONCURRENT_QUESTIONS") {
        settings.session.concurrent_questions = v;
    }
    if let Some(v) = env.u64("RELAY_MAX_STREAM_MS", 0, 86_400_000) {
        settings.session.max_stream_duration_ms = v;
    }

    // ── Backends ────────────────────────────────────────────────────
    if let Some(v) = env.string("RELAY_GEMINI_BASE_URL") {
        settings.backends.supabase_gemini.base_url = v;
    }
    if let Some(v) = env.string("RELAY_OLLAMA_BASE_URL") {
        settings.backends.upstash_gemma3_nomic.base_url = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("RELAY_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Variable readers ────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    /// Lowercase serde enum (`"keep"`, `"reject"`, …).
    fn enumeration<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let val = self.string(name)?;
        match serde_json::from_value(Value::String(val.to_lowercase())) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key = name, value = %val, "invalid enum env var, ignoring");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use crate::types::{ConcurrentQuestionPolicy, PartialAnswerPolicy};
    use std::collections::HashMap;
    use std::io::Write;

    fn overrides(pairs: &[(&str, &str)]) -> RelaySettings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut settings = RelaySettings::default();
        apply_overrides_from(&mut settings, |name| vars.get(name).cloned());
        settings
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 3000, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null});
        assert_eq!(deep_merge(target, source)["a"], 1);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.server.ws_path, "/api/ws");
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"session":{{"idleTimeoutMs":5000}},"backends":{{"supabaseGemini":{{"model":"gemini-2.5-pro"}}}}}}"#
        )
        .unwrap();
        let settings = load_settings_from_path(file.path()).unwrap();
        assert_eq!(settings.session.idle_timeout_ms, 5000);
        assert_eq!(settings.backends.supabase_gemini.model, "gemini-2.5-pro");
        assert_eq!(
            settings.backends.supabase_gemini.api_key_env.as_deref(),
            Some("GOOGLE_API_KEY")
        );
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = load_settings_from_path(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn invalid_value_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server":{{"wsPath":"ws"}}}}"#).unwrap();
        let err = load_settings_from_path(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn override_server_fields() {
        let s = overrides(&[("RELAY_HOST", "127.0.0.1"), ("RELAY_PORT", "8080")]);
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 8080);
    }

    #[test]
    fn override_policies() {
        let s = overrides(&[
            ("RELAY_PARTIAL_ANSWERS", "Keep"),
            ("RELAY_CONCURRENT_QUESTIONS", "reject"),
        ]);
        assert_eq!(s.session.partial_answers, PartialAnswerPolicy::Keep);
        assert_eq!(s.session.concurrent_questions, ConcurrentQuestionPolicy::Reject);
    }

    #[test]
    fn override_default_backend() {
        let s = overrides(&[("RELAY_DEFAULT_BACKEND", "supabase-gemini")]);
        assert_eq!(s.session.default_backend, Backend::SupabaseGemini);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let s = overrides(&[
            ("RELAY_PORT", "99999"),
            ("RELAY_DEFAULT_BACKEND", "made-up"),
            ("RELAY_PARTIAL_ANSWERS", "sometimes"),
            ("RELAY_LOG_JSON", "maybe"),
            ("RELAY_IDLE_TIMEOUT_MS", "5"),
        ]);
        let d = RelaySettings::default();
        assert_eq!(s.server.port, d.server.port);
        assert_eq!(s.session.default_backend, d.session.default_backend);
        assert_eq!(s.session.partial_answers, d.session.partial_answers);
        assert_eq!(s.logging.json, d.logging.json);
        assert_eq!(s.session.idle_timeout_ms, d.session.idle_timeout_ms);
    }

    #[test]
    fn empty_string_override_is_ignored() {
        let s = overrides(&[("RELAY_HOST", "")]);
        assert_eq!(s.server.host, "0.0.0.0");
    }

    // ── pure parsers ────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("80", 1, 100), Some(80));
        assert_eq!(parse_u16_range("0", 1, 100), None);
        assert_eq!(parse_u64_range("abc", 0, 10), None);
    }
}
