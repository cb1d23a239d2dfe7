//! Configuration loading and merging.
//!
//! The configuration is a JSON object. An optional `shared` reference
//! names a second file whose top-level keys are replayed over (or under,
//! with `override: false`) the local ones before validation. Validation
//! resolves every required key into a typed configuration for the core;
//! a missing key aborts the run before any further I/O.

use std::fs;
use std::path::{Path, PathBuf};

use binlog::RecordLayout;
use chrono::NaiveDateTime;
use notify::{CallConfig, GatewayConfig, SmsConfig};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Epoch assumed when the configuration names none.
pub const DEFAULT_START: &str = "1970-01-01 00:00:00";

const START_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration item: {key}")]
    MissingKey { key: &'static str },

    #[error("cannot read configuration file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration file {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration does not match the expected schema: {source}")]
    Schema {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid start timestamp `{value}`: {source}")]
    BadStart {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error(transparent)]
    Layout(#[from] binlog::DecodeError),
}

/// `shared` reference: a second config file layered over this one.
#[derive(Debug, Deserialize)]
struct SharedRef {
    path: PathBuf,
    /// When true (the default) the shared file's keys replace local ones;
    /// when false local keys win and the shared file only fills gaps.
    #[serde(default = "default_true", rename = "override")]
    override_local: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    size: Option<usize>,
    start: Option<String>,
    endian: Option<binlog::Endianness>,
    pattern: Option<Vec<String>>,
    message: Option<usize>,
    time: Option<usize>,
    whitelist: Option<Vec<String>>,
    blacklist: Option<Vec<String>>,
    cache: Option<PathBuf>,
    lock: Option<PathBuf>,
    gateway: Option<GatewayConfig>,
    sms: Option<SmsConfig>,
    call: Option<CallConfig>,
}

/// Fully resolved, validated configuration handed to the core.
#[derive(Debug)]
pub struct ResolvedConfig {
    pub layout: RecordLayout,
    pub epoch: NaiveDateTime,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
    pub cache: PathBuf,
    pub lock: Option<PathBuf>,
    pub gateway: GatewayConfig,
    pub sms: Option<SmsConfig>,
    pub call: Option<CallConfig>,
}

pub fn load(path: &Path) -> Result<ResolvedConfig, ConfigError> {
    let mut value = read_json(path)?;

    if let Some(reference) = value.get("shared").cloned() {
        let reference: SharedRef =
            serde_json::from_value(reference).map_err(|source| ConfigError::Schema { source })?;
        debug!(path = %reference.path.display(), "loading shared config");
        let overlay = read_json(&reference.path)?;
        merge(&mut value, overlay, reference.override_local);
    }

    let raw: RawConfig =
        serde_json::from_value(value).map_err(|source| ConfigError::Schema { source })?;

    let size = raw.size.ok_or(ConfigError::MissingKey { key: "size" })?;
    let pattern = raw.pattern.ok_or(ConfigError::MissingKey { key: "pattern" })?;
    let message = raw.message.ok_or(ConfigError::MissingKey { key: "message" })?;
    let time = raw.time.ok_or(ConfigError::MissingKey { key: "time" })?;
    let cache = raw.cache.ok_or(ConfigError::MissingKey { key: "cache" })?;
    let gateway = raw.gateway.ok_or(ConfigError::MissingKey { key: "gateway" })?;

    let start = raw.start.unwrap_or_else(|| DEFAULT_START.to_owned());
    let epoch = NaiveDateTime::parse_from_str(&start, START_FORMAT).map_err(|source| {
        ConfigError::BadStart {
            value: start.clone(),
            source,
        }
    })?;

    let fields = RecordLayout::parse_pattern(&pattern)?;
    let layout = RecordLayout::new(size, raw.endian.unwrap_or_default(), fields, message, time)?;

    Ok(ResolvedConfig {
        layout,
        epoch,
        whitelist: raw.whitelist.unwrap_or_default(),
        blacklist: raw.blacklist.unwrap_or_default(),
        cache,
        lock: raw.lock,
        gateway,
        sms: raw.sms,
        call: raw.call,
    })
}

fn read_json(path: &Path) -> Result<Value, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
        path: path.to_owned(),
        source,
    })
}

/// Replay the overlay's top-level keys over the base object.
fn merge(base: &mut Value, overlay: Value, override_local: bool) {
    if let (Value::Object(base), Value::Object(overlay)) = (base, overlay) {
        for (key, value) in overlay {
            if override_local || !base.contains_key(&key) {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn minimal(dir: &Path) -> String {
        format!(
            r#"{{
                "size": 16,
                "pattern": ["u32", "bytes:12"],
                "message": 1,
                "time": 0,
                "cache": "{}",
                "gateway": {{"sid": "AC0", "token": "tok", "from": "+15550001111"}}
            }}"#,
            dir.join("cache.json").display()
        )
    }

    #[test]
    fn minimal_config_resolves_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "config.json", &minimal(dir.path()));
        let resolved = load(&path).unwrap();
        assert_eq!(resolved.layout.record_size(), 16);
        assert_eq!(
            resolved.epoch,
            NaiveDateTime::parse_from_str(DEFAULT_START, START_FORMAT).unwrap()
        );
        assert!(resolved.whitelist.is_empty());
        assert!(resolved.lock.is_none());
    }

    #[test]
    fn missing_required_key_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            "config.json",
            r#"{"size": 16, "pattern": ["u32", "bytes:12"], "message": 1, "time": 0}"#,
        );
        let err = load(&path).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required configuration item: cache"
        );
    }

    #[test]
    fn mismatched_stride_is_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = minimal(dir.path()).replace("\"size\": 16", "\"size\": 20");
        let path = write_config(dir.path(), "config.json", &config);
        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Layout(_)));
    }

    #[test]
    fn bad_start_timestamp_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = minimal(dir.path())
            .replacen('{', "{\"start\": \"not a date\",", 1);
        let path = write_config(dir.path(), "config.json", &config);
        assert!(matches!(load(&path).unwrap_err(), ConfigError::BadStart { .. }));
    }

    #[test]
    fn shared_config_overrides_local_keys_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let shared = write_config(dir.path(), "shared.json", r#"{"blacklist": ["SHARED"]}"#);
        let config = minimal(dir.path()).replacen(
            '{',
            &format!(
                "{{\"blacklist\": [\"LOCAL\"], \"shared\": {{\"path\": \"{}\"}},",
                shared.display()
            ),
            1,
        );
        let path = write_config(dir.path(), "config.json", &config);
        let resolved = load(&path).unwrap();
        assert_eq!(resolved.blacklist, ["SHARED"]);
    }

    #[test]
    fn shared_config_can_defer_to_local_keys() {
        let dir = tempfile::tempdir().unwrap();
        let shared = write_config(
            dir.path(),
            "shared.json",
            r#"{"blacklist": ["SHARED"], "whitelist": ["W"]}"#,
        );
        let config = minimal(dir.path()).replacen(
            '{',
            &format!(
                "{{\"blacklist\": [\"LOCAL\"], \"shared\": {{\"path\": \"{}\", \"override\": false}},",
                shared.display()
            ),
            1,
        );
        let path = write_config(dir.path(), "config.json", &config);
        let resolved = load(&path).unwrap();
        // local key wins; shared still fills the gap
        assert_eq!(resolved.blacklist, ["LOCAL"]);
        assert_eq!(resolved.whitelist, ["W"]);
    }
}
