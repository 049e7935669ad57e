//! Engine settings: built-in defaults, optionally overridden by layered YAML.
//!
//! Merge order is defaults first, then each YAML document in the order given;
//! later documents win. The merged tree is serialized to canonical JSON
//! (object keys sorted) and hashed, so the hash identifies the effective
//! settings regardless of key order or how the layers were split.

use std::collections::BTreeSet;
use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::ConfigError;

/// Leaf strings starting with one of these are refused with
/// `CONFIG_SECRET_DETECTED`. Credentials belong in the environment.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",
    "sk_live",
    "sk_test",
    "AKIA",
    "-----BEGIN",
    "ghp_",
    "gho_",
    "glpat-",
    "xoxb-",
    "xoxp-",
];

/// Every leaf the engine reads. A leaf outside this list is unused.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/retry/max_attempts",
    "/retry/delay_ms",
    "/retry/call_timeout_ms",
    "/pacing/page_ms",
    "/pacing/point_read_ms",
    "/pacing/project_ms",
    "/verify/progress_every",
    "/verify/sample_fraction",
    "/verify/sample_seed",
    "/status/concurrency",
    "/onchain/strict_index_bound",
];

// ---------------------------------------------------------------------------
// Typed settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_ms: u64,
    /// 0 disables the per-call timeout.
    pub call_timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            call_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingSettings {
    /// Pause between explorer page requests.
    pub page_ms: u64,
    /// Pause between single-record chain reads.
    pub point_read_ms: u64,
    /// Pause between projects in a multi-project run.
    pub project_ms: u64,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            page_ms: 200,
            point_read_ms: 50,
            project_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifySettings {
    pub progress_every: u64,
    /// `None` checks every record.
    pub sample_fraction: Option<f64>,
    pub sample_seed: u64,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            progress_every: 500,
            sample_fraction: None,
            sample_seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSettings {
    /// Contracts probed at the same time.
    pub concurrency: usize,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnchainSettings {
    /// Abort an index drain that found fewer owned tokens than `totalSupply`.
    pub strict_index_bound: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub retry: RetrySettings,
    pub pacing: PacingSettings,
    pub verify: VerifySettings,
    pub status: StatusSettings,
    pub onchain: OnchainSettings,
}

impl EngineSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |pointer: &str, message: &str| ConfigError::InvalidSetting {
            pointer: pointer.to_string(),
            message: message.to_string(),
        };
        if self.retry.max_attempts == 0 {
            return Err(invalid("/retry/max_attempts", "must be at least 1"));
        }
        if self.verify.progress_every == 0 {
            return Err(invalid("/verify/progress_every", "must be at least 1"));
        }
        if let Some(f) = self.verify.sample_fraction {
            if !(f > 0.0 && f <= 1.0) {
                return Err(invalid("/verify/sample_fraction", "must be in (0, 1]"));
            }
        }
        if self.status.concurrency == 0 {
            return Err(invalid("/status/concurrency", "must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: EngineSettings,
    pub settings_hash: String,
    pub canonical_json: String,
    /// Leaf pointers present in the YAML but never read (sorted).
    pub unused: Vec<String>,
}

pub fn load_settings(paths: &[&str], policy: UnusedKeyPolicy) -> Result<LoadedSettings, ConfigError> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw = fs::read_to_string(p).map_err(|e| ConfigError::Io {
            path: p.to_string(),
            message: e.to_string(),
        })?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_settings_from_strings(&doc_refs, policy)
}

pub fn load_settings_from_strings(
    yaml_docs: &[&str],
    policy: UnusedKeyPolicy,
) -> Result<LoadedSettings, ConfigError> {
    let mut merged = serde_json::to_value(EngineSettings::default())
        .map_err(|e| ConfigError::Yaml(e.to_string()))?;
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        if v_yaml.is_null() {
            // empty document
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;
    let unused = report_unused_keys(&merged, policy)?;

    let settings: EngineSettings =
        serde_json::from_value(merged.clone()).map_err(|e| ConfigError::InvalidSetting {
            pointer: "/".to_string(),
            message: e.to_string(),
        })?;
    settings.validate()?;

    let canonical_json =
        serde_json::to_string(&merged).map_err(|e| ConfigError::Yaml(e.to_string()))?;
    let settings_hash = sha256_hex(canonical_json.as_bytes());

    Ok(LoadedSettings {
        settings,
        settings_hash,
        canonical_json,
        unused,
    })
}

/// Unused leaf pointers of `settings_json`. Under `Fail` any unused leaf is an error.
pub fn report_unused_keys(
    settings_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<Vec<String>, ConfigError> {
    let consumed: BTreeSet<String> = CONSUMED_POINTERS
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();

    let mut leaves = Vec::new();
    collect_leaf_pointers(settings_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !consumed.iter().any(|c| is_prefix_pointer(c, leaf)))
        .collect();
    unused.sort();
    unused.dedup();

    if !unused.is_empty() {
        match policy {
            UnusedKeyPolicy::Fail => {
                return Err(ConfigError::UnusedKeys {
                    count: unused.len(),
                    preview: unused.iter().take(12).cloned().collect(),
                })
            }
            UnusedKeyPolicy::Warn => {
                warn!(count = unused.len(), first = ?unused.first(), "unused settings keys");
            }
        }
    }
    Ok(unused)
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" covers "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, vv) in map {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{prefix}/{i}");
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => out.push(if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }),
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn enforce_no_secret_literals(v: &Value) -> Result<(), ConfigError> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                return Err(ConfigError::SecretDetected { pointer: ptr });
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
