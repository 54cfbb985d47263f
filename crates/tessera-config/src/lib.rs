//! Tessera Config - layered gateway configuration.
//!
//! `Config::load()` merges three layers, lowest precedence first:
//! 1. embedded `defaults.toml`
//! 2. an optional config file (`--config` path or `tessera.toml`)
//! 3. `TESSERA_*` environment variables
//!
//! The merged tree is deserialized and validated before anything starts.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;

pub use error::{ConfigError, ConfigResult};

use std::path::Path;

use serde::Deserialize;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the gateway listens on.
    pub bind_addr: String,
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory for the embedded durable tier.
    pub data_dir: String,
    /// Root directory for the filesystem object store.
    pub object_root: String,
}

/// Sandbox resource bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
    /// Wall-clock budget per handler execution, in milliseconds.
    pub execution_budget_ms: u64,
    /// Maximum WASM linear memory per execution, in bytes.
    pub max_memory_bytes: u64,
}

/// Audit sink settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether request outcomes are appended to the audit log.
    pub enabled: bool,
}

/// The merged gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Storage backend settings.
    pub storage: StorageConfig,
    /// Sandbox resource bounds.
    pub sandbox: SandboxConfig,
    /// Audit sink settings.
    pub audit: AuditConfig,
}

impl Config {
    /// Load configuration: defaults, then `config_path` if given, then
    /// environment overrides; validate the result.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a layer is malformed or the merged
    /// configuration fails validation.
    pub fn load(config_path: Option<&Path>) -> ConfigResult<Self> {
        let mut merged: toml::Value =
            toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::Parse {
                path: "<embedded defaults>".to_string(),
                message: e.to_string(),
            })?;

        if let Some(path) = config_path {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let overlay: toml::Value = toml::from_str(&text).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            deep_merge(&mut merged, overlay);
            tracing::info!(path = %path.display(), "loaded config file");
        }

        apply_env_overrides(&mut merged, |name| std::env::var(name).ok());

        let config: Config = merged
            .try_into()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "server.bind_addr is not a socket address: {}",
                self.server.bind_addr
            )));
        }
        if self.sandbox.execution_budget_ms == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.execution_budget_ms must be positive".to_string(),
            ));
        }
        if self.sandbox.max_memory_bytes < 64 * 1024 {
            return Err(ConfigError::Invalid(
                "sandbox.max_memory_bytes must be at least one WASM page".to_string(),
            ));
        }
        Ok(())
    }
}

/// Overlay `overlay` onto `base`, table by table.
fn deep_merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_table.insert(key, value);
                    },
                }
            }
        },
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

/// Environment variable overrides, one per leaf field.
const ENV_OVERRIDES: &[(&str, &str, &str, EnvKind)] = &[
    ("TESSERA_BIND_ADDR", "server", "bind_addr", EnvKind::String),
    ("TESSERA_DATA_DIR", "storage", "data_dir", EnvKind::String),
    ("TESSERA_OBJECT_ROOT", "storage", "object_root", EnvKind::String),
    ("TESSERA_EXECUTION_BUDGET_MS", "sandbox", "execution_budget_ms", EnvKind::Integer),
    ("TESSERA_MAX_MEMORY_BYTES", "sandbox", "max_memory_bytes", EnvKind::Integer),
    ("TESSERA_AUDIT_ENABLED", "audit", "enabled", EnvKind::Bool),
];

#[derive(Clone, Copy)]
enum EnvKind {
    String,
    Integer,
    Bool,
}

fn apply_env_overrides(merged: &mut toml::Value, get: impl Fn(&str) -> Option<String>) {
    for &(name, section, field, kind) in ENV_OVERRIDES {
        let Some(raw) = get(name) else { continue };
        let value = match kind {
            EnvKind::String => toml::Value::String(raw),
            EnvKind::Integer => match raw.parse::<i64>() {
                Ok(n) => toml::Value::Integer(n),
                Err(_) => {
                    tracing::warn!(var = name, value = %raw, "ignoring non-integer env override");
                    continue;
                },
            },
            EnvKind::Bool => match raw.parse::<bool>() {
                Ok(b) => toml::Value::Boolean(b),
                Err(_) => {
                    tracing::warn!(var = name, value = %raw, "ignoring non-boolean env override");
                    continue;
                },
            },
        };
        if let Some(table) = merged.get_mut(section).and_then(toml::Value::as_table_mut) {
            table.insert(field.to_string(), value);
        }
    }
}
