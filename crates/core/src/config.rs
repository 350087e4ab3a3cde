//! TOML-based configuration for the GraphVCS query core.
//!
//! Sensitive values (the graph password, the blob-store secret key) are
//! stored as `_env` fields that reference environment variable names. The
//! actual secrets are resolved at runtime via [`AppConfig::resolve_env_vars`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Property-graph store connection settings.
    pub graph: GraphConfig,

    /// Blob store connection settings.
    pub blob: BlobConfig,

    /// Engine tunables.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        info!(path = %path.display(), "loaded configuration");
        config.validate()?;
        Ok(config)
    }

    /// Resolve all `_env` secret references from the process environment.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        self.graph.password = Some(std::env::var(&self.graph.password_env).map_err(|_| {
            ConfigError::EnvVarMissing {
                var: self.graph.password_env.clone(),
                field: "graph.password_env".into(),
            }
        })?);

        if let Some(ref var) = self.blob.secret_key_env {
            self.blob.secret_key =
                Some(std::env::var(var).map_err(|_| ConfigError::EnvVarMissing {
                    var: var.clone(),
                    field: "blob.secret_key_env".into(),
                })?);
        }

        debug!("resolved configuration secrets");
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.graph.uri.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "graph.uri".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.blob.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "blob.endpoint".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.blob.bucket.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "blob.bucket".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.blob.access_key_id.is_some() != self.blob.secret_key_env.is_some() {
            return Err(ConfigError::InvalidValue {
                field: "blob.access_key_id".into(),
                detail: "access_key_id and secret_key_env must be set together".into(),
            });
        }
        if self.engine.max_traversal_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.max_traversal_depth".into(),
                detail: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Graph store
// ---------------------------------------------------------------------------

/// Property-graph store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Base URI of the graph store's HTTP endpoint
    /// (e.g. `http://localhost:7474`).
    pub uri: String,

    /// Database name within the store.
    #[serde(default = "default_database")]
    pub database: String,

    /// Username for basic auth.
    pub username: String,

    /// Environment variable holding the password.
    pub password_env: String,

    /// Resolved password (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub password: Option<String>,
}

fn default_database() -> String {
    "neo4j".into()
}

// ---------------------------------------------------------------------------
// Blob store
// ---------------------------------------------------------------------------

/// Blob store connection settings. The store is any S3-compatible service;
/// omit the credential fields for anonymous access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    /// Service endpoint (e.g. `http://localhost:9000`).
    pub endpoint: String,

    /// Bucket holding the per-commit namespaces.
    pub bucket: String,

    /// Signing region.
    #[serde(default = "default_region")]
    pub region: String,

    /// Access key id. Optional; unsigned requests are sent when absent.
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Environment variable holding the secret access key.
    #[serde(default)]
    pub secret_key_env: Option<String>,

    /// Resolved secret key (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub secret_key: Option<String>,
}

fn default_region() -> String {
    "us-east-1".into()
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Engine tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum BFS rounds for merge-base resolution. The ancestry graph is
    /// expected to be a DAG; this bound turns a corrupt cyclic graph into a
    /// typed error instead of a hang.
    #[serde(default = "default_max_traversal_depth")]
    pub max_traversal_depth: u32,

    /// Per-request timeout in seconds. No timeout when absent.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_traversal_depth() -> u32 {
    1000
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_traversal_depth: default_max_traversal_depth(),
            request_timeout_secs: None,
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[graph]
uri = "http://localhost:7474"
username = "neo4j"
password_env = "GRAPHVCS_GRAPH_PASSWORD"

[blob]
endpoint = "http://localhost:9000"
bucket = "graphvcs"
"#;

    #[test]
    fn test_load_minimal_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.graph.database, "neo4j");
        assert_eq!(config.blob.region, "us-east-1");
        assert_eq!(config.engine.max_traversal_depth, 1000);
        assert!(config.engine.request_timeout_secs.is_none());
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load("/nonexistent/graphvcs.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_credentials_must_pair() {
        let text = MINIMAL.replace(
            "bucket = \"graphvcs\"",
            "bucket = \"graphvcs\"\naccess_key_id = \"AKID\"",
        );
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let text = format!("{}\n[engine]\nmax_traversal_depth = 0\n", MINIMAL);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
