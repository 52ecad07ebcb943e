//! Configuration for the kdb+ client

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::error::{KdbError, KdbResult};

/// Configuration for the kdb+ client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdbConfig {
    /// Client name, used in log output
    #[serde(default = "default_name")]
    pub name: String,

    /// Store URI (e.g., "kdb://localhost:5001")
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Frame transport configuration
    #[serde(default)]
    pub transport: KdbTransportConfig,

    /// Retry configuration
    #[serde(default)]
    pub retry: KdbRetryConfig,

    /// Per-function chunking and retry settings, keyed by remote function name
    #[serde(default)]
    pub functions: HashMap<String, FunctionConfig>,
}

/// Frame transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdbTransportConfig {
    /// Upper bound on a single read while collecting a frame payload
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

impl Default for KdbTransportConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: default_read_chunk_size(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl KdbTransportConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdbRetryConfig {
    /// Retry bound for functions without an explicit entry
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,

    /// Fixed pause before each retry, in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for KdbRetryConfig {
    fn default() -> Self {
        Self {
            default_max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl KdbRetryConfig {
    /// Get backoff as Duration
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Chunking and retry settings for one remote function
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionConfig {
    /// Keyword arguments that may be halved, in the order they are tried
    #[serde(default)]
    pub chunk_dims: Vec<String>,

    /// Retry bound; falls back to `retry.default_max_retries`
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Default for KdbConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            uri: default_uri(),
            transport: Default::default(),
            retry: Default::default(),
            functions: HashMap::new(),
        }
    }
}

impl KdbConfig {
    /// Register chunking settings for a function
    pub fn with_function(
        mut self,
        name: impl Into<String>,
        chunk_dims: &[&str],
        max_retries: u32,
    ) -> Self {
        self.functions.insert(
            name.into(),
            FunctionConfig {
                chunk_dims: chunk_dims.iter().map(|d| d.to_string()).collect(),
                max_retries: Some(max_retries),
            },
        );
        self
    }

    /// Validate the configuration and return the store address as `host:port`
    pub fn validate(&self) -> KdbResult<String> {
        if self.transport.read_chunk_size == 0 {
            return Err(KdbError::InvalidConfig(
                "read_chunk_size must be > 0".to_string(),
            ));
        }

        let uri = Url::parse(&self.uri)?;

        if uri.scheme() != "kdb" && uri.scheme() != "tcp" {
            return Err(KdbError::InvalidUri(format!(
                "Expected kdb:// or tcp:// scheme, got: {}",
                uri.scheme()
            )));
        }

        let host = uri
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| KdbError::InvalidUri("Missing host in URI".to_string()))?;
        let port = uri
            .port()
            .ok_or_else(|| KdbError::InvalidUri("Missing port in URI".to_string()))?;

        Ok(format!("{}:{}", host, port))
    }
}

fn default_name() -> String {
    "kdb".to_string()
}

fn default_uri() -> String {
    "kdb://localhost:5001".to_string()
}

fn default_read_chunk_size() -> usize {
    16_384
}

fn default_connect_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KdbConfig::default();
        assert_eq!(config.name, "kdb");
        assert_eq!(config.uri, "kdb://localhost:5001");
        assert_eq!(config.transport.read_chunk_size, 16_384);
        assert_eq!(config.transport.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry.default_max_retries, 3);
        assert_eq!(config.retry.backoff(), Duration::from_secs(1));
        assert!(config.functions.is_empty());
    }

    #[test]
    fn test_validate_uri() {
        let config = KdbConfig::default();
        assert_eq!(config.validate().unwrap(), "localhost:5001");

        let config = KdbConfig {
            uri: "tcp://10.0.0.7:5010".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap(), "10.0.0.7:5010");
    }

    #[test]
    fn test_invalid_uri_scheme() {
        let config = KdbConfig {
            uri: "http://localhost:5001".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(KdbError::InvalidUri(_))));
    }

    #[test]
    fn test_missing_port() {
        let config = KdbConfig {
            uri: "kdb://localhost".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(KdbError::InvalidUri(_))));
    }

    #[test]
    fn test_zero_chunk_size() {
        let config = KdbConfig {
            transport: KdbTransportConfig {
                read_chunk_size: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(KdbError::InvalidConfig(_))));
    }

    #[test]
    fn test_deserialize_functions() {
        let config: KdbConfig = serde_json::from_str(
            r#"{
                "uri": "kdb://quotes:5001",
                "retry": { "backoff_ms": 250 },
                "functions": {
                    "getDataByDateRange": {
                        "chunk_dims": ["symbols", "date_range"],
                        "max_retries": 2
                    },
                    "getStats": {}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.name, "kdb");
        assert_eq!(config.retry.backoff_ms, 250);
        assert_eq!(config.retry.default_max_retries, 3);

        let range = &config.functions["getDataByDateRange"];
        assert_eq!(range.chunk_dims, vec!["symbols", "date_range"]);
        assert_eq!(range.max_retries, Some(2));

        assert_eq!(config.functions["getStats"], FunctionConfig::default());
    }
}
