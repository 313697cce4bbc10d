//! Serving configuration
//!
//! The serving container contract is expressed through a handful of
//! environment variables (`MODEL_ID`, `INSTANCE_TYPE`, `API_HOST`, ...).
//! This module reads them once into an explicit [`ServingConfig`] that is
//! passed to whatever needs it. Child processes receive the same values via
//! [`ServingConfig::to_env`]; the parent environment is never mutated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default instance type when `INSTANCE_TYPE` is unset
pub const DEFAULT_INSTANCE_TYPE: &str = "ml.g6.4xlarge";

/// Default bind host when `API_HOST` is unset
pub const DEFAULT_API_HOST: &str = "0.0.0.0";

/// Default port when `API_PORT` is unset
pub const DEFAULT_API_PORT: u16 = 8000;

/// Default log level when `UVICORN_LOG_LEVEL` is unset
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Model served by the local smoke test
pub const SMOKE_TEST_MODEL_ID: &str = "meta-llama/Llama-3.2-11B-Vision-Instruct";

/// Instance type label used by the local smoke test
pub const SMOKE_TEST_INSTANCE_TYPE: &str = "ml.g6.12xlarge";

/// Port used by the local smoke test
pub const SMOKE_TEST_API_PORT: u16 = 8001;

/// SageMaker instance types and the number of GPUs each one carries
pub const INSTANCE_GPUS: &[(&str, u32)] = &[
    ("ml.g5.4xlarge", 1),
    ("ml.g6.4xlarge", 1),
    ("ml.g5.12xlarge", 4),
    ("ml.g6.12xlarge", 4),
    ("ml.g5.48xlarge", 8),
    ("ml.g6.48xlarge", 8),
    ("ml.p4d.24xlarge", 8),
    ("ml.p4de.24xlarge", 8),
    ("ml.p5.48xlarge", 8),
];

/// Look up the GPU count for an instance type
pub fn gpus_for_instance(instance_type: &str) -> Option<u32> {
    INSTANCE_GPUS
        .iter()
        .find(|(name, _)| *name == instance_type)
        .map(|(_, gpus)| *gpus)
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is missing
    #[error("Required environment variable '{0}' is not set")]
    MissingEnvVar(String),

    /// Environment variable could not be parsed
    #[error("Environment variable '{var}' has invalid value '{value}': {reason}")]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },

    /// Instance type is not in the GPU table
    #[error("Instance type {0} not found in the instance table")]
    UnknownInstanceType(String),
}

/// Explicit serving configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingConfig {
    /// Model identifier (`MODEL_ID`)
    pub model_id: String,
    /// Optional tokenizer override (`TOKENIZER`)
    pub tokenizer: Option<String>,
    /// SageMaker instance type label (`INSTANCE_TYPE`)
    pub instance_type: String,
    /// Bind host (`API_HOST`)
    pub host: String,
    /// Bind port (`API_PORT`)
    pub port: u16,
    /// Server log level (`UVICORN_LOG_LEVEL`)
    pub log_level: String,
}

impl ServingConfig {
    /// Create a config for a model with every other field at its default
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            tokenizer: None,
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            host: DEFAULT_API_HOST.to_string(),
            port: DEFAULT_API_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// The fixed settings the local smoke test runs with
    pub fn smoke_test_defaults() -> Self {
        Self {
            instance_type: SMOKE_TEST_INSTANCE_TYPE.to_string(),
            port: SMOKE_TEST_API_PORT,
            ..Self::new(SMOKE_TEST_MODEL_ID)
        }
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_id = lookup("MODEL_ID")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("MODEL_ID".to_string()))?;

        let port = match lookup("API_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                var: "API_PORT".to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_API_PORT,
        };

        Ok(Self {
            model_id,
            tokenizer: lookup("TOKENIZER").filter(|s| !s.is_empty()),
            instance_type: lookup("INSTANCE_TYPE")
                .unwrap_or_else(|| DEFAULT_INSTANCE_TYPE.to_string()),
            host: lookup("API_HOST").unwrap_or_else(|| DEFAULT_API_HOST.to_string()),
            port,
            log_level: lookup("UVICORN_LOG_LEVEL")
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("MODEL_ID".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                var: "API_PORT".to_string(),
                value: "0".to_string(),
                reason: "port must be non-zero".to_string(),
            });
        }

        self.tensor_parallel_size().map(|_| ())
    }

    /// Number of GPUs to shard the model across
    pub fn tensor_parallel_size(&self) -> Result<u32, ConfigError> {
        gpus_for_instance(&self.instance_type)
            .ok_or_else(|| ConfigError::UnknownInstanceType(self.instance_type.clone()))
    }

    /// Environment variables handed to a child server process
    pub fn to_env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("MODEL_ID".to_string(), self.model_id.clone()),
            ("INSTANCE_TYPE".to_string(), self.instance_type.clone()),
            ("API_HOST".to_string(), self.host.clone()),
            ("API_PORT".to_string(), self.port.to_string()),
            ("UVICORN_LOG_LEVEL".to_string(), self.log_level.clone()),
        ];

        if let Some(ref tokenizer) = self.tokenizer {
            env.push(("TOKENIZER".to_string(), tokenizer.clone()));
        }

        env
    }

    /// Base URL a client on this machine should use to reach the server
    ///
    /// Wildcard bind addresses are not routable, so they map to loopback.
    pub fn client_base_url(&self) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" | "" => "127.0.0.1".to_string(),
            "::" | "[::]" => "[::1]".to_string(),
            // Bare IPv6 literals need brackets in a URL
            other if other.contains(':') && !other.starts_with('[') => format!("[{}]", other),
            other => other.to_string(),
        };
        format!("http://{}:{}", host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = ServingConfig::from_lookup(lookup_from(&[("MODEL_ID", "org/model")])).unwrap();

        assert_eq!(config.model_id, "org/model");
        assert_eq!(config.tokenizer, None);
        assert_eq!(config.instance_type, "ml.g6.4xlarge");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_from_lookup_requires_model_id() {
        let err = ServingConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingEnvVar("MODEL_ID".to_string()));
    }

    #[test]
    fn test_from_lookup_rejects_bad_port() {
        let err = ServingConfig::from_lookup(lookup_from(&[
            ("MODEL_ID", "m"),
            ("API_PORT", "eighty"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidValue { ref var, .. } if var == "API_PORT"));
    }

    #[test]
    fn test_tensor_parallel_size() {
        let mut config = ServingConfig::new("m");
        assert_eq!(config.tensor_parallel_size().unwrap(), 1);

        config.instance_type = "ml.g5.12xlarge".to_string();
        assert_eq!(config.tensor_parallel_size().unwrap(), 4);

        config.instance_type = "ml.p5.48xlarge".to_string();
        assert_eq!(config.tensor_parallel_size().unwrap(), 8);

        config.instance_type = "ml.t3.medium".to_string();
        assert_eq!(
            config.tensor_parallel_size().unwrap_err(),
            ConfigError::UnknownInstanceType("ml.t3.medium".to_string())
        );
    }

    #[test]
    fn test_smoke_test_defaults() {
        let config = ServingConfig::smoke_test_defaults();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8001);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());

        let env = config.to_env();
        assert!(env.contains(&("API_PORT".to_string(), "8001".to_string())));
        assert!(env.contains(&("API_HOST".to_string(), "0.0.0.0".to_string())));
        assert!(!env.iter().any(|(k, _)| k == "TOKENIZER"));
    }

    #[test]
    fn test_client_base_url_maps_wildcard() {
        let mut config = ServingConfig::smoke_test_defaults();
        assert_eq!(config.client_base_url(), "http://127.0.0.1:8001");

        config.host = "localhost".to_string();
        assert_eq!(config.client_base_url(), "http://localhost:8001");
    }

    #[test]
    fn test_client_base_url_brackets_ipv6() {
        let mut config = ServingConfig::smoke_test_defaults();

        config.host = "::1".to_string();
        assert_eq!(config.client_base_url(), "http://[::1]:8001");

        config.host = "[fe80::1]".to_string();
        assert_eq!(config.client_base_url(), "http://[fe80::1]:8001");

        config.host = "::".to_string();
        assert_eq!(config.client_base_url(), "http://[::1]:8001");
    }
}
