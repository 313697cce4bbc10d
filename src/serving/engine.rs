//! Inference engine launch arguments
//!
//! Translates a [`ServingConfig`] into the command line of the
//! OpenAI-compatible engine that sits behind the SageMaker adapter.

use crate::config::{ConfigError, ServingConfig};
use crate::process::ServerCommand;

/// Maximum context length passed to the engine
pub const MAX_MODEL_LEN: u32 = 4049;

/// Multimodal input limit per prompt
pub const LIMIT_MM_PER_PROMPT: &str = "image=2";

/// Default engine entrypoint
pub fn default_engine_command() -> ServerCommand {
    ServerCommand::new("python3").args(["-m", "vllm.entrypoints.openai.api_server"])
}

/// Engine argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineArgs {
    args: Vec<String>,
}

impl EngineArgs {
    /// Build the engine arguments for a configuration
    ///
    /// Fails if the instance type has no known GPU count.
    pub fn from_config(config: &ServingConfig) -> Result<Self, ConfigError> {
        let tensor_parallel_size = config.tensor_parallel_size()?;

        let mut args = vec!["--model".to_string(), config.model_id.clone()];

        if let Some(ref tokenizer) = config.tokenizer {
            args.push("--tokenizer".to_string());
            args.push(tokenizer.clone());
        }

        args.extend([
            "--tensor-parallel-size".to_string(),
            tensor_parallel_size.to_string(),
            "--host".to_string(),
            config.host.clone(),
            "--port".to_string(),
            config.port.to_string(),
            "--uvicorn-log-level".to_string(),
            config.log_level.clone(),
            "--trust-remote-code".to_string(),
            "--max-model-len".to_string(),
            MAX_MODEL_LEN.to_string(),
            "--limit-mm-per-prompt".to_string(),
            LIMIT_MM_PER_PROMPT.to_string(),
        ]);

        Ok(Self { args })
    }

    /// Arguments in order
    pub fn as_slice(&self) -> &[String] {
        &self.args
    }

    /// Append the arguments to an entrypoint command
    pub fn apply_to(&self, command: ServerCommand) -> ServerCommand {
        command.args(self.args.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_args_for_multi_gpu_instance() {
        let config = ServingConfig {
            instance_type: "ml.g5.12xlarge".to_string(),
            port: 8080,
            ..ServingConfig::new("org/model")
        };

        let args = EngineArgs::from_config(&config).unwrap();
        let joined = args.as_slice().join(" ");

        assert_eq!(
            joined,
            "--model org/model --tensor-parallel-size 4 --host 0.0.0.0 --port 8080 \
             --uvicorn-log-level info --trust-remote-code --max-model-len 4049 \
             --limit-mm-per-prompt image=2"
        );
    }

    #[test]
    fn test_tokenizer_is_forwarded() {
        let config = ServingConfig {
            tokenizer: Some("org/tok".to_string()),
            ..ServingConfig::new("org/model")
        };

        let args = EngineArgs::from_config(&config).unwrap();
        assert_eq!(&args.as_slice()[2..4], &["--tokenizer".to_string(), "org/tok".to_string()]);
    }

    #[test]
    fn test_unknown_instance_type() {
        let config = ServingConfig {
            instance_type: "ml.c5.large".to_string(),
            ..ServingConfig::new("org/model")
        };

        assert!(EngineArgs::from_config(&config).is_err());
    }

    #[test]
    fn test_apply_to_entrypoint() {
        let args = EngineArgs::from_config(&ServingConfig::new("m")).unwrap();
        let command = args.apply_to(default_engine_command());

        assert_eq!(command.program, "python3");
        assert_eq!(command.args[..2], ["-m".to_string(), "vllm.entrypoints.openai.api_server".to_string()]);
        assert_eq!(command.args.len(), 2 + args.as_slice().len());
    }
}
