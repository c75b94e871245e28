//! Configuration loading for the attestor.
//!
//! Configuration lives in a TOML file. `${VAR}` references are substituted
//! from the environment before parsing, a handful of secrets can be
//! overridden through prefixed environment variables, and the result is
//! validated before any network call is made.

use regex::Regex;
use std::env;
use std::path::Path;
use thiserror::Error;

mod types;

pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "ATTESTOR_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let file_path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;

		let content = match tokio::fs::read_to_string(file_path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(ConfigError::FileNotFound(file_path.clone()))
			}
			Err(e) => return Err(e.into()),
		};

		tracing::debug!(path = %file_path, "Loaded configuration file");
		self.load_from_str(&content)
	}

	/// Parses, overrides and validates configuration from TOML text.
	pub fn load_from_str(&self, content: &str) -> Result<Config, ConfigError> {
		let substituted = substitute_env_vars(content)?;

		let mut config: Config =
			toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config);
		validate_config(&config)?;

		Ok(config)
	}

	fn apply_env_overrides(&self, config: &mut Config) {
		if let Ok(api_key) = env::var(format!("{}VERIFIER_API_KEY", self.env_prefix)) {
			config.verifier.api_key = api_key;
		}

		if let Ok(private_key) = env::var(format!("{}PRIVATE_KEY", self.env_prefix)) {
			config.account.private_key = private_key;
		}

		if let Ok(rpc_url) = env::var(format!("{}RPC_URL", self.env_prefix)) {
			config.network.rpc_url = rpc_url;
		}
	}
}

/// Replaces every `${VAR_NAME}` with the value of the environment variable.
///
/// Comment lines are copied untouched.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;
	let mut result = String::with_capacity(content.len());

	for line in content.split_inclusive('\n') {
		if line.trim_start().starts_with('#') {
			result.push_str(line);
			continue;
		}

		let mut substituted = line.to_string();
		for cap in re.captures_iter(line) {
			let var_name = &cap[1];
			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
			substituted = substituted.replace(&cap[0], &env_value);
		}
		result.push_str(&substituted);
	}

	Ok(result)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
	require_http_url("network.rpc_url", &config.network.rpc_url)?;
	require_http_url("verifier.url", &config.verifier.url)?;
	require_http_url("data_availability.url", &config.data_availability.url)?;
	require_http_url("upstream.transfer_api_url", &config.upstream.transfer_api_url)?;

	if config.verifier.api_key.trim().is_empty() {
		return Err(ConfigError::ValidationError(
			"verifier.api_key must be set".to_string(),
		));
	}

	let key = config.account.private_key.trim();
	let key = key.strip_prefix("0x").unwrap_or(key);
	if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
		return Err(ConfigError::ValidationError(
			"account.private_key must be 64 hex characters (32 bytes)".to_string(),
		));
	}

	if config.network.receipt_poll_interval_secs == 0 || config.network.receipt_timeout_secs == 0 {
		return Err(ConfigError::ValidationError(
			"network receipt polling settings must be greater than zero".to_string(),
		));
	}

	let retrieval = &config.retrieval;
	if retrieval.finalization_interval_secs == 0 || retrieval.proof_interval_secs == 0 {
		return Err(ConfigError::ValidationError(
			"retrieval poll intervals must be greater than zero".to_string(),
		));
	}
	if retrieval.proof_max_attempts == 0 {
		return Err(ConfigError::ValidationError(
			"retrieval.proof_max_attempts must be greater than zero".to_string(),
		));
	}

	Ok(())
}

fn require_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
	if value.starts_with("http://") || value.starts_with("https://") {
		Ok(())
	} else if value.trim().is_empty() {
		Err(ConfigError::ValidationError(format!("{} must be set", field)))
	} else {
		Err(ConfigError::ValidationError(format!(
			"{} must start with http:// or https://",
			field
		)))
	}
}
