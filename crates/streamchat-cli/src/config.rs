//! CLI configuration.
//!
//! Configuration is loaded from `~/.config/streamchat/config.toml` when the
//! file exists; every field is optional and command-line flags take
//! precedence.
//!
//! ## Example Configuration
//!
//! ```toml
//! endpoint = "http://localhost:8000"
//! system_prompt = "You are a terse assistant."
//! streaming = true
//! validation = "strict"
//! timeout_seconds = 120
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use streamchat::{ClientConfig, DEFAULT_BASE_URL, ValidationMode};

/// Prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Settings for an interactive session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the agent server
    pub endpoint: String,

    /// System prompt prepended to every request (empty disables it)
    pub system_prompt: String,

    /// Stream replies item by item instead of waiting for the full response
    pub streaming: bool,

    /// Frame validation mode
    pub validation: ValidationMode,

    /// Request timeout in seconds (unbounded when unset)
    pub timeout_seconds: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_BASE_URL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            streaming: true,
            validation: ValidationMode::default(),
            timeout_seconds: None,
        }
    }
}

impl AgentConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// file at an explicit path is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Returns the default configuration file path, if a config directory
    /// exists on this platform.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("streamchat").join("config.toml"))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Converts the session settings into a validated client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or timeout is invalid.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::new(&self.endpoint).with_validation(self.validation);
        if let Some(timeout) = self.timeout_seconds {
            config = config.with_timeout(timeout);
        }
        config
            .validate()
            .with_context(|| format!("Invalid endpoint configuration: {}", self.endpoint))?;
        Ok(config)
    }

    /// Returns the system prompt, or `None` when it is blank.
    pub fn system_prompt(&self) -> Option<&str> {
        let prompt = self.system_prompt.trim();
        (!prompt.is_empty()).then_some(prompt)
    }
}
