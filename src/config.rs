//! Configuration management for the realty crew.
//!
//! Configuration is read from environment variables (a `.env` file in the
//! working directory is loaded first by the binaries):
//! - `OPENAI_API_KEY` - Required before a run. LLM provider key.
//! - `SERPER_API_KEY` - Required before a run. Serper (Google) search key.
//! - `TAVILY_API_KEY` - Required before a run. Tavily search key.
//! - `DEFAULT_MODEL` - Optional. Chat model. Defaults to `gpt-4o-mini`.
//! - `LLM_TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.7`.
//! - `OPENAI_BASE_URL` - Optional. Defaults to `https://api.openai.com/v1`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8501`.
//! - `MAX_ITERATIONS` - Optional. Agent loop ceiling per stage. Defaults to `25`.
//! - `WORKSPACE_PATH` - Optional. Working directory for shell commands.
//! - `REPORT_PATH` - Optional. Where the final report is written.
//!   Defaults to `reporte_inversion_pereira.md`.
//! - `CREW_CONFIG_DIR` - Optional. Directory with `agents.yaml` / `tasks.yaml`
//!   overriding the built-in crew definition.
//!
//! The three API keys are loaded as optional values so the web form can
//! start without them and report the problem when a run is requested.

use std::path::PathBuf;
use thiserror::Error;

/// Fixed relative path of the final investment report.
pub const DEFAULT_REPORT_PATH: &str = "reporte_inversion_pereira.md";

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const SERPER_API_KEY: &str = "SERPER_API_KEY";
pub const TAVILY_API_KEY: &str = "TAVILY_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Claves API no encontradas: {}. Asegúrate de tener un archivo `.env` con `OPENAI_API_KEY`, `SERPER_API_KEY` y `TAVILY_API_KEY`.", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// API credentials, read once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub serper_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
}

impl Credentials {
    fn from_env() -> Self {
        Self {
            openai_api_key: non_empty_env(OPENAI_API_KEY),
            serper_api_key: non_empty_env(SERPER_API_KEY),
            tavily_api_key: non_empty_env(TAVILY_API_KEY),
        }
    }

    /// Names of the credentials that are not configured.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (OPENAI_API_KEY, &self.openai_api_key),
            (SERPER_API_KEY, &self.serper_api_key),
            (TAVILY_API_KEY, &self.tavily_api_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }

    /// Gate checked before any pipeline run.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingCredentials` listing every absent key.
    pub fn require(&self) -> Result<(), ConfigError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials(missing))
        }
    }
}

/// LLM client settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Provider credentials
    pub credentials: Credentials,

    /// LLM settings shared by every agent
    pub llm: LlmConfig,

    /// Working directory for shell commands
    pub workspace_path: PathBuf,

    /// Where the final stage writes its report
    pub report_path: PathBuf,

    /// Optional directory overriding the built-in crew YAML
    pub crew_config_dir: Option<PathBuf>,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum iterations for each agent loop
    pub max_iterations: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let credentials = Credentials::from_env();

        let defaults = LlmConfig::default();
        let llm = LlmConfig {
            model: std::env::var("DEFAULT_MODEL").unwrap_or(defaults.model),
            temperature: parse_env("LLM_TEMPERATURE", defaults.temperature)?,
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
        };

        let workspace_path = std::env::var("WORKSPACE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let report_path = std::env::var("REPORT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_REPORT_PATH));

        let crew_config_dir = non_empty_env("CREW_CONFIG_DIR").map(PathBuf::from);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_env("PORT", 8501u16)?;
        let max_iterations = parse_env("MAX_ITERATIONS", 25usize)?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            credentials,
            llm,
            workspace_path,
            report_path,
            crew_config_dir,
            host,
            port,
            max_iterations,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(credentials: Credentials, workspace_path: PathBuf) -> Self {
        Self {
            credentials,
            llm: LlmConfig::default(),
            report_path: workspace_path.join(DEFAULT_REPORT_PATH),
            workspace_path,
            crew_config_dir: None,
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_iterations: 25,
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_credentials() -> Credentials {
        Credentials {
            openai_api_key: Some("sk-test".to_string()),
            serper_api_key: Some("serper".to_string()),
            tavily_api_key: Some("tvly".to_string()),
        }
    }

    #[test]
    fn complete_credentials_pass_the_gate() {
        assert!(full_credentials().require().is_ok());
    }

    #[test]
    fn each_missing_credential_blocks_the_run() {
        for name in [OPENAI_API_KEY, SERPER_API_KEY, TAVILY_API_KEY] {
            let mut creds = full_credentials();
            match name {
                OPENAI_API_KEY => creds.openai_api_key = None,
                SERPER_API_KEY => creds.serper_api_key = None,
                _ => creds.tavily_api_key = None,
            }
            let err = creds.require().unwrap_err();
            match &err {
                ConfigError::MissingCredentials(missing) => assert_eq!(missing, &vec![name]),
                other => panic!("unexpected error: {other}"),
            }
            assert!(err.to_string().contains(name));
        }
    }

    #[test]
    fn all_missing_are_listed_in_order() {
        let creds = Credentials::default();
        assert_eq!(
            creds.missing(),
            vec![OPENAI_API_KEY, SERPER_API_KEY, TAVILY_API_KEY]
        );
    }

    #[test]
    fn test_config_places_report_in_workspace() {
        let config = Config::new(Credentials::default(), PathBuf::from("/tmp/ws"));
        assert_eq!(
            config.report_path,
            PathBuf::from("/tmp/ws").join(DEFAULT_REPORT_PATH)
        );
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
    }
}
