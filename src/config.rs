//! Process configuration loaded from the environment
//!
//! The generation credential is validated here, once, at startup.
//! A missing key must never be discovered mid-request.

use crate::error::AnalyzerError;
use crate::Result;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Immutable process-wide settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub groq_api_key: String,
    pub model: String,
    pub base_url: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Settings {
    /// Load settings, failing fast if the generation credential is absent.
    pub fn from_env() -> Result<Self> {
        let groq_api_key = env::var("GROQ_API_KEY").map_err(|_| {
            AnalyzerError::ConfigurationError(
                "GROQ_API_KEY not found in environment variables. \
                 Please add it to your .env file"
                    .to_string(),
            )
        })?;

        if groq_api_key.trim().is_empty() {
            return Err(AnalyzerError::ConfigurationError(
                "GROQ_API_KEY is set but empty".to_string(),
            ));
        }

        let model = env::var("GROQ_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url = env::var("GROQ_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let port = env::var("PORT")
            .or_else(|_| env::var("API_PORT"))
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|e| AnalyzerError::ConfigurationError(format!("Invalid port: {}", e)))?;

        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        Ok(Self {
            groq_api_key,
            model,
            base_url,
            port,
            data_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them serialized in one test.
    #[test]
    fn test_from_env() {
        env::remove_var("GROQ_API_KEY");
        let missing = Settings::from_env();
        assert!(missing.is_err());
        let message = missing.unwrap_err().to_string();
        assert!(message.contains("GROQ_API_KEY"));

        env::set_var("GROQ_API_KEY", "test-key");
        env::remove_var("GROQ_MODEL");
        env::remove_var("GROQ_BASE_URL");
        env::remove_var("PORT");
        env::remove_var("API_PORT");
        env::remove_var("DATA_DIR");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.data_dir, PathBuf::from("data"));

        env::remove_var("GROQ_API_KEY");
    }
}
