pub mod chat;

use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub request_timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            completion_model: None,
            base_url: None,
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: None,
        }
    }
}

impl LlmConfig {
    /// Options used when a caller does not override model or temperature.
    pub fn default_options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.completion_model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_model_falls_back_to_default() {
        let config = LlmConfig {
            completion_model: Some("  ".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(config.default_options(), CompletionOptions::default());
    }

    #[test]
    fn configured_model_and_temperature_are_used() {
        let config = LlmConfig {
            completion_model: Some("gpt-4o".to_string()),
            temperature: 0.9,
            ..LlmConfig::default()
        };
        let options = config.default_options();
        assert_eq!(options.model, "gpt-4o");
        assert_eq!(options.temperature, 0.9);
    }
}
