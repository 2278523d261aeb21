use clap::Parser;
use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::{ LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL };

const ARCHIVE_MINUTES: [u16; 4] = [60, 1440, 4320, 10080];

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Discord Args ---
    /// Bot token used to connect to the Discord gateway. Required.
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub discord_token: Option<String>,

    /// Minutes of inactivity before a question thread auto-archives (60, 1440, 4320, 10080)
    #[arg(
        long,
        env = "THREAD_ARCHIVE_MINUTES",
        default_value = "60",
        value_parser = parse_archive_minutes
    )]
    pub thread_archive_minutes: u16,

    // --- Completion Provider Args ---
    /// API key for the completion provider. Checked on each request, not at startup.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Model name for chat completion (e.g., gpt-4o-mini, gpt-4o)
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub openai_model: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// Sampling temperature for completions
    #[arg(long, env = "OPENAI_TEMPERATURE", default_value = "0.3")]
    pub temperature: f32,

    /// Request timeout in seconds. 0 leaves the transport default (no timeout).
    #[arg(long, env = "OPENAI_TIMEOUT_SECS", default_value = "0")]
    pub request_timeout_secs: u64,

    // --- Prompt Args ---
    /// Persona sent as the system message of every conversation
    #[arg(long, env = "SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// Optional JSON file with a "system_prompt" entry; takes precedence over --system-prompt
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,
}

impl Args {
    pub fn discord_token(&self) -> Result<String, ConfigError> {
        self.discord_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or(ConfigError::MissingCredential("DISCORD_TOKEN"))
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            api_key: self.openai_api_key.clone().filter(|k| !k.trim().is_empty()),
            completion_model: Some(self.openai_model.clone()),
            base_url: Some(self.openai_base_url.clone()),
            temperature: self.temperature,
            request_timeout: match self.request_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

fn parse_archive_minutes(value: &str) -> Result<u16, String> {
    let minutes: u16 = value
        .trim()
        .parse()
        .map_err(|e| format!("'{}' is not a number of minutes: {}", value, e))?;
    if ARCHIVE_MINUTES.contains(&minutes) {
        Ok(minutes)
    } else {
        Err(format!("auto-archive must be one of {:?} minutes, got {}", ARCHIVE_MINUTES, minutes))
    }
}
