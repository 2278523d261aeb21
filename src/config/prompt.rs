use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use log::info;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant living in a Discord server. \
Respond concisely, keep a friendly tone, and cite code snippets when useful.";

#[derive(Debug)]
pub enum PromptError {
    MissingPrompt(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::MissingPrompt(source) => write!(f, "No system prompt found in {}", source),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    pub system_prompt: String,
}

pub fn load_prompts_from_str(json: &str) -> Result<PromptConfig, PromptError> {
    let config: PromptConfig = serde_json::from_str(json)?;
    if config.system_prompt.trim().is_empty() {
        return Err(PromptError::MissingPrompt("prompt configuration".to_string()));
    }
    Ok(config)
}

pub fn load_prompts(path: &str) -> Result<PromptConfig, PromptError> {
    let file_content = fs::read_to_string(path)?;
    load_prompts_from_str(&file_content).map_err(|e| match e {
        PromptError::MissingPrompt(_) => PromptError::MissingPrompt(format!("'{}'", path)),
        other => other,
    })
}

/// Picks the persona: prompts file first, then an inline prompt, then the built-in default.
pub fn resolve_system_prompt(
    prompts_path: Option<&str>,
    inline: Option<&str>
) -> Result<String, PromptError> {
    if let Some(path) = prompts_path.filter(|p| !p.trim().is_empty()) {
        let config = load_prompts(path)?;
        info!("System prompt loaded from {}", path);
        return Ok(config.system_prompt);
    }
    if let Some(prompt) = inline.filter(|p| !p.trim().is_empty()) {
        return Ok(prompt.to_string());
    }
    Ok(DEFAULT_SYSTEM_PROMPT.to_string())
}
