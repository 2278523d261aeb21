pub mod openai;

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use super::{ CompletionOptions, LlmConfig };
use self::openai::OpenAIChatClient;
use crate::error::{ CompletionError, ConfigError };
use crate::models::chat::{ ChatMessage, ConversationHistory };

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Returns the raw content of the first generated choice, or an empty
    /// string when the provider sent none.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions
    ) -> Result<String, CompletionError>;

    /// Checked before any request is dispatched.
    fn ensure_configured(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Turns a history into one assistant reply. The request itself runs on a
/// spawned task so the event loop keeps serving other threads while it waits.
#[derive(Clone)]
pub struct CompletionGateway {
    client: Arc<dyn ChatClient>,
    defaults: CompletionOptions,
}

impl CompletionGateway {
    pub fn new(client: Arc<dyn ChatClient>, defaults: CompletionOptions) -> Self {
        Self { client, defaults }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        Ok(Self::new(new_client(config)?, config.default_options()))
    }

    pub async fn complete(&self, history: &ConversationHistory) -> Result<String, CompletionError> {
        self.complete_with(history, self.defaults.clone()).await
    }

    pub async fn complete_with(
        &self,
        history: &ConversationHistory,
        options: CompletionOptions
    ) -> Result<String, CompletionError> {
        self.client.ensure_configured()?;

        debug!(
            "Dispatching completion: model={}, temperature={}, messages={}",
            options.model,
            options.temperature,
            history.len()
        );
        let client = Arc::clone(&self.client);
        let messages = history.messages().to_vec();
        let worker = tokio::spawn(async move { client.complete(messages, options).await });
        let reply = worker.await??;

        Ok(reply.trim().to_string())
    }
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, CompletionError> {
    let client = OpenAIChatClient::from_config(config)?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingClient {
        reply: Result<String, String>,
        seen: Mutex<Vec<(usize, CompletionOptions)>>,
    }

    impl RecordingClient {
        fn replying(text: &str) -> Self {
            Self { reply: Ok(text.to_string()), seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ChatClient for RecordingClient {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            options: CompletionOptions
        ) -> Result<String, CompletionError> {
            self.seen.lock().unwrap().push((messages.len(), options));
            self.reply.clone().map_err(|body| CompletionError::Status { status: 502, body })
        }
    }

    struct UnconfiguredClient;

    #[async_trait]
    impl ChatClient for UnconfiguredClient {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _options: CompletionOptions
        ) -> Result<String, CompletionError> {
            panic!("request must not be dispatched without a credential");
        }

        fn ensure_configured(&self) -> Result<(), ConfigError> {
            Err(ConfigError::MissingCredential("OPENAI_API_KEY"))
        }
    }

    struct PanickingClient;

    #[async_trait]
    impl ChatClient for PanickingClient {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _options: CompletionOptions
        ) -> Result<String, CompletionError> {
            panic!("boom");
        }
    }

    fn history() -> ConversationHistory {
        let mut history = ConversationHistory::new("persona");
        history.push_user("ana asked:\nWhat is 2+2?");
        history
    }

    #[tokio::test]
    async fn reply_is_trimmed_and_full_history_is_sent() {
        let client = Arc::new(RecordingClient::replying("  4\n"));
        let gateway = CompletionGateway::new(client.clone(), CompletionOptions::default());

        let reply = gateway.complete(&history()).await.unwrap();

        assert_eq!(reply, "4");
        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, 2);
        assert_eq!(seen[0].1.model, "gpt-4o-mini");
        assert_eq!(seen[0].1.temperature, 0.3);
    }

    #[tokio::test]
    async fn empty_content_is_not_an_error() {
        let gateway = CompletionGateway::new(
            Arc::new(RecordingClient::replying("   ")),
            CompletionOptions::default()
        );
        assert_eq!(gateway.complete(&history()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn explicit_options_override_defaults() {
        let client = Arc::new(RecordingClient::replying("ok"));
        let gateway = CompletionGateway::new(client.clone(), CompletionOptions::default());
        let options = CompletionOptions { model: "gpt-4o".to_string(), temperature: 1.0 };

        gateway.complete_with(&history(), options.clone()).await.unwrap();

        assert_eq!(client.seen.lock().unwrap()[0].1, options);
    }

    #[tokio::test]
    async fn missing_credential_fails_before_dispatch() {
        let gateway = CompletionGateway::new(Arc::new(UnconfiguredClient), CompletionOptions::default());
        let err = gateway.complete(&history()).await.unwrap_err();
        assert!(
            matches!(
                err,
                CompletionError::Configuration(ConfigError::MissingCredential("OPENAI_API_KEY"))
            )
        );
    }

    #[tokio::test]
    async fn upstream_failure_is_surfaced_as_completion_error() {
        let client = RecordingClient {
            reply: Err("connection reset".to_string()),
            seen: Mutex::new(Vec::new()),
        };
        let gateway = CompletionGateway::new(Arc::new(client), CompletionOptions::default());
        let err = gateway.complete(&history()).await.unwrap_err();
        assert!(
            matches!(err, CompletionError::Status { status: 502, ref body } if body == "connection reset")
        );
    }

    #[tokio::test]
    async fn worker_panic_becomes_completion_error() {
        let gateway = CompletionGateway::new(Arc::new(PanickingClient), CompletionOptions::default());
        let err = gateway.complete(&history()).await.unwrap_err();
        assert!(matches!(err, CompletionError::Worker(_)));
    }
}
