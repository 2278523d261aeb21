use async_trait::async_trait;
use log::{ debug, warn };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::ChatClient;
use crate::error::{ CompletionError, ConfigError };
use crate::llm::{ CompletionOptions, LlmConfig, DEFAULT_BASE_URL };
use crate::models::chat::ChatMessage;

const API_KEY_VAR: &str = "OPENAI_API_KEY";

pub struct OpenAIChatClient {
    http: HttpClient,
    /// Outcome of validating the API key; checked on every call.
    credential: Result<(), ConfigError>,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIChatClient {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Result<Self, CompletionError> {
        Self::build(api_key, base_url, None)
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, CompletionError> {
        Self::build(config.api_key.clone(), config.base_url.clone(), config.request_timeout)
    }

    fn build(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<std::time::Duration>
    ) -> Result<Self, CompletionError> {
        let api_url = base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let credential = match bearer_header(api_key.as_deref()) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
                Ok(())
            }
            Err(e) => {
                if let ConfigError::Invalid { .. } = &e {
                    warn!("{}; completion requests will be refused", e);
                }
                Err(e)
            }
        };

        let mut builder = HttpClient::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            credential,
            base_url: api_url,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }
}

fn bearer_header(api_key: Option<&str>) -> Result<HeaderValue, ConfigError> {
    let key = api_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(ConfigError::MissingCredential(API_KEY_VAR))?;
    let mut value = HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e|
        ConfigError::Invalid {
            field: API_KEY_VAR,
            message: e.to_string(),
        }
    )?;
    value.set_sensitive(true);
    Ok(value)
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions
    ) -> Result<String, CompletionError> {
        self.ensure_configured()?;

        let req = OpenAIChatRequest {
            model: &options.model,
            messages: messages
                .iter()
                .map(|m| OpenAIMessage { role: m.role().as_str(), content: m.content() })
                .collect(),
            temperature: options.temperature,
        };

        let resp = self.http.post(self.endpoint()).json(&req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("OpenAI chat completion returned {}", status);
            return Err(CompletionError::Status { status: status.as_u16(), body });
        }

        let body = resp.text().await?;
        let parsed: OpenAIResponse = serde_json
            ::from_str(&body)
            .map_err(|e| CompletionError::Decode(e.to_string()))?;

        let content = parsed.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        debug!("OpenAI reply received ({} chars)", content.chars().count());

        Ok(content)
    }

    fn ensure_configured(&self) -> Result<(), ConfigError> {
        self.credential.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_chain;
    use httpmock::prelude::*;
    use serde_json::json;

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::system("persona"), ChatMessage::user("ana asked:\nWhat is 2+2?")]
    }

    fn client(server: &MockServer) -> OpenAIChatClient {
        OpenAIChatClient::new(Some("sk-test".to_string()), Some(server.url("/v1"))).unwrap()
    }

    #[tokio::test]
    async fn sends_history_and_returns_first_choice() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-test")
                .json_body(
                    json!({
                    "model": "gpt-4o-mini",
                    "messages": [
                        {"role": "system", "content": "persona"},
                        {"role": "user", "content": "ana asked:\nWhat is 2+2?"}
                    ],
                    "temperature": 0.3
                })
                );
            then.status(200).json_body(
                json!({
                "choices": [
                    {"message": {"role": "assistant", "content": " 4 "}},
                    {"message": {"role": "assistant", "content": "five"}}
                ]
            })
            );
        });

        let reply = client(&server).complete(messages(), CompletionOptions::default()).await.unwrap();

        assert_eq!(reply, " 4 ");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn null_content_becomes_empty_string() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(
                json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })
            );
        });

        let reply = client(&server).complete(messages(), CompletionOptions::default()).await.unwrap();
        assert_eq!(reply, "");
    }

    #[tokio::test]
    async fn rate_limit_is_reported_as_status_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(429).body("rate limit exceeded");
        });

        let err = client(&server)
            .complete(messages(), CompletionOptions::default()).await
            .unwrap_err();
        match err {
            CompletionError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limit exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).body("not json");
        });

        let err = client(&server)
            .complete(messages(), CompletionOptions::default()).await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Decode(_)));
    }

    #[tokio::test]
    async fn missing_key_never_reaches_the_network() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200);
        });
        let client = OpenAIChatClient::new(None, Some(server.url("/v1"))).unwrap();

        let err = client.complete(messages(), CompletionOptions::default()).await.unwrap_err();

        assert!(
            matches!(
                err,
                CompletionError::Configuration(ConfigError::MissingCredential("OPENAI_API_KEY"))
            )
        );
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn surrounding_whitespace_in_key_is_trimmed() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions").header("authorization", "Bearer sk-test");
            then.status(200).json_body(json!({"choices": [{"message": {"content": "ok"}}]}));
        });
        let client = OpenAIChatClient::new(
            Some(" sk-test\n".to_string()),
            Some(server.url("/v1"))
        ).unwrap();

        let reply = client.complete(messages(), CompletionOptions::default()).await.unwrap();

        assert_eq!(reply, "ok");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn unusable_key_fails_each_call_instead_of_construction() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200);
        });
        let client = OpenAIChatClient::new(
            Some("sk-ab\ncd".to_string()),
            Some(server.url("/v1"))
        ).expect("client is still built");

        for _ in 0..2 {
            let err = client.complete(messages(), CompletionOptions::default()).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    CompletionError::Configuration(ConfigError::Invalid { field: "OPENAI_API_KEY", .. })
                )
            );
        }
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn connection_failure_keeps_the_underlying_cause() {
        // Bind then drop a listener so the port is known to be closed.
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let client = OpenAIChatClient::new(
            Some("sk-test".to_string()),
            Some(format!("http://127.0.0.1:{}/v1", port))
        ).unwrap();

        let err = client.complete(messages(), CompletionOptions::default()).await.unwrap_err();

        assert!(matches!(err, CompletionError::Transport(_)));
        assert!(std::error::Error::source(&err).is_some());
        let chain = error_chain(&err);
        assert!(chain.starts_with("completion request failed: error sending request"));
        assert!(chain.matches(": ").count() >= 2, "cause missing from {chain}");
    }

    #[test]
    fn endpoint_accepts_full_completions_url() {
        let client = OpenAIChatClient::new(
            Some("k".to_string()),
            Some("http://localhost:8080/v1/chat/completions/".to_string())
        ).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");

        let default = OpenAIChatClient::new(Some("k".to_string()), None).unwrap();
        assert_eq!(default.endpoint(), "https://api.openai.com/v1/chat/completions");
    }
}
