use crate::error::GenerationError;
use actionplan_protocol::{GenerationRequest, ResponseFormat};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4.1-mini";

/// Produces the raw text of a structured response for a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Overrides the system message of every request when set.
    pub system: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
            system: None,
        }
    }
}

pub struct HttpGenerator {
    client: Client,
    endpoint: Url,
    model: String,
    system: Option<String>,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let base = check_base_url(&config.base_url)?;
        let endpoint = Url::parse(&format!(
            "{}/chat/completions",
            base.as_str().trim_end_matches('/')
        ))
        .map_err(|e| GenerationError::Configuration(format!("invalid base URL: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            log::warn!(
                "{} is not set; sending unauthenticated requests to {}",
                config.api_key_env,
                endpoint
            );
        }

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            system: config.system.clone(),
            api_key,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn body(&self, request: &GenerationRequest) -> Value {
        let system = self.system.as_deref().unwrap_or(&request.system);
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": request.prompt },
            ],
        });
        if request.response_format == ResponseFormat::JsonObject {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        log::debug!(
            "Requesting completion from {} ({} prompt chars)",
            self.endpoint,
            request.prompt.chars().count()
        );

        let mut call = self
            .client
            .post(self.endpoint.clone())
            .json(&self.body(request));
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Unavailable(format!(
                "{} returned {status}: {body}",
                self.endpoint
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(transport_error)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                GenerationError::Unavailable("completion carried no message content".to_string())
            })
    }
}

fn transport_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Unavailable(err.to_string())
    }
}

/// Accept https anywhere and plain http only for loopback hosts.
fn check_base_url(raw: &str) -> Result<Url, GenerationError> {
    let url = Url::parse(raw)
        .map_err(|e| GenerationError::Configuration(format!("invalid base URL '{raw}': {e}")))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" => {
            let local = matches!(
                url.host_str(),
                Some("localhost" | "127.0.0.1" | "[::1]" | "::1")
            );
            if local {
                log::warn!("Using unencrypted generation endpoint {url}");
                Ok(url)
            } else {
                Err(GenerationError::Configuration(format!(
                    "plain http is only allowed for localhost, got '{raw}'"
                )))
            }
        }
        other => Err(GenerationError::Configuration(format!(
            "unsupported scheme '{other}' in '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> GenerationConfig {
        GenerationConfig {
            base_url: base_url.to_string(),
            api_key_env: "ACTIONPLAN_TEST_GENERATION_KEY".to_string(),
            ..GenerationConfig::default()
        }
    }

    fn completion(content: &str) -> Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }],
        })
    }

    #[test]
    fn base_url_policy() {
        assert!(check_base_url("https://api.openai.com/v1").is_ok());
        assert!(check_base_url("http://localhost:8080/v1").is_ok());
        assert!(check_base_url("http://127.0.0.1:9000").is_ok());
        assert!(matches!(
            check_base_url("http://example.com/v1"),
            Err(GenerationError::Configuration(_))
        ));
        assert!(check_base_url("ftp://localhost").is_err());
        assert!(check_base_url("not a url").is_err());
    }

    #[test]
    fn config_defaults() {
        let config: GenerationConfig = serde_json::from_str(r#"{"timeout_secs": 5}"#).unwrap();
        assert_eq!(config.model, DEFAULT_GENERATION_MODEL);
        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.timeout_secs, 5);
    }

    #[tokio::test]
    async fn posts_chat_completion_in_json_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4.1-mini",
                "response_format": { "type": "json_object" },
                "messages": [
                    { "role": "system", "content": "You are a helpful assistant." },
                    { "role": "user", "content": "plan please" },
                ],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"category":"billing"}"#)))
            .expect(1)
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(&config(&format!("{}/v1", server.uri()))).unwrap();
        let text = generator
            .generate(&GenerationRequest::json("plan please"))
            .await
            .unwrap();
        assert_eq!(text, r#"{"category":"billing"}"#);
    }

    #[tokio::test]
    async fn configured_system_prompt_wins() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messages": [{ "role": "system", "content": "Be terse." }],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
            .expect(1)
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(&GenerationConfig {
            system: Some("Be terse.".to_string()),
            ..config(&server.uri())
        })
        .unwrap();
        generator.generate(&GenerationRequest::json("x")).await.unwrap();
    }

    #[tokio::test]
    async fn sends_bearer_key_from_environment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
            .expect(1)
            .mount(&server)
            .await;

        std::env::set_var("ACTIONPLAN_TEST_BEARER_KEY", "sk-test");
        let generator = HttpGenerator::new(&GenerationConfig {
            api_key_env: "ACTIONPLAN_TEST_BEARER_KEY".to_string(),
            ..config(&server.uri())
        })
        .unwrap();
        generator.generate(&GenerationRequest::json("x")).await.unwrap();
    }

    #[tokio::test]
    async fn server_errors_are_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(&config(&server.uri())).unwrap();
        let err = generator
            .generate(&GenerationRequest::json("x"))
            .await
            .unwrap_err();
        match err {
            GenerationError::Unavailable(msg) => assert!(msg.contains("503"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_are_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(&config(&server.uri())).unwrap();
        assert!(matches!(
            generator.generate(&GenerationRequest::json("x")).await,
            Err(GenerationError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("{}"))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let generator = HttpGenerator::new(&GenerationConfig {
            timeout_secs: 1,
            ..config(&server.uri())
        })
        .unwrap();
        assert_eq!(
            generator.generate(&GenerationRequest::json("x")).await,
            Err(GenerationError::Timeout)
        );
    }
}
