//! Chat completion for phrases the intent table does not know.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AppError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenRouter (or any OpenAI-compatible) `/chat/completions` client.
pub struct OpenRouterClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenRouterClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        if api_key.is_none() {
            tracing::warn!("OPENROUTER_API_KEY is not set; unmatched prompts will fail");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("chat client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model,
            temperature,
            max_tokens,
        })
    }
}

#[async_trait]
impl ChatCompletion for OpenRouterClient {
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::CompletionService("OpenRouter API key not configured".into()))?;

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(model = %self.model, chars = prompt.len(), "requesting completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::CompletionService(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::CompletionService(format!("API error {status}: {body}")));
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::CompletionService(format!("malformed response: {e}")))?;

        let reply = data
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if reply.is_empty() {
            return Err(AppError::CompletionService("empty completion".into()));
        }

        tracing::debug!(chars = reply.len(), "completion received");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn client_for(router: Router, api_key: Option<&str>) -> OpenRouterClient {
        client_with_timeout(router, api_key, Duration::from_secs(5)).await
    }

    async fn client_with_timeout(
        router: Router,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> OpenRouterClient {
        let base = serve(router).await;
        OpenRouterClient::new(
            &base,
            api_key.map(str::to_string),
            "deepseek/deepseek-r1".into(),
            0.5,
            1000,
            timeout,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sends_prompt_and_returns_trimmed_reply() {
        let router = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "deepseek/deepseek-r1");
                assert_eq!(body["messages"][0]["role"], "user");
                assert_eq!(body["messages"][0]["content"], "explain quantum tunneling");
                assert_eq!(body["max_tokens"], 1000);
                Json(json!({
                    "choices": [{ "message": { "content": "\n Particles borrow energy. " } }]
                }))
            }),
        );
        let chat = client_for(router, Some("sk-test")).await;

        let reply = chat.complete("explain quantum tunneling").await.unwrap();
        assert_eq!(reply, "Particles borrow energy.");
    }

    #[tokio::test]
    async fn missing_key_fails_without_a_request() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { panic!("should not be called") as () }),
        );
        let chat = client_for(router, None).await;

        let err = chat.complete("anything").await.unwrap_err();
        assert!(matches!(err, AppError::CompletionService(msg) if msg.contains("not configured")));
    }

    #[tokio::test]
    async fn empty_choices_are_an_error() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        );
        let chat = client_for(router, Some("sk-test")).await;

        assert!(matches!(
            chat.complete("anything").await,
            Err(AppError::CompletionService(_))
        ));
    }

    #[tokio::test]
    async fn blank_content_is_an_error() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({ "choices": [{ "message": { "content": "  " } }] })) }),
        );
        let chat = client_for(router, Some("sk-test")).await;

        assert!(matches!(
            chat.complete("anything").await,
            Err(AppError::CompletionService(_))
        ));
    }

    #[tokio::test]
    async fn upstream_errors_are_reported() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid key") }),
        );
        let chat = client_for(router, Some("sk-wrong")).await;

        let err = chat.complete("anything").await.unwrap_err();
        assert!(matches!(err, AppError::CompletionService(msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({ "choices": [{ "message": { "content": "too late" } }] }))
            }),
        );
        let chat = client_with_timeout(router, Some("sk-test"), Duration::from_secs(1)).await;

        let started = std::time::Instant::now();
        let err = chat.complete("anything").await.unwrap_err();
        assert!(matches!(err, AppError::CompletionService(_)));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
