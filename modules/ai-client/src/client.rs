use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

use crate::error::{AiError, Result};
use crate::types::*;

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Chat-completion client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiChat {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiChat {
    pub fn new(api_key: &str, model: &str, base_url: &str, timeout: Duration) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| AiError::Parse(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, "Chat completion request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    async fn chat_with_retry(&self, request: &ChatRequest) -> Result<ChatResponse> {
        with_single_retry(|| async move { self.chat(request).await }).await
    }
}

/// Run the completion call, retrying exactly once after a short backoff when
/// the failure looks transient. 4xx responses never retry.
async fn with_single_retry<T, F, Fut>(op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(err) if err.is_transient() => {
            warn!(error = %err, "Transient chat failure, retrying once");
            tokio::time::sleep(RETRY_BACKOFF).await;
            op().await
        }
        Err(err) => Err(err),
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(
        &self,
        system: &str,
        tools: &[ToolDefinition],
        messages: &[Message],
    ) -> Result<Completion> {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        wire_messages.push(Message::system(system));
        wire_messages.extend(messages.iter().cloned());

        let request = ChatRequest {
            model: self.model.clone(),
            messages: wire_messages,
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.iter().map(ToolWire::from).collect())
            },
            tool_choice: if tools.is_empty() {
                None
            } else {
                Some("auto".to_string())
            },
            temperature: Some(0.7),
        };

        self.chat_with_retry(&request).await?.into_completion()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn transient_failure_is_attempted_exactly_twice() {
        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        let result: Result<()> = with_single_retry(|| async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(AiError::Api {
                status: 500,
                message: "upstream down".to_string(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_error_is_never_retried() {
        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        let result: Result<()> = with_single_retry(|| async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(AiError::Api {
                status: 401,
                message: "bad token".to_string(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_surfaces_the_second_attempt() {
        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        let result = with_single_retry(|| async move {
            match attempts.fetch_add(1, Ordering::SeqCst) {
                0 => Err(AiError::Network("connection reset".to_string())),
                _ => Ok("hello".to_string()),
            }
        })
        .await;
        assert_eq!(result.unwrap(), "hello");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
