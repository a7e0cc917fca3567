use exn::ResultExt;
use isahc::config::Configurable;
use isahc::{AsyncReadResponseExt, HttpClient, Request};
use serde::{Deserialize, Serialize};

use crate::{CompletionFuture, GenOptions, LlmError, Message, Provider};

const BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// `OpenAI` chat backend using the chat completions API.
pub struct OpenAi {
    client: HttpClient,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAi {
    /// Create a new `OpenAI` chat backend with the default model.
    pub fn new(api_key: &str) -> exn::Result<Self, LlmError> {
        let client =
            HttpClient::new().or_raise(|| LlmError::Network("create HTTP client".into()))?;
        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url: BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
        })
    }

    /// Override the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_owned();
        self
    }

    async fn request_completion(
        &self,
        messages: &[Message],
        options: &GenOptions,
    ) -> exn::Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };
        let json_body = serde_json::to_vec(&body)
            .or_raise(|| LlmError::Network("serialize chat request".into()))?;

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            "sending chat completion request"
        );

        let mut builder = Request::post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let request = builder
            .body(json_body)
            .or_raise(|| LlmError::Network("build HTTP request".into()))?;

        let mut response = self
            .client
            .send_async(request)
            .await
            .or_raise(|| LlmError::Network("send HTTP request".into()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .or_raise(|| LlmError::Network("read response body".into()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "chat completion API error");
            exn::bail!(LlmError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .or_raise(|| LlmError::Parse("parse chat completion JSON".into()))?;
        let Some(choice) = parsed.choices.into_iter().next() else {
            exn::bail!(LlmError::Parse("completion has no choices".into()));
        };
        Ok(choice.message.content.trim().to_owned())
    }
}

impl Provider for OpenAi {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn complete<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a GenOptions,
    ) -> CompletionFuture<'a> {
        Box::pin(self.request_completion(messages, options))
    }
}

// -- Wire types (OpenAI chat completions format) ----------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let messages = [Message::system("persona"), Message::user("hi")];
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: Some(0.7),
            max_tokens: Some(1000),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["temperature"], 0.7);
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn request_body_omits_unset_options() {
        let messages = [Message::user("hi")];
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: None,
            max_tokens: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn response_content_extraction() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  hello  "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let choice = parsed.choices.into_iter().next().unwrap();
        assert_eq!(choice.message.content.trim(), "hello");
    }
}
