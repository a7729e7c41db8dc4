//! OpenAI-compatible chat completions client.
//!
//! Serves both the vision capability (image sent as a base64 data URL) and
//! the language capability (plain text prompt).

use async_trait::async_trait;
use base64::Engine;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    create_http_client, truncate_error_body, CapabilityError, HttpTimeouts, LanguageCapability,
    VisionCapability,
};

pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsClient {
    /// `endpoint` is the API base, e.g. `https://api.openai.com/v1`.
    /// Local servers often take no key; pass `None` to omit the header.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        max_tokens: u32,
        timeouts: HttpTimeouts,
    ) -> Result<Self, CapabilityError> {
        Ok(Self {
            client: create_http_client(timeouts)?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            max_tokens,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    async fn send(&self, messages: Value) -> Result<String, CapabilityError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0,
            "messages": messages,
        });

        let mut request = self.client.post(self.completions_url()).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::UnexpectedStatus {
                status,
                body: truncate_error_body(&body),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| {
                CapabilityError::InvalidResponse(format!("Failed to parse completion: {}", e))
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                CapabilityError::InvalidResponse("Completion had no content".to_string())
            })?;

        debug!("Completion from {} returned {} chars", self.model, content.len());
        Ok(content)
    }
}

/// Builds a `data:` URL for inline image upload.
fn image_data_url(image: &[u8], mime_type: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(image);
    format!("data:{};base64,{}", mime_type, encoded)
}

#[async_trait]
impl VisionCapability for ChatCompletionsClient {
    async fn describe_image(
        &self,
        image: &[u8],
        mime_type: &str,
        instructions: &str,
    ) -> Result<String, CapabilityError> {
        let messages = json!([{
            "role": "user",
            "content": [
                { "type": "text", "text": instructions },
                { "type": "image_url", "image_url": { "url": image_data_url(image, mime_type) } },
            ],
        }]);
        self.send(messages).await
    }
}

#[async_trait]
impl LanguageCapability for ChatCompletionsClient {
    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError> {
        let messages = json!([{ "role": "user", "content": prompt }]);
        self.send(messages).await
    }
}
