use async_trait::async_trait;
use reqwest::Client;

use crate::config::ModelConfig;
use crate::provider::{AssistantReply, LLMError, LLMProvider, Result};
use agent_core::{tools::ToolSchema, Message};

use super::common::openai_compat::{build_openai_compat_body, parse_openai_compat_response};

/// Chat completions against any OpenAI-compatible endpoint.
///
/// Endpoint, model and key come from the [`ModelConfig`] of each call, so
/// one provider serves every configured model.
#[derive(Clone, Default)]
pub struct OpenAIProvider {
    client: Client,
}

impl OpenAIProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(
        &self,
        model: &ModelConfig,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<AssistantReply> {
        let body = build_openai_compat_body(&model.model, messages, tools);

        log::debug!(
            "Chat request to {} (model '{}', {} messages, {} tools)",
            model.base_url,
            model.model,
            messages.len(),
            tools.len()
        );

        let mut request = self.client.post(model.completions_url()).json(&body);
        if let Some(api_key) = model.resolve_api_key() {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(LLMError::Api(format!("HTTP {}: {}", status, text)));
        }

        let text = response.text().await?;
        let reply = parse_openai_compat_response(&text)?;
        log::debug!(
            "Model '{}' replied with {} tool calls",
            model.key,
            reply.tool_calls.len()
        );
        Ok(reply)
    }
}
