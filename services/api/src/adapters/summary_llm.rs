//! services/api/src/adapters/summary_llm.rs
//!
//! This module contains the adapter for the weekly-summary LLM.
//! It implements the `TextGenerator` port from the `journal_core` crate by asking
//! an OpenAI-compatible endpoint for a strict `json_schema` completion.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use journal_core::{
    ports::{PortError, PortResult, TextGenerator},
    schema::SummarySchema,
};
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are a warm, perceptive journaling companion. \
    Respond only with JSON that matches the requested schema.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerator` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiSummaryAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    fallback_model: Option<String>,
}

impl OpenAiSummaryAdapter {
    /// Creates a new `OpenAiSummaryAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, fallback_model: Option<String>) -> Self {
        Self {
            client,
            model,
            fallback_model: fallback_model.filter(|m| !m.is_empty()),
        }
    }

    /// Sends one request to `model` and returns the message text.
    async fn complete_with(
        &self,
        model: &str,
        prompt: &str,
        schema: &SummarySchema,
    ) -> PortResult<String> {
        let request = build_request(model, prompt, schema)?;

        // Map the error by hand; the orphan rule keeps us from a `From` impl.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Generation(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Generation(format!("model {} returned no text content", model))
            })?;

        if content.trim().is_empty() {
            return Err(PortError::Generation(format!(
                "model {} returned an empty completion",
                model
            )));
        }
        Ok(content)
    }
}

/// Builds the chat request for one summary completion.
pub fn build_request(
    model: &str,
    prompt: &str,
    schema: &SummarySchema,
) -> PortResult<CreateChatCompletionRequest> {
    let messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_PROMPT)
            .build()
            .map_err(|e| PortError::Generation(e.to_string()))?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| PortError::Generation(e.to_string()))?
            .into(),
    ];

    let response_format = ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
            description: None,
            name: schema.name.to_string(),
            schema: Some(schema.to_json_schema()),
            strict: Some(true),
        },
    };

    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(messages)
        .response_format(response_format)
        .n(1)
        .build()
        .map_err(|e| PortError::Generation(e.to_string()))
}

//=========================================================================================
// `TextGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerator for OpenAiSummaryAdapter {
    /// Completes the prompt on the primary model, retrying once on the fallback
    /// model when one is configured.
    async fn complete_structured(&self, prompt: &str, schema: &SummarySchema)
        -> PortResult<String> {
        debug!(model = %self.model, "Requesting weekly summary completion");
        match self.complete_with(&self.model, prompt, schema).await {
            Ok(content) => Ok(content),
            Err(primary_err) => match self.fallback_model.as_deref() {
                Some(fallback) if fallback != self.model => {
                    warn!(
                        model = %self.model,
                        fallback,
                        error = %primary_err,
                        "Primary summary model failed, trying fallback"
                    );
                    self.complete_with(fallback, prompt, schema).await
                }
                _ => Err(primary_err),
            },
        }
    }
}
