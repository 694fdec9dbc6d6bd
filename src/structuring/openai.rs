//! Our OpenAI driver, which we also use for LiteLLM, Ollama and other
//! compatible gateways.

use async_openai::{Client, config::OpenAIConfig};

use crate::{
    config::openai_client_config, errors::StructuringServiceError, ocr::RecognizedText,
    prelude::*, validator::RawModelOutput,
};

use super::{StructuringDriver, StructuringOpts, prompt::ReceiptPrompt};

/// The parts of a chat completion response we care about. We deserialize
/// loosely, because compatible gateways disagree about the other fields.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Token usage.
#[derive(Debug, Deserialize)]
struct TokenUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl ChatResponse {
    /// Get the text of the first choice.
    fn into_raw_output(self) -> Result<RawModelOutput, StructuringServiceError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or(StructuringServiceError::NoChoices)?;
        if choice.finish_reason.as_deref() == Some("length") {
            // The JSON is probably cut off. Let the validator decide.
            warn!("Structuring response was truncated by the token limit");
        }
        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(RawModelOutput(content)),
            _ => Err(StructuringServiceError::EmptyContent),
        }
    }
}

/// Structuring driver using an OpenAI-compatible `/chat/completions` API.
#[derive(Debug)]
pub struct OpenAiStructuringDriver {
    /// The OpenAI client.
    client: Client<OpenAIConfig>,

    /// Our instruction prompt.
    prompt: ReceiptPrompt,

    /// Model options.
    opts: StructuringOpts,
}

impl OpenAiStructuringDriver {
    /// Create a new driver, configured from the environment.
    pub fn new(prompt: ReceiptPrompt, opts: StructuringOpts) -> Self {
        Self::with_config(openai_client_config(), prompt, opts)
    }

    /// Create a new driver with an explicit client configuration.
    pub fn with_config(
        config: OpenAIConfig,
        prompt: ReceiptPrompt,
        opts: StructuringOpts,
    ) -> Self {
        Self {
            client: Client::with_config(config),
            prompt,
            opts,
        }
    }

    /// Build our request body.
    fn build_request(&self, content: String) -> Value {
        json!({
            "model": self.opts.model,
            "messages": [{ "role": "user", "content": content }],
            "temperature": self.opts.temperature,
        })
    }
}

#[async_trait]
impl StructuringDriver for OpenAiStructuringDriver {
    #[instrument(level = "debug", skip_all, fields(model = %self.opts.model))]
    async fn structure(
        &self,
        text: &RecognizedText,
    ) -> Result<RawModelOutput, StructuringServiceError> {
        let content = self.prompt.render(text)?;
        let req = self.build_request(content);
        trace!(%req, "Request");

        let response: ChatResponse = self.client.chat().create_byot(req).await?;
        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Token usage"
            );
        }
        let output = response.into_raw_output()?;
        debug!(content = %output.as_str(), "Response");
        Ok(output)
    }
}
