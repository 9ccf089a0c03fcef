//! AWS Bedrock LLM classifier.
//!
//! Uses the Converse API so any chat model available in the account can be
//! configured through `BEDROCK_MODEL_ID`. Credentials come from the default
//! AWS chain (environment, `~/.aws/credentials`, instance role).

use crate::prompt::build_prompt;
use crate::response::parse_model_response;
use crate::{Result, TypeClassifier};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, InferenceConfiguration, Message,
};
use aws_sdk_bedrockruntime::Client;
use doc_classify_common::{Classification, ClassificationError, ClassifierConfig};
use std::time::Instant;
use tracing::{debug, info};

const MAX_TOKENS: i32 = 300;
const TEMPERATURE: f32 = 0.2;

/// Primary classifier backed by a Bedrock-hosted model.
#[derive(Debug, Clone)]
pub struct BedrockClassifier {
    client: Client,
    model_id: String,
    max_prompt_chars: usize,
    min_text_chars: usize,
}

impl BedrockClassifier {
    /// Create a classifier in `config.bedrock_region`.
    pub async fn from_config(config: &ClassifierConfig) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.bedrock_region.clone()))
            .load()
            .await;
        info!(
            "Bedrock classifier initialised: model={} region={}",
            config.bedrock_model_id, config.bedrock_region
        );

        Self {
            client: Client::new(&sdk_config),
            model_id: config.bedrock_model_id.clone(),
            max_prompt_chars: config.max_prompt_chars,
            min_text_chars: config.min_text_chars,
        }
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl TypeClassifier for BedrockClassifier {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn classify(&self, text: &str) -> Result<Classification> {
        let chars = text.trim().chars().count();
        if chars < self.min_text_chars {
            return Err(ClassificationError::InsufficientText(chars));
        }

        let start = Instant::now();
        let message = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(build_prompt(text, self.max_prompt_chars)))
            .build()
            .map_err(|e| ClassificationError::Service(format!("failed to build message: {e}")))?;

        let response = self
            .client
            .converse()
            .model_id(&self.model_id)
            .messages(message)
            .inference_config(
                InferenceConfiguration::builder()
                    .max_tokens(MAX_TOKENS)
                    .temperature(TEMPERATURE)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| ClassificationError::Service(DisplayErrorContext(&e).to_string()))?;

        let output = response
            .output()
            .ok_or_else(|| ClassificationError::MalformedResponse("no output in response".into()))?;
        let message = output
            .as_message()
            .map_err(|_| ClassificationError::MalformedResponse("output is not a message".into()))?;
        let answer = message
            .content()
            .iter()
            .find_map(|block| match block {
                ContentBlock::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .ok_or_else(|| ClassificationError::MalformedResponse("no text content in response".into()))?;

        debug!(
            "Bedrock answered in {}ms: {}",
            start.elapsed().as_millis(),
            answer.chars().take(200).collect::<String>()
        );

        parse_model_response(answer)
    }
}
