use anyhow::{anyhow, Result};
use async_trait::async_trait;
use langchain_rust::{
    language_models::llm::LLM,
    llm::openai::{OpenAI, OpenAIConfig},
    schemas::Message,
};

use super::Oracle;
use crate::core::config::AnalyzerConfig;

pub struct OpenAiOracle {
    llm: OpenAI<OpenAIConfig>,
}

impl OpenAiOracle {
    pub fn new(api_key: &str, model: &str) -> Self {
        let llm = OpenAI::default()
            .with_config(OpenAIConfig::default().with_api_key(api_key))
            .with_model(model);
        Self { llm }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
        let key = config.require_openai_key()?;
        Ok(Self::new(key, &config.openai_model))
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let messages = [
            Message::new_system_message(system),
            Message::new_human_message(user),
        ];
        log::debug!("Sending {} characters to the model", user.len());
        let response = self
            .llm
            .generate(&messages)
            .await
            .map_err(|e| anyhow!("Model call failed: {}", e))?;
        Ok(response.generation)
    }
}
