use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::services::{LlmMode, LlmRequest, LlmService};

/// Configuration for the chat model behind the pipeline
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Model used for [`LlmMode::Reasoning`]; falls back to `model`
    pub reasoning_model: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LlmProviderKind {
    Ollama,
    OpenAI,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::Ollama,
            api_key: None,
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
            reasoning_model: None,
            timeout_secs: 300,
        }
    }
}

impl LlmConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let provider = std::env::var("LLM_PROVIDER")
            .unwrap_or_else(|_| "ollama".to_string())
            .to_lowercase();

        let provider = match provider.as_str() {
            "openai" => LlmProviderKind::OpenAI,
            _ => LlmProviderKind::Ollama,
        };

        let base_url = match provider {
            LlmProviderKind::Ollama => {
                std::env::var("OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
            }
            LlmProviderKind::OpenAI => std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
        };

        let model = match provider {
            LlmProviderKind::Ollama => {
                std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "qwen2.5:7b".to_string())
            }
            LlmProviderKind::OpenAI => {
                std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string())
            }
        };

        let api_key = if provider == LlmProviderKind::OpenAI {
            Some(
                std::env::var("OPENAI_API_KEY")
                    .context("OPENAI_API_KEY required for OpenAI provider")?,
            )
        } else {
            None
        };

        let timeout_secs = match std::env::var("LLM_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("LLM_TIMEOUT_SECS is not a number: {}", raw))?,
            Err(_) => 300,
        };

        Ok(Self {
            provider,
            api_key,
            base_url,
            model,
            reasoning_model: std::env::var("LLM_REASONING_MODEL").ok(),
            timeout_secs,
        })
    }

    fn model_for(&self, mode: LlmMode) -> &str {
        match mode {
            LlmMode::Reasoning => self.reasoning_model.as_deref().unwrap_or(&self.model),
            _ => &self.model,
        }
    }
}

fn build_client(config: &LlmConfig) -> Result<Client> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

fn log_recorded(request: &LlmRequest, response: &str) {
    if request.record {
        info!(
            "Recorded {:?} call: {} prompt chars -> {} response chars",
            request.mode,
            request.prompt.chars().count(),
            response.chars().count()
        );
    }
}

/// Build the provider selected by `config.provider`
pub fn build_llm(config: LlmConfig) -> Result<Arc<dyn LlmService>> {
    Ok(match config.provider {
        LlmProviderKind::Ollama => Arc::new(OllamaProvider::new(config)?),
        LlmProviderKind::OpenAI => Arc::new(OpenAIProvider::new(config)?),
    })
}

/// Ollama `/api/generate` provider
pub struct OllamaProvider {
    config: LlmConfig,
    client: Client,
}

impl OllamaProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    /// Call Ollama API
    async fn call_ollama(&self, request: &LlmRequest) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);

        let request_body = json!({
            "model": self.config.model_for(request.mode),
            "prompt": request.prompt,
            "system": request.system.clone().unwrap_or_default(),
            "stream": false,
            "options": {
                "temperature": 0.7,
            }
        });

        debug!("Calling Ollama at {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .context("Failed to call Ollama API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error {}: {}", status, error_text);
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            response: String,
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }
}

#[async_trait]
impl LlmService for OllamaProvider {
    async fn call(&self, request: LlmRequest) -> Result<String> {
        if request.mode == LlmMode::Passthrough {
            return Ok(request.prompt);
        }
        let response = self.call_ollama(&request).await?;
        log_recorded(&request, &response);
        Ok(response)
    }
}

/// OpenAI-compatible `/v1/chat/completions` provider
pub struct OpenAIProvider {
    config: LlmConfig,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    /// Call OpenAI API
    async fn call_openai(&self, request: &LlmRequest) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let request_body = json!({
            "model": self.config.model_for(request.mode),
            "messages": messages,
            "temperature": 0.7,
        });

        debug!("Calling OpenAI at {}", url);

        let mut http_request = self.client.post(&url).json(&request_body);

        if let Some(ref api_key) = self.config.api_key {
            http_request = http_request.bearer_auth(api_key);
        }

        let response = http_request
            .send()
            .await
            .context("Failed to call OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {}: {}", status, error_text);
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<OpenAIChoice>,
        }

        #[derive(Deserialize)]
        struct OpenAIChoice {
            message: OpenAIMessage,
        }

        #[derive(Deserialize)]
        struct OpenAIMessage {
            content: String,
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        openai_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("No response from OpenAI"))
    }
}

#[async_trait]
impl LlmService for OpenAIProvider {
    async fn call(&self, request: LlmRequest) -> Result<String> {
        if request.mode == LlmMode::Passthrough {
            return Ok(request.prompt);
        }
        let response = self.call_openai(&request).await?;
        log_recorded(&request, &response);
        Ok(response)
    }
}
