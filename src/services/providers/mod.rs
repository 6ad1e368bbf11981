// src/services/providers/mod.rs
//! One adapter per LLM vendor behind a single capability trait.

pub mod anthropic;
pub mod catalog;
pub mod extract;
pub mod google;
pub mod ollama;
pub mod openai;
pub mod prompts;

use crate::errors::IconError;
use crate::models::{DesignSpecification, Provider, ReferenceImage};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::sync::Arc;

pub use anthropic::AnthropicAdapter;
pub use google::GoogleAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

/// Everything an adapter needs to ask for one batch of icons.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub specification: &'a DesignSpecification,
    pub subject: &'a str,
    pub seed: u32,
    pub model_id: &'a str,
    pub count: usize,
    pub prior_subject: Option<&'a str>,
    pub prior_svgs: &'a [String],
}

impl GenerationRequest<'_> {
    pub fn prompt(&self) -> String {
        prompts::svg_generation_prompt(
            self.specification,
            self.subject,
            self.count,
            self.prior_subject,
            self.prior_svgs,
        )
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Sends the analysis prompt with the image and returns the JSON object the model produced.
    async fn analyze(
        &self,
        image: &ReferenceImage,
        model_id: &str,
        api_key: &str,
    ) -> Result<Value, IconError>;

    /// Returns the raw SVG strings of one generation batch, in model order.
    async fn generate_icons(
        &self,
        request: &GenerationRequest<'_>,
        api_key: &str,
    ) -> Result<Vec<String>, IconError>;
}

/// Adapters selected once by provider identifier.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self { adapters }
    }

    /// The four built-in vendors sharing one HTTP client.
    pub fn with_defaults(client: Client, ollama_url: &str) -> Self {
        Self::new(vec![
            Arc::new(OpenAiAdapter::new(client.clone())),
            Arc::new(AnthropicAdapter::new(client.clone())),
            Arc::new(GoogleAdapter::new(client.clone())),
            Arc::new(OllamaAdapter::new(client, ollama_url)),
        ])
    }

    pub fn get(&self, provider: Provider) -> Result<Arc<dyn ProviderAdapter>, IconError> {
        self.adapters
            .iter()
            .find(|adapter| adapter.provider() == provider)
            .cloned()
            .ok_or_else(|| IconError::InvalidProvider(provider.to_string()))
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.adapters.iter().map(|a| a.provider()).collect()
    }
}

/// Vendor error text from a failed response body.
pub(crate) fn vendor_error_message(body: &Value, vendor: &str, status: u16) -> String {
    let message = body["error"]["message"]
        .as_str()
        .or_else(|| body["error"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} API error", vendor));
    format!("{} (HTTP {})", message, status)
}

/// Posts `body` and returns the decoded JSON envelope, or a human-readable failure.
pub(crate) async fn send_json(
    request: RequestBuilder,
    body: &Value,
    vendor: &str,
) -> Result<Value, String> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| format!("{} request failed: {}", vendor, e))?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response.json::<Value>().await.unwrap_or(Value::Null);
        return Err(vendor_error_message(&error_body, vendor, status.as_u16()));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| format!("Failed to parse {} response: {}", vendor, e))
}

/// Joins text parts, treating whitespace-only output as no output.
pub(crate) fn non_empty_text<'a>(parts: impl Iterator<Item = &'a str>) -> Option<String> {
    let text = parts.collect::<String>();
    if text.trim().is_empty() { None } else { Some(text) }
}
