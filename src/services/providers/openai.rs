// src/services/providers/openai.rs
use super::extract::{parse_analysis_text, parse_svg_array};
use super::{GenerationRequest, ProviderAdapter, non_empty_text, send_json};
use crate::errors::IconError;
use crate::models::{Provider, ReferenceImage};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::{debug, info};
use reqwest::Client;
use serde_json::{Value, json};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const VENDOR: &str = "OpenAI";

pub struct OpenAiAdapter {
    client: Client,
    endpoint: String,
}

impl OpenAiAdapter {
    pub fn new(client: Client) -> Self {
        Self::with_endpoint(client, OPENAI_API_URL)
    }

    pub fn with_endpoint(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    fn analysis_body(model_id: &str, image: &ReferenceImage) -> Value {
        let base64_image = general_purpose::STANDARD.encode(&image.data);
        json!({
            "model": model_id,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": super::prompts::IMAGE_ANALYSIS_PROMPT },
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:{};base64,{}", image.mime_type, base64_image)
                        }
                    }
                ]
            }],
            "temperature": 0,
            "max_completion_tokens": 1500
        })
    }

    fn generation_body(request: &GenerationRequest<'_>) -> Value {
        json!({
            "model": request.model_id,
            "messages": [{ "role": "user", "content": request.prompt() }],
            "temperature": 0,
            "seed": request.seed,
            "max_completion_tokens": 6000
        })
    }

    fn extract_text(envelope: &Value) -> Option<String> {
        non_empty_text(envelope["choices"][0]["message"]["content"].as_str().into_iter())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn analyze(
        &self,
        image: &ReferenceImage,
        model_id: &str,
        api_key: &str,
    ) -> Result<Value, IconError> {
        info!("Analyzing {} with {} ({})", image.filename, VENDOR, model_id);
        let body = Self::analysis_body(model_id, image);
        let envelope = send_json(
            self.client.post(&self.endpoint).bearer_auth(api_key),
            &body,
            VENDOR,
        )
        .await
        .map_err(IconError::Analysis)?;

        let content = Self::extract_text(&envelope)
            .ok_or_else(|| IconError::Analysis(format!("No response from {}", VENDOR)))?;
        parse_analysis_text(&content, VENDOR)
    }

    async fn generate_icons(
        &self,
        request: &GenerationRequest<'_>,
        api_key: &str,
    ) -> Result<Vec<String>, IconError> {
        debug!("{} generation seed {}", VENDOR, request.seed);
        let body = Self::generation_body(request);
        let envelope = send_json(
            self.client.post(&self.endpoint).bearer_auth(api_key),
            &body,
            VENDOR,
        )
        .await
        .map_err(IconError::Generation)?;

        let content = Self::extract_text(&envelope)
            .ok_or_else(|| IconError::Generation(format!("No response from {}", VENDOR)))?;
        parse_svg_array(&content, VENDOR)
    }
}
