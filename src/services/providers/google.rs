// src/services/providers/google.rs
use super::extract::{parse_analysis_text, parse_svg_array_lenient};
use super::{GenerationRequest, ProviderAdapter, non_empty_text, send_json};
use crate::errors::IconError;
use crate::models::{Provider, ReferenceImage};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::info;
use reqwest::Client;
use serde_json::{Value, json};

const GOOGLE_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const VENDOR: &str = "Google Gemini";

/// Gemini adapter. Its SVG output is frequently fenced or half-escaped, so
/// generation goes through the lenient parser.
pub struct GoogleAdapter {
    client: Client,
    base_url: String,
}

impl GoogleAdapter {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, GOOGLE_API_URL)
    }

    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, model_id: &str, api_key: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/{}:generateContent", self.base_url, model_id))
            .query(&[("key", api_key)])
    }

    fn analysis_body(image: &ReferenceImage) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": super::prompts::IMAGE_ANALYSIS_PROMPT },
                    {
                        "inline_data": {
                            "mime_type": image.mime_type,
                            "data": general_purpose::STANDARD.encode(&image.data)
                        }
                    }
                ]
            }],
            "generationConfig": {
                "temperature": 0,
                "maxOutputTokens": 1500
            }
        })
    }

    fn generation_body(request: &GenerationRequest<'_>) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt() }]
            }],
            "generationConfig": {
                "temperature": 0,
                "seed": request.seed,
                "maxOutputTokens": 6000
            }
        })
    }

    fn extract_text(envelope: &Value) -> Option<String> {
        let parts = envelope["candidates"][0]["content"]["parts"].as_array()?;
        non_empty_text(parts.iter().map(|part| part["text"].as_str().unwrap_or("")))
    }

    /// Parses generation output, recovering raw `<svg>` blocks when no JSON array is usable.
    pub fn parse_generation_text(text: &str) -> Result<Vec<String>, IconError> {
        parse_svg_array_lenient(text, VENDOR)
    }
}

#[async_trait]
impl ProviderAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn analyze(
        &self,
        image: &ReferenceImage,
        model_id: &str,
        api_key: &str,
    ) -> Result<Value, IconError> {
        info!("Analyzing {} with {} ({})", image.filename, VENDOR, model_id);
        let body = Self::analysis_body(image);
        let envelope = send_json(self.request(model_id, api_key), &body, VENDOR)
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
        let body = Self::generation_body(request);
        let envelope = send_json(self.request(request.model_id, api_key), &body, VENDOR)
            .await
            .map_err(IconError::Generation)?;

        let content = Self::extract_text(&envelope)
            .ok_or_else(|| IconError::Generation(format!("No response from {}", VENDOR)))?;
        Self::parse_generation_text(&content)
    }
}
