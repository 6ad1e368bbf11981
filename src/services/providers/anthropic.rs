// src/services/providers/anthropic.rs
use super::extract::{parse_analysis_text, parse_svg_array};
use super::{GenerationRequest, ProviderAdapter, non_empty_text, send_json};
use crate::errors::IconError;
use crate::models::{Provider, ReferenceImage};
use crate::services::ImageProcessor;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::info;
use reqwest::Client;
use serde_json::{Value, json};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const VENDOR: &str = "Anthropic";

pub struct AnthropicAdapter {
    client: Client,
    endpoint: String,
    image_processor: ImageProcessor,
}

impl AnthropicAdapter {
    pub fn new(client: Client) -> Self {
        Self::with_endpoint(client, ANTHROPIC_API_URL)
    }

    pub fn with_endpoint(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            image_processor: ImageProcessor::new(),
        }
    }

    fn request(&self, api_key: &str) -> reqwest::RequestBuilder {
        self.client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn analysis_body(model_id: &str, image: &ReferenceImage) -> Value {
        json!({
            "model": model_id,
            "max_tokens": 1500,
            "temperature": 0,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": image.mime_type,
                            "data": general_purpose::STANDARD.encode(&image.data)
                        }
                    },
                    { "type": "text", "text": super::prompts::IMAGE_ANALYSIS_PROMPT }
                ]
            }]
        })
    }

    // No seed parameter on this API; temperature 0 is the only determinism knob.
    fn generation_body(request: &GenerationRequest<'_>) -> Value {
        json!({
            "model": request.model_id,
            "max_tokens": 6000,
            "temperature": 0,
            "messages": [{ "role": "user", "content": request.prompt() }]
        })
    }

    fn extract_text(envelope: &Value) -> Option<String> {
        let blocks = envelope["content"].as_array()?;
        non_empty_text(
            blocks
                .iter()
                .filter(|block| block["type"].as_str().unwrap_or("text") == "text")
                .filter_map(|block| block["text"].as_str()),
        )
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn analyze(
        &self,
        image: &ReferenceImage,
        model_id: &str,
        api_key: &str,
    ) -> Result<Value, IconError> {
        info!("Analyzing {} with {} ({})", image.filename, VENDOR, model_id);
        // the API caps inline images at 5MB of base64
        let image = self
            .image_processor
            .fit_for_anthropic(image)
            .map_err(|e| IconError::Analysis(e.to_string()))?;

        let body = Self::analysis_body(model_id, &image);
        let envelope = send_json(self.request(api_key), &body, VENDOR)
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
        let envelope = send_json(self.request(api_key), &body, VENDOR)
            .await
            .map_err(IconError::Generation)?;

        let content = Self::extract_text(&envelope)
            .ok_or_else(|| IconError::Generation(format!("No response from {}", VENDOR)))?;
        parse_svg_array(&content, VENDOR)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_server;
    use super::*;
    use crate::services::spec_merger::merge_analysis;

    #[test]
    fn text_blocks_are_concatenated() {
        let envelope = json!({
            "content": [
                {"type": "text", "text": "[\"<svg></svg>\","},
                {"type": "tool_use", "name": "ignored"},
                {"type": "text", "text": " \"<svg/>\"]"}
            ]
        });
        assert_eq!(
            AnthropicAdapter::extract_text(&envelope).as_deref(),
            Some("[\"<svg></svg>\", \"<svg/>\"]")
        );
        assert_eq!(AnthropicAdapter::extract_text(&json!({"content": []})), None);
    }

    #[test]
    fn analysis_body_sends_image_before_prompt() {
        let image = ReferenceImage {
            filename: "b.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            data: vec![255, 216, 255],
        };
        let body = AnthropicAdapter::analysis_body("claude-haiku-4-5-20251001", &image);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[0]["source"]["data"], "/9j/");
        assert_eq!(content[1]["type"], "text");
        assert_eq!(body["temperature"], 0);
    }

    fn request(spec: &crate::models::DesignSpecification) -> GenerationRequest<'_> {
        GenerationRequest {
            specification: spec,
            subject: "Delete",
            seed: 3,
            model_id: "claude-sonnet-4-5-20250929",
            count: 5,
            prior_subject: None,
            prior_svgs: &[],
        }
    }

    #[actix_web::test]
    async fn vendor_error_is_a_generation_error() {
        let url = test_server::serve(
            401,
            json!({
                "type": "error",
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            }),
        );
        let adapter = AnthropicAdapter::with_endpoint(Client::new(), &url);
        let spec = merge_analysis(&json!({}), "logo.png");

        let err = adapter.generate_icons(&request(&spec), "bad").await.unwrap_err();
        assert_eq!(
            err,
            IconError::Generation("invalid x-api-key (HTTP 401)".to_string())
        );
    }

    #[actix_web::test]
    async fn empty_content_is_no_response() {
        let url = test_server::serve(200, json!({"content": []}));
        let adapter = AnthropicAdapter::with_endpoint(Client::new(), &url);
        let spec = merge_analysis(&json!({}), "logo.png");

        let err = adapter.generate_icons(&request(&spec), "key").await.unwrap_err();
        assert_eq!(err, IconError::Generation("No response from Anthropic".to_string()));
    }

    #[actix_web::test]
    async fn generation_returns_the_array_in_order() {
        let text = r#"["<svg id=\"a\"/>", "<svg id=\"b\"/>"]"#;
        let url = test_server::serve(200, json!({"content": [{"type": "text", "text": text}]}));
        let adapter = AnthropicAdapter::with_endpoint(Client::new(), &url);
        let spec = merge_analysis(&json!({}), "logo.png");

        let svgs = adapter.generate_icons(&request(&spec), "key").await.unwrap();
        assert_eq!(svgs, vec!["<svg id=\"a\"/>", "<svg id=\"b\"/>"]);
    }
}
