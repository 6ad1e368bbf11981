// src/services/providers/ollama.rs
use super::extract::{parse_analysis_text, parse_svg_array_lenient};
use super::{GenerationRequest, ProviderAdapter, non_empty_text, send_json};
use crate::errors::IconError;
use crate::models::{Provider, ReferenceImage};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::{debug, info};
use reqwest::Client;
use serde_json::{Value, json};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const VENDOR: &str = "Ollama";

/// Local daemon adapter; needs no credentials.
pub struct OllamaAdapter {
    client: Client,
    base_url: String,
}

impl OllamaAdapter {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    /// Models pulled into the local daemon; doubles as a reachability check.
    pub async fn list_local_models(&self) -> Result<Vec<String>, IconError> {
        let url = format!("{}/api/tags", self.base_url);
        let unreachable =
            || IconError::NotFound(format!("Ollama is not reachable at {}", self.base_url));

        let response = self.client.get(&url).send().await.map_err(|_| unreachable())?;
        if !response.status().is_success() {
            return Err(unreachable());
        }
        let tags: Value = response
            .json()
            .await
            .map_err(|e| IconError::Serialization(e.to_string()))?;

        Ok(tags["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn analysis_body(model_id: &str, image: &ReferenceImage) -> Value {
        json!({
            "model": model_id,
            "messages": [{
                "role": "user",
                "content": super::prompts::IMAGE_ANALYSIS_PROMPT,
                "images": [general_purpose::STANDARD.encode(&image.data)]
            }],
            "options": { "temperature": 0 },
            "stream": false
        })
    }

    fn generation_body(request: &GenerationRequest<'_>) -> Value {
        json!({
            "model": request.model_id,
            "messages": [{ "role": "user", "content": request.prompt() }],
            "options": {
                "temperature": 0,
                "seed": request.seed
            },
            "stream": false
        })
    }

    fn extract_text(envelope: &Value) -> Option<String> {
        non_empty_text(envelope["message"]["content"].as_str().into_iter())
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    async fn analyze(
        &self,
        image: &ReferenceImage,
        model_id: &str,
        _api_key: &str,
    ) -> Result<Value, IconError> {
        info!("Analyzing {} with {} ({})", image.filename, VENDOR, model_id);
        let body = Self::analysis_body(model_id, image);
        let envelope = send_json(self.client.post(self.chat_url()), &body, VENDOR)
            .await
            .map_err(IconError::Analysis)?;

        let content = Self::extract_text(&envelope)
            .ok_or_else(|| IconError::Analysis(format!("No response from {}", VENDOR)))?;
        debug!("Ollama analysis output: {} bytes", content.len());
        parse_analysis_text(&content, VENDOR)
    }

    async fn generate_icons(
        &self,
        request: &GenerationRequest<'_>,
        _api_key: &str,
    ) -> Result<Vec<String>, IconError> {
        let body = Self::generation_body(request);
        let envelope = send_json(self.client.post(self.chat_url()), &body, VENDOR)
            .await
            .map_err(IconError::Generation)?;

        let content = Self::extract_text(&envelope)
            .ok_or_else(|| IconError::Generation(format!("No response from {}", VENDOR)))?;
        debug!("Ollama generation output: {} bytes", content.len());
        parse_svg_array_lenient(&content, VENDOR)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_server;
    use super::*;
    use crate::services::spec_merger::merge_analysis;

    #[test]
    fn generation_body_carries_seed_in_options() {
        let spec = merge_analysis(&json!({}), "logo.png");
        let prior = vec!["<svg/>".to_string()];
        let request = GenerationRequest {
            specification: &spec,
            subject: "Delete",
            seed: 42,
            model_id: "qwen2.5vl",
            count: 5,
            prior_subject: Some("Save"),
            prior_svgs: &prior,
        };
        let body = OllamaAdapter::generation_body(&request);
        assert_eq!(body["options"]["seed"], 42);
        assert_eq!(body["options"]["temperature"], 0);
        assert_eq!(body["stream"], false);
        assert!(body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("The last icon set was for \"Save\""));
    }

    #[test]
    fn chat_url_ignores_trailing_slash() {
        let adapter = OllamaAdapter::new(Client::new(), "http://127.0.0.1:11434/");
        assert_eq!(adapter.chat_url(), "http://127.0.0.1:11434/api/chat");
    }

    #[test]
    fn message_content_is_the_text_payload() {
        assert_eq!(
            OllamaAdapter::extract_text(&json!({"message": {"content": "{}"}})).as_deref(),
            Some("{}")
        );
        assert_eq!(OllamaAdapter::extract_text(&json!({"message": {}})), None);
    }

    #[actix_web::test]
    async fn daemon_error_string_is_surfaced() {
        let url = test_server::serve(404, json!({"error": "model \"llava\" not found"}));
        let adapter = OllamaAdapter::new(Client::new(), &url);
        let image = ReferenceImage {
            filename: "logo.png".to_string(),
            mime_type: "image/png".to_string(),
            data: vec![1],
        };

        let err = adapter.analyze(&image, "llava", "").await.unwrap_err();
        assert_eq!(
            err,
            IconError::Analysis("model \"llava\" not found (HTTP 404)".to_string())
        );
    }

    #[actix_web::test]
    async fn local_models_come_from_tags() {
        let url = test_server::serve(
            200,
            json!({"models": [{"name": "llama3.2-vision:latest"}, {"name": "gemma3:4b"}]}),
        );
        let adapter = OllamaAdapter::new(Client::new(), &url);

        let models = adapter.list_local_models().await.unwrap();
        assert_eq!(models, vec!["llama3.2-vision:latest", "gemma3:4b"]);
    }

    #[actix_web::test]
    async fn unreachable_daemon_is_not_found() {
        let url = test_server::serve(500, json!({}));
        let adapter = OllamaAdapter::new(Client::new(), &url);
        assert!(matches!(
            adapter.list_local_models().await,
            Err(IconError::NotFound(_))
        ));
    }
}
