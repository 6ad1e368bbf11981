// src/config.rs
use crate::models::{ApiKeys, Provider, Settings};
use crate::services::providers::catalog::{default_model, is_model_of};
use crate::services::providers::ollama::DEFAULT_OLLAMA_URL;
use log::warn;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub redis_url: Option<String>,
    pub ollama_url: String,
    pub static_dir: Option<PathBuf>,
    /// Settings used until the user saves their own.
    pub initial_settings: Settings,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = var("ICONSMITH_BIND")
            .and_then(|value| match value.parse::<SocketAddr>() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    warn!("Ignoring ICONSMITH_BIND={:?}: {}", value, e);
                    None
                }
            })
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));

        let provider = var("ICONSMITH_PROVIDER")
            .and_then(|value| match value.parse::<Provider>() {
                Ok(provider) => Some(provider),
                Err(e) => {
                    warn!("Ignoring ICONSMITH_PROVIDER: {}", e);
                    None
                }
            })
            .unwrap_or_default();

        let model = match var("ICONSMITH_MODEL") {
            Some(model) if provider == Provider::Ollama || is_model_of(provider, &model) => model,
            Some(model) => {
                warn!("Ignoring ICONSMITH_MODEL={:?}: not a {} model", model, provider);
                default_model(provider).to_string()
            }
            None => default_model(provider).to_string(),
        };

        let initial_settings = Settings {
            provider,
            model,
            api_keys: ApiKeys {
                openai: var("OPENAI_API_KEY").unwrap_or_default(),
                anthropic: var("ANTHROPIC_API_KEY").unwrap_or_default(),
                google: var("GOOGLE_API_KEY").unwrap_or_default(),
            },
            ..Settings::default()
        };

        Self {
            bind,
            redis_url: var("REDIS_URL"),
            ollama_url: var("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            static_dir: var("ICONSMITH_STATIC_DIR").map(PathBuf::from),
            initial_settings,
        }
    }
}
