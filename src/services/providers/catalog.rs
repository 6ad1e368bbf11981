// src/services/providers/catalog.rs
use crate::models::Provider;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Standard,
    Premium,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelOption {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: Provider,
    pub description: &'static str,
    pub tier: ModelTier,
}

const fn model(
    id: &'static str,
    name: &'static str,
    provider: Provider,
    description: &'static str,
    tier: ModelTier,
) -> ModelOption {
    ModelOption {
        id,
        name,
        provider,
        description,
        tier,
    }
}

/// Published models per provider; the first entry of each provider is its default.
pub const MODELS: &[ModelOption] = &[
    model(
        "gpt-5.2-codex",
        "GPT-5.2 Codex",
        Provider::OpenAi,
        "Coding-focused model for complex tasks",
        ModelTier::Premium,
    ),
    model(
        "gpt-4.1",
        "GPT-4.1",
        Provider::OpenAi,
        "Latest flagship model",
        ModelTier::Premium,
    ),
    model(
        "o4-mini",
        "o4-mini",
        Provider::OpenAi,
        "Latest reasoning model (fast)",
        ModelTier::Premium,
    ),
    model(
        "gpt-4o",
        "GPT-4o",
        Provider::OpenAi,
        "Fast and capable multimodal model",
        ModelTier::Standard,
    ),
    model(
        "gpt-4o-mini",
        "GPT-4o Mini",
        Provider::OpenAi,
        "Affordable and intelligent small model",
        ModelTier::Standard,
    ),
    model(
        "gpt-3.5-turbo",
        "GPT-3.5 Turbo",
        Provider::OpenAi,
        "Legacy fast model for lightweight tasks",
        ModelTier::Standard,
    ),
    model(
        "claude-opus-4-5-20251101",
        "Claude Opus 4.5",
        Provider::Anthropic,
        "Most capable model",
        ModelTier::Premium,
    ),
    model(
        "claude-sonnet-4-5-20250929",
        "Claude Sonnet 4.5",
        Provider::Anthropic,
        "Balanced performance and speed",
        ModelTier::Standard,
    ),
    model(
        "claude-haiku-4-5-20251001",
        "Claude Haiku 4.5",
        Provider::Anthropic,
        "Fastest model for simple tasks",
        ModelTier::Standard,
    ),
    model(
        "gemini-2.5-pro",
        "Gemini 2.5 Pro",
        Provider::Google,
        "Most capable Gemini model",
        ModelTier::Premium,
    ),
    model(
        "gemini-2.5-flash",
        "Gemini 2.5 Flash",
        Provider::Google,
        "Fast multimodal model for general use",
        ModelTier::Standard,
    ),
    model(
        "gemini-2.0-flash",
        "Gemini 2.0 Flash",
        Provider::Google,
        "Reliable fast model for everyday tasks",
        ModelTier::Standard,
    ),
    model(
        "llama3.2-vision",
        "Llama 3.2 Vision",
        Provider::Ollama,
        "Local vision model with strong image understanding",
        ModelTier::Standard,
    ),
    model(
        "qwen2.5vl",
        "Qwen 2.5 VL",
        Provider::Ollama,
        "Vision-language model for layout and icon analysis",
        ModelTier::Premium,
    ),
    model(
        "gemma3:4b",
        "Gemma 3 4B Vision",
        Provider::Ollama,
        "Lightweight multimodal model for local workflows",
        ModelTier::Standard,
    ),
];

pub fn models_for(provider: Provider) -> Vec<ModelOption> {
    MODELS
        .iter()
        .filter(|m| m.provider == provider)
        .copied()
        .collect()
}

pub fn default_model(provider: Provider) -> &'static str {
    MODELS
        .iter()
        .find(|m| m.provider == provider)
        .map(|m| m.id)
        .unwrap_or_default()
}

pub fn is_model_of(provider: Provider, model_id: &str) -> bool {
    MODELS
        .iter()
        .any(|m| m.provider == provider && m.id == model_id)
}

/// Human-readable model name, or the id itself when the model is not catalogued.
pub fn display_name(model_id: &str) -> &str {
    MODELS
        .iter()
        .find(|m| m.id == model_id)
        .map(|m| m.name)
        .unwrap_or(model_id)
}
