// src/services/mod.rs
pub mod generator;
pub mod image_processor;
pub mod phase;
pub mod project_store;
pub mod providers;
pub mod redis_service;
pub mod spec_merger;
pub mod studio;
pub mod svg_normalizer;

pub use image_processor::ImageProcessor;
pub use project_store::{MemoryStore, ProjectStore};
pub use providers::{ProviderAdapter, ProviderRegistry};
pub use redis_service::RedisStore;
pub use studio::Studio;
pub use svg_normalizer::SvgNormalizer;
