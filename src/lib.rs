// src/lib.rs
//! Turns a reference UI image into a design specification and generates
//! matching icon sets from it.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;

use crate::services::Studio;
use crate::services::providers::OllamaAdapter;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub studio: Arc<Mutex<Studio>>,
    pub ollama: Arc<OllamaAdapter>,
}
