// src/main.rs
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use iconsmith::AppState;
use iconsmith::config::AppConfig;
use iconsmith::handlers;
use iconsmith::services::providers::{OllamaAdapter, ProviderRegistry};
use iconsmith::services::{MemoryStore, ProjectStore, RedisStore, Studio};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting iconsmith...");
    let config = AppConfig::from_env();

    // Initialize services
    let store: Arc<dyn ProjectStore> = match &config.redis_url {
        Some(url) => {
            info!("Using Redis project store at {}", url);
            Arc::new(
                RedisStore::new(url)
                    .await
                    .with_context(|| format!("connecting to Redis at {}", url))?,
            )
        }
        None => {
            warn!("REDIS_URL not set; projects are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let client = reqwest::Client::new();
    let registry = ProviderRegistry::with_defaults(client.clone(), &config.ollama_url);
    let studio = Studio::load(store, registry, config.initial_settings.clone())
        .await
        .context("loading saved projects")?;

    let app_state = AppState {
        studio: Arc::new(Mutex::new(studio)),
        ollama: Arc::new(OllamaAdapter::new(client, &config.ollama_url)),
    };

    info!("Starting HTTP server on {}", config.bind);
    let static_dir = config.static_dir.clone();

    HttpServer::new(move || {
        let app = App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure);
        match &static_dir {
            Some(dir) => app.service(Files::new("/", dir).index_file("index.html")),
            None => app,
        }
    })
    .bind(config.bind)?
    .run()
    .await?;

    Ok(())
}
