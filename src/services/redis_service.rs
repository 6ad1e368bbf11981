// src/services/redis_service.rs
use crate::errors::IconError;
use crate::models::*;
use crate::services::project_store::ProjectStore;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde_json;

const PROJECT_INDEX: &str = "projects:by_updated";

fn project_key(id: &str) -> String {
    format!("project:{}", id)
}

fn settings_key() -> String {
    format!("settings:{}", SETTINGS_ID)
}

/// Redis-backed store: one JSON document per project plus a sorted-set index
/// scored by `updated_at` (milliseconds).
///
/// All calls share one multiplexed connection that reconnects on its own.
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self, IconError> {
        let client = Client::open(redis_url)?;
        let mut manager = client.get_tokio_connection_manager().await?;

        // Test connection
        redis::cmd("PING")
            .query_async::<_, String>(&mut manager)
            .await?;

        Ok(Self { manager })
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl ProjectStore for RedisStore {
    async fn list_projects(&self) -> Result<Vec<DesignProject>, IconError> {
        let mut conn = self.connection();
        let ids: Vec<String> = conn.zrevrange(PROJECT_INDEX, 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| project_key(id)).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        values
            .into_iter()
            .flatten()
            .map(|value| serde_json::from_str(&value).map_err(IconError::from))
            .collect()
    }

    async fn get_project(&self, id: &str) -> Result<Option<DesignProject>, IconError> {
        let mut conn = self.connection();
        let value: Option<String> = conn.get(project_key(id)).await?;
        value
            .map(|v| serde_json::from_str(&v).map_err(IconError::from))
            .transpose()
    }

    async fn put_project(&self, project: &DesignProject) -> Result<(), IconError> {
        let mut conn = self.connection();
        let value = serde_json::to_string(project)?;

        redis::pipe()
            .atomic()
            .set(project_key(&project.id), value)
            .ignore()
            .zadd(PROJECT_INDEX, &project.id, project.updated_at.timestamp_millis())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn delete_project(&self, id: &str) -> Result<(), IconError> {
        let mut conn = self.connection();

        redis::pipe()
            .atomic()
            .del(project_key(id))
            .ignore()
            .zrem(PROJECT_INDEX, id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn get_settings(&self) -> Result<Option<Settings>, IconError> {
        let mut conn = self.connection();
        let value: Option<String> = conn.get(settings_key()).await?;
        value
            .map(|v| serde_json::from_str(&v).map_err(IconError::from))
            .transpose()
    }

    async fn put_settings(&self, settings: &Settings) -> Result<(), IconError> {
        let mut conn = self.connection();
        let value = serde_json::to_string(settings)?;
        conn.set::<_, _, ()>(settings_key(), value).await?;
        Ok(())
    }
}
