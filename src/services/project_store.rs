// src/services/project_store.rs
use crate::errors::IconError;
use crate::models::{DesignProject, Settings};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Durable home of projects and the settings record.
///
/// Each write replaces one whole record, so readers never observe a
/// half-updated project.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// All projects, most recently updated first.
    async fn list_projects(&self) -> Result<Vec<DesignProject>, IconError>;

    async fn get_project(&self, id: &str) -> Result<Option<DesignProject>, IconError>;

    async fn put_project(&self, project: &DesignProject) -> Result<(), IconError>;

    /// Removes the project and, with it, every icon it owns.
    async fn delete_project(&self, id: &str) -> Result<(), IconError>;

    async fn get_settings(&self) -> Result<Option<Settings>, IconError>;

    async fn put_settings(&self, settings: &Settings) -> Result<(), IconError>;
}

#[derive(Default)]
pub struct MemoryStore {
    projects: RwLock<HashMap<String, DesignProject>>,
    settings: RwLock<Option<Settings>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn list_projects(&self) -> Result<Vec<DesignProject>, IconError> {
        let mut projects: Vec<DesignProject> = self.projects.read().await.values().cloned().collect();
        projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(projects)
    }

    async fn get_project(&self, id: &str) -> Result<Option<DesignProject>, IconError> {
        Ok(self.projects.read().await.get(id).cloned())
    }

    async fn put_project(&self, project: &DesignProject) -> Result<(), IconError> {
        self.projects
            .write()
            .await
            .insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn delete_project(&self, id: &str) -> Result<(), IconError> {
        self.projects.write().await.remove(id);
        Ok(())
    }

    async fn get_settings(&self) -> Result<Option<Settings>, IconError> {
        Ok(self.settings.read().await.clone())
    }

    async fn put_settings(&self, settings: &Settings) -> Result<(), IconError> {
        *self.settings.write().await = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReferenceImage;
    use crate::services::spec_merger::merge_analysis;
    use chrono::{Duration, Utc};

    fn project(id: &str, age_minutes: i64) -> DesignProject {
        let updated = Utc::now() - Duration::minutes(age_minutes);
        DesignProject {
            id: id.to_string(),
            name: id.to_string(),
            reference_image: ReferenceImage {
                filename: "logo.png".to_string(),
                mime_type: "image/png".to_string(),
                data: vec![1],
            },
            specification: merge_analysis(&serde_json::json!({}), "logo.png"),
            generated_icons: vec![],
            icon_subject: None,
            llm_model: "gpt-4o".to_string(),
            created_at: updated,
            updated_at: updated,
        }
    }

    #[tokio::test]
    async fn lists_most_recently_updated_first() {
        let store = MemoryStore::new();
        store.put_project(&project("old", 30)).await.unwrap();
        store.put_project(&project("new", 1)).await.unwrap();
        store.put_project(&project("mid", 10)).await.unwrap();

        let ids: Vec<String> = store
            .list_projects()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn put_replaces_and_delete_removes() {
        let store = MemoryStore::new();
        let mut p = project("p", 0);
        store.put_project(&p).await.unwrap();
        p.name = "renamed".to_string();
        store.put_project(&p).await.unwrap();
        assert_eq!(store.get_project("p").await.unwrap().unwrap().name, "renamed");

        store.delete_project("p").await.unwrap();
        assert!(store.get_project("p").await.unwrap().is_none());
        assert!(store.list_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn settings_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get_settings().await.unwrap().is_none());
        let settings = Settings::default();
        store.put_settings(&settings).await.unwrap();
        assert_eq!(store.get_settings().await.unwrap(), Some(settings));
    }
}
