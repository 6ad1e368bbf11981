// src/services/studio.rs
use crate::errors::IconError;
use crate::models::*;
use crate::services::generator::{fold_batch, generate_svgs};
use crate::services::image_processor::ImageProcessor;
use crate::services::phase::{
    DisplayedIcon, Phase, PhaseInputs, Readiness, can_analyze, can_generate, determine_phase,
    displayed_icons,
};
use crate::services::project_store::ProjectStore;
use crate::services::providers::catalog::{default_model, is_model_of};
use crate::services::providers::{ProviderAdapter, ProviderRegistry};
use crate::services::spec_merger::{apply_specification_patch, merge_analysis};
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Weak};

/// In-memory state of the one interactive session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub uploaded_image: Option<ReferenceImage>,
    /// Draft specification produced by analysis or edited since.
    pub specification: Option<DesignSpecification>,
    pub subject: String,
    /// Normalized SVGs of the most recent generation in this session.
    pub generated_svgs: Vec<String>,
    pub selected_icon: Option<usize>,
    pub active_project_id: Option<String>,
    pub analysis_error: Option<String>,
    pub generation_error: Option<String>,
}

/// Everything an analysis call needs, captured so the call can run without the studio.
///
/// The action stays busy for as long as the job is alive, so a job dropped
/// without reaching `finish_analysis` frees it again.
pub struct AnalysisJob {
    epoch: u64,
    _in_flight: Arc<()>,
    adapter: Arc<dyn ProviderAdapter>,
    image: ReferenceImage,
    model_id: String,
    api_key: String,
}

impl AnalysisJob {
    pub async fn run(&self) -> Result<Value, IconError> {
        self.adapter
            .analyze(&self.image, &self.model_id, &self.api_key)
            .await
    }
}

pub struct GenerationJob {
    epoch: u64,
    _in_flight: Arc<()>,
    adapter: Arc<dyn ProviderAdapter>,
    specification: DesignSpecification,
    source_image: ReferenceImage,
    active_project_id: Option<String>,
    subject: String,
    model_id: String,
    api_key: String,
    prior_subject: Option<String>,
    prior_svgs: Vec<String>,
}

impl GenerationJob {
    pub async fn run(&self) -> Result<Vec<String>, IconError> {
        generate_svgs(
            self.adapter.as_ref(),
            &self.specification,
            &self.subject,
            &self.model_id,
            &self.api_key,
            self.prior_subject.as_deref(),
            &self.prior_svgs,
        )
        .await
    }
}

/// Partial settings edit; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub api_keys: Option<ApiKeys>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioView {
    pub phase: Phase,
    pub specification: Option<DesignSpecification>,
    pub subject: String,
    pub icons: Vec<DisplayedIcon>,
    pub selected_icon: Option<usize>,
    pub active_project: Option<ProjectSummary>,
    pub has_image: bool,
    pub can_analyze: bool,
    pub can_generate: bool,
    pub is_analyzing: bool,
    pub is_generating: bool,
    pub analysis_error: Option<String>,
    pub generation_error: Option<String>,
    pub provider: Provider,
    pub model: String,
}

/// The stateful shell around the pure components: one session, the project
/// list mirrored from the store, and the settings record.
///
/// Network calls are split into `begin_*`/`finish_*` so a caller holding the
/// studio behind a lock can release it while the provider works.
pub struct Studio {
    store: Arc<dyn ProjectStore>,
    registry: ProviderRegistry,
    image_processor: ImageProcessor,
    settings: Settings,
    projects: Vec<DesignProject>,
    session: Session,
    // bumped whenever the session is replaced; results of older calls still persist
    // but no longer touch the session
    epoch: u64,
    // live while a job holds the matching Arc
    analysis_in_flight: Weak<()>,
    generation_in_flight: Weak<()>,
}

impl Studio {
    /// Reads every project and the settings record; `fallback` is used when none is stored.
    pub async fn load(
        store: Arc<dyn ProjectStore>,
        registry: ProviderRegistry,
        fallback: Settings,
    ) -> Result<Self, IconError> {
        let projects = store.list_projects().await?;
        let settings = store.get_settings().await?.unwrap_or(fallback);
        info!(
            "Loaded {} projects; provider {} ({})",
            projects.len(),
            settings.provider,
            settings.model
        );

        Ok(Self {
            store,
            registry,
            image_processor: ImageProcessor::new(),
            settings,
            projects,
            session: Session::default(),
            epoch: 0,
            analysis_in_flight: Weak::new(),
            generation_in_flight: Weak::new(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn projects(&self) -> Vec<ProjectSummary> {
        self.projects.iter().map(DesignProject::to_summary).collect()
    }

    pub fn project(&self, id: &str) -> Option<&DesignProject> {
        self.projects.iter().find(|p| p.id == id)
    }

    fn active_project(&self) -> Option<&DesignProject> {
        self.session
            .active_project_id
            .as_deref()
            .and_then(|id| self.project(id))
    }

    fn phase_inputs(&self) -> PhaseInputs<'_> {
        PhaseInputs {
            specification: self.session.specification.as_ref(),
            active_project: self.active_project(),
            generated_svgs: &self.session.generated_svgs,
        }
    }

    fn readiness(&self) -> Readiness {
        Readiness {
            has_image: self.session.uploaded_image.is_some(),
            has_credentials: self.settings.credential().is_some(),
            is_analyzing: self.analysis_in_flight.strong_count() > 0,
            is_generating: self.generation_in_flight.strong_count() > 0,
        }
    }

    /// Keeps the local list ordered like the store: most recently updated first.
    fn upsert_local(&mut self, project: DesignProject) {
        self.projects.retain(|p| p.id != project.id);
        self.projects.insert(0, project);
    }

    /// Replaces the session. A call still running keeps its action busy.
    fn reset_session(&mut self, next: Session) {
        self.session = next;
        self.epoch += 1;
    }

    pub fn upload_image(&mut self, image: ReferenceImage) -> Result<(), IconError> {
        if let Some((width, height)) = self.image_processor.validate(&image)? {
            info!("Accepted {} ({}x{})", image.filename, width, height);
        } else {
            info!("Accepted vector image {}", image.filename);
        }
        self.session.uploaded_image = Some(image);
        Ok(())
    }

    pub fn set_subject(&mut self, subject: &str) {
        self.session.subject = subject.trim().to_string();
    }

    /// Starts an analysis, or returns `None` when the action is not enabled.
    pub fn begin_analysis(&mut self) -> Result<Option<AnalysisJob>, IconError> {
        if !can_analyze(&self.readiness()) {
            return Ok(None);
        }
        let (Some(image), Some(api_key)) = (
            self.session.uploaded_image.clone(),
            self.settings.credential().map(str::to_string),
        ) else {
            return Ok(None);
        };
        let adapter = self.registry.get(self.settings.provider)?;

        let in_flight = Arc::new(());
        self.analysis_in_flight = Arc::downgrade(&in_flight);
        self.session.analysis_error = None;
        Ok(Some(AnalysisJob {
            epoch: self.epoch,
            _in_flight: in_flight,
            adapter,
            image,
            model_id: self.settings.model.clone(),
            api_key,
        }))
    }

    /// Merges a successful analysis into a new project. A failed call only sets
    /// the session's error; nothing is written.
    pub async fn finish_analysis(
        &mut self,
        job: AnalysisJob,
        result: Result<Value, IconError>,
    ) -> Result<(), IconError> {
        let current = job.epoch == self.epoch;

        let partial = match result {
            Ok(partial) => partial,
            Err(e) => {
                warn!("Analysis of {} failed: {}", job.image.filename, e);
                if current {
                    self.session.analysis_error = Some(e.user_message());
                }
                return Ok(());
            }
        };

        let specification = merge_analysis(&partial, &job.image.filename);
        let now = Utc::now();
        let project = DesignProject {
            id: generate_id("proj"),
            name: strip_extension(&job.image.filename).to_string(),
            reference_image: job.image,
            specification: specification.clone(),
            generated_icons: Vec::new(),
            icon_subject: None,
            llm_model: job.model_id,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.store.put_project(&project).await {
            warn!("Failed to save project {}: {}", project.id, e);
            if current {
                self.session.analysis_error = Some(e.to_string());
            }
            return Err(e);
        }
        info!("Created project {} from analysis", project.id);

        if current {
            self.session.specification = Some(specification);
            self.session.active_project_id = Some(project.id.clone());
            self.session.generated_svgs.clear();
            self.session.selected_icon = None;
        }
        self.upsert_local(project);
        Ok(())
    }

    /// Runs a whole analysis; `false` when the action was not enabled.
    pub async fn analyze(&mut self) -> Result<bool, IconError> {
        let Some(job) = self.begin_analysis()? else {
            return Ok(false);
        };
        let result = job.run().await;
        self.finish_analysis(job, result).await?;
        Ok(true)
    }

    pub fn begin_generation(&mut self) -> Result<Option<GenerationJob>, IconError> {
        if !can_generate(&self.phase_inputs(), &self.session.subject, &self.readiness()) {
            return Ok(None);
        }
        let active = self.active_project();
        let specification = self
            .session
            .specification
            .clone()
            .or_else(|| active.map(|p| p.specification.clone()));
        let source_image = active
            .map(|p| p.reference_image.clone())
            .or_else(|| self.session.uploaded_image.clone());
        let (Some(specification), Some(source_image), Some(api_key)) = (
            specification,
            source_image,
            self.settings.credential().map(str::to_string),
        ) else {
            return Ok(None);
        };

        let prior_subject = active.and_then(|p| p.icon_subject.clone());
        let prior_svgs = if !self.session.generated_svgs.is_empty() {
            self.session.generated_svgs.clone()
        } else {
            active
                .map(|p| {
                    let icons = &p.generated_icons;
                    icons[icons.len().saturating_sub(ICONS_PER_GENERATION)..]
                        .iter()
                        .map(|icon| icon.svg_code.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        let active_project_id = active.map(|p| p.id.clone());
        let adapter = self.registry.get(self.settings.provider)?;

        let in_flight = Arc::new(());
        self.generation_in_flight = Arc::downgrade(&in_flight);
        self.session.generation_error = None;
        Ok(Some(GenerationJob {
            epoch: self.epoch,
            _in_flight: in_flight,
            adapter,
            specification,
            source_image,
            active_project_id,
            subject: self.session.subject.clone(),
            model_id: self.settings.model.clone(),
            api_key,
            prior_subject,
            prior_svgs,
        }))
    }

    /// Folds a successful batch into its target project with one write.
    pub async fn finish_generation(
        &mut self,
        job: GenerationJob,
        result: Result<Vec<String>, IconError>,
    ) -> Result<(), IconError> {
        let current = job.epoch == self.epoch;

        let svgs = match result {
            Ok(svgs) if svgs.is_empty() => {
                warn!("Generation for {:?} produced no usable icons", job.subject);
                if current {
                    self.session.generation_error =
                        Some("The model returned no usable icons".to_string());
                }
                return Ok(());
            }
            Ok(svgs) => svgs,
            Err(e) => {
                warn!("Generation for {:?} failed: {}", job.subject, e);
                if current {
                    self.session.generation_error = Some(e.user_message());
                }
                return Ok(());
            }
        };

        let deleted = job
            .active_project_id
            .as_deref()
            .filter(|id| self.project(id).is_none());
        if let Some(id) = deleted {
            warn!(
                "Project {} was deleted during generation; discarding {} icons for {:?}",
                id,
                svgs.len(),
                job.subject
            );
            if current {
                self.session.generation_error =
                    Some("The project was deleted before its icons arrived".to_string());
            }
            return Ok(());
        }

        let active = job
            .active_project_id
            .as_deref()
            .and_then(|id| self.project(id));
        let project = fold_batch(
            active,
            &job.source_image,
            &job.specification,
            &job.subject,
            &job.model_id,
            &svgs,
        );

        if let Err(e) = self.store.put_project(&project).await {
            warn!("Failed to save project {}: {}", project.id, e);
            if current {
                self.session.generation_error = Some(e.to_string());
            }
            return Err(e);
        }
        info!(
            "Project {} now holds {} icons",
            project.id,
            project.generated_icons.len()
        );

        if current {
            self.session.active_project_id = Some(project.id.clone());
            self.session.generated_svgs = svgs;
            self.session.selected_icon = None;
        }
        self.upsert_local(project);
        Ok(())
    }

    pub async fn generate(&mut self) -> Result<bool, IconError> {
        let Some(job) = self.begin_generation()? else {
            return Ok(false);
        };
        let result = job.run().await;
        self.finish_generation(job, result).await?;
        Ok(true)
    }

    /// Selects one displayed icon for export; `None` clears the selection.
    pub fn select_icon(&mut self, index: Option<usize>) -> Result<(), IconError> {
        if let Some(index) = index {
            let shown = displayed_icons(&self.phase_inputs()).len();
            if index >= shown {
                return Err(IconError::Validation(format!(
                    "Icon {} is out of range ({} displayed)",
                    index, shown
                )));
            }
        }
        self.session.selected_icon = index;
        Ok(())
    }

    /// Back to the upload phase; saved projects stay untouched.
    pub fn new_session(&mut self) {
        self.reset_session(Session::default());
    }

    /// Makes a saved project active, restoring its last subject so generating extends it.
    pub async fn open_project(&mut self, id: &str) -> Result<(), IconError> {
        let project = match self.project(id) {
            Some(project) => project.clone(),
            None => {
                let project = self
                    .store
                    .get_project(id)
                    .await?
                    .ok_or_else(|| IconError::NotFound(format!("Project {} not found", id)))?;
                self.projects.push(project.clone());
                project
            }
        };

        self.reset_session(Session {
            subject: project.icon_subject.clone().unwrap_or_default(),
            active_project_id: Some(project.id),
            ..Session::default()
        });
        Ok(())
    }

    pub async fn rename_project(&mut self, id: &str, name: &str) -> Result<(), IconError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IconError::Validation("Project name cannot be empty".to_string()));
        }
        let mut project = self
            .project(id)
            .cloned()
            .ok_or_else(|| IconError::NotFound(format!("Project {} not found", id)))?;
        project.name = name.to_string();
        project.updated_at = Utc::now();

        self.store.put_project(&project).await?;
        self.upsert_local(project);
        Ok(())
    }

    /// Deletes a project with all its icons; an active project also ends the session.
    pub async fn delete_project(&mut self, id: &str) -> Result<(), IconError> {
        if self.project(id).is_none() {
            return Err(IconError::NotFound(format!("Project {} not found", id)));
        }
        self.store.delete_project(id).await?;
        self.projects.retain(|p| p.id != id);
        info!("Deleted project {}", id);

        if self.session.active_project_id.as_deref() == Some(id) {
            self.new_session();
        }
        Ok(())
    }

    pub async fn delete_icon(&mut self, project_id: &str, icon_id: &str) -> Result<(), IconError> {
        let mut project = self
            .project(project_id)
            .cloned()
            .ok_or_else(|| IconError::NotFound(format!("Project {} not found", project_id)))?;
        let position = project
            .generated_icons
            .iter()
            .position(|icon| icon.id == icon_id)
            .ok_or_else(|| IconError::NotFound(format!("Icon {} not found", icon_id)))?;
        project.generated_icons.remove(position);
        project.updated_at = Utc::now();

        self.store.put_project(&project).await?;
        if self.session.active_project_id.as_deref() == Some(project_id)
            && self.session.generated_svgs.is_empty()
        {
            self.session.selected_icon = None;
        }
        self.upsert_local(project);
        Ok(())
    }

    /// Applies an editor patch to the active specification and commits it to
    /// the owning project in one write.
    pub async fn update_specification(
        &mut self,
        patch: &Value,
    ) -> Result<DesignSpecification, IconError> {
        let current = self
            .phase_inputs()
            .active_specification()
            .cloned()
            .ok_or_else(|| IconError::NotFound("No active specification".to_string()))?;
        let updated = apply_specification_patch(&current, patch);

        if let Some(mut project) = self.active_project().cloned() {
            project.specification = updated.clone();
            project.updated_at = Utc::now();
            self.store.put_project(&project).await?;
            self.upsert_local(project);
        }
        if self.session.specification.is_some() {
            self.session.specification = Some(updated.clone());
        }
        Ok(updated)
    }

    /// Switching provider falls back to its default model unless a catalogued
    /// one is given. Ollama accepts any locally pulled model name.
    pub async fn update_settings(&mut self, update: SettingsUpdate) -> Result<Settings, IconError> {
        let mut settings = self.settings.clone();
        if let Some(provider) = update.provider {
            settings.provider = provider;
        }
        if let Some(keys) = update.api_keys {
            settings.api_keys = keys;
        }

        match update.model.as_deref().map(str::trim) {
            Some(model)
                if !model.is_empty()
                    && (settings.provider == Provider::Ollama
                        || is_model_of(settings.provider, model)) =>
            {
                settings.model = model.to_string();
            }
            Some(model) => {
                return Err(IconError::Validation(format!(
                    "Model {:?} is not available for {}",
                    model, settings.provider
                )));
            }
            None if !is_model_of(settings.provider, &settings.model)
                && settings.provider != self.settings.provider =>
            {
                settings.model = default_model(settings.provider).to_string();
            }
            None => {}
        }

        self.store.put_settings(&settings).await?;
        info!("Settings updated: {} ({})", settings.provider, settings.model);
        self.settings = settings.clone();
        Ok(settings)
    }

    pub fn view(&self) -> StudioView {
        let inputs = self.phase_inputs();
        let readiness = self.readiness();
        StudioView {
            phase: determine_phase(&inputs),
            specification: inputs.active_specification().cloned(),
            subject: self.session.subject.clone(),
            icons: displayed_icons(&inputs),
            selected_icon: self.session.selected_icon,
            active_project: inputs.active_project.map(DesignProject::to_summary),
            has_image: readiness.has_image,
            can_analyze: can_analyze(&readiness),
            can_generate: can_generate(&inputs, &self.session.subject, &readiness),
            is_analyzing: readiness.is_analyzing,
            is_generating: readiness.is_generating,
            analysis_error: self.session.analysis_error.clone(),
            generation_error: self.session.generation_error.clone(),
            provider: self.settings.provider,
            model: self.settings.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::project_store::MemoryStore;
    use crate::services::providers::GenerationRequest;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::Mutex;

    struct FakeAdapter {
        provider: Provider,
        analysis: Mutex<Result<Value, IconError>>,
        generation: Mutex<Result<Vec<String>, IconError>>,
    }

    impl FakeAdapter {
        fn new(provider: Provider) -> Arc<Self> {
            Arc::new(Self {
                provider,
                analysis: Mutex::new(Ok(json!({"colors": {"primary": "#ff0000"}}))),
                generation: Mutex::new(Ok(vec![
                    "<svg viewBox=\"0 0 24 24\"><path d=\"M1 1\"/></svg>".to_string(),
                    "<svg width=\"24\" height=\"24\"><path d=\"M2 2\"/></svg>".to_string(),
                    "<svg viewBox=\"0 0 24 24\"><path d=\"M3 3\"/></svg>".to_string(),
                ])),
            })
        }

        fn fail_generation(&self, message: &str) {
            *self.generation.lock().unwrap() = Err(IconError::Generation(message.to_string()));
        }
    }

    #[async_trait]
    impl ProviderAdapter for FakeAdapter {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn analyze(&self, _: &ReferenceImage, _: &str, _: &str) -> Result<Value, IconError> {
            self.analysis.lock().unwrap().clone()
        }

        async fn generate_icons(
            &self,
            _: &GenerationRequest<'_>,
            _: &str,
        ) -> Result<Vec<String>, IconError> {
            self.generation.lock().unwrap().clone()
        }
    }

    fn png_upload() -> ReferenceImage {
        let mut data = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .unwrap();
        ReferenceImage {
            filename: "logo.png".to_string(),
            mime_type: "image/png".to_string(),
            data,
        }
    }

    fn local_settings() -> Settings {
        Settings {
            provider: Provider::Ollama,
            model: "llama3.2-vision".to_string(),
            ..Settings::default()
        }
    }

    async fn studio_with(fake: Arc<FakeAdapter>) -> (Studio, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let registry = ProviderRegistry::new(vec![fake as Arc<dyn ProviderAdapter>]);
        let studio = Studio::load(store.clone(), registry, local_settings())
            .await
            .unwrap();
        (studio, store)
    }

    async fn analyzed_studio() -> (Studio, Arc<MemoryStore>, Arc<FakeAdapter>) {
        let fake = FakeAdapter::new(Provider::Ollama);
        let (mut studio, store) = studio_with(fake.clone()).await;
        studio.upload_image(png_upload()).unwrap();
        assert!(studio.analyze().await.unwrap());
        (studio, store, fake)
    }

    #[tokio::test]
    async fn cold_analysis_creates_project_and_enters_analyze() {
        let (studio, store, _) = analyzed_studio().await;

        let view = studio.view();
        assert_eq!(view.phase, Phase::Analyze);
        let spec = view.specification.unwrap();
        assert_eq!(spec.name, "logo");
        assert_eq!(spec.colors.primary, "#ff0000");
        assert_eq!(spec.colors.secondary, "#64748b");

        let saved = store.list_projects().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, "logo");
        assert!(saved[0].generated_icons.is_empty());
        assert_eq!(view.active_project.unwrap().id, saved[0].id);
    }

    #[tokio::test]
    async fn failed_analysis_surfaces_error_and_persists_nothing() {
        let fake = FakeAdapter::new(Provider::Ollama);
        *fake.analysis.lock().unwrap() = Err(IconError::Analysis(String::new()));
        let (mut studio, store) = studio_with(fake.clone()).await;
        studio.upload_image(png_upload()).unwrap();

        studio.analyze().await.unwrap();
        assert_eq!(studio.view().analysis_error.as_deref(), Some("Analysis failed"));
        assert_eq!(studio.view().phase, Phase::Upload);
        assert!(store.list_projects().await.unwrap().is_empty());

        *fake.analysis.lock().unwrap() = Ok(json!({}));
        let job = studio.begin_analysis().unwrap().unwrap();
        assert_eq!(studio.session().analysis_error, None);
        let result = job.run().await;
        studio.finish_analysis(job, result).await.unwrap();
        assert_eq!(studio.view().phase, Phase::Analyze);
    }

    #[tokio::test]
    async fn analyze_is_disabled_without_image() {
        let (mut studio, _) = studio_with(FakeAdapter::new(Provider::Ollama)).await;
        assert!(!studio.view().can_analyze);
        assert!(!studio.analyze().await.unwrap());
    }

    #[tokio::test]
    async fn first_generation_claims_the_analyzed_project() {
        let (mut studio, store, _) = analyzed_studio().await;
        let analyzed_id = studio.session().active_project_id.clone().unwrap();

        studio.set_subject("Save");
        assert!(studio.generate().await.unwrap());

        let view = studio.view();
        assert_eq!(view.phase, Phase::Generate);
        assert_eq!(view.icons.len(), 3);
        assert!(!view.icons[1].svg.contains("width="));

        let saved = store.get_project(&analyzed_id).await.unwrap().unwrap();
        assert_eq!(saved.generated_icons.len(), 3);
        assert_eq!(saved.icon_subject.as_deref(), Some("Save"));
        assert_eq!(saved.name, "Save(Llama 3.2 Vision)");
        assert!(saved.generated_icons.iter().all(|i| i.project_id == saved.id));
        assert_eq!(store.list_projects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_subject_appends_and_new_subject_forks() {
        let (mut studio, store, _) = analyzed_studio().await;
        studio.set_subject("Save");
        studio.generate().await.unwrap();
        let save_id = studio.session().active_project_id.clone().unwrap();
        let first_batch = store.get_project(&save_id).await.unwrap().unwrap().generated_icons;

        studio.generate().await.unwrap();
        let extended = store.get_project(&save_id).await.unwrap().unwrap();
        assert_eq!(extended.generated_icons.len(), 6);
        assert_eq!(&extended.generated_icons[..3], &first_batch[..]);

        studio.set_subject("Delete");
        studio.generate().await.unwrap();
        let delete_id = studio.session().active_project_id.clone().unwrap();
        assert_ne!(delete_id, save_id);

        let forked = store.get_project(&delete_id).await.unwrap().unwrap();
        assert_eq!(forked.icon_subject.as_deref(), Some("Delete"));
        assert_eq!(forked.generated_icons.len(), 3);
        assert_eq!(forked.specification.id, extended.specification.id);
        let untouched = store.get_project(&save_id).await.unwrap().unwrap();
        assert_eq!(untouched.generated_icons, extended.generated_icons);
        assert_eq!(studio.projects()[0].id, delete_id);
    }

    #[tokio::test]
    async fn failed_generation_leaves_project_unmodified() {
        let (mut studio, store, fake) = analyzed_studio().await;
        studio.set_subject("Save");
        studio.generate().await.unwrap();
        let id = studio.session().active_project_id.clone().unwrap();
        let before = store.get_project(&id).await.unwrap().unwrap();

        fake.fail_generation("Ollama API error (HTTP 500)");
        studio.generate().await.unwrap();

        assert_eq!(store.get_project(&id).await.unwrap().unwrap(), before);
        let view = studio.view();
        assert_eq!(view.generation_error.as_deref(), Some("Ollama API error (HTTP 500)"));
        assert!(!view.is_generating);
    }

    #[tokio::test]
    async fn actions_are_exclusive_while_in_flight() {
        let (mut studio, _, _) = analyzed_studio().await;
        studio.set_subject("Save");

        let job = studio.begin_generation().unwrap().unwrap();
        assert!(studio.begin_generation().unwrap().is_none());
        assert!(studio.begin_analysis().unwrap().is_none());
        assert!(!studio.view().can_analyze);

        let result = job.run().await;
        studio.finish_generation(job, result).await.unwrap();
        assert!(studio.view().can_generate);
    }

    #[tokio::test]
    async fn dropped_analysis_job_frees_analyze() {
        let (mut studio, _) = studio_with(FakeAdapter::new(Provider::Ollama)).await;
        studio.upload_image(png_upload()).unwrap();

        let job = studio.begin_analysis().unwrap().unwrap();
        assert!(studio.view().is_analyzing);
        assert!(!studio.view().can_analyze);

        drop(job);
        let view = studio.view();
        assert!(!view.is_analyzing);
        assert!(view.can_analyze);
        assert!(studio.analyze().await.unwrap());
    }

    #[tokio::test]
    async fn dropped_generation_job_survives_new_session() {
        let (mut studio, _, _) = analyzed_studio().await;
        studio.set_subject("Save");
        let job = studio.begin_generation().unwrap().unwrap();

        studio.new_session();
        assert!(studio.view().is_generating);
        drop(job);
        assert!(!studio.view().is_generating);

        let id = studio.projects()[0].id.clone();
        studio.open_project(&id).await.unwrap();
        studio.set_subject("Save");
        assert!(studio.view().can_generate);
        assert!(studio.generate().await.unwrap());
    }

    #[tokio::test]
    async fn generation_needs_subject() {
        let (mut studio, _, _) = analyzed_studio().await;
        studio.set_subject("   ");
        assert!(!studio.view().can_generate);
        assert!(!studio.generate().await.unwrap());
    }

    #[tokio::test]
    async fn new_session_resets_but_keeps_projects() {
        let (mut studio, store, _) = analyzed_studio().await;
        studio.set_subject("Save");
        studio.generate().await.unwrap();

        studio.new_session();
        let view = studio.view();
        assert_eq!(view.phase, Phase::Upload);
        assert!(view.icons.is_empty());
        assert!(view.active_project.is_none());
        assert!(!view.has_image);
        assert_eq!(store.list_projects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_results_persist_without_touching_new_session() {
        let (mut studio, store, _) = analyzed_studio().await;
        studio.set_subject("Save");
        let job = studio.begin_generation().unwrap().unwrap();

        studio.new_session();
        assert!(studio.view().is_generating);
        let result = job.run().await;
        studio.finish_generation(job, result).await.unwrap();

        assert_eq!(studio.view().phase, Phase::Upload);
        assert!(!studio.view().is_generating);
        let saved = store.list_projects().await.unwrap();
        assert_eq!(saved[0].generated_icons.len(), 3);
    }

    #[tokio::test]
    async fn opening_a_project_restores_phase_and_subject() {
        let (mut studio, _, _) = analyzed_studio().await;
        let analyzed_id = studio.session().active_project_id.clone().unwrap();
        studio.set_subject("Save");
        studio.generate().await.unwrap();
        studio.new_session();

        studio.open_project(&analyzed_id).await.unwrap();
        let view = studio.view();
        assert_eq!(view.phase, Phase::Generate);
        assert_eq!(view.subject, "Save");
        assert_eq!(view.icons.len(), 3);
        assert!(view.icons.iter().all(|icon| icon.id.is_some()));
        assert!(view.can_generate);

        assert!(matches!(
            studio.open_project("proj_missing").await,
            Err(IconError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reopened_project_without_icons_is_analyze() {
        let (mut studio, _, _) = analyzed_studio().await;
        let id = studio.session().active_project_id.clone().unwrap();
        studio.new_session();
        studio.open_project(&id).await.unwrap();
        assert_eq!(studio.view().phase, Phase::Analyze);
        assert_eq!(studio.view().subject, "");
    }

    #[tokio::test]
    async fn deleting_active_project_clears_session() {
        let (mut studio, store, _) = analyzed_studio().await;
        let id = studio.session().active_project_id.clone().unwrap();

        studio.delete_project(&id).await.unwrap();
        assert!(store.get_project(&id).await.unwrap().is_none());
        assert!(studio.projects().is_empty());
        assert_eq!(studio.view().phase, Phase::Upload);
        assert!(matches!(
            studio.delete_project(&id).await,
            Err(IconError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn batch_for_a_deleted_project_is_discarded() {
        let (mut studio, store, _) = analyzed_studio().await;
        let id = studio.session().active_project_id.clone().unwrap();
        studio.set_subject("Save");
        let job = studio.begin_generation().unwrap().unwrap();

        studio.delete_project(&id).await.unwrap();
        let result = job.run().await;
        studio.finish_generation(job, result).await.unwrap();

        assert!(store.list_projects().await.unwrap().is_empty());
        assert!(studio.projects().is_empty());
        let view = studio.view();
        assert_eq!(view.phase, Phase::Upload);
        assert!(!view.is_generating);
        assert_eq!(view.generation_error, None);
    }

    #[tokio::test]
    async fn deleting_an_icon_rewrites_the_project() {
        let (mut studio, store, _) = analyzed_studio().await;
        studio.set_subject("Save");
        studio.generate().await.unwrap();
        let id = studio.session().active_project_id.clone().unwrap();
        let icon_id = studio.project(&id).unwrap().generated_icons[1].id.clone();

        studio.delete_icon(&id, &icon_id).await.unwrap();
        let saved = store.get_project(&id).await.unwrap().unwrap();
        assert_eq!(saved.generated_icons.len(), 2);
        assert!(saved.generated_icons.iter().all(|i| i.id != icon_id));
        assert!(matches!(
            studio.delete_icon(&id, &icon_id).await,
            Err(IconError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rename_rejects_blank_names() {
        let (mut studio, store, _) = analyzed_studio().await;
        let id = studio.session().active_project_id.clone().unwrap();

        assert!(matches!(
            studio.rename_project(&id, "  ").await,
            Err(IconError::Validation(_))
        ));
        studio.rename_project(&id, " Brand kit ").await.unwrap();
        assert_eq!(store.get_project(&id).await.unwrap().unwrap().name, "Brand kit");
    }

    #[tokio::test]
    async fn specification_edits_commit_to_the_project() {
        let (mut studio, store, _) = analyzed_studio().await;
        let id = studio.session().active_project_id.clone().unwrap();
        let before = studio.view().specification.unwrap();

        let updated = studio
            .update_specification(&json!({"gradient": {"direction": "left", "endColor": "#000000"}}))
            .await
            .unwrap();
        assert!(updated.updated_at > before.updated_at);
        assert_eq!(updated.effects.gradient_direction, Some(GradientDirection::Left));
        assert_eq!(
            updated.effects.gradient_colors,
            Some(vec![updated.gradient.start_color.clone(), "#000000".to_string()])
        );

        let saved = store.get_project(&id).await.unwrap().unwrap();
        assert_eq!(saved.specification, updated);
        assert_eq!(studio.view().specification, Some(updated));
    }

    #[tokio::test]
    async fn switching_provider_resets_model_and_gates_on_credentials() {
        let fake = FakeAdapter::new(Provider::OpenAi);
        let (mut studio, store) = studio_with(fake).await;
        studio.upload_image(png_upload()).unwrap();

        let settings = studio
            .update_settings(SettingsUpdate {
                provider: Some(Provider::OpenAi),
                ..SettingsUpdate::default()
            })
            .await
            .unwrap();
        assert_eq!(settings.model, default_model(Provider::OpenAi));
        assert!(!studio.view().can_analyze);

        studio
            .update_settings(SettingsUpdate {
                api_keys: Some(ApiKeys {
                    openai: "sk-test".to_string(),
                    ..ApiKeys::default()
                }),
                model: Some("gpt-4o".to_string()),
                ..SettingsUpdate::default()
            })
            .await
            .unwrap();
        assert!(studio.view().can_analyze);
        assert_eq!(store.get_settings().await.unwrap().unwrap().model, "gpt-4o");

        assert!(matches!(
            studio
                .update_settings(SettingsUpdate {
                    model: Some("gemini-2.5-pro".to_string()),
                    ..SettingsUpdate::default()
                })
                .await,
            Err(IconError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn selection_is_bounded_by_displayed_icons() {
        let (mut studio, _, _) = analyzed_studio().await;
        studio.set_subject("Save");
        studio.generate().await.unwrap();

        studio.select_icon(Some(2)).unwrap();
        assert_eq!(studio.view().selected_icon, Some(2));
        assert!(matches!(studio.select_icon(Some(3)), Err(IconError::Validation(_))));
        studio.select_icon(None).unwrap();
        assert_eq!(studio.view().selected_icon, None);
    }
}
