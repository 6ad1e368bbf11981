// src/handlers.rs
use crate::services::providers::catalog::{MODELS, models_for};
use crate::services::studio::SettingsUpdate;
use crate::{AppState, errors::IconError, models::*};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use bytes::BytesMut;
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct SubjectRequest {
    pub subject: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub provider: Option<Provider>,
}

/// Accepts the first file of a multipart body as the reference image.
pub async fn upload_image(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let Some(mut field) = payload.try_next().await? else {
        return Err(IconError::Validation("No image uploaded".to_string()).into());
    };

    let filename = field
        .content_disposition()
        .get_filename()
        .ok_or_else(|| IconError::Validation("No filename provided".to_string()))?
        .to_string();
    let mime_type = field
        .content_type()
        .map(|ct| ct.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.try_next().await? {
        buffer.extend_from_slice(&chunk);
    }

    let image = ReferenceImage {
        filename,
        mime_type,
        data: buffer.to_vec(),
    };

    let mut studio = data.studio.lock().await;
    studio.upload_image(image)?;
    Ok(HttpResponse::Ok().json(studio.view()))
}

/// Drives a provider call and its bookkeeping on a task of its own, so a
/// client that disconnects mid-call does not abandon the result.
async fn run_detached<F>(task: F) -> Result<(), Error>
where
    F: Future<Output = Result<(), IconError>> + Send + 'static,
{
    tokio::spawn(task)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)??;
    Ok(())
}

/// Runs one analysis. Provider failures come back inside the view, not as an HTTP error.
pub async fn analyze(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let job = data.studio.lock().await.begin_analysis()?;
    if let Some(job) = job {
        let studio = data.studio.clone();
        run_detached(async move {
            // lock released while the provider works
            let result = job.run().await;
            studio.lock().await.finish_analysis(job, result).await
        })
        .await?;
    }
    Ok(HttpResponse::Ok().json(data.studio.lock().await.view()))
}

pub async fn generate(
    data: web::Data<AppState>,
    body: Option<web::Json<GenerateRequest>>,
) -> Result<HttpResponse, Error> {
    let job = {
        let mut studio = data.studio.lock().await;
        if let Some(subject) = body.and_then(|b| b.into_inner().subject) {
            studio.set_subject(&subject);
        }
        studio.begin_generation()?
    };
    if let Some(job) = job {
        let studio = data.studio.clone();
        run_detached(async move {
            let result = job.run().await;
            studio.lock().await.finish_generation(job, result).await
        })
        .await?;
    }
    Ok(HttpResponse::Ok().json(data.studio.lock().await.view()))
}

pub async fn get_session(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().json(data.studio.lock().await.view()))
}

pub async fn new_session(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let mut studio = data.studio.lock().await;
    studio.new_session();
    Ok(HttpResponse::Ok().json(studio.view()))
}

pub async fn set_subject(
    data: web::Data<AppState>,
    body: web::Json<SubjectRequest>,
) -> Result<HttpResponse, Error> {
    let mut studio = data.studio.lock().await;
    studio.set_subject(&body.subject);
    Ok(HttpResponse::Ok().json(studio.view()))
}

pub async fn select_icon(
    data: web::Data<AppState>,
    body: web::Json<SelectRequest>,
) -> Result<HttpResponse, Error> {
    let mut studio = data.studio.lock().await;
    studio.select_icon(body.index)?;
    Ok(HttpResponse::Ok().json(studio.view()))
}

pub async fn update_specification(
    data: web::Data<AppState>,
    body: web::Json<Value>,
) -> Result<HttpResponse, Error> {
    let mut studio = data.studio.lock().await;
    studio.update_specification(&body).await?;
    Ok(HttpResponse::Ok().json(studio.view()))
}

pub async fn list_projects(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let projects = data.studio.lock().await.projects();
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "projects": projects,
        "count": projects.len()
    })))
}

pub async fn get_project(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let id = path.into_inner();
    let studio = data.studio.lock().await;
    let project = studio
        .project(&id)
        .ok_or_else(|| IconError::NotFound(format!("Project {} not found", id)))?;
    Ok(HttpResponse::Ok().json(project))
}

pub async fn open_project(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let mut studio = data.studio.lock().await;
    studio.open_project(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(studio.view()))
}

pub async fn rename_project(
    path: web::Path<String>,
    data: web::Data<AppState>,
    body: web::Json<RenameRequest>,
) -> Result<HttpResponse, Error> {
    let id = path.into_inner();
    let mut studio = data.studio.lock().await;
    studio.rename_project(&id, &body.name).await?;
    let summary = studio.project(&id).map(DesignProject::to_summary);
    Ok(HttpResponse::Ok().json(summary))
}

pub async fn delete_project(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let mut studio = data.studio.lock().await;
    studio.delete_project(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn delete_icon(
    path: web::Path<(String, String)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (project_id, icon_id) = path.into_inner();
    let mut studio = data.studio.lock().await;
    studio.delete_icon(&project_id, &icon_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Settings without the secrets themselves; only whether each one is set.
fn settings_body(settings: &Settings) -> Value {
    serde_json::json!({
        "provider": settings.provider,
        "model": settings.model,
        "configuredKeys": {
            "openai": !settings.api_keys.openai.is_empty(),
            "anthropic": !settings.api_keys.anthropic.is_empty(),
            "google": !settings.api_keys.google.is_empty()
        },
        "ready": settings.credential().is_some()
    })
}

pub async fn get_settings(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let studio = data.studio.lock().await;
    Ok(HttpResponse::Ok().json(settings_body(studio.settings())))
}

pub async fn update_settings(
    data: web::Data<AppState>,
    body: web::Json<SettingsUpdate>,
) -> Result<HttpResponse, Error> {
    let mut studio = data.studio.lock().await;
    let settings = studio.update_settings(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(settings_body(&settings)))
}

pub async fn list_models(query: web::Query<ModelsQuery>) -> Result<HttpResponse, Error> {
    let models = match query.provider {
        Some(provider) => models_for(provider),
        None => MODELS.to_vec(),
    };
    Ok(HttpResponse::Ok().json(models))
}

/// Doubles as the Ollama connection check.
pub async fn list_ollama_models(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let models = data.ollama.list_local_models().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "models": models })))
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "iconsmith",
        "timestamp": chrono::Utc::now()
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/upload", web::post().to(upload_image))
            .route("/analyze", web::post().to(analyze))
            .route("/generate", web::post().to(generate))
            .route("/session", web::get().to(get_session))
            .route("/session/new", web::post().to(new_session))
            .route("/session/subject", web::post().to(set_subject))
            .route("/session/select", web::post().to(select_icon))
            .route("/specification", web::patch().to(update_specification))
            .route("/projects", web::get().to(list_projects))
            .route("/projects/{id}", web::get().to(get_project))
            .route("/projects/{id}", web::patch().to(rename_project))
            .route("/projects/{id}", web::delete().to(delete_project))
            .route("/projects/{id}/open", web::post().to(open_project))
            .route(
                "/projects/{id}/icons/{icon_id}",
                web::delete().to(delete_icon),
            )
            .route("/settings", web::get().to(get_settings))
            .route("/settings", web::put().to(update_settings))
            .route("/models", web::get().to(list_models))
            .route("/providers/ollama/models", web::get().to(list_ollama_models)),
    )
    .route("/health", web::get().to(health_check));
}
