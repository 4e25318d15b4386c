use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::delete, routing::get, routing::post, Json, Router};
use serde::Serialize;
use thiserror::Error;
use tokio::task;
use tracing::{error, info};

use synth_core::{
    AnnotatedAtom, Atom, GraphArtifact, NodeStyle, PipelineError, QualityReport, Theme,
};
use synth_llm::LlmClient;
use synth_pipeline::{CachedArtifact, Pipeline, PipelineConfig, ProjectStatus};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();
    let config = PipelineConfig::from_env()?;
    let client = LlmClient::new(config.provider, config.model.clone())?;
    let pipeline = Arc::new(Pipeline::new(config, Arc::new(client)));
    let app = Router::new()
        .route("/projects", get(handle_list_projects))
        .route("/projects/:project", delete(handle_delete_project))
        .route("/projects/:project/upload", post(handle_upload))
        .route(
            "/projects/:project/files/:filename/normalize",
            post(handle_normalize),
        )
        .route(
            "/projects/:project/files/:filename/atomize",
            post(handle_atomize),
        )
        .route(
            "/projects/:project/files/:filename/annotate",
            post(handle_annotate),
        )
        .route(
            "/projects/:project/files/:filename/graph",
            post(handle_graph),
        )
        .route(
            "/projects/:project/files/:filename/themes",
            post(handle_themes),
        )
        .route(
            "/projects/:project/files/:filename/enhance-graph",
            post(handle_enhance_graph),
        )
        .route(
            "/projects/:project/files/:filename/quality-guard",
            post(handle_quality_guard),
        )
        .route(
            "/projects/:project/files/:filename/cached/:stage",
            get(handle_cached),
        )
        .with_state(pipeline);
    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    project: String,
    filename: String,
    size: usize,
}

#[derive(Debug, Serialize)]
struct NormalizeResponse {
    cleaned: String,
}

async fn handle_upload(
    State(pipeline): State<Arc<Pipeline>>,
    AxumPath(project): AxumPath<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let upload = extract_file(&mut multipart).await?;
    let filename = upload
        .filename
        .ok_or_else(|| AppError::bad_request("upload is missing a filename"))?;
    let size = upload.data.len();
    {
        let filename = filename.clone();
        let project = project.clone();
        task::spawn_blocking(move || pipeline.upload(&project, &filename, &upload.data))
            .await
            .map_err(AppError::internal)??;
    }
    Ok(Json(UploadResponse {
        project,
        filename,
        size,
    }))
}

async fn handle_normalize(
    State(pipeline): State<Arc<Pipeline>>,
    AxumPath((project, filename)): AxumPath<(String, String)>,
) -> Result<Json<NormalizeResponse>, AppError> {
    let cleaned = task::spawn_blocking(move || pipeline.normalize(&project, &filename))
        .await
        .map_err(AppError::internal)??;
    Ok(Json(NormalizeResponse { cleaned }))
}

async fn handle_atomize(
    State(pipeline): State<Arc<Pipeline>>,
    AxumPath((project, filename)): AxumPath<(String, String)>,
) -> Result<Json<Vec<Atom>>, AppError> {
    let atoms = task::spawn_blocking(move || pipeline.atomize(&project, &filename))
        .await
        .map_err(AppError::internal)??;
    Ok(Json(atoms))
}

async fn handle_annotate(
    State(pipeline): State<Arc<Pipeline>>,
    AxumPath((project, filename)): AxumPath<(String, String)>,
    body: Option<Json<Vec<Atom>>>,
) -> Result<Json<Vec<AnnotatedAtom>>, AppError> {
    let atoms = body.map(|Json(atoms)| atoms);
    let annotated = task::spawn_blocking(move || pipeline.annotate(&project, &filename, atoms))
        .await
        .map_err(AppError::internal)??;
    Ok(Json(annotated))
}

async fn handle_graph(
    State(pipeline): State<Arc<Pipeline>>,
    AxumPath((project, filename)): AxumPath<(String, String)>,
) -> Result<Json<GraphArtifact>, AppError> {
    let graph = task::spawn_blocking(move || pipeline.graph(&project, &filename))
        .await
        .map_err(AppError::internal)??;
    Ok(Json(graph))
}

async fn handle_themes(
    State(pipeline): State<Arc<Pipeline>>,
    AxumPath((project, filename)): AxumPath<(String, String)>,
) -> Result<Json<Vec<Theme>>, AppError> {
    let themes = task::spawn_blocking(move || pipeline.themes(&project, &filename))
        .await
        .map_err(AppError::internal)??;
    Ok(Json(themes))
}

async fn handle_enhance_graph(
    State(pipeline): State<Arc<Pipeline>>,
    AxumPath((project, filename)): AxumPath<(String, String)>,
) -> Result<Json<Vec<NodeStyle>>, AppError> {
    let styles = task::spawn_blocking(move || pipeline.enhance_graph(&project, &filename))
        .await
        .map_err(AppError::internal)??;
    Ok(Json(styles))
}

async fn handle_quality_guard(
    State(pipeline): State<Arc<Pipeline>>,
    AxumPath((project, filename)): AxumPath<(String, String)>,
) -> Result<Json<QualityReport>, AppError> {
    let report = task::spawn_blocking(move || pipeline.quality_guard(&project, &filename))
        .await
        .map_err(AppError::internal)??;
    Ok(Json(report))
}

async fn handle_cached(
    State(pipeline): State<Arc<Pipeline>>,
    AxumPath((project, filename, stage)): AxumPath<(String, String, String)>,
) -> Result<Json<CachedArtifact>, AppError> {
    let artifact =
        task::spawn_blocking(move || pipeline.cached(&project, &stage, &filename))
            .await
            .map_err(AppError::internal)??;
    artifact
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no cached artifact for that stage".to_string()))
}

async fn handle_list_projects(
    State(pipeline): State<Arc<Pipeline>>,
) -> Result<Json<Vec<ProjectStatus>>, AppError> {
    let projects = task::spawn_blocking(move || pipeline.list_projects())
        .await
        .map_err(AppError::internal)??;
    Ok(Json(projects))
}

async fn handle_delete_project(
    State(pipeline): State<Arc<Pipeline>>,
    AxumPath(project): AxumPath<String>,
) -> Result<StatusCode, AppError> {
    task::spawn_blocking(move || pipeline.delete_project(&project))
        .await
        .map_err(AppError::internal)??;
    Ok(StatusCode::NO_CONTENT)
}

struct UploadedFile {
    data: Vec<u8>,
    filename: Option<String>,
}

async fn extract_file(multipart: &mut Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(AppError::bad_request)?
    {
        if let Some(name) = field.name() {
            if name == "file" {
                let filename = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(AppError::bad_request)?;
                return Ok(UploadedFile {
                    data: data.to_vec(),
                    filename,
                });
            }
        }
    }
    Err(AppError::bad_request("missing file"))
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    MissingStage(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn bad_request<E: ToString>(msg: E) -> Self {
        Self::BadRequest(msg.to_string())
    }

    fn internal<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::PreconditionNotMet { .. } => Self::MissingStage(err.to_string()),
            PipelineError::InvalidProject(_) | PipelineError::InvalidInput(_) => {
                Self::BadRequest(err.to_string())
            }
            other => Self::Internal(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::MissingStage(msg) => (StatusCode::CONFLICT, msg).into_response(),
            AppError::Internal(err) => {
                error!("internal_error" = %err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}
