use crate::answer_key::{grade, AnswerKey, AnswerKeyStore, GradeReport};
use crate::config::Config;
use crate::engine::TextRecognizer;
use crate::engines::{EngineInfo, EngineRegistry};
use crate::error::OmrError;
use crate::omr::diagnostics::Diagnostics;
use crate::omr::{AnswersMap, LowConfidence, OmrPipeline, SheetScan, StudentInfo};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Room for multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<EngineRegistry>,
    pub config: Arc<Config>,
    pub keys: Arc<AnswerKeyStore>,
    pub diagnostics: Option<Arc<Diagnostics>>,
}

impl AppState {
    pub fn new(config: Config, registry: EngineRegistry) -> Self {
        let diagnostics = config.debug_dir.as_ref().map(|dir| {
            tracing::info!("Writing scan diagnostics to {}", dir.display());
            Arc::new(Diagnostics::new(dir.clone()))
        });

        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
            keys: Arc::new(AnswerKeyStore::new()),
            diagnostics,
        }
    }

    fn pipeline(&self, recognizer: Arc<dyn TextRecognizer>) -> OmrPipeline {
        let pipeline = OmrPipeline::new(Arc::clone(&self.config.omr), recognizer);
        match &self.diagnostics {
            Some(diagnostics) => pipeline.with_diagnostics(Arc::clone(diagnostics)),
            None => pipeline,
        }
    }
}

/// Optional engine selection on scanning routes
#[derive(Debug, Default, Deserialize)]
pub struct EngineQuery {
    pub engine: Option<String>,
}

/// Scan response
#[derive(Serialize)]
pub struct ScanResponse {
    #[serde(flatten)]
    pub scan: SheetScan,
    pub engine: String,
    pub processing_time_ms: u64,
}

/// Answer key publication response
#[derive(Serialize)]
pub struct AnswerKeyResponse {
    pub version: u64,
    pub questions: usize,
    pub answers: AnswersMap,
    pub low_confidence: Vec<LowConfidence>,
    pub processing_time_ms: u64,
}

/// Grading response
#[derive(Serialize)]
pub struct GradeResponse {
    pub student_info: StudentInfo,
    #[serde(flatten)]
    pub report: GradeReport,
    pub low_confidence: Vec<LowConfidence>,
    pub processing_time_ms: u64,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct LayoutInfo {
    pub rows_per_column: usize,
    pub answer_columns: usize,
    pub choices: usize,
    pub total_questions: usize,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub engines: Vec<EngineInfo>,
    pub default_engine: String,
    pub layout: LayoutInfo,
    pub max_file_size_bytes: usize,
    pub answer_key_version: Option<u64>,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/scan", post(handle_scan))
        .route("/answer-key", post(handle_publish_key).get(handle_get_key))
        .route("/grade", post(handle_grade))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let registry = EngineRegistry::new(&config)?;
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!(
        "Engines available: {:?} (default: {})",
        registry.list(),
        registry.default_name()
    );

    let app = router(AppState::new(config, registry));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Pull the `file` field out of a multipart upload
async fn read_upload(multipart: &mut Multipart, max_file_size: usize) -> Result<Bytes, OmrError> {
    let mut file_data: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            OmrError::UploadTooLarge { max: max_file_size }
        } else {
            OmrError::InvalidRequest(format!("Failed to parse multipart: {}", e))
        }
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let data = field.bytes().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                OmrError::UploadTooLarge { max: max_file_size }
            } else {
                OmrError::InvalidRequest(format!("Failed to read file data: {}", e))
            }
        })?;
        file_data = Some(data);
    }

    let data = file_data.ok_or(OmrError::MissingFile)?;

    if data.len() > max_file_size {
        return Err(OmrError::ImageTooLarge {
            size: data.len(),
            max: max_file_size,
        });
    }

    Ok(data)
}

/// Scan an upload off the async runtime
async fn scan_upload(
    state: &AppState,
    query: &EngineQuery,
    multipart: &mut Multipart,
) -> Result<(SheetScan, &'static str), OmrError> {
    let recognizer = state.registry.resolve(query.engine.as_deref())?;
    let engine = recognizer.name();
    let data = read_upload(multipart, state.config.max_file_size).await?;
    let pipeline = state.pipeline(recognizer);

    let scan = tokio::task::spawn_blocking(move || pipeline.scan(&data))
        .await
        .map_err(|e| OmrError::Internal(format!("Scan task failed: {}", e)))??;

    Ok((scan, engine))
}

/// Handle sheet scan requests
async fn handle_scan(
    State(state): State<AppState>,
    Query(query): Query<EngineQuery>,
    mut multipart: Multipart,
) -> Result<Json<ScanResponse>, OmrError> {
    let start = Instant::now();
    let (scan, engine) = scan_upload(&state, &query, &mut multipart).await?;

    Ok(Json(ScanResponse {
        scan,
        engine: engine.to_string(),
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// Scan a master sheet and install it as the next answer key
async fn handle_publish_key(
    State(state): State<AppState>,
    Query(query): Query<EngineQuery>,
    mut multipart: Multipart,
) -> Result<Json<AnswerKeyResponse>, OmrError> {
    let start = Instant::now();
    let (scan, _) = scan_upload(&state, &query, &mut multipart).await?;

    if scan.answers.is_empty() {
        tracing::warn!("Publishing an answer key with no detected answers");
    }
    let key = state.keys.publish(scan.answers);

    Ok(Json(AnswerKeyResponse {
        version: key.version,
        questions: key.answers.len(),
        answers: key.answers.clone(),
        low_confidence: scan.low_confidence,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// Return the active answer key
async fn handle_get_key(State(state): State<AppState>) -> Result<Json<AnswerKey>, OmrError> {
    let key = state.keys.current().ok_or(OmrError::NoAnswerKey)?;
    Ok(Json(AnswerKey::clone(&key)))
}

/// Scan a student sheet and grade it against the active key
async fn handle_grade(
    State(state): State<AppState>,
    Query(query): Query<EngineQuery>,
    mut multipart: Multipart,
) -> Result<Json<GradeResponse>, OmrError> {
    let start = Instant::now();
    // Snapshot before scanning so a concurrent publication cannot mix keys
    let key = state.keys.current().ok_or(OmrError::NoAnswerKey)?;
    let (scan, _) = scan_upload(&state, &query, &mut multipart).await?;

    let report = grade(&key, &scan.answers);
    tracing::info!(
        key_version = report.key_version,
        correct = report.correct,
        total = report.total,
        "Sheet graded"
    );

    Ok(Json(GradeResponse {
        student_info: scan.student_info,
        report,
        low_confidence: scan.low_confidence,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let layout = &state.config.omr.layout;

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engines: state.registry.info(),
        default_engine: state.registry.default_name().to_string(),
        layout: LayoutInfo {
            rows_per_column: layout.rows_per_column,
            answer_columns: layout.answer_columns,
            choices: layout.choices,
            total_questions: layout.total_questions(),
        },
        max_file_size_bytes: state.config.max_file_size,
        answer_key_version: state.keys.current().map(|key| key.version),
    })
}
