//! HTTP handlers for the search form, the JSON API and the report download.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use thiserror::Error;
use tokio::sync::Mutex;

use super::page;
use super::types::{AnalyzeResponse, ErrorResponse, HealthResponse};
use crate::config::{Config, ConfigError, DEFAULT_REPORT_PATH};
use crate::filters::{FieldError, FilterInput, FilterSummary};
use crate::pipeline::{PipelineResult, ReportPipeline};

const REPORT_MISSING_WARNING: &str =
    "No se encontró el archivo de reporte final para descargar. El resultado principal se muestra arriba.";

/// Shared server state.
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<dyn ReportPipeline>,
    /// Runs share the report file, so only one executes at a time.
    run_lock: Mutex<()>,
}

impl AppState {
    pub fn new(config: Config, pipeline: Arc<dyn ReportPipeline>) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
            run_lock: Mutex::new(()),
        }
    }
}

/// Why an analysis request did not produce a report.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("⚠️ {0}")]
    Config(#[from] ConfigError),

    #[error("Filtros de búsqueda inválidos")]
    InvalidFilters(Vec<FieldError>),

    #[error("Ocurrió un error durante el análisis: {0}")]
    Pipeline(anyhow::Error),
}

impl AnalysisError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidFilters(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::InvalidFilters(_) => "invalid_filters",
            Self::Pipeline(_) => "pipeline",
        }
    }

    /// One line per problem, for display next to the form.
    fn messages(&self) -> Vec<String> {
        match self {
            Self::InvalidFilters(errors) => errors.iter().map(|e| e.message.clone()).collect(),
            other => vec![other.to_string()],
        }
    }
}

/// A completed analysis ready to display.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: PipelineResult,
    pub summary: FilterSummary,
    pub report_available: bool,
    pub warnings: Vec<String>,
}

/// Check credentials and filters, then run the pipeline.
///
/// Nothing reaches the pipeline unless both checks pass.
pub async fn run_analysis(
    state: &AppState,
    input: &FilterInput,
) -> Result<AnalysisOutcome, AnalysisError> {
    state.config.credentials.require()?;
    let filters = input.validate().map_err(AnalysisError::InvalidFilters)?;

    let _guard = state.run_lock.lock().await;
    tracing::info!("Analysis requested: {:?}", filters);

    let result = state.pipeline.run(&filters).await.map_err(|e| {
        tracing::error!("Analysis failed: {:#}", e);
        AnalysisError::Pipeline(e)
    })?;

    let mut warnings = result.warnings.clone();
    let report_available = match &result.report_path {
        Some(path) => tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false),
        None => false,
    };
    if !report_available {
        tracing::warn!("Report file not available after run {}", result.run_id);
        warnings.push(REPORT_MISSING_WARNING.to_string());
    }

    Ok(AnalysisOutcome {
        summary: filters.summary(),
        result,
        report_available,
        warnings,
    })
}

pub async fn index() -> Html<String> {
    Html(page::form_page(&FilterInput::default(), &[]))
}

/// Form submission; repeated keys carry the multi-select values.
pub async fn analyze_form(
    State(state): State<Arc<AppState>>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let input = FilterInput::from_form_pairs(&pairs);

    match run_analysis(&state, &input).await {
        Ok(outcome) => Html(page::report_page(&outcome)).into_response(),
        Err(AnalysisError::Pipeline(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(page::error_page(
                &format!("Ocurrió un error durante el análisis: {}", e),
                &format!("{:?}", e),
            )),
        )
            .into_response(),
        Err(err) => (err.status(), Html(page::form_page(&input, &err.messages()))).into_response(),
    }
}

/// JSON variant; malformed bodies get the same `ErrorResponse` shape.
pub async fn analyze_json(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FilterInput>, JsonRejection>,
) -> Response {
    let input = match body {
        Ok(Json(input)) => input,
        Err(rejection) => {
            tracing::debug!("Rejected analysis request: {}", rejection.body_text());
            return (
                rejection.status(),
                Json(ErrorResponse {
                    kind: "invalid_request",
                    error: rejection.body_text(),
                    field_errors: Vec::new(),
                }),
            )
                .into_response();
        }
    };

    match run_analysis(&state, &input).await {
        Ok(outcome) => Json(AnalyzeResponse {
            run_id: outcome.result.run_id,
            report: outcome.result.report,
            download_url: outcome.report_available.then(|| "/api/report".to_string()),
            summary: outcome.summary,
            warnings: outcome.warnings,
        })
        .into_response(),
        Err(err) => {
            let field_errors = match &err {
                AnalysisError::InvalidFilters(errors) => errors.clone(),
                _ => Vec::new(),
            };
            let error = match &err {
                AnalysisError::Pipeline(e) => format!("{:#}", e),
                other => other.to_string(),
            };
            (
                err.status(),
                Json(ErrorResponse {
                    kind: err.kind(),
                    error,
                    field_errors,
                }),
            )
                .into_response()
        }
    }
}

/// Serve the persisted report as a Markdown attachment.
pub async fn download_report(State(state): State<Arc<AppState>>) -> Response {
    let path = &state.config.report_path;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_REPORT_PATH)
        .to_string();

    match tokio::fs::read_to_string(path).await {
        Ok(content) => (
            [
                (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file_name),
                ),
            ],
            content,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                kind: "not_found",
                error: REPORT_MISSING_WARNING.to_string(),
                field_errors: Vec::new(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Failed to read report {}: {}", path.display(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    kind: "report_unreadable",
                    error: format!("Error al leer el archivo de reporte final: {}", e),
                    field_errors: Vec::new(),
                }),
            )
                .into_response()
        }
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        missing_credentials: state.config.credentials.missing(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::filters::FilterSet;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records calls and writes a fixed report to `path`.
    struct StubPipeline {
        calls: AtomicUsize,
        path: PathBuf,
        fail: bool,
    }

    #[async_trait]
    impl ReportPipeline for StubPipeline {
        async fn run(&self, _filters: &FilterSet) -> anyhow::Result<PipelineResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("LLM API error (401): invalid key");
            }
            std::fs::write(&self.path, "# Reporte")?;
            Ok(PipelineResult {
                run_id: uuid::Uuid::new_v4(),
                report: "# Reporte".to_string(),
                report_path: Some(self.path.clone()),
                stages: Vec::new(),
                warnings: Vec::new(),
            })
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            openai_api_key: Some("sk".to_string()),
            serper_api_key: Some("serper".to_string()),
            tavily_api_key: Some("tvly".to_string()),
        }
    }

    fn state(dir: &tempfile::TempDir, creds: Credentials, fail: bool) -> (AppState, Arc<StubPipeline>) {
        let config = Config::new(creds, dir.path().to_path_buf());
        let stub = Arc::new(StubPipeline {
            calls: AtomicUsize::new(0),
            path: config.report_path.clone(),
            fail,
        });
        (AppState::new(config, stub.clone()), stub)
    }

    #[tokio::test]
    async fn missing_credential_never_reaches_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut creds = credentials();
        creds.serper_api_key = None;
        let (state, stub) = state(&dir, creds, false);

        let err = run_analysis(&state, &FilterInput::default()).await.unwrap_err();

        match &err {
            AnalysisError::Config(ConfigError::MissingCredentials(missing)) => {
                assert_eq!(missing, &vec![crate::config::SERPER_API_KEY])
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_selections_never_reach_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let (state, stub) = state(&dir, credentials(), false);

        for clear in [0, 1, 2] {
            let mut input = FilterInput::default();
            match clear {
                0 => input.sectors.clear(),
                1 => input.strata.clear(),
                _ => input.property_types.clear(),
            }
            let err = run_analysis(&state, &input).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(err.messages().len(), 1);
        }
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_run_offers_download() {
        let dir = tempfile::tempdir().unwrap();
        let (state, stub) = state(&dir, credentials(), false);

        let outcome = run_analysis(&state, &FilterInput::default()).await.unwrap();

        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.result.report, "# Reporte");
        assert!(outcome.report_available);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.summary.investment_range, "$200M - $600M COP");

        let response = download_report(State(Arc::new(state))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"reporte_inversion_pereira.md\""
        );
    }

    #[tokio::test]
    async fn pipeline_failure_is_reported_without_report() {
        let dir = tempfile::tempdir().unwrap();
        let (state, stub) = state(&dir, credentials(), true);

        let err = run_analysis(&state, &FilterInput::default()).await.unwrap_err();

        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("invalid key"));
    }

    async fn json_body(raw: &'static str) -> Result<Json<FilterInput>, JsonRejection> {
        use axum::extract::FromRequest;

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(raw))
            .unwrap();
        Json::<FilterInput>::from_request(request, &()).await
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn mistyped_json_gets_error_response_shape() {
        let dir = tempfile::tempdir().unwrap();
        let (state, stub) = state(&dir, credentials(), false);

        let body = json_body(r#"{"strata": [300]}"#).await;
        assert!(body.is_err());
        let response = analyze_json(State(Arc::new(state)), body).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let value = response_json(response).await;
        assert_eq!(value["kind"], "invalid_request");
        assert!(!value["error"].as_str().unwrap().is_empty());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn json_without_selections_lists_field_errors() {
        let dir = tempfile::tempdir().unwrap();
        let (state, stub) = state(&dir, credentials(), false);

        let body = json_body(r#"{"price_min": 1, "price_max": 2}"#).await;
        let response = analyze_json(State(Arc::new(state)), body).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let value = response_json(response).await;
        assert_eq!(value["kind"], "invalid_filters");
        let fields: Vec<_> = value["field_errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(fields, vec!["sectors", "strata", "property_types"]);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_report_file_downgrades_to_warning() {
        struct NoFile;

        #[async_trait]
        impl ReportPipeline for NoFile {
            async fn run(&self, _filters: &FilterSet) -> anyhow::Result<PipelineResult> {
                Ok(PipelineResult {
                    run_id: uuid::Uuid::new_v4(),
                    report: "texto".to_string(),
                    report_path: None,
                    stages: Vec::new(),
                    warnings: vec!["No se pudo escribir el archivo".to_string()],
                })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(
            Config::new(credentials(), dir.path().to_path_buf()),
            Arc::new(NoFile),
        );

        let outcome = run_analysis(&state, &FilterInput::default()).await.unwrap();
        assert!(!outcome.report_available);
        assert_eq!(outcome.result.report, "texto");
        assert_eq!(outcome.warnings.len(), 2);
        assert_eq!(outcome.warnings[1], REPORT_MISSING_WARNING);

        let response = download_report(State(Arc::new(state))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
