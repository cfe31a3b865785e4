mod config;
mod metrics;
mod pipeline;
mod sessions;
#[cfg(test)]
mod test_support;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use config::{AppConfig, LogFormat, LoggingConfig};
use extract::{ChatCompletionClient, Extractor};
use ingest::{PdfTextExtractor, TruncationConfig, Truncator};
use metrics::{Metrics, MetricsSnapshot};
use pipeline::{ReportPipeline, SessionOutcome, UploadedFile};
use render::{DocumentAssembler, PdfBackend};
use sessions::SessionStore;

struct AppState {
    pipeline: ReportPipeline,
    sessions: SessionStore,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();
    init_tracing(&config.logging);

    if config.llm.api_key.is_none() {
        warn!("GROQ_APIKEY is not set; structuring requests will fail");
    }

    // Structuring service, injected into the pipeline
    let client = ChatCompletionClient::new(
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.api_key.clone(),
        Duration::from_secs(config.llm.request_timeout_secs),
    )
    .context("Failed to build LLM client")?;
    info!(model = client.model(), base_url = %config.llm.base_url, "LLM client ready");

    let pipeline = ReportPipeline::new(
        Arc::new(PdfTextExtractor),
        Truncator::new(TruncationConfig {
            max_chars: config.ingest.max_text_chars,
        }),
        Extractor::new(Arc::new(client)),
        DocumentAssembler::default(),
        Arc::new(PdfBackend::default()),
        Metrics::new(),
    );

    let state = Arc::new(AppState {
        pipeline,
        sessions: SessionStore::new(config.server.max_sessions),
    });
    let app = router(state, config.server.max_upload_bytes);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    info!("Server listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match logging.format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}

fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .route("/reports", post(create_session))
        .route("/reports/:id/test-results", get(download_test_results))
        .route("/reports/:id/pdf", get(download_pdf))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.pipeline.metrics().snapshot())
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, StatusCode> {
    let files = read_uploads(multipart).await?;
    let outcome = state.sessions.insert(state.pipeline.process(files).await);
    info!(session_id = %outcome.session_id, stored = state.sessions.len(), "Session stored");
    Ok(Json(outcome.as_ref()).into_response())
}

async fn download_test_results(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, StatusCode> {
    let outcome = stored_session(&state, &id)?;
    Ok(attachment(
        "application/json",
        "test_results.json",
        outcome.test_results_json().into_bytes(),
    ))
}

async fn download_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, StatusCode> {
    let outcome = stored_session(&state, &id)?;
    let pdf = state.pipeline.render_pdf(&outcome).await.map_err(|e| {
        error!(session_id = %id, error = %e, "PDF rendering failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(attachment("application/pdf", "final_report.pdf", pdf))
}

fn stored_session(state: &AppState, id: &Uuid) -> Result<Arc<SessionOutcome>, StatusCode> {
    state.sessions.get(id).ok_or_else(|| {
        warn!(session_id = %id, "Unknown or evicted session");
        StatusCode::NOT_FOUND
    })
}

/// Collect every file field of the upload. No files is a bad request.
async fn read_uploads(mut multipart: Multipart) -> Result<Vec<UploadedFile>, StatusCode> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "Malformed multipart upload");
        StatusCode::BAD_REQUEST
    })? {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(|e| {
            warn!(file = %name, error = %e, "Failed to read uploaded file");
            StatusCode::BAD_REQUEST
        })?;
        files.push(UploadedFile {
            name,
            bytes: bytes.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(files)
}

fn attachment(content_type: &'static str, filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_support::{FixedText, ScriptedService, pipeline_with};
    use tower::ServiceExt;

    const BOUNDARY: &str = "report-boundary";

    fn app(replies: Vec<Result<&str, extract::StructuringError>>) -> (Router, Arc<AtomicUsize>) {
        let service = ScriptedService::new(replies);
        let calls = service.call_counter();
        let pipeline = pipeline_with(FixedText::new("report text"), service, 2500);
        let state = Arc::new(AppState {
            pipeline,
            sessions: SessionStore::new(8),
        });
        (router(state, 1024 * 1024), calls)
    }

    fn upload(files: &[&str]) -> Request<Body> {
        let mut body = String::new();
        for name in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.4\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method("POST")
            .uri("/reports")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn fetch(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    /// Uploads the files and returns the new session id.
    async fn open_session(app: &Router, files: &[&str]) -> String {
        let response = app.clone().oneshot(upload(files)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["session_id"].as_str().unwrap().to_string()
    }

    const CBC: &str = r#"{"report_type": "CBC", "test_results": [{"test_name": "Glucose", "value": "90", "unit": "mg/dL", "reference_range": "70-110"}]}"#;
    const URINE: &str = r#"{"report_type": "Urinalysis", "test_results": [{"test_name": "pH", "value": "6.0"}]}"#;

    #[tokio::test]
    async fn session_summary_merges_multiple_files() {
        let (app, _) = app(vec![Ok(CBC), Ok(URINE)]);
        let response = app.oneshot(upload(&["cbc.pdf", "ua.pdf"])).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["files_received"], 2);
        assert_eq!(json["merged"], true);
        assert_eq!(json["reports"][0]["report_type"], "combined");
        assert_eq!(json["test_results"]["Glucose"], "90 mg/dL");
        assert_eq!(json["evaluations"][0]["domain"], "blood");
    }

    #[tokio::test]
    async fn upload_without_files_is_rejected() {
        let (app, _) = app(vec![]);
        let response = app.oneshot(upload(&[])).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn downloads_reuse_the_stored_session() {
        let (app, calls) = app(vec![Ok(CBC), Ok(URINE)]);
        let id = open_session(&app, &["cbc.pdf", "ua.pdf"]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let response = app
            .clone()
            .oneshot(fetch(&format!("/reports/{id}/test-results")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"test_results.json\""
        );
        let json = body_json(response).await;
        assert_eq!(json["Glucose"], "90 mg/dL");
        assert_eq!(json["pH"], "6.0");

        let response = app
            .clone()
            .oneshot(fetch(&format!("/reports/{id}/pdf")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"final_report.pdf\""
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"%PDF"));

        // One structuring call per file, none for the downloads
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_results_download_is_pretty_json() {
        let (app, _) = app(vec![Ok(CBC)]);
        let id = open_session(&app, &["cbc.pdf"]).await;

        let response = app
            .oneshot(fetch(&format!("/reports/{id}/test-results")))
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"{\n  \"Glucose\": \"90 mg/dL\"\n}");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (app, _) = app(vec![]);
        let id = Uuid::new_v4();

        for uri in [format!("/reports/{id}/pdf"), format!("/reports/{id}/test-results")] {
            let response = app.clone().oneshot(fetch(&uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _) = app(vec![]);
        let response = app.oneshot(fetch("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
