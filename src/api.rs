//! REST API server for the Financial Document Analyzer
//!
//! Boundary layer: accepts the upload, owns the temp-file lifecycle, and
//! offloads one full pipeline run per request. The uploaded file is removed
//! on every exit path, success or failure.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pipeline::PipelineRunner;

pub const DEFAULT_QUERY: &str = "Analyze this financial document and provide insights";

/// =============================
/// Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub status: String,
    pub file: String,
    pub query: String,
    pub analysis: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn bad_request(detail: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
}

fn internal_error(detail: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub runner: Arc<PipelineRunner>,
    pub data_dir: PathBuf,
}

/// =============================
/// Health Endpoint
/// =============================

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "message": "Financial Document Analyzer API is running"
    }))
}

/// =============================
/// Analysis Endpoint
/// =============================

async fn analyze_document(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<axum::body::Bytes> = None;
    let mut query: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart payload: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                file_name = field.file_name().map(str::to_string);
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| bad_request(format!("Failed to read upload: {}", e)))?,
                );
            }
            Some("query") => {
                query = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("Failed to read query: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let file_name = file_name.unwrap_or_default();
    let file_bytes = file_bytes.ok_or_else(|| bad_request("Missing 'file' field"))?;

    // Validate file type before anything touches disk.
    if !file_name.to_lowercase().ends_with(".pdf") {
        return Err(bad_request("Only PDF files are supported"));
    }

    let query = query
        .filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_QUERY.to_string());

    tokio::fs::create_dir_all(&state.data_dir)
        .await
        .map_err(|e| internal_error(format!("Failed to create working directory: {}", e)))?;

    let file_id = Uuid::new_v4();
    let file_path = state.data_dir.join(format!("{}.pdf", file_id));

    info!(file = %file_name, path = ?file_path, "Received analysis request");

    if let Err(e) = tokio::fs::write(&file_path, &file_bytes).await {
        let _ = tokio::fs::remove_file(&file_path).await;
        return Err(internal_error(format!("Failed to persist upload: {}", e)));
    }

    let result = state
        .runner
        .run(&query, file_path.to_string_lossy().as_ref())
        .await;

    // Cleanup is best-effort on every exit path; removal failure is swallowed.
    if let Err(e) = tokio::fs::remove_file(&file_path).await {
        warn!(path = ?file_path, error = %e, "Failed to remove uploaded file");
    }

    match result {
        Ok(analysis) => Ok(Json(AnalyzeResponse {
            status: "success".to_string(),
            file: file_name,
            query,
            analysis,
        })),
        Err(e) => Err(internal_error(e.to_string())),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(runner: Arc<PipelineRunner>, data_dir: PathBuf) -> Router {
    let state = ApiState { runner, data_dir };

    Router::new()
        .route("/", get(root))
        .route("/analyze", post(analyze_document))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    runner: Arc<PipelineRunner>,
    data_dir: PathBuf,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(runner, data_dir);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_pdfs;
    use crate::llm::MockGenerator;
    use crate::pipeline::create_default_pipeline;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const BOUNDARY: &str = "analyzer-test-boundary";

    fn test_router() -> (Router, Arc<MockGenerator>, TempDir) {
        let generator = Arc::new(MockGenerator::new());
        let pipeline = create_default_pipeline(generator.clone()).unwrap();
        let runner = Arc::new(PipelineRunner::new(pipeline));
        let data_dir = tempdir().unwrap();
        let router = create_router(runner, data_dir.path().to_path_buf());
        (router, generator, data_dir)
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, f
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn analyze_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/analyze")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (router, _, _dir) = test_router();

        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "running");
        assert!(json["message"].as_str().unwrap().contains("running"));
    }

    #[tokio::test]
    async fn test_valid_pdf_upload_is_analyzed_and_temp_file_removed() {
        let (router, _, data_dir) = test_router();

        let pdf_dir = tempdir().unwrap();
        let pdf_path = pdf_dir.path().join("report.pdf");
        test_pdfs::write_pdf(&pdf_path, &["Page one", "Page two", "Page three"]);
        let pdf_bytes = std::fs::read(&pdf_path).unwrap();

        let body = multipart_body(&[("file", Some("report.pdf"), pdf_bytes.as_slice())]);
        let response = router.oneshot(analyze_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["file"], "report.pdf");
        assert_eq!(json["query"], DEFAULT_QUERY);
        assert!(!json["analysis"].as_str().unwrap().is_empty());

        // The transient upload is gone.
        assert_eq!(std::fs::read_dir(data_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_non_pdf_bytes_degrade_but_complete() {
        let (router, _, data_dir) = test_router();

        let body = multipart_body(&[
            ("file", Some("notes.pdf"), b"plain text, not a pdf".as_ref()),
            ("query", None, b"What does this say?".as_ref()),
        ]);
        let response = router.oneshot(analyze_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["query"], "What does this say?");
        assert!(json["analysis"]
            .as_str()
            .unwrap()
            .contains("could not be parsed"));

        assert_eq!(std::fs::read_dir(data_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_txt_upload_is_rejected_before_pipeline_runs() {
        let (router, generator, data_dir) = test_router();

        let body = multipart_body(&[("file", Some("notes.txt"), b"some text".as_ref())]);
        let response = router.oneshot(analyze_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert!(json["detail"].as_str().unwrap().contains("Only PDF"));

        // Pipeline never invoked, nothing written to disk.
        assert!(generator.calls().is_empty());
        assert_eq!(std::fs::read_dir(data_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_field_is_rejected() {
        let (router, _, _dir) = test_router();

        let body = multipart_body(&[("query", None, b"no file attached".as_ref())]);
        let response = router.oneshot(analyze_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert!(json["detail"].as_str().unwrap().contains("file"));
    }
}
