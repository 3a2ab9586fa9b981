use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, Instrument};

use crate::app::ProcessReportUseCase;
use crate::constants::QUEUED_STATUS;
use crate::observability::render_metrics;

#[derive(Debug, Clone, Deserialize)]
pub struct AgroRequest {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgroResponse {
    pub id: String,
    pub status: String,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "agro-reports",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus exposition
async fn metrics_handler() -> impl IntoResponse {
    match render_metrics() {
        Some(body) => (StatusCode::OK, body),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}

/// Accept a report and process it in the background.
///
/// The response only acknowledges the request; failures are logged.
async fn process_report(
    Extension(use_case): Extension<Arc<ProcessReportUseCase>>,
    Json(request): Json<AgroRequest>,
) -> impl IntoResponse {
    let span = info_span!("process_report", id = %request.id);
    let id = request.id.clone();

    tokio::spawn(
        async move {
            match use_case.process(&request.id, &request.message).await {
                Ok(summary) => info!(records = summary.records, "Background processing finished"),
                Err(e) => error!("Ошибка при обработке запроса: {:#}", e),
            }
        }
        .instrument(span),
    );

    Json(AgroResponse {
        id,
        status: QUEUED_STATUS.to_string(),
    })
}

/// Create the HTTP router; report routes live under `api_prefix`.
pub fn create_server(use_case: Arc<ProcessReportUseCase>, api_prefix: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let api = Router::new().route("/agro/process", post(process_report));
    let api = if api_prefix.is_empty() || api_prefix == "/" {
        api
    } else {
        Router::new().nest(api_prefix, api)
    };

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .merge(api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(Extension(use_case)),
        )
}

/// Start the HTTP server
pub async fn start_server(
    use_case: Arc<ProcessReportUseCase>,
    api_prefix: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_server(use_case, api_prefix);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("Starting agro reports server on http://{}", addr);
    info!("Reports: POST http://{}{}/agro/process", addr, api_prefix);
    info!("Health check: http://{}/health", addr);

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{ModelPort, SpreadsheetSinkPort};
    use crate::error::{ModelError, Result as AppResult};
    use crate::rows::SheetRow;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::path::PathBuf;
    use tower::ServiceExt;

    struct EmptyModel;

    #[async_trait]
    impl ModelPort for EmptyModel {
        async fn invoke(&self, _prompt: &str) -> Result<String, ModelError> {
            Ok("{\"операции\": []}".to_string())
        }
    }

    struct NullSink;

    #[async_trait]
    impl SpreadsheetSinkPort for NullSink {
        async fn append(&self, file_name: &str, _rows: &[SheetRow]) -> AppResult<PathBuf> {
            Ok(PathBuf::from(file_name))
        }
    }

    fn app() -> Router {
        let use_case = ProcessReportUseCase::new(Arc::new(EmptyModel), Box::new(NullSink), None);
        create_server(Arc::new(use_case), "/api/v1")
    }

    #[tokio::test]
    async fn process_is_acknowledged_immediately() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/agro/process")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"id": "17", "message": "отд 3/4"}"#))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: AgroResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            AgroResponse {
                id: "17".to_string(),
                status: QUEUED_STATUS.to_string()
            }
        );
    }

    #[tokio::test]
    async fn health_is_served_outside_prefix() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/agro/process")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"id": "17"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }
}
