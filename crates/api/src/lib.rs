//! Scoring API Server
//!
//! Serves decisions from one transformation bundle loaded at start-up. The
//! bundle is immutable once loaded, so handlers share it without locking.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{extract::State, response::IntoResponse, routing::get, routing::post, Json, Router};
use bundle_store::TransformationBundle;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use scorer::Cutoff;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod error;
mod routes;

pub use config::ApiConfig;
pub use error::ApiError;
pub use routes::predictions::{EstimateResponse, PredictResponse};
pub use routes::schema::{CategoricalSchema, SchemaResponse};

/// Application state shared across handlers
pub struct AppState {
    /// Loaded bundle
    pub bundle: Arc<TransformationBundle>,
    /// Cutoff used when a request omits one
    pub default_cutoff: Cutoff,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
    /// Prometheus exporter, absent when no recorder was installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(bundle: Arc<TransformationBundle>, default_cutoff: Cutoff) -> Self {
        Self {
            bundle,
            default_cutoff,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub bundle: BundleStatus,
}

/// Summary of the loaded bundle
#[derive(Debug, Serialize, Deserialize)]
pub struct BundleStatus {
    pub name: String,
    pub model: String,
    pub n_features: usize,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/schema", get(routes::schema::get_schema))
        .route("/api/v1/predict", post(routes::predictions::predict))
        .route("/api/v1/estimate", post(routes::predictions::estimate))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        bundle: BundleStatus {
            name: state.bundle.metadata().name.clone(),
            model: state.bundle.model().kind().to_string(),
            n_features: state.bundle.pipeline().canonical_order().len(),
        },
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or(ApiError::MetricsUnavailable)
}

/// Initialize logging
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Load the bundle, install the metrics recorder and serve until shutdown
pub async fn run_server(config: ApiConfig) -> anyhow::Result<()> {
    let default_cutoff = config
        .cutoff()
        .context("invalid default_cutoff in configuration")?;

    let bundle = bundle_store::load(&config.bundle_path)
        .with_context(|| format!("failed to load bundle {}", config.bundle_path.display()))?;
    info!(
        "Serving bundle '{}' ({}, {} features, cutoff {})",
        bundle.metadata().name,
        bundle.model().kind(),
        bundle.pipeline().canonical_order().len(),
        default_cutoff.value()
    );

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let state = Arc::new(AppState::new(Arc::new(bundle), default_cutoff).with_metrics(handle));
    let app = create_router(state);

    info!("Starting API server on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bundle_store::fixtures;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router(bundle: TransformationBundle) -> Router {
        let state = AppState::new(Arc::new(bundle), Cutoff::default());
        create_router(Arc::new(state))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_raw(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(router(fixtures::loan_bundle()), get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);

        let health: HealthResponse = serde_json::from_value(body).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.bundle.model, "logistic_regression");
        assert_eq!(health.bundle.n_features, 20);
    }

    #[tokio::test]
    async fn test_schema_lists_inputs() {
        let (status, body) = send(router(fixtures::car_price_bundle()), get("/api/v1/schema")).await;
        assert_eq!(status, StatusCode::OK);

        let schema: SchemaResponse = serde_json::from_value(body).unwrap();
        assert_eq!(schema.numeric_columns, vec!["mileage", "engV", "year"]);
        let car = schema
            .categorical_columns
            .iter()
            .find(|c| c.name == "car")
            .unwrap();
        assert_eq!(car.encoding, "ordinal");
        assert_eq!(car.fallback.as_deref(), Some("Other"));
        assert_eq!(schema.default_cutoff, 0.5);
    }

    #[tokio::test]
    async fn test_predict_accepts() {
        let request = post_json(
            "/api/v1/predict",
            json!({ "sample": fixtures::loan_sample() }),
        );
        let (status, body) = send(router(fixtures::loan_bundle()), request).await;
        assert_eq!(status, StatusCode::OK);

        let response: PredictResponse = serde_json::from_value(body).unwrap();
        assert!(response.accepted);
        assert!(response.probability > 0.9);
        assert_eq!(response.cutoff, 0.5);
        assert!((response.margin - (response.probability - 0.5)).abs() < 1e-12);
        assert_eq!(response.label.as_deref(), Some("Approved"));
    }

    #[tokio::test]
    async fn test_predict_cutoff_override() {
        let request = post_json(
            "/api/v1/predict",
            json!({ "sample": fixtures::loan_sample(), "cutoff": 0.99 }),
        );
        let (status, body) = send(router(fixtures::loan_bundle()), request).await;
        assert_eq!(status, StatusCode::OK);

        let response: PredictResponse = serde_json::from_value(body).unwrap();
        assert!(!response.accepted);
        assert_eq!(response.cutoff, 0.99);
        assert!(response.margin < 0.0);
    }

    #[tokio::test]
    async fn test_predict_invalid_cutoff() {
        let request = post_json(
            "/api/v1/predict",
            json!({ "sample": fixtures::loan_sample(), "cutoff": 1.5 }),
        );
        let (status, body) = send(router(fixtures::loan_bundle()), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "invalid_cutoff");
    }

    #[tokio::test]
    async fn test_predict_unknown_category() {
        let sample = fixtures::loan_sample().with("Property_Area", "Downtown");
        let request = post_json("/api/v1/predict", json!({ "sample": sample }));
        let (status, body) = send(router(fixtures::loan_bundle()), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "unknown_category");
        assert!(body["message"].as_str().unwrap().contains("Property_Area"));
    }

    #[tokio::test]
    async fn test_predict_missing_column() {
        let mut sample = serde_json::to_value(fixtures::loan_sample()).unwrap();
        sample.as_object_mut().unwrap().remove("TotalIncome");
        let request = post_json("/api/v1/predict", json!({ "sample": sample }));
        let (status, body) = send(router(fixtures::loan_bundle()), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "missing_column");
    }

    #[tokio::test]
    async fn test_predict_on_regressor_is_rejected() {
        let request = post_json(
            "/api/v1/predict",
            json!({ "sample": fixtures::car_sample() }),
        );
        let (status, body) = send(router(fixtures::car_price_bundle()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "unsupported_operation");
    }

    #[tokio::test]
    async fn test_estimate_with_fallback() {
        let sample = fixtures::car_sample().with("car", "Lada");
        let request = post_json("/api/v1/estimate", json!({ "sample": sample }));
        let (status, body) = send(router(fixtures::car_price_bundle()), request).await;
        assert_eq!(status, StatusCode::OK);

        let response: EstimateResponse = serde_json::from_value(body).unwrap();
        assert!(response.value.is_finite());
    }

    #[tokio::test]
    async fn test_estimate_on_classifier_is_rejected() {
        let request = post_json(
            "/api/v1/estimate",
            json!({ "sample": fixtures::bankruptcy_sample() }),
        );
        let (status, body) = send(router(fixtures::bankruptcy_bundle()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "unsupported_operation");
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_json_errors() {
        let mut null_value = serde_json::to_value(fixtures::loan_sample()).unwrap();
        null_value["Self_Employed"] = Value::Null;
        let cases = [
            (
                post_json("/api/v1/predict", json!({ "sample": null_value })),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                post_json(
                    "/api/v1/predict",
                    json!({ "sample": fixtures::loan_sample(), "cutoff": "0.7" }),
                ),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (post_raw("/api/v1/predict", "not json"), StatusCode::BAD_REQUEST),
            (post_raw("/api/v1/estimate", "{\"sample\": true}"), StatusCode::UNPROCESSABLE_ENTITY),
        ];

        for (request, expected) in cases {
            let (status, body) = send(router(fixtures::loan_bundle()), request).await;
            assert_eq!(status, expected);
            assert_eq!(body["kind"], "invalid_request");
            assert!(body["message"].as_str().unwrap().starts_with("Invalid request body"));
        }
    }

    #[tokio::test]
    async fn test_missing_content_type_is_json_error() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/predict")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(router(fixtures::loan_bundle()), request).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn test_metrics_with_recorder() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let state = AppState::new(Arc::new(fixtures::loan_bundle()), Cutoff::default())
            .with_metrics(handle);
        let app = create_router(Arc::new(state));

        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(to_bytes(response.into_body(), usize::MAX).await.is_ok());
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let request = get("/metrics");
        let response = router(fixtures::loan_bundle()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
