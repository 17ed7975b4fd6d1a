//! Prediction Routes

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use bundle_store::PredictError;
use feature_encoder::RawSample;
use metrics::counter;
use scorer::Cutoff;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Body of a prediction request
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// Raw column name → user-entered value
    pub sample: RawSample,
    /// Overrides the configured default cutoff
    pub cutoff: Option<f64>,
}

/// Decision returned for a prediction request
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub probability: f64,
    pub cutoff: f64,
    pub accepted: bool,
    /// Probability minus cutoff
    pub margin: f64,
    /// Meaning of a positive decision, when the bundle records one
    pub label: Option<String>,
}

/// Body of a regression request
#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub sample: RawSample,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EstimateResponse {
    pub value: f64,
}

fn record_error(err: ApiError) -> ApiError {
    counter!("prediction_errors_total", "kind" => err.kind()).increment(1);
    err
}

/// Unwrap a JSON body, counting rejected bodies like any other failure
fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(request)| request)
        .map_err(|rejection| record_error(rejection.into()))
}

/// Score one sample and compare against the cutoff
pub async fn predict(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let request = parse_body(body)?;
    let model = state.bundle.model();
    if !model.is_probabilistic() {
        return Err(record_error(ApiError::UnsupportedOperation {
            model: model.kind(),
            operation: "predict",
        }));
    }

    let cutoff = match request.cutoff {
        Some(value) => {
            Cutoff::new(value).map_err(|e| record_error(PredictError::from(e).into()))?
        }
        None => state.default_cutoff,
    };

    let prediction = state
        .bundle
        .predict(&request.sample, cutoff)
        .map_err(|e| record_error(e.into()))?;
    let decision = prediction.decision;

    let outcome = if decision.accepted { "accepted" } else { "rejected" };
    counter!("predictions_total", "outcome" => outcome).increment(1);
    debug!("Prediction {}: p={:.4}", outcome, decision.probability);

    Ok(Json(PredictResponse {
        probability: decision.probability,
        cutoff: decision.cutoff,
        accepted: decision.accepted,
        margin: decision.margin(),
        label: state.bundle.metadata().positive_label.clone(),
    }))
}

/// Run a regression bundle on one sample
pub async fn estimate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<EstimateRequest>, JsonRejection>,
) -> Result<Json<EstimateResponse>, ApiError> {
    let request = parse_body(body)?;
    let model = state.bundle.model();
    if model.is_probabilistic() {
        return Err(record_error(ApiError::UnsupportedOperation {
            model: model.kind(),
            operation: "estimate",
        }));
    }

    let value = state
        .bundle
        .estimate(&request.sample)
        .map_err(|e| record_error(e.into()))?;

    counter!("estimates_total").increment(1);
    debug!("Estimate: {:.2}", value);

    Ok(Json(EstimateResponse { value }))
}
