//! Schema Route
//!
//! Describes the raw inputs the loaded bundle expects, so a form can render
//! the right widgets and choices.

use std::sync::Arc;

use axum::{extract::State, Json};
use feature_encoder::{CategoricalColumn, CategoricalEncoding};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// One categorical input
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoricalSchema {
    pub name: String,
    /// `one_hot`, `ordinal` or `flag`
    pub encoding: String,
    /// Fitted vocabulary, or the truthy spellings for a flag
    pub categories: Vec<String>,
    pub fallback: Option<String>,
}

impl From<&CategoricalColumn> for CategoricalSchema {
    fn from(column: &CategoricalColumn) -> Self {
        let (encoding, categories) = match column.encoding() {
            CategoricalEncoding::OneHot { categories } => ("one_hot", categories),
            CategoricalEncoding::Ordinal { categories } => ("ordinal", categories),
            CategoricalEncoding::Flag { truthy } => ("flag", truthy),
        };
        Self {
            name: column.name().to_string(),
            encoding: encoding.to_string(),
            categories: categories.clone(),
            fallback: column.fallback().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SchemaResponse {
    pub name: String,
    pub positive_label: Option<String>,
    pub model: String,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<CategoricalSchema>,
    pub canonical_order: Vec<String>,
    pub default_cutoff: f64,
}

/// Describe the loaded bundle's inputs
pub async fn get_schema(State(state): State<Arc<AppState>>) -> Json<SchemaResponse> {
    let bundle = &state.bundle;
    let pipeline = bundle.pipeline();

    Json(SchemaResponse {
        name: bundle.metadata().name.clone(),
        positive_label: bundle.metadata().positive_label.clone(),
        model: bundle.model().kind().to_string(),
        numeric_columns: pipeline.numeric_columns().to_vec(),
        categorical_columns: pipeline
            .categorical_columns()
            .iter()
            .map(CategoricalSchema::from)
            .collect(),
        canonical_order: pipeline.canonical_order().to_vec(),
        default_cutoff: state.default_cutoff.value(),
    })
}
