//! Feature Vector Assembly

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::categorical::CategoricalColumn;
use crate::error::EncodeError;
use crate::sample::RawSample;
use crate::scaler::NumericScaler;

/// Model-ready feature vector in canonical column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Pair column names with values; lengths must agree
    pub fn new(columns: Vec<String>, values: Vec<f64>) -> Result<Self, EncodeError> {
        if columns.len() != values.len() {
            return Err(EncodeError::InvalidLayout(format!(
                "{} column names for {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value of a named column
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i).copied())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Fitted preprocessing: numeric scaling, categorical encoding and the
/// canonical column order the model was trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    numeric_columns: Vec<String>,
    scaler: NumericScaler,
    categorical_columns: Vec<CategoricalColumn>,
    canonical_order: Vec<String>,
}

impl FeaturePipeline {
    /// Build and validate a pipeline
    pub fn new(
        numeric_columns: Vec<String>,
        scaler: NumericScaler,
        categorical_columns: Vec<CategoricalColumn>,
        canonical_order: Vec<String>,
    ) -> Result<Self, EncodeError> {
        let pipeline = Self {
            numeric_columns,
            scaler,
            categorical_columns,
            canonical_order,
        };
        pipeline.validate()?;
        Ok(pipeline)
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn scaler(&self) -> &NumericScaler {
        &self.scaler
    }

    pub fn categorical_columns(&self) -> &[CategoricalColumn] {
        &self.categorical_columns
    }

    pub fn canonical_order(&self) -> &[String] {
        &self.canonical_order
    }

    /// Every raw column the pipeline expects, numeric first
    pub fn raw_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric_columns.iter().map(String::as_str).chain(
            self.categorical_columns
                .iter()
                .map(CategoricalColumn::name),
        )
    }

    /// Columns produced before reordering: scaled numeric block, then
    /// encoded categorical block
    pub fn output_columns(&self) -> Vec<String> {
        self.numeric_columns
            .iter()
            .cloned()
            .chain(
                self.categorical_columns
                    .iter()
                    .flat_map(CategoricalColumn::output_columns),
            )
            .collect()
    }

    /// Check the fitted parts agree with each other
    pub fn validate(&self) -> Result<(), EncodeError> {
        let mut raw = HashSet::new();
        for column in self.raw_columns() {
            if !raw.insert(column) {
                return Err(EncodeError::InvalidLayout(format!(
                    "raw column {column} is declared more than once"
                )));
            }
        }

        self.scaler.validate(self.numeric_columns.len())?;
        for column in &self.categorical_columns {
            column.validate()?;
        }

        let produced = self.output_columns();
        let produced_set: HashSet<&str> = produced.iter().map(String::as_str).collect();
        if produced_set.len() != produced.len() {
            return Err(EncodeError::InvalidLayout(
                "encoded columns collide on the same output name".to_string(),
            ));
        }

        let canonical_set: HashSet<&str> =
            self.canonical_order.iter().map(String::as_str).collect();
        if canonical_set.len() != self.canonical_order.len() {
            return Err(EncodeError::InvalidLayout(
                "canonical order lists a column twice".to_string(),
            ));
        }

        if produced_set != canonical_set {
            let mut missing: Vec<&str> = canonical_set.difference(&produced_set).copied().collect();
            let mut extra: Vec<&str> = produced_set.difference(&canonical_set).copied().collect();
            missing.sort_unstable();
            extra.sort_unstable();
            return Err(EncodeError::InvalidLayout(format!(
                "canonical order does not match encoded columns (not produced: [{}], not in canonical order: [{}])",
                missing.join(", "),
                extra.join(", ")
            )));
        }

        Ok(())
    }

    /// Encode a raw sample into a feature vector in canonical order
    pub fn encode(&self, sample: &RawSample) -> Result<FeatureVector, EncodeError> {
        if let Some(unexpected) = sample
            .columns()
            .find(|c| !self.raw_columns().any(|raw| raw == *c))
        {
            return Err(EncodeError::UnexpectedColumn(unexpected.to_string()));
        }

        let numeric = self
            .numeric_columns
            .iter()
            .map(|column| sample.require(column)?.to_number(column))
            .collect::<Result<Vec<f64>, _>>()?;

        let mut values = self.scaler.transform(&numeric);
        for column in &self.categorical_columns {
            column.encode_into(sample.require(column.name())?, &mut values)?;
        }

        let columns = self.output_columns();
        if values.len() != columns.len() {
            return Err(EncodeError::InvalidLayout(format!(
                "encoding produced {} values for {} columns",
                values.len(),
                columns.len()
            )));
        }

        let position: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let missing: Vec<String> = self
            .canonical_order
            .iter()
            .filter(|c| !position.contains_key(c.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(EncodeError::SchemaMismatch { missing });
        }

        let ordered = self
            .canonical_order
            .iter()
            .map(|c| values[position[c.as_str()]])
            .collect();

        debug!("Encoded sample into {} features", self.canonical_order.len());

        FeatureVector::new(self.canonical_order.clone(), ordered)
    }
}
