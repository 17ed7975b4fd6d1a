//! Categorical Column Encoding

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EncodeError;
use crate::sample::RawValue;

/// Fitted mapping from a category to output columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CategoricalEncoding {
    /// One output column per category, `1.0` on the observed one
    OneHot { categories: Vec<String> },
    /// Single output column holding the category's index in the vocabulary
    Ordinal { categories: Vec<String> },
    /// Single output column, `1.0` when the value is one of `truthy`
    Flag { truthy: Vec<String> },
}

/// A categorical raw column with its fitted encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    name: String,
    encoding: CategoricalEncoding,
    /// Category substituted for values outside the vocabulary
    fallback: Option<String>,
}

impl CategoricalColumn {
    pub fn new(name: impl Into<String>, encoding: CategoricalEncoding) -> Self {
        Self {
            name: name.into(),
            encoding,
            fallback: None,
        }
    }

    pub fn one_hot<S: Into<String>>(
        name: impl Into<String>,
        categories: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(
            name,
            CategoricalEncoding::OneHot {
                categories: categories.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn ordinal<S: Into<String>>(
        name: impl Into<String>,
        categories: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(
            name,
            CategoricalEncoding::Ordinal {
                categories: categories.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn flag<S: Into<String>>(
        name: impl Into<String>,
        truthy: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(
            name,
            CategoricalEncoding::Flag {
                truthy: truthy.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Set the category used for unseen values
    pub fn with_fallback(mut self, category: impl Into<String>) -> Self {
        self.fallback = Some(category.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn encoding(&self) -> &CategoricalEncoding {
        &self.encoding
    }

    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    /// Fitted vocabulary, if the encoding has one
    pub fn vocabulary(&self) -> Option<&[String]> {
        match &self.encoding {
            CategoricalEncoding::OneHot { categories }
            | CategoricalEncoding::Ordinal { categories } => Some(categories),
            CategoricalEncoding::Flag { .. } => None,
        }
    }

    /// Names of the columns this field encodes into, in output order
    pub fn output_columns(&self) -> Vec<String> {
        match &self.encoding {
            CategoricalEncoding::OneHot { categories } => categories
                .iter()
                .map(|c| format!("{}_{}", self.name, c))
                .collect(),
            CategoricalEncoding::Ordinal { .. } | CategoricalEncoding::Flag { .. } => {
                vec![self.name.clone()]
            }
        }
    }

    /// Check the fitted vocabulary and fallback are usable
    pub fn validate(&self) -> Result<(), EncodeError> {
        let invalid = |msg: String| Err(EncodeError::InvalidLayout(msg));

        match self.vocabulary() {
            Some(categories) => {
                if categories.is_empty() {
                    return invalid(format!("column {} has an empty vocabulary", self.name));
                }
                let mut seen = HashSet::with_capacity(categories.len());
                if let Some(dup) = categories.iter().find(|c| !seen.insert(c.as_str())) {
                    return invalid(format!(
                        "column {} lists category {:?} twice",
                        self.name, dup
                    ));
                }
                if let Some(fallback) = &self.fallback {
                    if !categories.contains(fallback) {
                        return invalid(format!(
                            "fallback {:?} for column {} is not in its vocabulary",
                            fallback, self.name
                        ));
                    }
                }
            }
            None => {
                if self.fallback.is_some() {
                    return invalid(format!(
                        "flag column {} cannot declare a fallback category",
                        self.name
                    ));
                }
            }
        }
        Ok(())
    }

    /// Map an observed category onto the vocabulary, applying the fallback
    fn resolve(&self, categories: &[String], value: &str) -> Result<usize, EncodeError> {
        if let Some(idx) = categories.iter().position(|c| c == value) {
            return Ok(idx);
        }

        let fallback = self
            .fallback
            .as_deref()
            .ok_or_else(|| EncodeError::UnknownCategory {
                column: self.name.clone(),
                value: value.to_string(),
            })?;

        debug!(
            "Column {}: unseen category {:?} mapped to fallback {:?}",
            self.name, value, fallback
        );

        categories
            .iter()
            .position(|c| c == fallback)
            .ok_or_else(|| EncodeError::UnknownCategory {
                column: self.name.clone(),
                value: value.to_string(),
            })
    }

    /// Encode one value, appending the output columns to `out`
    pub fn encode_into(&self, value: &RawValue, out: &mut Vec<f64>) -> Result<(), EncodeError> {
        let category = value.to_category();

        match &self.encoding {
            CategoricalEncoding::OneHot { categories } => {
                let hot = self.resolve(categories, &category)?;
                out.extend((0..categories.len()).map(|i| if i == hot { 1.0 } else { 0.0 }));
            }
            CategoricalEncoding::Ordinal { categories } => {
                let code = self.resolve(categories, &category)?;
                out.push(code as f64);
            }
            CategoricalEncoding::Flag { truthy } => {
                let set = truthy.iter().any(|t| t.as_str() == category.as_ref());
                out.push(if set { 1.0 } else { 0.0 });
            }
        }
        Ok(())
    }
}
