//! Raw Sample Representation

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EncodeError;

/// A single user-entered value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Whole-number input; listed first so JSON integers stay integers
    Integer(i64),
    /// Numeric input (sliders, number fields)
    Number(f64),
    /// Free-form text input (select boxes, text fields)
    Text(String),
}

impl RawValue {
    /// Coerce to a finite float for a numeric column
    pub fn to_number(&self, column: &str) -> Result<f64, EncodeError> {
        let parsed = match self {
            RawValue::Integer(i) => Some(*i as f64),
            RawValue::Number(v) => Some(*v),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
        };

        match parsed {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(EncodeError::InvalidNumeric {
                column: column.to_string(),
                value: self.to_string(),
            }),
        }
    }

    /// Category spelling used to look the value up in a fitted vocabulary.
    ///
    /// Integers render bare (`0`), floats in shortest round-trip form with a
    /// mandatory fraction or exponent (`1.0`, `0.5`, `1e+16`, `1e-05`),
    /// matching how numeric categories are spelled in the fitted vocabularies.
    pub fn to_category(&self) -> Cow<'_, str> {
        match self {
            RawValue::Text(s) => Cow::Borrowed(s.as_str()),
            RawValue::Integer(i) => Cow::Owned(i.to_string()),
            RawValue::Number(v) => Cow::Owned(float_category(*v)),
        }
    }
}

/// Shortest round-trip spelling of a float category.
///
/// Positional between `1e-4` and `1e16`, scientific with a signed two-digit
/// exponent outside that range.
fn float_category(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "-1.25e-7"
    let sci = format!("{:e}", v.abs());
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let sign = if v.is_sign_negative() { "-" } else { "" };

    if !(-4..16).contains(&exponent) {
        let mantissa = match digits.split_at(1) {
            (head, "") => head.to_string(),
            (head, tail) => format!("{head}.{tail}"),
        };
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        return format!("{sign}{mantissa}e{exp_sign}{:02}", exponent.abs());
    }

    let body = if exponent < 0 {
        format!("0.{}{}", "0".repeat((-exponent - 1) as usize), digits)
    } else {
        let int_len = exponent as usize + 1;
        if digits.len() <= int_len {
            format!("{}{}.0", digits, "0".repeat(int_len - digits.len()))
        } else {
            format!("{}.{}", &digits[..int_len], &digits[int_len..])
        }
    };
    format!("{sign}{body}")
}

impl std::fmt::Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawValue::Integer(i) => write!(f, "{i}"),
            RawValue::Number(v) => write!(f, "{v}"),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Integer(v)
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        RawValue::Integer(i64::from(v))
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

/// One row of raw input keyed by raw column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSample {
    values: BTreeMap<String, RawValue>,
}

impl RawSample {
    /// Create an empty sample
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, column: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Set a column value, returning the previous one
    pub fn insert(
        &mut self,
        column: impl Into<String>,
        value: impl Into<RawValue>,
    ) -> Option<RawValue> {
        self.values.insert(column.into(), value.into())
    }

    /// Look up a column value
    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.values.get(column)
    }

    /// Look up a column value, failing if it is absent
    pub fn require(&self, column: &str) -> Result<&RawValue, EncodeError> {
        self.get(column)
            .ok_or_else(|| EncodeError::MissingColumn(column.to_string()))
    }

    /// Column names present in the sample
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RawSample
where
    K: Into<String>,
    V: Into<RawValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut sample = RawSample::new();
        for (k, v) in iter {
            sample.insert(k, v);
        }
        sample
    }
}
