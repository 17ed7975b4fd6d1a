//! Feature Encoding
//!
//! Turns a raw, user-entered row into the exact scaled and encoded feature
//! vector a pre-trained model expects, in the model's canonical column order.

mod categorical;
mod error;
mod pipeline;
mod sample;
mod scaler;

pub use categorical::{CategoricalColumn, CategoricalEncoding};
pub use error::EncodeError;
pub use pipeline::{FeaturePipeline, FeatureVector};
pub use sample::{RawSample, RawValue};
pub use scaler::NumericScaler;
