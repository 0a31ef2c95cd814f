//! Error taxonomy of the preprocessing pipeline.
//!
//! Fallible functions in this crate return [anyhow::Result]. Failures that a
//! caller may want to tell apart are raised as a [DatasetError] and can be
//! recovered with `error.downcast_ref::<DatasetError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    /// The video file is missing, corrupt, unreadable or has no frames.
    #[error("failed to decode video '{path}': {reason}")]
    Decode { path: PathBuf, reason: String },

    /// Landmark mode is enabled but the companion array does not exist.
    #[error("landmark file '{path}' does not exist")]
    MissingLandmarkFile { path: PathBuf },

    /// The landmark array is not a readable `.npy` file of a supported type.
    #[error("invalid landmark file '{path}': {reason}")]
    LandmarkFormat { path: PathBuf, reason: String },

    /// Two tensors that must agree in shape do not.
    #[error("shape mismatch in '{path}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        path: PathBuf,
        expected: Vec<i64>,
        actual: Vec<i64>,
    },

    /// The directory scan found no clip files.
    #[error("no clip files match '{pattern}'")]
    EmptyDataset { pattern: String },

    #[error("index {index} is out of bounds for dataset of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("label '{label}' is not in the label index")]
    UnknownLabel { label: String },
}
