//! Preprocessing and dataset indexing for lip-reading video clips.
//!
//! The crate turns `<root>/<class>/<split>/<clip>.mpg` files and their
//! companion landmark arrays into fixed-shape tensors. See [dataset] for the
//! entry point.

mod common;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gaussian;
pub mod processor;
pub mod stats;
pub mod tensor;

pub use config::{DatasetConfig, LandmarkConfig, LandmarkMode, Normalization};
pub use dataset::{LipreadingDataset, Sample};
pub use error::DatasetError;
