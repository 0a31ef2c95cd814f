//! Data preprocessing building blocks.

pub mod spatial_crop;

pub use spatial_crop::*;
