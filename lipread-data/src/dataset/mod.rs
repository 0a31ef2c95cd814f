//! Dataset processing toolkit.

mod dataset_;
mod label;
mod landmark;
mod lipreading;
mod video;

pub use dataset_::*;
pub use label::*;
pub use landmark::*;
pub use lipreading::*;
pub use video::*;
