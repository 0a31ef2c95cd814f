use crate::common::*;

/// The generic dataset trait.
pub trait GenericDataset
where
    Self: Debug + Send + Sync,
{
    /// The number of channels of the clip tensor.
    fn input_channels(&self) -> usize;

    /// The list of class names of the dataset, ordered by class id.
    fn classes(&self) -> &IndexSet<String>;
}

/// The dataset that can be random accessed.
pub trait RandomAccessDataset
where
    Self: GenericDataset,
{
    type Record;

    /// Get number of records in the dataset.
    fn num_records(&self) -> usize;

    /// Get the nth record in the dataset.
    fn nth(&self, index: usize) -> Result<Self::Record>;
}

/// The sequence of clips that can be random accessed.
///
/// Clips are `(channels, frames, height, width)` tensors. Implementations
/// produce a clip on every call and keep no decoded state.
pub trait ClipSource
where
    Self: Debug + Send + Sync,
{
    /// Get the number of clips.
    fn num_clips(&self) -> usize;

    /// Get the file path the nth clip is read from.
    fn clip_path(&self, index: usize) -> Result<&Path>;

    /// Produce the nth clip.
    fn clip(&self, index: usize) -> Result<Tensor>;
}
