//! Normalization statistics of a dataset.

use crate::{
    common::*,
    config::Normalization,
    dataset::{
        decode_video, landmark_path, rasterize_landmarks, LandmarkSequence, LipreadingDataset,
    },
};

/// Running mean and variance of tensor elements.
///
/// Partial results are merged with the pairwise update of Chan et al., which
/// keeps the second moment stable over millions of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every element of the tensor.
    pub fn update(&mut self, tensor: &Tensor) {
        let count = tensor.numel() as u64;
        if count == 0 {
            return;
        }

        let (mean, m2) = tch::no_grad(|| {
            let values = tensor.to_kind(Kind::Double);
            let mean = values.mean(Kind::Double);
            let diff = &values - &mean;
            let m2 = (&diff * &diff).sum(Kind::Double);
            (mean.double_value(&[]), m2.double_value(&[]))
        });

        self.merge(&Self { count, mean, m2 });
    }

    pub fn merge(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }

        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        let m2 = self.m2
            + other.m2
            + delta * delta * self.count as f64 * other.count as f64 / count as f64;

        *self = Self { count, mean, m2 };
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.mean)
    }

    /// The population standard deviation.
    pub fn std(&self) -> Option<f64> {
        (self.count > 0).then(|| (self.m2 / self.count as f64).sqrt())
    }

    pub fn normalization(&self) -> Result<Normalization> {
        let mean = self
            .mean()
            .ok_or_else(|| format_err!("no values were accumulated"))?;
        let std = self
            .std()
            .ok_or_else(|| format_err!("no values were accumulated"))?;
        Normalization::new(mean, std)
    }
}

/// Pixel statistics of the clips and landmark heatmaps of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub num_clips: usize,
    pub clip: RunningStats,
    /// Present if landmarks are enabled in the dataset.
    pub landmark: Option<RunningStats>,
}

/// Accumulate the statistics of raw, uncropped clips and heatmaps.
///
/// Only the first `limit` clips are visited if `limit` is set.
pub fn compute_dataset_stats(
    dataset: &LipreadingDataset,
    limit: Option<usize>,
) -> Result<DatasetStats> {
    let config = dataset.config();
    let frame_size = config.frame_size.get() as i64;
    let landmark_enabled = config.landmark.mode.is_enabled();
    let num_clips = limit.map_or(dataset.len(), |limit| limit.min(dataset.len()));

    let mut clip_stats = RunningStats::new();
    let mut landmark_stats = landmark_enabled.then(RunningStats::new);

    for (index, path) in dataset.files()[..num_clips].iter().enumerate() {
        let frames = decode_video(path, frame_size)?;
        clip_stats.update(&frames);

        if let Some(landmark_stats) = &mut landmark_stats {
            let landmark_file = landmark_path(path, &config.landmark.file_name);
            let landmarks = LandmarkSequence::load(&landmark_file)?;
            let heatmap =
                rasterize_landmarks(&landmarks, frame_size, config.landmark.spread.raw())?;
            landmark_stats.update(&heatmap);
        }

        if (index + 1) % 1000 == 0 {
            info!("processed {}/{} clips", index + 1, num_clips);
        }
    }

    Ok(DatasetStats {
        num_clips,
        clip: clip_stats,
        landmark: landmark_stats,
    })
}
