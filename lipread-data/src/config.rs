//! Dataset configuration format.

use crate::common::*;

/// Mean pixel value of the grayscale clips.
pub const CLIP_MEAN: f64 = 104.35039287874869;
/// Standard deviation of the grayscale clip pixels.
pub const CLIP_STD: f64 = 39.3184442790886;
/// Mean value of the rasterized landmark heatmaps.
pub const LANDMARK_MEAN: f64 = 0.15735664013013212;
/// Standard deviation of the rasterized landmark heatmaps.
pub const LANDMARK_STD: f64 = 0.2322109507292421;

pub const DEFAULT_FRAME_SIZE: usize = 120;
pub const DEFAULT_CROP_BORDER: usize = 4;
pub const DEFAULT_GAUSSIAN_SPREAD: f64 = 10.0;
pub const DEFAULT_VIDEO_EXTENSION: &str = "mpg";
pub const DEFAULT_LANDMARK_FILE_NAME: &str = "origin.npy";

/// The dataset options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// The directory containing `<class>/<split>/` sub-directories.
    pub root_dir: PathBuf,
    /// The split name, such as `train`, `val` or `test`.
    pub split: String,
    /// The file extension of clip files, without the leading dot.
    #[serde(default = "default_video_extension")]
    pub video_extension: String,
    /// If set, crop at random offsets and flip samples horizontally.
    #[serde(default)]
    pub augment: bool,
    #[serde(default)]
    pub landmark: LandmarkConfig,
    /// Frames are resized to `frame_size` x `frame_size` after decoding.
    #[serde(default = "default_frame_size")]
    pub frame_size: NonZeroUsize,
    /// The number of pixels removed from each side of every frame.
    #[serde(default = "default_crop_border")]
    pub crop_border: usize,
    #[serde(default = "Normalization::clip")]
    pub clip_normalization: Normalization,
}

impl DatasetConfig {
    /// Create a configuration with default options.
    pub fn new(root_dir: impl AsRef<Path>, split: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_owned(),
            split: split.into(),
            video_extension: default_video_extension(),
            augment: false,
            landmark: LandmarkConfig::default(),
            frame_size: default_frame_size(),
            crop_border: default_crop_border(),
            clip_normalization: Normalization::clip(),
        }
    }

    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let frame_size = self.frame_size.get();
        ensure!(
            self.crop_border * 2 < frame_size,
            "crop_border {} leaves nothing of a {}x{} frame",
            self.crop_border,
            frame_size,
            frame_size
        );
        ensure!(!self.split.is_empty(), "split must not be empty");
        ensure!(
            !self.video_extension.is_empty() && !self.video_extension.starts_with('.'),
            "video_extension must be a non-empty extension without the leading dot"
        );
        self.clip_normalization.validate()?;
        self.landmark.validate()?;
        Ok(())
    }

    /// The side length of output frames after cropping.
    pub fn output_size(&self) -> usize {
        self.frame_size.get() - self.crop_border * 2
    }
}

/// Landmark heatmap options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkConfig {
    #[serde(default)]
    pub mode: LandmarkMode,
    /// The landmark array name inside the per-clip directory.
    #[serde(default = "default_landmark_file_name")]
    pub file_name: String,
    /// The full-width-half-maximum of the Gaussian drawn at each landmark.
    #[serde(default = "default_gaussian_spread")]
    pub spread: R64,
    #[serde(default = "Normalization::landmark")]
    pub normalization: Normalization,
}

impl LandmarkConfig {
    pub fn new(mode: LandmarkMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.spread > 0.0, "landmark spread must be positive");
        ensure!(
            !self.file_name.is_empty(),
            "landmark file_name must not be empty"
        );
        self.normalization.validate()?;
        Ok(())
    }
}

impl Default for LandmarkConfig {
    fn default() -> Self {
        Self {
            mode: LandmarkMode::default(),
            file_name: default_landmark_file_name(),
            spread: default_gaussian_spread(),
            normalization: Normalization::landmark(),
        }
    }
}

/// How the landmark heatmap is delivered along with the clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LandmarkMode {
    /// Landmarks are not loaded.
    Disabled,
    /// The heatmap is concatenated to the clip as a second channel.
    Fused,
    /// The heatmap is returned next to the clip.
    Separate,
}

impl LandmarkMode {
    pub fn from_flags(landmark: bool, separate: bool) -> Self {
        match (landmark, separate) {
            (false, _) => Self::Disabled,
            (true, false) => Self::Fused,
            (true, true) => Self::Separate,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// The number of channels of the clip tensor in this mode.
    pub fn clip_channels(&self) -> usize {
        match self {
            Self::Fused => 2,
            Self::Disabled | Self::Separate => 1,
        }
    }
}

impl Default for LandmarkMode {
    fn default() -> Self {
        Self::Disabled
    }
}

/// The affine normalization `(value - mean) / std`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: R64,
    pub std: R64,
}

impl Normalization {
    pub fn new(mean: f64, std: f64) -> Result<Self> {
        let normalization = Self {
            mean: R64::try_new(mean).ok_or_else(|| format_err!("mean must be finite"))?,
            std: R64::try_new(std).ok_or_else(|| format_err!("std must be finite"))?,
        };
        normalization.validate()?;
        Ok(normalization)
    }

    /// The statistics of grayscale clip pixels.
    pub fn clip() -> Self {
        Self {
            mean: r64(CLIP_MEAN),
            std: r64(CLIP_STD),
        }
    }

    /// The statistics of landmark heatmaps.
    pub fn landmark() -> Self {
        Self {
            mean: r64(LANDMARK_MEAN),
            std: r64(LANDMARK_STD),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.std > 0.0,
            "normalization std must be positive, but get {}",
            self.std
        );
        Ok(())
    }

    pub fn apply(&self, tensor: &Tensor) -> Tensor {
        (tensor - self.mean.raw()) / self.std.raw()
    }

    pub fn invert(&self, tensor: &Tensor) -> Tensor {
        tensor * self.std.raw() + self.mean.raw()
    }
}

fn default_video_extension() -> String {
    DEFAULT_VIDEO_EXTENSION.to_owned()
}

fn default_landmark_file_name() -> String {
    DEFAULT_LANDMARK_FILE_NAME.to_owned()
}

fn default_frame_size() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_FRAME_SIZE).unwrap()
}

fn default_crop_border() -> usize {
    DEFAULT_CROP_BORDER
}

fn default_gaussian_spread() -> R64 {
    r64(DEFAULT_GAUSSIAN_SPREAD)
}
