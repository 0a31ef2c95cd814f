use super::*;
use crate::{
    common::*,
    config::{DatasetConfig, LandmarkConfig, LandmarkMode},
    error::DatasetError,
    processor::{SpatialCrop, SpatialCropInit},
};

/// A preprocessed clip with its class id.
#[derive(Debug)]
pub struct Sample {
    /// `(channels, frames, size, size)` clip in single precision.
    pub clip: Tensor,
    /// The class id of the clip.
    pub label: usize,
    /// `(1, frames, size, size)` landmark heatmap, present in
    /// [LandmarkMode::Separate] mode.
    pub landmark: Option<Tensor>,
}

/// The lip reading dataset.
///
/// Clip files are discovered at `<root_dir>/*/<split>/*.<video_extension>`.
/// Samples are decoded on every access and nothing is cached.
#[derive(Debug)]
pub struct LipreadingDataset {
    config: Arc<DatasetConfig>,
    video: LandmarkVideo<VideoClips>,
    labels: Vec<String>,
    label_index: LabelIndex,
    crop: SpatialCrop,
}

impl LipreadingDataset {
    /// Create a dataset from a root directory, a split name and loader flags.
    pub fn new(
        root_dir: impl AsRef<Path>,
        split: &str,
        augment: bool,
        landmark: bool,
        landmark_separate: bool,
    ) -> Result<Self> {
        let config = DatasetConfig {
            augment,
            landmark: LandmarkConfig::new(LandmarkMode::from_flags(landmark, landmark_separate)),
            ..DatasetConfig::new(root_dir, split)
        };
        Self::from_config(config)
    }

    pub fn from_config(config: impl Into<Arc<DatasetConfig>>) -> Result<Self> {
        let config = config.into();
        config.validate()?;

        let files = scan_clip_files(&config.root_dir, &config.split, &config.video_extension)?;
        info!("{} set: {}", config.split, files.len());

        let labels = labels_from_paths(&files)?;
        let label_index = LabelIndex::new(&labels);
        debug!(
            "{} set has {} classes",
            config.split,
            label_index.num_classes()
        );

        let clips = VideoClips::new(files, config.frame_size.get(), config.clip_normalization)?;
        let video = LandmarkVideo::new(clips, &config.landmark)?;
        let crop = SpatialCropInit {
            frame_size: config.frame_size.get(),
            border: config.crop_border,
            random_offset: config.augment,
            horizontal_flip: config.augment,
        }
        .build()?;

        Ok(Self {
            config,
            video,
            labels,
            label_index,
            crop,
        })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.video.len()
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_empty()
    }

    /// The sorted list of clip files.
    pub fn files(&self) -> &[PathBuf] {
        self.video.source().files()
    }

    /// The label token of every clip, in file order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label_index(&self) -> &LabelIndex {
        &self.label_index
    }

    pub fn landmark_mode(&self) -> LandmarkMode {
        self.video.mode()
    }

    /// Decode, rasterize and crop the nth sample.
    pub fn get(&self, index: usize) -> Result<Sample> {
        let len = self.len();
        let label = self
            .labels
            .get(index)
            .ok_or(DatasetError::IndexOutOfBounds { index, len })?;
        let label = self.label_index.f_id(label)?;

        let ClipRecord { clip, landmark } = self.video.get(index).with_context(|| {
            format!(
                "failed to load sample {} from '{}'",
                index,
                self.files()[index].display()
            )
        })?;

        // the clip and its heatmap share one crop window
        let sample = tch::no_grad(|| -> Result<_> {
            let sample = match landmark {
                Some(landmark) => match self.crop.forward(&[&clip, &landmark])?.as_slice() {
                    [clip, landmark] => Sample {
                        clip: clip.to_kind(Kind::Float),
                        label,
                        landmark: Some(landmark.to_kind(Kind::Float)),
                    },
                    _ => unreachable!(),
                },
                None => match self.crop.forward(&[&clip])?.as_slice() {
                    [clip] => Sample {
                        clip: clip.to_kind(Kind::Float),
                        label,
                        landmark: None,
                    },
                    _ => unreachable!(),
                },
            };
            Ok(sample)
        })?;

        Ok(sample)
    }

    /// Iterate over all samples in file order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Sample>> + '_ {
        (0..self.len()).map(move |index| self.get(index))
    }
}

impl GenericDataset for LipreadingDataset {
    fn input_channels(&self) -> usize {
        self.landmark_mode().clip_channels()
    }

    fn classes(&self) -> &IndexSet<String> {
        self.label_index.classes()
    }
}

impl RandomAccessDataset for LipreadingDataset {
    type Record = Sample;

    fn num_records(&self) -> usize {
        self.len()
    }

    fn nth(&self, index: usize) -> Result<Sample> {
        self.get(index)
    }
}

/// List `<root_dir>/*/<split>/*.<extension>` files in lexicographic order.
pub fn scan_clip_files(
    root_dir: impl AsRef<Path>,
    split: &str,
    extension: &str,
) -> Result<Vec<PathBuf>> {
    let root_dir = root_dir.as_ref();
    let pattern = {
        let escaped_root = glob::Pattern::escape(
            root_dir
                .to_str()
                .ok_or_else(|| format_err!("invalid root directory '{}'", root_dir.display()))?,
        );
        let escaped_split = glob::Pattern::escape(split);
        let escaped_ext = glob::Pattern::escape(extension);
        format!("{}/*/{}/*.{}", escaped_root, escaped_split, escaped_ext)
    };

    // hidden files such as `._ABOUT_00001.mpg` are not clips
    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..glob::MatchOptions::new()
    };
    let mut files: Vec<PathBuf> = glob::glob_with(&pattern, options)?
        .map(|result| -> Result<_> {
            let path = result?;
            Ok(path.is_file().then(|| path))
        })
        .filter_map(|result| result.transpose())
        .try_collect()?;
    // order by the whole path string rather than component-wise
    files.sort_by(|lhs, rhs| lhs.as_os_str().cmp(rhs.as_os_str()));

    if files.is_empty() {
        return Err(DatasetError::EmptyDataset { pattern }.into());
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) -> Result<()> {
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(path, b"")?;
        Ok(())
    }

    #[test]
    fn scan_sorts_and_filters() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        touch(&root.join("WORLD/train/WORLD_00002.mpg"))?;
        touch(&root.join("ABOUT/train/ABOUT_00010.mpg"))?;
        touch(&root.join("ABOUT/train/ABOUT_00002.mpg"))?;
        touch(&root.join("ABOUT/val/ABOUT_00001.mpg"))?;
        touch(&root.join("ABOUT/train/ABOUT_00003.txt"))?;
        touch(&root.join("ABOUT/train/._ABOUT_00002.mpg"))?;
        std::fs::create_dir_all(root.join("ABOUT/train/ABOUT_00002"))?;

        let files = scan_clip_files(root, "train", "mpg")?;
        let names: Vec<_> = files
            .iter()
            .map(|path| path.strip_prefix(root).unwrap().to_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("ABOUT/train/ABOUT_00002.mpg"),
                PathBuf::from("ABOUT/train/ABOUT_00010.mpg"),
                PathBuf::from("WORLD/train/WORLD_00002.mpg"),
            ]
        );
        Ok(())
    }

    #[test]
    fn scan_orders_by_path_string() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        touch(&root.join("A/train/A_00001.mpg"))?;
        touch(&root.join("A-B/train/A-B_00001.mpg"))?;
        touch(&root.join("A.C/train/A.C_00001.mpg"))?;

        // '-' and '.' sort before '/'
        let files = scan_clip_files(root, "train", "mpg")?;
        let names: Vec<_> = files
            .iter()
            .map(|path| path.strip_prefix(root).unwrap().to_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("A-B/train/A-B_00001.mpg"),
                PathBuf::from("A.C/train/A.C_00001.mpg"),
                PathBuf::from("A/train/A_00001.mpg"),
            ]
        );

        let labels = labels_from_paths(&files)?;
        assert_eq!(labels, vec!["A-B", "A.C", "A"]);
        Ok(())
    }

    #[test]
    fn hidden_files_are_not_clips() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        touch(&root.join("ABOUT/train/ABOUT_00001.mpg"))?;
        touch(&root.join("ABOUT/train/._ABOUT_00001.mpg"))?;

        let dataset = LipreadingDataset::new(root, "train", false, false, false)?;
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.labels(), &["ABOUT"]);
        assert_eq!(dataset.label_index().id("ABOUT"), Some(0));
        Ok(())
    }

    #[test]
    fn empty_scan_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(&dir.path().join("ABOUT/val/ABOUT_00001.mpg"))?;

        let err = LipreadingDataset::new(dir.path(), "train", false, false, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::EmptyDataset { .. })
        ));
        Ok(())
    }

    #[test]
    fn construction_does_not_decode() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        touch(&root.join("b/train/b_1.mpg"))?;
        touch(&root.join("a/train/a_2.mpg"))?;
        touch(&root.join("a/train/a_3.mpg"))?;

        let dataset = LipreadingDataset::new(root, "train", false, true, true)?;
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.num_records(), 3);
        assert_eq!(dataset.labels(), &["a", "a", "b"]);
        assert_eq!(dataset.classes().len(), 2);
        assert_eq!(dataset.label_index().id("b"), Some(1));
        assert_eq!(dataset.landmark_mode(), LandmarkMode::Separate);
        assert_eq!(dataset.input_channels(), 1);

        // the empty files only fail once they are accessed
        assert!(dataset.get(0).is_err());
        let err = dataset.get(3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::IndexOutOfBounds { index: 3, len: 3 })
        ));
        Ok(())
    }
}
