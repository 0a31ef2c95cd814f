use super::*;
use crate::{
    common::*,
    config::{LandmarkConfig, LandmarkMode, Normalization},
    error::DatasetError,
    gaussian::make_gaussian_sum,
    tensor::TensorExt as _,
};
use ndarray_npy::ReadNpyExt;

/// A landmark coordinate in pixels of the source video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkPoint {
    pub x: f64,
    pub y: f64,
}

impl LandmarkPoint {
    /// Tell if the point is the `(0, 0)` placeholder of an undetected landmark.
    pub fn is_missing(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// Map the point to `[column, row]` on the resized `frame_size` grid.
    ///
    /// Source videos have twice the resolution of the resized frames, so the
    /// coordinates are halved, truncated and clamped to the grid.
    pub fn grid_position(&self, frame_size: i64) -> [f64; 2] {
        let max = (frame_size - 1) as f64;
        let map = |value: f64| (value / 2.0).trunc().max(0.0).min(max);
        [map(self.x), map(self.y)]
    }
}

/// The per-frame landmark points of a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSequence {
    /// `(frames, points, 2)` array of `(x, y)` pairs.
    points: Array3<f64>,
}

impl LandmarkSequence {
    pub fn new(points: Array3<f64>) -> Result<Self> {
        let shape = points.shape();
        ensure!(
            shape[2] == 2,
            "expect (frames, points, 2) landmarks, but get {:?}",
            shape
        );
        Ok(Self { points })
    }

    /// Load a `.npy` array of `(frames, points, 2)` coordinates.
    ///
    /// Arrays of `f64`, `f32`, `i64` and `i32` elements are accepted.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format_error = |reason: String| DatasetError::LandmarkFormat {
            path: path.to_owned(),
            reason,
        };

        if !path.is_file() {
            return Err(DatasetError::MissingLandmarkFile {
                path: path.to_owned(),
            }
            .into());
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read landmark file '{}'", path.display()))?;

        let array: ArrayD<f64> = ArrayD::<f64>::read_npy(bytes.as_slice())
            .or_else(|_| ArrayD::<f32>::read_npy(bytes.as_slice()).map(|array| array.mapv(f64::from)))
            .or_else(|_| {
                ArrayD::<i64>::read_npy(bytes.as_slice()).map(|array| array.mapv(|val| val as f64))
            })
            .or_else(|_| ArrayD::<i32>::read_npy(bytes.as_slice()).map(|array| array.mapv(f64::from)))
            .map_err(|err| format_error(err.to_string()))?;

        let shape = array.shape().to_vec();
        let points = array
            .into_dimensionality::<Ix3>()
            .map_err(|_| format_error(format!("expect a 3-dimensional array, but get shape {:?}", shape)))?;
        if points.shape()[2] != 2 {
            return Err(format_error(format!(
                "expect (frames, points, 2) coordinates, but get shape {:?}",
                shape
            ))
            .into());
        }

        Ok(Self { points })
    }

    pub fn num_frames(&self) -> usize {
        self.points.shape()[0]
    }

    pub fn num_points(&self) -> usize {
        self.points.shape()[1]
    }

    pub fn points(&self) -> &Array3<f64> {
        &self.points
    }

    /// Iterate over the landmark points of a frame.
    pub fn f_frame(&self, index: usize) -> Result<impl Iterator<Item = LandmarkPoint> + '_> {
        let n_frames = self.num_frames();
        ensure!(
            index < n_frames,
            "frame index {} is out of bounds for {} frames",
            index,
            n_frames
        );

        let points = self
            .points
            .slice(s![index, .., ..])
            .outer_iter()
            .map(|point| LandmarkPoint {
                x: point[0],
                y: point[1],
            })
            .collect_vec();
        Ok(points.into_iter())
    }

    /// Iterate over the non-missing landmark points of a frame.
    pub fn f_valid_points(
        &self,
        index: usize,
    ) -> Result<impl Iterator<Item = LandmarkPoint> + '_> {
        Ok(self.f_frame(index)?.filter(|point| !point.is_missing()))
    }
}

/// Compute the landmark path of a clip.
///
/// The landmark array of `<dir>/<clip-id>.<ext>` is stored at
/// `<dir>/<clip-id>/<file_name>`.
pub fn landmark_path(clip_path: impl AsRef<Path>, file_name: &str) -> PathBuf {
    clip_path.as_ref().with_extension("").join(file_name)
}

/// Draw a Gaussian blob at every valid landmark of every frame.
///
/// The output is a `(1, frames, frame_size, frame_size)` tensor in double
/// precision. Frames without valid points are left zero.
pub fn rasterize_landmarks(
    landmarks: &LandmarkSequence,
    frame_size: i64,
    spread: f64,
) -> Result<Tensor> {
    let n_frames = landmarks.num_frames();

    if n_frames == 0 {
        return Ok(Tensor::zeros(
            &[1, 0, frame_size, frame_size],
            (Kind::Double, Device::Cpu),
        ));
    }

    let frames: Vec<_> = (0..n_frames)
        .map(|index| {
            let centers: Vec<_> = landmarks
                .f_valid_points(index)?
                .map(|point| point.grid_position(frame_size))
                .collect();
            if centers.is_empty() {
                debug!("frame {} has no valid landmarks", index);
            }
            make_gaussian_sum([frame_size, frame_size], spread, &centers, Kind::Double)
        })
        .try_collect()?;

    Ok(Tensor::stack(&frames, 0).view([1, n_frames as i64, frame_size, frame_size]))
}

/// A decoded clip with its optional landmark heatmap.
#[derive(Debug)]
pub struct ClipRecord {
    /// `(channels, frames, height, width)` clip. It has two channels in
    /// [LandmarkMode::Fused] mode.
    pub clip: Tensor,
    /// `(1, frames, height, width)` heatmap, present in
    /// [LandmarkMode::Separate] mode.
    pub landmark: Option<Tensor>,
}

/// Attaches landmark heatmaps to the clips of a [ClipSource].
#[derive(Debug, Clone)]
pub struct LandmarkVideo<S = VideoClips>
where
    S: ClipSource,
{
    source: S,
    mode: LandmarkMode,
    file_name: String,
    spread: f64,
    normalization: Normalization,
}

impl<S> LandmarkVideo<S>
where
    S: ClipSource,
{
    pub fn new(source: S, config: &LandmarkConfig) -> Result<Self> {
        config.validate()?;
        let LandmarkConfig {
            mode,
            ref file_name,
            spread,
            normalization,
        } = *config;

        Ok(Self {
            source,
            mode,
            file_name: file_name.clone(),
            spread: spread.raw(),
            normalization,
        })
    }

    pub fn mode(&self) -> LandmarkMode {
        self.mode
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.source.num_clips()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The landmark file of the nth clip.
    pub fn landmark_path(&self, index: usize) -> Result<PathBuf> {
        let clip_path = self.source.clip_path(index)?;
        Ok(landmark_path(clip_path, &self.file_name))
    }

    pub fn get(&self, index: usize) -> Result<ClipRecord> {
        let record = match self.mode {
            LandmarkMode::Disabled => ClipRecord {
                clip: self.source.clip(index)?,
                landmark: None,
            },
            LandmarkMode::Fused => {
                let (clip, heatmap) = self.clip_with_heatmap(index)?;
                ClipRecord {
                    clip: Tensor::cat(&[clip, heatmap], 0),
                    landmark: None,
                }
            }
            LandmarkMode::Separate => {
                let (clip, heatmap) = self.clip_with_heatmap(index)?;
                ClipRecord {
                    clip,
                    landmark: Some(heatmap),
                }
            }
        };
        Ok(record)
    }

    /// Load the nth clip and its normalized heatmap in the kind of the clip.
    fn clip_with_heatmap(&self, index: usize) -> Result<(Tensor, Tensor)> {
        // a missing landmark file is reported before the video is decoded
        let path = self.landmark_path(index)?;
        let landmarks = LandmarkSequence::load(&path)?;
        let clip = self.source.clip(index)?;

        let (_channels, n_frames, height, width) = clip.f_clip_size()?;
        ensure!(
            height == width,
            "expect square frames, but get {}x{}",
            height,
            width
        );
        let n_points = landmarks.num_points() as i64;
        if landmarks.num_frames() as i64 != n_frames {
            return Err(DatasetError::ShapeMismatch {
                path,
                expected: vec![n_frames, n_points, 2],
                actual: vec![landmarks.num_frames() as i64, n_points, 2],
            }
            .into());
        }

        let heatmap = tch::no_grad(|| -> Result<_> {
            let heatmap = rasterize_landmarks(&landmarks, height, self.spread)?;
            Ok(self.normalization.apply(&heatmap).to_kind(clip.kind()))
        })?;
        Ok((clip, heatmap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LANDMARK_MEAN;
    use approx::assert_abs_diff_eq;
    use ndarray::Array;
    use ndarray_npy::WriteNpyExt;

    /// Zero clips at fixed paths.
    #[derive(Debug)]
    struct ZeroClips {
        paths: Vec<PathBuf>,
        frames: i64,
        size: i64,
    }

    impl ClipSource for ZeroClips {
        fn num_clips(&self) -> usize {
            self.paths.len()
        }

        fn clip_path(&self, index: usize) -> Result<&Path> {
            let len = self.paths.len();
            Ok(self
                .paths
                .get(index)
                .ok_or(DatasetError::IndexOutOfBounds { index, len })?)
        }

        fn clip(&self, index: usize) -> Result<Tensor> {
            self.clip_path(index)?;
            Ok(Tensor::zeros(
                &[1, self.frames, self.size, self.size],
                (Kind::Double, Device::Cpu),
            ))
        }
    }

    fn write_landmarks(path: &Path, points: &Array3<f64>) -> Result<()> {
        std::fs::create_dir_all(path.parent().unwrap())?;
        let file = std::fs::File::create(path)?;
        points.write_npy(file)?;
        Ok(())
    }

    /// Three frames with two points each. The second frame is undetected.
    fn sample_points() -> Array3<f64> {
        Array::from_shape_vec(
            (3, 2, 2),
            vec![
                20.0, 40.0, 100.0, 60.0, // frame 0
                0.0, 0.0, 0.0, 0.0, // frame 1
                500.0, 7.0, 0.0, 0.0, // frame 2
            ],
        )
        .unwrap()
    }

    #[test]
    fn landmark_path_replaces_extension() {
        assert_eq!(
            landmark_path("/data/ABOUT/train/ABOUT_00001.mpg", "origin.npy"),
            Path::new("/data/ABOUT/train/ABOUT_00001/origin.npy")
        );
    }

    #[test]
    fn grid_position_halves_and_clamps() {
        let point = LandmarkPoint { x: 45.0, y: 300.0 };
        assert_eq!(point.grid_position(120), [22.0, 119.0]);
        let point = LandmarkPoint { x: -8.0, y: 239.0 };
        assert_eq!(point.grid_position(120), [0.0, 119.0]);
        assert!(LandmarkPoint { x: 0.0, y: 0.0 }.is_missing());
        assert!(!LandmarkPoint { x: 0.0, y: 3.0 }.is_missing());
    }

    #[test]
    fn missing_points_are_not_drawn() -> Result<()> {
        let landmarks = LandmarkSequence::new(sample_points())?;
        let heatmap = rasterize_landmarks(&landmarks, 120, 10.0)?;
        assert_eq!(heatmap.size(), vec![1, 3, 120, 120]);

        // frame 0 has peaks at both points
        assert_abs_diff_eq!(heatmap.double_value(&[0, 0, 20, 10]), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(heatmap.double_value(&[0, 0, 30, 50]), 1.0, epsilon = 1e-6);

        // frame 1 is undetected
        assert_eq!(heatmap.select(1, 1).abs().sum(Kind::Double).double_value(&[]), 0.0);

        // frame 2 has one blob at the clamped point and none at the origin
        assert_eq!(heatmap.double_value(&[0, 2, 3, 119]), 1.0);
        assert!(heatmap.double_value(&[0, 2, 0, 0]) < 1e-6);
        Ok(())
    }

    #[test]
    fn load_accepts_integer_arrays() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("origin.npy");
        let points = sample_points().mapv(|val| val as i64);
        let file = std::fs::File::create(&path)?;
        points.write_npy(file)?;

        let landmarks = LandmarkSequence::load(&path)?;
        assert_eq!(landmarks.num_frames(), 3);
        assert_eq!(landmarks.num_points(), 2);
        assert_eq!(landmarks.f_valid_points(0)?.count(), 2);
        assert_eq!(landmarks.f_valid_points(1)?.count(), 0);
        assert_eq!(landmarks.f_valid_points(2)?.count(), 1);
        Ok(())
    }

    #[test]
    fn load_rejects_bad_layout() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("origin.npy");
        let points = Array::<f64, _>::zeros((3, 2, 3));
        let file = std::fs::File::create(&path)?;
        points.write_npy(file)?;

        let err = LandmarkSequence::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::LandmarkFormat { .. })
        ));
        Ok(())
    }

    #[test]
    fn output_policy_follows_mode() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let clip_path = dir.path().join("A").join("train").join("A_00001.mpg");
        write_landmarks(&landmark_path(&clip_path, "origin.npy"), &sample_points())?;
        let clips = || ZeroClips {
            paths: vec![clip_path.clone()],
            frames: 3,
            size: 120,
        };

        let disabled = LandmarkVideo::new(clips(), &LandmarkConfig::new(LandmarkMode::Disabled))?;
        let record = disabled.get(0)?;
        assert_eq!(record.clip.size(), vec![1, 3, 120, 120]);
        assert!(record.landmark.is_none());

        let fused = LandmarkVideo::new(clips(), &LandmarkConfig::new(LandmarkMode::Fused))?;
        let record = fused.get(0)?;
        assert_eq!(record.clip.size(), vec![2, 3, 120, 120]);
        assert!(record.landmark.is_none());

        let separate = LandmarkVideo::new(clips(), &LandmarkConfig::new(LandmarkMode::Separate))?;
        let record = separate.get(0)?;
        assert_eq!(record.clip.size(), vec![1, 3, 120, 120]);
        let heatmap = record.landmark.unwrap();
        assert_eq!(heatmap.size(), vec![1, 3, 120, 120]);

        // the undetected frame holds the normalized zero
        let normalized_zero = -LANDMARK_MEAN / crate::config::LANDMARK_STD;
        assert_abs_diff_eq!(heatmap.double_value(&[0, 1, 60, 60]), normalized_zero, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn missing_landmark_file_is_reported() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let clips = ZeroClips {
            paths: vec![dir.path().join("A_00001.mpg")],
            frames: 3,
            size: 120,
        };
        let video = LandmarkVideo::new(clips, &LandmarkConfig::new(LandmarkMode::Fused))?;

        let err = video.get(0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::MissingLandmarkFile { .. })
        ));
        Ok(())
    }

    #[test]
    fn frame_count_mismatch_is_reported() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let clip_path = dir.path().join("A_00001.mpg");
        write_landmarks(&landmark_path(&clip_path, "origin.npy"), &sample_points())?;
        let clips = ZeroClips {
            paths: vec![clip_path],
            frames: 29,
            size: 120,
        };
        let video = LandmarkVideo::new(clips, &LandmarkConfig::new(LandmarkMode::Separate))?;

        let err = video.get(0).unwrap_err();
        match err.downcast_ref::<DatasetError>() {
            Some(DatasetError::ShapeMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, &vec![29, 2, 2]);
                assert_eq!(actual, &vec![3, 2, 2]);
            }
            _ => panic!("unexpected error: {:?}", err),
        }
        Ok(())
    }

    #[test]
    fn frame_index_is_checked() -> Result<()> {
        let landmarks = LandmarkSequence::new(sample_points())?;
        assert_eq!(landmarks.f_frame(2)?.count(), 2);
        assert!(landmarks.f_frame(3).is_err());
        assert!(landmarks.f_valid_points(100).is_err());
        Ok(())
    }

    #[test]
    fn disabled_mode_needs_no_landmark_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let clips = ZeroClips {
            paths: vec![dir.path().join("A_00001.mpg")],
            frames: 3,
            size: 120,
        };
        let video = LandmarkVideo::new(clips, &LandmarkConfig::new(LandmarkMode::Disabled))?;

        let record = video.get(0)?;
        assert_eq!(record.clip.size(), vec![1, 3, 120, 120]);
        assert!(record.landmark.is_none());

        let err = video.get(1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::IndexOutOfBounds { index: 1, len: 1 })
        ));
        Ok(())
    }
}
