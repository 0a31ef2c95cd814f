use super::*;
use crate::{common::*, config::Normalization, error::DatasetError};
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
    videoio,
};

/// The list of video files that are decoded on access.
#[derive(Debug, Clone)]
pub struct VideoClips {
    files: Vec<PathBuf>,
    frame_size: i64,
    normalization: Normalization,
}

impl VideoClips {
    pub fn new(files: Vec<PathBuf>, frame_size: usize, normalization: Normalization) -> Result<Self> {
        ensure!(frame_size > 0, "frame_size must be positive");
        normalization.validate()?;

        Ok(Self {
            files,
            frame_size: frame_size as i64,
            normalization,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn frame_size(&self) -> i64 {
        self.frame_size
    }

    pub fn normalization(&self) -> &Normalization {
        &self.normalization
    }

    pub fn path(&self, index: usize) -> Result<&Path> {
        let len = self.files.len();
        let path = self
            .files
            .get(index)
            .ok_or(DatasetError::IndexOutOfBounds { index, len })?;
        Ok(path)
    }

    /// Decode the nth video into a normalized `(1, frames, size, size)` tensor.
    pub fn get(&self, index: usize) -> Result<Tensor> {
        let path = self.path(index)?;
        let frames = decode_video(path, self.frame_size)?;
        Ok(tch::no_grad(|| self.normalization.apply(&frames)))
    }
}

impl ClipSource for VideoClips {
    fn num_clips(&self) -> usize {
        self.len()
    }

    fn clip_path(&self, index: usize) -> Result<&Path> {
        self.path(index)
    }

    fn clip(&self, index: usize) -> Result<Tensor> {
        self.get(index)
    }
}

/// Releases the capture handle when dropped.
struct Capture {
    inner: videoio::VideoCapture,
}

impl Drop for Capture {
    fn drop(&mut self) {
        if let Err(err) = self.inner.release() {
            warn!("failed to release video capture: {}", err);
        }
    }
}

/// Decode every frame of a video file into grayscale pixels.
///
/// Frames are converted to single channel and resized to `frame_size` x
/// `frame_size` with bilinear interpolation. The output is a
/// `(1, frames, frame_size, frame_size)` tensor of raw pixel values in
/// double precision.
pub fn decode_video(path: impl AsRef<Path>, frame_size: i64) -> Result<Tensor> {
    let path = path.as_ref();
    let decode_error = |reason: String| DatasetError::Decode {
        path: path.to_owned(),
        reason,
    };
    ensure!(frame_size > 0, "frame_size must be positive");

    if !path.is_file() {
        return Err(decode_error("file does not exist".into()).into());
    }
    let path_str = path
        .to_str()
        .ok_or_else(|| decode_error("the path is not valid UTF-8".into()))?;

    let mut capture = {
        let inner = videoio::VideoCapture::from_file(path_str, videoio::CAP_ANY)
            .map_err(|err| decode_error(err.to_string()))?;
        Capture { inner }
    };
    let is_opened = capture
        .inner
        .is_opened()
        .map_err(|err| decode_error(err.to_string()))?;
    if !is_opened {
        return Err(decode_error("unable to open the video stream".into()).into());
    }

    let mut frames = vec![];
    let mut frame = Mat::default();
    let mut gray = Mat::default();
    let mut resized = Mat::default();
    let size = Size::new(frame_size as i32, frame_size as i32);

    loop {
        let has_frame = capture
            .inner
            .read(&mut frame)
            .map_err(|err| decode_error(err.to_string()))?;
        if !has_frame {
            break;
        }

        imgproc::cvt_color(&frame, &mut gray, imgproc::COLOR_BGR2GRAY, 0)
            .map_err(|err| decode_error(err.to_string()))?;
        imgproc::resize(&gray, &mut resized, size, 0.0, 0.0, imgproc::INTER_LINEAR)
            .map_err(|err| decode_error(err.to_string()))?;

        let pixels = resized
            .data_bytes()
            .map_err(|err| decode_error(err.to_string()))?;
        ensure!(
            pixels.len() as i64 == frame_size * frame_size,
            decode_error(format!(
                "expect {} pixels per frame, but get {}",
                frame_size * frame_size,
                pixels.len()
            ))
        );

        let tensor = Tensor::of_slice(pixels)
            .to_kind(Kind::Double)
            .view([1, 1, frame_size, frame_size]);
        frames.push(tensor);
    }
    drop(capture);

    if frames.is_empty() {
        return Err(decode_error("the video has no frames".into()).into());
    }
    debug!("decoded {} frames from '{}'", frames.len(), path.display());

    Ok(Tensor::cat(&frames, 1))
}
