//! Center and random spatial cropping of clip tensors.

use crate::{common::*, tensor::TensorExt as _};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpatialCropInit {
    /// The side length of input frames.
    pub frame_size: usize,
    /// The number of pixels removed from each side in the centered window.
    pub border: usize,
    /// If set, the window is placed at a uniformly random offset instead of
    /// the center.
    pub random_offset: bool,
    /// If set, the window is mirrored horizontally with probability 0.5.
    pub horizontal_flip: bool,
}

impl SpatialCropInit {
    pub fn build(self) -> Result<SpatialCrop> {
        let Self {
            frame_size,
            border,
            random_offset,
            horizontal_flip,
        } = self;

        ensure!(
            border * 2 < frame_size,
            "border {} leaves nothing of a {}x{} frame",
            border,
            frame_size,
            frame_size
        );

        Ok(SpatialCrop {
            frame_size: frame_size as i64,
            border: border as i64,
            random_offset,
            horizontal_flip,
        })
    }
}

/// The placement of a crop window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropWindow {
    pub top: i64,
    pub left: i64,
    pub size: i64,
    pub flip: bool,
}

impl CropWindow {
    pub fn apply(&self, tensor: &Tensor) -> Result<Tensor> {
        let Self {
            top,
            left,
            size,
            flip,
        } = *self;
        let cropped = tensor.f_crop_spatial(top, left, size, size)?;
        let cropped = if flip {
            cropped.f_flip_horizontal()?
        } else {
            cropped
        };
        Ok(cropped)
    }
}

#[derive(Debug, Clone)]
pub struct SpatialCrop {
    frame_size: i64,
    border: i64,
    random_offset: bool,
    horizontal_flip: bool,
}

impl SpatialCrop {
    /// The side length of output frames.
    pub fn output_size(&self) -> i64 {
        self.frame_size - self.border * 2
    }

    pub fn is_random(&self) -> bool {
        self.random_offset || self.horizontal_flip
    }

    /// Draw a crop window.
    pub fn sample_window<R>(&self, rng: &mut R) -> CropWindow
    where
        R: Rng + ?Sized,
    {
        let (top, left) = if self.random_offset {
            let max_offset = self.border * 2;
            (rng.gen_range(0..=max_offset), rng.gen_range(0..=max_offset))
        } else {
            (self.border, self.border)
        };
        let flip = self.horizontal_flip && rng.gen_bool(0.5);

        CropWindow {
            top,
            left,
            size: self.output_size(),
            flip,
        }
    }

    /// Crop all `tensors` with one shared window.
    pub fn forward(&self, tensors: &[&Tensor]) -> Result<Vec<Tensor>> {
        let mut rng = StdRng::from_entropy();
        self.forward_with_rng(&mut rng, tensors)
    }

    pub fn forward_with_rng<R>(&self, rng: &mut R, tensors: &[&Tensor]) -> Result<Vec<Tensor>>
    where
        R: Rng + ?Sized,
    {
        let window = self.sample_window(rng);

        tensors
            .iter()
            .map(|tensor| {
                let (_, _, height, width) = tensor.f_clip_size()?;
                ensure!(
                    height == self.frame_size && width == self.frame_size,
                    "expect {}x{} frames, but get {}x{}",
                    self.frame_size,
                    self.frame_size,
                    height,
                    width
                );
                window.apply(tensor)
            })
            .try_collect()
    }
}
