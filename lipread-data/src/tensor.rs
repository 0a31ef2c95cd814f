//! Tensor helpers for `(channels, frames, height, width)` clip tensors.

use crate::common::*;

pub trait TensorExt {
    /// Return the `(channels, frames, height, width)` dimensions of a clip.
    fn f_clip_size(&self) -> Result<(i64, i64, i64, i64)>;

    /// Select the `height` x `width` window at `top`, `left` of every frame.
    fn f_crop_spatial(&self, top: i64, left: i64, height: i64, width: i64) -> Result<Tensor>;

    fn crop_spatial(&self, top: i64, left: i64, height: i64, width: i64) -> Tensor {
        self.f_crop_spatial(top, left, height, width).unwrap()
    }

    /// Remove `border` pixels from each side of every frame.
    fn f_crop_border(&self, border: i64) -> Result<Tensor>;

    fn crop_border(&self, border: i64) -> Tensor {
        self.f_crop_border(border).unwrap()
    }

    /// Mirror every frame along the width axis.
    fn f_flip_horizontal(&self) -> Result<Tensor>;

    fn flip_horizontal(&self) -> Tensor {
        self.f_flip_horizontal().unwrap()
    }
}

impl TensorExt for Tensor {
    fn f_clip_size(&self) -> Result<(i64, i64, i64, i64)> {
        match self.size().as_slice() {
            &[channels, frames, height, width] => Ok((channels, frames, height, width)),
            shape => bail!(
                "invalid clip shape {:?}: expect (channels, frames, height, width)",
                shape
            ),
        }
    }

    fn f_crop_spatial(&self, top: i64, left: i64, height: i64, width: i64) -> Result<Tensor> {
        let (_, _, orig_h, orig_w) = self.f_clip_size()?;
        ensure!(
            top >= 0 && left >= 0 && height > 0 && width > 0,
            "invalid crop window: top={}, left={}, height={}, width={}",
            top,
            left,
            height,
            width
        );
        ensure!(
            top + height <= orig_h && left + width <= orig_w,
            "crop window {}x{} at ({}, {}) exceeds the {}x{} frame",
            height,
            width,
            top,
            left,
            orig_h,
            orig_w
        );

        Ok(self.i((.., .., top..(top + height), left..(left + width))))
    }

    fn f_crop_border(&self, border: i64) -> Result<Tensor> {
        let (_, _, height, width) = self.f_clip_size()?;
        ensure!(border >= 0, "border must be non-negative");
        ensure!(
            border * 2 < height && border * 2 < width,
            "border {} leaves nothing of a {}x{} frame",
            border,
            height,
            width
        );
        self.f_crop_spatial(border, border, height - border * 2, width - border * 2)
    }

    fn f_flip_horizontal(&self) -> Result<Tensor> {
        self.f_clip_size()?;
        Ok(self.flip(&[3]))
    }
}
