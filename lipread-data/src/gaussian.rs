//! Gaussian kernel synthesis.

use crate::common::*;

/// Make a `height` x `width` grid holding a Gaussian blob.
///
/// The cell at row `r` and column `c` evaluates to
/// `exp(-4 ln2 ((c - x0)^2 + (r - y0)^2) / spread^2)`, where `spread` is the
/// full-width-half-maximum of the blob and `(x0, y0)` is the `center` in
/// `(column, row)` order. The grid midpoint is used when `center` is `None`.
pub fn make_gaussian(
    size: [i64; 2],
    spread: f64,
    center: Option<[f64; 2]>,
    kind: Kind,
) -> Result<Tensor> {
    let [height, width] = size;
    let center = center.unwrap_or([(width / 2) as f64, (height / 2) as f64]);
    make_gaussian_sum(size, spread, &[center], kind)
}

/// Sum up one Gaussian blob per center on a `height` x `width` grid.
///
/// The result equals the pixel-wise sum of [make_gaussian] over `centers`.
/// An empty `centers` yields a zero grid.
pub fn make_gaussian_sum(
    size: [i64; 2],
    spread: f64,
    centers: &[[f64; 2]],
    kind: Kind,
) -> Result<Tensor> {
    let [height, width] = size;
    ensure!(
        height > 0 && width > 0,
        "grid size must be positive, but get {:?}",
        size
    );
    ensure!(
        spread.is_finite() && spread > 0.0,
        "spread must be positive, but get {}",
        spread
    );
    ensure!(
        centers
            .iter()
            .all(|[x0, y0]| x0.is_finite() && y0.is_finite()),
        "centers must be finite"
    );

    if centers.is_empty() {
        return Ok(Tensor::zeros(&[height, width], (kind, Device::Cpu)));
    }

    let grid = tch::no_grad(|| {
        let n_centers = centers.len() as i64;
        let (x0, y0): (Vec<f64>, Vec<f64>) = centers.iter().map(|&[x, y]| (x, y)).unzip();

        // evaluate in double precision so that the kind of the result does not
        // change the rounding of intermediate values
        let x0 = Tensor::of_slice(&x0).view([n_centers, 1, 1]);
        let y0 = Tensor::of_slice(&y0).view([n_centers, 1, 1]);
        let xs = Tensor::arange(width, (Kind::Double, Device::Cpu)).view([1, 1, width]);
        let ys = Tensor::arange(height, (Kind::Double, Device::Cpu)).view([1, height, 1]);

        let dx = &xs - &x0;
        let dy = &ys - &y0;
        let dist2 = &dx * &dx + &dy * &dy;
        let blobs = (dist2 * (-4.0 * LN_2 / (spread * spread))).exp();

        blobs
            .sum_dim_intlist(&[0], false, Kind::Double)
            .to_kind(kind)
    });

    Ok(grid)
}
