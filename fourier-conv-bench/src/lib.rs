//! Shared inputs for the criterion benches.

use fourier_conv::{create_gaussian_kernel_isotropic, ArrayImgFactory, Img};

/// Deterministic test pattern of the given extents.
pub fn pattern(dims: &[usize]) -> Img<f32> {
    Img::from_fn(dims, |p| {
        p.iter()
            .enumerate()
            .map(|(d, &x)| ((x * (d + 7)) % 29) as f32)
            .sum()
    })
}

/// Normalised Gaussian of the same rank as `dims`.
pub fn gaussian(sigma: f64, rank: usize) -> Img<f32> {
    create_gaussian_kernel_isotropic(&ArrayImgFactory, sigma, rank)
}
