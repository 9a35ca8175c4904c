//! Kernel preparation for frequency-domain convolution.
//!
//! [`wrap_kernel`] stages an odd-sized kernel in a zero-filled template the
//! size of the padded image so that the kernel centre lands on coordinate
//! zero and every other sample wraps around toroidally. Transforming that
//! template gives a kernel spectrum that convolves without shifting the
//! result.

use alloc::vec;
use alloc::vec::Vec;

use crate::fourier::TransformError;
use crate::img::{element_count, for_each_position, Img, ImgFactory};
use crate::ndfft;
use crate::num::RealSample;

/// Extents of the real-valued kernel template matching a half spectrum of
/// extents `spectrum_dims`: dimension 0 becomes `(s0 - 1) * 2`, the rest are
/// unchanged.
pub fn kernel_template_dims(spectrum_dims: &[usize]) -> Vec<usize> {
    ndfft::real_dims(spectrum_dims)
}

/// Place every sample of `kernel` into a zero-filled template of extents
/// `template_dims`, centre first.
///
/// A sample at kernel-local coordinate `p` (relative to the kernel's own
/// `min`) goes to `(p[d] - k[d] / 2 + t[d]) mod t[d]`, where `k` are the
/// kernel extents and `t` the template extents. With odd kernel extents no
/// larger than the template the mapping is injective.
pub fn wrap_kernel<S: RealSample>(
    kernel: &Img<S>,
    template_dims: &[usize],
    factory: &dyn ImgFactory<S>,
) -> Result<Img<S>, TransformError> {
    let kernel_dims = kernel.dims();
    if template_dims.len() != kernel_dims.len() {
        return Err(TransformError::DimensionMismatch {
            expected: kernel_dims.len(),
            actual: template_dims.len(),
        });
    }
    let mut template = factory.create(template_dims);
    let expected = element_count(template_dims);
    if template.len() != expected {
        return Err(TransformError::FactoryMismatch {
            expected,
            actual: template.len(),
        });
    }
    debug_assert!(kernel_dims
        .iter()
        .zip(template_dims)
        .all(|(&k, &t)| k <= t));

    let samples = kernel.as_slice();
    let mut wrapped = vec![0usize; kernel_dims.len()];
    for_each_position(kernel_dims, |pos, linear| {
        for d in 0..pos.len() {
            let t = template_dims[d];
            wrapped[d] = (pos[d] + t - kernel_dims[d] / 2) % t;
        }
        template.set_local(&wrapped, samples[linear]);
    });
    Ok(template)
}

/// Sampled 1-D Gaussian of standard deviation `sigma`.
///
/// The kernel has `max(3, 2 * round(3 * sigma) + 1)` taps with the peak at
/// the centre. A non-positive or non-finite `sigma` yields the identity
/// `[0, 1, 0]`. With `normalize` the taps sum to one.
pub fn gaussian_kernel_1d(sigma: f64, normalize: bool) -> Vec<f64> {
    if !(sigma > 0.0 && sigma.is_finite()) {
        return vec![0.0, 1.0, 0.0];
    }
    let radius = libm::round(3.0 * sigma) as usize;
    let size = (2 * radius + 1).max(3);
    let center = size / 2;
    let two_sq_sigma = 2.0 * sigma * sigma;
    let mut kernel = vec![0.0; size];
    kernel[center] = 1.0;
    for x in 1..=center {
        let value = libm::exp(-((x * x) as f64) / two_sq_sigma);
        kernel[center - x] = value;
        kernel[center + x] = value;
    }
    if normalize {
        let sum: f64 = kernel.iter().sum();
        for v in kernel.iter_mut() {
            *v /= sum;
        }
    }
    kernel
}

/// Separable N-dimensional Gaussian with one `sigma` per dimension, each
/// axis normalised so the whole kernel sums to one.
pub fn create_gaussian_kernel(factory: &dyn ImgFactory<f32>, sigmas: &[f64]) -> Img<f32> {
    let axes: Vec<Vec<f64>> = sigmas
        .iter()
        .map(|&sigma| gaussian_kernel_1d(sigma, true))
        .collect();
    let dims: Vec<usize> = axes.iter().map(Vec::len).collect();
    let mut kernel = factory.create(&dims);
    let data = kernel.as_mut_slice();
    for_each_position(&dims, |pos, linear| {
        let value: f64 = pos
            .iter()
            .zip(&axes)
            .map(|(&p, axis)| axis[p])
            .product();
        data[linear] = value as f32;
    });
    kernel
}

/// Isotropic variant of [`create_gaussian_kernel`].
pub fn create_gaussian_kernel_isotropic(
    factory: &dyn ImgFactory<f32>,
    sigma: f64,
    num_dimensions: usize,
) -> Img<f32> {
    create_gaussian_kernel(factory, &vec![sigma; num_dimensions])
}
