//! Multi-dimensional real FFT over flat, dimension-0-fastest buffers.
//!
//! - Forward: real field of extents `dims` to the half spectrum of extents
//!   `spectrum_dims(dims)` (`dims[0] / 2 + 1` bins along dimension 0, other
//!   dimensions unchanged).
//! - Inverse: half spectrum back to the real field, normalised.
//! - Quadrant rearrangement along dimensions `1..` and its exact inverse.
//!
//! Axis passes work on independent blocks of lines; with the `parallel`
//! feature the blocks are spread over the current rayon pool.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use crate::fft::{Complex, FftError, FftImpl, FftPlan, FftPlanner, Float};
use crate::img::element_count;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Transform length used for a field extent: the next power of two, and at
/// least two along the real axis so the half spectrum is well formed.
pub fn fast_len(extent: usize, real_axis: bool) -> usize {
    let n = extent.max(1).next_power_of_two();
    if real_axis {
        n.max(2)
    } else {
        n
    }
}

/// Extents of the half spectrum of a real field.
pub fn spectrum_dims(real_dims: &[usize]) -> Vec<usize> {
    let mut dims = real_dims.to_vec();
    if let Some(first) = dims.first_mut() {
        *first = *first / 2 + 1;
    }
    dims
}

/// Extents of the real field a half spectrum was computed from.
pub fn real_dims(spectrum_dims: &[usize]) -> Vec<usize> {
    let mut dims = spectrum_dims.to_vec();
    if let Some(first) = dims.first_mut() {
        *first = first.saturating_sub(1) * 2;
    }
    dims
}

/// Apply `f` to every line of `data` running along `axis`.
///
/// Lines are gathered into a scratch buffer when the axis is strided.
pub(crate) fn for_each_line<T, F>(
    data: &mut [Complex<T>],
    dims: &[usize],
    axis: usize,
    f: F,
) -> Result<(), FftError>
where
    T: Float,
    F: Fn(&mut [Complex<T>]) -> Result<(), FftError> + Sync,
{
    let stride: usize = dims[..axis].iter().product();
    let n = dims[axis];
    let block = stride * n;
    if block == 0 {
        return Ok(());
    }
    let run_block = |chunk: &mut [Complex<T>]| -> Result<(), FftError> {
        if stride == 1 {
            return f(chunk);
        }
        let mut line = vec![Complex::zero(); n];
        for i in 0..stride {
            for (k, slot) in line.iter_mut().enumerate() {
                *slot = chunk[i + k * stride];
            }
            f(&mut line)?;
            for (k, value) in line.iter().enumerate() {
                chunk[i + k * stride] = *value;
            }
        }
        Ok(())
    };
    #[cfg(feature = "parallel")]
    {
        data.par_chunks_mut(block).try_for_each(run_block)
    }
    #[cfg(not(feature = "parallel"))]
    {
        data.chunks_mut(block).try_for_each(run_block)
    }
}

fn plans_for<T: Float>(
    dims: &[usize],
    planner: &mut FftPlanner<T>,
) -> Result<Vec<Arc<FftPlan<T>>>, FftError> {
    dims.iter().map(|&n| planner.plan(n)).collect()
}

fn validate_real_dims(dims: &[usize]) -> Result<usize, FftError> {
    let count = element_count(dims);
    if count == 0 {
        return Err(FftError::EmptyInput);
    }
    if dims[0] % 2 != 0 {
        return Err(FftError::OddRealLength);
    }
    Ok(count)
}

/// Forward real transform of a field with extents `dims`.
pub fn rfftn<T: Float>(
    input: &[T],
    dims: &[usize],
    planner: &mut FftPlanner<T>,
) -> Result<Vec<Complex<T>>, FftError> {
    let count = validate_real_dims(dims)?;
    if input.len() != count {
        return Err(FftError::MismatchedLengths);
    }
    let plans = plans_for(dims, planner)?;
    let n0 = dims[0];
    let half = n0 / 2 + 1;
    let mut out = vec![Complex::zero(); half * (count / n0)];

    let plan0 = &plans[0];
    let real_pass = |(src, dst): (&[T], &mut [Complex<T>])| -> Result<(), FftError> {
        let mut line: Vec<Complex<T>> = src.iter().map(|&x| Complex::new(x, T::zero())).collect();
        plan0.fft(&mut line)?;
        dst.copy_from_slice(&line[..half]);
        Ok(())
    };
    #[cfg(feature = "parallel")]
    input
        .par_chunks(n0)
        .zip(out.par_chunks_mut(half))
        .try_for_each(real_pass)?;
    #[cfg(not(feature = "parallel"))]
    input
        .chunks(n0)
        .zip(out.chunks_mut(half))
        .try_for_each(real_pass)?;

    let sdims = spectrum_dims(dims);
    for (axis, plan) in plans.iter().enumerate().skip(1) {
        for_each_line(&mut out, &sdims, axis, |line| plan.fft(line))?;
    }
    Ok(out)
}

/// Inverse of [`rfftn`]: rebuilds the real field of extents `dims`.
pub fn irfftn<T: Float>(
    spectrum: &[Complex<T>],
    dims: &[usize],
    planner: &mut FftPlanner<T>,
) -> Result<Vec<T>, FftError> {
    let count = validate_real_dims(dims)?;
    let sdims = spectrum_dims(dims);
    if spectrum.len() != element_count(&sdims) {
        return Err(FftError::MismatchedLengths);
    }
    let plans = plans_for(dims, planner)?;
    let mut work = spectrum.to_vec();
    for axis in (1..dims.len()).rev() {
        let plan = &plans[axis];
        for_each_line(&mut work, &sdims, axis, |line| plan.ifft(line))?;
    }

    let n0 = dims[0];
    let half = n0 / 2 + 1;
    let plan0 = &plans[0];
    let mut out = vec![T::zero(); count];
    let real_pass = |(src, dst): (&[Complex<T>], &mut [T])| -> Result<(), FftError> {
        // Hermitian symmetry restores the bins the half spectrum omits.
        let mut line = vec![Complex::zero(); n0];
        line[..half].copy_from_slice(src);
        for k in half..n0 {
            line[k] = src[n0 - k].conj();
        }
        plan0.ifft(&mut line)?;
        for (d, c) in dst.iter_mut().zip(&line) {
            *d = c.re;
        }
        Ok(())
    };
    #[cfg(feature = "parallel")]
    work.par_chunks(half)
        .zip(out.par_chunks_mut(n0))
        .try_for_each(real_pass)?;
    #[cfg(not(feature = "parallel"))]
    work.chunks(half)
        .zip(out.chunks_mut(n0))
        .try_for_each(real_pass)?;
    Ok(out)
}

/// Swap spectrum quadrants so the zero frequency of every dimension `>= 1`
/// sits at its centre; `inverse` undoes it exactly, odd extents included.
/// Dimension 0 holds a half spectrum and is left alone.
pub fn rearrange_quadrants<T: Float>(
    data: &mut [Complex<T>],
    spectrum_dims: &[usize],
    inverse: bool,
) -> Result<(), FftError> {
    if data.len() != element_count(spectrum_dims) {
        return Err(FftError::MismatchedLengths);
    }
    for axis in 1..spectrum_dims.len() {
        let shift = spectrum_dims[axis] / 2;
        if shift == 0 {
            continue;
        }
        for_each_line(data, spectrum_dims, axis, |line| {
            if inverse {
                line.rotate_left(shift);
            } else {
                line.rotate_right(shift);
            }
            Ok(())
        })?;
    }
    Ok(())
}
