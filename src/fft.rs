//! One-dimensional complex FFT.
//!
//! Radix-2 [Cooley–Tukey](https://en.wikipedia.org/wiki/Cooley%E2%80%93Tukey_FFT_algorithm)
//! transform over power-of-two lengths. An [`FftPlan`] owns the twiddle table
//! and bit-reversal permutation for one length and is `Send + Sync`, so a
//! single plan can drive every line of a multidimensional transform from
//! several worker threads. [`FftPlanner`] caches plans by length.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use hashbrown::HashMap;

pub use crate::num::{Complex, Complex32, Complex64, Float};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftError {
    /// Zero-length input.
    EmptyInput,
    /// The engine only transforms power-of-two lengths.
    NonPowerOfTwo,
    /// Buffer length differs from the planned length.
    MismatchedLengths,
    /// Real transforms need an even length along the real axis.
    OddRealLength,
}

impl fmt::Display for FftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FftError::EmptyInput => write!(f, "input is empty"),
            FftError::NonPowerOfTwo => write!(f, "length is not a power of two"),
            FftError::MismatchedLengths => write!(f, "buffer length does not match the plan"),
            FftError::OddRealLength => write!(f, "real axis length must be even"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FftError {}

/// In-place complex transform capability.
///
/// `ifft` is normalised so that `ifft(fft(x)) == x`.
pub trait FftImpl<T: Float> {
    fn fft(&self, input: &mut [Complex<T>]) -> Result<(), FftError>;
    fn ifft(&self, input: &mut [Complex<T>]) -> Result<(), FftError>;
}

/// Precomputed radix-2 transform for a fixed length.
#[derive(Debug)]
pub struct FftPlan<T: Float> {
    len: usize,
    /// `exp(-2πi k / len)` for `k = 0..len/2`.
    twiddles: Vec<Complex<T>>,
    bit_reversed: Vec<usize>,
}

impl<T: Float> FftPlan<T> {
    pub fn new(len: usize) -> Result<Self, FftError> {
        if len == 0 {
            return Err(FftError::EmptyInput);
        }
        if !len.is_power_of_two() {
            return Err(FftError::NonPowerOfTwo);
        }
        let bits = len.trailing_zeros();
        let bit_reversed = (0..len)
            .map(|i| if bits == 0 { 0 } else { i.reverse_bits() >> (usize::BITS - bits) })
            .collect();
        let step = -T::from_f64(2.0) * T::pi() / T::from_f64(len as f64);
        let twiddles = (0..len / 2)
            .map(|k| Complex::expi(step * T::from_f64(k as f64)))
            .collect();
        Ok(Self {
            len,
            twiddles,
            bit_reversed,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn run(&self, data: &mut [Complex<T>], inverse: bool) -> Result<(), FftError> {
        if data.is_empty() {
            return Err(FftError::EmptyInput);
        }
        if data.len() != self.len {
            return Err(FftError::MismatchedLengths);
        }
        let n = self.len;
        for i in 0..n {
            let j = self.bit_reversed[i];
            if j > i {
                data.swap(i, j);
            }
        }
        let mut size = 2;
        while size <= n {
            let half = size / 2;
            let stride = n / size;
            for start in (0..n).step_by(size) {
                for k in 0..half {
                    let w = self.twiddles[k * stride];
                    let w = if inverse { w.conj() } else { w };
                    let even = data[start + k];
                    let odd = data[start + k + half].mul(w);
                    data[start + k] = even + odd;
                    data[start + k + half] = even - odd;
                }
            }
            size <<= 1;
        }
        if inverse {
            let scale = T::one() / T::from_f64(n as f64);
            for c in data.iter_mut() {
                *c = c.scale(scale);
            }
        }
        Ok(())
    }
}

impl<T: Float> FftImpl<T> for FftPlan<T> {
    fn fft(&self, input: &mut [Complex<T>]) -> Result<(), FftError> {
        self.run(input, false)
    }

    fn ifft(&self, input: &mut [Complex<T>]) -> Result<(), FftError> {
        self.run(input, true)
    }
}

/// Cache of [`FftPlan`]s keyed by transform length.
pub struct FftPlanner<T: Float> {
    cache: HashMap<usize, Arc<FftPlan<T>>>,
}

impl<T: Float> Default for FftPlanner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> FftPlanner<T> {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Fetch (or build and remember) the plan for `len`.
    pub fn plan(&mut self, len: usize) -> Result<Arc<FftPlan<T>>, FftError> {
        if let Some(plan) = self.cache.get(&len) {
            return Ok(Arc::clone(plan));
        }
        let plan = Arc::new(FftPlan::new(len)?);
        self.cache.insert(len, Arc::clone(&plan));
        Ok(plan)
    }

    pub fn cached_lengths(&self) -> usize {
        self.cache.len()
    }
}
