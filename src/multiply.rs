//! Pointwise complex multiplication of equally shaped spectra.

use crate::img::Img;
use crate::num::Complex32;
use crate::parallel;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// `a[i] *= b[i]` for every coordinate. Both slices describe the same shape;
/// extra trailing elements of the longer one are ignored.
pub fn multiply_inplace(a: &mut [Complex32], b: &[Complex32]) {
    debug_assert_eq!(a.len(), b.len());
    #[cfg(feature = "parallel")]
    a.par_iter_mut().zip(b.par_iter()).for_each(|(x, y)| *x *= *y);
    #[cfg(not(feature = "parallel"))]
    a.iter_mut().zip(b.iter()).for_each(|(x, y)| *x *= *y);
}

/// Product of two spectra as a new field; both operands are left untouched
/// so either can be reused.
pub fn multiply(a: &Img<Complex32>, b: &Img<Complex32>, threads: usize) -> Img<Complex32> {
    debug_assert_eq!(a.dims(), b.dims());
    let mut product = a.clone();
    parallel::install(threads, || multiply_inplace(product.as_mut_slice(), b.as_slice()));
    product
}
