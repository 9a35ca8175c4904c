//! # fourier-conv - FFT convolution of N-dimensional fields
//!
//! Convolves real-valued images of any dimensionality with odd-sized kernels
//! in the frequency domain. Spectra of image and kernel are cached, so
//! swapping one of them only repays the transform that changed.
//!
//! ## Pipeline
//!
//! 1. The image is mirror-extended by `kernel - 1` samples per dimension and
//!    zero-padded to a power of two ([`fourier::FourierTransform`]).
//! 2. The kernel is wrapped centre-first into a template of the padded size
//!    ([`kernel::wrap_kernel`]) and transformed the same way.
//! 3. Spectra are multiplied pointwise ([`multiply::multiply`]).
//! 4. The product is transformed back and cropped to the image's interval
//!    ([`fourier::InverseFourierTransform`]).
//!
//! [`convolution::FourierConvolution`] drives all four steps.
//!
//! ## Cargo Features
//!
//! - `std` (default): error trait impls, timing, thread count from the
//!   environment
//! - `parallel`: spread transform lines and spectrum products over Rayon pools
//! - `verbose-logging`: debug logs through the `log` facade
//! - `internal-tests`: property tests
//!
//! ## Example
//!
//! ```
//! use fourier_conv::{create_gaussian_kernel_isotropic, ArrayImgFactory, FourierConvolution, Img};
//!
//! let image = Img::from_fn(&[32, 24], |p| ((p[0] / 4 + p[1] / 4) % 2) as f32);
//! let kernel = create_gaussian_kernel_isotropic(&ArrayImgFactory, 1.5, 2);
//! let mut conv = FourierConvolution::new(image, kernel).unwrap();
//! conv.check_input().unwrap();
//! conv.process().unwrap();
//! assert_eq!(conv.result().unwrap().dims(), &[32, 24]);
//! ```

#![no_std]
extern crate alloc;
#[cfg(any(feature = "std", test))]
extern crate std;

macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "verbose-logging")]
        log::debug!($($arg)*);
    };
}
pub(crate) use debug_log;

pub mod num;

/// Dense N-dimensional containers and factories.
pub mod img;

/// Radix-2 complex FFT with a plan cache.
pub mod fft;

/// Real multi-dimensional FFT, half spectra and quadrant rearrangement.
pub mod ndfft;

/// Forward/inverse transform adapters and the engine capability traits.
pub mod fourier;

/// Kernel wrapping and Gaussian kernels.
pub mod kernel;

pub mod multiply;

/// The convolution orchestrator.
pub mod convolution;

/// Thread count configuration and Rayon pools.
pub mod parallel;

mod stopwatch;

pub use convolution::{ConvolutionError, FourierConvolution};
pub use fourier::{
    FourierEngine, FourierTransform, ForwardTransform, InverseFourierTransform, InverseTransform,
    PreProcessing, Rearrangement, ScalarEngine, Spectrum, SpectrumLayout, TransformError,
};
pub use img::{ArrayImgFactory, Img, ImgError, ImgFactory};
pub use kernel::{create_gaussian_kernel, create_gaussian_kernel_isotropic, gaussian_kernel_1d};
pub use num::{Complex32, Complex64, RealSample};
