//! Convolution of an N-dimensional field with an odd-sized kernel via the
//! convolution theorem.
//!
//! [`FourierConvolution`] transforms the image (mirror-extended by
//! `kernel - 1` samples per dimension so circular wraparound never reaches
//! the valid region), transforms a centre-wrapped copy of the kernel padded
//! to the same size, multiplies the spectra and transforms back.
//!
//! Both spectra are cached. Replacing the image keeps the kernel spectrum
//! and vice versa, so one kernel can be applied to a stream of images (or
//! one image to several kernels) without repaying the other transform.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::time::Duration;

use crate::fourier::{
    FourierEngine, PreProcessing, Rearrangement, ScalarEngine, Spectrum, SpectrumLayout,
    TransformError,
};
use crate::img::{element_count, Img, ImgFactory};
use crate::kernel::{kernel_template_dims, wrap_kernel};
use crate::multiply::multiply;
use crate::num::{Complex32, RealSample};
use crate::parallel;
use crate::stopwatch::Stopwatch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvolutionError {
    /// The image has no dimensions or a zero extent.
    EmptyImage,
    /// The kernel has no dimensions or a zero extent.
    EmptyKernel,
    DimensionalityMismatch { image: usize, kernel: usize },
    /// Kernels need an odd extent in every dimension to have a unique centre.
    EvenKernelDimension { dim: usize, extent: usize },
    /// The image's factory cannot allocate complex spectra.
    IncompatibleType,
    ImageFft(TransformError),
    KernelFft(TransformError),
    InverseFft(TransformError),
}

impl fmt::Display for ConvolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvolutionError::EmptyImage => write!(f, "Input image is empty"),
            ConvolutionError::EmptyKernel => write!(f, "Kernel image is empty"),
            ConvolutionError::DimensionalityMismatch { image, kernel } => write!(
                f,
                "Kernel has {} dimensions but the image has {}",
                kernel, image
            ),
            ConvolutionError::EvenKernelDimension { dim, extent } => write!(
                f,
                "Kernel image has no odd extent in dimension {} ({})",
                dim, extent
            ),
            ConvolutionError::IncompatibleType => write!(
                f,
                "Image factory cannot be adapted to complex float samples"
            ),
            ConvolutionError::ImageFft(e) => write!(f, "FFT of image failed: {}", e),
            ConvolutionError::KernelFft(e) => write!(f, "FFT of kernel failed: {}", e),
            ConvolutionError::InverseFft(e) => write!(f, "InverseFFT of image failed: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConvolutionError {}

/// Whether an image spectrum still has room to absorb `kernel_dims`
/// without wraparound reaching the original interval.
fn margin_covers(layout: &SpectrumLayout, kernel_dims: &[usize]) -> bool {
    layout.original_dims().len() == kernel_dims.len()
        && kernel_dims
            .iter()
            .enumerate()
            .all(|(d, &k)| layout.margin(d) + 1 >= k)
}

/// Frequency-domain convolution of a `T` image with an `S` kernel.
///
/// Call [`check_input`](Self::check_input) once before the first
/// [`process`](Self::process) and after replacing the kernel.
pub struct FourierConvolution<T: RealSample, S: RealSample, E: FourierEngine = ScalarEngine> {
    image: Arc<Img<T>>,
    kernel: Arc<Img<S>>,
    img_factory: Arc<dyn ImgFactory<T>>,
    kernel_factory: Arc<dyn ImgFactory<S>>,
    fft_factory: Arc<dyn ImgFactory<Complex32>>,
    engine: E,
    image_spectrum: Option<Spectrum>,
    kernel_spectrum: Option<Spectrum>,
    convolved: Option<Img<T>>,
    num_threads: usize,
    processing_time: Duration,
    last_error: Option<ConvolutionError>,
}

impl<T: RealSample, S: RealSample> FourierConvolution<T, S, ScalarEngine> {
    /// Convolve `image` with `kernel`, allocating results and kernel
    /// templates like the inputs and spectra with the complex counterpart of
    /// the image's factory.
    pub fn new(
        image: impl Into<Arc<Img<T>>>,
        kernel: impl Into<Arc<Img<S>>>,
    ) -> Result<Self, ConvolutionError> {
        let image = image.into();
        let fft_factory = image
            .factory()
            .complex_factory()
            .map_err(|_| ConvolutionError::IncompatibleType)?;
        Ok(Self::with_fft_factory(image, kernel, fft_factory))
    }

    /// Like [`new`](Self::new) with an explicit spectrum factory.
    pub fn with_fft_factory(
        image: impl Into<Arc<Img<T>>>,
        kernel: impl Into<Arc<Img<S>>>,
        fft_factory: Arc<dyn ImgFactory<Complex32>>,
    ) -> Self {
        let image = image.into();
        let kernel = kernel.into();
        let img_factory = image.factory();
        let kernel_factory = kernel.factory();
        Self::with_factories(image, kernel, img_factory, kernel_factory, fft_factory)
    }

    pub fn with_factories(
        image: impl Into<Arc<Img<T>>>,
        kernel: impl Into<Arc<Img<S>>>,
        img_factory: Arc<dyn ImgFactory<T>>,
        kernel_factory: Arc<dyn ImgFactory<S>>,
        fft_factory: Arc<dyn ImgFactory<Complex32>>,
    ) -> Self {
        Self::with_engine(
            ScalarEngine,
            image,
            kernel,
            img_factory,
            kernel_factory,
            fft_factory,
        )
    }
}

impl<T: RealSample, S: RealSample, E: FourierEngine> FourierConvolution<T, S, E> {
    /// Full constructor with a custom transform engine.
    pub fn with_engine(
        engine: E,
        image: impl Into<Arc<Img<T>>>,
        kernel: impl Into<Arc<Img<S>>>,
        img_factory: Arc<dyn ImgFactory<T>>,
        kernel_factory: Arc<dyn ImgFactory<S>>,
        fft_factory: Arc<dyn ImgFactory<Complex32>>,
    ) -> Self {
        Self {
            image: image.into(),
            kernel: kernel.into(),
            img_factory,
            kernel_factory,
            fft_factory,
            engine,
            image_spectrum: None,
            kernel_spectrum: None,
            convolved: None,
            num_threads: parallel::default_num_threads(),
            processing_time: Duration::ZERO,
            last_error: None,
        }
    }

    pub fn image(&self) -> &Img<T> {
        &self.image
    }

    pub fn kernel(&self) -> &Img<S> {
        &self.kernel
    }

    /// Factory used for the convolved result.
    pub fn img_factory(&self) -> &Arc<dyn ImgFactory<T>> {
        &self.img_factory
    }

    /// Factory used for the wrapped kernel template.
    pub fn kernel_factory(&self) -> &Arc<dyn ImgFactory<S>> {
        &self.kernel_factory
    }

    /// Factory used for both spectra.
    pub fn fft_factory(&self) -> &Arc<dyn ImgFactory<Complex32>> {
        &self.fft_factory
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Swap the image; only the image spectrum is recomputed on the next run.
    pub fn replace_input(&mut self, image: impl Into<Arc<Img<T>>>) {
        self.image = image.into();
        self.image_spectrum = None;
    }

    /// Swap the kernel; only the kernel spectrum is recomputed on the next
    /// run, unless the cached image spectrum is too narrow for the new kernel.
    pub fn replace_kernel(&mut self, kernel: impl Into<Arc<Img<S>>>) {
        self.kernel = kernel.into();
        self.kernel_spectrum = None;
    }

    pub fn has_image_spectrum(&self) -> bool {
        self.image_spectrum.is_some()
    }

    pub fn has_kernel_spectrum(&self) -> bool {
        self.kernel_spectrum.is_some()
    }

    pub fn image_spectrum(&self) -> Option<&Spectrum> {
        self.image_spectrum.as_ref()
    }

    pub fn kernel_spectrum(&self) -> Option<&Spectrum> {
        self.kernel_spectrum.as_ref()
    }

    /// Validate image and kernel.
    pub fn check_input(&mut self) -> Result<(), ConvolutionError> {
        let outcome = self.validate();
        self.last_error = outcome.as_ref().err().cloned();
        outcome
    }

    fn validate(&self) -> Result<(), ConvolutionError> {
        if self.image.num_dimensions() == 0 || self.image.is_empty() {
            return Err(ConvolutionError::EmptyImage);
        }
        if self.kernel.num_dimensions() == 0 || self.kernel.is_empty() {
            return Err(ConvolutionError::EmptyKernel);
        }
        if self.kernel.num_dimensions() != self.image.num_dimensions() {
            return Err(ConvolutionError::DimensionalityMismatch {
                image: self.image.num_dimensions(),
                kernel: self.kernel.num_dimensions(),
            });
        }
        for (dim, &extent) in self.kernel.dims().iter().enumerate() {
            if extent % 2 != 1 {
                return Err(ConvolutionError::EvenKernelDimension { dim, extent });
            }
        }
        Ok(())
    }

    /// Run the convolution.
    ///
    /// Missing spectra are computed and cached; a stage that fails caches
    /// nothing, while spectra finished earlier stay cached for a retry.
    pub fn process(&mut self) -> Result<(), ConvolutionError> {
        let clock = Stopwatch::start();
        match self.run() {
            Ok(convolved) => {
                self.convolved = Some(convolved);
                self.processing_time = clock.elapsed();
                self.last_error = None;
                crate::debug_log!("convolution finished in {:?}", self.processing_time);
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    fn run(&mut self) -> Result<Img<T>, ConvolutionError> {
        self.ensure_image_spectrum()?;
        self.ensure_kernel_spectrum()?;
        let (image_spectrum, kernel_spectrum) =
            match (&self.image_spectrum, &self.kernel_spectrum) {
                (Some(image), Some(kernel)) => (image, kernel),
                (None, _) => {
                    return Err(ConvolutionError::ImageFft(TransformError::MissingResult))
                }
                (_, None) => {
                    return Err(ConvolutionError::KernelFft(TransformError::MissingResult))
                }
            };

        let product = multiply(image_spectrum.data(), kernel_spectrum.data(), self.num_threads);
        let product = Spectrum::new(product, image_spectrum.layout().clone());

        let mut inverse = self
            .engine
            .inverse::<T>(product, Arc::clone(&self.img_factory));
        inverse.set_num_threads(self.num_threads);
        inverse
            .check_input()
            .and_then(|()| inverse.process())
            .map_err(ConvolutionError::InverseFft)?;
        inverse
            .into_result()
            .ok_or(ConvolutionError::InverseFft(TransformError::MissingResult))
    }

    fn ensure_image_spectrum(&mut self) -> Result<(), ConvolutionError> {
        if let Some(spectrum) = &self.image_spectrum {
            if margin_covers(spectrum.layout(), self.kernel.dims()) {
                crate::debug_log!("reusing image spectrum {:?}", spectrum.dims());
                return Ok(());
            }
            crate::debug_log!(
                "image spectrum margin too small for kernel {:?}, recomputing",
                self.kernel.dims()
            );
            self.image_spectrum = None;
        }

        // Extending by kernel - 1 keeps circular wraparound out of the
        // original interval.
        let extension: Vec<usize> = self
            .kernel
            .dims()
            .iter()
            .map(|&k| k.saturating_sub(1))
            .collect();
        let mut fft = self
            .engine
            .forward(Arc::clone(&self.image), Arc::clone(&self.fft_factory));
        fft.set_num_threads(self.num_threads);
        fft.set_preprocessing(PreProcessing::ExtendMirror);
        fft.set_rearrangement(Rearrangement::Unchanged);
        fft.set_image_extension(&extension);
        fft.check_input()
            .and_then(|()| fft.process())
            .map_err(ConvolutionError::ImageFft)?;
        let spectrum = fft
            .into_result()
            .ok_or(ConvolutionError::ImageFft(TransformError::MissingResult))?;
        crate::debug_log!(
            "image spectrum {:?} for image {:?}",
            spectrum.dims(),
            self.image.dims()
        );
        self.image_spectrum = Some(spectrum);
        Ok(())
    }

    fn ensure_kernel_spectrum(&mut self) -> Result<(), ConvolutionError> {
        let image_spectrum = self
            .image_spectrum
            .as_ref()
            .ok_or(ConvolutionError::ImageFft(TransformError::MissingResult))?;
        let target_dims = image_spectrum.dims().to_vec();
        let rearrangement = image_spectrum.layout().rearrangement();

        if let Some(spectrum) = &self.kernel_spectrum {
            if spectrum.dims() == target_dims.as_slice()
                && spectrum.layout().rearrangement() == rearrangement
            {
                crate::debug_log!("reusing kernel spectrum {:?}", target_dims);
                return Ok(());
            }
            crate::debug_log!("kernel spectrum shape changed, rebuilding");
            self.kernel_spectrum = None;
        }

        let template_dims = kernel_template_dims(&target_dims);
        let template = wrap_kernel(&self.kernel, &template_dims, &*self.kernel_factory)
            .map_err(ConvolutionError::KernelFft)?;
        let mut fft = self
            .engine
            .forward(Arc::new(template), Arc::clone(&self.fft_factory));
        fft.set_num_threads(self.num_threads);
        fft.set_preprocessing(PreProcessing::None);
        fft.set_rearrangement(rearrangement);
        fft.set_image_extension(&alloc::vec![0; template_dims.len()]);
        fft.check_input()
            .and_then(|()| fft.process())
            .map_err(ConvolutionError::KernelFft)?;
        let spectrum = fft
            .into_result()
            .ok_or(ConvolutionError::KernelFft(TransformError::MissingResult))?;
        if spectrum.dims() != target_dims.as_slice() {
            return Err(ConvolutionError::KernelFft(TransformError::DimensionMismatch {
                expected: element_count(&target_dims),
                actual: spectrum.data().len(),
            }));
        }
        self.kernel_spectrum = Some(spectrum);
        Ok(())
    }

    pub fn result(&self) -> Option<&Img<T>> {
        self.convolved.as_ref()
    }

    pub fn into_result(self) -> Option<Img<T>> {
        self.convolved
    }

    /// Wall-clock duration of the last successful [`process`](Self::process)
    /// call, cache hits included.
    pub fn processing_time(&self) -> Duration {
        self.processing_time
    }

    /// Error of the last failed `check_input` or `process` call, cleared by
    /// the next success.
    pub fn last_error(&self) -> Option<&ConvolutionError> {
        self.last_error.as_ref()
    }

    pub fn set_num_threads(&mut self, threads: usize) {
        self.num_threads = threads.max(1);
    }

    /// Back to [`default_num_threads`](crate::parallel::default_num_threads).
    pub fn reset_num_threads(&mut self) {
        self.num_threads = parallel::default_num_threads();
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}
