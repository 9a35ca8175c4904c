//! Forward and inverse Fourier transform adapters for N-dimensional real
//! fields.
//!
//! [`FourierTransform`] extends its input by a margin, pads to the engine's
//! fast size, fills the border according to a [`PreProcessing`] policy and
//! produces a [`Spectrum`]: a complex field plus the [`SpectrumLayout`]
//! needed to undo all of that. [`InverseFourierTransform`] consumes such a
//! spectrum and crops the reconstruction back to the original interval and
//! element type.
//!
//! Both adapters follow the same run contract: configure, `check_input`,
//! `process`, then take the result. The [`ForwardTransform`] and
//! [`InverseTransform`] traits capture that contract so callers can depend on
//! a [`FourierEngine`] instead of the concrete adapters.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::time::Duration;

use crate::fft::{FftError, FftPlanner};
use crate::img::{element_count, for_each_position, Img, ImgFactory};
use crate::ndfft;
use crate::num::{Complex32, RealSample};
use crate::parallel;
use crate::stopwatch::Stopwatch;

/// How the border added around the input is filled before transforming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreProcessing {
    /// Input is used as is; the fast-size padding is zero filled.
    None,
    /// Every cell outside the input is zero.
    ExtendZero,
    /// Cells outside the input mirror it (single boundary: the edge sample
    /// is not repeated).
    #[default]
    ExtendMirror,
}

/// Placement of the spectrum quadrants in the transformed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rearrangement {
    /// Zero frequency moved to the centre along dimensions `>= 1`.
    #[default]
    RearrangeQuadrants,
    /// Natural FFT order.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The input has no samples.
    EmptyInput,
    /// A per-dimension argument does not match the input's dimensionality.
    DimensionMismatch { expected: usize, actual: usize },
    /// The factory returned a field with the wrong number of samples.
    FactoryMismatch { expected: usize, actual: usize },
    /// `process` has not produced a result yet.
    MissingResult,
    Fft(FftError),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::EmptyInput => write!(f, "input is empty"),
            TransformError::DimensionMismatch { expected, actual } => write!(
                f,
                "expected {} dimensions, got {}",
                expected, actual
            ),
            TransformError::FactoryMismatch { expected, actual } => write!(
                f,
                "factory allocated {} samples, expected {}",
                actual, expected
            ),
            TransformError::MissingResult => write!(f, "no result computed"),
            TransformError::Fft(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransformError {}

impl From<FftError> for TransformError {
    fn from(e: FftError) -> Self {
        TransformError::Fft(e)
    }
}

/// Geometry of a forward transform, enough to invert it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumLayout {
    original_dims: Vec<usize>,
    original_min: Vec<i64>,
    padded_dims: Vec<usize>,
    offset: Vec<usize>,
    rearrangement: Rearrangement,
}

impl SpectrumLayout {
    pub fn original_dims(&self) -> &[usize] {
        &self.original_dims
    }

    pub fn original_min(&self) -> &[i64] {
        &self.original_min
    }

    /// Extents of the real field that was transformed.
    pub fn padded_dims(&self) -> &[usize] {
        &self.padded_dims
    }

    /// Position of the original input inside the padded field.
    pub fn offset(&self) -> &[usize] {
        &self.offset
    }

    pub fn rearrangement(&self) -> Rearrangement {
        self.rearrangement
    }

    pub fn spectrum_dims(&self) -> Vec<usize> {
        ndfft::spectrum_dims(&self.padded_dims)
    }

    /// Width of the border around the input along `d`.
    pub fn margin(&self, d: usize) -> usize {
        self.padded_dims[d] - self.original_dims[d]
    }
}

/// A complex spectrum together with the layout of the transform that made it.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    data: Img<Complex32>,
    layout: SpectrumLayout,
}

impl Spectrum {
    pub fn new(data: Img<Complex32>, layout: SpectrumLayout) -> Self {
        Self { data, layout }
    }

    pub fn data(&self) -> &Img<Complex32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Img<Complex32> {
        &mut self.data
    }

    pub fn layout(&self) -> &SpectrumLayout {
        &self.layout
    }

    pub fn dims(&self) -> &[usize] {
        self.data.dims()
    }

    pub fn into_parts(self) -> (Img<Complex32>, SpectrumLayout) {
        (self.data, self.layout)
    }
}

/// Capability set of a forward transform.
pub trait ForwardTransform {
    fn set_preprocessing(&mut self, preprocessing: PreProcessing);
    fn preprocessing(&self) -> PreProcessing;
    fn set_rearrangement(&mut self, rearrangement: Rearrangement);
    fn rearrangement(&self) -> Rearrangement;
    /// Number of samples added along each dimension before padding.
    fn set_image_extension(&mut self, extension: &[usize]);
    fn set_num_threads(&mut self, threads: usize);
    fn num_threads(&self) -> usize;
    fn check_input(&self) -> Result<(), TransformError>;
    fn process(&mut self) -> Result<(), TransformError>;
    fn processing_time(&self) -> Duration;
    fn result(&self) -> Option<&Spectrum>;
    fn into_result(self: Box<Self>) -> Option<Spectrum>;
}

/// Capability set of an inverse transform producing `T` samples.
pub trait InverseTransform<T> {
    fn set_num_threads(&mut self, threads: usize);
    fn num_threads(&self) -> usize;
    fn check_input(&self) -> Result<(), TransformError>;
    fn process(&mut self) -> Result<(), TransformError>;
    fn processing_time(&self) -> Duration;
    fn result(&self) -> Option<&Img<T>>;
    fn into_result(self: Box<Self>) -> Option<Img<T>>;
}

/// Source of forward/inverse transform adapters.
pub trait FourierEngine {
    fn forward<T: RealSample>(
        &self,
        input: Arc<Img<T>>,
        factory: Arc<dyn ImgFactory<Complex32>>,
    ) -> Box<dyn ForwardTransform>;

    fn inverse<T: RealSample>(
        &self,
        spectrum: Spectrum,
        factory: Arc<dyn ImgFactory<T>>,
    ) -> Box<dyn InverseTransform<T>>;
}

/// Engine backed by the crate's radix-2 transforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarEngine;

impl FourierEngine for ScalarEngine {
    fn forward<T: RealSample>(
        &self,
        input: Arc<Img<T>>,
        factory: Arc<dyn ImgFactory<Complex32>>,
    ) -> Box<dyn ForwardTransform> {
        Box::new(FourierTransform::new(input, factory))
    }

    fn inverse<T: RealSample>(
        &self,
        spectrum: Spectrum,
        factory: Arc<dyn ImgFactory<T>>,
    ) -> Box<dyn InverseTransform<T>> {
        Box::new(InverseFourierTransform::new(spectrum, factory))
    }
}

/// Single-boundary mirror of `coord` into `0..len`.
fn mirror_index(coord: i64, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * len as i64 - 2;
    let mut value = coord.rem_euclid(period);
    if value >= len as i64 {
        value = period - value;
    }
    value as usize
}

/// Forward transform of a real field.
pub struct FourierTransform<T: RealSample> {
    input: Arc<Img<T>>,
    factory: Arc<dyn ImgFactory<Complex32>>,
    preprocessing: PreProcessing,
    rearrangement: Rearrangement,
    extension: Vec<usize>,
    num_threads: usize,
    processing_time: Duration,
    result: Option<Spectrum>,
}

impl<T: RealSample> FourierTransform<T> {
    pub fn new(input: Arc<Img<T>>, factory: Arc<dyn ImgFactory<Complex32>>) -> Self {
        let extension = vec![0; input.num_dimensions()];
        Self {
            input,
            factory,
            preprocessing: PreProcessing::default(),
            rearrangement: Rearrangement::default(),
            extension,
            num_threads: parallel::default_num_threads(),
            processing_time: Duration::ZERO,
            result: None,
        }
    }

    pub fn input(&self) -> &Img<T> {
        &self.input
    }

    pub fn image_extension(&self) -> &[usize] {
        &self.extension
    }

    /// Layout the next `process` call will use.
    pub fn layout(&self) -> SpectrumLayout {
        let dims = self.input.dims();
        let padded_dims: Vec<usize> = dims
            .iter()
            .zip(&self.extension)
            .enumerate()
            .map(|(d, (&n, &ext))| ndfft::fast_len(n + ext, d == 0))
            .collect();
        let offset = padded_dims
            .iter()
            .zip(dims)
            .map(|(&p, &n)| (p - n) / 2)
            .collect();
        SpectrumLayout {
            original_dims: dims.to_vec(),
            original_min: self.input.min().to_vec(),
            padded_dims,
            offset,
            rearrangement: self.rearrangement,
        }
    }

    fn padded_input(&self, layout: &SpectrumLayout) -> Vec<f32> {
        let dims = self.input.dims();
        let samples = self.input.as_slice();
        let mut padded = vec![0.0f32; element_count(&layout.padded_dims)];
        let mut local = vec![0usize; dims.len()];
        for_each_position(&layout.padded_dims, |pos, linear| {
            let mut inside = true;
            for d in 0..dims.len() {
                let coord = pos[d] as i64 - layout.offset[d] as i64;
                if coord < 0 || coord >= dims[d] as i64 {
                    inside = false;
                }
                local[d] = mirror_index(coord, dims[d]);
            }
            let take = match self.preprocessing {
                PreProcessing::ExtendMirror => true,
                PreProcessing::None | PreProcessing::ExtendZero => inside,
            };
            if take {
                padded[linear] = samples[self.input.index_of(&local)].to_f32();
            }
        });
        padded
    }
}

impl<T: RealSample> ForwardTransform for FourierTransform<T> {
    fn set_preprocessing(&mut self, preprocessing: PreProcessing) {
        self.preprocessing = preprocessing;
    }

    fn preprocessing(&self) -> PreProcessing {
        self.preprocessing
    }

    fn set_rearrangement(&mut self, rearrangement: Rearrangement) {
        self.rearrangement = rearrangement;
    }

    fn rearrangement(&self) -> Rearrangement {
        self.rearrangement
    }

    fn set_image_extension(&mut self, extension: &[usize]) {
        self.extension = extension.to_vec();
    }

    fn set_num_threads(&mut self, threads: usize) {
        self.num_threads = threads.max(1);
    }

    fn num_threads(&self) -> usize {
        self.num_threads
    }

    fn check_input(&self) -> Result<(), TransformError> {
        if self.input.is_empty() {
            return Err(TransformError::EmptyInput);
        }
        if self.extension.len() != self.input.num_dimensions() {
            return Err(TransformError::DimensionMismatch {
                expected: self.input.num_dimensions(),
                actual: self.extension.len(),
            });
        }
        Ok(())
    }

    fn process(&mut self) -> Result<(), TransformError> {
        self.check_input()?;
        let clock = Stopwatch::start();
        let layout = self.layout();
        let padded = self.padded_input(&layout);
        let sdims = layout.spectrum_dims();
        let rearrange = layout.rearrangement == Rearrangement::RearrangeQuadrants;
        let spectrum = parallel::install(self.num_threads, || {
            let mut planner = FftPlanner::<f32>::new();
            let mut spectrum = ndfft::rfftn(&padded, &layout.padded_dims, &mut planner)?;
            if rearrange {
                ndfft::rearrange_quadrants(&mut spectrum, &sdims, false)?;
            }
            Ok::<_, FftError>(spectrum)
        })?;

        let mut data = self.factory.create(&sdims);
        if data.len() != spectrum.len() {
            return Err(TransformError::FactoryMismatch {
                expected: spectrum.len(),
                actual: data.len(),
            });
        }
        data.as_mut_slice().copy_from_slice(&spectrum);
        crate::debug_log!(
            "forward transform {:?} -> padded {:?} ({:?}, {:?})",
            layout.original_dims,
            layout.padded_dims,
            self.preprocessing,
            layout.rearrangement
        );
        self.result = Some(Spectrum::new(data, layout));
        self.processing_time = clock.elapsed();
        Ok(())
    }

    fn processing_time(&self) -> Duration {
        self.processing_time
    }

    fn result(&self) -> Option<&Spectrum> {
        self.result.as_ref()
    }

    fn into_result(self: Box<Self>) -> Option<Spectrum> {
        self.result
    }
}

/// Inverse transform back to the interval and element type of the input
/// that produced the spectrum.
pub struct InverseFourierTransform<T: RealSample> {
    spectrum: Spectrum,
    factory: Arc<dyn ImgFactory<T>>,
    num_threads: usize,
    processing_time: Duration,
    result: Option<Img<T>>,
}

impl<T: RealSample> InverseFourierTransform<T> {
    pub fn new(spectrum: Spectrum, factory: Arc<dyn ImgFactory<T>>) -> Self {
        Self {
            spectrum,
            factory,
            num_threads: parallel::default_num_threads(),
            processing_time: Duration::ZERO,
            result: None,
        }
    }

    /// Invert `data`, a spectrum shaped like the one `forward` produced,
    /// reusing the forward transform's layout and thread count.
    pub fn from_forward<S: RealSample>(
        data: Img<Complex32>,
        factory: Arc<dyn ImgFactory<T>>,
        forward: &FourierTransform<S>,
    ) -> Result<Self, TransformError> {
        let layout = forward
            .result()
            .map(|s| s.layout().clone())
            .ok_or(TransformError::MissingResult)?;
        let mut inverse = Self::new(Spectrum::new(data, layout), factory);
        inverse.num_threads = forward.num_threads;
        Ok(inverse)
    }

    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }
}

impl<T: RealSample> InverseTransform<T> for InverseFourierTransform<T> {
    fn set_num_threads(&mut self, threads: usize) {
        self.num_threads = threads.max(1);
    }

    fn num_threads(&self) -> usize {
        self.num_threads
    }

    fn check_input(&self) -> Result<(), TransformError> {
        let layout = self.spectrum.layout();
        let expected = layout.spectrum_dims();
        let dims = self.spectrum.dims();
        if dims.len() != expected.len() {
            return Err(TransformError::DimensionMismatch {
                expected: expected.len(),
                actual: dims.len(),
            });
        }
        if dims != expected.as_slice() {
            return Err(TransformError::Fft(FftError::MismatchedLengths));
        }
        if element_count(layout.original_dims()) == 0 {
            return Err(TransformError::EmptyInput);
        }
        Ok(())
    }

    fn process(&mut self) -> Result<(), TransformError> {
        self.check_input()?;
        let clock = Stopwatch::start();
        let layout = self.spectrum.layout().clone();
        let sdims = layout.spectrum_dims();
        let rearranged = layout.rearrangement == Rearrangement::RearrangeQuadrants;
        let source = self.spectrum.data().as_slice();
        let real = parallel::install(self.num_threads, || {
            let mut planner = FftPlanner::<f32>::new();
            if rearranged {
                let mut natural = source.to_vec();
                ndfft::rearrange_quadrants(&mut natural, &sdims, true)?;
                ndfft::irfftn(&natural, &layout.padded_dims, &mut planner)
            } else {
                ndfft::irfftn(source, &layout.padded_dims, &mut planner)
            }
        })?;

        let mut out = self.factory.create(&layout.original_dims);
        let expected = element_count(&layout.original_dims);
        if out.len() != expected {
            return Err(TransformError::FactoryMismatch {
                expected,
                actual: out.len(),
            });
        }
        let padded_dims = &layout.padded_dims;
        let offset = &layout.offset;
        let mut padded_pos = vec![0usize; padded_dims.len()];
        let target = out.as_mut_slice();
        for_each_position(&layout.original_dims, |pos, linear| {
            let mut index = 0;
            let mut stride = 1;
            for d in 0..pos.len() {
                padded_pos[d] = pos[d] + offset[d];
                index += padded_pos[d] * stride;
                stride *= padded_dims[d];
            }
            target[linear] = T::from_f32(real[index]);
        });
        out.set_min(&layout.original_min)
            .map_err(|_| TransformError::DimensionMismatch {
                expected: layout.original_dims.len(),
                actual: layout.original_min.len(),
            })?;
        self.result = Some(out);
        self.processing_time = clock.elapsed();
        Ok(())
    }

    fn processing_time(&self) -> Duration {
        self.processing_time
    }

    fn result(&self) -> Option<&Img<T>> {
        self.result.as_ref()
    }

    fn into_result(self: Box<Self>) -> Option<Img<T>> {
        self.result
    }
}
