use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::Duration;

use fourier_conv::img::element_count;
use fourier_conv::{
    ArrayImgFactory, Complex32, ConvolutionError, FourierConvolution, FourierEngine,
    ForwardTransform, Img, ImgFactory, InverseTransform, PreProcessing, RealSample, Rearrangement,
    ScalarEngine, Spectrum, TransformError,
};

fn mirror(coord: i64, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * len as i64 - 2;
    let mut v = coord.rem_euclid(period);
    if v >= len as i64 {
        v = period - v;
    }
    v as usize
}

/// Direct spatial convolution with single-boundary mirroring.
fn direct_convolution(image: &Img<f32>, kernel: &Img<f32>) -> Vec<f32> {
    let idims = image.dims().to_vec();
    let kdims = kernel.dims().to_vec();
    let mut out = vec![0.0f32; image.len()];
    fourier_conv::img::for_each_position(&idims, |x, linear| {
        let mut acc = 0.0f64;
        fourier_conv::img::for_each_position(&kdims, |j, klinear| {
            let src: Vec<usize> = (0..idims.len())
                .map(|d| mirror(x[d] as i64 - (j[d] as i64 - (kdims[d] / 2) as i64), idims[d]))
                .collect();
            acc += kernel.as_slice()[klinear] as f64 * image.get_local(&src) as f64;
        });
        out[linear] = acc as f32;
    });
    out
}

fn pattern(dims: &[usize]) -> Img<f32> {
    Img::from_fn(dims, |p| {
        let mut v = 0.0;
        for (d, &x) in p.iter().enumerate() {
            v += ((x * (2 * d + 5) + d) % 9) as f32 * (d as f32 + 1.0);
        }
        v
    })
}

fn identity(dims: &[usize], scale: f32) -> Img<f32> {
    let centre: Vec<usize> = dims.iter().map(|&k| k / 2).collect();
    Img::from_fn(dims, |p| if p == centre.as_slice() { scale } else { 0.0 })
}

fn assert_close(actual: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tol * (1.0 + e.abs()),
            "sample {}: {} vs {}",
            i,
            a,
            e
        );
    }
}

fn convolve(image: Img<f32>, kernel: Img<f32>) -> Img<f32> {
    let mut conv =
        FourierConvolution::new(image, kernel).expect("Invariant: operation should succeed");
    conv.check_input()
        .expect("Invariant: operation should succeed");
    conv.process().expect("Invariant: operation should succeed");
    conv.into_result()
        .expect("Invariant: operation should succeed")
}

#[test]
fn identity_kernel_preserves_images_of_any_rank() {
    for (idims, kdims) in [
        (vec![9], vec![5]),
        (vec![16], vec![1]),
        (vec![6, 7], vec![3, 1]),
        (vec![10, 4], vec![5, 3]),
        (vec![5, 4, 3], vec![3, 3, 3]),
    ] {
        let image = pattern(&idims);
        let out = convolve(image.clone(), identity(&kdims, 1.0));
        assert_eq!(out.dims(), image.dims());
        assert_close(out.as_slice(), image.as_slice(), 1e-4);
    }
}

#[test]
fn scaled_impulse_scales_image() {
    let image = pattern(&[12, 5]);
    let out = convolve(image.clone(), identity(&[3, 3], 2.5));
    let expected: Vec<f32> = image.as_slice().iter().map(|v| v * 2.5).collect();
    assert_close(out.as_slice(), &expected, 1e-4);
}

#[test]
fn asymmetric_kernel_matches_direct_mirrored_convolution() {
    let image = pattern(&[11, 6]);
    let kernel = Img::from_vec(
        &[3, 5],
        vec![
            0.5, 0.0, -1.0, //
            2.0, 0.25, 0.0, //
            0.0, 1.0, 3.0, //
            -0.5, 0.0, 0.75, //
            1.5, 0.0, 0.0,
        ],
    )
    .expect("Invariant: operation should succeed");
    let expected = direct_convolution(&image, &kernel);
    let out = convolve(image, kernel);
    assert_close(out.as_slice(), &expected, 1e-4);
}

#[test]
fn kernel_larger_than_image_mirrors_repeatedly() {
    let image = pattern(&[4]);
    let kernel = Img::from_vec(&[9], vec![1.0, 0.0, 2.0, 0.0, 1.0, 0.0, 0.5, 0.0, 3.0])
        .expect("Invariant: operation should succeed");
    let expected = direct_convolution(&image, &kernel);
    let out = convolve(image, kernel);
    assert_close(out.as_slice(), &expected, 1e-4);
}

#[test]
fn result_keeps_image_interval() {
    let image = pattern(&[7, 3])
        .translated(&[-3, 12])
        .expect("Invariant: operation should succeed");
    let out = convolve(image.clone(), identity(&[3, 3], 1.0));
    assert_eq!(out.min(), &[-3, 12]);
    let corner = out.get(&[3, 14]).expect("Invariant: operation should succeed");
    assert!((corner - image.get(&[3, 14]).unwrap()).abs() < 1e-4);
    assert!(out.get(&[4, 14]).is_none());
    assert_close(out.as_slice(), image.as_slice(), 1e-4);
}

#[test]
fn even_kernel_is_rejected_by_check_input() {
    let mut conv = FourierConvolution::new(pattern(&[8, 8]), identity(&[4, 3], 1.0))
        .expect("Invariant: operation should succeed");
    let err = conv.check_input().unwrap_err();
    assert_eq!(err, ConvolutionError::EvenKernelDimension { dim: 0, extent: 4 });
    assert_eq!(conv.last_error(), Some(&err));
    assert!(conv.result().is_none());
}

#[test]
fn integer_images_round_back_to_their_type() {
    let values: Vec<u8> = (0..30).map(|i| (i * 37 % 251) as u8).collect();
    let image = Img::from_vec(&[6, 5], values.clone()).expect("Invariant: operation should succeed");
    let mut conv = FourierConvolution::new(image, identity(&[3, 3], 1.0))
        .expect("Invariant: operation should succeed");
    conv.process().expect("Invariant: operation should succeed");
    assert_eq!(conv.result().map(|r| r.as_slice().to_vec()), Some(values));

    let flat = Img::from_vec(&[8, 8], vec![100u16; 64]).expect("Invariant: operation should succeed");
    let mut blur = FourierConvolution::new(flat, Img::from_vec(&[3, 3], vec![1.0f32 / 9.0; 9]).unwrap())
        .expect("Invariant: operation should succeed");
    blur.process().expect("Invariant: operation should succeed");
    assert!(blur.result().unwrap().as_slice().iter().all(|&v| v == 100));
}

#[test]
fn gaussian_blur_preserves_constant_fields() {
    let kernel = fourier_conv::create_gaussian_kernel(&ArrayImgFactory, &[1.2, 0.7]);
    let out = convolve(Img::from_vec(&[10, 9], vec![4.0; 90]).unwrap(), kernel);
    assert!(out.as_slice().iter().all(|v| (v - 4.0).abs() < 1e-4));
}

#[derive(Debug)]
struct PlainFactory;

impl ImgFactory<f32> for PlainFactory {
    fn create(&self, dims: &[usize]) -> Img<f32> {
        Img::from_parts(
            dims.to_vec(),
            vec![0; dims.len()],
            vec![0.0; element_count(dims)],
            Arc::new(PlainFactory),
        )
    }
}

#[test]
fn factory_without_complex_support_is_reported() {
    let mut image = PlainFactory.create(&[4, 4]);
    image.as_mut_slice().copy_from_slice(&[1.0; 16]);
    let kernel = identity(&[3, 3], 1.0);
    assert!(matches!(
        FourierConvolution::new(image.clone(), kernel.clone()),
        Err(ConvolutionError::IncompatibleType)
    ));

    let mut conv = FourierConvolution::with_fft_factory(image, kernel, Arc::new(ArrayImgFactory));
    conv.process().expect("Invariant: operation should succeed");
    let out = conv.result().unwrap();
    assert_eq!(format!("{:?}", out.factory()), "PlainFactory");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Healthy,
    Image,
    Kernel,
    Inverse,
}

/// Engine that records forward inputs and can fail one pipeline stage.
struct ProbeEngine {
    forwards: RefCell<Vec<Vec<usize>>>,
    failing: Cell<Stage>,
}

impl ProbeEngine {
    fn new() -> Self {
        Self {
            forwards: RefCell::new(Vec::new()),
            failing: Cell::new(Stage::Healthy),
        }
    }

    fn forward_count(&self) -> usize {
        self.forwards.borrow().len()
    }
}

struct ProbeForward {
    inner: Box<dyn ForwardTransform>,
    failing: Stage,
}

impl ForwardTransform for ProbeForward {
    fn set_preprocessing(&mut self, preprocessing: PreProcessing) {
        self.inner.set_preprocessing(preprocessing)
    }
    fn preprocessing(&self) -> PreProcessing {
        self.inner.preprocessing()
    }
    fn set_rearrangement(&mut self, rearrangement: Rearrangement) {
        self.inner.set_rearrangement(rearrangement)
    }
    fn rearrangement(&self) -> Rearrangement {
        self.inner.rearrangement()
    }
    fn set_image_extension(&mut self, extension: &[usize]) {
        self.inner.set_image_extension(extension)
    }
    fn set_num_threads(&mut self, threads: usize) {
        self.inner.set_num_threads(threads)
    }
    fn num_threads(&self) -> usize {
        self.inner.num_threads()
    }
    fn check_input(&self) -> Result<(), TransformError> {
        self.inner.check_input()
    }
    fn process(&mut self) -> Result<(), TransformError> {
        let stage = match self.inner.preprocessing() {
            PreProcessing::ExtendMirror => Stage::Image,
            _ => Stage::Kernel,
        };
        if stage == self.failing {
            return Err(TransformError::MissingResult);
        }
        self.inner.process()
    }
    fn processing_time(&self) -> Duration {
        self.inner.processing_time()
    }
    fn result(&self) -> Option<&Spectrum> {
        self.inner.result()
    }
    fn into_result(self: Box<Self>) -> Option<Spectrum> {
        self.inner.into_result()
    }
}

struct ProbeInverse<T> {
    inner: Box<dyn InverseTransform<T>>,
    fail: bool,
}

impl<T: RealSample> InverseTransform<T> for ProbeInverse<T> {
    fn set_num_threads(&mut self, threads: usize) {
        self.inner.set_num_threads(threads)
    }
    fn num_threads(&self) -> usize {
        self.inner.num_threads()
    }
    fn check_input(&self) -> Result<(), TransformError> {
        self.inner.check_input()
    }
    fn process(&mut self) -> Result<(), TransformError> {
        if self.fail {
            return Err(TransformError::EmptyInput);
        }
        self.inner.process()
    }
    fn processing_time(&self) -> Duration {
        self.inner.processing_time()
    }
    fn result(&self) -> Option<&Img<T>> {
        self.inner.result()
    }
    fn into_result(self: Box<Self>) -> Option<Img<T>> {
        self.inner.into_result()
    }
}

impl FourierEngine for ProbeEngine {
    fn forward<T: RealSample>(
        &self,
        input: Arc<Img<T>>,
        factory: Arc<dyn ImgFactory<Complex32>>,
    ) -> Box<dyn ForwardTransform> {
        self.forwards.borrow_mut().push(input.dims().to_vec());
        Box::new(ProbeForward {
            inner: ScalarEngine.forward(input, factory),
            failing: self.failing.get(),
        })
    }

    fn inverse<T: RealSample>(
        &self,
        spectrum: Spectrum,
        factory: Arc<dyn ImgFactory<T>>,
    ) -> Box<dyn InverseTransform<T>> {
        Box::new(ProbeInverse {
            inner: ScalarEngine.inverse(spectrum, factory),
            fail: self.failing.get() == Stage::Inverse,
        })
    }
}

fn probed(image: Img<f32>, kernel: Img<f32>) -> FourierConvolution<f32, f32, ProbeEngine> {
    let factory: Arc<ArrayImgFactory> = Arc::new(ArrayImgFactory);
    FourierConvolution::with_engine(
        ProbeEngine::new(),
        image,
        kernel,
        factory.clone(),
        factory.clone(),
        factory,
    )
}

#[test]
fn replacing_the_kernel_reuses_the_image_spectrum() {
    let mut conv = probed(pattern(&[12, 7]), identity(&[3, 3], 1.0));
    conv.check_input()
        .expect("Invariant: operation should succeed");
    conv.process().expect("Invariant: operation should succeed");
    assert_eq!(conv.engine().forward_count(), 2);

    conv.replace_kernel(identity(&[5, 3], 3.0));
    conv.check_input()
        .expect("Invariant: operation should succeed");
    conv.process().expect("Invariant: operation should succeed");
    assert_eq!(conv.engine().forward_count(), 3);
    let last = conv.engine().forwards.borrow().last().cloned().unwrap();
    assert_eq!(last, vec![16, 16]);
    let expected: Vec<f32> = pattern(&[12, 7]).as_slice().iter().map(|v| v * 3.0).collect();
    assert_close(conv.result().unwrap().as_slice(), &expected, 1e-4);

    // processing again without changes transforms nothing
    conv.process().expect("Invariant: operation should succeed");
    assert_eq!(conv.engine().forward_count(), 3);
}

#[test]
fn replacing_the_image_reuses_the_kernel_spectrum() {
    let kernel = fourier_conv::create_gaussian_kernel_isotropic(&ArrayImgFactory, 0.8, 2);
    let mut conv = probed(pattern(&[10, 10]), kernel.clone());
    conv.process().expect("Invariant: operation should succeed");
    assert_eq!(conv.engine().forward_count(), 2);

    let next = Img::from_fn(&[10, 10], |p| (p[0] * p[1]) as f32);
    conv.replace_input(next.clone());
    assert!(!conv.has_image_spectrum());
    assert!(conv.has_kernel_spectrum());
    conv.process().expect("Invariant: operation should succeed");
    assert_eq!(conv.engine().forward_count(), 3);
    assert_eq!(conv.engine().forwards.borrow()[2], vec![10, 10]);
    assert_close(
        conv.result().unwrap().as_slice(),
        &direct_convolution(&next, &kernel),
        1e-4,
    );
}

#[test]
fn replacing_the_image_with_another_shape_rebuilds_the_kernel_spectrum() {
    let mut conv = probed(pattern(&[6, 6]), identity(&[3, 3], 1.0));
    conv.process().expect("Invariant: operation should succeed");
    let larger = pattern(&[20, 9]);
    conv.replace_input(larger.clone());
    conv.process().expect("Invariant: operation should succeed");
    assert_eq!(conv.engine().forward_count(), 4);
    assert_eq!(conv.result().unwrap().dims(), &[20, 9]);
    assert_close(conv.result().unwrap().as_slice(), larger.as_slice(), 1e-4);
}

#[test]
fn kernel_failure_keeps_image_spectrum_for_retry() {
    let mut conv = probed(pattern(&[8, 5]), identity(&[3, 3], 1.0));
    conv.engine().failing.set(Stage::Kernel);
    let err = conv.process().unwrap_err();
    assert_eq!(err, ConvolutionError::KernelFft(TransformError::MissingResult));
    assert!(err.to_string().starts_with("FFT of kernel failed: "));
    assert_eq!(conv.last_error(), Some(&err));
    assert!(conv.has_image_spectrum());
    assert!(!conv.has_kernel_spectrum());
    assert!(conv.result().is_none());

    conv.engine().failing.set(Stage::Healthy);
    conv.process().expect("Invariant: operation should succeed");
    assert!(conv.last_error().is_none());
    // image once, kernel twice
    assert_eq!(conv.engine().forward_count(), 3);
}

#[test]
fn image_failure_caches_nothing() {
    let mut conv = probed(pattern(&[8, 5]), identity(&[3, 3], 1.0));
    conv.engine().failing.set(Stage::Image);
    let err = conv.process().unwrap_err();
    assert!(matches!(err, ConvolutionError::ImageFft(_)));
    assert!(err.to_string().starts_with("FFT of image failed: "));
    assert!(!conv.has_image_spectrum());
    assert!(!conv.has_kernel_spectrum());
    assert_eq!(conv.engine().forward_count(), 1);
}

#[test]
fn inverse_failure_keeps_the_previous_result() {
    let mut conv = probed(pattern(&[8, 5]), identity(&[3, 3], 1.0));
    conv.process().expect("Invariant: operation should succeed");
    let before = conv.result().cloned().expect("Invariant: operation should succeed");
    let time_before = conv.processing_time();

    conv.engine().failing.set(Stage::Inverse);
    let err = conv.process().unwrap_err();
    assert_eq!(err, ConvolutionError::InverseFft(TransformError::EmptyInput));
    assert_eq!(err.to_string(), "InverseFFT of image failed: input is empty");
    assert_eq!(conv.last_error(), Some(&err));
    assert_eq!(conv.result(), Some(&before));
    assert_eq!(conv.processing_time(), time_before);
    assert!(conv.has_image_spectrum());
    assert!(conv.has_kernel_spectrum());

    conv.engine().failing.set(Stage::Healthy);
    conv.process().expect("Invariant: operation should succeed");
    assert!(conv.last_error().is_none());
    assert_eq!(conv.engine().forward_count(), 2);
}

#[test]
fn kernel_failure_after_success_keeps_the_previous_result() {
    let mut conv = probed(pattern(&[6, 6]), identity(&[3, 3], 2.0));
    conv.process().expect("Invariant: operation should succeed");
    let before = conv.result().cloned().expect("Invariant: operation should succeed");

    conv.replace_kernel(identity(&[3, 3], 5.0));
    conv.engine().failing.set(Stage::Kernel);
    assert!(matches!(conv.process(), Err(ConvolutionError::KernelFft(_))));
    assert_eq!(conv.result(), Some(&before));
}

#[cfg(feature = "std")]
#[test]
fn processing_time_is_recorded_for_each_run() {
    let mut conv = FourierConvolution::new(pattern(&[64, 48]), identity(&[7, 5], 1.0))
        .expect("Invariant: operation should succeed");
    assert_eq!(conv.processing_time(), Duration::ZERO);
    conv.check_input()
        .expect("Invariant: operation should succeed");
    conv.process().expect("Invariant: operation should succeed");
    assert!(conv.processing_time() > Duration::ZERO);

    conv.replace_kernel(identity(&[5, 5], 1.0));
    conv.process().expect("Invariant: operation should succeed");
    assert!(conv.processing_time() > Duration::ZERO);
}

#[test]
fn thread_count_is_configurable() {
    let mut conv = FourierConvolution::new(pattern(&[16, 16]), identity(&[5, 5], 1.0))
        .expect("Invariant: operation should succeed");
    assert_eq!(conv.num_threads(), fourier_conv::parallel::default_num_threads());
    conv.set_num_threads(3);
    assert_eq!(conv.num_threads(), 3);
    conv.process().expect("Invariant: operation should succeed");
    assert_close(
        conv.result().unwrap().as_slice(),
        pattern(&[16, 16]).as_slice(),
        1e-4,
    );
    conv.set_num_threads(0);
    assert_eq!(conv.num_threads(), 1);
}
