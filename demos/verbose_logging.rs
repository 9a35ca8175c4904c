//! Demonstrates enabling verbose logging for fourier-conv.
use fourier_conv::{create_gaussian_kernel_isotropic, ArrayImgFactory, FourierConvolution, Img};

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let image = Img::from_fn(&[9, 7, 5], |p| (p[0] + 2 * p[1] + 3 * p[2]) as f32);
    let kernel = create_gaussian_kernel_isotropic(&ArrayImgFactory, 0.8, 3);
    let mut conv = FourierConvolution::new(image, kernel).unwrap();
    conv.check_input().unwrap();
    conv.process().unwrap();
    conv.replace_input(Img::from_fn(&[9, 7, 5], |p| (p[0] * p[1]) as f32));
    conv.process().unwrap();
}
