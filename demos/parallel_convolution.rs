use fourier_conv::{create_gaussian_kernel_isotropic, ArrayImgFactory, FourierConvolution, Img};
use std::time::Instant;

fn main() {
    let image = Img::from_fn(&[256, 256], |p| ((p[0] * 31 + p[1] * 17) % 255) as f32);
    let kernel = create_gaussian_kernel_isotropic(&ArrayImgFactory, 4.0, 2);

    for threads in [1, fourier_conv::parallel::default_num_threads()] {
        let mut conv = FourierConvolution::new(image.clone(), kernel.clone()).unwrap();
        conv.set_num_threads(threads);
        conv.check_input().unwrap();
        let start = Instant::now();
        conv.process().unwrap();
        println!("{:>2} thread(s): {:?}", conv.num_threads(), start.elapsed());
    }
}
