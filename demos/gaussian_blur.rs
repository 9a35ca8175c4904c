//! Gaussian blur of a synthetic 2-D image, then a second kernel applied to
//! the same image without transforming it again.

use fourier_conv::{
    create_gaussian_kernel, create_gaussian_kernel_isotropic, ArrayImgFactory, FourierConvolution,
    Img,
};

fn print_row(label: &str, img: &Img<f32>, y: usize) {
    let w = img.dimension(0);
    let row: Vec<String> = (0..w)
        .map(|x| format!("{:5.2}", img.get_local(&[x, y])))
        .collect();
    println!("{:>10}: {}", label, row.join(" "));
}

fn main() {
    println!("=== fourier-conv Gaussian blur ===\n");

    // 16x12 checkerboard of 4x4 tiles
    let image = Img::from_fn(&[16, 12], |p| ((p[0] / 4 + p[1] / 4) % 2) as f32);
    let kernel = create_gaussian_kernel_isotropic(&ArrayImgFactory, 1.0, 2);
    println!("kernel extents: {:?}", kernel.dims());

    let mut conv = FourierConvolution::new(image.clone(), kernel).unwrap();
    conv.check_input().unwrap();
    conv.process().unwrap();
    print_row("input", &image, 5);
    print_row("sigma 1", conv.result().unwrap(), 5);
    println!("first run: {:?}", conv.processing_time());

    // anisotropic kernel, image spectrum reused
    conv.replace_kernel(create_gaussian_kernel(&ArrayImgFactory, &[2.0, 0.5]));
    conv.check_input().unwrap();
    conv.process().unwrap();
    print_row("sigma 2x.5", conv.result().unwrap(), 5);
    println!("kernel swap: {:?}", conv.processing_time());
}
