//! Preprocessing functions for input data for the ResNet50 model.
//! Images are resized to the network's input resolution and normalized the way
//! the network was trained: RGB converted to BGR and zero-centered on the ImageNet
//! channel means, without scaling.

use std::path::{Path, PathBuf};
use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

pub const IMAGE_INPUT_SIZE: usize = 224;
/// Output channel count of ResNet50 after global average pooling.
pub const FEATURE_VECTOR_LENGTH: usize = 2048;
/// ImageNet channel means in BGR order.
pub const BGR_MEAN: [f32; 3] = [103.939, 116.779, 123.68];

/// Loads and preprocesses a single image into a (1, 224, 224, 3) tensor.
pub fn load_image(path: &Path) -> anyhow::Result<Array4<f32>>
{
    let img = image::open(path)
        .map_err(|e| anyhow::anyhow!("Error loading image: {:?} {:?}", path, e))?;
    let img = resize_image(&img);
    Ok(image_to_resnet_format(&img))
}

/// Loads the images in parallel. Results are in the same order as `paths`,
/// and a failure for one path does not affect the others.
pub fn load_image_batch(paths: &[PathBuf]) -> Vec<(PathBuf, anyhow::Result<Array4<f32>>)>
{
    paths.par_iter()
        .map(|path| (path.clone(), load_image(path)))
        .collect::<Vec<(PathBuf, anyhow::Result<Array4<f32>>)>>()
}

/// Resizes to the exact input resolution. Aspect ratio is not preserved.
pub fn resize_image(img: &DynamicImage) -> DynamicImage
{
    img.resize_exact(IMAGE_INPUT_SIZE as u32, IMAGE_INPUT_SIZE as u32, FilterType::Nearest)
}

// Convert the image to the NHWC layout expected by the Keras-exported ResNet50
pub fn image_to_resnet_format(img: &DynamicImage) -> Array4<f32>
{
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut image_input = Array4::zeros((1, height as usize, width as usize, 3));
    for (x, y, pixel) in rgb.enumerate_pixels()
    {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        image_input[[0, y, x, 0]] = (b as f32) - BGR_MEAN[0];
        image_input[[0, y, x, 1]] = (g as f32) - BGR_MEAN[1];
        image_input[[0, y, x, 2]] = (r as f32) - BGR_MEAN[2];
    }

    image_input
}
