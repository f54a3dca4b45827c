use crate::error::PredictionError;
use image::imageops::{self, FilterType};
use ndarray::{Array, Ix4};

pub const INPUT_WIDTH: u32 = 224;
pub const INPUT_HEIGHT: u32 = 224;
pub const INPUT_CHANNELS: usize = 3;

/// Decodes an uploaded image into the `(1, 3, 224, 224)` tensor the classifier expects.
///
/// The image is stretched to the input size without keeping its aspect ratio and
/// pixel values are scaled to `[0, 1]`; the model was trained on exactly this.
pub fn transform_image(image_data: &[u8]) -> Result<Array<f32, Ix4>, PredictionError> {
    let image_reader =
        image::ImageReader::new(std::io::Cursor::new(image_data)).with_guessed_format()?;
    let original_img = image_reader.decode()?;

    let (width, height) = (original_img.width(), original_img.height());
    if width == 0 || height == 0 {
        return Err(PredictionError::EmptyImage { width, height });
    }

    let rgb = original_img.to_rgb8();
    let img = imageops::resize(&rgb, INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle);

    let input = Array::from_shape_fn(
        (
            1,
            INPUT_CHANNELS,
            INPUT_HEIGHT as usize,
            INPUT_WIDTH as usize,
        ),
        |(_, c, y, x)| f32::from(img.get_pixel(x as u32, y as u32)[c]) / 255.,
    );

    Ok(input)
}
