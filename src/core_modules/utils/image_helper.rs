pub mod image_helper {
    use crate::core_modules::stage_result::ColorSpace;
    use image::codecs::png::PngEncoder;
    use image::{DynamicImage, ImageEncoder, RgbImage};
    use std::io::BufWriter;
    use std::path::Path;

    /// Swaps the first and third channel of every pixel (RGB <-> BGR).
    pub fn swap_red_blue(mut image: RgbImage) -> RgbImage {
        for pixel in image.pixels_mut() {
            pixel.0.swap(0, 2);
        }
        image
    }

    /// Brings an image into a buffer layout PNG can encode with RGB channel order.
    fn to_png_layout(image: &DynamicImage, color_space: ColorSpace) -> DynamicImage {
        match (image, color_space) {
            (_, ColorSpace::Bgr | ColorSpace::Bgra) => DynamicImage::ImageRgb8(swap_red_blue(image.to_rgb8())),
            (DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_), _) => {
                DynamicImage::ImageRgba8(image.to_rgba8())
            }
            _ => image.clone(),
        }
    }

    /// Writes `image` to `path` as PNG.
    pub fn save(path: &Path, image: &DynamicImage, color_space: ColorSpace) -> Result<(), image::error::ImageError> {
        let image = to_png_layout(image, color_space);
        let output = BufWriter::new(std::fs::File::create(path)?);
        let encoder = PngEncoder::new(output);

        encoder.write_image(image.as_bytes(), image.width(), image.height(), image.color().into())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::image_helper::*;
    use crate::core_modules::stage_result::ColorSpace;
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn save_white_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("white_file.png");
        let buffer = RgbImage::from_pixel(50, 20, Rgb([255, 255, 255]));

        save(&path, &DynamicImage::ImageRgb8(buffer), ColorSpace::Rgb).expect("Error Saving File.");

        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (50, 20));
    }

    #[test]
    fn save_gradient_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient_file.png");
        let mut buffer = GrayImage::new(255, 4);
        for (x, _, pixel) in buffer.enumerate_pixels_mut() {
            *pixel = Luma([x as u8]);
        }

        save(&path, &DynamicImage::ImageLuma8(buffer.clone()), ColorSpace::Gray).expect("Error Saving File.");

        assert_eq!(image::open(&path).unwrap().to_luma8(), buffer);
    }

    #[test]
    fn bgr_is_written_in_rgb_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bgr_file.png");
        let buffer = RgbImage::from_pixel(1, 1, Rgb([1, 2, 3]));

        save(&path, &DynamicImage::ImageRgb8(buffer), ColorSpace::Bgr).expect("Error Saving File.");

        assert_eq!(image::open(&path).unwrap().to_rgb8().get_pixel(0, 0).0, [3, 2, 1]);
    }

    #[test]
    fn swap_is_an_involution() {
        let buffer = RgbImage::from_pixel(2, 2, Rgb([9, 8, 7]));
        assert_eq!(swap_red_blue(swap_red_blue(buffer.clone())), buffer);
    }
}
