//! Output format handling service
//!
//! Flattens segmentation output onto an opaque white canvas and picks the
//! encoder from the output path extension.

use crate::{error::Result, utils::ImagePathResolver};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Fill color used behind transparent pixels
pub const BACKGROUND_FILL: [u8; 3] = [255, 255, 255];

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Composite an image onto an opaque white canvas of the same size
    ///
    /// Images with an alpha channel (RGBA or luminance-alpha) are blended
    /// using alpha as the mask. Images without alpha are only converted to RGB.
    ///
    /// # Examples
    /// ```rust
    /// use nobg::services::OutputFormatHandler;
    /// use image::{DynamicImage, Rgba, RgbaImage};
    ///
    /// let transparent = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
    /// let flat = OutputFormatHandler::flatten_onto_white(&DynamicImage::ImageRgba8(transparent));
    /// assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
    /// ```
    #[must_use]
    pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
        if !image.color().has_alpha() {
            return image.to_rgb8();
        }

        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut canvas = RgbImage::from_pixel(width, height, Rgb(BACKGROUND_FILL));

        for (x, y, pixel) in rgba.enumerate_pixels() {
            let alpha = u16::from(pixel[3]);
            let blended = [0usize, 1, 2].map(|channel| {
                let fg = u16::from(pixel[channel]);
                let bg = u16::from(BACKGROUND_FILL[channel]);
                ((fg * alpha + bg * (255 - alpha) + 127) / 255) as u8
            });
            canvas.put_pixel(x, y, Rgb(blended));
        }

        canvas
    }

    /// Encoder format for an output path, from its extension
    ///
    /// # Errors
    /// - the path extension is not one of the accepted image extensions
    pub fn format_for_path(path: &str) -> Result<ImageFormat> {
        let extension = ImagePathResolver::classify(path)?;
        ImagePathResolver::image_format(extension)
    }
}
