//! Image I/O operations service
//!
//! This module separates file I/O operations from business logic,
//! making the system more testable and maintainable.

use crate::error::{BgRemovalError, Result};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::{Cursor, Write};
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Read a whole input file into memory
    ///
    /// # Errors
    /// - the file does not exist or cannot be read
    pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path_ref = path.as_ref();
        std::fs::read(path_ref)
            .map_err(|e| BgRemovalError::file_io_error("read image file", path_ref, &e))
    }

    /// Decode an image from bytes
    ///
    /// # Errors
    /// - the bytes are not a decodable image
    ///
    /// # Examples
    /// ```rust,no_run
    /// use nobg::services::ImageIOService;
    ///
    /// let image_data = std::fs::read("input.jpg")?;
    /// let image = ImageIOService::load_from_bytes(&image_data)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| {
            BgRemovalError::removal_stage_error(
                "decode",
                &e.to_string(),
                Some(&format!("{} bytes", bytes.len())),
            )
        })
    }

    /// Encode an opaque RGB image into `format`
    ///
    /// # Errors
    /// - the encoder rejects the image
    pub fn encode(image: &RgbImage, format: ImageFormat) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).map_err(|e| {
            BgRemovalError::removal_stage_error(
                "encode",
                &e.to_string(),
                Some(&format!("format: {:?}", format)),
            )
        })?;
        Ok(buffer.into_inner())
    }

    /// Write bytes to `path`, replacing any existing file
    ///
    /// The data goes to a temporary file in the same directory first and is
    /// renamed over `path` only after it has been flushed, so a failure never
    /// leaves a truncated output behind.
    ///
    /// # Errors
    /// - the directory is not writable or the rename fails
    pub fn write_atomically<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
        let path_ref = path.as_ref();
        let directory = match path_ref.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut staging = tempfile::Builder::new()
            .prefix(".nobg-")
            .tempfile_in(directory)
            .map_err(|e| BgRemovalError::file_io_error("create staging file", directory, &e))?;

        staging
            .write_all(data)
            .and_then(|()| staging.flush())
            .map_err(|e| BgRemovalError::file_io_error("write output image", path_ref, &e))?;

        staging
            .persist(path_ref)
            .map_err(|e| BgRemovalError::file_io_error("replace output image", path_ref, &e.error))?;

        log::debug!("Wrote {} bytes to {}", data.len(), path_ref.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_bytes_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = ImageIOService::read_bytes(temp_dir.path().join("missing.png"));
        assert!(matches!(result, Err(BgRemovalError::Io(_))));
    }

    #[test]
    fn test_load_from_bytes_rejects_garbage() {
        let result = ImageIOService::load_from_bytes(b"definitely not an image");
        assert!(matches!(result, Err(BgRemovalError::Removal(_))));
    }

    #[test]
    fn test_encode_then_decode_keeps_dimensions() {
        let image = RgbImage::from_pixel(7, 5, Rgb([200, 10, 10]));
        for format in [ImageFormat::Png, ImageFormat::Jpeg] {
            let bytes = ImageIOService::encode(&image, format).unwrap();
            let decoded = ImageIOService::load_from_bytes(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (7, 5));
        }
    }

    #[test]
    fn test_write_atomically_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out_NO_BG.png");
        fs::write(&target, b"old contents that are longer").unwrap();

        ImageIOService::write_atomically(&target, b"new").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");

        let entries = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(entries, 1, "no staging file should remain");
    }

    #[test]
    fn test_write_atomically_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("missing").join("out.png");
        assert!(ImageIOService::write_atomically(&target, b"data").is_err());
        assert!(!target.exists());
    }
}
