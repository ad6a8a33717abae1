//! Image path validation and output path derivation
//!
//! Input images are identified purely by the text after the last `.` of the
//! path string. Output paths are produced by inserting [`OUTPUT_SUFFIX`]
//! right before that extension.

use crate::error::{BgRemovalError, Result};
use image::ImageFormat;
use std::path::Path;

/// Extensions accepted as input images (matched case-insensitively)
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Literal inserted before the extension of every output file
pub const OUTPUT_SUFFIX: &str = "_NO_BG";

/// Normalized input path and the output path derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Input path with every `\` replaced by `/`
    pub input: String,
    /// Input path with [`OUTPUT_SUFFIX`] inserted before the extension
    pub output: String,
}

/// Resolver for image input paths and their output counterparts
pub struct ImagePathResolver;

impl ImagePathResolver {
    /// Extract and validate the extension of an image path
    ///
    /// Returns the extension exactly as it appears in `path` (original case).
    ///
    /// # Errors
    /// - `path` contains no `.`
    /// - the lowercased extension is not one of [`ACCEPTED_EXTENSIONS`]
    ///
    /// # Examples
    /// ```rust
    /// use nobg::utils::ImagePathResolver;
    ///
    /// assert_eq!(ImagePathResolver::classify("Photo.JPG").unwrap(), "JPG");
    /// assert!(ImagePathResolver::classify("dog.png.mov").is_err());
    /// ```
    pub fn classify(path: &str) -> Result<&str> {
        let dot_pos = path.rfind('.').ok_or_else(|| {
            BgRemovalError::invalid_path(format!("'{}' has no file extension", path))
        })?;

        let extension = path.get(dot_pos + 1..).unwrap_or_default();
        if !Self::is_accepted_extension(extension) {
            return Err(BgRemovalError::invalid_path(format!(
                "Unsupported image extension '{}' in '{}'. Expected one of: {}",
                extension,
                path,
                ACCEPTED_EXTENSIONS.join(", ")
            )));
        }

        Ok(extension)
    }

    /// Same as [`Self::classify`] for a filesystem path
    ///
    /// # Errors
    /// - the path is not valid UTF-8
    /// - any error from [`Self::classify`]
    pub fn classify_path(path: &Path) -> Result<&str> {
        let path_str = path.to_str().ok_or_else(|| {
            BgRemovalError::invalid_path(format!(
                "'{}' is not a valid UTF-8 path",
                path.display()
            ))
        })?;
        Self::classify(path_str)
    }

    /// Check an extension (without the dot) against [`ACCEPTED_EXTENSIONS`]
    #[must_use]
    pub fn is_accepted_extension(extension: &str) -> bool {
        ACCEPTED_EXTENSIONS
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(extension))
    }

    /// Normalize an input path and derive its output path
    ///
    /// Backslashes become forward slashes in both paths. The extension keeps
    /// its original case. Applying this to its own output is NOT idempotent:
    /// `img_NO_BG.png` yields `img_NO_BG_NO_BG.png`.
    ///
    /// # Errors
    /// - any error from [`Self::classify`]
    ///
    /// # Examples
    /// ```rust
    /// use nobg::utils::ImagePathResolver;
    ///
    /// let paths = ImagePathResolver::derive_output_path("a\\b\\img.PNG").unwrap();
    /// assert_eq!(paths.input, "a/b/img.PNG");
    /// assert_eq!(paths.output, "a/b/img_NO_BG.PNG");
    /// ```
    pub fn derive_output_path(path: &str) -> Result<ResolvedPaths> {
        let extension = Self::classify(path)?;
        let input = path.replace('\\', "/");

        // Both separators are one byte wide, so offsets into `path` hold for `input`
        let stem_end = input.len() - extension.len() - 1;
        let stem = input.get(..stem_end).unwrap_or_default();
        let output = format!("{}{}.{}", stem, OUTPUT_SUFFIX, extension);

        Ok(ResolvedPaths { input, output })
    }

    /// Encoder format for an accepted extension
    ///
    /// # Errors
    /// - the extension is not one of [`ACCEPTED_EXTENSIONS`]
    pub fn image_format(extension: &str) -> Result<ImageFormat> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            other => Err(BgRemovalError::invalid_path(format!(
                "No encoder for extension '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_accepts_all_cases() {
        for ext in ACCEPTED_EXTENSIONS {
            let lower = format!("image.{}", ext);
            let upper = format!("image.{}", ext.to_uppercase());
            assert_eq!(ImagePathResolver::classify(&lower).unwrap(), *ext);
            assert_eq!(
                ImagePathResolver::classify(&upper).unwrap(),
                ext.to_uppercase()
            );
        }
        assert_eq!(ImagePathResolver::classify("x.JpEg").unwrap(), "JpEg");
    }

    #[test]
    fn test_classify_rejections() {
        let invalid = [
            "",
            "cat",
            "CS50",
            "u2net_human_seg.pthhah",
            "u2net_human_seg.pth/png",
            ".pth.",
            ".pth.pth!",
            ".pth\\",
            "u2net_human_seg.pth and ML",
            "jpg",
            "jpeg",
            "png",
            "catpng",
            "dog.png.",
            "./dog.png.mov",
            "./somefolder/dog.png.gif",
            "dog.mov",
        ];

        for path in invalid {
            let result = ImagePathResolver::classify(path);
            assert!(
                matches!(result, Err(BgRemovalError::InvalidPath(_))),
                "Path should be rejected: {:?}",
                path
            );
        }
    }

    #[test]
    fn test_derive_output_path_table() {
        let cases = [
            ("my_image.jpg", "my_image.jpg", "my_image_NO_BG.jpg"),
            ("my_image.jpeg", "my_image.jpeg", "my_image_NO_BG.jpeg"),
            ("my_image.png", "my_image.png", "my_image_NO_BG.png"),
            ("path/to/myimg.jpg", "path/to/myimg.jpg", "path/to/myimg_NO_BG.jpg"),
            ("./my_image.png", "./my_image.png", "./my_image_NO_BG.png"),
            (".\\my_image.jpg", "./my_image.jpg", "./my_image_NO_BG.jpg"),
            (".\\my.image.jpeg", "./my.image.jpeg", "./my.image_NO_BG.jpeg"),
            (".\\etc\\my.img.png", "./etc/my.img.png", "./etc/my.img_NO_BG.png"),
            ("a\\b\\img.PNG", "a/b/img.PNG", "a/b/img_NO_BG.PNG"),
            ("Photo.JPG", "Photo.JPG", "Photo_NO_BG.JPG"),
        ];

        for (raw, input, output) in cases {
            let resolved = ImagePathResolver::derive_output_path(raw).unwrap();
            assert_eq!(resolved.input, input, "input for {}", raw);
            assert_eq!(resolved.output, output, "output for {}", raw);
        }
    }

    #[test]
    fn test_derive_output_path_is_not_idempotent() {
        let first = ImagePathResolver::derive_output_path("dir/img.png").unwrap();
        assert_ne!(first.output, first.input);

        let second = ImagePathResolver::derive_output_path(&first.output).unwrap();
        assert_eq!(second.input, first.output);
        assert_eq!(second.output, "dir/img_NO_BG_NO_BG.png");
        assert_ne!(second.output, first.output);
    }

    #[test]
    fn test_derive_output_path_rejects_before_normalizing() {
        assert!(ImagePathResolver::derive_output_path("a\\b\\img.gif").is_err());
        assert!(ImagePathResolver::derive_output_path("a\\b\\img").is_err());
    }

    #[test]
    fn test_image_format() {
        assert_eq!(
            ImagePathResolver::image_format("JPG").unwrap(),
            ImageFormat::Jpeg
        );
        assert_eq!(
            ImagePathResolver::image_format("jpeg").unwrap(),
            ImageFormat::Jpeg
        );
        assert_eq!(
            ImagePathResolver::image_format("Png").unwrap(),
            ImageFormat::Png
        );
        assert!(ImagePathResolver::image_format("gif").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_path_rejects_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"img\xff.png");
        let result = ImagePathResolver::classify_path(Path::new(raw));
        assert!(matches!(result, Err(BgRemovalError::InvalidPath(_))));

        assert_eq!(
            ImagePathResolver::classify_path(Path::new("ok.png")).unwrap(),
            "png"
        );
    }
}
