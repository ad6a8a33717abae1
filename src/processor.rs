//! Background removal for a single image
//!
//! [`BackgroundRemover`] wraps the external segmentation call: it reads the
//! input, lets the service cut the subject out, flattens the transparent
//! result onto white and writes `<stem>_NO_BG.<ext>` next to the input.

use crate::{
    config::ModelReference,
    error::{BgRemovalError, Result},
    inference::SegmentationService,
    services::{ImageIOService, OutputFormatHandler},
    utils::{ImagePathResolver, ResolvedPaths},
};
use std::sync::Arc;
use tracing::{debug, instrument, span, Level};

/// Removes the background of one image and writes the flattened result
#[derive(Clone)]
pub struct BackgroundRemover {
    service: Arc<dyn SegmentationService>,
}

impl std::fmt::Debug for BackgroundRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemover")
            .field("service", &self.service.name())
            .finish()
    }
}

impl BackgroundRemover {
    /// Create a remover on top of a segmentation service
    pub fn new(service: Arc<dyn SegmentationService>) -> Self {
        Self { service }
    }

    /// The segmentation service in use
    #[must_use]
    pub fn service(&self) -> &Arc<dyn SegmentationService> {
        &self.service
    }

    /// Remove the background of `input_path` and write the output file
    ///
    /// The output path is derived with [`ImagePathResolver::derive_output_path`]
    /// and any existing file there is replaced. The input file is never
    /// modified.
    ///
    /// # Errors
    /// - `InvalidPath` before any I/O when the extension is not accepted
    /// - `Removal` for read, segmentation, decode, encode or write failures
    #[instrument(skip(self, model), fields(service = %self.service.name()))]
    pub fn remove(
        &self,
        input_path: &str,
        model: &ModelReference,
        alpha_matting: bool,
    ) -> Result<ResolvedPaths> {
        let paths = ImagePathResolver::derive_output_path(input_path)?;
        let format = OutputFormatHandler::format_for_path(&paths.output)?;

        let input_bytes =
            ImageIOService::read_bytes(&paths.input).map_err(in_stage("read", &paths.input))?;

        let segmented = {
            let _span = span!(Level::DEBUG, "segmentation", bytes = input_bytes.len()).entered();
            self.service
                .remove(&input_bytes, alpha_matting, model)
                .map_err(in_stage("segmentation", &paths.input))?
        };

        let decoded = ImageIOService::load_from_bytes(&segmented)
            .map_err(in_stage("decode", &paths.input))?;
        debug!(
            width = decoded.width(),
            height = decoded.height(),
            has_alpha = decoded.color().has_alpha(),
            "Decoded segmentation output"
        );

        let flattened = OutputFormatHandler::flatten_onto_white(&decoded);
        let encoded =
            ImageIOService::encode(&flattened, format).map_err(in_stage("encode", &paths.input))?;

        ImageIOService::write_atomically(&paths.output, &encoded)
            .map_err(in_stage("write", &paths.input))?;

        debug!(output = %paths.output, "Background removed");
        Ok(paths)
    }
}

/// Turn any failure after validation into a `Removal` error tagged with its stage
fn in_stage<'a>(stage: &'a str, input: &'a str) -> impl FnOnce(BgRemovalError) -> BgRemovalError + 'a {
    move |error| match error {
        BgRemovalError::Removal(_) => error,
        other => BgRemovalError::removal_stage_error(stage, &other.to_string(), Some(input)),
    }
}
