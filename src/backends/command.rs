//! External-program segmentation backend
//!
//! Pipes image bytes through a `rembg`-compatible command line program:
//! `<program> i [-a] -m <model> - -`, with `U2NET_HOME` pointing at the
//! directory that holds the model file.

use crate::{
    config::ModelReference,
    error::{BgRemovalError, Result},
    inference::SegmentationService,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Default program name looked up on `PATH`
pub const DEFAULT_PROGRAM: &str = "rembg";

/// Segmentation service backed by an external program
#[derive(Debug, Clone)]
pub struct CommandSegmentationService {
    program: PathBuf,
}

impl Default for CommandSegmentationService {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl CommandSegmentationService {
    /// Create a service running `program`
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program this service runs
    #[must_use]
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Assemble the command for one removal call
    fn build_command(&self, alpha_matting: bool, model: &ModelReference) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("i");
        if alpha_matting {
            command.arg("-a");
        }
        command
            .arg("-m")
            .arg(model.model_name())
            .arg("-")
            .arg("-")
            .env("U2NET_HOME", model.directory())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl SegmentationService for CommandSegmentationService {
    fn name(&self) -> &str {
        "command"
    }

    fn initialize(&self) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                BgRemovalError::removal(format!(
                    "Failed to start segmentation program '{}': {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(BgRemovalError::removal(format!(
                "Segmentation program '{}' is not usable: {}",
                self.program.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tracing::debug!(program = %self.program.display(), "Segmentation program ready");
        Ok(())
    }

    fn remove(
        &self,
        image: &[u8],
        alpha_matting: bool,
        model: &ModelReference,
    ) -> Result<Vec<u8>> {
        let mut child = self
            .build_command(alpha_matting, model)
            .spawn()
            .map_err(|e| {
                BgRemovalError::removal(format!(
                    "Failed to start segmentation program '{}': {}",
                    self.program.display(),
                    e
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BgRemovalError::internal("Child stdin was not captured"))?;

        // Feed stdin from a separate thread so a chatty child cannot deadlock on stdout
        let input = image.to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output().map_err(|e| {
            BgRemovalError::removal(format!("Segmentation program failed to run: {}", e))
        })?;

        match writer.join() {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                return Err(BgRemovalError::removal(format!(
                    "Failed to send image to segmentation program: {}",
                    e
                )))
            },
            Err(_) => {
                return Err(BgRemovalError::internal(
                    "Segmentation stdin writer panicked",
                ))
            },
        }

        if !output.status.success() {
            return Err(BgRemovalError::removal(format!(
                "Segmentation program exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(BgRemovalError::removal(
                "Segmentation program produced no output",
            ));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_command_arguments() {
        let service = CommandSegmentationService::default();
        let model = ModelReference::new("/models/u2net_human_seg.pth", "abc");

        let command = service.build_command(true, &model);
        let args: Vec<_> = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["i", "-a", "-m", "u2net_human_seg", "-", "-"]);

        let home = command
            .get_envs()
            .find(|(key, _)| *key == "U2NET_HOME")
            .and_then(|(_, value)| value)
            .map(|value| value.to_string_lossy().into_owned());
        assert_eq!(home.as_deref(), Some("/models"));

        let command = service.build_command(false, &model);
        assert!(!command.get_args().any(|arg| arg == "-a"));
    }

    #[test]
    fn test_missing_program_fails_initialize() {
        let service = CommandSegmentationService::new("/nonexistent/nobg-segmenter");
        assert!(matches!(
            service.initialize(),
            Err(BgRemovalError::Removal(_))
        ));
    }

    #[test]
    fn test_missing_program_fails_remove() {
        let service = CommandSegmentationService::new("/nonexistent/nobg-segmenter");
        let model = ModelReference::new("/models/u2net_human_seg.pth", "abc");
        assert!(matches!(
            service.remove(b"bytes", false, &model),
            Err(BgRemovalError::Removal(_))
        ));
    }
}
