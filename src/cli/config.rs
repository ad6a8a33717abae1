//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::{AppConfig, ModelReference};
use crate::utils::ModelValidator;
use anyhow::{Context, Result};

/// Convert CLI arguments to an [`AppConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the application configuration from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<AppConfig> {
        let local_path = match &cli.model_path {
            Some(path) => path.clone(),
            None => ModelReference::default_dir()
                .context("Failed to resolve the default model directory")?
                .join(crate::config::DEFAULT_MODEL_FILE),
        };

        let mut model = ModelReference::new(local_path, cli.remote_id.clone());
        if let Some(digest) = &cli.sha256 {
            model = model.with_sha256(digest.to_lowercase());
        }

        AppConfig::builder()
            .model(model)
            .alpha_matting(!cli.no_alpha_matting)
            .max_workers(cli.workers)
            .build()
            .context("Invalid configuration")
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(path) = &cli.model_path {
            ModelValidator::validate_model_path(path).context("Invalid --model-path")?;
        }

        ModelValidator::validate_remote_id(&cli.remote_id).context("Invalid --remote-id")?;

        if let Some(digest) = &cli.sha256 {
            ModelValidator::validate_sha256(digest).context("Invalid --sha256")?;
        }

        if let Some(pattern) = &cli.pattern {
            glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid --pattern '{}'", pattern))?;
        }

        if cli.rembg_command.trim().is_empty() {
            anyhow::bail!("--rembg-command cannot be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nobg").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_config_conversion() {
        let cli = parse(&[
            "--model-path",
            "/tmp/models/u2net_human_seg.pth",
            "--no-alpha-matting",
            "-j",
            "3",
            "a.jpg",
        ]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();

        assert_eq!(
            config.model.local_path,
            std::path::PathBuf::from("/tmp/models/u2net_human_seg.pth")
        );
        assert_eq!(config.model.remote_id, crate::config::DEFAULT_REMOTE_ID);
        assert!(!config.alpha_matting);
        assert_eq!(config.max_workers, 3);
        assert!(config.model.sha256.is_none());
    }

    #[test]
    fn test_sha256_is_normalized() {
        let digest = "AB".repeat(32);
        let cli = parse(&["--model-path", "m/u2net.pth", "--sha256", &digest, "a.jpg"]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(config.model.sha256, Some("ab".repeat(32)));
    }

    #[test]
    fn test_validate_cli_rejects_bad_values() {
        let cli = parse(&["--model-path", "model.onnx", "a.jpg"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());

        let cli = parse(&["--sha256", "xyz", "a.jpg"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());

        let cli = parse(&["--pattern", "[", "a.jpg"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());

        let cli = parse(&["--model-path", "m/u2net.pth", "a.jpg"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_ok());
    }
}
