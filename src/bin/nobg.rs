//! nobg CLI Tool
//!
//! Removes image backgrounds in batches and flattens the results onto white.

#[cfg(feature = "cli")]
use nobg::cli;

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<std::process::ExitCode> {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
