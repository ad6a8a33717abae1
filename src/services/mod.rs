//! Service layer
//!
//! File I/O, output formatting and progress reporting, kept apart from the
//! removal and batch logic.

pub mod format;
pub mod io;
pub mod progress;

#[cfg(feature = "cli")]
pub use progress::ConsoleProgressReporter;
pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use progress::{BatchProgressReporter, NoOpProgressReporter};
