mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::export_report;
pub use progress::PhaseProgress;
use styling::{muted, title};

/// Prints the `artifact-pull` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        title("📦 artifact-pull"),
        muted(env!("CARGO_PKG_VERSION")),
        muted("Pulls intermediate files from finished Bitrise builds")
    );
}
