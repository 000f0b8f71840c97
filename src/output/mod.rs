mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::PacingProgress;
use styling::{dim, magenta_bold};
pub use summary::print_summary;

/// Prints the `travis-scheduler` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🌙 travis-scheduler"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Nightly Travis CI builds")
    );
}
