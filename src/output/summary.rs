use std::fmt::Write;

use comfy_table::Cell;

use crate::scheduler::RunReport;

use super::styling::{bright, bright_green, bright_yellow, dim};
use super::tables::{color_coded_failure_cell, create_cyan_header, create_table};

/// Prints a per-owner summary of the run to stderr.
///
/// `failure_threshold` is the ratio (0..=1) at which an owner pass is
/// rejected; failure rates at or above it are shown in red.
pub fn print_summary(report: &RunReport, failure_threshold: f64) {
    eprintln!("{}", render_summary(report, failure_threshold));
}

fn render_summary(report: &RunReport, failure_threshold: f64) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "{} {}", bright("📋"), bright("Summary").underlined());
    let _ = writeln!(
        output,
        "  {} {}\n",
        dim("Started:"),
        dim(report.started_at.format("%Y-%m-%d %H:%M UTC"))
    );

    if report.owners.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No owner was processed."));
        return output;
    }

    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        "Endpoint",
        "Owner",
        "Builds requested",
        "Failed",
        "Failure rate",
        "Failed repositories",
    ]));

    for stats in &report.owners {
        table.add_row(vec![
            Cell::new(&stats.endpoint),
            Cell::new(&stats.owner),
            Cell::new(stats.attempted),
            Cell::new(stats.failed()),
            color_coded_failure_cell(stats.failure_ratio() * 100.0, failure_threshold * 100.0),
            Cell::new(stats.failed_slugs.join("\n")),
        ]);
    }

    let _ = writeln!(output, "{table}");

    let total: usize = report.owners.iter().map(|stats| stats.attempted).sum();
    let failed: usize = report.owners.iter().map(|stats| stats.failed()).sum();
    let _ = writeln!(
        output,
        "  {} {}",
        dim("Build requests accepted:"),
        bright_green(total - failed)
    );

    output
}
