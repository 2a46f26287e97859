use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use crate::report::PullReport;

use super::styling::{accent, emphasis, failure, muted, pending, success};
use super::tables::{create_cyan_header, create_table, env_key_cell, status_cell};

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", emphasis(emoji), emphasis(title).underlined());
}

/// Renders a human-readable summary of an artifact pull.
///
/// Shows an overview (app, builds, target directory, counts), a table of the
/// downloaded artifacts with their env keys, and a table of failed downloads
/// when there are any.
pub(super) fn render_summary(report: &PullReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");

    let failed = report.failures.len();
    let failed_display = if failed == 0 {
        success(failed)
    } else {
        failure(failed)
    };

    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        muted("App:"),
        accent(&report.app_slug),
        muted("Builds:"),
        pending(report.build_ids.len()),
        muted("Target directory:"),
        emphasis(report.target_dir.display()),
        muted("Downloaded:"),
        success(report.artifacts.len()),
        muted("Failed:"),
        failed_display,
        muted("Pulled at:"),
        muted(report.collected_at.format("%Y-%m-%d %H:%M UTC"))
    );

    if report.artifacts.is_empty() && report.failures.is_empty() {
        let _ = writeln!(
            output,
            "{}",
            pending("No intermediate files found for the selected builds.")
        );
        return output;
    }

    if !report.artifacts.is_empty() {
        add_section_header(&mut output, "📦", "Intermediate Files");

        let mut table = create_table();
        table.set_header(create_cyan_header(&["", "Env Key", "Path"]));
        for artifact in &report.artifacts {
            table.add_row(vec![
                status_cell(true),
                env_key_cell(&artifact.env_key),
                Cell::new(artifact.path.display()),
            ]);
        }
        let _ = writeln!(output, "{table}\n");
    }

    if !report.failures.is_empty() {
        add_section_header(&mut output, "🚨", "Failed Downloads");

        let mut table = create_table();
        table.set_header(create_cyan_header(&["", "Download URL", "Error"]));
        for failure in &report.failures {
            table.add_row(vec![
                status_cell(false),
                Cell::new(&failure.download_url),
                Cell::new(&failure.error).fg(TableColor::Red),
            ]);
        }
        let _ = writeln!(output, "{table}\n");
    }

    output
}
