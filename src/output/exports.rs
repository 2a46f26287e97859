use anyhow::Result;
use std::io::Write;

use crate::config::OutputFormat;
use crate::report::PullReport;

use super::summary::render_summary;

/// Writes a pull report in the requested format.
///
/// - Summary: tables for a human reading the terminal
/// - JSON: the full report, for scripts exporting the env keys
pub fn export_report(
    report: &PullReport,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary => {
            writeln!(output, "{}", render_summary(report))?;
            Ok(())
        }
        OutputFormat::Json => export_json(report, pretty, output),
    }
}

fn export_json(report: &PullReport, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::DownloadResult;
    use std::path::PathBuf;

    fn report() -> PullReport {
        PullReport::new(
            "my-app",
            vec!["b1".to_string()],
            PathBuf::from("/tmp/pull"),
            &[DownloadResult {
                download_url: "https://storage/apk".to_string(),
                env_key: "APK".to_string(),
                outcome: Ok(PathBuf::from("/tmp/pull/app.apk")),
            }],
        )
    }

    #[test]
    fn test_export_json_is_a_single_line() {
        let mut buffer = Vec::new();
        export_report(&report(), OutputFormat::Json, false, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 1);

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["artifact_paths"], "/tmp/pull/app.apk");
    }

    #[test]
    fn test_export_pretty_json() {
        let mut buffer = Vec::new();
        export_report(&report(), OutputFormat::Json, true, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.lines().count() > 1);
        assert!(text.contains("\"app_slug\": \"my-app\""));
    }

    #[test]
    fn test_export_summary() {
        let mut buffer = Vec::new();
        export_report(&report(), OutputFormat::Summary, false, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Intermediate Files"));
    }
}
