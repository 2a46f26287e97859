use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

use crate::auth::Token;
use crate::config::{Config, ExtractorKind, OutputFormat};
use crate::output::export_report;
use crate::pull::{ArtifactPull, PullRequest};
use crate::stages::parse_finished_stages;

#[derive(Parser)]
#[command(name = "artifact-pull")]
#[command(
    author,
    version,
    about = "Pulls intermediate files from finished Bitrise builds",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the intermediate files of the selected finished builds
    Pull {
        #[arg(short, long, env = "BITRISE_API_ACCESS_TOKEN", hide_env_values = true)]
        token: String,

        #[arg(short, long, env = "BITRISE_API_BASE_URL")]
        url: Option<String>,

        #[arg(short, long, env = "BITRISE_APP_SLUG")]
        app_slug: String,

        /// Finished stages as exposed by the pipeline, in JSON
        #[arg(long, env = "BITRISE_FINISHED_STAGES", conflicts_with = "finished_stages_file")]
        finished_stages: Option<String>,

        #[arg(long)]
        finished_stages_file: Option<PathBuf>,

        /// Target patterns (`stage.workflow`, `*` and `?` wildcards)
        #[arg(short, long, env = "ARTIFACT_SOURCES", value_delimiter = ',')]
        sources: Vec<String>,

        #[arg(long)]
        target_dir: Option<PathBuf>,

        /// Directory artifacts are gzip-compressed tarballs
        #[arg(long, default_value_t = false)]
        compressed: bool,

        /// Extract with the bundled tar reader instead of the `tar` binary.
        /// Absolute member paths lose their leading `/` and land inside the
        /// target directory
        #[arg(long, default_value_t = false)]
        in_process: bool,

        #[arg(long)]
        list_concurrency: Option<usize>,

        #[arg(long)]
        show_concurrency: Option<usize>,

        #[arg(long)]
        download_concurrency: Option<usize>,
    },

    /// Write the default configuration file
    InitConfig {
        #[arg(default_value = "artifact-pull.toml")]
        path: PathBuf,
    },
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_pull(
        &self,
        mut config: Config,
        token: &str,
        url: Option<&str>,
        app_slug: &str,
        finished_stages: Option<&str>,
        finished_stages_file: Option<&Path>,
        sources: &[String],
        target_dir: Option<&Path>,
    ) -> Result<()> {
        if let Some(url) = url {
            config.api.base_url = url.to_string();
        }
        if let Some(dir) = target_dir {
            config.download.target_dir = Some(dir.to_path_buf());
        }
        config.validate()?;

        let raw_stages = match (finished_stages, finished_stages_file) {
            (Some(raw), _) => raw.to_string(),
            (None, Some(path)) => std::fs::read_to_string(path).with_context(|| {
                format!("Failed to read finished stages: {}", path.display())
            })?,
            (None, None) => String::new(),
        };
        let stages = parse_finished_stages(&raw_stages).context("Failed to parse finished stages")?;

        let request = PullRequest {
            app_slug: app_slug.to_string(),
            stages,
            sources: normalize_sources(sources),
            target_dir: config.target_dir(),
        };

        info!(
            "Pulling artifacts of app {} into {}",
            request.app_slug,
            request.target_dir.display()
        );

        let pull = ArtifactPull::from_config(&config, Token::from(token))?;
        let report = pull.run(&request).await?;

        let format = self.format.unwrap_or(config.output.format);
        let pretty = self.pretty || config.output.pretty;

        if let Some(output_path) = &self.output {
            let mut file = std::fs::File::create(output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            export_report(&report, format, pretty, &mut file)?;
            info!("Report written to: {}", output_path.display());
        } else {
            export_report(&report, format, pretty, &mut std::io::stdout().lock())?;
        }

        report.ensure_success()?;

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Pull {
                token,
                url,
                app_slug,
                finished_stages,
                finished_stages_file,
                sources,
                target_dir,
                compressed,
                in_process,
                list_concurrency,
                show_concurrency,
                download_concurrency,
            } => {
                if *compressed {
                    config.download.compressed_archives = true;
                }
                if *in_process {
                    config.download.extractor = ExtractorKind::InProcess;
                }
                if let Some(list) = list_concurrency {
                    config.concurrency.list = *list;
                }
                if let Some(show) = show_concurrency {
                    config.concurrency.show = *show;
                }
                if let Some(download) = download_concurrency {
                    config.concurrency.download = *download;
                }

                self.execute_pull(
                    config,
                    token,
                    url.as_deref(),
                    app_slug,
                    finished_stages.as_deref(),
                    finished_stages_file.as_deref(),
                    sources,
                    target_dir.as_deref(),
                )
                .await
            }
            Commands::InitConfig { path } => {
                config.save(path)?;
                info!("Configuration written to: {}", path.display());
                Ok(())
            }
        }
    }
}

/// Trims every pattern and drops empty ones, so `""` or `"a,,b"` never
/// produce a pattern matching nothing.
fn normalize_sources(sources: &[String]) -> Vec<String> {
    sources
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sources() {
        let sources = vec![
            " stage1.* ".to_string(),
            String::new(),
            "  ".to_string(),
            "stage2.deploy".to_string(),
        ];

        assert_eq!(
            normalize_sources(&sources),
            vec!["stage1.*".to_string(), "stage2.deploy".to_string()]
        );
    }

    #[test]
    fn test_empty_sources_select_everything() {
        assert!(normalize_sources(&[String::new()]).is_empty());
    }

    #[test]
    fn test_parse_pull_arguments() {
        let cli = Cli::try_parse_from([
            "artifact-pull",
            "--format",
            "json",
            "pull",
            "--token",
            "secret",
            "--app-slug",
            "app",
            "--sources",
            "stage1.*,stage2.deploy",
            "--download-concurrency",
            "4",
        ])
        .unwrap();

        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Commands::Pull {
                sources,
                download_concurrency,
                ..
            } => {
                assert_eq!(sources, vec!["stage1.*", "stage2.deploy"]);
                assert_eq!(download_concurrency, Some(4));
            }
            Commands::InitConfig { .. } => panic!("expected pull"),
        }
    }

    #[test]
    fn test_stage_sources_conflict() {
        let result = Cli::try_parse_from([
            "artifact-pull",
            "pull",
            "--token",
            "secret",
            "--app-slug",
            "app",
            "--finished-stages",
            "[]",
            "--finished-stages-file",
            "stages.json",
        ]);

        assert!(result.is_err());
    }
}
