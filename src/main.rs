//! fah-progress CLI: progress reports from work-unit snapshots.

use std::io::Write;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use fah_progress::batch::run_batch;
use fah_progress::config::{DEFAULT_CONFIG_FILE, ReportConfig};
use fah_progress::descriptor::{ProjectDescriptor, descriptor_path};
use fah_progress::extract::{KeyMatchMode, KeyMatcher};
use fah_progress::render::{JsonRenderer, ReportRenderer, TextRenderer};
use fah_progress::store::{RedbSnapshot, Snapshot, create_snapshot};

#[derive(Parser)]
#[command(name = "fah-progress", version, about = "Project progress reports from work-unit snapshots")]
struct Cli {
    /// Config file (TOML). Defaults to ./fah-progress.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file with default settings.
    Init {
        /// Project ids to list in the new config (comma-separated).
        #[arg(long, value_delimiter = ',')]
        projects: Vec<u32>,

        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,
    },

    /// Report progress for every configured project and date.
    Report {
        /// Override configured project ids (comma-separated).
        #[arg(long, value_delimiter = ',')]
        projects: Vec<u32>,

        /// Override configured report dates (comma-separated).
        #[arg(long, value_delimiter = ',')]
        dates: Vec<String>,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: Format,

        /// Print only the summary lines, without histogram and run breakdown.
        #[arg(long)]
        summary: bool,
    },

    /// Parse and show project descriptors.
    Descriptor {
        /// Project ids (defaults to the configured list).
        ids: Vec<u32>,
    },

    /// Create a snapshot from a JSON object of key → value.
    Import {
        /// JSON file. String values are stored verbatim, others as JSON text.
        #[arg(long)]
        input: PathBuf,

        /// Snapshot file to create.
        #[arg(long)]
        output: PathBuf,
    },

    /// List snapshot entries.
    Dump {
        /// Snapshot file.
        snapshot: PathBuf,

        /// Only entries whose key matches this project.
        #[arg(long)]
        project: Option<u32>,

        /// Use unanchored substring key matching.
        #[arg(long)]
        substring: bool,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    match cli.command {
        Commands::Init { projects, force } => {
            if config_path.exists() && !force {
                miette::bail!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                );
            }
            let config = ReportConfig {
                projects,
                ..Default::default()
            };
            config.save(&config_path)?;
            println!("Wrote {}", config_path.display());
        }

        Commands::Report {
            projects,
            dates,
            format,
            summary,
        } => {
            let mut config = load_config(&config_path, cli.config.is_some())?;
            if !projects.is_empty() {
                config.projects = projects;
            }
            if !dates.is_empty() {
                config.dates = dates;
            }

            let stdout = std::io::stdout().lock();
            let mut renderer: Box<dyn ReportRenderer> = match (format, summary) {
                (Format::Json, _) => Box::new(JsonRenderer::new(stdout)),
                (Format::Text, true) => Box::new(TextRenderer::summary_only(stdout)),
                (Format::Text, false) => Box::new(TextRenderer::new(stdout)),
            };
            let outcome = run_batch(&config, renderer.as_mut())?;

            if let Some((date, err)) = outcome.failed.into_iter().next() {
                return Err(miette::Report::new(err).wrap_err(format!("report for {date} failed")));
            }
        }

        Commands::Descriptor { ids } => {
            let config = load_config(&config_path, cli.config.is_some())?;
            let ids = if ids.is_empty() { config.projects.clone() } else { ids };
            if ids.is_empty() {
                miette::bail!("no project ids given or configured");
            }
            for id in ids {
                let descriptor =
                    ProjectDescriptor::load(&config.descriptor_dir, &config.descriptor_ext, id)?;
                println!("{}", descriptor.describe());
                println!(
                    "  file:   {}",
                    descriptor_path(&config.descriptor_dir, id, &config.descriptor_ext).display()
                );
                println!("  clones: {} total slots", descriptor.clone_slots());
                println!("  gens:   {} total slots", descriptor.generation_slots());
            }
        }

        Commands::Import { input, output } => {
            let config = load_config(&config_path, cli.config.is_some())?;
            let content = std::fs::read_to_string(&input).into_diagnostic()?;
            let entries: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(&content).into_diagnostic()?;
            let pairs = entries.into_iter().map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, text)
            });
            let count = create_snapshot(&output, &config.table, pairs)?;
            println!("Imported {count} entries into {}", output.display());
        }

        Commands::Dump {
            snapshot,
            project,
            substring,
        } => {
            let config = load_config(&config_path, cli.config.is_some())?;
            let mode = if substring {
                KeyMatchMode::Substring
            } else {
                config.key_match
            };
            let matcher = project.map(|id| KeyMatcher::new(id, mode));
            let snap = RedbSnapshot::open(&snapshot, &config.table)?;

            let mut out = std::io::stdout().lock();
            let mut write_error = None;
            snap.scan(&mut |key, value| {
                if matcher.as_ref().is_some_and(|m| !m.matches(key)) {
                    return ControlFlow::Continue(());
                }
                let line = writeln!(
                    out,
                    "{}\t{}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(value)
                );
                match line {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(e) => {
                        write_error = Some(e);
                        ControlFlow::Break(())
                    }
                }
            })?;
            snap.close();
            if let Some(e) = write_error {
                return Err(e).into_diagnostic();
            }
        }
    }

    Ok(())
}

/// Load the config, falling back to defaults when the implicit default file
/// is absent. An explicitly named file must exist.
fn load_config(path: &Path, explicit: bool) -> Result<ReportConfig> {
    if explicit || path.exists() {
        Ok(ReportConfig::load(path)?)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(ReportConfig::default())
    }
}
