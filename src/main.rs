mod browser;
mod checkpoint;
mod discover;
mod error;
mod extract;
mod input;
mod job;
mod logging;
mod output;
mod pipeline;
mod queue;
mod reader;
mod settings;
mod stages;
mod summary;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::browser::BrowserSession;
use crate::settings::Settings;
use crate::stages::Stage;
use crate::summary::StageReport;

#[derive(Parser)]
#[command(name = "khamsat_scraper", about = "Resumable khamsat.com category, listing and service crawler")]
struct Cli {
    /// Configuration file (default: ./khamsat.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch subcategory links for every top-level category
    Discover,
    /// Collect service listings from every subcategory file
    Listings {
        /// Max subcategory pages to visit (default: all pending)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Extract service details from every listings result file
    Details {
        /// Max service pages to visit (default: all pending)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Listings then details in one browser session
    Run {
        /// Max pages to visit per stage
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show checkpoint progress per job
    Status,
    /// Forget a job's checkpoint so it is crawled again from the start
    Reset {
        #[arg(value_enum)]
        stage: Stage,
        /// Job name (input file stem, e.g. "Results_Design")
        job: String,
    },
}

impl Commands {
    fn log_name(&self) -> &'static str {
        match self {
            Commands::Discover => "discover",
            Commands::Listings { .. } => "listings",
            Commands::Details { .. } => "details",
            Commands::Run { .. } => "run",
            Commands::Status => "status",
            Commands::Reset { .. } => "reset",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let log_file = logging::init(&settings.log_dir(), cli.command.log_name())?;
    info!("Logging to {}", log_file.display());

    let result = match cli.command {
        Commands::Discover => {
            let report = discover::discover_subcategories(&settings).await?;
            println!(
                "Done: {} categories ({} failed), {} subcategories saved to {}",
                report.categories,
                report.failed,
                report.subcategories,
                settings.subcategories_dir().display()
            );
            Ok(())
        }
        Commands::Listings { limit } => crawl(&settings, &[Stage::Listings], limit).await,
        Commands::Details { limit } => crawl(&settings, &[Stage::Details], limit).await,
        Commands::Run { limit } => crawl(&settings, &[Stage::Listings, Stage::Details], limit).await,
        Commands::Status => {
            for stage in [Stage::Listings, Stage::Details] {
                print_status(stage, &settings)?;
            }
            Ok(())
        }
        Commands::Reset { stage, job: name } => {
            let stem = job::sanitize_name(&name);
            let checkpoints = stage.checkpoints(&settings);
            if checkpoints.remove(&stem)? {
                warn!(
                    "Checkpoint for {} removed; rows already in its output file will be appended again",
                    name
                );
                println!("Reset {} ({})", name, stage.name());
            } else {
                println!("No checkpoint for {} ({})", name, stage.name());
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Run `plan` in order against one browser session. Ctrl-C stops the
/// crawl; the checkpoint already on disk is where the next run resumes.
async fn crawl(settings: &Settings, plan: &[Stage], limit: Option<usize>) -> anyhow::Result<()> {
    let mut session = BrowserSession::launch(settings)
        .await
        .context("Failed to start the browser")?;

    let mut reports: Vec<(Stage, StageReport)> = plan
        .iter()
        .map(|&stage| (stage, StageReport::default()))
        .collect();
    let outcome = tokio::select! {
        res = async {
            for (stage, report) in reports.iter_mut() {
                stages::run_stage(*stage, settings, &mut session, limit, report).await?;
            }
            anyhow::Ok(())
        } => res,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, progress is saved up to the last completed page");
            Ok(())
        }
    };
    session.close().await;

    for (stage, report) in &reports {
        println!(
            "{}: {} jobs ({} failed), {} pages visited, {} errors, {} rows",
            stage.name(),
            report.jobs,
            report.failed_jobs,
            report.visited,
            report.errors,
            report.rows
        );
    }
    outcome
}

fn print_status(stage: Stage, settings: &Settings) -> anyhow::Result<()> {
    let rows = stages::progress(stage, settings)?;
    println!("\n--- {} ---", stage.name());
    if rows.is_empty() {
        println!("No input files.");
        return Ok(());
    }

    println!("{:<40} | {:>7} | {:>7} | {:>7}", "Job", "Targets", "Done", "Pending");
    println!("{}", "-".repeat(70));
    let (mut targets, mut done) = (0, 0);
    for r in &rows {
        println!(
            "{:<40} | {:>7} | {:>7} | {:>7}",
            truncate(&r.name, 40),
            r.targets,
            r.completed,
            r.pending()
        );
        targets += r.targets;
        done += r.completed;
    }
    println!("{}", "-".repeat(70));
    println!(
        "{:<40} | {:>7} | {:>7} | {:>7}",
        format!("{} jobs", rows.len()),
        targets,
        done,
        targets - done
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max - 3).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
