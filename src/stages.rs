use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::error::CrawlError;
use crate::extract::locators::{DetailLocators, ListingLocators};
use crate::extract::{DetailExtractor, Extractor, ListingExtractor};
use crate::input;
use crate::job::{self, Job, JobRegistry, Target};
use crate::pipeline::{self, LoopOptions};
use crate::queue;
use crate::reader::PageReader;
use crate::settings::{Settings, StageSettings};
use crate::summary::StageReport;

/// The two browser-driven, resumable stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Stage {
    Listings,
    Details,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Listings => "listings",
            Stage::Details => "details",
        }
    }

    fn input_dir(self, settings: &Settings) -> PathBuf {
        match self {
            Stage::Listings => settings.subcategories_dir(),
            Stage::Details => settings.results_dir(),
        }
    }

    fn input_prefix(self) -> &'static str {
        match self {
            Stage::Listings => "",
            Stage::Details => "Results_",
        }
    }

    fn output_dir(self, settings: &Settings) -> PathBuf {
        match self {
            Stage::Listings => settings.results_dir(),
            Stage::Details => settings.details_dir(),
        }
    }

    fn output_prefix(self) -> &'static str {
        match self {
            Stage::Listings => "Results_",
            Stage::Details => "Details_",
        }
    }

    pub fn checkpoints(self, settings: &Settings) -> CheckpointStore {
        match self {
            Stage::Listings => CheckpointStore::new(settings.progress_dir()),
            Stage::Details => CheckpointStore::new(settings.progress_details_dir()),
        }
    }

    fn timing(self, settings: &Settings) -> &StageSettings {
        match self {
            Stage::Listings => &settings.listings,
            Stage::Details => &settings.details,
        }
    }

    fn read_targets(self, path: &Path) -> Result<Vec<Target>, CrawlError> {
        match self {
            Stage::Listings => input::read_pairs(path),
            Stage::Details => input::read_links(path),
        }
    }

    fn extractor(self, settings: &Settings) -> Box<dyn Extractor> {
        let timing = self.timing(settings).clone();
        match self {
            Stage::Listings => Box::new(ListingExtractor::new(ListingLocators::default(), timing)),
            Stage::Details => Box::new(DetailExtractor::new(DetailLocators::default(), timing)),
        }
    }
}

/// Input files of `stage`, sorted. A missing input directory means no jobs.
pub fn job_files(stage: Stage, settings: &Settings) -> Result<Vec<PathBuf>> {
    let dir = stage.input_dir(settings);
    if !dir.is_dir() {
        warn!("Input directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }
    input::csv_files(&dir, stage.input_prefix())
        .with_context(|| format!("Failed to list {}", dir.display()))
}

/// Read one input file into a `Job`, claiming its stem in `registry`.
pub fn load_job(
    stage: Stage,
    settings: &Settings,
    path: &Path,
    registry: &mut JobRegistry,
) -> Result<Job, CrawlError> {
    let name = job::job_name(path);
    let stem = registry.register(&name)?;
    let targets = queue::dedup_targets(stage.read_targets(path)?);
    let out_dir = stage.output_dir(settings);

    Ok(Job {
        output: out_dir.join(format!("{}{}.csv", stage.output_prefix(), stem)),
        summary: out_dir.join(format!("Stats_{}.txt", stem)),
        name,
        stem,
        targets,
    })
}

/// Run every job of `stage` in order against one reader. A job that fails
/// is logged and skipped; the others still run. `limit` caps the number of
/// targets visited across the whole stage. `report` is kept current per
/// target, so it stays meaningful if this future is dropped mid-run.
pub async fn run_stage(
    stage: Stage,
    settings: &Settings,
    reader: &mut dyn PageReader,
    limit: Option<usize>,
    report: &mut StageReport,
) -> Result<()> {
    let files = job_files(stage, settings)?;
    if files.is_empty() {
        error!("No input files for stage {}", stage.name());
        return Ok(());
    }
    info!("{} input files for stage {}", files.len(), stage.name());

    let checkpoints = stage.checkpoints(settings);
    let extractor = stage.extractor(settings);
    let mut registry = JobRegistry::new();
    let mut budget = limit;

    for path in &files {
        if budget == Some(0) {
            info!("Visit limit reached, stopping");
            break;
        }

        let job = match load_job(stage, settings, path, &mut registry) {
            Ok(job) => job,
            Err(e) => {
                error!("Skipping {}: {}", path.display(), e);
                report.failed_jobs += 1;
                continue;
            }
        };

        let opts = LoopOptions {
            checkpoints: &checkpoints,
            pause: stage.timing(settings).pause(),
            limit: budget,
        };
        match pipeline::run_job(&job, extractor.as_ref(), reader, &opts, report).await {
            Ok(summary) => {
                budget = budget.map(|b| b.saturating_sub(summary.total));
            }
            Err(e) => {
                error!("Job {} aborted: {}", job.name, e);
                report.failed_jobs += 1;
            }
        }
    }
    Ok(())
}

/// Checkpoint progress of one job, for `status`.
#[derive(Debug)]
pub struct JobProgress {
    pub name: String,
    pub targets: usize,
    pub completed: usize,
}

impl JobProgress {
    pub fn pending(&self) -> usize {
        self.targets.saturating_sub(self.completed)
    }
}

pub fn progress(stage: Stage, settings: &Settings) -> Result<Vec<JobProgress>> {
    let checkpoints = stage.checkpoints(settings);
    let mut registry = JobRegistry::new();
    let mut rows = Vec::new();
    for path in job_files(stage, settings)? {
        let job = match load_job(stage, settings, &path, &mut registry) {
            Ok(job) => job,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let done = checkpoints.load(&job.stem);
        let completed = job.targets.iter().filter(|t| done.contains(&t.url)).count();
        rows.push(JobProgress {
            name: job.name,
            targets: job.targets.len(),
            completed,
        });
    }
    Ok(rows)
}
