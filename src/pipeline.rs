use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::error::Result;
use crate::extract::Extractor;
use crate::job::Job;
use crate::output::OutputStore;
use crate::queue;
use crate::reader::PageReader;
use crate::summary::{JobSummary, StageReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    LoadingCheckpoint,
    ComputingPending,
    Iterating,
    Persisting,
    Done,
}

fn enter(job: &Job, state: JobState) {
    debug!(job = %job.name, state = ?state, "job state");
}

/// Knobs shared by every job of a stage run.
pub struct LoopOptions<'a> {
    pub checkpoints: &'a CheckpointStore,
    pub pause: Duration,
    /// Visit at most this many pending targets.
    pub limit: Option<usize>,
}

/// Visit every target of `job` not yet checkpointed, one at a time.
/// `report` is updated as each target is checkpointed.
///
/// Per target: extract, append + flush the rows, then add the URL to the
/// completion set and rewrite the checkpoint. A crash therefore loses at
/// most the target in flight; a crash between the append and the checkpoint
/// leaves that target's rows to be written again on resume.
pub async fn run_job(
    job: &Job,
    extractor: &dyn Extractor,
    reader: &mut dyn PageReader,
    opts: &LoopOptions<'_>,
    report: &mut StageReport,
) -> Result<JobSummary> {
    info!("{}", "=".repeat(50));
    info!("Job: {} ({} targets)", job.name, job.targets.len());

    enter(job, JobState::LoadingCheckpoint);
    let mut completed = opts.checkpoints.load(&job.stem);
    if !completed.is_empty() {
        info!("Resuming: {} targets already done", completed.len());
    }

    enter(job, JobState::ComputingPending);
    let mut pending = queue::pending(&job.targets, &completed);
    if let Some(limit) = opts.limit {
        pending.truncate(limit);
    }
    info!("{} targets to visit", pending.len());

    let mut summary = JobSummary::new(&job.name);
    if !pending.is_empty() {
        let mut output = OutputStore::open(&job.output, extractor.header())?;
        let total = pending.len();

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        for (i, target) in pending.into_iter().enumerate() {
            enter(job, JobState::Iterating);
            info!("[{}/{}] {} {}", i + 1, total, target.label, target.url);

            let extraction = extractor.extract(reader, target).await;
            output.append(&extraction.rows)?;
            summary.record(&extraction);
            if !extraction.is_success() {
                warn!("   Recorded as error: {}", target.url);
            }

            enter(job, JobState::Persisting);
            completed.insert(target.url.clone());
            opts.checkpoints.save(&job.stem, &completed)?;
            report.record(&extraction);
            pb.inc(1);

            if i + 1 < total {
                tokio::time::sleep(opts.pause).await;
            }
        }
        pb.finish_and_clear();
        debug!("Rows appended to {}", output.path().display());
    }

    summary.write(&job.summary)?;
    report.finish_job();
    enter(job, JobState::Done);
    info!(
        "{}: {} visited, {} ok, {} errors, {} rows",
        job.name, summary.total, summary.success, summary.errors, summary.rows
    );
    Ok(summary)
}
