/// Job orchestration for fsort.
///
/// Sort mode: partition the input into sorted runs on the worker pool, wait
/// for every worker, merge the runs, then delete every run file. Check mode
/// streams the input through the sortedness checker and never touches temp
/// storage.
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};

use super::check::{Disorder, check_sorted};
use super::compare::SortConfig;
use super::error::{CleanupError, SortError};
use super::merge::{MergeStats, merge_runs};
use super::pool::partition;
use super::run::{Line, Run};
use super::settings::Settings;
use crate::common::io::{InputSource, STDIN_NAME, chain_lines, open_all};

/// Exit status when check mode finds disorder.
pub const EXIT_DISORDER: i32 = 1;
/// Exit status for input, worker, merge, output, and configuration errors.
pub const EXIT_FAILURE: i32 = 2;

/// Resources for one sort job.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub batch_size: usize,
    pub workers: usize,
    /// Directory that receives the run files.
    pub temp_dir: PathBuf,
}

impl JobSettings {
    pub fn new(settings: Settings, temp_dir: impl Into<PathBuf>) -> Self {
        JobSettings {
            batch_size: settings.batch_size,
            workers: settings.workers,
            temp_dir: temp_dir.into(),
        }
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        JobSettings::new(Settings::default(), ".")
    }
}

/// State shared between the partitioner, the workers, and cleanup.
pub struct JobContext {
    pub config: SortConfig,
    pub settings: JobSettings,
    runs: Mutex<Vec<Run>>,
    first_error: Mutex<Option<SortError>>,
    failed: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl JobContext {
    pub fn new(config: SortConfig, settings: JobSettings) -> Self {
        JobContext {
            config,
            settings,
            runs: Mutex::new(Vec::new()),
            first_error: Mutex::new(None),
            failed: AtomicBool::new(false),
        }
    }

    pub fn push_run(&self, run: Run) {
        lock(&self.runs).push(run);
    }

    pub fn run_count(&self) -> usize {
        lock(&self.runs).len()
    }

    /// Record a worker failure. The first one wins; later ones are dropped.
    pub fn fail(&self, err: SortError) {
        let mut slot = lock(&self.first_error);
        if slot.is_none() {
            *slot = Some(err);
        } else {
            debug!("dropping secondary worker error: {}", err);
        }
        self.failed.store(true, AtomicOrdering::SeqCst);
    }

    /// Stop the job without a worker error (e.g. unreadable input).
    pub fn abort(&self) {
        self.failed.store(true, AtomicOrdering::SeqCst);
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.failed.load(AtomicOrdering::SeqCst)
    }

    pub fn take_error(&self) -> Option<SortError> {
        lock(&self.first_error).take()
    }

    /// Take ownership of every run created so far.
    pub fn take_runs(&self) -> Vec<Run> {
        std::mem::take(&mut *lock(&self.runs))
    }
}

/// Terminal result of a job that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Sort mode finished; output is complete.
    Sorted(MergeStats),
    /// Check mode found the input in order.
    InOrder,
    /// Check mode found disorder.
    Disorder(Disorder),
}

/// Primary result plus any cleanup failures. Cleanup failures never change
/// the primary result.
#[derive(Debug)]
pub struct JobReport {
    pub result: Result<Outcome, SortError>,
    pub cleanup_errors: Vec<CleanupError>,
}

impl JobReport {
    fn new(result: Result<Outcome, SortError>) -> Self {
        JobReport {
            result,
            cleanup_errors: Vec::new(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match &self.result {
            Ok(Outcome::Sorted(_)) | Ok(Outcome::InOrder) => 0,
            Ok(Outcome::Disorder(_)) => EXIT_DISORDER,
            Err(_) => EXIT_FAILURE,
        }
    }
}

/// Delete every run, collecting failures.
fn cleanup(runs: Vec<Run>) -> Vec<CleanupError> {
    let count = runs.len();
    let errors: Vec<CleanupError> = runs
        .into_iter()
        .filter_map(|run| run.remove().err())
        .collect();
    for e in &errors {
        warn!("{}", e);
    }
    debug!("cleanup: {} runs, {} failures", count, errors.len());
    errors
}

/// Sort `lines` into `out`.
///
/// Runs are written to `settings.temp_dir` and all of them are deleted
/// before this returns, on success and on failure alike. No merge happens
/// if partitioning failed.
pub fn sort_lines<I, W>(
    lines: I,
    config: &SortConfig,
    settings: &JobSettings,
    out: &mut W,
) -> JobReport
where
    I: Iterator<Item = Result<Line, SortError>>,
    W: Write,
{
    let ctx = JobContext::new(config.clone(), settings.clone());

    let result = partition(lines, &ctx).and_then(|_| {
        let runs = lock(&ctx.runs);
        info!("merging {} runs", runs.len());
        merge_runs(&runs, &ctx.config, out)
    });
    if let Err(e) = &result {
        info!("job aborted: {}", e);
    }

    let mut report = JobReport::new(result.map(Outcome::Sorted));
    report.cleanup_errors = cleanup(ctx.take_runs());
    report
}

/// Check a single source for order without sorting it.
pub fn check_source(source: InputSource, config: &SortConfig) -> JobReport {
    let name = source.name().to_string();
    let result = check_sorted(source.lines(), &name, config).map(|d| match d {
        Some(d) => Outcome::Disorder(d),
        None => Outcome::InOrder,
    });
    JobReport::new(result)
}

/// Run a whole job over named inputs (`-` is stdin), as the CLI does.
///
/// Check mode accepts at most one input. Inputs are opened before any run
/// is written, so a missing file fails the job without temp files.
pub fn sort_and_output<W: Write>(
    inputs: &[String],
    config: &SortConfig,
    settings: &JobSettings,
    check: bool,
    out: &mut W,
) -> JobReport {
    let default_input = [STDIN_NAME.to_string()];
    let inputs = if inputs.is_empty() {
        &default_input[..]
    } else {
        inputs
    };

    if check {
        if inputs.len() > 1 {
            return JobReport::new(Err(SortError::Config(format!(
                "extra operand '{}' not allowed with -c",
                inputs[1]
            ))));
        }
        return match InputSource::open(&inputs[0]) {
            Ok(source) => check_source(source, config),
            Err(e) => JobReport::new(Err(e)),
        };
    }

    match open_all(inputs) {
        Ok(sources) => sort_lines(chain_lines(sources), config, settings, out),
        Err(e) => JobReport::new(Err(e)),
    }
}
