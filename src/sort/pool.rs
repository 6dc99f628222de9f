/// Partitioner and worker pool: batch the input stream and turn every batch
/// into a sorted [`Run`] on a fixed set of worker threads.
///
/// The calling thread reads input and pushes full batches into a bounded
/// queue; it blocks while the queue is full. Workers block on an empty queue
/// and exit once it is closed and drained. Leaving the pool scope waits for
/// every worker, so no run is still being written when this returns.
use std::io;
use std::mem;

use crossbeam_channel::{Receiver, bounded};
use log::{debug, info};
use rayon::ThreadPoolBuilder;

use super::core::JobContext;
use super::error::SortError;
use super::run::{Line, Run};

/// What the partitioner fed to the workers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PartitionStats {
    pub lines: u64,
    pub batches: u64,
}

/// Split `lines` into batches of at most `ctx.settings.batch_size` and sort
/// each batch into a run on `ctx.settings.workers` threads.
///
/// Created runs are appended to `ctx` even when this fails, so the caller can
/// clean them up. The first input or worker error is returned.
pub fn partition<I>(lines: I, ctx: &JobContext) -> Result<PartitionStats, SortError>
where
    I: Iterator<Item = Result<Line, SortError>>,
{
    let workers = ctx.settings.workers.max(1);
    let batch_size = ctx.settings.batch_size.max(1);

    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("fsort-worker-{}", i))
        .build()
        .map_err(|e| SortError::Worker(io::Error::other(e.to_string())))?;

    let (queue, jobs) = bounded::<Vec<Line>>(workers);

    // The closure owns `queue`; returning from it closes the channel before
    // the scope joins the workers.
    let stats = pool.in_place_scope(move |scope| {
        for id in 0..workers {
            let jobs = jobs.clone();
            scope.spawn(move |_| worker_loop(id, jobs, ctx));
        }
        drop(jobs);

        let mut stats = PartitionStats::default();
        let mut batch: Vec<Line> = Vec::with_capacity(batch_size);
        for item in lines {
            if ctx.is_failed() {
                break;
            }
            match item {
                Ok(line) => {
                    batch.push(line);
                    stats.lines += 1;
                    if batch.len() == batch_size {
                        let full = mem::replace(&mut batch, Vec::with_capacity(batch_size));
                        if queue.send(full).is_err() {
                            break;
                        }
                        stats.batches += 1;
                    }
                }
                Err(e) => {
                    // Queued batches are still drained, but discarded.
                    ctx.abort();
                    return Err(e);
                }
            }
        }

        if !batch.is_empty() && !ctx.is_failed() && queue.send(batch).is_ok() {
            stats.batches += 1;
        }
        Ok(stats)
    })?;

    if let Some(e) = ctx.take_error() {
        return Err(e);
    }

    info!(
        "partitioned {} lines into {} batches on {} workers",
        stats.lines, stats.batches, workers
    );
    Ok(stats)
}

fn worker_loop(id: usize, jobs: Receiver<Vec<Line>>, ctx: &JobContext) {
    for batch in jobs.iter() {
        if ctx.is_failed() {
            debug!("worker {}: discarding batch of {} lines", id, batch.len());
            continue;
        }
        match Run::create(batch, &ctx.config, &ctx.settings.temp_dir) {
            Ok(run) => {
                debug!(
                    "worker {}: wrote run {} ({} lines)",
                    id,
                    run.path().display(),
                    run.len()
                );
                ctx.push_run(run);
            }
            Err(e) => ctx.fail(SortError::Worker(e)),
        }
    }
}
