//! Concurrent string-literal recovery.
//!
//! One blocking task per function decodes and validates candidates; a
//! counting semaphore bounds how many run at once. Accepted ranges travel
//! over a bounded channel to a single consumer, which is the only code that
//! touches the address model. If the consumer fails it closes the
//! semaphore: no new task starts, but tasks already running finish and
//! their output is drained.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use crate::config::DisasmConfig;
use crate::core::id::FunctionId;
use crate::core::known_addr::DisasmInsert;
use crate::disasm::extract::Extractor;
use crate::error::{Result, SizeError};

/// A function body to scan.
#[derive(Debug, Clone, Copy)]
pub struct Job {
    pub function: FunctionId,
    pub start: u64,
    pub end: u64,
}

/// A validated literal found in `function`'s code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub function: FunctionId,
    pub addr: u64,
    pub size: u64,
}

/// Per-function progress, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Decoding,
    Validating,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DisasmStats {
    /// Functions handed to a worker
    pub functions: usize,
    /// Distinct candidates across all functions
    pub candidates: usize,
    /// Ranges inserted into the model
    pub added: usize,
    /// Candidates failing validation
    pub rejected: usize,
    /// Accepted ranges the model declined (symbol-covered or wrong section)
    pub skipped: usize,
}

#[derive(Default)]
struct Counters {
    candidates: AtomicUsize,
    rejected: AtomicUsize,
}

/// Scan every job and feed accepted literals to `sink`, in arrival order.
///
/// Returns the first error produced by `sink`, after every started task has
/// finished.
pub async fn run<F>(
    extractor: Arc<Extractor>,
    jobs: Vec<Job>,
    config: &DisasmConfig,
    mut sink: F,
) -> Result<DisasmStats>
where
    F: FnMut(Accepted) -> Result<DisasmInsert>,
{
    let workers = config.worker_limit();
    let semaphore = Arc::new(Semaphore::new(workers));
    let (tx, mut rx) = mpsc::channel::<Accepted>(config.channel_capacity.max(1));
    let counters = Arc::new(Counters::default());

    info!(functions = jobs.len(), workers, "disassembly started");

    let dispatcher = {
        let semaphore = semaphore.clone();
        let counters = counters.clone();
        tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            let mut spawned = 0usize;
            for job in jobs {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    debug!(spawned, "limiter closed, no further functions scheduled");
                    break;
                };
                let extractor = extractor.clone();
                let counters = counters.clone();
                let tx = tx.clone();
                tasks.spawn_blocking(move || {
                    let _permit = permit;
                    scan(&extractor, job, &tx, &counters);
                });
                spawned += 1;
            }
            // the consumer sees end-of-stream once the last worker drops its sender
            drop(tx);
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "disassembly worker panicked");
                }
            }
            spawned
        })
    };

    let mut stats = DisasmStats::default();
    let mut failure: Option<SizeError> = None;
    while let Some(item) = rx.recv().await {
        if failure.is_some() {
            continue;
        }
        match sink(item) {
            Ok(DisasmInsert::Added) => stats.added += 1,
            Ok(DisasmInsert::CoveredBySymbol) | Ok(DisasmInsert::SectionMismatch) => {
                stats.skipped += 1
            }
            Err(e) => {
                semaphore.close();
                failure = Some(e);
            }
        }
    }

    stats.functions = dispatcher
        .await
        .map_err(|e| SizeError::Internal(format!("disassembly dispatcher failed: {}", e)))?;
    stats.candidates = counters.candidates.load(Ordering::Relaxed);
    stats.rejected = counters.rejected.load(Ordering::Relaxed);

    if let Some(e) = failure {
        warn!(?stats, "disassembly aborted");
        return Err(e);
    }

    info!(
        functions = stats.functions,
        candidates = stats.candidates,
        added = stats.added,
        rejected = stats.rejected,
        skipped = stats.skipped,
        "disassembly finished"
    );
    Ok(stats)
}

fn scan(extractor: &Extractor, job: Job, tx: &mpsc::Sender<Accepted>, counters: &Counters) {
    let mut state = JobState::Pending;
    trace!(function = job.function.index(), ?state);

    state = JobState::Decoding;
    trace!(function = job.function.index(), ?state, start = job.start, end = job.end);
    let candidates = extractor.extract(job.start, job.end);
    counters
        .candidates
        .fetch_add(candidates.len(), Ordering::Relaxed);

    state = JobState::Validating;
    trace!(function = job.function.index(), ?state, candidates = candidates.len());
    for c in candidates {
        if !extractor.validate(c.addr, c.size) {
            counters.rejected.fetch_add(1, Ordering::Relaxed);
            continue;
        }
        let accepted = Accepted {
            function: job.function,
            addr: c.addr,
            size: c.size,
        };
        if tx.blocking_send(accepted).is_err() {
            break;
        }
    }

    state = JobState::Done;
    trace!(function = job.function.index(), ?state);
}
