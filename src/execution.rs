use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::operator::IntegrityError;

/// A failure that stops a stage.
///
/// Malformed lines are not stage errors: they are skipped and counted in the [`StageReport`].
#[derive(Debug, Error)]
pub enum StageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("data integrity violation: {0}")]
    Integrity(#[from] IntegrityError),
}

/// Counters and fatal failure of a running stage.
///
/// Operators are infallible: when one of them hits a condition that must stop the stage it records
/// the error here and terminates its stream, the error is then returned by
/// [`Stream::execute`](crate::Stream::execute).
#[derive(Debug, Default)]
pub struct StageMonitor {
    lines_read: AtomicU64,
    malformed: AtomicU64,
    records_out: AtomicU64,
    groups: AtomicU64,
    missing_adjacency: AtomicU64,
    fault: Mutex<Option<StageError>>,
}

/// Snapshot of the counters of a stage, taken when the stage is complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Number of non-empty input lines.
    pub lines_read: u64,
    /// Number of input lines skipped because they could not be parsed.
    pub malformed: u64,
    /// Number of lines written to the output.
    pub records_out: u64,
    /// Number of key groups flushed by the grouping operator.
    pub groups: u64,
    /// Number of groups that reached the reducer without an `ADJ` record.
    pub missing_adjacency: u64,
}

impl StageMonitor {
    pub fn record_line(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_output(&self) {
        self.records_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_group(&self) {
        self.groups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_missing_adjacency(&self) {
        self.missing_adjacency.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fatal error. Only the first one is kept.
    pub fn fail<E: Into<StageError>>(&self, error: E) {
        let error = error.into();
        let mut fault = self.fault.lock();
        if fault.is_none() {
            error!("stage failed: {error}");
            *fault = Some(error);
        } else {
            debug!("ignoring error after the stage already failed: {error}");
        }
    }

    pub fn has_failed(&self) -> bool {
        self.fault.lock().is_some()
    }

    pub(crate) fn take_fault(&self) -> Option<StageError> {
        self.fault.lock().take()
    }

    pub fn report(&self) -> StageReport {
        StageReport {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            records_out: self.records_out.load(Ordering::Relaxed),
            groups: self.groups.load(Ordering::Relaxed),
            missing_adjacency: self.missing_adjacency.load(Ordering::Relaxed),
        }
    }
}

impl Display for StageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "read {} lines ({} malformed), wrote {} records, flushed {} groups",
            self.lines_read, self.malformed, self.records_out, self.groups
        )?;
        if self.missing_adjacency > 0 {
            write!(f, ", {} without adjacency", self.missing_adjacency)?;
        }
        Ok(())
    }
}

/// Information handed to every operator of the chain before the first call to `next`.
#[derive(Debug, Clone)]
pub struct ExecutionMetadata {
    /// Name of the stage the chain belongs to, used in the logs.
    pub stage: &'static str,
    /// Counters shared by all the operators of the chain.
    pub monitor: Arc<StageMonitor>,
}

impl ExecutionMetadata {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            monitor: Default::default(),
        }
    }
}
