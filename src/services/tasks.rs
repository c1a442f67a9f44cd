//! Task accounting for in-flight ingest work.
//!
//! `TaskSet` is the counting completion signal shared by the driver and every
//! ingest task. It also acts as the gate that bounds how many tasks may be in
//! flight at once, and it collects one outcome per task so partial failures
//! reach the caller.

use crate::models::{EntryRecord, ErrorItem, IngestOutcome};
use crate::services::progress::ProgressCounters;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Counts {
    launched: u64,
    completed: u64,
    processed_bytes: u64,
}

impl Counts {
    fn in_flight(&self) -> u64 {
        self.launched - self.completed
    }
}

/// Collection of launched ingest tasks and their outcomes
#[derive(Debug)]
pub struct TaskSet {
    max_pending: u64,
    counts: Mutex<Counts>,
    changed: Condvar,
    outcomes: Mutex<Vec<IngestOutcome>>,
}

impl TaskSet {
    /// Create a task set allowing at most `max_pending` tasks in flight (minimum 1).
    #[must_use]
    pub fn new(max_pending: usize) -> Self {
        Self {
            max_pending: u64::try_from(max_pending.max(1)).unwrap_or(u64::MAX),
            counts: Mutex::new(Counts::default()),
            changed: Condvar::new(),
            outcomes: Mutex::new(Vec::new()),
        }
    }

    fn counts(&self) -> MutexGuard<'_, Counts> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a slot is free, then account for one more launched task.
    ///
    /// The returned ticket reports completion when it is dropped, so a task
    /// that unwinds is still accounted for.
    pub fn launch(&self) -> TaskTicket<'_> {
        let mut counts = self.counts();
        while counts.in_flight() >= self.max_pending {
            counts = self
                .changed
                .wait(counts)
                .unwrap_or_else(PoisonError::into_inner);
        }
        counts.launched += 1;
        log::trace!("Task launched ({} in flight)", counts.in_flight());

        TaskTicket {
            tasks: self,
            outcome: None,
        }
    }

    fn complete(&self, outcome: Option<IngestOutcome>) {
        let bytes = match &outcome {
            Some(IngestOutcome::Added(record)) => record.size_bytes,
            _ => 0,
        };

        if let Some(outcome) = outcome {
            self.outcomes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(outcome);
        }

        let mut counts = self.counts();
        counts.completed += 1;
        counts.processed_bytes = counts.processed_bytes.saturating_add(bytes);
        drop(counts);
        self.changed.notify_all();
    }

    /// Block until every launched task has reported completion.
    pub fn wait_idle(&self) {
        let mut counts = self.counts();
        while counts.in_flight() > 0 {
            counts = self
                .changed
                .wait(counts)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    #[must_use]
    pub fn counters(&self) -> ProgressCounters {
        let counts = self.counts();
        ProgressCounters {
            completed_files: counts.completed,
            launched_files: counts.launched,
            processed_bytes: counts.processed_bytes,
        }
    }

    /// Consume the set, splitting outcomes into archived entries and failures.
    #[must_use]
    pub fn into_results(self) -> (Vec<EntryRecord>, Vec<ErrorItem>) {
        let outcomes = self
            .outcomes
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        let mut entries = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                IngestOutcome::Added(record) => entries.push(record),
                IngestOutcome::Failed(error) => errors.push(error),
            }
        }
        (entries, errors)
    }
}

/// Proof that a task was launched; reports completion exactly once, on drop
#[derive(Debug)]
pub struct TaskTicket<'a> {
    tasks: &'a TaskSet,
    outcome: Option<IngestOutcome>,
}

impl TaskTicket<'_> {
    /// Record the task's outcome; it is published when the ticket drops.
    pub fn record(&mut self, outcome: IngestOutcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for TaskTicket<'_> {
    fn drop(&mut self) {
        self.tasks.complete(self.outcome.take());
    }
}
