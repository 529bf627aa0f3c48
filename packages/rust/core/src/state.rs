//! Import run state machine.
//!
//! ```text
//! Idle ──SourceLoaded──▶ SourceLoaded ──RunStarted──▶ Submitting ──RunFinished──▶ Completed
//!   │                                                  │
//!   └──SourceFailed──▶ Failed ◀────────ChunkFailed─────┘
//! ```
//!
//! Every state is an owned value; [`ImportRunState::reduce`] consumes the
//! current state and returns the next one. Loading a source from any
//! non-running state discards the previous run.

use contentimport_shared::{
    ChunkResponse, ChunkSummary, ImportError, ImportRecord, ImportResult, ImportSummary, Result,
};

/// Where a batch run currently stands.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ImportRunState {
    /// Nothing loaded yet.
    #[default]
    Idle,
    /// Records loaded and previewable; nothing submitted.
    SourceLoaded { records: Vec<ImportRecord> },
    /// Chunks are being submitted.
    Submitting {
        records: Vec<ImportRecord>,
        results: Vec<ImportResult>,
        counts: ChunkSummary,
        /// Records covered by the chunks completed so far.
        submitted: usize,
        progress: u8,
    },
    /// Every chunk succeeded.
    Completed {
        records: Vec<ImportRecord>,
        results: Vec<ImportResult>,
        summary: ImportSummary,
    },
    /// A source load or a chunk submission failed.
    Failed {
        records: Vec<ImportRecord>,
        results: Vec<ImportResult>,
        progress: u8,
        error: String,
    },
}

/// Inputs to [`ImportRunState::reduce`].
#[derive(Debug, Clone)]
pub enum ImportEvent {
    SourceLoaded(Vec<ImportRecord>),
    SourceFailed(String),
    RunStarted,
    /// `size` is the number of records in the completed chunk.
    ChunkCompleted { response: ChunkResponse, size: usize },
    ChunkFailed(String),
    RunFinished,
}

impl ImportEvent {
    fn describe(&self) -> &'static str {
        match self {
            Self::SourceLoaded(_) => "load a source",
            Self::SourceFailed(_) => "record a source failure",
            Self::RunStarted => "start a run",
            Self::ChunkCompleted { .. } => "complete a chunk",
            Self::ChunkFailed(_) => "fail a chunk",
            Self::RunFinished => "finish a run",
        }
    }
}

/// `round(submitted / total * 100)`, held below 100 until every record is in.
pub fn progress_percent(submitted: usize, total: usize) -> u8 {
    if total == 0 || submitted >= total {
        return 100;
    }
    let pct = (submitted as f64 / total as f64 * 100.0).round() as u8;
    pct.min(99)
}

impl ImportRunState {
    /// Short state name for messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SourceLoaded { .. } => "source loaded",
            Self::Submitting { .. } => "submitting",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Check whether `event` is accepted in this state without consuming it.
    pub fn check(&self, event: &ImportEvent) -> Result<()> {
        let accepted = match (self, event) {
            (Self::Submitting { .. }, ImportEvent::SourceLoaded(_) | ImportEvent::SourceFailed(_)) => {
                false
            }
            (_, ImportEvent::SourceLoaded(_) | ImportEvent::SourceFailed(_)) => true,
            (Self::SourceLoaded { records }, ImportEvent::RunStarted)
            | (Self::Completed { records, .. }, ImportEvent::RunStarted)
            | (Self::Failed { records, .. }, ImportEvent::RunStarted) => !records.is_empty(),
            (Self::Submitting { .. }, ImportEvent::ChunkCompleted { .. })
            | (Self::Submitting { .. }, ImportEvent::ChunkFailed(_)) => true,
            (
                Self::Submitting {
                    records, submitted, ..
                },
                ImportEvent::RunFinished,
            ) => *submitted >= records.len(),
            _ => false,
        };

        if accepted {
            Ok(())
        } else {
            Err(ImportError::InvalidTransition {
                event: event.describe(),
                state: self.name(),
            })
        }
    }

    /// Apply `event`, returning the next state.
    ///
    /// Rejected events leave nothing behind: call [`check`](Self::check)
    /// first when the current state must survive a rejection.
    pub fn reduce(self, event: ImportEvent) -> Result<Self> {
        self.check(&event)?;

        let next = match (self, event) {
            (_, ImportEvent::SourceLoaded(records)) => Self::SourceLoaded { records },
            (_, ImportEvent::SourceFailed(error)) => Self::Failed {
                records: Vec::new(),
                results: Vec::new(),
                progress: 0,
                error,
            },
            (state, ImportEvent::RunStarted) => Self::Submitting {
                records: state.into_records(),
                results: Vec::new(),
                counts: ChunkSummary::default(),
                submitted: 0,
                progress: 0,
            },
            (
                Self::Submitting {
                    records,
                    mut results,
                    mut counts,
                    submitted,
                    ..
                },
                ImportEvent::ChunkCompleted { response, size },
            ) => {
                let submitted = submitted + size;
                results.extend(response.results);
                counts.merge(&response.summary);
                Self::Submitting {
                    progress: progress_percent(submitted, records.len()),
                    records,
                    results,
                    counts,
                    submitted,
                }
            }
            (
                Self::Submitting {
                    records,
                    results,
                    progress,
                    ..
                },
                ImportEvent::ChunkFailed(error),
            ) => Self::Failed {
                records,
                results,
                progress,
                error,
            },
            (
                Self::Submitting {
                    records,
                    results,
                    counts,
                    ..
                },
                ImportEvent::RunFinished,
            ) => {
                let summary = ImportSummary {
                    total: records.len(),
                    ..ImportSummary::from(counts)
                };
                Self::Completed {
                    records,
                    results,
                    summary,
                }
            }
            // `check` has already rejected every other pairing.
            (state, _) => state,
        };

        Ok(next)
    }

    fn into_records(self) -> Vec<ImportRecord> {
        match self {
            Self::Idle => Vec::new(),
            Self::SourceLoaded { records }
            | Self::Submitting { records, .. }
            | Self::Completed { records, .. }
            | Self::Failed { records, .. } => records,
        }
    }

    /// The loaded records (empty when idle or after a failed load).
    pub fn records(&self) -> &[ImportRecord] {
        match self {
            Self::Idle => &[],
            Self::SourceLoaded { records }
            | Self::Submitting { records, .. }
            | Self::Completed { records, .. }
            | Self::Failed { records, .. } => records,
        }
    }

    /// Results aggregated so far, in submission order.
    pub fn results(&self) -> &[ImportResult] {
        match self {
            Self::Idle | Self::SourceLoaded { .. } => &[],
            Self::Submitting { results, .. }
            | Self::Completed { results, .. }
            | Self::Failed { results, .. } => results,
        }
    }

    /// Final summary; only present once a run has completed.
    pub fn summary(&self) -> Option<&ImportSummary> {
        match self {
            Self::Completed { summary, .. } => Some(summary),
            _ => None,
        }
    }

    pub fn progress(&self) -> u8 {
        match self {
            Self::Idle | Self::SourceLoaded { .. } => 0,
            Self::Submitting { progress, .. } | Self::Failed { progress, .. } => *progress,
            Self::Completed { .. } => 100,
        }
    }

    /// The latest fatal error message, if the state is `Failed`.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Submitting { .. })
    }
}
