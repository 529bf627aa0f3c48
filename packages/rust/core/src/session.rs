//! One operator's import session: load a source, preview, submit.

use std::path::Path;

use tracing::warn;

use contentimport_shared::{ImportOptions, ImportRecord, Result};

use crate::presenter::{self, RecordOutcome};
use crate::processor::RecordProcessor;
use crate::source::{self, SourceResolver};
use crate::state::{ImportEvent, ImportRunState};
use crate::submitter::{BatchSubmitter, ProgressReporter};

/// Owns the current [`ImportRunState`] and moves it through each step.
pub struct ImportSession {
    resolver: SourceResolver,
    state: ImportRunState,
}

impl ImportSession {
    pub fn new(resolver: SourceResolver) -> Self {
        Self {
            resolver,
            state: ImportRunState::Idle,
        }
    }

    pub fn state(&self) -> &ImportRunState {
        &self.state
    }

    /// Load records from a JSON file, replacing any previous source and run.
    pub async fn load_file(&mut self, path: &Path) -> Result<usize> {
        self.ensure_loadable()?;
        let loaded = self.resolver.resolve_file(path).await;
        self.apply_load(loaded)
    }

    /// Load records from a URL, replacing any previous source and run.
    pub async fn load_url(&mut self, url: &str) -> Result<usize> {
        self.ensure_loadable()?;
        let loaded = self.resolver.resolve_url(url).await;
        self.apply_load(loaded)
    }

    /// Load records from JSON text already in memory (e.g. stdin).
    pub fn load_str(&mut self, text: &str) -> Result<usize> {
        self.ensure_loadable()?;
        self.apply_load(source::resolve_str(text))
    }

    fn ensure_loadable(&self) -> Result<()> {
        self.state.check(&ImportEvent::SourceLoaded(Vec::new()))
    }

    /// Record the outcome of a load. A failure is kept in the state as the
    /// visible error and also returned.
    fn apply_load(&mut self, loaded: Result<Vec<ImportRecord>>) -> Result<usize> {
        let state = std::mem::take(&mut self.state);
        match loaded {
            Ok(records) => {
                let count = records.len();
                self.state = state.reduce(ImportEvent::SourceLoaded(records))?;
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "source load failed");
                self.state = state.reduce(ImportEvent::SourceFailed(e.to_string()))?;
                Err(e)
            }
        }
    }

    /// Submit the loaded records through `processor`.
    ///
    /// A chunk failure is not an `Err`: the returned state is `Failed` and
    /// keeps the results gathered before it. `Err` means no run could start.
    pub async fn submit<P: RecordProcessor>(
        &mut self,
        processor: &P,
        options: &ImportOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<&ImportRunState> {
        self.state.check(&ImportEvent::RunStarted)?;
        let state = std::mem::take(&mut self.state);
        self.state = BatchSubmitter::new(processor)
            .run(state, options, progress)
            .await?;
        Ok(&self.state)
    }

    /// Every loaded record with its outcome so far.
    pub fn outcomes(&self) -> Vec<RecordOutcome<'_>> {
        presenter::project(self.state.records(), self.state.results())
    }
}
