//! Chunked, strictly sequential batch submission.
//!
//! Records are split into contiguous chunks of [`CHUNK_SIZE`] and handed to a
//! [`RecordProcessor`] one at a time. Chunk `n + 1` is only built after chunk
//! `n`'s response has been merged into the run state. The first chunk failure
//! ends the run; later chunks are never submitted.

use std::time::Instant;

use tracing::{info, instrument, warn};

use contentimport_shared::{ImportOptions, ImportResult, Result};

use crate::processor::RecordProcessor;
use crate::state::{ImportEvent, ImportRunState};

/// Records per submission request.
pub const CHUNK_SIZE: usize = 10;

/// Progress callback for reporting run status.
pub trait ProgressReporter {
    /// Called once before the first chunk is submitted.
    fn run_started(&self, total_records: usize, total_chunks: usize);
    /// Called after each chunk's results have been merged.
    fn chunk_completed(&self, chunk: usize, progress: u8, results: &[ImportResult]);
    /// Called with the terminal state (completed or failed).
    fn run_finished(&self, state: &ImportRunState);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn run_started(&self, _total_records: usize, _total_chunks: usize) {}
    fn chunk_completed(&self, _chunk: usize, _progress: u8, _results: &[ImportResult]) {}
    fn run_finished(&self, _state: &ImportRunState) {}
}

/// Drives a whole run through a [`RecordProcessor`].
pub struct BatchSubmitter<'a, P> {
    processor: &'a P,
}

impl<'a, P: RecordProcessor> BatchSubmitter<'a, P> {
    pub fn new(processor: &'a P) -> Self {
        Self { processor }
    }

    /// Submit every record loaded in `state`, folding each chunk's outcome
    /// into the run state.
    ///
    /// Returns the terminal state: `Completed`, or `Failed` if a chunk
    /// submission failed. `Err` means `state` could not start a run.
    #[instrument(skip_all, fields(records = state.records().len()))]
    pub async fn run(
        &self,
        state: ImportRunState,
        options: &ImportOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<ImportRunState> {
        let start = Instant::now();
        let mut state = state.reduce(ImportEvent::RunStarted)?;

        let records = state.records().to_vec();
        let total_chunks = records.len().div_ceil(CHUNK_SIZE);
        progress.run_started(records.len(), total_chunks);
        info!(total_chunks, ?options, "starting batch run");

        for (index, chunk) in records.chunks(CHUNK_SIZE).enumerate() {
            let merged_before = state.results().len();

            match self.processor.process_chunk(index, chunk, options).await {
                Ok(response) => {
                    state = state.reduce(ImportEvent::ChunkCompleted {
                        response,
                        size: chunk.len(),
                    })?;
                    progress.chunk_completed(
                        index,
                        state.progress(),
                        &state.results()[merged_before..],
                    );
                }
                Err(e) => {
                    warn!(chunk = index, error = %e, "chunk submission failed, aborting run");
                    state = state.reduce(ImportEvent::ChunkFailed(e.to_string()))?;
                    progress.run_finished(&state);
                    return Ok(state);
                }
            }
        }

        state = state.reduce(ImportEvent::RunFinished)?;
        progress.run_finished(&state);

        if let Some(summary) = state.summary() {
            info!(
                total = summary.total,
                success = summary.success,
                skipped = summary.skipped,
                errors = summary.errors,
                elapsed_ms = start.elapsed().as_millis(),
                "batch run complete"
            );
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use contentimport_shared::{
        ChunkResponse, ImportError, ImportRecord, ImportStatus,
    };
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::processor::HttpProcessor;

    /// Processor that answers every record with `success`, failing on one chunk index.
    struct ScriptedProcessor {
        fail_on: Option<usize>,
        calls: RefCell<Vec<(usize, usize)>>,
    }

    impl ScriptedProcessor {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                fail_on,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl RecordProcessor for ScriptedProcessor {
        async fn process_chunk(
            &self,
            chunk: usize,
            records: &[ImportRecord],
            _options: &ImportOptions,
        ) -> Result<ChunkResponse> {
            self.calls.borrow_mut().push((chunk, records.len()));
            if self.fail_on == Some(chunk) {
                return Err(ImportError::chunk(chunk, "connection reset by peer"));
            }
            let results = records
                .iter()
                .map(|r| ImportResult::for_record(r, ImportStatus::Success, None))
                .collect();
            Ok(ChunkResponse::from_results(results))
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        percentages: RefCell<Vec<u8>>,
        finished: RefCell<Option<&'static str>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn run_started(&self, _total_records: usize, _total_chunks: usize) {}
        fn chunk_completed(&self, _chunk: usize, progress: u8, _results: &[ImportResult]) {
            self.percentages.borrow_mut().push(progress);
        }
        fn run_finished(&self, state: &ImportRunState) {
            *self.finished.borrow_mut() = Some(state.name());
        }
    }

    fn loaded(n: usize) -> ImportRunState {
        let records = (0..n)
            .map(|i| ImportRecord(json!({"slug": format!("post-{i}"), "title": format!("Post {i}")})))
            .collect();
        ImportRunState::SourceLoaded { records }
    }

    #[tokio::test]
    async fn twenty_five_records_in_three_chunks() {
        let processor = ScriptedProcessor::new(None);
        let progress = RecordingProgress::default();

        let state = BatchSubmitter::new(&processor)
            .run(loaded(25), &ImportOptions::default(), &progress)
            .await
            .unwrap();

        assert_eq!(*processor.calls.borrow(), vec![(0, 10), (1, 10), (2, 5)]);
        assert_eq!(*progress.percentages.borrow(), vec![40, 80, 100]);
        assert_eq!(*progress.finished.borrow(), Some("completed"));

        let summary = state.summary().unwrap();
        assert_eq!(summary.total, 25);
        assert_eq!(summary.success, 25);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.errors, 0);

        let slugs: Vec<&str> = state.results().iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs.first(), Some(&"post-0"));
        assert_eq!(slugs.last(), Some(&"post-24"));
    }

    #[tokio::test]
    async fn request_count_is_ceil_of_chunks() {
        for n in [1, 9, 10, 11, 20, 31] {
            let processor = ScriptedProcessor::new(None);
            let state = BatchSubmitter::new(&processor)
                .run(loaded(n), &ImportOptions::default(), &SilentProgress)
                .await
                .unwrap();
            let calls = processor.calls.borrow();
            assert_eq!(calls.len(), n.div_ceil(CHUNK_SIZE));
            let indices: Vec<usize> = calls.iter().map(|(i, _)| *i).collect();
            assert_eq!(indices, (0..calls.len()).collect::<Vec<_>>());
            assert_eq!(state.summary().unwrap().total, n);
        }
    }

    #[tokio::test]
    async fn failure_stops_later_chunks() {
        let processor = ScriptedProcessor::new(Some(1));
        let progress = RecordingProgress::default();

        let state = BatchSubmitter::new(&processor)
            .run(loaded(25), &ImportOptions::default(), &progress)
            .await
            .unwrap();

        assert_eq!(*processor.calls.borrow(), vec![(0, 10), (1, 10)]);
        assert_eq!(state.results().len(), 10);
        assert!(state.summary().is_none());
        assert_eq!(
            state.error(),
            Some("chunk 1 failed: connection reset by peer")
        );
        assert_eq!(*progress.percentages.borrow(), vec![40]);
        assert_eq!(*progress.finished.borrow(), Some("failed"));
    }

    #[tokio::test]
    async fn failure_on_first_chunk_has_no_results() {
        let processor = ScriptedProcessor::new(Some(0));
        let state = BatchSubmitter::new(&processor)
            .run(loaded(5), &ImportOptions::default(), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(processor.calls.borrow().len(), 1);
        assert!(state.results().is_empty());
        assert_eq!(state.progress(), 0);
    }

    #[tokio::test]
    async fn idle_state_cannot_run() {
        let processor = ScriptedProcessor::new(None);
        let err = BatchSubmitter::new(&processor)
            .run(ImportRunState::Idle, &ImportOptions::default(), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidTransition { .. }));
        assert!(processor.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn http_run_against_mock_endpoint() {
        let server = MockServer::start().await;
        // Every chunk gets the same canned response; the summary is taken from it.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"slug": "x", "title": "X", "status": "success"}],
                "summary": {"success": 1, "skipped": 0, "errors": 0}
            })))
            .expect(3)
            .mount(&server)
            .await;

        let endpoint = url::Url::parse(&server.uri()).unwrap();
        let processor = HttpProcessor::new(reqwest::Client::new(), endpoint);
        let state = BatchSubmitter::new(&processor)
            .run(loaded(25), &ImportOptions::default(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(state.results().len(), 3);
        assert_eq!(state.summary().unwrap().success, 3);
        assert_eq!(state.summary().unwrap().total, 25);
    }

    #[tokio::test]
    async fn http_network_error_on_second_chunk() {
        let server = MockServer::start().await;
        let ok_body = json!({
            "results": (0..10).map(|i| json!({"slug": format!("post-{i}"), "title": "t", "status": "success"})).collect::<Vec<_>>(),
            "summary": {"success": 10, "skipped": 0, "errors": 0}
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        // Second request stalls past the client timeout.
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(200))
            .build()
            .unwrap();
        let endpoint = url::Url::parse(&server.uri()).unwrap();
        let processor = HttpProcessor::new(client, endpoint);

        let state = BatchSubmitter::new(&processor)
            .run(loaded(25), &ImportOptions::default(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(state.name(), "failed");
        assert_eq!(state.results().len(), 10);
        assert!(state.summary().is_none());
        assert!(state.error().unwrap().starts_with("chunk 1 failed"));
    }
}
