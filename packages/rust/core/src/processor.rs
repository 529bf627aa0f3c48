//! The record processor seam and its remote implementation.
//!
//! A processor receives one chunk of records and returns a result per
//! record. Per-record problems are `error` results inside an `Ok` response;
//! only transport-level failures are `Err`, and those abort the run.

use std::future::Future;

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use contentimport_shared::{
    ChunkRequest, ChunkResponse, ErrorBody, ImportError, ImportOptions, ImportRecord, Result,
};

/// Persists one chunk of records and reports per-record outcomes.
pub trait RecordProcessor {
    /// Process `records` (chunk number `chunk`, 0-based) with `options`.
    ///
    /// Failures must be [`ImportError::ChunkSubmission`].
    fn process_chunk(
        &self,
        chunk: usize,
        records: &[ImportRecord],
        options: &ImportOptions,
    ) -> impl Future<Output = Result<ChunkResponse>>;
}

/// Submits chunks to the remote batch endpoint as `POST { blogs, options }`.
#[derive(Debug, Clone)]
pub struct HttpProcessor {
    client: Client,
    endpoint: Url,
}

impl HttpProcessor {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl RecordProcessor for HttpProcessor {
    #[instrument(skip_all, fields(chunk = chunk, records = records.len()))]
    async fn process_chunk(
        &self,
        chunk: usize,
        records: &[ImportRecord],
        options: &ImportOptions,
    ) -> Result<ChunkResponse> {
        let body = ChunkRequest {
            blogs: records,
            options,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ImportError::chunk(chunk, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(ImportError::chunk(chunk, message));
        }

        let parsed: ChunkResponse = response
            .json()
            .await
            .map_err(|e| ImportError::chunk(chunk, format!("invalid response body: {e}")))?;

        debug!(
            success = parsed.summary.success,
            skipped = parsed.summary.skipped,
            errors = parsed.summary.errors,
            "chunk accepted"
        );
        Ok(parsed)
    }
}
