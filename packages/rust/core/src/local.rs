//! Local record processor backed by the embedded content database.
//!
//! Per record: validate, look up by slug, optionally skip existing rows,
//! optionally relocate the cover image, then insert or update. Anything wrong
//! with a single record becomes an `error` result; only storage failures
//! abort the chunk.

use tracing::{debug, instrument, warn};

use contentimport_shared::{
    ChunkResponse, ContentRecord, ImportError, ImportOptions, ImportRecord, ImportResult,
    ImportStatus, Result,
};
use contentimport_storage::{BlogPost, Storage};

use crate::media::ImageRelocator;
use crate::processor::RecordProcessor;

/// Processes chunks directly against a [`Storage`] database.
pub struct LocalProcessor {
    storage: Storage,
    images: ImageRelocator,
}

impl LocalProcessor {
    pub fn new(storage: Storage, images: ImageRelocator) -> Self {
        Self { storage, images }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Process one record. `Err` is reserved for storage failures.
    async fn process_record(
        &self,
        record: &ImportRecord,
        options: &ImportOptions,
    ) -> Result<ImportResult> {
        let mut content = match ContentRecord::try_from(record) {
            Ok(content) => content,
            Err(e) => {
                debug!(slug = record.slug().unwrap_or_default(), error = %e, "record rejected");
                return Ok(ImportResult::for_record(
                    record,
                    ImportStatus::Error,
                    Some(e.to_string()),
                ));
            }
        };

        let existing = self.storage.get_post_by_slug(&content.slug).await?;
        if existing.is_some() && options.skip_existing {
            return Ok(ImportResult::for_record(
                record,
                ImportStatus::Skipped,
                Some("already exists".into()),
            ));
        }

        if options.upload_images {
            if let Some(image) = content
                .image
                .as_deref()
                .filter(|i| self.images.needs_relocation(i))
            {
                match self.images.relocate(image).await {
                    Ok(managed) => content.image = Some(managed),
                    Err(e) => {
                        warn!(slug = %content.slug, error = %e, "image relocation failed");
                        return Ok(ImportResult::for_record(
                            record,
                            ImportStatus::Error,
                            Some(format!("image upload failed: {e}")),
                        ));
                    }
                }
            }
        }

        let post = BlogPost::from_record(&content, options.publish)?;
        let message = if existing.is_some() {
            self.storage.update_post(&post).await?;
            "updated"
        } else {
            self.storage.insert_post(&post).await?;
            "created"
        };

        Ok(ImportResult::for_record(
            record,
            ImportStatus::Success,
            Some(message.into()),
        ))
    }
}

impl RecordProcessor for LocalProcessor {
    #[instrument(skip_all, fields(chunk = chunk, records = records.len()))]
    async fn process_chunk(
        &self,
        chunk: usize,
        records: &[ImportRecord],
        options: &ImportOptions,
    ) -> Result<ChunkResponse> {
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let result = self
                .process_record(record, options)
                .await
                .map_err(|e| ImportError::chunk(chunk, e.to_string()))?;
            results.push(result);
        }
        Ok(ChunkResponse::from_results(results))
    }
}
