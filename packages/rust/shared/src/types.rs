//! Core domain and wire types for content imports.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ImportError, Result};

/// Accepted slug shape: alphanumeric start, then alphanumerics, `-` or `_`.
static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("valid slug regex"));

// ---------------------------------------------------------------------------
// ImportRecord
// ---------------------------------------------------------------------------

/// One element of an imported JSON array, exactly as it was loaded.
///
/// No field validation happens on the client side; malformed records are
/// reported per item by the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportRecord(pub Value);

impl ImportRecord {
    /// The record's slug, if it has a string `slug` field.
    pub fn slug(&self) -> Option<&str> {
        self.0.get("slug").and_then(Value::as_str)
    }

    /// The record's title, if it has a string `title` field.
    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }
}

impl From<Value> for ImportRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// ContentRecord
// ---------------------------------------------------------------------------

/// A blog post as the processor persists it.
///
/// Explicit `null` in any field is treated like a missing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    /// Unique key within the collection.
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Cover image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Publish timestamp as supplied (RFC 3339 or `YYYY-MM-DD`).
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Post body.
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

/// Keys accepted for the publish date, in order of preference.
const PUBLISH_DATE_KEYS: [&str; 3] = ["publishedAt", "published_at", "date"];

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ContentRecord {
    /// Check required fields, slug shape and publish date.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("slug", &self.slug),
            ("title", &self.title),
            ("content", &self.content),
        ] {
            if value.trim().is_empty() {
                return Err(ImportError::validation(format!(
                    "missing required field: {name}"
                )));
            }
        }

        if !SLUG_RE.is_match(&self.slug) {
            return Err(ImportError::validation(format!(
                "invalid slug '{}'",
                self.slug
            )));
        }

        self.publish_date()?;
        Ok(())
    }

    /// Parsed publish timestamp, if one was supplied.
    pub fn publish_date(&self) -> Result<Option<DateTime<Utc>>> {
        self.published_at
            .as_deref()
            .map(parse_publish_date)
            .transpose()
    }
}

impl TryFrom<&ImportRecord> for ContentRecord {
    type Error = ImportError;

    fn try_from(record: &ImportRecord) -> Result<Self> {
        let Value::Object(fields) = &record.0 else {
            return Err(ImportError::validation("record is not a JSON object"));
        };

        // Fold the publish date aliases into the one key the struct reads.
        let mut fields = fields.clone();
        let published_at = PUBLISH_DATE_KEYS
            .iter()
            .filter_map(|key| fields.remove(*key))
            .find(|value| !value.is_null());
        if let Some(value) = published_at {
            fields.insert(PUBLISH_DATE_KEYS[0].to_string(), value);
        }

        let parsed: ContentRecord = serde_json::from_value(Value::Object(fields))
            .map_err(|e| ImportError::validation(format!("invalid record: {e}")))?;
        parsed.validate()?;
        Ok(parsed)
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_publish_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ImportError::validation(format!("invalid publish date '{raw}'")))
}

// ---------------------------------------------------------------------------
// Results & summaries
// ---------------------------------------------------------------------------

/// Per-record outcome reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Success,
    Skipped,
    Error,
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Outcome of one record, keyed by its slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    pub status: ImportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ImportResult {
    pub fn new(
        slug: impl Into<String>,
        title: impl Into<String>,
        status: ImportStatus,
        message: Option<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            status,
            message,
        }
    }

    /// Build a result echoing the slug and title of `record`.
    pub fn for_record(record: &ImportRecord, status: ImportStatus, message: Option<String>) -> Self {
        Self::new(
            record.slug().unwrap_or_default(),
            record.title().unwrap_or_default(),
            status,
            message,
        )
    }
}

/// Success/skipped/error counts for one chunk, or a running total of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSummary {
    #[serde(default)]
    pub success: usize,
    #[serde(default)]
    pub skipped: usize,
    #[serde(default)]
    pub errors: usize,
}

impl ChunkSummary {
    /// Count outcomes from a list of results.
    pub fn from_results(results: &[ImportResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.status {
                ImportStatus::Success => summary.success += 1,
                ImportStatus::Skipped => summary.skipped += 1,
                ImportStatus::Error => summary.errors += 1,
            }
        }
        summary
    }

    /// Add another chunk's counts to this one.
    pub fn merge(&mut self, other: &ChunkSummary) {
        self.success += other.success;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }

    pub fn total(&self) -> usize {
        self.success + self.skipped + self.errors
    }
}

/// Final counts of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total: usize,
    pub success: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl From<ChunkSummary> for ImportSummary {
    fn from(counts: ChunkSummary) -> Self {
        Self {
            total: counts.total(),
            success: counts.success,
            skipped: counts.skipped,
            errors: counts.errors,
        }
    }
}

/// Toggles applied to every chunk of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    /// Leave records whose slug already exists untouched.
    pub skip_existing: bool,
    /// Copy referenced images into managed storage.
    pub upload_images: bool,
    /// Mark imported records as published.
    pub publish: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip_existing: true,
            upload_images: true,
            publish: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire bodies
// ---------------------------------------------------------------------------

/// Body POSTed to the batch endpoint for one chunk.
#[derive(Debug, Serialize)]
pub struct ChunkRequest<'a> {
    pub blogs: &'a [ImportRecord],
    pub options: &'a ImportOptions,
}

/// Successful batch endpoint response for one chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkResponse {
    #[serde(default)]
    pub results: Vec<ImportResult>,
    #[serde(default)]
    pub summary: ChunkSummary,
}

impl ChunkResponse {
    /// Build a response whose summary is counted from `results`.
    pub fn from_results(results: Vec<ImportResult>) -> Self {
        let summary = ChunkSummary::from_results(&results);
        Self { results, summary }
    }
}

/// Successful fetch proxy response.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub blogs: Option<Value>,
}

/// Error body returned by either endpoint on a non-2xx status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> ImportRecord {
        ImportRecord(value)
    }

    #[test]
    fn import_record_accessors() {
        let r = record(json!({"slug": "cloud-costs", "title": "Cutting Cloud Costs"}));
        assert_eq!(r.slug(), Some("cloud-costs"));
        assert_eq!(r.title(), Some("Cutting Cloud Costs"));

        let r = record(json!(42));
        assert_eq!(r.slug(), None);
        assert_eq!(r.title(), None);
    }

    #[test]
    fn content_record_from_camel_case_json() {
        let r = record(json!({
            "slug": "zero-trust",
            "title": "Zero Trust in Practice",
            "description": "A field guide",
            "image": "https://cdn.example.com/zt.png",
            "publishedAt": "2024-03-01T09:30:00Z",
            "author": "Editorial Team",
            "tags": ["security", "networking"],
            "content": "<p>Body</p>"
        }));
        let parsed = ContentRecord::try_from(&r).expect("valid record");
        assert_eq!(parsed.slug, "zero-trust");
        assert_eq!(parsed.tags, vec!["security", "networking"]);
        let date = parsed.publish_date().expect("date").expect("some");
        assert_eq!(date.to_rfc3339(), "2024-03-01T09:30:00+00:00");
    }

    #[test]
    fn content_record_reports_missing_field() {
        let r = record(json!({"slug": "no-title", "content": "x"}));
        let err = ContentRecord::try_from(&r).unwrap_err();
        assert_eq!(err.to_string(), "missing required field: title");
    }

    #[test]
    fn content_record_rejects_non_object() {
        let err = ContentRecord::try_from(&record(json!("just a string"))).unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[test]
    fn content_record_rejects_bad_slug_and_date() {
        let r = record(json!({"slug": "has space", "title": "t", "content": "c"}));
        assert!(ContentRecord::try_from(&r).unwrap_err().to_string().contains("invalid slug"));

        let r = record(json!({"slug": "ok", "title": "t", "content": "c", "date": "March 1st"}));
        assert!(
            ContentRecord::try_from(&r)
                .unwrap_err()
                .to_string()
                .contains("invalid publish date")
        );
    }

    #[test]
    fn null_optional_fields_are_defaults() {
        let r = record(json!({
            "slug": "a",
            "title": "A",
            "content": "c",
            "description": null,
            "author": null,
            "tags": null,
            "image": null,
            "publishedAt": null
        }));
        let parsed = ContentRecord::try_from(&r).expect("nulls accepted");
        assert_eq!(parsed.description, "");
        assert_eq!(parsed.author, "");
        assert!(parsed.tags.is_empty());
        assert_eq!(parsed.image, None);
        assert_eq!(parsed.published_at, None);

        let r = record(json!({"slug": "a", "title": null, "content": "c"}));
        let err = ContentRecord::try_from(&r).unwrap_err();
        assert_eq!(err.to_string(), "missing required field: title");
    }

    #[test]
    fn publish_date_aliases_prefer_published_at() {
        let r = record(json!({
            "slug": "a",
            "title": "A",
            "content": "c",
            "publishedAt": "2024-05-01",
            "date": "2020-01-01"
        }));
        let parsed = ContentRecord::try_from(&r).expect("both keys accepted");
        assert_eq!(parsed.published_at.as_deref(), Some("2024-05-01"));

        let r = record(json!({
            "slug": "a",
            "title": "A",
            "content": "c",
            "publishedAt": null,
            "date": "2020-01-01"
        }));
        let parsed = ContentRecord::try_from(&r).expect("fallback key");
        assert_eq!(parsed.published_at.as_deref(), Some("2020-01-01"));
    }

    #[test]
    fn bare_date_parses_to_midnight_utc() {
        let d = parse_publish_date("2023-11-05").expect("parse");
        assert_eq!(d.to_rfc3339(), "2023-11-05T00:00:00+00:00");
    }

    #[test]
    fn chunk_summary_counts_and_merges() {
        let results = vec![
            ImportResult::new("a", "A", ImportStatus::Success, None),
            ImportResult::new("b", "B", ImportStatus::Skipped, Some("already exists".into())),
            ImportResult::new("c", "C", ImportStatus::Error, Some("boom".into())),
            ImportResult::new("d", "D", ImportStatus::Success, None),
        ];
        let mut total = ChunkSummary::from_results(&results);
        assert_eq!(total, ChunkSummary { success: 2, skipped: 1, errors: 1 });

        total.merge(&ChunkSummary { success: 1, skipped: 0, errors: 0 });
        let summary = ImportSummary::from(total);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.success + summary.skipped + summary.errors, summary.total);
    }

    #[test]
    fn options_serialize_camel_case() {
        let json = serde_json::to_value(ImportOptions::default()).expect("serialize");
        assert_eq!(
            json,
            json!({"skipExisting": true, "uploadImages": true, "publish": false})
        );
    }

    #[test]
    fn chunk_response_parses_endpoint_shape() {
        let body = json!({
            "results": [
                {"slug": "a", "title": "A", "status": "success"},
                {"slug": "b", "title": "B", "status": "error", "message": "missing required field: content"}
            ],
            "summary": {"success": 1, "skipped": 0, "errors": 1}
        });
        let parsed: ChunkResponse = serde_json::from_value(body).expect("deserialize");
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[1].status, ImportStatus::Error);
        assert_eq!(parsed.summary.errors, 1);
    }
}
