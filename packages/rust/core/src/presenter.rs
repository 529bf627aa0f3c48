//! Projects run results onto the loaded records for display.

use std::collections::{HashMap, VecDeque};

use contentimport_shared::{ImportRecord, ImportResult, ImportStatus, ImportSummary};

/// A loaded record paired with its outcome, if one has arrived.
#[derive(Debug, Clone, Copy)]
pub struct RecordOutcome<'a> {
    pub record: &'a ImportRecord,
    /// `None` means not yet processed.
    pub result: Option<&'a ImportResult>,
}

/// Pair each record with a result carrying the same slug.
///
/// Repeated slugs are matched by occurrence: the n-th record with a slug gets
/// the n-th result with that slug.
pub fn project<'a>(
    records: &'a [ImportRecord],
    results: &'a [ImportResult],
) -> Vec<RecordOutcome<'a>> {
    let mut by_slug: HashMap<&str, VecDeque<&ImportResult>> =
        HashMap::with_capacity(results.len());
    for result in results {
        by_slug
            .entry(result.slug.as_str())
            .or_default()
            .push_back(result);
    }

    records
        .iter()
        .map(|record| RecordOutcome {
            record,
            result: by_slug
                .get_mut(record.slug().unwrap_or_default())
                .and_then(VecDeque::pop_front),
        })
        .collect()
}

fn status_label(result: Option<&ImportResult>) -> &'static str {
    match result.map(|r| r.status) {
        Some(ImportStatus::Success) => "success",
        Some(ImportStatus::Skipped) => "skipped",
        Some(ImportStatus::Error) => "error",
        None => "pending",
    }
}

/// One display line: status, slug, title, and the processor's message.
pub fn render_line(outcome: &RecordOutcome<'_>) -> String {
    let slug = outcome.record.slug().unwrap_or("(no slug)");
    let title = outcome.record.title().unwrap_or("(untitled)");
    let mut line = format!("{:<8} {slug}  {title}", status_label(outcome.result));
    if let Some(message) = outcome.result.and_then(|r| r.message.as_deref()) {
        line.push_str(&format!("  ({message})"));
    }
    line
}

pub fn render_summary(summary: &ImportSummary) -> String {
    format!(
        "Total: {}  Success: {}  Skipped: {}  Errors: {}",
        summary.total, summary.success, summary.skipped, summary.errors
    )
}
