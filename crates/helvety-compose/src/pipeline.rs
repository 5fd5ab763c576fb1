// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batched export/extraction pipeline.
//
// Turns a snapshot of the filtered, rotated page sequence into one output
// document. Pages are processed in batches with a per-batch time budget and a
// cooperative yield between batches; individual page failures become
// warnings unless an entire batch fails, which aborts the whole operation.
// The caller never sees a partially-merged output: the serialized bytes exist
// only on full success.

use std::collections::BTreeMap;
use std::time::Duration;

use helvety_core::config::PipelineConfig;
use helvety_core::error::{HelvetyError, Result};
use helvety_core::types::{DocumentId, DocumentKind, Rotation, SourceDocument, UnifiedPageNumber};
use helvety_document::OutputDocument;
use tracing::{debug, info, instrument, warn};

use crate::doc_cache::DocumentCache;
use crate::rotation::{RotationStrategy, select_strategy};
use crate::scheduler::yield_to_host;

/// Batch size for a sequence of `total` active pages. Smaller batches for
/// larger exports keep each inter-yield stride short.
pub fn batch_size(total: usize) -> usize {
    match total {
        0..=10 => 10,
        11..=50 => 8,
        51..=100 => 5,
        _ => 3,
    }
}

/// One page of the export snapshot.
///
/// Everything the pipeline needs is captured here at operation start, so
/// concurrent edits to the rotation map or deletion set cannot affect an
/// in-flight run.
#[derive(Debug, Clone)]
pub struct PageJob {
    pub number: UnifiedPageNumber,
    pub document: DocumentId,
    pub file_name: String,
    /// 0-based page index within the owning document.
    pub original_index: usize,
    pub kind: DocumentKind,
    pub inherent: Rotation,
    pub user_delta: Rotation,
}

/// A non-fatal per-page failure, reported alongside a successful export.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PageWarning {
    pub page: UnifiedPageNumber,
    pub file_name: String,
    pub detail: String,
}

/// A fully assembled, serialized export.
#[derive(Debug)]
pub struct ExportOutcome {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub warnings: Vec<PageWarning>,
}

/// Run the pipeline over a page snapshot.
///
/// Appends pages to the output in exactly the snapshot sequence, batch by
/// batch, then serializes the assembled handle. The caller bounds the whole
/// operation (including serialization) with its per-operation timeout.
#[instrument(skip_all, fields(pages = jobs.len()))]
pub async fn run(
    jobs: &[PageJob],
    documents: &BTreeMap<DocumentId, SourceDocument>,
    cache: &mut DocumentCache,
    config: &PipelineConfig,
) -> Result<ExportOutcome> {
    if jobs.is_empty() {
        return Err(HelvetyError::PdfError(
            "nothing to export: no visible pages".into(),
        ));
    }

    let batch = batch_size(jobs.len());
    let chunks: Vec<&[PageJob]> = jobs.chunks(batch).collect();
    info!(
        pages = jobs.len(),
        batch,
        batches = chunks.len(),
        "starting batched assembly"
    );

    let mut out = OutputDocument::new();
    let mut warnings: Vec<PageWarning> = Vec::new();

    for (batch_index, chunk) in chunks.iter().enumerate() {
        let budget = batch_budget(config, chunk.len());
        let mut failures: Vec<PageWarning> = Vec::new();

        let finished = tokio::time::timeout(
            budget,
            process_batch(&mut out, chunk, documents, cache, &mut failures),
        )
        .await;

        if finished.is_err() {
            // Batch overran its budget: every item not already failed is
            // marked failed with a timeout cause, which makes the batch,
            // and with it the operation, fail as a whole.
            let already_failed: Vec<UnifiedPageNumber> =
                failures.iter().map(|w| w.page).collect();
            for job in chunk.iter().filter(|j| !already_failed.contains(&j.number)) {
                failures.push(PageWarning {
                    page: job.number,
                    file_name: job.file_name.clone(),
                    detail: format!("batch timed out after {}ms", budget.as_millis()),
                });
            }
        }

        if failures.len() == chunk.len() {
            let first = &failures[0];
            warn!(
                batch_index,
                failed = failures.len(),
                "entire batch failed, aborting export"
            );
            return Err(HelvetyError::BatchFailed {
                failed: failures.len(),
                first: format!(
                    "page {} ('{}'): {}",
                    first.page, first.file_name, first.detail
                ),
            });
        }

        warnings.extend(failures);

        if batch_index + 1 < chunks.len() {
            yield_to_host(Duration::from_millis(config.yield_fallback_ms)).await;
        }
    }

    let page_count = out.page_count();
    let bytes = tokio::task::spawn_blocking(move || out.into_bytes())
        .await
        .map_err(|err| HelvetyError::PdfError(format!("serialize task failed: {}", err)))??;

    info!(
        page_count,
        bytes = bytes.len(),
        warnings = warnings.len(),
        "assembly complete"
    );
    Ok(ExportOutcome {
        bytes,
        page_count,
        warnings,
    })
}

/// Per-batch time budget: `min(per_item × batch_len, per_item × 3)`.
fn batch_budget(config: &PipelineConfig, batch_len: usize) -> Duration {
    Duration::from_millis(config.per_item_timeout_ms) * batch_len.min(3) as u32
}

/// Process one batch sequentially, recording per-item failures without
/// aborting. Sequential resolution keeps the ordering guarantee structural:
/// pages land in the output in snapshot order, never completion order.
async fn process_batch(
    out: &mut OutputDocument,
    chunk: &[PageJob],
    documents: &BTreeMap<DocumentId, SourceDocument>,
    cache: &mut DocumentCache,
    failures: &mut Vec<PageWarning>,
) {
    for job in chunk {
        if let Err(err) = process_item(out, job, documents, cache).await {
            warn!(page = %job.number, file = %job.file_name, %err, "page failed");
            failures.push(PageWarning {
                page: job.number,
                file_name: job.file_name.clone(),
                detail: err.to_string(),
            });
        }
    }
}

/// Resolve and append a single page.
async fn process_item(
    out: &mut OutputDocument,
    job: &PageJob,
    documents: &BTreeMap<DocumentId, SourceDocument>,
    cache: &mut DocumentCache,
) -> Result<()> {
    let document = documents.get(&job.document).ok_or_else(|| {
        HelvetyError::PageFailure {
            page: job.number.0,
            file_name: job.file_name.clone(),
            detail: "owning document is no longer loaded".into(),
        }
    })?;

    let handle = cache.get_or_parse(document).await?;

    match select_strategy(job.kind, job.inherent, job.user_delta) {
        RotationStrategy::Metadata(effective) => {
            let page = out.append_page(handle, job.original_index)?;
            if effective != job.inherent {
                out.set_page_rotation(page, effective)?;
            }
        }
        RotationStrategy::Redraw(quarter_turn) => {
            out.append_redrawn_page(handle, job.original_index, quarter_turn)?;
        }
    }

    debug!(page = %job.number, "page appended to output");
    Ok(())
}
