// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Composer session — the service facade the UI collaborator talks to.
//
// Owns the source-document table, the unified page index, and both caches.
// Uploads are validated (extension + MIME + magic number), size- and
// count-limited, and parsed under the per-file-load timeout. Export and
// extraction snapshot the index, run the batched pipeline under the
// per-operation timeout, and hand the serialized bytes to the download
// collaborator.
//
// Exactly one export/extraction is expected to be logically in flight at a
// time; callers serialize their invocations. The engine does not enforce
// this.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use helvety_core::config::ComposerConfig;
use helvety_core::error::{HelvetyError, Result};
use helvety_core::messages::aggregate_rejections;
use helvety_core::types::{
    DocumentId, DocumentKind, PreviewHandle, SourceDocument, UnifiedPageNumber,
};
use tracing::{info, instrument, warn};

use crate::bitmap_cache::BitmapCache;
use crate::doc_cache::{DocumentCache, parse_bytes};
use crate::index::UnifiedPageIndex;
use crate::pipeline::{self, PageJob, PageWarning};

/// One user-selected file, as handed over by the upload collaborator.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    /// Declared MIME type; may be empty when the platform doesn't know.
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Result of an upload batch. Valid files load even when siblings are
/// rejected; the rejection summary uses the numbered aggregate format.
#[derive(Debug, serde::Serialize)]
pub struct AddOutcome {
    pub added: Vec<DocumentId>,
    pub rejection: Option<String>,
}

/// Download collaborator: receives the finished bytes under their generated
/// file name.
pub trait DownloadSink {
    fn deliver(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Outcome of a successful export or extraction.
#[derive(Debug, serde::Serialize)]
pub struct ExportReport {
    pub file_name: String,
    pub page_count: usize,
    pub warnings: Vec<PageWarning>,
}

/// The composer session.
pub struct ComposerSession {
    config: ComposerConfig,
    documents: BTreeMap<DocumentId, SourceDocument>,
    index: UnifiedPageIndex,
    doc_cache: DocumentCache,
    bitmap_cache: BitmapCache,
    last_upload: Option<Instant>,
}

impl ComposerSession {
    pub fn new(config: ComposerConfig) -> Self {
        let doc_cache = DocumentCache::new(config.cache.document_capacity);
        let bitmap_cache = BitmapCache::new(&config.cache);
        Self {
            config,
            documents: BTreeMap::new(),
            index: UnifiedPageIndex::new(),
            doc_cache,
            bitmap_cache,
            last_upload: None,
        }
    }

    // -- Uploads --------------------------------------------------------------

    /// Validate and load a batch of user-selected files.
    #[instrument(skip_all, fields(files = files.len()))]
    pub async fn add_files(&mut self, files: Vec<IncomingFile>) -> Result<AddOutcome> {
        self.enforce_upload_interval()?;

        let mut added = Vec::new();
        let mut rejections: Vec<(String, String)> = Vec::new();
        let load_timeout = Duration::from_secs(self.config.limits.file_load_timeout_secs);

        for file in files {
            if self.documents.len() + added.len() >= self.config.limits.max_files {
                rejections.push((
                    file.name,
                    format!(
                        "session limit of {} files reached",
                        self.config.limits.max_files
                    ),
                ));
                continue;
            }
            if file.bytes.len() as u64 > self.config.limits.max_file_bytes {
                rejections.push((
                    file.name,
                    format!(
                        "file exceeds the {}MB size limit",
                        self.config.limits.max_file_bytes / (1024 * 1024)
                    ),
                ));
                continue;
            }

            let kind = match helvety_document::detect_kind(&file.name, &file.mime, &file.bytes)
            {
                Ok(kind) => kind,
                Err(reason) => {
                    rejections.push((file.name, reason));
                    continue;
                }
            };

            match self.load_document(file.name.clone(), kind, file.bytes, load_timeout).await {
                Ok(id) => added.push(id),
                Err(err) => rejections.push((file.name, err.to_string())),
            }
        }

        let rejection = if rejections.is_empty() {
            None
        } else {
            Some(aggregate_rejections(&rejections))
        };

        info!(
            added = added.len(),
            rejected = rejections.len(),
            "upload batch processed"
        );

        match (&rejection, added.is_empty()) {
            (Some(summary), true) => Err(HelvetyError::FilesRejected(summary.clone())),
            _ => Ok(AddOutcome { added, rejection }),
        }
    }

    /// Parse one accepted file and register it with the index.
    ///
    /// The parsed handle is only used to read page count and inherent
    /// rotations; cache entries are created lazily on first pipeline access.
    async fn load_document(
        &mut self,
        name: String,
        kind: DocumentKind,
        bytes: Vec<u8>,
        load_timeout: Duration,
    ) -> Result<DocumentId> {
        let bytes = Arc::new(bytes);
        let handle = tokio::time::timeout(
            load_timeout,
            parse_bytes(kind, Arc::clone(&bytes), &name),
        )
        .await
        .map_err(|_| HelvetyError::Timeout {
            operation: format!("loading '{name}'"),
            ms: load_timeout.as_millis() as u64,
        })??;

        let (page_count, inherent_rotations) = match kind {
            DocumentKind::Pdf => (
                helvety_document::page_count(&handle),
                helvety_document::inherent_rotations(&handle),
            ),
            DocumentKind::Image { .. } => (1, Vec::new()),
        };

        if page_count == 0 {
            return Err(HelvetyError::ParseFailure {
                file_name: name,
                detail: "document has no pages".into(),
            });
        }

        let id = DocumentId::new();
        let document = SourceDocument {
            id,
            kind,
            file_name: name,
            bytes,
            page_count,
            inherent_rotations,
            preview: PreviewHandle::new(format!("preview:{id}")),
        };

        self.index.add_documents(&[(id, page_count)]);
        self.documents.insert(id, document);
        Ok(id)
    }

    fn enforce_upload_interval(&mut self) -> Result<()> {
        let min_interval = Duration::from_millis(self.config.limits.min_upload_interval_ms);
        if let Some(last) = self.last_upload {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                return Err(HelvetyError::UploadThrottled {
                    wait_ms: (min_interval - elapsed).as_millis() as u64,
                });
            }
        }
        self.last_upload = Some(Instant::now());
        Ok(())
    }

    // -- Document lifecycle ---------------------------------------------------

    /// Remove a document: index entries, cache entries, and the preview
    /// resource all go.
    pub fn remove_document(&mut self, id: DocumentId) -> Result<()> {
        let mut document = self
            .documents
            .remove(&id)
            .ok_or_else(|| HelvetyError::PdfError(format!("document {id} is not loaded")))?;

        self.index.remove_document(id);
        self.doc_cache.remove(id);
        self.bitmap_cache.remove_document(id);
        document.preview.release();
        info!(%id, "document removed");
        Ok(())
    }

    /// Remove every document and drop all cached state.
    pub fn clear(&mut self) {
        let ids: Vec<DocumentId> = self.documents.keys().copied().collect();
        for id in ids {
            self.index.remove_document(id);
            if let Some(mut document) = self.documents.remove(&id) {
                document.preview.release();
            }
        }
        self.doc_cache.clear();
        self.bitmap_cache.clear();
        info!("session cleared");
    }

    // -- Export and extraction ------------------------------------------------

    /// Export the filtered, rotated page sequence into one document and hand
    /// it to the download collaborator.
    #[instrument(skip_all)]
    pub async fn export(&mut self, sink: &mut dyn DownloadSink) -> Result<ExportReport> {
        let jobs = self.snapshot(None)?;
        let outcome = self.run_pipeline("export", &jobs).await?;

        let file_name = export_file_name(Local::now());
        sink.deliver(&file_name, outcome.bytes)?;
        Ok(ExportReport {
            file_name,
            page_count: outcome.page_count,
            warnings: outcome.warnings,
        })
    }

    /// Export a single page, deleted or not, as its own document.
    #[instrument(skip_all, fields(page = %page))]
    pub async fn extract_page(
        &mut self,
        page: UnifiedPageNumber,
        sink: &mut dyn DownloadSink,
    ) -> Result<ExportReport> {
        let jobs = self.snapshot(Some(page))?;
        let job = &jobs[0];
        let file_name =
            extract_file_name(&job.file_name, job.original_index + 1, Local::now());

        let outcome = self.run_pipeline("extraction", &jobs).await?;
        sink.deliver(&file_name, outcome.bytes)?;
        Ok(ExportReport {
            file_name,
            page_count: outcome.page_count,
            warnings: outcome.warnings,
        })
    }

    /// Capture the page snapshot for an operation: the filtered order for a
    /// full export, or one page for extraction. Rotation state is read here,
    /// once; later edits cannot affect the run.
    fn snapshot(&self, single: Option<UnifiedPageNumber>) -> Result<Vec<PageJob>> {
        let pages = match single {
            Some(number) => {
                let page = self
                    .index
                    .page(number)
                    .ok_or(HelvetyError::UnknownPage(number.0))?;
                vec![page]
            }
            None => self.index.visible_pages(),
        };

        pages
            .into_iter()
            .map(|page| {
                let document = self.documents.get(&page.document).ok_or_else(|| {
                    HelvetyError::PdfError(format!(
                        "page {} references unloaded document {}",
                        page.number, page.document
                    ))
                })?;
                Ok(PageJob {
                    number: page.number,
                    document: document.id,
                    file_name: document.file_name.clone(),
                    original_index: page.original_index,
                    kind: document.kind,
                    inherent: document.inherent_rotation(page.original_index),
                    user_delta: self.index.user_rotation(page.number),
                })
            })
            .collect()
    }

    async fn run_pipeline(
        &mut self,
        operation: &str,
        jobs: &[PageJob],
    ) -> Result<pipeline::ExportOutcome> {
        let op_timeout = Duration::from_secs(self.config.limits.operation_timeout_secs);
        tokio::time::timeout(
            op_timeout,
            pipeline::run(
                jobs,
                &self.documents,
                &mut self.doc_cache,
                &self.config.pipeline,
            ),
        )
        .await
        .map_err(|_| {
            warn!(operation, "operation timed out");
            HelvetyError::Timeout {
                operation: operation.into(),
                ms: op_timeout.as_millis() as u64,
            }
        })?
    }

    // -- Memory pressure ------------------------------------------------------

    /// Feed one observation from the periodic platform memory monitor.
    /// Returns whether the bitmap cache was cleared.
    pub fn on_memory_sample(&mut self, platform_usage_ratio: f32) -> bool {
        self.bitmap_cache.check_pressure(platform_usage_ratio)
    }

    // -- Accessors ------------------------------------------------------------

    pub fn index(&self) -> &UnifiedPageIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut UnifiedPageIndex {
        &mut self.index
    }

    pub fn bitmap_cache_mut(&mut self) -> &mut BitmapCache {
        &mut self.bitmap_cache
    }

    pub fn document(&self, id: DocumentId) -> Option<&SourceDocument> {
        self.documents.get(&id)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

impl Drop for ComposerSession {
    fn drop(&mut self) {
        // Preview resources must be released exactly once even if the caller
        // never cleared the session.
        for document in self.documents.values_mut() {
            if !document.preview.is_released() {
                document.preview.release();
            }
        }
    }
}

// -- File names ---------------------------------------------------------------

/// `helvety-pdf_<YYYYMMDD-HHMMSS>.pdf`, local time, zero-padded.
pub fn export_file_name(now: DateTime<Local>) -> String {
    format!("helvety-pdf_{}.pdf", now.format("%Y%m%d-%H%M%S"))
}

/// `<original-basename>_page<originalPageNumber>_<timestamp>.pdf`.
pub fn extract_file_name(
    original_name: &str,
    original_page_number: usize,
    now: DateTime<Local>,
) -> String {
    let stem = std::path::Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("page");
    format!(
        "{}_page{}_{}.pdf",
        stem,
        original_page_number,
        now.format("%Y%m%d-%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 5, 9, 3, 7).unwrap()
    }

    #[test]
    fn export_file_name_is_zero_padded() {
        assert_eq!(
            export_file_name(fixed_time()),
            "helvety-pdf_20260805-090307.pdf"
        );
    }

    #[test]
    fn extract_file_name_uses_basename_and_original_page() {
        assert_eq!(
            extract_file_name("Holiday Scans.pdf", 3, fixed_time()),
            "Holiday Scans_page3_20260805-090307.pdf"
        );
    }

    #[test]
    fn extract_file_name_survives_odd_names() {
        assert_eq!(
            extract_file_name("..", 1, fixed_time()),
            "page_page1_20260805-090307.pdf"
        );
    }

    #[tokio::test]
    async fn upload_interval_is_enforced() {
        let mut config = ComposerConfig::default();
        config.limits.min_upload_interval_ms = 60_000;
        let mut session = ComposerSession::new(config);
        // First batch passes the throttle (and fails on content, which is
        // fine for this test).
        let _ = session
            .add_files(vec![IncomingFile {
                name: "a.bin".into(),
                mime: String::new(),
                bytes: b"junk".to_vec(),
            }])
            .await;

        let err = session
            .add_files(vec![IncomingFile {
                name: "b.bin".into(),
                mime: String::new(),
                bytes: b"junk".to_vec(),
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, HelvetyError::UploadThrottled { .. }));
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_with_reason() {
        let mut config = ComposerConfig::default();
        config.limits.max_file_bytes = 16;
        config.limits.min_upload_interval_ms = 0;
        let mut session = ComposerSession::new(config);

        let err = session
            .add_files(vec![IncomingFile {
                name: "big.pdf".into(),
                mime: "application/pdf".into(),
                bytes: vec![0u8; 64],
            }])
            .await
            .unwrap_err();
        match err {
            HelvetyError::FilesRejected(summary) => assert!(summary.contains("size limit")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn file_count_limit_rejects_the_overflow() {
        let mut config = ComposerConfig::default();
        config.limits.max_files = 0;
        config.limits.min_upload_interval_ms = 0;
        let mut session = ComposerSession::new(config);

        let err = session
            .add_files(vec![IncomingFile {
                name: "doc.pdf".into(),
                mime: "application/pdf".into(),
                bytes: b"%PDF-1.5".to_vec(),
            }])
            .await
            .unwrap_err();
        match err {
            HelvetyError::FilesRejected(summary) => {
                assert!(summary.contains("limit"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
