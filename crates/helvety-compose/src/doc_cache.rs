// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document cache — bounded LRU over parsed document handles.
//
// Implemented as a dense arena keyed by document id plus a counter-based
// recency stamp, with eviction as an explicit, testable function. Parsing on
// miss happens off the cooperative scheduler in a blocking task; the cache
// itself is only ever touched from the single engine control flow, so no
// locking is involved.

use std::collections::HashMap;
use std::sync::Arc;

use helvety_core::error::{HelvetyError, Result};
use helvety_core::types::{DocumentId, DocumentKind, SourceDocument};
use lopdf::Document;
use tracing::{debug, instrument};

struct CacheSlot {
    handle: Document,
    last_used: u64,
}

/// LRU cache of parsed document handles.
pub struct DocumentCache {
    entries: HashMap<DocumentId, CacheSlot>,
    capacity: usize,
    clock: u64,
}

impl DocumentCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    /// Resolve a document's parsed handle, parsing on miss.
    ///
    /// A hit marks the entry most-recently-used. A miss parses from the
    /// document's original bytes (directly for PDFs, via re-embedding into
    /// the single-page container for image-origin documents) and inserts,
    /// evicting exactly one least-recently-used entry first when at
    /// capacity. Parse failures carry the source file name and leave the
    /// cache unmutated.
    #[instrument(skip(self, document), fields(id = %document.id))]
    pub async fn get_or_parse(&mut self, document: &SourceDocument) -> Result<&Document> {
        if !self.entries.contains_key(&document.id) {
            let handle = parse_document(document).await?;
            if self.entries.len() >= self.capacity
                && let Some(evicted) = self.evict_lru()
            {
                debug!(%evicted, "evicted least-recently-used document handle");
            }
            let stamp = self.next_stamp();
            self.entries.insert(
                document.id,
                CacheSlot {
                    handle,
                    last_used: stamp,
                },
            );
        } else {
            let stamp = self.next_stamp();
            if let Some(slot) = self.entries.get_mut(&document.id) {
                slot.last_used = stamp;
            }
        }

        Ok(&self
            .entries
            .get(&document.id)
            .expect("entry ensured above")
            .handle)
    }

    /// Drop a document's cached handle, if present.
    pub fn remove(&mut self, id: DocumentId) {
        self.entries.remove(&id);
    }

    /// Drop every cached handle.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Evict the least-recently-used entry, returning its id.
    pub fn evict_lru(&mut self) -> Option<DocumentId> {
        let id = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(&id, _)| id)?;
        self.entries.remove(&id);
        Some(id)
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids currently resident, in no particular order.
    pub fn resident_ids(&self) -> Vec<DocumentId> {
        self.entries.keys().copied().collect()
    }

    fn next_stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Parse a source document into a fresh handle on the blocking pool.
async fn parse_document(document: &SourceDocument) -> Result<Document> {
    parse_bytes(
        document.kind,
        Arc::clone(&document.bytes),
        &document.file_name,
    )
    .await
}

/// Parse raw uploaded bytes into a handle on the blocking pool.
///
/// Image-origin documents have no persisted handle of their own; they are
/// always re-derived by embedding the original bytes into their single-page
/// container. Failures carry the source file name.
pub(crate) async fn parse_bytes(
    kind: DocumentKind,
    bytes: Arc<Vec<u8>>,
    file_name: &str,
) -> Result<Document> {
    let parsed = tokio::task::spawn_blocking(move || match kind {
        DocumentKind::Pdf => helvety_document::load_handle(&bytes),
        DocumentKind::Image { .. } => {
            let container = helvety_document::embed_image(&bytes)?;
            helvety_document::load_handle(&container)
        }
    })
    .await
    .map_err(|err| HelvetyError::PdfError(format!("parse task failed: {}", err)))?;

    parsed.map_err(|err| HelvetyError::ParseFailure {
        file_name: file_name.to_string(),
        detail: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use helvety_core::types::PreviewHandle;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    fn one_page_pdf_bytes() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content = Content {
            operations: vec![Operation::new("q", vec![]), Operation::new("Q", vec![])],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save");
        bytes
    }

    fn pdf_source(name: &str) -> SourceDocument {
        SourceDocument {
            id: DocumentId::new(),
            kind: DocumentKind::Pdf,
            file_name: name.into(),
            bytes: Arc::new(one_page_pdf_bytes()),
            page_count: 1,
            inherent_rotations: vec![helvety_core::types::Rotation::R0],
            preview: PreviewHandle::new(format!("blob:{name}")),
        }
    }

    fn release(mut doc: SourceDocument) {
        doc.preview.release();
    }

    #[tokio::test]
    async fn hit_after_miss_does_not_reparse_size() {
        let mut cache = DocumentCache::new(4);
        let doc = pdf_source("a.pdf");

        cache.get_or_parse(&doc).await.expect("first parse");
        assert_eq!(cache.len(), 1);
        cache.get_or_parse(&doc).await.expect("hit");
        assert_eq!(cache.len(), 1);
        release(doc);
    }

    #[tokio::test]
    async fn capacity_evicts_exactly_the_lru_entry() {
        let mut cache = DocumentCache::new(2);
        let a = pdf_source("a.pdf");
        let b = pdf_source("b.pdf");
        let c = pdf_source("c.pdf");

        cache.get_or_parse(&a).await.unwrap();
        cache.get_or_parse(&b).await.unwrap();
        // Touch `a` so `b` becomes least recently used.
        cache.get_or_parse(&a).await.unwrap();
        cache.get_or_parse(&c).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(a.id));
        assert!(!cache.contains(b.id));
        assert!(cache.contains(c.id));
        release(a);
        release(b);
        release(c);
    }

    #[tokio::test]
    async fn bound_holds_for_many_inserts() {
        let mut cache = DocumentCache::new(50);
        let mut docs = Vec::new();
        for i in 0..55 {
            docs.push(pdf_source(&format!("doc{i}.pdf")));
        }
        for doc in &docs {
            cache.get_or_parse(doc).await.unwrap();
            assert!(cache.len() <= 50);
        }

        // The resident set is exactly the 50 most recently accessed.
        let resident: std::collections::HashSet<_> =
            cache.resident_ids().into_iter().collect();
        for doc in &docs[..5] {
            assert!(!resident.contains(&doc.id));
        }
        for doc in &docs[5..] {
            assert!(resident.contains(&doc.id));
        }
        for doc in docs {
            release(doc);
        }
    }

    #[tokio::test]
    async fn parse_failure_names_the_file_and_leaves_cache_clean() {
        let mut cache = DocumentCache::new(4);
        let mut bad = pdf_source("broken.pdf");
        bad.bytes = Arc::new(b"not a pdf".to_vec());

        let err = cache.get_or_parse(&bad).await.unwrap_err();
        match err {
            HelvetyError::ParseFailure { file_name, .. } => {
                assert_eq!(file_name, "broken.pdf")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(cache.is_empty());
        release(bad);
    }

    #[tokio::test]
    async fn image_origin_is_rederived_from_original_bytes() {
        use std::io::Cursor;
        let img = image::RgbImage::from_pixel(6, 3, image::Rgb([1, 2, 3]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encode png");

        let doc = SourceDocument {
            id: DocumentId::new(),
            kind: DocumentKind::Image {
                format: helvety_core::types::ImageKind::Png,
            },
            file_name: "photo.png".into(),
            bytes: Arc::new(png),
            page_count: 1,
            inherent_rotations: Vec::new(),
            preview: PreviewHandle::new("blob:photo"),
        };

        let mut cache = DocumentCache::new(2);
        {
            let handle = cache.get_or_parse(&doc).await.expect("derive container");
            assert_eq!(helvety_document::page_count(handle), 1);
        }

        // Evict, then re-derive from the same original bytes.
        cache.clear();
        let handle = cache.get_or_parse(&doc).await.expect("re-derive");
        assert_eq!(helvety_document::page_count(handle), 1);
        release(doc);
    }
}
