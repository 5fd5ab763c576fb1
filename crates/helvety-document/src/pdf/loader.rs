// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF loader — parse raw bytes into a `lopdf` document handle and inspect
// page-level metadata.

use helvety_core::error::HelvetyError;
use helvety_core::types::Rotation;
use lopdf::{Document, Object};
use tracing::{debug, instrument};

/// Parse raw PDF bytes into a document handle.
#[instrument(skip_all, fields(bytes_len = data.len()))]
pub fn load_handle(data: &[u8]) -> Result<Document, HelvetyError> {
    let document = Document::load_mem(data)
        .map_err(|err| HelvetyError::PdfError(format!("failed to parse PDF: {}", err)))?;

    debug!(pages = document.get_pages().len(), "PDF handle loaded");
    Ok(document)
}

/// Number of pages in the document.
pub fn page_count(document: &Document) -> usize {
    document.get_pages().len()
}

/// Inherent `/Rotate` metadata of every page, in page order, normalized to
/// quarter turns. Pages without a rotation entry report `R0`.
pub fn inherent_rotations(document: &Document) -> Vec<Rotation> {
    document
        .get_pages()
        .values()
        .map(|&page_id| {
            let degrees = document
                .get_object(page_id)
                .ok()
                .and_then(|obj| obj.as_dict().ok())
                .and_then(|dict| dict.get(b"Rotate").ok())
                .and_then(|rotate| resolve_i64(document, rotate))
                .unwrap_or(0);
            Rotation::from_degrees(degrees as i32)
        })
        .collect()
}

/// Resolve an integer object, following one level of indirection.
fn resolve_i64(document: &Document, object: &Object) -> Option<i64> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok()?.as_i64().ok(),
        other => other.as_i64().ok(),
    }
}
