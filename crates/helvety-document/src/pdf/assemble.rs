// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output-document assembly — build one PDF from pages copied out of other
// parsed handles, applying rotation either as page metadata or as a redrawn
// form XObject with swapped dimensions.

use helvety_core::error::HelvetyError;
use helvety_core::types::Rotation;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, instrument, warn};

/// Incrementally assembled output document.
///
/// Pages are appended in call order; `into_bytes` finalises the page tree and
/// serialises the handle.
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        // Reserved up front so appended pages can point their /Parent at it;
        // the dictionary itself is written in `into_bytes`.
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Copy the page at `page_index` (0-based) out of `source` and append it.
    ///
    /// The page object and everything it transitively references (contents,
    /// fonts, images) are deep-cloned into this document. Returns the id of
    /// the appended page.
    #[instrument(skip(self, source), fields(page_index))]
    pub fn append_page(
        &mut self,
        source: &Document,
        page_index: usize,
    ) -> Result<ObjectId, HelvetyError> {
        let page_id = source_page_id(source, page_index)?;
        let page_object = source.get_object(page_id).map_err(|err| {
            HelvetyError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
        })?;

        let cloned = clone_object(source, &mut self.doc, page_object)?;
        let cloned_id = self.doc.add_object(cloned);

        if let Ok(Object::Dictionary(page_dict)) = self.doc.get_object_mut(cloned_id) {
            page_dict.set("Parent", Object::Reference(self.pages_id));
        }

        self.kids.push(cloned_id);
        debug!(page_index, total = self.kids.len(), "page appended");
        Ok(cloned_id)
    }

    /// Set the `/Rotate` metadata on an appended page.
    pub fn set_page_rotation(
        &mut self,
        page: ObjectId,
        rotation: Rotation,
    ) -> Result<(), HelvetyError> {
        match self.doc.get_object_mut(page) {
            Ok(Object::Dictionary(dict)) => {
                dict.set("Rotate", Object::Integer(rotation.degrees() as i64));
                Ok(())
            }
            _ => Err(HelvetyError::PdfError(format!(
                "appended page {:?} is not a dictionary",
                page
            ))),
        }
    }

    /// Redraw the page at `page_index` of `source` into a new page with
    /// swapped width/height, rotated by a quarter turn.
    ///
    /// The source page becomes a form XObject drawn under a rotation matrix:
    /// 90° places the origin at `(height, 0)`, 270° at `(0, width)`. Metadata
    /// rotation cannot express this for flattened raster content, which is
    /// why image-origin pages take this path.
    #[instrument(skip(self, source), fields(page_index, degrees = rotation.degrees()))]
    pub fn append_redrawn_page(
        &mut self,
        source: &Document,
        page_index: usize,
        rotation: Rotation,
    ) -> Result<ObjectId, HelvetyError> {
        if !rotation.swaps_dimensions() {
            return Err(HelvetyError::PdfError(format!(
                "redraw requested for non-dimension-swapping rotation {}°",
                rotation.degrees()
            )));
        }

        let page_id = source_page_id(source, page_index)?;
        let (x0, y0, x1, y1) = media_box(source, page_id);
        let width = x1 - x0;
        let height = y1 - y0;

        // Wrap the source page's content and resources as a form XObject.
        let content = source.get_page_content(page_id).map_err(|err| {
            HelvetyError::PdfError(format!("cannot read page content: {}", err))
        })?;
        let resources = cloned_page_resources(source, &mut self.doc, page_id)?;

        let form_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![
                Object::Real(x0),
                Object::Real(y0),
                Object::Real(x1),
                Object::Real(y1),
            ],
            "Resources" => resources,
        };
        let form_id = self.doc.add_object(Stream::new(form_dict, content));

        // cm = [cos sin -sin cos tx ty] with the rotation-specific origin.
        let matrix: [f32; 6] = match rotation {
            Rotation::R90 => [0.0, 1.0, -1.0, 0.0, height, 0.0],
            Rotation::R270 => [0.0, -1.0, 1.0, 0.0, 0.0, width],
            _ => unreachable!("guarded above"),
        };

        let ops = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("cm", matrix.iter().map(|&v| Object::Real(v)).collect()),
                Operation::new("Do", vec![Object::Name(b"Fx0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = ops.encode().map_err(|err| {
            HelvetyError::PdfError(format!("cannot encode redraw content: {}", err))
        })?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

        let page = dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(self.pages_id),
            // Width and height swap relative to the source page.
            "MediaBox" => vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(height),
                Object::Real(width),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Fx0" => Object::Reference(form_id) },
            },
        };
        let cloned_id = self.doc.add_object(page);

        self.kids.push(cloned_id);
        debug!(total = self.kids.len(), "redrawn page appended");
        Ok(cloned_id)
    }

    /// Finalise the page tree and serialise the document to bytes.
    pub fn into_bytes(mut self) -> Result<Vec<u8>, HelvetyError> {
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self
                .kids
                .iter()
                .map(|&id| Object::Reference(id))
                .collect::<Vec<_>>(),
            "Count" => self.kids.len() as i64,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(self.pages_id),
        });
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut output = Vec::new();
        self.doc.save_to(&mut output).map_err(|err| {
            HelvetyError::PdfError(format!("failed to serialise output document: {}", err))
        })?;
        Ok(output)
    }
}

/// Object id of the page at `page_index` (0-based).
fn source_page_id(source: &Document, page_index: usize) -> Result<ObjectId, HelvetyError> {
    let pages = source.get_pages();
    // lopdf keys pages by 1-indexed page number.
    pages
        .get(&(page_index as u32 + 1))
        .copied()
        .ok_or_else(|| {
            HelvetyError::PdfError(format!(
                "page index {} out of range (document has {} pages)",
                page_index,
                pages.len()
            ))
        })
}

/// The page's `/MediaBox` as (x0, y0, x1, y1), falling back to US Letter when
/// absent or malformed.
fn media_box(source: &Document, page_id: ObjectId) -> (f32, f32, f32, f32) {
    let values: Option<Vec<f32>> = source
        .get_object(page_id)
        .ok()
        .and_then(|obj| obj.as_dict().ok())
        .and_then(|dict| dict.get(b"MediaBox").ok())
        .and_then(|boxed| match boxed {
            Object::Array(arr) => Some(arr),
            Object::Reference(id) => source
                .get_object(*id)
                .ok()
                .and_then(|obj| obj.as_array().ok()),
            _ => None,
        })
        .map(|arr| arr.iter().filter_map(as_number).collect());

    match values.as_deref() {
        Some([x0, y0, x1, y1]) => (*x0, *y0, *x1, *y1),
        _ => {
            warn!(?page_id, "page has no usable MediaBox, assuming letter size");
            (0.0, 0.0, 612.0, 792.0)
        }
    }
}

fn as_number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Deep-clone the `/Resources` of a page into `target`, returning the cloned
/// dictionary (empty when the page declares none).
fn cloned_page_resources(
    source: &Document,
    target: &mut Document,
    page_id: ObjectId,
) -> Result<Object, HelvetyError> {
    let resources = source
        .get_object(page_id)
        .ok()
        .and_then(|obj| obj.as_dict().ok())
        .and_then(|dict| dict.get(b"Resources").ok());

    match resources {
        Some(object) => clone_object(source, target, object),
        None => Ok(Object::Dictionary(lopdf::Dictionary::new())),
    }
}

/// Deep-clone a single lopdf object into `target`, recursively resolving
/// references. The `/Parent` back-reference is skipped to avoid cloning the
/// source's whole page tree; callers patch it afterwards.
fn clone_object(
    source: &Document,
    target: &mut Document,
    object: &Object,
) -> Result<Object, HelvetyError> {
    match object {
        Object::Dictionary(dict) => {
            let mut new_dict = lopdf::Dictionary::new();
            for (key, value) in dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned_value = clone_object(source, target, value)?;
                new_dict.set(key.clone(), cloned_value);
            }
            Ok(Object::Dictionary(new_dict))
        }
        Object::Array(arr) => {
            let mut new_arr = Vec::with_capacity(arr.len());
            for item in arr {
                new_arr.push(clone_object(source, target, item)?);
            }
            Ok(Object::Array(new_arr))
        }
        Object::Reference(ref_id) => match source.get_object(*ref_id) {
            Ok(referenced) => {
                let cloned = clone_object(source, target, referenced)?;
                let new_id = target.add_object(cloned);
                Ok(Object::Reference(new_id))
            }
            Err(err) => {
                warn!(?ref_id, %err, "cannot resolve reference, using Null");
                Ok(Object::Null)
            }
        },
        Object::Stream(stream) => {
            let mut new_dict = lopdf::Dictionary::new();
            for (key, value) in stream.dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned_value = clone_object(source, target, value)?;
                new_dict.set(key.clone(), cloned_value);
            }
            Ok(Object::Stream(Stream::new(new_dict, stream.content.clone())))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::loader;

    /// Minimal one-page PDF with the given media box, built directly with
    /// lopdf.
    fn one_page_pdf(width: i64, height: i64) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ],
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

    #[test]
    fn appended_pages_round_trip() {
        let source = loader::load_handle(&one_page_pdf(612, 792)).expect("load");

        let mut out = OutputDocument::new();
        out.append_page(&source, 0).expect("append");
        out.append_page(&source, 0).expect("append again");
        assert_eq!(out.page_count(), 2);

        let bytes = out.into_bytes().expect("serialise");
        let reparsed = loader::load_handle(&bytes).expect("reparse");
        assert_eq!(loader::page_count(&reparsed), 2);
    }

    #[test]
    fn out_of_range_page_is_an_error() {
        let source = loader::load_handle(&one_page_pdf(612, 792)).expect("load");
        let mut out = OutputDocument::new();
        let err = out.append_page(&source, 3).unwrap_err();
        assert!(matches!(err, HelvetyError::PdfError(_)));
    }

    #[test]
    fn metadata_rotation_is_written() {
        let source = loader::load_handle(&one_page_pdf(612, 792)).expect("load");
        let mut out = OutputDocument::new();
        let page = out.append_page(&source, 0).expect("append");
        out.set_page_rotation(page, Rotation::R180).expect("rotate");

        let bytes = out.into_bytes().expect("serialise");
        let reparsed = loader::load_handle(&bytes).expect("reparse");
        assert_eq!(
            loader::inherent_rotations(&reparsed),
            vec![Rotation::R180]
        );
    }

    #[test]
    fn redrawn_page_swaps_dimensions() {
        let source = loader::load_handle(&one_page_pdf(600, 800)).expect("load");
        let mut out = OutputDocument::new();
        out.append_redrawn_page(&source, 0, Rotation::R90)
            .expect("redraw");

        let bytes = out.into_bytes().expect("serialise");
        let reparsed = loader::load_handle(&bytes).expect("reparse");
        let pages = reparsed.get_pages();
        let page_id = pages[&1];
        let (x0, y0, x1, y1) = media_box(&reparsed, page_id);
        assert_eq!((x0, y0), (0.0, 0.0));
        assert_eq!((x1, y1), (800.0, 600.0));
    }

    #[test]
    fn redraw_rejects_half_turns() {
        let source = loader::load_handle(&one_page_pdf(600, 800)).expect("load");
        let mut out = OutputDocument::new();
        assert!(out.append_redrawn_page(&source, 0, Rotation::R180).is_err());
    }
}
