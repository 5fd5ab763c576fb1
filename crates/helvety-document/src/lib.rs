// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// helvety-document — The opaque document-library boundary for Helvety.
//
// Wraps `lopdf` for the parsed document handle (load bytes, copy pages
// between handles, serialize back to bytes), `printpdf` + `image` for
// embedding raster images into synthetic single-page containers, and provides
// upload format sniffing.

pub mod detect;
pub mod image;
pub mod pdf;

pub use detect::detect_kind;
pub use image::embed::embed_image;
pub use pdf::assemble::OutputDocument;
pub use pdf::loader::{inherent_rotations, load_handle, page_count};
