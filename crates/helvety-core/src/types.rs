// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Helvety page composer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Unique identifier for an uploaded source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported raster image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
    Bmp,
    Tiff,
}

impl ImageKind {
    /// MIME type string for this image format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
        }
    }
}

/// Origin of a source document, decided once at load time.
///
/// Image-origin documents are embedded into a synthetic single-page container
/// and can always be re-derived from their original bytes. The distinction
/// also drives rotation strategy selection during export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Pdf,
    Image { format: ImageKind },
}

/// A page rotation, always a quarter turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// Normalize an arbitrary degree value to a quarter turn.
    ///
    /// `normalize(x) = ((x mod 360) + 360) mod 360`, rounded to the nearest
    /// multiple of 90.
    pub fn from_degrees(degrees: i32) -> Self {
        let normalized = degrees.rem_euclid(360);
        match ((normalized + 45) / 90) % 4 {
            1 => Self::R90,
            2 => Self::R180,
            3 => Self::R270,
            _ => Self::R0,
        }
    }

    /// Degree value of this rotation.
    pub fn degrees(self) -> u16 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }

    /// Compose two rotations, staying within the quarter-turn group.
    pub fn compose(self, other: Rotation) -> Rotation {
        Self::from_degrees(self.degrees() as i32 + other.degrees() as i32)
    }

    /// Whether this rotation swaps page width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Self::R90 | Self::R270)
    }
}

/// Handle to an externally-owned preview resource (e.g. an object URL held by
/// the thumbnail collaborator).
///
/// Each `SourceDocument` exclusively owns its handle and must release it
/// exactly once, at document removal or session teardown. A double release is
/// logged and ignored; a handle dropped without release is logged as a leak.
#[derive(Debug)]
pub struct PreviewHandle {
    resource: String,
    released: bool,
}

impl PreviewHandle {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            released: false,
        }
    }

    /// The external resource identifier this handle refers to.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release the underlying resource.
    pub fn release(&mut self) {
        if self.released {
            warn!(resource = %self.resource, "preview handle released twice");
            return;
        }
        self.released = true;
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if !self.released {
            warn!(resource = %self.resource, "preview handle dropped without release");
        }
    }
}

/// One uploaded file, validated and parsed.
///
/// Holds the original bytes for the whole session: PDF handles are re-parsed
/// from them on cache misses, and image-origin documents are re-embedded into
/// their single-page container from them.
#[derive(Debug)]
pub struct SourceDocument {
    pub id: DocumentId,
    pub kind: DocumentKind,
    /// Original file name as supplied by the upload collaborator.
    pub file_name: String,
    /// Raw uploaded bytes (PDF data, or encoded image data).
    pub bytes: Arc<Vec<u8>>,
    /// Native page count. Always 1 for image-origin documents.
    pub page_count: usize,
    /// Per-original-page inherent rotation from PDF page metadata.
    /// Empty for image-origin documents.
    pub inherent_rotations: Vec<Rotation>,
    /// Exclusively-owned preview resource, released on removal.
    pub preview: PreviewHandle,
}

impl SourceDocument {
    /// Inherent rotation of the given 0-based original page.
    pub fn inherent_rotation(&self, original_index: usize) -> Rotation {
        self.inherent_rotations
            .get(original_index)
            .copied()
            .unwrap_or(Rotation::R0)
    }
}

/// Globally unique, monotonically assigned page number spanning all loaded
/// source documents. Never reused while the owning document is loaded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UnifiedPageNumber(pub u32);

impl std::fmt::Display for UnifiedPageNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A virtual page slot in the unified index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnifiedPage {
    pub number: UnifiedPageNumber,
    pub document: DocumentId,
    /// 0-based page index within the owning document.
    pub original_index: usize,
}
