// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload format sniffing: extension + declared MIME + magic numbers.
//
// The magic number decides the format. The extension and the declared MIME
// type are cross-checked against it, so a renamed executable can't slip in as
// "photo.png".

use helvety_core::types::{DocumentKind, ImageKind};
use tracing::debug;

/// Detect the document kind of an uploaded file.
///
/// Returns a human-readable rejection reason on failure; the session layer
/// aggregates these into the numbered upload error message.
pub fn detect_kind(
    file_name: &str,
    declared_mime: &str,
    bytes: &[u8],
) -> Result<DocumentKind, String> {
    let sniffed = match sniff_magic(bytes) {
        Some(kind) => kind,
        None => return Err("unrecognized file content (unknown format)".into()),
    };

    if let Some(from_ext) = kind_from_extension(file_name)
        && from_ext != sniffed
    {
        return Err(format!(
            "file extension says {} but content is {}",
            kind_label(from_ext),
            kind_label(sniffed)
        ));
    }

    if !declared_mime.is_empty()
        && let Some(from_mime) = kind_from_mime(declared_mime)
        && from_mime != sniffed
    {
        return Err(format!(
            "declared type {} does not match content ({})",
            declared_mime,
            kind_label(sniffed)
        ));
    }

    debug!(file_name, kind = kind_label(sniffed), "upload format detected");
    Ok(sniffed)
}

/// Identify a format from the file's leading bytes.
fn sniff_magic(bytes: &[u8]) -> Option<DocumentKind> {
    if bytes.starts_with(b"%PDF-") {
        return Some(DocumentKind::Pdf);
    }
    let image = if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        ImageKind::Jpeg
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        ImageKind::Png
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        ImageKind::Gif
    } else if bytes.starts_with(b"RIFF") && bytes.len() >= 12 && &bytes[8..12] == b"WEBP" {
        ImageKind::Webp
    } else if bytes.starts_with(b"BM") {
        ImageKind::Bmp
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        ImageKind::Tiff
    } else {
        return None;
    };
    Some(DocumentKind::Image { format: image })
}

/// Infer the expected kind from the file extension, if recognized.
fn kind_from_extension(file_name: &str) -> Option<DocumentKind> {
    let ext = std::path::Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    let kind = match ext.as_str() {
        "pdf" => DocumentKind::Pdf,
        "jpg" | "jpeg" => DocumentKind::Image {
            format: ImageKind::Jpeg,
        },
        "png" => DocumentKind::Image {
            format: ImageKind::Png,
        },
        "webp" => DocumentKind::Image {
            format: ImageKind::Webp,
        },
        "gif" => DocumentKind::Image {
            format: ImageKind::Gif,
        },
        "bmp" => DocumentKind::Image {
            format: ImageKind::Bmp,
        },
        "tif" | "tiff" => DocumentKind::Image {
            format: ImageKind::Tiff,
        },
        _ => return None,
    };
    Some(kind)
}

/// Infer the expected kind from a declared MIME type, if recognized.
fn kind_from_mime(mime: &str) -> Option<DocumentKind> {
    let lower = mime.to_ascii_lowercase();
    if lower == "application/pdf" {
        return Some(DocumentKind::Pdf);
    }
    // Some platforms report the nonstandard "image/jpg".
    if lower == "image/jpg" {
        return Some(DocumentKind::Image {
            format: ImageKind::Jpeg,
        });
    }
    [
        ImageKind::Jpeg,
        ImageKind::Png,
        ImageKind::Webp,
        ImageKind::Gif,
        ImageKind::Bmp,
        ImageKind::Tiff,
    ]
    .into_iter()
    .find(|format| lower == format.mime_type())
    .map(|format| DocumentKind::Image { format })
}

fn kind_label(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Pdf => "PDF",
        DocumentKind::Image { format } => match format {
            ImageKind::Jpeg => "JPEG",
            ImageKind::Png => "PNG",
            ImageKind::Webp => "WebP",
            ImageKind::Gif => "GIF",
            ImageKind::Bmp => "BMP",
            ImageKind::Tiff => "TIFF",
        },
    }
}
