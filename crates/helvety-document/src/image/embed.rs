// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster-image embedding — wrap an uploaded image into a synthetic
// single-page PDF container using `printpdf` 0.8.
//
// The container is a pure function of the image bytes: the page is sized to
// the image at 72 DPI (one pixel per point) with no margins, so a cache miss
// can rebuild an equivalent container from the original bytes at any time.

use helvety_core::error::HelvetyError;
use image::load_from_memory;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, instrument};

const EMBED_DPI: f32 = 72.0;
const MM_PER_PT: f32 = 25.4 / 72.0;

/// Embed encoded image bytes (JPEG, PNG, …) into a single-page PDF container,
/// returning the container's serialized bytes.
#[instrument(skip_all, fields(bytes_len = data.len()))]
pub fn embed_image(data: &[u8]) -> Result<Vec<u8>, HelvetyError> {
    let dynamic_image = load_from_memory(data)
        .map_err(|err| HelvetyError::ImageError(format!("failed to decode image: {}", err)))?;

    let width_px = dynamic_image.width() as usize;
    let height_px = dynamic_image.height() as usize;

    let rgb_image = dynamic_image.to_rgb8();
    let raw = RawImage {
        pixels: RawImageData::U8(rgb_image.into_raw()),
        width: width_px,
        height: height_px,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    };

    let mut doc = PdfDocument::new("Helvety Image");
    let xobject_id = doc.add_image(&raw);

    // One pixel per point: the page is exactly the image's size.
    let page_w = Mm(width_px as f32 * MM_PER_PT);
    let page_h = Mm(height_px as f32 * MM_PER_PT);

    let ops = vec![Op::UseXobject {
        id: xobject_id,
        transform: XObjectTransform {
            translate_x: Some(Pt(0.0)),
            translate_y: Some(Pt(0.0)),
            scale_x: Some(1.0),
            scale_y: Some(1.0),
            dpi: Some(EMBED_DPI),
            rotate: None,
        },
    }];

    let page = PdfPage::new(page_w, page_h, ops);
    doc.with_pages(vec![page]);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let output = doc.save(&PdfSaveOptions::default(), &mut warnings);

    debug!(
        width_px,
        height_px,
        container_bytes = output.len(),
        "image embedded into single-page container"
    );
    Ok(output)
}
