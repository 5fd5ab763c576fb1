// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// helvety-compose — The page-composition and batched-export engine.
//
// A unified, globally-ordered page index layered over independently cached
// parsed documents, rotation composition choosing between metadata rotation
// and content redraw, and a batched, yield-aware export pipeline with bounded
// caches and partial-failure semantics.

pub mod bitmap_cache;
pub mod doc_cache;
pub mod index;
pub mod pipeline;
pub mod rotation;
pub mod scheduler;
pub mod session;

pub use bitmap_cache::{Bitmap, BitmapCache, BitmapKey, PixelRatio};
pub use doc_cache::DocumentCache;
pub use index::UnifiedPageIndex;
pub use pipeline::{ExportOutcome, PageJob, PageWarning, batch_size};
pub use rotation::{RotationStrategy, effective_rotation, select_strategy, shows_rotation_badge};
pub use session::{AddOutcome, ComposerSession, DownloadSink, ExportReport, IncomingFile};
