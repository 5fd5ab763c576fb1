// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rotation composition — resolve inherent (source metadata) and user-applied
// rotation into one effective transform, and choose how the export applies
// it.

use helvety_core::types::{DocumentKind, Rotation};

/// How the export applies a page's rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStrategy {
    /// Set `/Rotate` metadata on the copied output page. Cheap; viewers
    /// honor it for all four angles on native PDF content.
    Metadata(Rotation),
    /// Redraw the page into a new, dimension-swapped page. Required for
    /// quarter-turn rotation of flattened raster content, where metadata
    /// rotation would not reflow the swapped dimensions.
    Redraw(Rotation),
}

/// The combined transform of source metadata and the user's delta, always a
/// quarter turn.
pub fn effective_rotation(inherent: Rotation, user_delta: Rotation) -> Rotation {
    inherent.compose(user_delta)
}

/// Pick the export strategy for one page.
///
/// Only the user's delta and the document's origin participate: 0°/180°
/// deltas never change page dimensions, and native PDF pages tolerate
/// metadata rotation at any angle.
pub fn select_strategy(
    kind: DocumentKind,
    inherent: Rotation,
    user_delta: Rotation,
) -> RotationStrategy {
    match (user_delta, kind) {
        (Rotation::R90 | Rotation::R270, DocumentKind::Image { .. }) => {
            RotationStrategy::Redraw(user_delta)
        }
        _ => RotationStrategy::Metadata(effective_rotation(inherent, user_delta)),
    }
}

/// Whether the UI should badge the page as rotated. Based on the user's
/// explicit delta alone: a page whose inherent rotation happens to cancel
/// the delta still shows as rotated.
pub fn shows_rotation_badge(user_delta: Rotation) -> bool {
    user_delta != Rotation::R0
}
