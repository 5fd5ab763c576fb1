// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bitmap render cache — memory-bounded cache of rasterized page previews.
//
// Entries are keyed by render parameters and bounded twice over: by entry
// count and by cumulative estimated bytes (width × height × 4). An external
// memory-pressure monitor may clear the whole cache regardless of recency.
// The cache is purely an optimization: consumers must be able to re-render
// from the document cache on any miss.

use helvety_core::config::CacheConfig;
use helvety_core::types::{DocumentId, Rotation};
use std::collections::HashMap;
use tracing::{debug, info};

/// Device pixel ratio as a hashable key component.
#[derive(Debug, Clone, Copy)]
pub struct PixelRatio(pub f32);

impl PartialEq for PixelRatio {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for PixelRatio {}

impl std::hash::Hash for PixelRatio {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// Render parameters identifying one cached preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitmapKey {
    pub document: DocumentId,
    /// 0-based original page index within the document.
    pub page_index: usize,
    pub target_width: u32,
    pub pixel_ratio: PixelRatio,
    pub rotation: Rotation,
}

/// A rendered page preview.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Estimated memory footprint: 4 bytes per pixel.
    pub fn estimated_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * 4
    }
}

struct BitmapSlot {
    bitmap: Bitmap,
    estimated_bytes: u64,
    last_used: u64,
}

/// Dual-bounded LRU cache of rendered bitmaps.
pub struct BitmapCache {
    entries: HashMap<BitmapKey, BitmapSlot>,
    max_entries: usize,
    max_bytes: u64,
    total_bytes: u64,
    self_pressure_threshold: f32,
    platform_pressure_threshold: f32,
    clock: u64,
}

impl BitmapCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: config.bitmap_max_entries.max(1),
            max_bytes: config.bitmap_max_bytes.max(1),
            total_bytes: 0,
            self_pressure_threshold: config.self_pressure_threshold,
            platform_pressure_threshold: config.platform_pressure_threshold,
            clock: 0,
        }
    }

    /// Look up a rendered preview, marking it most-recently-used on a hit.
    pub fn get(&mut self, key: &BitmapKey) -> Option<&Bitmap> {
        self.clock += 1;
        let clock = self.clock;
        let slot = self.entries.get_mut(key)?;
        slot.last_used = clock;
        Some(&slot.bitmap)
    }

    /// Insert a rendered preview, evicting least-recently-used entries until
    /// both the entry-count and byte bounds hold.
    pub fn put(&mut self, key: BitmapKey, bitmap: Bitmap) {
        let estimated_bytes = bitmap.estimated_bytes();

        // Replacing an entry releases its old footprint first.
        if let Some(old) = self.entries.remove(&key) {
            self.total_bytes -= old.estimated_bytes;
        }

        while !self.entries.is_empty()
            && (self.entries.len() + 1 > self.max_entries
                || self.total_bytes + estimated_bytes > self.max_bytes)
        {
            self.evict_lru();
        }

        self.clock += 1;
        self.total_bytes += estimated_bytes;
        self.entries.insert(
            key,
            BitmapSlot {
                bitmap,
                estimated_bytes,
                last_used: self.clock,
            },
        );
    }

    /// Evict the least-recently-used entry, returning its key.
    pub fn evict_lru(&mut self) -> Option<BitmapKey> {
        let key = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(&key, _)| key)?;
        if let Some(slot) = self.entries.remove(&key) {
            self.total_bytes -= slot.estimated_bytes;
            debug!(?key, freed = slot.estimated_bytes, "evicted bitmap");
        }
        Some(key)
    }

    /// Drop every cached bitmap unconditionally.
    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.total_bytes = 0;
        if dropped > 0 {
            info!(dropped, "bitmap cache cleared");
        }
    }

    /// Drop every bitmap belonging to a removed document.
    pub fn remove_document(&mut self, document: DocumentId) {
        let before = self.entries.len();
        self.entries.retain(|key, slot| {
            let keep = key.document != document;
            if !keep {
                self.total_bytes -= slot.estimated_bytes;
            }
            keep
        });
        debug!(
            dropped = before - self.entries.len(),
            "document bitmaps dropped"
        );
    }

    /// Memory-pressure hook for the periodic platform monitor.
    ///
    /// Clears the whole cache, regardless of recency, when observed platform
    /// memory usage or this cache's own byte usage crosses its threshold.
    /// Returns whether a clear happened.
    pub fn check_pressure(&mut self, platform_usage_ratio: f32) -> bool {
        let self_ratio = self.total_bytes as f32 / self.max_bytes as f32;
        if platform_usage_ratio >= self.platform_pressure_threshold
            || self_ratio >= self.self_pressure_threshold
        {
            info!(
                platform_usage_ratio,
                self_ratio, "memory pressure, clearing bitmap cache"
            );
            self.clear();
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}
