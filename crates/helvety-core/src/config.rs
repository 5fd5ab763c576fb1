// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Composer configuration: session limits, cache budgets, pipeline timing.

use serde::{Deserialize, Serialize};

/// Device class the composer is running on. Drives the bitmap cache budgets,
/// which are deliberately lower on memory-constrained mobile devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    Desktop,
    Mobile,
}

/// Upload and operation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Maximum number of source documents per session.
    pub max_files: usize,
    /// Maximum size of a single uploaded file, in bytes.
    pub max_file_bytes: u64,
    /// Minimum delay between two upload batches, in milliseconds.
    pub min_upload_interval_ms: u64,
    /// Whole export/extraction operation timeout, in seconds.
    pub operation_timeout_secs: u64,
    /// Timeout for loading a single uploaded file, in seconds.
    pub file_load_timeout_secs: u64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_files: 50,
            max_file_bytes: 100 * 1024 * 1024,
            min_upload_interval_ms: 100,
            operation_timeout_secs: 60,
            file_load_timeout_secs: 30,
        }
    }
}

/// Cache capacities and memory-pressure thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of parsed document handles kept resident.
    pub document_capacity: usize,
    /// Maximum number of rendered bitmap entries.
    pub bitmap_max_entries: usize,
    /// Maximum cumulative bitmap bytes (estimated width × height × 4).
    pub bitmap_max_bytes: u64,
    /// Platform memory usage ratio above which the bitmap cache is cleared.
    pub platform_pressure_threshold: f32,
    /// Own byte-usage ratio above which the bitmap cache is cleared.
    pub self_pressure_threshold: f32,
}

impl CacheConfig {
    pub fn for_device(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Desktop => Self {
                document_capacity: 50,
                bitmap_max_entries: 200,
                bitmap_max_bytes: 256 * 1024 * 1024,
                platform_pressure_threshold: 0.80,
                self_pressure_threshold: 0.85,
            },
            DeviceClass::Mobile => Self {
                document_capacity: 50,
                bitmap_max_entries: 60,
                bitmap_max_bytes: 64 * 1024 * 1024,
                platform_pressure_threshold: 0.80,
                self_pressure_threshold: 0.85,
            },
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::for_device(DeviceClass::Desktop)
    }
}

/// Batched pipeline timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Time budget per page within a batch, in milliseconds.
    pub per_item_timeout_ms: u64,
    /// Upper bound on the inter-batch yield, in milliseconds.
    pub yield_fallback_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            per_item_timeout_ms: 10_000,
            yield_fallback_ms: 50,
        }
    }
}

/// Complete composer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposerConfig {
    pub limits: SessionLimits,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
}

impl ComposerConfig {
    pub fn for_device(class: DeviceClass) -> Self {
        Self {
            cache: CacheConfig::for_device(class),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_budgets_are_lower() {
        let desktop = CacheConfig::for_device(DeviceClass::Desktop);
        let mobile = CacheConfig::for_device(DeviceClass::Mobile);
        assert!(mobile.bitmap_max_entries < desktop.bitmap_max_entries);
        assert!(mobile.bitmap_max_bytes < desktop.bitmap_max_bytes);
    }

    #[test]
    fn defaults_match_documented_limits() {
        let limits = SessionLimits::default();
        assert_eq!(limits.max_files, 50);
        assert_eq!(limits.max_file_bytes, 100 * 1024 * 1024);
        assert_eq!(limits.operation_timeout_secs, 60);
        assert_eq!(limits.file_load_timeout_secs, 30);
    }
}
