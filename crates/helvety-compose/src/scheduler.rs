// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cooperative yield point.
//
// Large exports hand control back to the host scheduler between batches so
// interactive work stays responsive. The primitive is deliberately generic:
// suspend, let the runtime run whatever is pending, and resume, with a
// bounded fallback so a saturated scheduler cannot stall the pipeline.

use std::time::Duration;

/// Yield to the host scheduler, resuming after pending tasks have had a
/// chance to run or after `fallback` at the latest.
pub async fn yield_to_host(fallback: Duration) {
    let _ = tokio::time::timeout(fallback, tokio::task::yield_now()).await;
}
