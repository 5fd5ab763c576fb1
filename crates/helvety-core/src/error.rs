// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Helvety.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Helvety operations.
#[derive(Debug, Error)]
pub enum HelvetyError {
    // -- Upload / validation errors --
    #[error("{0}")]
    FilesRejected(String),

    #[error("uploads arriving too fast, wait {wait_ms}ms and try again")]
    UploadThrottled { wait_ms: u64 },

    // -- Document errors --
    #[error("failed to load '{file_name}': {detail}")]
    ParseFailure { file_name: String, detail: String },

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Page index errors --
    #[error("page {0} is not part of the current document set")]
    UnknownPage(u32),

    #[error("at least one page must remain visible")]
    LastVisiblePage,

    #[error("new page order is not a permutation of the current pages: {0}")]
    InvalidReorder(String),

    // -- Pipeline errors --
    #[error("page {page} from '{file_name}' could not be processed: {detail}")]
    PageFailure {
        page: u32,
        file_name: String,
        detail: String,
    },

    #[error("batch of {failed} page(s) failed; first failure: {first}")]
    BatchFailed { failed: usize, first: String },

    #[error("{operation} timed out after {ms}ms")]
    Timeout { operation: String, ms: u64 },

    // -- Ambient --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HelvetyError>;

/// Failure taxonomy surfaced to callers.
///
/// Detection is message-pattern based because the underlying PDF and image
/// libraries report failures as free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    PasswordProtected,
    Corrupted,
    Network,
    Timeout,
    InvalidFormat,
    Unknown,
}

impl ErrorKind {
    /// Whether an automatic retry has a chance of succeeding.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Unknown)
    }
}

impl HelvetyError {
    /// Classify this error into the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::FilesRejected(_) => ErrorKind::InvalidFormat,
            Self::UploadThrottled { .. } => ErrorKind::Network,
            Self::ParseFailure { detail, .. } => classify_detail(detail),
            Self::PdfError(detail) | Self::ImageError(detail) => classify_detail(detail),
            Self::PageFailure { detail, .. } => classify_detail(detail),
            Self::BatchFailed { first, .. } => classify_detail(first),
            Self::UnknownPage(_) | Self::LastVisiblePage | Self::InvalidReorder(_) => {
                ErrorKind::Unknown
            }
            Self::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted => ErrorKind::Network,
                _ => ErrorKind::Unknown,
            },
            Self::Serialization(_) => ErrorKind::Unknown,
        }
    }

    /// Whether the operation that produced this error may be retried.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Classify a library failure string into the error taxonomy.
///
/// The patterns cover the failure text emitted by lopdf, printpdf, and the
/// image crate for the situations we care about.
pub fn classify_detail(detail: &str) -> ErrorKind {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("password") || lower.contains("encrypt") {
        return ErrorKind::PasswordProtected;
    }

    if lower.contains("timed out") || lower.contains("timeout") {
        return ErrorKind::Timeout;
    }

    if lower.contains("network")
        || lower.contains("fetch")
        || lower.contains("connection")
        || lower.contains("unreachable")
    {
        return ErrorKind::Network;
    }

    if lower.contains("corrupt")
        || lower.contains("damaged")
        || lower.contains("xref")
        || lower.contains("cross-reference")
        || lower.contains("parse")
        || lower.contains("malformed")
    {
        return ErrorKind::Corrupted;
    }

    if lower.contains("unsupported")
        || lower.contains("invalid format")
        || lower.contains("not a pdf")
        || lower.contains("unknown format")
        || lower.contains("format")
    {
        return ErrorKind::InvalidFormat;
    }

    ErrorKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_detail_is_password_protected() {
        assert_eq!(
            classify_detail("the document is encrypted"),
            ErrorKind::PasswordProtected
        );
        assert_eq!(
            classify_detail("Password required to open"),
            ErrorKind::PasswordProtected
        );
    }

    #[test]
    fn xref_detail_is_corrupted() {
        assert_eq!(
            classify_detail("invalid xref table at offset 102"),
            ErrorKind::Corrupted
        );
    }

    #[test]
    fn timeout_error_is_retryable() {
        let err = HelvetyError::Timeout {
            operation: "export".into(),
            ms: 60_000,
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_retryable());
    }

    #[test]
    fn corrupted_parse_is_not_retryable() {
        let err = HelvetyError::ParseFailure {
            file_name: "broken.pdf".into(),
            detail: "malformed stream dictionary".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Corrupted);
        assert!(!err.is_retryable());
    }

    #[test]
    fn unknown_detail_is_retryable() {
        assert!(classify_detail("something odd happened").is_retryable());
    }
}
