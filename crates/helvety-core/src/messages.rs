// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// User-facing error messages.
//
// Every engine error is mapped to plain English with an actionable
// suggestion. All text derived from library failure strings or file names is
// sanitized before display: markup is stripped and length is capped, since
// uploaded file names are attacker-controlled.

use crate::error::{ErrorKind, HelvetyError};

/// Maximum length of any sanitized display string.
const MAX_DISPLAY_LEN: usize = 300;

/// A display-ready error with plain English message and suggestion.
#[derive(Debug, Clone)]
pub struct UserMessage {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the operation can be retried as-is.
    pub retriable: bool,
    /// Taxonomy kind (drives icon/colour in the UI collaborator).
    pub kind: ErrorKind,
}

/// Strip markup and script-like content from untrusted text and cap its
/// length. The result is safe to interpolate into display strings.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_DISPLAY_LEN));
    let mut in_tag = false;

    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if in_tag => {}
            c if c.is_control() && c != '\n' => {}
            c => out.push(c),
        }
    }

    // Neutralise the common script-injection prefixes that survive tag
    // stripping in attribute-style payloads.
    let lowered = out.to_ascii_lowercase();
    for needle in ["javascript:", "data:text/html"] {
        if let Some(pos) = lowered.find(needle) {
            out.truncate(pos);
            break;
        }
    }

    if out.len() > MAX_DISPLAY_LEN {
        let mut cut = MAX_DISPLAY_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
        out.push('…');
    }

    out.trim().to_string()
}

/// Build the aggregated rejection message for a failed upload batch.
///
/// One failure produces a single sentence; several produce a numbered list.
pub fn aggregate_rejections(rejections: &[(String, String)]) -> String {
    match rejections {
        [] => String::new(),
        [(name, reason)] => format!("'{}' could not be added: {}", sanitize(name), sanitize(reason)),
        many => {
            let mut out = format!("{} files could not be added:", many.len());
            for (i, (name, reason)) in many.iter().enumerate() {
                out.push_str(&format!(
                    "\n{}. '{}': {}",
                    i + 1,
                    sanitize(name),
                    sanitize(reason)
                ));
            }
            out
        }
    }
}

/// Convert a `HelvetyError` into a display-ready `UserMessage`.
pub fn humanize(err: &HelvetyError) -> UserMessage {
    let kind = err.kind();
    // State-guard rejections leave state unchanged and will fail identically
    // on retry, whatever their taxonomy kind says.
    let retriable = kind.is_retryable()
        && !matches!(
            err,
            HelvetyError::LastVisiblePage
                | HelvetyError::InvalidReorder(_)
                | HelvetyError::UnknownPage(_)
        );

    let (message, suggestion) = match err {
        HelvetyError::FilesRejected(summary) => (
            sanitize(summary),
            "Only PDF files and common image formats can be added.".to_string(),
        ),

        HelvetyError::UploadThrottled { wait_ms } => (
            "Files are being added too quickly.".to_string(),
            format!("Wait {}ms and try again.", wait_ms),
        ),

        HelvetyError::ParseFailure { file_name, .. } => match kind {
            ErrorKind::PasswordProtected => (
                format!("'{}' is password protected.", sanitize(file_name)),
                "Remove the password in another tool first, then add the file again."
                    .to_string(),
            ),
            ErrorKind::Corrupted => (
                format!("'{}' appears to be damaged.", sanitize(file_name)),
                "Try opening the file elsewhere to check it works, or use a different copy."
                    .to_string(),
            ),
            _ => (
                format!("'{}' could not be loaded.", sanitize(file_name)),
                "Check the file opens elsewhere, then try adding it again.".to_string(),
            ),
        },

        HelvetyError::PdfError(_) => (
            "There's a problem with this PDF.".to_string(),
            "The file may be damaged. Try a different copy.".to_string(),
        ),

        HelvetyError::ImageError(_) => (
            "There's a problem with this image.".to_string(),
            "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first."
                .to_string(),
        ),

        HelvetyError::UnknownPage(n) => (
            format!("Page {} no longer exists.", n),
            "The page may belong to a document that was removed.".to_string(),
        ),

        HelvetyError::LastVisiblePage => (
            "The last remaining page can't be deleted.".to_string(),
            "At least one page must stay in the document. Restore another page first."
                .to_string(),
        ),

        HelvetyError::InvalidReorder(_) => (
            "The new page order doesn't match the current pages.".to_string(),
            "Refresh the page list and try rearranging again.".to_string(),
        ),

        HelvetyError::PageFailure { page, file_name, .. } => (
            format!(
                "Page {} from '{}' couldn't be processed.",
                page,
                sanitize(file_name)
            ),
            "The rest of the document was exported. Try re-adding that file.".to_string(),
        ),

        HelvetyError::BatchFailed { first, .. } => (
            "The export failed.".to_string(),
            format!("No file was produced. First problem: {}", sanitize(first)),
        ),

        HelvetyError::Timeout { operation, .. } => (
            format!("The {} took too long.", sanitize(operation)),
            "Try again. Large documents can take a while on slower devices.".to_string(),
        ),

        HelvetyError::Io(_) => (
            "There was a problem reading or writing a file.".to_string(),
            "Try again. If this keeps happening, your device's storage may be full."
                .to_string(),
        ),

        HelvetyError::Serialization(_) => (
            "The app had an internal data problem.".to_string(),
            "Try again. If this keeps happening, please report it.".to_string(),
        ),
    };

    UserMessage {
        message,
        suggestion,
        retriable,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_markup() {
        assert_eq!(
            sanitize("evil<script>alert(1)</script>.pdf"),
            "evilalert(1).pdf"
        );
        assert_eq!(sanitize("<b>bold</b> name"), "bold name");
    }

    #[test]
    fn sanitize_cuts_script_urls() {
        assert_eq!(sanitize("javascript:alert(1)"), "");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(1000);
        assert!(sanitize(&long).chars().count() <= 301);
    }

    #[test]
    fn single_rejection_is_one_sentence() {
        let msg = aggregate_rejections(&[("a.txt".into(), "unsupported format".into())]);
        assert!(msg.contains("a.txt"));
        assert!(!msg.contains("1."));
    }

    #[test]
    fn multiple_rejections_are_numbered() {
        let msg = aggregate_rejections(&[
            ("a.txt".into(), "unsupported format".into()),
            ("b.exe".into(), "unsupported format".into()),
        ]);
        assert!(msg.starts_with("2 files"));
        assert!(msg.contains("1. 'a.txt'"));
        assert!(msg.contains("2. 'b.exe'"));
    }

    #[test]
    fn last_page_error_is_not_retriable() {
        let human = humanize(&HelvetyError::LastVisiblePage);
        assert!(!human.retriable);
    }

    #[test]
    fn timeout_is_retriable() {
        let human = humanize(&HelvetyError::Timeout {
            operation: "export".into(),
            ms: 1000,
        });
        assert!(human.retriable);
        assert_eq!(human.kind, ErrorKind::Timeout);
    }
}
