//! Error types for the edgequake-claims library.
//!
//! Two distinct error families reflect two distinct failure modes:
//!
//! * [`ClaimsError`] is **fatal**; the run cannot proceed at all (unreadable
//!   input, not a PDF, provider not configured). Returned as
//!   `Err(ClaimsError)` from the [`crate::controller::ClaimPipeline`] entry
//!   points and surfaced by the HTTP front door as a processing error.
//!
//! * [`StageError`] is **non-fatal**; the classifier or one extraction stage
//!   failed (transport error, timeout, malformed reply). It is logged and
//!   absorbed at the stage boundary; downstream it is only visible as an
//!   absent result, never as a sibling stage failure.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-claims library.
///
/// Stage-level failures use [`StageError`] and never reach the caller.
#[derive(Debug, Error)]
pub enum ClaimsError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install pdfium system-wide or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Document model errors ─────────────────────────────────────────────
    /// The page list handed to the pipeline violates the page invariants
    /// (page numbers must be positive and unique).
    #[error("Invalid page list: {0}")]
    InvalidPages(String),

    /// An update tried to overwrite state that is already resolved.
    #[error("Document state conflict: {0}")]
    StateConflict(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output report file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure of the classifier or of one extraction stage.
///
/// Every variant degrades to an empty classification or an absent stage
/// result; none of them aborts the run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StageError {
    /// The language-understanding collaborator returned an error.
    #[error("collaborator call failed: {detail}")]
    Collaborator { detail: String },

    /// The collaborator did not answer within the configured bound.
    #[error("collaborator call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The reply could not be decoded into a JSON object.
    #[error("could not decode collaborator reply: {0}")]
    Decode(#[from] DecodeError),
}

/// Why a free-text reply could not be decoded into a JSON object.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// There is no `{` anywhere in the reply.
    #[error("no brace-delimited object in reply")]
    NoJsonObject,

    /// An opening brace was found but never closed.
    #[error("unbalanced braces in reply")]
    Unbalanced,

    /// A balanced span was found but it is not valid JSON.
    #[error("malformed JSON: {0}")]
    Malformed(String),

    /// The span parsed, but not as a JSON object.
    #[error("JSON value is not an object")]
    NotAnObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display() {
        let e = StageError::Timeout { secs: 60 };
        assert!(e.to_string().contains("60s"), "got: {e}");
    }

    #[test]
    fn decode_error_converts_into_stage_error() {
        let e: StageError = DecodeError::NoJsonObject.into();
        assert_eq!(e, StageError::Decode(DecodeError::NoJsonObject));
        assert!(e.to_string().contains("no brace-delimited object"));
    }

    #[test]
    fn invalid_pages_display() {
        let e = ClaimsError::InvalidPages("page 2 appears twice".into());
        assert!(e.to_string().contains("page 2 appears twice"));
    }

    #[test]
    fn provider_not_configured_display() {
        let e = ClaimsError::ProviderNotConfigured {
            provider: "openai".into(),
            hint: "set OPENAI_API_KEY".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("openai"));
        assert!(msg.contains("OPENAI_API_KEY"));
    }
}
