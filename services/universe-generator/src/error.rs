//! Error types for the universe generation pipeline.
//!
//! Fatal, structural failures use [`PipelineError`] (`thiserror`) and abort
//! the run. Everything recoverable — a missing quote, a failed root-find, a
//! skipped zip entry — is logged and represented as plain `Option`/default
//! data instead, per the "no exception-based control flow" redesign.

use thiserror::Error;

/// Fatal errors that abort the whole `run()` invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// `--security-type` did not match a known variant.
    #[error("invalid security type: {0}")]
    InvalidSecurityType(String),

    /// A per-canonical task panicked or returned a fatal error, cancelling
    /// the remaining fan-out.
    #[error("canonical {canonical} failed fatally: {source}")]
    CanonicalFatal {
        /// Ticker of the canonical underlying that failed.
        canonical: String,
        /// Underlying cause.
        #[source]
        source: anyhow::Error,
    },

    /// The output directory could not be created or written to.
    #[error("output io error: {0}")]
    Io(#[from] std::io::Error),
}
