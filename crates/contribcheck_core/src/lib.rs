//! Core logic for auditing MassMessage delivery lists: template parsing,
//! last-edit lookups against the MediaWiki API, activity classification,
//! and the TSV report pipeline.

pub mod classify;
pub mod lookup;
pub mod parse;
pub mod pipeline;
pub mod report;

/// Destination for progress and failure messages. Injected into the pipeline
/// and the lookup client so callers choose verbosity and destination instead
/// of relying on process-wide logging state.
pub trait Reporter {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards reports to the global `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// Discards every report. Useful when embedding the pipeline in tests or
/// other tools that do their own progress handling.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}
