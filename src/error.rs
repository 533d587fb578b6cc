//! Error taxonomy (spec §7). All variants are non-fatal from the router's
//! point of view: `processTransaction` never aborts. Diagnostics are also
//! funneled through a [`Diagnostics`] sink supplied at construction, so a
//! client can log or assert on conditions that don't merit a `Result::Err`.

use std::io;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouterError {
    /// Path search exhausted without reaching the source (spec §4.6/§7).
    /// The router records a cycle-blocker edge and falls back to a
    /// two-point straight-line route; this variant is surfaced to callers
    /// that want to know routing degraded, not to abort anything.
    #[error("no path found between connector endpoints")]
    NoPath,

    /// A caller-provided id collides with one already registered (spec
    /// §4.2/§7).
    #[error("duplicate id: {0}")]
    DuplicateId(String),

    /// A mutation API was called while `processTransaction` was already
    /// running (spec §5/§7 re-entrancy).
    #[error("router is already processing a transaction")]
    InvalidTransaction,

    /// The nudging engine could not satisfy every gap constraint at any
    /// positive separation; recovered by zeroing the offending gap (spec
    /// §4.8 step 6, §7).
    #[error("infeasible separation for a nudging region; gap reduced to zero")]
    InfeasibleSeparation,

    /// A zero-area shape polygon or coincident connector endpoints (spec
    /// §7); routing continues with a zero-length route.
    #[error("degenerate geometry: {0}")]
    GeometryDegenerate(String),
}

#[derive(Error, Debug)]
pub enum DebugDumpError {
    #[error("I/O failure")]
    IoFailure(#[from] io::Error),
}

/// Severity of a non-fatal diagnostic (spec §7 policy: "all errors are
/// non-fatal... Diagnostics go to a sink supplied at construction").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Info,
}

/// Sink for non-fatal routing diagnostics. The default implementation
/// forwards to the `log` facade (SPEC_FULL.md §A); clients may supply their
/// own to collect diagnostics for a UI instead.
pub trait Diagnostics {
    fn report(&self, severity: Severity, error: &RouterError);
}

/// Default [`Diagnostics`] sink: forwards to `log::warn!`/`log::info!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&self, severity: Severity, error: &RouterError) {
        match severity {
            Severity::Warning => log::warn!("{error}"),
            Severity::Info => log::info!("{error}"),
        }
    }
}
