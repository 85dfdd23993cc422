//! Per-allocation operation history.

use std::fmt;
use std::panic::Location;

use serde::Serialize;

use crate::chain::Chain;

/// Instrumented primitive that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Malloc,
    Calloc,
    Realloc,
    Free,
    Exit,
    Abort,
}

impl CallKind {
    /// C symbol name of the primitive.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malloc => "malloc",
            Self::Calloc => "calloc",
            Self::Realloc => "realloc",
            Self::Free => "free",
            Self::Exit => "exit",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `pad` so width specifiers in report lines apply.
        f.pad(self.as_str())
    }
}

/// Source location of an instrumented call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceSite {
    pub file: &'static str,
    pub line: u32,
}

impl SourceSite {
    /// Site attributed to frees performed by the exit-time collector.
    pub const COLLECTOR: Self = Self::new("<garbage collector>", 0);

    #[must_use]
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    /// Site of the caller, captured through `#[track_caller]`.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for SourceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:04}", self.file, self.line)
    }
}

/// One operation performed on one allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trace {
    pub kind: CallKind,
    pub site: SourceSite,
    /// Requested size for allocations and resizes, zero for frees.
    pub size: usize,
}

impl Trace {
    #[must_use]
    pub const fn new(kind: CallKind, site: SourceSite, size: usize) -> Self {
        Self { kind, site, size }
    }
}

/// Append-only history of one allocation, oldest first.
pub type TraceLog = Chain<Trace>;
