//! Per-call log records.
//!
//! Each instrumented primitive produces one [`CallEvent`] carrying exactly the
//! fields its kind needs. Events are rendered by the sink when verbose logging
//! is on; they are not stored.

use std::fmt;

use serde::Serialize;

use crate::trace::{CallKind, SourceSite};

/// Severity word printed after the output prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One instrumented call and its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CallEvent {
    Malloc {
        site: SourceSite,
        size: usize,
        result: Option<usize>,
    },
    Calloc {
        site: SourceSite,
        size: usize,
        result: Option<usize>,
    },
    Realloc {
        site: SourceSite,
        size: usize,
        from: usize,
        result: Option<usize>,
    },
    Free {
        site: SourceSite,
        size: usize,
        address: usize,
    },
    Exit {
        site: SourceSite,
        status: i32,
    },
    Abort {
        site: SourceSite,
    },
    /// Free or resize of an address that is not a live allocation.
    Rejected {
        kind: CallKind,
        site: SourceSite,
        address: usize,
    },
}

impl CallEvent {
    #[must_use]
    pub const fn kind(&self) -> CallKind {
        match self {
            Self::Malloc { .. } => CallKind::Malloc,
            Self::Calloc { .. } => CallKind::Calloc,
            Self::Realloc { .. } => CallKind::Realloc,
            Self::Free { .. } => CallKind::Free,
            Self::Exit { .. } => CallKind::Exit,
            Self::Abort { .. } => CallKind::Abort,
            Self::Rejected { kind, .. } => *kind,
        }
    }

    #[must_use]
    pub const fn site(&self) -> SourceSite {
        match self {
            Self::Malloc { site, .. }
            | Self::Calloc { site, .. }
            | Self::Realloc { site, .. }
            | Self::Free { site, .. }
            | Self::Exit { site, .. }
            | Self::Abort { site }
            | Self::Rejected { site, .. } => *site,
        }
    }

    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Malloc { result: None, .. }
            | Self::Calloc { result: None, .. }
            | Self::Realloc { result: None, .. }
            | Self::Rejected { .. } => Severity::Error,
            Self::Exit { .. } | Self::Abort { .. } => Severity::Warn,
            _ => Severity::Info,
        }
    }

    /// Second report line describing the outcome, if the kind has one.
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match *self {
            Self::Malloc { size, result, .. } | Self::Calloc { size, result, .. } => {
                Some(match result {
                    Some(address) => format!("{size} bytes allocated to address {address:#x}"),
                    None => format!("failed to allocate {size} bytes"),
                })
            }
            Self::Realloc {
                size, from, result, ..
            } => Some(match result {
                Some(address) => format!(
                    "{size} bytes reallocated from address {from:#x} to address {address:#x}"
                ),
                None => format!("failed to reallocate {size} bytes"),
            }),
            Self::Free { size, address, .. } => {
                Some(format!("{size} bytes freed from address {address:#x}"))
            }
            Self::Exit { status, .. } => Some(format!("exit code: {status}")),
            Self::Abort { .. } => None,
            Self::Rejected { address, .. } => Some(format!(
                "address {address:#x} is not a live tracked allocation"
            )),
        }
    }
}
