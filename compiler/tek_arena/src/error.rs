//! Virtual-memory errors.

use std::io;

/// A failed segment reservation, reset or release.
///
/// Carries the OS error so callers can surface the raw errno in
/// diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum VirtMemError {
    #[error("cannot reserve an empty segment set")]
    Empty,
    #[error("segment {index} has a size of zero")]
    ZeroSize { index: usize },
    #[error("segment sizes overflow the address space")]
    TooLarge,
    #[error("failed to reserve {bytes} bytes of virtual memory: {source}")]
    Reserve {
        bytes: usize,
        #[source]
        source: io::Error,
    },
    #[error("failed to protect guard page: {source}")]
    Protect {
        #[source]
        source: io::Error,
    },
    #[error("failed to decommit segment pages: {source}")]
    Reset {
        #[source]
        source: io::Error,
    },
    #[error("failed to release reservation: {source}")]
    Release {
        #[source]
        source: io::Error,
    },
}

impl VirtMemError {
    /// The raw OS error code, if the failure came from the OS.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            VirtMemError::Reserve { source, .. }
            | VirtMemError::Protect { source }
            | VirtMemError::Reset { source }
            | VirtMemError::Release { source } => source.raw_os_error(),
            VirtMemError::Empty | VirtMemError::ZeroSize { .. } | VirtMemError::TooLarge => None,
        }
    }
}
