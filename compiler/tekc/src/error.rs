//! Driver errors.

use std::io;

use tek_arena::VirtMemError;

/// Why a compilation could not run to completion.
///
/// Problems in the compiled sources are not `CompileError`s: they go to the
/// error log and are rendered after the run.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("no root source path given")]
    NoRootPath,
    #[error("failed to reserve the {table}: {source}")]
    Reserve {
        table: &'static str,
        #[source]
        source: VirtMemError,
    },
    #[error("failed to reset the {table}: {source}")]
    Reset {
        table: &'static str,
        #[source]
        source: VirtMemError,
    },
    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("the compiler was already started")]
    AlreadyStarted,
    #[error("a worker thread panicked")]
    WorkerPanicked,
}

impl CompileError {
    pub(crate) fn reserve(table: &'static str) -> impl FnOnce(VirtMemError) -> CompileError {
        move |source| CompileError::Reserve { table, source }
    }

    pub(crate) fn reset(table: &'static str) -> impl FnOnce(VirtMemError) -> CompileError {
        move |source| CompileError::Reset { table, source }
    }
}
