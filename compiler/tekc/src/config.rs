//! Compiler configuration: worker count, color mode and table capacities.

use std::num::NonZeroUsize;

use tek_diagnostic::ColorMode;

/// Fixed sizes of every table, reserved up front as virtual memory.
///
/// Only touched pages cost physical memory, so the defaults are generous.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capacities {
    /// Distinct interned strings.
    pub strings: usize,
    /// Bytes of interned string data, length prefixes included.
    pub string_bytes: usize,
    /// Live jobs.
    pub jobs: usize,
    pub errors: usize,
    pub files: usize,
    pub libs: usize,
    pub tokens_per_file: usize,
    pub lines_per_file: usize,
    pub nodes_per_file: usize,
    pub files_per_lib: usize,
    /// Dependencies (and, separately, dependers) per lib.
    pub deps_per_lib: usize,
}

impl Default for Capacities {
    fn default() -> Self {
        Capacities {
            strings: 1 << 22,
            string_bytes: 1 << 30,
            jobs: 1 << 20,
            errors: 1 << 16,
            files: 1 << 16,
            libs: 1 << 12,
            tokens_per_file: 1 << 22,
            lines_per_file: 1 << 22,
            nodes_per_file: 1 << 22,
            files_per_lib: 1 << 16,
            deps_per_lib: 1 << 12,
        }
    }
}

impl Capacities {
    /// Small tables for tests and tiny inputs.
    pub fn small() -> Self {
        Capacities {
            strings: 4096,
            string_bytes: 1 << 20,
            jobs: 1024,
            errors: 256,
            files: 256,
            libs: 16,
            tokens_per_file: 1 << 14,
            lines_per_file: 1 << 14,
            nodes_per_file: 1 << 14,
            files_per_lib: 256,
            deps_per_lib: 16,
        }
    }
}

/// Settings for one compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerConfig {
    pub workers: usize,
    pub color: ColorMode,
    pub capacities: Capacities,
    /// Print every file's tokens after a run without errors.
    pub dump_tokens: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            workers: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            color: ColorMode::Auto,
            capacities: Capacities::default(),
            dump_tokens: false,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// At least one worker is always used.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: ColorMode) -> Self {
        self.color = color;
        self
    }

    #[must_use]
    pub fn with_capacities(mut self, capacities: Capacities) -> Self {
        self.capacities = capacities;
        self
    }

    #[must_use]
    pub fn with_dump_tokens(mut self, dump_tokens: bool) -> Self {
        self.dump_tokens = dump_tokens;
        self
    }
}
