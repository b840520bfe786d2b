//! The Tek compiler front end.
//!
//! A fixed pool of worker threads pulls jobs from a shared scheduler, lexes
//! and parses source files, and registers every file reached through
//! `#import`, which queues more jobs. All workers share one string table,
//! one error log and the file/lib registries; none of them take a lock on
//! the hot path.
//!
//! ```text
//! Compiler::new → Compiler::run ─┬─ worker 0: lib_create(root) → FileLex
//!                                ├─ worker n: next → dispatch → finish
//!                                └─ all stalled → retry parked jobs, or stop
//! Compiler::report → TerminalEmitter
//! ```

pub mod cli;
mod compiler;
mod config;
mod error;
mod flags;
mod jobs;
mod latch;
mod pool;
mod registry;
mod spin;
pub mod tracing_setup;
mod work;

pub use compiler::{Compiler, JobType, Worker};
pub use config::{Capacities, CompilerConfig};
pub use error::CompileError;
pub use flags::{AtomicRunFlags, RunFlags};
pub use jobs::{Job, JobId, JobKind, JobStats, JobSystem, StaleJobId, MAX_JOB_SLOTS};
pub use latch::Latch;
pub use pool::{JobHost, WorkerPool};
pub use registry::{File, FileData, FileOrigin, FileStage, Lib, Registry, Source};
pub use spin::{RawSpinLock, SpinMutex};
