//! Diagnostics for the Tek compiler.
//!
//! Workers append structured [`Error`] records to the shared [`ErrorLog`]
//! while compiling; nothing is formatted on the hot path. Once every worker
//! has joined, [`TerminalEmitter`] renders the log against a [`SourceMap`]
//! (file paths, source bytes, token locations).

mod kind;
mod log;
mod render;

pub use kind::{ErrorKind, Layout};
pub use log::{Error, ErrorArg, ErrorLog};
pub use render::{ColorMode, SourceMap, TerminalEmitter};
