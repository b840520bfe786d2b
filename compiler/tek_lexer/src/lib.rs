//! Lexer for the Tek compiler.
//!
//! [`Lexer`] is worker-private scratch state: each worker keeps one and
//! reuses its buffers for every file it lexes. Identifier, label and string
//! text is interned into the shared [`tek_ir::StringTable`]; problems are
//! appended to the shared [`tek_diagnostic::ErrorLog`].

mod cook;
mod number;
mod raw;
mod string;

pub use cook::{LexedFile, Lexer};
