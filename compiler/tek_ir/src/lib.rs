//! Shared data types for the Tek compiler.
//!
//! - [`StringTable`]: the process-wide lock-free string interner
//! - [`StrId`], [`FileId`], [`LibId`]: 1-based table handles
//! - [`TokenKind`], [`TokenLoc`], [`TokenValue`]: lexer output records
//! - [`SynNode`]: flat syntax-tree records written by the tree generator
//!
//! Token and syntax records are stored straight in file segments, so they
//! are plain `#[repr(C)]` data with a valid all-zero value.

mod ids;
mod interner;
mod syntax;
mod token;

pub use ids::{FileId, LibId, StrId};
pub use interner::{fnv1, InternError, StringTable};
pub use syntax::{SynNode, SynNodeKind};
pub use token::{TokenKind, TokenLoc, TokenValue};
