//! Syntax tree generator for the Tek compiler.
//!
//! Recursive descent over a lexed file's token arrays into a flat array of
//! [`SynNode`]s (see [`tek_ir::SynNodeKind`] for the node layout).
//! `#import` entries call back into an [`ImportResolver`], which registers
//! the imported file and may queue work for it.
//!
//! ```text
//! file   := NL? (entry NL)* EOF
//! entry  := '#import' STRING ('as' IDENT)? | IDENT ':' item
//! item   := 'mod' '{' NL? (entry NL)* '}'
//!         | 'proc' '(' params ')' ('->' '(' params ')')? block?
//!         | 'var' type? ('=' expr)?
//! params := (IDENT ':' type (',' IDENT ':' type)*)?
//! type   := IDENT | '*' type | '[' expr? ']' type
//! block  := '{' NL? (stmt NL)* '}'
//! stmt   := IDENT ':' 'var' ... | 'return' expr? | 'break' | 'continue'
//!         | expr (assign_op expr)?
//! ```

mod expr;
mod parser;
mod stack;

use tek_diagnostic::ErrorKind;
use tek_ir::{FileId, StrId, TokenKind, TokenValue};

pub use parser::TreeGenerator;

/// Resolves `#import` paths while a file is being parsed.
pub trait ImportResolver {
    /// Registers the file at `path` (relative to the file being parsed);
    /// `token` is the path string's token. Returns `None` when the path
    /// cannot be resolved, after logging why.
    fn resolve_import(&mut self, path: StrId, token: u32) -> Option<FileId>;
}

impl<F> ImportResolver for F
where
    F: FnMut(StrId, u32) -> Option<FileId>,
{
    fn resolve_import(&mut self, path: StrId, token: u32) -> Option<FileId> {
        self(path, token)
    }
}

/// The token arrays of one lexed file.
#[derive(Clone, Copy, Debug)]
pub struct Tokens<'a> {
    pub kinds: &'a [TokenKind],
    pub values: &'a [TokenValue],
}

/// Why tree generation stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// A syntax error at `token`.
    Syntax { kind: ErrorKind, token: u32 },
    /// The import at `token` could not be resolved; the resolver has
    /// already reported it.
    Import { token: u32 },
}

impl ParseError {
    pub fn token(self) -> u32 {
        match self {
            ParseError::Syntax { token, .. } | ParseError::Import { token } => token,
        }
    }
}
