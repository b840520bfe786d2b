//! Flat syntax-tree records.
//!
//! A file's tree is one array of [`SynNode`]s in the file's segments. Node
//! `0` is the file's root module; everywhere else `0` means "no node", so
//! links are plain `u32` indices. Sibling lists (module entries, block
//! statements, parameters, call arguments) are threaded through `next`.
//!
//! | kind | `token` | `lhs` | `rhs` |
//! |---|---|---|---|
//! | `Mod` | `mod` keyword (root: 0) | first entry | |
//! | `Import` | the path string | resolved [`crate::FileId`] raw | alias token, 0 if none |
//! | `Decl` | declared identifier | item node | |
//! | `Proc` | `proc` keyword | `ProcSig` | body `Block`, 0 if none |
//! | `ProcSig` | `(` | first param | first return param |
//! | `Param` | identifier | type | |
//! | `Var` | `var` keyword | type, 0 if inferred | initializer, 0 if none |
//! | `TypeName` | identifier | | |
//! | `TypePtr` | `*` | pointee type | |
//! | `TypeArray` | `[` | length expr, 0 if none | element type |
//! | `Block` | `{` | first statement | |
//! | `Return` | `return` | value, 0 if none | |
//! | `Break`, `Continue` | keyword | | |
//! | `Assign` | operator | target | value |
//! | `Binary` | operator | left | right |
//! | `Unary` | operator | operand | |
//! | `Call` | `(` | callee | first argument |
//! | `Index` | `[` | base | index |
//! | `Field` | field identifier | base | |
//! | `Ident`, `Literal` | the token | | |
//! | `Array` | `[` | first element | |
//! | `Loop` | `loop` | body `Block` | |
//! | `If` | `if` | condition | `IfArms` |
//! | `IfArms` | `if` | then `Block` | else `Block`/`If`, 0 if none |

/// What a syntax node is. See the module docs for field use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SynNodeKind {
    /// Never written by the tree generator; what an untouched slot reads as.
    #[default]
    Invalid,
    Mod,
    Import,
    Decl,
    Proc,
    ProcSig,
    Param,
    Var,
    TypeName,
    TypePtr,
    TypeArray,
    Block,
    Return,
    Break,
    Continue,
    Assign,
    Binary,
    Unary,
    Call,
    Index,
    Field,
    Ident,
    Literal,
    Array,
    Loop,
    If,
    IfArms,
}

/// One syntax node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct SynNode {
    pub kind: SynNodeKind,
    pub token: u32,
    pub lhs: u32,
    pub rhs: u32,
    pub next: u32,
}

impl SynNode {
    pub fn new(kind: SynNodeKind, token: u32) -> Self {
        SynNode {
            kind,
            token,
            ..SynNode::default()
        }
    }
}

// SAFETY: `SynNodeKind::Invalid` is discriminant zero and the other fields
// are integers.
#[allow(unsafe_code)]
unsafe impl tek_arena::ZeroInit for SynNode {}
