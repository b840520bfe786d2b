//! Token records produced by the lexer.
//!
//! A lexed file is three parallel arrays in the file's segments: kinds,
//! locations and values. Token `i` is `(kinds[i], locs[i], values[i])`.
//! The array is always terminated by an [`TokenKind::Eof`] token.

use crate::StrId;

macro_rules! token_kinds {
    ($($variant:ident => $name:literal,)*) => {
        /// What a token is.
        ///
        /// Stored as one byte per token; `Eof` is zero so an untouched
        /// token slot reads as end of file.
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum TokenKind {
            #[default]
            $($variant,)*
        }

        impl TokenKind {
            /// Every kind, in declaration order.
            pub const ALL: &'static [TokenKind] = &[$(TokenKind::$variant,)*];

            /// Human-readable name used in diagnostics.
            pub const fn name(self) -> &'static str {
                match self {
                    $(TokenKind::$variant => $name,)*
                }
            }
        }
    };
}

token_kinds! {
    Eof => "end of file",
    Newline => "new line",
    Ident => "identifier",
    IdentAbstract => "abstract identifier",
    Label => "label",
    LitUint => "integer literal",
    LitFloat => "float literal",
    LitBool => "bool literal",
    LitString => "string literal",

    Comma => "','",
    Colon => "':'",
    At => "'@'",
    Dot => "'.'",
    DoubleDot => "'..'",
    DoubleDotEq => "'..='",
    Ellipsis => "'...'",
    ParenOpen => "'('",
    ParenClose => "')'",
    BraceOpen => "'{'",
    BraceClose => "'}'",
    BracketOpen => "'['",
    BracketClose => "']'",
    Plus => "'+'",
    Minus => "'-'",
    Star => "'*'",
    Slash => "'/'",
    Percent => "'%'",
    Bang => "'!'",
    Tilde => "'~'",
    Ampersand => "'&'",
    Pipe => "'|'",
    Caret => "'^'",
    Less => "'<'",
    Greater => "'>'",
    Eq => "'='",
    Question => "'?'",
    Arrow => "'->'",
    FatArrow => "'=>'",
    EqEq => "'=='",
    NotEq => "'!='",
    LessEq => "'<='",
    GreaterEq => "'>='",
    AndAnd => "'&&'",
    OrOr => "'||'",
    Shl => "'<<'",
    Shr => "'>>'",
    AddAssign => "'+='",
    SubAssign => "'-='",
    MulAssign => "'*='",
    DivAssign => "'/='",
    RemAssign => "'%='",
    AndAssign => "'&='",
    OrAssign => "'|='",
    XorAssign => "'^='",
    ShlAssign => "'<<='",
    ShrAssign => "'>>='",

    KwLib => "'lib'",
    KwMod => "'mod'",
    KwProc => "'proc'",
    KwMacro => "'macro'",
    KwEnum => "'enum'",
    KwStruct => "'struct'",
    KwUnion => "'union'",
    KwAlias => "'alias'",
    KwInterf => "'interf'",
    KwVar => "'var'",
    KwMut => "'mut'",
    KwIf => "'if'",
    KwElse => "'else'",
    KwMatch => "'match'",
    KwAs => "'as'",
    KwDefer => "'defer'",
    KwReturn => "'return'",
    KwBreak => "'break'",
    KwContinue => "'continue'",
    KwGoto => "'goto'",
    KwLoop => "'loop'",
    KwFor => "'for'",
    KwIn => "'in'",

    CtIf => "'$if'",
    CtMatch => "'$match'",

    DirImport => "'#import'",
    DirExtern => "'#extern'",
    DirStatic => "'#static'",
    DirAbi => "'#abi'",
    DirCallConv => "'#call_conv'",
    DirFlags => "'#flags'",
    DirError => "'#error'",
    DirDistinct => "'#distinct'",
    DirInline => "'#inline'",
    DirType => "'#type'",
    DirNoalias => "'#noalias'",
    DirVolatile => "'#volatile'",
    DirNoreturn => "'#noreturn'",
    DirBitfield => "'#bitfield'",
    DirFallthrough => "'#fallthrough'",
    DirExpr => "'#expr'",
    DirStmt => "'#stmt'",
    DirCompoundType => "'#compound_type'",
    DirIntrinsic => "'#intrinsic'",
}

impl TokenKind {
    /// Keyword for an identifier spelling, if it is one.
    pub fn keyword(ident: &[u8]) -> Option<TokenKind> {
        Some(match ident {
            b"lib" => TokenKind::KwLib,
            b"mod" => TokenKind::KwMod,
            b"proc" => TokenKind::KwProc,
            b"macro" => TokenKind::KwMacro,
            b"enum" => TokenKind::KwEnum,
            b"struct" => TokenKind::KwStruct,
            b"union" => TokenKind::KwUnion,
            b"alias" => TokenKind::KwAlias,
            b"interf" => TokenKind::KwInterf,
            b"var" => TokenKind::KwVar,
            b"mut" => TokenKind::KwMut,
            b"if" => TokenKind::KwIf,
            b"else" => TokenKind::KwElse,
            b"match" => TokenKind::KwMatch,
            b"as" => TokenKind::KwAs,
            b"defer" => TokenKind::KwDefer,
            b"return" => TokenKind::KwReturn,
            b"break" => TokenKind::KwBreak,
            b"continue" => TokenKind::KwContinue,
            b"goto" => TokenKind::KwGoto,
            b"loop" => TokenKind::KwLoop,
            b"for" => TokenKind::KwFor,
            b"in" => TokenKind::KwIn,
            _ => return None,
        })
    }

    /// Directive for the name after `#`, if it is one.
    pub fn directive(name: &[u8]) -> Option<TokenKind> {
        Some(match name {
            b"import" => TokenKind::DirImport,
            b"extern" => TokenKind::DirExtern,
            b"static" => TokenKind::DirStatic,
            b"abi" => TokenKind::DirAbi,
            b"call_conv" => TokenKind::DirCallConv,
            b"flags" => TokenKind::DirFlags,
            b"error" => TokenKind::DirError,
            b"distinct" => TokenKind::DirDistinct,
            b"inline" => TokenKind::DirInline,
            b"type" => TokenKind::DirType,
            b"noalias" => TokenKind::DirNoalias,
            b"volatile" => TokenKind::DirVolatile,
            b"noreturn" => TokenKind::DirNoreturn,
            b"bitfield" => TokenKind::DirBitfield,
            b"fallthrough" => TokenKind::DirFallthrough,
            b"expr" => TokenKind::DirExpr,
            b"stmt" => TokenKind::DirStmt,
            b"compound_type" => TokenKind::DirCompoundType,
            b"intrinsic" => TokenKind::DirIntrinsic,
            _ => return None,
        })
    }

    /// The closing bracket matching an opening one.
    pub const fn closing(self) -> Option<TokenKind> {
        match self {
            TokenKind::ParenOpen => Some(TokenKind::ParenClose),
            TokenKind::BraceOpen => Some(TokenKind::BraceClose),
            TokenKind::BracketOpen => Some(TokenKind::BracketClose),
            _ => None,
        }
    }

    pub const fn is_close_bracket(self) -> bool {
        matches!(
            self,
            TokenKind::ParenClose | TokenKind::BraceClose | TokenKind::BracketClose
        )
    }

    /// Whether the token carries a [`TokenValue`].
    pub const fn has_value(self) -> bool {
        matches!(
            self,
            TokenKind::Ident
                | TokenKind::IdentAbstract
                | TokenKind::Label
                | TokenKind::LitUint
                | TokenKind::LitFloat
                | TokenKind::LitBool
                | TokenKind::LitString
        )
    }
}

/// Where a token sits in its file. Lines and columns are 1-based; columns
/// count bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct TokenLoc {
    pub offset: u32,
    pub len: u32,
    pub line: u32,
    pub column: u32,
}

/// Payload of a valued token, as raw bits.
///
/// Identifiers, labels and strings hold a [`StrId`]; integers a `u64`;
/// floats the `f64` bits; bools `0`/`1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TokenValue(pub u64);

impl TokenValue {
    pub const NONE: TokenValue = TokenValue(0);

    pub fn from_str_id(id: StrId) -> Self {
        TokenValue(u64::from(id.raw()))
    }

    pub fn from_f64(value: f64) -> Self {
        TokenValue(value.to_bits())
    }

    pub fn from_bool(value: bool) -> Self {
        TokenValue(u64::from(value))
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "string ids are stored zero-extended"
    )]
    pub fn str_id(self) -> Option<StrId> {
        StrId::new(self.0 as u32)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    pub fn as_bool(self) -> bool {
        self.0 != 0
    }
}

// SAFETY: `TokenKind::Eof` is discriminant zero, and the records below are
// plain integers.
#[allow(unsafe_code)]
unsafe impl tek_arena::ZeroInit for TokenKind {}
#[allow(unsafe_code)]
unsafe impl tek_arena::ZeroInit for TokenLoc {}
#[allow(unsafe_code)]
unsafe impl tek_arena::ZeroInit for TokenValue {}
