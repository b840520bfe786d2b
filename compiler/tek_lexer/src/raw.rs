//! Raw Token Definition
//!
//! The `RawToken` enum is the logos-derived tokenizer output before
//! keyword lookup, literal decoding and interning.

use logos::Logos;

/// How a string literal ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StringEnd {
    Closed,
    /// Hit a line break before the closing quote.
    Newline,
    /// Hit end of file.
    Unclosed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CommentEnd {
    Closed,
    Unclosed,
}

/// Raw token from logos (before cooking).
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t]+")] // Skip horizontal whitespace
pub(crate) enum RawToken {
    #[regex(r"//[^\n]*")]
    LineComment,

    #[token("/*", block_comment)]
    BlockComment(CommentEnd),

    // A run of `\n`, `\r` and `;`, blanks allowed in between.
    #[regex(r"[\r\n;]", newline_run)]
    Newline,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*")]
    DollarIdent,
    #[token("$")]
    Dollar,
    #[regex(r"'[a-zA-Z_][a-zA-Z0-9_]*")]
    Label,
    #[regex(r"#[a-zA-Z_][a-zA-Z0-9_]*")]
    Directive,

    #[regex(r"[0-9]", number)]
    Number,

    #[token("\"", string_literal)]
    String(StringEnd),

    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("@")]
    At,
    #[token(".")]
    Dot,
    #[token("..")]
    DoubleDot,
    #[token("..=")]
    DoubleDotEq,
    #[token("...")]
    Ellipsis,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("=")]
    Eq,
    #[token("?")]
    Question,
    #[token("->")]
    Arrow,
    #[token("=>")]
    FatArrow,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("+=")]
    AddAssign,
    #[token("-=")]
    SubAssign,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    DivAssign,
    #[token("%=")]
    RemAssign,
    #[token("&=")]
    AndAssign,
    #[token("|=")]
    OrAssign,
    #[token("^=")]
    XorAssign,
    #[token("<<=")]
    ShlAssign,
    #[token(">>=")]
    ShrAssign,
}

/// Consumes the rest of a newline run, up to its last break character.
fn newline_run(lex: &mut logos::Lexer<'_, RawToken>) {
    let rest = lex.remainder().as_bytes();
    let mut end = 0;
    for (i, &b) in rest.iter().enumerate() {
        match b {
            b'\n' | b'\r' | b';' => end = i + 1,
            b' ' | b'\t' => {}
            _ => break,
        }
    }
    lex.bump(end);
}

/// Consumes a nested `/* */` comment after its opening `/*`.
fn block_comment(lex: &mut logos::Lexer<'_, RawToken>) -> CommentEnd {
    let rest = lex.remainder().as_bytes();
    let mut depth = 1usize;
    let mut i = 0;
    while i < rest.len() {
        match (rest[i], rest.get(i + 1)) {
            (b'/', Some(b'*')) => {
                depth += 1;
                i += 2;
            }
            (b'*', Some(b'/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    lex.bump(i);
                    return CommentEnd::Closed;
                }
            }
            _ => i += 1,
        }
    }
    lex.bump(rest.len());
    CommentEnd::Unclosed
}

/// Consumes the digits, letters, underscores and embedded decimal points
/// of a number. A `.` only continues the number when a digit follows, so
/// `0..10` stays a range.
fn number(lex: &mut logos::Lexer<'_, RawToken>) {
    let rest = lex.remainder().as_bytes();
    let mut i = 0;
    while i < rest.len() {
        let b = rest[i];
        if b.is_ascii_alphanumeric() || b == b'_' {
            i += 1;
        } else if b == b'.' && rest.get(i + 1).is_some_and(u8::is_ascii_digit) {
            i += 1;
        } else {
            break;
        }
    }
    lex.bump(i);
}

/// Consumes a single line string literal after its opening quote.
fn string_literal(lex: &mut logos::Lexer<'_, RawToken>) -> StringEnd {
    let rest = lex.remainder().as_bytes();
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            b'"' => {
                lex.bump(i + 1);
                return StringEnd::Closed;
            }
            b'\n' => {
                lex.bump(i);
                return StringEnd::Newline;
            }
            b'\\' if rest.get(i + 1).is_some_and(|&next| next != b'\n') => i += 2,
            _ => i += 1,
        }
    }
    lex.bump(rest.len());
    StringEnd::Unclosed
}
