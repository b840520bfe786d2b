//! Token cooking: raw logos tokens into the file's token arrays.
//!
//! ```text
//! source → RawToken (logos) → Lexer::lex → kinds / locs / values / line starts
//! ```
//!
//! Cooking resolves keywords and directives, decodes number and string
//! literals, interns identifier-like text, merges newline runs that are
//! only separated by comments and matches brackets. Lexing stops at the
//! first error; the offending token is recorded so the error can point at
//! it.

use std::ops::Range;

use logos::Logos;
use smallvec::SmallVec;
use tek_diagnostic::{Error, ErrorArg, ErrorKind, ErrorLog};
use tek_ir::{FileId, StringTable, TokenKind, TokenLoc, TokenValue};

use crate::number::{parse_number, Number};
use crate::raw::{CommentEnd, RawToken, StringEnd};
use crate::string::unescape;

/// The arrays produced for one file. All four borrow the lexer's scratch
/// buffers and are overwritten by the next [`Lexer::lex`].
#[derive(Clone, Copy, Debug)]
pub struct LexedFile<'a> {
    pub kinds: &'a [TokenKind],
    pub locs: &'a [TokenLoc],
    pub values: &'a [TokenValue],
    /// Byte offset of every line start; `line_starts[0] == 0`.
    pub line_starts: &'a [u32],
}

/// Worker-private lexer state, reused across files.
#[derive(Default)]
pub struct Lexer {
    kinds: Vec<TokenKind>,
    locs: Vec<TokenLoc>,
    values: Vec<TokenValue>,
    line_starts: Vec<u32>,
    /// Token indices of the currently open brackets.
    brackets: SmallVec<[u32; 16]>,
    scratch: Vec<u8>,
    line: usize,
}

/// Shared tables a lex writes into.
struct Sinks<'a> {
    file: FileId,
    strings: &'a StringTable,
    errors: &'a ErrorLog,
}

impl Lexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The output of the last [`Lexer::lex`].
    pub fn output(&self) -> LexedFile<'_> {
        LexedFile {
            kinds: &self.kinds,
            locs: &self.locs,
            values: &self.values,
            line_starts: &self.line_starts,
        }
    }

    /// Lexes `source`, logging at most one error. Returns `false` when an
    /// error was logged.
    #[tracing::instrument(level = "trace", skip_all, fields(file = file.raw()))]
    pub fn lex(
        &mut self,
        file: FileId,
        source: &[u8],
        strings: &StringTable,
        errors: &ErrorLog,
    ) -> bool {
        self.clear();
        let sinks = Sinks {
            file,
            strings,
            errors,
        };

        let text = match std::str::from_utf8(source) {
            Ok(text) => text,
            Err(err) => {
                errors.add(Error::new(
                    ErrorKind::LexerInvalidUtf8,
                    ErrorArg::File(file),
                    ErrorArg::Num(err.valid_up_to() as u64),
                ));
                return false;
            }
        };

        self.line_starts.push(0);
        self.line_starts
            .extend(memchr::memchr_iter(b'\n', source).map(|i| to_u32(i + 1)));

        let mut raw = RawToken::lexer(text);
        while let Some(result) = raw.next() {
            let span = raw.span();
            let slice = raw.slice().as_bytes();
            let Ok(token) = result else {
                return self.fail(&sinks, ErrorKind::LexerUnsupportedToken, TokenKind::Eof, span);
            };

            let (kind, value) = match token {
                RawToken::LineComment | RawToken::BlockComment(CommentEnd::Closed) => continue,
                RawToken::BlockComment(CommentEnd::Unclosed) => {
                    let opener = span.start..span.start + 2;
                    return self.fail(
                        &sinks,
                        ErrorKind::LexerUnclosedBlockComment,
                        TokenKind::Eof,
                        opener,
                    );
                }
                RawToken::Newline => {
                    if self.kinds.last() == Some(&TokenKind::Newline) {
                        continue;
                    }
                    (TokenKind::Newline, TokenValue::NONE)
                }
                RawToken::Ident => match slice {
                    b"true" => (TokenKind::LitBool, TokenValue::from_bool(true)),
                    b"false" => (TokenKind::LitBool, TokenValue::from_bool(false)),
                    _ => match TokenKind::keyword(slice) {
                        Some(keyword) => (keyword, TokenValue::NONE),
                        None => (TokenKind::Ident, intern(&sinks, slice)),
                    },
                },
                RawToken::DollarIdent => match &slice[1..] {
                    b"if" => (TokenKind::CtIf, TokenValue::NONE),
                    b"match" => (TokenKind::CtMatch, TokenValue::NONE),
                    name => (TokenKind::IdentAbstract, intern(&sinks, name)),
                },
                RawToken::Dollar => {
                    return self.fail(
                        &sinks,
                        ErrorKind::LexerExpectedACompileTimeToken,
                        TokenKind::IdentAbstract,
                        span,
                    );
                }
                RawToken::Label => (TokenKind::Label, intern(&sinks, &slice[1..])),
                RawToken::Directive => match TokenKind::directive(&slice[1..]) {
                    Some(directive) => (directive, TokenValue::NONE),
                    None => {
                        return self.fail(
                            &sinks,
                            ErrorKind::LexerUnrecognisedDirective,
                            TokenKind::Eof,
                            span,
                        );
                    }
                },
                RawToken::Number => match parse_number(slice) {
                    Ok(Number::Uint(value)) => (TokenKind::LitUint, TokenValue(value)),
                    Ok(Number::Float(value)) => (TokenKind::LitFloat, TokenValue::from_f64(value)),
                    Err(kind) => return self.fail(&sinks, kind, TokenKind::LitUint, span),
                },
                RawToken::String(StringEnd::Closed) => {
                    let mut scratch = std::mem::take(&mut self.scratch);
                    let decoded = unescape(&slice[1..slice.len() - 1], &mut scratch);
                    let value = decoded.map(|()| intern(&sinks, &scratch));
                    self.scratch = scratch;
                    match value {
                        Ok(value) => (TokenKind::LitString, value),
                        Err(kind) => return self.fail(&sinks, kind, TokenKind::LitString, span),
                    }
                }
                RawToken::String(StringEnd::Newline) => {
                    return self.fail(
                        &sinks,
                        ErrorKind::LexerNewLineInASingleLineString,
                        TokenKind::LitString,
                        span,
                    );
                }
                RawToken::String(StringEnd::Unclosed) => {
                    return self.fail(
                        &sinks,
                        ErrorKind::LexerUnclosedStringLiteral,
                        TokenKind::LitString,
                        span,
                    );
                }

                RawToken::Comma => (TokenKind::Comma, TokenValue::NONE),
                RawToken::Colon => (TokenKind::Colon, TokenValue::NONE),
                RawToken::At => (TokenKind::At, TokenValue::NONE),
                RawToken::Dot => (TokenKind::Dot, TokenValue::NONE),
                RawToken::DoubleDot => (TokenKind::DoubleDot, TokenValue::NONE),
                RawToken::DoubleDotEq => (TokenKind::DoubleDotEq, TokenValue::NONE),
                RawToken::Ellipsis => (TokenKind::Ellipsis, TokenValue::NONE),
                RawToken::ParenOpen => (TokenKind::ParenOpen, TokenValue::NONE),
                RawToken::ParenClose => (TokenKind::ParenClose, TokenValue::NONE),
                RawToken::BraceOpen => (TokenKind::BraceOpen, TokenValue::NONE),
                RawToken::BraceClose => (TokenKind::BraceClose, TokenValue::NONE),
                RawToken::BracketOpen => (TokenKind::BracketOpen, TokenValue::NONE),
                RawToken::BracketClose => (TokenKind::BracketClose, TokenValue::NONE),
                RawToken::Plus => (TokenKind::Plus, TokenValue::NONE),
                RawToken::Minus => (TokenKind::Minus, TokenValue::NONE),
                RawToken::Star => (TokenKind::Star, TokenValue::NONE),
                RawToken::Slash => (TokenKind::Slash, TokenValue::NONE),
                RawToken::Percent => (TokenKind::Percent, TokenValue::NONE),
                RawToken::Bang => (TokenKind::Bang, TokenValue::NONE),
                RawToken::Tilde => (TokenKind::Tilde, TokenValue::NONE),
                RawToken::Ampersand => (TokenKind::Ampersand, TokenValue::NONE),
                RawToken::Pipe => (TokenKind::Pipe, TokenValue::NONE),
                RawToken::Caret => (TokenKind::Caret, TokenValue::NONE),
                RawToken::Less => (TokenKind::Less, TokenValue::NONE),
                RawToken::Greater => (TokenKind::Greater, TokenValue::NONE),
                RawToken::Eq => (TokenKind::Eq, TokenValue::NONE),
                RawToken::Question => (TokenKind::Question, TokenValue::NONE),
                RawToken::Arrow => (TokenKind::Arrow, TokenValue::NONE),
                RawToken::FatArrow => (TokenKind::FatArrow, TokenValue::NONE),
                RawToken::EqEq => (TokenKind::EqEq, TokenValue::NONE),
                RawToken::NotEq => (TokenKind::NotEq, TokenValue::NONE),
                RawToken::LessEq => (TokenKind::LessEq, TokenValue::NONE),
                RawToken::GreaterEq => (TokenKind::GreaterEq, TokenValue::NONE),
                RawToken::AndAnd => (TokenKind::AndAnd, TokenValue::NONE),
                RawToken::OrOr => (TokenKind::OrOr, TokenValue::NONE),
                RawToken::Shl => (TokenKind::Shl, TokenValue::NONE),
                RawToken::Shr => (TokenKind::Shr, TokenValue::NONE),
                RawToken::AddAssign => (TokenKind::AddAssign, TokenValue::NONE),
                RawToken::SubAssign => (TokenKind::SubAssign, TokenValue::NONE),
                RawToken::MulAssign => (TokenKind::MulAssign, TokenValue::NONE),
                RawToken::DivAssign => (TokenKind::DivAssign, TokenValue::NONE),
                RawToken::RemAssign => (TokenKind::RemAssign, TokenValue::NONE),
                RawToken::AndAssign => (TokenKind::AndAssign, TokenValue::NONE),
                RawToken::OrAssign => (TokenKind::OrAssign, TokenValue::NONE),
                RawToken::XorAssign => (TokenKind::XorAssign, TokenValue::NONE),
                RawToken::ShlAssign => (TokenKind::ShlAssign, TokenValue::NONE),
                RawToken::ShrAssign => (TokenKind::ShrAssign, TokenValue::NONE),
            };

            let index = self.push(kind, span, value);
            if kind.closing().is_some() {
                self.brackets.push(index);
            } else if kind.is_close_bracket() {
                let Some(open) = self.brackets.pop() else {
                    sinks.errors.add(Error::at_token(
                        ErrorKind::LexerNoOpenBracketsToClose,
                        file,
                        index,
                    ));
                    return false;
                };
                if self.kinds[open as usize].closing() != Some(kind) {
                    sinks.errors.add(Error::at_tokens(
                        ErrorKind::LexerInvalidCloseBracket,
                        file,
                        index,
                        open,
                    ));
                    return false;
                }
            }
        }

        if let Some(&open) = self.brackets.last() {
            errors.add(Error::at_token(ErrorKind::LexerUnclosedBracket, file, open));
            return false;
        }
        self.push(TokenKind::Eof, source.len()..source.len(), TokenValue::NONE);
        tracing::trace!(tokens = self.kinds.len(), lines = self.line_starts.len(), "lexed");
        true
    }

    fn clear(&mut self) {
        self.kinds.clear();
        self.locs.clear();
        self.values.clear();
        self.line_starts.clear();
        self.brackets.clear();
        self.line = 0;
    }

    /// Appends a token and returns its index.
    fn push(&mut self, kind: TokenKind, span: Range<usize>, value: TokenValue) -> u32 {
        let offset = to_u32(span.start);
        while self.line + 1 < self.line_starts.len() && self.line_starts[self.line + 1] <= offset {
            self.line += 1;
        }
        let index = to_u32(self.kinds.len());
        self.kinds.push(kind);
        self.locs.push(TokenLoc {
            offset,
            len: to_u32(span.end - span.start),
            line: to_u32(self.line + 1),
            column: offset - self.line_starts[self.line] + 1,
        });
        self.values.push(value);
        index
    }

    /// Records the offending token, logs `error` against it and reports
    /// failure.
    fn fail(
        &mut self,
        sinks: &Sinks<'_>,
        error: ErrorKind,
        kind: TokenKind,
        span: Range<usize>,
    ) -> bool {
        let index = self.push(kind, span, TokenValue::NONE);
        tracing::debug!(?error, token = index, "lex error");
        sinks.errors.add(Error::at_token(error, sinks.file, index));
        false
    }
}

fn intern(sinks: &Sinks<'_>, bytes: &[u8]) -> TokenValue {
    TokenValue::from_str_id(sinks.strings.get_or_insert(bytes))
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "the registry rejects sources of 4 GiB or more"
)]
fn to_u32(n: usize) -> u32 {
    n as u32
}
