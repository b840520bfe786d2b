//! Error kinds and how each one is laid out when rendered.

/// Which arguments an error kind carries, and so how it renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// `args[0]` is an errno.
    Errno,
    /// `args[0]` is a path (string id or file), `args[1]` an errno.
    PathReason,
    /// `args[0]` and `args[1]` are both paths.
    PathPair,
    /// `args[0]` is a file, `args[1]` a byte offset.
    FileOffset,
    /// `args[0]` is a token.
    Token,
    /// `args[0]` and `args[1]` are tokens, each with an info line.
    TokenPair {
        first: &'static str,
        second: &'static str,
    },
}

macro_rules! error_kinds {
    ($($variant:ident => $message:literal, $layout:expr;)*) => {
        /// Every diagnostic the compiler can report.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum ErrorKind {
            $($variant,)*
        }

        impl ErrorKind {
            /// The headline message. For path kinds this is a format with
            /// `{path}`/`{reason}`/`{other}` holes.
            pub const fn message(self) -> &'static str {
                match self {
                    $(ErrorKind::$variant => $message,)*
                }
            }

            pub const fn layout(self) -> Layout {
                match self {
                    $(ErrorKind::$variant => $layout,)*
                }
            }
        }
    };
}

use Layout::{Errno, FileOffset, PathPair, PathReason, Token, TokenPair};

error_kinds! {
    VirtMem => "virtual memory failure reason \"{reason}\"", Errno;
    InvalidFilePath => "invalid file path at \"{path}\" reason \"{reason}\"", PathReason;
    LibRootFileIsUsedInAnotherLib =>
        "library root file \"{path}\" is used in \"{other}\"", PathPair;
    LexerFileReadFailed => "failed to read in file at \"{path}\" reason \"{reason}\"", PathReason;
    LexerInvalidUtf8 => "file at \"{path}\" is not valid UTF-8 (byte {offset})", FileOffset;

    LexerNoOpenBracketsToClose => "no open brackets to close", Token;
    LexerUnclosedBracket => "bracket is never closed", Token;
    LexerInvalidCloseBracket => "invalid close bracket", TokenPair {
        first: "incorrect close here",
        second: "previously opened bracket here",
    };
    LexerBinaryIntegerCanOnlyHaveZeroAndOne =>
        "binary integers can only have the digits 0 and 1", Token;
    LexerOctalIntegerHasAMaxDigitOfSeven => "octal integers can only have the digits 0 to 7", Token;
    LexerBinaryLiteralsOnlyAllowForInt => "binary literals only allow for integers", Token;
    LexerOctalLiteralsOnlyAllowForInt => "octal literals only allow for integers", Token;
    LexerHexLiteralsOnlyAllowForInt => "hex literals only allow for integers", Token;
    LexerFloatHasMultipleDecimalPoints => "float has multiple decimal points", Token;
    LexerExpectedIntValueAfterRadixPrefix =>
        "expected an integer value after the radix prefix", Token;
    LexerExpectedDelimiterAfterNum => "expected a delimiter after the number", Token;
    LexerOverflowUint => "integer literal does not fit in 64 bits", Token;
    LexerOverflowFloat => "float literal does not fit in a 64 bit float", Token;
    LexerUnclosedStringLiteral => "unclosed string literal", Token;
    LexerNewLineInASingleLineString => "new line in a single line string", Token;
    LexerInvalidStringAsciiEscCharCodeFmt =>
        "invalid ascii escape, expected '\\x' followed by two hex digits", Token;
    LexerInvalidStringEscSequence => "invalid string escape sequence", Token;
    LexerUnrecognisedDirective => "unrecognised directive", Token;
    LexerExpectedACompileTimeToken => "expected a compile time token after '$'", Token;
    LexerUnclosedBlockComment => "unclosed block comment", Token;
    LexerUnsupportedToken => "unsupported token", Token;

    GenSynEntryExpected => "expected a declaration or '#import'", Token;
    GenSynEntryExpectedToEndWithANewLine => "entry is expected to end with a new line", Token;
    GenSynImportExpectedString => "expected a file path string after '#import'", Token;
    GenSynImportExpectedAliasIdent => "expected an identifier after 'as'", Token;
    GenSynDeclModColonMustFollowIdent => "expected ':' after the declaration name", Token;
    GenSynDeclExpectedKeyword => "expected 'mod', 'proc' or 'var' after ':'", Token;
    GenSynModMustHaveImpl => "a 'mod' must be followed by a '{' body", Token;
    GenSynProcExpectedParentheses => "expected '(' after 'proc'", Token;
    GenSynProcExpectedParenthesesToFollowArrow => "expected '(' after '->'", Token;
    GenSynProcParamExpectedIdent => "expected a parameter name", Token;
    GenSynProcParamExpectedColon => "expected ':' after the parameter name", Token;
    GenSynProcParamsUnexpectedDelimiter => "expected ',' or ')' in the parameter list", Token;
    GenSynTypeUnexpectedToken => "expected a type", Token;
    GenSynTypeArrayExpectedCloseBracket => "expected ']' to close the array length", Token;
    GenSynBlockExpectedCurlyBrace => "expected '{' to start a block", Token;
    GenSynStmtOnlyAllowVarDecl => "only 'var' declarations are allowed inside a block", Token;
    GenSynStmtExpectedToEndWithANewLine => "statement is expected to end with a new line", Token;
    GenSynExprExpected => "expected an expression", Token;
    GenSynExprCallExpectedCloseParentheses => "expected ',' or ')' in the call arguments", Token;
    GenSynExprIndexExpectedCloseBracket => "expected ']' to close the index", Token;
    GenSynExprExpectedCloseParentheses => "expected ')' to close the expression", Token;
    GenSynExprArrayExpectedCloseBracket => "expected ',' or ']' in the array literal", Token;
    GenSynExprFieldExpectedIdent => "expected a field name after '.'", Token;
    GenSynExprIfElseUnexpectedToken => "expected 'if' or '{' after 'else'", Token;
}
