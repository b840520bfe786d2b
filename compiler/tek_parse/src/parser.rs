//! Cursor, entries, items and statements.

use tek_diagnostic::ErrorKind;
use tek_ir::{SynNode, SynNodeKind, TokenKind, TokenValue};

use crate::stack::ensure_sufficient_stack;
use crate::{ImportResolver, ParseError, Tokens};

pub(crate) type PResult<T> = Result<T, ParseError>;

/// Worker-private tree generator state, reused across files.
#[derive(Default)]
pub struct TreeGenerator {
    nodes: Vec<SynNode>,
}

impl TreeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes of the last [`TreeGenerator::generate`]; node 0 is the root
    /// module.
    pub fn nodes(&self) -> &[SynNode] {
        &self.nodes
    }

    /// Builds the tree for `tokens`. On error the nodes built so far are
    /// left in place.
    pub fn generate<R: ImportResolver + ?Sized>(
        &mut self,
        tokens: Tokens<'_>,
        resolver: &mut R,
    ) -> Result<(), ParseError> {
        self.nodes.clear();
        let mut parser = Parser {
            kinds: tokens.kinds,
            values: tokens.values,
            pos: 0,
            nodes: &mut self.nodes,
            resolver,
        };
        let result = parser.file();
        tracing::trace!(nodes = self.nodes.len(), ok = result.is_ok(), "syntax tree generated");
        result
    }
}

/// A sibling list under construction, threaded through `SynNode::next`.
#[derive(Default)]
pub(crate) struct Chain {
    pub(crate) first: u32,
    last: u32,
}

pub(crate) struct Parser<'a, R: ?Sized> {
    kinds: &'a [TokenKind],
    values: &'a [TokenValue],
    pos: usize,
    pub(crate) nodes: &'a mut Vec<SynNode>,
    resolver: &'a mut R,
}

impl<R: ImportResolver + ?Sized> Parser<'_, R> {
    // Cursor

    pub(crate) fn peek(&self) -> TokenKind {
        self.kinds.get(self.pos).copied().unwrap_or(TokenKind::Eof)
    }

    pub(crate) fn peek_at(&self, ahead: usize) -> TokenKind {
        self.kinds
            .get(self.pos + ahead)
            .copied()
            .unwrap_or(TokenKind::Eof)
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "token counts are bounded by the file's token segment"
    )]
    pub(crate) fn index(&self) -> u32 {
        self.pos.min(self.kinds.len().saturating_sub(1)) as u32
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    /// Consumes the current token and returns its index. Never moves past
    /// `Eof`.
    pub(crate) fn bump(&mut self) -> u32 {
        let index = self.index();
        if self.peek() != TokenKind::Eof {
            self.pos += 1;
        }
        index
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> Option<u32> {
        self.at(kind).then(|| self.bump())
    }

    /// Consumes `kind` or fails with `error` at the current token.
    pub(crate) fn expect(&mut self, kind: TokenKind, error: ErrorKind) -> PResult<u32> {
        match self.eat(kind) {
            Some(index) => Ok(index),
            None => Err(self.error(error)),
        }
    }

    pub(crate) fn error(&self, kind: ErrorKind) -> ParseError {
        ParseError::Syntax {
            kind,
            token: self.index(),
        }
    }

    fn skip_newline(&mut self) {
        self.eat(TokenKind::Newline);
    }

    // Nodes

    #[expect(
        clippy::cast_possible_truncation,
        reason = "node counts are bounded by the file's node segment"
    )]
    pub(crate) fn add(&mut self, node: SynNode) -> u32 {
        let index = self.nodes.len() as u32;
        self.nodes.push(node);
        index
    }

    pub(crate) fn node(&mut self, kind: SynNodeKind, token: u32, lhs: u32, rhs: u32) -> u32 {
        let mut node = SynNode::new(kind, token);
        node.lhs = lhs;
        node.rhs = rhs;
        self.add(node)
    }

    pub(crate) fn link(&mut self, chain: &mut Chain, node: u32) {
        if chain.first == 0 {
            chain.first = node;
        } else {
            self.nodes[chain.last as usize].next = node;
        }
        chain.last = node;
    }

    // Entries

    fn file(&mut self) -> PResult<()> {
        let root = self.add(SynNode::new(SynNodeKind::Mod, 0));
        self.skip_newline();
        let first = self.entries(TokenKind::Eof)?;
        self.nodes[root as usize].lhs = first;
        Ok(())
    }

    /// `(entry NL)*` up to `end`, which is left unconsumed. Returns the
    /// first entry.
    fn entries(&mut self, end: TokenKind) -> PResult<u32> {
        let mut chain = Chain::default();
        while !self.at(end) {
            let entry = self.entry()?;
            self.link(&mut chain, entry);
            if self.eat(TokenKind::Newline).is_none() && !self.at(end) {
                return Err(self.error(ErrorKind::GenSynEntryExpectedToEndWithANewLine));
            }
        }
        Ok(chain.first)
    }

    fn entry(&mut self) -> PResult<u32> {
        match self.peek() {
            TokenKind::DirImport => self.import(),
            TokenKind::Ident => {
                let name = self.bump();
                self.expect(TokenKind::Colon, ErrorKind::GenSynDeclModColonMustFollowIdent)?;
                let item = match self.peek() {
                    TokenKind::KwMod => self.module()?,
                    TokenKind::KwProc => self.procedure()?,
                    TokenKind::KwVar => self.var()?,
                    _ => return Err(self.error(ErrorKind::GenSynDeclExpectedKeyword)),
                };
                Ok(self.node(SynNodeKind::Decl, name, item, 0))
            }
            _ => Err(self.error(ErrorKind::GenSynEntryExpected)),
        }
    }

    fn import(&mut self) -> PResult<u32> {
        self.bump();
        let path_token = self.expect(TokenKind::LitString, ErrorKind::GenSynImportExpectedString)?;
        let Some(path) = self.values[path_token as usize].str_id() else {
            return Err(ParseError::Syntax {
                kind: ErrorKind::GenSynImportExpectedString,
                token: path_token,
            });
        };
        let alias = match self.eat(TokenKind::KwAs) {
            Some(_) => self.expect(TokenKind::Ident, ErrorKind::GenSynImportExpectedAliasIdent)?,
            None => 0,
        };
        let Some(file) = self.resolver.resolve_import(path, path_token) else {
            return Err(ParseError::Import { token: path_token });
        };
        tracing::trace!(file = file.raw(), "import resolved");
        Ok(self.node(SynNodeKind::Import, path_token, file.raw(), alias))
    }

    // Items

    fn module(&mut self) -> PResult<u32> {
        let keyword = self.bump();
        self.expect(TokenKind::BraceOpen, ErrorKind::GenSynModMustHaveImpl)?;
        self.skip_newline();
        let first = ensure_sufficient_stack(|| self.entries(TokenKind::BraceClose))?;
        self.bump();
        Ok(self.node(SynNodeKind::Mod, keyword, first, 0))
    }

    fn procedure(&mut self) -> PResult<u32> {
        let keyword = self.bump();
        let open = self.expect(TokenKind::ParenOpen, ErrorKind::GenSynProcExpectedParentheses)?;
        let params = self.params()?;
        let returns = if self.eat(TokenKind::Arrow).is_some() {
            self.expect(
                TokenKind::ParenOpen,
                ErrorKind::GenSynProcExpectedParenthesesToFollowArrow,
            )?;
            self.params()?
        } else {
            0
        };
        let sig = self.node(SynNodeKind::ProcSig, open, params, returns);
        let body = if self.at(TokenKind::BraceOpen) {
            self.block()?
        } else {
            0
        };
        Ok(self.node(SynNodeKind::Proc, keyword, sig, body))
    }

    /// Parameters after an opening `(`, through the closing `)`.
    fn params(&mut self) -> PResult<u32> {
        let mut chain = Chain::default();
        if self.eat(TokenKind::ParenClose).is_some() {
            return Ok(0);
        }
        loop {
            let name = self.expect(TokenKind::Ident, ErrorKind::GenSynProcParamExpectedIdent)?;
            self.expect(TokenKind::Colon, ErrorKind::GenSynProcParamExpectedColon)?;
            let ty = self.type_expr()?;
            let param = self.node(SynNodeKind::Param, name, ty, 0);
            self.link(&mut chain, param);
            match self.peek() {
                TokenKind::Comma => {
                    self.bump();
                }
                TokenKind::ParenClose => {
                    self.bump();
                    return Ok(chain.first);
                }
                _ => return Err(self.error(ErrorKind::GenSynProcParamsUnexpectedDelimiter)),
            }
        }
    }

    fn var(&mut self) -> PResult<u32> {
        let keyword = self.bump();
        let ty = match self.peek() {
            TokenKind::Ident | TokenKind::Star | TokenKind::BracketOpen => self.type_expr()?,
            _ => 0,
        };
        let init = match self.eat(TokenKind::Eq) {
            Some(_) => self.expr()?,
            None => 0,
        };
        Ok(self.node(SynNodeKind::Var, keyword, ty, init))
    }

    // Statements

    pub(crate) fn block(&mut self) -> PResult<u32> {
        let open = self.expect(TokenKind::BraceOpen, ErrorKind::GenSynBlockExpectedCurlyBrace)?;
        self.skip_newline();
        let mut chain = Chain::default();
        while !self.at(TokenKind::BraceClose) {
            let stmt = ensure_sufficient_stack(|| self.stmt())?;
            self.link(&mut chain, stmt);
            if self.eat(TokenKind::Newline).is_none() && !self.at(TokenKind::BraceClose) {
                return Err(self.error(ErrorKind::GenSynStmtExpectedToEndWithANewLine));
            }
        }
        self.bump();
        Ok(self.node(SynNodeKind::Block, open, chain.first, 0))
    }

    fn stmt(&mut self) -> PResult<u32> {
        match self.peek() {
            TokenKind::Ident if self.peek_at(1) == TokenKind::Colon => {
                let name = self.bump();
                self.bump();
                if !self.at(TokenKind::KwVar) {
                    return Err(self.error(ErrorKind::GenSynStmtOnlyAllowVarDecl));
                }
                let var = self.var()?;
                Ok(self.node(SynNodeKind::Decl, name, var, 0))
            }
            TokenKind::KwReturn => {
                let keyword = self.bump();
                let value = match self.peek() {
                    TokenKind::Newline | TokenKind::BraceClose | TokenKind::Eof => 0,
                    _ => self.expr()?,
                };
                Ok(self.node(SynNodeKind::Return, keyword, value, 0))
            }
            TokenKind::KwBreak => {
                let keyword = self.bump();
                Ok(self.node(SynNodeKind::Break, keyword, 0, 0))
            }
            TokenKind::KwContinue => {
                let keyword = self.bump();
                Ok(self.node(SynNodeKind::Continue, keyword, 0, 0))
            }
            _ => {
                let target = self.expr()?;
                if !is_assign_op(self.peek()) {
                    return Ok(target);
                }
                let op = self.bump();
                let value = self.expr()?;
                Ok(self.node(SynNodeKind::Assign, op, target, value))
            }
        }
    }
}

fn is_assign_op(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Eq
            | TokenKind::AddAssign
            | TokenKind::SubAssign
            | TokenKind::MulAssign
            | TokenKind::DivAssign
            | TokenKind::RemAssign
            | TokenKind::AndAssign
            | TokenKind::OrAssign
            | TokenKind::XorAssign
            | TokenKind::ShlAssign
            | TokenKind::ShrAssign
    )
}
