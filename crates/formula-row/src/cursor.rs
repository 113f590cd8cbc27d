use crate::error::SyntaxError;
use crate::lexer::{Token, TokenKind};

/// Read-only, whitespace-skipping view over a token sequence with a save/restore stack for
/// speculative parsing.
#[derive(Clone, Debug)]
pub struct TokenCursor<'t> {
    tokens: &'t [Token],
    pos: usize,
    saved: Vec<usize>,
}

impl<'t> TokenCursor<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            saved: Vec::new(),
        }
    }

    /// Index of the next unread token (whitespace not yet skipped).
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to a position previously returned by [`position`](Self::position).
    pub(crate) fn seek(&mut self, pos: usize) {
        debug_assert!(pos <= self.tokens.len());
        self.pos = pos.min(self.tokens.len());
    }

    /// Depth of the save stack.
    pub fn saved_depth(&self) -> usize {
        self.saved.len()
    }

    fn next_significant(&self) -> Option<usize> {
        (self.pos..self.tokens.len()).find(|&i| self.tokens[i].kind != TokenKind::Whitespace)
    }

    /// Next non-whitespace token, without consuming it.
    pub fn peek(&self) -> Option<Token> {
        self.next_significant().map(|i| self.tokens[i])
    }

    pub fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    /// Consume and return the next non-whitespace token.
    pub fn take(&mut self) -> Option<Token> {
        match self.next_significant() {
            Some(i) => {
                self.pos = i + 1;
                Some(self.tokens[i])
            }
            None => {
                self.pos = self.tokens.len();
                None
            }
        }
    }

    /// Consume the next non-whitespace token, failing if it is not of `kind`.
    ///
    /// On failure nothing is consumed.
    pub fn expect(&mut self, kind: TokenKind) -> Result<Token, SyntaxError> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.take();
                Ok(token)
            }
            Some(token) => Err(SyntaxError::UnexpectedToken {
                expected: kind,
                found: token.kind,
                span: token.span,
            }),
            None => Err(SyntaxError::UnexpectedEnd {
                expected: kind.to_string(),
            }),
        }
    }

    /// Consume the maximal run of tokens whose kinds are in `kinds`.
    ///
    /// The returned iterator is lazy: tokens are consumed only as it is advanced, and it stops
    /// (without consuming) at the first token of another kind.
    pub fn take_while<'c>(&'c mut self, kinds: &'c [TokenKind]) -> TakeWhile<'c, 't> {
        TakeWhile {
            cursor: self,
            kinds,
        }
    }

    /// Push the current read position.
    pub fn save_state(&mut self) {
        self.saved.push(self.pos);
    }

    /// Pop the most recently saved position and rewind to it.
    pub fn restore_state(&mut self) {
        match self.saved.pop() {
            Some(pos) => self.pos = pos,
            None => debug_assert!(false, "restore_state called with an empty save stack"),
        }
    }

    /// Pop the most recently saved position without rewinding (commit a speculative parse).
    pub fn discard_state(&mut self) {
        let popped = self.saved.pop();
        debug_assert!(
            popped.is_some(),
            "discard_state called with an empty save stack"
        );
    }
}

pub struct TakeWhile<'c, 't> {
    cursor: &'c mut TokenCursor<'t>,
    kinds: &'c [TokenKind],
}

impl Iterator for TakeWhile<'_, '_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let token = self.cursor.peek()?;
        if self.kinds.contains(&token.kind) {
            self.cursor.take()
        } else {
            None
        }
    }
}
