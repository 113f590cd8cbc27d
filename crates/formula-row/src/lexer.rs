//! Formula lexer.
//!
//! The lexer is total: every byte of the input belongs to exactly one token, whitespace
//! included. Characters the grammar does not know are emitted as [`TokenKind::Unknown`] and left
//! for the compiler to reject, so the only lexical failure is an unterminated string literal.

use std::fmt;

use crate::error::LexError;

/// A `(start, len)` byte range into the source text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    pub const fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    pub const fn end(self) -> usize {
        self.start + self.len
    }

    /// Materialize the covered text. Returns an empty string when the span does not fit `source`.
    pub fn slice(self, source: &str) -> &str {
        source.get(self.start..self.end()).unwrap_or("")
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Whitespace,
    Identifier,
    StringLiteral,
    NumericLiteral,
    TrueLiteral,
    FalseLiteral,
    DotOperator,
    Comma,
    LambdaOperator,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Unknown,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Whitespace => "whitespace",
            TokenKind::Identifier => "identifier",
            TokenKind::StringLiteral => "string literal",
            TokenKind::NumericLiteral => "numeric literal",
            TokenKind::TrueLiteral => "`true`",
            TokenKind::FalseLiteral => "`false`",
            TokenKind::DotOperator => "`.`",
            TokenKind::Comma => "`,`",
            TokenKind::LambdaOperator => "`=>`",
            TokenKind::OpenParen => "`(`",
            TokenKind::CloseParen => "`)`",
            TokenKind::OpenBracket => "`[`",
            TokenKind::CloseBracket => "`]`",
            TokenKind::Unknown => "unknown character",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn text(self, source: &str) -> &str {
        self.span.slice(source)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_number_part(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

/// Split `input` into tokens covering the whole text in source order.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut offset = 0;
    while offset < input.len() {
        let token = read_token(input, offset)?;
        debug_assert!(token.span.len > 0, "lexer must always advance");
        offset = token.span.end();
        tokens.push(token);
    }
    Ok(tokens)
}

fn read_token(input: &str, offset: usize) -> Result<Token, LexError> {
    let rest = &input[offset..];
    let Some(first) = rest.chars().next() else {
        debug_assert!(false, "read_token called at end of input");
        return Ok(Token::new(TokenKind::Unknown, Span::new(offset, 0)));
    };

    if is_ident_start(first) {
        let len = run_len(rest, is_ident_part);
        let text = &rest[..len];
        let kind = if text.eq_ignore_ascii_case("true") {
            TokenKind::TrueLiteral
        } else if text.eq_ignore_ascii_case("false") {
            TokenKind::FalseLiteral
        } else {
            TokenKind::Identifier
        };
        return Ok(Token::new(kind, Span::new(offset, len)));
    }

    if first == '\'' {
        return read_string(input, offset);
    }

    if first.is_ascii_digit() {
        let len = run_len(rest, is_number_part);
        return Ok(Token::new(TokenKind::NumericLiteral, Span::new(offset, len)));
    }

    if first.is_whitespace() {
        let len = run_len(rest, char::is_whitespace);
        return Ok(Token::new(TokenKind::Whitespace, Span::new(offset, len)));
    }

    if rest.starts_with("=>") {
        return Ok(Token::new(TokenKind::LambdaOperator, Span::new(offset, 2)));
    }

    let kind = match first {
        ',' => TokenKind::Comma,
        '.' => TokenKind::DotOperator,
        '(' => TokenKind::OpenParen,
        ')' => TokenKind::CloseParen,
        '[' => TokenKind::OpenBracket,
        ']' => TokenKind::CloseBracket,
        _ => TokenKind::Unknown,
    };
    Ok(Token::new(kind, Span::new(offset, first.len_utf8())))
}

/// Scan a `'`-delimited literal. A quote preceded by a backslash does not terminate it.
fn read_string(input: &str, offset: usize) -> Result<Token, LexError> {
    let rest = &input[offset..];
    let mut prev = '\'';
    for (idx, c) in rest.char_indices().skip(1) {
        if c == '\'' && prev != '\\' {
            return Ok(Token::new(TokenKind::StringLiteral, Span::new(offset, idx + 1)));
        }
        prev = c;
    }

    let span = Span::new(offset, rest.len());
    Err(LexError::UnterminatedString {
        span,
        text: rest.to_string(),
    })
}

fn run_len(s: &str, mut pred: impl FnMut(char) -> bool) -> usize {
    s.char_indices()
        .find(|&(_, c)| !pred(c))
        .map(|(idx, _)| idx)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_take_priority_over_identifiers() {
        assert_eq!(
            kinds("TRUE false truthy"),
            vec![
                TokenKind::TrueLiteral,
                TokenKind::Whitespace,
                TokenKind::FalseLiteral,
                TokenKind::Whitespace,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn lambda_operator_is_one_token() {
        assert_eq!(
            kinds("x=>y"),
            vec![
                TokenKind::Identifier,
                TokenKind::LambdaOperator,
                TokenKind::Identifier
            ]
        );
        // A lone `=` is not an operator in this language.
        assert_eq!(kinds("="), vec![TokenKind::Unknown]);
    }

    #[test]
    fn numbers_absorb_dots_but_not_signs() {
        let tokens = tokenize("-1.5.2").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
        assert_eq!(tokens[1].kind, TokenKind::NumericLiteral);
        assert_eq!(tokens[1].text("-1.5.2"), "1.5.2");
    }

    #[test]
    fn string_span_includes_both_quotes() {
        let src = "'it\\'s' x";
        let tokens = tokenize(src).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].text(src), "'it\\'s'");
    }

    #[test]
    fn unterminated_string_reports_span_and_text() {
        let err = tokenize("Concat(['foobar").unwrap_err();
        assert_eq!(
            err,
            LexError::UnterminatedString {
                span: Span::new(8, 7),
                text: "'foobar".to_string(),
            }
        );
    }

    #[test]
    fn unknown_multibyte_characters_advance_by_whole_char() {
        let src = "é+";
        let tokens = tokenize(src).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].span, Span::new(0, 2));
        assert_eq!(tokens[1].span, Span::new(2, 1));
    }
}
