use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
#[error("unexpected character '{found}' at position {offset}")]
#[diagnostic(code(exprcalc::lex::unexpected_character))]
pub struct LexError {
    pub found: char,
    pub offset: usize,
    #[label("this input character")]
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub slice: &'a str,
    pub offset: usize,
    pub kind: TokenKind,
}

impl Token<'_> {
    /// Byte range covered by the token in the source text.
    pub fn span(&self) -> SourceSpan {
        (self.offset, self.slice.len()).into()
    }

    /// Zero-width span just past the token.
    pub fn end(&self) -> SourceSpan {
        (self.offset + self.slice.len(), 0).into()
    }
}

impl<'a> std::fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    /// One of `+ - * /`.
    Operator,
    LeftParen,
    RightParen,
    Power,
    Factorial,
    /// `sin` or `cos`.
    Function,
}

impl TokenKind {
    /// Category name shown when the token stream is rendered.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Number => "NUMBER",
            TokenKind::Operator => "OPERATOR",
            TokenKind::LeftParen | TokenKind::RightParen => "PARENTHESIS",
            TokenKind::Power => "POWER",
            TokenKind::Factorial => "FACTORIAL",
            TokenKind::Function => "FUNCTION",
        }
    }
}

const FUNCTIONS: [&str; 2] = ["sin", "cos"];

/// Scans an expression into tokens.
///
/// Rules are tried at the cursor in a fixed order and the first match wins:
/// number, basic operator, parenthesis, power, factorial, function name,
/// whitespace. Whitespace is consumed silently. The iterator yields at most one
/// error and is exhausted afterwards.
#[derive(Debug)]
pub struct Lexer<'a> {
    rest: &'a str,
    byte: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            rest: input,
            byte: 0,
        }
    }

    fn bump(&mut self, len: usize) -> &'a str {
        let slice = &self.rest[..len];
        self.rest = &self.rest[len..];
        self.byte += len;
        slice
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let c = self.rest.chars().next()?;
            let offset = self.byte;

            enum Started {
                Number,
                Single(TokenKind),
                Function,
                Whitespace,
            }

            let started = match c {
                '0'..='9' => Started::Number,
                '+' | '-' | '*' | '/' => Started::Single(TokenKind::Operator),
                '(' => Started::Single(TokenKind::LeftParen),
                ')' => Started::Single(TokenKind::RightParen),
                '^' => Started::Single(TokenKind::Power),
                '!' => Started::Single(TokenKind::Factorial),
                _ if function_len(self.rest).is_some() => Started::Function,
                c if c.is_whitespace() => Started::Whitespace,
                _ => {
                    // Nothing after a failure is worth scanning.
                    self.byte += self.rest.len();
                    self.rest = "";
                    return Some(Err(LexError {
                        found: c,
                        offset,
                        span: (offset, c.len_utf8()).into(),
                    }));
                }
            };

            let (kind, len) = match started {
                Started::Number => (TokenKind::Number, number_len(self.rest)),
                Started::Single(kind) => (kind, c.len_utf8()),
                Started::Function => (TokenKind::Function, function_len(self.rest).unwrap_or(0)),
                Started::Whitespace => {
                    let end = self
                        .rest
                        .find(|c: char| !c.is_whitespace())
                        .unwrap_or(self.rest.len());
                    self.bump(end);
                    continue;
                }
            };

            let slice = self.bump(len);
            let token = Token {
                slice,
                offset,
                kind,
            };
            tracing::trace!(?token, "scanned token");
            return Some(Ok(token));
        }
    }
}

impl std::iter::FusedIterator for Lexer<'_> {}

/// Length of `\d+(\.\d+)?` at the start of `s`. A dot not followed by a digit
/// is left for the next rule.
fn number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let int = digits(0);
    if bytes.get(int) == Some(&b'.') {
        let frac = digits(int + 1);
        if frac > 0 {
            return int + 1 + frac;
        }
    }
    int
}

/// Length of a function name at the start of `s`, if one is there and is not
/// the prefix of a longer word.
fn function_len(s: &str) -> Option<usize> {
    FUNCTIONS.iter().find_map(|name| {
        let after = s.strip_prefix(name)?;
        match after.chars().next() {
            Some(c) if c.is_ascii_alphanumeric() || c == '_' => None,
            _ => Some(name.len()),
        }
    })
}

/// Tokenizes the whole input, failing on the first unrecognized character.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    let tokens = Lexer::new(input).collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(tokens = tokens.len(), "tokenized expression");
    Ok(tokens)
}
