pub mod lexer;
pub mod parser;
pub mod evaluator;
pub mod graph;

use miette::Diagnostic;
use thiserror::Error;

pub use lexer::{tokenize, LexError, Lexer, Token, TokenKind};
pub use parser::{parse, Node, ParseError, Parser, DEFAULT_MAX_DEPTH};
pub use evaluator::{evaluate, EvalError, Evaluator, DEFAULT_MAX_EVAL_DEPTH};
pub use graph::{Graph, GraphNode};

/// Failure of any pipeline stage, passed through unchanged.
#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvalError),
}

/// Limits applied to untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Deepest nesting of parentheses, calls or factorials the parser accepts.
    pub max_depth: usize,
    /// Deepest tree the evaluator walks.
    pub max_eval_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_eval_depth: DEFAULT_MAX_EVAL_DEPTH,
        }
    }
}

/// Runs text through tokenizing, parsing and evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calculator {
    config: Config,
}

impl Calculator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tokenize<'a>(&self, input: &'a str) -> Result<Vec<Token<'a>>, Error> {
        Ok(tokenize(input)?)
    }

    pub fn parse<'a>(&self, input: &'a str) -> Result<Node<'a>, Error> {
        let tokens = self.tokenize(input)?;
        Ok(Parser::new(&tokens)
            .with_max_depth(self.config.max_depth)
            .parse()?)
    }

    pub fn calculate(&self, input: &str) -> Result<f64, Error> {
        let root = self.parse(input)?;
        let value = Evaluator::with_max_depth(self.config.max_eval_depth).eval(&root)?;
        tracing::debug!(input, value, "calculated");
        Ok(value)
    }
}

/// Evaluates `input` with the default limits.
///
/// ```
/// assert_eq!(exprcalc::calculate("2+3*4").unwrap(), 14.0);
/// assert_eq!(exprcalc::calculate("5!").unwrap(), 120.0);
/// ```
pub fn calculate(input: &str) -> Result<f64, Error> {
    Calculator::default().calculate(input)
}
