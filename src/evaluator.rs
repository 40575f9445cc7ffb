use miette::{Diagnostic, SourceSpan};
use thiserror::Error;
use crate::parser::Node;

/// Tree depth the evaluator accepts by default. Left-deep chains such as
/// `1+1+...+1` count one level per operator.
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 2048;

/// Largest argument whose factorial is finite in `f64`.
pub const MAX_FACTORIAL_ARG: f64 = 170.0;

#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("unknown function: {name}")]
    #[diagnostic(code(exprcalc::eval::unknown_function), help("available functions: sin, cos"))]
    UnknownFunction {
        name: String,
        #[label("called here")]
        span: SourceSpan,
    },
    #[error("unknown operator: {op}")]
    #[diagnostic(code(exprcalc::eval::unknown_operator))]
    UnknownOperator {
        op: String,
        #[label("applied here")]
        span: SourceSpan,
    },
    #[error("factorial is defined for non-negative integers only")]
    #[diagnostic(code(exprcalc::eval::factorial_domain))]
    FactorialDomain {
        value: f64,
        #[label("operand is not a non-negative integer")]
        span: SourceSpan,
    },
    #[error("invalid number literal: {literal}")]
    #[diagnostic(code(exprcalc::eval::invalid_number))]
    InvalidNumber {
        literal: String,
        #[label("this literal")]
        span: SourceSpan,
    },
    #[error("expression nests deeper than {limit} levels")]
    #[diagnostic(code(exprcalc::eval::too_deep))]
    TooDeep {
        limit: usize,
        #[label("limit reached here")]
        span: SourceSpan,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    max_depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_EVAL_DEPTH,
        }
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Reduces a tree to a number. Binary nodes evaluate `lhs` before `rhs`.
    pub fn eval(&self, node: &Node<'_>) -> Result<f64, EvalError> {
        self.eval_at(node, 0)
    }

    fn eval_at(&self, node: &Node<'_>, depth: usize) -> Result<f64, EvalError> {
        if depth > self.max_depth {
            return Err(EvalError::TooDeep {
                limit: self.max_depth,
                span: node.span(),
            });
        }

        match node {
            Node::Number { literal, .. } => {
                literal.parse::<f64>().map_err(|_| EvalError::InvalidNumber {
                    literal: literal.to_string(),
                    span: node.span(),
                })
            }

            Node::Call { name, arg, .. } => {
                let x = self.eval_at(arg, depth + 1)?;
                match *name {
                    "sin" => Ok(x.sin()),
                    "cos" => Ok(x.cos()),
                    _ => Err(EvalError::UnknownFunction {
                        name: name.to_string(),
                        span: node.span(),
                    }),
                }
            }

            Node::Postfix { op, operand, .. } => {
                let x = self.eval_at(operand, depth + 1)?;
                match *op {
                    "!" => factorial(x).ok_or(EvalError::FactorialDomain {
                        value: x,
                        span: node.span(),
                    }),
                    _ => Err(EvalError::UnknownOperator {
                        op: op.to_string(),
                        span: node.span(),
                    }),
                }
            }

            Node::Binary { op, lhs, rhs, .. } => {
                let a = self.eval_at(lhs, depth + 1)?;
                let b = self.eval_at(rhs, depth + 1)?;
                let f = binary_fn(op).ok_or_else(|| EvalError::UnknownOperator {
                    op: op.to_string(),
                    span: node.span(),
                })?;
                Ok(f(a, b))
            }
        }
    }
}

/// Evaluates a tree with the default depth limit.
pub fn evaluate(node: &Node<'_>) -> Result<f64, EvalError> {
    let value = Evaluator::new().eval(node)?;
    tracing::debug!(value, "evaluated expression");
    Ok(value)
}

fn binary_fn(op: &str) -> Option<fn(f64, f64) -> f64> {
    match op {
        "+" => Some(add),
        "-" => Some(minus),
        "*" => Some(mult),
        "/" => Some(div),
        "^" => Some(expt),
        _ => None,
    }
}

/// `n!` for a non-negative integer `n`, `None` for anything else.
///
/// Computed as a running product; arguments past 170 overflow to infinity.
pub fn factorial(n: f64) -> Option<f64> {
    if n < 0.0 || n.fract() != 0.0 {
        return None;
    }
    if n > MAX_FACTORIAL_ARG {
        return Some(f64::INFINITY);
    }
    Some((2..=n as u64).map(|k| k as f64).product())
}

// Basic arithmetic operations.
fn add(a: f64, b: f64) -> f64 {
    a + b
}

fn minus(a: f64, b: f64) -> f64 {
    a - b
}

fn mult(a: f64, b: f64) -> f64 {
    a * b
}

// IEEE semantics: x/0 is a signed infinity, 0/0 is NaN.
fn div(a: f64, b: f64) -> f64 {
    a / b
}

fn expt(a: f64, b: f64) -> f64 {
    a.powf(b)
}
