use miette::{Diagnostic, SourceSpan};
use thiserror::Error;
use crate::lexer::{Token, TokenKind};

/// Nesting allowed by default for groups, function calls and factorial chains.
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected end of input")]
    #[diagnostic(code(exprcalc::parse::unexpected_eof))]
    UnexpectedEof {
        #[label("expression ends here")]
        span: SourceSpan,
    },
    #[error("unexpected token: {found}")]
    #[diagnostic(code(exprcalc::parse::unexpected_token))]
    UnexpectedToken {
        found: String,
        #[label("here")]
        span: SourceSpan,
    },
    #[error("expected '(' after function '{name}'")]
    #[diagnostic(
        code(exprcalc::parse::missing_call_paren),
        help("function arguments are written in parentheses, as in sin(0)")
    )]
    ExpectedCallParen {
        name: String,
        #[label("'(' expected here")]
        span: SourceSpan,
    },
    #[error("expected ')' after function argument")]
    #[diagnostic(code(exprcalc::parse::unclosed_call))]
    UnclosedCall {
        #[label("')' expected here")]
        span: SourceSpan,
    },
    #[error("expected closing parenthesis")]
    #[diagnostic(code(exprcalc::parse::unclosed_group))]
    UnclosedGroup {
        #[label("this parenthesis is never closed")]
        span: SourceSpan,
    },
    #[error("unexpected token at the end of input: {found}")]
    #[diagnostic(code(exprcalc::parse::trailing_token))]
    TrailingToken {
        found: String,
        #[label("nothing may follow the expression")]
        span: SourceSpan,
    },
    #[error("expression nests deeper than {limit} levels")]
    #[diagnostic(code(exprcalc::parse::too_deep))]
    TooDeep {
        limit: usize,
        #[label("limit reached here")]
        span: SourceSpan,
    },
}

/// A node of the expression tree.
///
/// Operator symbols and function names keep their source text; whether they
/// mean anything is decided by the evaluator. `offset` is the byte position of
/// the token that produced the node (zero for hand-built trees).
#[derive(Debug, Clone, PartialEq)]
pub enum Node<'a> {
    Number {
        literal: &'a str,
        offset: usize,
    },
    Binary {
        op: &'a str,
        lhs: Box<Node<'a>>,
        rhs: Box<Node<'a>>,
        offset: usize,
    },
    Postfix {
        op: &'a str,
        operand: Box<Node<'a>>,
        offset: usize,
    },
    Call {
        name: &'a str,
        arg: Box<Node<'a>>,
        offset: usize,
    },
}

impl<'a> Node<'a> {
    pub fn number(literal: &'a str) -> Self {
        Node::Number { literal, offset: 0 }
    }

    pub fn binary(op: &'a str, lhs: Node<'a>, rhs: Node<'a>) -> Self {
        Node::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            offset: 0,
        }
    }

    pub fn postfix(op: &'a str, operand: Node<'a>) -> Self {
        Node::Postfix {
            op,
            operand: Box::new(operand),
            offset: 0,
        }
    }

    pub fn call(name: &'a str, arg: Node<'a>) -> Self {
        Node::Call {
            name,
            arg: Box::new(arg),
            offset: 0,
        }
    }

    /// The source text the node was built from: literal, operator or name.
    pub fn text(&self) -> &'a str {
        match self {
            Node::Number { literal, .. } => *literal,
            Node::Binary { op, .. } | Node::Postfix { op, .. } => *op,
            Node::Call { name, .. } => *name,
        }
    }

    /// Category name shown when the tree is rendered.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Number { .. } => "NUMBER",
            Node::Binary { op: "^", .. } => "POWER",
            Node::Binary { .. } => "OPERATOR",
            Node::Postfix { .. } => "FACTORIAL",
            Node::Call { .. } => "FUNCTION",
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Node::Number { offset, .. }
            | Node::Binary { offset, .. }
            | Node::Postfix { offset, .. }
            | Node::Call { offset, .. } => *offset,
        }
    }

    pub fn span(&self) -> SourceSpan {
        (self.offset(), self.text().len()).into()
    }

    /// Children in evaluation order.
    pub fn children(&self) -> impl Iterator<Item = &Node<'a>> + '_ {
        let (first, second) = match self {
            Node::Number { .. } => (None, None),
            Node::Binary { lhs, rhs, .. } => (Some(&**lhs), Some(&**rhs)),
            Node::Postfix { operand: child, .. } | Node::Call { arg: child, .. } => {
                (Some(&**child), None)
            }
        };
        first.into_iter().chain(second)
    }
}

impl Node<'_> {
    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        let mut stack = vec![self];
        let mut count = 0;
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children());
        }
        count
    }
}

// Trees can be as deep as the input is long (`1+1+...+1`), so formatting and
// dropping walk them with an explicit stack instead of recursing.

impl std::fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        enum Piece<'n, 'a> {
            Node(&'n Node<'a>),
            Text(&'n str),
        }

        let mut stack = vec![Piece::Node(self)];
        while let Some(piece) = stack.pop() {
            match piece {
                Piece::Text(text) => f.write_str(text)?,
                Piece::Node(Node::Number { literal, .. }) => f.write_str(literal)?,
                Piece::Node(Node::Binary { op, lhs, rhs, .. }) => stack.extend([
                    Piece::Text(")"),
                    Piece::Node(&**rhs),
                    Piece::Text(" "),
                    Piece::Text(*op),
                    Piece::Text(" "),
                    Piece::Node(&**lhs),
                    Piece::Text("("),
                ]),
                Piece::Node(Node::Postfix { op, operand, .. }) => {
                    stack.extend([Piece::Text(*op), Piece::Node(&**operand)])
                }
                Piece::Node(Node::Call { name, arg, .. }) => stack.extend([
                    Piece::Text(")"),
                    Piece::Node(&**arg),
                    Piece::Text("("),
                    Piece::Text(*name),
                ]),
            }
        }
        Ok(())
    }
}

impl Drop for Node<'_> {
    fn drop(&mut self) {
        let mut detached = Vec::new();
        detach_children(self, &mut detached);
        while let Some(mut node) = detached.pop() {
            detach_children(&mut node, &mut detached);
        }
    }
}

/// Moves every child that has children of its own onto `out`, leaving a leaf
/// in its place.
fn detach_children<'a>(node: &mut Node<'a>, out: &mut Vec<Box<Node<'a>>>) {
    let mut detach = |child: &mut Box<Node<'a>>| {
        if child.children().next().is_some() {
            out.push(std::mem::replace(child, Box::new(Node::number(""))));
        }
    };
    match node {
        Node::Number { .. } => {}
        Node::Binary { lhs, rhs, .. } => {
            detach(lhs);
            detach(rhs);
        }
        Node::Postfix { operand: child, .. } | Node::Call { arg: child, .. } => detach(child),
    }
}

/// Recursive-descent parser over a token slice.
///
/// ```text
/// Expression := Term (('+' | '-') Term)*
/// Term       := PowerExpr (('*' | '/') PowerExpr)*
/// PowerExpr  := Factor ('^' Factor)?
/// Factor     := NUMBER '!'* | FUNCTION '(' Expression ')' | '(' Expression ')'
/// ```
///
/// `PowerExpr` takes a single `^`: in `2^3^2` the second `^` is left over and
/// reported as a trailing token.
pub struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    pub fn new(tokens: &'t [Token<'a>]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parses one expression that must cover every token.
    pub fn parse(mut self) -> Result<Node<'a>, ParseError> {
        let root = self.parse_expression()?;
        if let Some(token) = self.peek() {
            return Err(ParseError::TrailingToken {
                found: token.slice.to_string(),
                span: token.span(),
            });
        }
        tracing::debug!(nodes = root.size(), "parsed expression");
        Ok(root)
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    /// Span of the next token, or just past the last one at end of input.
    fn here(&self) -> SourceSpan {
        match (self.peek(), self.tokens.last()) {
            (Some(token), _) => token.span(),
            (None, Some(last)) => last.end(),
            (None, None) => (0, 0).into(),
        }
    }

    fn next_operator(&mut self, ops: &[&str]) -> Option<Token<'a>> {
        let token = self.peek()?;
        if token.kind == TokenKind::Operator && ops.contains(&token.slice) {
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    fn parse_expression(&mut self) -> Result<Node<'a>, ParseError> {
        let mut node = self.parse_term()?;
        while let Some(op) = self.next_operator(&["+", "-"]) {
            let rhs = self.parse_term()?;
            node = Node::Binary {
                op: op.slice,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                offset: op.offset,
            };
        }
        Ok(node)
    }

    fn parse_term(&mut self) -> Result<Node<'a>, ParseError> {
        let mut node = self.parse_power()?;
        while let Some(op) = self.next_operator(&["*", "/"]) {
            let rhs = self.parse_power()?;
            node = Node::Binary {
                op: op.slice,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                offset: op.offset,
            };
        }
        Ok(node)
    }

    fn parse_power(&mut self) -> Result<Node<'a>, ParseError> {
        let base = self.parse_factor()?;
        match self.peek() {
            Some(caret) if caret.kind == TokenKind::Power => {
                self.pos += 1;
                let exponent = self.parse_factor()?;
                Ok(Node::Binary {
                    op: caret.slice,
                    lhs: Box::new(base),
                    rhs: Box::new(exponent),
                    offset: caret.offset,
                })
            }
            _ => Ok(base),
        }
    }

    fn parse_factor(&mut self) -> Result<Node<'a>, ParseError> {
        let Some(token) = self.advance() else {
            return Err(ParseError::UnexpectedEof { span: self.here() });
        };

        match token.kind {
            TokenKind::Number => {
                let mut node = Node::Number {
                    literal: token.slice,
                    offset: token.offset,
                };
                let mut chain = 0;
                while let Some(bang) = self.peek().filter(|t| t.kind == TokenKind::Factorial) {
                    chain += 1;
                    if self.depth + chain > self.max_depth {
                        return Err(ParseError::TooDeep {
                            limit: self.max_depth,
                            span: bang.span(),
                        });
                    }
                    self.pos += 1;
                    node = Node::Postfix {
                        op: bang.slice,
                        operand: Box::new(node),
                        offset: bang.offset,
                    };
                }
                Ok(node)
            }
            TokenKind::Function => {
                let open = match self.peek() {
                    Some(open) if open.kind == TokenKind::LeftParen => open,
                    _ => {
                        return Err(ParseError::ExpectedCallParen {
                            name: token.slice.to_string(),
                            span: self.here(),
                        })
                    }
                };
                self.pos += 1;
                let arg = self.parse_nested(open)?;
                if !self.eat(TokenKind::RightParen) {
                    return Err(ParseError::UnclosedCall { span: self.here() });
                }
                Ok(Node::Call {
                    name: token.slice,
                    arg: Box::new(arg),
                    offset: token.offset,
                })
            }
            TokenKind::LeftParen => {
                let node = self.parse_nested(token)?;
                if !self.eat(TokenKind::RightParen) {
                    return Err(ParseError::UnclosedGroup { span: token.span() });
                }
                Ok(node)
            }
            _ => Err(ParseError::UnexpectedToken {
                found: token.slice.to_string(),
                span: token.span(),
            }),
        }
    }

    /// Parses the expression inside a parenthesis, one level deeper.
    fn parse_nested(&mut self, open: Token<'a>) -> Result<Node<'a>, ParseError> {
        if self.depth >= self.max_depth {
            return Err(ParseError::TooDeep {
                limit: self.max_depth,
                span: open.span(),
            });
        }
        self.depth += 1;
        let node = self.parse_expression();
        self.depth -= 1;
        node
    }
}

/// Builds the expression tree for a token sequence.
pub fn parse<'a>(tokens: &[Token<'a>]) -> Result<Node<'a>, ParseError> {
    Parser::new(tokens).parse()
}
