//! Recursive-descent parser.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! statement  := expression (compare expression)?
//! compare    := '<' | '<=' | '>' | '>=' | '=' | '!=' | 'and' | 'or'
//! expression := term (('+' | '-' | '|') term)*
//! term       := factor (('*' | 'div' | 'mod') factor)*
//! factor     := sign? (literal | '(' statement ')' | function | path) predicates?
//! path       := '/'? step ('/' step)*
//! step       := '//'? ('.' '.'? | '@' name | '@*' | name | '*') predicates?
//! predicates := ('[' statement? ']')+
//! ```
//!
//! A statement carries at most one comparison; chains need parentheses. All
//! bracket groups attached to one step share a single nested scope, so their
//! predicates see the same iteration context. Input after a complete
//! statement is ignored.

use std::rc::Rc;

use log::debug;
use thiserror::Error;

use crate::ast::{AstNode, CompOp, NodeKind, StepSpec};
use crate::evaluator::{EvalScope, Expression};
use crate::lexer::{Lexer, Token};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
}

pub(crate) fn parse(text: &str, def_root_tag: Option<&str>) -> Result<Expression, ParseError> {
    let scope = EvalScope::new_top(def_root_tag.map(str::to_string));
    let mut parser = Parser::new(text);
    match parser.parse_statement(&scope)? {
        Some(node) => Ok(Expression::new(node)),
        None => Err(ParseError::Empty),
    }
}

struct Parser {
    lexer: Lexer,
    token: Token,
    token_start: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        let mut lexer = Lexer::new(text);
        let token = lexer.next_token();
        Parser {
            lexer,
            token,
            token_start: 0,
        }
    }

    fn advance(&mut self) {
        self.token_start = self.lexer.pos();
        self.token = self.lexer.next_token();
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        let message = message.into();
        let offset = self.token_start;
        debug!("parse error at offset {offset}: {message}");
        ParseError::Syntax { offset, message }
    }

    fn parse_statement(&mut self, scope: &Rc<EvalScope>) -> Result<Option<AstNode>, ParseError> {
        let Some(left) = self.parse_expression(scope)? else {
            return Ok(None);
        };
        let op = match self.token.clone() {
            Token::Char('<') => {
                self.advance();
                if self.token == Token::Char('=') {
                    self.advance();
                    Some(CompOp::LtEq)
                } else {
                    Some(CompOp::Lt)
                }
            }
            Token::Char('>') => {
                self.advance();
                if self.token == Token::Char('=') {
                    self.advance();
                    Some(CompOp::GtEq)
                } else {
                    Some(CompOp::Gt)
                }
            }
            Token::Char('=') => {
                self.advance();
                Some(CompOp::Eq)
            }
            Token::Char('!') => {
                self.advance();
                if self.token != Token::Char('=') {
                    return Err(self.err("expected `=` after `!`"));
                }
                self.advance();
                Some(CompOp::NotEq)
            }
            Token::Identifier(id) if id == "and" => {
                self.advance();
                Some(CompOp::And)
            }
            Token::Identifier(id) if id == "or" => {
                self.advance();
                Some(CompOp::Or)
            }
            _ => None,
        };
        let Some(op) = op else {
            return Ok(Some(left));
        };
        let Some(right) = self.parse_expression(scope)? else {
            return Err(self.err("expected expression after comparison"));
        };
        Ok(Some(AstNode::with_children(
            NodeKind::Comparison(op),
            scope,
            vec![left, right],
        )))
    }

    fn parse_expression(&mut self, scope: &Rc<EvalScope>) -> Result<Option<AstNode>, ParseError> {
        let Some(mut left) = self.parse_term(scope)? else {
            return Ok(None);
        };
        loop {
            let kind = match self.token {
                Token::Char('+') => NodeKind::Plus,
                Token::Char('-') => NodeKind::Minus,
                Token::Char('|') => NodeKind::Join,
                _ => break,
            };
            self.advance();
            let Some(right) = self.parse_term(scope)? else {
                return Err(self.err("expected operand"));
            };
            left = AstNode::with_children(kind, scope, vec![left, right]);
        }
        Ok(Some(left))
    }

    fn parse_term(&mut self, scope: &Rc<EvalScope>) -> Result<Option<AstNode>, ParseError> {
        let Some(mut left) = self.parse_factor(scope)? else {
            return Ok(None);
        };
        loop {
            let kind = match &self.token {
                Token::Char('*') => NodeKind::Multiply,
                Token::Identifier(id) if id == "div" => NodeKind::Divide,
                Token::Identifier(id) if id == "mod" => NodeKind::Modulus,
                _ => break,
            };
            self.advance();
            let Some(right) = self.parse_factor(scope)? else {
                return Err(self.err("expected operand"));
            };
            left = AstNode::with_children(kind, scope, vec![left, right]);
        }
        Ok(Some(left))
    }

    fn parse_factor(&mut self, scope: &Rc<EvalScope>) -> Result<Option<AstNode>, ParseError> {
        // A single sign is consumed here but only applies to numeric
        // literals.
        let mut sign = 1i64;
        match self.token {
            Token::Char('+') => self.advance(),
            Token::Char('-') => {
                sign = -1;
                self.advance();
            }
            _ => {}
        }

        let node = match self.token.clone() {
            Token::Eof => return Ok(None),
            Token::Char('(') => {
                self.advance();
                let Some(inner) = self.parse_statement(scope)? else {
                    return Ok(None);
                };
                if self.token != Token::Char(')') {
                    return Err(self.err("expected `)`"));
                }
                self.advance();
                inner
            }
            Token::Char(quote @ ('\'' | '"')) => {
                let Some(body) = self.lexer.read_string(quote) else {
                    return Err(self.err("unterminated string literal"));
                };
                self.advance();
                AstNode::new(NodeKind::StringLiteral(body), scope)
            }
            Token::Char('.' | '@' | '*' | '/') => {
                let Some(path) = self.parse_path(scope)? else {
                    return Err(self.err("expected path step"));
                };
                path
            }
            Token::Double(f) => {
                self.advance();
                AstNode::new(NodeKind::Float(sign as f64 * f), scope)
            }
            Token::Long(i) => {
                self.advance();
                AstNode::new(NodeKind::Integer(sign.wrapping_mul(i)), scope)
            }
            Token::Identifier(name) => {
                let start = self.token_start;
                self.advance();
                if self.token == Token::Char('(') {
                    self.advance();
                    self.parse_function(&name, scope)?
                } else {
                    // Not a call, so re-scan the identifier as a path start.
                    self.lexer.set_pos(start);
                    self.advance();
                    let Some(path) = self.parse_path(scope)? else {
                        return Err(self.err("expected path step"));
                    };
                    path
                }
            }
            _ => return Ok(None),
        };

        if self.token == Token::Char('[') {
            self.advance();
            let predicates = self.parse_predicates(scope)?;
            let mut children = vec![node];
            children.extend(predicates);
            return Ok(Some(AstNode::with_children(
                NodeKind::PredicateFilter,
                scope,
                children,
            )));
        }
        Ok(Some(node))
    }

    fn parse_path(&mut self, scope: &Rc<EvalScope>) -> Result<Option<AstNode>, ParseError> {
        let mut absolute = false;
        if self.token == Token::Char('/') {
            absolute = true;
            self.advance();
        }
        let mut path = AstNode::new(NodeKind::Path { absolute }, scope);
        if !absolute && scope.parent().is_none() {
            if let Some(tag) = scope.def_root_tag() {
                path.children
                    .push(AstNode::new(NodeKind::Step(StepSpec::named(tag, false, false)), scope));
            }
        }
        if !self.parse_step(scope, &mut path)? {
            return Ok(None);
        }
        while self.token == Token::Char('/') {
            self.advance();
            if !self.parse_step(scope, &mut path)? {
                break;
            }
        }
        Ok(Some(path))
    }

    fn parse_step(
        &mut self,
        scope: &Rc<EvalScope>,
        path: &mut AstNode,
    ) -> Result<bool, ParseError> {
        let mut recursive = false;
        if self.token == Token::Char('/') {
            // Second slash of `//`.
            recursive = true;
            self.advance();
        }
        let spec = match self.token.clone() {
            Token::Char('.') => {
                self.advance();
                if self.token == Token::Char('.') {
                    self.advance();
                }
                StepSpec::context()
            }
            Token::Char('@') => {
                self.advance();
                match self.token.clone() {
                    Token::Identifier(name) => {
                        self.advance();
                        StepSpec::named(name, true, recursive)
                    }
                    Token::Char('*') => {
                        self.advance();
                        StepSpec::named("*", true, recursive)
                    }
                    _ => return Err(self.err("expected attribute name after `@`")),
                }
            }
            Token::Char('*') => {
                self.advance();
                StepSpec::named("*", false, recursive)
            }
            Token::Identifier(name) => {
                self.advance();
                StepSpec::named(name, false, recursive)
            }
            _ => return Ok(false),
        };

        let step = AstNode::new(NodeKind::Step(spec), scope);
        let node = if self.token == Token::Char('[') {
            self.advance();
            let predicates = self.parse_predicates(scope)?;
            let mut children = vec![step];
            children.extend(predicates);
            AstNode::with_children(NodeKind::PredicateFilter, scope, children)
        } else {
            step
        };
        path.children.push(node);
        Ok(true)
    }

    /// Parse one or more `[...]` groups, the first `[` already consumed.
    /// Every group at this position shares one nested scope.
    fn parse_predicates(&mut self, scope: &Rc<EvalScope>) -> Result<Vec<AstNode>, ParseError> {
        let child_scope = EvalScope::nested(scope);
        let mut predicates = Vec::new();
        loop {
            // An empty bracket group is tolerated and filters nothing.
            if let Some(predicate) = self.parse_statement(&child_scope)? {
                predicates.push(predicate);
            }
            if self.token != Token::Char(']') {
                return Err(self.err("expected `]`"));
            }
            self.advance();
            if self.token == Token::Char('[') {
                self.advance();
            } else {
                break;
            }
        }
        Ok(predicates)
    }

    fn parse_function(
        &mut self,
        name: &str,
        scope: &Rc<EvalScope>,
    ) -> Result<AstNode, ParseError> {
        let mut args = Vec::new();
        loop {
            match self.token {
                Token::Eof => return Err(self.err("unterminated function call")),
                Token::Char(')') => {
                    self.advance();
                    break;
                }
                Token::Char(',') => self.advance(),
                _ => match self.parse_statement(scope)? {
                    Some(arg) => args.push(arg),
                    None => return Err(self.err("expected function argument")),
                },
            }
        }
        let Some(kind) = function_kind(name) else {
            debug!("unknown function `{name}`");
            return Err(ParseError::UnknownFunction(name.to_string()));
        };
        Ok(AstNode::with_children(kind, scope, args))
    }
}

fn function_kind(name: &str) -> Option<NodeKind> {
    let kind = match name {
        "concat" => NodeKind::Concat,
        "contains" => NodeKind::Contains,
        "count" => NodeKind::Count,
        "current-date" => NodeKind::CurrentDate,
        "current-time" => NodeKind::CurrentTime,
        "escape-uri" => NodeKind::EscapeUri,
        "hours-from-time" => NodeKind::HoursFromTime,
        "last" => NodeKind::Last,
        "minutes-from-time" => NodeKind::MinutesFromTime,
        "not" => NodeKind::Not,
        "number" => NodeKind::NumberFn,
        "position" => NodeKind::Position,
        "seconds-from-time" => NodeKind::SecondsFromTime,
        "sort" => NodeKind::Sort,
        "starts-with" => NodeKind::StartsWith,
        "string-join" => NodeKind::StringJoin,
        "string-length" => NodeKind::StringLength,
        "subsequence" => NodeKind::SubSequence,
        "substring-after" => NodeKind::SubstringAfter,
        "substring-before" => NodeKind::SubstringBefore,
        "tokenize" => NodeKind::Tokenize,
        _ => return None,
    };
    Some(kind)
}
