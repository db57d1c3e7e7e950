//! Abstract syntax tree for the expression language.
//!
//! Every node carries its evaluation scope (shared through `Rc`, nested one
//! level per predicate) and a per-node result cache stamped with the scope
//! generation that produced it. Rebinding the root bumps the generation and
//! silently invalidates every cached result.
//!
//! The `Debug` rendering prints the tree in prefix form with bracketed
//! children, e.g. `1 + 2 * 3` renders as
//! `+ [ Integer 1, * [ Integer 2, Integer 3 ] ]`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::evaluator::EvalScope;

/// Comparison and logical operators. A statement carries at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Lt,
    LtEq,
    Eq,
    NotEq,
    Gt,
    GtEq,
    And,
    Or,
}

/// One step of a location path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    pub name: String,
    /// Wildcard step (`*` or `@*`): matches any name.
    pub any_node: bool,
    /// Context step (`.` or `..`): re-appends the scope root.
    pub context_node: bool,
    /// Attribute step (`@name`).
    pub is_attr: bool,
    /// Descend through all descendants (`//`).
    pub recursive: bool,
}

impl StepSpec {
    pub fn context() -> Self {
        StepSpec {
            name: String::new(),
            any_node: false,
            context_node: true,
            is_attr: false,
            recursive: false,
        }
    }

    pub fn named(name: impl Into<String>, is_attr: bool, recursive: bool) -> Self {
        let name = name.into();
        StepSpec {
            any_node: name == "*",
            name,
            context_node: false,
            is_attr,
            recursive,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.any_node || self.name == name
    }
}

/// The kind of an AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Integer(i64),
    Float(f64),
    StringLiteral(String),
    Step(StepSpec),
    Path { absolute: bool },
    PredicateFilter,
    Multiply,
    Divide,
    Modulus,
    Plus,
    Minus,
    Join,
    Comparison(CompOp),
    Concat,
    Contains,
    Count,
    StartsWith,
    Not,
    Last,
    NumberFn,
    Position,
    StringLength,
    StringJoin,
    SubstringBefore,
    SubstringAfter,
    CurrentTime,
    CurrentDate,
    EscapeUri,
    Sort,
    SubSequence,
    Tokenize,
    HoursFromTime,
    MinutesFromTime,
    SecondsFromTime,
}

impl NodeKind {
    /// Kinds whose natural result is a sequence rather than a scalar.
    pub fn is_sequence(&self) -> bool {
        matches!(
            self,
            NodeKind::Step(_)
                | NodeKind::Path { .. }
                | NodeKind::PredicateFilter
                | NodeKind::Join
                | NodeKind::Sort
                | NodeKind::SubSequence
                | NodeKind::Tokenize
        )
    }
}

/// A memoized scalar result, stamped with the generation it was computed in.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Cached {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Default)]
pub struct Cache {
    pub stamp: u32,
    pub value: Cached,
}

/// One node of the expression tree.
pub struct AstNode {
    pub kind: NodeKind,
    pub children: Vec<AstNode>,
    pub scope: Rc<EvalScope>,
    pub cache: RefCell<Cache>,
}

impl AstNode {
    pub fn new(kind: NodeKind, scope: &Rc<EvalScope>) -> Self {
        AstNode {
            kind,
            children: Vec::new(),
            scope: Rc::clone(scope),
            cache: RefCell::new(Cache::default()),
        }
    }

    pub fn with_children(kind: NodeKind, scope: &Rc<EvalScope>, children: Vec<AstNode>) -> Self {
        AstNode {
            kind,
            children,
            scope: Rc::clone(scope),
            cache: RefCell::new(Cache::default()),
        }
    }

    fn label(&self) -> String {
        match &self.kind {
            NodeKind::Integer(i) => format!("Integer {i}"),
            NodeKind::Float(v) => format!("Float {v}"),
            NodeKind::StringLiteral(s) => format!("StringLiteral {s}"),
            NodeKind::Step(step) => {
                if step.context_node {
                    "Step .".to_string()
                } else if step.is_attr {
                    format!("Step @{}", step.name)
                } else {
                    format!("Step {}", step.name)
                }
            }
            NodeKind::Path { .. } => "Path".to_string(),
            NodeKind::PredicateFilter => "Predicate".to_string(),
            NodeKind::Multiply => "*".to_string(),
            NodeKind::Divide => "/".to_string(),
            NodeKind::Modulus => "%".to_string(),
            NodeKind::Plus => "+".to_string(),
            NodeKind::Minus => "-".to_string(),
            NodeKind::Join => "|".to_string(),
            NodeKind::Comparison(op) => match op {
                CompOp::Lt => "<",
                CompOp::LtEq => "<=",
                CompOp::Eq => "==",
                CompOp::NotEq => "!=",
                CompOp::Gt => ">",
                CompOp::GtEq => ">=",
                CompOp::And => "&&",
                CompOp::Or => "||",
            }
            .to_string(),
            NodeKind::Concat => "concat".to_string(),
            NodeKind::Contains => "contains".to_string(),
            NodeKind::Count => "count".to_string(),
            NodeKind::StartsWith => "starts-with".to_string(),
            NodeKind::Not => "not".to_string(),
            NodeKind::Last => "last".to_string(),
            NodeKind::NumberFn => "number".to_string(),
            NodeKind::Position => "position".to_string(),
            NodeKind::StringLength => "string-length".to_string(),
            NodeKind::StringJoin => "string-join".to_string(),
            NodeKind::SubstringBefore => "substring-before".to_string(),
            NodeKind::SubstringAfter => "substring-after".to_string(),
            NodeKind::CurrentTime => "current-time".to_string(),
            NodeKind::CurrentDate => "current-date".to_string(),
            NodeKind::EscapeUri => "escape-uri".to_string(),
            NodeKind::Sort => "sort".to_string(),
            NodeKind::SubSequence => "subsequence".to_string(),
            NodeKind::Tokenize => "tokenize".to_string(),
            NodeKind::HoursFromTime => "hours-from-time".to_string(),
            NodeKind::MinutesFromTime => "minutes-from-time".to_string(),
            NodeKind::SecondsFromTime => "seconds-from-time".to_string(),
        }
    }
}

impl fmt::Debug for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())?;
        if !self.children.is_empty() {
            write!(f, " [ ")?;
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{child:?}")?;
            }
            write!(f, " ]")?;
        }
        Ok(())
    }
}
