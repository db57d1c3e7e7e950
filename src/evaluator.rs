//! Evaluation scopes, coercions and the core tree walk.
//!
//! Evaluation never fails: a type mismatch or missing context degrades to
//! `0`, `0.0`, `""`, `false` or an empty sequence. The result of a coercion
//! is memoized per node, stamped with the scope generation it was computed
//! in; rebinding the root bumps the generation and every stale cache entry
//! is recomputed on the next read.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{AstNode, Cache, Cached, CompOp, NodeKind};
use crate::clock::{Clock, SystemClock};
use crate::functions;
use crate::node::NodeRef;
use crate::value::{NodeValue, Sequence};

struct RootState {
    root: NodeValue,
    generation: u32,
}

/// Shared evaluation context for a compiled expression.
///
/// One scope exists per expression plus one per predicate nesting level.
/// The scope holds the root item the expression is bound to, the sequence a
/// path step or predicate is currently iterating (the process list), and at
/// the outermost level the injected clock and the configured default root
/// tag.
pub struct EvalScope {
    def_root_tag: Option<String>,
    state: RefCell<RootState>,
    process_list: RefCell<Option<Rc<Sequence>>>,
    parent: Option<Rc<EvalScope>>,
    clock: RefCell<Option<Rc<dyn Clock>>>,
}

impl EvalScope {
    pub fn new_top(def_root_tag: Option<String>) -> Rc<Self> {
        Rc::new(EvalScope {
            def_root_tag,
            state: RefCell::new(RootState {
                root: NodeValue::default(),
                generation: 1,
            }),
            process_list: RefCell::new(None),
            parent: None,
            clock: RefCell::new(Some(Rc::new(SystemClock))),
        })
    }

    pub fn nested(parent: &Rc<EvalScope>) -> Rc<Self> {
        Rc::new(EvalScope {
            def_root_tag: None,
            state: RefCell::new(RootState {
                root: NodeValue::default(),
                generation: 1,
            }),
            process_list: RefCell::new(None),
            parent: Some(Rc::clone(parent)),
            clock: RefCell::new(None),
        })
    }

    pub fn parent(&self) -> Option<&Rc<EvalScope>> {
        self.parent.as_ref()
    }

    pub fn def_root_tag(&self) -> Option<String> {
        self.def_root_tag.clone()
    }

    pub fn generation(&self) -> u32 {
        self.state.borrow().generation
    }

    pub fn root(&self) -> NodeValue {
        self.state.borrow().root.clone()
    }

    /// Rebind the root item. Bumps the generation, so every result cached
    /// against this scope is recomputed on the next read.
    pub fn set_root(&self, root: NodeValue) {
        let mut state = self.state.borrow_mut();
        state.root = root;
        state.generation = state.generation.wrapping_add(1);
    }

    pub fn process_list(&self) -> Option<Rc<Sequence>> {
        self.process_list.borrow().clone()
    }

    /// Install `list` as the sequence under iteration for the duration of
    /// `f`, restoring the previous list afterwards.
    pub fn with_process_list<T>(&self, list: Rc<Sequence>, f: impl FnOnce() -> T) -> T {
        let prev = self.process_list.replace(Some(list));
        let result = f();
        *self.process_list.borrow_mut() = prev;
        result
    }

    fn top(&self) -> &EvalScope {
        let mut cur = self;
        while let Some(parent) = &cur.parent {
            cur = parent.as_ref();
        }
        cur
    }

    /// The root of the outermost scope (what absolute paths start from).
    pub fn top_root(&self) -> NodeValue {
        self.top().root()
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        self.top()
            .clock
            .borrow()
            .as_ref()
            .map(Rc::clone)
            .unwrap_or_else(|| Rc::new(SystemClock))
    }

    pub fn set_clock(&self, clock: Rc<dyn Clock>) {
        *self.top().clock.borrow_mut() = Some(clock);
    }
}

/// The static result type of a node, used to pick arithmetic and comparison
/// behavior. Sequence-valued nodes type as whatever their collapsed string
/// looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprType {
    Unknown,
    Bool,
    Integer,
    Float,
    String,
}

fn classify(s: &str) -> ExprType {
    let t = s.trim();
    if t.eq_ignore_ascii_case("true") || t.eq_ignore_ascii_case("false") {
        ExprType::Bool
    } else if t.parse::<i64>().is_ok() {
        ExprType::Integer
    } else if t.parse::<f64>().is_ok() {
        ExprType::Float
    } else {
        ExprType::String
    }
}

/// Parse a leading integer off a trimmed string, `0` when there is none.
pub(crate) fn str_to_int(s: &str) -> i64 {
    let s = s.trim();
    let mut end = 0;
    for (i, ch) in s.char_indices() {
        if ch.is_ascii_digit() || (i == 0 && (ch == '+' || ch == '-')) {
            end = i + ch.len_utf8();
        } else {
            break;
        }
    }
    s[..end].parse().unwrap_or(0)
}

/// Parse a leading decimal number off a trimmed string, `0.0` when there is
/// none.
pub(crate) fn str_to_float(s: &str) -> f64 {
    let s = s.trim();
    let mut end = 0;
    let mut seen_dot = false;
    for (i, ch) in s.char_indices() {
        if ch.is_ascii_digit() || (i == 0 && (ch == '+' || ch == '-')) {
            end = i + ch.len_utf8();
        } else if ch == '.' && !seen_dot {
            seen_dot = true;
            end = i + 1;
        } else {
            break;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}

fn string_bool(s: &str) -> bool {
    let t = s.trim();
    if t.eq_ignore_ascii_case("true") {
        true
    } else if t.eq_ignore_ascii_case("false") {
        false
    } else {
        str_to_int(t) != 0
    }
}

/// Render a float the way expression results are printed: integral values
/// without a fraction, others with up to six fractional digits.
pub(crate) fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        let mut s = format!("{f:.6}");
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}

impl AstNode {
    pub fn type_of(&self) -> ExprType {
        match &self.kind {
            NodeKind::Integer(_) => ExprType::Integer,
            NodeKind::Float(_) => ExprType::Float,
            NodeKind::StringLiteral(_)
            | NodeKind::Concat
            | NodeKind::EscapeUri
            | NodeKind::StringJoin
            | NodeKind::SubstringAfter
            | NodeKind::SubstringBefore
            | NodeKind::CurrentTime
            | NodeKind::CurrentDate => ExprType::String,
            NodeKind::Comparison(_) | NodeKind::Contains | NodeKind::Not | NodeKind::StartsWith => {
                ExprType::Bool
            }
            NodeKind::Count
            | NodeKind::Last
            | NodeKind::NumberFn
            | NodeKind::Position
            | NodeKind::StringLength
            | NodeKind::HoursFromTime
            | NodeKind::MinutesFromTime
            | NodeKind::SecondsFromTime => ExprType::Integer,
            NodeKind::Multiply | NodeKind::Divide | NodeKind::Plus | NodeKind::Minus => {
                self.binary_num_type()
            }
            NodeKind::Modulus => match self.child_types() {
                Some((ExprType::Integer, ExprType::Integer))
                | Some((ExprType::Float, ExprType::Float)) => ExprType::Integer,
                _ => ExprType::Unknown,
            },
            _ => classify(&self.as_string()),
        }
    }

    fn child_types(&self) -> Option<(ExprType, ExprType)> {
        match (self.children.first(), self.children.get(1)) {
            (Some(a), Some(b)) => Some((a.type_of(), b.type_of())),
            _ => None,
        }
    }

    fn binary_num_type(&self) -> ExprType {
        match self.child_types() {
            Some((ExprType::Integer, ExprType::Integer)) => ExprType::Integer,
            Some((ExprType::Integer, ExprType::Float))
            | Some((ExprType::Float, ExprType::Integer))
            | Some((ExprType::Float, ExprType::Float)) => ExprType::Float,
            _ => ExprType::Unknown,
        }
    }

    fn cached_bool(&self, compute: fn(&AstNode) -> bool) -> bool {
        let generation = self.scope.generation();
        {
            let cache = self.cache.borrow();
            if cache.stamp == generation {
                if let Cached::Bool(b) = cache.value {
                    return b;
                }
            }
        }
        let b = compute(self);
        *self.cache.borrow_mut() = Cache {
            stamp: generation,
            value: Cached::Bool(b),
        };
        b
    }

    fn cached_int(&self, compute: fn(&AstNode) -> i64) -> i64 {
        let generation = self.scope.generation();
        {
            let cache = self.cache.borrow();
            if cache.stamp == generation {
                if let Cached::Int(i) = cache.value {
                    return i;
                }
            }
        }
        let i = compute(self);
        *self.cache.borrow_mut() = Cache {
            stamp: generation,
            value: Cached::Int(i),
        };
        i
    }

    fn cached_str(&self, compute: fn(&AstNode) -> String) -> String {
        let generation = self.scope.generation();
        {
            let cache = self.cache.borrow();
            if cache.stamp == generation {
                if let Cached::Str(s) = &cache.value {
                    return s.clone();
                }
            }
        }
        let s = compute(self);
        *self.cache.borrow_mut() = Cache {
            stamp: generation,
            value: Cached::Str(s.clone()),
        };
        s
    }

    /// Boolean meaning of a bare number: inside a predicate it is a
    /// positional test (is the current root the i-th item of the sequence
    /// under iteration), outside it is plain non-zero.
    fn positional_bool(&self) -> bool {
        let i = self.as_int();
        let Some(parent) = self.scope.parent() else {
            return i != 0;
        };
        let Some(list) = parent.process_list() else {
            return false;
        };
        if i < 1 {
            return false;
        }
        match list.get((i - 1) as usize) {
            Some(item) => item.same_as(&self.scope.root()),
            None => false,
        }
    }

    fn comparison_bool(&self, op: CompOp) -> bool {
        let (Some(a), Some(b)) = (self.children.first(), self.children.get(1)) else {
            return false;
        };
        match op {
            CompOp::Lt => a.as_float() < b.as_float(),
            CompOp::Gt => a.as_float() > b.as_float(),
            CompOp::LtEq => a.as_int() <= b.as_int(),
            CompOp::GtEq => a.as_int() >= b.as_int(),
            CompOp::Eq => {
                if a.type_of() == ExprType::String || b.type_of() == ExprType::String {
                    a.as_string() == b.as_string()
                } else {
                    a.as_int() == b.as_int()
                }
            }
            CompOp::NotEq => a.as_int() != b.as_int(),
            // Both operands always evaluate; `and`/`or` do not short-circuit.
            CompOp::And => {
                let x = a.as_bool();
                let y = b.as_bool();
                x && y
            }
            CompOp::Or => {
                let x = a.as_bool();
                let y = b.as_bool();
                x || y
            }
        }
    }

    pub fn as_bool(&self) -> bool {
        match &self.kind {
            NodeKind::Integer(_)
            | NodeKind::Plus
            | NodeKind::Minus
            | NodeKind::Multiply
            | NodeKind::Divide
            | NodeKind::Modulus
            | NodeKind::Count
            | NodeKind::Last
            | NodeKind::NumberFn
            | NodeKind::Position
            | NodeKind::StringLength
            | NodeKind::HoursFromTime
            | NodeKind::MinutesFromTime
            | NodeKind::SecondsFromTime => self.positional_bool(),
            NodeKind::Float(_) => false,
            NodeKind::Comparison(op) => self.comparison_bool(*op),
            NodeKind::Contains => self.cached_bool(functions::contains),
            NodeKind::Not => self.cached_bool(functions::not),
            NodeKind::StartsWith => self.cached_bool(functions::starts_with),
            kind if kind.is_sequence() => {
                if self.scope.parent().is_some() {
                    !self.as_sequence().is_empty()
                } else {
                    string_bool(&self.as_string())
                }
            }
            _ => string_bool(&self.as_string()),
        }
    }

    fn bin_int(&self, int_op: fn(i64, i64) -> i64, float_op: fn(f64, f64) -> f64) -> i64 {
        let (Some(a), Some(b)) = (self.children.first(), self.children.get(1)) else {
            return 0;
        };
        match (a.type_of(), b.type_of()) {
            (ExprType::Integer, ExprType::Integer) => int_op(a.as_int(), b.as_int()),
            (ExprType::Integer, ExprType::Float)
            | (ExprType::Float, ExprType::Integer)
            | (ExprType::Float, ExprType::Float) => float_op(a.as_float(), b.as_float()) as i64,
            _ => 0,
        }
    }

    pub fn as_int(&self) -> i64 {
        match &self.kind {
            NodeKind::Integer(i) => *i,
            NodeKind::Float(f) => *f as i64,
            NodeKind::StringLiteral(s) => str_to_int(s),
            NodeKind::Multiply => self.bin_int(i64::wrapping_mul, |a, b| a * b),
            NodeKind::Divide => self.bin_int(
                |a, b| a.checked_div(b).unwrap_or(0),
                |a, b| if b == 0.0 { 0.0 } else { a / b },
            ),
            NodeKind::Plus => self.bin_int(i64::wrapping_add, |a, b| a + b),
            NodeKind::Minus => {
                let (Some(a), Some(b)) = (self.children.first(), self.children.get(1)) else {
                    return 0;
                };
                a.as_int().wrapping_sub(b.as_int())
            }
            NodeKind::Modulus => {
                let (Some(a), Some(b)) = (self.children.first(), self.children.get(1)) else {
                    return 0;
                };
                match (a.type_of(), b.type_of()) {
                    (ExprType::Integer, ExprType::Integer) | (ExprType::Float, ExprType::Float) => {
                        a.as_int().checked_rem(b.as_int()).unwrap_or(0)
                    }
                    _ => 0,
                }
            }
            NodeKind::Count => self.cached_int(functions::count),
            NodeKind::HoursFromTime => self.cached_int(functions::hours_from_time),
            NodeKind::MinutesFromTime => self.cached_int(functions::minutes_from_time),
            NodeKind::SecondsFromTime => self.cached_int(functions::seconds_from_time),
            NodeKind::Last => self.cached_int(functions::last),
            NodeKind::NumberFn => self.cached_int(functions::number),
            NodeKind::Position => self.cached_int(functions::position),
            NodeKind::StringLength => self.cached_int(functions::string_length),
            NodeKind::Comparison(_) | NodeKind::Contains | NodeKind::Not | NodeKind::StartsWith => {
                self.as_bool() as i64
            }
            _ => str_to_int(&self.as_string()),
        }
    }

    fn bin_float(&self, op: fn(f64, f64) -> f64) -> f64 {
        let (Some(a), Some(b)) = (self.children.first(), self.children.get(1)) else {
            return 0.0;
        };
        op(a.as_float(), b.as_float())
    }

    pub fn as_float(&self) -> f64 {
        match &self.kind {
            NodeKind::Integer(i) => *i as f64,
            NodeKind::Float(f) => *f,
            NodeKind::StringLiteral(s) => str_to_float(s),
            NodeKind::Multiply => self.bin_float(|a, b| a * b),
            NodeKind::Divide => self.bin_float(|a, b| if b == 0.0 { 0.0 } else { a / b }),
            NodeKind::Plus => self.bin_float(|a, b| a + b),
            NodeKind::Minus => self.bin_float(|a, b| a - b),
            NodeKind::Modulus => self.as_int() as f64,
            kind if kind.is_sequence() => str_to_float(&self.as_string()),
            _ => match self.type_of() {
                ExprType::Integer | ExprType::Bool => self.as_int() as f64,
                _ => str_to_float(&self.as_string()),
            },
        }
    }

    pub fn as_string(&self) -> String {
        match &self.kind {
            NodeKind::Integer(_) => self.as_int().to_string(),
            NodeKind::Float(f) => format_float(*f),
            NodeKind::StringLiteral(s) => s.clone(),
            NodeKind::Multiply | NodeKind::Divide | NodeKind::Plus | NodeKind::Minus => {
                match self.type_of() {
                    ExprType::Integer => self.as_int().to_string(),
                    ExprType::Float => format_float(self.as_float()),
                    _ => String::new(),
                }
            }
            NodeKind::Modulus => match self.type_of() {
                ExprType::Integer => self.as_int().to_string(),
                _ => String::new(),
            },
            NodeKind::Comparison(_) | NodeKind::Contains | NodeKind::Not | NodeKind::StartsWith => {
                if self.as_bool() { "true" } else { "false" }.to_string()
            }
            NodeKind::Count
            | NodeKind::Last
            | NodeKind::NumberFn
            | NodeKind::Position
            | NodeKind::StringLength
            | NodeKind::HoursFromTime
            | NodeKind::MinutesFromTime
            | NodeKind::SecondsFromTime => self.as_int().to_string(),
            NodeKind::Concat => self.cached_str(functions::concat),
            NodeKind::EscapeUri => self.cached_str(functions::escape_uri),
            NodeKind::StringJoin => self.cached_str(functions::string_join),
            NodeKind::SubstringBefore => self.cached_str(functions::substring_before),
            NodeKind::SubstringAfter => self.cached_str(functions::substring_after),
            NodeKind::CurrentTime => self.cached_str(functions::current_time),
            NodeKind::CurrentDate => self.cached_str(functions::current_date),
            _ => self.cached_str(sequence_string),
        }
    }

    /// Evaluate to a sequence. Scalar nodes wrap their string value as a
    /// one-item sequence.
    pub fn as_sequence(&self) -> Sequence {
        match &self.kind {
            NodeKind::Path { absolute } => self.eval_path(*absolute),
            NodeKind::Step(_) => self.eval_step(),
            NodeKind::PredicateFilter => self.eval_predicates(),
            NodeKind::Join => {
                let (Some(a), Some(b)) = (self.children.first(), self.children.get(1)) else {
                    return Sequence::new();
                };
                let mut seq = a.as_sequence();
                seq.splice(None, b.as_sequence());
                seq
            }
            NodeKind::Sort => functions::sort(self),
            NodeKind::SubSequence => functions::subsequence(self),
            NodeKind::Tokenize => functions::tokenize(self),
            _ => {
                let mut seq = Sequence::new();
                seq.append(NodeValue::literal(self.as_string()));
                seq
            }
        }
    }

    fn eval_path(&self, absolute: bool) -> Sequence {
        let seed = if absolute {
            self.scope.top_root()
        } else {
            self.scope.root()
        };
        let mut current = Sequence::new();
        current.append(seed);
        for step in &self.children {
            current = step
                .scope
                .with_process_list(Rc::new(current), || step.as_sequence());
        }
        current
    }

    fn eval_step(&self) -> Sequence {
        let NodeKind::Step(spec) = &self.kind else {
            return Sequence::new();
        };
        let Some(list) = self.scope.process_list() else {
            return Sequence::new();
        };
        let mut result = Sequence::new();
        let mut pending = Sequence::new();
        for item in list.iter() {
            // Node-less items (literal strings) never match a step.
            let Some(node) = &item.node else {
                continue;
            };
            if spec.context_node {
                // `.` denotes the current root; meaningless outside a
                // predicate.
                if self.scope.parent().is_some() {
                    result.append(self.scope.root());
                }
                continue;
            }
            if spec.is_attr {
                if node.is_element() {
                    for attr in node.attributes() {
                        if spec.matches(&attr.name) {
                            result.append(NodeValue::attribute(node.clone(), attr));
                        }
                    }
                }
                if spec.recursive {
                    for child in node.children() {
                        pending.append(NodeValue::node(child));
                    }
                }
            } else {
                for child in node.children() {
                    if spec.matches(&child.name()) {
                        result.append(NodeValue::node(child.clone()));
                    }
                    if spec.recursive {
                        pending.append(NodeValue::node(child));
                    }
                }
            }
        }
        if spec.recursive && !pending.is_empty() {
            // Direct matches come before matches found deeper in the tree.
            let deeper = self
                .scope
                .with_process_list(Rc::new(pending), || self.eval_step());
            result.splice(None, deeper);
        }
        result
    }

    fn eval_predicates(&self) -> Sequence {
        let Some(base) = self.children.first() else {
            return Sequence::new();
        };
        let mut current = base.as_sequence();
        for pred in self.children.iter().skip(1) {
            let list = Rc::new(current);
            current = self.scope.with_process_list(Rc::clone(&list), || {
                let mut kept = Sequence::new();
                for item in list.iter() {
                    pred.scope.set_root(item.clone());
                    if pred.as_bool() {
                        kept.append(item.clone());
                    }
                }
                kept
            });
        }
        current
    }
}

fn sequence_string(node: &AstNode) -> String {
    let seq = node.as_sequence();
    if seq.len() == 1 {
        seq.first().map(|v| v.value()).unwrap_or_default()
    } else {
        seq.len().to_string()
    }
}

/// A compiled expression, bound to a root item.
pub struct Expression {
    node: AstNode,
}

impl Expression {
    pub(crate) fn new(node: AstNode) -> Self {
        Expression { node }
    }

    pub fn as_bool(&self) -> bool {
        self.node.as_bool()
    }

    pub fn as_int(&self) -> i64 {
        self.node.as_int()
    }

    pub fn as_float(&self) -> f64 {
        self.node.as_float()
    }

    pub fn as_string(&self) -> String {
        self.node.as_string()
    }

    pub fn as_sequence(&self) -> Sequence {
        self.node.as_sequence()
    }

    /// Bind the expression to a document node.
    pub fn set_root(&self, node: NodeRef) {
        self.node.scope.set_root(NodeValue::node(node));
    }

    pub fn set_root_value(&self, value: NodeValue) {
        self.node.scope.set_root(value);
    }

    pub fn set_clock(&self, clock: Rc<dyn Clock>) {
        self.node.scope.set_clock(clock);
    }
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.node)
    }
}
