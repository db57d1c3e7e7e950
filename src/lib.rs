//! An XPath-like expression language for querying trees of named nodes with
//! attributes.
//!
//! An expression is compiled once and evaluated many times against a root
//! node, producing a boolean, integer, float, string or node sequence
//! depending on how the result is read:
//!
//! ```
//! use treepath::{SimpleNode, compile};
//!
//! let playlist = SimpleNode::new("playlist");
//! let item = SimpleNode::new("item");
//! item.set_attribute("id", "1");
//! playlist.append_child(item);
//!
//! let expr = compile("count(item[@id])").unwrap();
//! expr.set_root(playlist);
//! assert_eq!(expr.as_int(), 1);
//! ```
//!
//! Compilation reports malformed input as a [`ParseError`]; evaluation never
//! fails, it degrades to `0`, `""`, `false` or an empty sequence instead.
//! Documents are anything implementing [`DocumentNode`]; [`SimpleNode`] is a
//! bundled in-memory implementation.

pub mod ast;
pub mod clock;
pub mod evaluator;
mod functions;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod value;

pub use ast::{AstNode, CompOp, NodeKind, StepSpec};
pub use clock::{Clock, FixedClock, SystemClock};
pub use evaluator::{EvalScope, Expression, ExprType};
pub use lexer::{Lexer, Token};
pub use node::{DocumentNode, NodeRef, SimpleNode, same_node};
pub use parser::ParseError;
pub use value::{Attribute, NodeValue, Sequence};

/// Compile an expression. The result is unbound; call
/// [`Expression::set_root`] before evaluating against a document.
pub fn compile(text: &str) -> Result<Expression, ParseError> {
    parser::parse(text, None)
}

/// Compile with a default root tag: top-level relative paths are resolved
/// as if prefixed with `root_tag/`.
pub fn compile_with_root(text: &str, root_tag: &str) -> Result<Expression, ParseError> {
    parser::parse(text, Some(root_tag))
}
