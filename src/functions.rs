//! The built-in function library.
//!
//! Each function takes the AST node whose children are its arguments.
//! Missing arguments fall back to context defaults or to the degraded
//! result, never to an error.

use std::cmp::Ordering;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;

use crate::ast::AstNode;
use crate::evaluator::{Expression, str_to_int};
use crate::value::{NodeValue, Sequence};

pub(crate) fn concat(node: &AstNode) -> String {
    node.children.iter().map(|c| c.as_string()).collect()
}

pub(crate) fn contains(node: &AstNode) -> bool {
    match (node.children.first(), node.children.get(1)) {
        (Some(a), Some(b)) => a.as_string().contains(&b.as_string()),
        _ => false,
    }
}

pub(crate) fn starts_with(node: &AstNode) -> bool {
    match (node.children.first(), node.children.get(1)) {
        (Some(a), Some(b)) => a.as_string().starts_with(&b.as_string()),
        // With one argument the current root is tested against it.
        (Some(a), None) if node.scope.parent().is_some() => {
            node.scope.root().value().starts_with(&a.as_string())
        }
        _ => false,
    }
}

pub(crate) fn not(node: &AstNode) -> bool {
    match node.children.first() {
        Some(arg) => !arg.as_bool(),
        None => true,
    }
}

pub(crate) fn count(node: &AstNode) -> i64 {
    match node.children.first() {
        Some(arg) => arg.as_sequence().len() as i64,
        None => 0,
    }
}

pub(crate) fn hours_from_time(node: &AstNode) -> i64 {
    let Some(arg) = node.children.first() else {
        return 0;
    };
    let time = arg.as_string();
    match time.find(':') {
        Some(i) => str_to_int(&time[..i]),
        None => 0,
    }
}

pub(crate) fn minutes_from_time(node: &AstNode) -> i64 {
    let Some(arg) = node.children.first() else {
        return 0;
    };
    let time = arg.as_string();
    let mut parts = time.split(':');
    parts.next();
    let minutes = parts.next();
    // The minutes field only counts when a seconds field follows it.
    match (minutes, parts.next()) {
        (Some(minutes), Some(_)) => str_to_int(minutes),
        _ => 0,
    }
}

pub(crate) fn seconds_from_time(node: &AstNode) -> i64 {
    let Some(arg) = node.children.first() else {
        return 0;
    };
    let time = arg.as_string();
    let mut parts = time.split(':');
    parts.next();
    parts.next();
    // The seconds field must be followed by a zone separated by a space,
    // as `current-time` formats it.
    match parts.next().and_then(|rest| rest.split_once(' ')) {
        Some((seconds, _)) => str_to_int(seconds),
        None => 0,
    }
}

pub(crate) fn last(node: &AstNode) -> i64 {
    node.scope
        .parent()
        .and_then(|parent| parent.process_list())
        .map(|list| list.len() as i64)
        .unwrap_or(0)
}

pub(crate) fn number(node: &AstNode) -> i64 {
    match node.children.first() {
        Some(arg) => arg.as_int(),
        None => 0,
    }
}

/// 1-based index of the current root in the sequence under iteration. When
/// the root is not in the list the list length is reported; outside a
/// predicate the result is 0.
pub(crate) fn position(node: &AstNode) -> i64 {
    let Some(list) = node.scope.parent().and_then(|parent| parent.process_list()) else {
        return 0;
    };
    let root = node.scope.root();
    let mut index = 0i64;
    for item in list.iter() {
        index += 1;
        if item.same_as(&root) {
            return index;
        }
    }
    index
}

pub(crate) fn string_length(node: &AstNode) -> i64 {
    if let Some(arg) = node.children.first() {
        arg.as_string().chars().count() as i64
    } else if node.scope.parent().is_some() {
        node.scope.root().value().chars().count() as i64
    } else {
        0
    }
}

pub(crate) fn string_join(node: &AstNode) -> String {
    let Some(seq) = node.children.first() else {
        return String::new();
    };
    let separator = node
        .children
        .get(1)
        .map(|c| c.as_string())
        .unwrap_or_default();
    let values: Vec<String> = seq.as_sequence().iter().map(|v| v.value()).collect();
    values.join(&separator)
}

pub(crate) fn substring_before(node: &AstNode) -> String {
    let (Some(a), Some(b)) = (node.children.first(), node.children.get(1)) else {
        return String::new();
    };
    let haystack = a.as_string();
    let needle = b.as_string();
    match haystack.find(&needle) {
        Some(i) => haystack[..i].to_string(),
        None => String::new(),
    }
}

pub(crate) fn substring_after(node: &AstNode) -> String {
    let (Some(a), Some(b)) = (node.children.first(), node.children.get(1)) else {
        return String::new();
    };
    let haystack = a.as_string();
    let needle = b.as_string();
    match haystack.find(&needle) {
        Some(i) => haystack[i + needle.len()..].to_string(),
        None => String::new(),
    }
}

// Everything except RFC 3986 unreserved characters is percent-encoded.
const URI_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub(crate) fn escape_uri(node: &AstNode) -> String {
    match node.children.first() {
        Some(arg) => utf8_percent_encode(&arg.as_string(), URI_ESCAPE).to_string(),
        None => String::new(),
    }
}

pub(crate) fn current_time(node: &AstNode) -> String {
    node.scope.clock().now().format("%H:%M:%S %z").to_string()
}

pub(crate) fn current_date(node: &AstNode) -> String {
    node.scope
        .clock()
        .now()
        .format("%a, %d %b %Y %z")
        .to_string()
}

/// `sort(list, key)`: both arguments are string-encoded sub-expressions,
/// compiled and evaluated against the current root. Without a key the list
/// is returned unsorted.
pub(crate) fn sort(node: &AstNode) -> Sequence {
    let Some(first) = node.children.first() else {
        return Sequence::new();
    };
    let Ok(list_expr) = crate::compile(&first.as_string()) else {
        return Sequence::new();
    };
    list_expr.set_root_value(NodeValue::of(node.scope.root().node));
    let list = list_expr.as_sequence();
    let Some(second) = node.children.get(1) else {
        return list;
    };
    let Ok(key_expr) = crate::compile(&second.as_string()) else {
        return list;
    };
    sort_list(list, &key_expr)
}

fn sort_key(key: &Expression, item: &NodeValue) -> String {
    key.set_root_value(NodeValue::of(item.node.clone()));
    key.as_string()
}

// Recursive partition around the first item; items with equal keys stay in
// encounter order, grouped with the pivot.
fn sort_list(list: Sequence, key: &Expression) -> Sequence {
    let mut items = list.into_items().into_iter();
    let Some(pivot) = items.next() else {
        return Sequence::new();
    };
    let pivot_key = sort_key(key, &pivot);
    let mut lower = Sequence::new();
    let mut equal = Sequence::new();
    let mut higher = Sequence::new();
    equal.append(pivot);
    for item in items {
        match pivot_key.cmp(&sort_key(key, &item)) {
            Ordering::Greater => lower.append(item),
            Ordering::Equal => equal.append(item),
            Ordering::Less => higher.append(item),
        }
    }
    let mut result = sort_list(lower, key);
    result.splice(None, equal);
    result.splice(None, sort_list(higher, key));
    result
}

/// `subsequence(list, start, length?)`: 1-based start clamped to 1; a
/// missing or negative length takes everything to the end.
pub(crate) fn subsequence(node: &AstNode) -> Sequence {
    let Some(first) = node.children.first() else {
        return Sequence::new();
    };
    let seq = first.as_sequence();
    let Some(start) = node.children.get(1) else {
        return Sequence::new();
    };
    let start = start.as_int().max(1);
    let length = node.children.get(2).map(|c| c.as_int()).unwrap_or(-1);
    let rest = seq.into_items().into_iter().skip(start as usize - 1);
    if length < 0 {
        rest.collect()
    } else {
        rest.take(length as usize).collect()
    }
}

pub(crate) fn tokenize(node: &AstNode) -> Sequence {
    let (Some(text), Some(pattern)) = (node.children.first(), node.children.get(1)) else {
        return Sequence::new();
    };
    let Ok(re) = Regex::new(&pattern.as_string()) else {
        return Sequence::new();
    };
    let input = text.as_string();
    re.find_iter(&input)
        .map(|m| NodeValue::literal(m.as_str()))
        .collect()
}
