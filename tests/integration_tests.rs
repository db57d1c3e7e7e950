use std::rc::Rc;
use treepath::{SimpleNode, compile, compile_with_root};

/// A playlist with a name and three items:
///
/// ```text
/// <playlist>
///   <name>My Mix</name>
///   <item id="1" kind="audio">first</item>
///   <item id="2" kind="video">second</item>
///   <item id="3" kind="audio">third</item>
/// </playlist>
/// ```
fn sample_playlist() -> Rc<SimpleNode> {
    let playlist = SimpleNode::new("playlist");
    let name = SimpleNode::new("name");
    name.set_text("My Mix");
    playlist.append_child(name);
    for (id, kind, text) in [
        ("1", "audio", "first"),
        ("2", "video", "second"),
        ("3", "audio", "third"),
    ] {
        let item = SimpleNode::new("item");
        item.set_attribute("id", id);
        item.set_attribute("kind", kind);
        item.set_text(text);
        playlist.append_child(item);
    }
    playlist
}

#[test]
fn test_child_step() {
    let expr = compile("item").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_sequence().len(), 3);
}

#[test]
fn test_singleton_path_collapses_to_value() {
    let expr = compile("name").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_string(), "My Mix");
}

#[test]
fn test_multi_item_path_collapses_to_count() {
    let expr = compile("item").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_string(), "3");
    assert_eq!(expr.as_int(), 3);
}

#[test]
fn test_wildcard_step() {
    let expr = compile("*").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_sequence().len(), 4);
}

#[test]
fn test_attribute_step() {
    let expr = compile("item/@id").unwrap();
    expr.set_root(sample_playlist());
    let ids: Vec<String> = expr.as_sequence().iter().map(|v| v.value()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
}

#[test]
fn test_attribute_wildcard() {
    let expr = compile("count(item/@*)").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_int(), 6);
}

#[test]
fn test_positional_predicate() {
    let expr = compile("item[2]").unwrap();
    expr.set_root(sample_playlist());
    let seq = expr.as_sequence();
    assert_eq!(seq.len(), 1);
    assert_eq!(seq.first().map(|v| v.value()), Some("second".to_string()));
}

#[test]
fn test_attribute_predicate() {
    let expr = compile("item[@id = 2]").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_string(), "second");

    let expr = compile("item[@kind = 'audio']").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_sequence().len(), 2);
}

#[test]
fn test_context_step_predicate() {
    let expr = compile("item[. = 'second']").unwrap();
    expr.set_root(sample_playlist());
    let seq = expr.as_sequence();
    assert_eq!(seq.len(), 1);
}

#[test]
fn test_position_and_last() {
    let expr = compile("item[position() = 2]").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_string(), "second");

    let expr = compile("item[position() = last()]").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_string(), "third");
}

#[test]
fn test_last_predicate_selects_last_item() {
    let expr = compile("item[last()]").unwrap();
    expr.set_root(sample_playlist());
    let seq = expr.as_sequence();
    assert_eq!(seq.len(), 1);
    assert_eq!(seq.first().map(|v| v.value()), Some("third".to_string()));
}

#[test]
fn test_arithmetic_predicate_is_positional() {
    let expr = compile("item[1 + 1]").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_string(), "second");

    let expr = compile("item[4 - 1]").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_string(), "third");
}

#[test]
fn test_position_and_last_need_iteration_context() {
    let expr = compile("position()").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_int(), 0);

    let expr = compile("last()").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_int(), 0);
}

#[test]
fn test_stacked_predicates() {
    let expr = compile("item[@kind = 'audio'][2]").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_string(), "third");
}

#[test]
fn test_recursive_step_direct_matches_first() {
    let root = SimpleNode::new("root");
    let top = SimpleNode::new("item");
    top.set_text("top");
    root.append_child(top);
    let group = SimpleNode::new("group");
    for text in ["deep1", "deep2"] {
        let item = SimpleNode::new("item");
        item.set_text(text);
        group.append_child(item);
    }
    root.append_child(group);

    let expr = compile("//item").unwrap();
    expr.set_root(root);
    let order: Vec<String> = expr.as_sequence().iter().map(|v| v.value()).collect();
    assert_eq!(order, ["top", "deep1", "deep2"]);
}

#[test]
fn test_nested_recursive_step() {
    let expr = compile("count(//item)").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_int(), 3);
}

#[test]
fn test_union() {
    let expr = compile("name | item").unwrap();
    expr.set_root(sample_playlist());
    assert_eq!(expr.as_sequence().len(), 4);
}

#[test]
fn test_unbound_expression_degrades() {
    let expr = compile("item").unwrap();
    assert_eq!(expr.as_sequence().len(), 0);
    assert_eq!(expr.as_int(), 0);
}

#[test]
fn test_missing_step_gives_empty_sequence() {
    let expr = compile("nothing/here").unwrap();
    expr.set_root(sample_playlist());
    assert!(expr.as_sequence().is_empty());
    assert_eq!(expr.as_string(), "0");
}

#[test]
fn test_set_root_invalidates_cached_results() {
    let one = SimpleNode::new("doc");
    let name = SimpleNode::new("name");
    name.set_text("x");
    one.append_child(name);

    let two = SimpleNode::new("doc");
    let name = SimpleNode::new("name");
    name.set_text("y");
    two.append_child(name);

    let expr = compile("name").unwrap();
    expr.set_root(one);
    assert_eq!(expr.as_string(), "x");
    // Same expression, repeated read comes from the cache.
    assert_eq!(expr.as_string(), "x");
    expr.set_root(two);
    assert_eq!(expr.as_string(), "y");
}

#[test]
fn test_default_root_tag() {
    let document = SimpleNode::new("#document");
    document.append_child(sample_playlist());

    let expr = compile_with_root("item", "playlist").unwrap();
    expr.set_root(document.clone());
    assert_eq!(expr.as_sequence().len(), 3);

    // Absolute paths are not affected by the default tag.
    let expr = compile_with_root("/playlist/item", "playlist").unwrap();
    expr.set_root(document);
    assert_eq!(expr.as_sequence().len(), 3);
}

#[test]
fn test_context_step_skips_nodeless_items() {
    // Tokenized items are plain strings, so `.` finds no node to yield.
    let expr = compile("count(tokenize('a b', '[a-z]')[. = 'a'])").unwrap();
    assert_eq!(expr.as_int(), 0);
}

#[test]
fn test_sequence_bool_in_predicate() {
    // A non-empty inner sequence keeps the item, an empty one drops it.
    let root = SimpleNode::new("root");
    let with_child = SimpleNode::new("entry");
    with_child.append_child(SimpleNode::new("mark"));
    root.append_child(with_child);
    root.append_child(SimpleNode::new("entry"));

    let expr = compile("entry[mark]").unwrap();
    expr.set_root(root);
    assert_eq!(expr.as_sequence().len(), 1);
}
