//! Child lookup and typed attribute accessors
//!
//! Children in this format are addressed as `<tag name="..." val="..."/>`.
//! The sentinel accessors return [`LONG_SENTINEL`] on any failure; the
//! `Result` variants say which failure it was.

use crate::dom::{NodeId, NodeKind, XmlTree};
use crate::error::AttrError;
use crate::markers::{NAME_ATTR, VAL_ATTR};

/// Returned by [`get_long`] and [`get_child_long`] when no integer is available
pub const LONG_SENTINEL: i64 = -1;

/// First element child of `parent` matching `tag` and carrying `attr_name`
///
/// When `attr_val` is given the attribute value must equal it exactly. Only
/// direct children are scanned.
pub fn find_child(
    tree: &XmlTree,
    parent: Option<NodeId>,
    tag: Option<&str>,
    attr_name: &str,
    attr_val: Option<&str>,
) -> Option<NodeId> {
    let parent = parent?;
    tree.children(parent).find(|&child| {
        tree.kind(child) == Some(NodeKind::Element)
            && tag.is_none_or(|tag| tree.name(child) == Some(tag))
            && tree
                .attribute(child, attr_name)
                .is_some_and(|value| attr_val.is_none_or(|wanted| value == wanted))
    })
}

fn parse_long(name: &str, value: &str) -> Result<i64, AttrError> {
    value.parse::<i64>().map_err(|_| AttrError::NotNumeric {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Integer value of `attr_name` on `node`
pub fn attr_long(tree: &XmlTree, node: NodeId, attr_name: &str) -> Result<i64, AttrError> {
    let value = tree
        .attribute(node, attr_name)
        .ok_or_else(|| AttrError::Missing(attr_name.to_string()))?;
    parse_long(attr_name, value)
}

pub fn get_long(tree: &XmlTree, node: Option<NodeId>, attr_name: &str) -> i64 {
    node.and_then(|node| attr_long(tree, node, attr_name).ok())
        .unwrap_or(LONG_SENTINEL)
}

/// `val` of the `<tag name="name_val">` child of `parent`, copied out
pub fn get_child_value(
    tree: &XmlTree,
    parent: Option<NodeId>,
    tag: &str,
    name_val: &str,
) -> Option<String> {
    let child = find_child(tree, parent, Some(tag), NAME_ATTR, Some(name_val))?;
    tree.attribute(child, VAL_ATTR).map(str::to_string)
}

/// Integer `val` of the `<tag name="name_val">` child of `parent`
pub fn child_long(
    tree: &XmlTree,
    parent: NodeId,
    tag: &str,
    name_val: &str,
) -> Result<i64, AttrError> {
    let child = find_child(tree, Some(parent), Some(tag), NAME_ATTR, Some(name_val)).ok_or_else(
        || AttrError::MissingChild {
            tag: tag.to_string(),
            name: name_val.to_string(),
        },
    )?;
    attr_long(tree, child, VAL_ATTR)
}

pub fn get_child_long(tree: &XmlTree, parent: Option<NodeId>, tag: &str, name_val: &str) -> i64 {
    parent
        .and_then(|parent| child_long(tree, parent, tag, name_val).ok())
        .unwrap_or(LONG_SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// P > [X(name=a,val=1), <!--c-->, X(name=b,val=2), Y(name=b,val=3), X(name=b,val=4)]
    fn sample() -> (XmlTree, NodeId) {
        let mut tree = XmlTree::new();
        let p = tree.new_element("P");
        for (tag, name, val) in [("X", "a", "1"), ("X", "b", "2"), ("Y", "b", "3"), ("X", "b", "4")] {
            let child = tree.append_element(p, tag).unwrap();
            tree.set_attribute(child, NAME_ATTR, name).unwrap();
            tree.set_attribute(child, VAL_ATTR, val).unwrap();
            if name == "a" {
                tree.append_comment(p, "c").unwrap();
            }
        }
        (tree, p)
    }

    #[test]
    fn test_find_child_first_match() {
        let (tree, p) = sample();
        let found = find_child(&tree, Some(p), Some("X"), NAME_ATTR, Some("b")).unwrap();
        assert_eq!(tree.attribute(found, VAL_ATTR), Some("2"));

        let any_tag = find_child(&tree, Some(p), None, NAME_ATTR, Some("b")).unwrap();
        assert_eq!(any_tag, found);

        let y = find_child(&tree, Some(p), Some("Y"), NAME_ATTR, None).unwrap();
        assert_eq!(tree.attribute(y, VAL_ATTR), Some("3"));
    }

    #[test]
    fn test_find_child_misses() {
        let (tree, p) = sample();
        assert_eq!(find_child(&tree, None, Some("X"), NAME_ATTR, None), None);
        assert_eq!(find_child(&tree, Some(p), Some("Z"), NAME_ATTR, None), None);
        assert_eq!(find_child(&tree, Some(p), Some("X"), "href", None), None);
        assert_eq!(find_child(&tree, Some(p), Some("X"), NAME_ATTR, Some("B")), None);
    }

    #[test]
    fn test_find_child_direct_children_only() {
        let mut tree = XmlTree::new();
        let p = tree.new_element("P");
        let wrapper = tree.append_element(p, "wrapper").unwrap();
        let deep = tree.append_element(wrapper, "X").unwrap();
        tree.set_attribute(deep, NAME_ATTR, "a").unwrap();
        assert_eq!(find_child(&tree, Some(p), Some("X"), NAME_ATTR, None), None);
    }

    #[test]
    fn test_child_values() {
        let (tree, p) = sample();
        assert_eq!(get_child_value(&tree, Some(p), "X", "b").as_deref(), Some("2"));
        assert_eq!(get_child_long(&tree, Some(p), "X", "b"), 2);
        assert_eq!(get_child_value(&tree, Some(p), "X", "z"), None);
        assert_eq!(get_child_long(&tree, Some(p), "X", "z"), LONG_SENTINEL);
        assert_eq!(get_child_long(&tree, None, "X", "a"), LONG_SENTINEL);
    }

    #[test]
    fn test_child_value_is_owned_copy() {
        let (mut tree, p) = sample();
        let value = get_child_value(&tree, Some(p), "X", "a").unwrap();
        tree.remove(p).unwrap();
        assert_eq!(value, "1");
    }

    #[test]
    fn test_get_long_sentinel_cases() {
        let mut tree = XmlTree::new();
        let el = tree.new_element("int");
        assert_eq!(get_long(&tree, Some(el), "val"), LONG_SENTINEL);
        assert_eq!(get_long(&tree, None, "val"), LONG_SENTINEL);

        for (raw, expected) in [
            ("42", 42),
            ("-7", -7),
            ("+9", 9),
            ("", LONG_SENTINEL),
            ("abc", LONG_SENTINEL),
            ("12abc", LONG_SENTINEL),
            (" 5", LONG_SENTINEL),
            ("99999999999999999999", LONG_SENTINEL),
        ] {
            tree.set_attribute(el, "val", raw).unwrap();
            assert_eq!(get_long(&tree, Some(el), "val"), expected, "input {raw:?}");
        }
    }

    #[test]
    fn test_typed_errors() {
        let (mut tree, p) = sample();
        let x = tree.first_child(p).unwrap();
        assert_eq!(attr_long(&tree, x, VAL_ATTR), Ok(1));
        assert_eq!(
            attr_long(&tree, x, "min"),
            Err(AttrError::Missing("min".to_string()))
        );

        tree.set_attribute(x, VAL_ATTR, "-1").unwrap();
        // a stored -1 and a missing value are told apart here
        assert_eq!(child_long(&tree, p, "X", "a"), Ok(-1));
        assert_eq!(
            child_long(&tree, p, "X", "z"),
            Err(AttrError::MissingChild {
                tag: "X".to_string(),
                name: "z".to_string()
            })
        );

        tree.set_attribute(x, VAL_ATTR, "one").unwrap();
        assert_eq!(
            child_long(&tree, p, "X", "a"),
            Err(AttrError::NotNumeric {
                name: VAL_ATTR.to_string(),
                value: "one".to_string()
            })
        );
    }
}
