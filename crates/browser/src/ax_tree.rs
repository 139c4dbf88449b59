//! Accessibility-tree parsing and traversal.

use std::collections::{HashMap, HashSet};

use {serde::Serialize, serde_json::Value};

use crate::{error::BrowserError, types::AxNode};

/// Roles a user can act on.
pub const INTERACTIVE_ROLES: &[&str] = &[
    "button",
    "link",
    "textbox",
    "searchbox",
    "combobox",
    "checkbox",
    "radio",
    "menuitem",
    "tab",
    "option",
];

const MAX_NAME_CHARS: usize = 100;

/// An actionable element found on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractiveElement {
    pub role: String,
    pub name: String,
    pub focused: bool,
}

/// Build a tree from the flat node list returned by `Accessibility.getFullAXTree`.
///
/// Ignored nodes are dropped and their children hoisted to the nearest kept
/// ancestor. The first node is the root.
pub fn from_cdp_nodes(payload: &Value) -> Result<AxNode, BrowserError> {
    let nodes = payload
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| BrowserError::Cdp("accessibility tree has no `nodes`".into()))?;
    let root_id = nodes
        .first()
        .and_then(node_id)
        .ok_or_else(|| BrowserError::Cdp("accessibility tree is empty".into()))?;
    let by_id: HashMap<&str, &Value> = nodes
        .iter()
        .filter_map(|n| node_id(n).map(|id| (id, n)))
        .collect();

    let mut visited = HashSet::new();
    let mut children = build(root_id, &by_id, &mut visited);
    match children.len() {
        1 => Ok(children.remove(0)),
        _ => Ok(AxNode::new("RootWebArea", "").with_children(children)),
    }
}

/// Returns the kept nodes for `id`: itself, or its hoisted children when ignored.
fn build<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a Value>,
    visited: &mut HashSet<&'a str>,
) -> Vec<AxNode> {
    if !visited.insert(id) {
        return Vec::new();
    }
    let Some(&raw) = by_id.get(id) else {
        return Vec::new();
    };

    let children: Vec<AxNode> = raw
        .get("childIds")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .flat_map(|child| build(child, by_id, visited))
        .collect();

    if raw.get("ignored").and_then(Value::as_bool).unwrap_or(false) {
        return children;
    }

    vec![AxNode {
        role: nested_str(raw, "role"),
        name: nested_str(raw, "name"),
        focused: is_focused(raw),
        children,
    }]
}

fn node_id(node: &Value) -> Option<&str> {
    node.get("nodeId").and_then(Value::as_str)
}

fn nested_str(node: &Value, key: &str) -> String {
    node.get(key)
        .and_then(|v| v.get("value"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn is_focused(node: &Value) -> bool {
    node.get("properties")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .any(|p| {
            p.get("name").and_then(Value::as_str) == Some("focused")
                && p.pointer("/value/value").and_then(Value::as_bool) == Some(true)
        })
}

/// Depth-first walk collecting named interactive nodes. Nodes deeper than
/// `max_depth` are not visited; collection stops at `limit`.
pub fn interactive_elements(
    root: &AxNode,
    max_depth: usize,
    limit: usize,
) -> Vec<InteractiveElement> {
    let mut out = Vec::new();
    walk(root, 0, max_depth, limit, &mut out);
    out
}

fn walk(
    node: &AxNode,
    depth: usize,
    max_depth: usize,
    limit: usize,
    out: &mut Vec<InteractiveElement>,
) {
    if depth > max_depth || out.len() >= limit {
        return;
    }
    if INTERACTIVE_ROLES.contains(&node.role.as_str()) && !node.name.is_empty() {
        out.push(InteractiveElement {
            role: node.role.clone(),
            name: node.name.chars().take(MAX_NAME_CHARS).collect(),
            focused: node.focused,
        });
    }
    for child in &node.children {
        walk(child, depth + 1, max_depth, limit, out);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, serde_json::json};

    fn cdp_payload() -> Value {
        json!({"nodes": [
            {"nodeId": "1", "ignored": false, "role": {"value": "RootWebArea"},
             "name": {"value": "Shop"}, "childIds": ["2", "3"]},
            {"nodeId": "2", "ignored": true, "role": {"value": "generic"},
             "childIds": ["4"]},
            {"nodeId": "3", "ignored": false, "role": {"value": "link"},
             "name": {"value": "Next page"}, "childIds": ["1"]},
            {"nodeId": "4", "ignored": false, "role": {"value": "searchbox"},
             "name": {"value": "Search"},
             "properties": [{"name": "focused", "value": {"type": "booleanOrUndefined", "value": true}}]}
        ]})
    }

    #[test]
    fn hoists_ignored_children_and_breaks_cycles() {
        let root = from_cdp_nodes(&cdp_payload()).unwrap();
        assert_eq!(root.role, "RootWebArea");
        let roles: Vec<_> = root.children.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, ["searchbox", "link"]);
        assert!(root.children[0].focused);
        // node 3 points back at the root
        assert!(root.children[1].children.is_empty());
    }

    #[test]
    fn rejects_payload_without_nodes() {
        assert!(from_cdp_nodes(&json!({})).is_err());
        assert!(from_cdp_nodes(&json!({"nodes": []})).is_err());
    }

    #[test]
    fn traversal_respects_depth_cap() {
        let mut node = AxNode::new("button", "deepest");
        for _ in 0..12 {
            node = AxNode::new("generic", "").with_children(vec![node]);
        }
        let root = AxNode::new("RootWebArea", "")
            .with_children(vec![AxNode::new("link", "Home"), node]);

        let found = interactive_elements(&root, 10, 50);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Home");
    }

    #[test]
    fn traversal_skips_unnamed_and_honours_limit() {
        let root = AxNode::new("RootWebArea", "").with_children(
            (0..5)
                .map(|i| AxNode::new("button", format!("b{i}")))
                .chain([AxNode::new("button", "")])
                .collect(),
        );
        let found = interactive_elements(&root, 10, 3);
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|e| !e.name.is_empty()));
    }
}
