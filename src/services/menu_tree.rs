//! Builds the nested navigation structure from flat menu rows.
//!
//! Rows are grouped by parent, each sibling group is ordered by
//! `(position, id)` and nodes are emitted depth-first starting from the
//! roots. A row is only reachable through its parent, so children of a
//! filtered-out parent never appear.

use std::collections::{HashMap, HashSet};

use crate::database::models::{MenuItem, MenuNode};

struct Siblings<'a> {
    by_parent: HashMap<Option<i64>, Vec<&'a MenuItem>>,
}

impl<'a> Siblings<'a> {
    fn new(items: &'a [MenuItem], active_only: bool) -> Self {
        let mut by_parent: HashMap<Option<i64>, Vec<&MenuItem>> = HashMap::new();
        for item in items.iter().filter(|i| !active_only || i.is_active) {
            by_parent.entry(item.parent_id).or_default().push(item);
        }
        for group in by_parent.values_mut() {
            group.sort_by_key(|i| (i.position, i.id));
        }
        Self { by_parent }
    }

    /// Each row is emitted at most once, so cyclic parent links terminate
    fn nodes(&self, parent: Option<i64>, visited: &mut HashSet<i64>) -> Vec<MenuNode> {
        let Some(group) = self.by_parent.get(&parent) else {
            return Vec::new();
        };
        let mut nodes = Vec::with_capacity(group.len());
        for item in group {
            if visited.insert(item.id) {
                let children = self.nodes(Some(item.id), visited);
                nodes.push(MenuNode::from_item(item, children));
            }
        }
        nodes
    }
}

/// Active roots with their active descendants
pub fn build_tree(items: &[MenuItem]) -> Vec<MenuNode> {
    Siblings::new(items, true).nodes(None, &mut HashSet::new())
}

/// One item with every descendant, active or not
pub fn subtree(item: &MenuItem, items: &[MenuItem]) -> MenuNode {
    let siblings = Siblings::new(items, false);
    let mut visited = HashSet::from([item.id]);
    MenuNode::from_item(item, siblings.nodes(Some(item.id), &mut visited))
}

/// Active rows in display order, without nesting
pub fn active_flat(mut items: Vec<MenuItem>) -> Vec<MenuItem> {
    items.retain(|i| i.is_active);
    items.sort_by_key(|i| (i.position, i.id));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(id: i64, parent_id: Option<i64>, position: i32, is_active: bool) -> MenuItem {
        let now = Utc::now();
        MenuItem {
            id,
            title: format!("item {id}"),
            href: None,
            icon: None,
            position,
            parent_id,
            badge: None,
            disabled: false,
            is_separator: false,
            is_active,
            created_at: now,
            updated_at: now,
        }
    }

    fn ids(nodes: &[MenuNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn empty_input_yields_empty_tree() {
        assert!(build_tree(&[]).is_empty());
    }

    #[test]
    fn roots_and_children_are_ordered_by_position() {
        let items = vec![
            row(1, None, 2, true),
            row(2, None, 0, true),
            row(3, Some(1), 1, true),
            row(4, Some(1), 0, true),
            row(5, Some(4), 0, true),
        ];
        let tree = build_tree(&items);

        assert_eq!(ids(&tree), vec!["2", "1"]);
        let system = &tree[1];
        assert_eq!(ids(&system.children), vec!["4", "3"]);
        assert_eq!(system.children[0].parent_id.as_deref(), Some("1"));
        assert_eq!(ids(&system.children[0].children), vec!["5"]);
        assert_eq!(tree[0].parent_id, None);
    }

    #[test]
    fn equal_positions_fall_back_to_id() {
        let items = vec![row(9, None, 0, true), row(3, None, 0, true), row(6, None, 0, true)];
        assert_eq!(ids(&build_tree(&items)), vec!["3", "6", "9"]);
    }

    #[test]
    fn inactive_rows_and_their_descendants_are_omitted() {
        let items = vec![
            row(1, None, 0, true),
            row(2, None, 1, false),
            row(3, Some(2), 0, true),
            row(4, Some(1), 0, false),
            row(5, Some(1), 1, true),
        ];
        let tree = build_tree(&items);

        assert_eq!(ids(&tree), vec!["1"]);
        assert_eq!(ids(&tree[0].children), vec!["5"]);
    }

    #[test]
    fn subtree_keeps_inactive_children() {
        let items = vec![row(1, None, 0, true), row(2, Some(1), 0, false), row(3, Some(1), 1, true)];
        let node = subtree(&items[0], &items);
        assert_eq!(ids(&node.children), vec!["2", "3"]);
    }

    #[test]
    fn cyclic_parent_links_terminate() {
        let items = vec![row(1, Some(2), 0, true), row(2, Some(1), 0, true), row(3, None, 0, true)];
        let node = subtree(&items[0], &items);
        assert_eq!(ids(&node.children), vec!["2"]);
        assert!(node.children[0].children.is_empty());

        // Rows caught in a loop have no root to hang from
        assert_eq!(ids(&build_tree(&items)), vec!["3"]);
    }

    #[test]
    fn active_flat_drops_inactive_rows() {
        let items = vec![row(1, None, 3, true), row(2, Some(1), 0, true), row(3, None, 1, false)];
        let flat: Vec<i64> = active_flat(items).into_iter().map(|i| i.id).collect();
        assert_eq!(flat, vec![2, 1]);
    }
}
