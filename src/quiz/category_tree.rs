use std::collections::HashMap;

use serde::Serialize;

use crate::db::models::Category;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

/// Result of assembling flat category rows.
///
/// `orphans` holds the subtrees whose parent id is missing from the input.
/// Rows that sit on a parent cycle are reachable from neither list.
#[derive(Debug, Default)]
pub struct CategoryForest {
    pub roots: Vec<CategoryNode>,
    pub orphans: Vec<CategoryNode>,
}

impl CategoryForest {
    /// Depth-first listing of every category reachable from a root.
    pub fn preorder(&self) -> Vec<&Category> {
        fn walk<'a>(nodes: &'a [CategoryNode], out: &mut Vec<&'a Category>) {
            for node in nodes {
                out.push(&node.category);
                walk(&node.children, out);
            }
        }

        let mut out = Vec::new();
        walk(&self.roots, &mut out);
        out
    }

    pub fn orphan_ids(&self) -> Vec<i64> {
        self.orphans.iter().map(|n| n.category.id).collect()
    }
}

/// Builds a forest from rows already sorted in display order.
///
/// Children keep the relative order they had in `rows`.
pub fn build_tree(rows: Vec<Category>) -> CategoryForest {
    let index: HashMap<i64, usize> = rows
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id, i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
    let mut roots = Vec::new();
    let mut orphans = Vec::new();

    for (i, category) in rows.iter().enumerate() {
        match category.parent_id {
            None => roots.push(i),
            Some(parent_id) => match index.get(&parent_id) {
                Some(&parent) if parent != i => children[parent].push(i),
                Some(_) => {}
                None => orphans.push(i),
            },
        }
    }

    let mut slots: Vec<Option<Category>> = rows.into_iter().map(Some).collect();

    let mut assemble = |ids: Vec<usize>| -> Vec<CategoryNode> {
        ids.into_iter()
            .filter_map(|i| assemble_node(i, &mut slots, &children))
            .collect()
    };

    let roots = assemble(roots);
    let orphans = assemble(orphans);

    CategoryForest { roots, orphans }
}

fn assemble_node(
    i: usize,
    slots: &mut [Option<Category>],
    children: &[Vec<usize>],
) -> Option<CategoryNode> {
    // Taking the slot guarantees every row is placed at most once.
    let category = slots[i].take()?;
    let children = children[i]
        .iter()
        .filter_map(|&child| assemble_node(child, slots, children))
        .collect();

    Some(CategoryNode { category, children })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;

    fn row(id: i64, parent_id: Option<i64>, level: i64) -> Category {
        Category {
            id,
            name: format!("category {id}"),
            description: String::new(),
            parent_id,
            parent_name: None,
            level,
            sort_order: 0,
            status: 1,
            question_count: 0,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        }
    }

    fn ids(nodes: &[CategoryNode]) -> Vec<i64> {
        nodes.iter().map(|n| n.category.id).collect()
    }

    #[test]
    fn nests_children_under_their_parents_in_fetch_order() {
        let forest = build_tree(vec![
            row(1, None, 1),
            row(2, None, 1),
            row(3, Some(1), 2),
            row(4, Some(1), 2),
            row(5, Some(3), 3),
        ]);

        assert_eq!(ids(&forest.roots), vec![1, 2]);
        assert_eq!(ids(&forest.roots[0].children), vec![3, 4]);
        assert_eq!(ids(&forest.roots[0].children[0].children), vec![5]);
        assert!(forest.roots[1].children.is_empty());
        assert!(forest.orphans.is_empty());
    }

    #[test]
    fn preorder_lists_every_rooted_category_once() {
        let forest = build_tree(vec![
            row(1, None, 1),
            row(2, None, 1),
            row(3, Some(2), 2),
            row(4, Some(1), 2),
            row(5, Some(4), 3),
            row(6, Some(3), 3),
        ]);

        let order: Vec<i64> = forest.preorder().iter().map(|c| c.id).collect();
        assert_eq!(order, vec![1, 4, 5, 2, 3, 6]);
    }

    #[test]
    fn dangling_parents_are_reported_as_orphans() {
        let forest = build_tree(vec![row(1, None, 1), row(7, Some(99), 2), row(8, Some(7), 3)]);

        assert_eq!(ids(&forest.roots), vec![1]);
        assert_eq!(forest.orphan_ids(), vec![7]);
        assert_eq!(ids(&forest.orphans[0].children), vec![8]);
    }

    #[test]
    fn cycles_do_not_loop_and_stay_unreachable() {
        let forest = build_tree(vec![
            row(1, None, 1),
            row(2, Some(3), 2),
            row(3, Some(2), 2),
            row(4, Some(4), 2),
        ]);

        assert_eq!(ids(&forest.roots), vec![1]);
        assert!(forest.orphans.is_empty());
        assert_eq!(forest.preorder().len(), 1);
    }

    #[test]
    fn empty_input_gives_an_empty_forest() {
        let forest = build_tree(Vec::new());
        assert!(forest.roots.is_empty());
        assert!(forest.orphans.is_empty());
    }
}
