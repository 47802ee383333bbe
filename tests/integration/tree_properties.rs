//! Cascade properties of the pure tree operations over generated trees.

use canopy::tree::path::{is_descendant_or_self, join, parent_of, rebase, ROOT};
use canopy::tree::{Node, Tree};
use canopy::types::NodeKind;
use proptest::prelude::*;
use proptest::sample::Index;

/// Short names over a tiny alphabet so prefixes like `/a` and `/ab` collide.
fn arb_tree() -> impl Strategy<Value = Tree> {
    prop::collection::vec((any::<Index>(), "[ab]{1,2}", any::<bool>()), 1..24).prop_map(
        |entries| {
            let mut tree = Tree::new(ROOT);
            let mut dirs = vec![ROOT.to_string()];
            for (index, name, is_dir) in entries {
                let base = index.get(&dirs).clone();
                if tree.has_child(&base, &name) {
                    continue;
                }
                let path = join(&base, &name);
                let kind = if is_dir { NodeKind::Directory } else { NodeKind::File };
                if let Ok(next) = tree.insert(&base, Node::new(kind, path.clone())) {
                    tree = next;
                    if is_dir {
                        dirs.push(path);
                    }
                }
            }
            tree
        },
    )
}

proptest! {
    #[test]
    fn prop_generated_trees_are_valid(tree in arb_tree()) {
        prop_assert!(tree.validate().is_ok());
    }

    #[test]
    fn prop_rename_rebases_exactly_the_subtree(tree in arb_tree(), pick in any::<Index>()) {
        let paths = tree.paths();
        prop_assume!(!paths.is_empty());
        let old = pick.get(&paths).clone();
        let new = join(&parent_of(&old), "renamed");

        let renamed = tree.rename(&old, &new);

        let expected: Vec<String> = paths.iter().map(|p| rebase(p, &old, &new)).collect();
        prop_assert_eq!(renamed.paths(), expected);
        prop_assert_eq!(renamed.find(&new).map(|n| n.name.as_str()), Some("renamed"));
        prop_assert!(renamed.validate().is_ok());
    }

    #[test]
    fn prop_remove_drops_exactly_the_subtree(tree in arb_tree(), pick in any::<Index>()) {
        let paths = tree.paths();
        prop_assume!(!paths.is_empty());
        let target = pick.get(&paths).clone();

        let removed = tree.remove(&target);

        let expected: Vec<String> = paths
            .iter()
            .filter(|p| !is_descendant_or_self(p, &target))
            .cloned()
            .collect();
        prop_assert_eq!(removed.paths(), expected);
        prop_assert!(removed.validate().is_ok());
    }

    #[test]
    fn prop_remove_is_idempotent(tree in arb_tree(), pick in any::<Index>()) {
        let paths = tree.paths();
        prop_assume!(!paths.is_empty());
        let target = pick.get(&paths).clone();

        let once = tree.remove(&target);
        let twice = once.remove(&target);
        prop_assert_eq!(once.nodes(), twice.nodes());
        prop_assert!(twice.ptr_eq(&once));
    }

    #[test]
    fn prop_insert_then_find(tree in arb_tree(), pick in any::<Index>(), is_dir in any::<bool>()) {
        let mut bases = vec![ROOT.to_string()];
        bases.extend(tree.iter().filter(|n| n.is_dir()).map(|n| n.path.clone()));
        let base = pick.get(&bases).clone();
        let kind = if is_dir { NodeKind::Directory } else { NodeKind::File };
        let node = Node::new(kind, join(&base, "inserted"));

        let inserted = tree.insert(&base, node.clone()).unwrap();

        prop_assert_eq!(inserted.find(&node.path).map(|n| n.as_ref()), Some(&node));
        prop_assert_eq!(inserted.len(), tree.len() + 1);
    }

    #[test]
    fn prop_unrelated_branches_are_shared(tree in arb_tree(), pick in any::<Index>()) {
        let paths = tree.paths();
        prop_assume!(!paths.is_empty());
        let target = pick.get(&paths).clone();
        let removed = tree.remove(&target);

        for node in tree.nodes() {
            if is_descendant_or_self(&target, &node.path) {
                continue;
            }
            let kept = removed.nodes().iter().find(|n| n.path == node.path);
            prop_assert!(kept.map(|k| std::sync::Arc::ptr_eq(k, node)).unwrap_or(false));
        }
    }
}
