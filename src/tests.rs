extern crate std;

use std::{ops::Range, prelude::v1::*};

use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

fn tree_from(keys: &[u32]) -> AvlTree<TestNode> {
    let mut tree = AvlTree::new();

    for &key in keys {
        assert!(tree.insert(TestNode::new(key, key)).is_none());
        tree.assert_invariants();
    }

    tree
}

fn key_of(link: Link<TestNode>) -> Option<u32> {
    link.map(|node| unsafe { node.as_ref().key })
}

fn root_key(tree: &AvlTree<TestNode>) -> Option<u32> {
    key_of(tree.root)
}

unsafe fn links_at<'a>(node: NonNull<TestNode>) -> &'a Links<TestNode> {
    unsafe { TestNode::links(node).as_ref() }
}

fn links_of(tree: &AvlTree<TestNode>, key: u32) -> &Links<TestNode> {
    let node = tree.get_raw(&key).expect("item not found");
    unsafe { links_at(node) }
}

fn balance_of(tree: &AvlTree<TestNode>, key: u32) -> i8 {
    links_of(tree, key).balance()
}

fn children_of(tree: &AvlTree<TestNode>, key: u32) -> (Option<u32>, Option<u32>) {
    let links = links_of(tree, key);
    (key_of(links.left()), key_of(links.right()))
}

// Every node as (key, left, right, balance), in key order.
fn shape(tree: &AvlTree<TestNode>) -> Vec<(u32, Option<u32>, Option<u32>, i8)> {
    tree.iter()
        .map(|node| {
            let (left, right) = children_of(tree, node.key);
            (node.key, left, right, balance_of(tree, node.key))
        })
        .collect()
}

fn insert_find_all(keys: &[u32]) {
    let tree = tree_from(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    insert_find_all(&[0, 1, 2, 3]);
    insert_find_all(&[0, 1, 3, 2]);
    insert_find_all(&[0, 2, 1, 3]);
    insert_find_all(&[0, 2, 3, 1]);
    insert_find_all(&[0, 3, 1, 2]);
    insert_find_all(&[0, 3, 2, 1]);

    insert_find_all(&[1, 0, 2, 3]);
    insert_find_all(&[1, 0, 3, 2]);
    insert_find_all(&[1, 2, 0, 3]);
    insert_find_all(&[1, 2, 3, 0]);
    insert_find_all(&[1, 3, 0, 2]);
    insert_find_all(&[1, 3, 2, 0]);

    insert_find_all(&[2, 0, 1, 3]);
    insert_find_all(&[2, 0, 3, 1]);
    insert_find_all(&[2, 1, 0, 3]);
    insert_find_all(&[2, 1, 3, 0]);
    insert_find_all(&[2, 3, 0, 1]);
    insert_find_all(&[2, 3, 1, 0]);

    insert_find_all(&[3, 0, 1, 2]);
    insert_find_all(&[3, 0, 2, 1]);
    insert_find_all(&[3, 1, 0, 2]);
    insert_find_all(&[3, 1, 2, 0]);
    insert_find_all(&[3, 2, 0, 1]);
    insert_find_all(&[3, 2, 1, 0]);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree = tree_from(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }

    for &key in keys {
        tree.insert(TestNode::new(key, key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let node = tree.get_raw(key).expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_four() {
    insert_remove_all(&[0, 1, 2, 3]);
    insert_remove_all(&[0, 1, 3, 2]);
    insert_remove_all(&[0, 2, 1, 3]);
    insert_remove_all(&[0, 2, 3, 1]);
    insert_remove_all(&[0, 3, 1, 2]);
    insert_remove_all(&[0, 3, 2, 1]);

    insert_remove_all(&[1, 0, 2, 3]);
    insert_remove_all(&[1, 0, 3, 2]);
    insert_remove_all(&[1, 2, 0, 3]);
    insert_remove_all(&[1, 2, 3, 0]);
    insert_remove_all(&[1, 3, 0, 2]);
    insert_remove_all(&[1, 3, 2, 0]);

    insert_remove_all(&[2, 0, 1, 3]);
    insert_remove_all(&[2, 0, 3, 1]);
    insert_remove_all(&[2, 1, 0, 3]);
    insert_remove_all(&[2, 1, 3, 0]);
    insert_remove_all(&[2, 3, 0, 1]);
    insert_remove_all(&[2, 3, 1, 0]);

    insert_remove_all(&[3, 0, 1, 2]);
    insert_remove_all(&[3, 0, 2, 1]);
    insert_remove_all(&[3, 1, 0, 2]);
    insert_remove_all(&[3, 1, 2, 0]);
    insert_remove_all(&[3, 2, 0, 1]);
    insert_remove_all(&[3, 2, 1, 0]);
}

#[test]
fn ascending_inserts_rotate_left() {
    let tree = tree_from(&[10, 20, 30]);

    assert_eq!(root_key(&tree), Some(20));
    assert_eq!(children_of(&tree, 20), (Some(10), Some(30)));
    assert_eq!(
        shape(&tree),
        [
            (10, None, None, 0),
            (20, Some(10), Some(30), 0),
            (30, None, None, 0),
        ]
    );
}

#[test]
fn zig_zag_insert_rotates_twice() {
    let tree = tree_from(&[30, 10, 20]);

    assert_eq!(root_key(&tree), Some(20));
    assert_eq!(
        shape(&tree),
        [
            (10, None, None, 0),
            (20, Some(10), Some(30), 0),
            (30, None, None, 0),
        ]
    );
}

#[test]
fn zig_zag_insert_with_leaning_middle() {
    // Inserting 3 leaves 4 leaning left under a right-leaning 2, so the promoted node has
    // children of its own to hand over.
    let tree = tree_from(&[5, 2, 8, 1, 4, 3]);

    assert_eq!(root_key(&tree), Some(4));
    assert_eq!(
        shape(&tree),
        [
            (1, None, None, 0),
            (2, Some(1), Some(3), 0),
            (3, None, None, 0),
            (4, Some(2), Some(5), 0),
            (5, None, Some(8), 1),
            (8, None, None, 0),
        ]
    );
}

#[test]
fn remove_leaf_from_perfect_tree() {
    let mut tree = tree_from(&[1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(root_key(&tree), Some(4));

    let removed = tree.remove(&1).expect("item not found");
    assert_eq!(removed.key, 1);
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(4));
    assert_eq!(children_of(&tree, 2), (None, Some(3)));
    assert_eq!(balance_of(&tree, 2), 1);
    assert_eq!(balance_of(&tree, 4), 0);
}

#[test]
fn remove_node_with_one_child() {
    let mut tree = tree_from(&[2, 1, 3, 4]);
    assert_eq!(children_of(&tree, 3), (None, Some(4)));

    assert_eq!(tree.remove(&3).map(|node| node.key), Some(3));
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(2));
    assert_eq!(children_of(&tree, 2), (Some(1), Some(4)));
    assert_eq!(balance_of(&tree, 2), 0);
}

#[test]
fn remove_node_with_two_children() {
    let mut tree = tree_from(&[1, 2, 3, 4, 5, 6, 7]);

    assert_eq!(tree.remove(&4).map(|node| node.key), Some(4));
    tree.assert_invariants();

    // The predecessor takes over the root.
    assert_eq!(root_key(&tree), Some(3));
    assert_eq!(children_of(&tree, 3), (Some(2), Some(6)));
    assert_eq!(balance_of(&tree, 2), -1);
    assert_eq!(balance_of(&tree, 3), 0);
}

#[test]
fn remove_only_element() {
    let mut tree = tree_from(&[42]);

    assert_eq!(tree.remove(&42).map(|node| node.key), Some(42));
    tree.assert_invariants();

    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);
    assert!(tree.first().is_none());
}

#[test]
fn remove_absent_key() {
    let mut tree = tree_from(&[1, 2, 3]);
    let before = shape(&tree);

    assert!(tree.remove(&7).is_none());
    tree.assert_invariants();

    assert_eq!(tree.len(), 3);
    assert_eq!(shape(&tree), before);
}

#[test]
fn remove_rotates_once() {
    let mut tree = tree_from(&[2, 1, 3, 4]);

    tree.remove(&1);
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(3));
    assert_eq!(
        shape(&tree),
        [(2, None, None, 0), (3, Some(2), Some(4), 0), (4, None, None, 0)]
    );
}

#[test]
fn remove_rotation_keeps_height() {
    let mut tree = tree_from(&[2, 1, 4, 3, 5]);
    assert_eq!(tree.height(), 3);

    tree.remove(&1);
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(4));
    assert_eq!(tree.height(), 3);
    assert_eq!(balance_of(&tree, 4), -1);
    assert_eq!(balance_of(&tree, 2), 1);
    assert_eq!(children_of(&tree, 2), (None, Some(3)));
}

#[test]
fn remove_rotates_twice() {
    let mut tree = tree_from(&[3, 1, 5, 4]);

    tree.remove(&1);
    tree.assert_invariants();

    assert_eq!(root_key(&tree), Some(4));
    assert_eq!(
        shape(&tree),
        [(3, None, None, 0), (4, Some(3), Some(5), 0), (5, None, None, 0)]
    );
}

#[test]
fn duplicate_insert_replaces_in_place() {
    let mut tree = tree_from(&[1, 2, 3, 4, 5, 6, 7]);
    let before = shape(&tree);

    let old = tree.insert(TestNode::new(3, 99)).expect("duplicate not displaced");
    tree.assert_invariants();

    assert_eq!((old.key, old.value), (3, 3));
    assert_eq!(tree.get(&3).map(|node| node.value), Some(99));
    assert_eq!(tree.len(), 7);
    assert_eq!(shape(&tree), before);
}

#[test]
fn swap_unrelated_nodes() {
    let mut tree = tree_from(&[1, 2, 3, 4, 5, 6]);
    assert_eq!(balance_of(&tree, 5), 1);
    assert_eq!(balance_of(&tree, 1), 0);

    let a = tree.get_raw(&1).expect("item not found");
    let b = tree.get_raw(&5).expect("item not found");

    unsafe {
        tree.swap_nodes(a, b);

        // Balances follow the position, not the node.
        assert_eq!(links_at(a).balance(), 1);
        assert_eq!(links_at(b).balance(), 0);
        assert_eq!(key_of(links_at(a).right()), Some(6));
        assert_eq!(key_of(links_at(a).parent()), Some(4));
        assert_eq!(key_of(links_at(b).parent()), Some(2));

        tree.swap_nodes(a, b);
    }

    tree.assert_invariants();
}

#[test]
fn swap_parent_and_child() {
    let mut tree = tree_from(&[1, 2, 3, 4, 5, 6, 7]);
    let before = shape(&tree);

    let root = tree.get_raw(&4).expect("item not found");
    let child = tree.get_raw(&2).expect("item not found");

    unsafe {
        tree.swap_nodes(child, root);

        assert_eq!(root_key(&tree), Some(2));
        assert_eq!(key_of(links_at(child).left()), Some(4));
        assert_eq!(key_of(links_at(child).right()), Some(6));
        assert_eq!(key_of(links_at(root).parent()), Some(2));
        assert_eq!(key_of(links_at(root).left()), Some(1));
        assert_eq!(key_of(links_at(root).right()), Some(3));

        tree.swap_nodes(root, child);
    }

    tree.assert_invariants();
    assert_eq!(shape(&tree), before);
}

#[test]
fn swap_siblings() {
    let mut tree = tree_from(&[1, 2, 3, 4, 5, 6, 7]);
    let before = shape(&tree);

    let left = tree.get_raw(&1).expect("item not found");
    let right = tree.get_raw(&3).expect("item not found");

    unsafe {
        tree.swap_nodes(left, right);

        let parent = tree.get_raw(&2).expect("item not found");
        assert_eq!(key_of(links_at(parent).left()), Some(3));
        assert_eq!(key_of(links_at(parent).right()), Some(1));

        tree.swap_nodes(left, right);
    }

    tree.assert_invariants();
    assert_eq!(shape(&tree), before);
}

#[test]
fn height_is_logarithmic() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    assert_eq!(tree.height(), 0);

    for key in 0..1000 {
        tree.insert(TestNode::new(key, key));
        assert!(model::height_within_bound(tree.height(), tree.len()));
    }
    tree.assert_invariants();

    // A perfect tree of 1023 nodes has 10 levels.
    assert!(tree.height() >= 10);

    for key in (0..1000).step_by(3) {
        tree.remove(&key);
        assert!(model::height_within_bound(tree.height(), tree.len()));
    }
    tree.assert_invariants();
}

#[test]
fn first_last_and_pop() {
    let mut tree = tree_from(&[5, 3, 8, 1, 4]);

    assert_eq!(tree.first().map(|node| node.key), Some(1));
    assert_eq!(tree.last().map(|node| node.key), Some(8));

    assert_eq!(tree.pop_first().map(|node| node.key), Some(1));
    assert_eq!(tree.pop_last().map(|node| node.key), Some(8));
    tree.assert_invariants();

    assert_eq!(tree.iter().map(|node| node.key).collect::<Vec<_>>(), [3, 4, 5]);

    tree.clear();
    assert!(tree.is_empty());
    assert!(tree.pop_first().is_none());
    assert!(tree.pop_last().is_none());
}

#[test]
fn iter_from_both_ends() {
    let tree = tree_from(&[4, 2, 6, 1, 3, 5, 7]);

    let mut iter = tree.iter();
    assert_eq!(iter.len(), 7);
    assert_eq!(iter.next().map(|node| node.key), Some(1));
    assert_eq!(iter.next_back().map(|node| node.key), Some(7));
    assert_eq!(iter.len(), 5);

    let rest: Vec<_> = iter.map(|node| node.key).collect();
    assert_eq!(rest, [2, 3, 4, 5, 6]);

    let reversed: Vec<_> = tree.iter().rev().map(|node| node.key).collect();
    assert_eq!(reversed, [7, 6, 5, 4, 3, 2, 1]);
}

#[test]
fn entry_insert_and_remove() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    match tree.entry(&2) {
        Entry::Vacant(entry) => {
            assert_eq!(*entry.key(), 2);
            let node = unsafe { entry.insert(TestNode::new(2, 20)) };
            assert_eq!(node.value, 20);
        }
        Entry::Occupied(_) => panic!("empty tree has no entries"),
    }

    for key in [1, 3] {
        let Entry::Vacant(entry) = tree.entry(&key) else {
            panic!("{key} is not in the tree");
        };
        unsafe { entry.insert(TestNode::new(key, key * 10)) };
        tree.assert_invariants();
    }

    assert!(tree.entry(&3).is_occupied());

    let Entry::Occupied(mut entry) = tree.entry(&1) else {
        panic!("1 is in the tree");
    };
    assert_eq!(entry.get().value, 10);

    let old = unsafe { entry.insert(TestNode::new(1, 11)) };
    assert_eq!(old.value, 10);
    assert_eq!(entry.get().value, 11);
    tree.assert_invariants();
    assert_eq!(tree.len(), 3);

    let Entry::Occupied(entry) = tree.entry(&2) else {
        panic!("2 is in the tree");
    };
    assert_eq!(entry.remove().value, 20);
    tree.assert_invariants();

    assert_eq!(
        tree.iter().map(|node| (node.key, node.value)).collect::<Vec<_>>(),
        [(1, 11), (3, 30)]
    );
}

#[test]
fn entry_or_insert_with() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [5, 3, 5, 8, 3, 5] {
        let node = unsafe {
            tree.entry(&key)
                .or_insert_with(|| TestNode::new(key, 0))
                .get_unchecked_mut()
        };
        node.value += 1;
        tree.assert_invariants();
    }

    assert_eq!(
        tree.iter().map(|node| (node.key, node.value)).collect::<Vec<_>>(),
        [(3, 2), (5, 3), (8, 1)]
    );
}

#[test]
fn cursor_removes_while_walking() {
    let mut tree = tree_from(&[1, 2, 3, 4, 5, 6, 7, 8]);

    let mut curs = tree.cursor_first_mut();
    while let Some(node) = curs.get() {
        if node.key % 2 == 0 {
            curs.remove_current();
        } else {
            curs.move_next();
        }
    }
    assert!(curs.peek_prev().is_some_and(|node| node.key == 7));
    drop(curs);

    tree.assert_invariants();
    assert_eq!(tree.iter().map(|node| node.key).collect::<Vec<_>>(), [1, 3, 5, 7]);

    let mut curs = tree.cursor_last();
    curs.move_next();
    assert!(curs.get().is_none());
    curs.move_next();
    assert_eq!(curs.get().map(|node| node.key), Some(1));
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(0u32..500, 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence(values, ops);
    }
}
