//! Reference-model harnesses that drive an [`AvlTree`] alongside a standard collection and check
//! that the two never disagree.

extern crate std;

use std::{collections::BTreeMap, prelude::v1::*, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{AvlTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
    pub value: u32,
}

impl TestNode {
    pub fn new(key: u32, value: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
            value,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::from(Box::leak(r))
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

/// How an operation picks its key.
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum KeyChoice {
    /// The key at this position (modulo the length) among the keys currently present.
    Present(usize),
    /// A key that may or may not be present.
    Any(u32),
}

fn key_strategy() -> impl Strategy<Value = KeyChoice> {
    proptest::prop_oneof![
        (0usize..1000).prop_map(KeyChoice::Present),
        (0u32..1000).prop_map(KeyChoice::Any),
    ]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(KeyChoice),
    Get(KeyChoice),
    Remove(KeyChoice),
    Upsert(KeyChoice),
    First,
    PopFirst,
    Last,
    PopLast,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        key_strategy().prop_map(Op::Insert),
        key_strategy().prop_map(Op::Get),
        key_strategy().prop_map(Op::Remove),
        key_strategy().prop_map(Op::Upsert),
        Just(Op::First),
        Just(Op::PopFirst),
        Just(Op::Last),
        Just(Op::PopLast),
    ]
}

struct Harness {
    btree: BTreeMap<u32, u32>,
    avl: AvlTree<TestNode>,
}

fn entry_of(node: &TestNode) -> (u32, u32) {
    (node.key, node.value)
}

#[allow(clippy::boxed_local)]
fn unboxed_entry_of(node: Box<TestNode>) -> (u32, u32) {
    entry_of(&node)
}

impl Harness {
    fn key(&self, choice: KeyChoice) -> u32 {
        match choice {
            KeyChoice::Present(idx) if !self.btree.is_empty() => {
                let nth = idx % self.btree.len();
                *self.btree.keys().nth(nth).unwrap()
            }
            KeyChoice::Present(idx) => idx as u32,
            KeyChoice::Any(key) => key,
        }
    }

    // Applies `op` to both collections and returns what each reported. `step` is stored as the
    // value on insertion, so overwrites are observable.
    fn apply(&mut self, op: Op, step: u32) -> (Option<(u32, u32)>, Option<(u32, u32)>) {
        match op {
            Op::Insert(choice) => {
                let key = self.key(choice);
                (
                    self.btree.insert(key, step).map(|old| (key, old)),
                    self.avl.insert(TestNode::new(key, step)).map(unboxed_entry_of),
                )
            }

            Op::Get(choice) => {
                let key = self.key(choice);
                (
                    self.btree.get_key_value(&key).map(|(&k, &v)| (k, v)),
                    self.avl.get(&key).map(|node| entry_of(&node)),
                )
            }

            Op::Remove(choice) => {
                let key = self.key(choice);
                (
                    self.btree.remove_entry(&key),
                    self.avl.remove(&key).map(unboxed_entry_of),
                )
            }

            Op::Upsert(choice) => {
                let key = self.key(choice);

                let expected = self.btree.entry(key).or_insert(0);
                *expected += 1;
                let expected = (key, *expected);

                let node = unsafe {
                    self.avl
                        .entry(&key)
                        .or_insert_with(|| TestNode::new(key, 0))
                        .get_unchecked_mut()
                };
                node.value += 1;

                (Some(expected), Some(entry_of(node)))
            }

            Op::First => (
                self.btree.first_key_value().map(|(&k, &v)| (k, v)),
                self.avl.first().map(|node| entry_of(&node)),
            ),

            Op::PopFirst => (
                self.btree.pop_first(),
                self.avl.pop_first().map(unboxed_entry_of),
            ),

            Op::Last => (
                self.btree.last_key_value().map(|(&k, &v)| (k, v)),
                self.avl.last().map(|node| entry_of(&node)),
            ),

            Op::PopLast => (
                self.btree.pop_last(),
                self.avl.pop_last().map(unboxed_entry_of),
            ),
        }
    }

    fn check(&self) {
        self.avl.assert_invariants();

        assert_eq!(self.btree.len(), self.avl.len());
        assert!(self
            .btree
            .iter()
            .map(|(&k, &v)| (k, v))
            .eq(self.avl.iter().map(entry_of)));
        assert!(
            height_within_bound(self.avl.height(), self.avl.len()),
            "height {} is too large for {} elements",
            self.avl.height(),
            self.avl.len()
        );
    }
}

/// Applies `ops` to both an [`AvlTree`] and a `BTreeMap`, asserting that they agree after every
/// operation and that the tree's invariants hold throughout.
pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut harness = Harness {
        btree: BTreeMap::new(),
        avl: AvlTree::new(),
    };

    for (step, op) in ops.into_iter().enumerate() {
        let (expected, actual) = harness.apply(op, step as u32);
        assert_eq!(expected, actual, "op #{step}: {op:?}");

        harness.check();
    }
}

/// Returns `true` if `height` does not exceed the worst-case AVL height for `len` nodes.
pub fn height_within_bound(height: usize, len: usize) -> bool {
    let bound = (1.44 * ((len + 2) as f64).log2()).ceil() as usize;
    height <= bound
}

#[derive(Clone, Debug, Arbitrary)]
pub enum CursorOp {
    MovePrev,
    MoveNext,
    PeekNext,
    PeekPrev,
    RemoveCurrent,
    RemoveCurrentMovePrev,
}

pub fn cursor_op_strategy() -> impl Strategy<Value = CursorOp> {
    proptest::prop_oneof![
        Just(CursorOp::MovePrev),
        Just(CursorOp::MoveNext),
        Just(CursorOp::PeekNext),
        Just(CursorOp::PeekPrev),
        Just(CursorOp::RemoveCurrent),
        Just(CursorOp::RemoveCurrentMovePrev),
    ]
}

#[derive(Clone, Debug, Arbitrary)]
pub struct CursorEquivalenceInput {
    pub values: Vec<u32>,
    pub ops: Vec<CursorOp>,
}

// A cursor over a sorted `Vec`, with `None` as the ghost position.
struct VecCursor {
    keys: Vec<u32>,
    index: Option<usize>,
}

impl VecCursor {
    fn next_index(&self) -> Option<usize> {
        match self.index {
            Some(i) => Some(i + 1).filter(|&i| i < self.keys.len()),
            None => (!self.keys.is_empty()).then_some(0),
        }
    }

    fn prev_index(&self) -> Option<usize> {
        match self.index {
            Some(i) => i.checked_sub(1),
            None => self.keys.len().checked_sub(1),
        }
    }

    fn get(&self) -> Option<&u32> {
        self.index.map(|i| &self.keys[i])
    }

    fn remove(&mut self, move_prev: bool) -> Option<u32> {
        let i = self.index?;
        let prev = self.prev_index();
        let key = self.keys.remove(i);

        // The next element slides into index `i`.
        self.index = if move_prev {
            prev
        } else {
            Some(i).filter(|&i| i < self.keys.len())
        };

        Some(key)
    }
}

/// Drives a [`CursorMut`](crate::CursorMut) and a cursor over a sorted `Vec` with the same
/// operations, asserting that they point at the same element after each one.
pub fn run_cursor_equivalence(mut values: Vec<u32>, ops: Vec<CursorOp>) {
    values.sort_unstable();
    values.dedup();

    let mut avl: AvlTree<TestNode> = AvlTree::new();
    for &key in &values {
        avl.insert(TestNode::new(key, key));
    }

    let mut model = VecCursor {
        keys: values,
        index: None,
    };
    model.index = model.next_index();

    let mut curs = avl.cursor_first_mut();
    assert_eq!(model.get(), curs.get().map(TestNode::key));

    for (step, op) in ops.into_iter().enumerate() {
        match op {
            CursorOp::MoveNext => {
                model.index = model.next_index();
                curs.move_next();
            }

            CursorOp::MovePrev => {
                model.index = model.prev_index();
                curs.move_prev();
            }

            CursorOp::PeekNext => assert_eq!(
                model.next_index().map(|i| &model.keys[i]),
                curs.peek_next().map(TestNode::key),
                "op #{step}: {op:?}"
            ),

            CursorOp::PeekPrev => assert_eq!(
                model.prev_index().map(|i| &model.keys[i]),
                curs.peek_prev().map(TestNode::key),
                "op #{step}: {op:?}"
            ),

            CursorOp::RemoveCurrent => assert_eq!(
                model.remove(false),
                curs.remove_current().map(|node| node.key),
                "op #{step}: {op:?}"
            ),

            CursorOp::RemoveCurrentMovePrev => assert_eq!(
                model.remove(true),
                curs.remove_current_and_move_prev().map(|node| node.key),
                "op #{step}: {op:?}"
            ),
        }

        assert_eq!(model.get(), curs.get().map(TestNode::key), "op #{step}: {op:?}");
    }

    drop(curs);
    avl.assert_invariants();
    assert!(model.keys.iter().eq(avl.iter().map(TestNode::key)));
}
