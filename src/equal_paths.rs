//! Leaf depth checks for plain, unbalanced binary trees.

use alloc::boxed::Box;

/// A node of an owned binary tree with no ordering or balance requirements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub key: i32,
    pub left: Option<Box<Node>>,
    pub right: Option<Box<Node>>,
}

impl Node {
    /// Returns a node with no children.
    pub fn leaf(key: i32) -> Node {
        Node {
            key,
            left: None,
            right: None,
        }
    }

    pub fn with_left(mut self, left: Node) -> Node {
        self.left = Some(Box::new(left));
        self
    }

    pub fn with_right(mut self, right: Node) -> Node {
        self.right = Some(Box::new(right));
        self
    }

    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Returns `true` if every leaf of the tree rooted at `root` is at the same depth.
///
/// An empty tree trivially satisfies this. A node with a single child is not a leaf, so a chain of
/// nodes has exactly one leaf and always passes.
pub fn equal_paths(root: Option<&Node>) -> bool {
    let mut leaf_depth = None;

    match root {
        Some(root) => leaves_at_depth(root, 0, &mut leaf_depth),
        None => true,
    }
}

// Records the depth of the first leaf reached and compares every later leaf against it.
fn leaves_at_depth(node: &Node, depth: usize, leaf_depth: &mut Option<usize>) -> bool {
    if node.is_leaf() {
        return match *leaf_depth {
            Some(expected) => expected == depth,
            None => {
                *leaf_depth = Some(depth);
                true
            }
        };
    }

    [&node.left, &node.right]
        .into_iter()
        .flatten()
        .all(|child| leaves_at_depth(child, depth + 1, leaf_depth))
}
