//! An intrusive AVL tree.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

// Conventions used in comments:
// - The height of a subtree `x` is denoted `h(x)`. A missing subtree has height 0.
// - The balance of a node `x` is denoted `b(x)` and equals `h(right(x)) - h(left(x))`.
// - The parent of a node `x` is denoted `p(x)`.
// - A node leans left if `b(x) < 0` and leans right if `b(x) > 0`.
//
// The fundamental invariant of an AVL tree is that `b(x) ∈ {-1, 0, 1}` for every node.
//
// While a rebalance is in progress, exactly one node on the path to the root may be observed
// (but is never stored) with `b(x) = ±2`. That node is restored with one or two rotations.
//
// Corollaries:
// 1. A node with balance 0 and exactly one free child slot does not exist: if one side is empty
//    and the balance is 0, the other side is empty as well. Attaching a child to a node with
//    balance 0 therefore always attaches to a leaf.
// 2. The height of a tree with `n` nodes is at most ~1.44 log2(n + 2).

#[cfg(feature = "alloc")]
extern crate alloc;

mod cursor;
#[cfg(feature = "dot")]
mod debug;
mod entry;
#[cfg(feature = "alloc")]
pub mod equal_paths;
mod iter;
#[cfg(feature = "alloc")]
pub mod map;
#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

use core::{
    borrow::Borrow, cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not,
    pin::Pin, ptr::NonNull,
};

use cordyceps::Linked;

pub use cursor::{Cursor, CursorMut};
pub use entry::{Entry, OccupiedEntry, VacantEntry};
pub use iter::Iter;
#[cfg(feature = "alloc")]
pub use map::AvlMap;

use entry::Vacancy;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// Every node stores the height difference of its two subtrees, which is kept in `{-1, 0, 1}` by
/// rotations after each insertion and removal.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    /// The change in balance of a node whose `self` subtree grows by one level.
    #[inline]
    fn sign(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    balance: i8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

/// Returns the balances of the top and middle nodes of a double rotation.
///
/// `bottom` is the pre-rotation balance of the node that ends up on top, and `lean` is the sign of
/// the direction the top node leaned before the rotation. The bottom node always ends at 0.
fn double_rotation_balances(bottom: i8, lean: i8) -> (i8, i8) {
    // Keyed by the bottom node's lean relative to the top node's lean.
    match bottom * lean {
        1 => (-lean, 0),
        0 => (0, 0),
        -1 => (0, lean),
        _ => unreachable!("balance factor {bottom} out of range"),
    }
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        debug_assert!((self.len == 0) == self.root.is_none());
        self.len == 0
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of levels in the tree.
    ///
    /// An empty tree has height 0 and a single element has height 1. This follows the balance
    /// factors down the taller side, so it completes in _O(log(n))_ time.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            height += 1;

            unsafe {
                let links = T::links(cur).as_ref();
                opt_cur = if links.balance() < 0 {
                    links.left()
                } else {
                    links.right().or(links.left())
                };
            }
        }

        height
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let mut count = 0;

        if let Some(root) = self.root {
            unsafe {
                assert!(
                    T::links(root).as_ref().parent().is_none(),
                    "root must not have a parent"
                );
                self.assert_invariants_at(root, None, None, &mut count);
            }
        }

        assert_eq!(count, self.len, "`len` does not match the number of linked nodes");
    }

    // Checks the subtree rooted at `node` and returns its height.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at(
        &self,
        node: NonNull<T>,
        lower: Option<&T::Key>,
        upper: Option<&T::Key>,
        count: &mut usize,
    ) -> i32 {
        *count += 1;

        unsafe {
            let key = node.as_ref().key();

            // Ensure keys are ordered with respect to all ancestors.
            if let Some(lower) = lower {
                assert!(lower < key, "key ordering violated in right subtree");
            }
            if let Some(upper) = upper {
                assert!(key < upper, "key ordering violated in left subtree");
            }

            let mut heights = [0; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = T::links(node).as_ref().child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    let (lower, upper) = match dir {
                        Dir::Left => (lower, Some(key)),
                        Dir::Right => (Some(key), upper),
                    };

                    heights[dir as usize] = self.assert_invariants_at(child, lower, upper, count);
                }
            }

            // Ensure the stored balance is accurate and in range.
            let balance = T::links(node).as_ref().balance();
            assert_eq!(
                i32::from(balance),
                heights[Dir::Right as usize] - heights[Dir::Left as usize],
                "stored balance does not match subtree heights"
            );
            assert!((-1..=1).contains(&balance), "node is out of balance");

            1 + heights[0].max(heights[1])
        }
    }

    /// Returns `true` if the tree contains an element with the key `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the node corresponding to `key`.
    ///
    /// The caller must not change the node's key in a way that alters its ordering, or the tree
    /// will no longer find it.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.search(key).ok()
    }

    // Descends the tree looking for `key`.
    //
    // Returns the matching node, or the position a node with that key would be attached at.
    fn search<Q>(&self, key: &Q) -> Result<NonNull<T>, Vacancy<T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(mut cur) = self.root else {
            return Err(Vacancy::Root);
        };

        loop {
            let dir = unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => Dir::Left,
                    Ordering::Equal => return Ok(cur),
                    Ordering::Greater => Dir::Right,
                }
            };

            match unsafe { T::links(cur).as_ref().child(dir) } {
                Some(child) => cur = child,
                None => return Err(Vacancy::Child { parent: cur, dir }),
            }
        }
    }

    /// Gets the entry for `key` for in-place manipulation.
    pub fn entry<'tree, 'key, Q>(&'tree mut self, key: &'key Q) -> Entry<'tree, 'key, T, Q>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.search(key) {
            Ok(node) => Entry::Occupied(OccupiedEntry { tree: self, node }),
            Err(at) => Entry::Vacant(VacantEntry {
                tree: self,
                key,
                at,
            }),
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        self.first_raw()
            .map(|first| unsafe { Pin::new_unchecked(first.as_ref()) })
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        self.last_raw()
            .map(|last| unsafe { Pin::new_unchecked(last.as_ref()) })
    }

    fn first_raw(&self) -> Link<T> {
        self.root
            .map(|root| unsafe { self.extreme_in_subtree(root, Dir::Left) })
    }

    fn last_raw(&self) -> Link<T> {
        self.root
            .map(|root| unsafe { self.extreme_in_subtree(root, Dir::Right) })
    }

    /// Returns an iterator over the elements of the tree, in key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns a cursor pointing at the minimum element of the tree.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        Cursor::new(self, self.first_raw())
    }

    /// Returns a cursor pointing at the maximum element of the tree.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        Cursor::new(self, self.last_raw())
    }

    /// Returns an editing cursor pointing at the minimum element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T> {
        let first = self.first_raw();
        CursorMut::new(self, first)
    }

    /// Returns an editing cursor pointing at the maximum element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T> {
        let last = self.last_raw();
        CursorMut::new(self, last)
    }

    // Returns the furthest node in direction `dir` in the subtree rooted at `root`.
    #[inline]
    unsafe fn extreme_in_subtree(&self, root: NonNull<T>, dir: Dir) -> NonNull<T> {
        let mut cur = root;

        while let Some(child) = unsafe { T::links(cur).as_ref().child(dir) } {
            cur = child;
        }

        cur
    }

    // Returns the in-order neighbour of `node` in direction `dir`.
    unsafe fn neighbor_raw(&self, node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            if let Some(child) = T::links(node).as_ref().child(dir) {
                return Some(self.extreme_in_subtree(child, !dir));
            }

            // Climb until `cur` is reached from the opposite side.
            let mut cur = node;
            while let Some(parent) = T::links(cur).as_ref().parent() {
                if T::links(parent).as_ref().child(!dir) == Some(cur) {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }

    /// Returns the in-order predecessor of `node`.
    #[inline]
    unsafe fn predecessor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Left) }
    }

    /// Returns the in-order successor of `node`.
    #[inline]
    unsafe fn successor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Right) }
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Points the slot of `parent` that holds `old_child` at `new_child` instead. The caller fixes up
    // `new_child`'s parent link.
    //
    // `old_child` must be a child of `parent`, and `new_child` must not already be its other child.
    #[inline]
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);

            if cfg!(debug_assertions) {
                if let Some(new_child) = new_child {
                    assert_ne!(
                        T::links(parent).as_ref().child(!dir),
                        Some(new_child),
                        "`new_child` must not be a child of `parent`"
                    );
                }
            }

            T::links(parent).as_mut().set_child(dir, new_child);
        }
    }

    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        unsafe {
            if T::links(parent).as_ref().left() == Some(child) {
                Dir::Left
            } else {
                debug_assert_eq!(
                    T::links(parent).as_ref().right(),
                    Some(child),
                    "`child` must be a child of `parent`"
                );
                Dir::Right
            }
        }
    }

    // Moves `pivot` down in direction `dir`, promoting its child on the opposite side into its
    // place. `rotate(x, Dir::Left)` is a left rotation at `x`.
    //
    // Returns the promoted node. Balances of affected nodes are not updated.
    fn rotate(&mut self, pivot: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let up = T::links(pivot)
                .as_ref()
                .child(!dir)
                .expect("rotation requires the promoted child to be present");
            let parent = T::links(pivot).as_ref().parent();

            tracing::trace!(?dir, "rotate");

            // `across` goes from the `dir` child of `up` to the `!dir` child of `pivot`.
            let across = T::links(up).as_ref().child(dir);
            T::links(pivot).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(pivot));

            self.replace_child_or_set_root(parent, pivot, Some(up));
            T::links(up).as_mut().set_parent(parent);

            T::links(up).as_mut().set_child(dir, Some(pivot));
            T::links(pivot).as_mut().set_parent(Some(up));

            up
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already holds an item with an equal key, `item` takes over its position and the
    /// previous item is returned. Otherwise `None` is returned.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        unsafe {
            match self.search(ptr.as_ref().key()) {
                Ok(existing) => Some(self.replace_at(existing, ptr)),
                Err(at) => {
                    self.attach(at, ptr);
                    None
                }
            }
        }
    }

    // Links `ptr` into the vacant position `at` found by `search`.
    unsafe fn attach(&mut self, at: Vacancy<T>, ptr: NonNull<T>) {
        unsafe {
            match at {
                Vacancy::Root => self.insert_as_root(ptr),
                Vacancy::Child { parent, dir } => self.insert_as_child(parent, dir, ptr),
            }
        }
    }

    // Links `ptr` as the root of an empty tree.
    unsafe fn insert_as_root(&mut self, ptr: NonNull<T>) {
        debug_assert!(self.root.is_none());

        unsafe { T::links(ptr).as_mut().clear() };

        self.root = Some(ptr);
        self.len += 1;
    }

    // Links `ptr` into the empty `dir` slot of `parent` and rebalances.
    unsafe fn insert_as_child(&mut self, parent: NonNull<T>, dir: Dir, ptr: NonNull<T>) {
        unsafe {
            debug_assert!(T::links(parent).as_ref().child(dir).is_none());

            let links = T::links(ptr).as_mut();
            links.clear();
            links.set_parent(Some(parent));
            T::links(parent).as_mut().set_child(dir, Some(ptr));
            self.len += 1;

            let parent_links = T::links(parent).as_mut();
            if parent_links.balance() != 0 {
                // The parent had a single child on the other side. It is now balanced and its
                // height is unchanged.
                debug_assert_eq!(parent_links.balance(), -dir.sign());
                parent_links.set_balance(0);
                return;
            }

            // The parent was a leaf and grew by one level.
            parent_links.set_balance(dir.sign());
        }

        self.rebalance_inserted(parent, ptr);
    }

    // Swaps `new` into the position of `old`, which is unlinked and returned.
    unsafe fn replace_at(&mut self, old: NonNull<T>, new: NonNull<T>) -> T::Handle {
        unsafe {
            let old_links = T::links(old).as_ref();
            let parent = old_links.parent();
            let left = old_links.left();
            let right = old_links.right();
            let balance = old_links.balance();

            self.replace_child_or_set_root(parent, old, Some(new));
            self.maybe_set_parent(left, Some(new));
            self.maybe_set_parent(right, Some(new));

            let new_links = T::links(new).as_mut();
            new_links.set_parent(parent);
            new_links.set_left(left);
            new_links.set_right(right);
            new_links.set_balance(balance);

            T::links(old).as_mut().clear();

            T::from_ptr(old)
        }
    }

    // Performs a bottom-up rebalance of the tree after an insertion below `parent`.
    //
    // Invariants:
    // - The subtree rooted at `parent` grew by one level, on the side of its child `node`.
    // - `b(parent)` is ±1 and `parent` leans toward `node`.
    fn rebalance_inserted(&mut self, mut parent: NonNull<T>, mut node: NonNull<T>) {
        unsafe {
            loop {
                let Some(grandparent) = T::links(parent).as_ref().parent() else {
                    // The root grew; there is nothing above it to fix.
                    return;
                };

                let dir = self.which_child(grandparent, parent);
                let balance = T::links(grandparent)
                    .as_ref()
                    .balance()
                    .checked_add(dir.sign())
                    .expect("balance factor overflow");

                match balance {
                    // The shorter side caught up; the height of `grandparent` is unchanged.
                    0 => {
                        T::links(grandparent).as_mut().set_balance(0);
                        tracing::trace!("insert absorbed by a balanced ancestor");
                        return;
                    }

                    // `grandparent` was balanced and now leans; its height grew.
                    -1 | 1 => {
                        T::links(grandparent).as_mut().set_balance(balance);
                        node = parent;
                        parent = grandparent;
                    }

                    -2 | 2 => {
                        let parent_balance = T::links(parent).as_ref().balance();

                        if parent_balance == dir.sign() {
                            // Zig-zig: a single rotation restores the pre-insertion height.
                            self.rotate(grandparent, !dir);
                            T::links(parent).as_mut().set_balance(0);
                            T::links(grandparent).as_mut().set_balance(0);
                        } else {
                            // Zig-zag: `node` leans away from `parent` or is the new leaf.
                            let node_balance = T::links(node).as_ref().balance();
                            tracing::trace!(node_balance, "double rotation after insert");

                            self.rotate(parent, dir);
                            self.rotate(grandparent, !dir);

                            let (top, middle) = double_rotation_balances(node_balance, dir.sign());
                            T::links(grandparent).as_mut().set_balance(top);
                            T::links(parent).as_mut().set_balance(middle);
                            T::links(node).as_mut().set_balance(0);
                        }

                        return;
                    }

                    _ => unreachable!("balance factor {balance} out of range"),
                }
            }
        }
    }

    /// Removes the element with the key `key` from the tree, if present.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        unsafe { Some(self.remove_at(node)) }
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        unsafe { Some(self.remove_at(first)) }
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        unsafe { Some(self.remove_at(last)) }
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are three possible cases:
        //
        // 1. `node` has two children.
        //
        //    `node` trades places (and balances) with its predecessor, the maximum node of its left
        //    subtree. The predecessor has no right child, so `node` now matches case 2 or 3.
        //
        // 2. `node` has one child.
        //
        //    By the balance invariant that child is a leaf. It is elevated into `node`'s slot.
        //
        // 3. `node` is a leaf.
        //
        //    Its slot is cleared.
        //
        // Either way, the subtree that contained `node` lost one level on `node`'s side, and the
        // parent's balance shifts away from that side.

        unsafe {
            let has_two_children = {
                let links = T::links(node).as_ref();
                links.left().is_some() && links.right().is_some()
            };

            if has_two_children {
                let pred = self
                    .predecessor_raw(node)
                    .expect("a node with a left subtree has a predecessor");
                self.swap_nodes(node, pred);
            }

            let links = T::links(node).as_ref();
            let parent = links.parent();
            let child = links.left().or(links.right());

            // When the root is detached there is nothing above it to rebalance.
            let diff = match parent {
                Some(parent) => -self.which_child(parent, node).sign(),
                None => 0,
            };

            self.replace_child_or_set_root(parent, node, child);
            self.maybe_set_parent(child, parent);

            T::links(node).as_mut().clear();
            self.len -= 1;

            self.rebalance_removed(parent, diff);

            T::from_ptr(node)
        }
    }

    // Performs a bottom-up rebalance of the tree after a removal.
    //
    // `diff` is the pending change to `b(opt_node)`: +1 if its left subtree lost a level, -1 if
    // its right subtree did.
    fn rebalance_removed(&mut self, mut opt_node: Link<T>, mut diff: i8) {
        unsafe {
            while let Some(node) = opt_node {
                // The shift for the next level must be read before any rotation moves `node`.
                let parent = T::links(node).as_ref().parent();
                let parent_diff = parent
                    .map(|parent| -self.which_child(parent, node).sign())
                    .unwrap_or(0);

                let balance = T::links(node)
                    .as_ref()
                    .balance()
                    .checked_add(diff)
                    .expect("balance factor overflow");

                match balance {
                    -2 | 2 => {
                        let heavy = if balance < 0 { Dir::Left } else { Dir::Right };
                        let lean = heavy.sign();
                        let child = T::links(node)
                            .as_ref()
                            .child(heavy)
                            .expect("the taller subtree must not be empty");
                        let child_balance = T::links(child).as_ref().balance();

                        if child_balance == lean {
                            // Zig-zig: the subtree is one level shorter after the rotation.
                            self.rotate(node, !heavy);
                            T::links(node).as_mut().set_balance(0);
                            T::links(child).as_mut().set_balance(0);
                        } else if child_balance == 0 {
                            // The subtree keeps its height, so nothing above changes.
                            self.rotate(node, !heavy);
                            T::links(node).as_mut().set_balance(lean);
                            T::links(child).as_mut().set_balance(-lean);
                            tracing::trace!("remove rotation kept subtree height");
                            return;
                        } else {
                            // Zig-zag: the subtree is one level shorter after the rotations.
                            let grandchild = T::links(child)
                                .as_ref()
                                .child(!heavy)
                                .expect("a child leaning away has a grandchild on that side");
                            let grandchild_balance = T::links(grandchild).as_ref().balance();
                            tracing::trace!(grandchild_balance, "double rotation after remove");

                            self.rotate(child, heavy);
                            self.rotate(node, !heavy);

                            let (top, middle) = double_rotation_balances(grandchild_balance, lean);
                            T::links(node).as_mut().set_balance(top);
                            T::links(child).as_mut().set_balance(middle);
                            T::links(grandchild).as_mut().set_balance(0);
                        }
                    }

                    // `node` was balanced and absorbed the loss; its height is unchanged.
                    -1 | 1 => {
                        T::links(node).as_mut().set_balance(balance);
                        tracing::trace!(balance, "remove absorbed");
                        return;
                    }

                    // The taller side shrank; the height of `node` decreased.
                    0 => T::links(node).as_mut().set_balance(0),

                    _ => unreachable!("balance factor {balance} out of range"),
                }

                opt_node = parent;
                diff = parent_diff;
            }
        }
    }

    // Exchanges the positions of `a` and `b` in the tree, including their balances.
    //
    // Keys and values stay with their nodes, so ordering is violated until one of the two is
    // unlinked or they are swapped back.
    unsafe fn swap_nodes(&mut self, a: NonNull<T>, b: NonNull<T>) {
        unsafe {
            self.swap_positions(a, b);

            let a_balance = T::links(a).as_ref().balance();
            let b_balance = T::links(b).as_ref().balance();
            T::links(a).as_mut().set_balance(b_balance);
            T::links(b).as_mut().set_balance(a_balance);
        }

        tracing::trace!("swapped nodes");
    }

    // Exchanges the links of `a` and `b`, updating the links of their neighbours.
    //
    // Balances are not updated.
    unsafe fn swap_positions(&mut self, a: NonNull<T>, b: NonNull<T>) {
        if a == b {
            return;
        }

        unsafe {
            // If the nodes are adjacent, let `a` be the parent.
            let (a, b) = if T::links(a).as_ref().parent() == Some(b) {
                (b, a)
            } else {
                (a, b)
            };

            let a_parent = T::links(a).as_ref().parent();
            let a_dir = a_parent.map(|p| self.which_child(p, a));
            let b_parent = T::links(b).as_ref().parent();
            let b_dir = b_parent.map(|p| self.which_child(p, b));

            let a_children = [T::links(a).as_ref().left(), T::links(a).as_ref().right()];
            let b_children = [T::links(b).as_ref().left(), T::links(b).as_ref().right()];

            if b_parent == Some(a) {
                let dir = b_dir.expect("child has a side");

                // `b` takes `a`'s slot, and `a` becomes `b`'s `dir` child.
                match (a_parent, a_dir) {
                    (Some(p), Some(d)) => {
                        T::links(p).as_mut().set_child(d, Some(b));
                    }
                    _ => self.root = Some(b),
                }
                T::links(b).as_mut().set_parent(a_parent);
                T::links(a).as_mut().set_parent(Some(b));

                let sibling = a_children[(!dir) as usize];
                T::links(b).as_mut().set_child(dir, Some(a));
                T::links(b).as_mut().set_child(!dir, sibling);
                self.maybe_set_parent(sibling, Some(b));
            } else {
                // Setting through the captured directions also covers the case where `a` and `b`
                // are siblings.
                match (a_parent, a_dir) {
                    (Some(p), Some(d)) => {
                        T::links(p).as_mut().set_child(d, Some(b));
                    }
                    _ => self.root = Some(b),
                }
                match (b_parent, b_dir) {
                    (Some(p), Some(d)) => {
                        T::links(p).as_mut().set_child(d, Some(a));
                    }
                    _ => self.root = Some(a),
                }
                T::links(a).as_mut().set_parent(b_parent);
                T::links(b).as_mut().set_parent(a_parent);

                for dir in [Dir::Left, Dir::Right] {
                    let a_child = a_children[dir as usize];
                    T::links(b).as_mut().set_child(dir, a_child);
                    self.maybe_set_parent(a_child, Some(b));
                }
            }

            for dir in [Dir::Left, Dir::Right] {
                let b_child = b_children[dir as usize];
                T::links(a).as_mut().set_child(dir, b_child);
                self.maybe_set_parent(b_child, Some(a));
            }
        }
    }

    /// Removes and drops every element.
    ///
    /// Leaves are freed first, so the teardown needs no extra memory.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root.take();

        while let Some(cur) = opt_cur {
            unsafe {
                let links = T::links(cur).as_ref();

                if let Some(child) = links.left().or(links.right()) {
                    opt_cur = Some(child);
                    continue;
                }

                let parent = links.parent();
                if let Some(parent) = parent {
                    let dir = self.which_child(parent, cur);
                    T::links(parent).as_mut().set_child(dir, None);
                }

                T::links(cur).as_mut().clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                opt_cur = parent;
            }
        }

        debug_assert_eq!(self.len, 0);
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                balance: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn balance(&self) -> i8 {
        unsafe { (*self.inner.get()).balance }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_balance(&mut self, balance: i8) {
        debug_assert!((-1..=1).contains(&balance), "stored balance {balance} out of range");
        self.inner.get_mut().balance = balance;
    }

    // Resets the links to the unlinked state.
    #[inline]
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.balance = 0;
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("balance", &self.balance())
            .finish()
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}
