use core::{fmt, pin::Pin};

use crate::{AvlTree, Dir, Link, Links, TreeNode};

// Moves one position from `from` toward `dir`. The ghost position sits between the last and the
// first element, so stepping off either end lands on it and stepping from it wraps around.
fn step<T>(tree: &AvlTree<T>, from: Link<T>, dir: Dir) -> Link<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    match from {
        Some(node) => unsafe { tree.neighbor_raw(node, dir) },
        None => tree
            .root
            .map(|root| unsafe { tree.extreme_in_subtree(root, !dir) }),
    }
}

/// A read-only cursor over an [`AvlTree`].
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first.
pub struct Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: &'tree AvlTree<T>,
    current: Link<T>,
}

impl<'tree, T> Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn new(tree: &'tree AvlTree<T>, current: Link<T>) -> Self {
        Cursor { tree, current }
    }

    /// Moves the cursor to the next element, or from the last element to the ghost.
    pub fn move_next(&mut self) {
        self.current = step(self.tree, self.current, Dir::Right);
    }

    /// Moves the cursor to the previous element, or from the first element to the ghost.
    pub fn move_prev(&mut self) {
        self.current = step(self.tree, self.current, Dir::Left);
    }

    /// Returns the element under the cursor, or `None` at the ghost.
    pub fn get(&self) -> Option<&'tree T> {
        self.current.map(|node| unsafe { node.as_ref() })
    }

    pub fn peek_next(&self) -> Option<&'tree T> {
        step(self.tree, self.current, Dir::Right).map(|node| unsafe { node.as_ref() })
    }

    pub fn peek_prev(&self) -> Option<&'tree T> {
        step(self.tree, self.current, Dir::Left).map(|node| unsafe { node.as_ref() })
    }
}

impl<'tree, T> Clone for Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn clone(&self) -> Self {
        Cursor::new(self.tree, self.current)
    }
}

impl<'tree, T> fmt::Debug for Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + fmt::Debug + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.get()).finish()
    }
}

/// A cursor over an [`AvlTree`] which can remove the elements it passes over.
///
/// Like [`Cursor`], it moves over the elements in key order plus one "ghost" position.
pub struct CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: &'tree mut AvlTree<T>,
    current: Link<T>,
}

impl<'tree, T> CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn new(tree: &'tree mut AvlTree<T>, current: Link<T>) -> Self {
        CursorMut { tree, current }
    }

    /// Returns a read-only cursor at the same position.
    ///
    /// The `CursorMut` stays borrowed for the lifetime of the returned `Cursor`.
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor::new(self.tree, self.current)
    }

    pub fn move_next(&mut self) {
        self.current = step(self.tree, self.current, Dir::Right);
    }

    pub fn move_prev(&mut self) {
        self.current = step(self.tree, self.current, Dir::Left);
    }

    /// Returns the element under the cursor, or `None` at the ghost.
    pub fn get(&self) -> Option<&T> {
        self.current.map(|node| unsafe { node.as_ref() })
    }

    /// Returns a pinned mutable reference to the element under the cursor.
    ///
    /// # Safety
    ///
    /// The caller must not change the element's key in a way that alters how it compares to the
    /// other keys in the tree.
    pub unsafe fn get_mut(&mut self) -> Option<Pin<&mut T>> {
        self.current
            .map(|mut node| unsafe { Pin::new_unchecked(node.as_mut()) })
    }

    pub fn peek_next(&self) -> Option<&T> {
        step(self.tree, self.current, Dir::Right).map(|node| unsafe { node.as_ref() })
    }

    pub fn peek_prev(&self) -> Option<&T> {
        step(self.tree, self.current, Dir::Left).map(|node| unsafe { node.as_ref() })
    }

    /// Removes the element under the cursor and moves to the next one.
    ///
    /// At the ghost position this returns `None` and changes nothing.
    pub fn remove_current(&mut self) -> Option<T::Handle> {
        self.remove_and_step(Dir::Right)
    }

    /// Removes the element under the cursor and moves to the previous one.
    ///
    /// At the ghost position this returns `None` and changes nothing.
    pub fn remove_current_and_move_prev(&mut self) -> Option<T::Handle> {
        self.remove_and_step(Dir::Left)
    }

    fn remove_and_step(&mut self, dir: Dir) -> Option<T::Handle> {
        let node = self.current?;

        // Removal moves nodes between positions but never frees any node other than `node`, so
        // the neighbour found here is still linked afterwards.
        self.current = step(self.tree, self.current, dir);

        Some(unsafe { self.tree.remove_at(node) })
    }
}

impl<'tree, T> fmt::Debug for CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + fmt::Debug + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CursorMut").field(&self.get()).finish()
    }
}
