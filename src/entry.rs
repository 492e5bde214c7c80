use core::{borrow::Borrow, pin::Pin, ptr::NonNull};

use crate::{AvlTree, Dir, Links, TreeNode};

// A position where a node with a missing key can be attached.
pub(crate) enum Vacancy<T: ?Sized> {
    Root,
    Child { parent: NonNull<T>, dir: Dir },
}

/// The result of [`AvlTree::entry`]: either the element with the looked-up key, or the place such
/// an element would go.
pub enum Entry<'tree, 'key, T, Q>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: Borrow<Q>,
    Q: Ord + ?Sized,
{
    Vacant(VacantEntry<'tree, 'key, T, Q>),
    Occupied(OccupiedEntry<'tree, T>),
}

impl<'tree, 'key, T, Q> Entry<'tree, 'key, T, Q>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: Borrow<Q>,
    Q: Ord + ?Sized,
{
    pub fn is_occupied(&self) -> bool {
        matches!(self, Entry::Occupied(_))
    }

    /// Returns the element with the entry's key, inserting the one built by `make` if there is
    /// none.
    ///
    /// # Safety
    ///
    /// The element returned by `make` must have a key equal to the one the entry was looked up
    /// with.
    pub unsafe fn or_insert_with<F>(self, make: F) -> Pin<&'tree mut T>
    where
        F: FnOnce() -> T::Handle,
    {
        match self {
            Entry::Vacant(entry) => unsafe { entry.insert(make()) },
            Entry::Occupied(mut entry) => unsafe { entry.get_mut() },
        }
    }
}

pub struct VacantEntry<'tree, 'key, T, Q>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: Borrow<Q>,
    Q: Ord + ?Sized,
{
    pub(crate) tree: &'tree mut AvlTree<T>,
    pub(crate) key: &'key Q,
    pub(crate) at: Vacancy<T>,
}

impl<'tree, 'key, T, Q> VacantEntry<'tree, 'key, T, Q>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: Borrow<Q>,
    Q: Ord + ?Sized,
{
    /// Returns the key the entry was looked up with.
    pub fn key(&self) -> &'key Q {
        self.key
    }

    /// Links `item` into the vacant position and rebalances the tree.
    ///
    /// # Safety
    ///
    /// `item` must have a key equal to the one the entry was looked up with.
    pub unsafe fn insert(self, item: T::Handle) -> Pin<&'tree mut T> {
        let VacantEntry { tree, key, at } = self;
        let mut ptr = T::into_ptr(item);

        unsafe {
            debug_assert!(<T::Key as Borrow<Q>>::borrow(ptr.as_ref().key()) == key);

            tree.attach(at, ptr);
            Pin::new_unchecked(ptr.as_mut())
        }
    }
}

pub struct OccupiedEntry<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) tree: &'tree mut AvlTree<T>,
    pub(crate) node: NonNull<T>,
}

impl<'tree, T> OccupiedEntry<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub fn get(&self) -> &'tree T {
        // SAFETY: the tree stays mutably borrowed for 'tree.
        unsafe { self.node.as_ref() }
    }

    /// Returns a pinned mutable reference to the element.
    ///
    /// # Safety
    ///
    /// The caller must not change the element's key in a way that alters how it compares to the
    /// other keys in the tree.
    pub unsafe fn get_mut(&mut self) -> Pin<&'tree mut T> {
        unsafe { Pin::new_unchecked(self.node.as_mut()) }
    }

    /// Puts `item` in place of the current element and returns the element it displaced.
    ///
    /// The tree's shape and balance factors are unchanged.
    ///
    /// # Safety
    ///
    /// `item` must have a key equal to the current element's key.
    pub unsafe fn insert(&mut self, item: T::Handle) -> T::Handle {
        let new = T::into_ptr(item);
        let old = core::mem::replace(&mut self.node, new);

        unsafe { self.tree.replace_at(old, new) }
    }

    /// Unlinks the element and hands it back.
    pub fn remove(self) -> T::Handle {
        unsafe { self.tree.remove_at(self.node) }
    }
}
