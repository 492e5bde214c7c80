extern crate std;

use core::ptr::NonNull;
use std::{collections::VecDeque, fmt, prelude::v1::*};

use crate::{AvlTree, Dir, Links, TreeNode};

enum Slot<T: ?Sized> {
    Node(NonNull<T>),
    Empty(u32),
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: fmt::Display,
{
    /// Writes the tree to `w` in Graphviz DOT format.
    ///
    /// Nodes are laid out one rank per level and labelled `key:balance`. Empty child slots are
    /// drawn as points so that left and right children stay on their own side.
    pub fn dotgraph<W: fmt::Write>(&self, name: &str, mut w: W) -> fmt::Result {
        let Some(root) = self.root else {
            return write!(w, "digraph \"graph-{name}\" {{}}");
        };

        writeln!(w, "digraph \"graph-{name}\" {{")?;
        writeln!(w, " subgraph \"subgraph-{name}\" {{")?;

        let mut queue = VecDeque::from([Slot::Node(root)]);
        let mut edges = String::new();
        let mut empty = 0;

        while !queue.is_empty() {
            use fmt::Write;

            write!(w, "  {{rank=same; ")?;

            for _ in 0..queue.len() {
                let node = match queue.pop_front() {
                    Some(Slot::Node(node)) => node,
                    Some(Slot::Empty(id)) => {
                        write!(w, "\"{name}-empty{id}\" [shape=point]; ")?;
                        continue;
                    }
                    None => break,
                };

                let (key, links) = unsafe { (node.as_ref().key(), T::links(node).as_ref()) };
                write!(w, "\"{name}-{key}\" [label=\"{key}:{}\"]; ", links.balance())?;

                for dir in [Dir::Left, Dir::Right] {
                    match links.child(dir) {
                        Some(child) => {
                            let child_key = unsafe { child.as_ref().key() };
                            writeln!(edges, "  \"{name}-{key}\" -> \"{name}-{child_key}\";")?;
                            queue.push_back(Slot::Node(child));
                        }
                        None => {
                            writeln!(edges, "  \"{name}-{key}\" -> \"{name}-empty{empty}\";")?;
                            queue.push_back(Slot::Empty(empty));
                            empty += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&edges)?;
        w.write_str(" }\n}\n")
    }
}
