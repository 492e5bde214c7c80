use std::ptr::NonNull;

use cordyceps::Linked;
use cordyceps_avl::{
    equal_paths::{equal_paths, Node},
    AvlMap, AvlTree, Links, TreeNode,
};

#[derive(Debug)]
#[repr(C)]
struct Job {
    links: Links<Job>,
    deadline: u32,
    name: &'static str,
}

impl Job {
    fn new(deadline: u32, name: &'static str) -> Box<Job> {
        Box::new(Job {
            links: Links::new(),
            deadline,
            name,
        })
    }
}

unsafe impl Linked<Links<Job>> for Job {
    type Handle = Box<Job>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::from(Box::leak(r))
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<Job>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<Job>> for Job {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.deadline
    }
}

fn print_jobs(tree: &AvlTree<Job>) {
    let jobs: Vec<_> = tree.iter().map(|job| (job.deadline, job.name)).collect();
    println!("height {}: {jobs:?}", tree.height());
}

fn main() {
    let mut tree: AvlTree<Job> = AvlTree::new();

    for (deadline, name) in [(30, "deploy"), (10, "build"), (20, "test"), (40, "notify")] {
        tree.insert(Job::new(deadline, name));
        tree.assert_invariants();
        print_jobs(&tree);
    }

    // Same deadline: the old job is handed back.
    let replaced = tree.insert(Job::new(20, "test again"));
    assert_eq!(replaced.map(|job| job.name), Some("test"));
    tree.assert_invariants();
    print_jobs(&tree);

    #[cfg(feature = "dot")]
    {
        let mut dot = String::new();
        tree.dotgraph("jobs", &mut dot).expect("writing to a String cannot fail");
        println!("{dot}");
    }

    while let Some(job) = tree.pop_first() {
        println!("running {} (deadline {})", job.name, job.deadline);
        tree.assert_invariants();
    }

    let mut map: AvlMap<&str, u32> = AvlMap::new();
    for word in "the quick brown fox jumps over the lazy dog the end".split(' ') {
        let count = map.get(word).copied().unwrap_or(0);
        map.insert(word, count + 1);
    }
    map.assert_invariants();
    println!("{map:?} (height {})", map.height());

    let root = Node::leaf(2)
        .with_left(Node::leaf(1))
        .with_right(Node::leaf(3).with_right(Node::leaf(4)));
    println!("equal paths: {}", equal_paths(Some(&root)));
}
