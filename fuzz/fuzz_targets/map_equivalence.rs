#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use cordyceps_avl::AvlMap;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum MapOp {
    Insert(u8, u16),
    Remove(u8),
    PopFirst,
    PopLast,
}

fuzz_target!(|ops: Vec<MapOp>| {
    let mut btree = BTreeMap::new();
    let mut avl = AvlMap::new();

    for op in ops {
        match op {
            MapOp::Insert(key, value) => {
                assert_eq!(btree.insert(key, value), avl.insert(key, value));
            }
            MapOp::Remove(key) => assert_eq!(btree.remove(&key), avl.remove(&key)),
            MapOp::PopFirst => assert_eq!(btree.pop_first(), avl.pop_first()),
            MapOp::PopLast => assert_eq!(btree.pop_last(), avl.pop_last()),
        }

        avl.assert_invariants();
    }

    assert!(btree.iter().eq(avl.iter()));
});
