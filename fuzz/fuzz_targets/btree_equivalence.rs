#![no_main]

use cordyceps_avl::model::{self, Op};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|ops: Vec<Op>| model::run_btree_equivalence(ops));
