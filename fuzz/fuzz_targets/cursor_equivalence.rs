#![no_main]

use cordyceps_avl::model::{self, CursorEquivalenceInput};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: CursorEquivalenceInput| {
    let CursorEquivalenceInput { values, ops } = input;
    model::run_cursor_equivalence(values, ops);
});
