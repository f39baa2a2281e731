#![no_main]

use libfuzzer_sys::fuzz_target;
use slabcache::ds::{OrderList, SlotId};

// Fuzz arbitrary operation sequences on OrderList
//
// Random push_front / pop_back / remove / lookup sequences, validating link
// symmetry and node accounting after every step.
fuzz_target!(|data: &[u8]| {
    let mut list: OrderList<u8> = OrderList::new();
    let mut live: Vec<SlotId> = Vec::new();

    let mut idx = 0;
    while idx + 1 < data.len() {
        let op = data[idx] % 5;
        let arg = data[idx + 1];

        match op {
            0 => {
                let id = list.push_front(arg);
                live.push(id);
            }
            1 => {
                if list.pop_back().is_some() {
                    // The popped node was the one no live id points at any
                    // more; drop whichever id went stale.
                    live.retain(|&id| list.contains(id));
                }
            }
            2 => {
                if !live.is_empty() {
                    let id = live.swap_remove(arg as usize % live.len());
                    list.remove(id);
                }
            }
            3 => {
                if !live.is_empty() {
                    let id = live[arg as usize % live.len()];
                    assert!(list.get(id).is_some());
                }
            }
            4 => {
                let count = list.iter().count();
                assert_eq!(count, list.len());
            }
            _ => unreachable!(),
        }

        list.debug_validate();
        idx += 2;
    }
});
