use std::collections::HashMap;

use proptest::prelude::*;
use terra_chunk::{ChunkHandle, ChunkRegistry, RegistryError};
use terra_world::ChunkCoord;

#[derive(Clone, Debug)]
enum Op {
    Add(i32),
    // Removes the n-th live handle (mod live count), or a stale one if none are live
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (-100i32..100).prop_map(Op::Add),
        2 => any::<usize>().prop_map(Op::Remove),
    ]
}

proptest! {
    // The registry agrees with a plain map after any sequence of adds and removes
    #[test]
    fn matches_model(cap in 1usize..24, ops in proptest::collection::vec(op(), 0..200)) {
        let mut reg: ChunkRegistry<i32> = ChunkRegistry::new(cap);
        let mut model: HashMap<ChunkHandle, i32> = HashMap::new();
        let mut live: Vec<ChunkHandle> = Vec::new();
        let mut dead: Vec<ChunkHandle> = Vec::new();

        for o in ops {
            match o {
                Op::Add(x) => match reg.add(ChunkCoord::new(x, 0, 0), x) {
                    Ok(h) => {
                        prop_assert!(model.len() < cap);
                        prop_assert!(!model.contains_key(&h));
                        model.insert(h, x);
                        live.push(h);
                    }
                    Err(RegistryError::CapacityExhausted { capacity }) => {
                        prop_assert_eq!(capacity, cap);
                        prop_assert_eq!(model.len(), cap);
                    }
                    Err(e) => prop_assert!(false, "unexpected {:?}", e),
                },
                Op::Remove(n) => {
                    if live.is_empty() {
                        if let Some(h) = dead.last().copied() {
                            prop_assert_eq!(reg.remove(h, |_| {}), Err(RegistryError::StaleHandle(h)));
                        }
                        continue;
                    }
                    let h = live.swap_remove(n % live.len());
                    let mut got = None;
                    reg.remove(h, |v| got = Some(v)).unwrap();
                    prop_assert_eq!(got, model.remove(&h));
                    dead.push(h);
                }
            }

            prop_assert_eq!(reg.count(), model.len());
            prop_assert_eq!(reg.positions().len(), reg.count());
            prop_assert_eq!(reg.visuals().len(), reg.count());
            for (h, x) in &model {
                let d = reg.lookup(*h).unwrap();
                prop_assert_eq!(reg.reverse_lookup(d), Some(*h));
                prop_assert_eq!(reg.visuals()[d], *x);
                prop_assert_eq!(reg.positions()[d], ChunkCoord::new(*x, 0, 0));
            }
            for h in &dead {
                prop_assert!(!reg.has(*h));
                prop_assert_eq!(reg.lookup(*h), None);
            }
        }
    }
}
