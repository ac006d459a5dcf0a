#![cfg(test)]

// Property tests for Dict kept inside the crate so they can check the
// raw table invariants after every operation.

use crate::alloc::Bounded;
use crate::dict::Dict;
use crate::policy::MIN_TABLE_SIZE;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Set(usize, i32),
    Replace(usize, i32),
    Remove(usize),
    Del(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    Iterate,
    Step,
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=48).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        // Weighted toward growth so resizes happen in both directions.
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Set(i, v)),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Replace(i, v)),
            3 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::Del),
            2 => idx.clone().prop_map(OpI::Get),
            1 => prop_oneof![contains_pool, "[a-z]{0,4}"].prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Step),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..200).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Drive `sut` and a `HashMap` model through `ops`, checking after each op:
/// - `get`/`contains` parity with the model, including mid-rehash;
/// - `replace`/`remove` hand back exactly the model's displaced value;
/// - `iter` yields every live key exactly once, with `len()` items;
/// - table sizes are 0 or powers of two `>= MIN_TABLE_SIZE`, chains and
///   `used` counts are consistent;
/// - `len`/`is_empty` parity with the model.
fn run_state_machine<A: crate::alloc::Allocator>(
    sut: &mut Dict<String, i32, A>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();
    for op in ops {
        match op {
            OpI::Set(i, v) => {
                let k = pool[i].clone();
                sut.set(k.clone(), v).expect("global allocator never refuses");
                model.insert(k, v);
            }
            OpI::Replace(i, v) => {
                let k = pool[i].clone();
                let old = sut.replace(k.clone(), v).expect("allocation");
                prop_assert_eq!(old, model.insert(k, v));
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.remove(k), model.remove(k));
                prop_assert!(!sut.contains(k));
            }
            OpI::Del(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.del(k), model.remove(k).is_some());
            }
            OpI::Get(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.get(k), model.get(k));
            }
            OpI::Contains(s) => {
                prop_assert_eq!(sut.contains(&s), model.contains_key(&s));
            }
            OpI::Mutate(i, d) => {
                let k = &pool[i];
                match (sut.get_mut(k), model.get_mut(k)) {
                    (Some(sv), Some(mv)) => {
                        *sv = sv.saturating_add(d);
                        *mv = mv.saturating_add(d);
                    }
                    (None, None) => {}
                    (s, m) => prop_assert!(false, "presence mismatch: {:?} vs {:?}", s, m),
                }
            }
            OpI::Iterate => {
                let it = sut.iter();
                prop_assert_eq!(it.len(), model.len());
                let pairs: Vec<(String, i32)> = it.map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(pairs.len(), model.len());
                let s_keys: BTreeSet<_> = pairs.iter().map(|(k, _)| k.clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
                for (k, v) in &pairs {
                    prop_assert_eq!(Some(v), model.get(k));
                }
            }
            OpI::Step => {
                let before = sut.table_sizes();
                let pending = sut.rehash_step();
                if !pending {
                    prop_assert!(!sut.is_rehashing());
                    prop_assert_eq!(sut.table_sizes()[1], 0);
                } else {
                    prop_assert_eq!(sut.table_sizes(), before);
                }
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.table_sizes(), [0, 0]);
            }
        }

        sut.raw.assert_invariants();
        for size in sut.table_sizes() {
            prop_assert!(size == 0 || (size.is_power_of_two() && size >= MIN_TABLE_SIZE));
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }

    // Nothing lost once any pending rehash completes.
    while sut.rehash_step() {}
    for (k, v) in &model {
        prop_assert_eq!(sut.get(k), Some(v));
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap
// with the default hasher.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let mut sut: Dict<String, i32> = Dict::new();
        run_state_machine(&mut sut, &pool, ops)?;
    }
}

// Property: same invariants under worst-case collisions (every key hashes
// to 0). Resizes still happen; every chain lives in bucket 0.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let mut sut: Dict<String, i32> = Dict::builder()
            .hash(|_| 0)
            .compare(|a, b| a == b)
            .build()
            .unwrap();
        run_state_machine(&mut sut, &pool, ops)?;
    }
}

// Property: destructors see every released key and value exactly once,
// and every byte announced to the allocator is returned on drop.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_releases_balance((pool, ops) in arb_scenario()) {
        let keys_freed = Rc::new(Cell::new(0usize));
        let values_freed = Rc::new(Cell::new(0usize));
        let alloc = Rc::new(Bounded::new(usize::MAX));
        let (kf, vf) = (keys_freed.clone(), values_freed.clone());
        let mut sut: Dict<String, i32, Rc<Bounded>> = Dict::builder_in(alloc.clone())
            .hash(|k: &String| k.len() as u64 * 0x9e37_79b9)
            .compare(|a, b| a == b)
            .free_key(move |_| kf.set(kf.get() + 1))
            .free_value(move |_| vf.set(vf.get() + 1))
            .build()
            .unwrap();

        let mut keys_in = 0usize;
        let mut values_in = 0usize;
        let mut handed_back_values = 0usize;
        for op in ops {
            match op {
                OpI::Set(i, v) | OpI::Mutate(i, v) => {
                    keys_in += 1;
                    values_in += 1;
                    sut.set(pool[i].clone(), v).unwrap();
                }
                OpI::Replace(i, v) => {
                    keys_in += 1;
                    values_in += 1;
                    if sut.replace(pool[i].clone(), v).unwrap().is_some() {
                        handed_back_values += 1;
                    }
                }
                OpI::Remove(i) | OpI::Get(i) => {
                    if sut.remove(&pool[i]).is_some() {
                        handed_back_values += 1;
                    }
                }
                OpI::Del(i) => {
                    sut.del(&pool[i]);
                }
                OpI::Clear => sut.clear(),
                OpI::Contains(_) | OpI::Iterate | OpI::Step => {
                    sut.rehash_step();
                }
            }
            prop_assert_eq!(keys_freed.get() + sut.len(), keys_in);
            prop_assert_eq!(values_freed.get() + handed_back_values + sut.len(), values_in);
        }
        drop(sut);
        prop_assert_eq!(keys_freed.get(), keys_in);
        prop_assert_eq!(values_freed.get() + handed_back_values, values_in);
        prop_assert_eq!(alloc.in_use(), 0);
    }
}
