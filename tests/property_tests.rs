use proptest::prelude::*;
use softcache::reclaimer::{Reclaimable, Reclaimer};
use softcache::SoftCache;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// Keeps every registered handle alive so tests can reclaim
/// arbitrary ones, including handles already replaced in the cache.
#[derive(Default)]
struct ScriptedReclaimer {
    handles: Mutex<Vec<Arc<dyn Reclaimable>>>,
}

impl ScriptedReclaimer {
    fn reclaim(&self, idx: usize) {
        let handles = self.handles.lock().unwrap();
        if handles.is_empty() {
            return;
        }
        let handle = Arc::clone(&handles[idx % handles.len()]);
        drop(handles);
        handle.reclaim();
    }
}

impl Reclaimer for ScriptedReclaimer {
    fn register(&self, handle: Weak<dyn Reclaimable>) {
        if let Some(handle) = handle.upgrade() {
            self.handles.lock().unwrap().push(handle);
        }
    }
}

#[derive(Clone, Debug)]
enum Op {
    Put(u8, u32),
    Get(u8),
    Remove(u8),
    Reclaim(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..16, any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        3 => (0u8..16).prop_map(Op::Get),
        2 => (0u8..16).prop_map(Op::Remove),
        1 => any::<usize>().prop_map(Op::Reclaim),
    ]
}

proptest! {
    #[test]
    fn matches_hashmap_without_reclamation(ops in prop::collection::vec(op(), 1..200)) {
        let reclaimer = Arc::new(ScriptedReclaimer::default());
        let cache: SoftCache<u8, u32> = SoftCache::builder()
            .reclaimer(Arc::clone(&reclaimer))
            .build();
        let mut model: HashMap<u8, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    cache.put(k, v);
                    model.insert(k, v);
                }
                Op::Get(k) => {
                    prop_assert_eq!(cache.get(&k).map(|v| *v), model.get(&k).copied());
                }
                Op::Remove(k) => {
                    prop_assert_eq!(cache.remove(&k).map(|v| *v), model.remove(&k));
                }
                Op::Reclaim(_) => {}
            }
        }
        prop_assert_eq!(cache.len(), model.len());
    }

    #[test]
    fn reclamation_only_ever_loses_values(ops in prop::collection::vec(op(), 1..200)) {
        let reclaimer = Arc::new(ScriptedReclaimer::default());
        let cache: SoftCache<u8, u32> = SoftCache::builder()
            .reclaimer(Arc::clone(&reclaimer))
            .build();
        // Last value written per key; reclamation may drop it, never alter it.
        let mut model: HashMap<u8, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    cache.put(k, v);
                    model.insert(k, v);
                }
                Op::Get(k) => {
                    if let Some(v) = cache.get(&k) {
                        prop_assert_eq!(Some(*v), model.get(&k).copied());
                    }
                }
                Op::Remove(k) => {
                    let removed = cache.remove(&k);
                    let expected = model.remove(&k);
                    if let Some(v) = removed {
                        prop_assert_eq!(Some(*v), expected);
                    }
                    prop_assert!(cache.get(&k).is_none());
                }
                Op::Reclaim(idx) => reclaimer.reclaim(idx),
            }
        }

        // After a full drain no entry is stale.
        cache.purge();
        for k in 0u8..16 {
            if cache.contains_key(&k) {
                prop_assert!(cache.get(&k).is_some(), "stale entry survived a drain: {}", k);
            }
        }
    }
}
