use icydb_tree::prelude::*;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn pk_def() -> KeyDef {
    KeyDef::new(vec![KeyPart::new(0, FieldType::Unsigned)]).unwrap()
}

fn primary(config: &TreeConfig) -> Box<dyn Index> {
    let def = IndexDef::new("pk", "items", 0, true, pk_def(), None).unwrap();

    new_tree_index(def, config, MemoryQuota::from_config(config))
}

fn small_blocks() -> TreeConfig {
    TreeConfig {
        block_size: 1,
        ..TreeConfig::default()
    }
}

fn signed(v: i64) -> Value {
    u64::try_from(v).map_or(Value::Int(v), Value::Uint)
}

fn id(tuple: &Tuple) -> u64 {
    match tuple.field(0) {
        Some(Value::Uint(id)) => *id,
        other => panic!("unexpected primary key {other:?}"),
    }
}

fn scan(index: &dyn Index, ty: IteratorType, key: &[Value]) -> Vec<u64> {
    index
        .create_iterator(ty, key)
        .unwrap()
        .map(|t| id(&t))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn index_tracks_an_ordered_model(
        ops in prop::collection::vec((any::<bool>(), 0u64..64), 1..200),
        probe in 0u64..64,
    ) {
        let mut index = primary(&small_blocks());
        let mut model: BTreeMap<u64, Tuple> = BTreeMap::new();

        for (is_insert, key) in ops {
            if is_insert {
                let t = Tuple::new(vec![Value::Uint(key)]).unwrap();
                let result = index.replace(None, Some(&t), DupReplaceMode::Insert);
                if model.contains_key(&key) {
                    prop_assert!(result.unwrap_err().is_unique_violation());
                } else {
                    prop_assert!(result.unwrap().is_none());
                    model.insert(key, t);
                }
            } else if let Some(t) = model.remove(&key) {
                let removed = index.replace(Some(&t), None, DupReplaceMode::Insert).unwrap();
                prop_assert!(removed.is_some_and(|r| r.same(&t)));
            }
        }

        let forward: Vec<u64> = model.keys().copied().collect();
        let reverse: Vec<u64> = forward.iter().rev().copied().collect();
        prop_assert_eq!(index.size(), model.len());
        prop_assert_eq!(scan(index.as_ref(), IteratorType::All, &[]), forward.clone());
        prop_assert_eq!(scan(index.as_ref(), IteratorType::Le, &[]), reverse);

        let key = [Value::Uint(probe)];
        let ge: Vec<u64> = model.range(probe..).map(|(k, _)| *k).collect();
        let lt: Vec<u64> = model.range(..probe).rev().map(|(k, _)| *k).collect();
        prop_assert_eq!(scan(index.as_ref(), IteratorType::Ge, &key), ge);
        prop_assert_eq!(scan(index.as_ref(), IteratorType::Lt, &key), lt);
        prop_assert_eq!(index.get(&key).unwrap().is_some(), model.contains_key(&probe));
    }

    #[test]
    fn bulk_build_matches_incremental_inserts(
        keys in prop::collection::btree_set(any::<u64>(), 0..150),
    ) {
        let config = TreeConfig {
            build_extent_size: 64,
            ..small_blocks()
        };
        let rows: Vec<Tuple> = keys
            .iter()
            .rev()
            .map(|k| Tuple::new(vec![Value::Uint(*k)]).unwrap())
            .collect();

        let mut built = primary(&config);
        built.begin_build().unwrap();
        for t in &rows {
            built.build_next(t).unwrap();
        }
        built.end_build().unwrap();

        let mut inserted = primary(&config);
        for t in &rows {
            inserted.replace(None, Some(t), DupReplaceMode::Insert).unwrap();
        }

        let expected: Vec<u64> = keys.iter().copied().collect();
        prop_assert_eq!(scan(built.as_ref(), IteratorType::All, &[]), expected.clone());
        prop_assert_eq!(scan(inserted.as_ref(), IteratorType::All, &[]), expected);
        prop_assert_eq!(built.bsize(), inserted.bsize());
    }

    #[test]
    fn signed_keys_order_across_zero(
        values in prop::collection::btree_set(any::<i64>(), 1..100),
    ) {
        let pk = pk_def();
        let key_def = KeyDef::new(vec![KeyPart::new(1, FieldType::Integer)]).unwrap();
        let def = IndexDef::new("by_score", "items", 1, true, key_def, Some(&pk)).unwrap();
        let mut index = new_tree_index(def, &small_blocks(), MemoryQuota::unlimited());

        // shuffle insertion order by id parity
        let mut rows: Vec<(u64, i64)> = values.iter().copied().zip(0u64..).map(|(v, i)| (i, v)).collect();
        rows.sort_by_key(|(i, _)| (i % 2, *i));
        for (i, v) in &rows {
            let t = Tuple::new(vec![Value::Uint(*i), signed(*v)]).unwrap();
            index.replace(None, Some(&t), DupReplaceMode::Insert).unwrap();
        }

        // ids were assigned in ascending value order
        let expected: Vec<u64> = (0..values.len() as u64).collect();
        prop_assert_eq!(scan(index.as_ref(), IteratorType::All, &[]), expected);

        for v in values.iter().take(5) {
            let found = index.get(&[signed(*v)]).unwrap();
            prop_assert!(found.is_some());
        }
    }

    #[test]
    fn case_folded_strings_order_like_their_lowercase(
        names in prop::collection::vec("[a-zA-Z]{0,12}", 1..60),
    ) {
        let pk = pk_def();
        let key_def = KeyDef::new(vec![
            KeyPart::new(1, FieldType::String).with_collation(Collation::AsciiCaseInsensitive),
        ])
        .unwrap();
        let def = IndexDef::new("by_name", "items", 1, false, key_def, Some(&pk)).unwrap();
        let mut index = new_tree_index(def, &small_blocks(), MemoryQuota::unlimited());

        for (i, name) in names.iter().enumerate() {
            let t = Tuple::new(vec![Value::Uint(i as u64), Value::from(name.as_str())]).unwrap();
            index.replace(None, Some(&t), DupReplaceMode::Insert).unwrap();
        }

        let mut expected: Vec<(String, u64)> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_ascii_lowercase(), i as u64))
            .collect();
        expected.sort();
        let expected_ids: Vec<u64> = expected.iter().map(|(_, i)| *i).collect();
        prop_assert_eq!(scan(index.as_ref(), IteratorType::All, &[]), expected_ids);

        let folded: BTreeSet<&str> = expected.iter().map(|(n, _)| n.as_str()).collect();
        for name in folded {
            let upper = name.to_ascii_uppercase();
            let hits = index.count(IteratorType::Eq, &[Value::from(upper.as_str())]).unwrap();
            let want = expected.iter().filter(|(n, _)| n == name).count();
            prop_assert_eq!(hits, want);
        }
    }
}
