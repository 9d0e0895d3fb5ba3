//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store, the data cache, and selector filtering.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::thread::sleep;
use std::time::Duration;

use crate::cache::{DataCache, ExpiringStore};
use crate::models::Document;
use crate::query::{filter_by_selector, Selector};

// == Test Configuration ==
const TEST_DEFAULT_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
/// Generates cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}".prop_map(|s| s)
}

fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,256}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

/// Documents with an id, a small numeric code (scalar or array) and maybe a cabinet.
fn document_strategy() -> impl Strategy<Value = Document> {
    (
        "[a-z]{1,8}",
        prop_oneof![
            (0i64..10).prop_map(Value::from),
            prop::collection::vec(0i64..10, 0..4).prop_map(Value::from),
        ],
        prop::option::of("[xy]"),
    )
        .prop_map(|(id, num_code, cabinet)| {
            let mut doc = Document::new();
            doc.insert("id".to_string(), json!(id));
            doc.insert("numCode".to_string(), num_code);
            if let Some(cabinet) = cabinet {
                doc.insert("cabinet".to_string(), json!(cabinet));
            }
            doc
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hits and misses reflect exactly the outcome of each get
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let mut store = ExpiringStore::new(TEST_DEFAULT_TTL);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    prop_assert!(store.set(key, value));
                }
                CacheOp::Get { key } => {
                    match store.get(&key) {
                        Some(_) => expected_hits += 1,
                        None => expected_misses += 1,
                    }
                }
                CacheOp::Delete { key } => {
                    store.delete(&key);
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.keys, store.len(), "Key count mismatch");
    }

    // A get after delete is always absent
    #[test]
    fn prop_delete_removes_entry(key in valid_key_strategy(), value in valid_value_strategy()) {
        let mut store = ExpiringStore::new(TEST_DEFAULT_TTL);

        store.set(key.clone(), value);
        prop_assert!(store.get(&key).is_some(), "Key should exist before delete");

        store.delete(&key);

        prop_assert!(store.get(&key).is_none(), "Key should not exist after delete");
    }

    // The last set wins
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy()
    ) {
        let mut store = ExpiringStore::new(TEST_DEFAULT_TTL);

        store.set(key.clone(), value1);
        store.set(key.clone(), value2.clone());

        prop_assert_eq!(store.get(&key), Some(value2), "Overwrite should return new value");
        prop_assert_eq!(store.len(), 1, "Should have exactly one entry after overwrite");
    }

    // No size bound: every distinct key stays present
    #[test]
    fn prop_no_size_eviction(keys in prop::collection::hash_set(valid_key_strategy(), 1..200)) {
        let mut store = ExpiringStore::new(TEST_DEFAULT_TTL);

        for key in &keys {
            store.set(key.clone(), key.clone());
        }

        prop_assert_eq!(store.len(), keys.len());
        let stored: HashSet<String> = store.keys().into_iter().collect();
        prop_assert_eq!(stored, keys);
    }

    // Filtering yields an order-preserving subsequence of matching documents
    #[test]
    fn prop_filter_is_ordered_matching_subset(
        docs in prop::collection::vec(document_strategy(), 0..20),
        code in 0i64..10
    ) {
        let selector = Selector::new().with("numCode", code);
        let result = filter_by_selector(&docs, &selector);

        let expected: Vec<Document> = docs
            .iter()
            .filter(|doc| match doc.get("numCode") {
                Some(Value::Array(items)) => items.contains(&json!(code)),
                Some(value) => *value == json!(code),
                None => false,
            })
            .cloned()
            .collect();

        prop_assert_eq!(result, expected);
    }

    // The empty selector is the identity
    #[test]
    fn prop_empty_selector_matches_everything(docs in prop::collection::vec(document_strategy(), 0..20)) {
        prop_assert_eq!(filter_by_selector(&docs, &Selector::new()), docs);
    }

    // Adding a field can only narrow the result
    #[test]
    fn prop_selector_fields_are_conjunctive(
        docs in prop::collection::vec(document_strategy(), 0..20),
        code in 0i64..10,
        cabinet in "[xy]"
    ) {
        let narrow = Selector::new().with("numCode", code).with("cabinet", cabinet.clone());
        let by_code = filter_by_selector(&docs, &Selector::new().with("numCode", code));
        let by_cabinet = filter_by_selector(&docs, &Selector::new().with("cabinet", cabinet));

        for doc in filter_by_selector(&docs, &narrow) {
            prop_assert!(by_code.contains(&doc));
            prop_assert!(by_cabinet.contains(&doc));
        }
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    // After the TTL elapses, a get is absent even before any sweep
    #[test]
    fn prop_ttl_expiration_behavior(
        key in valid_key_strategy(),
        value in valid_value_strategy()
    ) {
        let mut store = ExpiringStore::new(TEST_DEFAULT_TTL);

        store.set_with_ttl(key.clone(), value.clone(), Duration::from_millis(50));

        prop_assert_eq!(store.get(&key), Some(value), "Value should match before expiration");

        sleep(Duration::from_millis(80));

        prop_assert!(store.get(&key).is_none(), "Entry should not be found after TTL expires");
    }
}

// == Concurrent snapshot patches ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // Concurrent patches to one snapshot never lose an update
    #[test]
    fn prop_concurrent_patches_are_not_lost(ids in prop::collection::hash_set("[a-z]{1,8}", 1..30)) {
        use std::sync::Arc;

        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let cache = Arc::new(DataCache::new(TEST_DEFAULT_TTL));
            cache.set_collection("Configuration", Vec::new()).await;

            let mut handles = vec![];
            for id in &ids {
                let cache = Arc::clone(&cache);
                let doc = json!({"id": id}).as_object().cloned().unwrap();
                handles.push(tokio::spawn(async move {
                    cache.update_collection("Configuration", doc).await
                }));
            }

            for handle in handles {
                prop_assert!(handle.await.expect("Task should not panic"));
            }

            let snapshot = cache.get_collection("Configuration").await.unwrap();
            let stored: HashSet<String> = snapshot
                .iter()
                .filter_map(|doc| doc.get("id").and_then(Value::as_str).map(str::to_string))
                .collect();

            prop_assert_eq!(snapshot.len(), ids.len());
            prop_assert_eq!(stored, ids);

            Ok(())
        })?;
    }
}
