//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check counters, capacity, eviction order and TTL
//! boundaries over generated operation sequences.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, EvictionPolicy};
use crate::clock::ManualClock;
use crate::config::CacheConfig;

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const TEST_DEFAULT_TTL: Duration = Duration::from_secs(300);

fn store(capacity: usize, policy: EvictionPolicy) -> (Cache<String, String>, ManualClock) {
    let clock = ManualClock::new(1_700_000_000_000);
    let config = CacheConfig::new(capacity, TEST_DEFAULT_TTL, policy);
    let cache = Cache::with_clock(config, Arc::new(clock.clone())).unwrap();
    (cache, clock)
}

// == Strategies ==
/// Generates cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}".prop_map(|s| s)
}

/// Generates cache values
fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,256}".prop_map(|s| s)
}

fn policy_strategy() -> impl Strategy<Value = EvictionPolicy> {
    prop_oneof![
        Just(EvictionPolicy::Lru),
        Just(EvictionPolicy::Lfu),
        Just(EvictionPolicy::Fifo),
    ]
}

/// Between 2 and 10 distinct keys, in generation order.
fn unique_keys_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set(valid_key_strategy(), 2..=10)
        .prop_map(|keys| keys.into_iter().collect())
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Has { key: String },
    Delete { key: String },
    Advance { millis: u64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    // A small key space so gets and deletes hit existing keys
    let key = "[a-e]";
    prop_oneof![
        (key, valid_value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Has { key }),
        key.prop_map(|key| CacheOp::Delete { key }),
        (0u64..200_000).prop_map(|millis| CacheOp::Advance { millis }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Every get/has is exactly one hit or one miss, and hit_rate follows.
    #[test]
    fn prop_statistics_accuracy(
        policy in policy_strategy(),
        ops in prop::collection::vec(cache_op_strategy(), 1..80)
    ) {
        let (mut cache, clock) = store(3, policy);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => cache.set(key, value, None),
                CacheOp::Get { key } => match cache.get(key.as_str()) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Has { key } => {
                    if cache.has(key.as_str()) {
                        expected_hits += 1;
                    } else {
                        expected_misses += 1;
                    }
                }
                CacheOp::Delete { key } => {
                    cache.delete(key.as_str());
                }
                CacheOp::Advance { millis } => clock.advance(Duration::from_millis(millis)),
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.size, cache.len(), "Size mismatch");
        let total = expected_hits + expected_misses;
        let expected_rate = if total == 0 { 0.0 } else { expected_hits as f64 / total as f64 * 100.0 };
        prop_assert!((stats.hit_rate - expected_rate).abs() < 1e-9);
    }

    // Storing V1 then V2 under one key reads back V2 and keeps one entry.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy()
    ) {
        let (mut cache, _) = store(TEST_MAX_ENTRIES, EvictionPolicy::Lru);

        cache.set(key.clone(), value1, None);
        cache.set(key.clone(), value2.clone(), None);

        prop_assert_eq!(cache.get(key.as_str()), Some(value2));
        prop_assert_eq!(cache.len(), 1);
    }

    // No sequence of sets ever leaves more entries than the capacity.
    #[test]
    fn prop_capacity_enforcement(
        policy in policy_strategy(),
        capacity in 1usize..60,
        entries in prop::collection::vec(
            (valid_key_strategy(), valid_value_strategy()),
            1..200
        )
    ) {
        let (mut cache, _) = store(capacity, policy);

        for (key, value) in entries {
            cache.set(key.clone(), value.clone(), None);
            prop_assert!(
                cache.len() <= capacity,
                "Cache size {} exceeds max {}",
                cache.len(),
                capacity
            );
            prop_assert_eq!(cache.peek(key.as_str()), Some(&value), "Latest insert must survive");
        }
    }

    // An entry read at exactly its TTL is live; one millisecond later it is gone.
    #[test]
    fn prop_ttl_boundary(
        key in valid_key_strategy(),
        value in valid_value_strategy(),
        ttl_ms in 1u64..100_000
    ) {
        let (mut cache, clock) = store(TEST_MAX_ENTRIES, EvictionPolicy::Lru);
        cache.set(key.clone(), value.clone(), Some(Duration::from_millis(ttl_ms)));

        clock.advance(Duration::from_millis(ttl_ms));
        prop_assert_eq!(cache.get(key.as_str()), Some(value));

        clock.advance(Duration::from_millis(1));
        prop_assert_eq!(cache.get(key.as_str()), None);
        prop_assert!(cache.is_empty());
    }
}

// Property tests for eviction order
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // FIFO evicts the earliest insert even if it is the most read.
    #[test]
    fn prop_fifo_eviction_order(
        unique_keys in unique_keys_strategy(),
        reads in prop::collection::vec(0usize..10, 0..20),
        new_key in valid_key_strategy()
    ) {
        prop_assume!(!unique_keys.contains(&new_key));
        let capacity = unique_keys.len();
        let (mut cache, clock) = store(capacity, EvictionPolicy::Fifo);

        for key in &unique_keys {
            cache.set(key.clone(), format!("value_{}", key), None);
            clock.advance(Duration::from_millis(1));
        }
        for index in reads {
            cache.get(unique_keys[index % capacity].as_str());
        }

        cache.set(new_key.clone(), "new".to_string(), None);

        prop_assert_eq!(cache.len(), capacity);
        prop_assert!(cache.peek(unique_keys[0].as_str()).is_none());
        for key in unique_keys.iter().skip(1) {
            prop_assert!(cache.peek(key.as_str()).is_some(), "Key '{}' should survive", key);
        }
    }

    // Reading the oldest key protects it under LRU; the next stalest goes.
    #[test]
    fn prop_lru_access_tracking(
        unique_keys in unique_keys_strategy(),
        new_key in valid_key_strategy()
    ) {
        prop_assume!(unique_keys.len() >= 3);
        prop_assume!(!unique_keys.contains(&new_key));
        let capacity = unique_keys.len();
        let (mut cache, clock) = store(capacity, EvictionPolicy::Lru);

        for key in &unique_keys {
            cache.set(key.clone(), format!("value_{}", key), None);
            clock.advance(Duration::from_millis(1));
        }

        let accessed_key = unique_keys[0].clone();
        prop_assert!(cache.get(accessed_key.as_str()).is_some());

        cache.set(new_key.clone(), "new".to_string(), None);

        prop_assert!(cache.peek(accessed_key.as_str()).is_some());
        prop_assert!(cache.peek(unique_keys[1].as_str()).is_none());
        prop_assert!(cache.peek(new_key.as_str()).is_some());
    }

    // LFU evicts the only key that was never read.
    #[test]
    fn prop_lfu_evicts_least_read(
        unique_keys in unique_keys_strategy(),
        cold_index in 0usize..10,
        extra_reads in prop::collection::vec(0usize..10, 0..20),
        new_key in valid_key_strategy()
    ) {
        prop_assume!(!unique_keys.contains(&new_key));
        let capacity = unique_keys.len();
        let cold = cold_index % capacity;
        let (mut cache, _) = store(capacity, EvictionPolicy::Lfu);

        for key in &unique_keys {
            cache.set(key.clone(), format!("value_{}", key), None);
        }
        for (index, key) in unique_keys.iter().enumerate() {
            if index != cold {
                cache.get(key.as_str());
            }
        }
        for index in extra_reads {
            if index % capacity != cold {
                cache.get(unique_keys[index % capacity].as_str());
            }
        }

        cache.set(new_key, "new".to_string(), None);

        prop_assert!(cache.peek(unique_keys[cold].as_str()).is_none());
        let survivors: HashSet<&String> = cache.keys().collect();
        prop_assert_eq!(survivors.len(), capacity);
    }
}

// Concurrent access through the shared handle
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // Interleaved tasks never observe a partial value or break the counters.
    #[test]
    fn prop_concurrent_operation_correctness(
        initial_entries in prop::collection::vec(
            (valid_key_strategy(), valid_value_strategy()),
            1..20
        ),
        operations in prop::collection::vec(cache_op_strategy(), 10..50)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let (cache, clock) = store(TEST_MAX_ENTRIES, EvictionPolicy::Lru);
            let shared = cache.into_shared();
            {
                let mut guard = shared.write().await;
                for (key, value) in &initial_entries {
                    guard.set(key.clone(), value.clone(), None);
                }
            }

            let lookups = operations
                .iter()
                .filter(|op| matches!(op, CacheOp::Get { .. } | CacheOp::Has { .. }))
                .count() as u64;

            let mut handles = vec![];
            for op in operations {
                let shared = Arc::clone(&shared);
                let clock = clock.clone();
                handles.push(tokio::spawn(async move {
                    match op {
                        CacheOp::Set { key, value } => shared.write().await.set(key, value, None),
                        CacheOp::Get { key } => {
                            if let Some(value) = shared.write().await.get(key.as_str()) {
                                if value.is_empty() {
                                    return Err(format!("Got empty value for key '{}'", key));
                                }
                            }
                        }
                        CacheOp::Has { key } => {
                            shared.write().await.has(key.as_str());
                        }
                        CacheOp::Delete { key } => {
                            shared.write().await.delete(key.as_str());
                        }
                        CacheOp::Advance { millis } => clock.advance(Duration::from_millis(millis)),
                    }
                    Ok::<_, String>(())
                }));
            }

            for handle in handles {
                let result = handle.await.expect("Task should not panic");
                prop_assert!(result.is_ok(), "Concurrent operation failed: {:?}", result);
            }

            let stats = shared.read().await.stats();
            prop_assert!(stats.size <= TEST_MAX_ENTRIES);
            prop_assert_eq!(stats.hits + stats.misses, lookups);
            prop_assert!((0.0..=100.0).contains(&stats.hit_rate));

            Ok(())
        })?;
    }
}
