use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::QpTrie;

/// Simple model implementation using BTreeMap for comparison
#[derive(Default, Clone)]
struct Model {
    map: BTreeMap<Vec<u8>, u64>,
}

impl Model {
    fn insert(&mut self, key: Vec<u8>, value: u64) -> Option<u64> {
        self.map.insert(key, value)
    }

    fn get(&self, key: &[u8]) -> Option<&u64> {
        self.map.get(key)
    }

    fn remove(&mut self, key: &[u8]) -> Option<u64> {
        self.map.remove(key)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Actions to test against both implementations
#[derive(Arbitrary, Debug, Clone)]
enum Action {
    Insert(KeyValue),
    Get(Key),
    Remove(Key),
}

/// Wrapper for key generation with custom strategy
#[derive(Debug, Clone)]
struct Key(Vec<u8>);

/// Wrapper for key-value pair
#[derive(Debug, Clone)]
struct KeyValue {
    key: Key,
    value: u64,
}

impl Arbitrary for Key {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        // Keys never contain NUL; the trie reserves it as the terminator.
        prop_oneof![
            // Empty key
            Just(Key(vec![])),
            // Short keys (1-4 bytes)
            prop::collection::vec(1u8..=255, 1..4).prop_map(Key),
            // Medium keys (4-64 bytes)
            prop::collection::vec(1u8..=255, 4..64).prop_map(Key),
            // Keys with natural delimiters
            "[a-z]{4,8}/[a-z]{1,8}".prop_map(|s| Key(s.into_bytes())),
            "[a-z]{4,8}:[a-z]{1,8}".prop_map(|s| Key(s.into_bytes())),
            // Keys that are prefixes of each other, to exercise the
            // terminator nibble
            "[a-z]{1,6}".prop_map(|prefix| {
                let mut key = prefix.into_bytes();
                key.extend_from_slice(b"/suffix");
                Key(key)
            }),
            "[a-z]{1,6}".prop_map(|s| Key(s.into_bytes())),
            // Keys differing only in one nibble
            (0u8..16).prop_map(|n| Key(vec![b'q', 0x40 | n])),
        ]
        .boxed()
    }
}

impl Arbitrary for KeyValue {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<Key>(), any::<u64>())
            .prop_map(|(key, value)| KeyValue { key, value })
            .boxed()
    }
}

/// Test harness that executes actions on both QpTrie and Model
#[derive(Default)]
struct Test {
    trie: QpTrie<u64>,
    model: Model,
}

impl Test {
    fn execute(&mut self, action: Action) {
        match action {
            Action::Insert(kv) => {
                let key = kv.key.0.clone();
                let trie_result = self.trie.insert(&key, kv.value);
                let model_result = self.model.insert(key.clone(), kv.value);
                assert_eq!(
                    trie_result, model_result,
                    "Insert mismatch: key={:?}, trie_result={:?}, model_result={:?}",
                    key, trie_result, model_result
                );
            }
            Action::Get(key) => {
                let key_bytes = key.0.clone();
                let trie_result = self.trie.get(&key_bytes);
                let model_result = self.model.get(&key_bytes);
                assert_eq!(
                    trie_result, model_result,
                    "Get mismatch: key={:?}, trie_result={:?}, model_result={:?}",
                    key_bytes, trie_result, model_result
                );
            }
            Action::Remove(key) => {
                let key_bytes = key.0.clone();
                let trie_result = self.trie.remove(&key_bytes);
                let model_result = self.model.remove(&key_bytes);
                assert_eq!(
                    trie_result, model_result,
                    "Remove mismatch: key={:?}, trie_result={:?}, model_result={:?}",
                    key_bytes, trie_result, model_result
                );
            }
        }
        // Always verify len matches
        assert_eq!(
            self.trie.len(),
            self.model.len(),
            "Length mismatch after action: trie={}, model={}",
            self.trie.len(),
            self.model.len()
        );
        assert_eq!(
            self.trie.is_empty(),
            self.model.is_empty(),
            "is_empty mismatch: trie={}, model={}",
            self.trie.is_empty(),
            self.model.is_empty()
        );
        // Structural invariants hold after every mutation
        let issues = self.trie.verify_integrity();
        assert!(issues.is_empty(), "structural issues: {:?}", issues);
        let stats = self.trie.stats();
        assert_eq!(stats.leaves, self.model.len(), "leaf count mismatch");
        if stats.leaves > 0 {
            assert!(
                stats.branches <= stats.leaves - 1,
                "PATRICIA bound violated: {} branches for {} leaves",
                stats.branches,
                stats.leaves
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn proptest_vs_btreemap(actions in prop::collection::vec(any::<Action>(), 1..64)) {
        let mut test = Test::default();
        for action in actions {
            test.execute(action);
        }
        // The walk visits each live key exactly once, in byte order.
        let walked: Vec<Vec<u8>> = test.trie.iter().map(|(k, _)| k.to_vec()).collect();
        let expected: Vec<Vec<u8>> = test.model.map.keys().cloned().collect();
        prop_assert_eq!(walked, expected);
    }
}
