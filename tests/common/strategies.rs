use proptest::prelude::*;

/// Strategy for generating parameter names as used by the search backend,
/// plus the empty name
pub fn param_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        1 => Just(String::new()),
        8 => "[a-z][a-z0-9_.]{0,15}",
    ]
}

/// Strategy for parameter values, including characters that need escaping
pub fn param_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,/=&%+?._-]{0,24}"
}

/// Strategy for generating descriptor contents as (name, values) pairs
pub fn descriptor_entries_strategy() -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
    prop::collection::btree_map(
        param_name_strategy(),
        prop::collection::vec(param_value_strategy(), 1..4),
        0..8,
    )
    .prop_map(|entries| entries.into_iter().collect())
}

/// Strategy for item id lists with a subset marked as already completed
pub fn resumed_batch_strategy() -> impl Strategy<Value = (usize, Vec<bool>)> {
    (1usize..40).prop_flat_map(|n| (Just(n), prop::collection::vec(any::<bool>(), n)))
}
