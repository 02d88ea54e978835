//! Property-based test generators using proptest.
//!
//! Provides strategies for generating file trees and backend inventories.

use fsfailover_core::ExtraFilesPolicy;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// A generated file: contents and modification time.
pub type GeneratedFile = (Vec<u8>, i64);

/// Strategy for generating normalized file paths.
///
/// Every path ends in `.txt`, so a file path never doubles as a directory.
pub fn path_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-c]{1,2}(/[a-c]{1,2}){0,2}\\.txt").expect("Invalid regex")
}

/// Strategy for generating file contents.
pub fn contents_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for generating one backend inventory.
pub fn inventory_strategy(max_files: usize) -> impl Strategy<Value = BTreeMap<String, GeneratedFile>> {
    prop::collection::btree_map(
        path_strategy(),
        (contents_strategy(), 1i64..1_000),
        0..=max_files,
    )
}

/// Strategy for generating the inventories of a whole group.
pub fn group_inventory_strategy(
    backends: std::ops::RangeInclusive<usize>,
    max_files: usize,
) -> impl Strategy<Value = Vec<BTreeMap<String, GeneratedFile>>> {
    backends.prop_flat_map(move |count| {
        prop::collection::vec(inventory_strategy(max_files), count..=count)
    })
}

/// Strategy for generating an extra-files policy.
pub fn policy_strategy() -> impl Strategy<Value = ExtraFilesPolicy> {
    prop_oneof![
        Just(ExtraFilesPolicy::Ignore),
        Just(ExtraFilesPolicy::Delete),
        Just(ExtraFilesPolicy::Copy),
    ]
}
