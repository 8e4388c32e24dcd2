//! Merge rules: defaults and override order.

pub(super) mod merge_policy;
