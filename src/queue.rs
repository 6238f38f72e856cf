use std::collections::HashSet;

use crate::job::Target;

/// Targets not yet in `completed`, in their original order.
pub fn pending<'a>(all: &'a [Target], completed: &HashSet<String>) -> Vec<&'a Target> {
    all.iter().filter(|t| !completed.contains(&t.url)).collect()
}

/// Collapse repeated URLs, keeping the first occurrence.
pub fn dedup_targets(targets: Vec<Target>) -> Vec<Target> {
    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|t| seen.insert(t.url.clone()))
        .collect()
}
