use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Group citation keys by derived year, dropping excluded entries.
///
/// A year whose entries were all excluded still gets an (empty) group, so the
/// corresponding output file is produced and overwrites a stale one. Sorted
/// maps keep the per-year filter files deterministic run to run.
pub fn partition(
    years: &HashMap<String, String>,
    excluded: &HashSet<String>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (key, year) in years {
        let group = groups.entry(year.clone()).or_default();
        if !excluded.contains(key) {
            group.insert(key.clone());
        }
    }
    groups
}
