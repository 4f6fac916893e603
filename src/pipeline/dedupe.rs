use std::collections::{HashMap, HashSet};

use anyhow::anyhow;
use biblatex::{Bibliography, ChunksExt};

/// Year attributed to entries without a usable year field.
pub const NO_YEAR: &str = "none";

/// Header prepended to the freeform listing; those entries cannot be rendered
/// automatically and have to be pasted into the page by hand.
const FREEFORM_HEADER: &str = "Following need to be manually inserted: \n\n";

/// Result of scanning the combined corpus for semantic duplicates.
#[derive(Debug)]
pub struct Duplicates {
    /// Keys of entries repeating an earlier entry's title. Such entries stay
    /// in the corpus but are omitted from every year group.
    pub excluded: HashSet<String>,
    /// Every key mapped to its derived year.
    pub years: HashMap<String, String>,
}

/// Peel matched outer brace pairs off a title until none remain at both ends.
///
/// Fetched titles come double-braced often enough (`{{A Great Paper}}`) that
/// title comparison has to happen on the peeled form.
pub fn title_key(title: &str) -> &str {
    let mut t = title;
    while let Some(rest) = t.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        t = rest;
    }
    t
}

/// Parse the reconciled corpus and find semantic duplicates.
///
/// Entries are visited in encounter order; two entries with the same peeled
/// title are the same publication and the later one is excluded. A corpus
/// that fails to parse, or an entry without a title, aborts the run.
pub fn scan_structured(bibtex: &str) -> anyhow::Result<Duplicates> {
    let bib = Bibliography::parse(bibtex)
        .map_err(|e| anyhow!("failed to parse combined corpus: {e}"))?;

    let mut excluded = HashSet::new();
    let mut years = HashMap::new();
    let mut titles_seen = HashSet::new();

    for entry in bib.iter() {
        let year = entry
            .get("year")
            .map(|chunks| chunks.format_verbatim())
            .filter(|y| !y.trim().is_empty())
            .unwrap_or_else(|| NO_YEAR.to_string());
        years.insert(entry.key.clone(), year);

        let title = entry
            .get("title")
            .map(|chunks| chunks.format_verbatim())
            .ok_or_else(|| anyhow!("entry {} has no title", entry.key))?;
        if !titles_seen.insert(title_key(&title).to_string()) {
            excluded.insert(entry.key.clone());
        }
    }

    Ok(Duplicates { excluded, years })
}

/// Keep the first occurrence of each exact freeform line, preserving order.
pub fn dedupe_freeform(lines: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter(|line| seen.insert(line.clone()))
        .collect()
}

/// Wrap surviving freeform lines as HTML list items under the
/// manual-insertion header. `None` when nothing survived.
pub fn freeform_listing(lines: &[String]) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    let mut out = String::from(FREEFORM_HEADER);
    for line in lines {
        out.push_str("<li> ");
        out.push_str(line.trim_end_matches(['\r', '\n']));
        out.push_str(" </li> \n");
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_key_peels_nested_braces() {
        assert_eq!(title_key("{{A Great Paper}}"), "A Great Paper");
        assert_eq!(title_key("{A Great Paper}"), "A Great Paper");
        assert_eq!(title_key("A Great Paper"), "A Great Paper");
    }

    #[test]
    fn title_key_leaves_unmatched_braces_alone() {
        assert_eq!(title_key("{a} and {b}"), "a} and {b");
        assert_eq!(title_key("{open"), "{open");
        assert_eq!(title_key("close}"), "close}");
    }

    #[test]
    fn title_key_is_idempotent() {
        proptest::proptest!(|(s in r"[{}A-Za-z0-9 ]{0,16}")| {
            let once = title_key(&s);
            proptest::prop_assert_eq!(title_key(once), once);
        })
    }

    #[test]
    fn braced_and_bare_titles_collide() {
        let bibtex = "\
@article{Smith2020, title = {{A Great Paper}}, year = {2020}}
@article{Doe2019, title = {A Great Paper}, year = {2019}}
";
        let dup = scan_structured(bibtex).expect("scan");
        assert!(dup.excluded.contains("Doe2019"));
        assert!(!dup.excluded.contains("Smith2020"));
    }

    #[test]
    fn missing_or_blank_year_becomes_sentinel() {
        let bibtex = "\
@misc{NoYear, title = {One}}
@misc{BlankYear, title = {Two}, year = { }}
@misc{HasYear, title = {Three}, year = {1999}}
";
        let dup = scan_structured(bibtex).expect("scan");
        assert_eq!(dup.years["NoYear"], NO_YEAR);
        assert_eq!(dup.years["BlankYear"], NO_YEAR);
        assert_eq!(dup.years["HasYear"], "1999");
    }

    #[test]
    fn missing_title_is_fatal() {
        let err = scan_structured("@misc{Untitled, year = {2000}}").unwrap_err();
        assert!(err.to_string().contains("Untitled"));
    }

    #[test]
    fn malformed_corpus_is_fatal() {
        assert!(scan_structured("@article{Broken, title = {A}").is_err());
    }

    #[test]
    fn freeform_dedupe_preserves_order() {
        let lines = vec!["A".to_string(), "B".to_string(), "A".to_string()];
        assert_eq!(dedupe_freeform(lines), vec!["A", "B"]);
    }

    #[test]
    fn freeform_dedupe_is_exact_match_only() {
        let lines = vec!["A ".to_string(), "A".to_string()];
        assert_eq!(dedupe_freeform(lines), vec!["A ", "A"]);
    }

    #[test]
    fn listing_wraps_lines_as_list_items() {
        let listing =
            freeform_listing(&["Smith, J. (2020). A.".to_string()]).expect("non-empty listing");
        assert!(listing.starts_with("Following need to be manually inserted: \n\n"));
        assert!(listing.contains("<li> Smith, J. (2020). A. </li> \n"));
    }

    #[test]
    fn no_survivors_means_no_listing() {
        assert!(freeform_listing(&[]).is_none());
    }
}
