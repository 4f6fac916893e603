use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Citation keys claimed so far in one reconciliation run.
///
/// Caller-owned and constructed per run, so repeated runs never see each
/// other's keys.
#[derive(Debug, Default)]
pub struct SeenKeys(HashSet<String>);

impl SeenKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, appending `a` until it no longer collides with an
    /// already-claimed key.
    fn claim(&mut self, key: &str) -> String {
        let mut candidate = key.to_string();
        while self.0.contains(&candidate) {
            candidate.push('a');
        }
        self.0.insert(candidate.clone());
        candidate
    }
}

// The key is the second group: (@type{)(key)(,).
static KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(@.*?\{)(.+?)(,)").unwrap());

/// Rewrite every citation key in `bibtex` so it is unique within this run.
///
/// Independently fetched files routinely reuse keys ("Smith2020" from two
/// sources), and the downstream BibTeX parser rejects duplicates.
pub fn reconcile(bibtex: &str, seen: &mut SeenKeys) -> String {
    KEY_RE
        .replace_all(bibtex, |caps: &Captures| {
            let key = seen.claim(caps[2].trim_start());
            format!("{}{}{}", &caps[1], key, &caps[3])
        })
        .into_owned()
}
