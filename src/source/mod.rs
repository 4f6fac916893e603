//! Citation sources.
//!
//! Each fetcher writes one citation file per person into the citations
//! directory. Trouble with one person, or one whole source, is reported and
//! skipped; the remaining work proceeds. Pre-scraped files (e.g. a Google
//! Scholar export) can simply be dropped into the citations directory and
//! are picked up by the build.

pub mod orcid;
pub mod pubmed;

use std::fs;
use std::time::Duration;

use anyhow::Context;
use owo_colors::OwoColorize;

use crate::config::Config;

/// `"Jane Q. Doe"` -> `"JaneQ.Doe"`, the stem used for per-person files.
pub fn person_stem(name: &str) -> String {
    name.split_whitespace().collect()
}

/// Run every enabled fetcher. Only failure to set up the citations directory
/// is fatal; a failing source is logged and skipped.
pub fn fetch_all(config: &Config) -> anyhow::Result<()> {
    fs::create_dir_all(&config.citations_dir)
        .with_context(|| format!("failed to create {}", config.citations_dir.display()))?;

    if config.orcid.enabled
        && let Err(err) = orcid::fetch(config)
    {
        eprintln!("{} orcid fetch failed: {err:#}", "✗".red());
    }
    if config.pubmed.enabled
        && let Err(err) = pubmed::fetch(config)
    {
        eprintln!("{} pubmed fetch failed: {err:#}", "✗".red());
    }
    Ok(())
}

pub(crate) fn agent() -> ureq::Agent {
    let cfg = ureq::Agent::config_builder()
        .timeout_connect(Some(Duration::from_secs(5)))
        .timeout_global(Some(Duration::from_secs(30)))
        .build();
    ureq::Agent::new_with_config(cfg)
}

pub(crate) const USER_AGENT: &str = "pubcite/0.1 (publication list generator)";
