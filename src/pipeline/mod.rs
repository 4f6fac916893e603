//! The bibliography build pipeline.
//!
//! Stages run strictly in sequence, each consuming the complete output of its
//! predecessor: combine the fetched files, reconcile citation keys, scan for
//! duplicates, partition by year, render.

pub mod dedupe;
pub mod keys;
pub mod split;
pub mod years;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use owo_colors::OwoColorize;

use crate::config::Config;
use crate::render::Renderer;

pub const COMBINED_BIBTEX: &str = "combined_bibtex.bib";
pub const FREEFORM_LISTING: &str = "combined_nonbibtex_citations.txt";

/// LaTeX escapes bibtex2html warns about, plus braced month abbreviations it
/// refuses to read.
const LATEX_REPLACEMENTS: &[(&str, &str)] = &[
    ("{\\textquotesingle}", "'"),
    ("{\\textperiodcentered}", "{\\cdot}"),
    ("{\\textgreater}", "$>$"),
    ("{\\textless}", "$<$"),
    ("{\\$}\\backslashvarepsilon{\\$}", "$\\varepsilon$"),
    ("\\upbeta", "\\beta"),
    ("{jan}", "jan"),
    ("{feb}", "feb"),
    ("{mar}", "mar"),
    ("{apr}", "apr"),
    ("{may}", "may"),
    ("{jun}", "jun"),
    ("{jul}", "jul"),
    ("{aug}", "aug"),
    ("{sep}", "sep"),
    ("{oct}", "oct"),
    ("{nov}", "nov"),
    ("{dec}", "dec"),
];

/// The combined corpus: one structured BibTeX blob plus the freeform lines
/// that fell out of mixed-format files.
pub struct Combined {
    pub structured: String,
    pub freeform: Vec<String>,
}

/// ORCID entries are typed in by the researchers themselves and arrive in
/// mixed format; every other source guarantees well-formed BibTeX.
fn is_mixed_source(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with("_fromORCID.bib"))
}

/// Read every citation file under `citations_dir` into one corpus. Mixed
/// files go through the record splitter; the rest are appended verbatim.
///
/// An absent or empty citations directory is fatal: there is nothing to
/// build and rendering would only produce empty listings.
pub fn combine(citations_dir: &Path) -> anyhow::Result<Combined> {
    let mut paths: Vec<PathBuf> = fs::read_dir(citations_dir)
        .with_context(|| format!("failed to read {}", citations_dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .with_context(|| format!("failed to list {}", citations_dir.display()))?;
    if paths.is_empty() {
        return Err(anyhow!("no citation files in {}", citations_dir.display()));
    }
    // Stable file order keeps key reconciliation reproducible across runs.
    paths.sort();

    let mut structured = String::new();
    let mut freeform = Vec::new();

    for path in paths.iter().filter(|p| is_mixed_source(p)) {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        for record in split::split(&text) {
            match record {
                split::RawRecord::Structured(s) => {
                    structured.push_str(&s);
                    structured.push('\n');
                }
                split::RawRecord::Freeform(s) => freeform.push(s),
            }
        }
    }
    for path in paths.iter().filter(|p| !is_mixed_source(p)) {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        structured.push_str(&text);
        if !text.ends_with('\n') {
            structured.push('\n');
        }
    }

    Ok(Combined {
        structured: clean_latex(&structured),
        freeform,
    })
}

fn clean_latex(bibtex: &str) -> String {
    LATEX_REPLACEMENTS
        .iter()
        .fold(bibtex.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Run the whole build: combine, reconcile, deduplicate, partition, render.
pub fn build(config: &Config, renderer: &dyn Renderer) -> anyhow::Result<()> {
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("failed to create {}", config.output_dir.display()))?;

    let combined = combine(&config.citations_dir)?;

    // Freeform path: exact-duplicate removal, then the manual-insertion listing.
    let freeform = dedupe::dedupe_freeform(combined.freeform);
    if let Some(listing) = dedupe::freeform_listing(&freeform) {
        let path = config.output_dir.join(FREEFORM_LISTING);
        fs::write(&path, listing)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    // Structured path: keys must be unique before the corpus will parse.
    let mut seen = keys::SeenKeys::new();
    let reconciled = keys::reconcile(&combined.structured, &mut seen);
    let corpus_path = config.output_dir.join(COMBINED_BIBTEX);
    fs::write(&corpus_path, &reconciled)
        .with_context(|| format!("failed to write {}", corpus_path.display()))?;

    let duplicates = dedupe::scan_structured(&reconciled)?;
    let groups = years::partition(&duplicates.years, &duplicates.excluded);

    render_years(config, renderer, &corpus_path, &groups)
}

/// Invoke the renderer once per year group. A failing year is reported and
/// the remaining years still render.
fn render_years(
    config: &Config,
    renderer: &dyn Renderer,
    corpus_path: &Path,
    groups: &BTreeMap<String, BTreeSet<String>>,
) -> anyhow::Result<()> {
    let tmp_dir = config.output_dir.join("tmp");
    let mut failed = 0usize;

    for (year, group) in groups {
        let year_dir = tmp_dir.join(format!("year{year}"));
        fs::create_dir_all(&year_dir)
            .with_context(|| format!("failed to create {}", year_dir.display()))?;
        let filter = year_dir.join("citefile.tmp");
        let mut list = String::new();
        for key in group {
            list.push_str(key);
            list.push('\n');
        }
        fs::write(&filter, list)
            .with_context(|| format!("failed to write {}", filter.display()))?;

        let out_prefix = config.output_dir.join(format!("output{year}"));
        match renderer.render(corpus_path, &filter, &out_prefix) {
            Ok(()) => eprintln!("{} rendered {} ({} entries)", "✓".green(), year, group.len()),
            Err(err) => {
                failed += 1;
                eprintln!("{} {year}: {err:#}", "✗".red());
            }
        }
    }

    // Filter lists are only meaningful within this run.
    let _ = fs::remove_dir_all(&tmp_dir);

    if failed > 0 {
        eprintln!("{failed} year(s) failed to render");
    }
    Ok(())
}
