use std::fs;
use std::path::Path;

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;

// Per-citation anchors named after the original keys; useless once keys are
// suppressed everywhere else.
static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<a name=".*></a>"#).unwrap());
static OPEN_P_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n*<p>\n*").unwrap());
static CLOSE_P_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n*</p>\n*").unwrap());

/// Paragraphs the listing should not carry: CJK-script duplicates of an
/// entry and the renderer's own footer.
fn keep_paragraph(paragraph: &str) -> bool {
    !paragraph.contains("bibtex2html")
        && !paragraph
            .chars()
            .any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

/// Turn one rendered file into a bare `<ul>` listing ready for inclusion in
/// a page: filtered paragraphs become list items, trailing `<hr>` and key
/// anchors go away.
pub fn tidy_html(html: &str) -> String {
    let cleaned = html
        .split("<p>")
        .filter(|s| keep_paragraph(s))
        .collect::<Vec<_>>()
        .join("<p>");
    let cleaned = cleaned.replace("<hr>", "");
    let cleaned = ANCHOR_RE.replace_all(&cleaned, "");
    let cleaned = OPEN_P_RE.replace_all(&cleaned, "<li>");
    let cleaned = CLOSE_P_RE.replace_all(&cleaned, "</li>\n\n");
    format!("<ul>\n{}\n</ul>", cleaned.trim_end())
}

/// Rewrite every rendered HTML file under `output_dir` in place.
pub fn clean_output(output_dir: &Path) -> anyhow::Result<()> {
    for entry in fs::read_dir(output_dir)
        .with_context(|| format!("failed to read {}", output_dir.display()))?
    {
        let path = entry?.path();
        if !path.extension().is_some_and(|ext| ext == "html") {
            continue;
        }
        // bibtex2html emits Latin-1; lossy decoding keeps the run alive.
        let bytes =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let tidied = tidy_html(&String::from_utf8_lossy(&bytes));
        fs::write(&path, tidied).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}
