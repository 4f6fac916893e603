use std::fs;

use anyhow::Context;
use indicatif::ProgressBar;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::config::Config;
use crate::source;

/// One citation as listed on a profile: the declared format and the raw text.
struct Citation {
    kind: Option<String>,
    value: String,
}

/// Fetch every configured person's works from the ORCID public API and write
/// one `<Person>_fromORCID.bib` file each.
///
/// Profiles are maintained by the researchers themselves, so citations whose
/// declared type is not `bibtex` are kept anyway and counted; the build's
/// splitter sorts them out later.
pub fn fetch(config: &Config) -> anyhow::Result<()> {
    let agent = source::agent();
    let pb = ProgressBar::new(config.orcid.people.len() as u64);
    let mut unspecified: Vec<(String, usize)> = Vec::new();

    for person in &config.orcid.people {
        pb.set_message(person.name.clone());
        let url = format!("{}{}/works", config.orcid.api_base, person.id);

        let xml = match fetch_works(&agent, &url) {
            Ok(xml) => xml,
            Err(err) => {
                pb.println(format!("no ORCID records for {}: {err:#}", person.name));
                pb.inc(1);
                continue;
            }
        };
        let citations = match parse_citations(&xml) {
            Ok(citations) => citations,
            Err(err) => {
                pb.println(format!("skipping {}: {err:#}", person.name));
                pb.inc(1);
                continue;
            }
        };

        let mut text = String::new();
        let mut other = 0usize;
        for citation in &citations {
            text.push_str(&citation.value);
            text.push('\n');
            if citation.kind.as_deref() != Some("bibtex") {
                other += 1;
            }
        }

        let path = config
            .citations_dir
            .join(format!("{}_fromORCID.bib", source::person_stem(&person.name)));
        fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;

        if other > 0 {
            unspecified.push((person.name.clone(), other));
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let total: usize = unspecified.iter().map(|(_, n)| n).sum();
    if total > 0 {
        eprintln!(
            "[orcid] {total} citation(s) were entered in an unspecified format; assuming they are valid citations"
        );
        for (name, count) in &unspecified {
            eprintln!("  {name}: {count}");
        }
    }
    Ok(())
}

fn fetch_works(agent: &ureq::Agent, url: &str) -> anyhow::Result<String> {
    let body = agent
        .get(url)
        .header("Accept", "application/xml")
        .header("User-Agent", source::USER_AGENT)
        .call()
        .with_context(|| format!("request failed: {url}"))?
        .into_body()
        .read_to_string()
        .context("failed to read ORCID response body")?;
    Ok(body)
}

/// Pull each work's citation type and value out of a profile document,
/// ignoring namespace prefixes since those vary across API versions.
fn parse_citations(xml: &str) -> anyhow::Result<Vec<Citation>> {
    fn is_local(name: &[u8], target: &str) -> bool {
        if let Some(pos) = name.iter().rposition(|&b| b == b':') {
            &name[pos + 1..] == target.as_bytes()
        } else {
            name == target.as_bytes()
        }
    }

    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut citations = Vec::new();
    let mut in_citation = false;
    let mut kind: Option<String> = None;
    let mut value: Option<String> = None;
    let mut cur_text = String::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                if is_local(e.name().as_ref(), "citation") {
                    in_citation = true;
                    kind = None;
                    value = None;
                }
                cur_text.clear();
            }
            Ok(Event::End(e)) => {
                if is_local(e.name().as_ref(), "citation") {
                    if let Some(v) = value.take()
                        && !v.is_empty()
                    {
                        citations.push(Citation {
                            kind: kind.take(),
                            value: v,
                        });
                    }
                    in_citation = false;
                } else if in_citation && is_local(e.name().as_ref(), "citation-type") {
                    kind = Some(cur_text.trim().to_ascii_lowercase());
                } else if in_citation && is_local(e.name().as_ref(), "citation-value") {
                    value = Some(cur_text.trim().to_string());
                }
                cur_text.clear();
            }
            Ok(Event::Text(t)) => {
                cur_text.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            Ok(Event::CData(t)) => {
                cur_text.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            Err(e) => return Err(anyhow::anyhow!("XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }
    Ok(citations)
}
