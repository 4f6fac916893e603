use std::fs;

use anyhow::{Context, anyhow};
use indicatif::ProgressBar;
use quick_xml::Reader;
use quick_xml::events::Event;
use url::Url;

use crate::config::Config;
use crate::source;

/// The parts of a PubMed article record that end up in a BibTeX entry.
#[derive(Debug, Default)]
struct Article {
    pmid: Option<String>,
    title: String,
    journal: Option<String>,
    year: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    pages: Option<String>,
    authors: Vec<String>,
}

/// Fetch every configured person's publications from the NCBI E-utilities
/// and write one `<Person>_fromPubmed.bib` file each.
///
/// Two round trips per person: an esearch by author name for the UID list,
/// then an efetch for the article records, which are mapped to `@article`
/// entries here since the API has no BibTeX output.
pub fn fetch(config: &Config) -> anyhow::Result<()> {
    let agent = source::agent();
    let pb = ProgressBar::new(config.pubmed.people.len() as u64);

    for person in &config.pubmed.people {
        pb.set_message(person.clone());
        match fetch_person(&agent, config, person) {
            Ok(Some(count)) => pb.println(format!("[pubmed] {person}: {count} article(s)")),
            Ok(None) => {
                pb.println(format!("{person} does not have any publications on PubMed"))
            }
            Err(err) => pb.println(format!("skipping {person}: {err:#}")),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(())
}

/// `None` when the person has no records at all.
fn fetch_person(
    agent: &ureq::Agent,
    config: &Config,
    person: &str,
) -> anyhow::Result<Option<usize>> {
    let mut search_url = Url::parse(&config.pubmed.search_base)
        .with_context(|| format!("bad search base {}", config.pubmed.search_base))?;
    search_url
        .query_pairs_mut()
        .append_pair("db", "pubmed")
        .append_pair("term", &search_term(person)?);

    let ids = parse_ids(&get(agent, search_url.as_str())?)?;
    if ids.is_empty() {
        return Ok(None);
    }

    let mut fetch_url = Url::parse(&config.pubmed.fetch_base)
        .with_context(|| format!("bad fetch base {}", config.pubmed.fetch_base))?;
    fetch_url
        .query_pairs_mut()
        .append_pair("db", "pubmed")
        .append_pair("id", &ids.join(","))
        .append_pair("retmode", "xml");

    let articles = parse_articles(&get(agent, fetch_url.as_str())?)?;

    let mut text = String::new();
    for article in &articles {
        text.push_str(&build_bibtex(article));
    }
    let path = config
        .citations_dir
        .join(format!("{}_fromPubmed.bib", source::person_stem(person)));
    fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;

    Ok(Some(articles.len()))
}

/// `"Jane Doe"` -> `"Doe, Jane[Full Author Name]"`. Middle names stay with
/// the given name.
fn search_term(name: &str) -> anyhow::Result<String> {
    let (given, family) = name
        .trim()
        .rsplit_once(' ')
        .ok_or_else(|| anyhow!("cannot derive a surname from {name:?}"))?;
    Ok(format!("{family}, {given}[Full Author Name]"))
}

fn get(agent: &ureq::Agent, url: &str) -> anyhow::Result<String> {
    agent
        .get(url)
        .header("User-Agent", source::USER_AGENT)
        .call()
        .with_context(|| format!("request failed: {url}"))?
        .into_body()
        .read_to_string()
        .context("failed to read NCBI response body")
}

fn is_local(name: &[u8], target: &str) -> bool {
    if let Some(pos) = name.iter().rposition(|&b| b == b':') {
        &name[pos + 1..] == target.as_bytes()
    } else {
        name == target.as_bytes()
    }
}

/// UIDs out of an esearch result (`<Id>` elements).
fn parse_ids(xml: &str) -> anyhow::Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut ids = Vec::new();
    let mut in_id = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => in_id = is_local(e.name().as_ref(), "Id"),
            Ok(Event::End(_)) => in_id = false,
            Ok(Event::Text(t)) if in_id => {
                let id = String::from_utf8_lossy(t.as_ref()).trim().to_string();
                if !id.is_empty() {
                    ids.push(id);
                }
            }
            Err(e) => return Err(anyhow!("XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }
    Ok(ids)
}

/// Article records out of an efetch result.
fn parse_articles(xml: &str) -> anyhow::Result<Vec<Article>> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut articles = Vec::new();
    let mut current = Article::default();
    let mut in_article = false;
    let mut in_journal = false;
    let mut in_pubdate = false;
    let mut in_author = false;
    let mut family = None;
    let mut given = None;
    let mut cur_text = String::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = e.name();
                let name = name.as_ref();
                if is_local(name, "PubmedArticle") {
                    in_article = true;
                    current = Article::default();
                } else if is_local(name, "Journal") {
                    in_journal = true;
                } else if is_local(name, "PubDate") {
                    in_pubdate = true;
                } else if is_local(name, "Author") {
                    in_author = true;
                    family = None;
                    given = None;
                }
                cur_text.clear();
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let name = name.as_ref();
                if is_local(name, "PubmedArticle") {
                    if in_article && (current.pmid.is_some() || !current.title.is_empty()) {
                        articles.push(std::mem::take(&mut current));
                    }
                    in_article = false;
                } else if is_local(name, "Journal") {
                    in_journal = false;
                } else if is_local(name, "PubDate") {
                    in_pubdate = false;
                } else if is_local(name, "Author") {
                    // "Family, Given", matching how the entries cite authors.
                    match (family.take(), given.take()) {
                        (Some(f), Some(g)) => current.authors.push(format!("{f}, {g}")),
                        (Some(f), None) => current.authors.push(f),
                        _ => {}
                    }
                    in_author = false;
                } else if in_article {
                    let text = cur_text.trim();
                    if is_local(name, "PMID") {
                        // Later PMIDs belong to referenced articles, not this one.
                        if current.pmid.is_none() && !text.is_empty() {
                            current.pmid = Some(text.to_string());
                        }
                    } else if is_local(name, "ArticleTitle") {
                        current.title = text.trim_end_matches('.').to_string();
                    } else if in_journal && is_local(name, "Title") {
                        current.journal = Some(text.to_string());
                    } else if in_pubdate && is_local(name, "Year") {
                        current.year = Some(text.to_string());
                    } else if in_journal && is_local(name, "Volume") {
                        current.volume = Some(text.to_string());
                    } else if in_journal && is_local(name, "Issue") {
                        current.issue = Some(text.to_string());
                    } else if is_local(name, "MedlinePgn") {
                        current.pages = Some(text.to_string());
                    } else if in_author && is_local(name, "LastName") {
                        family = Some(text.to_string());
                    } else if in_author && is_local(name, "ForeName") {
                        given = Some(text.to_string());
                    }
                }
                cur_text.clear();
            }
            Ok(Event::Text(t)) => {
                cur_text.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            Ok(Event::CData(t)) => {
                cur_text.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            Err(e) => return Err(anyhow!("XML parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }
    Ok(articles)
}

fn build_bibtex(article: &Article) -> String {
    let key = match &article.pmid {
        Some(pmid) => format!("pmid{pmid}"),
        None => format!("pubmed{}", source::person_stem(&article.title)),
    };

    let mut fields = Vec::new();
    fields.push(format!("title = {{{}}}", article.title));
    if !article.authors.is_empty() {
        fields.push(format!("author = {{{}}}", article.authors.join(" and ")));
    }
    if let Some(journal) = &article.journal {
        fields.push(format!("journal = {{{journal}}}"));
    }
    if let Some(year) = &article.year {
        fields.push(format!("year = {{{year}}}"));
    }
    if let Some(volume) = &article.volume {
        fields.push(format!("volume = {{{volume}}}"));
    }
    if let Some(issue) = &article.issue {
        fields.push(format!("number = {{{issue}}}"));
    }
    if let Some(pages) = &article.pages {
        fields.push(format!("pages = {{{pages}}}"));
    }

    let mut out = format!("@article{{{key},\n");
    for field in fields {
        out.push_str("  ");
        out.push_str(&field);
        out.push_str(",\n");
    }
    out.push_str("}\n");
    out
}
