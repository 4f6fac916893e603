use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Run configuration, loaded from a JSON file. Every field has a default, so
/// an empty object is a valid (if not very useful) configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Where per-(person, source) citation files are written and read.
    #[serde(default = "default_citations_dir")]
    pub citations_dir: PathBuf,
    /// Where the rendered per-year HTML files end up.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Directory holding the bibtex2html executables and style files.
    #[serde(default = "default_renderer_dir")]
    pub renderer_dir: PathBuf,
    /// Citation style passed to the renderer.
    #[serde(default = "default_style")]
    pub style_file: String,
    #[serde(default)]
    pub orcid: OrcidConfig,
    #[serde(default)]
    pub pubmed: PubmedConfig,
}

#[derive(Debug, Deserialize)]
pub struct OrcidConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_orcid_api")]
    pub api_base: String,
    #[serde(default)]
    pub people: Vec<Person>,
}

#[derive(Debug, Deserialize)]
pub struct PubmedConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_pubmed_search")]
    pub search_base: String,
    #[serde(default = "default_pubmed_fetch")]
    pub fetch_base: String,
    /// Names in "First Last" form, as the NCBI author search expects.
    #[serde(default)]
    pub people: Vec<String>,
}

/// One person to fetch citations for, with their source-specific id.
#[derive(Debug, Clone, Deserialize)]
pub struct Person {
    pub name: String,
    pub id: String,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }
}

impl Default for OrcidConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_orcid_api(),
            people: Vec::new(),
        }
    }
}

impl Default for PubmedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            search_base: default_pubmed_search(),
            fetch_base: default_pubmed_fetch(),
            people: Vec::new(),
        }
    }
}

fn default_citations_dir() -> PathBuf {
    PathBuf::from("citations")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_renderer_dir() -> PathBuf {
    PathBuf::from("bibtex2html")
}

fn default_style() -> String {
    String::from("apa")
}

fn default_orcid_api() -> String {
    String::from("https://pub.orcid.org/v3.0/")
}

fn default_pubmed_search() -> String {
    String::from("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi")
}

fn default_pubmed_fetch() -> String {
    String::from("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi")
}
