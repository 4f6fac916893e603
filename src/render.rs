use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, anyhow};

/// Capability to render one year group of the corpus to HTML.
///
/// The production implementation shells out to bibtex2html; tests substitute
/// their own.
pub trait Renderer {
    /// Render the entries whose keys are listed in `filter`, one per line,
    /// out of `corpus` into files named after `out_prefix`.
    fn render(&self, corpus: &Path, filter: &Path, out_prefix: &Path) -> anyhow::Result<()>;
}

/// Drives the bundled bibtex2html binaries
/// (<https://github.com/backtracking/bibtex2html>).
pub struct Bibtex2Html {
    executable: PathBuf,
    style: PathBuf,
}

impl Bibtex2Html {
    pub fn new(renderer_dir: &Path, style_file: &str) -> anyhow::Result<Self> {
        // The tool fails to recognise style files passed with their extension.
        let style = style_file.strip_suffix(".bst").unwrap_or(style_file);
        Ok(Self {
            executable: renderer_dir.join(executable_name()?),
            style: renderer_dir.join(style),
        })
    }
}

fn executable_name() -> anyhow::Result<&'static str> {
    if cfg!(target_os = "linux") {
        Ok("bibtex2html_linux")
    } else if cfg!(target_os = "windows") {
        Ok("bibtex2html_win32")
    } else if cfg!(target_os = "macos") {
        Ok("bibtex2html_osx")
    } else {
        Err(anyhow!("no bibtex2html build for this platform"))
    }
}

impl Renderer for Bibtex2Html {
    fn render(&self, corpus: &Path, filter: &Path, out_prefix: &Path) -> anyhow::Result<()> {
        let output = Command::new(&self.executable)
            .arg("-o")
            .arg(out_prefix)
            .arg("-s")
            .arg(&self.style)
            .args([
                "-nokeys",
                "-nodoc",
                "-nobibsource",
                "-nokeywords",
                "-noabstract",
                "-noheader",
                "-d",
                "-i",
            ])
            .arg("-citefile")
            .arg(filter)
            .arg(corpus)
            .output()
            .with_context(|| format!("failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            return Err(anyhow!(
                "bibtex2html exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}
