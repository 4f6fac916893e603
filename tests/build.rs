use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn write_config(dir: &Path) {
    let config = serde_json::json!({
        "citations_dir": dir.join("citations"),
        "output_dir": dir.join("output"),
        "renderer_dir": dir.join("tools"),
        "style_file": "apa.bst",
    });
    fs::write(dir.join("config.json"), config.to_string()).expect("write config");
}

fn write_citations(dir: &Path, files: &[(&str, &str)]) {
    let citations = dir.join("citations");
    fs::create_dir_all(&citations).expect("citations dir");
    for (name, content) in files {
        fs::write(citations.join(name), content).expect("citation file");
    }
}

/// Stand-in for bibtex2html: writes one `<p>` per key in the citefile, plus
/// the tags the post-processing is expected to clean away.
#[cfg(unix)]
fn write_fake_renderer(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let tools = dir.join("tools");
    fs::create_dir_all(&tools).expect("tools dir");
    let script = r#"#!/bin/sh
out=""
citefile=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    -citefile) citefile="$2"; shift 2 ;;
    *) shift ;;
  esac
done
{
  while read -r key; do
    printf '<a name="%s"></a><p>\nEntry %s\n</p>\n' "$key" "$key"
  done < "$citefile"
  printf '<hr>\n<p>Generated by bibtex2html</p>\n'
} > "$out.html"
"#;
    let path = tools.join("bibtex2html_linux");
    fs::write(&path, script).expect("renderer script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    // macOS runners look for the darwin build.
    let osx = tools.join("bibtex2html_osx");
    fs::copy(&path, &osx).expect("osx copy");
    fs::set_permissions(&osx, fs::Permissions::from_mode(0o755)).expect("chmod");
}

#[cfg(unix)]
#[test]
fn build_renders_per_year_listings() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    write_config(tmp.path());
    write_fake_renderer(tmp.path());
    write_citations(
        tmp.path(),
        &[
            (
                "JaneDoe_fromORCID.bib",
                "@article{Doe2020,\n  title = {{A Great Paper}},\n  year = {2020}\n}\n\
                 Doe, J. (2018). Manually formatted.\n\
                 Doe, J. (2018). Manually formatted.\n",
            ),
            (
                "JaneDoe_fromGSCHOLAR.bib",
                "@article{Doe2020, title = {A Great Paper}, year = {2020}}\n\
                 @misc{Doe2019, title = {Different Work}, year = {2019}}\n",
            ),
        ],
    );

    let mut cmd = Command::cargo_bin("pubcite")?;
    cmd.env("NO_COLOR", "1")
        .current_dir(tmp.path())
        .arg("--config")
        .arg(tmp.path().join("config.json"))
        .arg("build")
        .assert()
        .success();

    let output = tmp.path().join("output");

    // The combined corpus keeps both colliding Doe2020 entries, reconciled.
    let corpus = fs::read_to_string(output.join("combined_bibtex.bib"))?;
    assert!(corpus.contains("@article{Doe2020,"));
    assert!(corpus.contains("@article{Doe2020a,"));

    // One listing per year; the duplicate title renders only once.
    let html_2020 = fs::read_to_string(output.join("output2020.html"))?;
    assert_eq!(html_2020.matches("<li>").count(), 1);
    assert!(html_2020.starts_with("<ul>"));
    assert!(!html_2020.contains("<a name="));
    assert!(!html_2020.contains("bibtex2html"));

    let html_2019 = fs::read_to_string(output.join("output2019.html"))?;
    assert!(html_2019.contains("Entry Doe2019"));

    // Freeform entries survive exactly once under the manual-insertion header.
    let listing = fs::read_to_string(output.join("combined_nonbibtex_citations.txt"))?;
    assert!(listing.starts_with("Following need to be manually inserted:"));
    assert_eq!(listing.matches("Manually formatted.").count(), 1);

    // Per-year filter lists do not outlive the run.
    assert!(!output.join("tmp").exists());

    Ok(())
}

#[cfg(unix)]
#[test]
fn build_survives_renderer_failures() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempfile::tempdir()?;
    write_config(tmp.path());
    write_citations(
        tmp.path(),
        &[(
            "JaneDoe_fromPubmed.bib",
            "@article{pmid1, title = {One}, year = {2020}}\n\
             @article{pmid2, title = {Two}, year = {2021}}\n",
        )],
    );

    // A renderer that always fails: every year is attempted, none aborts the run.
    let tools = tmp.path().join("tools");
    fs::create_dir_all(&tools)?;
    for exe in ["bibtex2html_linux", "bibtex2html_osx"] {
        let path = tools.join(exe);
        fs::write(&path, "#!/bin/sh\necho 'style not found' >&2\nexit 2\n")?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    }

    let mut cmd = Command::cargo_bin("pubcite")?;
    let assert = cmd
        .env("NO_COLOR", "1")
        .current_dir(tmp.path())
        .arg("--config")
        .arg(tmp.path().join("config.json"))
        .arg("build")
        .assert()
        .success();

    let stderr = String::from_utf8(strip_ansi_escapes::strip(
        assert.get_output().stderr.clone(),
    ))?;
    assert!(
        stderr.contains("2 year(s) failed to render"),
        "stderr:\n{stderr}"
    );
    assert!(stderr.contains("style not found"), "stderr:\n{stderr}");

    Ok(())
}

#[test]
fn build_fails_without_citations() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    write_config(tmp.path());
    fs::create_dir_all(tmp.path().join("citations"))?;

    let mut cmd = Command::cargo_bin("pubcite")?;
    cmd.env("NO_COLOR", "1")
        .current_dir(tmp.path())
        .arg("--config")
        .arg(tmp.path().join("config.json"))
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no citation files"));

    Ok(())
}

#[test]
fn missing_config_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("pubcite")?;
    cmd.env("NO_COLOR", "1")
        .arg("--config")
        .arg("/nonexistent/config.json")
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config"));

    Ok(())
}
