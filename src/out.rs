//! Report and artifact writers.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::aggregate::MutationScore;
use crate::results::GremlinStatus;
use crate::run_report::MutationRunReport;

/// Write `report.json` with the full machine-readable run report.
pub fn write_json_report(out_dir: &Path, report: &MutationRunReport) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create report dir {:?}", out_dir))?;
    write_pretty_json(&out_dir.join("report.json"), report)
}

/// Write `report.html`: summary counts, per-file table, survivor list.
pub fn write_html_report(out_dir: &Path, score: &MutationScore) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create report dir {:?}", out_dir))?;

    let mut file_rows = String::new();
    for (path, file) in score.by_file() {
        file_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.1}%</td></tr>\n",
            escape(&path.display().to_string()),
            file.zapped + file.timeout,
            file.total,
            file.percentage()
        ));
    }

    let mut survivor_rows = String::new();
    for record in score.top_survivors(50) {
        survivor_rows.push_str(&format!(
            "<tr><td>{}:{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&record.path.display().to_string()),
            record.line,
            escape(&record.description),
            escape(&record.operator)
        ));
    }
    if survivor_rows.is_empty() {
        survivor_rows = "<tr><td colspan=\"3\">None - every gremlin was zapped.</td></tr>\n".to_string();
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>gremlins mutation report</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; margin-bottom: 2rem; }}
th, td {{ border: 1px solid #ccc; padding: 0.35rem 0.75rem; text-align: left; }}
.score {{ font-size: 1.5rem; }}
</style>
</head>
<body>
<h1>gremlins mutation report</h1>
<p class="score">Mutation score: <strong>{percentage:.1}%</strong></p>
<p>{zapped} zapped, {survived} survived, {timeout} timeouts, {error} errors ({total} total)</p>
<h2>Per-file results</h2>
<table>
<tr><th>File</th><th>Detected</th><th>Total</th><th>Score</th></tr>
{file_rows}</table>
<h2>Top surviving gremlins</h2>
<table>
<tr><th>Location</th><th>Change</th><th>Operator</th></tr>
{survivor_rows}</table>
</body>
</html>
"#,
        percentage = score.percentage(),
        zapped = score.zapped,
        survived = score.survived,
        timeout = score.timeout,
        error = score.error,
        total = score.total,
    );

    let path = out_dir.join("report.html");
    fs::write(&path, html).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

/// Write the instrumented-sources manifest workers hand to the host runner.
///
/// Maps logical (root-relative) module paths to the instrumented files the
/// runner should import instead.
pub fn write_sources_manifest(
    instrumented_dir: &Path,
    sources: &BTreeMap<String, String>,
) -> Result<std::path::PathBuf> {
    fs::create_dir_all(instrumented_dir)
        .with_context(|| format!("failed to create {:?}", instrumented_dir))?;
    let path = instrumented_dir.join("sources.json");
    write_pretty_json(&path, sources)?;
    Ok(path)
}

/// Plain-text survivor list (`missed.txt`), one gremlin per line.
pub fn write_missed_txt(out_dir: &Path, score: &MutationScore) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create report dir {:?}", out_dir))?;

    let mut out = String::new();
    for record in &score.records {
        if record.status != GremlinStatus::Survived {
            continue;
        }
        out.push_str(&format!(
            "{} {}:{} {}: {}\n",
            record.id,
            record.path.display(),
            record.line,
            record.operator,
            record.description,
        ));
    }

    let path = out_dir.join("missed.txt");
    fs::write(&path, out).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

// `?Sized` allows passing unsized values such as slices.
fn write_pretty_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize json")?;
    fs::write(path, json).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
