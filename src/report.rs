//! Console report rendering.

use crate::aggregate::MutationScore;
use crate::cache::CacheStats;
use crate::ui::Ui;

const BORDER_CHAR: char = '=';
const BORDER_WIDTH: usize = 70;

/// Extra context rendered alongside the score.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportContext {
    pub cache: CacheStats,
    pub dispatched: usize,
    pub uncovered: usize,
    pub verbose: bool,
}

/// Print the report through the UI (stdout, or stderr in `--json` mode).
pub fn print_report(ui: &Ui, score: &MutationScore, ctx: &ReportContext) {
    for line in render_report(score, ctx) {
        ui.line(line);
    }
}

/// Render the full console report as lines, for testability.
pub fn render_report(score: &MutationScore, ctx: &ReportContext) -> Vec<String> {
    let mut out = Vec::new();
    out.push(header(" gremlins mutation report "));
    out.push(String::new());

    if score.total == 0 {
        out.push("No gremlins tested.".to_string());
    } else {
        out.push(format!(
            "Zapped: {} gremlins ({:.1}%)",
            score.zapped,
            ratio(score.zapped, score.total)
        ));
        out.push(format!(
            "Survived: {} gremlins ({:.1}%)",
            score.survived,
            ratio(score.survived, score.total)
        ));
        if score.timeout > 0 {
            out.push(format!(
                "Timeouts: {} gremlins (counted as detected)",
                score.timeout
            ));
        }
        if score.error > 0 {
            out.push(format!("Errors: {} gremlins", score.error));
        }
        out.push(format!("Mutation score: {:.1}%", score.percentage()));
        out.push(String::new());

        let files = score.by_file();
        if files.len() > 1 || ctx.verbose {
            out.push("Per-file breakdown:".to_string());
            for (path, file) in &files {
                out.push(format!(
                    "  {:<40} {}/{} detected ({:.1}%)",
                    path.display().to_string(),
                    file.zapped + file.timeout,
                    file.total,
                    file.percentage()
                ));
            }
            out.push(String::new());
        }

        let survivors = score.top_survivors(10);
        if !survivors.is_empty() {
            out.push("Top surviving gremlins:".to_string());
            for record in survivors {
                out.push(format!(
                    "  {}:{}  {}  ({})",
                    record.path.display(),
                    record.line,
                    record.description,
                    record.operator
                ));
            }
            out.push(String::new());
        }
    }

    if ctx.uncovered > 0 {
        out.push(format!(
            "{} gremlins sit on uncovered lines and survived without a test run.",
            ctx.uncovered
        ));
    }
    if ctx.verbose {
        out.push(format!(
            "Cache: {} hits, {} misses; {} runner dispatches.",
            ctx.cache.hits, ctx.cache.misses, ctx.dispatched
        ));
    }

    out.push(footer());
    out
}

fn header(title: &str) -> String {
    let pad = BORDER_WIDTH.saturating_sub(title.len()) / 2;
    let border: String = std::iter::repeat(BORDER_CHAR).take(pad).collect();
    format!("{border}{title}{border}")
}

fn footer() -> String {
    std::iter::repeat(BORDER_CHAR).take(BORDER_WIDTH).collect()
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}
