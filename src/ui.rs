use std::env;
use std::fmt::Display;

use console::{style, Term};

use crate::gremlin::Gremlin;
use crate::results::{GremlinStatus, WorkerResult};

/// Console output routing for the CLI.
///
/// Human-readable text goes to stdout and problems to stderr. Under `--json`
/// every human line moves to stderr, leaving stdout to carry nothing but the
/// machine report. Styling is applied only when the human stream is an
/// interactive terminal and neither `NO_COLOR` nor `CI` is set, so piped
/// output never contains ANSI sequences.
pub struct Ui {
    human: Term,
    problems: Term,
    styled: bool,
    muted: bool,
}

fn wants_style(target: &Term) -> bool {
    if env::var_os("NO_COLOR").is_some() || env::var_os("CI").is_some() {
        return false;
    }
    target.is_term()
}

impl Ui {
    pub fn new(json_mode: bool) -> Self {
        let human = if json_mode {
            Term::stderr()
        } else {
            Term::stdout()
        };
        Self {
            styled: wants_style(&human),
            human,
            problems: Term::stderr(),
            muted: false,
        }
    }

    /// A Ui that prints nothing, to keep unit-test output readable.
    #[cfg(test)]
    pub fn silent() -> Self {
        Self {
            human: Term::stdout(),
            problems: Term::stderr(),
            styled: false,
            muted: true,
        }
    }

    fn emit(&self, target: &Term, text: &str) {
        if self.muted {
            return;
        }
        let _ = target.write_line(text);
    }

    pub fn line(&self, msg: impl Display) {
        self.emit(&self.human, &msg.to_string());
    }

    pub fn title(&self, msg: impl Display) {
        let text = msg.to_string();
        if self.styled {
            self.emit(&self.human, &style(text).bold().to_string());
        } else {
            self.emit(&self.human, &text);
        }
    }

    pub fn warn(&self, msg: impl Display) {
        let text = msg.to_string();
        if self.styled {
            self.emit(&self.problems, &style(text).yellow().to_string());
        } else {
            self.emit(&self.problems, &text);
        }
    }

    pub fn error(&self, msg: impl Display) {
        let text = msg.to_string();
        if self.styled {
            self.emit(&self.problems, &style(text).red().bold().to_string());
        } else {
            self.emit(&self.problems, &text);
        }
    }

    /// Per-gremlin progress line as results stream in from the pool.
    pub fn gremlin_progress(&self, gremlin: Option<&Gremlin>, result: &WorkerResult) {
        let location = gremlin
            .map(|g| format!("{}:{}", g.path.display(), g.line))
            .unwrap_or_default();
        let change = gremlin.map(|g| g.description.as_str()).unwrap_or("");

        if !self.styled {
            // Plain, stable lines for pipes and snapshots.
            self.line(format!(
                "{} {} {location} {change}",
                result.gremlin_id,
                result.status.label(),
            ));
            return;
        }

        let duration = result
            .execution_time_ms
            .map(|ms| format!("{}ms", ms.round() as u64))
            .unwrap_or_else(|| "-".to_string());
        self.line(format!(
            "{tag} {duration:>7}  {id} {location} {change}",
            tag = outcome_tag(result.status),
            id = result.gremlin_id,
        ));
    }

    pub fn is_styled(&self) -> bool {
        self.styled && !self.muted
    }
}

fn outcome_tag(status: GremlinStatus) -> console::StyledObject<&'static str> {
    match status {
        GremlinStatus::Zapped => style("ZAPPED").green().bold(),
        GremlinStatus::Survived => style("SURVIVED").red().bold(),
        GremlinStatus::Timeout => style("TIMEOUT").yellow().bold(),
        GremlinStatus::Error => style("ERROR").magenta().bold(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn silent_ui_swallows_output() {
        let ui = Ui::silent();
        ui.line("hello");
        ui.title("heading");
        ui.warn("warned");
        ui.error("errored");
        assert!(!ui.is_styled());
    }

    #[test]
    fn progress_handles_missing_gremlin_metadata() {
        let ui = Ui::silent();
        let result = WorkerResult::survived("g001".to_string(), Some(5.0));
        ui.gremlin_progress(None, &result);

        let gremlin = Gremlin {
            id: "g001".to_string(),
            path: PathBuf::from("src/a.py"),
            line: 3,
            operator: "comparison".to_string(),
            description: ">= to >".to_string(),
            original: String::new(),
            mutated: String::new(),
        };
        ui.gremlin_progress(Some(&gremlin), &result);
    }
}
