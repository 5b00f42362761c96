//! Outcome aggregation and console output
//!
//! A [`VerificationReport`] is a fold over the script's event stream. The same
//! events always produce the same outcomes and console signals.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::VerifyResult;
use crate::playwright::ScriptEvent;
use crate::spec::Scenario;
use crate::visual::ScreenshotAudit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Progress line, never fails
    Progress,
    /// Navigation, upload or screenshot
    Action,
    /// Marker wait, content check, click or value comparison
    Check,
}

/// Result of a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: String,
    pub kind: OutcomeKind,
    pub passed: bool,
    pub message: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRecord {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub audit: Option<ScreenshotAudit>,
}

/// A console line derived from one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    /// `None` for neutral progress lines
    pub passed: Option<bool>,
    pub message: String,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.passed {
            Some(true) => write!(f, "{} {}", "✓".green(), self.message),
            Some(false) => write!(f, "{} {}", "✗".red(), self.message.red()),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Result of one verification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,

    /// Whether the app answered the pre-flight probe
    pub app_reachable: Option<bool>,

    /// Patterns of the route stubs the page registered
    pub stubs: Vec<String>,

    pub steps: Vec<StepOutcome>,

    /// Steps that never reported, because something outside them failed
    pub not_run: Vec<String>,

    pub screenshots: Vec<ScreenshotRecord>,

    /// Error caught by the outermost boundary
    pub fatal: Option<String>,

    pub browser_closed: bool,
}

impl VerificationReport {
    fn counted(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.kind != OutcomeKind::Progress)
    }

    pub fn passed(&self) -> usize {
        self.counted().filter(|s| s.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.counted().filter(|s| !s.passed).count()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0 && self.not_run.is_empty() && self.fatal.is_none()
    }

    /// Process exit status for this run.
    ///
    /// A completed run exits 0 even with failed checks; `strict` turns any
    /// failure into 1.
    pub fn exit_status(&self, strict: bool) -> u8 {
        if strict && !self.all_passed() {
            1
        } else {
            0
        }
    }

    pub fn screenshot(&self, name: &str) -> Option<&ScreenshotRecord> {
        self.screenshots.iter().find(|s| s.name == name)
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> VerifyResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        info!("Report written to: {}", path.display());
        Ok(())
    }
}

/// Folds script events into a report
pub struct ReportBuilder {
    scenario: Scenario,
    report: VerificationReport,
}

impl ReportBuilder {
    pub fn new(scenario: &Scenario, started_at: DateTime<Utc>) -> Self {
        Self {
            scenario: scenario.clone(),
            report: VerificationReport {
                scenario: scenario.name.clone(),
                started_at,
                duration_ms: 0,
                app_reachable: None,
                stubs: Vec::new(),
                steps: Vec::new(),
                not_run: Vec::new(),
                screenshots: Vec::new(),
                fatal: None,
                browser_closed: false,
            },
        }
    }

    pub fn app_reachable(&mut self, reachable: bool) {
        self.report.app_reachable = Some(reachable);
    }

    /// Record an event, returning the console line it produces (if any)
    pub fn apply(&mut self, event: &ScriptEvent) -> Option<Signal> {
        match event {
            ScriptEvent::Stub { pattern, .. } => {
                self.report.stubs.push(pattern.clone());
                None
            }
            ScriptEvent::Step { index, .. } => {
                let step = self.scenario.steps.get(*index)?;
                let observation = event.observation()?;
                let outcome = step.evaluate(*index, &observation);
                let signal = Signal {
                    passed: match outcome.kind {
                        OutcomeKind::Progress => None,
                        _ => Some(outcome.passed),
                    },
                    message: outcome.message.clone(),
                };
                self.report.steps.push(outcome);
                Some(signal)
            }
            ScriptEvent::Screenshot { name, path } => {
                self.report.screenshots.push(ScreenshotRecord {
                    name: name.clone(),
                    path: path.clone(),
                    audit: None,
                });
                None
            }
            ScriptEvent::Fatal { error } => {
                self.report.fatal = Some(error.clone());
                Some(Signal {
                    passed: Some(false),
                    message: format!("Verification failed: {}", error),
                })
            }
            ScriptEvent::Closed => {
                self.report.browser_closed = true;
                None
            }
        }
    }

    /// Close the report; steps that never reported are listed as not run
    pub fn finish(mut self, duration_ms: u64) -> VerificationReport {
        let reported: Vec<usize> = self.report.steps.iter().map(|s| s.index).collect();
        self.report.not_run = self
            .scenario
            .steps
            .iter()
            .enumerate()
            .filter(|(i, _)| !reported.contains(i))
            .map(|(_, step)| step.action_name())
            .collect();
        self.report.duration_ms = duration_ms;
        self.report
    }
}

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Print the end-of-run summary
pub fn print_summary(report: &VerificationReport, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(vec!["#", "Step", "Result", "Message"]);
            for step in report.counted() {
                table.add_row(vec![
                    (step.index + 1).to_string(),
                    step.action.clone(),
                    if step.passed { "pass" } else { "FAIL" }.to_string(),
                    step.message.clone(),
                ]);
            }
            for action in &report.not_run {
                table.add_row(vec![
                    "-".to_string(),
                    action.clone(),
                    "not run".to_string(),
                    String::new(),
                ]);
            }
            println!("{table}");

            if !report.screenshots.is_empty() {
                let mut shots = Table::new();
                shots
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic);
                shots.set_header(vec!["Screenshot", "Path", "Size", "Baseline"]);
                for shot in &report.screenshots {
                    let (size, baseline) = match &shot.audit {
                        Some(audit) => (
                            format!("{}x{}", audit.width, audit.height),
                            audit.baseline.to_string(),
                        ),
                        None => ("-".to_string(), "-".to_string()),
                    };
                    shots.add_row(vec![
                        shot.name.clone(),
                        shot.path.display().to_string(),
                        size,
                        baseline,
                    ]);
                }
                println!("{shots}");
            }

            println!("{}", summary_line(report));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(report).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for step in report.counted() {
                println!(
                    "{}\t{}\t{}",
                    if step.passed { "pass" } else { "fail" },
                    step.action,
                    step.message
                );
            }
            for action in &report.not_run {
                println!("skip\t{}\t", action);
            }
            println!("{}", summary_line(report));
        }
    }
}

fn summary_line(report: &VerificationReport) -> String {
    let line = format!(
        "Verification: {} passed, {} failed, {} not run ({} ms)",
        report.passed(),
        report.failed(),
        report.not_run.len(),
        report.duration_ms
    );
    if report.all_passed() {
        line.green().to_string()
    } else {
        line.yellow().to_string()
    }
}
