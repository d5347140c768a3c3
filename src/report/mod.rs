//! Report aggregation and persistence
//!
//! Compares produced against expected codes per entity, renders pass/fail
//! records into JUnit XML and persists the run, merging with an existing
//! report at the same path.

mod merge;

use std::fmt::Write as _;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use regex::Regex;

use crate::common::{Error, Result};
use crate::harness::{EntityRunResult, ReturnCode};

/// Outcome of one test case: what ran, what was expected, what happened.
#[derive(Debug)]
pub struct CaseOutcome {
    /// Fully qualified case name: `<suite>_<case>`.
    pub name: String,
    /// Parameter string per entity, index-aligned with `results`.
    pub parameters: Vec<String>,
    pub expected: Vec<ReturnCode>,
    pub results: Vec<EntityRunResult>,
    pub duration: Duration,
    /// Case-level execution error (e.g. wall-clock cap exceeded), which
    /// fails the case regardless of codes.
    pub error: Option<String>,
}

impl CaseOutcome {
    /// A case passes when it ran to completion and every entity produced
    /// its expected code.
    pub fn passed(&self) -> bool {
        self.error.is_none()
            && self.results.len() == self.expected.len()
            && self
                .results
                .iter()
                .zip(&self.expected)
                .all(|(result, expected)| result.code == *expected)
    }

    /// {label, expected, produced} rows for every entity.
    pub fn code_rows(&self) -> Vec<(String, ReturnCode, ReturnCode)> {
        self.results
            .iter()
            .zip(&self.expected)
            .map(|(result, expected)| (result.label.clone(), *expected, result.code))
            .collect()
    }
}

/// Aggregate outcome of one harness invocation.
#[derive(Debug)]
pub struct RunReport {
    /// `<publisher-identity>---<subscriber-identity>`.
    pub suite: String,
    pub outcomes: Vec<CaseOutcome>,
    pub duration: Duration,
}

impl RunReport {
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.passed_count()
    }
}

fn ansi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("hardcoded regex"))
}

/// Remove ANSI escape sequences.
pub fn strip_ansi(text: &str) -> String {
    ansi_re().replace_all(text, "").into_owned()
}

/// Prepare captured output for a report: no ANSI colors, no carriage
/// returns, no stray ETX from the interrupt.
fn normalize_output(text: &str) -> String {
    strip_ansi(text).replace('\r', "").replace('\u{3}', "\n")
}

/// Text table of expected vs produced codes plus every entity's output.
fn failure_description(outcome: &CaseOutcome) -> String {
    let rows = outcome.code_rows();
    let label_width = rows
        .iter()
        .map(|(label, _, _)| label.len())
        .chain(std::iter::once("Entity".len()))
        .max()
        .unwrap_or(0);

    let mut text = String::new();
    let _ = writeln!(
        text,
        "{:label_width$}  {:20}  {:20}",
        "Entity", "Expected Code", "Code Produced"
    );
    for (label, expected, produced) in &rows {
        let _ = writeln!(
            text,
            "{:label_width$}  {:20}  {:20}",
            label,
            expected.as_str(),
            produced.as_str()
        );
    }
    if let Some(error) = &outcome.error {
        let _ = writeln!(text, "\nCase error: {error}");
    }
    for (result, parameters) in outcome.results.iter().zip(&outcome.parameters) {
        let _ = writeln!(text, "\nInformation about {}:", result.label);
        let _ = writeln!(text, "Parameters: {parameters}");
        let _ = writeln!(text, "{}", normalize_output(&result.output));
    }
    text
}

/// Build the JUnit document for one run.
pub fn to_junit(run: &RunReport) -> Report {
    let mut report = Report::new("interoperability");
    report.set_time(run.duration);

    let mut suite = TestSuite::new(run.suite.clone());
    suite.set_time(run.duration);

    for outcome in &run.outcomes {
        let status = if outcome.passed() {
            TestCaseStatus::success()
        } else {
            let kind = if outcome.error.is_some() {
                NonSuccessKind::Error
            } else {
                NonSuccessKind::Failure
            };
            let mut status = TestCaseStatus::non_success(kind);
            let summary: Vec<String> = outcome
                .code_rows()
                .iter()
                .filter(|(_, expected, produced)| expected != produced)
                .map(|(label, expected, produced)| {
                    format!("{label}: expected {expected}, produced {produced}")
                })
                .collect();
            status.set_message(if summary.is_empty() {
                outcome.error.clone().unwrap_or_default()
            } else {
                summary.join("; ")
            });
            status.set_description(failure_description(outcome));
            status
        };

        let mut case = TestCase::new(outcome.name.clone(), status);
        case.set_time(outcome.duration);
        suite.add_test_case(case);
    }

    report.add_test_suite(suite);
    report
}

/// Serialize the run and write it to `path`.
///
/// Additive: when a report produced by this tool already exists at `path`,
/// its suites are carried over and the new suites appended.
pub fn write(run: &RunReport, path: &Path) -> Result<()> {
    let new_xml = to_junit(run)
        .to_string()
        .map_err(|e| Error::ReportSerialize(e.to_string()))?;

    let merged = match std::fs::read_to_string(path) {
        Ok(existing) => merge::merge_documents(&existing, &new_xml),
        Err(_) => new_xml,
    };

    std::fs::write(path, merged).map_err(|e| Error::report_write(path, e))
}
