//! Test suite driver
//!
//! Iterates the configured suites case by case, strictly sequentially,
//! applies case filters, invokes the case runner and persists the final
//! report. Configuration problems abort before anything is spawned;
//! expected-vs-produced mismatches never do.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use colored::Colorize;
use tracing::{debug, info};

use crate::common::{Error, Result};
use crate::harness::case::{run_case, CaseConfig};
use crate::report::{self, CaseOutcome, RunReport};

use super::definition::{self, SuiteSet, TestCase};

/// Everything one invocation of the driver needs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Publisher shape-application executable.
    pub publisher: PathBuf,
    /// Subscriber shape-application executable.
    pub subscriber: PathBuf,
    /// Builtin suite name or path to a YAML suite file.
    pub suite: String,
    /// Allow-list of case names; `None` runs all.
    pub tests: Option<Vec<String>>,
    /// Deny-list of case names. Mutually exclusive with `tests`.
    pub disabled: Option<Vec<String>>,
    /// Appended as `-x <value>` to entity specs that do not set one.
    pub data_representation: String,
    /// Report path; derived from the executable names when `None`.
    pub output: Option<PathBuf>,
    pub case_config: CaseConfig,
}

/// Keep only the vendor-identifying part of an executable name, dropping
/// the path and the `_shape`/`-shape` suffix.
fn executable_identity(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let name = name.split("_shape").next().unwrap_or(&name);
    let name = name.split("-shape").next().unwrap_or(name);
    name.to_string()
}

/// Append the default data representation unless the spec already sets one.
fn with_data_representation(parameters: &str, representation: &str) -> String {
    if parameters.split_whitespace().any(|t| t == "-x") {
        parameters.to_string()
    } else {
        format!("{parameters} -x {representation}")
    }
}

/// Every name in `selection` must exist in at least one suite table.
fn validate_selection(suites: &SuiteSet, selection: Option<&[String]>) -> Result<()> {
    let Some(names) = selection else {
        return Ok(());
    };
    for name in names {
        let known = suites.values().any(|cases| cases.contains_key(name));
        if !known {
            return Err(Error::TestCaseNotFound {
                case: name.clone(),
                suite: suites.keys().cloned().collect::<Vec<_>>().join(", "),
            });
        }
    }
    Ok(())
}

fn is_selected(name: &str, options: &RunOptions) -> bool {
    if let Some(disabled) = &options.disabled {
        if disabled.iter().any(|d| d == name) {
            return false;
        }
    }
    if let Some(tests) = &options.tests {
        return tests.iter().any(|t| t == name);
    }
    true
}

fn resolve_suites(suite: &str) -> Result<SuiteSet> {
    let builtin = definition::builtin();
    if let Some(cases) = builtin.get(suite) {
        let mut set = SuiteSet::new();
        set.insert(suite.to_string(), cases.clone());
        return Ok(set);
    }
    let path = Path::new(suite);
    if path.is_file() {
        return definition::load_file(path);
    }
    Err(Error::SuiteNotFound(suite.to_string()))
}

fn default_report_path(options: &RunOptions) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    PathBuf::from(format!(
        "{}-{}-{stamp}.xml",
        executable_identity(&options.publisher),
        executable_identity(&options.subscriber),
    ))
}

/// Run all selected cases and persist the report. Returns the aggregate
/// run so callers can summarize or set an exit code.
pub async fn run(options: &RunOptions) -> Result<RunReport> {
    if options.tests.is_some() && options.disabled.is_some() {
        return Err(Error::Config(
            "--test and --disable-test are mutually exclusive".to_string(),
        ));
    }

    let suites = resolve_suites(&options.suite)?;
    validate_selection(&suites, options.tests.as_deref())?;
    validate_selection(&suites, options.disabled.as_deref())?;

    let suite_label = format!(
        "{}---{}",
        executable_identity(&options.publisher),
        executable_identity(&options.subscriber)
    );
    info!(suite = %suite_label, "starting interoperability run");

    let run_started = Instant::now();
    let mut outcomes = Vec::new();

    for (suite_name, cases) in &suites {
        for (case_name, case) in cases {
            if !is_selected(case_name, options) {
                debug!(case = %case_name, "skipped by selection");
                continue;
            }

            let prepared = TestCase {
                apps: case
                    .apps
                    .iter()
                    .map(|app| with_data_representation(app, &options.data_representation))
                    .collect(),
                expected_codes: case.expected_codes.clone(),
                check: case.check.clone(),
            };

            let full_name = format!("{suite_name}_{case_name}");
            info!(case = %full_name, "running test case");
            let case_started = Instant::now();

            let outcome = match run_case(
                &full_name,
                &prepared,
                &options.publisher,
                &options.subscriber,
                &options.case_config,
            )
            .await
            {
                Ok(results) => CaseOutcome {
                    name: full_name.clone(),
                    parameters: prepared.apps.clone(),
                    expected: prepared.expected_codes.clone(),
                    results,
                    duration: case_started.elapsed(),
                    error: None,
                },
                Err(e @ Error::CaseHung { .. }) => CaseOutcome {
                    name: full_name.clone(),
                    parameters: prepared.apps.clone(),
                    expected: prepared.expected_codes.clone(),
                    results: Vec::new(),
                    duration: case_started.elapsed(),
                    error: Some(e.to_string()),
                },
                Err(e) => return Err(e),
            };

            print_verdict(&outcome);
            outcomes.push(outcome);
        }
    }

    let run = RunReport {
        suite: suite_label,
        outcomes,
        duration: run_started.elapsed(),
    };

    let path = options
        .output
        .clone()
        .unwrap_or_else(|| default_report_path(options));
    report::write(&run, &path)?;
    info!(report = %path.display(), "report written");

    Ok(run)
}

fn print_verdict(outcome: &CaseOutcome) {
    if outcome.passed() {
        println!("{} : {}", outcome.name, "OK".green());
        return;
    }
    println!("{} : {}", outcome.name, "ERROR".red());
    if let Some(error) = &outcome.error {
        println!("  {error}");
    }
    for (label, expected, produced) in outcome.code_rows() {
        if expected != produced {
            println!(
                "  {label} expected code: {}; Code found: {}",
                expected.as_str().dimmed(),
                produced.as_str().red()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_strips_path_and_shape_suffix() {
        assert_eq!(
            executable_identity(Path::new(
                "./objs/x64Linux/rti_connext_dds-6.1.1_shape_main_linux"
            )),
            "rti_connext_dds-6.1.1"
        );
        assert_eq!(
            executable_identity(Path::new("/opt/opendds-shape-main")),
            "opendds"
        );
        assert_eq!(executable_identity(Path::new("plain_binary")), "plain_binary");
    }

    #[test]
    fn data_representation_appended_only_when_absent() {
        assert_eq!(
            with_data_representation("-P -t Square", "2"),
            "-P -t Square -x 2"
        );
        assert_eq!(
            with_data_representation("-P -t Square -x 1", "2"),
            "-P -t Square -x 1"
        );
    }

    #[test]
    fn unknown_selected_case_is_fatal() {
        let suites = definition::builtin();
        let missing = vec!["No_Such_Case".to_string()];
        assert!(matches!(
            validate_selection(&suites, Some(&missing)),
            Err(Error::TestCaseNotFound { .. })
        ));
        let present = vec!["Test_Domain_0".to_string()];
        assert!(validate_selection(&suites, Some(&present)).is_ok());
        assert!(validate_selection(&suites, None).is_ok());
    }

    #[test]
    fn selection_filters() {
        let base = RunOptions {
            publisher: "pub".into(),
            subscriber: "sub".into(),
            suite: "interoperability_test_suite".into(),
            tests: None,
            disabled: None,
            data_representation: "2".into(),
            output: None,
            case_config: CaseConfig::default(),
        };

        assert!(is_selected("Test_Domain_0", &base));

        let allow = RunOptions {
            tests: Some(vec!["Test_Domain_0".into()]),
            ..base.clone()
        };
        assert!(is_selected("Test_Domain_0", &allow));
        assert!(!is_selected("Test_Domain_1", &allow));

        let deny = RunOptions {
            disabled: Some(vec!["Test_Domain_0".into()]),
            ..base
        };
        assert!(!is_selected("Test_Domain_0", &deny));
        assert!(is_selected("Test_Domain_1", &deny));
    }

    #[test]
    fn unknown_suite_is_fatal() {
        assert!(matches!(
            resolve_suites("no_such_suite"),
            Err(Error::SuiteNotFound(_))
        ));
        assert!(resolve_suites("interoperability_test_suite").is_ok());
    }
}
