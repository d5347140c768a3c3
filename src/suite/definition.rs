//! Test suite definitions
//!
//! A suite is a named table of test cases; each case lists the parameter
//! strings of the shape applications to launch, the expected code per
//! entity and an optional check strategy. Suites ship builtin or load from
//! a YAML file with the same shape.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::common::{Error, Result};
use crate::harness::ReturnCode;

use super::checks::CheckStrategy;

/// One interoperability test case.
#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    /// Shape-application parameter strings, one per entity, in launch
    /// order. The role marker (`-P`/`-S`) is mandatory in each.
    pub apps: Vec<String>,
    /// Expected code per entity, index-aligned with `apps`.
    pub expected_codes: Vec<ReturnCode>,
    /// How received samples are validated on the subscriber side.
    #[serde(default)]
    pub check: CheckStrategy,
}

/// Case-name → case table of one suite. BTreeMap keeps iteration and
/// therefore execution order deterministic.
pub type CaseTable = BTreeMap<String, TestCase>;

/// Suite-name → case table. A suite file may define several suites.
pub type SuiteSet = BTreeMap<String, CaseTable>;

fn case(apps: &[&str], expected_codes: &[ReturnCode]) -> TestCase {
    TestCase {
        apps: apps.iter().map(|s| s.to_string()).collect(),
        expected_codes: expected_codes.to_vec(),
        check: CheckStrategy::AlwaysOk,
    }
}

fn checked_case(apps: &[&str], expected_codes: &[ReturnCode], check: CheckStrategy) -> TestCase {
    TestCase {
        check,
        ..case(apps, expected_codes)
    }
}

/// The builtin interoperability suite.
///
/// Parameter flags follow the shape-application convention: `-d` domain,
/// `-t` topic, `-b`/`-r` best-effort/reliable, `-k` history depth, `-f`
/// deadline period, `-s` ownership strength, `-c` color, `-D` durability,
/// `-w` print writer samples.
pub fn builtin() -> SuiteSet {
    use ReturnCode::*;

    let mut cases = CaseTable::new();

    cases.insert(
        "Test_Domain_0".into(),
        case(&["-P -t Square -d 0", "-S -t Square -d 0"], &[Ok, Ok]),
    );
    cases.insert(
        "Test_Domain_1".into(),
        case(
            &["-P -t Square -d 0", "-S -t Square -d 1"],
            &[ReaderNotMatched, DataNotReceived],
        ),
    );
    cases.insert(
        "Test_Reliability_0".into(),
        case(&["-P -t Square -b", "-S -t Square -b"], &[Ok, Ok]),
    );
    cases.insert(
        "Test_Reliability_1".into(),
        case(
            &["-P -t Square -b", "-S -t Square -r"],
            &[IncompatibleQos, IncompatibleQos],
        ),
    );
    cases.insert(
        "Test_Reliability_2".into(),
        checked_case(
            &["-P -t Square -r -k 3 -w", "-S -t Square -r -k 3"],
            &[Ok, Ok],
            CheckStrategy::ReliabilityOrder,
        ),
    );
    cases.insert(
        "Test_Deadline_0".into(),
        case(&["-P -t Square -f 3", "-S -t Square -f 5"], &[Ok, Ok]),
    );
    cases.insert(
        "Test_Deadline_1".into(),
        case(
            &["-P -t Square -f 5", "-S -t Square -f 3"],
            &[IncompatibleQos, IncompatibleQos],
        ),
    );
    cases.insert(
        "Test_Durability_0".into(),
        case(
            &["-P -t Square -D t", "-S -t Square -D v"],
            &[Ok, Ok],
        ),
    );
    cases.insert(
        "Test_Durability_1".into(),
        case(
            &["-P -t Square -D v", "-S -t Square -D t"],
            &[IncompatibleQos, IncompatibleQos],
        ),
    );
    cases.insert(
        "Test_Ownership_0".into(),
        checked_case(
            &[
                "-P -t Square -s 3 -c BLUE -w",
                "-P -t Square -s 4 -c RED -w",
                "-S -t Square -s 1",
            ],
            &[Ok, Ok, ReceivingFromBoth],
            CheckStrategy::ReceivingFromBoth,
        ),
    );

    let mut suites = SuiteSet::new();
    suites.insert("interoperability_test_suite".into(), cases);
    suites
}

/// Load one or more suites from a YAML file.
///
/// The file maps suite names to case tables, mirroring the builtin layout:
///
/// ```yaml
/// my_suite:
///   Test_Basic_0:
///     apps: ["-P -t Square", "-S -t Square"]
///     expected_codes: [OK, OK]
///     check: reliability_order   # optional
/// ```
pub fn load_file(path: &Path) -> Result<SuiteSet> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::suite_parse(path, e))?;
    let suites: SuiteSet =
        serde_yaml::from_str(&content).map_err(|e| Error::suite_parse(path, e))?;
    if suites.is_empty() {
        return Err(Error::suite_parse(path, "file defines no suites"));
    }
    Ok(suites)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_cases_are_internally_consistent() {
        for (suite, cases) in builtin() {
            assert!(!cases.is_empty(), "suite {suite} is empty");
            for (name, case) in cases {
                assert_eq!(
                    case.apps.len(),
                    case.expected_codes.len(),
                    "case {name} length mismatch"
                );
                for app in &case.apps {
                    assert!(
                        app.split_whitespace().any(|t| t == "-P" || t == "-S"),
                        "case {name} entity '{app}' has no role marker"
                    );
                }
            }
        }
    }

    #[test]
    fn yaml_round_trip() {
        let yaml = r#"
custom_suite:
  Test_Custom_0:
    apps: ["-P -t Circle", "-S -t Circle"]
    expected_codes: [OK, OK]
  Test_Custom_1:
    apps: ["-P -t Circle -w", "-S -t Circle"]
    expected_codes: [DEADLINE_MISSED, DATA_NOT_RECEIVED]
    check: reliability_order
"#;
        let suites: SuiteSet = serde_yaml::from_str(yaml).unwrap();
        let cases = suites.get("custom_suite").unwrap();
        assert_eq!(cases.len(), 2);
        let c = cases.get("Test_Custom_1").unwrap();
        assert_eq!(c.expected_codes[0], ReturnCode::DeadlineMissed);
        assert_eq!(c.check, CheckStrategy::ReliabilityOrder);
    }
}
