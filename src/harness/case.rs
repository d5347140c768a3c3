//! Test case runner
//!
//! Spawns one entity runner per configured entity, publishers first, and
//! joins them all. Entities of one case run concurrently; cases themselves
//! are run strictly sequentially by the suite driver.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::common::{Error, Result};
use crate::suite::definition::TestCase;

use super::barrier::{FinishFlag, FinishWatch};
use super::entity::{run_publisher, run_subscriber, EntityRunResult, EntitySpec, Role};
use super::ledger::SampleLedger;

/// Knobs for one case execution.
#[derive(Debug, Clone)]
pub struct CaseConfig {
    /// Per-step matcher timeout.
    pub timeout: Duration,
    /// Settling delay before each spawn, avoiding discovery races.
    pub settle: Duration,
    /// Supervisory wall-clock cap for the whole case. `None` disables it,
    /// leaving a hung subprocess protected only by per-step timeouts.
    pub max_case: Option<Duration>,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            settle: Duration::from_secs(1),
            max_case: Some(Duration::from_secs(300)),
        }
    }
}

/// Run every entity of `case` and collect one result per entity, in the
/// configured entity order.
///
/// Fails fast, before any spawn, on a spec/expected-code length mismatch or
/// an unrecognized role marker.
pub async fn run_case(
    name: &str,
    case: &TestCase,
    publisher_exe: &Path,
    subscriber_exe: &Path,
    config: &CaseConfig,
) -> Result<Vec<EntityRunResult>> {
    if case.apps.len() != case.expected_codes.len() {
        return Err(Error::LengthMismatch {
            case: name.to_string(),
            apps: case.apps.len(),
            expected: case.expected_codes.len(),
        });
    }

    let roles: Vec<Role> = case
        .apps
        .iter()
        .map(|parameters| Role::from_parameters(parameters))
        .collect::<Result<_>>()?;

    // One finish flag per entity; every runner waits on the flags of the
    // counterpart role.
    let mut flags: Vec<Option<FinishFlag>> = Vec::with_capacity(roles.len());
    let mut publisher_watches: Vec<FinishWatch> = Vec::new();
    let mut subscriber_watches: Vec<FinishWatch> = Vec::new();
    // One ledger per publisher, in publisher order.
    let mut ledgers: Vec<SampleLedger> = Vec::new();

    for role in &roles {
        let (flag, watch) = FinishFlag::new();
        flags.push(Some(flag));
        match role {
            Role::Publisher => {
                publisher_watches.push(watch);
                ledgers.push(SampleLedger::new());
            }
            Role::Subscriber => subscriber_watches.push(watch),
        }
    }

    let mut handles: Vec<JoinHandle<EntityRunResult>> = Vec::with_capacity(roles.len());
    let mut publisher_number = 0usize;
    let mut subscriber_number = 0usize;

    // Publishers are spawned first so discovery traffic exists before any
    // reader comes up; each spawn is preceded by a settling delay.
    for pass_role in [Role::Publisher, Role::Subscriber] {
        for (index, role) in roles.iter().copied().enumerate() {
            if role != pass_role {
                continue;
            }
            tokio::time::sleep(config.settle).await;

            let flag = flags[index]
                .take()
                .ok_or_else(|| Error::Internal(format!("finish flag {index} taken twice")))?;

            match role {
                Role::Publisher => {
                    let spec = EntitySpec {
                        index,
                        role,
                        label: format!("Publisher_{}", publisher_number + 1),
                        executable: PathBuf::from(publisher_exe),
                        parameters: case.apps[index].clone(),
                    };
                    debug!(case = name, label = %spec.label, "spawning entity runner");
                    let ledger = ledgers[publisher_number].clone();
                    let subscribers = subscriber_watches.clone();
                    publisher_number += 1;
                    handles.push(tokio::spawn(run_publisher(
                        spec,
                        config.timeout,
                        flag,
                        subscribers,
                        ledger,
                    )));
                }
                Role::Subscriber => {
                    let spec = EntitySpec {
                        index,
                        role,
                        label: format!("Subscriber_{}", subscriber_number + 1),
                        executable: PathBuf::from(subscriber_exe),
                        parameters: case.apps[index].clone(),
                    };
                    debug!(case = name, label = %spec.label, "spawning entity runner");
                    let publishers = publisher_watches.clone();
                    let all_ledgers = ledgers.clone();
                    subscriber_number += 1;
                    handles.push(tokio::spawn(run_subscriber(
                        spec,
                        config.timeout,
                        flag,
                        publishers,
                        all_ledgers,
                        case.check.clone(),
                    )));
                }
            }
        }
    }

    let joined = join_entities(handles, name, config.max_case).await?;

    // Entities were spawned publishers-first; report in spec order.
    let mut results = joined;
    results.sort_by_key(|r| r.index);
    Ok(results)
}

async fn join_entities(
    handles: Vec<JoinHandle<EntityRunResult>>,
    case: &str,
    max_case: Option<Duration>,
) -> Result<Vec<EntityRunResult>> {
    let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
    let join_all = async {
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(
                handle
                    .await
                    .map_err(|e| Error::Internal(format!("entity runner panicked: {e}")))?,
            );
        }
        Ok(results)
    };

    match max_case {
        None => join_all.await,
        Some(cap) => match tokio::time::timeout(cap, join_all).await {
            Ok(results) => results,
            Err(_) => {
                // Aborting the runners drops the children, which are
                // spawned with kill_on_drop.
                for abort in aborts {
                    abort.abort();
                }
                Err(Error::CaseHung {
                    case: case.to_string(),
                    seconds: cap.as_secs(),
                })
            }
        },
    }
}
