//! Entity runners
//!
//! One runner per spawned shape application. Each runner walks the child's
//! output through a linear state machine with branches, classifies the
//! behavior as a [`ReturnCode`] and coordinates shutdown with the
//! counterpart role through the finish-flag barrier.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::common::{Error, Result};
use crate::suite::checks::CheckStrategy;

use super::barrier::{self, FinishFlag, FinishWatch};
use super::ledger::SampleLedger;
use super::matcher::{sample_index_re, sample_record_re, Expect, OutputMatcher, Pattern};
use super::{ReturnCode, MAX_SAMPLES_SAVED};

// Output markers of the shape application contract. A conformant test
// executable must emit these (or near-literal variants) at each protocol
// milestone.
const TOPIC_CREATED: &str = "Create topic:";
const READER_CREATED: &str = "Create reader for topic:";
const WRITER_CREATED: &str = "Create writer for topic";
const FILTER_CREATION_FAILED: &str = "failed to create content filtered topic";
const PUBLICATION_MATCHED: &str = "on_publication_matched()";
const OFFERED_INCOMPATIBLE_QOS: &str = "on_offered_incompatible_qos";
const OFFERED_DEADLINE_MISSED: &str = "on_offered_deadline_missed()";
const REQUESTED_INCOMPATIBLE_QOS: &str = "on_requested_incompatible_qos()";
const REQUESTED_DEADLINE_MISSED: &str = "on_requested_deadline_missed()";

/// Whether an entity acts as publisher or subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Publisher,
    Subscriber,
}

impl Role {
    /// Derive the role from a shape-application parameter string.
    ///
    /// `-P` selects publisher and takes precedence; `-S` selects subscriber;
    /// neither is a fatal configuration error.
    pub fn from_parameters(parameters: &str) -> Result<Role> {
        let mut tokens = parameters.split_whitespace();
        if tokens.any(|t| t == "-P") {
            return Ok(Role::Publisher);
        }
        if parameters.split_whitespace().any(|t| t == "-S") {
            return Ok(Role::Subscriber);
        }
        Err(Error::RoleNotRecognized(parameters.to_string()))
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Publisher => "Publisher",
            Role::Subscriber => "Subscriber",
        }
    }
}

/// Launch spec for one entity of a test case.
#[derive(Debug, Clone)]
pub struct EntitySpec {
    /// Position within the test case, aligned with the expected codes.
    pub index: usize,
    pub role: Role,
    /// Human label used in reports: `Publisher_1`, `Subscriber_2`, ...
    pub label: String,
    pub executable: PathBuf,
    pub parameters: String,
}

impl EntitySpec {
    /// Whether the launch parameters request sample retention (`-w`).
    pub fn retains_samples(&self) -> bool {
        self.parameters.split_whitespace().any(|t| t == "-w")
    }
}

/// What one entity run produced.
#[derive(Debug)]
pub struct EntityRunResult {
    pub index: usize,
    pub role: Role,
    pub label: String,
    pub code: ReturnCode,
    /// Raw captured output (stdout, then stderr), unstripped.
    pub output: String,
}

struct Spawned {
    child: Child,
    matcher: OutputMatcher,
    stderr: JoinHandle<String>,
}

fn spawn_shape(spec: &EntitySpec) -> std::result::Result<Spawned, String> {
    let mut cmd = Command::new(&spec.executable);
    cmd.args(spec.parameters.split_whitespace())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // A hung case that gets aborted must not leave children behind.
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return Err(format!(
                "failed to spawn '{}': {}",
                spec.executable.display(),
                e
            ))
        }
    };

    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => return Err("child stdout was not piped".to_string()),
    };
    let mut stderr = child.stderr.take();
    let stderr = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(stderr) = stderr.as_mut() {
            let _ = stderr.read_to_string(&mut buf).await;
        }
        buf
    });

    Ok(Spawned {
        child,
        matcher: OutputMatcher::new(stdout),
        stderr,
    })
}

/// Send the graceful interrupt and reap the child, escalating to a kill if
/// it ignores the interrupt.
async fn interrupt(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGINT);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }

    if tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .is_err()
    {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

async fn shutdown(spawned: Spawned) -> String {
    let Spawned {
        mut child,
        matcher,
        stderr,
    } = spawned;
    interrupt(&mut child).await;
    let mut output = matcher.into_log();
    if let Ok(err) = stderr.await {
        if !err.is_empty() {
            output.push('\n');
            output.push_str(&err);
        }
    }
    output
}

/// Drive a subscriber shape application to a terminal classification.
///
/// After classifying, the runner sets its own finish flag, waits for every
/// publisher of the case to finish and only then interrupts the child, so
/// slow counterparts keep a live peer until they reach their own terminal
/// code.
pub async fn run_subscriber(
    spec: EntitySpec,
    timeout: Duration,
    flag: FinishFlag,
    mut publishers: Vec<FinishWatch>,
    ledgers: Vec<SampleLedger>,
    check: CheckStrategy,
) -> EntityRunResult {
    debug!(label = %spec.label, exe = %spec.executable.display(), "running subscriber");

    let mut spawned = match spawn_shape(&spec) {
        Ok(spawned) => spawned,
        Err(message) => {
            // Still participate in the barrier so publishers are not left
            // waiting on a flag that would never be set.
            flag.set();
            barrier::wait_all(&mut publishers).await;
            return EntityRunResult {
                index: spec.index,
                role: spec.role,
                label: spec.label,
                code: ReturnCode::SpawnFailed,
                output: message,
            };
        }
    };

    let code = subscriber_machine(&mut spawned.matcher, &check, &ledgers, timeout, &spec).await;

    flag.set();
    debug!(label = %spec.label, "waiting for publishers to finish");
    barrier::wait_all(&mut publishers).await;
    let output = shutdown(spawned).await;

    EntityRunResult {
        index: spec.index,
        role: spec.role,
        label: spec.label,
        code,
        output,
    }
}

async fn subscriber_machine(
    matcher: &mut OutputMatcher,
    check: &CheckStrategy,
    ledgers: &[SampleLedger],
    timeout: Duration,
    spec: &EntitySpec,
) -> ReturnCode {
    debug!(label = %spec.label, "waiting for topic creation");
    match matcher
        .expect(&[Pattern::Lit(TOPIC_CREATED)], timeout)
        .await
    {
        Expect::Matched { .. } => {}
        Expect::Timeout | Expect::Eof => return ReturnCode::TopicNotCreated,
    }

    debug!(label = %spec.label, "waiting for data reader creation");
    match matcher
        .expect(
            &[
                Pattern::Lit(READER_CREATED),
                Pattern::Lit(FILTER_CREATION_FAILED),
            ],
            timeout,
        )
        .await
    {
        Expect::Matched { index: 0, .. } => {}
        Expect::Matched { .. } => return ReturnCode::FilterNotCreated,
        Expect::Timeout | Expect::Eof => return ReturnCode::ReaderNotCreated,
    }

    debug!(label = %spec.label, "waiting for first sample");
    match matcher
        .expect(
            &[
                Pattern::Re(sample_index_re()),
                Pattern::Lit(REQUESTED_INCOMPATIBLE_QOS),
                Pattern::Lit(REQUESTED_DEADLINE_MISSED),
            ],
            timeout,
        )
        .await
    {
        Expect::Matched { index: 0, text } => {
            debug!(label = %spec.label, "receiving samples");
            check.run(matcher, ledgers, timeout, &text).await
        }
        Expect::Matched { index: 1, .. } => ReturnCode::IncompatibleQos,
        Expect::Matched { .. } => ReturnCode::DeadlineMissed,
        Expect::Timeout | Expect::Eof => ReturnCode::DataNotReceived,
    }
}

/// Drive a publisher shape application to a terminal classification.
///
/// The barrier is asymmetric to the subscriber's: the publisher first waits
/// for every subscriber to finish, then sets its own flag and interrupts
/// the child.
pub async fn run_publisher(
    spec: EntitySpec,
    timeout: Duration,
    flag: FinishFlag,
    mut subscribers: Vec<FinishWatch>,
    ledger: SampleLedger,
) -> EntityRunResult {
    debug!(label = %spec.label, exe = %spec.executable.display(), "running publisher");

    let mut spawned = match spawn_shape(&spec) {
        Ok(spawned) => spawned,
        Err(message) => {
            barrier::wait_all(&mut subscribers).await;
            flag.set();
            return EntityRunResult {
                index: spec.index,
                role: spec.role,
                label: spec.label,
                code: ReturnCode::SpawnFailed,
                output: message,
            };
        }
    };

    let code = publisher_machine(&mut spawned.matcher, &ledger, timeout, &spec).await;

    debug!(label = %spec.label, "waiting for subscribers to finish");
    barrier::wait_all(&mut subscribers).await;
    flag.set();
    let output = shutdown(spawned).await;

    EntityRunResult {
        index: spec.index,
        role: spec.role,
        label: spec.label,
        code,
        output,
    }
}

async fn publisher_machine(
    matcher: &mut OutputMatcher,
    ledger: &SampleLedger,
    timeout: Duration,
    spec: &EntitySpec,
) -> ReturnCode {
    debug!(label = %spec.label, "waiting for topic creation");
    match matcher
        .expect(&[Pattern::Lit(TOPIC_CREATED)], timeout)
        .await
    {
        Expect::Matched { .. } => {}
        Expect::Timeout | Expect::Eof => return ReturnCode::TopicNotCreated,
    }

    debug!(label = %spec.label, "waiting for data writer creation");
    match matcher
        .expect(&[Pattern::Lit(WRITER_CREATED)], timeout)
        .await
    {
        Expect::Matched { .. } => {}
        Expect::Timeout | Expect::Eof => return ReturnCode::WriterNotCreated,
    }

    debug!(label = %spec.label, "waiting for matching data reader");
    match matcher
        .expect(
            &[
                Pattern::Lit(PUBLICATION_MATCHED),
                Pattern::Lit(OFFERED_INCOMPATIBLE_QOS),
            ],
            timeout,
        )
        .await
    {
        Expect::Matched { index: 0, .. } => {}
        Expect::Matched { .. } => return ReturnCode::IncompatibleQos,
        Expect::Timeout | Expect::Eof => return ReturnCode::ReaderNotMatched,
    }

    if !spec.retains_samples() {
        return ReturnCode::Ok;
    }

    // Sample retention: record what the writer prints so subscriber-side
    // checks can cross-reference. The cap bounds the ledger, not the
    // publisher, which keeps writing until interrupted.
    debug!(label = %spec.label, "sending samples");
    let sample_or_deadline = [
        Pattern::Re(sample_index_re()),
        Pattern::Lit(OFFERED_DEADLINE_MISSED),
    ];
    let mut matched_text = match matcher.expect(&sample_or_deadline, timeout).await {
        Expect::Matched { index: 0, text } => text,
        Expect::Matched { .. } => return ReturnCode::DeadlineMissed,
        Expect::Timeout | Expect::Eof => return ReturnCode::DataNotSent,
    };

    for _ in 0..MAX_SAMPLES_SAVED {
        if let Some(record) = sample_record_re().find(&matched_text) {
            ledger.push(record.as_str().to_string());
        }
        match matcher.expect(&sample_or_deadline, timeout).await {
            Expect::Matched { index: 0, text } => matched_text = text,
            Expect::Matched { .. } => return ReturnCode::DeadlineMissed,
            Expect::Timeout | Expect::Eof => return ReturnCode::DataNotSent,
        }
    }

    ReturnCode::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_from_parameters() {
        assert_eq!(
            Role::from_parameters("-P -t Square -x 2").unwrap(),
            Role::Publisher
        );
        assert_eq!(
            Role::from_parameters("-t Square -S").unwrap(),
            Role::Subscriber
        );
        assert!(Role::from_parameters("-t Square -x 2").is_err());
    }

    #[test]
    fn role_marker_must_be_a_whole_token() {
        // "-Something" must not read as a subscriber marker.
        assert!(Role::from_parameters("-Pub -Sub").is_err());
    }

    #[test]
    fn retention_flag_detection() {
        let spec = EntitySpec {
            index: 0,
            role: Role::Publisher,
            label: "Publisher_1".into(),
            executable: "shape".into(),
            parameters: "-P -t Square -w -x 2".into(),
        };
        assert!(spec.retains_samples());

        let spec = EntitySpec {
            parameters: "-P -t Square -x 2".into(),
            ..spec
        };
        assert!(!spec.retains_samples());
    }
}
