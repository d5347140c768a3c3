//! Test harness core
//!
//! Drives one spawned shape application per entity through its protocol
//! state machine, synchronizes shutdown across the entities of a test case
//! and records what each publisher sent.

pub mod barrier;
pub mod case;
pub mod entity;
pub mod ledger;
pub mod matcher;

pub use barrier::{FinishFlag, FinishWatch};
pub use case::{run_case, CaseConfig};
pub use entity::{EntityRunResult, EntitySpec, Role};
pub use ledger::SampleLedger;
pub use matcher::{Expect, OutputMatcher, Pattern};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of samples a publisher runner records on its ledger.
pub const MAX_SAMPLES_SAVED: usize = 500;

/// Classification of an entity's observed behavior.
///
/// Derived purely from output-stream matching; never raised as an error.
/// Serialized names match the report vocabulary established by existing
/// interoperability suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnCode {
    Ok,
    TopicNotCreated,
    ReaderNotCreated,
    WriterNotCreated,
    FilterNotCreated,
    IncompatibleQos,
    ReaderNotMatched,
    DataNotReceived,
    DataNotSent,
    DataNotCorrect,
    ReceivingFromOne,
    ReceivingFromBoth,
    DeadlineMissed,
    /// The executable could not be spawned at all. Distinct from
    /// TOPIC_NOT_CREATED so a missing binary is not mistaken for a
    /// discovery problem.
    SpawnFailed,
}

impl ReturnCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::TopicNotCreated => "TOPIC_NOT_CREATED",
            Self::ReaderNotCreated => "READER_NOT_CREATED",
            Self::WriterNotCreated => "WRITER_NOT_CREATED",
            Self::FilterNotCreated => "FILTER_NOT_CREATED",
            Self::IncompatibleQos => "INCOMPATIBLE_QOS",
            Self::ReaderNotMatched => "READER_NOT_MATCHED",
            Self::DataNotReceived => "DATA_NOT_RECEIVED",
            Self::DataNotSent => "DATA_NOT_SENT",
            Self::DataNotCorrect => "DATA_NOT_CORRECT",
            Self::ReceivingFromOne => "RECEIVING_FROM_ONE",
            Self::ReceivingFromBoth => "RECEIVING_FROM_BOTH",
            Self::DeadlineMissed => "DEADLINE_MISSED",
            Self::SpawnFailed => "SPAWN_FAILED",
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
