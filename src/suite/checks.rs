//! Sample check strategies
//!
//! Once a subscriber has received its first sample, the configured strategy
//! decides the entity's final code by reading further samples from the live
//! stream and cross-checking them against the publisher ledgers. Strategies
//! are named variants selected by the test-case definition; the default
//! checks nothing.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;

use crate::harness::ledger::SampleLedger;
use crate::harness::matcher::{sample_index_re, sample_record_re, Expect, OutputMatcher, Pattern};
use crate::harness::ReturnCode;

/// Samples a reliability check requires before judging order.
const RELIABILITY_SAMPLES: usize = 3;
/// Upper bound on samples read when attributing ownership.
const OWNERSHIP_SAMPLES: usize = 80;

/// How a subscriber's received samples are validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStrategy {
    /// Accept anything; the first received sample is proof enough.
    #[default]
    AlwaysOk,
    /// Every received sample must appear on the first publisher's ledger,
    /// in emission order.
    ReliabilityOrder,
    /// Attribute received samples to publishers and report whether one or
    /// both sources were heard (exclusive-ownership tests).
    ReceivingFromBoth,
}

impl CheckStrategy {
    /// Decide the subscriber's final code.
    ///
    /// `first_match` is the stream text consumed by the sample-index match
    /// that brought the state machine here; it usually carries the first
    /// sample record.
    pub async fn run(
        &self,
        matcher: &mut OutputMatcher,
        ledgers: &[SampleLedger],
        timeout: Duration,
        first_match: &str,
    ) -> ReturnCode {
        match self {
            CheckStrategy::AlwaysOk => ReturnCode::Ok,
            CheckStrategy::ReliabilityOrder => {
                check_reliability_order(matcher, ledgers, timeout, first_match).await
            }
            CheckStrategy::ReceivingFromBoth => {
                check_receiving_from_both(matcher, ledgers, timeout, first_match).await
            }
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            CheckStrategy::AlwaysOk => "always_ok",
            CheckStrategy::ReliabilityOrder => "reliability_order",
            CheckStrategy::ReceivingFromBoth => "receiving_from_both",
        }
    }
}

fn extract_record(text: &str) -> Option<String> {
    sample_record_re().find(text).map(|m| m.as_str().to_string())
}

async fn read_records(
    matcher: &mut OutputMatcher,
    timeout: Duration,
    first_match: &str,
    limit: usize,
    stop_at_timeout: bool,
) -> Option<Vec<String>> {
    let mut received = Vec::new();
    if let Some(record) = extract_record(first_match) {
        received.push(record);
    }
    while received.len() < limit {
        match matcher
            .expect(&[Pattern::Re(sample_index_re())], timeout)
            .await
        {
            Expect::Matched { text, .. } => {
                if let Some(record) = extract_record(&text) {
                    received.push(record);
                }
            }
            Expect::Timeout | Expect::Eof => {
                if stop_at_timeout {
                    break;
                }
                return None;
            }
        }
    }
    Some(received)
}

/// Received samples must be a subsequence of what the first publisher sent.
async fn check_reliability_order(
    matcher: &mut OutputMatcher,
    ledgers: &[SampleLedger],
    timeout: Duration,
    first_match: &str,
) -> ReturnCode {
    let received = match read_records(matcher, timeout, first_match, RELIABILITY_SAMPLES, false)
        .await
    {
        Some(received) => received,
        None => return ReturnCode::DataNotReceived,
    };

    let sent = match ledgers.first() {
        Some(ledger) => ledger.snapshot(),
        None => return ReturnCode::DataNotCorrect,
    };

    let mut sent_iter = sent.iter();
    for record in &received {
        if !sent_iter.any(|s| s == record) {
            return ReturnCode::DataNotCorrect;
        }
    }
    ReturnCode::Ok
}

/// Attribute every received sample to the publisher whose ledger carries it.
async fn check_receiving_from_both(
    matcher: &mut OutputMatcher,
    ledgers: &[SampleLedger],
    timeout: Duration,
    first_match: &str,
) -> ReturnCode {
    let received =
        match read_records(matcher, timeout, first_match, OWNERSHIP_SAMPLES, true).await {
            Some(received) if !received.is_empty() => received,
            _ => return ReturnCode::DataNotReceived,
        };

    let snapshots: Vec<Vec<String>> = ledgers.iter().map(SampleLedger::snapshot).collect();
    let mut sources: BTreeSet<usize> = BTreeSet::new();
    for record in &received {
        for (publisher, sent) in snapshots.iter().enumerate() {
            if sent.iter().any(|s| s == record) {
                sources.insert(publisher);
            }
        }
    }

    match sources.len() {
        0 => ReturnCode::DataNotReceived,
        1 => ReturnCode::ReceivingFromOne,
        _ => ReturnCode::ReceivingFromBoth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_always_ok() {
        assert_eq!(CheckStrategy::default(), CheckStrategy::AlwaysOk);
    }

    #[test]
    fn deserializes_snake_case_names() {
        let check: CheckStrategy = serde_yaml::from_str("reliability_order").unwrap();
        assert_eq!(check, CheckStrategy::ReliabilityOrder);
        let check: CheckStrategy = serde_yaml::from_str("receiving_from_both").unwrap();
        assert_eq!(check, CheckStrategy::ReceivingFromBoth);
    }

    #[test]
    fn record_extraction_takes_sample_triplet() {
        assert_eq!(
            extract_record("Square     BLUE       010 020 [30]").as_deref(),
            Some("010 020 [30]")
        );
        assert_eq!(extract_record("Create topic: Square"), None);
    }
}
