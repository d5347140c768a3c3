//! Output stream matcher
//!
//! Blocks on a live child's stdout until one of an ordered list of patterns
//! matches, the deadline elapses, or the stream closes. Everything read is
//! copied into a side log so failures can be reported with the full output.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::io::AsyncReadExt;
use tokio::process::ChildStdout;
use tokio::time::Instant;

/// A candidate pattern: literal substring or regular expression.
pub enum Pattern {
    Lit(&'static str),
    Re(&'static Regex),
}

impl Pattern {
    /// Earliest (start, end) byte offsets of a match in `haystack`, if any.
    fn find(&self, haystack: &str) -> Option<(usize, usize)> {
        match self {
            Pattern::Lit(s) => haystack.find(s).map(|start| (start, start + s.len())),
            Pattern::Re(re) => re.find(haystack).map(|m| (m.start(), m.end())),
        }
    }
}

/// Outcome of one expect call.
#[derive(Debug)]
pub enum Expect {
    /// A pattern matched. `index` is the position in the candidate list;
    /// `text` is everything consumed from the stream up to and including
    /// the match.
    Matched { index: usize, text: String },
    /// The deadline elapsed without any candidate matching.
    Timeout,
    /// The stream closed (or failed) without any candidate matching.
    Eof,
}

/// Pattern matcher over a child process stdout.
///
/// Owns the piped stream and an accumulating capture log. Matching consumes
/// the stream up to the end of the match; unmatched tail bytes stay buffered
/// for the next call.
pub struct OutputMatcher {
    stdout: ChildStdout,
    /// Bytes read but not yet consumed by a match.
    pending: String,
    /// Everything ever read, kept for failure reporting.
    log: String,
    eof: bool,
}

impl OutputMatcher {
    pub fn new(stdout: ChildStdout) -> Self {
        Self {
            stdout,
            pending: String::new(),
            log: String::new(),
            eof: false,
        }
    }

    /// Wait until one of `patterns` matches, the timeout elapses or the
    /// stream closes.
    ///
    /// The earliest match position in the buffered stream wins; position
    /// ties break by list order, so the first-listed candidate takes
    /// precedence. The timeout bounds the whole call, not individual reads.
    pub async fn expect(&mut self, patterns: &[Pattern], timeout: Duration) -> Expect {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 4096];

        loop {
            if let Some((index, end)) = self.best_match(patterns) {
                let text: String = self.pending.drain(..end).collect();
                return Expect::Matched { index, text };
            }
            if self.eof {
                return Expect::Eof;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Expect::Timeout;
            }

            match tokio::time::timeout(remaining, self.stdout.read(&mut chunk)).await {
                Err(_) => return Expect::Timeout,
                // Read errors classify like a closed stream.
                Ok(Err(_)) | Ok(Ok(0)) => self.eof = true,
                Ok(Ok(n)) => {
                    let text = String::from_utf8_lossy(&chunk[..n]);
                    self.pending.push_str(&text);
                    self.log.push_str(&text);
                }
            }
        }
    }

    fn best_match(&self, patterns: &[Pattern]) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize, usize)> = None;
        for (index, pattern) in patterns.iter().enumerate() {
            if let Some((start, end)) = pattern.find(&self.pending) {
                // Strictly-less keeps the first-listed candidate on ties.
                if best.map(|(s, _, _)| start < s).unwrap_or(true) {
                    best = Some((start, index, end));
                }
            }
        }
        best.map(|(_, index, end)| (index, end))
    }

    /// Full capture log accumulated so far.
    pub fn log(&self) -> &str {
        &self.log
    }

    /// Consume the matcher, returning the capture log.
    pub fn into_log(self) -> String {
        self.log
    }
}

/// Marker for one sample printed by a shape application, e.g. `[20]`.
pub fn sample_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[0-9]+\]").expect("hardcoded regex"))
}

/// Full sample record within a printed line: `x y [size]`.
pub fn sample_record_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+ [0-9]+ \[[0-9]+\]").expect("hardcoded regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    async fn matcher_for(script: &str) -> OutputMatcher {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdout(Stdio::piped())
            .spawn()
            .expect("spawn sh");
        OutputMatcher::new(child.stdout.take().expect("piped stdout"))
    }

    #[tokio::test]
    async fn literal_match_returns_index_and_text() {
        let mut m = matcher_for("printf 'hello Create topic: Square rest'").await;
        match m
            .expect(&[Pattern::Lit("Create topic:")], Duration::from_secs(2))
            .await
        {
            Expect::Matched { index, text } => {
                assert_eq!(index, 0);
                assert_eq!(text, "hello Create topic:");
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn earliest_position_wins_over_list_order() {
        let mut m = matcher_for(
            "printf 'on_requested_incompatible_qos()\\non_requested_deadline_missed()\\n'",
        )
        .await;
        // Deadline is listed first but incompatible appears earlier in the
        // stream, so incompatible wins.
        match m
            .expect(
                &[
                    Pattern::Lit("on_requested_deadline_missed()"),
                    Pattern::Lit("on_requested_incompatible_qos"),
                ],
                Duration::from_secs(2),
            )
            .await
        {
            Expect::Matched { index, .. } => assert_eq!(index, 1),
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_order_breaks_position_ties() {
        let mut m = matcher_for("printf 'on_requested_incompatible_qos()'").await;
        // Both candidates match at the same offset; the first listed wins.
        match m
            .expect(
                &[
                    Pattern::Lit("on_requested_incompatible_qos"),
                    Pattern::Lit("on_requested"),
                ],
                Duration::from_secs(2),
            )
            .await
        {
            Expect::Matched { index, .. } => assert_eq!(index, 0),
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_when_nothing_matches() {
        let mut m = matcher_for("printf 'noise'; sleep 5").await;
        assert!(matches!(
            m.expect(&[Pattern::Lit("marker")], Duration::from_millis(200))
                .await,
            Expect::Timeout
        ));
        assert_eq!(m.log(), "noise");
    }

    #[tokio::test]
    async fn eof_when_stream_closes() {
        let mut m = matcher_for("printf 'short'").await;
        assert!(matches!(
            m.expect(&[Pattern::Lit("marker")], Duration::from_secs(2))
                .await,
            Expect::Eof
        ));
    }

    #[tokio::test]
    async fn regex_marker_matches_sample_line() {
        let mut m = matcher_for("printf 'Square     BLUE       010 020 [30]\\n'").await;
        match m
            .expect(&[Pattern::Re(sample_index_re())], Duration::from_secs(2))
            .await
        {
            Expect::Matched { index, text } => {
                assert_eq!(index, 0);
                let record = sample_record_re()
                    .find(&text)
                    .expect("record present")
                    .as_str();
                assert_eq!(record, "010 020 [30]");
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unconsumed_tail_stays_for_next_expect() {
        let mut m = matcher_for("printf 'Create topic: X\\nCreate reader for topic: X\\n'").await;
        assert!(matches!(
            m.expect(&[Pattern::Lit("Create topic:")], Duration::from_secs(2))
                .await,
            Expect::Matched { index: 0, .. }
        ));
        assert!(matches!(
            m.expect(
                &[Pattern::Lit("Create reader for topic:")],
                Duration::from_secs(2)
            )
            .await,
            Expect::Matched { index: 0, .. }
        ));
    }
}
