//! Interoperability test harness for DDS-RTPS shape applications
//!
//! Drives pairs (or groups) of pre-built vendor publisher and subscriber
//! executables, classifies each entity's behavior from its diagnostic
//! output and emits a JUnit-XML pass/fail report.

pub mod common;
pub mod harness;
pub mod report;
pub mod suite;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use harness::ReturnCode;
