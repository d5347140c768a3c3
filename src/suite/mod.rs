//! Test suite layer: case definitions, check strategies and the driver

pub mod checks;
pub mod definition;
pub mod driver;

pub use checks::CheckStrategy;
pub use definition::{CaseTable, SuiteSet, TestCase};
pub use driver::{run, RunOptions};
