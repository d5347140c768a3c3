//! Interoperability runner CLI
//!
//! Validates interoperability of products compliant with the OMG DDS-RTPS
//! standard by running test cases between two shape_main executables and
//! generating a JUnit XML report.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use interop::common::logging;
use interop::harness::case::CaseConfig;
use interop::suite::{self, RunOptions};

#[derive(Parser)]
#[command(
    name = "interop-runner",
    about = "Interoperability testing between DDS-RTPS shape applications",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the publisher shape_main application
    #[arg(short = 'P', long = "publisher", value_name = "EXECUTABLE")]
    publisher: PathBuf,

    /// Path to the subscriber shape_main application
    #[arg(short = 'S', long = "subscriber", value_name = "EXECUTABLE")]
    subscriber: PathBuf,

    /// Print debug information, including shape application output steps
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Data representation appended to entity specs that do not set one
    /// (1: XCDR1, 2: XCDR2)
    #[arg(short = 'x', long = "data-representation", default_value = "2",
          value_parser = ["1", "2"])]
    data_representation: String,

    /// Builtin test suite name or path to a YAML suite file
    #[arg(short = 's', long = "suite", default_value = "interoperability_test_suite")]
    suite: String,

    /// Run only these test cases
    #[arg(short = 't', long = "test", num_args = 1.., conflicts_with = "disable_test")]
    test: Option<Vec<String>>,

    /// Skip these test cases
    #[arg(short = 'd', long = "disable-test", num_args = 1..)]
    disable_test: Option<Vec<String>>,

    /// Name of the generated XML report. Results are added to an existing
    /// file at the same path. Default: <publisher>-<subscriber>-<stamp>.xml
    #[arg(short = 'o', long = "output-name", value_name = "FILENAME")]
    output_name: Option<PathBuf>,

    /// Per-step pattern timeout in seconds
    #[arg(long = "timeout", default_value_t = 10)]
    timeout: u64,

    /// Wall-clock cap per test case in seconds; 0 disables the cap
    #[arg(long = "max-case-seconds", default_value_t = 300)]
    max_case_seconds: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let options = RunOptions {
        publisher: cli.publisher,
        subscriber: cli.subscriber,
        suite: cli.suite,
        tests: cli.test,
        disabled: cli.disable_test,
        data_representation: cli.data_representation,
        output: cli.output_name,
        case_config: CaseConfig {
            timeout: Duration::from_secs(cli.timeout),
            settle: Duration::from_secs(1),
            max_case: match cli.max_case_seconds {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        },
    };

    match suite::run(&options).await {
        Ok(run) => {
            println!(
                "{} test case(s): {} passed, {} failed",
                run.outcomes.len(),
                run.passed_count(),
                run.failed_count()
            );
            if run.failed_count() > 0 {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
}
