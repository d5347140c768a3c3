//! Mock shape application for integration testing
//!
//! Emits a scripted sequence of protocol-milestone markers so harness
//! behavior can be tested without real DDS executables. The script comes
//! from a `--script` argument; every other argument (role markers, QoS
//! flags, the appended data representation) is accepted and ignored, like
//! a real shape application would parse them.
//!
//! Directives, comma separated:
//!   topic                  "Create topic:" marker
//!   reader                 "Create reader for topic:" marker
//!   writer                 "Create writer for topic" marker
//!   filter_fail            content-filter creation failure marker
//!   pub_match              "on_publication_matched()"
//!   offered_incompatible   "on_offered_incompatible_qos"
//!   offered_deadline       "on_offered_deadline_missed()"
//!   requested_incompatible "on_requested_incompatible_qos()"
//!   requested_deadline     "on_requested_deadline_missed()"
//!   samples:N[:COLOR[:OFF]] N sample lines, deterministic coordinates
//!                          starting at OFF (default 10)
//!   ansi                   a line wrapped in ANSI color escapes
//!   sleep:MS               pause the script
//!   exit                   close the stream and terminate
//!
//! After the script runs out the process idles until interrupted, like a
//! real shape application does.

use std::io::Write;
use std::time::Duration;

fn emit(line: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{line}");
    let _ = stdout.flush();
}

fn emit_samples(count: usize, color: &str, offset: usize) {
    for i in 0..count {
        emit(&format!(
            "{:<10} {:<10} {:03} {:03} [{}]",
            "Square",
            color,
            offset + i,
            offset + 10 + i,
            30
        ));
    }
}

fn run_directive(directive: &str) -> bool {
    let mut parts = directive.split(':');
    let name = parts.next().unwrap_or("");
    match name {
        "topic" => emit("Create topic: Square"),
        "reader" => emit("Create reader for topic: Square"),
        "writer" => emit("Create writer for topic: Square color: BLUE"),
        "filter_fail" => emit("failed to create content filtered topic"),
        "pub_match" => emit("on_publication_matched() topic: 'Square'  type: 'ShapeType'"),
        "offered_incompatible" => {
            emit("on_offered_incompatible_qos() topic: 'Square'  type: 'ShapeType' : RELIABILITY")
        }
        "offered_deadline" => {
            emit("on_offered_deadline_missed() topic: 'Square'  type: 'ShapeType'")
        }
        "requested_incompatible" => {
            emit("on_requested_incompatible_qos() topic: 'Square'  type: 'ShapeType' : RELIABILITY")
        }
        "requested_deadline" => {
            emit("on_requested_deadline_missed() topic: 'Square'  type: 'ShapeType'")
        }
        "samples" => {
            let count = parts.next().and_then(|n| n.parse().ok()).unwrap_or(1);
            let color = parts.next().unwrap_or("BLUE");
            let offset = parts.next().and_then(|n| n.parse().ok()).unwrap_or(10);
            emit_samples(count, color, offset);
        }
        "ansi" => emit("\u{1b}[31mdiagnostic noise\u{1b}[0m"),
        "sleep" => {
            let ms = parts.next().and_then(|n| n.parse().ok()).unwrap_or(100);
            std::thread::sleep(Duration::from_millis(ms));
        }
        "exit" => return false,
        _ => emit(&format!("unknown directive: {directive}")),
    }
    true
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let script = args
        .iter()
        .position(|a| a == "--script")
        .and_then(|at| args.get(at + 1))
        .cloned()
        .unwrap_or_default();

    for directive in script.split(',').filter(|d| !d.is_empty()) {
        if !run_directive(directive) {
            return;
        }
    }

    // Idle until the harness interrupts us.
    loop {
        std::thread::sleep(Duration::from_millis(100));
    }
}
