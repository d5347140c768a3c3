//! Additive report merging
//!
//! A rerun against the same output path must keep earlier results. The
//! merged document is reassembled from the `<testsuite>` blocks of both
//! documents with recomputed totals. Only documents this tool wrote are
//! understood; an existing file without recognizable blocks is replaced.

use std::sync::OnceLock;

use regex::Regex;

fn suite_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<testsuite\b[^>]*/>|<testsuite\b.*?</testsuite>")
            .expect("hardcoded regex")
    })
}

fn count_attr(block: &str, attr: &str) -> u64 {
    let open_end = block.find('>').unwrap_or(block.len());
    let open_tag = &block[..open_end];
    open_tag
        .find(&format!("{attr}=\""))
        .and_then(|at| {
            let rest = &open_tag[at + attr.len() + 2..];
            let end = rest.find('"')?;
            rest[..end].parse().ok()
        })
        .unwrap_or(0)
}

/// Merge the testsuite blocks of `existing` and `new` into one document.
pub fn merge_documents(existing: &str, new: &str) -> String {
    let old_blocks: Vec<&str> = suite_block_re()
        .find_iter(existing)
        .map(|m| m.as_str())
        .collect();
    if old_blocks.is_empty() {
        return new.to_string();
    }
    let new_blocks: Vec<&str> = suite_block_re().find_iter(new).map(|m| m.as_str()).collect();

    let all: Vec<&str> = old_blocks.into_iter().chain(new_blocks).collect();
    let tests: u64 = all.iter().map(|b| count_attr(b, "tests")).sum();
    let failures: u64 = all.iter().map(|b| count_attr(b, "failures")).sum();
    let errors: u64 = all.iter().map(|b| count_attr(b, "errors")).sum();

    let mut doc = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    doc.push_str(&format!(
        "<testsuites name=\"interoperability\" tests=\"{tests}\" failures=\"{failures}\" errors=\"{errors}\">\n"
    ));
    for block in all {
        doc.push_str(block);
        doc.push('\n');
    }
    doc.push_str("</testsuites>\n");
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC_A: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites name="interoperability" tests="2" failures="1" errors="0">
    <testsuite name="a---b" tests="2" disabled="0" errors="0" failures="1">
        <testcase name="case_1"/>
        <testcase name="case_2"><failure/></testcase>
    </testsuite>
</testsuites>
"#;

    const DOC_B: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites name="interoperability" tests="1" failures="0" errors="0">
    <testsuite name="c---d" tests="1" disabled="0" errors="0" failures="0">
        <testcase name="case_3"/>
    </testsuite>
</testsuites>
"#;

    #[test]
    fn merge_keeps_both_suites_and_sums_totals() {
        let merged = merge_documents(DOC_A, DOC_B);
        assert!(merged.contains("a---b"));
        assert!(merged.contains("c---d"));
        assert!(merged.contains("tests=\"3\""));
        assert!(merged.contains("failures=\"1\""));
        assert!(merged.contains("case_1"));
        assert!(merged.contains("case_3"));
    }

    #[test]
    fn unrecognized_existing_is_replaced() {
        let merged = merge_documents("not xml at all", DOC_B);
        assert_eq!(merged, DOC_B);
    }

    #[test]
    fn count_attr_reads_opening_tag_only() {
        assert_eq!(count_attr(r#"<testsuite tests="7">x</testsuite>"#, "tests"), 7);
        assert_eq!(count_attr(r#"<testsuite>x</testsuite>"#, "tests"), 0);
    }
}
