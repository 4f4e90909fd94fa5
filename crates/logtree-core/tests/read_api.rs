//! Backlog reads through the public API
//!
//! Covers subtree and exact reads, filters, verbosity gating and quotas as a
//! producer and an operator would use them.

use logtree_core::{
    Backlog, LogEntry, LogTree, LogTreeConfig, LogTreeError, ReadOption, Severity,
};
use std::io::Write;
use std::sync::Arc;

fn backlog(tree: &LogTree, dn: &str, options: &[ReadOption]) -> Vec<Arc<LogEntry>> {
    let mut opts = vec![ReadOption::WithBacklog(Backlog::All)];
    opts.extend_from_slice(options);
    tree.read(dn, &opts).unwrap().backlog.clone()
}

fn messages(entries: &[Arc<LogEntry>]) -> Vec<String> {
    entries.iter().map(|e| e.message()).collect()
}

// ============================================================================
// Subtree Reads
// ============================================================================

#[test]
fn test_subtree_and_root_reads() {
    let tree = LogTree::new();
    tree.leveled_for("main").unwrap().info("hello, main!");
    tree.leveled_for("main.foo").unwrap().info("hello, main.foo!");
    tree.leveled_for("aux").unwrap().info("hello, aux!");

    assert_eq!(
        messages(&backlog(&tree, "main", &[ReadOption::WithChildren])),
        vec!["hello, main!", "hello, main.foo!"]
    );
    assert_eq!(
        messages(&backlog(&tree, "", &[ReadOption::WithChildren])),
        vec!["hello, main!", "hello, main.foo!", "hello, aux!"]
    );
    assert_eq!(messages(&backlog(&tree, "main", &[])), vec!["hello, main!"]);
    assert!(backlog(&tree, "", &[]).is_empty());
}

#[test]
fn test_prefix_is_not_a_parent() {
    let tree = LogTree::new();
    tree.leveled_for("svc").unwrap().info("svc");
    tree.leveled_for("svcs").unwrap().info("svcs");
    assert_eq!(
        messages(&backlog(&tree, "svc", &[ReadOption::WithChildren])),
        vec!["svc"]
    );
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_local_order_unaffected_by_other_dns() {
    let tree = LogTree::new();
    let a = tree.leveled_for("a").unwrap();
    let b = tree.leveled_for("b").unwrap();
    for i in 0..50 {
        a.info(i);
        if i % 3 == 0 {
            b.info(i);
        }
    }
    let got: Vec<String> = messages(&backlog(&tree, "a", &[]));
    let want: Vec<String> = (0..50).map(|i| i.to_string()).collect();
    assert_eq!(got, want);
}

#[test]
fn test_multiline_split_and_trim() {
    let tree = LogTree::new();
    let logger = tree.leveled_for("ml").unwrap();
    logger.info("foo\nbar");
    logger.info("one\ntwo\n");

    let entries = backlog(&tree, "ml", &[]);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].leveled().unwrap().messages(), ["foo", "bar"]);
    assert_eq!(entries[1].leveled().unwrap().messages(), ["one", "two"]);
}

// ============================================================================
// Filters
// ============================================================================

#[test]
fn test_minimum_severity() {
    let tree = LogTree::new();
    let logger = tree.leveled_for("sev").unwrap();
    logger.error("error");
    logger.warning("warning");
    logger.info("info");
    logger.v(0).info("verbose");

    let entries = backlog(
        &tree,
        "sev",
        &[ReadOption::LeveledWithMinimumSeverity(Severity::Warning)],
    );
    assert_eq!(messages(&entries), vec!["error", "warning"]);
}

#[test]
fn test_only_raw_and_only_leveled() {
    let tree = LogTree::new();
    tree.leveled_for("mix").unwrap().info("leveled");
    tree.raw_for("mix").unwrap().write_all(b"raw\n").unwrap();

    assert_eq!(
        messages(&backlog(&tree, "mix", &[ReadOption::OnlyRaw])),
        vec!["raw"]
    );
    assert_eq!(
        messages(&backlog(&tree, "mix", &[ReadOption::OnlyLeveled])),
        vec!["leveled"]
    );
    // Severity filtering lets raw entries through.
    assert_eq!(
        messages(&backlog(
            &tree,
            "mix",
            &[ReadOption::LeveledWithMinimumSeverity(Severity::Fatal)]
        )),
        vec!["raw"]
    );
}

#[test]
fn test_incompatible_filters() {
    let tree = LogTree::new();
    let err = tree
        .read(
            "x",
            &[ReadOption::OnlyRaw, ReadOption::OnlyLeveled, ReadOption::WithStream],
        )
        .unwrap_err();
    assert!(matches!(err, LogTreeError::IncompatibleFilters));
    assert_eq!(tree.stats().subscribers, 0);
}

// ============================================================================
// Verbosity
// ============================================================================

#[test]
fn test_verbosity_gating() {
    let tree = LogTree::new();
    let logger = tree.leveled_for("v").unwrap();
    logger.v(10).info("not yet");
    assert!(backlog(&tree, "v", &[]).is_empty());

    tree.set_verbosity("v", 10).unwrap();
    logger.v(10).info("now");
    assert_eq!(messages(&backlog(&tree, "v", &[])), vec!["now"]);

    // Not inherited by children.
    let child = tree.leveled_for("v.child").unwrap();
    child.v(10).info("child");
    assert!(backlog(&tree, "v.child", &[]).is_empty());
}

// ============================================================================
// Quotas
// ============================================================================

#[test]
fn test_default_quota_from_config() {
    let tree = LogTree::with_config(LogTreeConfig::new().with_default_quota(3));
    let logger = tree.leveled_for("q").unwrap();
    for i in 0..10 {
        logger.info(i);
    }
    assert_eq!(messages(&backlog(&tree, "q", &[])), vec!["7", "8", "9"]);
    assert_eq!(tree.stats().entries, 3);
}

#[test]
fn test_chatty_logger_does_not_evict_quiet_one() {
    let tree = LogTree::with_config(LogTreeConfig::new().with_default_quota(100));
    tree.leveled_for("quiet").unwrap().info("important");
    let chatty = tree.leveled_for("chatty").unwrap();
    for i in 0..1000 {
        chatty.info(i);
    }
    let all = backlog(&tree, "", &[ReadOption::WithChildren]);
    assert_eq!(all.len(), 101);
    assert_eq!(all[0].message(), "important");
    assert_eq!(all[1].message(), "900");
}

#[test]
fn test_set_quota_per_dn() {
    let tree = LogTree::new();
    tree.set_quota("small", 2).unwrap();
    let small = tree.leveled_for("small").unwrap();
    let big = tree.leveled_for("small.child").unwrap();
    for i in 0..5 {
        small.info(i);
        big.info(i);
    }
    assert_eq!(messages(&backlog(&tree, "small", &[])), vec!["3", "4"]);
    assert_eq!(backlog(&tree, "small.child", &[]).len(), 5);
    assert!(matches!(
        tree.set_quota("small", 0),
        Err(LogTreeError::InvalidQuota(0))
    ));
    assert!(matches!(
        tree.set_quota("bad..dn", 1),
        Err(LogTreeError::InvalidDn(_))
    ));
}

// ============================================================================
// Raw Publishing
// ============================================================================

#[test]
fn test_raw_truncation_rendering() {
    let tree = LogTree::with_config(LogTreeConfig::new().with_raw_line_length(8));
    let mut raw = tree.raw_for("proc").unwrap();
    raw.write_all(b"0123456789abcdef\nshort\n").unwrap();

    let entries = backlog(&tree, "proc", &[]);
    let first = entries[0].raw().unwrap();
    assert_eq!(first.data, "01234567");
    assert_eq!(first.original_length, 16);
    assert_eq!(first.to_string(), "01234567...");
    assert_eq!(entries[1].raw().unwrap().to_string(), "short");
}
