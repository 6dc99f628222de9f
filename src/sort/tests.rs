use super::*;
use std::cmp::Ordering;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use proptest::prelude::*;
use tempfile::TempDir;

use crate::common::io::InputSource;

fn to_lines(input: &[&str]) -> Vec<Result<Line, SortError>> {
    input.iter().map(|s| Ok(s.as_bytes().to_vec())).collect()
}

fn settings_in(dir: &Path, batch_size: usize, workers: usize) -> JobSettings {
    JobSettings {
        batch_size,
        workers,
        temp_dir: dir.to_path_buf(),
    }
}

fn output_lines(out: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(out)
        .lines()
        .map(|s| s.to_string())
        .collect()
}

fn leftover_runs(dir: &Path) -> usize {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(RUN_PREFIX))
            .count(),
        Err(_) => 0,
    }
}

/// Sort through the full job pipeline and return the output lines.
fn sort_with(input: &[&str], config: &SortConfig, batch_size: usize, workers: usize) -> Vec<String> {
    let dir = TempDir::new().unwrap();
    let mut out = Vec::new();
    let report = sort_lines(
        to_lines(input).into_iter(),
        config,
        &settings_in(dir.path(), batch_size, workers),
        &mut out,
    );
    assert!(report.result.is_ok(), "job failed: {:?}", report.result);
    assert!(report.cleanup_errors.is_empty());
    assert_eq!(leftover_runs(dir.path()), 0);
    output_lines(&out)
}

fn sort_default(input: &[&str], config: &SortConfig) -> Vec<String> {
    sort_with(input, config, 2, 2)
}

#[test]
fn test_basic_lexical_sort() {
    let config = SortConfig::default();
    let mut lines = vec![b"banana".to_vec(), b"apple".to_vec(), b"cherry".to_vec()];
    lines.sort_by(|a, b| compare_lines(a, b, &config));
    assert_eq!(lines[0], b"apple");
    assert_eq!(lines[1], b"banana");
    assert_eq!(lines[2], b"cherry");
}

#[test]
fn test_reverse_sort() {
    let config = SortConfig {
        reverse: true,
        ..SortConfig::default()
    };
    let mut lines = vec![b"banana".to_vec(), b"apple".to_vec(), b"cherry".to_vec()];
    lines.sort_by(|a, b| compare_lines(a, b, &config));
    assert_eq!(lines[0], b"cherry");
    assert_eq!(lines[1], b"banana");
    assert_eq!(lines[2], b"apple");
}

#[test]
fn test_numeric_sort() {
    let config = SortConfig {
        mode: OrderMode::Numeric,
        ..SortConfig::default()
    };
    assert_eq!(sort_default(&["10", "2", "1"], &config), ["1", "2", "10"]);
}

#[test]
fn test_numeric_ranks_numbers_first() {
    assert_eq!(compare_numeric(b"1", b"abc"), Ordering::Less);
    assert_eq!(compare_numeric(b"abc", b"def"), Ordering::Less);
    assert_eq!(compare_numeric(b"  10", b"2"), Ordering::Greater);
    assert_eq!(compare_numeric(b"5b", b"5a"), Ordering::Greater);

    let config = SortConfig {
        mode: OrderMode::Numeric,
        ..SortConfig::default()
    };
    assert_eq!(sort_default(&["abc", "1"], &config), ["1", "abc"]);
}

#[test]
fn test_reverse_numeric_sort() {
    let config = SortConfig {
        mode: OrderMode::Numeric,
        reverse: true,
        ..SortConfig::default()
    };
    assert_eq!(sort_default(&["1", "2", "3"], &config), ["3", "2", "1"]);
}

#[test]
fn test_human_numeric_sort() {
    assert_eq!(compare_human_numeric(b"1K", b"1M"), Ordering::Less);
    assert_eq!(compare_human_numeric(b"2G", b"1G"), Ordering::Greater);
    assert_eq!(compare_human_numeric(b"100", b"1K"), Ordering::Less);
    assert_eq!(compare_human_numeric(b"1024", b"1K"), Ordering::Less);
    assert_eq!(compare_human_numeric(b"1k", b"qwe"), Ordering::Less);

    let config = SortConfig {
        mode: OrderMode::HumanNumeric,
        ..SortConfig::default()
    };
    assert_eq!(sort_default(&["1K", "2K", "500"], &config), ["500", "1K", "2K"]);
}

#[test]
fn test_month_sort() {
    assert_eq!(compare_month(b"JAN", b"FEB"), Ordering::Less);
    assert_eq!(compare_month(b"DEC", b"JAN"), Ordering::Greater);
    assert_eq!(compare_month(b"XXX", b"JAN"), Ordering::Less);
    assert_eq!(parse_month(b"  mar"), 3);

    let config = SortConfig {
        mode: OrderMode::Month,
        ..SortConfig::default()
    };
    assert_eq!(sort_default(&["Dec", "Jan", "qwe"], &config), ["qwe", "Jan", "Dec"]);
}

#[test]
fn test_key_sort() {
    let config = SortConfig {
        key: Some(1),
        ..SortConfig::default()
    };
    assert_eq!(
        sort_default(&["b\tapple", "a\tbanana"], &config),
        ["b\tapple", "a\tbanana"]
    );
    assert_eq!(
        sort_default(&["a\tbanana", "b\tapple"], &config),
        ["b\tapple", "a\tbanana"]
    );
}

#[test]
fn test_key_numeric_sort() {
    let config = SortConfig {
        mode: OrderMode::Numeric,
        key: Some(0),
        ..SortConfig::default()
    };
    assert_eq!(
        sort_default(&["10 banana", "2 apple", "1 cherry"], &config),
        ["1 cherry", "2 apple", "10 banana"]
    );
}

#[test]
fn test_ignore_leading_blanks() {
    let config = SortConfig {
        ignore_leading_blanks: true,
        ..SortConfig::default()
    };
    assert_eq!(compare_lines(b"   b", b"a", &config), Ordering::Greater);
    let plain = SortConfig::default();
    assert_eq!(compare_lines(b"   b", b"a", &plain), Ordering::Less);
}

#[test]
fn test_unique_sort() {
    let config = SortConfig {
        unique: true,
        ..SortConfig::default()
    };
    assert_eq!(sort_default(&["a", "a", "b"], &config), ["a", "b"]);
    // Duplicates spread across runs are still collapsed.
    assert_eq!(
        sort_with(&["b", "a", "b", "a", "b"], &config, 1, 3),
        ["a", "b"]
    );
}

#[test]
fn test_key_blank_lines_go_first() {
    let config = SortConfig {
        key: Some(1),
        ..SortConfig::default()
    };
    let out = sort_with(&["b y", "", "a x", "", "c z"], &config, 2, 2);
    assert_eq!(out, ["", "", "a x", "b y", "c z"]);
}

#[test]
fn test_key_blank_lines_go_last_when_reversed() {
    let config = SortConfig {
        key: Some(1),
        reverse: true,
        ..SortConfig::default()
    };
    let out = sort_with(&["b y", "", "a x", "", "c z"], &config, 2, 2);
    assert_eq!(out, ["c z", "b y", "a x", "", ""]);
}

#[test]
fn test_key_missing_field_becomes_empty_line() {
    let config = SortConfig {
        key: Some(1),
        ..SortConfig::default()
    };
    let out = sort_with(&["k 2", "solo", "j 1", "   "], &config, 1, 2);
    assert_eq!(out, ["", "", "j 1", "k 2"]);
    assert_eq!(sort_with(&["x a", "solo", "   "], &config, 2, 2), ["", "", "x a"]);

    let reversed = SortConfig {
        reverse: true,
        ..config
    };
    let out = sort_with(&["k 2", "solo", "j 1", "   "], &reversed, 3, 2);
    assert_eq!(out, ["k 2", "j 1", "", ""]);
}

#[test]
fn test_unique_keeps_every_blank_key_line() {
    let config = SortConfig {
        key: Some(1),
        unique: true,
        ..SortConfig::default()
    };
    assert_eq!(sort_with(&["", "", "x a"], &config, 2, 2), ["", "", "x a"]);
    assert_eq!(
        sort_with(&["x a", "", "x a", "lone"], &config, 1, 2),
        ["", "", "x a"]
    );
}

#[test]
fn test_deferred_count_in_stats() {
    let dir = TempDir::new().unwrap();
    let config = SortConfig {
        key: Some(1),
        ..SortConfig::default()
    };
    let mut out = Vec::new();
    let report = sort_lines(
        to_lines(&["", "a b", "", "c"]).into_iter(),
        &config,
        &settings_in(dir.path(), 3, 1),
        &mut out,
    );
    match report.result {
        Ok(Outcome::Sorted(stats)) => {
            assert_eq!(stats.deferred, 3);
            assert_eq!(stats.emitted, 4);
            assert_eq!(stats.suppressed, 0);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_line_count_conservation() {
    let input = ["d", "a", "c", "a", "b", "e", "c"];
    let config = SortConfig::default();
    for batch_size in [1, 2, 100] {
        let out = sort_with(&input, &config, batch_size, 3);
        assert_eq!(out.len(), input.len(), "batch size {}", batch_size);
        assert_eq!(out, ["a", "a", "b", "c", "c", "d", "e"]);
    }
    let unique = SortConfig {
        unique: true,
        ..SortConfig::default()
    };
    for batch_size in [1, 2, 100] {
        let out = sort_with(&input, &unique, batch_size, 3);
        assert_eq!(out.len(), input.len() - 2, "batch size {}", batch_size);
    }
}

#[test]
fn test_idempotent_on_sorted_input() {
    let config = SortConfig {
        mode: OrderMode::Numeric,
        ..SortConfig::default()
    };
    let sorted = ["1", "2", "2", "10", "x"];
    assert_eq!(sort_with(&sorted, &config, 2, 2), sorted);
}

#[test]
fn test_stable_ties_follow_run_order() {
    let config = SortConfig {
        key: Some(0),
        stable: true,
        ..SortConfig::default()
    };
    // One worker writes the runs in input order.
    let out = sort_with(&["x 2", "x 1", "w 3"], &config, 1, 1);
    assert_eq!(out, ["w 3", "x 2", "x 1"]);
}

#[test]
fn test_empty_input() {
    let config = SortConfig::default();
    let dir = TempDir::new().unwrap();
    let mut out = Vec::new();
    let report = sort_lines(
        std::iter::empty::<Result<Line, SortError>>(),
        &config,
        &settings_in(dir.path(), 10, 2),
        &mut out,
    );
    assert_eq!(report.exit_code(), 0);
    assert!(out.is_empty());
}

#[test]
fn test_partition_creates_one_run_per_batch() {
    let dir = TempDir::new().unwrap();
    let ctx = JobContext::new(SortConfig::default(), settings_in(dir.path(), 2, 2));
    let stats = partition(to_lines(&["q", "w", "e", "r", "t"]).into_iter(), &ctx).unwrap();
    assert_eq!(stats, PartitionStats { lines: 5, batches: 3 });
    assert_eq!(ctx.run_count(), 3);
    assert_eq!(leftover_runs(dir.path()), 3);

    let runs = ctx.take_runs();
    let mut sizes: Vec<usize> = runs.iter().map(|r| r.len()).collect();
    sizes.sort();
    assert_eq!(sizes, [1, 2, 2]);
    for run in runs {
        run.remove().unwrap();
    }
    assert_eq!(leftover_runs(dir.path()), 0);
}

#[test]
fn test_run_file_is_sorted() {
    let dir = TempDir::new().unwrap();
    let batch = vec![b"b".to_vec(), b"a".to_vec(), b"c".to_vec()];
    let run = Run::create(batch, &SortConfig::default(), dir.path()).unwrap();
    let name = run.path().file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(RUN_PREFIX));
    assert_eq!(fs::read(run.path()).unwrap(), b"a\nb\nc\n");
    run.remove().unwrap();
}

#[test]
fn test_run_counts_blank_keys() {
    let dir = TempDir::new().unwrap();
    let config = SortConfig {
        key: Some(1),
        ..SortConfig::default()
    };
    let batch = vec![b"a y".to_vec(), b"".to_vec(), b"b x".to_vec(), b"c".to_vec()];
    let run = Run::create(batch.clone(), &config, dir.path()).unwrap();
    assert_eq!(run.len(), 4);
    assert_eq!(run.deferred(), 2);
    assert_eq!(fs::read(run.path()).unwrap(), b"
c
b x
a y
");

    let plain = Run::create(batch, &SortConfig::default(), dir.path()).unwrap();
    assert_eq!(plain.deferred(), 0);
}

#[test]
fn test_run_keeps_carriage_returns() {
    let dir = TempDir::new().unwrap();
    let run = Run::create(vec![b"a\r".to_vec()], &SortConfig::default(), dir.path()).unwrap();
    let mut reader = run.open().unwrap();
    assert_eq!(reader.next_line().unwrap(), Some(b"a\r".to_vec()));
    assert_eq!(reader.next_line().unwrap(), None);
}

#[test]
fn test_merge_runs_directly() {
    let dir = TempDir::new().unwrap();
    let config = SortConfig::default();
    let runs = vec![
        Run::create(vec![b"c".to_vec(), b"a".to_vec()], &config, dir.path()).unwrap(),
        Run::create(vec![b"d".to_vec(), b"b".to_vec()], &config, dir.path()).unwrap(),
        Run::create(Vec::new(), &config, dir.path()).unwrap(),
    ];
    let mut out = Vec::new();
    let stats = merge_runs(&runs, &config, &mut out).unwrap();
    assert_eq!(out, b"a\nb\nc\nd\n");
    assert_eq!(stats.emitted, 4);
}

#[test]
fn test_merge_missing_run_is_fatal_and_cleanup_reports() {
    let dir = TempDir::new().unwrap();
    let config = SortConfig::default();
    let run = Run::create(vec![b"a".to_vec()], &config, dir.path()).unwrap();
    fs::remove_file(run.path()).unwrap();

    let mut out = Vec::new();
    match merge_runs(std::slice::from_ref(&run), &config, &mut out) {
        Err(SortError::MergeIo { .. }) => {}
        other => panic!("expected merge error, got {:?}", other),
    }
    let err = run.remove().unwrap_err();
    assert!(err.to_string().contains("failed to remove temporary file"));
}

#[test]
fn test_worker_failure_aborts_without_output() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist");
    let mut out = Vec::new();
    let report = sort_lines(
        to_lines(&["b", "a", "c", "d"]).into_iter(),
        &SortConfig::default(),
        &settings_in(&missing, 1, 2),
        &mut out,
    );
    assert!(matches!(report.result, Err(SortError::Worker(_))));
    assert_eq!(report.exit_code(), EXIT_FAILURE);
    assert!(out.is_empty());
    assert!(report.cleanup_errors.is_empty());
}

#[test]
fn test_input_error_cleans_up_runs() {
    let dir = TempDir::new().unwrap();
    let mut input = to_lines(&["e", "d", "c", "b", "a"]);
    input.push(Err(SortError::input("in.txt", std::io::Error::other("boom"))));
    input.push(Ok(b"z".to_vec()));

    let mut out = Vec::new();
    let report = sort_lines(
        input.into_iter(),
        &SortConfig::default(),
        &settings_in(dir.path(), 1, 2),
        &mut out,
    );
    assert!(matches!(report.result, Err(SortError::Input { .. })));
    assert!(out.is_empty());
    assert_eq!(leftover_runs(dir.path()), 0);
}

#[test]
fn test_context_keeps_first_error() {
    let ctx = JobContext::new(SortConfig::default(), JobSettings::default());
    assert!(!ctx.is_failed());
    ctx.fail(SortError::Worker(std::io::Error::other("first")));
    ctx.fail(SortError::Worker(std::io::Error::other("second")));
    assert!(ctx.is_failed());
    let err = ctx.take_error().unwrap();
    assert!(err.to_string().contains("first"), "got: {}", err);
    assert!(ctx.take_error().is_none());
}

#[test]
fn test_check_mode() {
    let config = SortConfig::default();
    let source = InputSource::from_reader("-", Cursor::new(b"a\nc\nb\n".to_vec()));
    let report = check_source(source, &config);
    match &report.result {
        Ok(Outcome::Disorder(d)) => {
            assert_eq!(d.line_number, 3);
            assert_eq!(d.line, b"b");
            assert_eq!(d.to_string(), "-:3: disorder: b");
        }
        other => panic!("expected disorder, got {:?}", other),
    }
    assert_eq!(report.exit_code(), EXIT_DISORDER);

    let source = InputSource::from_reader("-", Cursor::new(b"a\nb\nc\n".to_vec()));
    let report = check_source(source, &config);
    assert!(matches!(report.result, Ok(Outcome::InOrder)));
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn test_check_mode_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.txt");
    fs::write(&input, "a\nc\nb\n").unwrap();
    let inputs = vec![input.to_string_lossy().into_owned()];

    let mut out = Vec::new();
    let report = sort_and_output(
        &inputs,
        &SortConfig::default(),
        &settings_in(dir.path(), 1, 2),
        true,
        &mut out,
    );
    assert!(matches!(report.result, Ok(Outcome::Disorder(_))));
    assert!(out.is_empty());
    assert_eq!(leftover_runs(dir.path()), 0);
}

#[test]
fn test_check_mode_rejects_extra_operand() {
    let inputs = vec!["a".to_string(), "b".to_string()];
    let mut out = Vec::new();
    let report = sort_and_output(
        &inputs,
        &SortConfig::default(),
        &JobSettings::default(),
        true,
        &mut out,
    );
    assert!(matches!(report.result, Err(SortError::Config(_))));
}

#[test]
fn test_sort_and_output_multiple_files() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("one.txt");
    let second = dir.path().join("two.txt");
    fs::write(&first, "pear\napple\n").unwrap();
    fs::write(&second, "fig\r\nbanana").unwrap();
    let inputs = vec![
        first.to_string_lossy().into_owned(),
        second.to_string_lossy().into_owned(),
    ];

    let mut out = Vec::new();
    let report = sort_and_output(
        &inputs,
        &SortConfig::default(),
        &settings_in(dir.path(), 2, 2),
        false,
        &mut out,
    );
    assert_eq!(report.exit_code(), 0);
    assert_eq!(out, b"apple\nbanana\nfig\npear\n");
    assert_eq!(leftover_runs(dir.path()), 0);
}

#[test]
fn test_missing_input_fails_before_runs() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.txt");
    fs::write(&good, "b\na\n").unwrap();
    let inputs = vec![
        good.to_string_lossy().into_owned(),
        dir.path().join("missing.txt").to_string_lossy().into_owned(),
    ];
    let mut out = Vec::new();
    let report = sort_and_output(
        &inputs,
        &SortConfig::default(),
        &settings_in(dir.path(), 1, 1),
        false,
        &mut out,
    );
    match &report.result {
        Err(e @ SortError::Input { kind, .. }) => {
            assert_eq!(*kind, InputErrorKind::NotFound);
            assert!(e.to_string().starts_with("cannot read: "));
            assert!(e.to_string().ends_with("No such file or directory"));
        }
        other => panic!("expected input error, got {:?}", other),
    }
    assert!(out.is_empty());
    assert_eq!(leftover_runs(dir.path()), 0);
}

fn config_strategy() -> impl Strategy<Value = SortConfig> {
    (
        prop_oneof![
            Just(OrderMode::Lexical),
            Just(OrderMode::Numeric),
            Just(OrderMode::HumanNumeric),
            Just(OrderMode::Month),
        ],
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        prop::option::of(0usize..3),
    )
        .prop_map(|(mode, reverse, unique, blanks, key)| SortConfig {
            mode,
            reverse,
            unique,
            ignore_leading_blanks: blanks,
            key,
            stable: false,
        })
}

fn input_strategy() -> impl Strategy<Value = (Vec<String>, Vec<String>)> {
    prop::collection::vec("[ a-cJjM1-3K\t]{0,7}", 0..40)
        .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_output_independent_of_arrival_and_batching(
        (input, shuffled) in input_strategy(),
        config in config_strategy(),
        batch_size in 1usize..6,
        workers in 1usize..4,
    ) {
        let input: Vec<&str> = input.iter().map(|s| s.as_str()).collect();
        let shuffled: Vec<&str> = shuffled.iter().map(|s| s.as_str()).collect();

        let reference = sort_with(&input, &config, input.len() + 1, 1);
        let out = sort_with(&shuffled, &config, batch_size, workers);
        prop_assert_eq!(&out, &reference);

        // Sorting sorted output changes nothing.
        let again: Vec<&str> = out.iter().map(|s| s.as_str()).collect();
        prop_assert_eq!(sort_with(&again, &config, batch_size, workers), out.clone());

        if !config.unique {
            prop_assert_eq!(out.len(), input.len());
        }
    }

    #[test]
    fn prop_merged_output_is_ordered(
        (input, _) in input_strategy(),
        batch_size in 1usize..5,
    ) {
        let config = SortConfig { mode: OrderMode::Numeric, ..SortConfig::default() };
        let input: Vec<&str> = input.iter().map(|s| s.as_str()).collect();
        let out = sort_with(&input, &config, batch_size, 2);
        for pair in out.windows(2) {
            prop_assert_ne!(
                compare_lines(pair[1].as_bytes(), pair[0].as_bytes(), &config),
                Ordering::Less
            );
        }
    }
}
