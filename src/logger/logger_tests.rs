//! Unit tests for AccessLogger.

use super::*;
use crate::event_stream::TryRecvError;
use crate::test_utils::{CollectingSink, FailingSink};
use crate::test_utils::capture_logs;
use rstest::{fixture, rstest};
use serial_test::serial;
use std::time::UNIX_EPOCH;

struct Harness {
    logger: AccessLogger,
    sink: CollectingSink,
}

fn harness_with(toggles: Toggles, blacklist: Option<&str>) -> Harness {
    let sink = CollectingSink::new();
    let logger = AccessLogger::new(
        AccessLineFormatter::default(),
        toggles,
        Blacklist::from_pattern(blacklist),
        vec![Arc::new(sink.clone())],
        NonZeroUsize::new(8).expect("non-zero"),
    );
    Harness { logger, sink }
}

#[fixture]
fn harness() -> Harness {
    harness_with(Toggles::default().with_console_enabled(true), None)
}

fn get(url: &str) -> RequestFact {
    RequestFact::new("GET", url)
        .with_host("x")
        .with_remote_address("10.0.0.1")
        .with_timestamp(UNIX_EPOCH)
}

fn ok() -> ResponseFact {
    ResponseFact::new(200, 10)
}

fn line_for(url: &str, elapsed_ms: u64) -> String {
    AccessLineFormatter::default()
        .format(
            &get(url),
            Some(&ok()),
            Duration::from_millis(elapsed_ms),
            FormatOptions::default(),
        )
        .text
}

#[rstest]
fn duplicates_collapse_into_summary(harness: Harness) {
    let Harness { logger, sink } = harness;
    let outcomes: Vec<_> = [("/a", 1), ("/a", 2), ("/a", 3), ("/b", 4)]
        .into_iter()
        .map(|(url, ms)| logger.log(&get(url), Some(&ok()), Duration::from_millis(ms)))
        .collect();

    assert_eq!(
        outcomes,
        vec![
            LogOutcome::Emitted(1),
            LogOutcome::Collapsed,
            LogOutcome::Collapsed,
            LogOutcome::Emitted(3),
        ]
    );
    assert_eq!(
        sink.collected(),
        vec![
            line_for("/a", 1),
            line_for("/a", 3),
            " + 2 duplicates".to_owned(),
            line_for("/b", 4),
        ]
    );
}

#[rstest]
fn suppressed_lines_leave_duplicate_count_alone() {
    let Harness { logger, sink } = harness_with(Toggles::default(), Some("/secret"));
    logger.log(&get("/a"), Some(&ok()), Duration::ZERO);
    logger.log(&get("/a"), Some(&ok()), Duration::ZERO);
    assert_eq!(
        logger.log(&get("/secret"), Some(&ok()), Duration::ZERO),
        LogOutcome::Suppressed
    );
    logger.log(&get("/a"), Some(&ok()), Duration::ZERO);
    assert_eq!(logger.pending_duplicates(), 2);
    assert!(sink.collected().iter().all(|l| !l.contains("/secret")));
}

#[rstest]
fn disabled_logger_does_nothing(harness: Harness) {
    let Harness { logger, sink } = harness;
    logger.set_enabled(false);
    assert_eq!(
        logger.log(&get("/a"), Some(&ok()), Duration::ZERO),
        LogOutcome::Disabled
    );
    assert!(sink.is_empty());
}

#[rstest]
fn console_receives_lines_only_while_enabled(harness: Harness) {
    let Harness { logger, sink } = harness;
    let mut sub = logger.subscribe();
    logger.log(&get("/a"), Some(&ok()), Duration::ZERO);
    logger.set_console_enabled(false);
    logger.log(&get("/b"), Some(&ok()), Duration::ZERO);

    assert_eq!(sub.try_recv().map(|e| e.item), Ok(line_for("/a", 0)));
    assert_eq!(sub.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(sink.len(), 2);
}

#[rstest]
fn toggles_round_trip_and_drive_formatting(harness: Harness) {
    let Harness { logger, sink } = harness;
    let toggles = Toggles::default().with_log_request_headers(true);
    logger.apply_toggles(toggles);
    assert_eq!(logger.toggles(), toggles);

    logger.log(&get("/a").with_header("Accept", "*/*"), None, Duration::ZERO);
    let lines = sink.collected();
    assert!(lines[0].ends_with("[\"Accept: */*\"]"), "{}", lines[0]);
}

#[rstest]
fn set_blacklist_replaces_pattern(harness: Harness) {
    let Harness { logger, sink } = harness;
    logger.set_blacklist(Some("/health"));
    assert_eq!(
        logger.log(&get("/health"), None, Duration::ZERO),
        LogOutcome::Suppressed
    );
    logger.set_blacklist(None);
    assert_eq!(
        logger.log(&get("/health"), None, Duration::ZERO),
        LogOutcome::Emitted(1)
    );
    assert_eq!(sink.len(), 1);
}

#[rstest]
fn extra_filters_apply_after_blacklist(harness: Harness) {
    struct NoPosts;
    impl LineFilter for NoPosts {
        fn should_log(&self, line: &str) -> bool {
            !line.contains(" POST ")
        }
    }

    let Harness { logger, sink } = harness;
    let filter: Arc<dyn LineFilter> = Arc::new(NoPosts);
    logger.add_filter(Arc::clone(&filter));
    let post = RequestFact::new("POST", "/p").with_timestamp(UNIX_EPOCH);
    assert_eq!(logger.log(&post, None, Duration::ZERO), LogOutcome::Suppressed);
    assert!(logger.remove_filter(&filter));
    assert!(!logger.remove_filter(&filter));
    assert_eq!(logger.log(&post, None, Duration::ZERO), LogOutcome::Emitted(1));
    assert_eq!(sink.len(), 1);
}

#[rstest]
#[serial]
fn failing_sink_does_not_block_other_outputs(harness: Harness) {
    let mut log = capture_logs();
    let Harness { logger, sink } = harness;
    let failing = FailingSink::new();
    logger.add_sink(Arc::new(failing.clone()));
    let mut sub = logger.subscribe();

    assert_eq!(
        logger.log(&get("/a"), Some(&ok()), Duration::ZERO),
        LogOutcome::Emitted(1)
    );
    assert_eq!(failing.attempts(), 1);
    assert_eq!(sink.len(), 1);
    assert!(sub.try_recv().is_ok());

    let mut warned = false;
    while let Some(record) = log.pop() {
        if record.level() == log::Level::Warn && record.args().contains("sink writes failed") {
            warned = true;
        }
    }
    assert!(warned, "sink failure should be reported");
}

/// Sink whose queue is always full.
struct SaturatedSink;

impl LineSink for SaturatedSink {
    fn write_line(&self, _line: &str) -> Result<(), SinkError> {
        Err(SinkError::QueueFull)
    }
}

#[rstest]
#[serial]
fn full_sink_queue_is_left_to_the_sink_to_report(harness: Harness) {
    let mut log = capture_logs();
    let Harness { logger, sink } = harness;
    logger.add_sink(Arc::new(SaturatedSink));
    let mut sub = logger.subscribe();

    for url in ["/a", "/b"] {
        assert_eq!(
            logger.log(&get(url), Some(&ok()), Duration::ZERO),
            LogOutcome::Emitted(1)
        );
    }
    assert_eq!(sink.len(), 2);
    assert!(sub.try_recv().is_ok());
    assert_eq!(logger.sink_failures.pending(), 0);

    logger.shutdown();
    while let Some(record) = log.pop() {
        assert!(
            !record.args().contains("sink writes failed"),
            "queue overflow reported by the logger: {}",
            record.args()
        );
    }
}

#[rstest]
fn shutdown_flushes_pending_summary_and_closes_console(harness: Harness) {
    let Harness { logger, sink } = harness;
    let mut sub = logger.subscribe();
    logger.log(&get("/a"), Some(&ok()), Duration::ZERO);
    logger.log(&get("/a"), Some(&ok()), Duration::from_millis(5));
    logger.shutdown();

    assert_eq!(
        sink.collected(),
        vec![
            line_for("/a", 0),
            line_for("/a", 5),
            " + 1 duplicates".to_owned(),
        ]
    );
    let drained: Vec<_> = sub.by_ref().map(|e| e.item).collect();
    assert_eq!(drained.len(), 3);
    assert!(logger.is_shut_down());
    assert_eq!(
        logger.log(&get("/a"), Some(&ok()), Duration::ZERO),
        LogOutcome::ShutDown
    );

    logger.shutdown();
    assert_eq!(sink.len(), 3);
}

#[rstest]
fn drop_flushes_pending_summary() {
    let Harness { logger, sink } = harness_with(Toggles::default(), None);
    logger.log(&get("/a"), None, Duration::ZERO);
    logger.log(&get("/a"), None, Duration::ZERO);
    drop(logger);
    assert_eq!(sink.collected().last().map(String::as_str), Some(" + 1 duplicates"));
}

#[rstest]
fn log_completed_measures_from_request_start(harness: Harness) {
    let Harness { logger, sink } = harness;
    let req = get("/slow").with_timestamp(SystemTime::now() - Duration::from_secs(2));
    logger.log_completed(&req, None);
    let line = &sink.collected()[0];
    let elapsed: u128 = line
        .rsplit(' ')
        .next()
        .and_then(|ms| ms.parse().ok())
        .expect("elapsed millis at end of line");
    assert!(elapsed >= 2_000, "{line}");
}
