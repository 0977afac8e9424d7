//! Tests for `src/logging.rs`.

use segcast::logging::{LoggingGuard, CLI_FILTER, LOG_FILE_PREFIX, SEND_FILTER};
use tracing_subscriber::EnvFilter;

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn default_filters_parse() {
    for directives in [SEND_FILTER, CLI_FILTER] {
        if let Err(err) = EnvFilter::try_new(directives) {
            panic!("{directives:?} should parse: {err}");
        }
    }
}

#[test]
fn init_production_opens_the_campaign_log() {
    let tmp = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => panic!("temp dir should be created: {err}"),
    };
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    // Only one global subscriber per process, so this may report an error;
    // the directory and the dated log file are created either way.
    let _result = segcast::logging::init_production(&logs_dir);
    let entries = match std::fs::read_dir(&logs_dir) {
        Ok(entries) => entries,
        Err(err) => panic!("logs directory should exist: {err}"),
    };
    let names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        names.iter().any(|n| n.starts_with(LOG_FILE_PREFIX)),
        "no campaign log in {names:?}"
    );
}

#[test]
fn init_cli_is_idempotent() {
    segcast::logging::init_cli();
    segcast::logging::init_cli();
}
