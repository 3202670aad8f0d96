use std::fs;

use reqdebug_common::{DebugConfig, OutputFormat};
use reqdebug_engine::{
    BufferedResponse, DumpValue, FileLogSink, HookCallback, InlineAssets, MemoryLogSink,
    NoAssets, OutputSession, RawFrame, RequestInfo, SessionFactory, SessionState,
    StaticCallStack, TraceFormatter, DEBUG_CSS,
};
use tracing::info;

fn quiet(config: DebugConfig) -> DebugConfig {
    DebugConfig { show_trace: false, show_request: false, show_stats: false, ..config }
}

fn enabled() -> DebugConfig {
    quiet(DebugConfig { enabled: true, ..Default::default() })
}

fn session(config: DebugConfig) -> OutputSession {
    OutputSession::builder(config, RequestInfo::new())
        .log_sink(MemoryLogSink::new())
        .assets(NoAssets)
        .without_notifier()
        .build()
}

#[test]
fn test_flush_is_idempotent() {
    reqdebug_common::logging::ensure_test_logging(None);
    info!("Flushing twice");

    let mut session = session(enabled());
    assert_eq!(session.state(), SessionState::Idle);

    session.dump(&[DumpValue::from("checkout"), DumpValue::map([("total", 99)])]);
    assert_eq!(session.state(), SessionState::Accumulating);

    let first = session.flush();
    assert_eq!(first.matches("wp-debug-dump").count(), 1);
    assert!(first.contains("[ total ]"));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.flush().is_empty());
}

#[test]
fn test_blocks_are_joined_in_order() {
    reqdebug_common::logging::ensure_test_logging(None);

    let mut session = session(DebugConfig { format: OutputFormat::Text, ..enabled() });
    session.dump(&["first".into()]);
    session.dump(&["second".into()]);

    let out = session.flush();
    let first = out.find("first").unwrap();
    let second = out.find("second").unwrap();
    assert!(first < second);
    assert!(out.contains("\n\n"));
    assert!(!out.contains('<'));
}

#[test]
fn test_assets_are_injected_once() {
    reqdebug_common::logging::ensure_test_logging(None);

    let mut session = OutputSession::builder(enabled(), RequestInfo::new())
        .assets(InlineAssets)
        .without_notifier()
        .build();
    session.dump(&[1.into()]);
    session.dump(&[2.into()]);

    let out = session.flush();
    assert_eq!(out.matches("<style>").count(), 1);
    assert_eq!(out.matches("<script>").count(), 1);
    assert!(out.contains(DEBUG_CSS));
}

#[test]
fn test_text_dump_has_trace_request_and_stats() {
    reqdebug_common::logging::ensure_test_logging(None);

    let config = DebugConfig { enabled: true, format: OutputFormat::Text, ..Default::default() };
    let request = RequestInfo::new().with_uri("/cart").with_method("POST").with_memory(2048, None);
    let mut session = OutputSession::builder(config, request)
        .call_stack(StaticCallStack(vec![
            RawFrame::new("dump").at("/srv/app/debug.rs", 3),
            RawFrame::new("checkout").method("Cart", "::").at("/srv/app/cart.rs", 88),
        ]))
        .trace_formatter(TraceFormatter::new().with_own_source(None))
        .assets(NoAssets)
        .without_notifier()
        .build();

    let block = session.get_dump(&["x".into()]);
    assert!(block.contains("by Cart::checkout()"));
    assert!(block.contains("/cart"));
    assert!(block.contains("\n 2 K | "));
}

#[test]
fn test_header_counter_survives_flush_and_reset() {
    reqdebug_common::logging::ensure_test_logging(None);

    let mut session = session(enabled());
    let mut response = BufferedResponse::new();

    session.header(&["one".into()], &mut response);
    session.dump(&["x".into()]);
    session.flush();
    session.reset();
    session.header(&["two".into(), DumpValue::list([1, 2])], &mut response);

    assert_eq!(response.header("X-Debug-1.0"), Some("one"));
    assert_eq!(response.header("X-Debug-2.0"), Some("two"));
    assert_eq!(response.header("X-Debug-2.1"), Some("[1,2]"));
}

#[test]
fn test_log_to_file() {
    reqdebug_common::logging::ensure_test_logging(None);

    let dir = tempfile::tempdir().unwrap();
    let mut session = OutputSession::builder(DebugConfig::default(), RequestInfo::new())
        .log_sink(FileLogSink)
        .without_notifier()
        .build();
    session.flag("log_dir", Some(&format!("{}/nested", dir.path().display()))).unwrap();
    session.flag("log_file", Some("debug.log")).unwrap();

    session.log(&["first".into()]);
    session.log(&[DumpValue::map([("k", "v")])]);

    let content = fs::read_to_string(dir.path().join("nested").join("debug.log")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert!(lines[0].ends_with("\tfirst"));
    assert!(content.contains("[ k ] => String(1)  \"v\""));
}

#[test]
fn test_log_failure_does_not_panic() {
    reqdebug_common::logging::ensure_test_logging(None);

    let file = tempfile::NamedTempFile::new().unwrap();
    let mut session = OutputSession::builder(DebugConfig::default(), RequestInfo::new())
        .log_sink(FileLogSink)
        .without_notifier()
        .build();
    // a regular file used as directory makes every write fail
    session.flag("log_dir", Some(&file.path().display().to_string())).unwrap();

    session.log(&["lost".into()]);
    session.log(&["lost again".into()]);
    session.log_trace();
}

#[test]
fn test_factory_resolves_activation_per_request() {
    reqdebug_common::logging::ensure_test_logging(None);

    let factory = SessionFactory::new(quiet(DebugConfig {
        with_cookie: Some("debug".to_string()),
        ..Default::default()
    }));

    let with_cookie = factory
        .for_request(RequestInfo::new().with_cookie_header("debug=1"))
        .without_notifier()
        .build();
    let without_cookie = factory.for_request(RequestInfo::new()).without_notifier().build();

    assert!(with_cookie.is_enabled());
    assert!(!without_cookie.is_enabled());
}

#[test]
fn test_dump_hook_listing() {
    reqdebug_common::logging::ensure_test_logging(None);

    let mut session = session(DebugConfig { format: OutputFormat::Text, ..enabled() });
    session.dump_hook(
        "init",
        &[HookCallback::new(10, "App::boot", 1), HookCallback::new(5, "early", 1)],
    );
    let out = session.flush();
    assert_eq!(out, ">>>>>\tinit\n5\tearly\n10\tApp::boot\n");
}

#[test]
fn test_active_hooks_appear_in_dump() {
    reqdebug_common::logging::ensure_test_logging(None);

    let config = DebugConfig { format: OutputFormat::Text, show_trace: true, ..enabled() };
    let mut session = session(config);
    session.enter_hook("save_post", 10);
    let block = session.get_dump(&["x".into()]);
    session.leave_hook();

    assert!(block.contains("→ save_post \t priority 10"));
    assert!(!session.get_dump(&["x".into()]).contains("save_post"));
}
