//! Unit tests for the stdout reader task and line filtering.
//!
//! The reader runs against in-memory byte sources so the ordering and death
//! contracts can be checked without spawning a process.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use engine_supervisor::events::{EventBus, ProcessEvent};
use engine_supervisor::models::label::TaskLabel;
use engine_supervisor::models::warn_words::WarnWords;
use engine_supervisor::process::codec::EngineLineCodec;
use engine_supervisor::process::reader::{filter_line, run_reader, ReadExit};
use engine_supervisor::AppError;

fn label() -> TaskLabel {
    TaskLabel::for_executable(std::path::Path::new("/usr/bin/testengine"))
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ProcessEvent>) -> Vec<ProcessEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn read_all(input: &'static [u8], warn_words: WarnWords) -> (ReadExit, Vec<ProcessEvent>) {
    let bus = Arc::new(EventBus::new());
    let mut rx = bus.subscribe();

    let exit = run_reader(
        label(),
        input,
        EngineLineCodec::new(),
        warn_words,
        Arc::clone(&bus),
        CancellationToken::new(),
    )
    .await;

    (exit, drain(&mut rx))
}

// ── filter_line ──────────────────────────────────────────────────────────────

#[test]
fn filter_trims_trailing_whitespace() {
    let line = filter_line(b"bestmove e2e4 \r").expect("valid line");
    assert_eq!(line.as_deref(), Some("bestmove e2e4"));
}

#[test]
fn filter_keeps_leading_whitespace() {
    let line = filter_line(b"  info depth 3").expect("valid line");
    assert_eq!(line.as_deref(), Some("  info depth 3"));
}

#[test]
fn filter_skips_empty_and_blank_lines() {
    assert_eq!(filter_line(b"").expect("empty"), None);
    assert_eq!(filter_line(b" \t\r").expect("blank"), None);
}

#[test]
fn filter_skips_author_line_even_when_not_utf8() {
    assert_eq!(filter_line(b"id author Some One").expect("author"), None);
    assert_eq!(filter_line(b"id author J\xf6rg").expect("latin-1 author"), None);
}

#[test]
fn filter_keeps_other_id_lines() {
    let line = filter_line(b"id name Engine 1.0").expect("valid line");
    assert_eq!(line.as_deref(), Some("id name Engine 1.0"));
}

#[test]
fn filter_rejects_invalid_utf8() {
    let err = filter_line(b"info string \xff").expect_err("must fail");
    assert!(matches!(err, AppError::Read(_)), "got {err:?}");
}

// ── run_reader ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn lines_are_emitted_in_order_then_died_once() {
    let input: &'static [u8] = b"id name X\n\nid author \xf6\n   \nuciok\r\nbestmove a2a3";

    let (exit, events) = read_all(input, WarnWords::default()).await;

    assert!(matches!(exit, ReadExit::Eof), "got {exit:?}");
    assert_eq!(
        events,
        vec![
            ProcessEvent::Line("id name X".into()),
            ProcessEvent::Line("uciok".into()),
            ProcessEvent::Line("bestmove a2a3".into()),
            ProcessEvent::Died,
        ]
    );
}

#[tokio::test]
async fn empty_stream_emits_only_died() {
    let (exit, events) = read_all(b"", WarnWords::default()).await;

    assert!(exit.is_death());
    assert!(exit.requires_termination());
    assert_eq!(events, vec![ProcessEvent::Died]);
}

#[tokio::test]
async fn warn_word_does_not_change_payload() {
    let input: &'static [u8] = b"info string illegal move\ninfo string fine\n";

    let (_, events) = read_all(input, WarnWords::new(["illegal"])).await;

    assert_eq!(
        events,
        vec![
            ProcessEvent::Line("info string illegal move".into()),
            ProcessEvent::Line("info string fine".into()),
            ProcessEvent::Died,
        ]
    );
}

#[tokio::test]
async fn undecodable_line_is_a_read_failure() {
    let input: &'static [u8] = b"ok\nbad \xff line\nnever\n";

    let (exit, events) = read_all(input, WarnWords::default()).await;

    assert!(matches!(exit, ReadExit::Failed(AppError::Read(_))), "got {exit:?}");
    assert_eq!(
        events,
        vec![ProcessEvent::Line("ok".into()), ProcessEvent::Died],
        "nothing may follow died"
    );
}

#[tokio::test]
async fn cancellation_during_read_emits_nothing() {
    let (engine_side, reader_side) = tokio::io::duplex(64);
    let bus = Arc::new(EventBus::new());
    let mut rx = bus.subscribe();
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_reader(
        label(),
        reader_side,
        EngineLineCodec::new(),
        WarnWords::default(),
        Arc::clone(&bus),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let exit = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("reader must stop promptly")
        .expect("reader must not panic");

    assert!(matches!(exit, ReadExit::Cancelled), "got {exit:?}");
    assert!(!exit.is_death());
    assert!(!exit.requires_termination());
    assert!(drain(&mut rx).is_empty(), "cancellation must not emit died");
    assert!(!bus.has_died());
    drop(engine_side);
}

#[tokio::test]
async fn reader_stops_quietly_when_died_already_emitted() {
    let bus = Arc::new(EventBus::new());
    let mut rx = bus.subscribe();
    bus.emit_died();

    let exit = run_reader(
        label(),
        &b"late line\n"[..],
        EngineLineCodec::new(),
        WarnWords::default(),
        Arc::clone(&bus),
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(exit, ReadExit::AlreadyDead), "got {exit:?}");
    assert!(!exit.is_death(), "the reader did not detect this death");
    assert!(
        exit.requires_termination(),
        "an engine whose stdout is no longer read must be stopped"
    );
    assert_eq!(drain(&mut rx), vec![ProcessEvent::Died]);
}
