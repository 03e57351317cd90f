//! Unit tests for the engine line codec.
//!
//! Covers:
//! - single and batched lines
//! - partial delivery buffered until the separator
//! - trailing fragment delivered at EOF
//! - oversized lines discarded without breaking the stream, also at EOF
//! - non-UTF-8 bytes passed through untouched
//! - verbatim encoding

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use engine_supervisor::process::codec::{EngineLineCodec, MAX_LINE_BYTES};

#[test]
fn single_line_is_returned_without_separator() {
    let mut codec = EngineLineCodec::new();
    let mut buf = BytesMut::from("uciok\n");

    let line = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(line.as_deref(), Some(&b"uciok"[..]));
    assert!(buf.is_empty(), "the separator must be consumed");
}

#[test]
fn batched_lines_are_each_returned() {
    let mut codec = EngineLineCodec::new();
    let mut buf = BytesMut::from("id name Foo\nuciok\n");

    let first = codec.decode(&mut buf).expect("first decode");
    let second = codec.decode(&mut buf).expect("second decode");
    let third = codec.decode(&mut buf).expect("third decode");

    assert_eq!(first.as_deref(), Some(&b"id name Foo"[..]));
    assert_eq!(second.as_deref(), Some(&b"uciok"[..]));
    assert!(third.is_none(), "no further complete line");
}

#[test]
fn partial_line_is_buffered_until_separator() {
    let mut codec = EngineLineCodec::new();
    let mut buf = BytesMut::from("bestmove e2");

    assert!(codec.decode(&mut buf).expect("partial decode").is_none());

    buf.extend_from_slice(b"e4\n");
    let line = codec.decode(&mut buf).expect("completed decode");

    assert_eq!(line.as_deref(), Some(&b"bestmove e2e4"[..]));
}

#[test]
fn carriage_return_is_left_for_the_reader() {
    let mut codec = EngineLineCodec::new();
    let mut buf = BytesMut::from("readyok\r\n");

    let line = codec.decode(&mut buf).expect("decode");

    assert_eq!(line.as_deref(), Some(&b"readyok\r"[..]));
}

#[test]
fn trailing_fragment_is_returned_at_eof() {
    let mut codec = EngineLineCodec::new();
    let mut buf = BytesMut::from("info depth 1\nbye");

    let first = codec.decode_eof(&mut buf).expect("first eof decode");
    let second = codec.decode_eof(&mut buf).expect("second eof decode");
    let third = codec.decode_eof(&mut buf).expect("third eof decode");

    assert_eq!(first.as_deref(), Some(&b"info depth 1"[..]));
    assert_eq!(second.as_deref(), Some(&b"bye"[..]));
    assert!(third.is_none());
}

#[test]
fn oversized_line_is_discarded_and_stream_continues() {
    let mut codec = EngineLineCodec::with_max_length(8);
    let mut buf = BytesMut::from("this line is far too long\nok\n");

    let line = codec.decode(&mut buf).expect("decode must not fail");

    assert_eq!(line.as_deref(), Some(&b"ok"[..]));
}

#[test]
fn oversized_line_split_across_reads_is_discarded() {
    let mut codec = EngineLineCodec::with_max_length(4);
    let mut buf = BytesMut::from("abcdefgh");

    assert!(codec.decode(&mut buf).expect("first chunk").is_none());

    buf.extend_from_slice(b"ijk\nnext\n");
    let line = codec.decode(&mut buf).expect("second chunk");

    assert_eq!(line.as_deref(), Some(&b"next"[..]));
}

#[test]
fn oversized_fragment_at_eof_is_dropped() {
    let mut codec = EngineLineCodec::with_max_length(4);
    let mut buf = BytesMut::from("ok\nabcdefgh");

    let first = codec.decode_eof(&mut buf).expect("first eof decode");
    let second = codec.decode_eof(&mut buf).expect("oversized tail must not fail");

    assert_eq!(first.as_deref(), Some(&b"ok"[..]));
    assert!(second.is_none());
    assert!(buf.is_empty(), "the oversized tail is consumed");
}

#[test]
fn invalid_utf8_bytes_pass_through() {
    let mut codec = EngineLineCodec::new();
    let mut buf = BytesMut::from(&b"id author J\xf6rg\n"[..]);

    let line = codec.decode(&mut buf).expect("decode must not validate text");

    assert_eq!(line.as_deref(), Some(&b"id author J\xf6rg"[..]));
}

#[test]
fn default_limit_is_one_mebibyte() {
    assert_eq!(EngineLineCodec::default().max_length(), MAX_LINE_BYTES);
    assert_eq!(MAX_LINE_BYTES, 1_048_576);
}

#[test]
fn encoder_writes_bytes_verbatim() {
    let mut codec = EngineLineCodec::new();
    let mut dst = BytesMut::new();

    codec
        .encode("go\n".to_owned(), &mut dst)
        .expect("encode must succeed");
    codec
        .encode("stop".to_owned(), &mut dst)
        .expect("encode must succeed");

    assert_eq!(&dst[..], b"go\nstop", "no separator may be added");
}
