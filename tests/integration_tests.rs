//! Black-box, end-to-end coverage of the public `Handle`/`SessionView`
//! surface (spec.md §8). Builds whole log files on disk via `tempfile` so
//! `Handle::open`/`select_session` are exercised exactly as a caller would.

use std::io::Write;

use blackbox::{Error, EventKind, EventPayload, FieldValue, FrameKind, Handle, Scalar};

/// Minimal Intra-only field defs: `time`, `loopIteration`, `vbat`, all plain
/// unsigned varints with a zero predictor, so field bytes are direct uvarints.
const INTRA_HEADERS: &str = "\
H Field I name:time,loopIteration,vbat\n\
H Field I signed:0,0,0\n\
H Field I predictor:0,0,0\n\
H Field I encoding:1,1,1\n";

fn varint(mut v: u32) -> Vec<u8> {
    let mut out = vec![];
    loop {
        let mut byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if v == 0 {
            break;
        }
    }
    out
}

fn build_session(extra_headers: &str, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"H Product:Test Product\n");
    out.extend_from_slice(extra_headers.as_bytes());
    out.extend_from_slice(body);
    out
}

fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().expect("create temp file");
    f.write_all(bytes).expect("write temp file");
    f.flush().expect("flush temp file");
    f
}

#[test]
fn sync_beep_only_scenario() {
    // spec.md §8 scenario 1.
    let body = [b'E', 0x00, 0x2a]; // sync-beep, uvarint 42
    let file = write_temp(&build_session("", &body));

    let handle = Handle::open(file.path()).unwrap();
    assert_eq!(handle.session_count(), 1);
    let view = handle.select_session(1).unwrap();

    let frames: Vec<_> = view.frames().collect();
    assert!(frames.is_empty());

    let events = view.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::SyncBeep);
    match &events[0].payload {
        EventPayload::Map(m) => assert_eq!(m.get("time"), Some(&Scalar::Int(42))),
        EventPayload::None => panic!("expected a payload"),
    }
}

#[test]
fn flight_mode_event_scenario() {
    // spec.md §8 scenario 2: time/iteration on the event are "initially
    // absent" since no main frame precedes it.
    let body = [b'E', 0x05, 0x03, 0x01]; // flight-mode, new_flags=3, old_flags=1
    let file = write_temp(&build_session("", &body));

    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();
    let _frames: Vec<_> = view.frames().collect();

    let events = view.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::FlightMode);
    assert_eq!(events[0].time, None);
    assert_eq!(events[0].loop_iteration, None);
    match &events[0].payload {
        EventPayload::Map(m) => {
            assert_eq!(m.get("new_flags"), Some(&Scalar::Int(3)));
            assert_eq!(m.get("old_flags"), Some(&Scalar::Int(1)));
        }
        EventPayload::None => panic!("expected a payload"),
    }
}

#[test]
fn log_end_termination_scenario() {
    // spec.md §8 scenario 3: stream terminates at log-end; trailing garbage
    // is never consumed.
    let mut body = vec![b'E', 0xFF];
    body.extend_from_slice(b"End of log\0");
    body.extend_from_slice(b"garbage-that-would-otherwise-desync-parsing");
    let file = write_temp(&build_session("", &body));

    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();
    let frames: Vec<_> = view.frames().collect();
    assert!(frames.is_empty());

    let events = view.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::LogEnd);
    assert_eq!(view.stats().read, 1);
    assert_eq!(view.stats().invalid, 0);
}

#[test]
fn inflight_adjustment_integer_variant_scenario() {
    // spec.md §8 scenario 4.
    let body = [b'E', 0x0d, 0x02, 0x64]; // inflight-adjustment, tag=2, zigzag(100)=50
    let file = write_temp(&build_session("", &body));

    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();
    let _frames: Vec<_> = view.frames().collect();

    let events = view.events();
    assert_eq!(events.len(), 1);
    match &events[0].payload {
        EventPayload::Map(m) => {
            assert_eq!(m.get("name"), Some(&Scalar::Str("RC Expo".into())));
            assert_eq!(m.get("func"), Some(&Scalar::Int(2)));
            assert_eq!(m.get("value"), Some(&Scalar::Float(0.5)));
        }
        EventPayload::None => panic!("expected a payload"),
    }
}

#[test]
fn inflight_adjustment_float_variant_scenario() {
    // spec.md §8 scenario 5.
    let mut body = vec![b'E', 0x0d, 0x88]; // inflight-adjustment, tag=0x88 -> func=8, float
    body.extend_from_slice(&1.0f32.to_bits().to_be_bytes());
    let file = write_temp(&build_session("", &body));

    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();
    let _frames: Vec<_> = view.frames().collect();

    let events = view.events();
    assert_eq!(events.len(), 1);
    match &events[0].payload {
        EventPayload::Map(m) => {
            assert_eq!(m.get("name"), Some(&Scalar::Str("Pitch & Roll D".into())));
            assert_eq!(m.get("func"), Some(&Scalar::Int(8)));
            assert_eq!(m.get("value"), Some(&Scalar::Float(1000.0)));
        }
        EventPayload::None => panic!("expected a payload"),
    }
}

#[test]
fn time_desync_drops_the_second_frame_scenario() {
    // spec.md §8 scenario 6. The rule only fires once the gap exceeds
    // MAX_TIME_JUMP (10_000_000), so a gap like 1_000 -> 100 never trips it;
    // use a genuinely-desynced pair, matching the src/stream.rs unit test.
    let mut body = vec![b'I'];
    body.extend(varint(20_000_000));
    body.extend(varint(0));
    body.extend(varint(0));
    body.push(b'I');
    body.extend(varint(100));
    body.extend(varint(0));
    body.extend(varint(0));
    let file = write_temp(&build_session(INTRA_HEADERS, &body));

    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();
    let frames: Vec<_> = view.frames().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].values[0], FieldValue::Int(20_000_000));
    assert_eq!(view.stats().invalid, 1);
}

#[test]
fn zero_frames_after_headers_yields_empty_frames_and_events() {
    let file = write_temp(&build_session(INTRA_HEADERS, &[]));
    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();
    assert!(view.frames().collect::<Vec<_>>().is_empty());
    assert!(view.events().is_empty());
}

#[test]
fn session_without_log_end_event_terminates_at_buffer_end() {
    let mut body = vec![b'I'];
    body.extend(varint(1));
    body.extend(varint(0));
    body.extend(varint(0));
    let file = write_temp(&build_session(INTRA_HEADERS, &body));
    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();
    let frames: Vec<_> = view.frames().collect();
    assert_eq!(frames.len(), 1);
    assert!(!view.events().iter().any(|e| e.kind == EventKind::LogEnd));
}

#[test]
fn first_main_frame_before_slow_or_gps_pads_with_empty_columns() {
    let headers = format!(
        "{INTRA_HEADERS}\
         H Field S name:rssi\n\
         H Field S signed:0\n\
         H Field S predictor:0\n\
         H Field S encoding:1\n"
    );
    let mut body = vec![b'I'];
    body.extend(varint(1));
    body.extend(varint(0));
    body.extend(varint(0));
    let file = write_temp(&build_session(&headers, &body));

    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();
    let frames: Vec<_> = view.frames().collect();
    assert_eq!(frames.len(), 1);
    // 3 Intra fields + 1 Slow field, the latter padded with the Empty sentinel.
    assert_eq!(frames[0].values.len(), 4);
    assert_eq!(frames[0].values[3], FieldValue::Empty);
}

#[test]
fn unknown_frame_kind_byte_is_invalid_and_parsing_continues() {
    let mut body = vec![0xAAu8, b'I'];
    body.extend(varint(1));
    body.extend(varint(0));
    body.extend(varint(0));
    let file = write_temp(&build_session(INTRA_HEADERS, &body));

    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();
    let frames: Vec<_> = view.frames().collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(view.stats().invalid, 1);
}

#[test]
fn reselecting_a_session_is_idempotent() {
    let mut body = vec![b'I'];
    body.extend(varint(1));
    body.extend(varint(0));
    body.extend(varint(0));
    let file = write_temp(&build_session(INTRA_HEADERS, &body));
    let handle = Handle::open(file.path()).unwrap();

    let first = handle.select_session(1).unwrap();
    let second = handle.select_session(1).unwrap();

    assert_eq!(first.field_names(), second.field_names());
    let frames_a: Vec<_> = first.frames().collect();
    let frames_b: Vec<_> = second.frames().collect();
    assert_eq!(frames_a, frames_b);
}

#[test]
fn reading_all_frames_twice_from_the_same_session_view_is_stable() {
    let mut body = vec![b'I'];
    body.extend(varint(1));
    body.extend(varint(0));
    body.extend(varint(0));
    body.push(b'I');
    body.extend(varint(2));
    body.extend(varint(1));
    body.extend(varint(0));
    let file = write_temp(&build_session(INTRA_HEADERS, &body));
    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();

    let first_pass: Vec<_> = view.frames().collect();
    let second_pass: Vec<_> = view.frames().collect();
    assert_eq!(first_pass, second_pass);
}

#[test]
fn multiple_sessions_are_discovered_and_independently_selectable() {
    let mut raw = build_session(INTRA_HEADERS, &{
        let mut b = vec![b'I'];
        b.extend(varint(1));
        b.extend(varint(0));
        b.extend(varint(0));
        b
    });
    raw.extend(build_session(INTRA_HEADERS, &{
        let mut b = vec![b'I'];
        b.extend(varint(5));
        b.extend(varint(0));
        b.extend(varint(0));
        b
    }));
    let file = write_temp(&raw);

    let handle = Handle::open(file.path()).unwrap();
    assert_eq!(handle.session_count(), 2);

    let first = handle.select_session(1).unwrap();
    let second = handle.select_session(2).unwrap();
    assert_eq!(first.frames().collect::<Vec<_>>()[0].values[0], FieldValue::Int(1));
    assert_eq!(second.frames().collect::<Vec<_>>()[0].values[0], FieldValue::Int(5));
}

#[test]
fn comment_preamble_is_preserved_verbatim_minus_hash_and_whitespace() {
    let mut raw = b"# captured on a test bench\n#  firmware 4.3.0\n".to_vec();
    raw.extend(build_session(INTRA_HEADERS, &[]));
    let file = write_temp(&raw);

    let handle = Handle::open(file.path()).unwrap();
    assert_eq!(
        handle.comments(),
        &["captured on a test bench".to_string(), "firmware 4.3.0".to_string()]
    );
}

#[test]
fn invalid_session_index_is_a_hard_error() {
    let file = write_temp(&build_session(INTRA_HEADERS, &[]));
    let handle = Handle::open(file.path()).unwrap();
    assert!(matches!(
        handle.select_session(0),
        Err(Error::InvalidSessionIndex { index: 0, count: 1 })
    ));
    assert!(matches!(
        handle.select_session(2),
        Err(Error::InvalidSessionIndex { index: 2, count: 1 })
    ));
}

#[test]
fn unknown_encoding_id_in_headers_is_a_hard_error_at_select() {
    let headers = "H Field I name:time\nH Field I predictor:0\nH Field I encoding:99\n";
    let file = write_temp(&build_session(headers, &[]));
    let handle = Handle::open(file.path()).unwrap();
    assert!(matches!(
        handle.select_session(1),
        Err(Error::UnknownEncoding(99))
    ));
}

#[test]
fn frames_by_field_gives_a_column_major_view() {
    let mut body = vec![b'I'];
    body.extend(varint(1));
    body.extend(varint(0));
    body.extend(varint(7));
    let file = write_temp(&build_session(INTRA_HEADERS, &body));
    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();

    let columns = view.frames_by_field();
    assert_eq!(columns["time"], vec![FieldValue::Int(1)]);
    assert_eq!(columns["vbat"], vec![FieldValue::Int(7)]);
}

#[test]
fn headers_exposed_to_callers_exclude_field_def_keys() {
    let file = write_temp(&build_session(INTRA_HEADERS, &[]));
    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();
    assert!(view.headers().get("Product").is_some());
    assert!(view.headers().get("Field I name").is_none());
}

#[test]
fn field_names_orders_intra_then_slow_then_gps_excluding_gps_time() {
    let headers = format!(
        "{INTRA_HEADERS}\
         H Field S name:rssi,amps\n\
         H Field S signed:0,0\n\
         H Field S predictor:0,0\n\
         H Field S encoding:1,1\n\
         H Field G name:time,lat,lon\n\
         H Field G signed:0,0,0\n\
         H Field G predictor:0,0,0\n\
         H Field G encoding:1,1,1\n"
    );
    let file = write_temp(&build_session(&headers, &[]));
    let handle = Handle::open(file.path()).unwrap();
    let view = handle.select_session(1).unwrap();
    assert_eq!(
        view.field_names(),
        vec!["time", "loopIteration", "vbat", "rssi", "amps", "lat", "lon"]
    );
}

#[test]
fn every_main_frame_kind_round_trips_through_header_tags() {
    for (tag, kind) in [
        (b'I', FrameKind::Intra),
        (b'P', FrameKind::Inter),
        (b'S', FrameKind::Slow),
        (b'G', FrameKind::Gps),
        (b'H', FrameKind::GpsHome),
        (b'E', FrameKind::Event),
    ] {
        assert_eq!(FrameKind::from_tag(tag), Some(kind));
    }
}
