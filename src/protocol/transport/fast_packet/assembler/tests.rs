//! Fast Packet reassembly tests covering sequencing, sessions, timeouts and concurrency.
// ASSEMBLER
use super::*;

const PGN: u32 = 0x1EF00;

fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

fn new_assembler() -> FastPacketAssembler<4> {
    FastPacketAssembler::new(Duration::from_millis(750))
}

fn expect_payload(result: ProcessResult, expected: &[u8]) {
    match result {
        ProcessResult::MessageComplete(message) => {
            assert_eq!(message.payload.as_slice(), expected);
        }
        other => panic!("expected a complete message, got {other:?}"),
    }
}

#[test]
/// A 14-byte payload split as 6 + 7 + 1 comes back exactly once.
fn test_reassembly_6_7_1() {
    let mut assembler = new_assembler();
    let source_address = 42;
    let frame0 = [0b000_00000, 14, 1, 2, 3, 4, 5, 6];
    let frame1 = [0b000_00001, 7, 8, 9, 10, 11, 12, 13];
    let frame2 = [0b000_00010, 14, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

    assert_eq!(
        assembler.process_frame(source_address, PGN, &frame0, at(0)),
        ProcessResult::FragmentConsumed
    );
    assert_eq!(
        assembler.process_frame(source_address, PGN, &frame1, at(1)),
        ProcessResult::FragmentConsumed
    );
    let result = assembler.process_frame(source_address, PGN, &frame2, at(2));
    match result {
        ProcessResult::MessageComplete(message) => {
            assert_eq!(message.source_address, 42);
            assert_eq!(message.pgn, PGN);
            assert_eq!(
                message.payload.as_slice(),
                &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14]
            );
        }
        other => panic!("expected a complete message, got {other:?}"),
    }

    // Replaying the last frame does not deliver a second copy.
    assert_eq!(
        assembler.process_frame(source_address, PGN, &frame2, at(3)),
        ProcessResult::Ignored
    );
    assert_eq!(assembler.active_sessions(), 0);
}

#[test]
/// Counter 3 after counter 1 discards the session and nothing is ever delivered.
fn test_out_of_sequence_packet() {
    let mut assembler = new_assembler();
    let source_address = 10;
    let frame0 = [0b000_00000, 30, 1, 2, 3, 4, 5, 6];
    let frame1 = [0b000_00001, 7, 8, 9, 10, 11, 12, 13];
    let frame2 = [0b000_00010, 14, 15, 16, 17, 18, 19, 20];
    let frame3 = [0b000_00011, 21, 22, 23, 24, 25, 26, 27];
    let frame4 = [0b000_00100, 28, 29, 30, 0xFF, 0xFF, 0xFF, 0xFF];

    assembler.process_frame(source_address, PGN, &frame0, at(0));
    assembler.process_frame(source_address, PGN, &frame1, at(1));
    assert_eq!(
        assembler.process_frame(source_address, PGN, &frame3, at(2)),
        ProcessResult::Ignored
    );
    assert_eq!(assembler.sessions[0].state, SessionState::Inactive);

    // The rest of the stream finds no session.
    for frame in [frame2, frame3, frame4] {
        assert_eq!(
            assembler.process_frame(source_address, PGN, &frame, at(3)),
            ProcessResult::Ignored
        );
    }
}

#[test]
/// A session past its deadline never completes, with or without a tick in between.
fn test_timeout_discards_session() {
    let frame0 = [0, 10, 1, 2, 3, 4, 5, 6];
    let frame1 = [1, 7, 8, 9, 10, 0xFF, 0xFF, 0xFF];

    // Expired by the periodic tick.
    let mut assembler = new_assembler();
    assembler.process_frame(5, PGN, &frame0, at(0));
    assert_eq!(assembler.expire(at(500)), 0);
    assert_eq!(assembler.expire(at(751)), 1);
    assert_eq!(
        assembler.process_frame(5, PGN, &frame1, at(752)),
        ProcessResult::Ignored
    );

    // Late frame arriving before any tick ran.
    let mut assembler = new_assembler();
    assembler.process_frame(5, PGN, &frame0, at(0));
    assert_eq!(
        assembler.process_frame(5, PGN, &frame1, at(800)),
        ProcessResult::Ignored
    );
    assert_eq!(assembler.active_sessions(), 0);
}

#[test]
/// Short messages complete on the first frame.
fn test_single_frame_session() {
    let mut assembler = new_assembler();
    let frame0 = [0b011_00000, 4, 0xAA, 0xBB, 0xCC, 0xDD, 0xFF, 0xFF];
    expect_payload(
        assembler.process_frame(1, PGN, &frame0, at(0)),
        &[0xAA, 0xBB, 0xCC, 0xDD],
    );
    assert_eq!(assembler.active_sessions(), 0);
}

#[test]
/// Declared lengths of zero or above 223 and truncated frames are refused.
fn test_malformed_first_frames() {
    let mut assembler = new_assembler();
    assert_eq!(
        assembler.process_frame(1, PGN, &[0, 0, 1, 2, 3, 4, 5, 6], at(0)),
        ProcessResult::Ignored
    );
    assert_eq!(
        assembler.process_frame(1, PGN, &[0, 224, 1, 2, 3, 4, 5, 6], at(0)),
        ProcessResult::Ignored
    );
    assert_eq!(
        assembler.process_frame(1, PGN, &[0, 20, 1, 2], at(0)),
        ProcessResult::Ignored
    );
    assert_eq!(
        assembler.process_frame(1, PGN, &[], at(0)),
        ProcessResult::Ignored
    );
    assert_eq!(assembler.active_sessions(), 0);
}

#[test]
/// A fresh first frame restarts a session for the same key.
fn test_restart_on_new_first_frame() {
    let mut assembler = new_assembler();
    assembler.process_frame(3, PGN, &[0b001_00000, 9, 1, 1, 1, 1, 1, 1], at(0));
    assembler.process_frame(3, PGN, &[0b010_00000, 9, 2, 2, 2, 2, 2, 2], at(1));
    assert_eq!(assembler.active_sessions(), 1);

    expect_payload(
        assembler.process_frame(3, PGN, &[0b010_00001, 2, 2, 2, 0xFF, 0xFF, 0xFF, 0xFF], at(3)),
        &[2; 9],
    );
}

#[test]
/// A continuation carrying another session id breaks the sequence: the
/// session is dropped and its own next frame no longer completes it.
fn test_session_id_mismatch_discards_session() {
    let mut assembler = new_assembler();
    let frame0 = [0b001_00000, 10, 1, 2, 3, 4, 5, 6];
    let foreign = [0b010_00001, 0xEE, 0xEE, 0xEE, 0xEE, 0xFF, 0xFF, 0xFF];
    let frame1 = [0b001_00001, 7, 8, 9, 10, 0xFF, 0xFF, 0xFF];

    assert_eq!(
        assembler.process_frame(7, PGN, &frame0, at(0)),
        ProcessResult::FragmentConsumed
    );
    assert_eq!(
        assembler.process_frame(7, PGN, &foreign, at(1)),
        ProcessResult::Ignored
    );
    assert_eq!(assembler.active_sessions(), 0);
    assert_eq!(
        assembler.process_frame(7, PGN, &frame1, at(2)),
        ProcessResult::Ignored
    );
}

#[test]
/// Handles concurrent sessions keyed by source and PGN without collision.
fn test_multiple_concurrent_sessions() {
    let mut assembler = new_assembler();
    let source_a = 10;
    let source_b = 20;
    assert_eq!(
        assembler.process_frame(source_a, PGN, &[0, 10, 1, 2, 3, 4, 5, 6], at(0)),
        ProcessResult::FragmentConsumed
    );
    assert_eq!(
        assembler.process_frame(source_b, PGN, &[0, 9, 100, 101, 102, 103, 104, 105], at(0)),
        ProcessResult::FragmentConsumed
    );
    // Same source as A, different PGN.
    assert_eq!(
        assembler.process_frame(source_a, 130306, &[0, 8, 50, 51, 52, 53, 54, 55], at(0)),
        ProcessResult::FragmentConsumed
    );
    assert_eq!(assembler.active_sessions(), 3);

    expect_payload(
        assembler.process_frame(source_a, PGN, &[1, 7, 8, 9, 10, 0xFF, 0xFF, 0xFF], at(1)),
        &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
    );
    expect_payload(
        assembler.process_frame(source_b, PGN, &[1, 106, 107, 108, 0xFF, 0xFF, 0xFF, 0xFF], at(1)),
        &[100, 101, 102, 103, 104, 105, 106, 107, 108],
    );
    expect_payload(
        assembler.process_frame(source_a, 130306, &[1, 56, 57, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], at(1)),
        &[50, 51, 52, 53, 54, 55, 56, 57],
    );
}

#[test]
/// Once every slot is busy, new sessions are ignored instead of evicting.
fn test_pool_exhaustion() {
    let mut assembler: FastPacketAssembler<2> = FastPacketAssembler::new(Duration::from_millis(750));
    assembler.process_frame(1, PGN, &[0, 9, 0, 0, 0, 0, 0, 0], at(0));
    assembler.process_frame(2, PGN, &[0, 9, 0, 0, 0, 0, 0, 0], at(0));
    assert_eq!(
        assembler.process_frame(3, PGN, &[0, 9, 0, 0, 0, 0, 0, 0], at(0)),
        ProcessResult::Ignored
    );
    assert_eq!(assembler.active_sessions(), 2);
}
