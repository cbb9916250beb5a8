//! Stack instance and manager tests: claim lifecycle, device tracking, frame
//! routing and the VE.Reg path.
use embassy_time::Instant;

use super::*;
use crate::core::{Variant, VariantTag};
use crate::error::StackError;
use crate::infra::frame_queue::FrameQueue;
use crate::protocol::managment::address_claiming::{
    build_address_claim_frame, extract_name_from_claim, ClaimState, PGN_ADDRESS_CLAIM,
};
use crate::protocol::managment::network_discovering::{
    build_discovery_frame, build_iso_request_frame, parse_iso_request, PGN_ISO_REQUEST,
};
use crate::protocol::transport::can_id::{CanId, GLOBAL_ADDRESS, NULL_ADDRESS};
use crate::protocol::transport::fast_packet::builder::FastPacketBuilder;
use crate::protocol::vereg::engine::RegisterEvent;
use crate::protocol::vereg::register::{
    Access, CommandKind, RegisterCommand, RegisterReply,
};
use crate::protocol::vereg::{AckCode, PGN_FAST_PACKET, PGN_SINGLE_FRAME};

const PREFERRED: u8 = 0x22;
const PEER: u8 = 0x40;
const REG_MODE: u16 = 0x0EC0;
const REG_MODEL: u16 = 0x010A;

static REGISTERS: [RegisterDescriptor; 2] = [
    RegisterDescriptor::new(REG_MODE, VariantTag::Un8, Access::READ_WRITE, "mode"),
    RegisterDescriptor::new(
        REG_MODEL,
        VariantTag::Bytes { len: 20 },
        Access::READ_WRITE,
        "model name",
    ),
];

type TestStack<'a> = StackInstance<&'a FrameQueue<32>, u8>;

fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

fn name(unique: u32, aac: bool) -> IsoName {
    IsoName::builder()
        .unique_number(unique)
        .manufacturer_code(358)
        .industry_group(4)
        .arbitrary_address_capable(aac)
        .build()
}

fn own_name() -> IsoName {
    name(100, true)
}

fn new_stack(tx: &FrameQueue<32>) -> TestStack<'_> {
    StackInstance::new(
        StackConfig::new(own_name(), PREFERRED).with_registers(&REGISTERS),
        tx,
    )
}

/// Stack that already owns `PREFERRED`, with an empty transmit queue.
fn claimed_stack<'a>(tx: &'a FrameQueue<32>, app: &mut Recorder) -> TestStack<'a> {
    let mut stack = new_stack(tx);
    stack.init(at(0), app);
    stack.tick(at(300), app);
    assert_eq!(stack.address(), Some(PREFERRED));
    tx.clear();
    app.clear();
    stack
}

fn claim(name: IsoName, address: u8) -> CanFrame {
    build_address_claim_frame(name, address).unwrap()
}

fn vereg_frame(source: u8, destination: u8, payload: &[u8]) -> CanFrame {
    let id = CanId::builder(PGN_SINGLE_FRAME, source)
        .to_destination(destination)
        .with_priority(6)
        .build()
        .unwrap();
    CanFrame::new(id, payload).unwrap()
}

//==================================================================================RECORDER
#[derive(Debug, Clone, Copy, PartialEq)]
enum Seen {
    Initialized,
    AddressClaimed(u8),
    AddressLost(u8),
    CannotClaim,
    DeviceClaimed(IsoName, u8),
    DeviceLost(IsoName, u8),
    Frame(u32),
    Message(IdFields, usize),
    Register(RegisterEvent),
    Tick,
}

/// Application recording every notification and accepting every write.
struct Recorder {
    seen: [Option<Seen>; 32],
    count: usize,
    writes: usize,
    last_write: Option<(u8, u16, Variant)>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            seen: [None; 32],
            count: 0,
            writes: 0,
            last_write: None,
        }
    }

    fn clear(&mut self) {
        *self = Self::new();
    }

    fn saw(&self, event: Seen) -> bool {
        self.seen.iter().flatten().any(|seen| *seen == event)
    }

    fn count_of(&self, matches: fn(&Seen) -> bool) -> usize {
        self.seen.iter().flatten().filter(|seen| matches(seen)).count()
    }
}

impl RegisterHandler for Recorder {
    fn handle_register(&mut self, command: RegisterCommand<'_>) -> RegisterReply {
        match command.kind {
            CommandKind::Write => {
                self.writes += 1;
                self.last_write = Some((command.source, command.register.id, command.value));
                RegisterReply::ack(AckCode::Ok)
            }
            CommandKind::Read => RegisterReply::ok(Variant::Un8(3)),
        }
    }
}

impl StackObserver for Recorder {
    fn on_event(&mut self, event: StackEvent<'_>) {
        let seen = match event {
            StackEvent::Initialized => Seen::Initialized,
            StackEvent::AddressClaimed { address } => Seen::AddressClaimed(address),
            StackEvent::AddressLost { address } => Seen::AddressLost(address),
            StackEvent::CannotClaim => Seen::CannotClaim,
            StackEvent::DeviceClaimed { name, address } => Seen::DeviceClaimed(name, address),
            StackEvent::DeviceLost { name, address } => Seen::DeviceLost(name, address),
            StackEvent::FrameReceived { frame } => Seen::Frame(frame.id.pgn()),
            StackEvent::MessageReceived { header, payload } => {
                Seen::Message(header, payload.len())
            }
            StackEvent::Register(event) => Seen::Register(event),
            StackEvent::Tick { .. } => Seen::Tick,
        };
        if self.count < self.seen.len() {
            self.seen[self.count] = Some(seen);
            self.count += 1;
        }
    }
}

//==================================================================================CLAIM
#[test]
fn test_init_claims_then_discovers() {
    let tx = FrameQueue::<32>::new();
    let mut app = Recorder::new();
    let mut stack = new_stack(&tx);

    stack.init(at(0), &mut app);
    assert!(app.saw(Seen::Initialized));
    let claim = tx.pop().unwrap();
    assert_eq!(claim.id.source_address(), PREFERRED);
    assert_eq!(extract_name_from_claim(&claim), Ok(own_name()));

    stack.tick(at(100), &mut app);
    assert_eq!(stack.address(), None);
    assert!(tx.is_empty());

    stack.tick(at(250), &mut app);
    assert_eq!(stack.address(), Some(PREFERRED));
    assert_eq!(stack.claim_state(), ClaimState::Claimed { address: PREFERRED });
    assert!(app.saw(Seen::AddressClaimed(PREFERRED)));
    assert!(app.saw(Seen::Tick));

    // Claiming is followed by a global request for every Address Claim.
    assert_eq!(tx.pop(), Some(build_discovery_frame(PREFERRED).unwrap()));
    assert!(tx.is_empty());
}

#[test]
fn test_address_lost_to_lower_name() {
    let tx = FrameQueue::<32>::new();
    let mut app = Recorder::new();
    let mut stack = claimed_stack(&tx, &mut app);
    let winner = name(1, false);

    stack.handle_frame(&claim(winner, PREFERRED), at(400), &mut app);
    assert!(app.saw(Seen::AddressLost(PREFERRED)));
    assert_eq!(stack.address(), None);
    assert!(app.saw(Seen::DeviceClaimed(winner, PREFERRED)));
    assert_eq!(stack.resolve(winner), Some(PREFERRED));

    // Arbitrary address capable: the next candidate is claimed right away.
    let reclaim = tx.pop().unwrap();
    assert_eq!(reclaim.id.source_address(), 128);
    stack.tick(at(700), &mut app);
    assert_eq!(stack.address(), Some(128));
}

#[test]
fn test_address_defended() {
    let tx = FrameQueue::<32>::new();
    let mut app = Recorder::new();
    let mut stack = claimed_stack(&tx, &mut app);
    let loser = name(500, true);

    stack.handle_frame(&claim(loser, PREFERRED), at(400), &mut app);
    assert_eq!(stack.address(), Some(PREFERRED));
    assert_eq!(tx.pop(), Some(claim(own_name(), PREFERRED)));
    // The loser moves away; it is not recorded at our address.
    assert_eq!(stack.devices().by_nad(PREFERRED), None);
    assert_eq!(app.count_of(|seen| matches!(seen, Seen::AddressLost(_))), 0);
}

#[test]
fn test_iso_request_answered() {
    let tx = FrameQueue::<32>::new();
    let mut app = Recorder::new();
    let mut stack = claimed_stack(&tx, &mut app);

    let request = build_iso_request_frame(PEER, GLOBAL_ADDRESS, PGN_ADDRESS_CLAIM).unwrap();
    stack.handle_frame(&request, at(400), &mut app);
    assert_eq!(tx.pop(), Some(claim(own_name(), PREFERRED)));

    // Requests addressed to another node are not ours to answer.
    let other = build_iso_request_frame(PEER, 0x33, PGN_ADDRESS_CLAIM).unwrap();
    stack.handle_frame(&other, at(400), &mut app);
    assert!(tx.is_empty());
}

//==================================================================================DEVICES
#[test]
fn test_claims_populate_registry() {
    let tx = FrameQueue::<32>::new();
    let mut app = Recorder::new();
    let mut stack = claimed_stack(&tx, &mut app);
    let first = name(7, true);
    let second = name(8, true);

    stack.handle_frame(&claim(first, PEER), at(400), &mut app);
    assert!(app.saw(Seen::DeviceClaimed(first, PEER)));
    let by_name = stack.devices().by_name(first).unwrap();
    let by_nad = stack.devices().by_nad(PEER).unwrap();
    assert_eq!(by_name, by_nad);

    // Repeated claim: nothing new to report.
    stack.handle_frame(&claim(first, PEER), at(410), &mut app);
    assert_eq!(
        app.count_of(|seen| matches!(seen, Seen::DeviceClaimed(..))),
        1
    );

    // Another NAME takes the address.
    stack.handle_frame(&claim(second, PEER), at(420), &mut app);
    assert!(app.saw(Seen::DeviceLost(first, PEER)));
    assert!(app.saw(Seen::DeviceClaimed(second, PEER)));
    assert_eq!(stack.devices().by_nad(PEER).unwrap().name(), second);
    assert_eq!(stack.resolve(first), None);
    assert_eq!(stack.devices().len(), 2);
}

#[test]
fn test_cannot_claim_invalidates_device() {
    let tx = FrameQueue::<32>::new();
    let mut app = Recorder::new();
    let mut stack = claimed_stack(&tx, &mut app);
    let device = name(7, false);

    stack.handle_frame(&claim(device, PEER), at(400), &mut app);
    stack.handle_frame(&claim(device, NULL_ADDRESS), at(410), &mut app);
    assert!(app.saw(Seen::DeviceLost(device, PEER)));
    assert!(stack.devices().by_nad(PEER).is_none());
    assert!(stack.devices().by_name(device).is_some());
}

#[test]
fn test_unknown_source_asked_once() {
    let tx = FrameQueue::<32>::new();
    let mut app = Recorder::new();
    let mut stack = claimed_stack(&tx, &mut app);
    let id = CanId::builder(127_508, PEER).build().unwrap();
    let frame = CanFrame::new(id, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

    stack.handle_frame(&frame, at(400), &mut app);
    let request = tx.pop().unwrap();
    assert_eq!(request.id.pgn(), PGN_ISO_REQUEST);
    assert_eq!(request.id.destination(), Some(PEER));
    assert_eq!(parse_iso_request(&request), Some(PGN_ADDRESS_CLAIM));

    stack.handle_frame(&frame, at(410), &mut app);
    assert!(tx.is_empty());

    // Its claim answers the question.
    stack.handle_frame(&claim(name(9, true), PEER), at(420), &mut app);
    stack.handle_frame(&frame, at(430), &mut app);
    assert!(tx.is_empty());
    assert_eq!(app.count_of(|seen| matches!(seen, Seen::Frame(127_508))), 3);
}

//==================================================================================ROUTING
#[test]
fn test_frames_for_other_nodes_dropped() {
    let tx = FrameQueue::<32>::new();
    let mut app = Recorder::new();
    let mut stack = claimed_stack(&tx, &mut app);
    stack.handle_frame(&claim(name(7, true), PEER), at(400), &mut app);
    app.clear();

    let frame = vereg_frame(PEER, 0x33, &[0x66, 0x99, 0xC0, 0x0E, 1]);
    stack.handle_frame(&frame, at(410), &mut app);
    assert_eq!(app.count, 0);
    assert_eq!(app.writes, 0);
    assert!(tx.is_empty());
}

#[test]
fn test_single_frame_register_write() {
    let tx = FrameQueue::<32>::new();
    let mut app = Recorder::new();
    let mut stack = claimed_stack(&tx, &mut app);
    stack.handle_frame(&claim(name(7, true), PEER), at(400), &mut app);

    let frame = vereg_frame(PEER, PREFERRED, &[0x66, 0x99, 0xC0, 0x0E, 2]);
    stack.handle_frame(&frame, at(410), &mut app);
    assert_eq!(app.last_write, Some((PEER, REG_MODE, Variant::Un8(2))));

    let ack = tx.pop().unwrap();
    assert_eq!(ack.id.pgn(), PGN_SINGLE_FRAME);
    assert_eq!(ack.id.destination(), Some(PEER));
    assert_eq!(ack.id.source_address(), PREFERRED);
    assert_eq!(ack.payload(), &[0x66, 0x99, 0x01, 0x02, 0xC0, 0x0E, 0, 0]);
}

#[test]
/// A write split over several frames is reassembled before reaching the engine.
fn test_fast_packet_register_write() {
    let tx = FrameQueue::<32>::new();
    let mut app = Recorder::new();
    let mut stack = claimed_stack(&tx, &mut app);
    stack.handle_frame(&claim(name(7, true), PEER), at(400), &mut app);
    app.clear();

    let mut payload = [0u8; 24];
    payload[..4].copy_from_slice(&[0x66, 0x99, 0x0A, 0x01]);
    payload[4..].copy_from_slice(b"BlueSolar MPPT 75/15");
    let frames = FastPacketBuilder::new(PGN_FAST_PACKET, PEER, Some(PREFERRED), &payload)
        .build()
        .unwrap();
    for frame in frames {
        stack.handle_frame(&frame, at(410), &mut app);
    }

    assert_eq!(app.writes, 1);
    assert_eq!(
        app.last_write,
        Some((
            PEER,
            REG_MODEL,
            Variant::bytes(b"BlueSolar MPPT 75/15").unwrap()
        ))
    );
    assert_eq!(app.count_of(|seen| matches!(seen, Seen::Frame(_))), 4);
    assert_eq!(app.count_of(|seen| matches!(seen, Seen::Message(_, 24))), 1);
    assert_eq!(
        tx.pop().unwrap().payload(),
        &[0x66, 0x99, 0x01, 0x02, 0x0A, 0x01, 0, 0]
    );
}

#[test]
fn test_register_read_through_stack() {
    let tx = FrameQueue::<32>::new();
    let mut app = Recorder::new();
    let mut stack = claimed_stack(&tx, &mut app);
    stack.handle_frame(&claim(name(7, true), PEER), at(400), &mut app);

    stack.request_register(PEER, REG_MODE).unwrap();
    assert_eq!(
        tx.pop().unwrap().payload(),
        &[0x66, 0x99, 0x00, 0x02, 0xC0, 0x0E]
    );

    let reply = vereg_frame(PEER, PREFERRED, &[0x66, 0x99, 0xC0, 0x0E, 5]);
    stack.handle_frame(&reply, at(410), &mut app);
    assert!(app.saw(Seen::Register(RegisterEvent::Value {
        source: PEER,
        register: REG_MODE,
        value: Variant::Un8(5),
    })));
    // A value we asked for is not a write.
    assert_eq!(app.writes, 0);
    assert!(tx.is_empty());
}

#[test]
fn test_send_requires_address() {
    let tx = FrameQueue::<32>::new();
    let mut stack = new_stack(&tx);
    assert_eq!(
        stack.send_message(127_508, 6, None, &[0; 8]),
        Err(StackError::NoAddress)
    );
    assert_eq!(stack.request_discovery(), Err(StackError::NoAddress));
    assert!(stack.prepare_request(PEER, 0, REG_MODE).is_none());
    assert!(stack.send_register(PEER, REG_MODE, &Variant::Un8(1)).is_err());
}

#[test]
fn test_prepared_request_sent() {
    let tx = FrameQueue::<32>::new();
    let mut app = Recorder::new();
    let mut stack = claimed_stack(&tx, &mut app);

    let mut message = stack.prepare_request(PEER, 1, REG_MODEL).unwrap();
    message
        .push(&Variant::bytes(b"Phoenix Inverter 12V").unwrap())
        .unwrap();
    stack.send_prepared(&message).unwrap();
    // 24 bytes: one first frame and three continuation frames.
    assert_eq!(tx.len(), 4);
    assert_eq!(tx.pop().unwrap().id.pgn(), PGN_FAST_PACKET);
}

#[test]
fn test_poll_drains_rx() {
    let tx = FrameQueue::<32>::new();
    let rx = FrameQueue::<8>::new();
    let mut app = Recorder::new();
    let mut stack = claimed_stack(&tx, &mut app);

    rx.try_push(claim(name(7, true), PEER)).unwrap();
    rx.try_push(claim(name(8, true), PEER + 1)).unwrap();
    assert_eq!(stack.poll(&rx, at(400), &mut app), 2);
    assert!(rx.is_empty());
    assert_eq!(stack.devices().len(), 2);
    assert!(app.saw(Seen::Tick));
}

//==================================================================================MANAGER
#[test]
fn test_manager_selects_instances() {
    let mut manager = StackManager::new([10u8, 20, 30]);
    assert_eq!(*manager.active(), 10);
    manager.set_active(2).unwrap();
    assert_eq!(manager.active_index(), 2);
    *manager.active_mut() += 1;
    assert_eq!(manager.get(2), Ok(&31));
    assert_eq!(
        manager.get(3),
        Err(StackError::InstanceOutOfRange {
            index: 3,
            configured: 3
        })
    );
    assert_eq!(manager.iter().count(), 3);
}

#[test]
fn test_single_instance_ignores_selection() {
    let mut manager = StackManager::new([1u8]);
    assert_eq!(manager.set_active(4), Ok(()));
    assert_eq!(manager.active_index(), 0);
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "out of range"))]
fn test_out_of_range_selection() {
    let mut manager = StackManager::new([1u8, 2]);
    assert_eq!(
        manager.set_active(2),
        Err(StackError::InstanceOutOfRange {
            index: 2,
            configured: 2
        })
    );
}
