/// Test doubles: an in-memory CAN bus, a tokio-backed timer and an
/// application recording what the stack reports.
use n2k_vereg::core::Variant;
use n2k_vereg::protocol::managment::iso_name::IsoName;
use n2k_vereg::protocol::managment::stack::{StackEvent, StackObserver};
use n2k_vereg::protocol::transport::{
    can_frame::CanFrame,
    traits::{bridge_timer::BridgeTimer, can_bus::CanBus},
};
use n2k_vereg::protocol::vereg::engine::RegisterEvent;
use n2k_vereg::protocol::vereg::register::{
    CommandKind, RegisterCommand, RegisterHandler, RegisterReply,
};
use n2k_vereg::protocol::vereg::AckCode;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration};

#[derive(Clone)]
#[allow(dead_code)]
/// In-memory CAN bus reproducing the `CanBus` trait behavior.
pub struct MockCanBus {
    tx: mpsc::UnboundedSender<CanFrame>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<CanFrame>>>,
}

#[allow(dead_code)]
impl MockCanBus {
    /// Construct a pair of interconnected buses (DUT ↔ host).
    pub fn create_pair() -> (Self, Self) {
        let (dut_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, dut_rx) = mpsc::unbounded_channel();

        let dut_bus = Self {
            tx: dut_tx,
            rx: Arc::new(Mutex::new(dut_rx)),
        };

        let host_bus = Self {
            tx: host_tx,
            rx: Arc::new(Mutex::new(host_rx)),
        };

        (dut_bus, host_bus)
    }
}

impl CanBus for MockCanBus {
    type Error = ();

    async fn send<'a>(&'a mut self, frame: &'a CanFrame) -> Result<(), Self::Error> {
        self.tx.send(*frame).map_err(|_| ())?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<CanFrame, Self::Error> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(())
    }
}

#[allow(dead_code)]
/// Timer based on `tokio::time::sleep` to drive delays in tests.
pub struct MockTimer;

impl BridgeTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}

#[allow(dead_code)]
/// Owned copy of a [`StackEvent`], kept after the borrowed data is gone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Seen {
    Initialized,
    AddressClaimed(u8),
    AddressLost(u8),
    CannotClaim,
    DeviceClaimed(IsoName, u8),
    DeviceLost(IsoName, u8),
    Frame,
    Message { pgn: u32, len: usize },
    Register(RegisterEvent),
    Tick,
}

#[allow(dead_code)]
/// Application keeping one register value and recording everything.
pub struct RecordingApp {
    pub events: Vec<Seen>,
    pub commands: Vec<(CommandKind, u8, u16, Variant)>,
    /// Value served on reads and replaced by writes.
    pub value: Variant,
    /// Code returned for every command.
    pub ack: AckCode,
}

#[allow(dead_code)]
impl RecordingApp {
    pub fn new(value: Variant) -> Self {
        Self {
            events: Vec::new(),
            commands: Vec::new(),
            value,
            ack: AckCode::Ok,
        }
    }

    pub fn saw(&self, event: Seen) -> bool {
        self.events.contains(&event)
    }

    pub fn register_events(&self) -> Vec<RegisterEvent> {
        self.events
            .iter()
            .filter_map(|seen| match seen {
                Seen::Register(event) => Some(*event),
                _ => None,
            })
            .collect()
    }
}

impl RegisterHandler for RecordingApp {
    fn handle_register(&mut self, command: RegisterCommand<'_>) -> RegisterReply {
        self.commands.push((
            command.kind,
            command.source,
            command.register.id,
            command.value,
        ));
        if self.ack != AckCode::Ok {
            return RegisterReply::ack(self.ack);
        }
        match command.kind {
            CommandKind::Read => RegisterReply::ok(self.value),
            CommandKind::Write => {
                self.value = command.value;
                RegisterReply::ack(AckCode::Ok)
            }
        }
    }
}

impl StackObserver for RecordingApp {
    fn on_event(&mut self, event: StackEvent<'_>) {
        self.events.push(match event {
            StackEvent::Initialized => Seen::Initialized,
            StackEvent::AddressClaimed { address } => Seen::AddressClaimed(address),
            StackEvent::AddressLost { address } => Seen::AddressLost(address),
            StackEvent::CannotClaim => Seen::CannotClaim,
            StackEvent::DeviceClaimed { name, address } => Seen::DeviceClaimed(name, address),
            StackEvent::DeviceLost { name, address } => Seen::DeviceLost(name, address),
            StackEvent::FrameReceived { .. } => Seen::Frame,
            StackEvent::MessageReceived { header, payload } => Seen::Message {
                pgn: header.pgn,
                len: payload.len(),
            },
            StackEvent::Register(event) => Seen::Register(event),
            StackEvent::Tick { .. } => Seen::Tick,
        });
    }
}

#[allow(dead_code)]
/// NAME of a marine, arbitrary address capable test node.
pub fn test_name(unique: u32) -> IsoName {
    IsoName::builder()
        .unique_number(unique)
        .manufacturer_code(358)
        .industry_group(4)
        .arbitrary_address_capable(true)
        .build()
}
