//! Stack instances: one per CAN channel, each owning its address claim,
//! functional device list, Fast Packet sessions and VE.Reg engine.
//!
//! An instance is driven from the cooperative main loop only. Frames come in
//! through [`StackInstance::handle_frame`] (or [`StackInstance::poll`] over a
//! receive queue), time moves through [`StackInstance::tick`], and everything
//! the application should know about is reported synchronously through its
//! [`StackObserver`].
use embassy_time::{Duration, Instant};

use crate::protocol::managment::address_claiming::DEFAULT_CLAIM_WINDOW;
use crate::protocol::managment::iso_name::IsoName;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::IdFields;
use crate::protocol::transport::fast_packet::DEFAULT_REASSEMBLY_TIMEOUT;
use crate::protocol::vereg::engine::RegisterEvent;
use crate::protocol::vereg::register::{RegisterDescriptor, RegisterHandler};
use crate::protocol::vereg::PGN_FAST_PACKET;

pub mod instance;
pub mod manager;

pub use instance::StackInstance;
pub use manager::StackManager;

/// Parameter groups carried as Fast Packets unless configured otherwise.
pub const DEFAULT_FAST_PACKET_PGNS: &[u32] = &[PGN_FAST_PACKET];

//==================================================================================STACK_CONFIG
/// Static configuration of one stack instance.
///
/// ```rust
/// use embassy_time::Duration;
/// use n2k_vereg::protocol::managment::iso_name::IsoName;
/// use n2k_vereg::protocol::managment::stack::StackConfig;
///
/// const NAME: IsoName = IsoName::builder()
///     .unique_number(0x1234)
///     .manufacturer_code(358)
///     .industry_group(4)
///     .arbitrary_address_capable(true)
///     .build();
///
/// let config = StackConfig::new(NAME, 0x22).with_claim_window(Duration::from_millis(300));
/// assert_eq!(config.preferred_address, 0x22);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StackConfig {
    /// Identity of the local device.
    pub name: IsoName,
    /// First address tried by the claim procedure.
    pub preferred_address: u8,
    /// PGNs reassembled from (and sent as) Fast Packets.
    pub fast_packet_pgns: &'static [u32],
    /// How long a Fast Packet session may stay incomplete.
    pub reassembly_timeout: Duration,
    /// Veto window after each address claim.
    pub claim_window: Duration,
    /// Registers exposed to the bus.
    pub registers: &'static [RegisterDescriptor],
}

impl StackConfig {
    pub const fn new(name: IsoName, preferred_address: u8) -> Self {
        Self {
            name,
            preferred_address,
            fast_packet_pgns: DEFAULT_FAST_PACKET_PGNS,
            reassembly_timeout: DEFAULT_REASSEMBLY_TIMEOUT,
            claim_window: DEFAULT_CLAIM_WINDOW,
            registers: &[],
        }
    }

    pub const fn with_fast_packet_pgns(mut self, pgns: &'static [u32]) -> Self {
        self.fast_packet_pgns = pgns;
        self
    }

    pub const fn with_reassembly_timeout(mut self, timeout: Duration) -> Self {
        self.reassembly_timeout = timeout;
        self
    }

    pub const fn with_claim_window(mut self, window: Duration) -> Self {
        self.claim_window = window;
        self
    }

    pub const fn with_registers(mut self, registers: &'static [RegisterDescriptor]) -> Self {
        self.registers = registers;
        self
    }

    /// Checks whether `pgn` travels as a Fast Packet.
    pub fn is_fast_packet(&self, pgn: u32) -> bool {
        self.fast_packet_pgns.contains(&pgn)
    }
}

//==================================================================================EVENTS
/// Notification raised to the application during a main-loop step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEvent<'a> {
    /// The instance started its address claim.
    Initialized,
    /// Our claim survived the veto window.
    AddressClaimed { address: u8 },
    /// A node with a higher priority NAME took our address.
    AddressLost { address: u8 },
    /// Every candidate address was lost.
    CannotClaim,
    /// A remote device claimed `address`.
    DeviceClaimed { name: IsoName, address: u8 },
    /// A remote device no longer holds `address`; re-resolve it by NAME.
    DeviceLost { name: IsoName, address: u8 },
    /// Raw frame addressed to us or broadcast.
    FrameReceived { frame: &'a CanFrame },
    /// Complete message, reassembled when it came as a Fast Packet.
    MessageReceived {
        header: IdFields,
        payload: &'a [u8],
    },
    /// Answer to one of our register commands.
    Register(RegisterEvent),
    /// Periodic tick processed.
    Tick { now: Instant },
}

/// Application attached to a stack instance.
///
/// Register commands go through [`RegisterHandler`]; every other notification
/// through [`on_event`](Self::on_event), which ignores them by default.
pub trait StackObserver: RegisterHandler {
    fn on_event(&mut self, _event: StackEvent<'_>) {}
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
