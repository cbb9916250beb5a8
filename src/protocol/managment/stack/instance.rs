//! A single stack instance: one CAN channel, one claimed address.
//!
//! Frames come in through [`StackInstance::handle_frame`] (or
//! [`poll`](StackInstance::poll) over a receive queue) and time moves forward
//! through [`tick`](StackInstance::tick); everything the instance sends is
//! queued into its [`FrameSink`]. Nothing here blocks or reads a clock.
use embassy_time::Instant;

use super::{StackConfig, StackEvent, StackObserver};
use crate::core::Variant;
use crate::error::{StackError, VeRegError};
use crate::infra::frame_queue::{FrameQueue, FrameSink};
use crate::protocol::managment::address_claiming::{
    extract_name_from_claim, AddressClaimer, ClaimOutcome, ClaimState, PGN_ADDRESS_CLAIM,
};
use crate::protocol::managment::device_registry::DeviceRegistry;
use crate::protocol::managment::iso_name::IsoName;
use crate::protocol::managment::network_discovering::{
    build_discovery_frame, build_iso_request_frame, parse_iso_request, PGN_ISO_REQUEST,
};
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::{IdFields, GLOBAL_ADDRESS, NULL_ADDRESS};
use crate::protocol::transport::fast_packet::assembler::{FastPacketAssembler, ProcessResult};
use crate::protocol::transport::pgn_sender::PgnSender;
use crate::protocol::vereg::engine::VeRegEngine;
use crate::protocol::vereg::{OutgoingMessage, PGN_FAST_PACKET, PGN_SINGLE_FRAME};

/// One J1939 node: address claim, device list, Fast Packet sessions and the
/// VE.Reg engine, sending through `T`.
///
/// `S` is the per-device application state stored in the registry.
pub struct StackInstance<T: FrameSink, S = (), const DEVICES: usize = 16, const SESSIONS: usize = 4>
{
    config: StackConfig,
    tx: T,
    claimer: AddressClaimer,
    registry: DeviceRegistry<S, DEVICES>,
    assembler: FastPacketAssembler<SESSIONS>,
    engine: VeRegEngine,
    sender: PgnSender,
    /// Addresses already asked for their NAME, one bit each.
    requested: [u32; 8],
}

impl<T, S, const DEVICES: usize, const SESSIONS: usize> StackInstance<T, S, DEVICES, SESSIONS>
where
    T: FrameSink,
    S: Default,
{
    /// Create an idle instance; nothing is sent before [`init`](Self::init).
    pub fn new(config: StackConfig, tx: T) -> Self {
        Self {
            config,
            tx,
            claimer: AddressClaimer::new(config.name, config.preferred_address, config.claim_window),
            registry: DeviceRegistry::new(),
            assembler: FastPacketAssembler::new(config.reassembly_timeout),
            engine: VeRegEngine::new(config.registers),
            sender: PgnSender::new(),
            requested: [0; 8],
        }
    }

    //==================================================================================ACCESSORS
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Local NAME.
    pub fn name(&self) -> IsoName {
        self.config.name
    }

    /// Claimed address, `None` while claiming or after losing every candidate.
    pub fn address(&self) -> Option<u8> {
        self.claimer.address()
    }

    pub fn claim_state(&self) -> ClaimState {
        self.claimer.state()
    }

    /// Functional devices seen on this channel.
    pub fn devices(&self) -> &DeviceRegistry<S, DEVICES> {
        &self.registry
    }

    /// Mutable access to the per-device application state.
    pub fn devices_mut(&mut self) -> &mut DeviceRegistry<S, DEVICES> {
        &mut self.registry
    }

    /// Current address of the device named `name`.
    pub fn resolve(&self, name: IsoName) -> Option<u8> {
        self.registry.by_name(name).and_then(|device| device.nad())
    }

    /// VE.Reg answers that could not be sent and were given up on.
    pub fn dropped_responses(&self) -> u32 {
        self.engine.dropped_responses()
    }

    /// Transmit side, for drivers draining the queue.
    pub fn tx(&self) -> &T {
        &self.tx
    }

    //==================================================================================LIFECYCLE
    /// Start claiming the preferred address.
    pub fn init<A: StackObserver>(&mut self, now: Instant, app: &mut A) {
        self.registry.invalidate_all();
        self.requested = [0; 8];
        self.engine.reset();
        self.claimer.start(&self.tx, now);
        app.on_event(StackEvent::Initialized);
    }

    /// Periodic step: closes the claim window, discards stale Fast Packet
    /// sessions and retries deferred VE.Reg answers.
    pub fn tick<A: StackObserver>(&mut self, now: Instant, app: &mut A) {
        if let Some(address) = self.claimer.tick(&self.tx, now) {
            app.on_event(StackEvent::AddressClaimed { address });
            if let Err(_err) = self.request_discovery() {
                #[cfg(feature = "defmt")]
                defmt::debug!("discovery postponed: {}", defmt::Debug2Format(&_err));
            }
        }

        let expired = self.assembler.expire(now);
        if expired > 0 {
            #[cfg(feature = "defmt")]
            defmt::debug!("{} fast packet sessions expired", expired);
        }

        let own = self.address();
        self.engine.tick(&self.tx, &mut self.sender, own);
        app.on_event(StackEvent::Tick { now });
    }

    /// Drain `rx`, then tick. Returns the number of frames processed.
    pub fn poll<const N: usize, A: StackObserver>(
        &mut self,
        rx: &FrameQueue<N>,
        now: Instant,
        app: &mut A,
    ) -> usize {
        let mut processed = 0;
        while let Some(frame) = rx.pop() {
            self.handle_frame(&frame, now, app);
            processed += 1;
        }
        self.tick(now, app);
        processed
    }

    //==================================================================================INCOMING
    /// Route one received frame.
    ///
    /// Network management frames feed the claimer and the device list; other
    /// frames addressed to us or broadcast are reassembled when needed and
    /// delivered, VE.Reg traffic going through the register engine.
    pub fn handle_frame<A: StackObserver>(&mut self, frame: &CanFrame, now: Instant, app: &mut A) {
        let header = IdFields::from(frame.id);
        match header.pgn {
            PGN_ADDRESS_CLAIM => return self.handle_claim(frame, now, app),
            PGN_ISO_REQUEST => {
                let for_us = self
                    .claimer
                    .announced_address()
                    .map_or(frame.id.is_for(GLOBAL_ADDRESS), |own| frame.id.is_for(own));
                if for_us && parse_iso_request(frame) == Some(PGN_ADDRESS_CLAIM) {
                    self.claimer.answer_request(&self.tx);
                }
                return;
            }
            _ => {}
        }

        let accepted = match self.address() {
            Some(own) => frame.id.is_for(own),
            None => matches!(header.destination, None | Some(GLOBAL_ADDRESS)),
        };
        if !accepted {
            return;
        }

        self.learn(header.source);
        app.on_event(StackEvent::FrameReceived { frame });

        if !self.config.is_fast_packet(header.pgn) {
            return self.deliver(header, frame.payload(), app);
        }
        match self
            .assembler
            .process_frame(header.source, header.pgn, frame.payload(), now)
        {
            ProcessResult::MessageComplete(message) => {
                self.deliver(header, message.payload.as_slice(), app)
            }
            ProcessResult::FragmentConsumed | ProcessResult::Ignored => {}
        }
    }

    fn deliver<A: StackObserver>(&mut self, header: IdFields, payload: &[u8], app: &mut A) {
        app.on_event(StackEvent::MessageReceived { header, payload });

        let vereg = header.pgn == PGN_SINGLE_FRAME || header.pgn == PGN_FAST_PACKET;
        let (Some(own), true) = (self.address(), vereg) else {
            return;
        };
        if header.destination != Some(own) {
            return;
        }
        if let Some(event) =
            self.engine
                .handle_incoming(&self.tx, &mut self.sender, own, header.source, payload, app)
        {
            app.on_event(StackEvent::Register(event));
        }
    }

    fn handle_claim<A: StackObserver>(&mut self, frame: &CanFrame, now: Instant, app: &mut A) {
        let outcome = self.claimer.handle_claim(&self.tx, frame, now);
        if let ClaimOutcome::Yielded { lost } = outcome {
            self.engine.reset();
            if let Some(address) = lost {
                app.on_event(StackEvent::AddressLost { address });
            }
            if self.claimer.state() == ClaimState::CannotClaim {
                app.on_event(StackEvent::CannotClaim);
            }
        }

        let Ok(name) = extract_name_from_claim(frame) else {
            return;
        };
        if name == self.config.name {
            return;
        }
        let source = frame.id.source_address();
        self.forget_request(source);

        // "Cannot claim" from the null address: the device has no address now.
        if source == NULL_ADDRESS {
            if let Some(address) = self.resolve(name) {
                self.registry.invalidate_nad(address);
                app.on_event(StackEvent::DeviceLost { name, address });
            }
            return;
        }
        // The claimant lost against us and moves elsewhere.
        if outcome == ClaimOutcome::Defended {
            return;
        }

        let previous = match self.registry.alloc(name) {
            Ok(device) => device.nad(),
            Err(_err) => {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "device {=u64:#X} not tracked: {}",
                    name.raw(),
                    defmt::Debug2Format(&_err)
                );
                return;
            }
        };
        if previous == Some(source) {
            return;
        }
        if let Ok(Some(displaced)) = self.registry.assign_nad(name, source) {
            app.on_event(StackEvent::DeviceLost {
                name: displaced,
                address: source,
            });
        }
        #[cfg(feature = "defmt")]
        defmt::info!("device {=u64:#X} at {}", name.raw(), source);
        app.on_event(StackEvent::DeviceClaimed {
            name,
            address: source,
        });
    }

    /// Ask an unknown source for its NAME, once per address.
    fn learn(&mut self, source: u8) {
        let Some(own) = self.address() else {
            return;
        };
        if source >= NULL_ADDRESS
            || self.registry.by_nad(source).is_some()
            || self.is_requested(source)
        {
            return;
        }
        let Ok(frame) = build_iso_request_frame(own, source, PGN_ADDRESS_CLAIM) else {
            return;
        };
        if self.tx.try_push(frame).is_ok() {
            #[cfg(feature = "defmt")]
            defmt::debug!("asking {} for its NAME", source);
            self.requested[(source / 32) as usize] |= 1 << (source % 32);
        }
    }

    fn is_requested(&self, source: u8) -> bool {
        self.requested[(source / 32) as usize] & (1 << (source % 32)) != 0
    }

    fn forget_request(&mut self, source: u8) {
        self.requested[(source / 32) as usize] &= !(1 << (source % 32));
    }

    //==================================================================================OUTGOING
    /// Broadcast an ISO Request for every node's Address Claim.
    pub fn request_discovery(&mut self) -> Result<(), StackError> {
        let own = self.address().ok_or(StackError::NoAddress)?;
        let frame = build_discovery_frame(own)?;
        self.tx.try_push(frame)?;
        Ok(())
    }

    /// Send an application message from our address.
    ///
    /// Fast Packet framing is used for the configured Fast Packet PGNs.
    pub fn send_message(
        &mut self,
        pgn: u32,
        priority: u8,
        destination: Option<u8>,
        payload: &[u8],
    ) -> Result<(), StackError> {
        let source = self.address().ok_or(StackError::NoAddress)?;
        let header = IdFields {
            priority,
            pgn,
            source,
            destination,
        };
        self.sender
            .send(&self.tx, &header, self.config.is_fast_packet(pgn), payload)
    }

    /// Open a VE.Reg message; `None` until we have an address and transmit room.
    pub fn prepare_request(
        &self,
        target: u8,
        data_page: u8,
        register: u16,
    ) -> Option<OutgoingMessage> {
        self.engine
            .prepare_request(&self.tx, self.address(), target, data_page, register)
    }

    /// Send a message obtained from [`prepare_request`](Self::prepare_request).
    pub fn send_prepared(&mut self, message: &OutgoingMessage) -> Result<(), StackError> {
        let source = self.address().ok_or(StackError::NoAddress)?;
        self.engine.send(&self.tx, &mut self.sender, source, message)
    }

    /// Write `value` into `register` of the node at `target`.
    pub fn send_register(
        &mut self,
        target: u8,
        register: u16,
        value: &Variant,
    ) -> Result<(), VeRegError> {
        let source = self.address();
        self.engine
            .send_register(&self.tx, &mut self.sender, source, target, register, value)
    }

    /// Ask the node at `target` for `register`; the value comes back as a
    /// [`StackEvent::Register`].
    pub fn request_register(&mut self, target: u8, register: u16) -> Result<(), VeRegError> {
        let source = self.address();
        self.engine
            .request_register(&self.tx, &mut self.sender, source, target, register)
    }
}
