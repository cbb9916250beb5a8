//! SAE J1939 / NMEA 2000 address-claim algorithm:
//! emit PGN 60928, listen for conflicts, and fall back to alternative addresses when needed.
//!
//! The claimer never waits. It queues frames into a [`FrameSink`] and is moved
//! forward by incoming claims and by the periodic tick; a claim that survives
//! the veto window without a winning objection becomes our address.
use embassy_time::{Duration, Instant};

use crate::error::{CanIdBuildError, ExtractionError};
use crate::infra::frame_queue::FrameSink;
use crate::protocol::managment::iso_name::IsoName;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::{CanId, GLOBAL_ADDRESS, NULL_ADDRESS};

/// Address Claim parameter group.
pub const PGN_ADDRESS_CLAIM: u32 = 60928;
/// Default veto window after a claim.
pub const DEFAULT_CLAIM_WINDOW: Duration = Duration::from_millis(250);

//==================================================================================CLAIM_STATE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Progress of the local address claim.
pub enum ClaimState {
    /// Nothing claimed yet.
    Idle,
    /// Claim sent, waiting for the veto window to elapse.
    Claiming { address: u8, deadline: Instant },
    /// The address is ours.
    Claimed { address: u8 },
    /// Every candidate was lost; we announced ourselves from the null address.
    CannotClaim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Effect of a foreign claim on our own.
pub enum ClaimOutcome {
    /// The claim does not concern our address.
    Unaffected,
    /// Our NAME wins; the claim was repeated.
    Defended,
    /// Our NAME loses. `lost` holds the address when it had been fully claimed.
    Yielded { lost: Option<u8> },
}

//==================================================================================ADDRESS_CLAIMER
/// Tick-driven claim state machine for one stack instance.
#[derive(Debug)]
pub struct AddressClaimer {
    name: IsoName,
    preferred: u8,
    window: Duration,
    candidates: AddressClaimIterator,
    state: ClaimState,
    pending: Option<CanFrame>,
}

impl AddressClaimer {
    /// Prepare a claimer for `name`, starting at `preferred`.
    pub fn new(name: IsoName, preferred: u8, window: Duration) -> Self {
        Self {
            name,
            preferred,
            window,
            candidates: AddressClaimIterator::new(
                preferred,
                name.is_arbitrary_address_capable(),
            ),
            state: ClaimState::Idle,
            pending: None,
        }
    }

    /// Local NAME.
    pub fn name(&self) -> IsoName {
        self.name
    }

    /// Current claim progress.
    pub fn state(&self) -> ClaimState {
        self.state
    }

    /// Address we may transmit from, once the veto window is over.
    pub fn address(&self) -> Option<u8> {
        match self.state {
            ClaimState::Claimed { address } => Some(address),
            _ => None,
        }
    }

    /// Address our claim currently announces, claimed or not.
    pub fn announced_address(&self) -> Option<u8> {
        match self.state {
            ClaimState::Claiming { address, .. } | ClaimState::Claimed { address } => {
                Some(address)
            }
            _ => None,
        }
    }

    /// (Re)start the procedure from the preferred address.
    pub fn start<T: FrameSink>(&mut self, tx: &T, now: Instant) {
        self.candidates =
            AddressClaimIterator::new(self.preferred, self.name.is_arbitrary_address_capable());
        self.claim_next(tx, now);
    }

    /// Flush a claim that could not be queued and close the veto window.
    ///
    /// Returns the address when it has just been acquired.
    pub fn tick<T: FrameSink>(&mut self, tx: &T, now: Instant) -> Option<u8> {
        if let Some(frame) = self.pending {
            if tx.try_push(frame).is_ok() {
                self.pending = None;
            }
        }
        match self.state {
            // The window only runs once the claim is actually on its way.
            ClaimState::Claiming { address, deadline }
                if self.pending.is_none() && now >= deadline =>
            {
                #[cfg(feature = "defmt")]
                defmt::info!("address {} claimed", address);
                self.state = ClaimState::Claimed { address };
                Some(address)
            }
            _ => None,
        }
    }

    /// React to an Address Claim frame received from another node.
    pub fn handle_claim<T: FrameSink>(
        &mut self,
        tx: &T,
        frame: &CanFrame,
        now: Instant,
    ) -> ClaimOutcome {
        let Some(address) = self.announced_address() else {
            return ClaimOutcome::Unaffected;
        };
        if !is_conflicting_claim(frame, address, self.name) {
            return ClaimOutcome::Unaffected;
        }
        let Ok(their_name) = extract_name_from_claim(frame) else {
            return ClaimOutcome::Unaffected;
        };

        if self.name.has_priority_over(their_name) {
            #[cfg(feature = "defmt")]
            defmt::info!("defending address {}", address);
            self.send_claim(tx, address);
            return ClaimOutcome::Defended;
        }

        #[cfg(feature = "defmt")]
        defmt::warn!("address {} lost to {=u64:#X}", address, their_name.raw());
        let lost = self.address();
        self.claim_next(tx, now);
        ClaimOutcome::Yielded { lost }
    }

    /// Answer a request for the Address Claim group.
    pub fn answer_request<T: FrameSink>(&mut self, tx: &T) {
        match self.state {
            ClaimState::Claiming { address, .. } | ClaimState::Claimed { address } => {
                self.send_claim(tx, address)
            }
            ClaimState::CannotClaim => self.send_claim(tx, NULL_ADDRESS),
            ClaimState::Idle => {}
        }
    }

    fn claim_next<T: FrameSink>(&mut self, tx: &T, now: Instant) {
        match self.candidates.next() {
            Some(address) => {
                #[cfg(feature = "defmt")]
                defmt::info!("trying to claim address {}", address);
                self.state = ClaimState::Claiming {
                    address,
                    deadline: now.checked_add(self.window).unwrap_or(Instant::MAX),
                };
                self.send_claim(tx, address);
            }
            None => {
                #[cfg(feature = "defmt")]
                defmt::error!("no address available, sending cannot claim");
                self.state = ClaimState::CannotClaim;
                self.send_claim(tx, NULL_ADDRESS);
            }
        }
    }

    fn send_claim<T: FrameSink>(&mut self, tx: &T, address: u8) {
        // Claim frames to the global address always build.
        let Ok(frame) = build_address_claim_frame(self.name, address) else {
            return;
        };
        if tx.try_push(frame).is_err() {
            #[cfg(feature = "defmt")]
            defmt::debug!("claim frame deferred");
            self.pending = Some(frame);
        }
    }
}

//==================================================================================ADDRESS_CLAIM_ITERATOR
/// Generates candidate addresses following the J1939 rules.
#[derive(Debug, Clone)]
struct AddressClaimIterator {
    preferred: u8,
    next_arbitrary: u16,
    state: AddressClaimState,
    arbitrary_capable: bool,
}

#[derive(Debug, Clone, PartialEq)]
/// Iteration states (preferred address, then AAC range).
enum AddressClaimState {
    TryPreferred,
    TryArbitrary,
    Done,
}

impl AddressClaimIterator {
    /// Prepare the iterator with the preferred address and AAC capability flag.
    fn new(preferred_address: u8, arbitrary_capable: bool) -> Self {
        Self {
            preferred: preferred_address,
            next_arbitrary: 128,
            state: AddressClaimState::TryPreferred,
            arbitrary_capable,
        }
    }
}

impl Iterator for AddressClaimIterator {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                AddressClaimState::TryPreferred => {
                    self.state = if self.arbitrary_capable {
                        AddressClaimState::TryArbitrary
                    } else {
                        // Non-AAC equipment only gets a single attempt.
                        AddressClaimState::Done
                    };

                    if self.preferred <= 247 {
                        return Some(self.preferred);
                    }
                }
                AddressClaimState::TryArbitrary => {
                    // Iterate through the standard 128-247 range.
                    if self.next_arbitrary > 247 {
                        self.state = AddressClaimState::Done;
                        continue;
                    }

                    let addr_to_try = self.next_arbitrary as u8;
                    self.next_arbitrary += 1;

                    // Skip the preferred address (already tested).
                    if addr_to_try == self.preferred {
                        continue;
                    }
                    return Some(addr_to_try);
                }
                AddressClaimState::Done => {
                    return None;
                }
            }
        }
    }
}

//==================================================================================ADDRESS_CLAIM_FRAME
/// Build a claim frame (PGN 60928) for the provided NAME.
///
/// Sent from [`NULL_ADDRESS`] this is the "cannot claim" announcement.
pub fn build_address_claim_frame(
    name: IsoName,
    address_to_claim: u8,
) -> Result<CanFrame, CanIdBuildError> {
    let id = CanId::builder(PGN_ADDRESS_CLAIM, address_to_claim)
        .to_destination(GLOBAL_ADDRESS)
        .with_priority(6)
        .build()?;
    let data = name.to_le_bytes();
    Ok(CanFrame {
        id,
        data,
        len: data.len(),
    })
}

/// Check whether an incoming claim frame conflicts with our current address.
pub fn is_conflicting_claim(
    incoming_frame: &CanFrame,
    my_claimed_address: u8,
    my_name: IsoName,
) -> bool {
    incoming_frame.id.source_address() == my_claimed_address
        && extract_name_from_claim(incoming_frame).is_ok_and(|their_name| their_name != my_name)
}

/// Extracts the NAME from an Address Claim frame (PGN 60928).
pub fn extract_name_from_claim(frame: &CanFrame) -> Result<IsoName, ExtractionError> {
    if frame.id.pgn() != PGN_ADDRESS_CLAIM {
        return Err(ExtractionError::InvalidIncomingFrame);
    }
    if frame.len != 8usize {
        return Err(ExtractionError::InvalidDataLen);
    }

    Ok(IsoName::from_le_bytes(frame.data))
}
