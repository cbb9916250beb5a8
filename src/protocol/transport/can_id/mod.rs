//! Creation and extraction of the 29-bit CAN identifiers used by
//! NMEA 2000 (derived from the SAE J1939 specification).
//!
//! Layout: priority (bits 26-28), reserved (bit 25), data page (bit 24),
//! PDU format (bits 16-23), PDU specific (bits 8-15), source (bits 0-7).
//! When the PDU format is below 240 the PDU specific byte is the destination
//! address (PDU1); otherwise it is part of the PGN (PDU2, broadcast).
use crate::error::CanIdBuildError;

/// Address used for broadcast (global) destination.
pub const GLOBAL_ADDRESS: u8 = 0xFF;
/// Source address used by a node that could not claim an address.
pub const NULL_ADDRESS: u8 = 0xFE;
/// Highest PGN representable with the reserved and data page bits.
pub const MAX_PGN: u32 = 0x3_FFFF;

//==================================================================================CAN_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Encapsulates an extended CAN identifier (29 bits) and exposes accessors
/// for priority, PGN, destination, and source.
pub struct CanId(pub u32);

impl CanId {
    /// Creates a pre-configured `CanIdBuilder` for a PGN and source address.
    pub fn builder(pgn: u32, source_address: u8) -> CanIdBuilder {
        CanIdBuilder::new(pgn, source_address)
    }

    /// Encodes decoded fields back into an identifier.
    pub fn from_fields(fields: &IdFields) -> Result<CanId, CanIdBuildError> {
        let builder = CanIdBuilder::new(fields.pgn, fields.source).with_priority(fields.priority);
        match fields.destination {
            Some(destination) => builder.to_destination(destination).build(),
            None => builder.build(),
        }
    }

    /// Returns the priority (3 bits, value 0-7) encoded in the CAN ID.
    pub fn priority(&self) -> u8 {
        ((self.0 >> 26) & 0x07) as u8
    }

    /// Data page bit (0 or 1).
    pub fn data_page(&self) -> u8 {
        ((self.0 >> 24) & 0x01) as u8
    }

    /// PDU format byte.
    pub fn pdu_format(&self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    /// PDU specific byte: destination (PDU1) or group extension (PDU2).
    pub fn pdu_specific(&self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    /// True for addressed (PDU1) identifiers.
    pub fn is_pdu1(&self) -> bool {
        self.pdu_format() < 240
    }

    /// Extracts the 18-bit PGN, handling the PDU1/PDU2 distinction.
    pub fn pgn(&self) -> u32 {
        let ps = self.pdu_specific() as u32;
        let pf = self.pdu_format() as u32;
        let dp = self.data_page() as u32;
        let r = (self.0 >> 25) & 0x01;

        if self.is_pdu1() {
            // PDU1: PS stores the explicit destination.
            (r << 17) | (dp << 16) | (pf << 8)
        } else {
            // PDU2: implicit destination, PS becomes part of the PGN.
            (r << 17) | (dp << 16) | (pf << 8) | ps
        }
    }

    /// Returns the destination address (PDU1) when the PGN requires one.
    pub fn destination(&self) -> Option<u8> {
        if self.is_pdu1() {
            Some(self.pdu_specific())
        } else {
            None
        }
    }

    /// True when a node at `address` must look at this frame.
    pub fn is_for(&self, address: u8) -> bool {
        match self.destination() {
            None | Some(GLOBAL_ADDRESS) => true,
            Some(destination) => destination == address,
        }
    }

    /// Eight-bit source address (logical node identifier on the N2K network).
    pub fn source_address(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

//==================================================================================ID_FIELDS
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Logical view of an identifier.
///
/// `pgn` includes the reserved and data page bits, so decoding then encoding
/// gives back the same raw identifier for every legal combination.
pub struct IdFields {
    pub priority: u8,
    pub pgn: u32,
    pub source: u8,
    /// `Some` for PDU1 groups (including the global address), `None` for PDU2.
    pub destination: Option<u8>,
}

impl IdFields {
    /// Data page bit carried by the PGN.
    pub fn data_page(&self) -> u8 {
        ((self.pgn >> 16) & 0x01) as u8
    }
}

impl From<CanId> for IdFields {
    fn from(id: CanId) -> Self {
        Self {
            priority: id.priority(),
            pgn: id.pgn(),
            source: id.source_address(),
            destination: id.destination(),
        }
    }
}

//==================================================================================CAN_ID_BUILDER
#[derive(Debug)]
/// Fluent builder that enforces the PDU1/PDU2 rules.
pub struct CanIdBuilder {
    pub priority: u8,
    pub pgn: u32,
    pub source_address: u8,
    pub destination: Option<u8>,
}

impl CanIdBuilder {
    /// Initializes the builder for a given PGN and source address.
    pub fn new(pgn: u32, source_address: u8) -> Self {
        Self {
            priority: 6, // Default priority
            pgn,
            source_address,
            destination: None,
        }
    }

    /// Sets the priority (3 bits) to use during construction.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority & 0x07;
        self
    }

    /// Assigns a destination address (PDU1). Implies a directed message.
    pub fn to_destination(mut self, destination_address: u8) -> Self {
        self.destination = Some(destination_address);
        self
    }

    /// Builds the CAN identifier while applying J1939 rules:
    /// - PF < 240 → addressed message (PDU1): `destination` mandatory and PGN PS byte must be `0`
    /// - PF ≥ 240 → broadcast (PDU2): `destination` must not be provided
    /// - R/DP/PF/PS bits are copied from the provided PGN
    ///
    /// Returns a dedicated error when the configuration violates these rules.
    pub fn build(self) -> Result<CanId, CanIdBuildError> {
        if self.pgn > MAX_PGN {
            return Err(CanIdBuildError::PgnOutOfRange { pgn: self.pgn });
        }
        let r_from_pgn = (self.pgn >> 17) & 0x01;
        let dp_from_pgn = (self.pgn >> 16) & 0x01;
        let pf_from_pgn = ((self.pgn >> 8) & 0xFF) as u8;
        let ps_from_pgn = (self.pgn & 0xFF) as u8;

        let ps = match self.destination {
            None => {
                if pf_from_pgn < 240 {
                    return Err(CanIdBuildError::InvalidForBroadcast);
                }
                ps_from_pgn
            }
            Some(da) => {
                if pf_from_pgn >= 240 {
                    return Err(CanIdBuildError::InvalidForFocusedMessage { pgn: pf_from_pgn });
                }
                if ps_from_pgn != 0 {
                    return Err(CanIdBuildError::PsFocusMessageMustBeNull);
                }
                da
            }
        };

        let id = (((self.priority & 0x07) as u32) << 26)
            | (r_from_pgn << 25)
            | (dp_from_pgn << 24)
            | ((pf_from_pgn as u32) << 16)
            | ((ps as u32) << 8)
            | (self.source_address as u32);
        Ok(CanId(id))
    }
}
