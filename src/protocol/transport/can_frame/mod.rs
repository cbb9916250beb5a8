//! In-memory representation of an SAE J1939 / NMEA 2000 CAN frame.
use crate::protocol::transport::can_id::CanId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Raw NMEA 2000 frame as read from the CAN bus.
pub struct CanFrame {
    /// Full 29-bit CAN identifier stored inside a `u32`.
    pub id: CanId,
    /// Payload buffer. Classic CAN frames always provide eight bytes.
    pub data: [u8; 8],
    /// Number of valid payload bytes (Data Length Code, 0 to 8).
    pub len: usize,
}

impl CanFrame {
    /// Builds a frame from an identifier and at most eight payload bytes.
    pub fn new(id: CanId, payload: &[u8]) -> Option<Self> {
        if payload.len() > 8 {
            return None;
        }
        let mut data = [0u8; 8];
        data[..payload.len()].copy_from_slice(payload);
        Some(Self {
            id,
            data,
            len: payload.len(),
        })
    }

    /// Valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(8)]
    }

    /// Converts a driver frame. Standard (11-bit) and remote frames carry no
    /// J1939 traffic and are rejected.
    pub fn from_embedded<F: embedded_can::Frame>(frame: &F) -> Option<Self> {
        if frame.is_remote_frame() {
            return None;
        }
        match frame.id() {
            embedded_can::Id::Extended(eid) => Self::new(CanId(eid.as_raw()), frame.data()),
            embedded_can::Id::Standard(_) => None,
        }
    }

    /// Converts into the driver's frame type.
    pub fn to_embedded<F: embedded_can::Frame>(&self) -> Option<F> {
        let id = embedded_can::ExtendedId::new(self.id.0 & 0x1FFF_FFFF)?;
        F::new(id, self.payload())
    }
}
