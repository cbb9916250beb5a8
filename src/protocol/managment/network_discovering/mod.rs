//! Network discovery: ISO Request (PGN 59904) frames asking neighbours for
//! their Address Claim (PGN 60928), and parsing of requests we receive.
use crate::error::CanIdBuildError;
use crate::protocol::managment::address_claiming::PGN_ADDRESS_CLAIM;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::{CanId, GLOBAL_ADDRESS};

/// ISO Request parameter group.
pub const PGN_ISO_REQUEST: u32 = 59904;

/// Build an ISO Request for `requested_pgn`.
///
/// `destination` is [`GLOBAL_ADDRESS`] to ask every node, or a single address.
pub fn build_iso_request_frame(
    source: u8,
    destination: u8,
    requested_pgn: u32,
) -> Result<CanFrame, CanIdBuildError> {
    // ISO Request payload stores the target PGN on 3 bytes.
    let mut data = [0xFFu8; 8];
    data[0..3].copy_from_slice(&requested_pgn.to_le_bytes()[0..3]);

    Ok(CanFrame {
        id: CanId::builder(PGN_ISO_REQUEST, source)
            .to_destination(destination)
            .with_priority(6)
            .build()?,
        data,
        len: 3, // Only the first three bytes are meaningful.
    })
}

/// Ask every node on the bus to repeat its Address Claim.
pub fn build_discovery_frame(source: u8) -> Result<CanFrame, CanIdBuildError> {
    build_iso_request_frame(source, GLOBAL_ADDRESS, PGN_ADDRESS_CLAIM)
}

/// PGN requested by an ISO Request frame.
pub fn parse_iso_request(frame: &CanFrame) -> Option<u32> {
    if frame.id.pgn() != PGN_ISO_REQUEST || frame.len < 3 {
        return None;
    }
    Some(u32::from_le_bytes([frame.data[0], frame.data[1], frame.data[2], 0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_frame_layout() {
        let frame = build_discovery_frame(0xFE).unwrap();
        assert_eq!(frame.id.pgn(), PGN_ISO_REQUEST);
        assert_eq!(frame.id.destination(), Some(GLOBAL_ADDRESS));
        assert_eq!(frame.id.source_address(), 0xFE);
        assert_eq!(frame.payload(), &[0x00, 0xEE, 0x00]);
        assert_eq!(parse_iso_request(&frame), Some(PGN_ADDRESS_CLAIM));
    }

    #[test]
    fn test_addressed_request() {
        let frame = build_iso_request_frame(10, 42, 126996).unwrap();
        assert_eq!(frame.id.destination(), Some(42));
        assert_eq!(parse_iso_request(&frame), Some(126996));
    }

    #[test]
    fn test_parse_rejects_other_frames() {
        let claim = CanFrame::new(
            CanId::builder(PGN_ADDRESS_CLAIM, 1).to_destination(255).build().unwrap(),
            &[0; 8],
        )
        .unwrap();
        assert_eq!(parse_iso_request(&claim), None);

        let short = CanFrame::new(
            CanId::builder(PGN_ISO_REQUEST, 1).to_destination(255).build().unwrap(),
            &[0x00, 0xEE],
        )
        .unwrap();
        assert_eq!(parse_iso_request(&short), None);
    }
}
