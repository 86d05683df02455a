//! Mapping from 16-bit CCSDS Application Process ID (APID) to packet
//! kind, declared as a table rather than scattered inline constants.

use crate::packet::PacketKind;

/// STEIN event-list packet.
pub const APID_STEIN: u16 = 0x0A40;
/// MAGIC vector-list packet.
pub const APID_MAGIC: u16 = 0x0A41;
/// Recorded housekeeping packet.
pub const APID_HSK_RECORDED: u16 = 0x0A64;
/// Overflow packet (retained unparsed).
pub const APID_OVERFLOW: u16 = 0x0A65;
/// Recent housekeeping packet.
pub const APID_HSK_RECENT: u16 = 0x0B64;

/// Header byte identifying a headerless (GSE) STEIN packet.
pub const HEADER_STEIN: u8 = 0xAF;
/// Header byte identifying a headerless (GSE) MAGIC packet.
pub const HEADER_MAGIC: u8 = 0xBE;

/// Attached Synchronization Marker expected at the start of every
/// master transfer frame.
pub const ASM: u32 = 0x1ACF_FC1D;

/// Look up the packet kind for a supported APID. Returns `None` for
/// any APID outside `{STEIN, MAGIC, HSK_RECORDED, HSK_RECENT}` --
/// callers should fall back to [`PacketKind::Unknown`].
pub fn kind_for_apid(apid: u16) -> Option<PacketKind> {
    match apid {
        APID_STEIN => Some(PacketKind::Stein),
        APID_MAGIC => Some(PacketKind::Magic),
        APID_HSK_RECORDED => Some(PacketKind::HskRecorded),
        APID_HSK_RECENT => Some(PacketKind::HskRecent),
        _ => None,
    }
}

/// Look up the packet kind for a headerless GSE packet's first
/// content byte.
pub fn kind_for_header_byte(byte: u8) -> Option<PacketKind> {
    match byte {
        HEADER_STEIN => Some(PacketKind::Stein),
        HEADER_MAGIC => Some(PacketKind::Magic),
        _ => None,
    }
}
