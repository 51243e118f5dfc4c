//! Identifier types and well-known constants shared across the codec.

/// Table id.
pub type Tid = u8;

/// Descriptor tag.
pub type Did = u8;

/// Private data specifier, as carried by a `private_data_specifier_descriptor`.
pub type Pds = u32;

/// Maximum size of a descriptor payload (the length field is 8 bits).
pub const MAX_DESCRIPTOR_PAYLOAD_SIZE: usize = 255;

/// Size of a descriptor header (tag + length).
pub const DESCRIPTOR_HEADER_SIZE: usize = 2;

/// Capacity of the scratch buffer used to serialize one descriptor.
///
/// Larger than any legal payload so that an oversized payload is measured and
/// reported instead of being cut by the buffer.
pub const DESCRIPTOR_ENCODE_CAPACITY: usize = 4096;

/// Descriptor tags from this value upwards are user-private and resolve
/// through the private data specifier in effect.
pub const FIRST_PRIVATE_TAG: Did = 0x80;

/// Returns true if a descriptor tag is in the user-private range.
#[inline]
pub fn is_private_tag(tag: Did) -> bool {
    tag >= FIRST_PRIVATE_TAG
}

/// Well-known PIDs.
pub mod pid {
    pub const PAT: u16 = 0x0000;
    pub const CAT: u16 = 0x0001;
    pub const NIT: u16 = 0x0010;
    pub const SDT: u16 = 0x0011;
    pub const TDT: u16 = 0x0014;
    pub const NULL: u16 = 0x1FFF;
}

/// Table ids.
pub mod tid {
    use super::Tid;

    pub const PAT: Tid = 0x00;
    pub const CAT: Tid = 0x01;
    pub const PMT: Tid = 0x02;
    pub const NIT_ACTUAL: Tid = 0x40;
    pub const NIT_OTHER: Tid = 0x41;
    pub const SDT_ACTUAL: Tid = 0x42;
    pub const SDT_OTHER: Tid = 0x46;
    pub const TDT: Tid = 0x70;
    pub const TOT: Tid = 0x73;
    pub const SCTE_SPLICE_INFO: Tid = 0xFC;
    /// Reserved value, never a real table.
    pub const NULL: Tid = 0xFF;
}

/// Descriptor tags.
pub mod did {
    use super::Did;

    // MPEG
    pub const REGISTRATION: Did = 0x05;
    pub const MPEG_EXTENSION: Did = 0x3F;

    // DVB
    pub const NETWORK_NAME: Did = 0x40;
    pub const SERVICE: Did = 0x48;
    pub const CA_IDENTIFIER: Did = 0x53;
    pub const PRIVATE_DATA_SPECIFIER: Did = 0x5F;
    pub const DVB_EXTENSION: Did = 0x7F;

    // EACEM (private, PDS 0x00000028)
    pub const EACEM_LOGICAL_CHANNEL_NUMBER: Did = 0x83;

    // ISDB
    pub const ISDB_TS_INFORMATION: Did = 0xCD;
    pub const ISDB_TERRESTRIAL_DELIVERY: Did = 0xFA;

    // SCTE 35, only inside a splice_info_section
    pub const SCTE_AVAIL: Did = 0x00;
}

/// Extension descriptor tags, carried in the first payload byte of an
/// extension descriptor.
pub mod xdid {
    pub const DVB_SUPPLEMENTARY_AUDIO: u8 = 0x06;
}

/// Registered private data specifiers.
pub mod pds {
    use super::Pds;

    pub const NULL: Pds = 0x0000_0000;
    pub const EACEM: Pds = 0x0000_0028;
}

/// What to do with a value whose decoding hit a bounds violation or left
/// unread bytes behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Reject the whole value.
    Strict,
    /// Keep the partially decoded value and report the problem.
    #[default]
    Lenient,
}

impl Strictness {
    pub fn is_strict(self) -> bool {
        self == Strictness::Strict
    }
}
