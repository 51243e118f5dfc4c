//! PSI/SI section framing and CRC validation.
//!
//! ```text
//! short:  table_id | syntax=0 private reserved(2) section_length(12) | payload
//! long:   table_id | syntax=1 private reserved(2) section_length(12)
//!         | table_id_extension(16) | reserved(2) version(5) current(1)
//!         | section_number | last_section_number | payload | CRC32
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::SectionError;
use crate::types::Tid;

/// Header size of a short section.
pub const SHORT_HEADER_SIZE: usize = 3;
/// Header size of a long section.
pub const LONG_HEADER_SIZE: usize = 8;
/// Size of the trailing CRC32.
pub const CRC32_SIZE: usize = 4;

/// Maximum total size of an MPEG-defined section.
pub const MAX_PSI_SECTION_SIZE: usize = 1024;
/// Maximum total size of a private section.
pub const MAX_PRIVATE_SECTION_SIZE: usize = 4096;

pub const MAX_PSI_SHORT_PAYLOAD_SIZE: usize = MAX_PSI_SECTION_SIZE - SHORT_HEADER_SIZE;
pub const MAX_PRIVATE_SHORT_PAYLOAD_SIZE: usize = MAX_PRIVATE_SECTION_SIZE - SHORT_HEADER_SIZE;
pub const MAX_PSI_LONG_PAYLOAD_SIZE: usize = MAX_PSI_SECTION_SIZE - LONG_HEADER_SIZE - CRC32_SIZE;
pub const MAX_PRIVATE_LONG_PAYLOAD_SIZE: usize = MAX_PRIVATE_SECTION_SIZE - LONG_HEADER_SIZE - CRC32_SIZE;

/// Decoded section header, common to all tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    /// Table ID.
    pub table_id: Tid,
    /// Section syntax indicator: long section.
    pub is_long: bool,
    /// Private indicator bit.
    pub is_private: bool,
    /// Table ID extension (long sections only).
    pub table_id_ext: u16,
    /// Version number (5 bits).
    pub version: u8,
    /// Current/next indicator.
    pub is_current: bool,
    /// Section number.
    pub section_number: u8,
    /// Last section number.
    pub last_section_number: u8,
}

impl SectionHeader {
    /// Header of a long section. Section numbers are set later.
    pub fn long(table_id: Tid, is_private: bool, table_id_ext: u16, version: u8, is_current: bool) -> Self {
        SectionHeader {
            table_id,
            is_long: true,
            is_private,
            table_id_ext,
            version: version & 0x1F,
            is_current,
            section_number: 0,
            last_section_number: 0,
        }
    }

    pub fn short(table_id: Tid, is_private: bool) -> Self {
        SectionHeader {
            table_id,
            is_long: false,
            is_private,
            table_id_ext: 0xFFFF,
            version: 0,
            is_current: true,
            section_number: 0,
            last_section_number: 0,
        }
    }

    fn max_section_size(&self) -> usize {
        if self.is_private {
            MAX_PRIVATE_SECTION_SIZE
        } else {
            MAX_PSI_SECTION_SIZE
        }
    }
}

/// One complete binary section, CRC included for long sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    header: SectionHeader,
    content: Bytes,
}

impl Section {
    /// Build a section from a header and a payload.
    ///
    /// Long sections get a CRC32. A short section gets one only when
    /// `short_crc` is set; its payload is then followed by the CRC.
    pub fn new(header: SectionHeader, payload: &[u8], short_crc: bool) -> Result<Self, SectionError> {
        let with_crc = header.is_long || short_crc;
        let header_size = if header.is_long { LONG_HEADER_SIZE } else { SHORT_HEADER_SIZE };
        let total = header_size + payload.len() + if with_crc { CRC32_SIZE } else { 0 };
        if total > header.max_section_size() {
            return Err(SectionError::TooLarge(total, header.max_section_size()));
        }

        let section_length = (total - SHORT_HEADER_SIZE) as u16;
        let mut out = BytesMut::with_capacity(total);
        out.put_u8(header.table_id);
        out.put_u16(
            (u16::from(header.is_long) << 15)
                | (u16::from(header.is_private) << 14)
                | 0x3000
                | section_length,
        );
        if header.is_long {
            out.put_u16(header.table_id_ext);
            out.put_u8(0xC0 | (header.version & 0x1F) << 1 | u8::from(header.is_current));
            out.put_u8(header.section_number);
            out.put_u8(header.last_section_number);
        }
        out.put_slice(payload);
        if with_crc {
            let crc = crc32_mpeg2(&out);
            out.put_u32(crc);
        }
        Ok(Section {
            header,
            content: out.freeze(),
        })
    }

    /// Parse exactly one section. The CRC32 of long sections is verified.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self, SectionError> {
        let data: Bytes = data.into();
        let total = Section::peek_size(&data).ok_or(SectionError::TooShort(data.len()))?;
        if total != data.len() {
            return Err(SectionError::LengthMismatch {
                declared: total,
                actual: data.len(),
            });
        }

        let is_long = data[1] & 0x80 != 0;
        let is_private = data[1] & 0x40 != 0;
        let header = if is_long {
            if total < LONG_HEADER_SIZE + CRC32_SIZE {
                return Err(SectionError::TooShort(total));
            }
            SectionHeader {
                table_id: data[0],
                is_long,
                is_private,
                table_id_ext: u16::from_be_bytes([data[3], data[4]]),
                version: (data[5] >> 1) & 0x1F,
                is_current: data[5] & 0x01 != 0,
                section_number: data[6],
                last_section_number: data[7],
            }
        } else {
            SectionHeader::short(data[0], is_private)
        };
        if total > header.max_section_size() {
            return Err(SectionError::TooLarge(total, header.max_section_size()));
        }

        if is_long {
            let computed = crc32_mpeg2(&data[..total - CRC32_SIZE]);
            let stored = read_u32(&data[total - CRC32_SIZE..]);
            if computed != stored {
                return Err(SectionError::CrcMismatch { computed, stored });
            }
        }
        Ok(Section { header, content: data })
    }

    /// Total size announced by the header at the start of `data`.
    pub fn peek_size(data: &[u8]) -> Option<usize> {
        if data.len() < SHORT_HEADER_SIZE {
            return None;
        }
        let section_length = (usize::from(data[1] & 0x0F) << 8) | usize::from(data[2]);
        Some(SHORT_HEADER_SIZE + section_length)
    }

    pub fn header(&self) -> &SectionHeader {
        &self.header
    }

    pub fn table_id(&self) -> Tid {
        self.header.table_id
    }

    pub fn is_long(&self) -> bool {
        self.header.is_long
    }

    pub fn is_private(&self) -> bool {
        self.header.is_private
    }

    pub fn table_id_ext(&self) -> u16 {
        self.header.table_id_ext
    }

    pub fn version(&self) -> u8 {
        self.header.version
    }

    pub fn is_current(&self) -> bool {
        self.header.is_current
    }

    pub fn section_number(&self) -> u8 {
        self.header.section_number
    }

    pub fn last_section_number(&self) -> u8 {
        self.header.last_section_number
    }

    /// The full binary section.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Payload between the header and the CRC32 of a long section.
    /// For a short section, everything after the 3-byte header.
    pub fn payload(&self) -> &[u8] {
        if self.header.is_long {
            &self.content[LONG_HEADER_SIZE..self.content.len() - CRC32_SIZE]
        } else {
            &self.content[SHORT_HEADER_SIZE..]
        }
    }

    /// Trailing CRC32 of a long section.
    pub fn crc32(&self) -> Option<u32> {
        self.header
            .is_long
            .then(|| read_u32(&self.content[self.content.len() - CRC32_SIZE..]))
    }

    /// Payload of a short section which ends with a CRC32, after checking it.
    pub fn short_payload_checked(&self) -> Result<&[u8], SectionError> {
        if self.header.is_long {
            return Ok(self.payload());
        }
        let len = self.content.len();
        if len < SHORT_HEADER_SIZE + CRC32_SIZE {
            return Err(SectionError::TooShort(len));
        }
        let computed = crc32_mpeg2(&self.content[..len - CRC32_SIZE]);
        let stored = read_u32(&self.content[len - CRC32_SIZE..]);
        if computed != stored {
            return Err(SectionError::CrcMismatch { computed, stored });
        }
        Ok(&self.content[SHORT_HEADER_SIZE..len - CRC32_SIZE])
    }
}

fn read_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// Calculate CRC32 for MPEG-2 (polynomial 0x04C11DB7).
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    static CRC_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = (i as u32) << 24;
            let mut j = 0;
            while j < 8 {
                if crc & 0x80000000 != 0 {
                    crc = (crc << 1) ^ 0x04C11DB7;
                } else {
                    crc <<= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFFFFFFu32;
    for &byte in data {
        let index = ((crc >> 24) ^ byte as u32) as usize;
        crc = (crc << 8) ^ CRC_TABLE[index];
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(crc32_mpeg2(&[]), 0xFFFFFFFF);
        assert_eq!(crc32_mpeg2(b"123456789"), 0x0376E6E7);
    }

    #[test]
    fn test_long_section_round_trip() {
        let mut header = SectionHeader::long(0x00, false, 0x0001, 3, true);
        header.section_number = 1;
        header.last_section_number = 2;
        let section = Section::new(header, &[0x00, 0x01, 0xE1, 0x00], false).unwrap();
        assert_eq!(&section.content()[..8], &[0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC7, 0x01, 0x02]);
        assert_eq!(section.size(), 16);

        let parsed = Section::from_bytes(section.content().clone()).unwrap();
        assert_eq!(parsed.header(), &header);
        assert_eq!(parsed.payload(), &[0x00, 0x01, 0xE1, 0x00]);
        assert!(parsed.crc32().is_some());
    }

    #[test]
    fn test_crc_mismatch() {
        let section = Section::new(SectionHeader::long(0x42, true, 1, 0, true), &[1, 2, 3], false).unwrap();
        let mut raw = section.content().to_vec();
        raw[9] ^= 0xFF;
        assert!(matches!(Section::from_bytes(raw), Err(SectionError::CrcMismatch { .. })));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            Section::from_bytes(vec![0x70, 0x70, 0x05, 0xC0]),
            Err(SectionError::LengthMismatch { declared: 8, actual: 4 })
        ));
        assert!(matches!(Section::from_bytes(vec![0x70]), Err(SectionError::TooShort(1))));
    }

    #[test]
    fn test_short_section_with_crc() {
        let section = Section::new(SectionHeader::short(0x73, false), &[0xAA, 0xBB], true).unwrap();
        assert_eq!(section.size(), 3 + 2 + 4);
        let parsed = Section::from_bytes(section.content().clone()).unwrap();
        assert!(!parsed.is_long());
        assert_eq!(parsed.payload().len(), 6);
        assert_eq!(parsed.short_payload_checked().unwrap(), &[0xAA, 0xBB]);
    }

    #[test]
    fn test_too_large() {
        let payload = vec![0u8; MAX_PSI_LONG_PAYLOAD_SIZE + 1];
        assert!(matches!(
            Section::new(SectionHeader::long(0x00, false, 0, 0, true), &payload, false),
            Err(SectionError::TooLarge(1025, 1024))
        ));
        let payload = vec![0u8; MAX_PSI_LONG_PAYLOAD_SIZE];
        assert!(Section::new(SectionHeader::long(0x00, false, 0, 0, true), &payload, false).is_ok());
    }
}
