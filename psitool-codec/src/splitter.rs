//! Multi-section serialization.
//!
//! A table serializes its payload into a [`SectionSplitter`]: it writes the
//! fixed part, marks it with [`mark_fixed_header`](SectionSplitter::mark_fixed_header),
//! then appends entries. When an entry does not fit, the current section is
//! closed and a new one starts with a copy of the fixed part. An entry never
//! spans two sections. Section numbers are assigned by the caller once the
//! final count is known.

use std::mem;

use bytes::Bytes;
use log::debug;

use crate::buffer::PsiBuffer;
use crate::descriptor::DescriptorList;
use crate::error::CodecError;

#[derive(Debug)]
pub struct SectionSplitter {
    max_payload: usize,
    buf: PsiBuffer,
    header: Vec<u8>,
    payloads: Vec<Bytes>,
    failed: bool,
}

impl SectionSplitter {
    /// A splitter producing payloads of at most `max_payload` bytes.
    pub fn new(max_payload: usize) -> Self {
        SectionSplitter {
            max_payload,
            buf: PsiBuffer::new(max_payload),
            header: Vec::new(),
            payloads: Vec::new(),
            failed: false,
        }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload
    }

    /// The payload buffer of the current section.
    pub fn buffer(&mut self) -> &mut PsiBuffer {
        &mut self.buf
    }

    /// Record everything written so far as the fixed part repeated at the
    /// start of every section.
    pub fn mark_fixed_header(&mut self) {
        debug_assert_eq!(self.buf.region_depth(), 0, "fixed header inside an open region");
        debug_assert!(self.buf.write_is_byte_aligned(), "fixed header not byte-aligned");
        self.header = self.buf.as_written().to_vec();
    }

    pub fn fixed_header_size(&self) -> usize {
        self.header.len()
    }

    /// Room for entries in an empty section.
    pub fn entry_capacity(&self) -> usize {
        self.max_payload.saturating_sub(self.header.len())
    }

    /// Bytes left in the current section.
    pub fn remaining(&self) -> usize {
        self.buf.remaining_write_bytes()
    }

    pub fn fits(&self, size: usize) -> bool {
        size <= self.remaining()
    }

    /// True when nothing but the fixed part was written in this section.
    pub fn at_section_start(&self) -> bool {
        self.buf.written_size() <= self.header.len()
    }

    /// Number of sections so far, the current one included.
    pub fn section_count(&self) -> usize {
        self.payloads.len() + 1
    }

    /// Close the current section and open a new one with the fixed part.
    pub fn flush_section(&mut self) {
        debug_assert_eq!(self.buf.region_depth(), 0, "section closed inside an open region");
        let mut next = PsiBuffer::new(self.max_payload);
        next.put_bytes(&self.header);
        let done = mem::replace(&mut self.buf, next);
        if done.has_error() || done.region_depth() != 0 {
            self.failed = true;
        }
        debug!("section {} closed with {} bytes", self.payloads.len(), done.written_size());
        self.payloads.push(done.into_bytes());
    }

    /// Make room for an entry of `size` bytes, opening a new section if the
    /// current one is too full.
    pub fn begin_entry(&mut self, size: usize) -> Result<(), CodecError> {
        if size > self.entry_capacity() {
            return Err(CodecError::EntryTooLarge {
                size,
                capacity: self.entry_capacity(),
            });
        }
        if !self.fits(size) {
            self.flush_section();
        }
        Ok(())
    }

    /// Append every descriptor of `list` as an entry.
    pub fn split_descriptors(&mut self, list: &DescriptorList) -> Result<(), CodecError> {
        for desc in list.iter() {
            self.begin_entry(desc.size())?;
            self.buf.put_descriptor(desc);
        }
        Ok(())
    }

    /// Close the last section and return all payloads in order.
    /// A table always has at least one section, possibly empty.
    pub fn finish(mut self) -> Result<Vec<Bytes>, CodecError> {
        if self.buf.has_error() || self.buf.region_depth() != 0 {
            self.failed = true;
        }
        self.payloads.push(self.buf.into_bytes());
        if self.failed {
            return Err(CodecError::SerializeFailed("section payload".to_string()));
        }
        Ok(self.payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;

    fn list_of(count: usize, payload_size: usize) -> DescriptorList {
        let mut list = DescriptorList::new(None);
        for i in 0..count {
            list.push(Descriptor::new(0x40, vec![i as u8; payload_size]).unwrap());
        }
        list
    }

    fn recover(payloads: &[Bytes], header_size: usize) -> DescriptorList {
        let mut list = DescriptorList::new(None);
        for p in payloads {
            list.add_bytes(&p[header_size..]).unwrap();
        }
        list
    }

    #[test]
    fn test_twenty_five_entries_in_240_bytes() {
        let list = list_of(25, 16);
        let mut splitter = SectionSplitter::new(240);
        splitter.split_descriptors(&list).unwrap();
        let payloads = splitter.finish().unwrap();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].len(), 13 * 18);
        assert_eq!(payloads[1].len(), 12 * 18);
        assert_eq!(recover(&payloads, 0), list);
    }

    #[test]
    fn test_fixed_header_repeated() {
        let list = list_of(4, 8);
        let mut splitter = SectionSplitter::new(23);
        splitter.buffer().put_u16(0xABCD);
        splitter.buffer().put_u8(0xFF);
        splitter.mark_fixed_header();
        splitter.split_descriptors(&list).unwrap();
        let payloads = splitter.finish().unwrap();
        // 3 header bytes + two 10-byte entries per section
        assert_eq!(payloads.len(), 2);
        for p in &payloads {
            assert_eq!(&p[..3], &[0xAB, 0xCD, 0xFF]);
        }
        assert_eq!(recover(&payloads, 3), list);
    }

    #[test]
    fn test_empty_list_gives_one_section() {
        let mut splitter = SectionSplitter::new(100);
        splitter.split_descriptors(&DescriptorList::new(None)).unwrap();
        let payloads = splitter.finish().unwrap();
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].is_empty());
    }

    #[test]
    fn test_entry_larger_than_empty_section() {
        let list = list_of(1, 50);
        let mut splitter = SectionSplitter::new(40);
        let err = splitter.split_descriptors(&list).unwrap_err();
        assert!(matches!(err, CodecError::EntryTooLarge { size: 52, capacity: 40 }));
    }

    #[test]
    fn test_buffer_error_fails_finish() {
        let mut splitter = SectionSplitter::new(4);
        splitter.buffer().put_u32(1);
        splitter.buffer().put_u8(1);
        assert!(matches!(splitter.finish(), Err(CodecError::SerializeFailed(_))));
    }
}
