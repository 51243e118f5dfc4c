//! Descriptors: binary form, ordered lists and the contract of concrete types.

use std::any::Any;
use std::fmt;

use bytes::Bytes;

use crate::buffer::PsiBuffer;
use crate::error::{CodecError, XmlError};
use crate::identity::Edid;
use crate::standards::Standards;
use crate::types::{did, is_private_tag, Did, Pds, Tid, DESCRIPTOR_HEADER_SIZE, MAX_DESCRIPTOR_PAYLOAD_SIZE};
use crate::xml::Element;

/// XML name of the opaque descriptor.
pub const GENERIC_DESCRIPTOR_XML_NAME: &str = "generic_descriptor";

/// A binary descriptor: tag and raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    tag: Did,
    payload: Bytes,
}

impl Descriptor {
    pub fn new(tag: Did, payload: impl Into<Bytes>) -> Result<Self, CodecError> {
        let payload = payload.into();
        if payload.len() > MAX_DESCRIPTOR_PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLarge {
                name: format!("descriptor 0x{:02X}", tag),
                size: payload.len(),
                max: MAX_DESCRIPTOR_PAYLOAD_SIZE,
            });
        }
        Ok(Descriptor { tag, payload })
    }

    /// A `private_data_specifier_descriptor`.
    pub fn private_data_specifier(pds: Pds) -> Self {
        Descriptor {
            tag: did::PRIVATE_DATA_SPECIFIER,
            payload: Bytes::copy_from_slice(&pds.to_be_bytes()),
        }
    }

    pub fn tag(&self) -> Did {
        self.tag
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Total binary size, header included.
    pub fn size(&self) -> usize {
        DESCRIPTOR_HEADER_SIZE + self.payload.len()
    }

    /// First payload byte of an extension descriptor.
    pub fn extension_tag(&self) -> Option<u8> {
        match self.tag {
            did::DVB_EXTENSION | did::MPEG_EXTENSION => self.payload.first().copied(),
            _ => None,
        }
    }

    /// The specifier set by a `private_data_specifier_descriptor`.
    pub fn private_data_specifier_value(&self) -> Option<Pds> {
        if self.tag == did::PRIVATE_DATA_SPECIFIER && self.payload.len() >= 4 {
            Some(u32::from_be_bytes([self.payload[0], self.payload[1], self.payload[2], self.payload[3]]))
        } else {
            None
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        out.push(self.tag);
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.payload);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    desc: Descriptor,
    /// Private data specifier in effect at this position, 0 if none.
    pds: Pds,
}

/// An ordered descriptor list which tracks the private data specifier in
/// effect at each position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorList {
    table_id: Option<Tid>,
    entries: Vec<Entry>,
}

impl DescriptorList {
    /// An empty list, optionally attached to a table for descriptor resolution.
    pub fn new(table_id: Option<Tid>) -> Self {
        DescriptorList {
            table_id,
            entries: Vec::new(),
        }
    }

    pub fn table_id(&self) -> Option<Tid> {
        self.table_id
    }

    pub fn set_table_id(&mut self, table_id: Option<Tid>) {
        self.table_id = table_id;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Descriptor> {
        self.entries.get(index).map(|e| &e.desc)
    }

    /// Private data specifier in effect at `index`, 0 if none.
    pub fn pds_at(&self, index: usize) -> Pds {
        self.entries.get(index).map_or(0, |e| e.pds)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.entries.iter().map(|e| &e.desc)
    }

    /// Descriptors with the private data specifier in effect for each.
    pub fn iter_with_pds(&self) -> impl Iterator<Item = (&Descriptor, Pds)> {
        self.entries.iter().map(|e| (&e.desc, e.pds))
    }

    /// Specifier in effect after the last descriptor.
    pub fn current_pds(&self) -> Pds {
        self.entries.last().map_or(0, |e| e.pds)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn push(&mut self, desc: Descriptor) {
        let pds = desc
            .private_data_specifier_value()
            .unwrap_or_else(|| self.current_pds());
        self.entries.push(Entry { desc, pds });
    }

    /// Append a raw descriptor loop.
    ///
    /// Descriptors before a truncated one are kept.
    pub fn add_bytes(&mut self, data: &[u8]) -> Result<(), CodecError> {
        let mut offset = 0;
        while data.len() - offset >= DESCRIPTOR_HEADER_SIZE {
            let tag = data[offset];
            let len = data[offset + 1] as usize;
            let end = offset + DESCRIPTOR_HEADER_SIZE + len;
            if end > data.len() {
                break;
            }
            self.push(Descriptor {
                tag,
                payload: Bytes::copy_from_slice(&data[offset + DESCRIPTOR_HEADER_SIZE..end]),
            });
            offset = end;
        }
        if offset < data.len() {
            return Err(CodecError::MalformedDescriptorLoop {
                offset,
                remaining: data.len() - offset,
            });
        }
        Ok(())
    }

    /// Append all descriptors of another list.
    pub fn merge(&mut self, other: &DescriptorList) {
        for desc in other.iter() {
            self.push(desc.clone());
        }
    }

    /// Insert a `private_data_specifier_descriptor` unless `pds` is already
    /// in effect at the end of the list.
    pub fn add_private_data_specifier(&mut self, pds: Pds) {
        if pds != 0 && self.current_pds() != pds {
            self.push(Descriptor::private_data_specifier(pds));
        }
    }

    /// Binary size of `count` descriptors from `start`.
    pub fn binary_size(&self, start: usize, count: usize) -> usize {
        self.entries.iter().skip(start).take(count).map(|e| e.desc.size()).sum()
    }

    pub fn total_size(&self) -> usize {
        self.binary_size(0, self.entries.len())
    }

    /// Index of the first descriptor with `tag` at or after `start`.
    ///
    /// For a private tag and a non-zero `pds`, the specifier in effect must
    /// also match.
    pub fn search(&self, tag: Did, start: usize, pds: Pds) -> Option<usize> {
        let check_pds = pds != 0 && is_private_tag(tag);
        (start..self.entries.len())
            .find(|&i| self.entries[i].desc.tag == tag && (!check_pds || self.entries[i].pds == pds))
    }

    /// Remove the descriptor at `index`.
    ///
    /// A `private_data_specifier_descriptor` is only removed when no private
    /// descriptor depends on it. Returns false if nothing was removed.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.entries.len() {
            return false;
        }
        if self.entries[index].desc.tag == did::PRIVATE_DATA_SPECIFIER {
            let dependents = self.entries[index + 1..]
                .iter()
                .take_while(|e| e.desc.tag != did::PRIVATE_DATA_SPECIFIER)
                .any(|e| is_private_tag(e.desc.tag));
            if dependents {
                return false;
            }
            let previous = if index > 0 { self.entries[index - 1].pds } else { 0 };
            for e in self.entries[index + 1..]
                .iter_mut()
                .take_while(|e| e.desc.tag != did::PRIVATE_DATA_SPECIFIER)
            {
                e.pds = previous;
            }
        }
        self.entries.remove(index);
        true
    }

    /// Drop private descriptors with no specifier in effect.
    /// Returns the number of removed descriptors.
    pub fn remove_invalid_private_descriptors(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !is_private_tag(e.desc.tag) || e.pds != 0);
        before - self.entries.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_size());
        for e in &self.entries {
            out.extend_from_slice(&e.desc.to_vec());
        }
        out
    }
}

/// Contract of every concrete descriptor type.
///
/// The codec drives implementations uniformly: the extension tag of an
/// extension descriptor is consumed and produced by the codec, so
/// `deserialize_payload` and `serialize_payload` only see the payload after it.
pub trait DescriptorCodec: fmt::Debug + Send + Sync {
    fn edid(&self) -> Edid;

    fn xml_name(&self) -> &'static str;

    /// Reset to the default state.
    fn clear(&mut self);

    /// Decode from a buffer clamped to the payload. Bounds violations set the
    /// buffer error flag.
    fn deserialize_payload(&mut self, buf: &mut PsiBuffer);

    fn serialize_payload(&self, buf: &mut PsiBuffer);

    /// Fill the attributes and children of `element`, which is already named.
    fn build_xml(&self, element: &mut Element);

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError>;

    /// Maximum serialized payload size, extension tag included.
    fn max_payload_size(&self) -> usize {
        MAX_DESCRIPTOR_PAYLOAD_SIZE
    }

    fn as_any(&self) -> &dyn Any;
}

/// Opaque passthrough for descriptors with no registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericDescriptor {
    pub tag: Did,
    pub payload: Vec<u8>,
}

impl GenericDescriptor {
    pub fn from_descriptor(desc: &Descriptor) -> Self {
        GenericDescriptor {
            tag: desc.tag(),
            payload: desc.payload().to_vec(),
        }
    }

    pub fn create() -> Box<dyn DescriptorCodec> {
        Box::<GenericDescriptor>::default()
    }
}

impl DescriptorCodec for GenericDescriptor {
    fn edid(&self) -> Edid {
        Edid::regular(self.tag, Standards::empty())
    }

    fn xml_name(&self) -> &'static str {
        GENERIC_DESCRIPTOR_XML_NAME
    }

    fn clear(&mut self) {
        self.tag = 0;
        self.payload.clear();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.payload = buf.get_remaining_bytes();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) {
        buf.put_bytes(&self.payload);
    }

    fn build_xml(&self, element: &mut Element) {
        element.set_hex_attribute("tag", self.tag, 2);
        element.set_hex_text(&self.payload);
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.tag = element.get_int_attribute("tag", true, 0, 0, 0xFF)?;
        self.payload = element.get_hex_text(0, MAX_DESCRIPTOR_PAYLOAD_SIZE)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl PsiBuffer {
    pub fn put_descriptor(&mut self, desc: &Descriptor) {
        if desc.size() > self.remaining_write_bytes() {
            self.set_user_error();
            return;
        }
        self.put_u8(desc.tag());
        self.put_u8(desc.payload().len() as u8);
        self.put_bytes(desc.payload());
    }

    /// Write `count` descriptors from `start`, all or nothing.
    pub fn put_descriptor_list(&mut self, list: &DescriptorList, start: usize, count: usize) -> bool {
        let start = start.min(list.len());
        let count = count.min(list.len() - start);
        if !self.write_is_byte_aligned() || list.binary_size(start, count) > self.remaining_write_bytes() {
            self.set_user_error();
            return false;
        }
        self.put_partial_descriptor_list(list, start, count) == start + count
    }

    /// Write as many descriptors as fit, from `start`, at most `count`.
    /// Returns the index of the first descriptor not written.
    pub fn put_partial_descriptor_list(&mut self, list: &DescriptorList, start: usize, count: usize) -> usize {
        let mut next = start.min(list.len());
        let last = next + count.min(list.len() - next);
        if self.has_error() || !self.write_is_byte_aligned() {
            self.set_user_error();
            return next;
        }
        while next < last {
            let Some(desc) = list.get(next) else { break };
            if desc.size() > self.remaining_write_bytes() {
                break;
            }
            self.put_descriptor(desc);
            next += 1;
        }
        next
    }

    /// Write as many descriptors as fit after a `length_bits` length field.
    ///
    /// When the buffer is byte-aligned, the length field is preceded by
    /// reserved bits up to 16 bits. Returns the index of the first descriptor
    /// not written.
    pub fn put_partial_descriptor_list_with_length(
        &mut self,
        list: &DescriptorList,
        start: usize,
        length_bits: usize,
    ) -> usize {
        let start = start.min(list.len());
        if self.has_error()
            || self.remaining_write_bytes() < 2
            || !(1..=16).contains(&length_bits)
            || (!self.write_is_byte_aligned() && self.write_bit_position() % 8 != 16 - length_bits)
        {
            self.set_user_error();
            return start;
        }
        if self.write_is_byte_aligned() {
            self.put_reserved(16 - length_bits);
        }
        self.push_write_region(length_bits);
        let next = self.put_partial_descriptor_list(list, start, usize::MAX);
        self.pop_write_region();
        next
    }

    /// Write a complete list after a length field, or flag an error.
    pub fn put_descriptor_list_with_length(&mut self, list: &DescriptorList, length_bits: usize) -> bool {
        if 2 + list.total_size() > self.remaining_write_bytes() {
            self.set_user_error();
            return false;
        }
        self.put_partial_descriptor_list_with_length(list, 0, length_bits) == list.len()
    }

    /// Read `length` bytes of descriptors, or everything left when `None`.
    pub fn get_descriptor_list(&mut self, list: &mut DescriptorList, length: Option<usize>) -> bool {
        let length = length.unwrap_or_else(|| self.remaining_read_bytes());
        if !self.read_is_byte_aligned() || !self.can_read_bytes(length) {
            self.set_user_error();
            return false;
        }
        let data = self.get_bytes(length);
        if list.add_bytes(&data).is_err() {
            self.set_user_error();
            return false;
        }
        true
    }

    /// Read a descriptor loop preceded by a `length_bits` length field.
    ///
    /// When the buffer is byte-aligned, reserved bits up to 16 bits are
    /// skipped first.
    pub fn get_descriptor_list_with_length(&mut self, list: &mut DescriptorList, length_bits: usize) -> bool {
        if self.read_is_byte_aligned() && length_bits < 16 {
            self.skip_bits(16 - length_bits);
        }
        self.push_read_region(length_bits);
        let ok = !self.has_error() && self.get_descriptor_list(list, None);
        self.pop_read_region();
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::pds;

    fn desc(tag: Did, payload: &[u8]) -> Descriptor {
        Descriptor::new(tag, payload.to_vec()).unwrap()
    }

    #[test]
    fn test_descriptor_too_large() {
        assert!(matches!(
            Descriptor::new(0x48, vec![0u8; 300]),
            Err(CodecError::PayloadTooLarge { size: 300, max: 255, .. })
        ));
    }

    #[test]
    fn test_pds_tracking() {
        let mut list = DescriptorList::new(None);
        list.push(desc(0x83, &[1]));
        list.push(Descriptor::private_data_specifier(pds::EACEM));
        list.push(desc(0x83, &[2]));
        list.push(desc(0x48, &[3]));
        assert_eq!(list.pds_at(0), 0);
        assert_eq!(list.pds_at(1), pds::EACEM);
        assert_eq!(list.pds_at(2), pds::EACEM);
        assert_eq!(list.current_pds(), pds::EACEM);

        assert_eq!(list.search(0x83, 0, pds::EACEM), Some(2));
        assert_eq!(list.search(0x83, 0, 0), Some(0));
        assert_eq!(list.search(0x48, 0, pds::EACEM), Some(3));

        assert_eq!(list.remove_invalid_private_descriptors(), 1);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_add_private_data_specifier_once() {
        let mut list = DescriptorList::new(None);
        list.add_private_data_specifier(pds::EACEM);
        list.add_private_data_specifier(pds::EACEM);
        assert_eq!(list.len(), 1);
        list.add_private_data_specifier(0);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_remove_pds_with_dependents() {
        let mut list = DescriptorList::new(None);
        list.push(Descriptor::private_data_specifier(pds::EACEM));
        list.push(desc(0x83, &[1]));
        assert!(!list.remove(0));
        assert!(list.remove(1));
        assert!(list.remove(0));
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_pds_fixes_following_entries() {
        let mut list = DescriptorList::new(None);
        list.push(Descriptor::private_data_specifier(pds::EACEM));
        list.push(desc(0x48, &[1]));
        assert!(list.remove(0));
        assert_eq!(list.pds_at(0), 0);
    }

    #[test]
    fn test_add_bytes_truncated() {
        let mut list = DescriptorList::new(None);
        let err = list.add_bytes(&[0x48, 0x01, 0xAA, 0x40, 0x05, 0x01]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedDescriptorLoop { offset: 3, remaining: 3 }));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_list_with_length_round_trip() {
        let mut list = DescriptorList::new(None);
        list.push(desc(0x40, b"NET"));
        list.push(desc(0x53, &[0x00, 0x05]));
        let mut buf = PsiBuffer::new(32);
        assert!(buf.put_descriptor_list_with_length(&list, 12));
        assert_eq!(&buf.as_written()[..2], &[0xF0, 0x09]);

        let mut rd = PsiBuffer::from_bytes(buf.as_written());
        let mut back = DescriptorList::new(None);
        assert!(rd.get_descriptor_list_with_length(&mut back, 12));
        assert_eq!(back, list);
    }

    #[test]
    fn test_partial_list_stops_at_first_misfit() {
        let mut list = DescriptorList::new(None);
        list.push(desc(0x40, &[0; 4]));
        list.push(desc(0x40, &[0; 10]));
        list.push(desc(0x40, &[0; 1]));
        let mut buf = PsiBuffer::new(10);
        assert_eq!(buf.put_partial_descriptor_list(&list, 0, usize::MAX), 1);
        assert_eq!(buf.written_size(), 6);
        assert!(!buf.has_error());
    }
}
