//! Network Information Table (DVB, table ids 0x40 actual and 0x41 other).
//!
//! Payload layout of each section:
//!
//! ```text
//! reserved(4) network_descriptors_length(12) network descriptors
//! reserved(4) transport_stream_loop_length(12)
//!     { transport_stream_id(16) original_network_id(16)
//!       reserved(4) transport_descriptors_length(12) descriptors }
//! ```
//!
//! Network descriptors fill as many sections as they need, each closed with
//! an empty transport loop. Transport entries are never split.

use std::any::Any;
use std::fmt;

use crate::buffer::PsiBuffer;
use crate::context::CodecContext;
use crate::descriptor::DescriptorList;
use crate::display::TablesDisplay;
use crate::error::{CodecError, XmlError};
use crate::registry::{RegistryBuilder, TableRegistration};
use crate::section::Section;
use crate::splitter::SectionSplitter;
use crate::standards::Standards;
use crate::table::{get_version_attributes, set_version_attributes, TableCodec};
use crate::types::{tid, Tid};
use crate::xml::Element;

pub const XML_NAME: &str = "NIT";

/// Two 16-bit length fields, network descriptors and transport loop.
const LOOP_HEADERS_SIZE: usize = 4;
/// transport_stream_id, original_network_id, descriptors length.
const TRANSPORT_HEADER_SIZE: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transport {
    pub ts_id: u16,
    pub onid: u16,
    pub descs: DescriptorList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nit {
    pub table_id: Tid,
    pub network_id: u16,
    pub version: u8,
    pub is_current: bool,
    pub descs: DescriptorList,
    /// In first appearance order.
    pub transports: Vec<Transport>,
}

impl Default for Nit {
    fn default() -> Self {
        Nit::new(true)
    }
}

impl Nit {
    pub fn new(is_actual: bool) -> Self {
        let table_id = if is_actual { tid::NIT_ACTUAL } else { tid::NIT_OTHER };
        Nit {
            table_id,
            network_id: 0,
            version: 0,
            is_current: true,
            descs: DescriptorList::new(Some(table_id)),
            transports: Vec::new(),
        }
    }

    pub fn is_actual(&self) -> bool {
        self.table_id == tid::NIT_ACTUAL
    }

    /// The entry of a transport stream, created empty if absent.
    pub fn transport_mut(&mut self, ts_id: u16, onid: u16) -> &mut Transport {
        let index = match self.transports.iter().position(|t| t.ts_id == ts_id && t.onid == onid) {
            Some(index) => index,
            None => {
                self.transports.push(Transport {
                    ts_id,
                    onid,
                    descs: DescriptorList::new(Some(self.table_id)),
                });
                self.transports.len() - 1
            }
        };
        &mut self.transports[index]
    }

    fn create() -> Box<dyn TableCodec> {
        Box::<Nit>::default()
    }

    /// Network descriptors, spread over as many sections as needed.
    fn serialize_network_descriptors(&self, out: &mut SectionSplitter) -> Result<(), CodecError> {
        let mut start = 0;
        loop {
            let room = out.remaining().saturating_sub(LOOP_HEADERS_SIZE);
            let mut count = 0;
            let mut size = 0;
            while let Some(desc) = self.descs.get(start + count) {
                if size + desc.size() > room {
                    break;
                }
                size += desc.size();
                count += 1;
            }
            if count == 0 {
                if let Some(desc) = self.descs.get(start) {
                    return Err(CodecError::EntryTooLarge {
                        size: desc.size(),
                        capacity: room,
                    });
                }
            }

            let buf = out.buffer();
            buf.put_reserved(4);
            buf.push_write_region(12);
            buf.put_descriptor_list(&self.descs, start, count);
            buf.pop_write_region();
            start += count;
            if start >= self.descs.len() {
                return Ok(());
            }
            // Empty transport loop, more network descriptors follow.
            buf.put_reserved(4);
            buf.push_write_region(12);
            buf.pop_write_region();
            out.flush_section();
        }
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.register_table(TableRegistration {
        table_ids: vec![tid::NIT_ACTUAL, tid::NIT_OTHER],
        standards: Standards::DVB,
        xml_name: XML_NAME,
        factory: Nit::create,
        display: Some(display),
    });
}

fn display(disp: &mut TablesDisplay<'_, '_>, section: &Section, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    let table_id = section.table_id();
    writeln!(disp.out(), "{}Network Id: 0x{:04X} ({})", margin, section.table_id_ext(), section.table_id_ext())?;
    disp.display_descriptor_list_with_length(buf, margin, table_id, 12)?;
    buf.skip_bits(4);
    buf.push_read_region(12);
    let inner = format!("{}  ", margin);
    while buf.can_read_bytes(TRANSPORT_HEADER_SIZE) {
        let ts_id = buf.get_u16();
        let onid = buf.get_u16();
        writeln!(
            disp.out(),
            "{}Transport Stream Id: 0x{:04X} ({}), Original Network Id: 0x{:04X} ({})",
            margin,
            ts_id,
            ts_id,
            onid,
            onid
        )?;
        disp.display_descriptor_list_with_length(buf, &inner, table_id, 12)?;
    }
    buf.pop_read_region();
    Ok(())
}

impl TableCodec for Nit {
    fn table_id(&self) -> Tid {
        self.table_id
    }

    fn set_table_id(&mut self, table_id: Tid) {
        if self.is_valid_table_id(table_id) {
            self.table_id = table_id;
            self.descs.set_table_id(Some(table_id));
            for ts in &mut self.transports {
                ts.descs.set_table_id(Some(table_id));
            }
        }
    }

    fn is_valid_table_id(&self, table_id: Tid) -> bool {
        table_id == tid::NIT_ACTUAL || table_id == tid::NIT_OTHER
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn is_long(&self) -> bool {
        true
    }

    fn table_id_extension(&self) -> u16 {
        self.network_id
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn is_current(&self) -> bool {
        self.is_current
    }

    fn clear(&mut self) {
        *self = Nit::new(self.is_actual());
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer, section: &Section) {
        self.network_id = section.table_id_ext();
        self.version = section.version();
        self.is_current = section.is_current();

        buf.get_descriptor_list_with_length(&mut self.descs, 12);
        buf.skip_bits(4);
        buf.push_read_region(12);
        while buf.can_read() {
            let ts_id = buf.get_u16();
            let onid = buf.get_u16();
            let mut descs = DescriptorList::new(Some(self.table_id));
            buf.get_descriptor_list_with_length(&mut descs, 12);
            if buf.has_error() {
                break;
            }
            self.transport_mut(ts_id, onid).descs.merge(&descs);
        }
        buf.pop_read_region();
    }

    fn serialize_payload(&self, out: &mut SectionSplitter) -> Result<(), CodecError> {
        self.serialize_network_descriptors(out)?;
        let capacity = out.entry_capacity().saturating_sub(LOOP_HEADERS_SIZE);

        out.buffer().put_reserved(4);
        out.buffer().push_write_region(12);
        for ts in &self.transports {
            let size = TRANSPORT_HEADER_SIZE + ts.descs.total_size();
            if size > capacity {
                out.buffer().pop_write_region();
                return Err(CodecError::EntryTooLarge { size, capacity });
            }
            if !out.fits(size) {
                // Close this section, the next one has no network descriptors.
                let buf = out.buffer();
                buf.pop_write_region();
                out.flush_section();
                let buf = out.buffer();
                buf.put_reserved(4);
                buf.push_write_region(12);
                buf.pop_write_region();
                buf.put_reserved(4);
                buf.push_write_region(12);
            }
            let buf = out.buffer();
            buf.put_u16(ts.ts_id);
            buf.put_u16(ts.onid);
            buf.put_descriptor_list_with_length(&ts.descs, 12);
        }
        out.buffer().pop_write_region();
        Ok(())
    }

    fn build_xml(&self, ctx: &CodecContext<'_>, element: &mut Element) {
        set_version_attributes(element, self.version, self.is_current);
        element.set_hex_attribute("network_id", self.network_id, 4);
        element.set_bool_attribute("actual", self.is_actual());
        ctx.descriptor_list_to_xml(element, &self.descs);
        for ts in &self.transports {
            let child = element.add_child("transport_stream");
            child.set_hex_attribute("transport_stream_id", ts.ts_id, 4);
            child.set_hex_attribute("original_network_id", ts.onid, 4);
            ctx.descriptor_list_to_xml(child, &ts.descs);
        }
    }

    fn analyze_xml(&mut self, ctx: &CodecContext<'_>, element: &Element) -> Result<(), XmlError> {
        *self = Nit::new(element.get_bool_attribute("actual", false, true)?);
        (self.version, self.is_current) = get_version_attributes(element)?;
        self.network_id = element.get_int_attribute("network_id", true, 0, 0, 0xFFFF)?;
        let others = ctx.descriptors_from_xml(&mut self.descs, element, &["transport_stream"])?;
        for child in others {
            let ts_id = child.get_int_attribute("transport_stream_id", true, 0, 0, 0xFFFF)?;
            let onid = child.get_int_attribute("original_network_id", true, 0, 0, 0xFFFF)?;
            let mut descs = DescriptorList::new(Some(self.table_id));
            ctx.descriptors_from_xml(&mut descs, child, &[])?;
            self.transport_mut(ts_id, onid).descs.merge(&descs);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;
    use crate::types::did;

    fn sample(transports: u16) -> Nit {
        let mut nit = Nit::new(true);
        nit.network_id = 0x7FE0;
        nit.version = 3;
        nit.descs.push(Descriptor::new(did::NETWORK_NAME, b"Tokyo".to_vec()).unwrap());
        for i in 0..transports {
            let ts = nit.transport_mut(0x7FE0 + i, 0x7FE0);
            ts.descs.push(Descriptor::new(0xFA, vec![0x7E, 0x1A, 0x0F, 0x3C]).unwrap());
        }
        nit
    }

    #[test]
    fn test_single_section() {
        let ctx = CodecContext::new();
        let nit = sample(1);
        let table = ctx.encode_table(&nit).unwrap();
        assert_eq!(
            table.section(0).unwrap().payload(),
            &[
                0xF0, 0x07, 0x40, 0x05, b'T', b'o', b'k', b'y', b'o', // network descriptors
                0xF0, 0x0C, // transport loop
                0x7F, 0xE0, 0x7F, 0xE0, 0xF0, 0x06, 0xFA, 0x04, 0x7E, 0x1A, 0x0F, 0x3C,
            ]
        );
        let decoded = ctx.decode_table(&table).unwrap();
        assert!(decoded.is_clean());
        assert_eq!(decoded.value.as_any().downcast_ref::<Nit>(), Some(&nit));
    }

    #[test]
    fn test_transports_split_across_sections() {
        let ctx = CodecContext::new();
        // 12-byte transport entries; (4084 - 7 - 4) / 12 = 339 per first section
        let nit = sample(400);
        let table = ctx.encode_table(&nit).unwrap();
        assert_eq!(table.section_count(), 2);
        let second = table.section(1).unwrap().payload();
        // No network descriptors, then 61 entries of 12 bytes
        assert_eq!(&second[..4], &[0xF0, 0x00, 0xF2, 0xDC]);
        let decoded = ctx.decode_table(&table).unwrap();
        assert_eq!(decoded.value.as_any().downcast_ref::<Nit>(), Some(&nit));
    }

    #[test]
    fn test_other_network() {
        let ctx = CodecContext::new();
        let mut nit = sample(1);
        nit.set_table_id(tid::NIT_OTHER);
        let table = ctx.encode_table(&nit).unwrap();
        assert_eq!(table.table_id(), Some(tid::NIT_OTHER));
        let element = ctx.table_to_xml(&table).unwrap();
        assert_eq!(element.attribute("actual"), Some("false"));
        assert_eq!(ctx.table_from_xml(&element).unwrap(), table);
    }
}
