//! Program Association Table (MPEG, table id 0x00).

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use crate::buffer::PsiBuffer;
use crate::context::CodecContext;
use crate::display::TablesDisplay;
use crate::error::{CodecError, XmlError};
use crate::registry::{RegistryBuilder, TableRegistration};
use crate::section::Section;
use crate::splitter::SectionSplitter;
use crate::standards::Standards;
use crate::table::{get_version_attributes, set_version_attributes, TableCodec};
use crate::types::{pid, tid, Tid};
use crate::xml::Element;

pub const XML_NAME: &str = "PAT";
const ENTRY_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    pub version: u8,
    pub is_current: bool,
    pub ts_id: u16,
    /// PID of the NIT, carried as program number 0.
    pub nit_pid: Option<u16>,
    /// PMT PID by program number.
    pub pmts: BTreeMap<u16, u16>,
}

impl Default for Pat {
    fn default() -> Self {
        Pat {
            version: 0,
            is_current: true,
            ts_id: 0,
            nit_pid: None,
            pmts: BTreeMap::new(),
        }
    }
}

impl Pat {
    fn create() -> Box<dyn TableCodec> {
        Box::<Pat>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.register_table(TableRegistration {
        table_ids: vec![tid::PAT],
        standards: Standards::MPEG,
        xml_name: XML_NAME,
        factory: Pat::create,
        display: Some(display),
    });
}

fn display(disp: &mut TablesDisplay<'_, '_>, section: &Section, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    let out = disp.out();
    writeln!(out, "{}TS id: 0x{:04X} ({})", margin, section.table_id_ext(), section.table_id_ext())?;
    while buf.can_read_bytes(ENTRY_SIZE) {
        let program = buf.get_u16();
        let pid = buf.get_pid();
        if program == 0 {
            writeln!(out, "{}NIT: PID 0x{:04X} ({})", margin, pid, pid)?;
        } else {
            writeln!(out, "{}Program: 0x{:04X} ({}), PMT PID: 0x{:04X} ({})", margin, program, program, pid, pid)?;
        }
    }
    Ok(())
}

impl TableCodec for Pat {
    fn table_id(&self) -> Tid {
        tid::PAT
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn is_long(&self) -> bool {
        true
    }

    fn is_private(&self) -> bool {
        false
    }

    fn table_id_extension(&self) -> u16 {
        self.ts_id
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn is_current(&self) -> bool {
        self.is_current
    }

    fn clear(&mut self) {
        *self = Pat::default();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer, section: &Section) {
        self.ts_id = section.table_id_ext();
        self.version = section.version();
        self.is_current = section.is_current();
        while buf.can_read() {
            let program = buf.get_u16();
            let pid = buf.get_pid();
            if buf.has_error() {
                break;
            }
            if program == 0 {
                self.nit_pid = Some(pid);
            } else {
                self.pmts.insert(program, pid);
            }
        }
    }

    fn serialize_payload(&self, out: &mut SectionSplitter) -> Result<(), CodecError> {
        if let Some(nit_pid) = self.nit_pid {
            out.begin_entry(ENTRY_SIZE)?;
            out.buffer().put_u16(0);
            out.buffer().put_pid(nit_pid);
        }
        for (&program, &pmt_pid) in &self.pmts {
            out.begin_entry(ENTRY_SIZE)?;
            out.buffer().put_u16(program);
            out.buffer().put_pid(pmt_pid);
        }
        Ok(())
    }

    fn build_xml(&self, _ctx: &CodecContext<'_>, element: &mut Element) {
        set_version_attributes(element, self.version, self.is_current);
        element.set_hex_attribute("transport_stream_id", self.ts_id, 4);
        if let Some(nit_pid) = self.nit_pid {
            element.set_hex_attribute("network_PID", nit_pid, 4);
        }
        for (&program, &pmt_pid) in &self.pmts {
            let child = element.add_child("service");
            child.set_hex_attribute("service_id", program, 4);
            child.set_hex_attribute("program_map_PID", pmt_pid, 4);
        }
    }

    fn analyze_xml(&mut self, _ctx: &CodecContext<'_>, element: &Element) -> Result<(), XmlError> {
        self.clear();
        (self.version, self.is_current) = get_version_attributes(element)?;
        self.ts_id = element.get_int_attribute("transport_stream_id", true, 0, 0, 0xFFFF)?;
        self.nit_pid = element.get_optional_int_attribute("network_PID", 0, pid::NULL)?;
        for child in element.get_children("service", 0, usize::MAX)? {
            let program = child.get_int_attribute("service_id", true, 0, 1, 0xFFFF)?;
            let pmt_pid = child.get_int_attribute("program_map_PID", true, 0, 0, pid::NULL)?;
            self.pmts.insert(program, pmt_pid);
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
    use crate::table::BinaryTable;

    fn sample() -> Pat {
        let mut pat = Pat {
            version: 5,
            ts_id: 0x7FE0,
            nit_pid: Some(pid::NIT),
            ..Pat::default()
        };
        pat.pmts.insert(0x0400, 0x01F0);
        pat.pmts.insert(0x0401, 0x01F1);
        pat
    }

    #[test]
    fn test_binary_round_trip() {
        let ctx = CodecContext::new();
        let table = ctx.encode_table(&sample()).unwrap();
        assert_eq!(table.section_count(), 1);
        let section = table.section(0).unwrap();
        assert!(!section.is_private());
        assert_eq!(section.table_id_ext(), 0x7FE0);
        assert_eq!(
            section.payload(),
            &[0x00, 0x00, 0xE0, 0x10, 0x04, 0x00, 0xE1, 0xF0, 0x04, 0x01, 0xE1, 0xF1]
        );

        let decoded = ctx.decode_table(&table).unwrap();
        assert!(decoded.is_clean());
        assert_eq!(decoded.value.as_any().downcast_ref::<Pat>(), Some(&sample()));
    }

    #[test]
    fn test_large_pat_splits() {
        let mut pat = Pat::default();
        for program in 1..=600u16 {
            pat.pmts.insert(program, 0x100 + program);
        }
        let ctx = CodecContext::new();
        let table = ctx.encode_table(&pat).unwrap();
        // 1012 / 4 = 253 programs per section
        assert_eq!(table.section_count(), 3);
        assert!(table.sections().all(|s| s.last_section_number() == 2));
        let decoded = ctx.decode_table(&BinaryTable::from_sections(table.sections().cloned()).unwrap()).unwrap();
        assert_eq!(decoded.value.as_any().downcast_ref::<Pat>(), Some(&pat));
    }

    #[test]
    fn test_xml_round_trip() {
        let ctx = CodecContext::new();
        let mut element = Element::new(XML_NAME);
        sample().build_xml(&ctx, &mut element);
        assert_eq!(element.attribute("network_PID"), Some("0x0010"));
        let mut pat = Pat::default();
        pat.analyze_xml(&ctx, &element).unwrap();
        assert_eq!(pat, sample());
    }
}
