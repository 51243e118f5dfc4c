//! Binary tables and the contract of concrete table types.

use std::any::Any;
use std::fmt;

use crate::buffer::PsiBuffer;
use crate::context::CodecContext;
use crate::error::{CodecError, SectionError, XmlError};
use crate::section::{
    Section, MAX_PRIVATE_LONG_PAYLOAD_SIZE, MAX_PRIVATE_SHORT_PAYLOAD_SIZE, MAX_PSI_LONG_PAYLOAD_SIZE,
    MAX_PSI_SHORT_PAYLOAD_SIZE, CRC32_SIZE,
};
use crate::splitter::SectionSplitter;
use crate::types::Tid;
use crate::xml::Element;

/// XML name of opaque short tables.
pub const GENERIC_SHORT_TABLE_XML_NAME: &str = "generic_short_table";
/// XML name of opaque long tables.
pub const GENERIC_LONG_TABLE_XML_NAME: &str = "generic_long_table";

/// Assembly state of a [`BinaryTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Empty,
    /// Some sections are still missing.
    Collecting,
    /// Sections `0..=last_section_number` are all present.
    Complete,
}

/// A table as a set of binary sections sharing table id, table id
/// extension and version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryTable {
    sections: Vec<Option<Section>>,
}

impl BinaryTable {
    pub fn new() -> Self {
        BinaryTable::default()
    }

    /// Assemble a table from sections in any order.
    pub fn from_sections(sections: impl IntoIterator<Item = Section>) -> Result<Self, SectionError> {
        let mut table = BinaryTable::new();
        for section in sections {
            table.add_section(section)?;
        }
        Ok(table)
    }

    fn first(&self) -> Option<&Section> {
        self.sections.iter().flatten().next()
    }

    /// Add a section. A section number already present is replaced.
    pub fn add_section(&mut self, section: Section) -> Result<TableState, SectionError> {
        let count = usize::from(section.last_section_number()) + 1;
        if let Some(first) = self.first() {
            // A short section is a whole table by itself.
            let same = section.is_long()
                && first.is_long()
                && section.table_id() == first.table_id()
                && section.table_id_ext() == first.table_id_ext()
                && section.version() == first.version();
            if !same {
                return Err(SectionError::ForeignSection {
                    table_id: section.table_id(),
                    table_id_ext: section.table_id_ext(),
                    version: section.version(),
                });
            }
            if count != self.sections.len() {
                return Err(SectionError::InconsistentLastSection {
                    expected: first.last_section_number(),
                    actual: section.last_section_number(),
                });
            }
        } else {
            self.sections = vec![None; count];
        }
        if section.section_number() > section.last_section_number() {
            return Err(SectionError::InconsistentLastSection {
                expected: section.last_section_number(),
                actual: section.section_number(),
            });
        }
        let index = usize::from(section.section_number());
        self.sections[index] = Some(section);
        Ok(self.state())
    }

    pub fn state(&self) -> TableState {
        if self.sections.is_empty() {
            TableState::Empty
        } else if self.sections.iter().all(Option::is_some) {
            TableState::Complete
        } else {
            TableState::Collecting
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state() == TableState::Complete
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    pub fn table_id(&self) -> Option<Tid> {
        self.first().map(Section::table_id)
    }

    pub fn table_id_ext(&self) -> u16 {
        self.first().map_or(0xFFFF, Section::table_id_ext)
    }

    pub fn version(&self) -> u8 {
        self.first().map_or(0, Section::version)
    }

    pub fn is_short(&self) -> bool {
        self.first().is_some_and(|s| !s.is_long())
    }

    /// Expected number of sections.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn present_count(&self) -> usize {
        self.sections.iter().flatten().count()
    }

    pub fn missing_count(&self) -> usize {
        self.section_count() - self.present_count()
    }

    /// Present sections in section number order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().flatten()
    }

    pub fn section(&self, number: usize) -> Option<&Section> {
        self.sections.get(number).and_then(Option::as_ref)
    }

    pub fn total_size(&self) -> usize {
        self.sections().map(Section::size).sum()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_size());
        for s in self.sections() {
            out.extend_from_slice(s.content());
        }
        out
    }
}

/// Contract of every concrete table type.
pub trait TableCodec: fmt::Debug + Send + Sync {
    fn table_id(&self) -> Tid;

    /// Select the table id, for types registered under several ids.
    fn set_table_id(&mut self, _table_id: Tid) {}

    fn is_valid_table_id(&self, table_id: Tid) -> bool {
        table_id == self.table_id()
    }

    fn xml_name(&self) -> &'static str;

    /// Long sections, with extension, version and section numbers.
    fn is_long(&self) -> bool;

    /// Value of the private indicator. MPEG-defined tables return false.
    fn is_private(&self) -> bool {
        true
    }

    fn table_id_extension(&self) -> u16 {
        0xFFFF
    }

    fn version(&self) -> u8 {
        0
    }

    fn is_current(&self) -> bool {
        true
    }

    /// Short sections followed by a CRC32, verified on decode and computed
    /// on encode.
    fn use_short_crc(&self) -> bool {
        false
    }

    /// Maximum payload size of one section.
    fn max_payload_size(&self) -> usize {
        default_max_payload_size(self.is_long(), self.is_private(), self.use_short_crc())
    }

    fn clear(&mut self);

    /// Decode one section payload. Called for every section in section
    /// number order; a table may accumulate across sections.
    fn deserialize_payload(&mut self, buf: &mut PsiBuffer, section: &Section);

    fn serialize_payload(&self, out: &mut SectionSplitter) -> Result<(), CodecError>;

    /// Fill the attributes and children of `element`, which is already named.
    fn build_xml(&self, ctx: &CodecContext<'_>, element: &mut Element);

    fn analyze_xml(&mut self, ctx: &CodecContext<'_>, element: &Element) -> Result<(), XmlError>;

    fn as_any(&self) -> &dyn Any;
}

pub fn default_max_payload_size(is_long: bool, is_private: bool, short_crc: bool) -> usize {
    match (is_long, is_private) {
        (true, true) => MAX_PRIVATE_LONG_PAYLOAD_SIZE,
        (true, false) => MAX_PSI_LONG_PAYLOAD_SIZE,
        (false, true) => MAX_PRIVATE_SHORT_PAYLOAD_SIZE - if short_crc { CRC32_SIZE } else { 0 },
        (false, false) => MAX_PSI_SHORT_PAYLOAD_SIZE - if short_crc { CRC32_SIZE } else { 0 },
    }
}

/// `version` and `current` attributes of long tables.
pub fn set_version_attributes(element: &mut Element, version: u8, is_current: bool) {
    element.set_int_attribute("version", version);
    element.set_bool_attribute("current", is_current);
}

pub fn get_version_attributes(element: &Element) -> Result<(u8, bool), XmlError> {
    let version = element.get_int_attribute("version", false, 0u8, 0, 31)?;
    let current = element.get_bool_attribute("current", false, true)?;
    Ok((version, current))
}

/// Opaque passthrough for tables with no registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericTable {
    pub table_id: Tid,
    pub is_long: bool,
    pub is_private: bool,
    pub table_id_ext: u16,
    pub version: u8,
    pub is_current: bool,
    /// Raw section payloads, in section number order.
    pub payloads: Vec<Vec<u8>>,
}

impl Default for GenericTable {
    fn default() -> Self {
        GenericTable {
            table_id: 0xFF,
            is_long: false,
            is_private: true,
            table_id_ext: 0xFFFF,
            version: 0,
            is_current: true,
            payloads: Vec::new(),
        }
    }
}

impl GenericTable {
    pub fn from_binary(table: &BinaryTable) -> Self {
        let mut generic = GenericTable::default();
        for section in table.sections() {
            generic.absorb(section, section.payload().to_vec());
        }
        generic
    }

    pub fn create() -> Box<dyn TableCodec> {
        Box::<GenericTable>::default()
    }

    fn absorb(&mut self, section: &Section, payload: Vec<u8>) {
        if self.payloads.is_empty() {
            self.table_id = section.table_id();
            self.is_long = section.is_long();
            self.is_private = section.is_private();
            self.table_id_ext = section.table_id_ext();
            self.version = section.version();
            self.is_current = section.is_current();
        }
        self.payloads.push(payload);
    }
}

impl TableCodec for GenericTable {
    fn table_id(&self) -> Tid {
        self.table_id
    }

    fn set_table_id(&mut self, table_id: Tid) {
        self.table_id = table_id;
    }

    fn is_valid_table_id(&self, _table_id: Tid) -> bool {
        true
    }

    fn xml_name(&self) -> &'static str {
        if self.is_long {
            GENERIC_LONG_TABLE_XML_NAME
        } else {
            GENERIC_SHORT_TABLE_XML_NAME
        }
    }

    fn is_long(&self) -> bool {
        self.is_long
    }

    fn is_private(&self) -> bool {
        self.is_private
    }

    fn table_id_extension(&self) -> u16 {
        self.table_id_ext
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn is_current(&self) -> bool {
        self.is_current
    }

    fn clear(&mut self) {
        *self = GenericTable::default();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer, section: &Section) {
        let payload = buf.get_remaining_bytes();
        self.absorb(section, payload);
    }

    fn serialize_payload(&self, out: &mut SectionSplitter) -> Result<(), CodecError> {
        for (i, payload) in self.payloads.iter().enumerate() {
            if i > 0 {
                out.flush_section();
            }
            if payload.len() > out.max_payload_size() {
                return Err(CodecError::EntryTooLarge {
                    size: payload.len(),
                    capacity: out.max_payload_size(),
                });
            }
            out.buffer().put_bytes(payload);
        }
        Ok(())
    }

    fn build_xml(&self, _ctx: &CodecContext<'_>, element: &mut Element) {
        element.set_hex_attribute("table_id", self.table_id, 2);
        if self.is_long {
            element.set_hex_attribute("table_id_ext", self.table_id_ext, 4);
            set_version_attributes(element, self.version, self.is_current);
        }
        element.set_bool_attribute("private", self.is_private);
        if self.is_long {
            for payload in &self.payloads {
                element.add_child("section").set_hex_text(payload);
            }
        } else if let Some(payload) = self.payloads.first() {
            element.set_hex_text(payload);
        }
    }

    fn analyze_xml(&mut self, _ctx: &CodecContext<'_>, element: &Element) -> Result<(), XmlError> {
        self.is_long = element.has_name(GENERIC_LONG_TABLE_XML_NAME);
        self.table_id = element.get_int_attribute("table_id", true, 0, 0, 0xFF)?;
        self.is_private = element.get_bool_attribute("private", false, true)?;
        let max = default_max_payload_size(self.is_long, self.is_private, false);
        self.payloads.clear();
        if self.is_long {
            self.table_id_ext = element.get_int_attribute("table_id_ext", false, 0xFFFF, 0, 0xFFFF)?;
            (self.version, self.is_current) = get_version_attributes(element)?;
            for section in element.get_children("section", 1, 256)? {
                self.payloads.push(section.get_hex_text(0, max)?);
            }
        } else {
            self.payloads.push(element.get_hex_text(0, max)?);
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
    use crate::section::SectionHeader;

    fn long_section(number: u8, last: u8, version: u8) -> Section {
        let mut h = SectionHeader::long(0x42, true, 0x0010, version, true);
        h.section_number = number;
        h.last_section_number = last;
        Section::new(h, &[number], false).unwrap()
    }

    #[test]
    fn test_assembly_out_of_order() {
        let mut table = BinaryTable::new();
        assert_eq!(table.state(), TableState::Empty);
        assert_eq!(table.add_section(long_section(2, 2, 1)).unwrap(), TableState::Collecting);
        assert_eq!(table.add_section(long_section(0, 2, 1)).unwrap(), TableState::Collecting);
        assert_eq!(table.missing_count(), 1);
        assert_eq!(table.add_section(long_section(1, 2, 1)).unwrap(), TableState::Complete);
        let numbers: Vec<u8> = table.sections().map(|s| s.payload()[0]).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
        assert_eq!(table.table_id(), Some(0x42));
        assert_eq!(table.table_id_ext(), 0x0010);
    }

    #[test]
    fn test_foreign_section_rejected() {
        let mut table = BinaryTable::new();
        table.add_section(long_section(0, 1, 1)).unwrap();
        assert!(matches!(
            table.add_section(long_section(1, 1, 2)),
            Err(SectionError::ForeignSection { version: 2, .. })
        ));
        assert!(matches!(
            table.add_section(long_section(1, 3, 1)),
            Err(SectionError::InconsistentLastSection { expected: 1, actual: 3 })
        ));
    }

    #[test]
    fn test_generic_table_from_binary() {
        let table = BinaryTable::from_sections([long_section(0, 1, 4), long_section(1, 1, 4)]).unwrap();
        let generic = GenericTable::from_binary(&table);
        assert_eq!(generic.payloads, vec![vec![0], vec![1]]);
        assert_eq!(generic.version, 4);
        assert_eq!(generic.xml_name(), GENERIC_LONG_TABLE_XML_NAME);
    }

    #[test]
    fn test_default_payload_sizes() {
        assert_eq!(default_max_payload_size(true, false, false), 1012);
        assert_eq!(default_max_payload_size(true, true, false), 4084);
        assert_eq!(default_max_payload_size(false, false, true), 1017);
    }
}
