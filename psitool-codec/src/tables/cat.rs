//! Conditional Access Table (MPEG, table id 0x01).

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

pub const XML_NAME: &str = "CAT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cat {
    pub version: u8,
    pub is_current: bool,
    pub descs: DescriptorList,
}

impl Default for Cat {
    fn default() -> Self {
        Cat {
            version: 0,
            is_current: true,
            descs: DescriptorList::new(Some(tid::CAT)),
        }
    }
}

impl Cat {
    fn create() -> Box<dyn TableCodec> {
        Box::<Cat>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.register_table(TableRegistration {
        table_ids: vec![tid::CAT],
        standards: Standards::MPEG,
        xml_name: XML_NAME,
        factory: Cat::create,
        display: Some(display),
    });
}

fn display(disp: &mut TablesDisplay<'_, '_>, _section: &Section, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    disp.display_descriptor_list(buf, margin, tid::CAT)
}

impl TableCodec for Cat {
    fn table_id(&self) -> Tid {
        tid::CAT
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

    fn version(&self) -> u8 {
        self.version
    }

    fn is_current(&self) -> bool {
        self.is_current
    }

    fn clear(&mut self) {
        *self = Cat::default();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer, section: &Section) {
        self.version = section.version();
        self.is_current = section.is_current();
        buf.get_descriptor_list(&mut self.descs, None);
    }

    fn serialize_payload(&self, out: &mut SectionSplitter) -> Result<(), CodecError> {
        out.split_descriptors(&self.descs)
    }

    fn build_xml(&self, ctx: &CodecContext<'_>, element: &mut Element) {
        set_version_attributes(element, self.version, self.is_current);
        ctx.descriptor_list_to_xml(element, &self.descs);
    }

    fn analyze_xml(&mut self, ctx: &CodecContext<'_>, element: &Element) -> Result<(), XmlError> {
        self.clear();
        (self.version, self.is_current) = get_version_attributes(element)?;
        ctx.descriptors_from_xml(&mut self.descs, element, &[])?;
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

    #[test]
    fn test_descriptors_across_sections() {
        let mut cat = Cat::default();
        for i in 0..100u8 {
            // CA_descriptor: CA_system_id, reserved + EMM PID, private data
            cat.descs.push(Descriptor::new(0x09, vec![0x00, i, 0xE1, i, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap());
        }
        let ctx = CodecContext::new();
        let table = ctx.encode_table(&cat).unwrap();
        // 14-byte entries, 72 per 1012-byte section
        assert_eq!(table.section_count(), 2);
        let decoded = ctx.decode_table(&table).unwrap();
        assert_eq!(decoded.value.as_any().downcast_ref::<Cat>(), Some(&cat));
    }
}
