//! CA_identifier_descriptor (DVB, tag 0x53).

use std::any::Any;
use std::fmt;

use crate::buffer::PsiBuffer;
use crate::descriptor::DescriptorCodec;
use crate::error::XmlError;
use crate::identity::Edid;
use crate::registry::RegistryBuilder;
use crate::standards::Standards;
use crate::types::{did, MAX_DESCRIPTOR_PAYLOAD_SIZE};
use crate::xml::Element;

pub const XML_NAME: &str = "CA_identifier_descriptor";
const EDID: Edid = Edid::regular(did::CA_IDENTIFIER, Standards::DVB);
const MAX_ENTRIES: usize = MAX_DESCRIPTOR_PAYLOAD_SIZE / 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaIdentifierDescriptor {
    pub casids: Vec<u16>,
}

impl CaIdentifierDescriptor {
    fn create() -> Box<dyn DescriptorCodec> {
        Box::<CaIdentifierDescriptor>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.descriptor(EDID, XML_NAME, CaIdentifierDescriptor::create, Some(display));
}

fn display(out: &mut dyn fmt::Write, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    while buf.can_read_bytes(2) {
        writeln!(out, "{}CA System Id: 0x{:04X}", margin, buf.get_u16())?;
    }
    Ok(())
}

impl DescriptorCodec for CaIdentifierDescriptor {
    fn edid(&self) -> Edid {
        EDID
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn clear(&mut self) {
        self.casids.clear();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        while buf.can_read_bytes(2) {
            self.casids.push(buf.get_u16());
        }
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) {
        for &id in &self.casids {
            buf.put_u16(id);
        }
    }

    fn build_xml(&self, element: &mut Element) {
        for &id in &self.casids {
            element.add_child("CA_system_id").set_hex_attribute("value", id, 4);
        }
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.casids.clear();
        for child in element.get_children("CA_system_id", 0, MAX_ENTRIES)? {
            self.casids.push(child.get_int_attribute("value", true, 0, 0, 0xFFFF)?);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
