//! avail_descriptor (SCTE 35, tag 0x00 inside a splice_info_section only).

use std::any::Any;
use std::fmt;

use super::ascii_identifier;
use crate::buffer::PsiBuffer;
use crate::descriptor::DescriptorCodec;
use crate::error::XmlError;
use crate::identity::Edid;
use crate::registry::RegistryBuilder;
use crate::standards::Standards;
use crate::types::{did, tid};
use crate::xml::Element;

pub const XML_NAME: &str = "avail_descriptor";
const EDID: Edid = Edid::table_specific(did::SCTE_AVAIL, tid::SCTE_SPLICE_INFO, Standards::SCTE);

/// "CUEI"
pub const SPLICE_ID: u32 = 0x4355_4549;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailDescriptor {
    pub identifier: u32,
    pub provider_avail_id: u32,
}

impl Default for AvailDescriptor {
    fn default() -> Self {
        AvailDescriptor {
            identifier: SPLICE_ID,
            provider_avail_id: 0,
        }
    }
}

impl AvailDescriptor {
    fn create() -> Box<dyn DescriptorCodec> {
        Box::<AvailDescriptor>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.descriptor(EDID, XML_NAME, AvailDescriptor::create, Some(display));
}

fn display(out: &mut dyn fmt::Write, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    if !buf.can_read_bytes(8) {
        return Ok(());
    }
    let id = buf.get_u32();
    writeln!(
        out,
        "{}Identifier: 0x{:08X} (\"{}\")",
        margin,
        id,
        ascii_identifier(id).unwrap_or_default()
    )?;
    writeln!(out, "{}Provider avail id: {}", margin, buf.get_u32())
}

impl DescriptorCodec for AvailDescriptor {
    fn edid(&self) -> Edid {
        EDID
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn clear(&mut self) {
        *self = AvailDescriptor::default();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.identifier = buf.get_u32();
        self.provider_avail_id = buf.get_u32();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) {
        buf.put_u32(self.identifier);
        buf.put_u32(self.provider_avail_id);
    }

    fn build_xml(&self, element: &mut Element) {
        element.set_hex_attribute("identifier", self.identifier, 8);
        element.set_int_attribute("provider_avail_id", self.provider_avail_id);
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.identifier = element.get_int_attribute("identifier", false, SPLICE_ID, 0, u32::MAX)?;
        self.provider_avail_id = element.get_int_attribute("provider_avail_id", true, 0, 0, u32::MAX)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
