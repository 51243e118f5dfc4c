//! registration_descriptor (MPEG, tag 0x05).

use std::any::Any;
use std::fmt;

use super::ascii_identifier;
use crate::buffer::PsiBuffer;
use crate::descriptor::DescriptorCodec;
use crate::error::XmlError;
use crate::identity::Edid;
use crate::registry::RegistryBuilder;
use crate::standards::Standards;
use crate::types::{did, MAX_DESCRIPTOR_PAYLOAD_SIZE};
use crate::xml::Element;

pub const XML_NAME: &str = "registration_descriptor";
const EDID: Edid = Edid::regular(did::REGISTRATION, Standards::MPEG);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationDescriptor {
    pub format_identifier: u32,
    pub additional_identification_info: Vec<u8>,
}

impl RegistrationDescriptor {
    fn create() -> Box<dyn DescriptorCodec> {
        Box::<RegistrationDescriptor>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.descriptor(EDID, XML_NAME, RegistrationDescriptor::create, Some(display));
}

fn display(out: &mut dyn fmt::Write, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    if !buf.can_read_bytes(4) {
        return Ok(());
    }
    let id = buf.get_u32();
    write!(out, "{}Format identifier: 0x{:08X}", margin, id)?;
    match ascii_identifier(id) {
        Some(text) => writeln!(out, " (\"{}\")", text)?,
        None => writeln!(out)?,
    }
    let info = buf.get_remaining_bytes();
    if !info.is_empty() {
        writeln!(out, "{}Additional identification info: {} bytes", margin, info.len())?;
    }
    Ok(())
}

impl DescriptorCodec for RegistrationDescriptor {
    fn edid(&self) -> Edid {
        EDID
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn clear(&mut self) {
        self.format_identifier = 0;
        self.additional_identification_info.clear();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.format_identifier = buf.get_u32();
        self.additional_identification_info = buf.get_remaining_bytes();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) {
        buf.put_u32(self.format_identifier);
        buf.put_bytes(&self.additional_identification_info);
    }

    fn build_xml(&self, element: &mut Element) {
        element.set_hex_attribute("format_identifier", self.format_identifier, 8);
        if !self.additional_identification_info.is_empty() {
            element
                .add_child("additional_identification_info")
                .set_hex_text(&self.additional_identification_info);
        }
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.format_identifier = element.get_int_attribute("format_identifier", true, 0, 0, u32::MAX)?;
        self.additional_identification_info = match element.get_children("additional_identification_info", 0, 1)?.first() {
            Some(info) => info.get_hex_text(0, MAX_DESCRIPTOR_PAYLOAD_SIZE - 4)?,
            None => Vec::new(),
        };
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
