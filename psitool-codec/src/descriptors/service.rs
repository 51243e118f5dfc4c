//! service_descriptor (DVB, tag 0x48).

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

pub const XML_NAME: &str = "service_descriptor";
const EDID: Edid = Edid::regular(did::SERVICE, Standards::DVB);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub service_type: u8,
    pub provider_name: String,
    pub service_name: String,
}

impl ServiceDescriptor {
    pub fn new(service_type: u8, provider_name: &str, service_name: &str) -> Self {
        ServiceDescriptor {
            service_type,
            provider_name: provider_name.to_string(),
            service_name: service_name.to_string(),
        }
    }

    fn create() -> Box<dyn DescriptorCodec> {
        Box::<ServiceDescriptor>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.descriptor(EDID, XML_NAME, ServiceDescriptor::create, Some(display));
}

/// Name of a DVB service type.
pub fn service_type_name(service_type: u8) -> &'static str {
    match service_type {
        0x01 => "Digital television service",
        0x02 => "Digital radio sound service",
        0x03 => "Teletext service",
        0x0A => "Advanced codec digital radio sound service",
        0x0C => "Data broadcast service",
        0x11 => "MPEG-2 HD digital television service",
        0x16 => "H.264/AVC SD digital television service",
        0x19 => "H.264/AVC HD digital television service",
        0x1F => "HEVC digital television service",
        _ => "unknown",
    }
}

fn display(out: &mut dyn fmt::Write, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    if !buf.can_read_bytes(1) {
        return Ok(());
    }
    let service_type = buf.get_u8();
    writeln!(out, "{}Service type: 0x{:02X} ({})", margin, service_type, service_type_name(service_type))?;
    writeln!(out, "{}Provider: \"{}\"", margin, buf.get_utf8_with_length())?;
    writeln!(out, "{}Service: \"{}\"", margin, buf.get_utf8_with_length())
}

impl DescriptorCodec for ServiceDescriptor {
    fn edid(&self) -> Edid {
        EDID
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn clear(&mut self) {
        *self = ServiceDescriptor::default();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.service_type = buf.get_u8();
        self.provider_name = buf.get_utf8_with_length();
        self.service_name = buf.get_utf8_with_length();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) {
        buf.put_u8(self.service_type);
        buf.put_utf8_with_length(&self.provider_name);
        buf.put_utf8_with_length(&self.service_name);
    }

    fn build_xml(&self, element: &mut Element) {
        element.set_hex_attribute("service_type", self.service_type, 2);
        element.set_attribute("service_provider_name", self.provider_name.as_str());
        element.set_attribute("service_name", self.service_name.as_str());
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        let max = MAX_DESCRIPTOR_PAYLOAD_SIZE - 3;
        self.service_type = element.get_int_attribute("service_type", true, 0, 0, 0xFF)?;
        self.provider_name = element
            .get_string_attribute("service_provider_name", false, max)?
            .unwrap_or_default();
        self.service_name = element
            .get_string_attribute("service_name", false, max)?
            .unwrap_or_default();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
