//! network_name_descriptor (DVB, tag 0x40).

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

pub const XML_NAME: &str = "network_name_descriptor";
const EDID: Edid = Edid::regular(did::NETWORK_NAME, Standards::DVB);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkNameDescriptor {
    pub name: String,
}

impl NetworkNameDescriptor {
    fn create() -> Box<dyn DescriptorCodec> {
        Box::<NetworkNameDescriptor>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.descriptor(EDID, XML_NAME, NetworkNameDescriptor::create, Some(display));
}

fn display(out: &mut dyn fmt::Write, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    writeln!(out, "{}Name: \"{}\"", margin, buf.get_utf8(buf.remaining_read_bytes()))
}

impl DescriptorCodec for NetworkNameDescriptor {
    fn edid(&self) -> Edid {
        EDID
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn clear(&mut self) {
        self.name.clear();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.name = buf.get_utf8(buf.remaining_read_bytes());
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) {
        buf.put_utf8(&self.name);
    }

    fn build_xml(&self, element: &mut Element) {
        element.set_attribute("network_name", self.name.as_str());
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.name = element
            .get_string_attribute("network_name", true, MAX_DESCRIPTOR_PAYLOAD_SIZE)?
            .unwrap_or_default();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CodecContext;
    use crate::descriptors::xml_round_trip;
    use crate::types::{pds, tid, Strictness};

    #[test]
    fn test_payload() {
        let mut desc = NetworkNameDescriptor::default();
        desc.deserialize_payload(&mut PsiBuffer::from_bytes(b"Tokyo"));
        assert_eq!(desc.name, "Tokyo");

        let mut buf = PsiBuffer::new(MAX_DESCRIPTOR_PAYLOAD_SIZE);
        desc.serialize_payload(&mut buf);
        assert_eq!(buf.as_written(), b"Tokyo");
    }

    #[test]
    fn test_xml_round_trip() {
        let ctx = CodecContext::new().with_standards(Standards::DVB).with_strictness(Strictness::Strict);
        let element = xml_round_trip(&ctx, did::NETWORK_NAME, b"Tokyo", Some(tid::NIT_ACTUAL), pds::NULL);
        assert!(element.has_name(XML_NAME));
        assert_eq!(element.attribute("network_name"), Some("Tokyo"));
    }
}
