//! private_data_specifier_descriptor (DVB, tag 0x5F).
//!
//! Sets the private data specifier of the descriptors following it in the
//! same list; see [`DescriptorList`](crate::descriptor::DescriptorList).

use std::any::Any;
use std::fmt;

use crate::buffer::PsiBuffer;
use crate::descriptor::DescriptorCodec;
use crate::error::XmlError;
use crate::identity::Edid;
use crate::registry::RegistryBuilder;
use crate::standards::Standards;
use crate::types::{did, Pds};
use crate::xml::Element;

pub const XML_NAME: &str = "private_data_specifier_descriptor";
const EDID: Edid = Edid::regular(did::PRIVATE_DATA_SPECIFIER, Standards::DVB);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivateDataSpecifierDescriptor {
    pub pds: Pds,
}

impl PrivateDataSpecifierDescriptor {
    fn create() -> Box<dyn DescriptorCodec> {
        Box::<PrivateDataSpecifierDescriptor>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.descriptor(EDID, XML_NAME, PrivateDataSpecifierDescriptor::create, Some(display));
}

/// Name of a registered private data specifier.
pub fn pds_name(pds: Pds) -> &'static str {
    match pds {
        0x0000_0002 => "BskyB",
        0x0000_0028 => "EACEM",
        0x0000_0029 => "NorDig",
        0x0000_233A => "OFCOM",
        _ => "unknown",
    }
}

fn display(out: &mut dyn fmt::Write, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    if buf.can_read_bytes(4) {
        let pds = buf.get_u32();
        writeln!(out, "{}Specifier: 0x{:08X} ({})", margin, pds, pds_name(pds))?;
    }
    Ok(())
}

impl DescriptorCodec for PrivateDataSpecifierDescriptor {
    fn edid(&self) -> Edid {
        EDID
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn clear(&mut self) {
        self.pds = 0;
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.pds = buf.get_u32();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) {
        buf.put_u32(self.pds);
    }

    fn build_xml(&self, element: &mut Element) {
        element.set_hex_attribute("private_data_specifier", self.pds, 8);
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.pds = element.get_int_attribute("private_data_specifier", true, 0, 0, u32::MAX)?;
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
    use crate::descriptor::DescriptorList;
    use crate::descriptors::xml_round_trip;
    use crate::types::{pds, tid, Strictness};

    #[test]
    fn test_xml_round_trip() {
        let ctx = CodecContext::new().with_standards(Standards::DVB).with_strictness(Strictness::Strict);
        let element = xml_round_trip(&ctx, did::PRIVATE_DATA_SPECIFIER, &[0, 0, 0, 0x28], Some(tid::NIT_ACTUAL), pds::NULL);
        assert!(element.has_name(XML_NAME));
        assert_eq!(element.attribute("private_data_specifier"), Some("0x00000028"));
    }

    #[test]
    fn test_governs_following_descriptors() {
        let mut list = DescriptorList::new(Some(tid::NIT_ACTUAL));
        list.add_bytes(&[0x40, 0x00, 0x5F, 0x04, 0x00, 0x00, 0x00, 0x28, 0x83, 0x00]).unwrap();
        assert_eq!(list.pds_at(0), pds::NULL);
        assert_eq!(list.pds_at(2), pds::EACEM);
    }
}
