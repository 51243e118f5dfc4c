//! EACEM logical_channel_number_descriptor (private tag 0x83, PDS 0x00000028).

use std::any::Any;
use std::fmt;

use crate::buffer::PsiBuffer;
use crate::descriptor::DescriptorCodec;
use crate::error::XmlError;
use crate::identity::Edid;
use crate::registry::{DescriptorRegistration, RegistryBuilder};
use crate::types::{did, pds, MAX_DESCRIPTOR_PAYLOAD_SIZE};
use crate::xml::Element;

pub const XML_NAME: &str = "eacem_logical_channel_number_descriptor";
pub const LEGACY_XML_NAME: &str = "logical_channel_number_descriptor";
const EDID: Edid = Edid::private(did::EACEM_LOGICAL_CHANNEL_NUMBER, pds::EACEM);
const ENTRY_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalChannel {
    pub service_id: u16,
    pub visible: bool,
    /// 10 bits.
    pub lcn: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EacemLcnDescriptor {
    pub entries: Vec<LogicalChannel>,
}

impl EacemLcnDescriptor {
    fn create() -> Box<dyn DescriptorCodec> {
        Box::<EacemLcnDescriptor>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.register_descriptor(DescriptorRegistration {
        edid: EDID,
        xml_name: XML_NAME,
        legacy_xml_name: Some(LEGACY_XML_NAME),
        factory: EacemLcnDescriptor::create,
        display: Some(display),
    });
}

fn display(out: &mut dyn fmt::Write, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    while buf.can_read_bytes(ENTRY_SIZE) {
        let service_id = buf.get_u16();
        let visible = buf.get_bit();
        buf.skip_bits(5);
        let lcn = buf.get_bits(10);
        writeln!(
            out,
            "{}Service Id: 0x{:04X} ({}), Visible: {}, Channel number: {}",
            margin,
            service_id,
            service_id,
            if visible { "yes" } else { "no" },
            lcn
        )?;
    }
    Ok(())
}

impl DescriptorCodec for EacemLcnDescriptor {
    fn edid(&self) -> Edid {
        EDID
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        while buf.can_read_bytes(ENTRY_SIZE) {
            let service_id = buf.get_u16();
            let visible = buf.get_bit();
            buf.skip_bits(5);
            let lcn = buf.get_bits(10) as u16;
            self.entries.push(LogicalChannel { service_id, visible, lcn });
        }
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) {
        for entry in &self.entries {
            buf.put_u16(entry.service_id);
            buf.put_bit(entry.visible);
            buf.put_reserved(5);
            buf.put_bits_checked(u64::from(entry.lcn), 10);
        }
    }

    fn build_xml(&self, element: &mut Element) {
        for entry in &self.entries {
            let child = element.add_child("service");
            child.set_hex_attribute("service_id", entry.service_id, 4);
            child.set_int_attribute("logical_channel_number", entry.lcn);
            child.set_bool_attribute("visible_service", entry.visible);
        }
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.entries.clear();
        for child in element.get_children("service", 0, MAX_DESCRIPTOR_PAYLOAD_SIZE / ENTRY_SIZE)? {
            self.entries.push(LogicalChannel {
                service_id: child.get_int_attribute("service_id", true, 0, 0, 0xFFFF)?,
                lcn: child.get_int_attribute("logical_channel_number", true, 0, 0, 0x03FF)?,
                visible: child.get_bool_attribute("visible_service", false, true)?,
            });
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
