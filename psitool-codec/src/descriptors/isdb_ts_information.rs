//! TS_information_descriptor (ISDB, tag 0xCD).

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

pub const XML_NAME: &str = "TS_information_descriptor";
const EDID: Edid = Edid::regular(did::ISDB_TS_INFORMATION, Standards::ISDB);
const MAX_TS_NAME_SIZE: usize = 0x3F;
const MAX_TRANSMISSION_TYPES: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmissionType {
    pub transmission_type_info: u8,
    pub service_ids: Vec<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TsInformationDescriptor {
    pub remote_control_key_id: u8,
    pub ts_name: String,
    pub transmission_types: Vec<TransmissionType>,
    pub reserved_future_use: Vec<u8>,
}

impl TsInformationDescriptor {
    fn create() -> Box<dyn DescriptorCodec> {
        Box::<TsInformationDescriptor>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.descriptor(EDID, XML_NAME, TsInformationDescriptor::create, Some(display));
}

fn display(out: &mut dyn fmt::Write, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    if !buf.can_read_bytes(2) {
        return Ok(());
    }
    writeln!(out, "{}Remote control key id: {}", margin, buf.get_u8())?;
    let name_len = buf.get_bits(6) as usize;
    let count = buf.get_bits(2);
    writeln!(out, "{}TS name: \"{}\"", margin, buf.get_utf8(name_len))?;
    for _ in 0..count {
        if !buf.can_read_bytes(2) {
            break;
        }
        let info = buf.get_u8();
        let services = buf.get_u8();
        write!(out, "{}Transmission type info: 0x{:02X}, services:", margin, info)?;
        for _ in 0..services {
            if !buf.can_read_bytes(2) {
                break;
            }
            write!(out, " 0x{:04X}", buf.get_u16())?;
        }
        writeln!(out)?;
    }
    Ok(())
}

impl DescriptorCodec for TsInformationDescriptor {
    fn edid(&self) -> Edid {
        EDID
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn clear(&mut self) {
        *self = TsInformationDescriptor::default();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.remote_control_key_id = buf.get_u8();
        let name_len = buf.get_bits(6) as usize;
        let count = buf.get_bits(2);
        self.ts_name = buf.get_utf8(name_len);
        for _ in 0..count {
            if !buf.can_read() {
                break;
            }
            let transmission_type_info = buf.get_u8();
            let services = buf.get_u8();
            let service_ids = (0..services).map(|_| buf.get_u16()).collect();
            self.transmission_types.push(TransmissionType {
                transmission_type_info,
                service_ids,
            });
        }
        self.reserved_future_use = buf.get_remaining_bytes();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) {
        if self.ts_name.len() > MAX_TS_NAME_SIZE || self.transmission_types.len() > MAX_TRANSMISSION_TYPES {
            buf.set_user_error();
            return;
        }
        buf.put_u8(self.remote_control_key_id);
        buf.put_bits(self.ts_name.len() as u64, 6);
        buf.put_bits(self.transmission_types.len() as u64, 2);
        buf.put_utf8(&self.ts_name);
        for tt in &self.transmission_types {
            buf.put_u8(tt.transmission_type_info);
            buf.put_bits_checked(tt.service_ids.len() as u64, 8);
            for &id in &tt.service_ids {
                buf.put_u16(id);
            }
        }
        buf.put_bytes(&self.reserved_future_use);
    }

    fn build_xml(&self, element: &mut Element) {
        element.set_int_attribute("remote_control_key_id", self.remote_control_key_id);
        element.set_attribute("ts_name", self.ts_name.as_str());
        for tt in &self.transmission_types {
            let child = element.add_child("transmission_type");
            child.set_hex_attribute("transmission_type_info", tt.transmission_type_info, 2);
            for &id in &tt.service_ids {
                child.add_child("service").set_hex_attribute("id", id, 4);
            }
        }
        if !self.reserved_future_use.is_empty() {
            element.add_child("reserved_future_use").set_hex_text(&self.reserved_future_use);
        }
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.clear();
        self.remote_control_key_id = element.get_int_attribute("remote_control_key_id", true, 0, 0, 0xFF)?;
        self.ts_name = element
            .get_string_attribute("ts_name", false, MAX_TS_NAME_SIZE)?
            .unwrap_or_default();
        for child in element.get_children("transmission_type", 0, MAX_TRANSMISSION_TYPES)? {
            let mut tt = TransmissionType {
                transmission_type_info: child.get_int_attribute("transmission_type_info", true, 0, 0, 0xFF)?,
                service_ids: Vec::new(),
            };
            for service in child.get_children("service", 0, 0xFF)? {
                tt.service_ids.push(service.get_int_attribute("id", true, 0, 0, 0xFFFF)?);
            }
            self.transmission_types.push(tt);
        }
        if let Some(reserved) = element.get_children("reserved_future_use", 0, 1)?.first() {
            self.reserved_future_use = reserved.get_hex_text(0, MAX_DESCRIPTOR_PAYLOAD_SIZE)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
