//! ISDB_terrestrial_delivery_system_descriptor (ISDB, tag 0xFA).
//!
//! Frequencies are carried in units of 1/7 MHz and exposed in Hz.

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

pub const XML_NAME: &str = "ISDB_terrestrial_delivery_system_descriptor";
const EDID: Edid = Edid::regular(did::ISDB_TERRESTRIAL_DELIVERY, Standards::ISDB);
const MAX_FREQUENCIES: usize = (MAX_DESCRIPTOR_PAYLOAD_SIZE - 2) / 2;

fn to_hz(units: u16) -> u64 {
    u64::from(units) * 1_000_000 / 7
}

fn from_hz(hz: u64) -> u64 {
    (hz * 7 + 500_000) / 1_000_000
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsdbTerrestrialDeliveryDescriptor {
    /// 12 bits.
    pub area_code: u16,
    /// 2 bits.
    pub guard_interval: u8,
    /// 2 bits.
    pub transmission_mode: u8,
    /// In Hz.
    pub frequencies: Vec<u64>,
}

impl IsdbTerrestrialDeliveryDescriptor {
    fn create() -> Box<dyn DescriptorCodec> {
        Box::<IsdbTerrestrialDeliveryDescriptor>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.descriptor(EDID, XML_NAME, IsdbTerrestrialDeliveryDescriptor::create, Some(display));
}

fn guard_interval_name(value: u8) -> &'static str {
    ["1/32", "1/16", "1/8", "1/4"][usize::from(value & 0x03)]
}

fn display(out: &mut dyn fmt::Write, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    if !buf.can_read_bytes(2) {
        return Ok(());
    }
    let area_code = buf.get_bits(12);
    let guard_interval = buf.get_bits(2) as u8;
    let mode = buf.get_bits(2);
    writeln!(
        out,
        "{}Area code: 0x{:03X}, guard interval: {}, transmission mode: {}",
        margin,
        area_code,
        guard_interval_name(guard_interval),
        mode + 1
    )?;
    while buf.can_read_bytes(2) {
        let units = buf.get_u16();
        writeln!(out, "{}Frequency: {} Hz", margin, to_hz(units))?;
    }
    Ok(())
}

impl DescriptorCodec for IsdbTerrestrialDeliveryDescriptor {
    fn edid(&self) -> Edid {
        EDID
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn clear(&mut self) {
        *self = IsdbTerrestrialDeliveryDescriptor::default();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.area_code = buf.get_bits(12) as u16;
        self.guard_interval = buf.get_bits(2) as u8;
        self.transmission_mode = buf.get_bits(2) as u8;
        while buf.can_read_bytes(2) {
            self.frequencies.push(to_hz(buf.get_u16()));
        }
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) {
        buf.put_bits_checked(u64::from(self.area_code), 12);
        buf.put_bits_checked(u64::from(self.guard_interval), 2);
        buf.put_bits_checked(u64::from(self.transmission_mode), 2);
        for &hz in &self.frequencies {
            buf.put_bits_checked(from_hz(hz), 16);
        }
    }

    fn build_xml(&self, element: &mut Element) {
        element.set_hex_attribute("area_code", self.area_code, 3);
        element.set_int_attribute("guard_interval", self.guard_interval);
        element.set_int_attribute("transmission_mode", self.transmission_mode);
        for &hz in &self.frequencies {
            element.add_child("frequency").set_attribute("value", hz.to_string());
        }
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.clear();
        self.area_code = element.get_int_attribute("area_code", true, 0, 0, 0x0FFF)?;
        self.guard_interval = element.get_int_attribute("guard_interval", true, 0, 0, 3)?;
        self.transmission_mode = element.get_int_attribute("transmission_mode", true, 0, 0, 3)?;
        for child in element.get_children("frequency", 0, MAX_FREQUENCIES)? {
            self.frequencies.push(child.get_int_attribute("value", true, 0, 0, to_hz(u16::MAX))?);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
