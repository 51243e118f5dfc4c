//! Service Description Table (DVB, table ids 0x42 actual and 0x46 other).

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

pub const XML_NAME: &str = "SDT";

/// service_id, flags, running_status, free_CA_mode and loop length.
const SERVICE_HEADER_SIZE: usize = 5;

const RUNNING_STATUS_NAMES: [&str; 8] = [
    "undefined",
    "not-running",
    "starting",
    "pausing",
    "running",
    "off-air",
    "reserved-6",
    "reserved-7",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub service_id: u16,
    pub eit_schedule: bool,
    pub eit_present_following: bool,
    /// 3 bits.
    pub running_status: u8,
    pub free_ca_mode: bool,
    pub descs: DescriptorList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sdt {
    pub table_id: Tid,
    pub ts_id: u16,
    pub onid: u16,
    pub version: u8,
    pub is_current: bool,
    pub services: Vec<Service>,
}

impl Default for Sdt {
    fn default() -> Self {
        Sdt::new(true)
    }
}

impl Sdt {
    pub fn new(is_actual: bool) -> Self {
        Sdt {
            table_id: if is_actual { tid::SDT_ACTUAL } else { tid::SDT_OTHER },
            ts_id: 0,
            onid: 0,
            version: 0,
            is_current: true,
            services: Vec::new(),
        }
    }

    pub fn is_actual(&self) -> bool {
        self.table_id == tid::SDT_ACTUAL
    }

    /// The entry of a service, created with default flags if absent.
    pub fn service_mut(&mut self, service_id: u16) -> &mut Service {
        let index = match self.services.iter().position(|s| s.service_id == service_id) {
            Some(index) => index,
            None => {
                self.services.push(Service {
                    service_id,
                    eit_schedule: false,
                    eit_present_following: false,
                    running_status: 0,
                    free_ca_mode: false,
                    descs: DescriptorList::new(Some(self.table_id)),
                });
                self.services.len() - 1
            }
        };
        &mut self.services[index]
    }

    fn create() -> Box<dyn TableCodec> {
        Box::<Sdt>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.register_table(TableRegistration {
        table_ids: vec![tid::SDT_ACTUAL, tid::SDT_OTHER],
        standards: Standards::DVB,
        xml_name: XML_NAME,
        factory: Sdt::create,
        display: Some(display),
    });
}

fn display(disp: &mut TablesDisplay<'_, '_>, section: &Section, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    if !buf.can_read_bytes(3) {
        return Ok(());
    }
    let onid = buf.get_u16();
    buf.skip_bits(8);
    writeln!(
        disp.out(),
        "{}Transport Stream Id: 0x{:04X} ({}), Original Network Id: 0x{:04X} ({})",
        margin,
        section.table_id_ext(),
        section.table_id_ext(),
        onid,
        onid
    )?;
    let inner = format!("{}  ", margin);
    while buf.can_read_bytes(SERVICE_HEADER_SIZE) {
        let service_id = buf.get_u16();
        buf.skip_bits(6);
        let eit_schedule = buf.get_bit();
        let eit_pf = buf.get_bit();
        let running = buf.get_bits(3) as usize;
        let free_ca = buf.get_bit();
        writeln!(
            disp.out(),
            "{}Service Id: 0x{:04X} ({}), EITs: {}, EITp/f: {}, CA mode: {}, running status: {}",
            margin,
            service_id,
            service_id,
            if eit_schedule { "yes" } else { "no" },
            if eit_pf { "yes" } else { "no" },
            if free_ca { "controlled" } else { "free" },
            RUNNING_STATUS_NAMES[running]
        )?;
        disp.display_descriptor_list_with_length(buf, &inner, section.table_id(), 12)?;
    }
    Ok(())
}

impl TableCodec for Sdt {
    fn table_id(&self) -> Tid {
        self.table_id
    }

    fn set_table_id(&mut self, table_id: Tid) {
        if self.is_valid_table_id(table_id) {
            self.table_id = table_id;
            for service in &mut self.services {
                service.descs.set_table_id(Some(table_id));
            }
        }
    }

    fn is_valid_table_id(&self, table_id: Tid) -> bool {
        table_id == tid::SDT_ACTUAL || table_id == tid::SDT_OTHER
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn is_long(&self) -> bool {
        true
    }

    fn table_id_extension(&self) -> u16 {
        self.ts_id
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn is_current(&self) -> bool {
        self.is_current
    }

    fn clear(&mut self) {
        *self = Sdt::new(self.is_actual());
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer, section: &Section) {
        self.ts_id = section.table_id_ext();
        self.version = section.version();
        self.is_current = section.is_current();
        self.onid = buf.get_u16();
        buf.skip_bits(8);
        while buf.can_read() {
            let service_id = buf.get_u16();
            buf.skip_bits(6);
            let eit_schedule = buf.get_bit();
            let eit_present_following = buf.get_bit();
            let running_status = buf.get_bits(3) as u8;
            let free_ca_mode = buf.get_bit();
            let mut descs = DescriptorList::new(Some(self.table_id));
            buf.get_descriptor_list_with_length(&mut descs, 12);
            if buf.has_error() {
                break;
            }
            let service = self.service_mut(service_id);
            service.eit_schedule = eit_schedule;
            service.eit_present_following = eit_present_following;
            service.running_status = running_status;
            service.free_ca_mode = free_ca_mode;
            service.descs.merge(&descs);
        }
    }

    fn serialize_payload(&self, out: &mut SectionSplitter) -> Result<(), CodecError> {
        out.buffer().put_u16(self.onid);
        out.buffer().put_u8(0xFF);
        out.mark_fixed_header();
        for service in &self.services {
            out.begin_entry(SERVICE_HEADER_SIZE + service.descs.total_size())?;
            let buf = out.buffer();
            buf.put_u16(service.service_id);
            buf.put_reserved(6);
            buf.put_bit(service.eit_schedule);
            buf.put_bit(service.eit_present_following);
            buf.put_bits_checked(u64::from(service.running_status), 3);
            buf.put_bit(service.free_ca_mode);
            buf.put_descriptor_list_with_length(&service.descs, 12);
        }
        Ok(())
    }

    fn build_xml(&self, ctx: &CodecContext<'_>, element: &mut Element) {
        set_version_attributes(element, self.version, self.is_current);
        element.set_hex_attribute("transport_stream_id", self.ts_id, 4);
        element.set_hex_attribute("original_network_id", self.onid, 4);
        element.set_bool_attribute("actual", self.is_actual());
        for service in &self.services {
            let child = element.add_child("service");
            child.set_hex_attribute("service_id", service.service_id, 4);
            child.set_bool_attribute("EIT_schedule", service.eit_schedule);
            child.set_bool_attribute("EIT_present_following", service.eit_present_following);
            child.set_bool_attribute("CA_mode", service.free_ca_mode);
            child.set_attribute("running_status", RUNNING_STATUS_NAMES[usize::from(service.running_status & 0x07)]);
            ctx.descriptor_list_to_xml(child, &service.descs);
        }
    }

    fn analyze_xml(&mut self, ctx: &CodecContext<'_>, element: &Element) -> Result<(), XmlError> {
        *self = Sdt::new(element.get_bool_attribute("actual", false, true)?);
        (self.version, self.is_current) = get_version_attributes(element)?;
        self.ts_id = element.get_int_attribute("transport_stream_id", true, 0, 0, 0xFFFF)?;
        self.onid = element.get_int_attribute("original_network_id", true, 0, 0, 0xFFFF)?;
        for child in element.get_children("service", 0, usize::MAX)? {
            let running_status = match child.attribute("running_status") {
                None => 0,
                Some(text) => match RUNNING_STATUS_NAMES.iter().position(|n| n.eq_ignore_ascii_case(text.trim())) {
                    Some(index) => index as u8,
                    None => child.get_int_attribute("running_status", true, 0, 0, 7)?,
                },
            };
            let mut descs = DescriptorList::new(Some(self.table_id));
            ctx.descriptors_from_xml(&mut descs, child, &[])?;
            let service = self.service_mut(child.get_int_attribute("service_id", true, 0, 0, 0xFFFF)?);
            service.eit_schedule = child.get_bool_attribute("EIT_schedule", false, false)?;
            service.eit_present_following = child.get_bool_attribute("EIT_present_following", false, false)?;
            service.free_ca_mode = child.get_bool_attribute("CA_mode", false, false)?;
            service.running_status = running_status;
            service.descs.merge(&descs);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::service::ServiceDescriptor;
    use crate::xml::Element;

    fn sample(count: u16) -> Sdt {
        let ctx = CodecContext::new();
        let mut sdt = Sdt::new(true);
        sdt.ts_id = 0x7FE0;
        sdt.onid = 0x7FE0;
        for i in 0..count {
            let desc = ctx
                .encode_descriptor(&ServiceDescriptor::new(0x01, "NHK", &format!("Service {:03}", i)))
                .unwrap();
            let service = sdt.service_mut(0x0400 + i);
            service.running_status = 4;
            service.eit_present_following = true;
            service.descs.push(desc);
        }
        sdt
    }

    #[test]
    fn test_service_entry_layout() {
        let ctx = CodecContext::new();
        let table = ctx.encode_table(&sample(1)).unwrap();
        let payload = table.section(0).unwrap().payload();
        assert_eq!(&payload[..3], &[0x7F, 0xE0, 0xFF]);
        // service_id, reserved + EIT_pf, running + free_CA + length 19
        assert_eq!(&payload[3..8], &[0x04, 0x00, 0xFD, 0x80, 0x13]);
    }

    #[test]
    fn test_split_repeats_fixed_header() {
        let ctx = CodecContext::new();
        // 24 bytes per service, (4084 - 3) / 24 = 170 per section
        let sdt = sample(200);
        let table = ctx.encode_table(&sdt).unwrap();
        assert_eq!(table.section_count(), 2);
        for section in table.sections() {
            assert_eq!(&section.payload()[..3], &[0x7F, 0xE0, 0xFF]);
        }
        assert_eq!(table.section(1).unwrap().payload().len(), 3 + 30 * 24);
        let decoded = ctx.decode_table(&table).unwrap();
        assert_eq!(decoded.value.as_any().downcast_ref::<Sdt>(), Some(&sdt));
    }

    #[test]
    fn test_xml_document() {
        let ctx = CodecContext::new();
        let doc = Element::parse_document(
            r#"<SDT version="1" transport_stream_id="0x7FE0" original_network_id="0x7FE0">
                 <service service_id="0x0400" EIT_present_following="true" running_status="running">
                   <service_descriptor service_type="0x01" service_provider_name="NHK" service_name="G1"/>
                 </service>
               </SDT>"#,
        )
        .unwrap();
        let table = ctx.table_from_xml(&doc).unwrap();
        let decoded = ctx.decode_table(&table).unwrap();
        let sdt = decoded.value.as_any().downcast_ref::<Sdt>().unwrap();
        assert_eq!(sdt.version, 1);
        assert_eq!(sdt.services[0].running_status, 4);
        assert_eq!(sdt.services[0].descs.get(0).unwrap().payload(), &[0x01, 3, b'N', b'H', b'K', 2, b'G', b'1']);
    }
}
