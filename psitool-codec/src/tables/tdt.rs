//! Time and Date Table (DVB, table id 0x70), a single short section.

use std::any::Any;
use std::fmt;

use chrono::NaiveDateTime;

use crate::buffer::{PsiBuffer, MJD_SIZE};
use crate::context::CodecContext;
use crate::display::TablesDisplay;
use crate::error::{CodecError, XmlError};
use crate::registry::{RegistryBuilder, TableRegistration};
use crate::section::Section;
use crate::splitter::SectionSplitter;
use crate::standards::Standards;
use crate::table::TableCodec;
use crate::tables::{get_date_time_attribute, set_date_time_attribute};
use crate::types::{tid, Tid};
use crate::xml::Element;

pub const XML_NAME: &str = "TDT";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tdt {
    pub utc_time: NaiveDateTime,
}

impl Tdt {
    pub fn new(utc_time: NaiveDateTime) -> Self {
        Tdt { utc_time }
    }

    fn create() -> Box<dyn TableCodec> {
        Box::<Tdt>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.register_table(TableRegistration {
        table_ids: vec![tid::TDT],
        standards: Standards::DVB,
        xml_name: XML_NAME,
        factory: Tdt::create,
        display: Some(display),
    });
}

fn display(disp: &mut TablesDisplay<'_, '_>, _section: &Section, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    if buf.can_read_bytes(MJD_SIZE) {
        let time = buf.get_mjd(MJD_SIZE);
        writeln!(disp.out(), "{}UTC time: {}", margin, time.format("%Y/%m/%d %H:%M:%S"))?;
    }
    Ok(())
}

impl TableCodec for Tdt {
    fn table_id(&self) -> Tid {
        tid::TDT
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn is_long(&self) -> bool {
        false
    }

    fn clear(&mut self) {
        *self = Tdt::default();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer, _section: &Section) {
        self.utc_time = buf.get_mjd(MJD_SIZE);
    }

    fn serialize_payload(&self, out: &mut SectionSplitter) -> Result<(), CodecError> {
        out.buffer().put_mjd(&self.utc_time, MJD_SIZE);
        Ok(())
    }

    fn build_xml(&self, _ctx: &CodecContext<'_>, element: &mut Element) {
        set_date_time_attribute(element, "UTC_time", &self.utc_time);
    }

    fn analyze_xml(&mut self, _ctx: &CodecContext<'_>, element: &Element) -> Result<(), XmlError> {
        self.utc_time = get_date_time_attribute(element, "UTC_time")?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 10, 1).unwrap().and_hms_opt(12, 34, 56).unwrap()
    }

    #[test]
    fn test_binary_section() {
        let ctx = CodecContext::new();
        let table = ctx.encode_table(&Tdt::new(noon())).unwrap();
        assert!(table.is_short());
        assert_eq!(
            table.to_bytes(),
            vec![0x70, 0x70, 0x05, 0xE9, 0xCD, 0x12, 0x34, 0x56]
        );
        let decoded = ctx.decode_table(&table).unwrap();
        assert_eq!(decoded.value.as_any().downcast_ref::<Tdt>(), Some(&Tdt::new(noon())));
    }

    #[test]
    fn test_xml() {
        let ctx = CodecContext::new();
        let table = ctx.encode_table(&Tdt::new(noon())).unwrap();
        let element = ctx.table_to_xml(&table).unwrap();
        assert_eq!(element.attribute("UTC_time"), Some("2022-10-01 12:34:56"));
        assert_eq!(ctx.table_from_xml(&element).unwrap(), table);
    }

    #[test]
    fn test_truncated_payload_is_malformed() {
        let ctx = CodecContext::new();
        let section = Section::from_bytes(vec![0x70, 0x70, 0x03, 0xE9, 0xCD, 0x12]).unwrap();
        let table = crate::table::BinaryTable::from_sections([section]).unwrap();
        let decoded = ctx.decode_table(&table).unwrap();
        assert!(!decoded.is_clean());
    }
}
