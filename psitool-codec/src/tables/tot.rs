//! Time Offset Table (DVB, table id 0x73).
//!
//! A short section ending with a CRC32:
//!
//! ```text
//! UTC_time(40) reserved(4) descriptors_loop_length(12) descriptors CRC_32
//! ```

use std::any::Any;
use std::fmt;

use chrono::NaiveDateTime;

use crate::buffer::{PsiBuffer, MJD_SIZE};
use crate::context::CodecContext;
use crate::descriptor::DescriptorList;
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

pub const XML_NAME: &str = "TOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tot {
    pub utc_time: NaiveDateTime,
    pub descs: DescriptorList,
}

impl Default for Tot {
    fn default() -> Self {
        Tot::new(NaiveDateTime::default())
    }
}

impl Tot {
    pub fn new(utc_time: NaiveDateTime) -> Self {
        Tot {
            utc_time,
            descs: DescriptorList::new(Some(tid::TOT)),
        }
    }

    fn create() -> Box<dyn TableCodec> {
        Box::<Tot>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.register_table(TableRegistration {
        table_ids: vec![tid::TOT],
        standards: Standards::DVB,
        xml_name: XML_NAME,
        factory: Tot::create,
        display: Some(display),
    });
}

fn display(disp: &mut TablesDisplay<'_, '_>, _section: &Section, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    if !buf.can_read_bytes(MJD_SIZE) {
        return Ok(());
    }
    let time = buf.get_mjd(MJD_SIZE);
    writeln!(disp.out(), "{}UTC time: {}", margin, time.format("%Y/%m/%d %H:%M:%S"))?;
    disp.display_descriptor_list_with_length(buf, margin, tid::TOT, 12)
}

impl TableCodec for Tot {
    fn table_id(&self) -> Tid {
        tid::TOT
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn is_long(&self) -> bool {
        false
    }

    fn use_short_crc(&self) -> bool {
        true
    }

    fn clear(&mut self) {
        *self = Tot::default();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer, _section: &Section) {
        self.utc_time = buf.get_mjd(MJD_SIZE);
        buf.get_descriptor_list_with_length(&mut self.descs, 12);
    }

    fn serialize_payload(&self, out: &mut SectionSplitter) -> Result<(), CodecError> {
        // Everything goes into one section.
        out.begin_entry(MJD_SIZE + 2 + self.descs.total_size())?;
        let buf = out.buffer();
        buf.put_mjd(&self.utc_time, MJD_SIZE);
        buf.put_descriptor_list_with_length(&self.descs, 12);
        Ok(())
    }

    fn build_xml(&self, ctx: &CodecContext<'_>, element: &mut Element) {
        set_date_time_attribute(element, "UTC_time", &self.utc_time);
        ctx.descriptor_list_to_xml(element, &self.descs);
    }

    fn analyze_xml(&mut self, ctx: &CodecContext<'_>, element: &Element) -> Result<(), XmlError> {
        self.utc_time = get_date_time_attribute(element, "UTC_time")?;
        ctx.descriptors_from_xml(&mut self.descs, element, &[])?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
