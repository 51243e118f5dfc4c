//! Human-readable dump of tables, sections and descriptors.
//!
//! Registered types print themselves through their display callbacks.
//! Unknown or malformed content is hex-dumped and unread bytes are flagged.

use std::fmt;

use crate::buffer::PsiBuffer;
use crate::context::CodecContext;
use crate::descriptor::{Descriptor, DescriptorList};
use crate::error::CodecError;
use crate::section::Section;
use crate::table::BinaryTable;
use crate::types::{Pds, Tid};
use crate::xml::Element;

pub struct TablesDisplay<'a, 'r> {
    ctx: CodecContext<'r>,
    out: &'a mut dyn fmt::Write,
}

impl<'a, 'r> TablesDisplay<'a, 'r> {
    pub fn new(ctx: CodecContext<'r>, out: &'a mut dyn fmt::Write) -> Self {
        TablesDisplay { ctx, out }
    }

    pub fn context(&self) -> &CodecContext<'r> {
        &self.ctx
    }

    /// Output stream, for display callbacks.
    pub fn out(&mut self) -> &mut dyn fmt::Write {
        &mut *self.out
    }

    pub fn display_table(&mut self, table: &BinaryTable, margin: &str) -> fmt::Result {
        let Some(table_id) = table.table_id() else {
            return writeln!(self.out, "{}* Empty table", margin);
        };
        let name = self
            .ctx
            .registry()
            .resolve_table(table_id, self.ctx.standards())
            .map_or("unknown table", |reg| reg.xml_name);
        writeln!(self.out, "{}* {}, TID 0x{:02X} ({})", margin, name, table_id, table_id)?;
        if !table.is_short() {
            writeln!(
                self.out,
                "{}  Version: {}, sections: {}, total size: {} bytes",
                margin,
                table.version(),
                table.section_count(),
                table.total_size()
            )?;
        }
        if !table.is_complete() {
            writeln!(
                self.out,
                "{}  Incomplete table: {} of {} sections",
                margin,
                table.present_count(),
                table.section_count()
            )?;
        }
        let inner = format!("{}  ", margin);
        for section in table.sections() {
            self.display_section(section, &inner)?;
        }
        Ok(())
    }

    pub fn display_section(&mut self, section: &Section, margin: &str) -> fmt::Result {
        if section.is_long() {
            writeln!(
                self.out,
                "{}- Section {}/{}, TID ext: 0x{:04X}, version: {}, {}, {} bytes",
                margin,
                section.section_number(),
                section.last_section_number(),
                section.table_id_ext(),
                section.version(),
                if section.is_current() { "current" } else { "next" },
                section.size()
            )?;
        } else {
            writeln!(self.out, "{}- Short section, TID 0x{:02X}, {} bytes", margin, section.table_id(), section.size())?;
        }

        let inner = format!("{}  ", margin);
        let reg = self
            .ctx
            .registry()
            .resolve_table(section.table_id(), self.ctx.standards());
        let short_crc = reg.is_some_and(|r| (r.factory)().use_short_crc());
        let payload = if short_crc {
            match section.short_payload_checked() {
                Ok(payload) => payload,
                Err(e) => {
                    writeln!(self.out, "{}{}", inner, e)?;
                    section.payload()
                }
            }
        } else {
            section.payload()
        };

        match reg.and_then(|r| r.display) {
            Some(display) => {
                let mut buf = PsiBuffer::from_bytes(payload);
                display(self, section, &mut buf, &inner)?;
                self.display_extra_data(&mut buf, &inner)
            }
            None => self.out.write_str(&hex_dump(payload, &inner)),
        }
    }

    /// Display the rest of `buf` as a descriptor loop.
    pub fn display_descriptor_list(&mut self, buf: &mut PsiBuffer, margin: &str, table_id: Tid) -> fmt::Result {
        let data = buf.get_remaining_bytes();
        let mut list = DescriptorList::new(Some(table_id));
        let result = list.add_bytes(&data);
        for (index, (desc, pds)) in list.iter_with_pds().enumerate() {
            self.display_descriptor(desc, index, Some(table_id), pds, margin)?;
        }
        if let Err(CodecError::MalformedDescriptorLoop { offset, remaining }) = result {
            writeln!(self.out, "{}- Malformed descriptor, {} bytes left:", margin, remaining)?;
            self.out.write_str(&hex_dump(&data[offset..], margin))?;
        }
        Ok(())
    }

    /// Display a descriptor loop preceded by a `length_bits` length field.
    pub fn display_descriptor_list_with_length(
        &mut self,
        buf: &mut PsiBuffer,
        margin: &str,
        table_id: Tid,
        length_bits: usize,
    ) -> fmt::Result {
        if buf.read_is_byte_aligned() && length_bits < 16 {
            buf.skip_bits(16 - length_bits);
        }
        buf.push_read_region(length_bits);
        let result = self.display_descriptor_list(buf, margin, table_id);
        buf.pop_read_region();
        result
    }

    pub fn display_descriptor(
        &mut self,
        desc: &Descriptor,
        index: usize,
        table_id: Option<Tid>,
        pds: Pds,
        margin: &str,
    ) -> fmt::Result {
        let lookup = self.ctx.descriptor_lookup(desc, table_id, pds);
        let reg = self.ctx.registry().resolve_descriptor(&lookup);
        writeln!(
            self.out,
            "{}- Descriptor {}: {}, tag 0x{:02X} ({}), {} bytes",
            margin,
            index,
            reg.map_or("unknown descriptor", |r| r.xml_name),
            desc.tag(),
            desc.tag(),
            desc.payload().len()
        )?;

        let inner = format!("{}  ", margin);
        let Some(reg) = reg else {
            return self.out.write_str(&hex_dump(desc.payload(), &inner));
        };
        if let Some(display) = reg.display {
            let mut buf = PsiBuffer::from_bytes(desc.payload());
            if reg.edid.is_extension() {
                buf.skip_bits(8);
            }
            display(&mut *self.out, &mut buf, &inner)?;
            return self.display_extra_data(&mut buf, &inner);
        }
        match self.ctx.decode_descriptor(desc, table_id, pds) {
            Ok(decoded) => {
                let mut element = Element::new(decoded.value.xml_name());
                decoded.value.build_xml(&mut element);
                for (name, value) in element.attributes() {
                    writeln!(self.out, "{}{}: {}", inner, name, value)?;
                }
                Ok(())
            }
            Err(e) => {
                writeln!(self.out, "{}{}", inner, e)?;
                self.out.write_str(&hex_dump(desc.payload(), &inner))
            }
        }
    }

    /// Flag a buffer error and any unread bytes.
    pub fn display_extra_data(&mut self, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
        if buf.has_error() {
            writeln!(self.out, "{}** Truncated or malformed data", margin)?;
        }
        if buf.remaining_read_bytes() > 0 {
            let extra = buf.get_remaining_bytes();
            writeln!(self.out, "{}Extraneous {} bytes:", margin, extra.len())?;
            self.out.write_str(&hex_dump(&extra, margin))?;
        }
        Ok(())
    }
}

/// Hexadecimal and ASCII dump, 16 bytes per line.
pub fn hex_dump(data: &[u8], margin: &str) -> String {
    let mut text = String::new();
    for (line, chunk) in data.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        text.push_str(&format!("{}{:04X}:  {:<47}  {}\n", margin, line * 16, hex.join(" "), ascii));
    }
    text
}
