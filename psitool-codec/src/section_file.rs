//! Files of concatenated sections and their XML documents.
//!
//! Sections are grouped into tables in arrival order. A long section joins
//! the open table with the same table id, extension and version; a short
//! section is a table by itself. Sections of tables still incomplete at the
//! end of the file are kept as orphans.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::context::{CodecContext, Problem};
use crate::error::{CodecError, SectionError, XmlError};
use crate::section::Section;
use crate::table::{BinaryTable, TableState};
use crate::types::Tid;
use crate::xml::{Element, ROOT_NAME};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionFile {
    tables: Vec<BinaryTable>,
    orphans: Vec<Section>,
}

type TableKey = (Tid, u16, u8);

impl SectionFile {
    pub fn new() -> Self {
        SectionFile::default()
    }

    pub fn tables(&self) -> &[BinaryTable] {
        &self.tables
    }

    /// Sections which never made a complete table.
    pub fn orphans(&self) -> &[Section] {
        &self.orphans
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.orphans.is_empty()
    }

    pub fn add_table(&mut self, table: BinaryTable) {
        self.tables.push(table);
    }

    pub fn add_orphan(&mut self, section: Section) {
        self.orphans.push(section);
    }

    /// Group concatenated sections into tables.
    ///
    /// Invalid sections are logged and skipped. The data must end on a
    /// section boundary.
    pub fn load_binary(data: &[u8]) -> Result<Self, CodecError> {
        let mut file = SectionFile::new();
        let mut open: HashMap<TableKey, usize> = HashMap::new();
        let mut pos = 0;

        while pos < data.len() {
            let rest = &data[pos..];
            let size = Section::peek_size(rest).ok_or(SectionError::TooShort(rest.len()))?;
            if size > rest.len() {
                return Err(SectionError::LengthMismatch {
                    declared: size,
                    actual: rest.len(),
                }
                .into());
            }
            let offset = pos;
            pos += size;
            let section = match Section::from_bytes(rest[..size].to_vec()) {
                Ok(section) => section,
                Err(e) => {
                    warn!("section at offset {} skipped: {}", offset, e);
                    continue;
                }
            };

            if !section.is_long() {
                let mut table = BinaryTable::new();
                table.add_section(section)?;
                file.tables.push(table);
                continue;
            }

            let key = (section.table_id(), section.table_id_ext(), section.version());
            let index = *open.entry(key).or_insert_with(|| {
                file.tables.push(BinaryTable::new());
                file.tables.len() - 1
            });
            match file.tables[index].add_section(section.clone()) {
                Ok(TableState::Complete) => {
                    open.remove(&key);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("section at offset {} kept as orphan: {}", offset, e);
                    file.orphans.push(section);
                }
            }
        }

        // Incomplete tables give their sections back as orphans.
        let mut tables = Vec::with_capacity(file.tables.len());
        for table in file.tables.drain(..) {
            if table.is_complete() {
                tables.push(table);
            } else if table.state() != TableState::Empty {
                warn!(
                    "table 0x{:02X} incomplete, {} of {} sections",
                    table.table_id().unwrap_or(0xFF),
                    table.present_count(),
                    table.section_count()
                );
                file.orphans.extend(table.sections().cloned());
            }
        }
        file.tables = tables;
        debug!("{} tables, {} orphan sections", file.tables.len(), file.orphans.len());
        Ok(file)
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        SectionFile::load_binary(&fs::read(path)?)
    }

    /// Tables then orphan sections, concatenated.
    pub fn to_binary(&self) -> Vec<u8> {
        let mut data: Vec<u8> = self.tables.iter().flat_map(BinaryTable::to_bytes).collect();
        for section in &self.orphans {
            data.extend_from_slice(section.content());
        }
        data
    }

    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<(), CodecError> {
        fs::write(path, self.to_binary())?;
        Ok(())
    }

    /// Convert every table into one XML document.
    ///
    /// A table which cannot be converted is reported and left out.
    /// Orphan sections are not converted.
    pub fn to_xml(&self, ctx: &CodecContext<'_>) -> Result<String, CodecError> {
        let mut root = Element::new(ROOT_NAME);
        for table in &self.tables {
            match ctx.table_to_xml(table) {
                Ok(element) => root.push_child(element),
                Err(e) => ctx.report(Problem::Omitted {
                    name: format!("table 0x{:02X}", table.table_id().unwrap_or(0xFF)),
                    reason: e.to_string(),
                }),
            }
        }
        if !self.orphans.is_empty() {
            warn!("{} orphan sections not converted", self.orphans.len());
        }
        Ok(root.to_document()?)
    }

    /// Build a file from an XML document, one table per root child.
    ///
    /// A child which fails to convert is reported and skipped; only a
    /// malformed document fails as a whole.
    pub fn from_xml(ctx: &CodecContext<'_>, text: &str) -> Result<Self, CodecError> {
        let root = Element::parse_document(text)?;
        if !root.has_name(ROOT_NAME) {
            return Err(XmlError::UnexpectedElement {
                element: root.name().to_string(),
                line: root.line(),
            }
            .into());
        }
        let mut file = SectionFile::new();
        for child in root.children() {
            match ctx.table_from_xml(child) {
                Ok(table) => file.tables.push(table),
                Err(e) => ctx.report(Problem::SkippedElement {
                    element: child.name().to_string(),
                    line: child.line(),
                    reason: e.to_string(),
                }),
            }
        }
        Ok(file)
    }
}
