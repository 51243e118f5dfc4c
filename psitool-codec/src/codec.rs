//! Encode and decode entry points.
//!
//! Every concrete descriptor and table goes through the same steps:
//! identity resolution, factory construction, payload conversion on a
//! bounds-limited [`PsiBuffer`], then error and size checks. The steps are
//! methods of [`CodecContext`] so that each call carries its own registry,
//! standards and strictness.

use log::{debug, warn};

use crate::buffer::PsiBuffer;
use crate::context::{CodecContext, Decoded, Problem};
use crate::descriptor::{Descriptor, DescriptorCodec, DescriptorList, GenericDescriptor, GENERIC_DESCRIPTOR_XML_NAME};
use crate::error::{CodecError, SectionError, XmlError};
use crate::identity::DescriptorLookup;
use crate::section::{Section, SectionHeader};
use crate::splitter::SectionSplitter;
use crate::standards::Standards;
use crate::table::{BinaryTable, GenericTable, TableCodec, GENERIC_LONG_TABLE_XML_NAME, GENERIC_SHORT_TABLE_XML_NAME};
use crate::types::{pds, Pds, Tid, DESCRIPTOR_ENCODE_CAPACITY, MAX_DESCRIPTOR_PAYLOAD_SIZE};
use crate::xml::Element;

/// Maximum number of sections in a table.
pub const MAX_SECTION_COUNT: usize = 256;

impl<'r> CodecContext<'r> {
    /// Standards used to resolve descriptors found in `table_id`.
    fn lookup_standards(&self, table_id: Option<Tid>) -> Standards {
        match table_id {
            Some(tid) => self.standards() | self.registry().defining_standards(tid),
            None => self.standards(),
        }
    }

    /// Lookup key of a binary descriptor in its surroundings.
    pub(crate) fn descriptor_lookup(&self, desc: &Descriptor, table_id: Option<Tid>, pds: Pds) -> DescriptorLookup {
        let pds = match pds {
            pds::NULL => self.default_pds().unwrap_or(pds::NULL),
            p => p,
        };
        DescriptorLookup::new(
            desc.tag(),
            table_id,
            self.lookup_standards(table_id),
            Some(pds),
            desc.payload().first().copied(),
        )
    }

    // ------------------------------------------------------------------
    // Descriptors
    // ------------------------------------------------------------------

    /// Decode a binary descriptor found in `table_id` with `pds` in effect.
    ///
    /// A tag with no registration decodes to a [`GenericDescriptor`].
    /// Truncated payloads and unread bytes reject the descriptor in strict
    /// mode and are recorded as problems otherwise.
    pub fn decode_descriptor(
        &self,
        desc: &Descriptor,
        table_id: Option<Tid>,
        pds: Pds,
    ) -> Result<Decoded<Box<dyn DescriptorCodec>>, CodecError> {
        let lookup = self.descriptor_lookup(desc, table_id, pds);
        let Some(reg) = self.registry().resolve_descriptor(&lookup) else {
            debug!("no registration for descriptor tag 0x{:02X}, kept opaque", desc.tag());
            return Ok(Decoded::clean(Box::new(GenericDescriptor::from_descriptor(desc))));
        };

        let mut value = (reg.factory)();
        let mut buf = PsiBuffer::from_bytes(desc.payload());
        if reg.edid.is_extension() {
            buf.skip_bits(8);
        }
        value.deserialize_payload(&mut buf);

        let name = reg.xml_name;
        let reject = |reason: String| CodecError::InvalidDescriptor {
            tag: desc.tag(),
            name: name.to_string(),
            reason,
        };
        let mut problems = Vec::new();
        if buf.has_error() {
            if self.is_strict() {
                return Err(reject("truncated or malformed payload".to_string()));
            }
            problems.push(Problem::Malformed { name: name.to_string() });
        } else if buf.remaining_read_bits() > 0 {
            let size = buf.remaining_read_bytes().max(1);
            if self.is_strict() {
                return Err(reject(format!("{} extraneous bytes", size)));
            }
            problems.push(Problem::ExtraneousData {
                name: name.to_string(),
                size,
            });
        }
        Ok(Decoded { value, problems })
    }

    /// Encode a descriptor. A buffer error or an oversized payload fails the
    /// call and the descriptor must be left out of the output.
    pub fn encode_descriptor(&self, value: &dyn DescriptorCodec) -> Result<Descriptor, CodecError> {
        let edid = value.edid();
        let name = value.xml_name();
        let mut buf = PsiBuffer::new(DESCRIPTOR_ENCODE_CAPACITY);
        if let Some(ext) = edid.extension_tag() {
            buf.put_u8(ext);
        }
        value.serialize_payload(&mut buf);
        if buf.has_error() || buf.region_depth() != 0 {
            warn!("<{}> omitted: serialization error", name);
            return Err(CodecError::SerializeFailed(format!("<{}>", name)));
        }
        let size = buf.written_size();
        let max = value.max_payload_size().min(MAX_DESCRIPTOR_PAYLOAD_SIZE);
        if size > max {
            warn!("<{}> omitted: payload of {} bytes, max {}", name, size, max);
            return Err(CodecError::PayloadTooLarge {
                name: name.to_string(),
                size,
                max,
            });
        }
        Descriptor::new(edid.tag(), buf.into_bytes())
    }

    /// Append the XML form of a binary descriptor to `parent`.
    ///
    /// A descriptor rejected by decoding is shown as a generic descriptor.
    pub fn descriptor_to_xml(&self, parent: &mut Element, desc: &Descriptor, table_id: Option<Tid>, pds: Pds) {
        match self.decode_descriptor(desc, table_id, pds) {
            Ok(decoded) => {
                self.report_all(decoded.problems);
                let element = parent.add_child(decoded.value.xml_name());
                decoded.value.build_xml(element);
            }
            Err(e) => {
                self.report(Problem::Omitted {
                    name: format!("descriptor 0x{:02X}", desc.tag()),
                    reason: format!("{}, shown as <{}>", e, GENERIC_DESCRIPTOR_XML_NAME),
                });
                let generic = GenericDescriptor::from_descriptor(desc);
                generic.build_xml(parent.add_child(GENERIC_DESCRIPTOR_XML_NAME));
            }
        }
    }

    /// Append every descriptor of `list` to `parent`.
    pub fn descriptor_list_to_xml(&self, parent: &mut Element, list: &DescriptorList) {
        for (desc, pds) in list.iter_with_pds() {
            self.descriptor_to_xml(parent, desc, list.table_id(), pds);
        }
    }

    /// Build a descriptor from its XML element.
    pub fn descriptor_from_xml(
        &self,
        element: &Element,
        table_id: Option<Tid>,
    ) -> Result<Box<dyn DescriptorCodec>, XmlError> {
        let mut value = if element.has_name(GENERIC_DESCRIPTOR_XML_NAME) {
            GenericDescriptor::create()
        } else {
            let reg = self
                .registry()
                .descriptor_by_name(element.name(), table_id)
                .ok_or_else(|| element.unexpected())?;
            if let Some(tid) = table_id {
                if !self.registry().is_descriptor_allowed(element.name(), tid) {
                    return Err(XmlError::NotAllowedInTable {
                        element: element.name().to_string(),
                        line: element.line(),
                        table_id: tid,
                    });
                }
            }
            (reg.factory)()
        };
        value.analyze_xml(element)?;
        Ok(value)
    }

    /// Convert one descriptor element and append it to `list`, checking
    /// that its private data specifier is in effect.
    fn push_descriptor_element(&self, list: &mut DescriptorList, element: &Element) -> Result<(), XmlError> {
        let value = self.descriptor_from_xml(element, list.table_id())?;
        if let Some(required) = value.edid().pds() {
            let in_effect = match list.current_pds() {
                pds::NULL => self.default_pds().unwrap_or(pds::NULL),
                p => p,
            };
            if in_effect != required {
                if !self.fix_pds() {
                    return Err(XmlError::MissingPrivateDataSpecifier {
                        element: element.name().to_string(),
                        line: element.line(),
                        pds: required,
                    });
                }
                debug!("inserting private data specifier 0x{:08X} before <{}>", required, element.name());
                list.add_private_data_specifier(required);
            }
        }
        let desc = self
            .encode_descriptor(value.as_ref())
            .map_err(|e| element.invalid(e.to_string()))?;
        list.push(desc);
        Ok(())
    }

    /// Convert the descriptor children of `parent` into `list`.
    ///
    /// Children named in `allowed_others` are not descriptors; they are
    /// returned in document order. In strict mode the first invalid
    /// descriptor fails the call; otherwise it is skipped and reported.
    pub fn descriptors_from_xml<'e>(
        &self,
        list: &mut DescriptorList,
        parent: &'e Element,
        allowed_others: &[&str],
    ) -> Result<Vec<&'e Element>, XmlError> {
        let mut others = Vec::new();
        for child in parent.children() {
            if allowed_others.iter().any(|name| child.has_name(name)) {
                others.push(child);
                continue;
            }
            match self.push_descriptor_element(list, child) {
                Ok(()) => {}
                Err(e) if self.is_strict() => return Err(e),
                Err(e) => self.report(Problem::SkippedElement {
                    element: child.name().to_string(),
                    line: child.line(),
                    reason: e.to_string(),
                }),
            }
        }
        Ok(others)
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    /// Decode a complete binary table.
    ///
    /// Section payloads are fed in section number order. A table id with no
    /// registration under the active standards decodes to a [`GenericTable`].
    pub fn decode_table(&self, table: &BinaryTable) -> Result<Decoded<Box<dyn TableCodec>>, CodecError> {
        let table_id = table.table_id().unwrap_or(0xFF);
        if !table.is_complete() {
            return Err(CodecError::IncompleteTable {
                table_id,
                present: table.present_count(),
                expected: table.section_count(),
            });
        }

        let registration = self.registry().resolve_table(table_id, self.standards());
        let mut value = match registration {
            Some(reg) => (reg.factory)(),
            None => {
                debug!("no registration for table id 0x{:02X}, kept opaque", table_id);
                GenericTable::create()
            }
        };
        value.clear();
        value.set_table_id(table_id);

        let name = value.xml_name();
        let mut problems = Vec::new();
        let invalid = |reason: String, problems: &mut Vec<Problem>| -> Result<(), CodecError> {
            if self.is_strict() {
                return Err(CodecError::InvalidTable {
                    table_id,
                    name: name.to_string(),
                    reason,
                });
            }
            warn!("table {} (0x{:02X}): {}", name, table_id, reason);
            problems.push(Problem::Malformed { name: name.to_string() });
            Ok(())
        };

        if registration.is_some() && value.is_long() == table.is_short() {
            invalid("unexpected section syntax".to_string(), &mut problems)?;
        }
        for section in table.sections() {
            let payload = if value.use_short_crc() {
                match section.short_payload_checked() {
                    Ok(payload) => payload,
                    Err(e) => {
                        invalid(e.to_string(), &mut problems)?;
                        continue;
                    }
                }
            } else {
                section.payload()
            };
            let mut buf = PsiBuffer::from_bytes(payload);
            value.deserialize_payload(&mut buf, section);
            if buf.has_error() {
                invalid(
                    format!("malformed section {}", section.section_number()),
                    &mut problems,
                )?;
            } else if buf.remaining_read_bits() > 0 {
                let size = buf.remaining_read_bytes().max(1);
                if self.is_strict() {
                    invalid(format!("{} extraneous bytes", size), &mut problems)?;
                }
                problems.push(Problem::ExtraneousData {
                    name: name.to_string(),
                    size,
                });
            }
        }
        Ok(Decoded { value, problems })
    }

    /// Serialize a table into as many sections as needed.
    pub fn encode_table(&self, value: &dyn TableCodec) -> Result<BinaryTable, CodecError> {
        let mut splitter = SectionSplitter::new(value.max_payload_size());
        value.serialize_payload(&mut splitter)?;
        let payloads = splitter.finish()?;

        let count = payloads.len();
        if count > MAX_SECTION_COUNT {
            return Err(SectionError::TooManySections(count).into());
        }
        if !value.is_long() && count > 1 {
            return Err(SectionError::ShortTableSplit(count).into());
        }

        let last = (count - 1) as u8;
        let mut table = BinaryTable::new();
        for (number, payload) in payloads.iter().enumerate() {
            let mut header = if value.is_long() {
                SectionHeader::long(
                    value.table_id(),
                    value.is_private(),
                    value.table_id_extension(),
                    value.version(),
                    value.is_current(),
                )
            } else {
                SectionHeader::short(value.table_id(), value.is_private())
            };
            if value.is_long() {
                header.section_number = number as u8;
                header.last_section_number = last;
            }
            let section = Section::new(header, payload, value.use_short_crc())?;
            table.add_section(section)?;
        }
        debug!("table <{}> encoded in {} sections", value.xml_name(), count);
        Ok(table)
    }

    /// XML element of a complete binary table.
    pub fn table_to_xml(&self, table: &BinaryTable) -> Result<Element, CodecError> {
        let decoded = self.decode_table(table)?;
        self.report_all(decoded.problems);
        let mut element = Element::new(decoded.value.xml_name());
        decoded.value.build_xml(self, &mut element);
        Ok(element)
    }

    /// Decode a table from its XML element and serialize it.
    pub fn table_from_xml(&self, element: &Element) -> Result<BinaryTable, CodecError> {
        let mut value = if element.has_name(GENERIC_SHORT_TABLE_XML_NAME) || element.has_name(GENERIC_LONG_TABLE_XML_NAME) {
            GenericTable::create()
        } else {
            let reg = self
                .registry()
                .table_by_name(element.name())
                .ok_or_else(|| CodecError::UnknownElement {
                    element: element.name().to_string(),
                    line: element.line(),
                })?;
            (reg.factory)()
        };
        value.analyze_xml(self, element)?;
        self.encode_table(value.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProblemLog;
    use crate::descriptors::network_name::NetworkNameDescriptor;
    use crate::types::{did, tid, Strictness};

    fn ctx() -> CodecContext<'static> {
        CodecContext::new().with_standards(Standards::DVB)
    }

    #[test]
    fn test_unknown_tag_passthrough() {
        let desc = Descriptor::new(0xE7, vec![1, 2, 3, 4]).unwrap();
        let decoded = ctx().decode_descriptor(&desc, None, pds::NULL).unwrap();
        assert!(decoded.is_clean());
        assert_eq!(decoded.value.xml_name(), GENERIC_DESCRIPTOR_XML_NAME);
        assert_eq!(ctx().encode_descriptor(decoded.value.as_ref()).unwrap(), desc);
    }

    #[test]
    fn test_extraneous_data_per_strictness() {
        // CA_identifier carries 16-bit ids; one odd byte is left over.
        let desc = Descriptor::new(did::CA_IDENTIFIER, vec![0x01, 0x00, 0x05]).unwrap();
        let lenient = ctx().decode_descriptor(&desc, None, pds::NULL).unwrap();
        assert_eq!(
            lenient.problems,
            vec![Problem::ExtraneousData {
                name: "CA_identifier_descriptor".to_string(),
                size: 1
            }]
        );
        let strict = ctx().with_strictness(Strictness::Strict);
        assert!(matches!(
            strict.decode_descriptor(&desc, None, pds::NULL),
            Err(CodecError::InvalidDescriptor { tag: did::CA_IDENTIFIER, .. })
        ));
    }

    #[test]
    fn test_oversized_descriptor_rejected() {
        let value = NetworkNameDescriptor {
            name: "x".repeat(300),
        };
        let err = ctx().encode_descriptor(&value).unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge { size: 300, max: 255, .. }));
    }

    #[test]
    fn test_private_descriptor_needs_pds() {
        let doc = Element::parse_document(
            r#"<descriptors>
                 <eacem_logical_channel_number_descriptor>
                   <service service_id="1" logical_channel_number="3" visible_service="true"/>
                 </eacem_logical_channel_number_descriptor>
               </descriptors>"#,
        )
        .unwrap();
        let strict = ctx().with_strictness(Strictness::Strict);
        let mut list = DescriptorList::new(Some(tid::NIT_ACTUAL));
        let err = strict.descriptors_from_xml(&mut list, &doc, &[]).unwrap_err();
        assert!(matches!(err, XmlError::MissingPrivateDataSpecifier { pds: 0x28, line: 2, .. }));

        let mut list = DescriptorList::new(Some(tid::NIT_ACTUAL));
        strict.with_fix_pds(true).descriptors_from_xml(&mut list, &doc, &[]).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().tag(), did::PRIVATE_DATA_SPECIFIER);
        assert_eq!(list.pds_at(1), 0x28);
    }

    #[test]
    fn test_default_pds_governs_xml_input() {
        let bytes = [0x83, 0x04, 0x00, 0x01, 0xFC, 0x03];
        let mut list = DescriptorList::new(Some(tid::NIT_ACTUAL));
        list.add_bytes(&bytes).unwrap();

        let ctx = ctx().with_strictness(Strictness::Strict).with_default_pds(Some(0x28));
        let mut parent = Element::new("transport");
        ctx.descriptor_list_to_xml(&mut parent, &list);
        assert!(parent.children()[0].has_name("eacem_logical_channel_number_descriptor"));

        let mut back = DescriptorList::new(Some(tid::NIT_ACTUAL));
        ctx.descriptors_from_xml(&mut back, &parent, &[]).unwrap();
        assert_eq!(back.to_bytes(), bytes.to_vec());

        // Another default does not cover the descriptor.
        let other = ctx.with_default_pds(Some(0x29));
        let mut back = DescriptorList::new(Some(tid::NIT_ACTUAL));
        assert!(matches!(
            other.descriptors_from_xml(&mut back, &parent, &[]),
            Err(XmlError::MissingPrivateDataSpecifier { pds: 0x28, .. })
        ));
    }

    #[test]
    fn test_strict_rejection_shown_as_generic_is_reported() {
        let desc = Descriptor::new(did::CA_IDENTIFIER, vec![0x01, 0x00, 0x05]).unwrap();
        let log = ProblemLog::new();
        let strict = ctx().with_strictness(Strictness::Strict).with_problem_log(&log);
        let mut parent = Element::new("descriptors");
        strict.descriptor_to_xml(&mut parent, &desc, None, pds::NULL);
        assert!(parent.children()[0].has_name(GENERIC_DESCRIPTOR_XML_NAME));
        let problems = log.take();
        assert_eq!(problems.len(), 1);
        assert!(matches!(&problems[0], Problem::Omitted { name, .. } if name == "descriptor 0x53"));
    }

    #[test]
    fn test_table_specific_descriptor_not_allowed() {
        let doc = Element::parse_document(
            r#"<descriptors><avail_descriptor provider_avail_id="7"/></descriptors>"#,
        )
        .unwrap();
        let strict = ctx().with_strictness(Strictness::Strict);
        let mut list = DescriptorList::new(Some(tid::SDT_ACTUAL));
        let err = strict.descriptors_from_xml(&mut list, &doc, &[]).unwrap_err();
        assert!(matches!(err, XmlError::NotAllowedInTable { table_id: tid::SDT_ACTUAL, .. }));

        let mut list = DescriptorList::new(Some(tid::SCTE_SPLICE_INFO));
        strict.descriptors_from_xml(&mut list, &doc, &[]).unwrap();
        assert_eq!(list.get(0).unwrap().payload(), &[0x43, 0x55, 0x45, 0x49, 0, 0, 0, 7]);
    }

    #[test]
    fn test_incomplete_table() {
        let header = SectionHeader {
            section_number: 1,
            last_section_number: 2,
            ..SectionHeader::long(0xB0, true, 1, 0, true)
        };
        let section = Section::new(header, &[1, 2, 3], false).unwrap();
        let table = BinaryTable::from_sections([section]).unwrap();
        let err = ctx().decode_table(&table).unwrap_err();
        assert!(matches!(err, CodecError::IncompleteTable { present: 1, expected: 3, .. }));
    }

    #[test]
    fn test_unregistered_table_is_opaque() {
        let section = Section::new(SectionHeader::long(0xB0, true, 0x1234, 3, true), &[9; 20], false).unwrap();
        let table = BinaryTable::from_sections([section]).unwrap();
        let decoded = ctx().decode_table(&table).unwrap();
        let generic = decoded.value.as_any().downcast_ref::<GenericTable>().unwrap();
        assert_eq!(generic.table_id_ext, 0x1234);
        assert_eq!(ctx().encode_table(decoded.value.as_ref()).unwrap(), table);
    }
}
