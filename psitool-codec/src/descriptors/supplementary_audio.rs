//! supplementary_audio_descriptor (DVB extension descriptor 0x7F / 0x06).

use std::any::Any;
use std::fmt;

use crate::buffer::PsiBuffer;
use crate::descriptor::DescriptorCodec;
use crate::error::XmlError;
use crate::identity::Edid;
use crate::registry::RegistryBuilder;
use crate::types::{xdid, MAX_DESCRIPTOR_PAYLOAD_SIZE};
use crate::xml::Element;

pub const XML_NAME: &str = "supplementary_audio_descriptor";
const EDID: Edid = Edid::dvb_extension(xdid::DVB_SUPPLEMENTARY_AUDIO);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplementaryAudioDescriptor {
    /// Complete main audio (true) or supplementary stream (false).
    pub mix_type: bool,
    pub editorial_classification: u8,
    pub language_code: Option<String>,
    pub private_data: Vec<u8>,
}

impl SupplementaryAudioDescriptor {
    fn create() -> Box<dyn DescriptorCodec> {
        Box::<SupplementaryAudioDescriptor>::default()
    }
}

pub fn register(builder: &mut RegistryBuilder) {
    builder.descriptor(EDID, XML_NAME, SupplementaryAudioDescriptor::create, Some(display));
}

fn editorial_classification_name(value: u8) -> &'static str {
    match value {
        0x00 => "Main audio",
        0x01 => "Audio description for the visually impaired",
        0x02 => "Clean audio for the hearing impaired",
        0x03 => "Spoken subtitles for the visually impaired",
        0x04 => "Dependent parametric data stream",
        0x17 => "Unspecific supplementary audio for the general audience",
        _ => "reserved",
    }
}

fn display(out: &mut dyn fmt::Write, buf: &mut PsiBuffer, margin: &str) -> fmt::Result {
    if !buf.can_read_bytes(1) {
        return Ok(());
    }
    let mix_type = buf.get_bit();
    let classification = buf.get_bits(5) as u8;
    buf.skip_bits(1);
    let has_language = buf.get_bit();
    writeln!(
        out,
        "{}Mix type: {}",
        margin,
        if mix_type { "complete stream" } else { "dependent stream" }
    )?;
    writeln!(
        out,
        "{}Editorial classification: 0x{:02X} ({})",
        margin,
        classification,
        editorial_classification_name(classification)
    )?;
    if has_language {
        writeln!(out, "{}Language: \"{}\"", margin, buf.get_language_code())?;
    }
    let private = buf.get_remaining_bytes();
    if !private.is_empty() {
        writeln!(out, "{}Private data: {} bytes", margin, private.len())?;
    }
    Ok(())
}

impl DescriptorCodec for SupplementaryAudioDescriptor {
    fn edid(&self) -> Edid {
        EDID
    }

    fn xml_name(&self) -> &'static str {
        XML_NAME
    }

    fn clear(&mut self) {
        *self = SupplementaryAudioDescriptor::default();
    }

    fn deserialize_payload(&mut self, buf: &mut PsiBuffer) {
        self.mix_type = buf.get_bit();
        self.editorial_classification = buf.get_bits(5) as u8;
        buf.skip_bits(1);
        let has_language = buf.get_bit();
        self.language_code = has_language.then(|| buf.get_language_code());
        self.private_data = buf.get_remaining_bytes();
    }

    fn serialize_payload(&self, buf: &mut PsiBuffer) {
        buf.put_bit(self.mix_type);
        buf.put_bits_checked(u64::from(self.editorial_classification), 5);
        buf.put_reserved(1);
        buf.put_bit(self.language_code.is_some());
        if let Some(code) = &self.language_code {
            buf.put_language_code(code);
        }
        buf.put_bytes(&self.private_data);
    }

    fn build_xml(&self, element: &mut Element) {
        element.set_int_attribute("mix_type", u8::from(self.mix_type));
        element.set_hex_attribute("editorial_classification", self.editorial_classification, 2);
        if let Some(code) = &self.language_code {
            element.set_attribute("language_code", code.as_str());
        }
        if !self.private_data.is_empty() {
            element.add_child("private_data").set_hex_text(&self.private_data);
        }
    }

    fn analyze_xml(&mut self, element: &Element) -> Result<(), XmlError> {
        self.mix_type = element.get_int_attribute::<u8>("mix_type", true, 0, 0, 1)? == 1;
        self.editorial_classification = element.get_int_attribute("editorial_classification", true, 0, 0, 0x1F)?;
        self.language_code = element.get_string_attribute("language_code", false, 3)?;
        if matches!(&self.language_code, Some(code) if code.len() != 3) {
            return Err(element.invalid("language_code must have 3 characters"));
        }
        self.private_data = match element.get_children("private_data", 0, 1)?.first() {
            Some(data) => data.get_hex_text(0, MAX_DESCRIPTOR_PAYLOAD_SIZE - 5)?,
            None => Vec::new(),
        };
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
    use crate::descriptors::xml_round_trip;
    use crate::standards::Standards;
    use crate::types::{did, pds, tid, Strictness};

    #[test]
    fn test_payload() {
        // mix_type=1, classification=0x01, reserved, language present
        let payload = [0x87, b'j', b'p', b'n', 0xAA];
        let mut desc = SupplementaryAudioDescriptor::default();
        desc.deserialize_payload(&mut PsiBuffer::from_bytes(&payload));
        assert!(desc.mix_type);
        assert_eq!(desc.editorial_classification, 1);
        assert_eq!(desc.language_code.as_deref(), Some("jpn"));
        assert_eq!(desc.private_data, vec![0xAA]);

        let mut buf = PsiBuffer::new(MAX_DESCRIPTOR_PAYLOAD_SIZE);
        desc.serialize_payload(&mut buf);
        assert_eq!(buf.as_written(), &payload);
    }

    #[test]
    fn test_xml_round_trip() {
        let ctx = CodecContext::new().with_standards(Standards::DVB).with_strictness(Strictness::Strict);
        let payload = [xdid::DVB_SUPPLEMENTARY_AUDIO, 0x87, b'j', b'p', b'n', 0xAA];
        let element = xml_round_trip(&ctx, did::DVB_EXTENSION, &payload, Some(tid::SDT_ACTUAL), pds::NULL);
        assert!(element.has_name(XML_NAME));
        assert_eq!(element.attribute("language_code"), Some("jpn"));

        // No language code, no private data.
        let payload = [xdid::DVB_SUPPLEMENTARY_AUDIO, 0x06];
        let element = xml_round_trip(&ctx, did::DVB_EXTENSION, &payload, None, pds::NULL);
        assert!(element.has_name(XML_NAME));
        assert_eq!(element.attribute("language_code"), None);
    }
}
