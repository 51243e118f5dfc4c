//! Concrete descriptor types.
//!
//! Each module exposes a `register` function; [`register_all`] is the
//! startup pass adding every one of them to a [`RegistryBuilder`].

pub mod ca_identifier;
pub mod eacem_lcn;
pub mod isdb_terrestrial_delivery;
pub mod isdb_ts_information;
pub mod network_name;
pub mod private_data_specifier;
pub mod registration;
pub mod scte_avail;
pub mod service;
pub mod supplementary_audio;

use crate::registry::RegistryBuilder;

pub fn register_all(builder: &mut RegistryBuilder) {
    registration::register(builder);
    network_name::register(builder);
    service::register(builder);
    ca_identifier::register(builder);
    private_data_specifier::register(builder);
    supplementary_audio::register(builder);
    eacem_lcn::register(builder);
    isdb_ts_information::register(builder);
    isdb_terrestrial_delivery::register(builder);
    scte_avail::register(builder);
}

/// Printable form of a 4-byte identifier, if every byte is ASCII graphic.
pub(crate) fn ascii_identifier(value: u32) -> Option<String> {
    let bytes = value.to_be_bytes();
    bytes
        .iter()
        .all(u8::is_ascii_graphic)
        .then(|| String::from_utf8_lossy(&bytes).into_owned())
}

/// Convert a binary descriptor to an XML document and back, checking that
/// the rebuilt descriptor is identical. Returns the XML element.
#[cfg(test)]
pub(crate) fn xml_round_trip(
    ctx: &crate::context::CodecContext<'_>,
    tag: crate::types::Did,
    payload: &[u8],
    table_id: Option<crate::types::Tid>,
    pds: crate::types::Pds,
) -> crate::xml::Element {
    use crate::descriptor::Descriptor;
    use crate::xml::{Element, ROOT_NAME};

    let desc = Descriptor::new(tag, payload.to_vec()).unwrap();
    let mut root = Element::new(ROOT_NAME);
    ctx.descriptor_to_xml(&mut root, &desc, table_id, pds);
    let text = root.to_document().unwrap();
    let parsed = Element::parse_document(&text).unwrap();
    let element = parsed.children()[0].clone();
    let value = ctx.descriptor_from_xml(&element, table_id).unwrap();
    assert_eq!(ctx.encode_descriptor(value.as_ref()).unwrap(), desc);
    element
}
