//! Composite descriptor identity.
//!
//! A descriptor tag alone does not identify a descriptor type: the same byte
//! is reused by several standards, by vendor-private specifications and by
//! table-specific definitions. An [`Edid`] is the registration side of the
//! key, a [`DescriptorLookup`] the context in which a tag is found.

use std::fmt;

use crate::standards::Standards;
use crate::types::{did, is_private_tag, Did, Pds, Tid};

/// Kind of registration, in resolution order: lower values win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    TableSpecificPrivate,
    TableSpecific,
    Extension,
    Private,
    Regular,
}

/// Extended descriptor identity, the key of a descriptor registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edid {
    tag: Did,
    table_id: Option<Tid>,
    standards: Standards,
    pds: Option<Pds>,
    extension_tag: Option<u8>,
}

impl Edid {
    /// A descriptor defined by one or more standards, valid in any table.
    pub const fn regular(tag: Did, standards: Standards) -> Self {
        Edid {
            tag,
            table_id: None,
            standards,
            pds: None,
            extension_tag: None,
        }
    }

    /// A descriptor which exists only inside one table.
    pub const fn table_specific(tag: Did, table_id: Tid, standards: Standards) -> Self {
        Edid {
            tag,
            table_id: Some(table_id),
            standards,
            pds: None,
            extension_tag: None,
        }
    }

    /// A private descriptor which exists only inside one table.
    pub const fn table_specific_private(tag: Did, table_id: Tid, pds: Pds) -> Self {
        Edid {
            tag,
            table_id: Some(table_id),
            standards: Standards::DVB,
            pds: Some(pds),
            extension_tag: None,
        }
    }

    /// A user-private descriptor governed by a private data specifier.
    pub const fn private(tag: Did, pds: Pds) -> Self {
        Edid {
            tag,
            table_id: None,
            standards: Standards::DVB,
            pds: Some(pds),
            extension_tag: None,
        }
    }

    /// A DVB extension descriptor (tag 0x7F).
    pub const fn dvb_extension(extension_tag: u8) -> Self {
        Edid::extension(did::DVB_EXTENSION, extension_tag, Standards::DVB)
    }

    /// An MPEG extension descriptor (tag 0x3F).
    pub const fn mpeg_extension(extension_tag: u8) -> Self {
        Edid::extension(did::MPEG_EXTENSION, extension_tag, Standards::MPEG)
    }

    /// An extension descriptor under a standard's extension marker tag.
    pub const fn extension(marker: Did, extension_tag: u8, standards: Standards) -> Self {
        Edid {
            tag: marker,
            table_id: None,
            standards,
            pds: None,
            extension_tag: Some(extension_tag),
        }
    }

    pub fn tag(&self) -> Did {
        self.tag
    }

    pub fn table_id(&self) -> Option<Tid> {
        self.table_id
    }

    pub fn standards(&self) -> Standards {
        self.standards
    }

    pub fn pds(&self) -> Option<Pds> {
        self.pds
    }

    pub fn extension_tag(&self) -> Option<u8> {
        self.extension_tag
    }

    pub fn is_extension(&self) -> bool {
        self.extension_tag.is_some()
    }

    pub fn is_table_specific(&self) -> bool {
        self.table_id.is_some()
    }

    pub fn precedence(&self) -> Precedence {
        match (self.table_id, self.pds, self.extension_tag) {
            (Some(_), Some(_), _) => Precedence::TableSpecificPrivate,
            (Some(_), None, _) => Precedence::TableSpecific,
            (None, _, Some(_)) => Precedence::Extension,
            (None, Some(_), None) => Precedence::Private,
            (None, None, None) => Precedence::Regular,
        }
    }

    fn standards_match(&self, active: Standards) -> bool {
        self.standards.is_empty() || self.standards.intersects(active)
    }

    /// True if this registration applies to `lookup`.
    ///
    /// Regular and extension registrations also need a standard in common
    /// with the lookup; [`Registry`](crate::registry::Registry) handles the
    /// case where the lookup carries no standard at all.
    pub fn matches(&self, lookup: &DescriptorLookup) -> bool {
        if self.tag != lookup.tag {
            return false;
        }
        match self.precedence() {
            Precedence::TableSpecificPrivate => {
                self.table_id == lookup.table_id && self.pds == lookup.pds
            }
            Precedence::TableSpecific => self.table_id == lookup.table_id,
            Precedence::Extension => {
                self.extension_tag == lookup.extension_tag && self.standards_match(lookup.standards)
            }
            Precedence::Private => self.pds == lookup.pds,
            Precedence::Regular => self.standards_match(lookup.standards),
        }
    }

    /// Like [`matches`](Self::matches), ignoring standards.
    pub(crate) fn matches_any_standard(&self, lookup: &DescriptorLookup) -> bool {
        self.tag == lookup.tag
            && match self.precedence() {
                Precedence::Extension => self.extension_tag == lookup.extension_tag,
                Precedence::Regular => true,
                _ => false,
            }
    }
}

impl fmt::Display for Edid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag 0x{:02X}", self.tag)?;
        if let Some(ext) = self.extension_tag {
            write!(f, ", ext 0x{:02X}", ext)?;
        }
        if let Some(tid) = self.table_id {
            write!(f, ", table 0x{:02X}", tid)?;
        }
        if let Some(pds) = self.pds {
            write!(f, ", PDS 0x{:08X}", pds)?;
        }
        if !self.standards.is_empty() {
            write!(f, " ({})", self.standards)?;
        }
        Ok(())
    }
}

/// The context in which a descriptor tag was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorLookup {
    pub tag: Did,
    pub table_id: Option<Tid>,
    pub standards: Standards,
    /// Only set for user-private tags.
    pub pds: Option<Pds>,
    /// Only set for extension descriptors.
    pub extension_tag: Option<u8>,
}

impl DescriptorLookup {
    /// Build a lookup from the raw descriptor and its surroundings.
    ///
    /// `pds` is dropped for tags below 0x80 and `first_payload_byte` is
    /// kept as extension tag only under an extension marker.
    pub fn new(
        tag: Did,
        table_id: Option<Tid>,
        standards: Standards,
        pds: Option<Pds>,
        first_payload_byte: Option<u8>,
    ) -> Self {
        let extension_tag = match tag {
            did::DVB_EXTENSION | did::MPEG_EXTENSION => first_payload_byte,
            _ => None,
        };
        DescriptorLookup {
            tag,
            table_id,
            standards,
            pds: if is_private_tag(tag) { pds.filter(|&p| p != 0) } else { None },
            extension_tag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{pds, tid};

    #[test]
    fn test_precedence_order() {
        let mut all = [
            Edid::regular(0x83, Standards::DVB),
            Edid::private(0x83, pds::EACEM),
            Edid::dvb_extension(0x06),
            Edid::table_specific(0x83, tid::NIT_ACTUAL, Standards::DVB),
            Edid::table_specific_private(0x83, tid::NIT_ACTUAL, pds::EACEM),
        ];
        all.sort_by_key(|e| e.precedence());
        assert_eq!(all[0].precedence(), Precedence::TableSpecificPrivate);
        assert_eq!(all[4].precedence(), Precedence::Regular);
    }

    #[test]
    fn test_lookup_drops_pds_for_public_tags() {
        let l = DescriptorLookup::new(0x48, None, Standards::DVB, Some(pds::EACEM), Some(0x01));
        assert_eq!(l.pds, None);
        assert_eq!(l.extension_tag, None);

        let l = DescriptorLookup::new(0x7F, None, Standards::DVB, None, Some(0x06));
        assert_eq!(l.extension_tag, Some(0x06));
    }

    #[test]
    fn test_matches() {
        let lookup = DescriptorLookup::new(0x83, Some(tid::NIT_ACTUAL), Standards::DVB, Some(pds::EACEM), None);
        assert!(Edid::private(0x83, pds::EACEM).matches(&lookup));
        assert!(!Edid::private(0x83, 0x1234).matches(&lookup));
        assert!(Edid::table_specific(0x83, tid::NIT_ACTUAL, Standards::DVB).matches(&lookup));
        assert!(!Edid::table_specific(0x83, tid::SDT_ACTUAL, Standards::DVB).matches(&lookup));
        assert!(!Edid::regular(0x83, Standards::ISDB).matches(&lookup));
        assert!(Edid::regular(0x83, Standards::empty()).matches(&lookup));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Edid::private(0x83, pds::EACEM).to_string(),
            "tag 0x83, PDS 0x00000028 (DVB)"
        );
    }
}
