//! Registry of descriptor and table types.
//!
//! Registrations are made once, in an explicit startup pass, through a
//! [`RegistryBuilder`]. The resulting [`Registry`] is immutable and can be
//! shared between threads without locking. A process-wide instance holding
//! the built-in types is available through [`Registry::global`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::debug;
use once_cell::sync::OnceCell;

use crate::buffer::PsiBuffer;
use crate::descriptor::DescriptorCodec;
use crate::display::TablesDisplay;
use crate::identity::{DescriptorLookup, Edid};
use crate::section::Section;
use crate::standards::Standards;
use crate::table::TableCodec;
use crate::types::{Did, Tid};

/// Creates a descriptor in its default state.
pub type DescriptorFactory = fn() -> Box<dyn DescriptorCodec>;

/// Creates a table in its default state.
pub type TableFactory = fn() -> Box<dyn TableCodec>;

/// Displays a descriptor payload (after the extension tag, if any).
pub type DisplayDescriptorFn = fn(out: &mut dyn fmt::Write, buf: &mut PsiBuffer, margin: &str) -> fmt::Result;

/// Displays the payload of one section of a table.
pub type DisplaySectionFn =
    fn(disp: &mut TablesDisplay<'_, '_>, section: &Section, buf: &mut PsiBuffer, margin: &str) -> fmt::Result;

#[derive(Clone)]
pub struct DescriptorRegistration {
    pub edid: Edid,
    pub xml_name: &'static str,
    /// Older XML name, still accepted on input.
    pub legacy_xml_name: Option<&'static str>,
    pub factory: DescriptorFactory,
    pub display: Option<DisplayDescriptorFn>,
}

impl fmt::Debug for DescriptorRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorRegistration")
            .field("edid", &self.edid)
            .field("xml_name", &self.xml_name)
            .field("legacy_xml_name", &self.legacy_xml_name)
            .field("display", &self.display.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct TableRegistration {
    pub table_ids: Vec<Tid>,
    /// Standards defining the table, empty if standard-agnostic.
    pub standards: Standards,
    pub xml_name: &'static str,
    pub factory: TableFactory,
    pub display: Option<DisplaySectionFn>,
}

impl fmt::Debug for TableRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRegistration")
            .field("table_ids", &self.table_ids)
            .field("standards", &self.standards)
            .field("xml_name", &self.xml_name)
            .field("display", &self.display.is_some())
            .finish()
    }
}

static GLOBAL: OnceCell<Registry> = OnceCell::new();

/// Immutable map from identities and XML names to factories.
#[derive(Debug, Default)]
pub struct Registry {
    descriptors: HashMap<Edid, DescriptorRegistration>,
    /// Candidate identities per tag, most specific first.
    descriptors_by_tag: HashMap<Did, Vec<Edid>>,
    /// Lowercase XML name to identities.
    descriptor_names: HashMap<String, Vec<Edid>>,
    tables: Vec<TableRegistration>,
    tables_by_id: BTreeMap<Tid, Vec<usize>>,
    table_names: HashMap<String, usize>,
}

impl Registry {
    /// The process-wide registry. Built with the built-in types on first
    /// use unless [`install`](Self::install) was called before.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::builtin)
    }

    /// Install the process-wide registry. Fails if it is already set.
    pub fn install(registry: Registry) -> Result<(), Registry> {
        GLOBAL.set(registry)
    }

    /// A registry with every built-in descriptor and table type.
    pub fn builtin() -> Registry {
        let mut builder = RegistryBuilder::new();
        crate::descriptors::register_all(&mut builder);
        crate::tables::register_all(&mut builder);
        builder.build()
    }

    // ------------------------------------------------------------------
    // Descriptors
    // ------------------------------------------------------------------

    /// Resolve a descriptor, most specific registration first.
    ///
    /// With no active standard, a tag with exactly one regular or extension
    /// candidate resolves to it.
    pub fn resolve_descriptor(&self, lookup: &DescriptorLookup) -> Option<&DescriptorRegistration> {
        let candidates = self.descriptors_by_tag.get(&lookup.tag)?;
        if let Some(edid) = candidates.iter().find(|e| e.matches(lookup)) {
            return self.descriptors.get(edid);
        }
        if lookup.standards.is_empty() {
            let mut fallback = candidates.iter().filter(|e| e.matches_any_standard(lookup));
            if let (Some(only), None) = (fallback.next(), fallback.next()) {
                return self.descriptors.get(only);
            }
        }
        None
    }

    pub fn descriptor(&self, edid: &Edid) -> Option<&DescriptorRegistration> {
        self.descriptors.get(edid)
    }

    /// Find a descriptor by XML name, preferring the definition specific to
    /// `table_id` when the name has several.
    pub fn descriptor_by_name(&self, name: &str, table_id: Option<Tid>) -> Option<&DescriptorRegistration> {
        let edids = self.descriptor_names.get(&name.to_ascii_lowercase())?;
        let edid = edids
            .iter()
            .find(|e| e.table_id().is_some() && e.table_id() == table_id)
            .or_else(|| edids.iter().find(|e| !e.is_table_specific()))
            .or_else(|| edids.first())?;
        self.descriptors.get(edid)
    }

    /// False only for a table-specific descriptor outside its tables.
    pub fn is_descriptor_allowed(&self, name: &str, table_id: Tid) -> bool {
        match self.descriptor_names.get(&name.to_ascii_lowercase()) {
            Some(edids) if edids.iter().all(Edid::is_table_specific) => {
                edids.iter().any(|e| e.table_id() == Some(table_id))
            }
            _ => true,
        }
    }

    pub fn descriptor_registrations(&self) -> impl Iterator<Item = &DescriptorRegistration> {
        self.descriptors.values()
    }

    /// All registered descriptor identities, sorted.
    pub fn descriptor_ids(&self) -> Vec<Edid> {
        let mut ids: Vec<Edid> = self.descriptors.keys().copied().collect();
        ids.sort();
        ids
    }

    /// All descriptor XML names, legacy names included, sorted.
    pub fn descriptor_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.descriptor_names.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    /// Resolve a table id under the active standards.
    ///
    /// When no registration matches the standards, a single registration
    /// for the table id is used as fallback.
    pub fn resolve_table(&self, table_id: Tid, standards: Standards) -> Option<&TableRegistration> {
        let indexes = self.tables_by_id.get(&table_id)?;
        let mut fallback = None;
        let mut fallback_count = 0;
        for &i in indexes {
            let reg = &self.tables[i];
            if reg.standards.is_empty() || reg.standards.intersects(standards) {
                return Some(reg);
            }
            fallback = Some(reg);
            fallback_count += 1;
        }
        if fallback_count == 1 {
            fallback
        } else {
            None
        }
    }

    pub fn table_by_name(&self, name: &str) -> Option<&TableRegistration> {
        self.table_names
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.tables[i])
    }

    /// Standards defining a table id, empty when unknown or ambiguous.
    pub fn defining_standards(&self, table_id: Tid) -> Standards {
        match self.tables_by_id.get(&table_id).map(Vec::as_slice) {
            Some([only]) => self.tables[*only].standards,
            _ => Standards::empty(),
        }
    }

    pub fn table_registrations(&self) -> impl Iterator<Item = &TableRegistration> {
        self.tables.iter()
    }

    pub fn table_ids(&self) -> Vec<Tid> {
        self.tables_by_id.keys().copied().collect()
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.iter().map(|t| t.xml_name).collect();
        names.sort_unstable();
        names
    }
}

/// Mutable registry under construction.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder::default()
    }

    /// Register a descriptor type. Re-registering an identity replaces the
    /// factory; XML names accumulate.
    pub fn register_descriptor(&mut self, registration: DescriptorRegistration) -> &mut Self {
        let reg = &mut self.registry;
        let edid = registration.edid;
        if reg.descriptors.contains_key(&edid) {
            debug!("descriptor {} re-registered as <{}>", edid, registration.xml_name);
        } else {
            let candidates = reg.descriptors_by_tag.entry(edid.tag()).or_default();
            candidates.push(edid);
            candidates.sort_by_key(Edid::precedence);
        }
        for name in std::iter::once(registration.xml_name).chain(registration.legacy_xml_name) {
            let edids = reg.descriptor_names.entry(name.to_ascii_lowercase()).or_default();
            if !edids.contains(&edid) {
                edids.push(edid);
            }
        }
        reg.descriptors.insert(edid, registration);
        self
    }

    /// Shorthand for [`register_descriptor`](Self::register_descriptor).
    pub fn descriptor(
        &mut self,
        edid: Edid,
        xml_name: &'static str,
        factory: DescriptorFactory,
        display: Option<DisplayDescriptorFn>,
    ) -> &mut Self {
        self.register_descriptor(DescriptorRegistration {
            edid,
            xml_name,
            legacy_xml_name: None,
            factory,
            display,
        })
    }

    /// Register a table type under one or more table ids. Re-registering an
    /// XML name replaces the previous registration.
    pub fn register_table(&mut self, registration: TableRegistration) -> &mut Self {
        let reg = &mut self.registry;
        let key = registration.xml_name.to_ascii_lowercase();
        let index = match reg.table_names.get(&key) {
            Some(&i) => {
                debug!("table <{}> re-registered", registration.xml_name);
                for indexes in reg.tables_by_id.values_mut() {
                    indexes.retain(|&x| x != i);
                }
                reg.tables_by_id.retain(|_, v| !v.is_empty());
                reg.tables[i] = registration;
                i
            }
            None => {
                reg.tables.push(registration);
                reg.tables.len() - 1
            }
        };
        for &tid in &reg.tables[index].table_ids {
            reg.tables_by_id.entry(tid).or_default().push(index);
        }
        reg.table_names.insert(key, index);
        self
    }

    pub fn build(self) -> Registry {
        debug!(
            "registry built: {} descriptors, {} tables",
            self.registry.descriptors.len(),
            self.registry.tables.len()
        );
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::GenericDescriptor;
    use crate::table::GenericTable;
    use crate::types::{did, pds, tid};

    fn generic() -> Box<dyn DescriptorCodec> {
        GenericDescriptor::create()
    }

    fn table() -> Box<dyn TableCodec> {
        GenericTable::create()
    }

    fn builder() -> RegistryBuilder {
        let mut b = RegistryBuilder::new();
        b.descriptor(Edid::regular(0x83, Standards::ISDB), "isdb_83", generic, None)
            .descriptor(Edid::private(0x83, pds::EACEM), "eacem_83", generic, None)
            .descriptor(Edid::table_specific(0x83, tid::NIT_ACTUAL, Standards::DVB), "nit_83", generic, None)
            .descriptor(Edid::regular(did::SERVICE, Standards::DVB), "service", generic, None)
            .descriptor(Edid::dvb_extension(0x06), "ext_06", generic, None);
        b
    }

    #[test]
    fn test_descriptor_precedence() {
        let reg = builder().build();
        let lookup = |tid, standards, pds| DescriptorLookup::new(0x83, tid, standards, pds, None);

        let r = reg.resolve_descriptor(&lookup(Some(tid::NIT_ACTUAL), Standards::ISDB, Some(pds::EACEM)));
        assert_eq!(r.unwrap().xml_name, "nit_83");
        let r = reg.resolve_descriptor(&lookup(Some(tid::SDT_ACTUAL), Standards::ISDB, Some(pds::EACEM)));
        assert_eq!(r.unwrap().xml_name, "eacem_83");
        let r = reg.resolve_descriptor(&lookup(None, Standards::ISDB, None));
        assert_eq!(r.unwrap().xml_name, "isdb_83");
        assert!(reg.resolve_descriptor(&lookup(None, Standards::DVB, None)).is_none());
    }

    #[test]
    fn test_fallback_without_standards() {
        let reg = builder().build();
        let service = DescriptorLookup::new(did::SERVICE, None, Standards::empty(), None, None);
        assert_eq!(reg.resolve_descriptor(&service).unwrap().xml_name, "service");
        let service = DescriptorLookup::new(did::SERVICE, None, Standards::ISDB, None, None);
        assert!(reg.resolve_descriptor(&service).is_none());
        let ext = DescriptorLookup::new(did::DVB_EXTENSION, None, Standards::empty(), None, Some(0x06));
        assert_eq!(reg.resolve_descriptor(&ext).unwrap().xml_name, "ext_06");
    }

    #[test]
    fn test_last_registration_wins() {
        let mut b = builder();
        b.register_descriptor(DescriptorRegistration {
            edid: Edid::regular(did::SERVICE, Standards::DVB),
            xml_name: "service_v2",
            legacy_xml_name: Some("old_service"),
            factory: generic,
            display: None,
        });
        let reg = b.build();
        let lookup = DescriptorLookup::new(did::SERVICE, None, Standards::DVB, None, None);
        assert_eq!(reg.resolve_descriptor(&lookup).unwrap().xml_name, "service_v2");
        assert!(reg.descriptor_by_name("SERVICE", None).is_some());
        assert!(reg.descriptor_by_name("old_service", None).is_some());
    }

    #[test]
    fn test_descriptor_allowed() {
        let reg = builder().build();
        assert!(reg.is_descriptor_allowed("nit_83", tid::NIT_ACTUAL));
        assert!(!reg.is_descriptor_allowed("nit_83", tid::SDT_ACTUAL));
        assert!(reg.is_descriptor_allowed("service", tid::SDT_ACTUAL));
    }

    #[test]
    fn test_table_resolution() {
        let mut b = RegistryBuilder::new();
        b.register_table(TableRegistration {
            table_ids: vec![0xC8],
            standards: Standards::ATSC,
            xml_name: "atsc_c8",
            factory: table,
            display: None,
        });
        let reg = b.build();
        // Single candidate used as fallback under another standard.
        assert_eq!(reg.resolve_table(0xC8, Standards::DVB).unwrap().xml_name, "atsc_c8");
        assert_eq!(reg.defining_standards(0xC8), Standards::ATSC);

        let mut b = RegistryBuilder::new();
        for (name, std) in [("a", Standards::ATSC), ("b", Standards::ISDB)] {
            b.register_table(TableRegistration {
                table_ids: vec![0xC8],
                standards: std,
                xml_name: name,
                factory: table,
                display: None,
            });
        }
        let reg = b.build();
        assert_eq!(reg.resolve_table(0xC8, Standards::ISDB).unwrap().xml_name, "b");
        assert!(reg.resolve_table(0xC8, Standards::DVB).is_none());
        assert_eq!(reg.defining_standards(0xC8), Standards::empty());
    }

    #[test]
    fn test_builtin_registry() {
        let reg = Registry::builtin();
        assert!(reg.table_by_name("PAT").is_some());
        assert!(reg.descriptor_by_name("service_descriptor", None).is_some());
        assert!(reg.table_ids().contains(&tid::SDT_OTHER));
    }
}
