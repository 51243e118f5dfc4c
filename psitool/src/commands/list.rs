//! `psitool list`: registered tables and descriptors.

use colored::Colorize;
use psitool_codec::Registry;

pub(crate) fn list(registry: &Registry, tables: bool, descriptors: bool) {
    let both = !tables && !descriptors;
    if tables || both {
        println!("{}", "Tables".bold());
        for line in table_lines(registry) {
            println!("  {}", line);
        }
    }
    if both {
        println!();
    }
    if descriptors || both {
        println!("{}", "Descriptors".bold());
        for line in descriptor_lines(registry) {
            println!("  {}", line);
        }
    }
}

fn table_lines(registry: &Registry) -> Vec<String> {
    let mut regs: Vec<_> = registry.table_registrations().collect();
    regs.sort_by_key(|r| r.table_ids.first().copied());
    regs.iter()
        .map(|reg| {
            let ids: Vec<String> = reg.table_ids.iter().map(|id| format!("0x{:02X}", id)).collect();
            format!("{} {} ({})", format!("{:<10}", reg.xml_name).cyan(), ids.join(", "), reg.standards)
        })
        .collect()
}

fn descriptor_lines(registry: &Registry) -> Vec<String> {
    registry
        .descriptor_ids()
        .iter()
        .filter_map(|edid| registry.descriptor(edid))
        .map(|reg| match reg.legacy_xml_name {
            Some(legacy) => format!("{} {} (also <{}>)", reg.xml_name.cyan(), reg.edid, legacy),
            None => format!("{} {}", reg.xml_name.cyan(), reg.edid),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_listing() {
        colored::control::set_override(false);
        let registry = Registry::builtin();
        let tables = table_lines(&registry);
        assert!(tables[0].starts_with("PAT"));
        assert!(tables.iter().any(|l| l.contains("0x42, 0x46")));

        let descriptors = descriptor_lines(&registry);
        assert!(descriptors
            .iter()
            .any(|l| l.contains("also <logical_channel_number_descriptor>")));
    }
}
