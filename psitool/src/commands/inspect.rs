//! `psitool inspect`: human-readable dump of a binary section file.

use std::path::Path;

use colored::Colorize;
use log::info;
use psitool_codec::{CodecContext, SectionFile, TablesDisplay};

pub(crate) fn inspect(
    ctx: &CodecContext<'_>,
    input: &Path,
    table_id: Option<u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = SectionFile::load_file(input)?;
    info!(
        "{}: {} tables, {} orphan sections",
        input.display(),
        file.tables().len(),
        file.orphans().len()
    );

    let selected = |tid: Option<u8>| table_id.is_none() || tid == table_id;
    let mut text = String::new();
    for table in file.tables().iter().filter(|t| selected(t.table_id())) {
        text.clear();
        TablesDisplay::new(*ctx, &mut text).display_table(table, "")?;
        print_block(&text);
    }

    let orphans: Vec<_> = file.orphans().iter().filter(|s| selected(Some(s.table_id()))).collect();
    if !orphans.is_empty() {
        println!("{}", format!("* {} orphan sections", orphans.len()).yellow().bold());
        for section in orphans {
            text.clear();
            TablesDisplay::new(*ctx, &mut text).display_section(section, "  ")?;
            print!("{}", text);
        }
    }
    Ok(())
}

/// Print a table dump with its first line highlighted.
fn print_block(text: &str) {
    let mut lines = text.lines();
    if let Some(first) = lines.next() {
        println!("{}", first.green().bold());
    }
    for line in lines {
        println!("{}", line);
    }
    println!();
}
