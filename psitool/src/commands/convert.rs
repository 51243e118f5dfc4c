//! `psitool to-xml` and `psitool from-xml`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use psitool_codec::{CodecContext, SectionFile};

pub(crate) fn to_xml(
    ctx: &CodecContext<'_>,
    input: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = SectionFile::load_file(input)?;
    let document = file.to_xml(ctx)?;
    match output {
        Some(path) => {
            fs::write(path, document.as_bytes())?;
            info!("{} tables written to {}", file.tables().len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(document.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

pub(crate) fn from_xml(
    ctx: &CodecContext<'_>,
    input: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(input)?;
    let file = SectionFile::from_xml(ctx, &text)?;
    let output = output.map_or_else(|| default_binary_path(input), Path::to_path_buf);
    file.save_file(&output)?;
    info!("{} tables written to {}", file.tables().len(), output.display());
    Ok(())
}

fn default_binary_path(input: &Path) -> PathBuf {
    input.with_extension("bin")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binary_path() {
        assert_eq!(default_binary_path(Path::new("dir/nit.xml")), PathBuf::from("dir/nit.bin"));
        assert_eq!(default_binary_path(Path::new("tables")), PathBuf::from("tables.bin"));
    }

    #[test]
    fn test_xml_to_binary_and_back() {
        let dir = std::env::temp_dir().join(format!("psitool-convert-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let xml = dir.join("tables.xml");
        fs::write(
            &xml,
            r#"<psitool><TDT UTC_time="2026-10-16 09:30:00"/></psitool>"#,
        )
        .unwrap();

        let ctx = CodecContext::new();
        from_xml(&ctx, &xml, None).unwrap();
        let bin = dir.join("tables.bin");
        assert_eq!(fs::read(&bin).unwrap().len(), 8);

        let back = dir.join("back.xml");
        to_xml(&ctx, &bin, Some(&back)).unwrap();
        assert!(fs::read_to_string(&back).unwrap().contains(r#"UTC_time="2026-10-16 09:30:00""#));
        fs::remove_dir_all(&dir).unwrap();
    }
}
