use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};
use clap_num::maybe_hex;
use psitool_codec::Standards;

#[derive(Debug, Parser)]
#[clap(name = "psitool")]
#[clap(about = "psitool inspects, builds and converts PSI/SI tables between binary sections and XML.", long_about = None)]
#[clap(author = "maleicacid")]
#[clap(version)]
pub(crate) struct Cli {
    /// Configuration file.{n}
    /// Defaults to `psitool.toml` in the current directory when it exists.
    #[clap(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Signalization standards in effect, e.g. `dvb,isdb`.{n}
    /// Replaces the `standards` list of the configuration file.
    #[clap(short, long, global = true, value_parser = parse_standards)]
    pub standards: Option<Standards>,

    /// Reject malformed tables and descriptors instead of keeping them
    /// partially decoded.
    #[clap(long, global = true)]
    pub strict: bool,

    /// Enable debug-level logging.
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Display a binary section file.{n}
    /// Sections are grouped into tables, then every table, section and
    /// descriptor is printed.
    #[clap(name = "inspect")]
    Inspect {
        /// Binary file of concatenated sections.
        #[clap(value_name = "FILE")]
        input: PathBuf,

        /// Only display tables with this table id.
        #[clap(long = "tid", value_parser = maybe_hex::<u8>)]
        table_id: Option<u8>,
    },

    /// Convert a binary section file into an XML document.
    #[clap(name = "to-xml")]
    ToXml {
        /// Binary file of concatenated sections.
        #[clap(value_name = "FILE")]
        input: PathBuf,

        /// Output file. Standard output when omitted.
        #[clap(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },

    /// Convert an XML document into a binary section file.{n}
    /// Tables and descriptors which fail to convert are reported and left out.
    #[clap(name = "from-xml")]
    FromXml {
        /// XML document.
        #[clap(value_name = "FILE")]
        input: PathBuf,

        /// Output file.{n}
        /// Defaults to the input file name with a `.bin` extension.
        #[clap(short, long, value_name = "OUT")]
        output: Option<PathBuf>,

        /// Insert missing private_data_specifier_descriptors before private
        /// descriptors.
        #[clap(long)]
        fix_pds: bool,
    },

    /// List registered tables and descriptors.
    #[clap(name = "list")]
    #[clap(group(
    ArgGroup::new("kind")
    .args(& ["tables", "descriptors"])
    .multiple(false)
    ))]
    List {
        /// Only list tables.
        #[clap(long)]
        tables: bool,

        /// Only list descriptors.
        #[clap(long)]
        descriptors: bool,
    },
}

fn parse_standards(s: &str) -> Result<Standards, String> {
    s.parse::<Standards>().map_err(|e| e.to_string())
}
