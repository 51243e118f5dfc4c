//! Binary serialization engine for MPEG-2 / DVB / ISDB PSI-SI tables and
//! descriptors.
//!
//! The crate converts between three forms of signalization data:
//!
//! - binary sections, as carried in a transport stream ([`Section`],
//!   [`BinaryTable`]),
//! - typed values implementing [`DescriptorCodec`] or [`TableCodec`],
//! - XML elements ([`xml::Element`]).
//!
//! # Section Format
//!
//! ```text
//! +----------+---+---+----+----------------+------------------+--------+
//! | table_id |SSI| P | rs | section_length |  long header (5) | CRC_32 |
//! |  8 bits  | 1 | 1 | 2  |    12 bits     |  + payload       | (long) |
//! +----------+---+---+----+----------------+------------------+--------+
//! ```
//!
//! Every conversion goes through a [`CodecContext`], which carries the
//! [`Registry`] of concrete types, the active [`Standards`] and the
//! [`Strictness`] of decoding.
//!
//! # Example
//!
//! ```rust
//! use psitool_codec::{CodecContext, Standards};
//! use psitool_codec::tables::pat::Pat;
//!
//! let ctx = CodecContext::new().with_standards(Standards::DVB);
//!
//! let mut pat = Pat::default();
//! pat.ts_id = 0x7FE0;
//! pat.pmts.insert(0x0400, 0x01F0);
//!
//! let table = ctx.encode_table(&pat).unwrap();
//! assert_eq!(table.section_count(), 1);
//!
//! let decoded = ctx.decode_table(&table).unwrap();
//! assert!(decoded.is_clean());
//! assert_eq!(decoded.value.as_any().downcast_ref::<Pat>(), Some(&pat));
//! ```

pub mod buffer;
pub mod codec;
pub mod context;
pub mod descriptor;
pub mod descriptors;
pub mod display;
pub mod error;
pub mod identity;
pub mod registry;
pub mod section;
pub mod section_file;
pub mod splitter;
pub mod standards;
pub mod table;
pub mod tables;
pub mod types;
pub mod xml;

pub use buffer::PsiBuffer;
pub use context::{CodecContext, Decoded, Problem, ProblemLog};
pub use descriptor::{Descriptor, DescriptorCodec, DescriptorList, GenericDescriptor};
pub use display::TablesDisplay;
pub use error::{CodecError, SectionError, XmlError};
pub use identity::{DescriptorLookup, Edid, Precedence};
pub use registry::{DescriptorRegistration, Registry, RegistryBuilder, TableRegistration};
pub use section::{Section, SectionHeader};
pub use section_file::SectionFile;
pub use splitter::SectionSplitter;
pub use standards::Standards;
pub use table::{BinaryTable, GenericTable, TableCodec, TableState};
pub use types::{Did, Pds, Strictness, Tid};
