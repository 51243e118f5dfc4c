//! Error types for section framing, encode/decode and XML conversion.

use thiserror::Error;

use crate::types::{Did, Tid};

/// Wire framing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SectionError {
    /// Not enough bytes for a section header.
    #[error("Section too short: {0} bytes")]
    TooShort(usize),

    /// The section_length field disagrees with the available data.
    #[error("Section length mismatch: header declares {declared} bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// CRC32 verification failed.
    #[error("CRC32 mismatch: computed 0x{computed:08X}, stored 0x{stored:08X}")]
    CrcMismatch { computed: u32, stored: u32 },

    /// Section exceeds the maximum size for its kind.
    #[error("Section too large: {0} bytes (max: {1})")]
    TooLarge(usize, usize),

    /// A table produced more sections than a section number can address.
    #[error("Too many sections: {0} (max: 256)")]
    TooManySections(usize),

    /// Short sections cannot be numbered.
    #[error("A short-section table cannot span {0} sections")]
    ShortTableSplit(usize),

    /// A section was offered to a table it does not belong to.
    #[error("Section 0x{table_id:02X}/0x{table_id_ext:04X} v{version} does not belong to this table")]
    ForeignSection {
        table_id: Tid,
        table_id_ext: u16,
        version: u8,
    },

    /// Sections of one table disagree on the last section number.
    #[error("Inconsistent last_section_number: expected {expected}, got {actual}")]
    InconsistentLastSection { expected: u8, actual: u8 },
}

/// XML conversion errors.
///
/// Validation variants carry the element name and its 1-based line number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// The document is not well-formed XML.
    #[error("XML syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("<{element}>, line {line}: missing required attribute '{attribute}'")]
    MissingAttribute {
        element: String,
        line: usize,
        attribute: String,
    },

    #[error("<{element}>, line {line}: '{attribute}' value {value} out of range {min}..={max}")]
    OutOfRange {
        element: String,
        line: usize,
        attribute: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("<{element}>, line {line}: invalid value '{value}' for '{attribute}'")]
    InvalidValue {
        element: String,
        line: usize,
        attribute: String,
        value: String,
    },

    #[error("<{element}>, line {line}: attributes {attributes} are mutually exclusive")]
    ExclusiveAttributes {
        element: String,
        line: usize,
        attributes: String,
    },

    #[error("<{element}>, line {line}: expected {min}..={max} <{child}>, got {count}")]
    ChildCount {
        element: String,
        line: usize,
        child: String,
        count: usize,
        min: usize,
        max: usize,
    },

    #[error("Illegal <{element}> at line {line}")]
    UnexpectedElement { element: String, line: usize },

    #[error("<{element}>, line {line}: private descriptor requires private data specifier 0x{pds:08X}")]
    MissingPrivateDataSpecifier { element: String, line: usize, pds: u32 },

    #[error("<{element}>, line {line}: descriptor not allowed in table 0x{table_id:02X}")]
    NotAllowedInTable {
        element: String,
        line: usize,
        table_id: Tid,
    },

    #[error("<{element}>, line {line}: {message}")]
    Invalid {
        element: String,
        line: usize,
        message: String,
    },
}

/// Errors at the encode/decode boundary.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Strict decoding rejected a descriptor.
    #[error("Invalid {name} descriptor (tag 0x{tag:02X}): {reason}")]
    InvalidDescriptor {
        tag: Did,
        name: String,
        reason: String,
    },

    /// Strict decoding rejected a table.
    #[error("Invalid {name} table (id 0x{table_id:02X}): {reason}")]
    InvalidTable {
        table_id: Tid,
        name: String,
        reason: String,
    },

    /// A serialized payload exceeds what its type can carry.
    #[error("{name}: payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { name: String, size: usize, max: usize },

    /// The buffer error flag was set while serializing.
    #[error("{0}: serialization error")]
    SerializeFailed(String),

    /// A single entry cannot fit even in an empty section.
    #[error("Entry of {size} bytes does not fit in an empty section ({capacity} bytes available)")]
    EntryTooLarge { size: usize, capacity: usize },

    /// Decoding was requested before all sections arrived.
    #[error("Incomplete table 0x{table_id:02X}: {present} of {expected} sections")]
    IncompleteTable {
        table_id: Tid,
        present: usize,
        expected: usize,
    },

    /// A descriptor loop ends in the middle of a descriptor.
    #[error("Malformed descriptor loop at offset {offset}: {remaining} bytes left")]
    MalformedDescriptorLoop { offset: usize, remaining: usize },

    /// No registration knows this XML element.
    #[error("Unknown XML element <{element}> at line {line}")]
    UnknownElement { element: String, line: usize },

    #[error(transparent)]
    Section(#[from] SectionError),

    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = XmlError::MissingAttribute {
            element: "service_descriptor".into(),
            line: 12,
            attribute: "service_type".into(),
        };
        assert_eq!(
            e.to_string(),
            "<service_descriptor>, line 12: missing required attribute 'service_type'"
        );

        let e = CodecError::EntryTooLarge { size: 300, capacity: 240 };
        assert!(e.to_string().contains("300 bytes"));
    }

    #[test]
    fn test_from_conversions() {
        let e: CodecError = SectionError::TooShort(2).into();
        assert!(matches!(e, CodecError::Section(SectionError::TooShort(2))));
    }
}
