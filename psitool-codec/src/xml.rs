//! Minimal XML element tree, the boundary between concrete types and
//! documents.
//!
//! Parsing and formatting go through `quick-xml`. Element and attribute
//! names compare case-insensitively. Every element remembers the line where
//! it started so that validation errors can point at it.

use std::fmt::Display;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::XmlError;

/// Root element name of psitool documents.
pub const ROOT_NAME: &str = "psitool";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    line: usize,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Source line, 0 when built in memory.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn children_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Element> + 'n
    where
        'a: 'n,
    {
        self.children.iter().filter(move |c| c.has_name(name))
    }

    pub fn add_child(&mut self, name: impl Into<String>) -> &mut Element {
        self.children.push(Element::new(name));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Text content, trimmed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    // ------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn set_int_attribute(&mut self, name: &str, value: impl Into<i64>) {
        self.set_attribute(name, value.into().to_string());
    }

    /// Set `0x`-prefixed hexadecimal, zero-padded to `digits`.
    pub fn set_hex_attribute(&mut self, name: &str, value: impl Into<u64>, digits: usize) {
        self.set_attribute(name, format!("0x{:0width$X}", value.into(), width = digits));
    }

    pub fn set_optional_int_attribute<T: Into<i64>>(&mut self, name: &str, value: Option<T>) {
        if let Some(v) = value {
            self.set_int_attribute(name, v);
        }
    }

    pub fn set_bool_attribute(&mut self, name: &str, value: bool) {
        self.set_attribute(name, if value { "true" } else { "false" });
    }

    /// Hexadecimal dump as text content.
    pub fn set_hex_text(&mut self, data: &[u8]) {
        let lines: Vec<String> = data
            .chunks(16)
            .map(|chunk| chunk.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" "))
            .collect();
        self.text = lines.join("\n");
    }

    // ------------------------------------------------------------------
    // Analysis
    // ------------------------------------------------------------------

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// A required string attribute.
    pub fn required_attribute(&self, name: &str) -> Result<&str, XmlError> {
        self.attribute(name).ok_or_else(|| XmlError::MissingAttribute {
            element: self.name.clone(),
            line: self.line,
            attribute: name.to_string(),
        })
    }

    /// A string attribute with a length limit in bytes.
    pub fn get_string_attribute(
        &self,
        name: &str,
        required: bool,
        max_len: usize,
    ) -> Result<Option<String>, XmlError> {
        let value = match self.attribute(name) {
            Some(v) => v,
            None if required => return self.required_attribute(name).map(|_| None),
            None => return Ok(None),
        };
        if value.len() > max_len {
            return Err(self.invalid_value(name, value));
        }
        Ok(Some(value.to_string()))
    }

    /// An integer attribute in `min..=max`, decimal or `0x` hexadecimal.
    /// A missing optional attribute yields `default`.
    pub fn get_int_attribute<T>(
        &self,
        name: &str,
        required: bool,
        default: T,
        min: T,
        max: T,
    ) -> Result<T, XmlError>
    where
        T: TryFrom<i128> + Into<i128> + Copy + Display,
    {
        match self.get_optional_int_attribute(name, min, max)? {
            Some(v) => Ok(v),
            None if required => self.required_attribute(name).map(|_| default),
            None => Ok(default),
        }
    }

    pub fn get_optional_int_attribute<T>(&self, name: &str, min: T, max: T) -> Result<Option<T>, XmlError>
    where
        T: TryFrom<i128> + Into<i128> + Copy + Display,
    {
        let Some(text) = self.attribute(name) else {
            return Ok(None);
        };
        let value = parse_integer(text).ok_or_else(|| self.invalid_value(name, text))?;
        if value < min.into() || value > max.into() {
            return Err(XmlError::OutOfRange {
                element: self.name.clone(),
                line: self.line,
                attribute: name.to_string(),
                value: text.to_string(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        T::try_from(value).map(Some).map_err(|_| self.invalid_value(name, text))
    }

    pub fn get_bool_attribute(&self, name: &str, required: bool, default: bool) -> Result<bool, XmlError> {
        match self.attribute(name) {
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(true),
                "false" | "no" | "0" | "off" => Ok(false),
                _ => Err(self.invalid_value(name, v)),
            },
            None if required => self.required_attribute(name).map(|_| default),
            None => Ok(default),
        }
    }

    /// Hexadecimal text content, whitespace ignored.
    pub fn get_hex_text(&self, min_size: usize, max_size: usize) -> Result<Vec<u8>, XmlError> {
        let digits: String = self.text.chars().filter(|c| !c.is_whitespace()).collect();
        let bad = || XmlError::Invalid {
            element: self.name.clone(),
            line: self.line,
            message: "invalid hexadecimal content".to_string(),
        };
        if digits.len() % 2 != 0 {
            return Err(bad());
        }
        let data = (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| bad())?;
        if data.len() < min_size || data.len() > max_size {
            return Err(XmlError::Invalid {
                element: self.name.clone(),
                line: self.line,
                message: format!("hexadecimal content is {} bytes, allowed {}..={}", data.len(), min_size, max_size),
            });
        }
        Ok(data)
    }

    /// At most one of `names` may be present.
    pub fn check_exclusive(&self, names: &[&str]) -> Result<(), XmlError> {
        let present: Vec<&str> = names.iter().copied().filter(|n| self.has_attribute(n)).collect();
        if present.len() > 1 {
            return Err(XmlError::ExclusiveAttributes {
                element: self.name.clone(),
                line: self.line,
                attributes: present.join(", "),
            });
        }
        Ok(())
    }

    /// Children named `name`, between `min` and `max` of them.
    pub fn get_children(&self, name: &str, min: usize, max: usize) -> Result<Vec<&Element>, XmlError> {
        let found: Vec<&Element> = self.children.iter().filter(|c| c.has_name(name)).collect();
        if found.len() < min || found.len() > max {
            return Err(XmlError::ChildCount {
                element: self.name.clone(),
                line: self.line,
                child: name.to_string(),
                count: found.len(),
                min,
                max,
            });
        }
        Ok(found)
    }

    pub fn invalid(&self, message: impl Into<String>) -> XmlError {
        XmlError::Invalid {
            element: self.name.clone(),
            line: self.line,
            message: message.into(),
        }
    }

    fn invalid_value(&self, name: &str, value: &str) -> XmlError {
        XmlError::InvalidValue {
            element: self.name.clone(),
            line: self.line,
            attribute: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn unexpected(&self) -> XmlError {
        XmlError::UnexpectedElement {
            element: self.name.clone(),
            line: self.line,
        }
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Parse a document and return its root element.
    pub fn parse_document(text: &str) -> Result<Element, XmlError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut lines = LineCounter::new(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| XmlError::Syntax {
                line: lines.line_at(usize::try_from(reader.buffer_position()).unwrap_or(text.len())),
                message: e.to_string(),
            })?;
            let end = usize::try_from(reader.buffer_position()).unwrap_or(text.len());
            match event {
                Event::Start(_) | Event::Empty(_) if root.is_some() && stack.is_empty() => {
                    return Err(XmlError::Syntax {
                        line: lines.tag_line(end),
                        message: "more than one root element".to_string(),
                    });
                }
                Event::Start(start) => {
                    stack.push(element_from_start(&start, lines.tag_line(end))?);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start, lines.tag_line(end))?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element);
                    }
                }
                Event::Text(t) => {
                    if let Some(current) = stack.last_mut() {
                        let text = t.unescape().map_err(|e| XmlError::Syntax {
                            line: lines.line_at(end),
                            message: e.to_string(),
                        })?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(c) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = stack.first() {
            return Err(XmlError::Syntax {
                line: unclosed.line,
                message: format!("unclosed element <{}>", unclosed.name),
            });
        }
        root.ok_or_else(|| XmlError::Syntax {
            line: 1,
            message: "no root element".to_string(),
        })
    }

    /// Format the element as an indented document with an XML declaration.
    pub fn to_document(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;
        self.write_to(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(write_error)
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), XmlError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        let text = self.text.trim();
        if self.children.is_empty() && text.is_empty() {
            return writer.write_event(Event::Empty(start)).map_err(write_error);
        }
        writer.write_event(Event::Start(start)).map_err(write_error)?;
        if !text.is_empty() {
            writer.write_event(Event::Text(BytesText::new(text))).map_err(write_error)?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(write_error)
    }
}

fn write_error(e: impl Display) -> XmlError {
    XmlError::Syntax {
        line: 0,
        message: e.to_string(),
    }
}

fn element_from_start(start: &BytesStart<'_>, line: usize) -> Result<Element, XmlError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    element.line = line;
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Syntax {
            line,
            message: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| XmlError::Syntax {
            line,
            message: e.to_string(),
        })?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

/// Parse a decimal or `0x` hexadecimal integer, allowing `_` and `,` as
/// digit separators.
fn parse_integer(text: &str) -> Option<i128> {
    let cleaned: String = text.trim().chars().filter(|&c| c != '_' && c != ',').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };
    Some(if negative { -value } else { value })
}

/// Incremental byte offset to line number conversion.
struct LineCounter<'a> {
    text: &'a str,
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(text: &'a str) -> Self {
        LineCounter { text, offset: 0, line: 1 }
    }

    fn line_at(&mut self, pos: usize) -> usize {
        let pos = pos.min(self.text.len());
        if pos >= self.offset {
            self.line += self.text.as_bytes()[self.offset..pos].iter().filter(|&&b| b == b'\n').count();
            self.offset = pos;
            self.line
        } else {
            1 + self.text.as_bytes()[..pos].iter().filter(|&&b| b == b'\n').count()
        }
    }

    /// Line of the tag that ends at `end`.
    fn tag_line(&mut self, end: usize) -> usize {
        let end = end.min(self.text.len());
        let start = self.text.as_bytes()[..end].iter().rposition(|&b| b == b'<').unwrap_or(0);
        self.line_at(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<psitool>
  <service_descriptor service_type="0x01"
                      service_provider_name="ACME" service_name="Ch &amp; 1"/>
  <generic_descriptor tag="0x83">
    01 02
    03
  </generic_descriptor>
</psitool>
"#;

    #[test]
    fn test_parse_document() {
        let root = Element::parse_document(DOC).unwrap();
        assert!(root.has_name("PSITOOL"));
        assert_eq!(root.line(), 2);
        let children = root.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].line(), 3);
        assert_eq!(children[0].attribute("Service_Name"), Some("Ch & 1"));
        assert_eq!(children[1].line(), 5);
        assert_eq!(children[1].get_hex_text(0, 255).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_int_attributes() {
        let mut e = Element::new("x");
        e.set_hex_attribute("a", 0x1Fu16, 4);
        e.set_attribute("b", "1_000");
        e.set_attribute("c", "300");
        assert_eq!(e.attribute("a"), Some("0x001F"));
        assert_eq!(e.get_int_attribute::<u16>("a", true, 0, 0, 0x1FFF).unwrap(), 0x1F);
        assert_eq!(e.get_int_attribute::<u32>("b", true, 0, 0, u32::MAX).unwrap(), 1000);
        assert!(matches!(
            e.get_int_attribute::<u8>("c", true, 0, 0, 255),
            Err(XmlError::OutOfRange { .. })
        ));
        assert!(matches!(
            e.get_int_attribute::<u8>("d", true, 0, 0, 255),
            Err(XmlError::MissingAttribute { .. })
        ));
        assert_eq!(e.get_int_attribute::<u8>("d", false, 7, 0, 255).unwrap(), 7);
        assert_eq!(e.get_optional_int_attribute::<u8>("d", 0, 255).unwrap(), None);
    }

    #[test]
    fn test_bool_and_exclusive() {
        let mut e = Element::new("x");
        e.set_bool_attribute("flag", true);
        e.set_attribute("other", "maybe");
        assert!(e.get_bool_attribute("flag", true, false).unwrap());
        assert!(e.get_bool_attribute("other", false, false).is_err());
        assert!(e.check_exclusive(&["flag", "missing"]).is_ok());
        assert!(matches!(
            e.check_exclusive(&["flag", "other"]),
            Err(XmlError::ExclusiveAttributes { .. })
        ));
    }

    #[test]
    fn test_format_and_reparse() {
        let mut root = Element::new(ROOT_NAME);
        let d = root.add_child("generic_descriptor");
        d.set_hex_attribute("tag", 0x83u8, 2);
        d.set_hex_text(&[0xDE, 0xAD]);
        root.add_child("empty");
        let text = root.to_document().unwrap();
        assert!(text.contains("<generic_descriptor tag=\"0x83\">DE AD</generic_descriptor>"));
        assert!(text.contains("<empty/>"));
        let back = Element::parse_document(&text).unwrap();
        assert_eq!(back.children()[0].get_hex_text(2, 2).unwrap(), vec![0xDE, 0xAD]);
    }

    #[test]
    fn test_unclosed_root() {
        match Element::parse_document("<?xml version=\"1.0\"?>\n<psitool>\n  <PAT/>\n") {
            Err(XmlError::Syntax { line, message }) => {
                assert_eq!(line, 2);
                assert_eq!(message, "unclosed element <psitool>");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_get_children_outlives_name() {
        let root = Element::parse_document("<a><b/><c/><b/></a>").unwrap();
        let found = {
            let name = String::from("b");
            root.get_children(&name, 1, 2).unwrap()
        };
        assert_eq!(found.len(), 2);
        assert_eq!(root.children_named("c").count(), 1);
        assert!(matches!(
            root.get_children("c", 2, 3),
            Err(XmlError::ChildCount { count: 1, .. })
        ));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            Element::parse_document("<a><b></a>"),
            Err(XmlError::Syntax { .. })
        ));
    }
}
