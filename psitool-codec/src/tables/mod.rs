//! Concrete table types.

pub mod cat;
pub mod nit;
pub mod pat;
pub mod sdt;
pub mod tdt;
pub mod tot;

use chrono::NaiveDateTime;

use crate::error::XmlError;
use crate::registry::RegistryBuilder;
use crate::xml::Element;

pub fn register_all(builder: &mut RegistryBuilder) {
    pat::register(builder);
    cat::register(builder);
    nit::register(builder);
    sdt::register(builder);
    tdt::register(builder);
    tot::register(builder);
}

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn set_date_time_attribute(element: &mut Element, name: &str, value: &NaiveDateTime) {
    element.set_attribute(name, value.format(DATE_TIME_FORMAT).to_string());
}

pub(crate) fn get_date_time_attribute(element: &Element, name: &str) -> Result<NaiveDateTime, XmlError> {
    let text = element.required_attribute(name)?;
    NaiveDateTime::parse_from_str(text.trim(), DATE_TIME_FORMAT).map_err(|_| XmlError::InvalidValue {
        element: element.name().to_string(),
        line: element.line(),
        attribute: name.to_string(),
        value: text.to_string(),
    })
}
