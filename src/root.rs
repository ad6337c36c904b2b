//! Root wrapper values

use crate::qname::QName;
use crate::value::Value;

/// A payload tagged with the element it was read from (or is to be written
/// as). Any and Choice mappings use it when the element name is not implied
/// by the payload's own type.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlRoot {
    pub name: QName,
    /// Prefix seen on read; used as the preferred prefix on write
    pub prefix: Option<String>,
    /// `xsi:type` of the element, when it had one
    pub schema_type: Option<QName>,
    pub value: Value,
}

impl XmlRoot {
    pub fn new(name: QName, value: Value) -> Self {
        XmlRoot {
            name,
            prefix: None,
            schema_type: None,
            value,
        }
    }

    pub fn with_prefix(mut self, prefix: Option<&str>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty()).map(str::to_string);
        self
    }

    pub fn with_schema_type(mut self, schema_type: Option<QName>) -> Self {
        self.schema_type = schema_type;
        self
    }

    pub fn into_value(self) -> Value {
        Value::Root(Box::new(self))
    }
}
