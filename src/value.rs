//! Dynamic attribute values
//!
//! Objects are untyped bags of attributes; a `Value` is whatever one
//! attribute holds. Collection shapes (`List`, `Set`, `Map`) are produced and
//! consumed only through a [`ContainerPolicy`](crate::container::ContainerPolicy).

use std::fmt;

use crate::dom::XmlElement;
use crate::object::ObjectId;
use crate::qname::QName;
use crate::root::XmlRoot;

/// Binary payload handed over by an attachment transport without copying it
/// into an attribute as plain bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataHandle {
    pub content_type: String,
    pub content: Vec<u8>,
}

impl DataHandle {
    pub fn new(content_type: &str, content: Vec<u8>) -> Self {
        DataHandle {
            content_type: content_type.to_string(),
            content,
        }
    }
}

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    QName(QName),
    /// Reference into the owning [`ObjectGraph`](crate::object::ObjectGraph)
    Object(ObjectId),
    /// Ordered container
    List(Vec<Value>),
    /// Unique-element container, insertion ordered
    Set(Vec<Value>),
    /// Keyed container, insertion ordered
    Map(Vec<(Value, Value)>),
    /// Raw element kept by Any/Fragment mappings
    Element(XmlElement),
    /// Payload paired with the element name it came from
    Root(Box<XmlRoot>),
    DataHandle(DataHandle),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::DataHandle(h) => Some(&h.content),
            _ => None,
        }
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::QName(_) => "qname",
            Value::Object(_) => "object",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Element(_) => "element",
            Value::Root(_) => "root",
            Value::DataHandle(_) => "data-handle",
        }
    }

    /// Canonical text of a scalar, used to compare key values regardless of
    /// how they were typed. `None` for non-scalars.
    pub fn key_string(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Bytes(b) => Some(hex::encode(b)),
            Value::QName(q) => Some(q.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Object(id) => write!(f, "object#{}", id),
            Value::Element(e) => write!(f, "<{}>", e.qname()),
            Value::Root(r) => write!(f, "root({})", r.name),
            other => match other.key_string() {
                Some(s) => f.write_str(&s),
                None => f.write_str(other.type_label()),
            },
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}
