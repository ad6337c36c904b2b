//! Conversion service
//!
//! Coerces between lexical XML text and typed scalar [`Value`]s. Direct,
//! Reference and Binary mappings go through a [`ConversionService`] so that
//! callers can replace the schema-type rules wholesale.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::dom::namespace::ns;
use crate::error::{OxmError, Result};
use crate::qname::QName;
use crate::value::Value;

/// Scalar target types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalarType {
    #[default]
    String,
    Int,
    Float,
    Bool,
    Base64Binary,
    HexBinary,
    /// Needs the node's namespace context; resolved by the caller
    QName,
}

impl ScalarType {
    /// Built-in scalar type for an XML Schema type name
    pub fn from_schema_type(name: &QName) -> Option<ScalarType> {
        if name.namespace() != Some(ns::XS) {
            return None;
        }
        let scalar = match name.local.as_str() {
            "string" | "normalizedString" | "token" | "anyURI" | "ID" | "IDREF" | "NCName"
            | "Name" | "language" | "date" | "dateTime" | "time" | "duration" => ScalarType::String,
            "int" | "integer" | "long" | "short" | "byte" | "nonNegativeInteger"
            | "positiveInteger" | "negativeInteger" | "nonPositiveInteger" | "unsignedInt"
            | "unsignedShort" | "unsignedByte" => ScalarType::Int,
            "float" | "double" | "decimal" => ScalarType::Float,
            "boolean" => ScalarType::Bool,
            "base64Binary" => ScalarType::Base64Binary,
            "hexBinary" => ScalarType::HexBinary,
            "QName" => ScalarType::QName,
            _ => return None,
        };
        Some(scalar)
    }

    /// Schema type written as `xsi:type` for this scalar
    pub fn schema_type(&self) -> QName {
        let local = match self {
            ScalarType::String => "string",
            ScalarType::Int => "int",
            ScalarType::Float => "double",
            ScalarType::Bool => "boolean",
            ScalarType::Base64Binary => "base64Binary",
            ScalarType::HexBinary => "hexBinary",
            ScalarType::QName => "QName",
        };
        QName::new(Some(ns::XS), local)
    }

    /// Scalar type a value naturally has
    pub fn of(value: &Value) -> Option<ScalarType> {
        match value {
            Value::String(_) => Some(ScalarType::String),
            Value::Int(_) => Some(ScalarType::Int),
            Value::Float(_) => Some(ScalarType::Float),
            Value::Bool(_) => Some(ScalarType::Bool),
            Value::Bytes(_) => Some(ScalarType::Base64Binary),
            Value::QName(_) => Some(ScalarType::QName),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xs:{}", self.schema_type().local)
    }
}

/// Scalar value <-> lexical text
pub trait ConversionService: Send + Sync {
    /// Lexical form of a scalar. QName values are written by the caller,
    /// which owns the namespace context.
    fn to_text(&self, value: &Value, scalar: ScalarType) -> Result<String>;

    /// Typed value of `text`
    fn from_text(&self, text: &str, scalar: ScalarType) -> Result<Value>;
}

/// XML Schema lexical rules
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlConversionManager;

impl ConversionService for XmlConversionManager {
    fn to_text(&self, value: &Value, scalar: ScalarType) -> Result<String> {
        let text = match (value, scalar) {
            (Value::Bytes(b), ScalarType::HexBinary) => hex::encode_upper(b),
            (Value::Bytes(b), _) => STANDARD.encode(b),
            (Value::DataHandle(h), ScalarType::HexBinary) => hex::encode_upper(&h.content),
            (Value::DataHandle(h), _) => STANDARD.encode(&h.content),
            (Value::Bool(b), _) => b.to_string(),
            (Value::Int(i), _) => i.to_string(),
            (Value::Float(f), _) => format_float(*f),
            (Value::String(s), _) => s.clone(),
            (Value::QName(q), _) => q.local.clone(),
            (other, _) => return Err(OxmError::conversion(other.type_label(), scalar)),
        };
        Ok(text)
    }

    fn from_text(&self, text: &str, scalar: ScalarType) -> Result<Value> {
        let value = match scalar {
            ScalarType::String => Value::String(text.to_string()),
            ScalarType::Int => Value::Int(
                text.trim()
                    .trim_start_matches('+')
                    .parse()
                    .map_err(|_| OxmError::conversion(text, scalar))?,
            ),
            ScalarType::Float => Value::Float(
                parse_float(text.trim()).ok_or_else(|| OxmError::conversion(text, scalar))?,
            ),
            ScalarType::Bool => match text.trim() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(OxmError::conversion(text, scalar)),
            },
            ScalarType::Base64Binary => {
                let compact: String = text.split_whitespace().collect();
                Value::Bytes(STANDARD.decode(compact)?)
            }
            ScalarType::HexBinary => Value::Bytes(hex::decode(text.trim())?),
            ScalarType::QName => Value::QName(QName::local(text.trim())),
        };
        Ok(value)
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "INF" } else { "-INF" }.to_string()
    } else {
        f.to_string()
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        _ => text.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_schema_type() {
        let int = QName::new(Some(ns::XS), "int");
        assert_eq!(ScalarType::from_schema_type(&int), Some(ScalarType::Int));
        assert_eq!(ScalarType::from_schema_type(&QName::local("int")), None);
    }

    #[test]
    fn test_scalar_conversions() {
        let conv = XmlConversionManager;
        assert_eq!(conv.from_text(" 42 ", ScalarType::Int).unwrap(), Value::Int(42));
        assert_eq!(conv.from_text("1", ScalarType::Bool).unwrap(), Value::Bool(true));
        assert_eq!(conv.from_text("INF", ScalarType::Float).unwrap(), Value::Float(f64::INFINITY));
        assert!(conv.from_text("abc", ScalarType::Int).is_err());
        assert_eq!(conv.to_text(&Value::Float(1.5), ScalarType::Float).unwrap(), "1.5");
    }

    #[test]
    fn test_binary_conversions() {
        let conv = XmlConversionManager;
        let bytes = Value::Bytes(b"hello".to_vec());
        assert_eq!(conv.to_text(&bytes, ScalarType::Base64Binary).unwrap(), "aGVsbG8=");
        assert_eq!(conv.to_text(&bytes, ScalarType::HexBinary).unwrap(), "68656C6C6F");
        assert_eq!(conv.from_text("aGVs\n bG8=", ScalarType::Base64Binary).unwrap(), bytes);
        assert_eq!(conv.from_text("68656c6c6f", ScalarType::HexBinary).unwrap(), bytes);
    }

    #[test]
    fn test_unconvertible_value() {
        let conv = XmlConversionManager;
        let err = conv.to_text(&Value::List(Vec::new()), ScalarType::String).unwrap_err();
        assert!(matches!(err, OxmError::Conversion { .. }));
    }
}
