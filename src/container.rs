//! Container Policy
//!
//! Collection-valued attributes are built and walked only through a
//! [`ContainerPolicy`]. The policy knows the container's shape (ordered,
//! unique, keyed) and never looks at element types, so one mapping kind
//! works the same over a list, a set or a map.

use std::str::FromStr;

use crate::error::{OxmError, Result};
use crate::object::ObjectGraph;
use crate::value::Value;

/// Supported container shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerShape {
    Ordered,
    Unique,
    Keyed,
}

impl FromStr for ContainerShape {
    type Err = OxmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "list" | "ordered" => Ok(ContainerShape::Ordered),
            "set" | "unique" => Ok(ContainerShape::Unique),
            "map" | "keyed" => Ok(ContainerShape::Keyed),
            other => Err(OxmError::InvalidContainer(format!(
                "unknown container shape '{}'",
                other
            ))),
        }
    }
}

/// Stateless strategy over one container shape
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContainerPolicy {
    #[default]
    List,
    Set,
    /// Keyed by the named attribute of each (object) element, or by keys
    /// the mapping supplies itself when `key_attribute` is `None`
    Map { key_attribute: Option<String> },
}

impl ContainerPolicy {
    /// Factory for a shape; keyed containers need a key accessor
    pub fn new(shape: ContainerShape, key_attribute: Option<&str>) -> Result<Self> {
        match (shape, key_attribute) {
            (ContainerShape::Ordered, _) => Ok(ContainerPolicy::List),
            (ContainerShape::Unique, _) => Ok(ContainerPolicy::Set),
            (ContainerShape::Keyed, Some(key)) if !key.is_empty() => Ok(ContainerPolicy::Map {
                key_attribute: Some(key.to_string()),
            }),
            (ContainerShape::Keyed, _) => Err(OxmError::InvalidContainer(
                "keyed container requires a key attribute".to_string(),
            )),
        }
    }

    pub fn map_keyed_by(key_attribute: &str) -> Self {
        ContainerPolicy::Map {
            key_attribute: Some(key_attribute.to_string()),
        }
    }

    /// Keyed container whose keys come with each element (`add_keyed`)
    pub fn keyed() -> Self {
        ContainerPolicy::Map { key_attribute: None }
    }

    pub fn shape(&self) -> ContainerShape {
        match self {
            ContainerPolicy::List => ContainerShape::Ordered,
            ContainerPolicy::Set => ContainerShape::Unique,
            ContainerPolicy::Map { .. } => ContainerShape::Keyed,
        }
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self, ContainerPolicy::Map { .. })
    }

    pub fn empty(&self) -> Value {
        self.sized(0)
    }

    pub fn sized(&self, capacity: usize) -> Value {
        match self {
            ContainerPolicy::List => Value::List(Vec::with_capacity(capacity)),
            ContainerPolicy::Set => Value::Set(Vec::with_capacity(capacity)),
            ContainerPolicy::Map { .. } => Value::Map(Vec::with_capacity(capacity)),
        }
    }

    /// Add one element. Map keys are read from the element object; an element
    /// without the key attribute is stored under a null key.
    pub fn add(&self, container: &mut Value, value: Value, graph: &ObjectGraph) -> Result<()> {
        let key = match self {
            ContainerPolicy::Map {
                key_attribute: Some(key_attribute),
            } => value
                .as_object()
                .and_then(|id| graph.attribute(id, key_attribute))
                .cloned()
                .unwrap_or_default(),
            ContainerPolicy::Map { key_attribute: None } => {
                return Err(OxmError::InvalidContainer(
                    "keyed container without a key attribute needs explicit keys".to_string(),
                ))
            }
            _ => Value::Null,
        };
        self.add_keyed(container, key, value)
    }

    /// Add one element under an explicit key (ignored for non-keyed shapes)
    pub fn add_keyed(&self, container: &mut Value, key: Value, value: Value) -> Result<()> {
        if container.is_null() {
            *container = self.empty();
        }
        match (self, container) {
            (ContainerPolicy::List, Value::List(items)) => items.push(value),
            (ContainerPolicy::Set, Value::Set(items)) => {
                if !items.contains(&value) {
                    items.push(value);
                }
            }
            (ContainerPolicy::Map { .. }, Value::Map(entries)) => {
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value,
                    None => entries.push((key, value)),
                }
            }
            (_, other) => return Err(self.mismatch(other)),
        }
        Ok(())
    }

    /// Elements in container order (map values for keyed containers).
    /// `Null` iterates as empty.
    pub fn iter<'v>(&self, container: &'v Value) -> Result<Vec<&'v Value>> {
        match (self, container) {
            (_, Value::Null) => Ok(Vec::new()),
            (ContainerPolicy::List, Value::List(items)) | (ContainerPolicy::Set, Value::Set(items)) => {
                Ok(items.iter().collect())
            }
            (ContainerPolicy::Map { .. }, Value::Map(entries)) => {
                Ok(entries.iter().map(|(_, v)| v).collect())
            }
            // ordered and unique shapes read each other
            (ContainerPolicy::List, Value::Set(items)) | (ContainerPolicy::Set, Value::List(items)) => {
                Ok(items.iter().collect())
            }
            (_, other) => Err(self.mismatch(other)),
        }
    }

    pub fn size(&self, container: &Value) -> Result<usize> {
        Ok(self.iter(container)?.len())
    }

    fn mismatch(&self, found: &Value) -> OxmError {
        OxmError::InvalidContainer(format!(
            "{:?} policy cannot hold a {} value",
            self.shape(),
            found.type_label()
        ))
    }
}
