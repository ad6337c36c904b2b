//! RustyOXM - Object-XML mapping over an arena DOM
//!
//! Layers:
//! - dom: arena document, namespace scopes, serializer
//! - path: the XPath subset mappings are addressed with
//! - record: read/write views of a tree at one context node
//! - descriptor + mapping: per-type mapping model, initialized once
//! - context: marshal (objects -> XML) and unmarshal (XML -> objects)
//! - batch: parallel operations over independent documents

pub mod attachment;
#[cfg(feature = "parallel")]
pub mod batch;
pub mod config;
pub mod container;
pub mod context;
pub mod convert;
pub mod descriptor;
pub mod dom;
pub mod error;
pub mod mapping;
pub mod object;
pub mod path;
pub mod qname;
pub mod record;
pub mod reference;
pub mod resolve;
pub mod root;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use attachment::{AttachmentMarshaller, AttachmentUnmarshaller, InMemoryAttachments, MimeTypePolicy};
pub use config::{MarshalConfig, ReferencePolicy, UnmarshalConfig};
pub use container::{ContainerPolicy, ContainerShape};
pub use context::{MarshalContext, UnmarshalContext, Unmarshalled, XmlContext};
pub use convert::{ConversionService, ScalarType, XmlConversionManager};
pub use descriptor::{Descriptor, DescriptorRegistry, InheritancePolicy, TypeIndicator};
pub use dom::{XmlDocument, XmlElement};
pub use error::{OxmError, Result};
pub use mapping::{ChoiceTarget, KeepAsElementPolicy, Mapping, MappingKind};
pub use object::{deep_eq, Object, ObjectGraph, ObjectId};
pub use path::Path;
pub use qname::QName;
pub use record::{ReadRecord, TreeRecord, WriteRecord};
pub use reference::{ReferenceResolver, UnresolvedReference};
pub use root::XmlRoot;
pub use value::{DataHandle, Value};
