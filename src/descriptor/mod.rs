//! Descriptors
//!
//! A [`Descriptor`] is the mapping model of one type: its element and schema
//! type names, its prefix table, its mappings and its primary key. It is
//! built with the `with_*` methods, registered in a [`DescriptorRegistry`]
//! and frozen by [`DescriptorRegistry::initialize`].

pub mod registry;

use indexmap::IndexMap;

use crate::convert::ScalarType;
use crate::dom::NamespaceResolver;
use crate::mapping::Mapping;
use crate::path::Path;
use crate::qname::QName;

pub use registry::DescriptorRegistry;

/// How a node announces its concrete subtype
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeIndicator {
    /// `xsi:type`, matched against registered schema types
    SchemaType,
    /// Value at a path, matched against the policy's indicator table
    Field(String),
}

/// Subtype selection for a type hierarchy. Declared on the hierarchy root
/// and inherited by every subtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritancePolicy {
    indicator: TypeIndicator,
    values: IndexMap<String, String>,
    path: Path,
}

impl InheritancePolicy {
    pub fn schema_type() -> Self {
        InheritancePolicy {
            indicator: TypeIndicator::SchemaType,
            values: IndexMap::new(),
            path: Path::default(),
        }
    }

    pub fn field(xpath: &str) -> Self {
        InheritancePolicy {
            indicator: TypeIndicator::Field(xpath.to_string()),
            values: IndexMap::new(),
            path: Path::default(),
        }
    }

    /// Map an indicator field value to a type
    pub fn with_indicator_value(mut self, value: &str, type_name: &str) -> Self {
        self.values.insert(value.to_string(), type_name.to_string());
        self
    }

    pub fn indicator(&self) -> &TypeIndicator {
        &self.indicator
    }

    /// Compiled indicator path (empty for `SchemaType`)
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn type_for(&self, value: &str) -> Option<&str> {
        self.values.get(value.trim()).map(String::as_str)
    }

    pub fn value_for(&self, type_name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, t)| t.as_str() == type_name)
            .map(|(v, _)| v.as_str())
    }

    pub(crate) fn set_path(&mut self, path: Path) {
        self.path = path;
    }
}

/// A primary-key field resolved to the direct mapping that holds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyField {
    pub path: Path,
    pub attribute: String,
    pub scalar: ScalarType,
}

/// Mapping model of one type
#[derive(Debug, Clone)]
pub struct Descriptor {
    type_name: String,
    default_root: Option<String>,
    schema_type: Option<String>,
    declared_namespaces: NamespaceResolver,
    declared_mappings: Vec<Mapping>,
    primary_key: Vec<String>,
    inheritance: Option<InheritancePolicy>,
    is_abstract: bool,
    parent: Option<String>,

    // Filled in by DescriptorRegistry::initialize
    pub(crate) namespaces: NamespaceResolver,
    pub(crate) mappings: Vec<Mapping>,
    pub(crate) root_name: Option<QName>,
    pub(crate) root_prefix: Option<String>,
    pub(crate) schema_qname: Option<QName>,
    pub(crate) key_fields: Vec<KeyField>,
}

impl Descriptor {
    pub fn new(type_name: &str) -> Self {
        Descriptor {
            type_name: type_name.to_string(),
            default_root: None,
            schema_type: None,
            declared_namespaces: NamespaceResolver::new(),
            declared_mappings: Vec::new(),
            primary_key: Vec::new(),
            inheritance: None,
            is_abstract: false,
            parent: None,
            namespaces: NamespaceResolver::new(),
            mappings: Vec::new(),
            root_name: None,
            root_prefix: None,
            schema_qname: None,
            key_fields: Vec::new(),
        }
    }

    /// Global element name, lexical `prefix:local`
    pub fn with_default_root(mut self, name: &str) -> Self {
        self.default_root = Some(name.to_string());
        self
    }

    /// Global schema type name, lexical `prefix:local`
    pub fn with_schema_type(mut self, name: &str) -> Self {
        self.schema_type = Some(name.to_string());
        self
    }

    pub fn with_namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.declared_namespaces.declare(prefix, uri);
        self
    }

    pub fn with_default_namespace(mut self, uri: &str) -> Self {
        self.declared_namespaces.declare_default(uri);
        self
    }

    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.declared_mappings.push(mapping);
        self
    }

    /// Add a primary-key field path; it must be the path of a direct mapping
    pub fn with_primary_key(mut self, xpath: &str) -> Self {
        self.primary_key.push(xpath.to_string());
        self
    }

    pub fn with_parent(mut self, type_name: &str) -> Self {
        self.parent = Some(type_name.to_string());
        self
    }

    pub fn with_inheritance(mut self, policy: InheritancePolicy) -> Self {
        self.inheritance = Some(policy);
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn inheritance(&self) -> Option<&InheritancePolicy> {
        self.inheritance.as_ref()
    }

    /// Resolved global element name
    pub fn default_root(&self) -> Option<&QName> {
        self.root_name.as_ref()
    }

    pub fn root_prefix(&self) -> &str {
        self.root_prefix.as_deref().unwrap_or("")
    }

    /// Resolved global schema type name
    pub fn schema_type(&self) -> Option<&QName> {
        self.schema_qname.as_ref()
    }

    /// Prefix table including everything inherited from ancestors
    pub fn namespaces(&self) -> &NamespaceResolver {
        &self.namespaces
    }

    /// Effective mappings: inherited ones first, then this type's own
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn key_fields(&self) -> &[KeyField] {
        &self.key_fields
    }

    pub(crate) fn declared_namespaces(&self) -> &NamespaceResolver {
        &self.declared_namespaces
    }

    pub(crate) fn declared_mappings(&self) -> &[Mapping] {
        &self.declared_mappings
    }

    pub(crate) fn primary_key_paths(&self) -> &[String] {
        &self.primary_key
    }

    pub(crate) fn default_root_lexical(&self) -> Option<&str> {
        self.default_root.as_deref()
    }

    pub(crate) fn schema_type_lexical(&self) -> Option<&str> {
        self.schema_type.as_deref()
    }

    pub(crate) fn inheritance_mut(&mut self) -> Option<&mut InheritancePolicy> {
        self.inheritance.as_mut()
    }
}
