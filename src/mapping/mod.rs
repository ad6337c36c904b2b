//! Mapping kinds
//!
//! A [`Mapping`] binds one object attribute to one or more paths. What it
//! does with them is decided by its [`MappingKind`], a closed set matched
//! exhaustively at every dispatch site. Each kind lives in its own module
//! and provides a `read` (record -> value) and a `write` (value -> record).
//!
//! Mappings are configured with the constructors and `with_*` methods,
//! compiled once by `DescriptorRegistry::initialize` and read-only after.

pub mod any;
pub mod binary;
pub mod choice;
pub mod composite;
pub mod direct;
pub mod fragment;
pub mod reference;
pub mod transformation;

use std::collections::HashSet;
use std::sync::Arc;

use crate::attachment::MimeTypePolicy;
use crate::container::ContainerPolicy;
use crate::context::{MarshalContext, UnmarshalContext};
use crate::convert::ScalarType;
use crate::descriptor::DescriptorRegistry;
use crate::dom::NamespaceResolver;
use crate::error::{OxmError, Result};
use crate::object::ObjectId;
use crate::path::{Path, PathCache};
use crate::qname::QName;
use crate::record::{ReadRecord, WriteRecord};
use crate::reference::MappingRef;
use crate::value::Value;

pub use any::{AnyAttributeMapping, AnyMapping, KeepAsElementPolicy};
pub use binary::BinaryMapping;
pub use choice::{ChoiceEntry, ChoiceMapping, ChoiceTarget};
pub use composite::CompositeMapping;
pub use direct::{DirectCollectionMapping, DirectMapping, NullPolicy, NullRepresentation};
pub use fragment::FragmentMapping;
pub use reference::{ReferenceKey, ReferenceMapping};
pub use transformation::{AttributeTransformer, FieldTransformer, FieldValues, TransformationMapping};

/// Whether a kind can take part in identity-based object copying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityProtocol {
    Supported,
    NotApplicable,
}

#[derive(Debug, Clone)]
pub enum MappingKind {
    Direct(DirectMapping),
    DirectCollection(DirectCollectionMapping),
    CompositeObject(CompositeMapping),
    CompositeCollection(CompositeMapping),
    Fragment(FragmentMapping),
    FragmentCollection(FragmentMapping),
    AnyAttribute(AnyAttributeMapping),
    AnyObject(AnyMapping),
    AnyCollection(AnyMapping),
    ChoiceObject(ChoiceMapping),
    ChoiceCollection(ChoiceMapping),
    ObjectReference(ReferenceMapping),
    CollectionReference(ReferenceMapping),
    Transformation(TransformationMapping),
    Binary(BinaryMapping),
    BinaryCollection(BinaryMapping),
}

impl MappingKind {
    pub fn label(&self) -> &'static str {
        match self {
            MappingKind::Direct(_) => "direct",
            MappingKind::DirectCollection(_) => "direct-collection",
            MappingKind::CompositeObject(_) => "composite-object",
            MappingKind::CompositeCollection(_) => "composite-collection",
            MappingKind::Fragment(_) => "fragment",
            MappingKind::FragmentCollection(_) => "fragment-collection",
            MappingKind::AnyAttribute(_) => "any-attribute",
            MappingKind::AnyObject(_) => "any-object",
            MappingKind::AnyCollection(_) => "any-collection",
            MappingKind::ChoiceObject(_) => "choice-object",
            MappingKind::ChoiceCollection(_) => "choice-collection",
            MappingKind::ObjectReference(_) => "object-reference",
            MappingKind::CollectionReference(_) => "collection-reference",
            MappingKind::Transformation(_) => "transformation",
            MappingKind::Binary(_) => "binary",
            MappingKind::BinaryCollection(_) => "binary-collection",
        }
    }

    /// Kinds whose address cannot default to the context node
    fn requires_path(&self) -> bool {
        matches!(
            self,
            MappingKind::Direct(_)
                | MappingKind::DirectCollection(_)
                | MappingKind::Fragment(_)
                | MappingKind::FragmentCollection(_)
                | MappingKind::ObjectReference(_)
                | MappingKind::CollectionReference(_)
                | MappingKind::Binary(_)
                | MappingKind::BinaryCollection(_)
        )
    }

    fn container_mut(&mut self) -> Option<&mut ContainerPolicy> {
        match self {
            MappingKind::DirectCollection(m) => Some(&mut m.container),
            MappingKind::CompositeCollection(m) => Some(&mut m.container),
            MappingKind::FragmentCollection(m) => Some(&mut m.container),
            MappingKind::AnyAttribute(m) => Some(&mut m.container),
            MappingKind::AnyCollection(m) => Some(&mut m.container),
            MappingKind::ChoiceCollection(m) => Some(&mut m.container),
            MappingKind::CollectionReference(m) => Some(&mut m.container),
            MappingKind::BinaryCollection(m) => Some(&mut m.container),
            _ => None,
        }
    }
}

/// What `DescriptorRegistry::initialize` hands each mapping
pub(crate) struct InitScope<'a> {
    pub registry: &'a DescriptorRegistry,
    pub type_name: &'a str,
    pub namespaces: &'a NamespaceResolver,
    pub cache: &'a PathCache,
}

impl InitScope<'_> {
    pub fn compile(&self, xpath: &str, leaf_type: Option<&str>) -> Result<Path> {
        Path::compile(xpath, leaf_type, self.namespaces, self.cache)
    }

    pub fn invalid(&self, attribute: &str, reason: impl Into<String>) -> OxmError {
        OxmError::invalid_mapping(self.type_name, attribute, reason)
    }

    /// The type must be registered
    pub fn check_type(&self, type_name: &str) -> Result<()> {
        if self.registry.contains(type_name) {
            Ok(())
        } else {
            Err(OxmError::UnknownType(type_name.to_string()))
        }
    }
}

/// One attribute of a descriptor and how it maps to the tree
#[derive(Debug, Clone)]
pub struct Mapping {
    attribute: String,
    xpath: Option<String>,
    leaf_type: Option<String>,
    read_only: bool,
    path: Path,
    kind: MappingKind,
    /// Builder call that did not fit the kind, reported at initialize
    misconfigured: Option<String>,
}

impl Mapping {
    pub fn new(attribute: &str, xpath: Option<&str>, kind: MappingKind) -> Self {
        Mapping {
            attribute: attribute.to_string(),
            xpath: xpath.map(str::to_string),
            leaf_type: None,
            read_only: false,
            path: Path::default(),
            kind,
            misconfigured: None,
        }
    }

    pub fn direct(attribute: &str, xpath: &str) -> Self {
        Self::new(attribute, Some(xpath), MappingKind::Direct(DirectMapping::default()))
    }

    pub fn direct_collection(attribute: &str, xpath: &str) -> Self {
        Self::new(
            attribute,
            Some(xpath),
            MappingKind::DirectCollection(DirectCollectionMapping::default()),
        )
    }

    pub fn composite(attribute: &str, xpath: &str, reference_type: &str) -> Self {
        Self::new(
            attribute,
            Some(xpath),
            MappingKind::CompositeObject(CompositeMapping::new(reference_type)),
        )
    }

    pub fn composite_collection(attribute: &str, xpath: &str, reference_type: &str) -> Self {
        Self::new(
            attribute,
            Some(xpath),
            MappingKind::CompositeCollection(CompositeMapping::new(reference_type)),
        )
    }

    pub fn fragment(attribute: &str, xpath: &str) -> Self {
        Self::new(attribute, Some(xpath), MappingKind::Fragment(FragmentMapping::default()))
    }

    pub fn fragment_collection(attribute: &str, xpath: &str) -> Self {
        Self::new(
            attribute,
            Some(xpath),
            MappingKind::FragmentCollection(FragmentMapping::default()),
        )
    }

    /// All attributes of the context element, keyed by qualified name
    pub fn any_attribute(attribute: &str) -> Self {
        Self::new(attribute, None, MappingKind::AnyAttribute(AnyAttributeMapping::default()))
    }

    pub fn any_object(attribute: &str) -> Self {
        Self::new(attribute, None, MappingKind::AnyObject(AnyMapping::default()))
    }

    pub fn any_collection(attribute: &str) -> Self {
        Self::new(attribute, None, MappingKind::AnyCollection(AnyMapping::default()))
    }

    pub fn choice(attribute: &str) -> Self {
        Self::new(attribute, None, MappingKind::ChoiceObject(ChoiceMapping::default()))
    }

    pub fn choice_collection(attribute: &str) -> Self {
        Self::new(attribute, None, MappingKind::ChoiceCollection(ChoiceMapping::default()))
    }

    /// Reference to one `reference_type` object whose first primary-key
    /// field is held at `source_xpath`
    pub fn object_reference(attribute: &str, reference_type: &str, source_xpath: &str) -> Self {
        Self::new(
            attribute,
            Some(source_xpath),
            MappingKind::ObjectReference(ReferenceMapping::new(reference_type, source_xpath)),
        )
    }

    pub fn collection_reference(attribute: &str, reference_type: &str, source_xpath: &str) -> Self {
        Self::new(
            attribute,
            Some(source_xpath),
            MappingKind::CollectionReference(ReferenceMapping::new(reference_type, source_xpath)),
        )
    }

    pub fn transformation(attribute: &str, transformer: Arc<dyn AttributeTransformer>) -> Self {
        Self::new(
            attribute,
            None,
            MappingKind::Transformation(TransformationMapping::new(Some(transformer))),
        )
    }

    pub fn binary(attribute: &str, xpath: &str) -> Self {
        Self::new(attribute, Some(xpath), MappingKind::Binary(BinaryMapping::default()))
    }

    pub fn binary_collection(attribute: &str, xpath: &str) -> Self {
        Self::new(
            attribute,
            Some(xpath),
            MappingKind::BinaryCollection(BinaryMapping::default()),
        )
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    fn misfit(mut self, call: &str) -> Self {
        if self.misconfigured.is_none() {
            self.misconfigured = Some(format!(
                "{} does not apply to a {} mapping",
                call,
                self.kind.label()
            ));
        }
        self
    }

    /// Context path for kinds that default to the context node
    pub fn with_xpath(mut self, xpath: &str) -> Self {
        self.xpath = Some(xpath.to_string());
        self
    }

    /// Schema type (lexical `prefix:local`) assumed for the addressed element
    pub fn with_leaf_type(mut self, schema_type: &str) -> Self {
        self.leaf_type = Some(schema_type.to_string());
        self
    }

    /// Read the attribute but never write it
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_scalar(mut self, scalar: ScalarType) -> Self {
        match &mut self.kind {
            MappingKind::Direct(m) => m.scalar = scalar,
            MappingKind::DirectCollection(m) => m.scalar = scalar,
            _ => return self.misfit("with_scalar"),
        }
        self
    }

    pub fn with_container(mut self, container: ContainerPolicy) -> Self {
        match self.kind.container_mut() {
            Some(slot) => *slot = container,
            None => return self.misfit("with_container"),
        }
        self
    }

    pub fn with_null_policy(mut self, policy: NullPolicy) -> Self {
        match &mut self.kind {
            MappingKind::Direct(m) => m.null_policy = policy,
            MappingKind::CompositeObject(m) => m.null_policy = policy,
            _ => return self.misfit("with_null_policy"),
        }
        self
    }

    /// Wrap written text in CDATA sections
    pub fn cdata(mut self) -> Self {
        match &mut self.kind {
            MappingKind::Direct(m) => m.cdata = true,
            MappingKind::DirectCollection(m) => m.cdata = true,
            _ => return self.misfit("cdata"),
        }
        self
    }

    /// Keep all values of a collection in one whitespace-separated node
    pub fn single_node(mut self) -> Self {
        match &mut self.kind {
            MappingKind::DirectCollection(m) => m.uses_single_node = true,
            MappingKind::CollectionReference(m) => m.uses_single_node = true,
            _ => return self.misfit("single_node"),
        }
        self
    }

    pub fn keep_as_element(mut self, policy: KeepAsElementPolicy) -> Self {
        match &mut self.kind {
            MappingKind::AnyObject(m) | MappingKind::AnyCollection(m) => m.keep_as_element = policy,
            _ => return self.misfit("keep_as_element"),
        }
        self
    }

    pub fn use_root_wrapper(mut self) -> Self {
        match &mut self.kind {
            MappingKind::AnyObject(m) | MappingKind::AnyCollection(m) => m.use_root_wrapper = true,
            _ => return self.misfit("use_root_wrapper"),
        }
        self
    }

    pub fn mixed_content(mut self, mixed: bool) -> Self {
        match &mut self.kind {
            MappingKind::AnyObject(m) | MappingKind::AnyCollection(m) => m.mixed_content = mixed,
            _ => return self.misfit("mixed_content"),
        }
        self
    }

    pub fn include_namespace_declarations(mut self) -> Self {
        match &mut self.kind {
            MappingKind::AnyAttribute(m) => m.include_namespace_declarations = true,
            _ => return self.misfit("include_namespace_declarations"),
        }
        self
    }

    pub fn with_choice(mut self, xpath: &str, target: ChoiceTarget) -> Self {
        match &mut self.kind {
            MappingKind::ChoiceObject(m) | MappingKind::ChoiceCollection(m) => {
                m.entries.push(ChoiceEntry::new(xpath, target))
            }
            _ => return self.misfit("with_choice"),
        }
        self
    }

    /// Further key field: `source_xpath` holds the target key field at
    /// `target_xpath` (a primary-key path of the reference type)
    pub fn with_reference_key(mut self, source_xpath: &str, target_xpath: &str) -> Self {
        match &mut self.kind {
            MappingKind::ObjectReference(m) | MappingKind::CollectionReference(m) => {
                m.keys.push(ReferenceKey::new(source_xpath, Some(target_xpath)))
            }
            _ => return self.misfit("with_reference_key"),
        }
        self
    }

    pub fn with_field_transformer(mut self, xpath: &str, transformer: Arc<dyn FieldTransformer>) -> Self {
        match &mut self.kind {
            MappingKind::Transformation(m) => m.add_field(xpath, transformer),
            _ => return self.misfit("with_field_transformer"),
        }
        self
    }

    fn binary_mut(&mut self) -> Option<&mut BinaryMapping> {
        match &mut self.kind {
            MappingKind::Binary(m) | MappingKind::BinaryCollection(m) => Some(m),
            _ => None,
        }
    }

    pub fn swa_ref(mut self) -> Self {
        match self.binary_mut() {
            Some(m) => m.swa_ref = true,
            None => return self.misfit("swa_ref"),
        }
        self
    }

    /// Never externalize as an XOP attachment
    pub fn inline(mut self) -> Self {
        match self.binary_mut() {
            Some(m) => m.should_inline = true,
            None => return self.misfit("inline"),
        }
        self
    }

    pub fn with_mime_type(mut self, policy: MimeTypePolicy) -> Self {
        match self.binary_mut() {
            Some(m) => m.mime_type = policy,
            None => return self.misfit("with_mime_type"),
        }
        self
    }

    /// Materialize binary content as `Value::DataHandle`
    pub fn as_data_handle(mut self) -> Self {
        match self.binary_mut() {
            Some(m) => m.as_data_handle = true,
            None => return self.misfit("as_data_handle"),
        }
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn xpath(&self) -> Option<&str> {
        self.xpath.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> &MappingKind {
        &self.kind
    }

    pub fn kind_label(&self) -> &'static str {
        self.kind.label()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Capability query for identity-based copying. Any, Choice and
    /// Reference kinds carry no identity of their own to copy.
    pub fn identity_protocol(&self) -> IdentityProtocol {
        match self.kind {
            MappingKind::AnyAttribute(_)
            | MappingKind::AnyObject(_)
            | MappingKind::AnyCollection(_)
            | MappingKind::ChoiceObject(_)
            | MappingKind::ChoiceCollection(_)
            | MappingKind::ObjectReference(_)
            | MappingKind::CollectionReference(_) => IdentityProtocol::NotApplicable,
            _ => IdentityProtocol::Supported,
        }
    }

    /// Every compiled path this mapping reads or writes
    pub fn paths(&self) -> Vec<&Path> {
        match &self.kind {
            MappingKind::ChoiceObject(m) | MappingKind::ChoiceCollection(m) => {
                m.entries.iter().map(|e| &e.path).collect()
            }
            MappingKind::ObjectReference(m) | MappingKind::CollectionReference(m) => {
                m.keys.iter().map(|k| &k.source).collect()
            }
            MappingKind::Transformation(m) => m.fields.iter().map(|f| &f.path).collect(),
            MappingKind::AnyAttribute(_) | MappingKind::AnyObject(_) | MappingKind::AnyCollection(_) => {
                Vec::new()
            }
            _ => vec![&self.path],
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub(crate) fn initialize(&mut self, scope: &InitScope<'_>) -> Result<()> {
        if let Some(reason) = self.misconfigured.take() {
            return Err(scope.invalid(&self.attribute, reason));
        }
        let xpath = match (&self.xpath, self.kind.requires_path()) {
            (Some(xpath), _) => xpath.as_str(),
            (None, false) => ".",
            (None, true) => {
                return Err(OxmError::MissingFieldPath {
                    type_name: scope.type_name.to_string(),
                    attribute: self.attribute.clone(),
                })
            }
        };
        self.path = scope.compile(xpath, self.leaf_type.as_deref())?;

        let attribute = self.attribute.as_str();
        let path = &self.path;
        match &mut self.kind {
            MappingKind::Direct(_) => Ok(()),
            MappingKind::DirectCollection(m) => m.initialize(attribute, scope),
            MappingKind::CompositeObject(m) => m.initialize(attribute, path, false, scope),
            MappingKind::CompositeCollection(m) => m.initialize(attribute, path, true, scope),
            MappingKind::Fragment(_) | MappingKind::FragmentCollection(_) => {
                fragment::check_path(attribute, path, scope)
            }
            MappingKind::AnyAttribute(m) => m.initialize(attribute, scope),
            MappingKind::AnyObject(_) | MappingKind::AnyCollection(_) => Ok(()),
            MappingKind::ChoiceObject(m) => m.initialize(attribute, false, scope),
            MappingKind::ChoiceCollection(m) => m.initialize(attribute, true, scope),
            MappingKind::ObjectReference(m) | MappingKind::CollectionReference(m) => {
                m.initialize(attribute, scope)
            }
            MappingKind::Transformation(m) => m.initialize(attribute, scope),
            MappingKind::Binary(_) | MappingKind::BinaryCollection(_) => Ok(()),
        }
    }

    /// Value for this mapping's attribute, `None` to leave it unset
    pub fn read(
        &self,
        rec: &ReadRecord<'_>,
        owner: ObjectId,
        at: MappingRef,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Option<Value>> {
        let path = &self.path;
        match &self.kind {
            MappingKind::Direct(m) => m.read(path, rec, ctx),
            MappingKind::DirectCollection(m) => m.read(path, rec, ctx).map(Some),
            MappingKind::CompositeObject(m) => m.read_object(path, rec, ctx),
            MappingKind::CompositeCollection(m) => m.read_collection(path, rec, ctx).map(Some),
            MappingKind::Fragment(m) => m.read_object(path, rec),
            MappingKind::FragmentCollection(m) => m.read_collection(path, rec, ctx).map(Some),
            MappingKind::AnyAttribute(m) => m.read(path, rec, ctx).map(Some),
            MappingKind::AnyObject(m) => m.read_object(path, rec, ctx),
            MappingKind::AnyCollection(m) => m.read_collection(path, rec, ctx).map(Some),
            MappingKind::ChoiceObject(m) => m.read_object(path, rec, ctx),
            MappingKind::ChoiceCollection(m) => m.read_collection(path, rec, ctx).map(Some),
            MappingKind::ObjectReference(m) => m.read(false, rec, owner, at, ctx).map(|_| None),
            MappingKind::CollectionReference(m) => m.read(true, rec, owner, at, ctx).map(|_| None),
            MappingKind::Transformation(m) => m.read(rec),
            MappingKind::Binary(m) => m.read_object(path, rec, ctx),
            MappingKind::BinaryCollection(m) => m.read_collection(path, rec, ctx).map(Some),
        }
    }

    /// Write `value` (the owner's attribute, `Null` when unset). A read-only
    /// mapping writes nothing.
    pub fn write(
        &self,
        value: &Value,
        owner: ObjectId,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        let path = &self.path;
        match &self.kind {
            MappingKind::Direct(m) => m.write(path, value, rec, ctx),
            MappingKind::DirectCollection(m) => m.write(path, value, rec, ctx),
            MappingKind::CompositeObject(m) => m.write_object(path, value, rec, ctx),
            MappingKind::CompositeCollection(m) => m.write_collection(path, value, rec, ctx),
            MappingKind::Fragment(m) => m.write_object(path, value, rec),
            MappingKind::FragmentCollection(m) => m.write_collection(path, value, rec),
            MappingKind::AnyAttribute(m) => m.write(path, value, rec, ctx),
            MappingKind::AnyObject(m) => m.write_object(path, value, rec, ctx),
            MappingKind::AnyCollection(m) => m.write_collection(path, value, rec, ctx),
            MappingKind::ChoiceObject(m) => m.write_object(&self.attribute, value, owner, rec, ctx),
            MappingKind::ChoiceCollection(m) => {
                m.write_collection(&self.attribute, value, owner, rec, ctx)
            }
            MappingKind::ObjectReference(m) => m.write(false, value, rec, ctx),
            MappingKind::CollectionReference(m) => m.write(true, value, rec, ctx),
            MappingKind::Transformation(m) => m.write(owner, rec, ctx),
            MappingKind::Binary(m) => m.write_object(path, value, owner, rec, ctx),
            MappingKind::BinaryCollection(m) => m.write_collection(path, value, owner, rec, ctx),
        }
    }
}

/// Fill in the exclusion sets of the Any mappings among `mappings`: the
/// names claimed by every sibling below the Any mapping's context.
/// `extra` holds further claimed paths (an inheritance indicator field).
pub(crate) fn compute_exclusions(mappings: &mut [Mapping], extra: &[Path]) {
    let claims: Vec<Vec<Path>> = mappings
        .iter()
        .map(|m| m.paths().into_iter().cloned().collect())
        .collect();

    for i in 0..mappings.len() {
        let context: Vec<QName> = mappings[i].path.element_fragments().map(|f| f.qname()).collect();
        let siblings = claims
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .flat_map(|(_, paths)| paths.iter())
            .chain(extra.iter());

        match &mut mappings[i].kind {
            MappingKind::AnyObject(m) | MappingKind::AnyCollection(m) => {
                m.exclusions = claimed_elements(&context, siblings);
            }
            MappingKind::AnyAttribute(m) => {
                m.exclusions = claimed_attributes(&context, siblings);
            }
            _ => {}
        }
    }
}

fn claimed_elements<'p>(context: &[QName], paths: impl Iterator<Item = &'p Path>) -> HashSet<QName> {
    let mut claimed = HashSet::new();
    for path in paths {
        let elements: Vec<QName> = path.element_fragments().map(|f| f.qname()).collect();
        if elements.len() > context.len() && elements[..context.len()] == *context {
            claimed.insert(elements[context.len()].clone());
        }
    }
    claimed
}

fn claimed_attributes<'p>(context: &[QName], paths: impl Iterator<Item = &'p Path>) -> HashSet<QName> {
    let mut claimed = HashSet::new();
    for path in paths {
        let elements: Vec<QName> = path.element_fragments().map(|f| f.qname()).collect();
        if let Some(last) = path.last().filter(|f| f.is_attribute()) {
            if elements == context {
                claimed.insert(last.qname());
            }
        }
    }
    claimed
}
