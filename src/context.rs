//! Marshal and unmarshal entry points
//!
//! [`XmlContext`] owns an initialized registry and is cheap to clone and
//! share between threads. Every call builds its own per-operation context
//! (and, for unmarshal, its own reference resolver), so concurrent calls
//! never see each other's state.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::attachment::{AttachmentMarshaller, AttachmentUnmarshaller};
use crate::config::{MarshalConfig, ReferencePolicy, UnmarshalConfig};
use crate::convert::{ConversionService, ScalarType, XmlConversionManager};
use crate::descriptor::{Descriptor, DescriptorRegistry, TypeIndicator};
use crate::dom::namespace::ns;
use crate::dom::{NodeId, XmlDocument, DOCUMENT_NODE};
use crate::error::{OxmError, Result};
use crate::mapping::{IdentityProtocol, MappingKind};
use crate::object::{ObjectGraph, ObjectId};
use crate::record::{ReadRecord, TreeRecord, WriteRecord};
use crate::reference::{MappingRef, ReferenceResolver, UnresolvedReference};
use crate::resolve;
use crate::root::XmlRoot;
use crate::value::Value;

static NULL_VALUE: Value = Value::Null;

/// State of one unmarshal call
pub struct UnmarshalContext<'a> {
    pub(crate) registry: &'a DescriptorRegistry,
    pub(crate) conversion: &'a dyn ConversionService,
    graph: &'a mut ObjectGraph,
    pub(crate) resolver: &'a mut ReferenceResolver,
    pub(crate) attachments: Option<&'a dyn AttachmentUnmarshaller>,
    created: Vec<ObjectId>,
}

impl<'a> UnmarshalContext<'a> {
    pub fn new(
        registry: &'a DescriptorRegistry,
        conversion: &'a dyn ConversionService,
        graph: &'a mut ObjectGraph,
        resolver: &'a mut ReferenceResolver,
        attachments: Option<&'a dyn AttachmentUnmarshaller>,
    ) -> Self {
        UnmarshalContext {
            registry,
            conversion,
            graph,
            resolver,
            attachments,
            created: Vec::new(),
        }
    }

    pub fn graph(&self) -> &ObjectGraph {
        self.graph
    }

    /// Objects built so far, in creation order
    pub fn created(&self) -> &[ObjectId] {
        &self.created
    }

    fn into_created(self) -> Vec<ObjectId> {
        self.created
    }

    /// Create an object of `descriptor`'s type and run every mapping
    /// against the record
    pub fn build_object(&mut self, descriptor: &Descriptor, rec: &ReadRecord<'_>) -> Result<ObjectId> {
        if descriptor.is_abstract() {
            return Err(OxmError::AbstractType(descriptor.type_name().to_string()));
        }
        let index = self
            .registry
            .descriptor_index(descriptor.type_name())
            .ok_or_else(|| OxmError::UnknownType(descriptor.type_name().to_string()))?;
        let id = self.graph.create(descriptor.type_name());
        self.created.push(id);

        for (i, mapping) in descriptor.mappings().iter().enumerate() {
            let at = MappingRef {
                descriptor: index,
                mapping: i,
            };
            if let Some(value) = mapping.read(rec, id, at, self)? {
                self.graph.set_attribute(id, mapping.attribute(), value);
            }
        }
        Ok(id)
    }
}

/// State of one marshal call
pub struct MarshalContext<'a> {
    pub(crate) registry: &'a DescriptorRegistry,
    pub(crate) conversion: &'a dyn ConversionService,
    pub(crate) graph: &'a ObjectGraph,
    pub(crate) attachments: Option<&'a mut dyn AttachmentMarshaller>,
}

impl<'a> MarshalContext<'a> {
    pub fn new(
        registry: &'a DescriptorRegistry,
        conversion: &'a dyn ConversionService,
        graph: &'a ObjectGraph,
        attachments: Option<&'a mut dyn AttachmentMarshaller>,
    ) -> Self {
        MarshalContext {
            registry,
            conversion,
            graph,
            attachments,
        }
    }

    pub fn type_of(&self, id: ObjectId) -> Result<&'a str> {
        let graph = self.graph;
        graph
            .type_of(id)
            .ok_or_else(|| OxmError::UnknownType(format!("object#{}", id)))
    }

    /// Run every mapping of `descriptor` for object `id` into the record.
    /// Unset attributes are written as `Null`.
    pub fn write_object(&mut self, descriptor: &Descriptor, id: ObjectId, rec: &mut WriteRecord<'_>) -> Result<()> {
        let graph = self.graph;
        for mapping in descriptor.mappings() {
            let value = graph.attribute(id, mapping.attribute()).unwrap_or(&NULL_VALUE);
            mapping.write(value, id, rec, self)?;
        }
        Ok(())
    }

    /// Announce `concrete` on the record's node when it differs from the
    /// type the position declares
    pub fn write_type_indicator(
        &mut self,
        declared: &str,
        concrete: &Descriptor,
        rec: &mut WriteRecord<'_>,
    ) -> Result<()> {
        if concrete.type_name() == declared {
            return Ok(());
        }
        let node = rec.node();
        if let Some(policy) = self.registry.inheritance_for(concrete.type_name()) {
            if let TypeIndicator::Field(_) = policy.indicator() {
                if let Some(value) = policy.value_for(concrete.type_name()) {
                    rec.put(policy.path(), value, false);
                }
                return Ok(());
            }
        }
        if let Some(schema_type) = concrete.schema_type() {
            rec.set_schema_type(node, schema_type);
        }
        Ok(())
    }
}

/// Result of an unmarshal call
#[derive(Debug, Clone)]
pub struct Unmarshalled {
    /// `Value::Object` when the root element is a registered root of the
    /// built type's hierarchy, else an [`XmlRoot`] wrapper
    pub root: Value,
    /// References left unassigned (always empty under the strict policy)
    pub unresolved: Vec<UnresolvedReference>,
}

impl Unmarshalled {
    /// The built root object, looking through a root wrapper
    pub fn object(&self) -> Option<ObjectId> {
        match &self.root {
            Value::Object(id) => Some(*id),
            Value::Root(root) => root.value.as_object(),
            _ => None,
        }
    }
}

/// Thread-safe mapping context over an initialized registry
#[derive(Clone)]
pub struct XmlContext {
    registry: Arc<DescriptorRegistry>,
    conversion: Arc<dyn ConversionService>,
}

impl std::fmt::Debug for XmlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlContext")
            .field("descriptors", &self.registry.len())
            .finish()
    }
}

impl XmlContext {
    /// Initialize `registry` and wrap it. Configuration errors surface here.
    pub fn new(mut registry: DescriptorRegistry) -> Result<Self> {
        registry.initialize()?;
        debug!(descriptors = registry.len(), "mapping context ready");
        Ok(XmlContext {
            registry: Arc::new(registry),
            conversion: Arc::new(XmlConversionManager),
        })
    }

    pub fn with_conversion(mut self, conversion: Arc<dyn ConversionService>) -> Self {
        self.conversion = conversion;
        self
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Marshal
    // ------------------------------------------------------------------

    /// Write `root` (an object, or an [`XmlRoot`] wrapper) as a new document
    pub fn marshal(
        &self,
        graph: &ObjectGraph,
        root: &Value,
        attachments: Option<&mut dyn AttachmentMarshaller>,
    ) -> Result<XmlDocument> {
        let registry = &*self.registry;
        // reborrow so the trait object's lifetime can shrink to this call
        let attachments: Option<&mut dyn AttachmentMarshaller> = match attachments {
            Some(a) => Some(a as &mut dyn AttachmentMarshaller),
            None => None,
        };
        let mut doc = XmlDocument::new();
        let mut ctx = MarshalContext::new(registry, &*self.conversion, graph, attachments);
        let mut rec = WriteRecord::new(&mut doc, DOCUMENT_NODE);

        match root {
            Value::Object(id) => {
                let descriptor = registry.descriptor(ctx.type_of(*id)?)?;
                let declared = self.root_declaring(descriptor)?;
                let name = declared
                    .default_root()
                    .ok_or_else(|| OxmError::NoDefaultRootElement(descriptor.type_name().to_string()))?;
                let node = rec.create_child(DOCUMENT_NODE, name.namespace(), &name.local, declared.root_prefix());
                declare_namespaces(&mut rec, node, descriptor);
                let mut nested = rec.nested(node);
                ctx.write_type_indicator(declared.type_name(), descriptor, &mut nested)?;
                ctx.write_object(descriptor, *id, &mut nested)?;
            }
            Value::Root(wrapper) => {
                let prefix = wrapper.prefix.as_deref().unwrap_or("");
                let node = rec.create_child(DOCUMENT_NODE, wrapper.name.namespace(), &wrapper.name.local, prefix);
                if let Some(schema_type) = &wrapper.schema_type {
                    rec.set_schema_type(node, schema_type);
                }
                match &wrapper.value {
                    Value::Object(id) => {
                        let descriptor = registry.descriptor(ctx.type_of(*id)?)?;
                        declare_namespaces(&mut rec, node, descriptor);
                        ctx.write_object(descriptor, *id, &mut rec.nested(node))?;
                    }
                    Value::Null => rec.set_nil(node),
                    scalar => {
                        let kind = ScalarType::of(scalar).unwrap_or_default();
                        let text = match scalar {
                            Value::QName(name) => rec.qname_text(node, name),
                            other => ctx.conversion.to_text(other, kind)?,
                        };
                        rec.tree_mut().append_text(node, &text, false);
                    }
                }
            }
            other => {
                return Err(OxmError::conversion(other.type_label(), "a root object"));
            }
        }
        debug!(nodes = doc.node_count(), "marshal finished");
        Ok(doc)
    }

    pub fn marshal_to_string(&self, graph: &ObjectGraph, root: &Value, config: &MarshalConfig) -> Result<String> {
        let doc = self.marshal(graph, root, None)?;
        Ok(doc.to_xml_string(&config.write_options()))
    }

    pub fn marshal_to_string_with_attachments(
        &self,
        graph: &ObjectGraph,
        root: &Value,
        config: &MarshalConfig,
        attachments: &mut dyn AttachmentMarshaller,
    ) -> Result<String> {
        let doc = self.marshal(graph, root, Some(attachments))?;
        Ok(doc.to_xml_string(&config.write_options()))
    }

    /// `descriptor` or its nearest ancestor with a default root element
    fn root_declaring<'r>(&'r self, descriptor: &'r Descriptor) -> Result<&'r Descriptor> {
        let mut current = descriptor;
        for _ in 0..=self.registry.len() {
            if current.default_root().is_some() {
                return Ok(current);
            }
            match current.parent() {
                Some(parent) => current = self.registry.descriptor(parent)?,
                None => break,
            }
        }
        Err(OxmError::NoDefaultRootElement(descriptor.type_name().to_string()))
    }

    // ------------------------------------------------------------------
    // Unmarshal
    // ------------------------------------------------------------------

    /// Build objects into `graph` from `tree`'s root element, then resolve
    /// references under `config`'s policy.
    ///
    /// On error `graph` is truncated back to its length before the call, so
    /// a failed Strict resolution leaves no partially linked objects behind.
    pub fn unmarshal(
        &self,
        tree: &dyn TreeRecord,
        graph: &mut ObjectGraph,
        config: &UnmarshalConfig,
        attachments: Option<&dyn AttachmentUnmarshaller>,
    ) -> Result<Unmarshalled> {
        let mark = graph.len();
        let result = self.unmarshal_into(tree, graph, config, attachments);
        if result.is_err() {
            graph.truncate(mark);
        }
        result
    }

    fn unmarshal_into(
        &self,
        tree: &dyn TreeRecord,
        graph: &mut ObjectGraph,
        config: &UnmarshalConfig,
        attachments: Option<&dyn AttachmentUnmarshaller>,
    ) -> Result<Unmarshalled> {
        let registry = &*self.registry;
        let node = tree
            .root_element()
            .ok_or_else(|| OxmError::NoDescriptorForElement("empty document".to_string()))?;
        let name = tree
            .qname(node)
            .ok_or_else(|| OxmError::NoDescriptorForElement(format!("node #{}", node)))?;
        debug!(root = %name, "unmarshal started");

        let rec = ReadRecord::new(tree, node);
        let descriptor = resolve::root_type(registry, &rec, node)?;
        let mut resolver = ReferenceResolver::new();
        let mut ctx = UnmarshalContext::new(registry, &*self.conversion, graph, &mut resolver, attachments);
        let id = ctx.build_object(descriptor, &rec)?;
        let created = ctx.into_created();

        let unresolved = resolver.resolve(registry, graph, &created)?;
        if !unresolved.is_empty() {
            match config.reference_policy {
                ReferencePolicy::Strict => return Err(OxmError::UnresolvedReferences(unresolved)),
                ReferencePolicy::Lenient => {
                    for reference in &unresolved {
                        warn!(reference = %reference, "unresolved reference");
                    }
                }
            }
        }

        let root = if registry.by_root_element(&name).is_some() {
            Value::Object(id)
        } else {
            XmlRoot::new(name, Value::Object(id))
                .with_prefix(tree.prefix(node))
                .with_schema_type(rec.schema_type(node))
                .into_value()
        };
        debug!(objects = created.len(), unresolved = unresolved.len(), "unmarshal finished");
        Ok(Unmarshalled { root, unresolved })
    }

    pub fn unmarshal_str(&self, xml: &str, graph: &mut ObjectGraph, config: &UnmarshalConfig) -> Result<Unmarshalled> {
        let doc = XmlDocument::parse(xml)?;
        self.unmarshal(&doc, graph, config, None)
    }

    pub fn unmarshal_str_with_attachments(
        &self,
        xml: &str,
        graph: &mut ObjectGraph,
        config: &UnmarshalConfig,
        attachments: &dyn AttachmentUnmarshaller,
    ) -> Result<Unmarshalled> {
        let doc = XmlDocument::parse(xml)?;
        self.unmarshal(&doc, graph, config, Some(attachments))
    }

    // ------------------------------------------------------------------
    // Object identity
    // ------------------------------------------------------------------

    /// Deep copy of object `id` inside `graph`, following composite
    /// mappings. Fails on any mapping kind without identity semantics.
    pub fn copy_object(&self, graph: &mut ObjectGraph, id: ObjectId) -> Result<ObjectId> {
        let type_name = graph
            .type_of(id)
            .ok_or_else(|| OxmError::UnknownType(format!("object#{}", id)))?
            .to_string();
        let descriptor = self.registry.descriptor(&type_name)?;
        if let Some(m) = descriptor
            .mappings()
            .iter()
            .find(|m| m.identity_protocol() == IdentityProtocol::NotApplicable)
        {
            return Err(OxmError::InvalidMappingOperation {
                operation: "copy",
                kind: m.kind_label(),
                attribute: m.attribute().to_string(),
            });
        }

        let copy = graph.create(&type_name);
        for mapping in descriptor.mappings() {
            let Some(value) = graph.attribute(id, mapping.attribute()).cloned() else {
                continue;
            };
            let value = match mapping.kind() {
                MappingKind::CompositeObject(_) | MappingKind::CompositeCollection(_) => {
                    self.copy_value(graph, value)?
                }
                _ => value,
            };
            graph.set_attribute(copy, mapping.attribute(), value);
        }
        Ok(copy)
    }

    fn copy_value(&self, graph: &mut ObjectGraph, value: Value) -> Result<Value> {
        match value {
            Value::Object(child) => Ok(Value::Object(self.copy_object(graph, child)?)),
            Value::List(items) => Ok(Value::List(
                items
                    .into_iter()
                    .map(|v| self.copy_value(graph, v))
                    .collect::<Result<_>>()?,
            )),
            Value::Set(items) => Ok(Value::Set(
                items
                    .into_iter()
                    .map(|v| self.copy_value(graph, v))
                    .collect::<Result<_>>()?,
            )),
            Value::Map(entries) => Ok(Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok((k, self.copy_value(graph, v)?)))
                    .collect::<Result<_>>()?,
            )),
            other => Ok(other),
        }
    }
}

/// Declare `descriptor`'s prefixes on the root element. A default
/// namespace is only declared when the root element lives in it.
fn declare_namespaces(rec: &mut WriteRecord<'_>, node: NodeId, descriptor: &Descriptor) {
    let bindings: Vec<(String, String)> = descriptor
        .namespaces()
        .active_bindings()
        .filter(|(prefix, uri)| *prefix != "xml" && *uri != ns::XML)
        .map(|(p, u)| (p.to_string(), u.to_string()))
        .collect();
    for (prefix, uri) in bindings {
        let tree = rec.tree();
        if prefix.is_empty() && tree.namespace_uri(node) != Some(uri.as_str()) {
            continue;
        }
        if tree.lookup_namespace_uri(node, &prefix) == Some(uri.as_str()) {
            continue;
        }
        rec.tree_mut().declare_namespace(node, &prefix, &uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::InMemoryAttachments;
    use crate::object::deep_eq;
    use crate::qname::QName;
    use crate::testing::{self, EMP_NS};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn context() -> XmlContext {
        XmlContext::new(testing::descriptors()).unwrap()
    }

    fn strict() -> UnmarshalConfig {
        UnmarshalConfig::new(ReferencePolicy::Strict)
    }

    fn lenient() -> UnmarshalConfig {
        UnmarshalConfig::new(ReferencePolicy::Lenient)
    }

    fn bare() -> MarshalConfig {
        MarshalConfig::default().with_declaration(false)
    }

    #[test]
    fn test_marshal_employee() {
        let ctx = context();
        let mut graph = ObjectGraph::new();
        let address = graph.create("Address");
        graph.set_attribute(address, "street", Value::from("Main St"));
        let emp = graph.create("Employee");
        graph.set_attribute(emp, "id", Value::from("e1"));
        graph.set_attribute(emp, "name", Value::from("Ada"));
        graph.set_attribute(emp, "address", Value::Object(address));

        let xml = ctx.marshal_to_string(&graph, &Value::Object(emp), &bare()).unwrap();
        assert_eq!(
            xml,
            format!(
                r#"<e:employee xmlns:e="{}" id="e1"><e:name>Ada</e:name><address><street>Main St</street></address></e:employee>"#,
                EMP_NS
            )
        );
    }

    #[test]
    fn test_round_trip_employee() {
        let ctx = context();
        let xml = format!(
            r#"<e:employee xmlns:e="{}" id="e1"><e:name>Ada</e:name><address><street>Main St</street><city>Paris</city></address></e:employee>"#,
            EMP_NS
        );
        let mut graph = ObjectGraph::new();
        let out = ctx.unmarshal_str(&xml, &mut graph, &strict()).unwrap();
        let emp = out.object().unwrap();
        assert!(matches!(out.root, Value::Object(_)));
        assert_eq!(graph.attribute(emp, "name"), Some(&Value::from("Ada")));
        let address = graph.attribute(emp, "address").and_then(Value::as_object).unwrap();
        assert_eq!(graph.attribute(address, "city"), Some(&Value::from("Paris")));

        let again = ctx.marshal_to_string(&graph, &out.root, &bare()).unwrap();
        assert_eq!(again, xml);
    }

    #[test]
    fn test_reference_resolved_in_either_order() {
        let ctx = context();
        let forward = format!(
            r#"<e:department xmlns:e="{ns}"><e:employee id="a" lead="b"/><e:employee id="b"/></e:department>"#,
            ns = EMP_NS
        );
        let backward = format!(
            r#"<e:department xmlns:e="{ns}"><e:employee id="b"/><e:employee id="a" lead="b"/></e:department>"#,
            ns = EMP_NS
        );
        for xml in [forward, backward] {
            let mut graph = ObjectGraph::new();
            let out = ctx.unmarshal_str(&xml, &mut graph, &strict()).unwrap();
            let dept = out.object().unwrap();
            let Some(Value::List(employees)) = graph.attribute(dept, "employees").cloned() else {
                panic!("employees missing");
            };
            let by_id = |id: &str| {
                employees
                    .iter()
                    .filter_map(Value::as_object)
                    .find(|&e| graph.attribute(e, "id") == Some(&Value::from(id)))
                    .unwrap()
            };
            assert_eq!(
                graph.attribute(by_id("a"), "lead"),
                Some(&Value::Object(by_id("b")))
            );
        }
    }

    #[test]
    fn test_single_node_collection_reference() {
        let ctx = context();
        let xml = format!(
            r#"<e:department xmlns:e="{ns}" xmlns:xsi="{xsi}"><e:employee xsi:type="e:Manager" id="m"><reports>k1 k2 k3</reports></e:employee><e:employee id="k1"/><e:employee id="k2"/><e:employee id="k3"/></e:department>"#,
            ns = EMP_NS,
            xsi = ns::XSI
        );
        let mut graph = ObjectGraph::new();
        ctx.unmarshal_str(&xml, &mut graph, &strict()).unwrap();
        let manager = graph
            .iter()
            .find(|(_, o)| o.type_name == "Manager")
            .map(|(id, _)| id)
            .unwrap();
        let Some(Value::List(reports)) = graph.attribute(manager, "reports") else {
            panic!("reports not assigned");
        };
        let ids: Vec<&Value> = reports
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|r| graph.attribute(r, "id"))
            .collect();
        assert_eq!(ids, vec![&Value::from("k1"), &Value::from("k2"), &Value::from("k3")]);
    }

    #[test]
    fn test_unresolved_reference_policies() {
        let ctx = context();
        let xml = format!(
            r#"<e:department xmlns:e="{}"><e:employee id="a" lead="ghost"/></e:department>"#,
            EMP_NS
        );
        let mut graph = ObjectGraph::new();
        let err = ctx.unmarshal_str(&xml, &mut graph, &strict()).unwrap_err();
        match err {
            OxmError::UnresolvedReferences(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].attribute, "lead");
                assert_eq!(list[0].key, vec!["ghost".to_string()]);
            }
            other => panic!("unexpected error {:?}", other),
        }

        let mut graph = ObjectGraph::new();
        let out = ctx.unmarshal_str(&xml, &mut graph, &lenient()).unwrap();
        assert_eq!(out.unresolved.len(), 1);
        let emp = graph.iter().find(|(_, o)| o.type_name == "Employee").map(|(id, _)| id).unwrap();
        assert_eq!(graph.attribute(emp, "lead"), None);
    }

    #[test]
    fn test_reference_written_as_key() {
        let ctx = context();
        let mut graph = ObjectGraph::new();
        let boss = graph.create("Employee");
        graph.set_attribute(boss, "id", Value::from("b"));
        let emp = graph.create("Employee");
        graph.set_attribute(emp, "id", Value::from("a"));
        graph.set_attribute(emp, "lead", Value::Object(boss));
        let xml = ctx.marshal_to_string(&graph, &Value::Object(emp), &bare()).unwrap();
        assert_eq!(
            xml,
            format!(r#"<e:employee xmlns:e="{}" id="a" lead="b"/>"#, EMP_NS)
        );
    }

    #[test]
    fn test_subtype_marshals_type_indicator() {
        let ctx = context();
        let mut graph = ObjectGraph::new();
        let manager = graph.create("Manager");
        graph.set_attribute(manager, "id", Value::from("m"));
        let dept = graph.create("Department");
        graph.set_attribute(dept, "employees", Value::List(vec![Value::Object(manager)]));
        let xml = ctx.marshal_to_string(&graph, &Value::Object(dept), &bare()).unwrap();

        let doc = XmlDocument::parse(&xml).unwrap();
        let root = doc.root_element_id().unwrap();
        let employee = doc.element_children(root).next().unwrap();
        let rec = ReadRecord::new(&doc, employee);
        assert_eq!(rec.schema_type(employee), Some(QName::new(Some(EMP_NS), "Manager")));

        let mut back = ObjectGraph::new();
        ctx.unmarshal_str(&xml, &mut back, &strict()).unwrap();
        assert!(back.iter().any(|(_, o)| o.type_name == "Manager"));
    }

    #[test]
    fn test_field_indicator_round_trip() {
        let ctx = context();
        let mut graph = ObjectGraph::new();
        let circle = graph.create("Circle");
        graph.set_attribute(circle, "radius", Value::Int(3));
        let xml = ctx.marshal_to_string(&graph, &Value::Object(circle), &bare()).unwrap();
        assert_eq!(xml, "<shape><kind>circle</kind><radius>3</radius></shape>");

        let mut back = ObjectGraph::new();
        let out = ctx.unmarshal_str(&xml, &mut back, &strict()).unwrap();
        let id = out.object().unwrap();
        assert_eq!(back.type_of(id), Some("Circle"));
        assert!(deep_eq(&graph, circle, &back, id));
    }

    #[test]
    fn test_choice_dispatches_in_document_order() {
        let ctx = context();
        let xml = "<bag><a>one</a><b><street>S</street></b><a>two</a></bag>";
        let mut graph = ObjectGraph::new();
        let out = ctx.unmarshal_str(xml, &mut graph, &strict()).unwrap();
        let bag = out.object().unwrap();
        let Some(Value::List(items)) = graph.attribute(bag, "items").cloned() else {
            panic!("items missing");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], Value::from("one"));
        let address = items[1].as_object().unwrap();
        assert_eq!(graph.type_of(address), Some("Address"));
        assert_eq!(items[2], Value::from("two"));

        let again = ctx.marshal_to_string(&graph, &out.root, &bare()).unwrap();
        assert_eq!(again, xml);
    }

    #[test]
    fn test_any_keeps_unmapped_elements() {
        let ctx = context();
        let xml = format!(
            r#"<e:employee xmlns:e="{}" id="e1"><e:name>Ada</e:name><note lang="en">hi <b>there</b></note><zzz/></e:employee>"#,
            EMP_NS
        );
        let mut graph = ObjectGraph::new();
        let out = ctx.unmarshal_str(&xml, &mut graph, &strict()).unwrap();
        let emp = out.object().unwrap();
        let Some(Value::List(extra)) = graph.attribute(emp, "extra").cloned() else {
            panic!("extra missing");
        };
        assert_eq!(extra.len(), 2);
        assert!(extra.iter().all(|v| matches!(v, Value::Element(_))));

        // unmapped content survives a second pass unchanged
        let doc = ctx.marshal(&graph, &out.root, None).unwrap();
        let first = doc.subtree_to_string(doc.root_element_id().unwrap());
        let mut graph2 = ObjectGraph::new();
        let out2 = ctx.unmarshal(&doc, &mut graph2, &strict(), None).unwrap();
        let doc2 = ctx.marshal(&graph2, &out2.root, None).unwrap();
        assert_eq!(doc2.subtree_to_string(doc2.root_element_id().unwrap()), first);
    }

    #[test]
    fn test_any_collection_empty_when_nothing_unclaimed() {
        let ctx = context();
        let xml = format!(r#"<e:employee xmlns:e="{}" id="e1"><e:name>Ada</e:name></e:employee>"#, EMP_NS);
        let mut graph = ObjectGraph::new();
        let out = ctx.unmarshal_str(&xml, &mut graph, &strict()).unwrap();
        assert_eq!(
            graph.attribute(out.object().unwrap(), "extra"),
            Some(&Value::List(Vec::new()))
        );
    }

    #[test]
    fn test_binary_inline_and_xop() {
        let ctx = context();
        let mut graph = ObjectGraph::new();
        let doc_id = graph.create("Doc");
        graph.set_attribute(doc_id, "data", Value::Bytes(b"hello".to_vec()));
        let root = Value::Object(doc_id);

        let inline = ctx.marshal_to_string(&graph, &root, &bare()).unwrap();
        assert_eq!(inline, "<doc><data>aGVsbG8=</data></doc>");

        let mut transport = InMemoryAttachments::new(true);
        let xop = ctx
            .marshal_to_string_with_attachments(&graph, &root, &bare(), &mut transport)
            .unwrap();
        assert_eq!(transport.len(), 1);
        let parsed = XmlDocument::parse(&xop).unwrap();
        let doc_node = parsed.root_element_id().unwrap();
        let data_node = parsed.element_children(doc_node).next().unwrap();
        let include = parsed.element_children(data_node).next().unwrap();
        assert!(TreeRecord::matches(&parsed, include, Some(ns::XOP), "Include"));

        let mut back = ObjectGraph::new();
        let out = ctx
            .unmarshal_str_with_attachments(&xop, &mut back, &strict(), &transport)
            .unwrap();
        assert_eq!(
            back.attribute(out.object().unwrap(), "data"),
            Some(&Value::Bytes(b"hello".to_vec()))
        );

        // XOP on the wire without a transport is an error
        let mut lost = ObjectGraph::new();
        assert!(matches!(
            ctx.unmarshal_str(&xop, &mut lost, &strict()),
            Err(OxmError::Attachment(_))
        ));
    }

    #[test]
    fn test_copy_object() {
        let ctx = context();
        let mut graph = ObjectGraph::new();
        let address = graph.create("Address");
        graph.set_attribute(address, "street", Value::from("Main St"));
        let contact = graph.create("Contact");
        graph.set_attribute(contact, "name", Value::from("Ada"));
        graph.set_attribute(contact, "address", Value::Object(address));

        let copy = ctx.copy_object(&mut graph, contact).unwrap();
        assert_ne!(copy, contact);
        assert!(deep_eq(&graph, contact, &graph, copy));
        assert_ne!(graph.attribute(copy, "address"), Some(&Value::Object(address)));

        let emp = graph.create("Employee");
        assert!(matches!(
            ctx.copy_object(&mut graph, emp),
            Err(OxmError::InvalidMappingOperation { operation: "copy", .. })
        ));
    }

    #[test]
    fn test_unknown_root_element() {
        let ctx = context();
        let mut graph = ObjectGraph::new();
        assert!(matches!(
            ctx.unmarshal_str("<nothing/>", &mut graph, &strict()),
            Err(OxmError::NoDescriptorForElement(_))
        ));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_root_wrapper_for_schema_typed_root() {
        let ctx = context();
        let xml = format!(
            r#"<wrapped xmlns:e="{}" xmlns:xsi="{}" xsi:type="e:Address"><street>S</street></wrapped>"#,
            EMP_NS,
            ns::XSI
        );
        let mut graph = ObjectGraph::new();
        let out = ctx.unmarshal_str(&xml, &mut graph, &strict()).unwrap();
        let Value::Root(root) = &out.root else {
            panic!("expected a root wrapper");
        };
        assert_eq!(root.name, QName::local("wrapped"));
        assert_eq!(root.schema_type, Some(QName::new(Some(EMP_NS), "Address")));
        assert_eq!(graph.type_of(out.object().unwrap()), Some("Address"));
    }

    proptest! {
        #[test]
        fn test_contact_round_trip(
            name in "[a-zA-Z0-9]{1,12}",
            email in proptest::option::of("[a-zA-Z0-9]{1,12}"),
            street in proptest::option::of("[a-zA-Z0-9]{1,12}"),
            age in proptest::option::of(0i64..150),
        ) {
            let ctx = context();
            let mut graph = ObjectGraph::new();
            let contact = graph.create("Contact");
            graph.set_attribute(contact, "name", Value::from(name));
            if let Some(email) = email {
                graph.set_attribute(contact, "email", Value::from(email));
            }
            if let Some(street) = street {
                let address = graph.create("Address");
                graph.set_attribute(address, "street", Value::from(street));
                graph.set_attribute(contact, "address", Value::Object(address));
            }
            if let Some(age) = age {
                graph.set_attribute(contact, "age", Value::Int(age));
            }

            let xml = ctx.marshal_to_string(&graph, &Value::Object(contact), &MarshalConfig::default()).unwrap();
            let mut back = ObjectGraph::new();
            let out = ctx.unmarshal_str(&xml, &mut back, &strict()).unwrap();
            prop_assert!(deep_eq(&graph, contact, &back, out.object().unwrap()));
        }
    }
}
