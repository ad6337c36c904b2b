//! Any mappings: content no sibling mapping claims.
//!
//! Exclusion sets are filled in by `compute_exclusions` during registry
//! initialization. Unclaimed elements are materialized through the type
//! resolution rules or kept raw, depending on [`KeepAsElementPolicy`].

use std::collections::HashSet;

use tracing::debug;

use super::direct::{scalar_from_text, scalar_to_text};
use super::InitScope;
use crate::container::ContainerPolicy;
use crate::context::{MarshalContext, UnmarshalContext};
use crate::convert::ScalarType;
use crate::dom::namespace::ns;
use crate::dom::{NodeId, NodeKind};
use crate::error::{OxmError, Result};
use crate::path::{self, Path};
use crate::qname::QName;
use crate::record::{ReadRecord, WriteRecord};
use crate::resolve;
use crate::root::XmlRoot;
use crate::value::Value;

/// Which unclaimed elements stay raw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepAsElementPolicy {
    /// Raw only when no type can be resolved
    #[default]
    KeepUnknownAsElement,
    /// Never materialize
    KeepAllAsElement,
    /// Materialize whatever can be: typed objects, then simple typed or
    /// text-only content as scalars
    KeepNoneAsElement,
}

#[derive(Debug, Clone)]
pub struct AnyMapping {
    pub keep_as_element: KeepAsElementPolicy,
    pub use_root_wrapper: bool,
    /// Keep non-blank text children as strings
    pub mixed_content: bool,
    pub container: ContainerPolicy,
    pub exclusions: HashSet<QName>,
}

impl Default for AnyMapping {
    fn default() -> Self {
        AnyMapping {
            keep_as_element: KeepAsElementPolicy::default(),
            use_root_wrapper: false,
            mixed_content: true,
            container: ContainerPolicy::default(),
            exclusions: HashSet::new(),
        }
    }
}

enum Unclaimed {
    Element(NodeId),
    Text(String),
}

impl AnyMapping {
    /// Children of the context element that no sibling claims, in order
    fn unclaimed(&self, path: &Path, rec: &ReadRecord<'_>) -> Vec<Unclaimed> {
        let tree = rec.tree();
        let Some(context) = path::locate(tree, rec.node(), path.fragments().iter()) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for child in tree.children(context) {
            match tree.kind(child) {
                Some(NodeKind::Element) => {
                    let claimed = tree
                        .qname(child)
                        .map(|name| self.exclusions.contains(&name))
                        .unwrap_or(true);
                    if !claimed {
                        out.push(Unclaimed::Element(child));
                    }
                }
                Some(NodeKind::Text | NodeKind::CData) if self.mixed_content => {
                    if let Some(text) = tree.text(child).filter(|t| !t.trim().is_empty()) {
                        out.push(Unclaimed::Text(text.to_string()));
                    }
                }
                _ => {}
            }
        }
        out
    }

    pub fn read_object(
        &self,
        path: &Path,
        rec: &ReadRecord<'_>,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Option<Value>> {
        let unclaimed = self.unclaimed(path, rec);
        let element = unclaimed.iter().find_map(|u| match u {
            Unclaimed::Element(node) => Some(*node),
            Unclaimed::Text(_) => None,
        });
        if let Some(node) = element {
            return self.materialize(rec, node, path.leaf_type(), ctx).map(Some);
        }
        Ok(unclaimed.into_iter().find_map(|u| match u {
            Unclaimed::Text(text) => Some(Value::String(text)),
            Unclaimed::Element(_) => None,
        }))
    }

    /// Always a container; nothing unclaimed gives an empty one
    pub fn read_collection(
        &self,
        path: &Path,
        rec: &ReadRecord<'_>,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value> {
        let unclaimed = self.unclaimed(path, rec);
        let mut container = self.container.sized(unclaimed.len());
        for item in unclaimed {
            let value = match item {
                Unclaimed::Element(node) => self.materialize(rec, node, path.leaf_type(), ctx)?,
                Unclaimed::Text(text) => Value::String(text),
            };
            self.container.add(&mut container, value, ctx.graph())?;
        }
        Ok(container)
    }

    fn materialize(
        &self,
        rec: &ReadRecord<'_>,
        node: NodeId,
        leaf: Option<&QName>,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value> {
        let tree = rec.tree();
        if self.keep_as_element == KeepAsElementPolicy::KeepAllAsElement {
            return Ok(Value::Element(tree.extract_element(node)));
        }
        let child = rec.nested(node);
        let name = tree
            .qname(node)
            .ok_or_else(|| OxmError::NoDescriptorForElement(format!("node #{}", node)))?;
        let wrap = |value: Value| {
            XmlRoot::new(name.clone(), value)
                .with_prefix(tree.prefix(node))
                .with_schema_type(child.schema_type(node))
                .into_value()
        };

        let registry = ctx.registry;
        if let Some(descriptor) = resolve::any_type(registry, &child, node, leaf) {
            let id = ctx.build_object(descriptor, &child)?;
            if self.use_root_wrapper || descriptor.default_root() != Some(&name) {
                return Ok(wrap(Value::Object(id)));
            }
            return Ok(Value::Object(id));
        }

        if self.keep_as_element == KeepAsElementPolicy::KeepNoneAsElement {
            let scalar = child
                .schema_type(node)
                .and_then(|t| ScalarType::from_schema_type(&t));
            let text_only = tree.element_children(node).is_empty();
            if scalar.is_some() || text_only {
                let text = tree.text_content(node);
                let scalar = scalar.unwrap_or_default();
                let value = scalar_from_text(&text, scalar, &child, node, ctx.conversion)?;
                return Ok(wrap(value));
            }
        }

        debug!(element = %name, "no type for unmapped element, keeping it raw");
        Ok(Value::Element(tree.extract_element(node)))
    }

    pub fn write_object(
        &self,
        path: &Path,
        value: &Value,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        let context = rec.create_nested(path);
        write_item(value, context, rec, ctx)
    }

    pub fn write_collection(
        &self,
        path: &Path,
        value: &Value,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        let items = self.container.iter(value)?;
        if items.is_empty() {
            return Ok(());
        }
        let context = rec.create_nested(path);
        for item in items {
            write_item(item, context, rec, ctx)?;
        }
        Ok(())
    }
}

/// Append one Any value under `context`
fn write_item(
    value: &Value,
    context: NodeId,
    rec: &mut WriteRecord<'_>,
    ctx: &mut MarshalContext<'_>,
) -> Result<()> {
    match value {
        Value::Null => {}
        Value::Element(element) => {
            rec.tree_mut().import_element(context, element);
        }
        Value::String(text) => {
            rec.tree_mut().append_text(context, text, false);
        }
        Value::Object(id) => {
            let registry = ctx.registry;
            let descriptor = registry.descriptor(ctx.type_of(*id)?)?;
            let name = descriptor
                .default_root()
                .ok_or_else(|| OxmError::NoDefaultRootElement(descriptor.type_name().to_string()))?;
            let child = rec.create_child(context, name.namespace(), &name.local, descriptor.root_prefix());
            ctx.write_object(descriptor, *id, &mut rec.nested(child))?;
        }
        Value::Root(root) => {
            let prefix = root.prefix.as_deref().unwrap_or("");
            let child = rec.create_child(context, root.name.namespace(), &root.name.local, prefix);
            if let Some(schema_type) = &root.schema_type {
                rec.set_schema_type(child, schema_type);
            }
            match &root.value {
                Value::Null => {}
                Value::Object(id) => {
                    let registry = ctx.registry;
                    let descriptor = registry.descriptor(ctx.type_of(*id)?)?;
                    ctx.write_object(descriptor, *id, &mut rec.nested(child))?;
                }
                scalar => {
                    let kind = ScalarType::of(scalar).unwrap_or_default();
                    let text = scalar_to_text(scalar, kind, rec, child, ctx.conversion)?;
                    if !text.is_empty() {
                        rec.tree_mut().append_text(child, &text, false);
                    }
                }
            }
        }
        scalar => {
            let kind = ScalarType::of(scalar).unwrap_or_default();
            let text = scalar_to_text(scalar, kind, rec, context, ctx.conversion)?;
            rec.tree_mut().append_text(context, &text, false);
        }
    }
    Ok(())
}

/// All attributes of the context element as a QName-keyed map
#[derive(Debug, Clone)]
pub struct AnyAttributeMapping {
    pub container: ContainerPolicy,
    /// Also carry `xmlns` declarations, keyed in the xmlns namespace
    pub include_namespace_declarations: bool,
    pub exclusions: HashSet<QName>,
}

impl Default for AnyAttributeMapping {
    fn default() -> Self {
        AnyAttributeMapping {
            container: ContainerPolicy::keyed(),
            include_namespace_declarations: false,
            exclusions: HashSet::new(),
        }
    }
}

impl AnyAttributeMapping {
    pub(crate) fn initialize(&mut self, attribute: &str, scope: &InitScope<'_>) -> Result<()> {
        if !self.container.is_keyed() {
            return Err(scope.invalid(attribute, "any-attribute needs a keyed container"));
        }
        Ok(())
    }

    pub fn read(&self, path: &Path, rec: &ReadRecord<'_>, _ctx: &mut UnmarshalContext<'_>) -> Result<Value> {
        let tree = rec.tree();
        let mut map = self.container.empty();
        let Some(context) = path::locate(tree, rec.node(), path.fragments().iter()) else {
            return Ok(map);
        };
        for attr in tree.attributes(context) {
            // xsi:type and xsi:nil belong to the engine
            if attr.namespace == Some(ns::XSI) {
                continue;
            }
            let name = QName::new(attr.namespace, attr.local_name);
            if self.exclusions.contains(&name) {
                continue;
            }
            self.container
                .add_keyed(&mut map, Value::QName(name), Value::from(attr.value))?;
        }
        if self.include_namespace_declarations {
            for (prefix, uri) in tree.namespace_declarations(context) {
                let local = if prefix.is_empty() { "xmlns" } else { prefix };
                let name = QName::new(Some(ns::XMLNS), local);
                self.container
                    .add_keyed(&mut map, Value::QName(name), Value::from(uri))?;
            }
        }
        Ok(map)
    }

    pub fn write(
        &self,
        path: &Path,
        value: &Value,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        let entries = match value {
            Value::Null => return Ok(()),
            Value::Map(entries) => entries,
            other => {
                return Err(OxmError::InvalidContainer(format!(
                    "any-attribute value must be a map, found {}",
                    other.type_label()
                )))
            }
        };
        let context = rec.create_nested(path);
        for (key, item) in entries {
            let name = match key {
                Value::QName(name) => name.clone(),
                Value::String(local) => QName::local(local),
                other => return Err(OxmError::conversion(other.type_label(), ScalarType::QName)),
            };
            if name.namespace() == Some(ns::XMLNS) {
                if self.include_namespace_declarations {
                    let prefix = if name.local == "xmlns" { "" } else { name.local.as_str() };
                    let uri = item.as_str().unwrap_or("");
                    if rec.tree().lookup_namespace_uri(context, prefix) != Some(uri) {
                        rec.tree_mut().declare_namespace(context, prefix, uri);
                    }
                }
                continue;
            }
            if self.exclusions.contains(&name) || item.is_null() {
                continue;
            }
            let kind = ScalarType::of(item).unwrap_or_default();
            let text = scalar_to_text(item, kind, rec, context, ctx.conversion)?;
            rec.set_attribute(context, &name, "", &text);
        }
        Ok(())
    }
}
