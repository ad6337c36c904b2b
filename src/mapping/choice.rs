//! Choice mappings: one attribute, several (path -> target) alternatives.
//!
//! Each entry gets a synthesized sub-mapping at initialize time: Direct for
//! a `text()` path, Composite for an element path (the collection form uses
//! the collection kinds). Reads dispatch per element in document order;
//! writes pick the entry by the value's type.

use super::composite::read_element;
use super::direct::scalar_from_text;
use super::{InitScope, Mapping};
use crate::container::ContainerPolicy;
use crate::context::{MarshalContext, UnmarshalContext};
use crate::convert::ScalarType;
use crate::dom::NodeId;
use crate::error::{OxmError, Result};
use crate::object::ObjectId;
use crate::path::{self, Path};
use crate::qname::QName;
use crate::record::{ReadRecord, WriteRecord};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceTarget {
    /// A registered type, for element paths
    Type(String),
    /// A scalar, for `text()` paths
    Scalar(ScalarType),
}

#[derive(Debug, Clone)]
pub struct ChoiceEntry {
    pub xpath: String,
    pub target: ChoiceTarget,
    pub path: Path,
    synthesized: Option<Mapping>,
}

impl ChoiceEntry {
    pub fn new(xpath: &str, target: ChoiceTarget) -> Self {
        ChoiceEntry {
            xpath: xpath.to_string(),
            target,
            path: Path::default(),
            synthesized: None,
        }
    }

    pub fn synthesized(&self) -> Option<&Mapping> {
        self.synthesized.as_ref()
    }

    fn element_name(&self) -> Option<QName> {
        self.path.last_element().map(|f| f.qname())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChoiceMapping {
    pub entries: Vec<ChoiceEntry>,
    pub container: ContainerPolicy,
}

impl ChoiceMapping {
    pub(crate) fn initialize(&mut self, attribute: &str, collection: bool, scope: &InitScope<'_>) -> Result<()> {
        if self.entries.is_empty() {
            return Err(scope.invalid(attribute, "choice has no entries"));
        }
        for entry in &mut self.entries {
            let path = scope.compile(&entry.xpath, None)?;
            let mut sub = match (&entry.target, path.is_text(), collection) {
                (ChoiceTarget::Scalar(s), true, false) => Mapping::direct(attribute, &entry.xpath).with_scalar(*s),
                (ChoiceTarget::Scalar(s), true, true) => {
                    Mapping::direct_collection(attribute, &entry.xpath).with_scalar(*s)
                }
                (ChoiceTarget::Type(t), false, false) => Mapping::composite(attribute, &entry.xpath, t),
                (ChoiceTarget::Type(t), false, true) => Mapping::composite_collection(attribute, &entry.xpath, t),
                (ChoiceTarget::Scalar(_), false, _) => {
                    return Err(scope.invalid(attribute, format!("scalar choice '{}' needs a text() path", entry.xpath)))
                }
                (ChoiceTarget::Type(_), true, _) => {
                    return Err(scope.invalid(attribute, format!("typed choice '{}' needs an element path", entry.xpath)))
                }
            };
            sub.initialize(scope)?;
            if path.last_element().is_none() {
                return Err(scope.invalid(attribute, format!("choice '{}' names no element", entry.xpath)));
            }
            entry.path = path;
            entry.synthesized = Some(sub);
        }

        let parent = |e: &ChoiceEntry| -> Vec<QName> {
            e.path.parent_fragments().iter().filter(|f| f.is_element()).map(|f| f.qname()).collect()
        };
        let first = parent(&self.entries[0]);
        if self.entries.iter().any(|e| parent(e) != first) {
            return Err(scope.invalid(attribute, "choice entries must share one parent element"));
        }
        Ok(())
    }

    /// Element children of the shared parent that some entry claims, with
    /// that entry's index, in document order
    fn matching(&self, rec: &ReadRecord<'_>) -> Vec<(usize, NodeId)> {
        let tree = rec.tree();
        let Some(first) = self.entries.first() else {
            return Vec::new();
        };
        let Some(parent) = path::locate(tree, rec.node(), first.path.parent_fragments().iter()) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for child in tree.element_children(parent) {
            let claimed = self.entries.iter().position(|e| {
                e.path
                    .last_element()
                    .map(|f| tree.matches(child, f.namespace.as_deref(), &f.local_name))
                    .unwrap_or(false)
            });
            if let Some(index) = claimed {
                out.push((index, child));
            }
        }
        out
    }

    fn read_entry(
        &self,
        index: usize,
        node: NodeId,
        rec: &ReadRecord<'_>,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value> {
        let entry = &self.entries[index];
        match &entry.target {
            ChoiceTarget::Scalar(scalar) => {
                let text = rec.value_at(node, &entry.path).unwrap_or_default();
                scalar_from_text(&text, *scalar, rec, node, ctx.conversion)
            }
            ChoiceTarget::Type(type_name) => {
                let id = read_element(type_name, entry.path.leaf_type(), &rec.nested(node), ctx)?;
                Ok(Value::Object(id))
            }
        }
    }

    pub fn read_object(
        &self,
        _path: &Path,
        rec: &ReadRecord<'_>,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Option<Value>> {
        match self.matching(rec).first() {
            Some(&(index, node)) => self.read_entry(index, node, rec, ctx).map(Some),
            None => Ok(None),
        }
    }

    pub fn read_collection(
        &self,
        _path: &Path,
        rec: &ReadRecord<'_>,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value> {
        let matching = self.matching(rec);
        let mut container = self.container.sized(matching.len());
        for (index, node) in matching {
            let value = self.read_entry(index, node, rec, ctx)?;
            self.container.add(&mut container, value, ctx.graph())?;
        }
        Ok(container)
    }

    /// Entry that writes `value`: by object type (exact, then nearest
    /// declared supertype), by wrapper element name, or by scalar type
    fn entry_for(&self, value: &Value, ctx: &MarshalContext<'_>) -> Option<&ChoiceEntry> {
        match value {
            Value::Object(id) => {
                let type_name = ctx.type_of(*id).ok()?;
                let typed = |pred: &dyn Fn(&str) -> bool| {
                    self.entries.iter().find(|e| match &e.target {
                        ChoiceTarget::Type(t) => pred(t),
                        ChoiceTarget::Scalar(_) => false,
                    })
                };
                typed(&|t| t == type_name).or_else(|| typed(&|t| ctx.registry.is_subtype_of(type_name, t)))
            }
            Value::Root(root) => self
                .entries
                .iter()
                .find(|e| e.element_name().as_ref() == Some(&root.name)),
            scalar => {
                let kind = ScalarType::of(scalar)?;
                let scalars = || {
                    self.entries
                        .iter()
                        .filter(|e| matches!(e.target, ChoiceTarget::Scalar(_)))
                };
                scalars()
                    .find(|e| e.target == ChoiceTarget::Scalar(kind))
                    .or_else(|| scalars().next())
            }
        }
    }

    fn write_entry(
        &self,
        attribute: &str,
        value: &Value,
        single: bool,
        owner: ObjectId,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        let sub = self
            .entry_for(value, ctx)
            .and_then(ChoiceEntry::synthesized)
            .ok_or_else(|| OxmError::conversion(value.type_label(), format!("a choice of '{}'", attribute)))?;
        let value = match value {
            Value::Root(root) => &root.value,
            other => other,
        };
        if single {
            sub.write(value, owner, rec, ctx)
        } else {
            sub.write(&Value::List(vec![value.clone()]), owner, rec, ctx)
        }
    }

    pub fn write_object(
        &self,
        attribute: &str,
        value: &Value,
        owner: ObjectId,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        self.write_entry(attribute, value, true, owner, rec, ctx)
    }

    pub fn write_collection(
        &self,
        attribute: &str,
        value: &Value,
        owner: ObjectId,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        for item in self.container.iter(value)? {
            if !item.is_null() {
                self.write_entry(attribute, item, false, owner, rec, ctx)?;
            }
        }
        Ok(())
    }
}
