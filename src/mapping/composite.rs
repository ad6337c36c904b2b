//! Composite-Object and Composite-Collection mappings: nested elements read
//! and written with the referenced type's own descriptor.

use super::direct::NullPolicy;
use super::InitScope;
use crate::container::ContainerPolicy;
use crate::context::{MarshalContext, UnmarshalContext};
use crate::dom::NodeId;
use crate::error::{OxmError, Result};
use crate::object::ObjectId;
use crate::path::Path;
use crate::qname::QName;
use crate::record::{ReadRecord, WriteRecord};
use crate::resolve;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct CompositeMapping {
    pub reference_type: String,
    pub container: ContainerPolicy,
    pub null_policy: NullPolicy,
}

impl CompositeMapping {
    pub fn new(reference_type: &str) -> Self {
        CompositeMapping {
            reference_type: reference_type.to_string(),
            container: ContainerPolicy::default(),
            null_policy: NullPolicy::default(),
        }
    }

    pub(crate) fn initialize(
        &mut self,
        attribute: &str,
        path: &Path,
        collection: bool,
        scope: &InitScope<'_>,
    ) -> Result<()> {
        scope.check_type(&self.reference_type)?;
        if path.is_attribute() || path.is_text() {
            return Err(scope.invalid(attribute, "composite path must address an element"));
        }
        if collection && path.is_self() {
            return Err(scope.invalid(attribute, "collection elements cannot be the context node"));
        }
        Ok(())
    }

    fn is_null(&self, rec: &ReadRecord<'_>, node: NodeId) -> bool {
        if self.null_policy.xsi_nil_is_null && rec.is_nil(node) {
            return true;
        }
        let tree = rec.tree();
        self.null_policy.empty_node_is_null
            && tree.children(node).is_empty()
            && tree.attributes(node).is_empty()
    }

    pub fn read_object(
        &self,
        path: &Path,
        rec: &ReadRecord<'_>,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Option<Value>> {
        let Some(&node) = rec.get_nodes(path).first() else {
            return Ok(self.null_policy.null_value.clone());
        };
        if self.is_null(rec, node) {
            return Ok(self.null_policy.null_value.clone());
        }
        let id = read_element(&self.reference_type, path.leaf_type(), &rec.nested(node), ctx)?;
        Ok(Some(Value::Object(id)))
    }

    pub fn read_collection(
        &self,
        path: &Path,
        rec: &ReadRecord<'_>,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Value> {
        let nodes = rec.get_nodes(path);
        let mut container = self.container.sized(nodes.len());
        for node in nodes {
            if rec.is_nil(node) {
                continue;
            }
            let id = read_element(&self.reference_type, path.leaf_type(), &rec.nested(node), ctx)?;
            self.container.add(&mut container, Value::Object(id), ctx.graph())?;
        }
        Ok(container)
    }

    pub fn write_object(
        &self,
        path: &Path,
        value: &Value,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        match value {
            Value::Null => {
                self.null_policy.write_null(path, rec);
                Ok(())
            }
            Value::Object(id) => {
                let node = rec.create_nested(path);
                write_element(&self.reference_type, *id, &mut rec.nested(node), ctx)
            }
            other => Err(OxmError::conversion(other.type_label(), &self.reference_type)),
        }
    }

    pub fn write_collection(
        &self,
        path: &Path,
        value: &Value,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        for item in self.container.iter(value)? {
            match item {
                Value::Null => {}
                Value::Object(id) => {
                    let node = rec.add_nested(path);
                    write_element(&self.reference_type, *id, &mut rec.nested(node), ctx)?;
                }
                other => return Err(OxmError::conversion(other.type_label(), &self.reference_type)),
            }
        }
        Ok(())
    }
}

/// Build an object of `declared` (or the subtype the element announces)
/// from the record's node
pub(crate) fn read_element(
    declared: &str,
    leaf: Option<&QName>,
    rec: &ReadRecord<'_>,
    ctx: &mut UnmarshalContext<'_>,
) -> Result<ObjectId> {
    let registry = ctx.registry;
    let descriptor = resolve::composite_type(registry, rec, rec.node(), declared, leaf)?;
    ctx.build_object(descriptor, rec)
}

/// Write object `id` into the record's node, announcing its concrete type
/// when it is a subtype of `declared`
pub(crate) fn write_element(
    declared: &str,
    id: ObjectId,
    rec: &mut WriteRecord<'_>,
    ctx: &mut MarshalContext<'_>,
) -> Result<()> {
    let registry = ctx.registry;
    let descriptor = registry.descriptor(ctx.type_of(id)?)?;
    ctx.write_type_indicator(declared, descriptor, rec)?;
    ctx.write_object(descriptor, id, rec)
}
