//! Direct and Direct-Collection mappings: scalar values at a text node or
//! attribute.

use super::InitScope;
use crate::container::ContainerPolicy;
use crate::context::{MarshalContext, UnmarshalContext};
use crate::convert::{ConversionService, ScalarType};
use crate::dom::NodeId;
use crate::error::{OxmError, Result};
use crate::path::{Lookup, Path};
use crate::record::{ReadRecord, WriteRecord};
use crate::value::Value;

/// How a null attribute is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullRepresentation {
    /// Write nothing
    #[default]
    AbsentNode,
    /// Write the node with empty content
    EmptyNode,
    /// Write the element with `xsi:nil="true"`
    XsiNil,
}

/// Which document states read as null, and how null is written back
#[derive(Debug, Clone, PartialEq)]
pub struct NullPolicy {
    pub empty_node_is_null: bool,
    pub xsi_nil_is_null: bool,
    pub marshal: NullRepresentation,
    /// Value assigned when the node reads as null; `None` leaves the
    /// attribute unset
    pub null_value: Option<Value>,
}

impl Default for NullPolicy {
    fn default() -> Self {
        NullPolicy {
            empty_node_is_null: false,
            xsi_nil_is_null: true,
            marshal: NullRepresentation::AbsentNode,
            null_value: None,
        }
    }
}

impl NullPolicy {
    /// Empty node in both directions
    pub fn empty_node() -> Self {
        NullPolicy {
            empty_node_is_null: true,
            marshal: NullRepresentation::EmptyNode,
            ..Self::default()
        }
    }

    /// `xsi:nil` in both directions
    pub fn xsi_nil() -> Self {
        NullPolicy {
            marshal: NullRepresentation::XsiNil,
            ..Self::default()
        }
    }

    pub fn with_null_value(mut self, value: Value) -> Self {
        self.null_value = Some(value);
        self
    }

    fn null(&self) -> Option<Value> {
        self.null_value.clone()
    }

    /// Write the null representation for an absent value at `path`
    pub(crate) fn write_null(&self, path: &Path, rec: &mut WriteRecord<'_>) {
        match self.marshal {
            NullRepresentation::AbsentNode => {}
            NullRepresentation::EmptyNode => rec.put(path, "", false),
            // nil has no attribute form
            NullRepresentation::XsiNil if path.is_attribute() => {}
            NullRepresentation::XsiNil => {
                let node = rec.create_nested(path);
                rec.set_nil(node);
            }
        }
    }
}

/// Typed value of `text` found at `node`. QName values resolve their prefix
/// against the namespaces in scope at `node`.
pub(crate) fn scalar_from_text(
    text: &str,
    scalar: ScalarType,
    rec: &ReadRecord<'_>,
    node: NodeId,
    conversion: &dyn ConversionService,
) -> Result<Value> {
    if scalar == ScalarType::QName {
        return rec
            .resolve_qname(node, text)
            .map(Value::QName)
            .ok_or_else(|| OxmError::conversion(text, scalar));
    }
    conversion.from_text(text, scalar)
}

/// Lexical form of `value` for writing at `node`
pub(crate) fn scalar_to_text(
    value: &Value,
    scalar: ScalarType,
    rec: &mut WriteRecord<'_>,
    node: NodeId,
    conversion: &dyn ConversionService,
) -> Result<String> {
    match value {
        Value::QName(name) => Ok(rec.qname_text(node, name)),
        other => conversion.to_text(other, scalar),
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectMapping {
    pub scalar: ScalarType,
    pub null_policy: NullPolicy,
    pub cdata: bool,
}

impl DirectMapping {
    pub fn read(
        &self,
        path: &Path,
        rec: &ReadRecord<'_>,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<Option<Value>> {
        let Lookup::Found { node, value } = rec.get(path) else {
            return Ok(self.null_policy.null());
        };
        if self.null_policy.xsi_nil_is_null && !path.is_attribute() && rec.is_nil(node) {
            return Ok(self.null_policy.null());
        }
        if self.null_policy.empty_node_is_null && value.is_empty() {
            return Ok(self.null_policy.null());
        }
        scalar_from_text(&value, self.scalar, rec, node, ctx.conversion).map(Some)
    }

    pub fn write(
        &self,
        path: &Path,
        value: &Value,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        if value.is_null() {
            self.null_policy.write_null(path, rec);
            return Ok(());
        }
        let node = rec.create_nested(path);
        let text = scalar_to_text(value, self.scalar, rec, node, ctx.conversion)?;
        rec.write_value(node, path, &text, self.cdata);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectCollectionMapping {
    pub scalar: ScalarType,
    pub container: ContainerPolicy,
    /// All values in one node, separated by whitespace
    pub uses_single_node: bool,
    pub cdata: bool,
}

impl DirectCollectionMapping {
    pub(crate) fn initialize(&mut self, attribute: &str, scope: &InitScope<'_>) -> Result<()> {
        if self.container.is_keyed() {
            return Err(scope.invalid(attribute, "scalar values have no key attribute"));
        }
        Ok(())
    }

    /// Always a container; no matching node gives an empty one
    pub fn read(&self, path: &Path, rec: &ReadRecord<'_>, ctx: &mut UnmarshalContext<'_>) -> Result<Value> {
        let mut container = self.container.empty();
        if self.uses_single_node {
            if let Lookup::Found { node, value } = rec.get(path) {
                for token in value.split_whitespace() {
                    let item = scalar_from_text(token, self.scalar, rec, node, ctx.conversion)?;
                    self.container.add(&mut container, item, ctx.graph())?;
                }
            }
            return Ok(container);
        }
        for node in rec.get_nodes(path) {
            if let Some(text) = rec.value_at(node, path) {
                let item = scalar_from_text(&text, self.scalar, rec, node, ctx.conversion)?;
                self.container.add(&mut container, item, ctx.graph())?;
            }
        }
        Ok(container)
    }

    pub fn write(
        &self,
        path: &Path,
        value: &Value,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        let items = self.container.iter(value)?;
        if self.uses_single_node {
            if items.is_empty() {
                return Ok(());
            }
            let node = rec.create_nested(path);
            let mut tokens = Vec::with_capacity(items.len());
            for item in items.into_iter().filter(|v| !v.is_null()) {
                tokens.push(scalar_to_text(item, self.scalar, rec, node, ctx.conversion)?);
            }
            rec.write_value(node, path, &tokens.join(" "), self.cdata);
            return Ok(());
        }
        for item in items.into_iter().filter(|v| !v.is_null()) {
            let node = rec.add_nested(path);
            let text = scalar_to_text(item, self.scalar, rec, node, ctx.conversion)?;
            rec.write_value(node, path, &text, self.cdata);
        }
        Ok(())
    }
}
