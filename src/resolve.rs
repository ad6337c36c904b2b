//! Type Resolution
//!
//! Picks the descriptor to materialize for an element. Composite mappings
//! know their declared type and only need to narrow it to a subtype; Any
//! mappings know nothing and may come up empty, in which case the caller
//! keeps the raw element.

use crate::descriptor::{Descriptor, DescriptorRegistry, TypeIndicator};
use crate::dom::NodeId;
use crate::error::{OxmError, Result};
use crate::path::{self, Lookup};
use crate::qname::QName;
use crate::record::ReadRecord;

/// Concrete type for an element of a composite mapping declared as
/// `declared`.
///
/// 1. The inheritance indicator on the node (`xsi:type` or the policy's
///    indicator field). With a policy in force, an indicator that names no
///    subtype of `declared` is fatal.
/// 2. The mapping's leaf type hint, when it names a concrete subtype.
/// 3. `declared` itself, unless abstract.
pub fn composite_type<'r>(
    registry: &'r DescriptorRegistry,
    rec: &ReadRecord<'_>,
    node: NodeId,
    declared: &str,
    leaf: Option<&QName>,
) -> Result<&'r Descriptor> {
    if let Some(found) = by_indicator(registry, rec, node, declared)? {
        return Ok(found);
    }
    if let Some(found) = leaf
        .and_then(|name| registry.by_schema_type(name))
        .filter(|d| !d.is_abstract() && registry.is_subtype_of(d.type_name(), declared))
    {
        return Ok(found);
    }
    let descriptor = registry.descriptor(declared)?;
    if descriptor.is_abstract() {
        return Err(OxmError::AbstractType(declared.to_string()));
    }
    Ok(descriptor)
}

fn by_indicator<'r>(
    registry: &'r DescriptorRegistry,
    rec: &ReadRecord<'_>,
    node: NodeId,
    declared: &str,
) -> Result<Option<&'r Descriptor>> {
    let no_subtype = |indicator: String| OxmError::NoSubtypeForIndicator {
        base: declared.to_string(),
        indicator,
    };
    let Some(policy) = registry.inheritance_for(declared) else {
        // no policy: an xsi:type naming a known subtype is still honored
        return Ok(rec
            .schema_type(node)
            .and_then(|name| registry.by_schema_type(&name))
            .filter(|d| registry.is_subtype_of(d.type_name(), declared)));
    };
    match policy.indicator() {
        TypeIndicator::SchemaType => {
            let Some(name) = rec.schema_type(node) else {
                return Ok(None);
            };
            registry
                .by_schema_type(&name)
                .filter(|d| registry.is_subtype_of(d.type_name(), declared))
                .map(Some)
                .ok_or_else(|| no_subtype(name.to_string()))
        }
        TypeIndicator::Field(_) => {
            let Lookup::Found { value, .. } = path::extract(rec.tree(), node, policy.path()) else {
                return Ok(None);
            };
            let type_name = policy
                .type_for(&value)
                .filter(|t| registry.is_subtype_of(t, declared))
                .ok_or_else(|| no_subtype(value.clone()))?;
            registry.descriptor(type_name).map(Some)
        }
    }
}

/// Type for an element claimed by an Any mapping: `xsi:type`, then the leaf
/// type hint, then the element name. `None` when nothing is registered.
pub fn any_type<'r>(
    registry: &'r DescriptorRegistry,
    rec: &ReadRecord<'_>,
    node: NodeId,
    leaf: Option<&QName>,
) -> Option<&'r Descriptor> {
    let by_name = || {
        rec.tree()
            .qname(node)
            .and_then(|name| registry.by_root_element(&name))
    };
    rec.schema_type(node)
        .and_then(|name| registry.by_schema_type(&name))
        .or_else(|| leaf.and_then(|name| registry.by_schema_type(name)))
        .or_else(by_name)
        .filter(|d| !d.is_abstract())
}

/// Type of a document's root element: by element name (narrowed like a
/// composite), otherwise by `xsi:type` alone.
pub fn root_type<'r>(
    registry: &'r DescriptorRegistry,
    rec: &ReadRecord<'_>,
    node: NodeId,
) -> Result<&'r Descriptor> {
    let name = rec
        .tree()
        .qname(node)
        .ok_or_else(|| OxmError::NoDescriptorForElement(format!("node #{}", node)))?;
    if let Some(declared) = registry.by_root_element(&name) {
        return composite_type(registry, rec, node, declared.type_name(), None);
    }
    match rec.schema_type(node).and_then(|t| registry.by_schema_type(&t)) {
        Some(d) if d.is_abstract() => Err(OxmError::AbstractType(d.type_name().to_string())),
        Some(d) => Ok(d),
        None => Err(OxmError::NoDescriptorForElement(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::XmlDocument;
    use crate::testing::{self, EMP_NS};

    fn element(xml: &str) -> XmlDocument {
        XmlDocument::parse(xml).unwrap()
    }

    #[test]
    fn test_composite_declared_type() {
        let registry = testing::registry();
        let doc = element(r#"<address><street>X</street></address>"#);
        let root = doc.root_element_id().unwrap();
        let rec = ReadRecord::new(&doc, root);
        let d = composite_type(&registry, &rec, root, "Address", None).unwrap();
        assert_eq!(d.type_name(), "Address");
    }

    #[test]
    fn test_composite_subtype_by_schema_type() {
        let registry = testing::registry();
        let xml = format!(
            r#"<e:employee xmlns:e="{}" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="e:Manager" id="m"/>"#,
            EMP_NS
        );
        let doc = element(&xml);
        let root = doc.root_element_id().unwrap();
        let rec = ReadRecord::new(&doc, root);
        let d = composite_type(&registry, &rec, root, "Employee", None).unwrap();
        assert_eq!(d.type_name(), "Manager");
        assert_eq!(root_type(&registry, &rec, root).unwrap().type_name(), "Manager");
    }

    #[test]
    fn test_indicator_field_without_subtype_is_fatal() {
        let registry = testing::registry();
        let doc = element(r#"<shape><kind>hexagon</kind></shape>"#);
        let root = doc.root_element_id().unwrap();
        let rec = ReadRecord::new(&doc, root);
        assert!(matches!(
            composite_type(&registry, &rec, root, "Shape", None),
            Err(OxmError::NoSubtypeForIndicator { .. })
        ));

        let doc = element(r#"<shape><kind>circle</kind></shape>"#);
        let root = doc.root_element_id().unwrap();
        let rec = ReadRecord::new(&doc, root);
        let d = composite_type(&registry, &rec, root, "Shape", None).unwrap();
        assert_eq!(d.type_name(), "Circle");
    }

    #[test]
    fn test_abstract_without_indicator() {
        let registry = testing::registry();
        let doc = element(r#"<shape/>"#);
        let root = doc.root_element_id().unwrap();
        let rec = ReadRecord::new(&doc, root);
        assert!(matches!(
            composite_type(&registry, &rec, root, "Shape", None),
            Err(OxmError::AbstractType(_))
        ));
    }

    #[test]
    fn test_any_type_falls_through_to_none() {
        let registry = testing::registry();
        let doc = element(r#"<unknown/>"#);
        let root = doc.root_element_id().unwrap();
        let rec = ReadRecord::new(&doc, root);
        assert!(any_type(&registry, &rec, root, None).is_none());
        assert!(matches!(
            root_type(&registry, &rec, root),
            Err(OxmError::NoDescriptorForElement(_))
        ));
    }
}
