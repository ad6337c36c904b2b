//! Fragment mappings: a whole element subtree as an opaque value.

use super::InitScope;
use crate::container::ContainerPolicy;
use crate::context::UnmarshalContext;
use crate::error::{OxmError, Result};
use crate::path::Path;
use crate::record::{ReadRecord, WriteRecord};
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct FragmentMapping {
    pub container: ContainerPolicy,
}

pub(crate) fn check_path(attribute: &str, path: &Path, scope: &InitScope<'_>) -> Result<()> {
    if path.last_element().is_none() || path.is_attribute() || path.is_text() {
        return Err(scope.invalid(attribute, "fragment path must name an element"));
    }
    Ok(())
}

impl FragmentMapping {
    /// The first addressed element, detached with its namespaces declared
    pub fn read_object(&self, path: &Path, rec: &ReadRecord<'_>) -> Result<Option<Value>> {
        Ok(rec
            .get_nodes(path)
            .first()
            .map(|&node| Value::Element(rec.tree().extract_element(node))))
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
            let element = Value::Element(rec.tree().extract_element(node));
            self.container.add(&mut container, element, ctx.graph())?;
        }
        Ok(container)
    }

    /// The element is imported as is, under the parent of the addressed node
    pub fn write_object(&self, path: &Path, value: &Value, rec: &mut WriteRecord<'_>) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            Value::Element(element) => {
                let parent = rec.create_parent(path);
                rec.tree_mut().import_element(parent, element);
                Ok(())
            }
            other => Err(OxmError::conversion(other.type_label(), "element")),
        }
    }

    pub fn write_collection(&self, path: &Path, value: &Value, rec: &mut WriteRecord<'_>) -> Result<()> {
        for item in self.container.iter(value)? {
            self.write_object(path, item, rec)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{MarshalConfig, ReferencePolicy, UnmarshalConfig};
    use crate::context::XmlContext;
    use crate::descriptor::{Descriptor, DescriptorRegistry};
    use crate::error::OxmError;
    use crate::mapping::Mapping;
    use crate::object::ObjectGraph;
    use crate::value::Value;

    fn holder() -> Descriptor {
        Descriptor::new("Holder")
            .with_default_root("holder")
            .with_mapping(Mapping::fragment("body", "body"))
            .with_mapping(Mapping::fragment_collection("parts", "part"))
    }

    #[test]
    fn test_fragments_round_trip() {
        let ctx = XmlContext::new(DescriptorRegistry::new().with(holder())).unwrap();
        let xml = r#"<holder><body xmlns:x="urn:x"><x:p>t</x:p></body><part a="1"/><part a="2"/></holder>"#;
        let config = UnmarshalConfig::new(ReferencePolicy::Strict);
        let mut graph = ObjectGraph::new();
        let id = ctx.unmarshal_str(xml, &mut graph, &config).unwrap().object().unwrap();

        let Some(Value::Element(body)) = graph.attribute(id, "body") else {
            panic!("body is not an element");
        };
        assert_eq!(body.local_name, "body");
        let p = body.child_elements().next().unwrap();
        assert_eq!(p.namespace.as_deref(), Some("urn:x"));
        assert_eq!(p.text(), "t");

        let Some(Value::List(parts)) = graph.attribute(id, "parts") else {
            panic!("parts is not a list");
        };
        let values: Vec<_> = parts
            .iter()
            .map(|v| match v {
                Value::Element(e) => e.attribute(None, "a").unwrap_or("").to_string(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(values, vec!["1", "2"]);

        let written = ctx
            .marshal_to_string(&graph, &Value::Object(id), &MarshalConfig::default())
            .unwrap();
        let mut again = ObjectGraph::new();
        let back = ctx.unmarshal_str(&written, &mut again, &config).unwrap().object().unwrap();
        assert_eq!(again.attribute(back, "body"), graph.attribute(id, "body"));
        assert_eq!(again.attribute(back, "parts"), graph.attribute(id, "parts"));
    }

    #[test]
    fn test_fragment_needs_element_path() {
        for xpath in ["@x", "body/text()"] {
            let mut registry = DescriptorRegistry::new()
                .with(Descriptor::new("Holder").with_mapping(Mapping::fragment("body", xpath)));
            assert!(matches!(
                registry.initialize(),
                Err(OxmError::InvalidMapping { .. })
            ));
        }
    }

    #[test]
    fn test_wrong_value_kind() {
        let ctx = XmlContext::new(DescriptorRegistry::new().with(holder())).unwrap();
        let mut graph = ObjectGraph::new();
        let id = graph.create("Holder");
        graph.set_attribute(id, "body", Value::from("text"));
        assert!(matches!(
            ctx.marshal_to_string(&graph, &Value::Object(id), &MarshalConfig::default()),
            Err(OxmError::Conversion { .. })
        ));
    }
}
