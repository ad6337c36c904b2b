//! Transformation mappings: user code builds the attribute from several
//! field values on read, and each field value from the object on write.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::InitScope;
use crate::context::MarshalContext;
use crate::error::{OxmError, Result};
use crate::object::{Object, ObjectId};
use crate::path::Path;
use crate::record::{ReadRecord, WriteRecord};
use crate::value::Value;

/// Field text by path expression; `None` for an absent node
pub type FieldValues = IndexMap<String, Option<String>>;

/// Read side: field values -> attribute value
pub trait AttributeTransformer: Send + Sync {
    fn build_attribute_value(&self, fields: &FieldValues) -> Result<Value>;
}

/// Write side: object -> text for one field (`None` writes nothing)
pub trait FieldTransformer: Send + Sync {
    fn build_field_value(&self, object: &Object, xpath: &str) -> Result<Option<String>>;
}

impl<F> AttributeTransformer for F
where
    F: Fn(&FieldValues) -> Result<Value> + Send + Sync,
{
    fn build_attribute_value(&self, fields: &FieldValues) -> Result<Value> {
        self(fields)
    }
}

impl<F> FieldTransformer for F
where
    F: Fn(&Object, &str) -> Result<Option<String>> + Send + Sync,
{
    fn build_field_value(&self, object: &Object, xpath: &str) -> Result<Option<String>> {
        self(object, xpath)
    }
}

#[derive(Clone)]
pub struct TransformationField {
    pub xpath: String,
    pub path: Path,
    pub transformer: Arc<dyn FieldTransformer>,
}

#[derive(Clone)]
pub struct TransformationMapping {
    attribute_transformer: Option<Arc<dyn AttributeTransformer>>,
    pub fields: Vec<TransformationField>,
}

impl fmt::Debug for TransformationMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformationMapping")
            .field("attribute_transformer", &self.attribute_transformer.is_some())
            .field(
                "fields",
                &self.fields.iter().map(|x| x.xpath.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl TransformationMapping {
    pub fn new(attribute_transformer: Option<Arc<dyn AttributeTransformer>>) -> Self {
        TransformationMapping {
            attribute_transformer,
            fields: Vec::new(),
        }
    }

    pub fn add_field(&mut self, xpath: &str, transformer: Arc<dyn FieldTransformer>) {
        self.fields.push(TransformationField {
            xpath: xpath.to_string(),
            path: Path::default(),
            transformer,
        });
    }

    pub(crate) fn initialize(&mut self, attribute: &str, scope: &InitScope<'_>) -> Result<()> {
        if self.fields.is_empty() {
            return Err(scope.invalid(attribute, "transformation has no fields"));
        }
        for field in &mut self.fields {
            field.path = scope.compile(&field.xpath, None)?;
        }
        Ok(())
    }

    /// `None` when there is no attribute transformer (write-only mapping)
    pub fn read(&self, rec: &ReadRecord<'_>) -> Result<Option<Value>> {
        let Some(transformer) = &self.attribute_transformer else {
            return Ok(None);
        };
        let values: FieldValues = self
            .fields
            .iter()
            .map(|f| (f.xpath.clone(), rec.get(&f.path).value().map(str::to_string)))
            .collect();
        transformer.build_attribute_value(&values).map(Some)
    }

    pub fn write(&self, owner: ObjectId, rec: &mut WriteRecord<'_>, ctx: &mut MarshalContext<'_>) -> Result<()> {
        let object = ctx
            .graph
            .get(owner)
            .ok_or_else(|| OxmError::UnknownType(format!("object#{}", owner)))?;
        for field in &self.fields {
            if let Some(text) = field.transformer.build_field_value(object, &field.xpath)? {
                rec.put(&field.path, &text, false);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closures_are_transformers() {
        let join: Arc<dyn AttributeTransformer> = Arc::new(|fields: &FieldValues| -> Result<Value> {
            let parts: Vec<&str> = fields.values().flatten().map(String::as_str).collect();
            Ok(Value::from(parts.join(" ")))
        });
        let mut fields = FieldValues::new();
        fields.insert("first/text()".into(), Some("Ada".into()));
        fields.insert("last/text()".into(), Some("Lovelace".into()));
        fields.insert("middle/text()".into(), None);
        assert_eq!(
            join.build_attribute_value(&fields).unwrap(),
            Value::from("Ada Lovelace")
        );

        let first: Arc<dyn FieldTransformer> =
            Arc::new(|object: &Object, _xpath: &str| -> Result<Option<String>> {
                Ok(object.get("name").and_then(Value::as_str).map(|s| s.to_uppercase()))
            });
        let mut object = Object::new("Person");
        object.set("name", Value::from("ada"));
        assert_eq!(
            first.build_field_value(&object, "x/text()").unwrap(),
            Some("ADA".to_string())
        );
    }

    #[test]
    fn test_two_fields_one_attribute_round_trip() {
        use crate::config::{MarshalConfig, ReferencePolicy, UnmarshalConfig};
        use crate::context::XmlContext;
        use crate::descriptor::{Descriptor, DescriptorRegistry};
        use crate::mapping::Mapping;
        use crate::object::ObjectGraph;

        let join: Arc<dyn AttributeTransformer> = Arc::new(|fields: &FieldValues| -> Result<Value> {
            let parts: Vec<&str> = fields.values().flatten().map(String::as_str).collect();
            Ok(Value::from(parts.join(" ")))
        });
        let split: Arc<dyn FieldTransformer> =
            Arc::new(|object: &Object, xpath: &str| -> Result<Option<String>> {
                let Some(full) = object.get("full_name").and_then(Value::as_str) else {
                    return Ok(None);
                };
                let (first, last) = full.split_once(' ').unwrap_or((full, ""));
                let part = if xpath.starts_with("first") { first } else { last };
                Ok(Some(part.to_string()).filter(|p| !p.is_empty()))
            });
        let registry = DescriptorRegistry::new().with(
            Descriptor::new("Person").with_default_root("person").with_mapping(
                Mapping::transformation("full_name", join)
                    .with_field_transformer("first/text()", split.clone())
                    .with_field_transformer("last/text()", split),
            ),
        );
        let ctx = XmlContext::new(registry).unwrap();

        let xml = "<person><first>Ada</first><last>Lovelace</last></person>";
        let mut graph = ObjectGraph::new();
        let out = ctx
            .unmarshal_str(xml, &mut graph, &UnmarshalConfig::new(ReferencePolicy::Strict))
            .unwrap();
        let person = out.object().unwrap();
        assert_eq!(graph.attribute(person, "full_name"), Some(&Value::from("Ada Lovelace")));

        let config = MarshalConfig::default().with_declaration(false);
        assert_eq!(ctx.marshal_to_string(&graph, &out.root, &config).unwrap(), xml);

        graph.set_attribute(person, "full_name", Value::from("Grace"));
        assert_eq!(
            ctx.marshal_to_string(&graph, &out.root, &config).unwrap(),
            "<person><first>Grace</first></person>"
        );
    }
}
