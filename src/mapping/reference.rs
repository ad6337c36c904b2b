//! Object-Reference and Collection-Reference mappings.
//!
//! On read these never assign their attribute. They hand the key values
//! they find to the operation's `ReferenceResolver`, which assigns targets
//! once the whole graph exists. On write they copy the target's primary-key
//! values back into the source key fields.

use super::InitScope;
use crate::container::ContainerPolicy;
use crate::context::{MarshalContext, UnmarshalContext};
use crate::convert::ScalarType;
use crate::error::{OxmError, Result};
use crate::object::ObjectId;
use crate::path::{Lookup, Path};
use crate::record::{ReadRecord, WriteRecord};
use crate::reference::MappingRef;
use crate::value::Value;

/// One source key field and the target primary-key field it holds
#[derive(Debug, Clone)]
pub struct ReferenceKey {
    pub source_xpath: String,
    /// Target primary-key path; `None` pairs keys with primary-key fields
    /// by position
    pub target_xpath: Option<String>,
    pub source: Path,
    /// Index into the target's primary-key fields
    pub field: usize,
    pub scalar: ScalarType,
}

impl ReferenceKey {
    pub fn new(source_xpath: &str, target_xpath: Option<&str>) -> Self {
        ReferenceKey {
            source_xpath: source_xpath.to_string(),
            target_xpath: target_xpath.map(str::to_string),
            source: Path::default(),
            field: 0,
            scalar: ScalarType::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceMapping {
    pub reference_type: String,
    pub keys: Vec<ReferenceKey>,
    pub container: ContainerPolicy,
    /// IDREFS style: all keys of a collection in one whitespace-separated node
    pub uses_single_node: bool,
}

impl ReferenceMapping {
    pub fn new(reference_type: &str, source_xpath: &str) -> Self {
        ReferenceMapping {
            reference_type: reference_type.to_string(),
            keys: vec![ReferenceKey::new(source_xpath, None)],
            container: ContainerPolicy::default(),
            uses_single_node: false,
        }
    }

    pub(crate) fn initialize(&mut self, attribute: &str, scope: &InitScope<'_>) -> Result<()> {
        scope.check_type(&self.reference_type)?;
        let key_fields = scope
            .registry
            .declared(&self.reference_type)
            .map(|d| d.key_fields())
            .unwrap_or_default();
        if key_fields.is_empty() {
            return Err(scope.invalid(
                attribute,
                format!("reference type '{}' has no primary key", self.reference_type),
            ));
        }

        let mut seen = Vec::with_capacity(self.keys.len());
        for (position, key) in self.keys.iter_mut().enumerate() {
            key.source = scope.compile(&key.source_xpath, None)?;
            key.field = match &key.target_xpath {
                Some(target) => key_fields
                    .iter()
                    .position(|f| f.path.expr() == target.trim())
                    .ok_or_else(|| {
                        scope.invalid(attribute, format!("'{}' is not a primary-key field of '{}'", target, self.reference_type))
                    })?,
                None => position,
            };
            let Some(field) = key_fields.get(key.field) else {
                return Err(scope.invalid(
                    attribute,
                    format!("'{}' has fewer primary-key fields than reference keys", self.reference_type),
                ));
            };
            if seen.contains(&key.field) {
                return Err(scope.invalid(attribute, format!("primary-key field '{}' mapped twice", field.path)));
            }
            seen.push(key.field);
            key.scalar = field.scalar;
        }
        Ok(())
    }

    /// Register the key values found under the record with the resolver
    pub fn read(
        &self,
        collection: bool,
        rec: &ReadRecord<'_>,
        owner: ObjectId,
        at: MappingRef,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<()> {
        if collection && !self.uses_single_node {
            return self.read_elements(rec, owner, at, ctx);
        }
        for key in &self.keys {
            let raw: Vec<String> = match rec.get(&key.source) {
                Lookup::Found { value, .. } if collection => value.split_whitespace().map(str::to_string).collect(),
                Lookup::Found { value, .. } => vec![value.trim().to_string()],
                Lookup::NoEntry => Vec::new(),
            };
            let mut values = Vec::with_capacity(raw.len());
            for token in raw.iter().filter(|t| !t.is_empty()) {
                values.push(ctx.conversion.from_text(token, key.scalar)?);
            }
            if !values.is_empty() {
                ctx.resolver
                    .add_key(at, owner, &self.reference_type, key.field, values)?;
            }
        }
        Ok(())
    }

    /// One key tuple per source element. Keys stored on that element are
    /// read from it together; keys on other elements pair up by document
    /// order.
    fn read_elements(
        &self,
        rec: &ReadRecord<'_>,
        owner: ObjectId,
        at: MappingRef,
        ctx: &mut UnmarshalContext<'_>,
    ) -> Result<()> {
        let Some(first) = self.keys.first() else {
            return Ok(());
        };
        let (local, other): (Vec<&ReferenceKey>, Vec<&ReferenceKey>) =
            self.keys.iter().partition(|k| same_element(k, first));

        for node in rec.get_nodes(&first.source) {
            let mut tuple = Vec::with_capacity(local.len());
            for key in &local {
                let text = rec
                    .value_at(node, &key.source)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty());
                let value = match text {
                    Some(text) => Some(ctx.conversion.from_text(&text, key.scalar)?),
                    None => None,
                };
                tuple.push((key.field, value));
            }
            if tuple.iter().any(|(_, v)| v.is_some()) {
                ctx.resolver.add_tuple(at, owner, &self.reference_type, tuple)?;
            }
        }

        for key in other {
            let mut values = Vec::new();
            for text in rec.get_values(&key.source) {
                let text = text.trim();
                if !text.is_empty() {
                    values.push(ctx.conversion.from_text(text, key.scalar)?);
                }
            }
            if !values.is_empty() {
                ctx.resolver
                    .add_key(at, owner, &self.reference_type, key.field, values)?;
            }
        }
        Ok(())
    }

    /// Lexical key value `key` takes from `target`
    fn key_text(&self, key: &ReferenceKey, target: &Value, ctx: &MarshalContext<'_>) -> Result<Option<String>> {
        let Value::Object(id) = target else {
            return Err(OxmError::conversion(target.type_label(), &self.reference_type));
        };
        let fields = ctx.registry.key_fields(&self.reference_type)?;
        let attribute = fields
            .get(key.field)
            .map(|f| f.attribute.as_str())
            .ok_or_else(|| OxmError::MissingPrimaryKey {
                type_name: self.reference_type.clone(),
                field: key.source_xpath.clone(),
            })?;
        match ctx.graph.attribute(*id, attribute) {
            Some(value) if !value.is_null() => ctx.conversion.to_text(value, key.scalar).map(Some),
            _ => Ok(None),
        }
    }

    pub fn write(
        &self,
        collection: bool,
        value: &Value,
        rec: &mut WriteRecord<'_>,
        ctx: &mut MarshalContext<'_>,
    ) -> Result<()> {
        if !collection {
            if value.is_null() {
                return Ok(());
            }
            for key in &self.keys {
                if let Some(text) = self.key_text(key, value, ctx)? {
                    rec.put(&key.source, &text, false);
                }
            }
            return Ok(());
        }

        let targets = self.container.iter(value)?;
        if targets.is_empty() {
            return Ok(());
        }
        if self.uses_single_node {
            for key in &self.keys {
                let mut tokens = Vec::with_capacity(targets.len());
                for target in &targets {
                    tokens.extend(self.key_text(key, target, ctx)?);
                }
                rec.put(&key.source, &tokens.join(" "), false);
            }
            return Ok(());
        }

        let Some(first) = self.keys.first() else {
            return Ok(());
        };
        for target in targets {
            let node = rec.add_nested(&first.source);
            for key in &self.keys {
                let Some(text) = self.key_text(key, target, ctx)? else {
                    continue;
                };
                if same_element(key, first) {
                    rec.write_value(node, &key.source, &text, false);
                } else {
                    rec.add(&key.source, &text, false);
                }
            }
        }
        Ok(())
    }
}

/// Whether two keys are stored on the same element
fn same_element(key: &ReferenceKey, other: &ReferenceKey) -> bool {
    key.source.element_fragments().eq(other.source.element_fragments())
}

#[cfg(test)]
mod tests {
    use crate::config::{MarshalConfig, ReferencePolicy, UnmarshalConfig};
    use crate::context::XmlContext;
    use crate::descriptor::{Descriptor, DescriptorRegistry};
    use crate::mapping::Mapping;
    use crate::object::ObjectGraph;
    use crate::value::Value;

    fn teams() -> XmlContext {
        let registry = DescriptorRegistry::new()
            .with(
                Descriptor::new("Person")
                    .with_primary_key("@first")
                    .with_primary_key("@last")
                    .with_mapping(Mapping::direct("first", "@first"))
                    .with_mapping(Mapping::direct("last", "@last"))
                    .with_mapping(Mapping::direct("nick", "@nick")),
            )
            .with(
                Descriptor::new("Team")
                    .with_default_root("team")
                    .with_mapping(Mapping::composite_collection("people", "person", "Person"))
                    .with_mapping(
                        Mapping::collection_reference("members", "Person", "member/@f")
                            .with_reference_key("member/@l", "@last"),
                    ),
            );
        XmlContext::new(registry).unwrap()
    }

    #[test]
    fn test_multi_key_tuples_stay_per_element() {
        let ctx = teams();
        let xml = r#"<team><person first="C" last="D"/><member l="X"/><member f="C" l="D"/></team>"#;
        let mut graph = ObjectGraph::new();
        let out = ctx
            .unmarshal_str(xml, &mut graph, &UnmarshalConfig::new(ReferencePolicy::Lenient))
            .unwrap();
        let team = out.object().unwrap();

        let Some(Value::List(people)) = graph.attribute(team, "people").cloned() else {
            panic!("people missing");
        };
        assert_eq!(
            graph.attribute(team, "members"),
            Some(&Value::List(vec![people[0].clone()]))
        );
        assert_eq!(out.unresolved.len(), 1);
        assert_eq!(out.unresolved[0].key, vec!["".to_string(), "X".to_string()]);

        let written = ctx
            .marshal_to_string(&graph, &out.root, &MarshalConfig::default().with_declaration(false))
            .unwrap();
        assert_eq!(
            written,
            r#"<team><person first="C" last="D"/><member f="C" l="D"/></team>"#
        );
    }

    #[test]
    fn test_first_object_wins_on_duplicate_key() {
        let ctx = teams();
        let xml = r#"<team><person first="A" last="B" nick="one"/><person first="A" last="B" nick="two"/><member f="A" l="B"/></team>"#;
        let mut graph = ObjectGraph::new();
        let out = ctx
            .unmarshal_str(xml, &mut graph, &UnmarshalConfig::new(ReferencePolicy::Strict))
            .unwrap();
        let team = out.object().unwrap();
        let Some(Value::List(members)) = graph.attribute(team, "members") else {
            panic!("members missing");
        };
        let target = members[0].as_object().unwrap();
        assert_eq!(graph.attribute(target, "nick"), Some(&Value::from("one")));
    }

    #[test]
    fn test_failed_strict_resolution_leaves_graph_untouched() {
        let ctx = teams();
        let mut graph = ObjectGraph::new();
        let existing = graph.create("Person");
        let xml = r#"<team><person first="C" last="D"/><member f="C" l="Z"/></team>"#;
        assert!(ctx
            .unmarshal_str(xml, &mut graph, &UnmarshalConfig::new(ReferencePolicy::Strict))
            .is_err());
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.type_of(existing), Some("Person"));
    }
}
