//! Reference Resolution
//!
//! Object and collection reference mappings cannot assign their attribute
//! while the document is still being read: the target may not exist yet.
//! They record the key values they saw in a [`ReferenceResolver`] instead,
//! and the resolver assigns targets once the whole graph is built.
//!
//! The resolver is a small state machine, `Collecting -> Resolving -> Done`,
//! owned by exactly one unmarshal call.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use tracing::trace;

use crate::descriptor::DescriptorRegistry;
use crate::error::{OxmError, Result};
use crate::mapping::MappingKind;
use crate::object::{ObjectGraph, ObjectId};
use crate::value::Value;

/// Address of a mapping inside an initialized registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MappingRef {
    pub descriptor: usize,
    pub mapping: usize,
}

/// Pending link from one source object to its target(s)
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub mapping: MappingRef,
    pub source: ObjectId,
    pub target_type: String,
    /// Gathered key values per target primary-key field index. `None`
    /// holds the place of a field missing from one source element.
    pub keys: IndexMap<usize, Vec<Option<Value>>>,
}

impl Reference {
    /// Key tuples in token order. Field `f` of tuple `j` is the `j`-th value
    /// gathered for field `f`; a tuple with a missing field is partial.
    fn key_tuples(&self, field_count: usize) -> Vec<Vec<Option<String>>> {
        let count = self.keys.values().map(Vec::len).max().unwrap_or(0);
        (0..count)
            .map(|j| {
                (0..field_count)
                    .map(|f| {
                        self.keys
                            .get(&f)
                            .and_then(|values| values.get(j))
                            .and_then(Option::as_ref)
                            .and_then(Value::key_string)
                    })
                    .collect()
            })
            .collect()
    }
}

/// A key that matched no object of the target type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub source: ObjectId,
    pub source_type: String,
    pub attribute: String,
    pub target_type: String,
    pub key: Vec<String>,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}.{} -> {}[{}]",
            self.source_type,
            self.source,
            self.attribute,
            self.target_type,
            self.key.join(",")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Collecting,
    Resolving,
    Done,
}

impl ResolverState {
    fn label(self) -> &'static str {
        match self {
            ResolverState::Collecting => "collecting",
            ResolverState::Resolving => "resolving",
            ResolverState::Done => "done",
        }
    }
}

/// Per-operation store of pending references
#[derive(Debug)]
pub struct ReferenceResolver {
    state: ResolverState,
    references: IndexMap<(MappingRef, ObjectId), Reference>,
}

impl Default for ReferenceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceResolver {
    pub fn new() -> Self {
        ReferenceResolver {
            state: ResolverState::Collecting,
            references: IndexMap::new(),
        }
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.references.values()
    }

    fn expect_state(&self, expected: ResolverState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(OxmError::ResolverState {
                actual: self.state.label(),
                expected: expected.label(),
            })
        }
    }

    fn pending(&mut self, mapping: MappingRef, source: ObjectId, target_type: &str) -> &mut Reference {
        self.references
            .entry((mapping, source))
            .or_insert_with(|| Reference {
                mapping,
                source,
                target_type: target_type.to_string(),
                keys: IndexMap::new(),
            })
    }

    /// Record key values for one target key field. A second call for the
    /// same (mapping, source) pair merges into the existing reference.
    pub fn add_key(
        &mut self,
        mapping: MappingRef,
        source: ObjectId,
        target_type: &str,
        field: usize,
        values: Vec<Value>,
    ) -> Result<()> {
        self.expect_state(ResolverState::Collecting)?;
        trace!(
            source,
            target_type,
            field,
            count = values.len(),
            "registering reference key"
        );
        let reference = self.pending(mapping, source, target_type);
        reference
            .keys
            .entry(field)
            .or_default()
            .extend(values.into_iter().map(Some));
        Ok(())
    }

    /// Record one key tuple read from a single source element. Every field
    /// of `tuple` grows by one value, so later tuples stay aligned even when
    /// this one is partial.
    pub fn add_tuple(
        &mut self,
        mapping: MappingRef,
        source: ObjectId,
        target_type: &str,
        tuple: Vec<(usize, Option<Value>)>,
    ) -> Result<()> {
        self.expect_state(ResolverState::Collecting)?;
        let reference = self.pending(mapping, source, target_type);
        for (field, value) in tuple {
            reference.keys.entry(field).or_default().push(value);
        }
        Ok(())
    }

    /// Assign every pending reference against `candidates` (the objects built
    /// by this operation). Keys that match nothing are returned, not raised.
    pub fn resolve(
        &mut self,
        registry: &DescriptorRegistry,
        graph: &mut ObjectGraph,
        candidates: &[ObjectId],
    ) -> Result<Vec<UnresolvedReference>> {
        self.expect_state(ResolverState::Collecting)?;
        self.state = ResolverState::Resolving;

        let mut indexes: HashMap<String, HashMap<Vec<String>, ObjectId>> = HashMap::new();
        let mut unresolved = Vec::new();

        for reference in self.references.values() {
            let mapping = registry.mapping(reference.mapping)?;
            let field_count = registry.key_fields(&reference.target_type)?.len();
            if !indexes.contains_key(&reference.target_type) {
                let index = build_index(registry, graph, candidates, &reference.target_type)?;
                indexes.insert(reference.target_type.clone(), index);
            }
            let index = indexes
                .get(&reference.target_type)
                .ok_or_else(|| OxmError::UnknownType(reference.target_type.clone()))?;

            let mut targets = Vec::new();
            for tuple in reference.key_tuples(field_count) {
                let complete: Option<Vec<String>> = tuple.iter().cloned().collect();
                match complete.as_ref().and_then(|key| index.get(key)) {
                    Some(&target) => {
                        trace!(source = reference.source, target, "resolved reference");
                        targets.push(target);
                    }
                    None => unresolved.push(UnresolvedReference {
                        source: reference.source,
                        source_type: graph
                            .type_of(reference.source)
                            .unwrap_or_default()
                            .to_string(),
                        attribute: mapping.attribute().to_string(),
                        target_type: reference.target_type.clone(),
                        key: tuple.into_iter().map(Option::unwrap_or_default).collect(),
                    }),
                }
            }

            match mapping.kind() {
                MappingKind::ObjectReference(_) => {
                    if let Some(&target) = targets.first() {
                        graph.set_attribute(reference.source, mapping.attribute(), Value::Object(target));
                    }
                }
                MappingKind::CollectionReference(r) => {
                    let mut container = r.container.sized(targets.len());
                    for target in targets {
                        r.container.add(&mut container, Value::Object(target), graph)?;
                    }
                    graph.set_attribute(reference.source, mapping.attribute(), container);
                }
                _ => {
                    return Err(OxmError::InvalidMappingOperation {
                        operation: "resolve",
                        kind: mapping.kind_label(),
                        attribute: mapping.attribute().to_string(),
                    })
                }
            }
        }

        self.state = ResolverState::Done;
        Ok(unresolved)
    }
}

/// Primary-key tuple -> object, over candidates of `target_type` or a subtype
fn build_index(
    registry: &DescriptorRegistry,
    graph: &ObjectGraph,
    candidates: &[ObjectId],
    target_type: &str,
) -> Result<HashMap<Vec<String>, ObjectId>> {
    let fields = registry.key_fields(target_type)?;
    let mut index = HashMap::new();
    for &id in candidates {
        let Some(type_name) = graph.type_of(id) else {
            continue;
        };
        if !registry.is_subtype_of(type_name, target_type) {
            continue;
        }
        let key: Option<Vec<String>> = fields
            .iter()
            .map(|f| graph.attribute(id, &f.attribute).and_then(Value::key_string))
            .collect();
        if let Some(key) = key {
            // first object wins on duplicate keys
            index.entry(key).or_insert(id);
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn mref() -> MappingRef {
        MappingRef {
            descriptor: 0,
            mapping: 0,
        }
    }

    #[test]
    fn test_keys_merge_for_same_source() {
        let mut resolver = ReferenceResolver::new();
        resolver.add_key(mref(), 1, "Emp", 0, vec![Value::from("a")]).unwrap();
        resolver.add_key(mref(), 1, "Emp", 1, vec![Value::from("b")]).unwrap();
        resolver.add_key(mref(), 2, "Emp", 0, vec![Value::from("c")]).unwrap();
        assert_eq!(resolver.len(), 2);
        let first = resolver.references().next().unwrap();
        assert_eq!(first.keys.len(), 2);
        assert_eq!(
            first.key_tuples(2),
            vec![vec![Some("a".to_string()), Some("b".to_string())]]
        );
    }

    #[test]
    fn test_partial_tuple_keeps_alignment() {
        let mut resolver = ReferenceResolver::new();
        resolver
            .add_tuple(mref(), 1, "Person", vec![(0, None), (1, Some(Value::from("X")))])
            .unwrap();
        resolver
            .add_tuple(mref(), 1, "Person", vec![(0, Some(Value::from("C"))), (1, Some(Value::from("D")))])
            .unwrap();
        let reference = resolver.references().next().unwrap();
        assert_eq!(
            reference.key_tuples(2),
            vec![
                vec![None, Some("X".to_string())],
                vec![Some("C".to_string()), Some("D".to_string())],
            ]
        );
    }

    #[test]
    fn test_state_machine() {
        let registry = testing::registry();
        let mut graph = ObjectGraph::new();
        let mut resolver = ReferenceResolver::new();
        assert_eq!(resolver.state(), ResolverState::Collecting);
        resolver.resolve(&registry, &mut graph, &[]).unwrap();
        assert_eq!(resolver.state(), ResolverState::Done);

        let err = resolver.add_key(mref(), 0, "Emp", 0, Vec::new()).unwrap_err();
        assert!(matches!(err, OxmError::ResolverState { actual: "done", .. }));
        assert!(resolver.resolve(&registry, &mut graph, &[]).is_err());
    }

    #[test]
    fn test_unresolved_display() {
        let u = UnresolvedReference {
            source: 3,
            source_type: "Project".into(),
            attribute: "lead".into(),
            target_type: "Employee".into(),
            key: vec!["e9".into()],
        };
        assert_eq!(u.to_string(), "Project#3.lead -> Employee[e9]");
    }
}
