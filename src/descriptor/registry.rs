//! Descriptor registry
//!
//! Holds every descriptor and the lookups the engine needs at run time:
//! type name, global element name, global schema type and primary key.
//! `initialize` runs once; afterwards the registry is read-only and can be
//! shared between threads.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use super::{Descriptor, InheritancePolicy, KeyField, TypeIndicator};
use crate::dom::NamespaceResolver;
use crate::error::{OxmError, Result};
use crate::mapping::{self, InitScope, Mapping, MappingKind};
use crate::path::{Path, PathCache};
use crate::qname::{split_prefixed, QName};
use crate::reference::MappingRef;

#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    descriptors: IndexMap<String, Descriptor>,
    by_root: HashMap<QName, usize>,
    by_schema_type: HashMap<QName, usize>,
    cache: PathCache,
    initialized: bool,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Registering (or replacing) one after
    /// `initialize` requires initializing again.
    pub fn add(&mut self, descriptor: Descriptor) -> &mut Self {
        self.descriptors
            .insert(descriptor.type_name().to_string(), descriptor);
        self.initialized = false;
        self
    }

    pub fn with(mut self, descriptor: Descriptor) -> Self {
        self.add(descriptor);
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn path_cache(&self) -> &PathCache {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    /// Resolve names, flatten inheritance, compile every mapping and compute
    /// Any-content exclusions. All configuration errors surface here.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.by_root.clear();
        self.by_schema_type.clear();

        let chains = self.ancestor_chains()?;
        for (index, chain) in chains.iter().enumerate() {
            self.flatten(index, chain)?;
        }
        for index in 0..self.descriptors.len() {
            self.resolve_names(index)?;
        }
        for index in 0..self.descriptors.len() {
            self.resolve_key_fields(index)?;
        }
        for index in 0..self.descriptors.len() {
            self.initialize_mappings(index)?;
        }

        self.initialized = true;
        debug!(descriptors = self.descriptors.len(), "descriptor registry initialized");
        Ok(())
    }

    /// Per descriptor, the indices of its ancestors (root first) and itself
    fn ancestor_chains(&self) -> Result<Vec<Vec<usize>>> {
        let mut chains = Vec::with_capacity(self.descriptors.len());
        for (index, descriptor) in self.descriptors.values().enumerate() {
            let mut chain = vec![index];
            let mut seen = HashSet::from([index]);
            let mut current = descriptor;
            while let Some(parent) = current.parent() {
                let parent_index = self
                    .descriptors
                    .get_index_of(parent)
                    .ok_or_else(|| OxmError::UnknownType(parent.to_string()))?;
                if !seen.insert(parent_index) {
                    return Err(OxmError::invalid_mapping(
                        descriptor.type_name(),
                        "",
                        format!("inheritance cycle through '{}'", parent),
                    ));
                }
                chain.push(parent_index);
                current = &self.descriptors[parent_index];
            }
            chain.reverse();
            chains.push(chain);
        }
        Ok(chains)
    }

    /// Inherited prefix table, mappings and primary key
    fn flatten(&mut self, index: usize, chain: &[usize]) -> Result<()> {
        let mut namespaces = NamespaceResolver::new();
        let mut mappings: Vec<Mapping> = Vec::new();
        let mut primary_key: Option<Vec<String>> = None;
        for (depth, &ancestor) in chain.iter().enumerate() {
            let d = &self.descriptors[ancestor];
            if depth > 0 {
                namespaces.push_scope();
            }
            let mut bindings: Vec<(&str, &str)> = d.declared_namespaces().active_bindings().collect();
            bindings.reverse();
            for (prefix, uri) in bindings {
                namespaces.declare(prefix, uri);
            }
            mappings.extend(d.declared_mappings().iter().cloned());
            if !d.primary_key_paths().is_empty() {
                primary_key = Some(d.primary_key_paths().to_vec());
            }
        }
        let descriptor = &mut self.descriptors[index];
        descriptor.namespaces = namespaces;
        descriptor.mappings = mappings;
        if let Some(pk) = primary_key {
            descriptor.primary_key = pk;
        }
        Ok(())
    }

    fn resolve_names(&mut self, index: usize) -> Result<()> {
        let descriptor = &self.descriptors[index];
        let resolve = |lexical: &str| -> Result<(QName, Option<String>)> {
            let (prefix, local) = split_prefixed(lexical);
            let namespace = match prefix {
                Some(p) => Some(descriptor.namespaces.resolve(p).ok_or_else(|| {
                    OxmError::UnresolvedPrefix {
                        prefix: p.to_string(),
                        path: lexical.to_string(),
                    }
                })?),
                None => descriptor.namespaces.resolve_default(),
            };
            Ok((QName::new(namespace, local), prefix.map(str::to_string)))
        };
        let root = descriptor.default_root_lexical().map(resolve).transpose()?;
        let schema = descriptor.schema_type_lexical().map(resolve).transpose()?;

        let descriptor = &mut self.descriptors[index];
        if let Some((name, prefix)) = root {
            self.by_root.entry(name.clone()).or_insert(index);
            descriptor.root_name = Some(name);
            descriptor.root_prefix = prefix;
        }
        if let Some((name, _)) = schema {
            self.by_schema_type.entry(name.clone()).or_insert(index);
            descriptor.schema_qname = Some(name);
        }
        Ok(())
    }

    /// Match each primary-key path to the direct mapping that holds it
    fn resolve_key_fields(&mut self, index: usize) -> Result<()> {
        let descriptor = &self.descriptors[index];
        let mut key_fields = Vec::with_capacity(descriptor.primary_key_paths().len());
        for xpath in descriptor.primary_key_paths() {
            let path = Path::compile(xpath, None, &descriptor.namespaces, &self.cache)?;
            let mut found = None;
            for m in &descriptor.mappings {
                if let (MappingKind::Direct(direct), Some(source)) = (m.kind(), m.xpath()) {
                    let candidate = Path::compile(source, None, &descriptor.namespaces, &self.cache)?;
                    if candidate.fragments() == path.fragments() {
                        found = Some(KeyField {
                            path: candidate,
                            attribute: m.attribute().to_string(),
                            scalar: direct.scalar,
                        });
                        break;
                    }
                }
            }
            key_fields.push(found.ok_or_else(|| OxmError::MissingPrimaryKey {
                type_name: descriptor.type_name().to_string(),
                field: xpath.clone(),
            })?);
        }
        self.descriptors[index].key_fields = key_fields;
        Ok(())
    }

    fn initialize_mappings(&mut self, index: usize) -> Result<()> {
        let mut mappings = std::mem::take(&mut self.descriptors[index].mappings);
        let mut inheritance = self.descriptors[index].inheritance().cloned();
        let result = self.compile_mappings(index, &mut mappings, inheritance.as_mut());
        let descriptor = &mut self.descriptors[index];
        descriptor.mappings = mappings;
        if let (Some(compiled), Some(slot)) = (inheritance, descriptor.inheritance_mut()) {
            *slot = compiled;
        }
        result
    }

    fn compile_mappings(
        &self,
        index: usize,
        mappings: &mut [Mapping],
        inheritance: Option<&mut InheritancePolicy>,
    ) -> Result<()> {
        let descriptor = &self.descriptors[index];
        let scope = InitScope {
            registry: self,
            type_name: descriptor.type_name(),
            namespaces: &descriptor.namespaces,
            cache: &self.cache,
        };
        for m in mappings.iter_mut() {
            m.initialize(&scope)?;
        }

        if let Some(policy) = inheritance {
            if let TypeIndicator::Field(xpath) = policy.indicator() {
                let path = Path::compile(xpath, None, &descriptor.namespaces, &self.cache)?;
                policy.set_path(path);
            }
            for (_, type_name) in policy.values.iter() {
                if !self.descriptors.contains_key(type_name) {
                    return Err(OxmError::UnknownType(type_name.clone()));
                }
            }
        }

        // an inherited indicator field is claimed like any mapped path
        let mut claimed = Vec::new();
        if let Some(TypeIndicator::Field(xpath)) =
            self.inheritance_for(descriptor.type_name()).map(InheritancePolicy::indicator)
        {
            claimed.push(Path::compile(xpath, None, &descriptor.namespaces, &self.cache)?);
        }
        mapping::compute_exclusions(mappings, &claimed);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    fn check_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(OxmError::NotInitialized)
        }
    }

    pub fn descriptor(&self, type_name: &str) -> Result<&Descriptor> {
        self.check_initialized()?;
        self.descriptors
            .get(type_name)
            .ok_or_else(|| OxmError::UnknownType(type_name.to_string()))
    }

    pub fn descriptor_index(&self, type_name: &str) -> Option<usize> {
        self.descriptors.get_index_of(type_name)
    }

    pub fn descriptor_at(&self, index: usize) -> Result<&Descriptor> {
        self.check_initialized()?;
        self.descriptors
            .get_index(index)
            .map(|(_, d)| d)
            .ok_or_else(|| OxmError::UnknownType(format!("#{}", index)))
    }

    /// Uninitialized lookup used while mappings are being compiled
    pub(crate) fn declared(&self, type_name: &str) -> Option<&Descriptor> {
        self.descriptors.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.descriptors.contains_key(type_name)
    }

    pub fn by_root_element(&self, name: &QName) -> Option<&Descriptor> {
        self.by_root.get(name).and_then(|&i| self.descriptors.get_index(i)).map(|(_, d)| d)
    }

    pub fn by_schema_type(&self, name: &QName) -> Option<&Descriptor> {
        self.by_schema_type
            .get(name)
            .and_then(|&i| self.descriptors.get_index(i))
            .map(|(_, d)| d)
    }

    pub fn key_fields(&self, type_name: &str) -> Result<&[KeyField]> {
        Ok(self.descriptor(type_name)?.key_fields())
    }

    pub fn mapping(&self, at: MappingRef) -> Result<&Mapping> {
        let descriptor = self.descriptor_at(at.descriptor)?;
        descriptor
            .mappings()
            .get(at.mapping)
            .ok_or_else(|| OxmError::UnknownType(format!("{}#{}", descriptor.type_name(), at.mapping)))
    }

    /// `sub` is `base` or inherits from it
    pub fn is_subtype_of(&self, sub: &str, base: &str) -> bool {
        let mut current = Some(sub);
        let mut steps = 0;
        while let Some(name) = current {
            if name == base {
                return true;
            }
            steps += 1;
            if steps > self.descriptors.len() {
                return false;
            }
            current = self.descriptors.get(name).and_then(Descriptor::parent);
        }
        false
    }

    /// Inheritance policy governing `type_name`: its own or the nearest
    /// ancestor's
    pub fn inheritance_for(&self, type_name: &str) -> Option<&InheritancePolicy> {
        let mut current = self.descriptors.get(type_name);
        let mut steps = 0;
        while let Some(d) = current {
            if let Some(policy) = d.inheritance() {
                return Some(policy);
            }
            steps += 1;
            if steps > self.descriptors.len() {
                return None;
            }
            current = d.parent().and_then(|p| self.descriptors.get(p));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Mapping;
    use crate::testing;

    #[test]
    fn test_lookups_after_initialize() {
        let registry = testing::registry();
        let emp = registry.descriptor("Employee").unwrap();
        assert_eq!(
            emp.default_root(),
            Some(&QName::new(Some(testing::EMP_NS), "employee"))
        );
        assert_eq!(emp.key_fields()[0].attribute, "id");
        assert!(registry
            .by_root_element(&QName::new(Some(testing::EMP_NS), "employee"))
            .is_some());
        assert!(registry.is_subtype_of("Manager", "Employee"));
        assert!(!registry.is_subtype_of("Employee", "Manager"));
    }

    #[test]
    fn test_subtype_inherits_mappings_and_key() {
        let registry = testing::registry();
        let manager = registry.descriptor("Manager").unwrap();
        assert!(manager.mappings().iter().any(|m| m.attribute() == "name"));
        assert!(manager.mappings().iter().any(|m| m.attribute() == "reports"));
        assert_eq!(manager.key_fields().len(), 1);
    }

    #[test]
    fn test_not_initialized() {
        let registry = DescriptorRegistry::new().with(Descriptor::new("A"));
        assert!(matches!(registry.descriptor("A"), Err(OxmError::NotInitialized)));
    }

    #[test]
    fn test_configuration_errors_at_initialize() {
        let mut registry = DescriptorRegistry::new()
            .with(Descriptor::new("A").with_mapping(Mapping::direct("name", "x:name/text()")));
        assert!(matches!(
            registry.initialize(),
            Err(OxmError::UnresolvedPrefix { .. })
        ));

        let mut registry = DescriptorRegistry::new().with(Descriptor::new("B").with_parent("Missing"));
        assert!(matches!(registry.initialize(), Err(OxmError::UnknownType(_))));

        let mut registry = DescriptorRegistry::new().with(
            Descriptor::new("C")
                .with_mapping(Mapping::direct("name", "name/text()"))
                .with_primary_key("@id"),
        );
        assert!(matches!(
            registry.initialize(),
            Err(OxmError::MissingPrimaryKey { .. })
        ));
    }
}
