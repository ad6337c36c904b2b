//! Parallel batch operations
//!
//! Uses Rayon over independent documents. Each document gets its own
//! operation context and reference resolver, so the only shared state is
//! the read-only registry.

use rayon::prelude::*;

use crate::config::{MarshalConfig, UnmarshalConfig};
use crate::context::{Unmarshalled, XmlContext};
use crate::error::Result;
use crate::object::ObjectGraph;
use crate::value::Value;

impl XmlContext {
    /// Marshal each (graph, root) pair in parallel, results in input order
    pub fn marshal_batch(&self, jobs: &[(&ObjectGraph, Value)], config: &MarshalConfig) -> Vec<Result<String>> {
        jobs.par_iter()
            .map(|(graph, root)| self.marshal_to_string(graph, root, config))
            .collect()
    }

    /// Unmarshal each document into a graph of its own
    pub fn unmarshal_batch(
        &self,
        documents: &[&str],
        config: &UnmarshalConfig,
    ) -> Vec<Result<(ObjectGraph, Unmarshalled)>> {
        documents
            .par_iter()
            .map(|xml| {
                let mut graph = ObjectGraph::new();
                let out = self.unmarshal_str(xml, &mut graph, config)?;
                Ok((graph, out))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReferencePolicy;
    use crate::error::OxmError;
    use crate::testing;

    #[test]
    fn test_unmarshal_batch() {
        let ctx = XmlContext::new(testing::descriptors()).unwrap();
        let docs = [
            "<contact><name>a</name></contact>",
            "<nope/>",
            "<contact><name>b</name><age>7</age></contact>",
        ];
        let results = ctx.unmarshal_batch(&docs, &UnmarshalConfig::new(ReferencePolicy::Strict));
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(OxmError::NoDescriptorForElement(_))));

        let (graph, out) = results[2].as_ref().unwrap();
        let id = out.object().unwrap();
        assert_eq!(graph.attribute(id, "age"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_marshal_batch() {
        let ctx = XmlContext::new(testing::descriptors()).unwrap();
        let mut first = ObjectGraph::new();
        let a = first.create("Contact");
        first.set_attribute(a, "name", Value::from("a"));
        let mut second = ObjectGraph::new();
        let b = second.create("Contact");
        second.set_attribute(b, "name", Value::from("b"));

        let jobs = [(&first, Value::Object(a)), (&second, Value::Object(b))];
        let config = MarshalConfig::default().with_declaration(false);
        let results = ctx.marshal_batch(&jobs, &config);
        assert_eq!(results[0].as_ref().unwrap(), "<contact><name>a</name></contact>");
        assert_eq!(results[1].as_ref().unwrap(), "<contact><name>b</name></contact>");
    }
}
