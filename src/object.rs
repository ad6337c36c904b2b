//! Object graph arena
//!
//! Mapped objects live in an arena and refer to each other by [`ObjectId`],
//! the same way DOM nodes refer to each other by `NodeId`. Object identity
//! is id equality: after reference resolution `B.ref` holds the very id of
//! the target, not a copy.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::value::Value;

/// Object ID - index into the graph arena
pub type ObjectId = u32;

/// A typed bag of attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub type_name: String,
    /// Attribute values in the order they were set
    pub attributes: IndexMap<String, Value>,
}

impl Object {
    pub fn new(type_name: &str) -> Self {
        Object {
            type_name: type_name.to_string(),
            attributes: IndexMap::new(),
        }
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    pub fn set(&mut self, attribute: &str, value: Value) {
        self.attributes.insert(attribute.to_string(), value);
    }
}

/// Arena of objects
#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    objects: Vec<Object>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty object of `type_name`
    pub fn create(&mut self, type_name: &str) -> ObjectId {
        self.insert(Object::new(type_name))
    }

    pub fn insert(&mut self, object: Object) -> ObjectId {
        let id = self.objects.len() as ObjectId;
        self.objects.push(object);
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id as usize)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id as usize)
    }

    pub fn type_of(&self, id: ObjectId) -> Option<&str> {
        self.get(id).map(|o| o.type_name.as_str())
    }

    pub fn attribute(&self, id: ObjectId, attribute: &str) -> Option<&Value> {
        self.get(id)?.get(attribute)
    }

    /// Set an attribute; unknown ids are ignored
    pub fn set_attribute(&mut self, id: ObjectId, attribute: &str, value: Value) {
        if let Some(object) = self.get_mut(id) {
            object.set(attribute, value);
        }
    }

    /// Drop every object created after the graph had `len` objects
    pub fn truncate(&mut self, len: usize) {
        self.objects.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, o)| (i as ObjectId, o))
    }
}

/// Structural equality of two objects, possibly in different graphs.
/// Object-valued attributes are compared recursively; cycles are assumed
/// equal once entered.
pub fn deep_eq(left: &ObjectGraph, a: ObjectId, right: &ObjectGraph, b: ObjectId) -> bool {
    DeepEq {
        left,
        right,
        visiting: HashSet::new(),
    }
    .objects(a, b)
}

struct DeepEq<'g> {
    left: &'g ObjectGraph,
    right: &'g ObjectGraph,
    visiting: HashSet<(ObjectId, ObjectId)>,
}

impl<'g> DeepEq<'g> {
    fn objects(&mut self, a: ObjectId, b: ObjectId) -> bool {
        if !self.visiting.insert((a, b)) {
            return true;
        }
        let (left, right) = (self.left, self.right);
        let (Some(oa), Some(ob)) = (left.get(a), right.get(b)) else {
            return false;
        };
        if oa.type_name != ob.type_name {
            return false;
        }
        // null and unset are the same thing
        let set = |o: &'g Object| -> Vec<(&'g String, &'g Value)> {
            o.attributes.iter().filter(|(_, v)| !v.is_null()).collect()
        };
        let (la, lb) = (set(oa), set(ob));
        if la.len() != lb.len() {
            return false;
        }
        la.into_iter().all(|(name, va)| match ob.get(name) {
            Some(vb) => self.values(va, vb),
            None => false,
        })
    }

    fn values(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Object(x), Value::Object(y)) => self.objects(*x, *y),
            (Value::List(x), Value::List(y)) | (Value::Set(x), Value::Set(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(p, q)| self.values(p, q))
            }
            (Value::Map(x), Value::Map(y)) => {
                x.len() == y.len()
                    && x
                        .iter()
                        .zip(y)
                        .all(|((ka, va), (kb, vb))| self.values(ka, kb) && self.values(va, vb))
            }
            (Value::Root(x), Value::Root(y)) => {
                x.name == y.name && x.schema_type == y.schema_type && self.values(&x.value, &y.value)
            }
            (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
            _ => a == b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(graph: &mut ObjectGraph, name: &str) -> ObjectId {
        let id = graph.create("Person");
        graph.set_attribute(id, "name", Value::from(name));
        id
    }

    #[test]
    fn test_create_and_set() {
        let mut graph = ObjectGraph::new();
        let id = person(&mut graph, "Ann");
        assert_eq!(graph.type_of(id), Some("Person"));
        assert_eq!(graph.attribute(id, "name"), Some(&Value::from("Ann")));
        assert_eq!(graph.attribute(id, "age"), None);
    }

    #[test]
    fn test_deep_eq_across_graphs() {
        let mut g1 = ObjectGraph::new();
        let mut g2 = ObjectGraph::new();
        g2.create("Filler");
        let a = person(&mut g1, "Ann");
        let b = person(&mut g2, "Ann");
        let addr1 = g1.create("Address");
        let addr2 = g2.create("Address");
        g1.set_attribute(a, "address", Value::Object(addr1));
        g2.set_attribute(b, "address", Value::Object(addr2));
        g2.set_attribute(b, "nickname", Value::Null);
        assert!(deep_eq(&g1, a, &g2, b));

        g2.set_attribute(addr2, "city", Value::from("Oslo"));
        assert!(!deep_eq(&g1, a, &g2, b));
    }

    #[test]
    fn test_deep_eq_cycles() {
        let mut g = ObjectGraph::new();
        let a = person(&mut g, "A");
        let b = person(&mut g, "B");
        g.set_attribute(a, "friend", Value::Object(b));
        g.set_attribute(b, "friend", Value::Object(a));
        assert!(deep_eq(&g, a, &g, a));
        assert!(!deep_eq(&g, a, &g, b));
    }
}
