//! The resolved schema model
//!
//! A [`SchemaSet`] holds every loaded namespace with inheritance already
//! flattened: each [`TypeDef`] lists its base chain's members first, followed
//! by its own, so member positions are stable from base to derived type.

use crate::ast::Annotation;
use crate::value::{NumericRange, Value, ValueError, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Namespace-qualified name of a type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

/// Clark notation: `{namespace}name`
impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.name)
    }
}

/// Child occurrence bounds; `max == None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occurs {
    pub min: u32,
    pub max: Option<u32>,
}

impl Occurs {
    pub const ONE: Occurs = Occurs {
        min: 1,
        max: Some(1),
    };
    pub const OPTIONAL: Occurs = Occurs {
        min: 0,
        max: Some(1),
    };
    pub const MANY: Occurs = Occurs { min: 0, max: None };
    pub const AT_LEAST_ONE: Occurs = Occurs { min: 1, max: None };

    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Whether a slot holds at most one child
    pub fn is_single(&self) -> bool {
        self.max == Some(1)
    }

    pub fn allows(&self, count: usize) -> bool {
        count >= self.min as usize && self.max.map_or(true, |max| count <= max as usize)
    }

    pub fn admits_more(&self, count: usize) -> bool {
        self.max.map_or(true, |max| count < max as usize)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Occurs::ONE
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}..{}]", self.min, max),
            None => write!(f, "[{}..*]", self.min),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub kind: ValueKind,
    pub default: Value,
    pub required: bool,
    pub is_id: bool,
    pub range: Option<NumericRange>,
    pub annotation: Option<Annotation>,
    /// Type that declared (or last overrode) this attribute
    pub defining_type: QualifiedName,
}

impl AttributeDef {
    pub fn check(&self, value: &Value) -> Result<(), ValueError> {
        self.kind.check(value, self.range.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildDef {
    pub name: String,
    /// Allowed types in declaration order; subtypes of these are accepted too
    pub allowed: Vec<QualifiedName>,
    pub occurs: Occurs,
    pub annotation: Option<Annotation>,
    pub defining_type: QualifiedName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: QualifiedName,
    pub base: Option<QualifiedName>,
    pub is_abstract: bool,
    pub annotation: Option<Annotation>,
    pub attributes: Vec<AttributeDef>,
    pub children: Vec<ChildDef>,
}

impl TypeDef {
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&ChildDef> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn id_attribute(&self) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.is_id)
    }

    /// Attributes declared or overridden by this type itself
    pub fn declared_attributes(&self) -> impl Iterator<Item = &AttributeDef> {
        self.attributes
            .iter()
            .filter(move |a| a.defining_type == self.name)
    }

    pub fn declared_children(&self) -> impl Iterator<Item = &ChildDef> {
        self.children
            .iter()
            .filter(move |c| c.defining_type == self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootDef {
    pub name: String,
    pub namespace: String,
    pub type_name: QualifiedName,
}

/// All types and roots of one target namespace, in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceSchema {
    pub uri: String,
    pub prefix: String,
    pub types: Vec<TypeDef>,
    pub roots: Vec<RootDef>,
}

impl NamespaceSchema {
    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name.name == name)
    }

    pub fn root(&self, name: &str) -> Option<&RootDef> {
        self.roots.iter().find(|r| r.name == name)
    }
}

/// A resolved set of schemas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSet {
    namespaces: Vec<NamespaceSchema>,
    index: BTreeMap<QualifiedName, (usize, usize)>,
    /// Types with every base before its derived types
    order: Vec<(usize, usize)>,
}

impl SchemaSet {
    pub(crate) fn new(namespaces: Vec<NamespaceSchema>, order: Vec<(usize, usize)>) -> Self {
        let mut index = BTreeMap::new();
        for (ns_index, ns) in namespaces.iter().enumerate() {
            for (type_index, ty) in ns.types.iter().enumerate() {
                index.insert(ty.name.clone(), (ns_index, type_index));
            }
        }
        Self {
            namespaces,
            index,
            order,
        }
    }

    /// Namespaces in load order
    pub fn namespaces(&self) -> &[NamespaceSchema] {
        &self.namespaces
    }

    pub fn namespace(&self, uri: &str) -> Option<&NamespaceSchema> {
        self.namespaces.iter().find(|ns| ns.uri == uri)
    }

    pub fn type_def(&self, name: &QualifiedName) -> Option<&TypeDef> {
        self.index
            .get(name)
            .map(|&(ns, ty)| &self.namespaces[ns].types[ty])
    }

    pub fn lookup(&self, namespace: &str, name: &str) -> Option<&TypeDef> {
        self.type_def(&QualifiedName::new(namespace, name))
    }

    /// Every type, bases before derived types, otherwise declaration order
    pub fn types_in_dependency_order(&self) -> impl Iterator<Item = &TypeDef> {
        self.order
            .iter()
            .map(move |&(ns, ty)| &self.namespaces[ns].types[ty])
    }

    pub fn roots(&self) -> impl Iterator<Item = &RootDef> {
        self.namespaces.iter().flat_map(|ns| ns.roots.iter())
    }

    pub fn type_count(&self) -> usize {
        self.order.len()
    }

    /// The type and its bases, most-derived first
    pub fn lineage(&self, name: &QualifiedName) -> Vec<&TypeDef> {
        let mut chain = Vec::new();
        let mut current = self.type_def(name);
        while let Some(ty) = current {
            chain.push(ty);
            current = ty.base.as_ref().and_then(|base| self.type_def(base));
        }
        chain
    }

    /// Whether `derived` is `base` or inherits from it
    pub fn is_assignable(&self, base: &QualifiedName, derived: &QualifiedName) -> bool {
        self.lineage(derived).iter().any(|ty| &ty.name == base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurs_bounds() {
        assert!(Occurs::ONE.allows(1));
        assert!(!Occurs::ONE.allows(0));
        assert!(!Occurs::ONE.admits_more(1));
        assert!(Occurs::MANY.admits_more(10_000));
        assert!(Occurs::AT_LEAST_ONE.allows(3));
        assert!(Occurs::OPTIONAL.is_single());
        assert_eq!(Occurs::new(2, None).to_string(), "[2..*]");
    }

    #[test]
    fn test_qualified_name_display() {
        let name = QualifiedName::new("http://treeform.dev/timeline", "eventType");
        assert_eq!(name.to_string(), "{http://treeform.dev/timeline}eventType");
    }
}
