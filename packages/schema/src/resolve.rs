//! Resolution of parsed schema documents into a [`SchemaSet`]
//!
//! Runs in phases: namespaces, type names, references, inheritance cycles,
//! flattening, roots. The first error found aborts the whole resolution.

use crate::ast::{AttributeDecl, AttributeKindDecl, ChildDecl, SchemaDocument, TypeDecl, TypeRef};
use crate::error::{SchemaError, SchemaResult};
use crate::model::{
    AttributeDef, ChildDef, NamespaceSchema, QualifiedName, RootDef, SchemaSet, TypeDef,
};
use crate::value::{NumericRange, ValueKind};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Resolve a set of schema documents, one per namespace, in load order
pub fn resolve(documents: &[SchemaDocument]) -> SchemaResult<SchemaSet> {
    let mut namespaces = BTreeSet::new();
    for doc in documents {
        if !namespaces.insert(doc.namespace.as_str()) {
            return Err(SchemaError::DuplicateNamespace {
                uri: doc.namespace.clone(),
            });
        }
    }

    let mut declared: BTreeMap<QualifiedName, (usize, usize)> = BTreeMap::new();
    for (ns_index, doc) in documents.iter().enumerate() {
        for (type_index, decl) in doc.types.iter().enumerate() {
            let name = QualifiedName::new(&doc.namespace, &decl.name);
            if declared.insert(name, (ns_index, type_index)).is_some() {
                return Err(SchemaError::DuplicateType {
                    namespace: doc.namespace.clone(),
                    name: decl.name.clone(),
                });
            }
        }
    }

    let resolver = Resolver {
        documents,
        declared: &declared,
    };

    let bases = resolver.resolve_bases()?;
    let order = resolver.dependency_order(&bases)?;

    let mut flattened: HashMap<(usize, usize), TypeDef> = HashMap::new();
    for &key in &order {
        let base = bases[&key]
            .as_ref()
            .and_then(|base| declared.get(base))
            .and_then(|base_key| flattened.get(base_key));
        let def = resolver.flatten(key, bases[&key].clone(), base)?;
        flattened.insert(key, def);
    }

    let mut schemas = Vec::with_capacity(documents.len());
    for (ns_index, doc) in documents.iter().enumerate() {
        let types = (0..doc.types.len())
            .filter_map(|type_index| flattened.remove(&(ns_index, type_index)))
            .collect();
        schemas.push(NamespaceSchema {
            uri: doc.namespace.clone(),
            prefix: doc.prefix.clone(),
            types,
            roots: Vec::new(),
        });
    }

    for (ns_index, doc) in documents.iter().enumerate() {
        let mut seen = BTreeSet::new();
        for root in &doc.roots {
            if !seen.insert(root.name.as_str()) {
                return Err(SchemaError::DuplicateRoot {
                    namespace: doc.namespace.clone(),
                    name: root.name.clone(),
                });
            }
            let construct = format!("root element \"{}\"", root.name);
            let type_name = resolver.resolve_ref(ns_index, &root.type_ref, &construct)?;
            let &(type_ns, type_index) = &declared[&type_name];
            if schemas[type_ns].types[type_index].is_abstract {
                return Err(SchemaError::AbstractRoot {
                    root: root.name.clone(),
                    type_name: root.type_ref.to_string(),
                });
            }
            schemas[ns_index].roots.push(RootDef {
                name: root.name.clone(),
                namespace: doc.namespace.clone(),
                type_name,
            });
        }
    }

    tracing::debug!(
        namespaces = schemas.len(),
        types = order.len(),
        "resolved schema set"
    );

    Ok(SchemaSet::new(schemas, order))
}

struct Resolver<'a> {
    documents: &'a [SchemaDocument],
    declared: &'a BTreeMap<QualifiedName, (usize, usize)>,
}

impl<'a> Resolver<'a> {
    fn decl(&self, key: (usize, usize)) -> &'a TypeDecl {
        &self.documents[key.0].types[key.1]
    }

    fn qualified(&self, key: (usize, usize)) -> QualifiedName {
        QualifiedName::new(&self.documents[key.0].namespace, &self.decl(key).name)
    }

    fn keys(&self) -> impl Iterator<Item = (usize, usize)> + 'a {
        self.documents
            .iter()
            .enumerate()
            .flat_map(|(ns, doc)| (0..doc.types.len()).map(move |ty| (ns, ty)))
    }

    /// Resolve a type reference written in document `ns_index`
    fn resolve_ref(
        &self,
        ns_index: usize,
        reference: &TypeRef,
        construct: &str,
    ) -> SchemaResult<QualifiedName> {
        let doc = &self.documents[ns_index];
        let namespace = match &reference.prefix {
            None => doc.namespace.as_str(),
            Some(prefix) if *prefix == doc.prefix => doc.namespace.as_str(),
            Some(prefix) => doc
                .imports
                .iter()
                .find(|import| import.prefix == *prefix)
                .map(|import| import.namespace.as_str())
                .ok_or_else(|| SchemaError::UnknownPrefix {
                    prefix: prefix.clone(),
                    construct: construct.to_string(),
                })?,
        };

        let name = QualifiedName::new(namespace, &reference.name);
        if self.declared.contains_key(&name) {
            Ok(name)
        } else {
            Err(SchemaError::UnresolvedType {
                reference: reference.to_string(),
                construct: construct.to_string(),
            })
        }
    }

    fn resolve_bases(&self) -> SchemaResult<HashMap<(usize, usize), Option<QualifiedName>>> {
        let mut bases = HashMap::new();
        for key in self.keys() {
            let decl = self.decl(key);
            let base = match &decl.base {
                Some(base) => {
                    let construct = format!("base of type \"{}\"", decl.name);
                    Some(self.resolve_ref(key.0, base, &construct)?)
                }
                None => None,
            };
            bases.insert(key, base);
        }
        Ok(bases)
    }

    /// Bases before derived types, otherwise declaration order
    fn dependency_order(
        &self,
        bases: &HashMap<(usize, usize), Option<QualifiedName>>,
    ) -> SchemaResult<Vec<(usize, usize)>> {
        let mut order = Vec::new();
        let mut placed = BTreeSet::new();

        for key in self.keys() {
            let mut chain = Vec::new();
            let mut current = Some(key);
            while let Some(k) = current {
                if placed.contains(&k) {
                    break;
                }
                if chain.contains(&k) {
                    let mut names: Vec<String> =
                        chain.iter().map(|&k| self.decl(k).name.clone()).collect();
                    names.push(self.decl(k).name.clone());
                    return Err(SchemaError::CyclicInheritance { chain: names });
                }
                chain.push(k);
                current = bases[&k]
                    .as_ref()
                    .and_then(|base| self.declared.get(base).copied());
            }
            for k in chain.into_iter().rev() {
                placed.insert(k);
                order.push(k);
            }
        }

        Ok(order)
    }

    fn flatten(
        &self,
        key: (usize, usize),
        base_name: Option<QualifiedName>,
        base: Option<&TypeDef>,
    ) -> SchemaResult<TypeDef> {
        let decl = self.decl(key);
        let name = self.qualified(key);
        let type_construct = format!("type \"{}\"", decl.name);

        let mut attributes: Vec<AttributeDef> =
            base.map(|b| b.attributes.clone()).unwrap_or_default();
        let mut children: Vec<ChildDef> = base.map(|b| b.children.clone()).unwrap_or_default();
        let inherited_attributes = attributes.len();

        let mut own_names = BTreeSet::new();
        for attr in &decl.attributes {
            if !own_names.insert(attr.name.as_str())
                || children.iter().any(|c| c.name == attr.name)
            {
                return Err(SchemaError::DuplicateMember {
                    member: attr.name.clone(),
                    construct: type_construct,
                });
            }

            let def = self.attribute_def(key, &name, attr)?;
            match attributes[..inherited_attributes]
                .iter()
                .position(|a| a.name == attr.name)
            {
                Some(slot) => {
                    if attributes[slot].kind != def.kind {
                        return Err(SchemaError::IncompatibleOverride {
                            type_name: decl.name.clone(),
                            attribute: attr.name.clone(),
                            base_kind: attributes[slot].kind.name(),
                            kind: def.kind.name(),
                        });
                    }
                    attributes[slot] = def;
                }
                None => attributes.push(def),
            }
        }

        for child in &decl.children {
            if children.iter().any(|c| c.name == child.name && c.defining_type != name) {
                return Err(SchemaError::ChildOverride {
                    type_name: decl.name.clone(),
                    child: child.name.clone(),
                });
            }
            if !own_names.insert(child.name.as_str())
                || attributes.iter().any(|a| a.name == child.name)
            {
                return Err(SchemaError::DuplicateMember {
                    member: child.name.clone(),
                    construct: type_construct,
                });
            }
            children.push(self.child_def(key, &name, child)?);
        }

        let mut ids = attributes.iter().filter(|a| a.is_id);
        if let (Some(first), Some(second)) = (ids.next(), ids.next()) {
            return Err(SchemaError::MultipleIds {
                type_name: decl.name.clone(),
                first: first.name.clone(),
                second: second.name.clone(),
            });
        }

        Ok(TypeDef {
            name,
            base: base_name,
            is_abstract: decl.is_abstract,
            annotation: decl.annotation,
            attributes,
            children,
        })
    }

    fn attribute_def(
        &self,
        key: (usize, usize),
        owner: &QualifiedName,
        attr: &AttributeDecl,
    ) -> SchemaResult<AttributeDef> {
        let construct = format!(
            "attribute \"{}\" of type \"{}\"",
            attr.name,
            self.decl(key).name
        );
        let invalid = |message: &str| SchemaError::InvalidConstraint {
            construct: construct.clone(),
            message: message.to_string(),
        };

        let kind = match &attr.kind {
            AttributeKindDecl::String => ValueKind::String,
            AttributeKindDecl::Int => ValueKind::Int,
            AttributeKindDecl::Float => ValueKind::Float,
            AttributeKindDecl::Bool => ValueKind::Bool,
            AttributeKindDecl::Enum { values } => {
                if values.is_empty() {
                    return Err(invalid("enum declares no values"));
                }
                ValueKind::Enum {
                    values: values.clone(),
                }
            }
            AttributeKindDecl::Ref { target } => ValueKind::Reference {
                target: match target {
                    Some(target) => Some(self.resolve_ref(key.0, target, &construct)?),
                    None => None,
                },
            },
            AttributeKindDecl::List { item } => ValueKind::List { item: *item },
        };

        let range = match attr.range {
            Some(_) if !kind.is_numeric() => {
                return Err(invalid("range applies to int and float attributes only"))
            }
            Some(range) => {
                if let (Some(min), Some(max)) = (range.min, range.max) {
                    if min > max {
                        return Err(invalid("range minimum exceeds maximum"));
                    }
                }
                Some(NumericRange::new(range.min, range.max))
            }
            None => None,
        };

        if attr.id && kind != ValueKind::String {
            return Err(invalid("id attributes must be strings"));
        }

        let default = match &attr.default {
            Some(literal) => kind
                .value_from_literal(literal)
                .map_err(|error| SchemaError::InvalidDefault {
                    construct: construct.clone(),
                    error,
                })?,
            None => kind.default_value(),
        };
        kind.check(&default, range.as_ref())
            .map_err(|error| SchemaError::InvalidDefault {
                construct: construct.clone(),
                error,
            })?;

        Ok(AttributeDef {
            name: attr.name.clone(),
            kind,
            default,
            required: attr.required,
            is_id: attr.id,
            range,
            annotation: attr.annotation,
            defining_type: owner.clone(),
        })
    }

    fn child_def(
        &self,
        key: (usize, usize),
        owner: &QualifiedName,
        child: &ChildDecl,
    ) -> SchemaResult<ChildDef> {
        let construct = format!("child \"{}\" of type \"{}\"", child.name, self.decl(key).name);

        if child.types.is_empty() {
            return Err(SchemaError::InvalidConstraint {
                construct,
                message: "child slot allows no types".to_string(),
            });
        }

        let occurs = child.occurs;
        if occurs.max.map_or(false, |max| max == 0 || occurs.min > max) {
            return Err(SchemaError::InvalidOccurs {
                construct,
                min: occurs.min,
                max: occurs.max.map_or("*".to_string(), |m| m.to_string()),
            });
        }

        let allowed = child
            .types
            .iter()
            .map(|t| self.resolve_ref(key.0, t, &construct))
            .collect::<SchemaResult<Vec<_>>>()?;

        Ok(ChildDef {
            name: child.name.clone(),
            allowed,
            occurs,
            annotation: child.annotation,
            defining_type: owner.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::value::Value;

    fn resolve_sources(sources: &[&str]) -> SchemaResult<SchemaSet> {
        let docs: Vec<_> = sources.iter().map(|s| parse(s).unwrap()).collect();
        resolve(&docs)
    }

    #[test]
    fn test_flattening_puts_base_members_first() {
        let set = resolve_sources(&[r#"
            namespace "urn:t" as t;
            type derived extends base { attr extra: int; attr label: string = "x"; }
            type base { attr label: string; attr size: int; child item: base*; }
        "#])
        .unwrap();

        let derived = set.lookup("urn:t", "derived").unwrap();
        let names: Vec<_> = derived.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["label", "size", "extra"]);
        assert_eq!(derived.attributes[0].default, Value::from("x"));
        assert_eq!(
            derived.attributes[0].defining_type,
            QualifiedName::new("urn:t", "derived")
        );
        assert_eq!(derived.children.len(), 1);

        let order: Vec<_> = set
            .types_in_dependency_order()
            .map(|t| t.name.name.as_str())
            .collect();
        assert_eq!(order, vec!["base", "derived"]);
    }

    #[test]
    fn test_cross_namespace_references() {
        let set = resolve_sources(&[
            r#"namespace "urn:a" as a; import "urn:b" as b;
               type holder { child note: b:note*; }"#,
            r#"namespace "urn:b" as b; type note { attr text: string; }"#,
        ])
        .unwrap();
        let holder = set.lookup("urn:a", "holder").unwrap();
        assert_eq!(holder.children[0].allowed[0], QualifiedName::new("urn:b", "note"));
    }

    #[test]
    fn test_cyclic_inheritance() {
        let err = resolve_sources(&[r#"
            namespace "urn:t" as t;
            type a extends b {} type b extends c {} type c extends a {}
        "#])
        .unwrap_err();
        match err {
            SchemaError::CyclicInheritance { chain } => {
                assert_eq!(chain, vec!["a", "b", "c", "a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unresolved_child_type_names_construct() {
        let err = resolve_sources(&[r#"
            namespace "urn:t" as t;
            type event { child resource: missing*; }
        "#])
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("missing"));
        assert!(message.contains("child \"resource\" of type \"event\""));
    }

    #[test]
    fn test_unknown_prefix() {
        let err = resolve_sources(&[r#"namespace "urn:t" as t; type a extends x:b {}"#]).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownPrefix { .. }));
    }

    #[test]
    fn test_duplicate_root() {
        let err = resolve_sources(&[r#"
            namespace "urn:t" as t;
            type a {}
            root doc: a;
            root doc: a;
        "#])
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateRoot { .. }));
    }

    #[test]
    fn test_abstract_root_rejected() {
        let err = resolve_sources(&[r#"
            namespace "urn:t" as t;
            abstract type a {}
            root doc: a;
        "#])
        .unwrap_err();
        assert!(matches!(err, SchemaError::AbstractRoot { .. }));
    }

    #[test]
    fn test_incompatible_override() {
        let err = resolve_sources(&[r#"
            namespace "urn:t" as t;
            type base { attr size: int; }
            type derived extends base { attr size: string; }
        "#])
        .unwrap_err();
        assert!(matches!(err, SchemaError::IncompatibleOverride { .. }));
    }

    #[test]
    fn test_child_override_rejected() {
        let err = resolve_sources(&[r#"
            namespace "urn:t" as t;
            type base { child item: base*; }
            type derived extends base { child item: derived*; }
        "#])
        .unwrap_err();
        assert!(matches!(err, SchemaError::ChildOverride { .. }));
    }

    #[test]
    fn test_invalid_defaults() {
        let err = resolve_sources(&[r#"
            namespace "urn:t" as t;
            type a { attr kind: enum("x", "y") = "z"; }
        "#])
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));

        let err = resolve_sources(&[r#"
            namespace "urn:t" as t;
            type a { attr count: int range(1, 5); }
        "#])
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));
    }

    #[test]
    fn test_invalid_occurs() {
        let err = resolve_sources(&[r#"
            namespace "urn:t" as t;
            type a { child items: a [3..1]; }
        "#])
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidOccurs { min: 3, .. }));
    }

    #[test]
    fn test_multiple_ids_across_inheritance() {
        let err = resolve_sources(&[r#"
            namespace "urn:t" as t;
            type base { attr name: string id; }
            type derived extends base { attr key: string id; }
        "#])
        .unwrap_err();
        assert!(matches!(err, SchemaError::MultipleIds { .. }));
    }

    #[test]
    fn test_duplicate_namespace_and_type() {
        let err = resolve_sources(&[
            r#"namespace "urn:t" as t;"#,
            r#"namespace "urn:t" as u;"#,
        ])
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateNamespace { .. }));

        let err = resolve_sources(&[r#"namespace "urn:t" as t; type a {} type a {}"#]).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateType { .. }));
    }

    #[test]
    fn test_assignability() {
        let set = resolve_sources(&[r#"
            namespace "urn:t" as t;
            type animal {}
            type dog extends animal {}
            type rock {}
        "#])
        .unwrap();
        let animal = QualifiedName::new("urn:t", "animal");
        let dog = QualifiedName::new("urn:t", "dog");
        let rock = QualifiedName::new("urn:t", "rock");
        assert!(set.is_assignable(&animal, &dog));
        assert!(!set.is_assignable(&dog, &animal));
        assert!(!set.is_assignable(&animal, &rock));
    }
}
