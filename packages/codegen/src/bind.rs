//! Checking declarations against a live registry
//!
//! Generated code goes stale when a schema changes and the generator is not
//! rerun. Binding the declarations at startup turns that skew into a
//! [`BindingError`] instead of a failure deep inside application code.

use crate::decls::{HandleDeclarations, MemberKind, TypeDecl};
use treeform_dom::{AttributeHandle, BindingError, ChildHandle, NodeType, TypeRegistry};

/// Runtime counterpart of one [`TypeDecl`]
#[derive(Debug, Clone)]
pub struct BoundType {
    pub node_type: NodeType,
    pub attributes: Vec<AttributeHandle>,
    pub children: Vec<ChildHandle>,
}

/// Every declared handle, resolved in declaration order
#[derive(Debug, Clone, Default)]
pub struct BoundHandles {
    pub types: Vec<BoundType>,
    pub roots: Vec<ChildHandle>,
}

impl BoundHandles {
    pub fn node_type(&self, namespace: &str, name: &str) -> Option<&BoundType> {
        self.types
            .iter()
            .find(|t| t.node_type.namespace() == namespace && t.node_type.local_name() == name)
    }
}

impl HandleDeclarations {
    /// Resolve every declaration against `registry`
    pub fn bind(&self, registry: &TypeRegistry) -> Result<BoundHandles, BindingError> {
        let mut bound = BoundHandles::default();

        for ns in &self.namespaces {
            for decl in &ns.types {
                bound.types.push(bind_type(registry, &ns.namespace, decl)?);
            }
            for root in &ns.roots {
                let handle = registry.bind_root(&ns.namespace, &root.name)?;
                let found = handle
                    .root_type()
                    .map(|t| t.name().to_string())
                    .unwrap_or_default();
                if found != root.type_name {
                    return Err(BindingError::RootTypeSkew {
                        name: root.name.clone(),
                        expected: root.type_name.clone(),
                        found,
                    });
                }
                bound.roots.push(handle);
            }
        }

        tracing::debug!(
            types = bound.types.len(),
            roots = bound.roots.len(),
            "bound handle declarations"
        );
        Ok(bound)
    }
}

fn bind_type(
    registry: &TypeRegistry,
    namespace: &str,
    decl: &TypeDecl,
) -> Result<BoundType, BindingError> {
    let node_type = registry.bind_type(namespace, &decl.type_name)?;

    let mut attributes = Vec::with_capacity(decl.attributes.len());
    for member in &decl.attributes {
        let handle = node_type.bind_attribute(&member.name)?;
        if let MemberKind::Attribute { value_kind } = &member.kind {
            let found = handle.definition().kind.name();
            if *value_kind != found {
                return Err(BindingError::AttributeKindSkew {
                    type_name: node_type.to_string(),
                    attribute: member.name.clone(),
                    expected: value_kind.clone(),
                    found,
                });
            }
        }
        attributes.push(handle);
    }

    let children = decl
        .children
        .iter()
        .map(|member| node_type.bind_child(&member.name))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BoundType {
        node_type,
        attributes,
        children,
    })
}

#[cfg(test)]
mod tests {
    use crate::{compile, CompileOptions};
    use treeform_dom::{BindingError, TypeRegistry};
    use treeform_schema::load_sources;

    const V1: &str = r#"
        namespace "urn:inventory" as inv;
        type itemType { attr count: int = 0; child part: itemType*; }
        root item: itemType;
    "#;

    #[test]
    fn test_bind_matching_registry() {
        let decls = compile(&load_sources(&[("v1.tfs", V1)]).unwrap(), &CompileOptions::default());
        let registry = TypeRegistry::from_sources(&[("v1.tfs", V1)]).unwrap();
        let bound = decls.bind(&registry).unwrap();

        let item = bound.node_type("urn:inventory", "itemType").unwrap();
        assert_eq!(item.attributes[0].name(), "count");
        assert_eq!(item.children[0].name(), "part");
        assert_eq!(bound.roots.len(), 1);
    }

    #[test]
    fn test_bind_reports_schema_skew() {
        let decls = compile(&load_sources(&[("v1.tfs", V1)]).unwrap(), &CompileOptions::default());

        let renamed = V1.replace("attr count", "attr amount");
        let registry = TypeRegistry::from_sources(&[("v2.tfs", renamed.as_str())]).unwrap();
        assert!(matches!(
            decls.bind(&registry),
            Err(BindingError::UnknownAttribute { attribute, .. }) if attribute == "count"
        ));

        let retyped = V1.replace("attr count: int = 0", "attr count: string");
        let registry = TypeRegistry::from_sources(&[("v2.tfs", retyped.as_str())]).unwrap();
        assert!(matches!(
            decls.bind(&registry),
            Err(BindingError::AttributeKindSkew { expected, found, .. })
                if expected == "int" && found == "string"
        ));

        let other = TypeRegistry::from_sources(&[(
            "other.tfs",
            r#"namespace "urn:other" as o; type itemType {}"#,
        )])
        .unwrap();
        assert!(matches!(
            decls.bind(&other),
            Err(BindingError::UnknownNamespace { .. })
        ));
    }
}
