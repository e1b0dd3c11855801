//! # Handle Declarations
//!
//! The schema compiler's output: one declaration per node type, attribute,
//! child slot and root element, grouped by namespace.
//!
//! ## Design
//!
//! - Everything is listed in schema declaration order. Namespaces follow
//!   load order. No hash-ordered collection is iterated on the way, so two
//!   runs over the same schemas are byte-identical.
//! - Members are flattened: a derived type lists inherited attributes and
//!   child slots ahead of its own.
//! - The declarations serialize to a JSON manifest.

use crate::naming::{self, Scope};
use crate::options::CompileOptions;
use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};
use treeform_schema::{Annotation, SchemaSet, TypeDef};

/// Field names taken by the generated code itself
pub(crate) const RESERVED_FIELDS: &[&str] = &["node_type"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleDeclarations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    pub namespaces: Vec<NamespaceDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceDecl {
    pub namespace: String,
    pub prefix: String,
    pub module_name: String,
    pub types: Vec<TypeDecl>,
    pub roots: Vec<RootDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDecl {
    pub type_name: String,
    pub struct_name: String,
    /// Name of the field holding this type in the namespace's handle table
    pub field_name: String,
    #[serde(default)]
    pub is_abstract: bool,
    pub attributes: Vec<MemberDecl>,
    pub children: Vec<MemberDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDecl {
    pub name: String,
    pub field_name: String,
    pub kind: MemberKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "member", rename_all = "camelCase")]
pub enum MemberKind {
    #[serde(rename_all = "camelCase")]
    Attribute { value_kind: String },
    #[serde(rename_all = "camelCase")]
    Child { allowed: Vec<String>, occurs: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootDecl {
    pub name: String,
    pub field_name: String,
    /// Qualified type name in Clark notation
    pub type_name: String,
}

impl HandleDeclarations {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn type_count(&self) -> usize {
        self.namespaces.iter().map(|ns| ns.types.len()).sum()
    }

    pub fn find_type(&self, namespace: &str, type_name: &str) -> Option<&TypeDecl> {
        self.namespaces
            .iter()
            .filter(|ns| ns.namespace == namespace)
            .flat_map(|ns| ns.types.iter())
            .find(|t| t.type_name == type_name)
    }
}

fn is_included(annotation: Option<Annotation>, annotated_only: bool) -> bool {
    match annotation {
        Some(Annotation::Include) => true,
        Some(Annotation::Exclude) => false,
        None => !annotated_only,
    }
}

/// Compile a resolved schema set into handle declarations
pub fn compile(schemas: &SchemaSet, options: &CompileOptions) -> HandleDeclarations {
    let mut modules = Scope::default();
    let namespaces: Vec<NamespaceDecl> = schemas
        .namespaces()
        .iter()
        .map(|ns| {
            let mut type_fields = Scope::default();
            let mut structs = Scope::reserving(&["Handles"]);

            let types: Vec<TypeDecl> = ns
                .types
                .iter()
                .filter(|t| is_included(t.annotation, options.annotated_only))
                .map(|t| compile_type(t, &mut structs, &mut type_fields))
                .collect();

            let roots = ns
                .roots
                .iter()
                .filter(|root| {
                    schemas
                        .type_def(&root.type_name)
                        .is_some_and(|t| is_included(t.annotation, options.annotated_only))
                })
                .map(|root| RootDecl {
                    name: root.name.clone(),
                    field_name: type_fields
                        .claim(naming::escape(format!("{}_root", root.name.to_snake_case()))),
                    type_name: root.type_name.to_string(),
                })
                .collect();

            NamespaceDecl {
                namespace: ns.uri.clone(),
                prefix: ns.prefix.clone(),
                module_name: modules.claim(naming::field_name(&ns.prefix)),
                types,
                roots,
            }
        })
        .collect();

    let declarations = HandleDeclarations {
        module_name: options.module_name.clone(),
        namespaces,
    };
    tracing::debug!(
        namespaces = declarations.namespaces.len(),
        types = declarations.type_count(),
        annotated_only = options.annotated_only,
        "compiled handle declarations"
    );
    declarations
}

fn compile_type(def: &TypeDef, structs: &mut Scope, type_fields: &mut Scope) -> TypeDecl {
    let mut fields = Scope::reserving(RESERVED_FIELDS);

    let attributes = def
        .attributes
        .iter()
        .filter(|a| is_included(a.annotation, false))
        .map(|a| MemberDecl {
            name: a.name.clone(),
            field_name: fields.claim(naming::field_name(&a.name)),
            kind: MemberKind::Attribute {
                value_kind: a.kind.name(),
            },
        })
        .collect();

    let children = def
        .children
        .iter()
        .filter(|c| is_included(c.annotation, false))
        .map(|c| MemberDecl {
            name: c.name.clone(),
            field_name: fields.claim(naming::field_name(&c.name)),
            kind: MemberKind::Child {
                allowed: c.allowed.iter().map(|t| t.to_string()).collect(),
                occurs: c.occurs.to_string(),
            },
        })
        .collect();

    TypeDecl {
        type_name: def.name.name.clone(),
        struct_name: structs.claim(naming::struct_name(&def.name.name)),
        field_name: type_fields.claim(naming::field_name(&def.name.name)),
        is_abstract: def.is_abstract,
        attributes,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeform_schema::load_sources;

    const SCHEMA: &str = r#"
        namespace "urn:shop" as shop;
        type productType {
            attr sku: string id;
            attr type: enum("book", "game") = "book";
            @exclude attr internalNote: string;
            child variant: variantType*;
        }
        type variantType { attr price: float = 0.0; }
        @exclude type auditType { attr user: string; }
        root catalog: productType;
        root audit: auditType;
    "#;

    fn compile_default() -> HandleDeclarations {
        let schemas = load_sources(&[("shop.tfs", SCHEMA)]).unwrap();
        compile(&schemas, &CompileOptions::default())
    }

    #[test]
    fn test_excluded_types_and_members_are_skipped() {
        let decls = compile_default();
        let ns = &decls.namespaces[0];
        let names: Vec<_> = ns.types.iter().map(|t| t.type_name.as_str()).collect();
        assert_eq!(names, vec!["productType", "variantType"]);

        let product = &ns.types[0];
        let attrs: Vec<_> = product.attributes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(attrs, vec!["sku", "type"]);

        // Root of an excluded type is skipped too
        assert_eq!(ns.roots.len(), 1);
        assert_eq!(ns.roots[0].field_name, "catalog_root");
    }

    #[test]
    fn test_identifiers() {
        let decls = compile_default();
        let ns = &decls.namespaces[0];
        assert_eq!(ns.module_name, "shop");
        let product = &ns.types[0];
        assert_eq!(product.struct_name, "ProductType");
        assert_eq!(product.field_name, "product_type");
        assert_eq!(product.attributes[1].field_name, "r#type");
        assert_eq!(
            product.children[0].kind,
            MemberKind::Child {
                allowed: vec!["{urn:shop}variantType".to_string()],
                occurs: "[0..*]".to_string(),
            }
        );
    }

    #[test]
    fn test_manifest_json() {
        let decls = compile_default();
        let json = decls.to_json().unwrap();
        assert!(json.contains("\"valueKind\": \"enum(book, game)\""));
        assert_eq!(HandleDeclarations::from_json(&json).unwrap(), decls);
    }
}
