use super::CodeGenerator;
use crate::context::CodeWriter;
use crate::decls::{HandleDeclarations, MemberDecl, NamespaceDecl, TypeDecl};
use crate::error::CodegenResult;

const HEADER: &str = "// Generated by treeform, do not edit.";
const IMPORTS: &str = "use treeform_dom::{AttributeHandle, BindingError, ChildHandle, NodeType, TypeRegistry};";

/// Rust source generator
///
/// Emits one module per namespace holding an `NS` constant, a struct per
/// node type with one field per handle, and a `Handles` table that binds
/// everything against a [`TypeRegistry`](treeform_dom::TypeRegistry).
#[derive(Debug, Default)]
pub struct RustGenerator;

impl RustGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_type(&self, decl: &TypeDecl, out: &mut CodeWriter) {
        out.add_line(&format!("/// Handles for `{}`", decl.type_name));
        out.add_line("#[derive(Debug, Clone)]");
        out.block(&format!("pub struct {} {{", decl.struct_name), "}", |out| {
            out.add_line("pub node_type: NodeType,");
            for member in &decl.attributes {
                out.add_line(&format!("pub {}: AttributeHandle,", member.field_name));
            }
            for member in &decl.children {
                out.add_line(&format!("pub {}: ChildHandle,", member.field_name));
            }
        });
        out.add_line("");

        out.block(&format!("impl {} {{", decl.struct_name), "}", |out| {
            out.block(
                "pub fn bind(registry: &TypeRegistry) -> Result<Self, BindingError> {",
                "}",
                |out| {
                    out.add_line(&format!(
                        "let node_type = registry.bind_type(NS, {:?})?;",
                        decl.type_name
                    ));
                    out.block("Ok(Self {", "})", |out| {
                        for member in &decl.attributes {
                            out.add_line(&bind_member(member, "bind_attribute"));
                        }
                        for member in &decl.children {
                            out.add_line(&bind_member(member, "bind_child"));
                        }
                        out.add_line("node_type,");
                    });
                },
            );
        });
    }

    pub fn generate_namespace(&self, ns: &NamespaceDecl, out: &mut CodeWriter) {
        out.add_line(&format!("/// Handles for namespace `{}`", ns.namespace));
        out.block(&format!("pub mod {} {{", ns.module_name), "}", |out| {
            out.add_line("use super::*;");
            out.add_line("");
            out.add_line(&format!("pub const NS: &str = {:?};", ns.namespace));

            for decl in &ns.types {
                out.add_line("");
                self.generate_type(decl, out);
            }

            out.add_line("");
            out.add_line("/// Every handle of this namespace");
            out.add_line("#[derive(Debug, Clone)]");
            out.block("pub struct Handles {", "}", |out| {
                for decl in &ns.types {
                    out.add_line(&format!("pub {}: {},", decl.field_name, decl.struct_name));
                }
                for root in &ns.roots {
                    out.add_line(&format!("pub {}: ChildHandle,", root.field_name));
                }
            });
            out.add_line("");
            out.block("impl Handles {", "}", |out| {
                out.block(
                    "pub fn bind(registry: &TypeRegistry) -> Result<Self, BindingError> {",
                    "}",
                    |out| {
                        out.block("Ok(Self {", "})", |out| {
                            for decl in &ns.types {
                                out.add_line(&format!(
                                    "{}: {}::bind(registry)?,",
                                    decl.field_name, decl.struct_name
                                ));
                            }
                            for root in &ns.roots {
                                out.add_line(&format!(
                                    "{}: registry.bind_root(NS, {:?})?,",
                                    root.field_name, root.name
                                ));
                            }
                        });
                    },
                );
            });
        });
    }

    fn generate_body(&self, decls: &HandleDeclarations, out: &mut CodeWriter) {
        out.add_line(IMPORTS);
        for ns in &decls.namespaces {
            out.add_line("");
            self.generate_namespace(ns, out);
        }
    }
}

fn bind_member(member: &MemberDecl, binder: &str) -> String {
    format!(
        "{}: node_type.{}({:?})?,",
        member.field_name, binder, member.name
    )
}

impl CodeGenerator for RustGenerator {
    fn generate(&self, decls: &HandleDeclarations) -> CodegenResult<String> {
        let mut out = CodeWriter::new();
        out.add_line(HEADER);
        out.add_line("");

        match &decls.module_name {
            Some(module) => {
                out.block(&format!("pub mod {} {{", module), "}", |out| {
                    self.generate_body(decls, out);
                });
            }
            None => self.generate_body(decls, &mut out),
        }
        Ok(out.finish())
    }

    fn file_extension(&self) -> &'static str {
        "rs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile, CompileOptions};
    use treeform_schema::load_sources;

    const SCHEMA: &str = r#"
        namespace "urn:notes" as notes;
        type noteType { attr text: string; attr type: string; child reply: noteType*; }
        root note: noteType;
    "#;

    fn render(options: &CompileOptions) -> String {
        let schemas = load_sources(&[("notes.tfs", SCHEMA)]).unwrap();
        RustGenerator::new()
            .generate(&compile(&schemas, options))
            .unwrap()
    }

    #[test]
    fn test_generate_type_struct() {
        let out = render(&CompileOptions::default());
        assert!(out.starts_with(HEADER));
        assert!(out.contains("pub mod notes {"));
        assert!(out.contains("    pub const NS: &str = \"urn:notes\";"));
        assert!(out.contains("    pub struct NoteType {\n        pub node_type: NodeType,\n        pub text: AttributeHandle,\n        pub r#type: AttributeHandle,\n        pub reply: ChildHandle,\n    }"));
        assert!(out.contains("let node_type = registry.bind_type(NS, \"noteType\")?;"));
        assert!(out.contains("r#type: node_type.bind_attribute(\"type\")?,"));
        assert!(out.contains("note_root: registry.bind_root(NS, \"note\")?,"));
    }

    #[test]
    fn test_outer_module() {
        let out = render(&CompileOptions::default().with_module_name("schema"));
        assert!(out.contains("pub mod schema {\n    use treeform_dom::"));
        assert!(out.contains("    pub mod notes {"));
        assert!(out.ends_with("}\n"));
    }
}
