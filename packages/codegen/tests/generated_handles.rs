//! Generated handle declarations used as real Rust
//!
//! This tests:
//! - The checked-in fixture still matches the generator byte for byte
//! - The fixture compiles as part of this test crate
//! - Keyword and reserved-name fields bind and drive node operations

use treeform_codegen::{compile, CodeGenerator, CompileOptions, RustGenerator};
use treeform_dom::{Node, TypeRegistry, Value};
use treeform_schema::load_sources;

include!("fixtures/notes_handles.rs");

const NOTES: &str = r#"
    namespace "urn:notes" as notes;
    type noteType {
        attr text: string;
        attr type: string;
        attr nodeType: string;
        child reply: noteType*;
    }
    root note: noteType;
"#;

#[test]
fn test_fixture_matches_generator() {
    let schemas = load_sources(&[("notes.tfs", NOTES)]).unwrap();
    let decls = compile(&schemas, &CompileOptions::default().with_module_name("schema"));
    let source = RustGenerator::new().generate(&decls).unwrap();
    assert_eq!(source, include_str!("fixtures/notes_handles.rs"));
}

#[test]
fn test_generated_handles_drive_nodes() {
    let registry = TypeRegistry::from_sources(&[("notes.tfs", NOTES)]).unwrap();
    let handles = schema::notes::Handles::bind(&registry).unwrap();
    let note = &handles.note_type;

    let root = Node::new_root(&handles.note_root).unwrap();
    assert_eq!(root.node_type(), note.node_type);
    root.set_attribute(&note.r#type, "memo").unwrap();
    root.set_attribute(&note.node_type2, "plain").unwrap();

    let reply = Node::new(&note.node_type).unwrap();
    reply.set_attribute(&note.text, "ok").unwrap();
    root.append_child(&note.reply, &reply).unwrap();

    assert_eq!(root.get_attribute(&note.r#type).unwrap(), Value::from("memo"));
    assert_eq!(root.get_attribute(&note.node_type2).unwrap(), Value::from("plain"));
    assert_eq!(root.children(&note.reply).unwrap().len(), 1);
}

#[test]
fn test_generated_handles_reject_other_schemas() {
    let other = TypeRegistry::from_sources(&[(
        "other.tfs",
        r#"namespace "urn:other" as other; type noteType { attr text: string; }"#,
    )])
    .unwrap();
    assert!(schema::notes::Handles::bind(&other).is_err());
}
