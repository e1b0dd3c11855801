//! Integration tests for schema loading

use treeform_schema::{
    load_sources, resolve, Annotation, Occurs, QualifiedName, SchemaDocument, SchemaError, Value,
    ValueKind,
};

const TIMELINE: &str = r#"
namespace "http://treeform.dev/timeline" as tl;

type eventSequenceType {
    child event: eventType*;
}

type eventType {
    attr name: string = "";
    attr time: int = 0;
    attr duration: int = 0 range(0, _);
    child resource: resourceType*;
}

@include
type resourceType {
    attr name: string id;
    @exclude attr size: int = 0;
    attr tags: list<string>;
}

type textureType extends resourceType {
    attr compressed: bool = true;
}

root eventSequence: eventSequenceType;
"#;

const TIMELINE_JSON: &str = r#"{
    "namespace": "http://treeform.dev/timeline",
    "prefix": "tl",
    "types": [
        { "name": "eventSequenceType",
          "children": [{ "name": "event", "types": ["eventType"], "occurs": { "min": 0, "max": null } }] },
        { "name": "eventType",
          "attributes": [
            { "name": "name", "kind": { "kind": "string" }, "default": "" },
            { "name": "time", "kind": { "kind": "int" }, "default": 0 },
            { "name": "duration", "kind": { "kind": "int" }, "default": 0, "range": { "min": 0, "max": null } }
          ],
          "children": [{ "name": "resource", "types": ["resourceType"], "occurs": { "min": 0, "max": null } }] },
        { "name": "resourceType", "annotation": "include",
          "attributes": [
            { "name": "name", "kind": { "kind": "string" }, "id": true },
            { "name": "size", "kind": { "kind": "int" }, "default": 0, "annotation": "exclude" },
            { "name": "tags", "kind": { "kind": "list", "item": "string" } }
          ] },
        { "name": "textureType", "base": "resourceType",
          "attributes": [{ "name": "compressed", "kind": { "kind": "bool" }, "default": true }] }
    ],
    "roots": [{ "name": "eventSequence", "type": "eventSequenceType" }]
}"#;

#[test]
fn test_load_timeline_schema() {
    let set = load_sources(&[("timeline.tfs", TIMELINE)]).unwrap();
    let ns = set.namespace("http://treeform.dev/timeline").unwrap();

    let type_names: Vec<_> = ns.types.iter().map(|t| t.name.name.as_str()).collect();
    assert_eq!(
        type_names,
        vec!["eventSequenceType", "eventType", "resourceType", "textureType"]
    );

    let event = ns.type_def("eventType").unwrap();
    assert_eq!(event.attribute("time").unwrap().default, Value::Int(0));
    assert_eq!(event.child("resource").unwrap().occurs, Occurs::MANY);

    let texture = ns.type_def("textureType").unwrap();
    assert_eq!(texture.attributes.len(), 4);
    assert_eq!(texture.id_attribute().unwrap().name, "name");
    assert_eq!(texture.declared_attributes().count(), 1);

    let resource = ns.type_def("resourceType").unwrap();
    assert_eq!(resource.annotation, Some(Annotation::Include));
    assert_eq!(
        resource.attribute("size").unwrap().annotation,
        Some(Annotation::Exclude)
    );

    let root = ns.root("eventSequence").unwrap();
    assert_eq!(
        root.type_name,
        QualifiedName::new("http://treeform.dev/timeline", "eventSequenceType")
    );
}

#[test]
fn test_json_and_tfs_resolve_identically() {
    let from_tfs = load_sources(&[("timeline.tfs", TIMELINE)]).unwrap();
    let from_json = load_sources(&[("timeline.json", TIMELINE_JSON)]).unwrap();
    assert_eq!(from_tfs, from_json);
}

#[test]
fn test_parse_errors_name_the_source() {
    let err = load_sources(&[("broken.tfs", "namespace \"urn:x\" as x; type {")]).unwrap_err();
    match err {
        SchemaError::Parse { file, .. } => assert_eq!(file, "broken.tfs"),
        other => panic!("expected parse error, got {other}"),
    }
}

#[test]
fn test_resolution_is_deterministic() {
    let first = load_sources(&[("timeline.tfs", TIMELINE)]).unwrap();
    let second = load_sources(&[("timeline.tfs", TIMELINE)]).unwrap();
    let order = |set: &treeform_schema::SchemaSet| {
        set.types_in_dependency_order()
            .map(|t| t.name.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(order(&first), order(&second));
}

#[test]
fn test_programmatic_documents() {
    use treeform_schema::ast::{AttributeDecl, AttributeKindDecl, TypeDecl};

    let mut doc = SchemaDocument::new("urn:prog", "p");
    let mut ty = TypeDecl::new("thing");
    ty.attributes
        .push(AttributeDecl::new("mode", AttributeKindDecl::Enum {
            values: vec!["on".into(), "off".into()],
        }));
    doc.types.push(ty);

    let set = resolve(&[doc]).unwrap();
    let thing = set.lookup("urn:prog", "thing").unwrap();
    assert!(matches!(thing.attributes[0].kind, ValueKind::Enum { .. }));
    assert_eq!(thing.attributes[0].default, Value::from("on"));
}
