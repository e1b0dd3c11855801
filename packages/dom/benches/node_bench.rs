use criterion::{black_box, criterion_group, criterion_main, Criterion};
use treeform_dom::{Node, TypeRegistry, Value};

const SCENE: &str = r#"
    namespace "urn:bench:scene" as sc;
    type sceneType { child object: objectType*; }
    type objectType {
        attr name: string id;
        attr x: float = 0.0;
        attr y: float = 0.0;
        attr visible: bool = true;
        child object: objectType*;
    }
    root scene: sceneType;
"#;

fn registry() -> TypeRegistry {
    TypeRegistry::from_sources(&[("scene.tfs", SCENE)]).unwrap()
}

fn bind_registry(c: &mut Criterion) {
    c.bench_function("bind_registry", |b| {
        b.iter(|| TypeRegistry::from_sources(black_box(&[("scene.tfs", SCENE)])))
    });
}

fn attribute_access(c: &mut Criterion) {
    let types = registry();
    let object_type = types.resolve("urn:bench:scene", "objectType").unwrap();
    let x = object_type.attribute("x").unwrap().clone();
    let node = Node::new(&object_type).unwrap();

    c.bench_function("get_attribute_default", |b| {
        b.iter(|| node.get_attribute(black_box(&x)))
    });

    let mut value = 0.0;
    c.bench_function("set_attribute", |b| {
        b.iter(|| {
            value += 1.0;
            node.set_attribute(&x, Value::float(black_box(value)))
        })
    });
}

fn build_tree(c: &mut Criterion) {
    let types = registry();
    let scene = types.resolve_root("urn:bench:scene", "scene").unwrap();
    let scene_type = types.resolve("urn:bench:scene", "sceneType").unwrap();
    let object_type = types.resolve("urn:bench:scene", "objectType").unwrap();
    let objects = scene_type.child("object").unwrap().clone();
    let nested = object_type.child("object").unwrap().clone();

    c.bench_function("build_tree_100x10", |b| {
        b.iter(|| {
            let root = Node::new_root(&scene).unwrap();
            for _ in 0..100 {
                let parent = Node::new(&object_type).unwrap();
                for _ in 0..10 {
                    parent
                        .append_child(&nested, &Node::new(&object_type).unwrap())
                        .unwrap();
                }
                root.append_child(&objects, &parent).unwrap();
            }
            black_box(root)
        })
    });
}

criterion_group!(benches, bind_registry, attribute_access, build_tree);
criterion_main!(benches);
