//! # Adapter Registry
//!
//! Typed views ("capabilities") over generic nodes.
//!
//! ## Design
//!
//! - A capability is any `'static` Rust type. Factories are registered per
//!   node type and found by walking the node's type lineage, most-derived
//!   first.
//! - The adapter a factory returns is cached on the node. Removal from the
//!   tree drops every cached adapter in the removed subtree; insertion or a
//!   move drops only [`AdapterPolicy::PositionDependent`] adapters.
//! - Adapters are views, not copies: they read and write through the node's
//!   handles. They should hold a [`WeakNode`](crate::WeakNode); a strong
//!   [`Node`] inside a cached adapter keeps the node alive forever.

use crate::node::Node;
use crate::registry::{NodeType, RegistryId};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ADAPTER_REGISTRY: AtomicU64 = AtomicU64::new(1);

/// Whether a cached adapter survives changes of tree position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterPolicy {
    /// Valid for the node's whole lifetime in a tree
    Stable,
    /// Rebuilt after the node is attached, detached or moved
    PositionDependent,
}

pub(crate) type AdapterKey = (u64, TypeId);

pub(crate) struct CachedAdapter {
    pub(crate) value: Rc<dyn Any>,
    pub(crate) policy: AdapterPolicy,
}

type FactoryFn = Box<dyn Fn(&Node) -> Rc<dyn Any>>;

struct Factory {
    capability: &'static str,
    policy: AdapterPolicy,
    create: FactoryFn,
}

/// Per node type table of capability factories
pub struct AdapterRegistry {
    id: u64,
    factories: HashMap<(RegistryId, usize, TypeId), Factory>,
    /// Definition order, for deterministic capability listings
    declared: Vec<(RegistryId, usize, TypeId)>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            id: NEXT_ADAPTER_REGISTRY.fetch_add(1, Ordering::Relaxed),
            factories: HashMap::new(),
            declared: Vec::new(),
        }
    }

    /// Declare that nodes of `node_type` (and its subtypes) support
    /// capability `T`. A later definition for the same pair replaces the
    /// earlier one.
    pub fn define<T, F>(&mut self, node_type: &NodeType, policy: AdapterPolicy, factory: F) -> &mut Self
    where
        T: Any,
        F: Fn(&Node) -> T + 'static,
    {
        let key = (node_type.registry_id(), node_type.index(), TypeId::of::<T>());
        let create: FactoryFn = Box::new(move |node| Rc::new(factory(node)) as Rc<dyn Any>);
        let previous = self.factories.insert(
            key,
            Factory {
                capability: type_name::<T>(),
                policy,
                create,
            },
        );
        if previous.is_none() {
            self.declared.push(key);
        }
        self
    }

    /// Resolve capability `T` for `node`, creating and caching it on first use
    pub fn adapt<T: Any>(&self, node: &Node) -> Option<Rc<T>> {
        let cache_key = (self.id, TypeId::of::<T>());
        if let Some(cached) = node.cached_adapter(&cache_key) {
            return cached.downcast::<T>().ok();
        }

        let node_type = node.node_type();
        let factory = node_type.lineage().find_map(|t| {
            self.factories
                .get(&(t.registry_id(), t.index(), TypeId::of::<T>()))
        })?;

        let adapter = (factory.create)(node);
        node.cache_adapter(cache_key, Rc::clone(&adapter), factory.policy);
        tracing::debug!(
            capability = factory.capability,
            node_type = %node_type,
            "created adapter"
        );

        adapter.downcast::<T>().ok()
    }

    /// Whether any type in the node's lineage declares capability `T`
    pub fn supports<T: Any>(&self, node_type: &NodeType) -> bool {
        node_type.lineage().any(|t| {
            self.factories
                .contains_key(&(t.registry_id(), t.index(), TypeId::of::<T>()))
        })
    }

    /// Capability names declared along the lineage, most-derived type first
    pub fn capabilities(&self, node_type: &NodeType) -> Vec<&'static str> {
        let mut seen = Vec::new();
        let mut names = Vec::new();
        for t in node_type.lineage() {
            for key in &self.declared {
                let (registry, index, capability) = *key;
                if registry == t.registry_id() && index == t.index() && !seen.contains(&capability) {
                    seen.push(capability);
                    names.push(self.factories[key].capability);
                }
            }
        }
        names
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TypeRegistry, WeakNode};
    use treeform_schema::Value;

    const ZOO: &str = r#"
        namespace "urn:zoo" as z;
        type animal { attr name: string; attr legs: int = 4; child young: animal*; }
        type bird extends animal { attr legs: int = 2; }
        type enclosure { child resident: animal*; }
    "#;

    struct Named {
        node: WeakNode,
    }

    impl Named {
        fn name(&self) -> Option<Value> {
            let node = self.node.upgrade()?;
            let handle = node.node_type().attribute("name")?.clone();
            node.get_attribute(&handle).ok()
        }
    }

    struct Flyer;

    struct Depth(usize);

    fn setup() -> (TypeRegistry, AdapterRegistry) {
        let types = TypeRegistry::from_sources(&[("zoo.tfs", ZOO)]).unwrap();
        let animal = types.resolve("urn:zoo", "animal").unwrap();
        let bird = types.resolve("urn:zoo", "bird").unwrap();

        let mut adapters = AdapterRegistry::new();
        adapters
            .define(&animal, AdapterPolicy::Stable, |node| Named {
                node: node.downgrade(),
            })
            .define(&bird, AdapterPolicy::Stable, |_| Flyer)
            .define(&animal, AdapterPolicy::PositionDependent, |node| {
                Depth(node.lineage().count())
            });
        (types, adapters)
    }

    #[test]
    fn test_lineage_walk_finds_base_factory() {
        let (types, adapters) = setup();
        let bird = Node::new(&types.resolve("urn:zoo", "bird").unwrap()).unwrap();
        let name = bird.node_type().attribute("name").unwrap().clone();
        bird.set_attribute(&name, "robin").unwrap();

        let named = adapters.adapt::<Named>(&bird).unwrap();
        assert_eq!(named.name(), Some(Value::from("robin")));
        assert!(adapters.adapt::<Flyer>(&bird).is_some());

        let dog = Node::new(&types.resolve("urn:zoo", "animal").unwrap()).unwrap();
        assert!(adapters.adapt::<Flyer>(&dog).is_none());
    }

    #[test]
    fn test_adapters_are_cached_per_node() {
        let (types, adapters) = setup();
        let animal = Node::new(&types.resolve("urn:zoo", "animal").unwrap()).unwrap();
        let first = adapters.adapt::<Named>(&animal).unwrap();
        let second = adapters.adapt::<Named>(&animal).unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        animal.invalidate_adapters();
        let third = adapters.adapt::<Named>(&animal).unwrap();
        assert!(!Rc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_position_dependent_adapters_follow_moves() {
        let (types, adapters) = setup();
        let enclosure_type = types.resolve("urn:zoo", "enclosure").unwrap();
        let animal_type = types.resolve("urn:zoo", "animal").unwrap();
        let resident = enclosure_type.child("resident").unwrap().clone();
        let young = animal_type.child("young").unwrap().clone();

        let enclosure = Node::new(&enclosure_type).unwrap();
        let parent = Node::new(&animal_type).unwrap();
        let cub = Node::new(&animal_type).unwrap();
        enclosure.append_child(&resident, &parent).unwrap();
        enclosure.append_child(&resident, &cub).unwrap();

        let named_before = adapters.adapt::<Named>(&cub).unwrap();
        assert_eq!(adapters.adapt::<Depth>(&cub).unwrap().0, 2);

        parent.move_child(&young, 0, &cub).unwrap();

        assert_eq!(adapters.adapt::<Depth>(&cub).unwrap().0, 3);
        let named_after = adapters.adapt::<Named>(&cub).unwrap();
        assert!(Rc::ptr_eq(&named_before, &named_after));
    }

    #[test]
    fn test_removal_drops_all_cached_adapters() {
        let (types, adapters) = setup();
        let enclosure_type = types.resolve("urn:zoo", "enclosure").unwrap();
        let resident = enclosure_type.child("resident").unwrap().clone();
        let enclosure = Node::new(&enclosure_type).unwrap();
        let animal = Node::new(&types.resolve("urn:zoo", "animal").unwrap()).unwrap();
        enclosure.append_child(&resident, &animal).unwrap();

        let before = adapters.adapt::<Named>(&animal).unwrap();
        enclosure.remove_child(&resident, 0).unwrap();
        let after = adapters.adapt::<Named>(&animal).unwrap();
        assert!(!Rc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_capability_listing() {
        let (types, adapters) = setup();
        let bird = types.resolve("urn:zoo", "bird").unwrap();
        let enclosure = types.resolve("urn:zoo", "enclosure").unwrap();

        let caps = adapters.capabilities(&bird);
        assert_eq!(caps.len(), 3);
        assert!(caps[0].ends_with("Flyer"));
        assert!(adapters.supports::<Named>(&bird));
        assert!(adapters.capabilities(&enclosure).is_empty());
    }
}
