//! # Generic Node
//!
//! The runtime tree node. Every attribute and child-list mutation goes
//! through [`Node`] and raises exactly one [`ChangeEvent`] on success.
//!
//! ## Design
//!
//! - A node owns its children; the parent link is a weak back-reference used
//!   for traversal and detachment only.
//! - Attribute storage is one slot per flattened attribute; an empty slot
//!   reads as the attribute's default.
//! - Setting an attribute to the value it already reads as is a no-op and
//!   raises no event.
//! - Events bubble: observers on a node see events raised on it and on all
//!   of its descendants. Observers run after the mutation completes and
//!   after every internal borrow is released, so they may mutate the tree.
//! - Single-writer model: a tree belongs to one thread (`Node` is `!Send`).

use crate::adapters::{AdapterKey, AdapterPolicy, CachedAdapter};
use crate::error::{DomResult, StructuralError, TypeMismatchError, ValidationError};
use crate::events::{ChangeEvent, ChildLocation, Observer, SubscriptionId};
use crate::registry::{AttributeHandle, ChildHandle, NodeType};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use treeform_schema::Value;

type Subscribers = Vec<(SubscriptionId, Rc<dyn Observer>)>;

/// A document tree node
#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

/// Non-owning reference to a [`Node`]
#[derive(Clone, Default)]
pub struct WeakNode(Weak<RefCell<NodeData>>);

pub(crate) struct NodeData {
    node_type: NodeType,
    attributes: Vec<Option<Value>>,
    children: Vec<Vec<Node>>,
    parent: Option<ParentLink>,
    root_element: Option<ChildHandle>,
    observers: Subscribers,
    adapters: HashMap<AdapterKey, CachedAdapter>,
}

struct ParentLink {
    node: WeakNode,
    slot: ChildHandle,
}

impl Node {
    /// Create a detached node. Abstract types cannot be instantiated.
    pub fn new(node_type: &NodeType) -> Result<Node, StructuralError> {
        if node_type.is_abstract() {
            return Err(StructuralError::AbstractType {
                type_name: node_type.to_string(),
            });
        }
        Ok(Node::from_type(node_type.clone()))
    }

    /// Create the top node of a document for a root element
    pub fn new_root(root: &ChildHandle) -> Result<Node, StructuralError> {
        let node_type = root
            .root_type()
            .ok_or_else(|| StructuralError::NotARootElement {
                handle: root.to_string(),
            })?;
        let node = Node::new(node_type)?;
        node.0.borrow_mut().root_element = Some(root.clone());
        Ok(node)
    }

    fn from_type(node_type: NodeType) -> Node {
        Node(Rc::new(RefCell::new(NodeData {
            attributes: vec![None; node_type.attributes().len()],
            children: vec![Vec::new(); node_type.children().len()],
            node_type,
            parent: None,
            root_element: None,
            observers: Vec::new(),
            adapters: HashMap::new(),
        })))
    }

    pub fn node_type(&self) -> NodeType {
        self.0.borrow().node_type.clone()
    }

    /// Root element this node was created for, if it is a document root
    pub fn root_element(&self) -> Option<ChildHandle> {
        self.0.borrow().root_element.clone()
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address-based identity, stable while the node is alive
    pub fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    // Attributes

    /// Stored value, or the attribute's default when unset
    pub fn get_attribute(&self, attribute: &AttributeHandle) -> Result<Value, TypeMismatchError> {
        let data = self.0.borrow();
        let handle = data.node_type.resolve_attribute(attribute)?;
        Ok(data.attributes[handle.slot()]
            .clone()
            .unwrap_or_else(|| handle.definition().default.clone()))
    }

    /// Stored value only; `None` when the attribute reads as its default
    pub fn local_attribute(
        &self,
        attribute: &AttributeHandle,
    ) -> Result<Option<Value>, TypeMismatchError> {
        let data = self.0.borrow();
        let handle = data.node_type.resolve_attribute(attribute)?;
        Ok(data.attributes[handle.slot()].clone())
    }

    pub fn is_attribute_default(
        &self,
        attribute: &AttributeHandle,
    ) -> Result<bool, TypeMismatchError> {
        let data = self.0.borrow();
        let handle = data.node_type.resolve_attribute(attribute)?;
        Ok(match &data.attributes[handle.slot()] {
            Some(value) => *value == handle.definition().default,
            None => true,
        })
    }

    /// Validate and store a value, raising `AttributeChanged` if the
    /// observable value changes
    pub fn set_attribute(
        &self,
        attribute: &AttributeHandle,
        value: impl Into<Value>,
    ) -> DomResult<()> {
        let value = value.into();
        let node_type = self.node_type();
        let handle = node_type.resolve_attribute(attribute)?.clone();
        let def = handle.definition();
        def.check(&value).map_err(|source| ValidationError {
            attribute: def.name.clone(),
            type_name: node_type.to_string(),
            source,
        })?;

        let old_value = {
            let mut data = self.0.borrow_mut();
            let stored = &mut data.attributes[handle.slot()];
            let old_value = stored.clone().unwrap_or_else(|| def.default.clone());
            if old_value == value {
                return Ok(());
            }
            *stored = Some(value.clone());
            old_value
        };

        self.notify(ChangeEvent::AttributeChanged {
            node: self.clone(),
            attribute: handle,
            old_value,
            new_value: value,
        });
        Ok(())
    }

    /// Set the value only while the attribute still reads as its default
    pub fn set_attribute_if_default(
        &self,
        attribute: &AttributeHandle,
        value: impl Into<Value>,
    ) -> DomResult<()> {
        if self.is_attribute_default(attribute)? {
            self.set_attribute(attribute, value)?;
        }
        Ok(())
    }

    /// Clear the stored value so the attribute reads as its default again
    pub fn reset_attribute(&self, attribute: &AttributeHandle) -> DomResult<()> {
        let node_type = self.node_type();
        let handle = node_type.resolve_attribute(attribute)?.clone();
        let default = handle.definition().default.clone();

        let previous = self.0.borrow_mut().attributes[handle.slot()].take();
        match previous {
            Some(old_value) if old_value != default => {
                self.notify(ChangeEvent::AttributeChanged {
                    node: self.clone(),
                    attribute: handle,
                    old_value,
                    new_value: default,
                });
            }
            _ => {}
        }
        Ok(())
    }

    /// Stored value of the type's id attribute, if set and non-empty
    pub fn id(&self) -> Option<String> {
        let data = self.0.borrow();
        let handle = data.node_type.id_attribute()?;
        match &data.attributes[handle.slot()] {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            _ => None,
        }
    }

    // Children

    /// Live view of a child slot
    pub fn children(&self, slot: &ChildHandle) -> Result<ChildList, TypeMismatchError> {
        let position = self.node_type().resolve_child(slot)?;
        Ok(ChildList {
            parent: self.clone(),
            slot: slot.clone(),
            position,
        })
    }

    /// The child of a single-valued slot
    pub fn child(&self, slot: &ChildHandle) -> DomResult<Option<Node>> {
        let position = self.node_type().resolve_child(slot)?;
        if slot.is_list() {
            return Err(StructuralError::NotSingleSlot {
                slot: slot.name().to_string(),
            }
            .into());
        }
        Ok(self.0.borrow().children[position].first().cloned())
    }

    /// All children in slot order, then insertion order within each slot
    pub fn children_all(&self) -> Vec<Node> {
        self.0.borrow().children.iter().flatten().cloned().collect()
    }

    pub fn insert_child(&self, slot: &ChildHandle, index: usize, child: &Node) -> DomResult<()> {
        let position = self.node_type().resolve_child(slot)?;
        self.check_attachable(slot, child)?;

        {
            let mut data = self.0.borrow_mut();
            let list = &mut data.children[position];
            if index > list.len() {
                return Err(StructuralError::IndexOutOfBounds {
                    slot: slot.name().to_string(),
                    index,
                    len: list.len(),
                }
                .into());
            }
            if !slot.occurs().admits_more(list.len()) {
                return Err(StructuralError::MaxOccursExceeded {
                    slot: slot.name().to_string(),
                    max: slot.occurs().max.unwrap_or(u32::MAX),
                }
                .into());
            }
            list.insert(index, child.clone());
        }

        {
            let mut child_data = child.0.borrow_mut();
            child_data.parent = Some(ParentLink {
                node: self.downgrade(),
                slot: slot.clone(),
            });
            child_data.root_element = None;
        }
        child.drop_adapters(Some(AdapterPolicy::PositionDependent));

        self.notify(ChangeEvent::ChildInserted {
            parent: self.clone(),
            slot: slot.clone(),
            index,
            child: child.clone(),
        });
        Ok(())
    }

    pub fn append_child(&self, slot: &ChildHandle, child: &Node) -> DomResult<()> {
        let len = self.children(slot)?.len();
        self.insert_child(slot, len, child)
    }

    /// Detach and return the child at `index`
    pub fn remove_child(&self, slot: &ChildHandle, index: usize) -> DomResult<Node> {
        let position = self.node_type().resolve_child(slot)?;
        {
            let data = self.0.borrow();
            let len = data.children[position].len();
            if index >= len {
                return Err(StructuralError::IndexOutOfBounds {
                    slot: slot.name().to_string(),
                    index,
                    len,
                }
                .into());
            }
            let min = slot.occurs().min;
            if len <= min as usize {
                return Err(StructuralError::MinOccursViolated {
                    slot: slot.name().to_string(),
                    min,
                }
                .into());
            }
        }

        Ok(self.detach_and_notify(slot, position, index))
    }

    /// Replace the content of a single-valued slot
    ///
    /// Raises `ChildRemoved` for the previous child, then `ChildInserted`
    /// for the new one. Clearing a required slot fails.
    pub fn set_child(&self, slot: &ChildHandle, child: Option<&Node>) -> DomResult<()> {
        let position = self.node_type().resolve_child(slot)?;
        if slot.is_list() {
            return Err(StructuralError::NotSingleSlot {
                slot: slot.name().to_string(),
            }
            .into());
        }

        let existing = self.0.borrow().children[position].first().cloned();
        match (existing, child) {
            (None, None) => Ok(()),
            (Some(_), None) => self.remove_child(slot, 0).map(|_| ()),
            (Some(existing), Some(child)) if existing.ptr_eq(child) => Ok(()),
            (existing, Some(child)) => {
                self.check_attachable(slot, child)?;
                if existing.is_some() {
                    self.detach_and_notify(slot, position, 0);
                }
                self.insert_child(slot, 0, child)
            }
        }
    }

    /// Move an attached node to `index` of `slot` on this node as one
    /// operation, raising a single `ChildMoved`. `index` is the final
    /// position of the node.
    pub fn move_child(&self, slot: &ChildHandle, index: usize, child: &Node) -> DomResult<()> {
        let position = self.node_type().resolve_child(slot)?;
        self.check_type_allowed(slot, child)?;

        let (source, source_slot) = child.parent_link().ok_or(StructuralError::NotParented)?;
        if child.ptr_eq(self) || self.is_descendant_of(child) {
            return Err(StructuralError::Cycle.into());
        }
        let source_position = source.node_type().resolve_child(&source_slot)?;
        let from_index = child.index_in_parent().ok_or(StructuralError::NotParented)?;

        let same_list = source.ptr_eq(self) && source_slot == *slot;
        {
            let data = self.0.borrow();
            let len = data.children[position].len();
            let limit = if same_list { len.saturating_sub(1) } else { len };
            if index > limit {
                return Err(StructuralError::IndexOutOfBounds {
                    slot: slot.name().to_string(),
                    index,
                    len,
                }
                .into());
            }
            if !same_list && !slot.occurs().admits_more(len) {
                return Err(StructuralError::MaxOccursExceeded {
                    slot: slot.name().to_string(),
                    max: slot.occurs().max.unwrap_or(u32::MAX),
                }
                .into());
            }
        }
        if same_list && index == from_index {
            return Ok(());
        }
        if !same_list {
            let source_len = source.0.borrow().children[source_position].len();
            let min = source_slot.occurs().min;
            if source_len <= min as usize {
                return Err(StructuralError::MinOccursViolated {
                    slot: source_slot.name().to_string(),
                    min,
                }
                .into());
            }
        }

        let mut observers = source.collect_observers();

        source.0.borrow_mut().children[source_position].remove(from_index);
        self.0.borrow_mut().children[position].insert(index, child.clone());
        child.0.borrow_mut().parent = Some(ParentLink {
            node: self.downgrade(),
            slot: slot.clone(),
        });
        child.drop_adapters(Some(AdapterPolicy::PositionDependent));

        for (id, observer) in self.collect_observers() {
            if !observers.iter().any(|(seen, _)| *seen == id) {
                observers.push((id, observer));
            }
        }

        dispatch(
            &observers,
            &ChangeEvent::ChildMoved {
                child: child.clone(),
                from: ChildLocation {
                    parent: source,
                    slot: source_slot,
                    index: from_index,
                },
                to: ChildLocation {
                    parent: self.clone(),
                    slot: slot.clone(),
                    index,
                },
            },
        );
        Ok(())
    }

    /// Remove this node from its parent's child slot
    pub fn remove_from_parent(&self) -> DomResult<()> {
        let (parent, slot) = self.parent_link().ok_or(StructuralError::NotParented)?;
        let index = self.index_in_parent().ok_or(StructuralError::NotParented)?;
        parent.remove_child(&slot, index).map(|_| ())
    }

    fn check_type_allowed(&self, slot: &ChildHandle, child: &Node) -> DomResult<()> {
        let child_type = child.node_type();
        if child_type.registry_id() != slot.registry_id() {
            return Err(TypeMismatchError::ForeignRegistry {
                handle: slot.to_string(),
                node_type: child_type.to_string(),
            }
            .into());
        }
        if !slot.allows(&child_type) {
            return Err(StructuralError::TypeNotAllowed {
                slot: slot.name().to_string(),
                child_type: child_type.to_string(),
                allowed: slot.allowed_types().iter().map(|t| t.to_string()).collect(),
            }
            .into());
        }
        Ok(())
    }

    fn check_attachable(&self, slot: &ChildHandle, child: &Node) -> DomResult<()> {
        self.check_type_allowed(slot, child)?;
        if child.0.borrow().parent.is_some() {
            return Err(StructuralError::AlreadyParented.into());
        }
        if child.ptr_eq(self) || self.is_descendant_of(child) {
            return Err(StructuralError::Cycle.into());
        }
        Ok(())
    }

    fn detach_and_notify(&self, slot: &ChildHandle, position: usize, index: usize) -> Node {
        let child = self.0.borrow_mut().children[position].remove(index);
        child.0.borrow_mut().parent = None;
        for node in child.subtree() {
            node.drop_adapters(None);
        }

        self.notify(ChangeEvent::ChildRemoved {
            parent: self.clone(),
            slot: slot.clone(),
            index,
            child: child.clone(),
        });
        child
    }

    // Traversal

    pub fn parent(&self) -> Option<Node> {
        self.0
            .borrow()
            .parent
            .as_ref()
            .and_then(|link| link.node.upgrade())
    }

    fn parent_link(&self) -> Option<(Node, ChildHandle)> {
        let data = self.0.borrow();
        let link = data.parent.as_ref()?;
        Some((link.node.upgrade()?, link.slot.clone()))
    }

    /// Slot of the parent this node sits in
    pub fn containing_slot(&self) -> Option<ChildHandle> {
        self.parent_link().map(|(_, slot)| slot)
    }

    /// Position within the containing slot
    pub fn index_in_parent(&self) -> Option<usize> {
        let (parent, slot) = self.parent_link()?;
        let list = parent.children(&slot).ok()?;
        list.index_of(self)
    }

    /// Top-most ancestor, or this node when detached
    pub fn root(&self) -> Node {
        self.lineage().last().unwrap_or_else(|| self.clone())
    }

    /// This node followed by its ancestors
    pub fn lineage(&self) -> Lineage {
        Lineage {
            next: Some(self.clone()),
        }
    }

    /// Strict descendant test
    pub fn is_descendant_of(&self, ancestor: &Node) -> bool {
        self.lineage().skip(1).any(|n| n.ptr_eq(ancestor))
    }

    /// This node and all descendants in pre-order
    pub fn subtree(&self) -> Vec<Node> {
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            let children = node.children_all();
            out.push(node);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Detached copy of this subtree without observers or adapters
    pub fn deep_copy(&self) -> Node {
        let data = self.0.borrow();
        let copy = Node::from_type(data.node_type.clone());
        {
            let mut copy_data = copy.0.borrow_mut();
            copy_data.attributes = data.attributes.clone();
            copy_data.root_element = data.root_element.clone();
        }

        for (position, list) in data.children.iter().enumerate() {
            let slot = data.node_type.children()[position].clone();
            for child in list {
                let child_copy = child.deep_copy();
                child_copy.0.borrow_mut().parent = Some(ParentLink {
                    node: copy.downgrade(),
                    slot: slot.clone(),
                });
                copy.0.borrow_mut().children[position].push(child_copy);
            }
        }
        copy
    }

    // Observers

    pub fn subscribe(&self, observer: impl Observer + 'static) -> SubscriptionId {
        self.subscribe_rc(Rc::new(observer))
    }

    pub fn subscribe_rc(&self, observer: Rc<dyn Observer>) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.0.borrow_mut().observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut data = self.0.borrow_mut();
        let before = data.observers.len();
        data.observers.retain(|(existing, _)| *existing != id);
        data.observers.len() != before
    }

    fn collect_observers(&self) -> Subscribers {
        let mut observers = Vec::new();
        for node in self.lineage() {
            observers.extend(node.0.borrow().observers.iter().cloned());
        }
        observers
    }

    fn notify(&self, event: ChangeEvent) {
        let observers = self.collect_observers();
        tracing::trace!(observers = observers.len(), ?event, "dispatching change");
        dispatch(&observers, &event);
    }

    // Adapters

    /// Drop every cached adapter on this node
    pub fn invalidate_adapters(&self) {
        self.drop_adapters(None);
    }

    fn drop_adapters(&self, only: Option<AdapterPolicy>) {
        match only {
            None => self.0.borrow_mut().adapters.clear(),
            Some(policy) => {
                for node in self.subtree() {
                    node.0
                        .borrow_mut()
                        .adapters
                        .retain(|_, cached| cached.policy != policy);
                }
            }
        }
    }

    pub(crate) fn cached_adapter(&self, key: &AdapterKey) -> Option<Rc<dyn Any>> {
        self.0
            .borrow()
            .adapters
            .get(key)
            .map(|cached| Rc::clone(&cached.value))
    }

    pub(crate) fn cache_adapter(&self, key: AdapterKey, value: Rc<dyn Any>, policy: AdapterPolicy) {
        self.0
            .borrow_mut()
            .adapters
            .insert(key, CachedAdapter { value, policy });
    }
}

fn dispatch(observers: &Subscribers, event: &ChangeEvent) {
    for (_, observer) in observers {
        observer.on_event(event);
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(data) => write!(f, "Node({}#{:x})", data.node_type.local_name(), self.key()),
            Err(_) => write!(f, "Node(<borrowed>#{:x})", self.key()),
        }
    }
}

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }

    pub fn ptr_eq(&self, other: &WeakNode) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }

    pub fn points_to(&self, node: &Node) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&node.0))
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(node) => write!(f, "Weak{:?}", node),
            None => write!(f, "WeakNode(<dropped>)"),
        }
    }
}

/// Iterator over a node and its ancestors
pub struct Lineage {
    next: Option<Node>,
}

impl Iterator for Lineage {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}

/// Live view over one child slot of a node
///
/// Reads always reflect the slot's current contents.
#[derive(Clone)]
pub struct ChildList {
    parent: Node,
    slot: ChildHandle,
    position: usize,
}

impl ChildList {
    pub fn slot(&self) -> &ChildHandle {
        &self.slot
    }

    pub fn parent(&self) -> &Node {
        &self.parent
    }

    pub fn len(&self) -> usize {
        self.parent.0.borrow().children[self.position].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Node> {
        self.parent.0.borrow().children[self.position]
            .get(index)
            .cloned()
    }

    pub fn first(&self) -> Option<Node> {
        self.get(0)
    }

    pub fn last(&self) -> Option<Node> {
        self.parent.0.borrow().children[self.position]
            .last()
            .cloned()
    }

    pub fn index_of(&self, node: &Node) -> Option<usize> {
        self.parent.0.borrow().children[self.position]
            .iter()
            .position(|n| n.ptr_eq(node))
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.index_of(node).is_some()
    }

    /// Snapshot of the current contents
    pub fn to_vec(&self) -> Vec<Node> {
        self.parent.0.borrow().children[self.position].clone()
    }

    pub fn iter(&self) -> ChildIter<'_> {
        ChildIter {
            list: self,
            index: 0,
        }
    }

    pub fn insert(&self, index: usize, node: &Node) -> DomResult<()> {
        self.parent.insert_child(&self.slot, index, node)
    }

    pub fn push(&self, node: &Node) -> DomResult<()> {
        self.parent.append_child(&self.slot, node)
    }

    pub fn remove(&self, index: usize) -> DomResult<Node> {
        self.parent.remove_child(&self.slot, index)
    }
}

impl fmt::Debug for ChildList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

impl<'a> IntoIterator for &'a ChildList {
    type Item = Node;
    type IntoIter = ChildIter<'a>;

    fn into_iter(self) -> ChildIter<'a> {
        self.iter()
    }
}

/// Index-based iterator over a [`ChildList`]
pub struct ChildIter<'a> {
    list: &'a ChildList,
    index: usize,
}

impl Iterator for ChildIter<'_> {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let node = self.list.get(self.index)?;
        self.index += 1;
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomError;
    use crate::TypeRegistry;

    const LIBRARY: &str = r#"
        namespace "urn:library" as lib;
        type library { child shelf: shelf*; child catalog: catalog?; }
        type shelf { attr label: string id; attr capacity: int = 10 range(0, 100); child book: book [0..2]; }
        type book { attr title: string; attr genre: enum("fiction", "science") = "fiction"; child cover: cover; }
        type cover { attr color: string = "white"; }
        type catalog {}
        root library: library;
    "#;

    struct Fixture {
        types: TypeRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                types: TypeRegistry::from_sources(&[("library.tfs", LIBRARY)]).unwrap(),
            }
        }

        fn node(&self, name: &str) -> Node {
            Node::new(&self.types.resolve("urn:library", name).unwrap()).unwrap()
        }

        fn attr(&self, type_name: &str, name: &str) -> AttributeHandle {
            self.types
                .resolve("urn:library", type_name)
                .unwrap()
                .attribute(name)
                .unwrap()
                .clone()
        }

        fn slot(&self, type_name: &str, name: &str) -> ChildHandle {
            self.types
                .resolve("urn:library", type_name)
                .unwrap()
                .child(name)
                .unwrap()
                .clone()
        }
    }

    #[test]
    fn test_defaults_and_local_values() {
        let fx = Fixture::new();
        let shelf = fx.node("shelf");
        let capacity = fx.attr("shelf", "capacity");

        assert_eq!(shelf.get_attribute(&capacity).unwrap(), Value::Int(10));
        assert_eq!(shelf.local_attribute(&capacity).unwrap(), None);
        assert!(shelf.is_attribute_default(&capacity).unwrap());

        shelf.set_attribute(&capacity, 20i64).unwrap();
        assert_eq!(shelf.get_attribute(&capacity).unwrap(), Value::Int(20));
        assert!(!shelf.is_attribute_default(&capacity).unwrap());

        shelf.reset_attribute(&capacity).unwrap();
        assert_eq!(shelf.local_attribute(&capacity).unwrap(), None);
    }

    #[test]
    fn test_invalid_value_leaves_state_unchanged() {
        let fx = Fixture::new();
        let shelf = fx.node("shelf");
        let capacity = fx.attr("shelf", "capacity");
        shelf.set_attribute(&capacity, 5i64).unwrap();

        let err = shelf.set_attribute(&capacity, 500i64).unwrap_err();
        assert!(matches!(err, DomError::Validation(_)));
        let err = shelf.set_attribute(&capacity, "many").unwrap_err();
        assert!(matches!(err, DomError::Validation(_)));
        assert_eq!(shelf.get_attribute(&capacity).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_unrelated_handle_is_type_mismatch() {
        let fx = Fixture::new();
        let book = fx.node("book");
        let capacity = fx.attr("shelf", "capacity");
        assert!(matches!(
            book.get_attribute(&capacity),
            Err(TypeMismatchError::UnrelatedType { .. })
        ));
        assert!(matches!(
            book.children(&fx.slot("shelf", "book")),
            Err(TypeMismatchError::UnrelatedType { .. })
        ));
    }

    #[test]
    fn test_abstract_and_root_creation() {
        let fx = Fixture::new();
        let root = fx.types.resolve_root("urn:library", "library").unwrap();
        let library = Node::new_root(&root).unwrap();
        assert_eq!(library.root_element(), Some(root));

        let slot = fx.slot("library", "shelf");
        assert!(matches!(
            Node::new_root(&slot),
            Err(StructuralError::NotARootElement { .. })
        ));
    }

    #[test]
    fn test_insert_rejects_wrong_type_without_partial_insert() {
        let fx = Fixture::new();
        let library = fx.node("library");
        let shelves = fx.slot("library", "shelf");
        let book = fx.node("book");

        let err = library.insert_child(&shelves, 0, &book).unwrap_err();
        assert!(matches!(
            err,
            DomError::Structural(StructuralError::TypeNotAllowed { .. })
        ));
        assert!(library.children(&shelves).unwrap().is_empty());
        assert!(book.parent().is_none());
    }

    #[test]
    fn test_max_occurs_and_already_parented() {
        let fx = Fixture::new();
        let shelf = fx.node("shelf");
        let books = fx.slot("shelf", "book");
        let (a, b, c) = (fx.node("book"), fx.node("book"), fx.node("book"));

        shelf.append_child(&books, &a).unwrap();
        shelf.append_child(&books, &b).unwrap();
        assert!(matches!(
            shelf.append_child(&books, &c),
            Err(DomError::Structural(StructuralError::MaxOccursExceeded { max: 2, .. }))
        ));

        let other = fx.node("shelf");
        assert!(matches!(
            other.append_child(&books, &a),
            Err(DomError::Structural(StructuralError::AlreadyParented))
        ));
    }

    #[test]
    fn test_insert_then_remove_restores_sequence() {
        let fx = Fixture::new();
        let library = fx.node("library");
        let shelves = fx.slot("library", "shelf");
        let first = fx.node("shelf");
        let last = fx.node("shelf");
        library.append_child(&shelves, &first).unwrap();
        library.append_child(&shelves, &last).unwrap();

        let middle = fx.node("shelf");
        library.insert_child(&shelves, 1, &middle).unwrap();
        assert_eq!(middle.index_in_parent(), Some(1));

        let removed = library.remove_child(&shelves, 1).unwrap();
        assert!(removed.ptr_eq(&middle));
        assert!(middle.parent().is_none());
        assert_eq!(library.children(&shelves).unwrap().to_vec(), vec![first, last]);
    }

    #[test]
    fn test_min_occurs_blocks_removal() {
        let fx = Fixture::new();
        let book = fx.node("book");
        let cover_slot = fx.slot("book", "cover");
        book.set_child(&cover_slot, Some(&fx.node("cover"))).unwrap();

        assert!(matches!(
            book.remove_child(&cover_slot, 0),
            Err(DomError::Structural(StructuralError::MinOccursViolated { min: 1, .. }))
        ));

        // Replacing keeps the slot filled
        let replacement = fx.node("cover");
        book.set_child(&cover_slot, Some(&replacement)).unwrap();
        assert_eq!(book.child(&cover_slot).unwrap(), Some(replacement));
    }

    #[test]
    fn test_cycles_are_rejected() {
        let types = TypeRegistry::from_sources(&[(
            "tree.tfs",
            r#"namespace "urn:tree" as t; type branch { child sub: branch*; }"#,
        )])
        .unwrap();
        let branch = types.resolve("urn:tree", "branch").unwrap();
        let sub = branch.child("sub").unwrap().clone();
        let top = Node::new(&branch).unwrap();
        let mid = Node::new(&branch).unwrap();
        let leaf = Node::new(&branch).unwrap();
        top.append_child(&sub, &mid).unwrap();
        mid.append_child(&sub, &leaf).unwrap();

        assert!(matches!(
            top.append_child(&sub, &top),
            Err(DomError::Structural(StructuralError::Cycle))
        ));
        assert!(matches!(
            leaf.move_child(&sub, 0, &mid),
            Err(DomError::Structural(StructuralError::Cycle))
        ));
        assert!(leaf.is_descendant_of(&top));
        assert!(!top.is_descendant_of(&top));
        assert!(leaf.root().ptr_eq(&top));
    }

    #[test]
    fn test_move_within_slot_uses_final_position() {
        let fx = Fixture::new();
        let library = fx.node("library");
        let shelves = fx.slot("library", "shelf");
        let nodes: Vec<_> = (0..3).map(|_| fx.node("shelf")).collect();
        for n in &nodes {
            library.append_child(&shelves, n).unwrap();
        }

        library.move_child(&shelves, 2, &nodes[0]).unwrap();
        let order = library.children(&shelves).unwrap().to_vec();
        assert_eq!(order, vec![nodes[1].clone(), nodes[2].clone(), nodes[0].clone()]);

        assert!(matches!(
            library.move_child(&shelves, 3, &nodes[0]),
            Err(DomError::Structural(StructuralError::IndexOutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_children_view_is_live() {
        let fx = Fixture::new();
        let library = fx.node("library");
        let shelves = fx.slot("library", "shelf");
        let view = library.children(&shelves).unwrap();
        assert_eq!(view.len(), 0);

        view.push(&fx.node("shelf")).unwrap();
        library.append_child(&shelves, &fx.node("shelf")).unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view.iter().count(), 2);
    }

    #[test]
    fn test_deep_copy_is_detached() {
        let fx = Fixture::new();
        let shelf = fx.node("shelf");
        let label = fx.attr("shelf", "label");
        shelf.set_attribute(&label, "A").unwrap();
        let books = fx.slot("shelf", "book");
        shelf.append_child(&books, &fx.node("book")).unwrap();

        let copy = shelf.deep_copy();
        assert!(!copy.ptr_eq(&shelf));
        assert!(copy.parent().is_none());
        assert_eq!(copy.id(), Some("A".to_string()));
        let copied_book = copy.children(&books).unwrap().first().unwrap();
        assert!(copied_book.parent().unwrap().ptr_eq(&copy));
        assert_eq!(copy.subtree().len(), 2);
    }

    #[test]
    fn test_set_equal_value_is_silent() {
        let fx = Fixture::new();
        let shelf = fx.node("shelf");
        let capacity = fx.attr("shelf", "capacity");
        let count = Rc::new(std::cell::Cell::new(0));
        let seen = Rc::clone(&count);
        shelf.subscribe(move |_: &ChangeEvent| seen.set(seen.get() + 1));

        shelf.set_attribute(&capacity, 10i64).unwrap();
        assert_eq!(count.get(), 0);
        assert_eq!(shelf.local_attribute(&capacity).unwrap(), None);

        shelf.set_attribute(&capacity, 11i64).unwrap();
        shelf.set_attribute(&capacity, 11i64).unwrap();
        assert_eq!(count.get(), 1);
    }
}
