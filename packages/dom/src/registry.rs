//! # Type Registry
//!
//! Binds a resolved [`SchemaSet`] into runtime descriptors: [`NodeType`],
//! [`AttributeHandle`] and [`ChildHandle`].
//!
//! ## Design
//!
//! - Types are built bases first, so a derived type reuses its base's handle
//!   objects for every inherited member. Handle equality is identity.
//! - An overriding attribute gets a new handle in the base attribute's slot;
//!   the base handle keeps working on derived nodes and reads the
//!   most-derived definition.
//! - Every descriptor carries its registry's [`RegistryId`], so handles from
//!   one registry are rejected by nodes of another.
//! - All descriptors are immutable and `Arc`-backed (`Send + Sync`).

use crate::error::{BindingError, TypeMismatchError};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use treeform_schema::{
    load_sources, parse_source, resolve, AttributeDef, ChildDef, Occurs, QualifiedName,
    SchemaDocument, SchemaError, SchemaResult, SchemaSet, TypeDef,
};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`TypeRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryId(u64);

impl RegistryId {
    fn next() -> Self {
        RegistryId(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Runtime type descriptors for one or more schema namespaces
#[derive(Clone)]
pub struct TypeRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    id: RegistryId,
    schemas: SchemaSet,
    types: Vec<NodeType>,
    by_name: HashMap<QualifiedName, usize>,
    roots: Vec<ChildHandle>,
}

impl TypeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Parse, resolve and bind named schema sources
    pub fn from_sources<N: AsRef<str>, S: AsRef<str>>(
        sources: &[(N, S)],
    ) -> SchemaResult<TypeRegistry> {
        Ok(Self::from_schema_set(load_sources(sources)?))
    }

    /// Bind an already resolved schema set
    pub fn from_schema_set(schemas: SchemaSet) -> TypeRegistry {
        let id = RegistryId::next();
        let by_name: HashMap<QualifiedName, usize> = schemas
            .types_in_dependency_order()
            .enumerate()
            .map(|(index, def)| (def.name.clone(), index))
            .collect();

        let mut types: Vec<NodeType> = Vec::with_capacity(by_name.len());
        for (index, def) in schemas.types_in_dependency_order().enumerate() {
            // Bases precede derived types in dependency order
            let base = def
                .base
                .as_ref()
                .and_then(|base| by_name.get(base))
                .and_then(|&i| types.get(i))
                .cloned();
            types.push(NodeType::build(id, index, def, base, &by_name));
        }

        let roots = schemas
            .roots()
            .filter_map(|root| {
                let node_type = by_name.get(&root.type_name).map(|&i| types[i].clone())?;
                Some(ChildHandle(Arc::new(ChildInfo {
                    registry: id,
                    name: root.name.clone(),
                    namespace: root.namespace.clone(),
                    slot: 0,
                    owner: HandleOwner::Root(node_type.clone()),
                    allowed: vec![node_type.index()],
                    allowed_names: vec![root.type_name.clone()],
                    occurs: Occurs::ONE,
                    def: None,
                })))
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            registry = id.0,
            types = types.len(),
            roots = roots.len(),
            "built type registry"
        );

        TypeRegistry {
            inner: Arc::new(RegistryInner {
                id,
                schemas,
                types,
                by_name,
                roots,
            }),
        }
    }

    pub fn id(&self) -> RegistryId {
        self.inner.id
    }

    pub fn schemas(&self) -> &SchemaSet {
        &self.inner.schemas
    }

    /// Every node type, bases before derived types
    pub fn types(&self) -> &[NodeType] {
        &self.inner.types
    }

    pub fn roots(&self) -> &[ChildHandle] {
        &self.inner.roots
    }

    /// `(uri, prefix)` of every loaded namespace, in load order
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .schemas
            .namespaces()
            .iter()
            .map(|ns| (ns.uri.as_str(), ns.prefix.as_str()))
    }

    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.namespaces()
            .find(|(uri, _)| *uri == namespace)
            .map(|(_, prefix)| prefix)
    }

    pub fn namespace_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.namespaces()
            .find(|(_, p)| *p == prefix)
            .map(|(uri, _)| uri)
    }

    pub fn resolve(&self, namespace: &str, type_name: &str) -> Option<NodeType> {
        self.resolve_qualified(&QualifiedName::new(namespace, type_name))
    }

    pub fn resolve_qualified(&self, name: &QualifiedName) -> Option<NodeType> {
        self.inner
            .by_name
            .get(name)
            .map(|&index| self.inner.types[index].clone())
    }

    pub fn resolve_root(&self, namespace: &str, element: &str) -> Option<ChildHandle> {
        self.inner
            .roots
            .iter()
            .find(|r| r.namespace() == namespace && r.name() == element)
            .cloned()
    }

    pub fn bind_type(&self, namespace: &str, name: &str) -> Result<NodeType, BindingError> {
        if self.inner.schemas.namespace(namespace).is_none() {
            return Err(BindingError::UnknownNamespace {
                namespace: namespace.to_string(),
            });
        }
        self.resolve(namespace, name)
            .ok_or_else(|| BindingError::UnknownType {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    pub fn bind_root(&self, namespace: &str, name: &str) -> Result<ChildHandle, BindingError> {
        self.resolve_root(namespace, name)
            .ok_or_else(|| BindingError::UnknownRoot {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    /// The node type at a registry-local index
    pub fn type_at(&self, index: usize) -> Option<&NodeType> {
        self.inner.types.get(index)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("id", &self.inner.id)
            .field("types", &self.inner.types.len())
            .field("roots", &self.inner.roots.len())
            .finish()
    }
}

/// Collects schema documents for a [`TypeRegistry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    documents: Vec<SchemaDocument>,
}

impl RegistryBuilder {
    pub fn add_source(self, source: &str) -> SchemaResult<Self> {
        self.add_named_source("<source>", source)
    }

    pub fn add_named_source(mut self, name: &str, source: &str) -> SchemaResult<Self> {
        let document = parse_source(source).map_err(|error| SchemaError::Parse {
            file: name.to_string(),
            error,
        })?;
        self.documents.push(document);
        Ok(self)
    }

    pub fn add_document(mut self, document: SchemaDocument) -> Self {
        self.documents.push(document);
        self
    }

    pub fn build(self) -> SchemaResult<TypeRegistry> {
        Ok(TypeRegistry::from_schema_set(resolve(&self.documents)?))
    }
}

/// Resolved descriptor of a node type with its inheritance flattened
#[derive(Clone)]
pub struct NodeType(Arc<NodeTypeData>);

struct NodeTypeData {
    registry: RegistryId,
    index: usize,
    def: TypeDef,
    base: Option<NodeType>,
    attributes: Vec<AttributeHandle>,
    children: Vec<ChildHandle>,
    attribute_index: HashMap<String, usize>,
    child_index: HashMap<String, usize>,
    /// Registry indices of this type and its bases, most-derived first
    lineage: Vec<usize>,
}

impl NodeType {
    fn build(
        registry: RegistryId,
        index: usize,
        def: &TypeDef,
        base: Option<NodeType>,
        by_name: &HashMap<QualifiedName, usize>,
    ) -> NodeType {
        let mut attributes = Vec::with_capacity(def.attributes.len());
        for (slot, attr) in def.attributes.iter().enumerate() {
            let inherited = base
                .as_ref()
                .and_then(|b| b.0.attributes.get(slot))
                .filter(|h| h.0.def.defining_type == attr.defining_type);
            let handle = match inherited {
                Some(handle) => handle.clone(),
                None => AttributeHandle(Arc::new(AttributeInfo {
                    registry,
                    owner_index: index,
                    owner: def.name.clone(),
                    slot,
                    def: attr.clone(),
                })),
            };
            attributes.push(handle);
        }

        let mut children = Vec::with_capacity(def.children.len());
        for (slot, child) in def.children.iter().enumerate() {
            let inherited = base.as_ref().and_then(|b| b.0.children.get(slot)).cloned();
            let handle = match inherited {
                Some(handle) => handle,
                None => ChildHandle(Arc::new(ChildInfo {
                    registry,
                    name: child.name.clone(),
                    namespace: def.name.namespace.clone(),
                    slot,
                    owner: HandleOwner::Type {
                        index,
                        name: def.name.clone(),
                    },
                    allowed: child
                        .allowed
                        .iter()
                        .filter_map(|name| by_name.get(name).copied())
                        .collect(),
                    allowed_names: child.allowed.clone(),
                    occurs: child.occurs,
                    def: Some(child.clone()),
                })),
            };
            children.push(handle);
        }

        let mut lineage = vec![index];
        if let Some(base) = &base {
            lineage.extend(base.0.lineage.iter().copied());
        }

        NodeType(Arc::new(NodeTypeData {
            registry,
            index,
            attribute_index: attributes
                .iter()
                .enumerate()
                .map(|(i, h)| (h.name().to_string(), i))
                .collect(),
            child_index: children
                .iter()
                .enumerate()
                .map(|(i, h)| (h.name().to_string(), i))
                .collect(),
            def: def.clone(),
            base,
            attributes,
            children,
            lineage,
        }))
    }

    pub fn name(&self) -> &QualifiedName {
        &self.0.def.name
    }

    pub fn local_name(&self) -> &str {
        &self.0.def.name.name
    }

    pub fn namespace(&self) -> &str {
        &self.0.def.name.namespace
    }

    pub fn registry_id(&self) -> RegistryId {
        self.0.registry
    }

    /// Index of this type within its registry
    pub fn index(&self) -> usize {
        self.0.index
    }

    pub fn base(&self) -> Option<&NodeType> {
        self.0.base.as_ref()
    }

    pub fn is_abstract(&self) -> bool {
        self.0.def.is_abstract
    }

    pub fn definition(&self) -> &TypeDef {
        &self.0.def
    }

    /// This type followed by its bases, most-derived first
    pub fn lineage(&self) -> impl Iterator<Item = &NodeType> {
        std::iter::successors(Some(self), |t| t.base())
    }

    /// Whether a node of type `other` may stand where `self` is expected
    pub fn is_assignable_from(&self, other: &NodeType) -> bool {
        self.0.registry == other.0.registry && other.0.lineage.contains(&self.0.index)
    }

    /// Whether `self` is `other` or derives from it
    pub fn is_a(&self, other: &NodeType) -> bool {
        other.is_assignable_from(self)
    }

    pub(crate) fn lineage_contains(&self, index: usize) -> bool {
        self.0.lineage.contains(&index)
    }

    /// Flattened attribute handles, base members first
    pub fn attributes(&self) -> &[AttributeHandle] {
        &self.0.attributes
    }

    /// Flattened child slot handles, base members first
    pub fn children(&self) -> &[ChildHandle] {
        &self.0.children
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeHandle> {
        self.0.attribute_index.get(name).map(|&i| &self.0.attributes[i])
    }

    pub fn child(&self, name: &str) -> Option<&ChildHandle> {
        self.0.child_index.get(name).map(|&i| &self.0.children[i])
    }

    pub fn id_attribute(&self) -> Option<&AttributeHandle> {
        self.0.attributes.iter().find(|h| h.definition().is_id)
    }

    pub fn bind_attribute(&self, name: &str) -> Result<AttributeHandle, BindingError> {
        self.attribute(name)
            .cloned()
            .ok_or_else(|| BindingError::UnknownAttribute {
                type_name: self.to_string(),
                attribute: name.to_string(),
            })
    }

    pub fn bind_child(&self, name: &str) -> Result<ChildHandle, BindingError> {
        self.child(name)
            .cloned()
            .ok_or_else(|| BindingError::UnknownChild {
                type_name: self.to_string(),
                child: name.to_string(),
            })
    }

    /// This type's own handle for the slot `handle` addresses
    pub fn resolve_attribute(
        &self,
        handle: &AttributeHandle,
    ) -> Result<&AttributeHandle, TypeMismatchError> {
        if handle.0.registry != self.0.registry {
            return Err(TypeMismatchError::ForeignRegistry {
                handle: handle.to_string(),
                node_type: self.to_string(),
            });
        }
        if !self.lineage_contains(handle.0.owner_index) {
            return Err(TypeMismatchError::UnrelatedType {
                handle: handle.to_string(),
                node_type: self.to_string(),
            });
        }
        self.0
            .attributes
            .get(handle.0.slot)
            .ok_or_else(|| TypeMismatchError::UnrelatedType {
                handle: handle.to_string(),
                node_type: self.to_string(),
            })
    }

    /// Slot position of a child handle on this type
    pub fn resolve_child(&self, handle: &ChildHandle) -> Result<usize, TypeMismatchError> {
        if handle.0.registry != self.0.registry {
            return Err(TypeMismatchError::ForeignRegistry {
                handle: handle.to_string(),
                node_type: self.to_string(),
            });
        }
        match &handle.0.owner {
            HandleOwner::Root(_) => Err(TypeMismatchError::RootHandle {
                handle: handle.to_string(),
            }),
            HandleOwner::Type { index, .. } if self.lineage_contains(*index) => Ok(handle.0.slot),
            HandleOwner::Type { .. } => Err(TypeMismatchError::UnrelatedType {
                handle: handle.to_string(),
                node_type: self.to_string(),
            }),
        }
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for NodeType {}

impl Hash for NodeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.def.name)
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeType({})", self.0.def.name)
    }
}

/// Opaque, pre-resolved reference to an attribute
#[derive(Clone)]
pub struct AttributeHandle(Arc<AttributeInfo>);

struct AttributeInfo {
    registry: RegistryId,
    owner_index: usize,
    owner: QualifiedName,
    slot: usize,
    def: AttributeDef,
}

impl AttributeHandle {
    pub fn name(&self) -> &str {
        &self.0.def.name
    }

    /// Definition as declared by the handle's owning type
    pub fn definition(&self) -> &AttributeDef {
        &self.0.def
    }

    /// Type that declared this handle
    pub fn owner(&self) -> &QualifiedName {
        &self.0.owner
    }

    pub fn registry_id(&self) -> RegistryId {
        self.0.registry
    }

    pub(crate) fn slot(&self) -> usize {
        self.0.slot
    }
}

impl PartialEq for AttributeHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for AttributeHandle {}

impl Hash for AttributeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Display for AttributeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attribute {}@{}", self.0.owner, self.0.def.name)
    }
}

impl fmt::Debug for AttributeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeHandle({}@{})", self.0.owner, self.0.def.name)
    }
}

/// Opaque, pre-resolved reference to a child slot or a root element
#[derive(Clone)]
pub struct ChildHandle(Arc<ChildInfo>);

struct ChildInfo {
    registry: RegistryId,
    name: String,
    namespace: String,
    slot: usize,
    owner: HandleOwner,
    /// Registry indices of the allowed types
    allowed: Vec<usize>,
    allowed_names: Vec<QualifiedName>,
    occurs: Occurs,
    def: Option<ChildDef>,
}

enum HandleOwner {
    Type { index: usize, name: QualifiedName },
    Root(NodeType),
}

impl ChildHandle {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Namespace of the owning type, or of the root element
    pub fn namespace(&self) -> &str {
        &self.0.namespace
    }

    pub fn occurs(&self) -> Occurs {
        self.0.occurs
    }

    pub fn is_list(&self) -> bool {
        !self.0.occurs.is_single()
    }

    pub fn is_root(&self) -> bool {
        matches!(self.0.owner, HandleOwner::Root(_))
    }

    /// Node type of a root element handle
    pub fn root_type(&self) -> Option<&NodeType> {
        match &self.0.owner {
            HandleOwner::Root(node_type) => Some(node_type),
            HandleOwner::Type { .. } => None,
        }
    }

    /// Declaring type of a child slot handle
    pub fn owner(&self) -> Option<&QualifiedName> {
        match &self.0.owner {
            HandleOwner::Type { name, .. } => Some(name),
            HandleOwner::Root(_) => None,
        }
    }

    /// Allowed child types in declaration order
    pub fn allowed_types(&self) -> &[QualifiedName] {
        &self.0.allowed_names
    }

    pub fn definition(&self) -> Option<&ChildDef> {
        self.0.def.as_ref()
    }

    pub fn registry_id(&self) -> RegistryId {
        self.0.registry
    }

    /// Whether a node of `node_type` may be placed in this slot
    pub fn allows(&self, node_type: &NodeType) -> bool {
        node_type.registry_id() == self.0.registry
            && self.0.allowed.iter().any(|&i| node_type.lineage_contains(i))
    }
}

impl PartialEq for ChildHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ChildHandle {}

impl Hash for ChildHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Display for ChildHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.owner {
            HandleOwner::Type { name, .. } => write!(f, "child {}/{}", name, self.0.name),
            HandleOwner::Root(_) => write!(f, "root {{{}}}{}", self.0.namespace, self.0.name),
        }
    }
}

impl fmt::Debug for ChildHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChildHandle({})", self)
    }
}
