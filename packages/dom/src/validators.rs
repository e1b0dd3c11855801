//! # Validators
//!
//! Observers that check tree-wide invariants while the tree mutates.
//!
//! ## Design
//!
//! - Findings are advisory: a validator never blocks or undoes a mutation.
//!   Current findings are available from `violations()`; new ones are
//!   logged with `tracing::warn!` and forwarded to an optional sink.
//! - A validator subscribes once on a document root and indexes the
//!   existing subtree when attached. Events for nodes outside that root are
//!   ignored.
//! - Validators hold the root weakly; dropping the tree drops the index.

use crate::events::{ChangeEvent, SubscriptionId};
use crate::node::{Node, WeakNode};
use crate::registry::AttributeHandle;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;
use treeform_schema::{QualifiedName, Value, ValueKind};

/// Severity of an [`IntegrityWarning`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningLevel {
    /// Worth fixing, the document still loads
    Warning,
    /// The document refers to something that does not exist
    Error,
}

/// What an [`IntegrityWarning`] is about
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityKind {
    /// Several nodes share one identifier
    Collision { value: String, nodes: Vec<Node> },
    /// A reference names an identifier no node carries
    DanglingReference {
        owner: Node,
        attribute: String,
        target: String,
    },
    /// A reference resolves to a node of the wrong type
    WrongReferenceType {
        owner: Node,
        attribute: String,
        target: String,
        expected: QualifiedName,
        found: QualifiedName,
    },
    /// A node left the document while references to it remain
    ReferentRemoved {
        owner: Node,
        attribute: String,
        referent: Node,
    },
}

/// A validator finding
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityWarning {
    pub kind: IntegrityKind,
    pub level: WarningLevel,
    pub message: String,
}

impl IntegrityWarning {
    pub fn warning(kind: IntegrityKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            level: WarningLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(kind: IntegrityKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            level: WarningLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            WarningLevel::Warning => "warning",
            WarningLevel::Error => "error",
        };
        write!(f, "{}: {}", level, self.message)
    }
}

type Sink = Rc<dyn Fn(&IntegrityWarning)>;

fn within(root: &WeakNode, node: &Node) -> bool {
    match root.upgrade() {
        Some(root) => node.ptr_eq(&root) || node.is_descendant_of(&root),
        None => false,
    }
}

fn deliver(sink: Option<Sink>, findings: &[IntegrityWarning]) {
    for finding in findings {
        tracing::warn!(message = %finding.message, "integrity violation");
        if let Some(sink) = &sink {
            sink(finding);
        }
    }
}

// Uniqueness

/// Which attribute carries a node's identifier
#[derive(Clone)]
enum IdSource {
    /// The `id` attribute of each node's own type
    TypeId,
    /// One explicit attribute, for nodes whose type has it
    Attribute(AttributeHandle),
}

impl IdSource {
    fn value_of(&self, node: &Node) -> Option<String> {
        match self {
            IdSource::TypeId => node.id(),
            IdSource::Attribute(handle) => match node.local_attribute(handle).ok()?? {
                Value::Null => None,
                value => Some(value.to_text()).filter(|text| !text.is_empty()),
            },
        }
    }

    fn tracks(&self, node: &Node, attribute: &AttributeHandle) -> bool {
        match self {
            IdSource::TypeId => attribute.definition().is_id,
            IdSource::Attribute(handle) => node
                .node_type()
                .resolve_attribute(handle)
                .map(|own| own == attribute)
                .unwrap_or(false),
        }
    }
}

struct UniquenessState {
    root: WeakNode,
    source: IdSource,
    index: BTreeMap<String, Vec<WeakNode>>,
    values: HashMap<usize, String>,
    reported: BTreeSet<String>,
    sink: Option<Sink>,
}

impl UniquenessState {
    fn add(&mut self, node: &Node, touched: &mut BTreeSet<String>) {
        if let Some(value) = self.source.value_of(node) {
            self.index
                .entry(value.clone())
                .or_default()
                .push(node.downgrade());
            self.values.insert(node.key(), value.clone());
            touched.insert(value);
        }
    }

    fn remove(&mut self, node: &Node, touched: &mut BTreeSet<String>) {
        if let Some(value) = self.values.remove(&node.key()) {
            if let Some(owners) = self.index.get_mut(&value) {
                owners.retain(|owner| !owner.points_to(node));
                if owners.is_empty() {
                    self.index.remove(&value);
                }
            }
            touched.insert(value);
        }
    }

    fn owners(&self, value: &str) -> Vec<Node> {
        self.index
            .get(value)
            .map(|owners| owners.iter().filter_map(WeakNode::upgrade).collect())
            .unwrap_or_default()
    }

    fn collision(&self, value: &str) -> Option<IntegrityWarning> {
        let nodes = self.owners(value);
        if nodes.len() < 2 {
            return None;
        }
        let message = format!("identifier \"{}\" is used by {} nodes", value, nodes.len());
        Some(IntegrityWarning::warning(
            IntegrityKind::Collision {
                value: value.to_string(),
                nodes,
            },
            message,
        ))
    }

    fn apply(&mut self, event: &ChangeEvent) -> BTreeSet<String> {
        let mut touched = BTreeSet::new();
        match event {
            ChangeEvent::AttributeChanged {
                node, attribute, ..
            } => {
                if within(&self.root, node) && self.source.tracks(node, attribute) {
                    self.remove(node, &mut touched);
                    self.add(node, &mut touched);
                }
            }
            ChangeEvent::ChildInserted { child, .. } => {
                if within(&self.root, child) {
                    for node in child.subtree() {
                        self.add(&node, &mut touched);
                    }
                }
            }
            ChangeEvent::ChildRemoved { parent, child, .. } => {
                if within(&self.root, parent) {
                    for node in child.subtree() {
                        self.remove(&node, &mut touched);
                    }
                }
            }
            ChangeEvent::ChildMoved { child, from, to } => {
                let was_inside = within(&self.root, &from.parent);
                let is_inside = within(&self.root, &to.parent);
                if was_inside != is_inside {
                    for node in child.subtree() {
                        if is_inside {
                            self.add(&node, &mut touched);
                        } else {
                            self.remove(&node, &mut touched);
                        }
                    }
                }
            }
        }
        touched
    }

    /// Findings for touched values that were not reported before
    fn refresh(&mut self, touched: BTreeSet<String>) -> Vec<IntegrityWarning> {
        let mut findings = Vec::new();
        for value in touched {
            match self.collision(&value) {
                Some(finding) => {
                    if self.reported.insert(value) {
                        findings.push(finding);
                    }
                }
                None => {
                    self.reported.remove(&value);
                }
            }
        }
        findings
    }
}

/// Reports identifier values shared by more than one node under a root
pub struct UniquenessValidator {
    subscription: SubscriptionId,
    state: Rc<RefCell<UniquenessState>>,
}

impl UniquenessValidator {
    /// Track the `id` attribute of every node type
    pub fn attach(root: &Node) -> Self {
        Self::attach_source(root, IdSource::TypeId)
    }

    /// Track one attribute, on nodes whose type declares or inherits it
    pub fn attach_with(root: &Node, attribute: &AttributeHandle) -> Self {
        Self::attach_source(root, IdSource::Attribute(attribute.clone()))
    }

    fn attach_source(root: &Node, source: IdSource) -> Self {
        let state = Rc::new(RefCell::new(UniquenessState {
            root: root.downgrade(),
            source,
            index: BTreeMap::new(),
            values: HashMap::new(),
            reported: BTreeSet::new(),
            sink: None,
        }));

        {
            let mut state = state.borrow_mut();
            let mut touched = BTreeSet::new();
            for node in root.subtree() {
                state.add(&node, &mut touched);
            }
            let findings = state.refresh(touched);
            deliver(None, &findings);
        }

        let observed = Rc::clone(&state);
        let subscription = root.subscribe(move |event: &ChangeEvent| {
            let (findings, sink) = {
                let mut state = observed.borrow_mut();
                let touched = state.apply(event);
                (state.refresh(touched), state.sink.clone())
            };
            deliver(sink, &findings);
        });

        Self {
            subscription,
            state,
        }
    }

    /// Forward new findings to `sink` as they are detected
    pub fn on_warning(&self, sink: impl Fn(&IntegrityWarning) + 'static) {
        self.state.borrow_mut().sink = Some(Rc::new(sink));
    }

    /// Every current collision, ordered by identifier value
    pub fn violations(&self) -> Vec<IntegrityWarning> {
        let state = self.state.borrow();
        state
            .index
            .keys()
            .filter_map(|value| state.collision(value))
            .collect()
    }

    /// Node currently owning `value`, if exactly one does
    pub fn lookup(&self, value: &str) -> Option<Node> {
        let owners = self.state.borrow().owners(value);
        match owners.as_slice() {
            [single] => Some(single.clone()),
            _ => None,
        }
    }

    pub fn detach(self) {
        let root = self.state.borrow().root.upgrade();
        if let Some(root) = root {
            root.unsubscribe(self.subscription);
        }
    }
}

// References

type FindingKey = (usize, String, String);

/// Every set reference attribute under `nodes`, with the identifier it names
fn references_in(nodes: &[Node]) -> Vec<(Node, AttributeHandle, String)> {
    let mut found = Vec::new();
    for owner in nodes {
        for handle in owner.node_type().attributes() {
            if !handle.definition().kind.is_reference() {
                continue;
            }
            if let Ok(Some(Value::Reference(target))) = owner.local_attribute(handle) {
                found.push((owner.clone(), handle.clone(), target));
            }
        }
    }
    found
}

struct ReferenceState {
    root: WeakNode,
    reported: BTreeSet<FindingKey>,
    sink: Option<Sink>,
}

impl ReferenceState {
    fn scan(&self) -> Vec<(FindingKey, IntegrityWarning)> {
        let Some(root) = self.root.upgrade() else {
            return Vec::new();
        };
        let nodes = root.subtree();
        let ids: HashMap<String, Node> = nodes
            .iter()
            .filter_map(|node| node.id().map(|id| (id, node.clone())))
            .collect();

        let mut findings = Vec::new();
        for (owner, handle, target) in references_in(&nodes) {
            let node_type = owner.node_type();
            let ValueKind::Reference { target: expected } = &handle.definition().kind else {
                continue;
            };
            let key = (owner.key(), handle.name().to_string(), target.clone());

            match ids.get(&target) {
                None => {
                    let message = format!(
                        "{} of {} refers to missing identifier \"{}\"",
                        handle.name(),
                        node_type,
                        target
                    );
                    findings.push((
                        key,
                        IntegrityWarning::error(
                            IntegrityKind::DanglingReference {
                                owner: owner.clone(),
                                attribute: handle.name().to_string(),
                                target,
                            },
                            message,
                        ),
                    ));
                }
                Some(found) => {
                    let Some(expected) = expected else { continue };
                    let found_type = found.node_type();
                    if found_type.lineage().any(|t| t.name() == expected) {
                        continue;
                    }
                    let message = format!(
                        "{} of {} refers to \"{}\" of type {}, expected {}",
                        handle.name(),
                        node_type,
                        target,
                        found_type,
                        expected
                    );
                    findings.push((
                        key,
                        IntegrityWarning::error(
                            IntegrityKind::WrongReferenceType {
                                owner: owner.clone(),
                                attribute: handle.name().to_string(),
                                target,
                                expected: expected.clone(),
                                found: found_type.name().clone(),
                            },
                            message,
                        ),
                    ));
                }
            }
        }
        findings
    }

    /// New findings since the previous scan
    fn refresh(&mut self) -> Vec<IntegrityWarning> {
        let current = self.scan();
        let keys: BTreeSet<FindingKey> = current.iter().map(|(key, _)| key.clone()).collect();
        let fresh = current
            .into_iter()
            .filter(|(key, _)| !self.reported.contains(key))
            .map(|(_, finding)| finding)
            .collect();
        self.reported = keys;
        fresh
    }

    fn references_to(&self, target: &Node) -> Vec<(Node, AttributeHandle)> {
        let (Some(root), Some(id)) = (self.root.upgrade(), target.id()) else {
            return Vec::new();
        };
        references_in(&root.subtree())
            .into_iter()
            .filter(|(_, _, named)| *named == id)
            .map(|(owner, handle, _)| (owner, handle))
            .collect()
    }

    /// One finding per reference left pointing into `removed`, a subtree
    /// that just left the document
    fn referents_removed(&self, removed: &Node) -> Vec<IntegrityWarning> {
        let Some(root) = self.root.upgrade() else {
            return Vec::new();
        };
        if within(&self.root, removed) {
            return Vec::new();
        }
        let nodes = root.subtree();
        let remaining: BTreeSet<String> = nodes.iter().filter_map(Node::id).collect();
        let referents: HashMap<String, Node> = removed
            .subtree()
            .into_iter()
            .filter_map(|node| node.id().map(|id| (id, node)))
            .filter(|(id, _)| !remaining.contains(id))
            .collect();
        if referents.is_empty() {
            return Vec::new();
        }

        references_in(&nodes)
            .into_iter()
            .filter_map(|(owner, handle, target)| {
                let referent = referents.get(&target)?;
                let message = format!(
                    "{} of {} still refers to removed {} \"{}\"",
                    handle.name(),
                    owner.node_type(),
                    referent.node_type(),
                    target
                );
                Some(IntegrityWarning::warning(
                    IntegrityKind::ReferentRemoved {
                        owner,
                        attribute: handle.name().to_string(),
                        referent: referent.clone(),
                    },
                    message,
                ))
            })
            .collect()
    }
}

fn touches_references(event: &ChangeEvent) -> bool {
    match event {
        ChangeEvent::AttributeChanged { attribute, .. } => {
            let def = attribute.definition();
            def.is_id || def.kind.is_reference()
        }
        _ => true,
    }
}

/// Reports reference attributes whose identifier is missing from the
/// document or names a node of the wrong type.
///
/// Removing a node that is still referred to also produces a
/// [`IntegrityKind::ReferentRemoved`] finding per remaining reference. These
/// go to the sink and the log only; `violations()` keeps reporting the
/// resulting dangling references.
pub struct ReferenceValidator {
    subscription: SubscriptionId,
    state: Rc<RefCell<ReferenceState>>,
}

impl ReferenceValidator {
    pub fn attach(root: &Node) -> Self {
        let state = Rc::new(RefCell::new(ReferenceState {
            root: root.downgrade(),
            reported: BTreeSet::new(),
            sink: None,
        }));
        let findings = state.borrow_mut().refresh();
        deliver(None, &findings);

        let observed = Rc::clone(&state);
        let subscription = root.subscribe(move |event: &ChangeEvent| {
            // Removed and moved-out subjects are no longer under the root
            let relevant = match event {
                ChangeEvent::ChildRemoved { .. } | ChangeEvent::ChildMoved { .. } => true,
                _ => touches_references(event) && within(&observed.borrow().root, event.subject()),
            };
            if !relevant {
                return;
            }
            let (findings, sink) = {
                let mut state = observed.borrow_mut();
                let mut findings = match event {
                    ChangeEvent::ChildRemoved { child, .. }
                    | ChangeEvent::ChildMoved { child, .. } => state.referents_removed(child),
                    _ => Vec::new(),
                };
                findings.extend(state.refresh());
                (findings, state.sink.clone())
            };
            deliver(sink, &findings);
        });

        Self {
            subscription,
            state,
        }
    }

    pub fn on_warning(&self, sink: impl Fn(&IntegrityWarning) + 'static) {
        self.state.borrow_mut().sink = Some(Rc::new(sink));
    }

    pub fn violations(&self) -> Vec<IntegrityWarning> {
        self.state
            .borrow()
            .scan()
            .into_iter()
            .map(|(_, finding)| finding)
            .collect()
    }

    /// Owners and attributes currently referring to `target`'s identifier
    pub fn references_to(&self, target: &Node) -> Vec<(Node, AttributeHandle)> {
        self.state.borrow().references_to(target)
    }

    pub fn detach(self) {
        let root = self.state.borrow().root.upgrade();
        if let Some(root) = root {
            root.unsubscribe(self.subscription);
        }
    }
}
