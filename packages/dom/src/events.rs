//! Change notifications raised by node mutations

use crate::node::{Node, WeakNode};
use crate::registry::{AttributeHandle, ChildHandle};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use treeform_schema::Value;

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Identifies one observer subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn next() -> Self {
        SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }
}

/// Position of a child within its parent
#[derive(Debug, Clone, PartialEq)]
pub struct ChildLocation {
    pub parent: Node,
    pub slot: ChildHandle,
    pub index: usize,
}

/// A completed mutation
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    AttributeChanged {
        node: Node,
        /// The node type's own handle for the attribute
        attribute: AttributeHandle,
        old_value: Value,
        new_value: Value,
    },
    ChildInserted {
        parent: Node,
        slot: ChildHandle,
        index: usize,
        child: Node,
    },
    ChildRemoved {
        parent: Node,
        slot: ChildHandle,
        index: usize,
        child: Node,
    },
    /// Atomic detach and attach; `to.index` is the final position
    ChildMoved {
        child: Node,
        from: ChildLocation,
        to: ChildLocation,
    },
}

impl ChangeEvent {
    /// The node whose attribute changed, or the child that was inserted,
    /// removed or moved
    pub fn subject(&self) -> &Node {
        match self {
            ChangeEvent::AttributeChanged { node, .. } => node,
            ChangeEvent::ChildInserted { child, .. }
            | ChangeEvent::ChildRemoved { child, .. }
            | ChangeEvent::ChildMoved { child, .. } => child,
        }
    }

    pub fn is_structural(&self) -> bool {
        !matches!(self, ChangeEvent::AttributeChanged { .. })
    }
}

/// Receives change events for a node and its descendants
///
/// Observers run synchronously after the mutation has completed and may
/// mutate the tree themselves. Avoiding unbounded notification cascades is
/// the observer's responsibility.
pub trait Observer {
    fn on_event(&self, event: &ChangeEvent);
}

impl<F: Fn(&ChangeEvent)> Observer for F {
    fn on_event(&self, event: &ChangeEvent) {
        self(event)
    }
}

/// Observer that records every event it receives
///
/// Undo collaborators build their history from the recorded sequence.
pub struct ChangeRecorder {
    target: WeakNode,
    subscription: SubscriptionId,
    events: Rc<RefCell<Vec<ChangeEvent>>>,
}

impl ChangeRecorder {
    pub fn attach(node: &Node) -> Self {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let subscription = node.subscribe(move |event: &ChangeEvent| {
            sink.borrow_mut().push(event.clone());
        });
        Self {
            target: node.downgrade(),
            subscription,
            events,
        }
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.borrow().clone()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<ChangeEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn detach(self) {
        if let Some(node) = self.target.upgrade() {
            node.unsubscribe(self.subscription);
        }
    }
}
