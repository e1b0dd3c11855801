//! Mutation sequences and the events they raise
//!
//! This tests:
//! - The event sequence scenario (events with resource children)
//! - Event ordering and bubbling to ancestors
//! - Atomic moves raising a single notification
//! - Observers that mutate the tree from inside a notification

use std::cell::RefCell;
use std::rc::Rc;
use treeform_dom::{
    ChangeEvent, ChangeRecorder, ChildHandle, DomError, Node, NodeType, StructuralError,
    TypeRegistry, UniquenessValidator, Value,
};

const TIMELINE: &str = r#"
    namespace "http://treeform.dev/timeline" as tl;

    type eventSequenceType { child event: eventType*; }

    type eventType {
        attr name: string = "";
        attr time: int = 0;
        attr duration: int = 0 range(0, 100000);
        child resource: resourceType*;
        child track: trackType;
        child spare: trackType*;
    }

    type resourceType { attr name: string id; attr size: int = 0; }
    type trackType { attr muted: bool = false; }

    root eventSequence: eventSequenceType;
"#;

struct Timeline {
    types: TypeRegistry,
}

impl Timeline {
    fn load() -> Self {
        Self {
            types: TypeRegistry::from_sources(&[("timeline.tfs", TIMELINE)]).unwrap(),
        }
    }

    fn ty(&self, name: &str) -> NodeType {
        self.types
            .resolve("http://treeform.dev/timeline", name)
            .unwrap()
    }

    fn slot(&self, type_name: &str, name: &str) -> ChildHandle {
        self.ty(type_name).bind_child(name).unwrap()
    }

    fn root(&self) -> Node {
        let root = self
            .types
            .resolve_root("http://treeform.dev/timeline", "eventSequence")
            .unwrap();
        Node::new_root(&root).unwrap()
    }

    fn event(&self, name: &str, time: i64, duration: i64) -> Node {
        let event_type = self.ty("eventType");
        let event = Node::new(&event_type).unwrap();
        event
            .set_attribute(&event_type.bind_attribute("name").unwrap(), name)
            .unwrap();
        event
            .set_attribute(&event_type.bind_attribute("time").unwrap(), time)
            .unwrap();
        event
            .set_attribute(&event_type.bind_attribute("duration").unwrap(), duration)
            .unwrap();
        event
    }

    fn resource(&self, name: &str) -> Node {
        let resource_type = self.ty("resourceType");
        let resource = Node::new(&resource_type).unwrap();
        resource
            .set_attribute(&resource_type.bind_attribute("name").unwrap(), name)
            .unwrap();
        resource
    }
}

#[test]
fn test_event_sequence_scenario() {
    let tl = Timeline::load();
    let root = tl.root();
    let events = tl.slot("eventSequenceType", "event");
    let resources = tl.slot("eventType", "resource");
    let name = tl.ty("resourceType").bind_attribute("name").unwrap();

    let event = tl.event("intro", 0, 5);
    root.append_child(&events, &event).unwrap();
    event.append_child(&resources, &tl.resource("tex1")).unwrap();
    event.append_child(&resources, &tl.resource("tex2")).unwrap();

    assert_eq!(root.children(&events).unwrap().len(), 1);
    let names: Vec<Value> = event
        .children(&resources)
        .unwrap()
        .iter()
        .map(|r| r.get_attribute(&name).unwrap())
        .collect();
    assert_eq!(names, vec![Value::from("tex1"), Value::from("tex2")]);
}

#[test]
fn test_events_bubble_to_ancestors_in_order() {
    let tl = Timeline::load();
    let root = tl.root();
    let recorder = ChangeRecorder::attach(&root);
    let events = tl.slot("eventSequenceType", "event");
    let resources = tl.slot("eventType", "resource");

    let event = tl.event("intro", 0, 5);
    root.append_child(&events, &event).unwrap();
    let tex = tl.resource("tex1");
    event.append_child(&resources, &tex).unwrap();

    let time = tl.ty("eventType").bind_attribute("time").unwrap();
    event.set_attribute(&time, 12i64).unwrap();

    let recorded = recorder.take();
    assert_eq!(recorded.len(), 3);
    assert!(matches!(
        &recorded[0],
        ChangeEvent::ChildInserted { parent, index: 0, child, .. }
            if parent == &root && child == &event
    ));
    assert!(matches!(
        &recorded[1],
        ChangeEvent::ChildInserted { parent, child, .. } if parent == &event && child == &tex
    ));
    match &recorded[2] {
        ChangeEvent::AttributeChanged {
            node,
            attribute,
            old_value,
            new_value,
        } => {
            assert_eq!(node, &event);
            assert_eq!(attribute, &time);
            assert_eq!(old_value, &Value::Int(0));
            assert_eq!(new_value, &Value::Int(12));
        }
        other => panic!("unexpected event {:?}", other),
    }

    // Detached nodes no longer report to the old root
    root.remove_child(&events, 0).unwrap();
    event.set_attribute(&time, 13i64).unwrap();
    assert_eq!(recorder.len(), 1);
    recorder.detach();
}

#[test]
fn test_move_raises_one_event_to_each_subscriber() {
    let tl = Timeline::load();
    let root = tl.root();
    let events = tl.slot("eventSequenceType", "event");
    let resources = tl.slot("eventType", "resource");

    let first = tl.event("a", 0, 1);
    let second = tl.event("b", 1, 1);
    root.append_child(&events, &first).unwrap();
    root.append_child(&events, &second).unwrap();
    let tex = tl.resource("tex1");
    first.append_child(&resources, &tex).unwrap();

    let at_root = ChangeRecorder::attach(&root);
    let at_source = ChangeRecorder::attach(&first);
    let at_target = ChangeRecorder::attach(&second);

    second.move_child(&resources, 0, &tex).unwrap();

    for recorder in [&at_root, &at_source, &at_target] {
        let recorded = recorder.take();
        assert_eq!(recorded.len(), 1);
        match &recorded[0] {
            ChangeEvent::ChildMoved { child, from, to } => {
                assert_eq!(child, &tex);
                assert_eq!(from.parent, first);
                assert_eq!(from.index, 0);
                assert_eq!(to.parent, second);
                assert_eq!(to.index, 0);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
    assert!(tex.parent().unwrap().ptr_eq(&second));
    assert!(first.children(&resources).unwrap().is_empty());
}

#[test]
fn test_move_never_empties_a_required_slot() {
    let tl = Timeline::load();
    let track = tl.slot("eventType", "track");
    let spare = tl.slot("eventType", "spare");
    let event = tl.event("a", 0, 1);
    let only = Node::new(&tl.ty("trackType")).unwrap();
    event.set_child(&track, Some(&only)).unwrap();
    let recorder = ChangeRecorder::attach(&event);

    let err = event.move_child(&spare, 0, &only).unwrap_err();
    assert!(matches!(
        err,
        DomError::Structural(StructuralError::MinOccursViolated { ref slot, min: 1 }) if slot == "track"
    ));
    assert!(only.parent().unwrap().ptr_eq(&event));
    assert!(event.children(&spare).unwrap().is_empty());
    assert_eq!(event.children(&track).unwrap().len(), 1);
    assert!(recorder.is_empty());
}

#[test]
fn test_move_into_a_full_slot_is_rejected() {
    let tl = Timeline::load();
    let track = tl.slot("eventType", "track");
    let a = tl.event("a", 0, 1);
    let b = tl.event("b", 0, 1);
    let spare = tl.slot("eventType", "spare");
    let loose = Node::new(&tl.ty("trackType")).unwrap();
    a.append_child(&spare, &loose).unwrap();
    b.set_child(&track, Some(&Node::new(&tl.ty("trackType")).unwrap()))
        .unwrap();

    let err = b.move_child(&track, 0, &loose).unwrap_err();
    assert!(matches!(
        err,
        DomError::Structural(StructuralError::MaxOccursExceeded { max: 1, .. })
    ));
    assert!(loose.parent().unwrap().ptr_eq(&a));
}

#[test]
fn test_set_child_raises_remove_then_insert() {
    let tl = Timeline::load();
    let track = tl.slot("eventType", "track");
    let event = tl.event("a", 0, 1);
    let old = Node::new(&tl.ty("trackType")).unwrap();
    event.set_child(&track, Some(&old)).unwrap();

    let recorder = ChangeRecorder::attach(&event);
    let new = Node::new(&tl.ty("trackType")).unwrap();
    event.set_child(&track, Some(&new)).unwrap();

    let recorded = recorder.events();
    assert_eq!(recorded.len(), 2);
    assert!(matches!(&recorded[0], ChangeEvent::ChildRemoved { child, .. } if child == &old));
    assert!(matches!(&recorded[1], ChangeEvent::ChildInserted { child, .. } if child == &new));
    assert!(old.parent().is_none());
}

#[test]
fn test_reset_only_notifies_on_observable_change() {
    let tl = Timeline::load();
    let event = tl.event("a", 0, 1);
    let time = tl.ty("eventType").bind_attribute("time").unwrap();
    let recorder = ChangeRecorder::attach(&event);

    // Local value equal to the default
    event.reset_attribute(&time).unwrap();
    assert!(recorder.is_empty());

    event.set_attribute(&time, 9i64).unwrap();
    event.reset_attribute(&time).unwrap();
    assert_eq!(recorder.len(), 2);
    assert_eq!(event.get_attribute(&time).unwrap(), Value::Int(0));
}

#[test]
fn test_observer_may_mutate_during_notification() {
    let tl = Timeline::load();
    let root = tl.root();
    let events = tl.slot("eventSequenceType", "event");
    let duration = tl.ty("eventType").bind_attribute("duration").unwrap();

    // Clamp every newly inserted event to a one second duration
    let handle = duration.clone();
    root.subscribe(move |event: &ChangeEvent| {
        if let ChangeEvent::ChildInserted { child, .. } = event {
            child.set_attribute(&handle, 1i64).unwrap();
        }
    });

    let event = tl.event("long", 0, 500);
    root.append_child(&events, &event).unwrap();
    assert_eq!(event.get_attribute(&duration).unwrap(), Value::Int(1));
}

#[test]
fn test_uniqueness_collision_scenario() {
    let tl = Timeline::load();
    let root = tl.root();
    let event = tl.event("a", 0, 1);
    root.append_child(&tl.slot("eventSequenceType", "event"), &event)
        .unwrap();

    let validator = UniquenessValidator::attach(&root);
    let findings = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&findings);
    validator.on_warning(move |w| sink.borrow_mut().push(w.message.clone()));

    let resources = tl.slot("eventType", "resource");
    let first = tl.resource("A");
    let second = tl.resource("A");
    event.append_child(&resources, &first).unwrap();
    event.append_child(&resources, &second).unwrap();
    assert_eq!(validator.violations().len(), 1);
    assert_eq!(findings.borrow().len(), 1);

    let name = tl.ty("resourceType").bind_attribute("name").unwrap();
    first.set_attribute(&name, "B").unwrap();
    assert!(validator.violations().is_empty());
    assert_eq!(findings.borrow().len(), 1);
}
