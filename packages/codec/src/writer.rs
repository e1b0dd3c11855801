//! XML writer
//!
//! Elements are named after the slot that holds them, children follow slot
//! order and `xsi:type` is only written when the child's type differs from
//! the slot's first allowed type.

use crate::error::{SerializationError, SerializationResult};
use crate::options::WriteOptions;
use crate::XSI_NAMESPACE;
use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::{self, Write};
use treeform_dom::{ChildHandle, DomError, Node, NodeType, TypeMismatchError, TypeRegistry, Value};

pub(crate) struct DocumentWriter<'a, W: Write> {
    registry: &'a TypeRegistry,
    options: &'a WriteOptions,
    xml: Writer<W>,
    written: usize,
}

impl<'a, W: Write> DocumentWriter<'a, W> {
    pub(crate) fn new(registry: &'a TypeRegistry, options: &'a WriteOptions, out: W) -> Self {
        let xml = if options.indent > 0 {
            Writer::new_with_indent(out, b' ', options.indent)
        } else {
            Writer::new(out)
        };
        Self {
            registry,
            options,
            xml,
            written: 0,
        }
    }

    /// Write `root` as a complete document and hand back the sink
    pub(crate) fn write_document(mut self, root: &Node) -> SerializationResult<W> {
        let node_type = root.node_type();
        let element = root
            .root_element()
            .ok_or_else(|| SerializationError::NotARoot {
                type_name: node_type.to_string(),
            })?;
        if node_type.registry_id() != self.registry.id() {
            return Err(SerializationError::Rejected {
                path: format!("/{}", element.name()),
                source: DomError::TypeMismatch(TypeMismatchError::ForeignRegistry {
                    handle: element.to_string(),
                    node_type: node_type.to_string(),
                }),
            });
        }

        if self.options.xml_declaration {
            self.emit(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        }

        let mut start = BytesStart::new(element.name());
        start.push_attribute(("xmlns", element.namespace()));
        start.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
        for (uri, prefix) in self.registry.namespaces() {
            start.push_attribute((format!("xmlns:{}", prefix).as_str(), uri));
        }

        let path = format!("/{}", element.name());
        self.write_node(root, start, None, &path)?;

        tracing::debug!(
            root = element.name(),
            elements = self.written,
            "saved document"
        );
        let mut out = self.xml.into_inner();
        if self.options.indent > 0 {
            out.write_all(b"\n")?;
        }
        Ok(out)
    }

    fn write_node(
        &mut self,
        node: &Node,
        mut start: BytesStart<'_>,
        slot: Option<&ChildHandle>,
        path: &str,
    ) -> SerializationResult<()> {
        let node_type = node.node_type();
        if let Some(slot) = slot {
            if let Some(type_name) = self.xsi_type(slot, &node_type) {
                start.push_attribute(("xsi:type", type_name.as_str()));
            }
        }

        for handle in node_type.attributes() {
            let rejected = |source: TypeMismatchError| SerializationError::Rejected {
                path: path.to_string(),
                source: source.into(),
            };
            let definition = handle.definition();
            let value = if self.options.persist_default_attributes || definition.required {
                Some(node.get_attribute(handle).map_err(rejected)?)
            } else {
                node.local_attribute(handle).map_err(rejected)?
            };

            match value {
                Some(Value::Null) if !definition.required => {}
                Some(value) => {
                    let text = value.to_text();
                    let escaped = escape_attribute(&text);
                    start.push_attribute((handle.name().as_bytes(), escaped.as_bytes()));
                }
                None => {}
            }
        }

        self.written += 1;
        let children = node_type
            .children()
            .iter()
            .map(|slot| {
                node.children(slot)
                    .map(|list| (slot, list.to_vec()))
                    .map_err(|source| SerializationError::Rejected {
                        path: path.to_string(),
                        source: source.into(),
                    })
            })
            .collect::<SerializationResult<Vec<_>>>()?;

        if children.iter().all(|(_, nodes)| nodes.is_empty()) {
            return self.emit(Event::Empty(start));
        }

        let end = BytesEnd::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
        self.emit(Event::Start(start))?;
        for (slot, nodes) in children {
            for (index, child) in nodes.iter().enumerate() {
                let child_path = element_path(path, slot, index);
                self.write_node(child, BytesStart::new(slot.name()), Some(slot), &child_path)?;
            }
        }
        self.emit(Event::End(end))
    }

    /// `prefix:name` when the slot's first allowed type does not already
    /// imply the child's type
    fn xsi_type(&self, slot: &ChildHandle, node_type: &NodeType) -> Option<String> {
        if slot.allowed_types().first() == Some(node_type.name()) {
            return None;
        }
        let prefix = self.registry.prefix_for(node_type.namespace())?;
        Some(format!("{}:{}", prefix, node_type.local_name()))
    }

    fn emit(&mut self, event: Event<'_>) -> SerializationResult<()> {
        self.xml
            .write_event(event)
            .map_err(|e| SerializationError::Io(io::Error::new(io::ErrorKind::Other, e)))
    }
}

/// Attribute text with markup escaped and tabs and line breaks written as
/// character references
fn escape_attribute(text: &str) -> Cow<'_, str> {
    let escaped = escape(text);
    if !escaped.contains(['\n', '\t', '\r']) {
        return escaped;
    }
    let mut out = String::with_capacity(escaped.len() + 8);
    for c in escaped.chars() {
        match c {
            '\n' => out.push_str("&#10;"),
            '\t' => out.push_str("&#9;"),
            '\r' => out.push_str("&#13;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Path segment used in error messages and warnings
pub(crate) fn element_path(parent: &str, slot: &ChildHandle, index: usize) -> String {
    if slot.is_list() {
        format!("{}/{}[{}]", parent, slot.name(), index)
    } else {
        format!("{}/{}", parent, slot.name())
    }
}
