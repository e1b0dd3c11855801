//! XML reader
//!
//! ## Design
//!
//! - Recursive descent over `quick_xml` events borrowed from the input
//! - Namespace bindings are scoped per element and used to resolve
//!   `xsi:type` values and the root element's namespace
//! - Unknown elements and attributes are skipped and reported as
//!   [`LoadWarning`]s; anything that would leave the tree non-conformant
//!   is a [`SerializationError`]

use crate::error::{SerializationError, SerializationResult};
use crate::writer::element_path;
use crate::XSI_NAMESPACE;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashSet;
use std::fmt;
use treeform_dom::{ChildHandle, DomError, Node, NodeType, TypeRegistry, ValidationError};

/// Content skipped while loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub path: String,
    pub message: String,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub warnings: Vec<LoadWarning>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

pub(crate) struct DocumentReader<'a> {
    registry: &'a TypeRegistry,
    xml: Reader<&'a [u8]>,
    bindings: Vec<(String, String)>,
    report: LoadReport,
    nodes: usize,
}

impl<'a> DocumentReader<'a> {
    pub(crate) fn new(registry: &'a TypeRegistry, input: &'a str) -> Self {
        Self {
            registry,
            xml: Reader::from_str(input),
            bindings: Vec::new(),
            report: LoadReport::default(),
            nodes: 0,
        }
    }

    pub(crate) fn read_document(mut self) -> SerializationResult<(Node, LoadReport)> {
        let (start, empty) = loop {
            match self.next_event()? {
                Event::Start(e) => break (e, false),
                Event::Empty(e) => break (e, true),
                Event::Eof => return Err(SerializationError::EmptyDocument),
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| self.xml_error(e))?;
                    if !text.trim().is_empty() {
                        return Err(self.xml_error("text before the root element"));
                    }
                }
                _ => {}
            }
        };

        self.bind_namespaces(&start)?;
        let (prefix, name) = split_name(self.utf8(start.name().into_inner())?);
        let namespace = self.namespace_of(prefix.unwrap_or(""));
        let handle = self.root_handle(namespace.as_deref(), name)?;

        let path = format!("/{}", name);
        let root = Node::new_root(&handle).map_err(|e| SerializationError::Rejected {
            path: path.clone(),
            source: e.into(),
        })?;
        self.read_body(&root, &start, empty, &path)?;

        loop {
            match self.next_event()? {
                Event::Eof => break,
                Event::Start(_) | Event::Empty(_) => {
                    return Err(self.xml_error("more than one root element"))
                }
                _ => {}
            }
        }

        tracing::debug!(
            root = name,
            nodes = self.nodes,
            warnings = self.report.warnings.len(),
            "loaded document"
        );
        Ok((root, self.report))
    }

    fn root_handle(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> SerializationResult<ChildHandle> {
        let found = match namespace {
            Some(namespace) => self.registry.resolve_root(namespace, name),
            None => self
                .registry
                .roots()
                .iter()
                .find(|root| root.name() == name)
                .cloned(),
        };
        found.ok_or_else(|| SerializationError::UnknownRoot {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        })
    }

    /// Attributes, children and cardinality of an element already bound to `node`
    fn read_body(
        &mut self,
        node: &Node,
        start: &BytesStart<'_>,
        empty: bool,
        path: &str,
    ) -> SerializationResult<()> {
        self.nodes += 1;
        self.read_attributes(node, start, path)?;

        if !empty {
            loop {
                match self.next_event()? {
                    Event::Start(e) => self.read_child(node, &e, false, path)?,
                    Event::Empty(e) => self.read_child(node, &e, true, path)?,
                    Event::End(_) => break,
                    Event::Text(text) => {
                        let text = text.unescape().map_err(|e| self.xml_error(e))?;
                        if !text.trim().is_empty() {
                            self.warn(path, format!("ignored text content \"{}\"", text.trim()));
                        }
                    }
                    Event::CData(_) => self.warn(path, "ignored CDATA section"),
                    Event::Eof => {
                        return Err(SerializationError::UnexpectedEof {
                            path: path.to_string(),
                        })
                    }
                    _ => {}
                }
            }
        }

        for slot in node.node_type().children() {
            let count = node
                .children(slot)
                .map_err(|e| SerializationError::Rejected {
                    path: path.to_string(),
                    source: e.into(),
                })?
                .len();
            let occurs = slot.occurs();
            if count < occurs.min as usize {
                return Err(SerializationError::MissingChildren {
                    path: path.to_string(),
                    slot: slot.name().to_string(),
                    min: occurs.min,
                    found: count,
                });
            }
        }
        Ok(())
    }

    fn read_child(
        &mut self,
        parent: &Node,
        start: &BytesStart<'_>,
        empty: bool,
        path: &str,
    ) -> SerializationResult<()> {
        let mark = self.bindings.len();
        self.bind_namespaces(start)?;

        let (_, name) = split_name(self.utf8(start.name().into_inner())?);
        let parent_type = parent.node_type();
        let Some(slot) = parent_type.child(name).cloned() else {
            self.warn(path, format!("skipped unknown element <{}>", name));
            if !empty {
                self.skip_element()?;
            }
            self.bindings.truncate(mark);
            return Ok(());
        };

        let count = parent
            .children(&slot)
            .map_err(|e| SerializationError::Rejected {
                path: path.to_string(),
                source: e.into(),
            })?
            .len();
        if !slot.occurs().admits_more(count) {
            return Err(SerializationError::TooManyChildren {
                path: path.to_string(),
                slot: slot.name().to_string(),
                max: slot.occurs().max.unwrap_or(u32::MAX),
            });
        }

        let child_path = element_path(path, &slot, count);
        let node_type = self.element_type(start, &slot, &child_path)?;
        let child = Node::new(&node_type).map_err(|e| SerializationError::Rejected {
            path: child_path.clone(),
            source: e.into(),
        })?;
        self.read_body(&child, start, empty, &child_path)?;
        self.bindings.truncate(mark);

        parent
            .append_child(&slot, &child)
            .map_err(|source| SerializationError::Rejected {
                path: child_path,
                source,
            })
    }

    /// Type named by `xsi:type`, or the slot's first allowed type
    fn element_type(
        &self,
        start: &BytesStart<'_>,
        slot: &ChildHandle,
        path: &str,
    ) -> SerializationResult<NodeType> {
        let node_type = match self.xsi_type(start)? {
            Some(text) => {
                let (prefix, name) = split_name(&text);
                self.namespace_of(prefix.unwrap_or(""))
                    .and_then(|namespace| self.registry.resolve(&namespace, name))
                    .ok_or_else(|| SerializationError::UnknownType {
                        path: path.to_string(),
                        type_name: text.clone(),
                    })?
            }
            None => {
                let declared = slot.allowed_types().first().and_then(|name| {
                    self.registry.resolve_qualified(name)
                });
                let declared = declared.ok_or_else(|| SerializationError::UnknownType {
                    path: path.to_string(),
                    type_name: slot.name().to_string(),
                })?;
                if declared.is_abstract() {
                    return Err(SerializationError::AbstractType {
                        path: path.to_string(),
                        type_name: declared.to_string(),
                    });
                }
                declared
            }
        };

        if node_type.is_abstract() {
            return Err(SerializationError::AbstractType {
                path: path.to_string(),
                type_name: node_type.to_string(),
            });
        }
        if !slot.allows(&node_type) {
            return Err(SerializationError::TypeNotAllowed {
                path: path.to_string(),
                type_name: node_type.to_string(),
                slot: slot.name().to_string(),
            });
        }
        Ok(node_type)
    }

    fn read_attributes(
        &mut self,
        node: &Node,
        start: &BytesStart<'_>,
        path: &str,
    ) -> SerializationResult<()> {
        let node_type = node.node_type();
        let mut seen = HashSet::new();

        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| self.xml_error(e))?;
            let key = self.utf8(attribute.key.as_ref())?;
            let (prefix, name) = split_name(key);
            match prefix {
                None if name == "xmlns" => continue,
                Some("xmlns") => continue,
                Some(prefix) if self.is_xsi(prefix) => continue,
                Some(_) => {
                    self.warn(path, format!("skipped unknown attribute \"{}\"", key));
                    continue;
                }
                None => {}
            }

            let Some(handle) = node_type.attribute(name) else {
                self.warn(path, format!("skipped unknown attribute \"{}\"", name));
                continue;
            };
            let text = attribute.unescape_value().map_err(|e| self.xml_error(e))?;
            let invalid = |source| SerializationError::InvalidValue {
                path: path.to_string(),
                attribute: name.to_string(),
                source,
            };
            let value = handle.definition().kind.parse_text(&text).map_err(invalid)?;
            node.set_attribute(handle, value).map_err(|e| match e {
                DomError::Validation(ValidationError { source, .. }) => invalid(source),
                other => SerializationError::Rejected {
                    path: path.to_string(),
                    source: other,
                },
            })?;
            seen.insert(handle.name().to_string());
        }

        if let Some(missing) = node_type
            .attributes()
            .iter()
            .find(|h| h.definition().required && !seen.contains(h.name()))
        {
            return Err(SerializationError::MissingAttribute {
                path: path.to_string(),
                attribute: missing.name().to_string(),
            });
        }
        Ok(())
    }

    fn xsi_type(&self, start: &BytesStart<'_>) -> SerializationResult<Option<String>> {
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| self.xml_error(e))?;
            let (prefix, name) = split_name(self.utf8(attribute.key.as_ref())?);
            if name == "type" && prefix.map_or(false, |p| self.is_xsi(p)) {
                let value = attribute.unescape_value().map_err(|e| self.xml_error(e))?;
                return Ok(Some(value.trim().to_string()));
            }
        }
        Ok(None)
    }

    fn bind_namespaces(&mut self, start: &BytesStart<'_>) -> SerializationResult<()> {
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| self.xml_error(e))?;
            let key = self.utf8(attribute.key.as_ref())?.to_string();
            let prefix = match split_name(&key) {
                (None, "xmlns") => String::new(),
                (Some("xmlns"), prefix) => prefix.to_string(),
                _ => continue,
            };
            let uri = attribute.unescape_value().map_err(|e| self.xml_error(e))?;
            self.bindings.push((prefix, uri.into_owned()));
        }
        Ok(())
    }

    /// Document binding first, then the registry's own prefixes
    fn namespace_of(&self, prefix: &str) -> Option<String> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone())
            .or_else(|| {
                self.registry
                    .namespace_for_prefix(prefix)
                    .filter(|_| !prefix.is_empty())
                    .map(str::to_string)
            })
    }

    fn is_xsi(&self, prefix: &str) -> bool {
        match self.bindings.iter().rev().find(|(p, _)| p == prefix) {
            Some((_, uri)) => uri == XSI_NAMESPACE,
            None => prefix == "xsi",
        }
    }

    fn skip_element(&mut self) -> SerializationResult<()> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.next_event()? {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth -= 1,
                Event::Eof => {
                    return Err(SerializationError::UnexpectedEof {
                        path: "skipped element".to_string(),
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn next_event(&mut self) -> SerializationResult<Event<'a>> {
        self.xml.read_event().map_err(|e| self.xml_error(e))
    }

    fn warn(&mut self, path: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(path, "{}", message);
        self.report.warnings.push(LoadWarning {
            path: path.to_string(),
            message,
        });
    }

    fn utf8<'b>(&self, bytes: &'b [u8]) -> SerializationResult<&'b str> {
        std::str::from_utf8(bytes).map_err(|e| self.xml_error(e))
    }

    fn xml_error(&self, error: impl fmt::Display) -> SerializationError {
        SerializationError::xml(self.xml.buffer_position() as u64, error)
    }
}

fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}
