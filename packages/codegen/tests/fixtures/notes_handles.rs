// Generated by treeform, do not edit.

pub mod schema {
    use treeform_dom::{AttributeHandle, BindingError, ChildHandle, NodeType, TypeRegistry};

    /// Handles for namespace `urn:notes`
    pub mod notes {
        use super::*;

        pub const NS: &str = "urn:notes";

        /// Handles for `noteType`
        #[derive(Debug, Clone)]
        pub struct NoteType {
            pub node_type: NodeType,
            pub text: AttributeHandle,
            pub r#type: AttributeHandle,
            pub node_type2: AttributeHandle,
            pub reply: ChildHandle,
        }

        impl NoteType {
            pub fn bind(registry: &TypeRegistry) -> Result<Self, BindingError> {
                let node_type = registry.bind_type(NS, "noteType")?;
                Ok(Self {
                    text: node_type.bind_attribute("text")?,
                    r#type: node_type.bind_attribute("type")?,
                    node_type2: node_type.bind_attribute("nodeType")?,
                    reply: node_type.bind_child("reply")?,
                    node_type,
                })
            }
        }

        /// Every handle of this namespace
        #[derive(Debug, Clone)]
        pub struct Handles {
            pub note_type: NoteType,
            pub note_root: ChildHandle,
        }

        impl Handles {
            pub fn bind(registry: &TypeRegistry) -> Result<Self, BindingError> {
                Ok(Self {
                    note_type: NoteType::bind(registry)?,
                    note_root: registry.bind_root(NS, "note")?,
                })
            }
        }
    }
}
