/// Formatting options for the document writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Spaces per nesting level; 0 writes everything on one line
    pub indent: usize,

    /// Write attributes that still read as their default
    /// When false, only locally set and required attributes are written
    pub persist_default_attributes: bool,

    /// Emit an `<?xml ...?>` declaration
    pub xml_declaration: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            persist_default_attributes: false,
            xml_declaration: true,
        }
    }
}

impl WriteOptions {
    /// Single-line output without a declaration
    pub fn compact() -> Self {
        Self {
            indent: 0,
            xml_declaration: false,
            ..Default::default()
        }
    }
}
