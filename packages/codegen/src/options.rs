/// Configuration for the schema compiler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Emit only types explicitly marked `@include`
    /// When false, every type is emitted unless it is marked `@exclude`
    pub annotated_only: bool,

    /// Wrap the generated namespace modules in one outer module
    pub module_name: Option<String>,
}

impl CompileOptions {
    /// Options for annotated-only output
    pub fn annotated_only() -> Self {
        Self {
            annotated_only: true,
            ..Default::default()
        }
    }

    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }
}
