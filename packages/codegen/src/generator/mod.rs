pub mod manifest;
pub mod rust;

use crate::decls::HandleDeclarations;
use crate::error::CodegenResult;

/// Plugin trait for emitting handle declarations
/// Implementations target different outputs (Rust source, JSON manifest)
pub trait CodeGenerator {
    /// Render the complete output file
    fn generate(&self, decls: &HandleDeclarations) -> CodegenResult<String>;

    /// Conventional extension of the output file, without the dot
    fn file_extension(&self) -> &'static str;
}
