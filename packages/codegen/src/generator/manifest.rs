use super::CodeGenerator;
use crate::decls::HandleDeclarations;
use crate::error::CodegenResult;

/// Writes the declarations as pretty-printed JSON
#[derive(Debug, Default)]
pub struct ManifestGenerator;

impl CodeGenerator for ManifestGenerator {
    fn generate(&self, decls: &HandleDeclarations) -> CodegenResult<String> {
        let mut json = decls.to_json()?;
        json.push('\n');
        Ok(json)
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }
}
