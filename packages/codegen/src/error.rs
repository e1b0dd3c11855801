use thiserror::Error;

pub type CodegenResult<T> = Result<T, CodegenError>;

#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("Failed to encode handle manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}
