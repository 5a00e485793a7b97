/// Errors that can occur while loading schemas or validating params.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema file could not be loaded.
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    /// The schema could not be compiled.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),

    /// The params failed schema validation.
    #[error("params for `{method}` failed validation: {message}")]
    ValidationFailed { method: String, message: String },

    /// The schema text is not valid JSON.
    #[error("schema is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// No schema registered for the given method.
    #[error("no schema registered for method `{0}`")]
    NoSchema(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
