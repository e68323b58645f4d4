use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaoError {
    /// Entity declaration problems: missing table, missing or duplicate primary key,
    /// unknown id strategy, oversized uuid length.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unresolved `@`/`$` tokens or mismatched named parameters.
    #[error("Template error: {0}")]
    Template(String),

    /// Caller supplied input the operation cannot act on.
    #[error("Operation error: {0}")]
    Operation(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
