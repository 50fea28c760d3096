#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("{entity} not found: {name}")]
    NotFound { entity: &'static str, name: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
