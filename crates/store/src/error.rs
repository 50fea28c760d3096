use zimage_core::error::CoreError;

/// Errors from the result store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize job metadata: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A record names a file that is not a plain artifact filename.
    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    /// The store never overwrites an existing file.
    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Image not found: {0}")]
    NotFound(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => CoreError::NotFound {
                entity: "Image",
                name,
            },
            StoreError::InvalidName(name) => {
                CoreError::Validation(format!("Invalid artifact name: {name}"))
            }
            other => CoreError::Internal(other.to_string()),
        }
    }
}
