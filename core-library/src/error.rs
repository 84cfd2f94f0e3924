use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Malformed catalog data: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl LibraryError {
    pub fn book_not_found(id: impl Into<String>) -> Self {
        LibraryError::NotFound {
            entity_type: "Book".to_string(),
            id: id.into(),
        }
    }

    pub fn chapter_not_found(id: impl Into<String>) -> Self {
        LibraryError::NotFound {
            entity_type: "Chapter".to_string(),
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
