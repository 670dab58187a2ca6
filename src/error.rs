//! Error taxonomy shared by the catalog and the services.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected user input (empty names, empty selections).
    #[error("{0}")]
    Validation(String),

    /// A referenced row does not exist.
    #[error("{kind} with id {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Failures talking to the external photo service (auth, network, payload).
    #[error("photo service error: {0}")]
    External(String),

    /// Missing or unusable setup: closed catalog, absent credentials.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        Error::NotFound { kind, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_id() {
        let err = Error::not_found("Image", 42);
        assert_eq!(err.to_string(), "Image with id 42 not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = Error::validation("Tag name cannot be empty");
        assert_eq!(err.to_string(), "Tag name cannot be empty");
        assert!(!err.is_not_found());
    }
}
