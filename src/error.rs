use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    /// Type or policy rejection, including messages passed through from host
    /// storage.
    #[error("{0}")]
    Validation(String),

    /// Size rejection. Both sizes are already human readable.
    #[error("The uploaded file is too big ({size}). Maximum size allowed: {limit}")]
    FileTooBig { size: String, limit: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl UploadError {
    pub fn validation(message: impl Into<String>) -> Self {
        UploadError::Validation(message.into())
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::Validation(_) => "validation-error",
            UploadError::FileTooBig { .. } => "file-too-big",
            UploadError::Database(_) => "database-error",
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    /// The host refused the file; the message is meant for the end user.
    #[error("{0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}
