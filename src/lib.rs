pub mod config;
pub mod entities;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::config::UploadConfig;
pub use crate::error::{StorageError, UploadError};
pub use crate::models::{
    FileField, FileSubmissions, FormContext, NormalizedFileEntry, RawFile, RawFileBatch,
    RawFileSubmission, UploadResult, ValidatedUpload,
};
pub use crate::services::field_set::{FieldSetValidator, FormFieldStore, SeaOrmFieldStore};
pub use crate::services::hooks::{DefaultHooks, UploadHooks};
pub use crate::services::interceptor::InterceptorRegistry;
pub use crate::services::storage::{HostStorage, StoredUpload, UploadOverrides};
pub use crate::services::upload_service::UploadService;
