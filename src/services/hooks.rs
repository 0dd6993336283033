use crate::error::UploadError;
use crate::models::{FileField, NormalizedFileEntry};
use crate::services::storage::UploadOverrides;

/// Interception points around the upload flow. Every method defaults to
/// passing its input through unchanged.
pub trait UploadHooks: Send + Sync {
    /// Adjust the effective allow-list of a field. An empty list admits all
    /// types.
    fn allowed_mime_types(&self, allowed: Vec<String>, _field_name: &str) -> Vec<String> {
        allowed
    }

    /// Adjust the resolved byte ceiling for a field.
    fn max_upload_size(&self, max_size: u64, _form_type: &str, _field_name: &str) -> u64 {
        max_size
    }

    /// Extra per-file validation after the type and size checks. An error is
    /// returned to the caller as is.
    fn pre_upload_check(
        &self,
        _field: &FileField,
        _file_key: usize,
        _entry: &NormalizedFileEntry,
    ) -> Result<(), UploadError> {
        Ok(())
    }

    /// Adjust the options handed to host storage for the file at `file_key`
    /// within its field.
    fn upload_overrides(&self, overrides: UploadOverrides, _file_key: usize) -> UploadOverrides {
        overrides
    }
}

/// Hooks that change nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl UploadHooks for DefaultHooks {}
