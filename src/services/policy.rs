use crate::config::UploadConfig;
use crate::models::{ANY_FILE_TYPE, FileField};
use crate::services::hooks::UploadHooks;

/// Effective allow-list of a field. Empty means every type is allowed.
pub fn allowed_types(field: &FileField, hooks: &dyn UploadHooks) -> Vec<String> {
    let configured = match &field.extra.file_types {
        Some(types) if !types.iter().any(|t| t == ANY_FILE_TYPE) => types.clone(),
        _ => Vec::new(),
    };

    let allowed = hooks.allowed_mime_types(configured, &field.htmlvar_name);
    if allowed.is_empty() {
        tracing::debug!("Field '{}' accepts any file type", field.htmlvar_name);
    }
    allowed
}

/// Byte ceiling for uploads to a field. Zero rejects every non-empty file.
pub fn max_upload_size(
    config: &UploadConfig,
    hooks: &dyn UploadHooks,
    form_type: &str,
    field_name: &str,
) -> u64 {
    let host_limit = config.host_max_upload_size();
    let limit = if config.multisite {
        config.network_max_upload_size().min(host_limit)
    } else {
        host_limit
    };

    hooks.max_upload_size(limit, form_type, field_name)
}
