use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::models::{FileField, FileSubmissions, NormalizedFileEntry, UploadResult};
use crate::services::hooks::UploadHooks;
use crate::services::interceptor::{IMAGE_ONLY_INTERCEPTOR, InterceptorRegistry};
use crate::services::policy;
use crate::services::storage::{HostStorage, UploadOverrides};
use crate::services::submission::normalize;
use crate::utils::mime_types::{MimeMap, normalize_mime};
use crate::utils::validation::{validate_file_size, validate_file_type};
use std::path::Path;
use std::sync::Arc;

/// Options for [`UploadService::upload_file`].
#[derive(Debug, Clone, Default)]
pub struct UploadArgs {
    /// Position of the file within its field, handed to the overrides hook
    pub file_key: usize,
    /// Field label used in the type error message
    pub file_label: Option<String>,
    /// Host MIME mapping the file must match; the storage's own list if unset
    pub allowed_mime_types: Option<MimeMap>,
}

/// Validates field uploads and hands accepted files to host storage.
pub struct UploadService {
    storage: Arc<dyn HostStorage>,
    hooks: Arc<dyn UploadHooks>,
    interceptors: InterceptorRegistry,
    config: UploadConfig,
}

impl UploadService {
    pub fn new(
        storage: Arc<dyn HostStorage>,
        hooks: Arc<dyn UploadHooks>,
        interceptors: InterceptorRegistry,
        config: UploadConfig,
    ) -> Self {
        Self {
            storage,
            hooks,
            interceptors,
            config,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn interceptors(&self) -> &InterceptorRegistry {
        &self.interceptors
    }

    /// Validates and stores every file submitted for `field`, stopping at the
    /// first failure. Returns the first stored file, or `None` when nothing was
    /// submitted for the field.
    pub async fn handle_file_upload(
        &self,
        field: &FileField,
        files: &FileSubmissions,
    ) -> Result<Option<UploadResult>, UploadError> {
        let Some(submission) = files.get(&field.htmlvar_name) else {
            return Ok(None);
        };

        let entries = normalize(submission);
        if entries.is_empty() {
            return Ok(None);
        }

        let allowed = policy::allowed_types(field, self.hooks.as_ref());
        let max_size = policy::max_upload_size(
            &self.config,
            self.hooks.as_ref(),
            &field.form_type,
            &field.htmlvar_name,
        );
        let host_mimes = self.storage.allowed_mime_types();

        let mut uploaded = Vec::with_capacity(entries.len());
        for (file_key, entry) in entries.iter().enumerate() {
            // 1. Type check
            validate_file_type(&entry.mime_type, &allowed, &host_mimes)?;

            // 2. Size check
            validate_file_size(entry.size, max_size)?;

            // 3. Hook checks
            self.hooks.pre_upload_check(field, file_key, entry)?;

            // 4. Store, with the image-only prefilter out of the way
            let args = UploadArgs {
                file_key,
                ..UploadArgs::default()
            };
            let result = {
                let _suspended = self.interceptors.suspend(IMAGE_ONLY_INTERCEPTOR);
                self.upload_file(entry, &args).await
            };
            uploaded.push(result?);
        }

        tracing::info!(
            "Stored {} file(s) for field '{}'",
            uploaded.len(),
            field.htmlvar_name
        );
        Ok(uploaded.into_iter().next())
    }

    /// Checks the file against the host's MIME list and stores it.
    pub async fn upload_file(
        &self,
        file: &NormalizedFileEntry,
        args: &UploadArgs,
    ) -> Result<UploadResult, UploadError> {
        let allowed_mime_types = args
            .allowed_mime_types
            .clone()
            .unwrap_or_else(|| self.storage.allowed_mime_types());

        if !allowed_mime_types.contains_mime(&file.mime_type) {
            let patterns = allowed_mime_types.patterns();
            return Err(UploadError::Validation(match &args.file_label {
                Some(label) => format!(
                    "\"{}\" (filetype {}) needs to be one of the following file types: {}",
                    label, file.mime_type, patterns
                ),
                None => format!(
                    "Uploaded files need to be one of the following file types: {}",
                    patterns
                ),
            }));
        }

        let overrides = self
            .hooks
            .upload_overrides(UploadOverrides::default(), args.file_key);
        tracing::debug!("Handing '{}' (key {}) to host storage", file.name, args.file_key);

        let stored = self
            .storage
            .handle_upload(file, &overrides)
            .await
            .map_err(|e| UploadError::Validation(e.to_string()))?;

        let name = Path::new(&stored.file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.name.clone());

        Ok(UploadResult {
            url: stored.url,
            path: stored.file,
            size: file.size,
            name,
            mime_type: normalize_mime(&stored.mime_type),
        })
    }
}
