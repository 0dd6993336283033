use crate::entities::{form_fields, prelude::*};
use crate::error::UploadError;
use crate::models::{FileField, FileSubmissions, FormContext, ValidatedUpload};
use crate::services::upload_service::UploadService;
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only access to the persisted form field definitions.
#[async_trait]
pub trait FormFieldStore: Send + Sync {
    /// Active file fields shown in `context`, in display order.
    async fn file_fields(&self, context: &FormContext) -> Result<Vec<FileField>, UploadError>;
}

pub struct SeaOrmFieldStore {
    db: DatabaseConnection,
}

impl SeaOrmFieldStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FormFieldStore for SeaOrmFieldStore {
    async fn file_fields(&self, context: &FormContext) -> Result<Vec<FileField>, UploadError> {
        let mut query = FormFields::find()
            .filter(form_fields::Column::FormType.eq(context.form_type()))
            .filter(form_fields::Column::FieldType.eq("file"))
            .filter(form_fields::Column::IsActive.eq(true));

        query = match context {
            FormContext::Register => query.filter(form_fields::Column::IsRegisterField.eq(true)),
            FormContext::Account => {
                query.filter(form_fields::Column::IsRegisterOnlyField.eq(false))
            }
            FormContext::Other(_) => query,
        };

        let fields = query
            .order_by_asc(form_fields::Column::SortOrder)
            .all(&self.db)
            .await?;

        Ok(fields.into_iter().map(FileField::from).collect())
    }
}

/// Runs the upload flow for every file field of a form.
pub struct FieldSetValidator {
    uploads: Arc<UploadService>,
    store: Arc<dyn FormFieldStore>,
}

impl FieldSetValidator {
    pub fn new(uploads: Arc<UploadService>, store: Arc<dyn FormFieldStore>) -> Self {
        Self { uploads, store }
    }

    /// Validates and stores the submitted files, keyed by field name. Fields
    /// are loaded for `context` unless given. The first failing field aborts
    /// the whole pass.
    pub async fn validate_uploads(
        &self,
        files: &FileSubmissions,
        context: &FormContext,
        url_only: bool,
        fields: Option<Vec<FileField>>,
    ) -> Result<BTreeMap<String, ValidatedUpload>, UploadError> {
        let mut validated = BTreeMap::new();

        if files.is_empty() {
            return Ok(validated);
        }

        let fields = match fields {
            Some(fields) => fields,
            None => self.store.file_fields(context).await?,
        };

        for field in &fields {
            if !files.contains_key(&field.htmlvar_name) {
                continue;
            }

            let result = match self.uploads.handle_file_upload(field, files).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::info!(
                        "Upload validation failed for '{}' on {} form: {}",
                        field.htmlvar_name,
                        context,
                        e
                    );
                    return Err(e);
                }
            };

            if let Some(result) = result {
                let value = if url_only {
                    ValidatedUpload::Url(result.url)
                } else {
                    ValidatedUpload::Full(result)
                };
                validated.insert(field.htmlvar_name.clone(), value);
            }
        }

        Ok(validated)
    }
}
