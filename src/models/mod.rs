use crate::entities::form_fields;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Wildcard entry in a field's allow-list meaning "any type".
pub const ANY_FILE_TYPE: &str = "*";

/// Upload-capable form field, read from the persisted form definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileField {
    pub htmlvar_name: String,
    pub form_type: String,
    pub label: Option<String>,
    pub extra: FileFieldExtra,
    pub sort_order: i32,
}

/// Decoded extra-configuration blob of a [`FileField`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileFieldExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_types: Option<Vec<String>>,
}

impl FileFieldExtra {
    /// Decodes the stored JSON blob. A missing or unreadable blob means no
    /// extra configuration.
    pub fn parse(blob: Option<&str>) -> Self {
        let Some(blob) = blob.map(str::trim).filter(|b| !b.is_empty()) else {
            return Self::default();
        };

        match serde_json::from_str(blob) {
            Ok(extra) => extra,
            Err(e) => {
                tracing::warn!("Ignoring unreadable field configuration: {}", e);
                Self::default()
            }
        }
    }
}

impl FileField {
    pub fn new(htmlvar_name: impl Into<String>, form_type: impl Into<String>) -> Self {
        Self {
            htmlvar_name: htmlvar_name.into(),
            form_type: form_type.into(),
            label: None,
            extra: FileFieldExtra::default(),
            sort_order: 0,
        }
    }

    pub fn with_file_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra.file_types = Some(types.into_iter().map(Into::into).collect());
        self
    }
}

impl From<form_fields::Model> for FileField {
    fn from(model: form_fields::Model) -> Self {
        Self {
            extra: FileFieldExtra::parse(model.extra_fields.as_deref()),
            htmlvar_name: model.htmlvar_name,
            form_type: model.form_type,
            label: model.site_title,
            sort_order: model.sort_order,
        }
    }
}

/// One file as received from the form submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFile {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default)]
    pub tmp_name: PathBuf,
    #[serde(default)]
    pub error: i32,
    #[serde(default)]
    pub size: u64,
}

/// Several files submitted under one field, as parallel arrays indexed by
/// file position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFileBatch {
    pub name: Vec<String>,
    #[serde(rename = "type", default)]
    pub mime_type: Vec<String>,
    #[serde(default)]
    pub tmp_name: Vec<PathBuf>,
    #[serde(default)]
    pub error: Vec<i32>,
    #[serde(default)]
    pub size: Vec<u64>,
}

/// Submission for a single field, either one file or a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFileSubmission {
    Batch(RawFileBatch),
    Single(RawFile),
}

impl RawFileSubmission {
    /// Reads a submission from its JSON shape. Anything unrecognizable becomes
    /// an empty batch.
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::debug!("Treating malformed file submission as empty: {}", e);
            Self::Batch(RawFileBatch::default())
        })
    }
}

impl From<RawFile> for RawFileSubmission {
    fn from(file: RawFile) -> Self {
        Self::Single(file)
    }
}

impl From<RawFileBatch> for RawFileSubmission {
    fn from(batch: RawFileBatch) -> Self {
        Self::Batch(batch)
    }
}

/// Submitted files keyed by field name.
pub type FileSubmissions = HashMap<String, RawFileSubmission>;

/// A single file after batch-to-list normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub tmp_name: PathBuf,
    pub error: i32,
    pub size: u64,
}

impl From<RawFile> for NormalizedFileEntry {
    fn from(file: RawFile) -> Self {
        Self {
            name: file.name,
            mime_type: file.mime_type,
            tmp_name: file.tmp_name,
            error: file.error,
            size: file.size,
        }
    }
}

/// A file accepted and stored by the host platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub url: String,
    pub path: String,
    pub size: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

impl UploadResult {
    pub fn extension(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

/// Per-field outcome of a field-set validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidatedUpload {
    Url(String),
    Full(UploadResult),
}

impl ValidatedUpload {
    pub fn url(&self) -> &str {
        match self {
            ValidatedUpload::Url(url) => url,
            ValidatedUpload::Full(result) => &result.url,
        }
    }
}

/// Which form the submission came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormContext {
    Register,
    Account,
    Other(String),
}

impl FormContext {
    /// Form type whose field definitions apply to this context.
    pub fn form_type(&self) -> &str {
        match self {
            FormContext::Register | FormContext::Account => "account",
            FormContext::Other(form_type) => form_type,
        }
    }
}

impl From<&str> for FormContext {
    fn from(value: &str) -> Self {
        match value {
            "register" => FormContext::Register,
            "account" => FormContext::Account,
            other => FormContext::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for FormContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormContext::Register => write!(f, "register"),
            FormContext::Account => write!(f, "account"),
            FormContext::Other(form_type) => write!(f, "{}", form_type),
        }
    }
}
