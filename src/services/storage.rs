use crate::error::StorageError;
use crate::models::NormalizedFileEntry;
use crate::services::interceptor::InterceptorRegistry;
use crate::utils::mime_types::{MimeMap, check_filetype, normalize_mime};
use crate::utils::validation::sanitize_filename;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Form action expected when `test_form` is enabled.
pub const UPLOAD_ACTION: &str = "wp_handle_upload";

/// Options for a single host storage call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOverrides {
    /// Require `action` to name the upload form
    pub test_form: bool,
    pub action: Option<String>,
    /// Reject empty files
    pub test_size: bool,
    /// Require the file name's extension to match the declared type
    pub test_type: bool,
    /// Replaces the storage's own MIME mapping for this call
    pub mimes: Option<MimeMap>,
}

impl Default for UploadOverrides {
    fn default() -> Self {
        Self {
            test_form: false,
            action: None,
            test_size: true,
            test_type: true,
            mimes: None,
        }
    }
}

/// What the host reports back for a stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUpload {
    pub url: String,
    pub file: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// The host platform's storage primitive.
#[async_trait]
pub trait HostStorage: Send + Sync {
    /// Validates the file against the host's own rules and persists it.
    async fn handle_upload(
        &self,
        file: &NormalizedFileEntry,
        overrides: &UploadOverrides,
    ) -> Result<StoredUpload, StorageError>;

    /// The host's canonical list of uploadable types.
    fn allowed_mime_types(&self) -> MimeMap {
        MimeMap::default()
    }
}

/// Message for a non-zero upload error code.
pub fn upload_error_message(code: i32) -> &'static str {
    match code {
        1 => "The uploaded file exceeds the upload_max_filesize directive in php.ini.",
        2 => "The uploaded file exceeds the MAX_FILE_SIZE directive that was specified in the HTML form.",
        3 => "The uploaded file was only partially uploaded.",
        4 => "No file was uploaded.",
        6 => "Missing a temporary folder.",
        7 => "Failed to write file to disk.",
        8 => "File upload stopped by extension.",
        _ => "An unknown error occurred during upload.",
    }
}

/// A file that passed the host checks and is ready to be written.
#[derive(Debug)]
struct AcceptedFile {
    entry: NormalizedFileEntry,
    filename: String,
    mime_type: String,
}

/// Whether `tmp_name` resolves to a file inside `tmp_dir`.
fn is_uploaded_file(tmp_name: &Path, tmp_dir: &Path) -> bool {
    let (Ok(file), Ok(dir)) = (tmp_name.canonicalize(), tmp_dir.canonicalize()) else {
        return false;
    };
    file.starts_with(&dir) && file.is_file()
}

/// Checks shared by every backend: interceptors, client error codes, form,
/// size, source and type tests. Without `tmp_dir` any source path is accepted.
fn preflight(
    file: &NormalizedFileEntry,
    overrides: &UploadOverrides,
    interceptors: &InterceptorRegistry,
    default_mimes: &MimeMap,
    tmp_dir: Option<&Path>,
) -> Result<AcceptedFile, StorageError> {
    let mut entry = file.clone();
    interceptors
        .run(&mut entry)
        .map_err(|e| StorageError::Rejected(e.to_string()))?;

    if entry.error != 0 {
        return Err(StorageError::Rejected(
            upload_error_message(entry.error).to_string(),
        ));
    }

    if overrides.test_form && overrides.action.as_deref() != Some(UPLOAD_ACTION) {
        return Err(StorageError::Rejected("Invalid form submission.".to_string()));
    }

    if overrides.test_size && entry.size == 0 {
        return Err(StorageError::Rejected(
            "File is empty. Please upload something more substantial.".to_string(),
        ));
    }

    if let Some(tmp_dir) = tmp_dir {
        if !is_uploaded_file(&entry.tmp_name, tmp_dir) {
            tracing::warn!(
                "Refusing upload source {:?} outside {:?}",
                entry.tmp_name,
                tmp_dir
            );
            return Err(StorageError::Rejected(
                "Specified file failed upload test.".to_string(),
            ));
        }
    }

    let mime_type = normalize_mime(&entry.mime_type);
    if overrides.test_type {
        let mimes = overrides.mimes.as_ref().unwrap_or(default_mimes);
        match check_filetype(&entry.name, mimes) {
            Some(detected) if detected.mime_type == mime_type => {}
            _ => {
                return Err(StorageError::Rejected(
                    "Sorry, you are not allowed to upload this file type.".to_string(),
                ));
            }
        }
    }

    let filename = sanitize_filename(&entry.name)
        .ok_or_else(|| StorageError::Rejected("Invalid file name.".to_string()))?;

    Ok(AcceptedFile {
        entry,
        filename,
        mime_type,
    })
}

/// Picks `name`, `name-1.ext`, `name-2.ext`, ... until `taken` says no.
fn unique_filename(filename: &str, mut taken: impl FnMut(&str) -> bool) -> String {
    if !taken(filename) {
        return filename.to_string();
    }

    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{}", ext)),
        _ => (filename, String::new()),
    };

    let mut n = 1;
    loop {
        let candidate = format!("{}-{}{}", stem, n, ext);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Stores uploads on the local filesystem under `<root>/<YYYY>/<MM>/`.
pub struct LocalHostStorage {
    root: PathBuf,
    base_url: String,
    interceptors: InterceptorRegistry,
    mimes: MimeMap,
    upload_tmp_dir: Option<PathBuf>,
}

impl LocalHostStorage {
    /// Source files must live in the system temp directory unless changed
    /// with [`LocalHostStorage::with_upload_tmp_dir`].
    pub fn new(root: impl Into<PathBuf>, base_url: &str, interceptors: InterceptorRegistry) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            interceptors,
            mimes: MimeMap::default(),
            upload_tmp_dir: Some(std::env::temp_dir()),
        }
    }

    pub fn with_mimes(mut self, mimes: MimeMap) -> Self {
        self.mimes = mimes;
        self
    }

    /// Directory upload sources must resolve into. `None` accepts any path.
    pub fn with_upload_tmp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.upload_tmp_dir = dir;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl HostStorage for LocalHostStorage {
    async fn handle_upload(
        &self,
        file: &NormalizedFileEntry,
        overrides: &UploadOverrides,
    ) -> Result<StoredUpload, StorageError> {
        let accepted = preflight(
            file,
            overrides,
            &self.interceptors,
            &self.mimes,
            self.upload_tmp_dir.as_deref(),
        )?;

        let subdir = Utc::now().format("%Y/%m").to_string();
        let dir = self.root.join(&subdir);
        tokio::fs::create_dir_all(&dir).await?;

        let filename = unique_filename(&accepted.filename, |candidate| {
            dir.join(candidate).exists()
        });
        let destination = dir.join(&filename);

        if let Err(e) = tokio::fs::copy(&accepted.entry.tmp_name, &destination).await {
            tracing::warn!(
                "Copying {:?} to {:?} failed: {}",
                accepted.entry.tmp_name,
                destination,
                e
            );
            return Err(StorageError::Rejected(format!(
                "The uploaded file could not be moved to {}.",
                dir.display()
            )));
        }

        tracing::info!("Stored upload {:?} ({} bytes)", destination, accepted.entry.size);

        Ok(StoredUpload {
            url: format!("{}/{}/{}", self.base_url, subdir, filename),
            file: destination.to_string_lossy().into_owned(),
            mime_type: accepted.mime_type,
        })
    }

    fn allowed_mime_types(&self) -> MimeMap {
        self.mimes.clone()
    }
}

/// Stores uploads in an S3-compatible bucket under `<YYYY>/<MM>/`.
pub struct S3HostStorage {
    client: Client,
    bucket: String,
    base_url: String,
    interceptors: InterceptorRegistry,
    mimes: MimeMap,
    upload_tmp_dir: Option<PathBuf>,
}

impl S3HostStorage {
    pub fn new(
        client: Client,
        bucket: String,
        base_url: &str,
        interceptors: InterceptorRegistry,
    ) -> Self {
        Self {
            client,
            bucket,
            base_url: base_url.trim_end_matches('/').to_string(),
            interceptors,
            mimes: MimeMap::default(),
            upload_tmp_dir: Some(std::env::temp_dir()),
        }
    }

    /// Directory upload sources must resolve into. `None` accepts any path.
    pub fn with_upload_tmp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.upload_tmp_dir = dir;
        self
    }
}

#[async_trait]
impl HostStorage for S3HostStorage {
    async fn handle_upload(
        &self,
        file: &NormalizedFileEntry,
        overrides: &UploadOverrides,
    ) -> Result<StoredUpload, StorageError> {
        let accepted = preflight(
            file,
            overrides,
            &self.interceptors,
            &self.mimes,
            self.upload_tmp_dir.as_deref(),
        )?;

        let data = tokio::fs::read(&accepted.entry.tmp_name).await?;
        let unique_id = uuid::Uuid::new_v4().simple().to_string();
        let key = format!(
            "{}/{}-{}",
            Utc::now().format("%Y/%m"),
            &unique_id[..8],
            accepted.filename
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&accepted.mime_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("S3 put_object failed: bucket={}, key={}, error={:?}", self.bucket, key, e);
                StorageError::Backend(e.to_string())
            })?;

        Ok(StoredUpload {
            url: format!("{}/{}", self.base_url, key),
            file: key,
            mime_type: accepted.mime_type,
        })
    }

    fn allowed_mime_types(&self) -> MimeMap {
        self.mimes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::interceptor::register_profile_interceptor;

    fn entry(name: &str, mime_type: &str, size: u64) -> NormalizedFileEntry {
        NormalizedFileEntry {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size,
            ..Default::default()
        }
    }

    #[test]
    fn test_preflight_checks() {
        let registry = InterceptorRegistry::new();
        let mimes = MimeMap::default();
        let overrides = UploadOverrides::default();

        let accepted = preflight(&entry("cv.pdf", "application/pdf", 10), &overrides, &registry, &mimes, None)
            .unwrap();
        assert_eq!(accepted.filename, "cv.pdf");
        assert_eq!(accepted.mime_type, "application/pdf");

        // Extension does not match the declared type
        let err = preflight(&entry("cv.pdf", "image/png", 10), &overrides, &registry, &mimes, None)
            .unwrap_err();
        assert_eq!(err.to_string(), "Sorry, you are not allowed to upload this file type.");

        let err = preflight(&entry("cv.pdf", "application/pdf", 0), &overrides, &registry, &mimes, None)
            .unwrap_err();
        assert!(err.to_string().starts_with("File is empty"));

        let mut partial = entry("cv.pdf", "application/pdf", 10);
        partial.error = 3;
        let err = preflight(&partial, &overrides, &registry, &mimes, None).unwrap_err();
        assert_eq!(err.to_string(), "The uploaded file was only partially uploaded.");

        let form_checked = UploadOverrides {
            test_form: true,
            ..UploadOverrides::default()
        };
        assert!(preflight(&entry("cv.pdf", "application/pdf", 10), &form_checked, &registry, &mimes, None).is_err());
    }

    #[test]
    fn test_preflight_runs_interceptors() {
        let registry = InterceptorRegistry::new();
        register_profile_interceptor(&registry, true);
        let err = preflight(
            &entry("cv.pdf", "application/pdf", 10),
            &UploadOverrides::default(),
            &registry,
            &MimeMap::default(),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains(".GIF"));
    }

    #[test]
    fn test_preflight_confines_source_to_tmp_dir() {
        let registry = InterceptorRegistry::new();
        let mimes = MimeMap::default();
        let overrides = UploadOverrides::default();
        let tmp_dir = tempfile::TempDir::new().unwrap();

        let inside = tmp_dir.path().join("php123");
        std::fs::write(&inside, b"notes").unwrap();
        let mut file = entry("notes.txt", "text/plain", 5);
        file.tmp_name = inside;
        assert!(preflight(&file, &overrides, &registry, &mimes, Some(tmp_dir.path())).is_ok());

        let outside = tempfile::NamedTempFile::new().unwrap();
        file.tmp_name = outside.path().to_path_buf();
        let err = preflight(&file, &overrides, &registry, &mimes, Some(tmp_dir.path()))
            .unwrap_err();
        assert_eq!(err.to_string(), "Specified file failed upload test.");

        file.tmp_name = tmp_dir.path().join("..").join(outside.path().file_name().unwrap());
        assert!(preflight(&file, &overrides, &registry, &mimes, Some(tmp_dir.path())).is_err());

        // Directories are not upload sources
        file.tmp_name = tmp_dir.path().to_path_buf();
        assert!(preflight(&file, &overrides, &registry, &mimes, Some(tmp_dir.path())).is_err());
    }

    #[test]
    fn test_unique_filename() {
        let existing = ["cv.pdf", "cv-1.pdf", "README"];
        let taken = |name: &str| existing.contains(&name);
        assert_eq!(unique_filename("new.pdf", taken), "new.pdf");
        assert_eq!(unique_filename("cv.pdf", taken), "cv-2.pdf");
        assert_eq!(unique_filename("README", taken), "README-1");
    }
}
