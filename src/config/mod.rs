use crate::utils::validation::size_in_bytes;
use std::env;
use std::path::PathBuf;

/// Upload configuration, mostly mirroring limits the host platform owns.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Running as part of a multi-site network (default: false)
    pub multisite: bool,

    /// Network-wide upload limit in kilobytes, multisite only (default: 300)
    pub network_upload_max_kb: u64,

    /// Host per-file limit in shorthand notation (default: "2M")
    pub upload_max_filesize: String,

    /// Host request body limit in shorthand notation (default: "8M")
    pub post_max_size: String,

    /// Directory uploads are stored under (default: "uploads")
    pub upload_dir: PathBuf,

    /// Directory upload sources must resolve into (default: the system temp
    /// directory). `None` accepts any source path.
    pub upload_tmp_dir: Option<PathBuf>,

    /// Public URL of `upload_dir` (default: "http://localhost/uploads")
    pub base_url: String,

    /// Database holding the form field definitions
    pub database_url: String,

    /// Storage backend: "local" or "s3" (default: "local")
    pub storage_backend: String,

    /// Bucket for the "s3" backend
    pub s3_bucket: Option<String>,

    /// Custom endpoint for the "s3" backend (MinIO and friends)
    pub s3_endpoint: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            multisite: false,
            network_upload_max_kb: 300,
            upload_max_filesize: "2M".to_string(),
            post_max_size: "8M".to_string(),
            upload_dir: PathBuf::from("uploads"),
            upload_tmp_dir: Some(env::temp_dir()),
            base_url: "http://localhost/uploads".to_string(),
            database_url: "sqlite://profile_uploads.db?mode=rwc".to_string(),
            storage_backend: "local".to_string(),
            s3_bucket: None,
            s3_endpoint: None,
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            multisite: env::var("IS_MULTISITE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.multisite),

            network_upload_max_kb: env::var("FILEUPLOAD_MAXK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.network_upload_max_kb),

            upload_max_filesize: env::var("UPLOAD_MAX_FILESIZE")
                .unwrap_or(default.upload_max_filesize),

            post_max_size: env::var("POST_MAX_SIZE").unwrap_or(default.post_max_size),

            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            upload_tmp_dir: env::var("UPLOAD_TMP_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .or(default.upload_tmp_dir),

            base_url: env::var("UPLOAD_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.base_url),

            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            storage_backend: env::var("STORAGE_BACKEND").unwrap_or(default.storage_backend),

            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
        }
    }

    /// Create config for development (in-memory database, generous limits)
    pub fn development() -> Self {
        Self {
            upload_max_filesize: "64M".to_string(),
            post_max_size: "128M".to_string(),
            database_url: "sqlite::memory:".to_string(),
            ..Self::default()
        }
    }

    /// The host's own per-upload ceiling: the smaller of the per-file and
    /// request limits. Unset (zero) limits are ignored; zero if neither is set.
    pub fn host_max_upload_size(&self) -> u64 {
        [
            size_in_bytes(&self.upload_max_filesize),
            size_in_bytes(&self.post_max_size),
        ]
        .into_iter()
        .filter(|limit| *limit > 0)
        .min()
        .unwrap_or(0)
    }

    pub fn network_max_upload_size(&self) -> u64 {
        self.network_upload_max_kb.saturating_mul(1024)
    }
}
