use anyhow::{Context, anyhow};
use clap::Parser;
use dotenvy::dotenv;
use profile_uploads::infrastructure::{database, storage};
use profile_uploads::services::interceptor::register_profile_interceptor;
use profile_uploads::utils::mime_types::{MimeMap, check_filetype};
use profile_uploads::{
    DefaultHooks, FieldSetValidator, FileSubmissions, FormContext, InterceptorRegistry, RawFile,
    RawFileBatch, RawFileSubmission, SeaOrmFieldStore, UploadConfig, UploadService,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Form the files are submitted to (register, account, or a form type)
    #[arg(short, long, default_value = "account")]
    form: String,

    /// File to submit, as FIELD=PATH. Repeat a field to submit several files.
    #[arg(long = "file", value_name = "FIELD=PATH", required = true)]
    files: Vec<String>,

    /// Print the full upload records instead of URLs only
    #[arg(long)]
    full: bool,

    /// Treat the request as a profile image upload (enables the image-only filter)
    #[arg(long)]
    profile_upload: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "profile_uploads=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = UploadConfig::from_env();
    // Sources are operator-supplied paths, not request uploads
    config.upload_tmp_dir = None;
    info!(
        "🛡️  Upload Config: Host Limit={} bytes, Multisite={}, Backend={}",
        config.host_max_upload_size(),
        config.multisite,
        config.storage_backend
    );

    let db = database::setup_database(&config.database_url).await?;

    let interceptors = InterceptorRegistry::new();
    register_profile_interceptor(&interceptors, args.profile_upload);

    let host_storage = storage::setup_storage(&config, interceptors.clone()).await?;
    let uploads = Arc::new(UploadService::new(
        host_storage,
        Arc::new(DefaultHooks),
        interceptors,
        config,
    ));
    let validator = FieldSetValidator::new(uploads, Arc::new(SeaOrmFieldStore::new(db)));

    let files = collect_submissions(&args.files).await?;
    let context = FormContext::from(args.form.as_str());

    match validator
        .validate_uploads(&files, &context, !args.full, None)
        .await
    {
        Ok(validated) => {
            info!("✅ {} field(s) stored", validated.len());
            println!("{}", serde_json::to_string_pretty(&validated)?);
            Ok(())
        }
        Err(e) => {
            error!("❌ Upload rejected [{}]: {}", e.code(), e);
            std::process::exit(1);
        }
    }
}

/// Builds form submissions from `FIELD=PATH` arguments, grouping repeated
/// fields into a batch.
async fn collect_submissions(pairs: &[String]) -> anyhow::Result<FileSubmissions> {
    let mimes = MimeMap::default();
    let mut grouped: BTreeMap<String, Vec<RawFile>> = BTreeMap::new();

    for pair in pairs {
        let (field, path) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected FIELD=PATH, got '{}'", pair))?;
        let path = PathBuf::from(path);

        let metadata = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mime_type = match infer::get_from_path(&path)? {
            Some(kind) => kind.mime_type().to_string(),
            None => check_filetype(&name, &mimes)
                .map(|ft| ft.mime_type)
                .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string()),
        };

        grouped.entry(field.to_string()).or_default().push(RawFile {
            name,
            mime_type,
            tmp_name: path,
            error: 0,
            size: metadata.len(),
        });
    }

    Ok(grouped
        .into_iter()
        .map(|(field, mut files)| {
            let submission = if files.len() == 1 {
                RawFileSubmission::Single(files.remove(0))
            } else {
                RawFileSubmission::Batch(RawFileBatch {
                    name: files.iter().map(|f| f.name.clone()).collect(),
                    mime_type: files.iter().map(|f| f.mime_type.clone()).collect(),
                    tmp_name: files.iter().map(|f| f.tmp_name.clone()).collect(),
                    error: files.iter().map(|f| f.error).collect(),
                    size: files.iter().map(|f| f.size).collect(),
                })
            };
            (field, submission)
        })
        .collect())
}
