use crate::config::UploadConfig;
use crate::services::interceptor::InterceptorRegistry;
use crate::services::storage::{HostStorage, LocalHostStorage, S3HostStorage};
use anyhow::anyhow;
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(
    config: &UploadConfig,
    interceptors: InterceptorRegistry,
) -> anyhow::Result<Arc<dyn HostStorage>> {
    match config.storage_backend.to_lowercase().as_str() {
        "local" => {
            info!("💾 Local storage: {:?} ({})", config.upload_dir, config.base_url);
            Ok(Arc::new(
                LocalHostStorage::new(config.upload_dir.clone(), &config.base_url, interceptors)
                    .with_upload_tmp_dir(config.upload_tmp_dir.clone()),
            ))
        }
        "s3" => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| anyhow!("S3_BUCKET must be set for the s3 storage backend"))?;

            let mut loader = aws_config::from_env().region(Region::new("us-east-1"));
            if let Some(endpoint) = &config.s3_endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            let aws_config = loader.load().await;

            let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.s3_endpoint.is_some())
                .build();

            info!("☁️  S3 Storage: bucket {}", bucket);
            let client = aws_sdk_s3::Client::from_conf(s3_config);
            Ok(Arc::new(
                S3HostStorage::new(client, bucket, &config.base_url, interceptors)
                    .with_upload_tmp_dir(config.upload_tmp_dir.clone()),
            ))
        }
        other => Err(anyhow!("Unknown storage backend '{}'", other)),
    }
}
