use crate::config::UploadConfig;
use crate::services::storage::{LocalStorageService, StorageService};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

/// Creates the upload directory if needed and builds the storage service on top of it.
pub async fn setup_storage(config: &UploadConfig) -> anyhow::Result<Arc<dyn StorageService>> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create upload directory {}",
                config.upload_dir.display()
            )
        })?;

    info!(
        "📂 Upload directory: {} (filenames: {}, collisions: {})",
        config.upload_dir.display(),
        config.filename_policy,
        config.collision_policy
    );

    Ok(Arc::new(LocalStorageService::new(
        config.upload_dir.clone(),
        config.filename_policy,
        config.collision_policy,
    )))
}
