use crate::{
    error::AppResult,
    state::AppState,
    storage::StoredAsset,
    uploads::{StagedFile, remove_staged},
};

/// Move a staged upload into the asset store, then drop the staged copy.
pub async fn store_image(
    state: &AppState,
    file: &StagedFile,
    folder: &str,
    public_id: Option<&str>,
) -> AppResult<StoredAsset> {
    let asset = state.assets.upload(&file.path, folder, public_id).await?;
    remove_staged(std::slice::from_ref(file)).await;
    tracing::debug!(public_id = %asset.public_id, "image stored");
    Ok(asset)
}

/// Best-effort removal of an entity's asset folder after its rows are gone.
pub async fn drop_folder(state: &AppState, folder: &str) {
    if let Err(err) = state.assets.delete_folder(folder).await {
        tracing::warn!(folder, error = %err, "failed to delete asset folder");
    }
}
