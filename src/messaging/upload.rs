//! Media upload

use crate::engine::{EngineClient, MediaCategory, UploadedHandle};
use crate::error::{SessionError, SessionResult};
use tracing::debug;

/// Upload `bytes` under `category`. No retry.
pub async fn upload<C: EngineClient + ?Sized>(
    client: &C,
    bytes: &[u8],
    category: MediaCategory,
) -> SessionResult<UploadedHandle> {
    let handle = client
        .upload(bytes, category)
        .await
        .map_err(|source| SessionError::UploadFailed { category, source })?;

    debug!(
        category = %category,
        size = handle.file_length,
        path = %handle.direct_path,
        "media uploaded"
    );
    Ok(handle)
}
