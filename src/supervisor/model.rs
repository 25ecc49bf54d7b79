//! Model acquisition: downloads a GGUF model file to a `.tmp` sibling
//! and atomically renames it into place, guaranteeing that cancellation
//! never leaves a file at the final name and never leaves a stray
//! `.tmp` behind either.
//!
//! Grounded on the same streamed-download shape as `binary.rs`
//! (itself grounded on `stencila-stencila/rust/binary/src/lib.rs`),
//! generalized from "extract an archive" to "stream one large file with
//! progress and cancellation".

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::SupervisorError;

/// Reports `(bytes_downloaded, total_bytes)`; `total_bytes` is `None`
/// when the server didn't send a `Content-Length`.
pub type ProgressCallback<'a> = Box<dyn Fn(u64, Option<u64>) + Send + 'a>;

/// Ensures `model_path` exists, downloading it from `url` if absent.
/// Cancelling `cancel` mid-download deletes the `.tmp` sibling and
/// returns [`SupervisorError`] without ever creating `model_path`.
pub async fn ensure_model(
    model_path: &Path,
    url: &str,
    cancel: CancellationToken,
    progress: Option<ProgressCallback<'_>>,
) -> Result<(), SupervisorError> {
    if model_path.exists() {
        return Ok(());
    }

    if let Some(parent) = model_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = tmp_sibling(model_path);
    let guard = TmpFileGuard { path: tmp_path.clone(), committed: false };

    let result = download_with_cancellation(url, &tmp_path, &cancel, progress).await;

    match result {
        Ok(()) => {
            tokio::fs::rename(&tmp_path, model_path).await?;
            guard.commit();
            Ok(())
        }
        Err(e) => {
            // `guard`'s Drop removes the `.tmp` file either way; nothing
            // further to clean up here.
            Err(e)
        }
    }
}

fn tmp_sibling(model_path: &Path) -> PathBuf {
    let mut tmp = model_path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

async fn download_with_cancellation(
    url: &str,
    tmp_path: &Path,
    cancel: &CancellationToken,
    progress: Option<ProgressCallback<'_>>,
) -> Result<(), SupervisorError> {
    let response = reqwest::get(url).await?.error_for_status()?;
    let total = response.content_length();
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    let mut file = tokio::fs::File::create(tmp_path).await?;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(SupervisorError::Io(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    "model download cancelled",
                )));
            }
            chunk = stream.next() => {
                match chunk {
                    Some(chunk) => {
                        let chunk = chunk?;
                        downloaded += chunk.len() as u64;
                        file.write_all(&chunk).await?;
                        if let Some(cb) = &progress {
                            cb(downloaded, total);
                        }
                    }
                    None => break,
                }
            }
        }
    }

    file.flush().await?;
    Ok(())
}

/// Deletes the `.tmp` file on drop unless [`Self::commit`] was called,
/// so every early return (including cancellation) leaves no partial
/// file at the final model path and no stray `.tmp` sibling.
struct TmpFileGuard {
    path: PathBuf,
    committed: bool,
}

impl TmpFileGuard {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for TmpFileGuard {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_sibling_appends_tmp_extension() {
        let model = PathBuf::from("/data/models/llama.gguf");
        assert_eq!(tmp_sibling(&model), PathBuf::from("/data/models/llama.gguf.tmp"));
    }

    #[tokio::test]
    async fn ensure_model_is_a_noop_when_already_present() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.gguf");
        tokio::fs::write(&model_path, b"already here").await.unwrap();

        ensure_model(&model_path, "http://unused.invalid/model.gguf", CancellationToken::new(), None)
            .await
            .unwrap();
        assert!(model_path.exists());
    }

    #[tokio::test]
    async fn cancelling_mid_download_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.gguf");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = ensure_model(&model_path, "http://10.255.255.1/unreachable.gguf", cancel, None).await;
        assert!(result.is_err());
        assert!(!model_path.exists());
        assert!(!tmp_sibling(&model_path).exists());
    }
}
