//! Transfer engine: drives one canonical document through
//! PENDING → FETCHING → FETCHED → PUBLISHING → PUBLISHED, or to FAILED.
//!
//! The temporary artifact is a [`NamedTempFile`] owned by the engine for the duration of one
//! call to [`TransferEngine::transfer`]. It is released on every exit path, success or failure,
//! before the record is handed back. There is no retry within a call.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};

use crate::config::TransferConfig;
use crate::contract::{
    CanonicalDocument, Fetcher, PublishRequest, Publisher, TransferRecord, TransferStatus,
};
use crate::error::{FetchError, PublishError};
use crate::reconcile::file_name_of;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub work_dir: PathBuf,
    /// Allowed difference between declared and actual size before a warning is logged.
    pub size_tolerance_bytes: u64,
}

impl From<&TransferConfig> for TransferSettings {
    fn from(config: &TransferConfig) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
            size_tolerance_bytes: config.size_tolerance_bytes,
        }
    }
}

struct Artifact {
    file: NamedTempFile,
    len: u64,
    sha256: String,
}

impl Artifact {
    fn release(self, url: &str) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            error!(url, path = %path.display(), error = %e, "[TRANSFER] Failed to delete artifact");
        }
    }
}

pub struct TransferEngine<F, P> {
    fetcher: F,
    publisher: P,
    settings: TransferSettings,
}

impl<F, P> TransferEngine<F, P>
where
    F: Fetcher,
    P: Publisher,
{
    pub fn new(fetcher: F, publisher: P, settings: TransferSettings) -> Self {
        Self {
            fetcher,
            publisher,
            settings,
        }
    }

    /// Runs the full state machine once. The returned record is always terminal.
    pub async fn transfer(&self, document: &CanonicalDocument) -> TransferRecord {
        let url = document.canonical_url.as_str();
        let mut record = TransferRecord::new(url);
        record.attempt_count += 1;

        record.advance(TransferStatus::Fetching);
        info!(url, title = %document.title, "[TRANSFER] Fetching document");
        let artifact = match self.fetch(document, &mut record).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(url, error = %e, "[TRANSFER] Fetch failed");
                record.fail(e.to_string());
                return record;
            }
        };
        record.bytes = Some(artifact.len);
        record.content_hash = Some(artifact.sha256.clone());
        record.advance(TransferStatus::Fetched);
        record.local_artifact = Some(artifact.file.path().to_path_buf());

        record.advance(TransferStatus::Publishing);
        info!(url, bytes = artifact.len, "[TRANSFER] Publishing document");
        let outcome = self.publish(document, &artifact).await;
        artifact.release(url);

        match outcome {
            Ok(ack) => {
                info!(url, remote_id = ?ack.remote_id, "[TRANSFER] Document published");
                record.remote_id = ack.remote_id;
                record.advance(TransferStatus::Published);
            }
            Err(e) => {
                warn!(url, error = %e, "[TRANSFER] Publish failed");
                record.fail(e.to_string());
            }
        }
        record
    }

    async fn fetch(
        &self,
        document: &CanonicalDocument,
        record: &mut TransferRecord,
    ) -> Result<Artifact, FetchError> {
        let io = |e: std::io::Error| FetchError::Io(e.to_string());

        tokio::fs::create_dir_all(&self.settings.work_dir)
            .await
            .map_err(io)?;
        // Dropping `file` on any early return deletes it.
        let file = tempfile::Builder::new()
            .prefix("pdf-relay-")
            .suffix(".pdf")
            .tempfile_in(&self.settings.work_dir)
            .map_err(io)?;

        let streamed = self
            .fetcher
            .fetch_to(&document.canonical_url, file.path())
            .await?;

        let (len, sha256, head) = digest_file(file.path()).await.map_err(io)?;
        if len == 0 {
            return Err(FetchError::Empty);
        }
        if len != streamed {
            return Err(FetchError::Io(format!(
                "artifact holds {len} bytes but {streamed} were streamed"
            )));
        }

        let url = document.canonical_url.as_str();
        if document.size > 0 && len.abs_diff(document.size) > self.settings.size_tolerance_bytes {
            warn!(
                url,
                declared = document.size,
                actual = len,
                "[TRANSFER] Fetched size differs from declared size"
            );
            record.warnings.push(format!(
                "size mismatch: declared {} bytes, fetched {} bytes",
                document.size, len
            ));
        }
        if !head.starts_with(PDF_MAGIC) {
            warn!(url, "[TRANSFER] Artifact does not start with a PDF header");
            record
                .warnings
                .push("artifact does not start with a PDF header".to_string());
        }

        Ok(Artifact { file, len, sha256 })
    }

    async fn publish(
        &self,
        document: &CanonicalDocument,
        artifact: &Artifact,
    ) -> Result<crate::contract::Acknowledgement, PublishError> {
        let file_name = upload_file_name(&document.canonical_url);
        let req = PublishRequest {
            title: &document.title,
            url: &document.canonical_url,
            date: document.published_at.as_deref().unwrap_or(""),
            size: artifact.len,
            file_path: artifact.file.path(),
            file_name: &file_name,
        };
        self.publisher.publish(req).await
    }
}

/// File name for the upload part; the destination only accepts names ending in `.pdf`.
pub fn upload_file_name(canonical_url: &str) -> String {
    let name = file_name_of(canonical_url);
    if name.to_ascii_lowercase().ends_with(".pdf") {
        name.to_string()
    } else {
        format!("{name}.pdf")
    }
}

/// Byte length, SHA-256 hex digest and the first bytes of a file.
async fn digest_file(path: &std::path::Path) -> std::io::Result<(u64, String, Vec<u8>)> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut head = Vec::with_capacity(PDF_MAGIC.len());
    let mut len: u64 = 0;
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        if head.len() < PDF_MAGIC.len() {
            let take = (PDF_MAGIC.len() - head.len()).min(n);
            head.extend_from_slice(&buf[..take]);
        }
        hasher.update(&buf[..n]);
        len += n as u64;
    }
    Ok((len, format!("{:x}", hasher.finalize()), head))
}

#[cfg(test)]
mod tests {
    use super::upload_file_name;

    #[test]
    fn upload_file_name_keeps_pdf_names_and_fixes_others() {
        assert_eq!(upload_file_name("https://x/a/Rules.PDF"), "Rules.PDF");
        assert_eq!(upload_file_name("https://x/download/42"), "42.pdf");
    }
}
