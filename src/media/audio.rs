//! Audio attachment - inline bytes, or an upload when too large to inline

use std::path::Path;

use tracing::info;

use crate::error::Error;
use crate::Result;

use super::files::{FileService, RemoteFile};
use super::upload::{safe_upload, PollPolicy};
use super::MediaKind;

/// Audio ready to be attached to a request
#[derive(Debug, Clone)]
pub enum AudioAttachment {
    /// Raw bytes sent inline with the request
    Inline { mime_type: String, data: Vec<u8> },
    /// File already processed by the service
    Uploaded(RemoteFile),
}

/// Read audio for a query, uploading it instead if it exceeds `inline_limit` bytes
pub async fn attach_audio<S>(
    service: &S,
    path: &Path,
    inline_limit: u64,
    policy: &PollPolicy,
) -> Result<AudioAttachment>
where
    S: FileService + ?Sized,
{
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() => m,
        _ => {
            return Err(Error::FileNotFound {
                label: MediaKind::Audio.label().to_string(),
                path: path.to_path_buf(),
            })
        }
    };

    if metadata.len() > inline_limit {
        info!("Audio is {} bytes, over the inline limit; uploading", metadata.len());
        let file = safe_upload(service, path, MediaKind::Audio, policy).await?;
        return Ok(AudioAttachment::Uploaded(file));
    }

    let data = tokio::fs::read(path).await?;
    info!("Attaching {} bytes of audio inline", data.len());
    Ok(AudioAttachment::Inline {
        mime_type: MediaKind::Audio.mime_type(path).to_string(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::files::{FakeFileService, FileState};
    use std::io::Write;
    use std::time::Duration;

    fn policy() -> PollPolicy {
        PollPolicy { max_retries: 3, interval: Duration::ZERO }
    }

    #[tokio::test]
    async fn test_small_audio_is_inline() {
        let mut audio = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        audio.write_all(b"RIFF....WAVE").unwrap();
        let service = FakeFileService::new(FileState::Active, vec![]);

        let attachment = attach_audio(&service, audio.path(), 1024, &policy()).await.unwrap();

        match attachment {
            AudioAttachment::Inline { mime_type, data } => {
                assert_eq!(mime_type, "audio/wav");
                assert_eq!(data, b"RIFF....WAVE");
            }
            other => panic!("expected inline audio, got {:?}", other),
        }
        assert!(service.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_large_audio_is_uploaded() {
        let mut audio = tempfile::Builder::new().suffix(".mp3").tempfile().unwrap();
        audio.write_all(&[0u8; 64]).unwrap();
        let service = FakeFileService::new(FileState::Processing, vec![FileState::Active]);

        let attachment = attach_audio(&service, audio.path(), 16, &policy()).await.unwrap();

        assert!(matches!(attachment, AudioAttachment::Uploaded(ref f) if f.is_active()));
        assert_eq!(service.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_audio() {
        let service = FakeFileService::new(FileState::Active, vec![]);
        let err = attach_audio(&service, Path::new("nope/sample_audio.mp3"), 1024, &policy())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Audio file not found"));
    }
}
