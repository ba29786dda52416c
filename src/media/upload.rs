//! Upload a local file and wait until the service has finished processing it.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::error::Error;
use crate::ui;
use crate::Result;

use super::files::{FileService, FileState, RemoteFile};
use super::MediaKind;

/// How long to wait for a file to leave the `PROCESSING` state.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub max_retries: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            interval: config.interval(),
        }
    }
}

/// Upload `path` and poll until it is `ACTIVE`.
///
/// Fails with [`Error::FileNotFound`] before uploading anything if the file is
/// missing, and with [`Error::Upload`] if the file ends up in any state other
/// than `ACTIVE` once polling stops.
pub async fn safe_upload<S>(
    service: &S,
    path: &Path,
    kind: MediaKind,
    policy: &PollPolicy,
) -> Result<RemoteFile>
where
    S: FileService + ?Sized,
{
    safe_upload_as(service, path, kind.label(), kind.mime_type(path), policy).await
}

/// [`safe_upload`] for files outside the three media kinds, with the label and
/// MIME type given explicitly.
pub async fn safe_upload_as<S>(
    service: &S,
    path: &Path,
    label: &str,
    mime_type: &str,
    policy: &PollPolicy,
) -> Result<RemoteFile>
where
    S: FileService + ?Sized,
{
    if !path.is_file() {
        return Err(Error::FileNotFound {
            label: label.to_string(),
            path: path.to_path_buf(),
        });
    }

    info!("Uploading {} from {:?} as {}", label, path, mime_type);
    let mut file = service.upload(path, mime_type, label).await?;

    let mut retries = policy.max_retries;
    if file.state == FileState::Processing {
        let spinner = ui::spinner(&format!("Processing {}", label.to_lowercase()));
        while file.state == FileState::Processing && retries > 0 {
            tokio::time::sleep(policy.interval).await;
            file = service.get(&file.name).await?;
            retries -= 1;
            debug!("{} {} is {} ({} retries left)", label, file.name, file.state.as_str(), retries);
        }
        spinner.finish_and_clear();
    }

    if file.state != FileState::Active {
        if let Some(err) = &file.error {
            warn!("{} processing error {}: {}", label, err.code, err.message);
        }
        warn!("{} {} stopped in state {}", label, file.name, file.state.as_str());
        return Err(Error::Upload { label: label.to_string() });
    }

    ui::print_success(&format!("{} uploaded successfully.", label));
    Ok(file)
}
