//! The multimodal query: default prompt text and the media that goes with it.

use std::path::PathBuf;

use tracing::warn;

use crate::agent::{Message, Part};
use crate::media::{attach_audio, safe_upload, AudioAttachment, FileService, MediaKind, PollPolicy, RemoteFile};
use crate::Result;

/// Question asked when none is given on the command line.
pub const DEFAULT_QUERY: &str = "\
Combine insights from the inputs:
1. **Image**: Describe the scene and its significance.
2. **Audio**: Extract key messages that relate to the visual.
3. **Video**: Look at the video input and provide insights that connect with the image and audio context.
4. **Web Search**: Find the latest updates or events linking all these topics.

Summarize the overall theme or story these inputs convey.
";

/// Local media to send with a query.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub image: PathBuf,
    pub video: PathBuf,
    pub audio: PathBuf,
    /// Audio at most this many bytes is sent inline
    pub inline_audio_limit: u64,
}

/// Media ready to be referenced by a query.
#[derive(Debug, Clone)]
pub struct PreparedMedia {
    pub images: Vec<RemoteFile>,
    pub videos: Vec<RemoteFile>,
    pub audio: Option<AudioAttachment>,
}

impl PreparedMedia {
    /// Files living on the service, for cleanup.
    pub fn remote_files(&self) -> Vec<&RemoteFile> {
        let audio = match &self.audio {
            Some(AudioAttachment::Uploaded(file)) => Some(file),
            _ => None,
        };
        self.images.iter().chain(self.videos.iter()).chain(audio).collect()
    }
}

/// Upload the image and the video, then read the audio, in that order.
///
/// Stops at the first failure; files uploaded before it stay on the service
/// until they expire.
pub async fn prepare_media<S>(service: &S, request: &MediaRequest, policy: &PollPolicy) -> Result<PreparedMedia>
where
    S: FileService + ?Sized,
{
    let image = safe_upload(service, &request.image, MediaKind::Image, policy).await?;
    let video = safe_upload(service, &request.video, MediaKind::Video, policy).await?;
    let audio = attach_audio(service, &request.audio, request.inline_audio_limit, policy).await?;

    Ok(PreparedMedia {
        images: vec![image],
        videos: vec![video],
        audio: Some(audio),
    })
}

/// Build the user turn: query text followed by images, audio, then videos.
pub fn build_user_message(query: &str, media: &PreparedMedia) -> Message {
    let mut message = Message::user(query.trim());

    for image in &media.images {
        message = message.with_part(Part::from(image));
    }
    if let Some(audio) = &media.audio {
        message = message.with_part(Part::from(audio));
    }
    for video in &media.videos {
        message = message.with_part(Part::from(video));
    }

    message
}

/// Delete uploaded files, logging rather than failing on errors.
pub async fn cleanup<S>(service: &S, media: &PreparedMedia) -> usize
where
    S: FileService + ?Sized,
{
    let mut deleted = 0;
    for file in media.remote_files() {
        match service.delete(&file.name).await {
            Ok(()) => deleted += 1,
            Err(e) => warn!("Failed to delete {}: {}", file.name, e),
        }
    }
    deleted
}
