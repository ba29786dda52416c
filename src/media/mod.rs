//! Media module - local media files and their remote counterparts
//!
//! Media goes to the model one of two ways: uploaded through the Files API
//! and referenced by URI, or read into memory and sent inline.

mod audio;
pub mod files;
mod upload;

pub use audio::{attach_audio, AudioAttachment};
pub use files::{FileService, FileState, GeminiFiles, RemoteFile};
pub use upload::{safe_upload, safe_upload_as, PollPolicy};

use std::path::Path;

/// Kind of media attached to a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// Human readable label used in progress and error messages
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "Image",
            MediaKind::Video => "Video",
            MediaKind::Audio => "Audio",
        }
    }

    /// Kind implied by the file extension, if it is a supported media type
    pub fn for_path(path: &Path) -> Option<Self> {
        let mime = mime_type_for(path);
        if mime.starts_with("image/") {
            Some(MediaKind::Image)
        } else if mime.starts_with("video/") {
            Some(MediaKind::Video)
        } else if mime.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    /// Fallback MIME type when the extension is not recognized
    fn fallback_mime(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => "audio/mpeg",
        }
    }

    /// MIME type for a file of this kind
    pub fn mime_type(&self, path: &Path) -> &'static str {
        match mime_type_for(path) {
            OCTET_STREAM => self.fallback_mime(),
            mime => mime,
        }
    }
}

const OCTET_STREAM: &str = "application/octet-stream";

/// Derive a MIME type from a file extension
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "heif" => "image/heif",

        // Video
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mpeg" | "mpg" => "video/mpeg",
        "avi" => "video/x-msvideo",
        "wmv" => "video/x-ms-wmv",
        "3gp" => "video/3gpp",
        "flv" => "video/x-flv",

        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "aiff" | "aif" => "audio/aiff",
        "m4a" => "audio/mp4",

        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_for_known_extensions() {
        assert_eq!(mime_type_for(Path::new("a/b/photo.JPG")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(mime_type_for(Path::new("song.mp3")), "audio/mpeg");
    }

    #[test]
    fn test_mime_type_for_unknown_extension() {
        assert_eq!(mime_type_for(Path::new("notes.xyz")), OCTET_STREAM);
        assert_eq!(mime_type_for(Path::new("no_extension")), OCTET_STREAM);
    }

    #[test]
    fn test_kind_falls_back_to_its_own_mime() {
        assert_eq!(MediaKind::Video.mime_type(Path::new("clip.bin")), "video/mp4");
        assert_eq!(MediaKind::Image.mime_type(Path::new("pic.png")), "image/png");
    }

    #[test]
    fn test_kind_for_path() {
        assert_eq!(MediaKind::for_path(Path::new("pic.webp")), Some(MediaKind::Image));
        assert_eq!(MediaKind::for_path(Path::new("clip.webm")), Some(MediaKind::Video));
        assert_eq!(MediaKind::for_path(Path::new("talk.m4a")), Some(MediaKind::Audio));
        assert_eq!(MediaKind::for_path(Path::new("report.pdf")), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(MediaKind::Image.label(), "Image");
        assert_eq!(MediaKind::Audio.label(), "Audio");
    }
}
