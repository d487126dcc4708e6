//! Pending file upload: selected file held (base64-encoded) until the next send.

use crate::api::Attachment;
use base64::Engine;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("reading file: {0}")]
    Io(#[from] std::io::Error),
    #[error("path has no file name: {0}")]
    NoFileName(String),
}

/// A file chosen for the next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub filename: String,
    pub mime_type: String,
    /// Standard base64 of the file contents.
    pub encoded_bytes: String,
}

impl PendingUpload {
    /// Encode raw bytes; the mime type is derived from the file extension.
    pub fn from_bytes(filename: impl Into<String>, bytes: &[u8]) -> Self {
        let filename = filename.into();
        let mime_type = mime_for(&filename);
        Self {
            filename,
            mime_type,
            encoded_bytes: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Read and encode a file from disk.
    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UploadError::NoFileName(path.display().to_string()))?
            .to_string();
        let bytes = std::fs::read(path)?;
        log::debug!("attached {} ({} bytes)", filename, bytes.len());
        Ok(Self::from_bytes(filename, &bytes))
    }

    /// The attachment stored on the outgoing user message.
    pub fn attachment(&self) -> Attachment {
        Attachment {
            encoded_bytes: self.encoded_bytes.clone(),
            mime_type: self.mime_type.clone(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Mime type for a file name, guessed from its extension.
pub fn mime_for(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_bytes_and_guesses_mime() {
        let up = PendingUpload::from_bytes("notes.TXT", b"hello");
        assert_eq!(up.mime_type, "text/plain");
        assert_eq!(up.encoded_bytes, "aGVsbG8=");
        assert!(!up.is_image());
        assert_eq!(up.attachment().mime_type, "text/plain");
    }

    #[test]
    fn unknown_extension_is_octet_stream() {
        assert_eq!(mime_for("archive.zzqx"), "application/octet-stream");
        assert_eq!(mime_for("Makefile"), "application/octet-stream");
        assert_eq!(mime_for("photo.JPEG"), "image/jpeg");
    }

    #[test]
    fn common_media_and_office_types_are_recognised() {
        assert_eq!(mime_for("song.mp3"), "audio/mpeg");
        assert_eq!(mime_for("clip.mp4"), "video/mp4");
        assert_eq!(mime_for("style.css"), "text/css");
        assert_eq!(mime_for("bundle.zip"), "application/zip");
        assert_eq!(
            mime_for("report.docx"),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(
            mime_for("budget.xlsx"),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert!(mime_for("app.js").contains("javascript"));
        assert_eq!(
            PendingUpload::from_bytes("track.MP3", b"ID3").mime_type,
            "audio/mpeg"
        );
    }

    #[test]
    fn from_path_reads_file() {
        let dir = std::env::temp_dir().join(format!("zara-upload-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("pic.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).expect("write");

        let up = PendingUpload::from_path(&path).expect("read");
        assert_eq!(up.filename, "pic.png");
        assert!(up.is_image());

        assert!(matches!(
            PendingUpload::from_path(&dir.join("missing.png")),
            Err(UploadError::Io(_))
        ));
        let _ = std::fs::remove_dir_all(dir);
    }
}
