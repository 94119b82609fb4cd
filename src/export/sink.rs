//! Export sinks
//!
//! Turn a recorded blob into something the user can play back or keep.

use super::types::{ExportError, RecordedBlob};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Destination for completed recordings
pub trait ExportSink: Send + Sync {
    /// Make the blob playable and return a URL for it
    fn playback_url(&self, blob: &RecordedBlob) -> Result<String, ExportError>;

    /// Save the blob under `filename` and return where it went
    fn download(&self, blob: &RecordedBlob, filename: &str) -> Result<PathBuf, ExportError>;
}

/// Writes recordings into a directory on disk
#[derive(Debug, Clone)]
pub struct FileExportSink {
    dir: PathBuf,
}

impl FileExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, blob: &RecordedBlob, filename: &str) -> Result<PathBuf, ExportError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        let path = self.dir.join(filename);
        fs::write(&path, blob.data())?;
        tracing::debug!("Wrote {} bytes ({}) to {:?}", blob.size(), blob.mime_type(), path);
        Ok(path)
    }
}

impl ExportSink for FileExportSink {
    fn playback_url(&self, blob: &RecordedBlob) -> Result<String, ExportError> {
        // Each playback replaces the previous one.
        let filename = format!("playback.{}", blob.format().extension());
        let path = self.write(blob, &filename)?;
        let path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()?.join(path)
        };
        Ok(file_url(&path))
    }

    fn download(&self, blob: &RecordedBlob, filename: &str) -> Result<PathBuf, ExportError> {
        let path = self.write(blob, filename)?;
        tracing::info!("Downloaded recording to {:?}", path);
        Ok(path)
    }
}

/// Percent-encoded `file://` URL for an absolute path
pub fn file_url(path: &Path) -> String {
    let mut url = String::from("file://");
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            Component::ParentDir => url.push_str("/.."),
            Component::Normal(segment) => {
                url.push('/');
                url.push_str(&urlencoding::encode(&segment.to_string_lossy()));
            }
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    #[test]
    fn test_download_writes_file() {
        let dir = tempdir().unwrap();
        let sink = FileExportSink::new(dir.path().join("camera"));
        let blob = RecordedBlob::new("video/webm", Bytes::from_static(b"webm-bytes"));

        let path = sink.download(&blob, "test.webm").unwrap();
        assert_eq!(path, dir.path().join("camera").join("test.webm"));
        assert_eq!(fs::read(&path).unwrap(), b"webm-bytes");
    }

    #[test]
    fn test_playback_url() {
        let dir = tempdir().unwrap();
        let sink = FileExportSink::new(dir.path().join("my panel"));
        let blob = RecordedBlob::new("audio/ogg", Bytes::from_static(b"ogg"));

        let url = sink.playback_url(&blob).unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/my%20panel/playback.ogg"));
        assert!(dir.path().join("my panel").join("playback.ogg").exists());
    }

    #[test]
    fn test_file_url_encoding() {
        let url = file_url(Path::new("/tmp/a b/c#d.webm"));
        assert_eq!(url, "file:///tmp/a%20b/c%23d.webm");
    }
}
