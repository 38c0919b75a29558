use std::io;
use std::path::{Path, PathBuf};

/// State of the raw capture file after the provider has exited
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureArtifact {
    Saved { path: PathBuf, bytes: u64 },
    Empty(PathBuf),
    Missing(PathBuf),
}

impl CaptureArtifact {
    /// Inspect the capture file at `path`
    pub async fn inspect(path: &Path) -> io::Result<Self> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => Ok(CaptureArtifact::Saved {
                path: path.to_path_buf(),
                bytes: meta.len(),
            }),
            Ok(_) => Ok(CaptureArtifact::Empty(path.to_path_buf())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(CaptureArtifact::Missing(path.to_path_buf()))
            }
            Err(e) => Err(e),
        }
    }
}
