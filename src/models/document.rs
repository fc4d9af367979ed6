use std::path::Path;

/// A document queued for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
}

impl Document {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let filename = filename.into();
        let content_type = guess_content_type(&filename).map(str::to_string);
        Self {
            filename,
            content: content.into(),
            content_type,
        }
    }

    /// Read a document from disk. The upload filename is the path's final component.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} has no file name", path.display()),
                )
            })?;
        let content = tokio::fs::read(path).await?;
        Ok(Self::new(filename, content))
    }
}

fn guess_content_type(filename: &str) -> Option<&'static str> {
    let extension = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "md" | "markdown" => Some("text/markdown"),
        "txt" => Some("text/plain"),
        "pdf" => Some("application/pdf"),
        "html" | "htm" => Some("text/html"),
        _ => None,
    }
}
