//! Images attached to a message before it is sent.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Fallback upload name when the path has no file name.
const DEFAULT_IMAGE_NAME: &str = "photo.jpg";

/// Fallback MIME type when the extension is unknown.
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Upload descriptor for an image file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFile {
    /// Location of the file on disk.
    pub uri: String,
    /// File name sent in the multipart part.
    pub name: String,
    /// MIME type sent in the multipart part.
    #[serde(rename = "type")]
    pub mime_type: String,
}

impl ImageFile {
    /// Read the whole file.
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.uri).await?)
    }
}

/// An image selected by the user but not yet submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingImage {
    /// URI shown in the preview bubble.
    pub uri: String,
    /// What gets uploaded.
    pub file: ImageFile,
}

impl PendingImage {
    /// Build a pending image from a path on disk, guessing name and MIME type.
    ///
    /// The file must exist; its content is only read when the message is sent.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::metadata(path)?;

        let uri = path.display().to_string();
        let name = path
            .file_name()
            .map_or_else(|| DEFAULT_IMAGE_NAME.to_string(), |n| n.to_string_lossy().into_owned());
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(DEFAULT_IMAGE_MIME)
            .to_string();

        Ok(Self {
            uri: uri.clone(),
            file: ImageFile {
                uri,
                name,
                mime_type,
            },
        })
    }
}
