//! `POST /asr` speech recognition.

use std::path::Path;

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use tracing::info;

use super::{Client, TranscriptionResponse};
use crate::error::Result;

/// MIME type of recorded audio.
const AUDIO_MIME: &str = "audio/m4a";

/// Speech recognition API client.
#[derive(Debug)]
pub struct AsrApi<'a> {
    pub(super) client: &'a Client,
}

impl AsrApi<'_> {
    /// Upload an audio recording and return the recognized text.
    pub async fn transcribe(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "audio.m4a".to_string(), |n| n.to_string_lossy().into_owned());

        let part = Part::bytes(bytes).file_name(file_name).mime_str(AUDIO_MIME)?;
        let response = self
            .client
            .request(Method::POST, "asr")?
            .multipart(Form::new().part("audio", part))
            .send()
            .await?;

        let body: TranscriptionResponse = Client::handle_response(response).await?;
        info!(
            name: "asr.transcribed",
            chars = body.text.chars().count(),
            "Audio transcribed"
        );
        Ok(body.text)
    }
}
