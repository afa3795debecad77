//! `POST /chat/stream`.

use futures::StreamExt;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use super::{ChatRequest, Client};
use crate::error::{Error, Result};
use crate::stream::{ByteStream, ResponseBody, ResponseShape};

/// Streaming chat API client.
#[derive(Debug)]
pub struct ChatApi<'a> {
    pub(super) client: &'a Client,
}

impl ChatApi<'_> {
    /// Post a message (and optional image) and return the response body.
    ///
    /// The body shape is chosen from the response headers; see
    /// [`ResponseShape::detect`].
    pub async fn open(&self, req: &ChatRequest) -> Result<ResponseBody> {
        let mut form = Form::new()
            .text("user_id", req.user_id.clone())
            .text("message", req.message.clone());

        if let Some(image) = &req.image {
            let part = Part::bytes(image.read().await?)
                .file_name(image.name.clone())
                .mime_str(&image.mime_type)?;
            form = form.part("image", part);
        }

        let response = self
            .client
            .request(Method::POST, "chat/stream")?
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Client::api_error(response).await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let shape = ResponseShape::detect(content_type.as_deref(), response.content_length());

        debug!(
            name: "chat.response.shape",
            shape = shape.as_str(),
            content_type = content_type.as_deref().unwrap_or(""),
            "Chat response opened"
        );

        Ok(match shape {
            ResponseShape::EventStream => ResponseBody::EventStream(byte_stream(response)),
            ResponseShape::ChunkedBody => ResponseBody::ChunkedBody(byte_stream(response)),
            ResponseShape::BufferedText => ResponseBody::BufferedText(response.text().await?),
        })
    }
}

fn byte_stream(response: reqwest::Response) -> ByteStream {
    Box::pin(
        response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(Error::from)),
    )
}
