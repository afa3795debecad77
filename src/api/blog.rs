//! `/blog/posts` community feed.

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use tracing::info;

use super::{Client, NewPost, Post};
use crate::error::{Error, Result};

/// Tag that asks the backend for every post.
pub const ALL_POSTS_TAG: &str = "Tất cả";

/// Tag given to posts written from the client.
pub const DEFAULT_POST_TAG: &str = "Thảo luận";

/// Blog API client.
#[derive(Debug)]
pub struct BlogApi<'a> {
    pub(super) client: &'a Client,
}

impl BlogApi<'_> {
    /// List posts, optionally filtered by tag.
    pub async fn posts(&self, tag: Option<&str>) -> Result<Vec<Post>> {
        let mut rb = self.client.request(Method::GET, "blog/posts")?;
        if let Some(tag) = tag {
            rb = rb.query(&[("tag", tag)]);
        }
        Client::handle_response(rb.send().await?).await
    }

    /// Publish a post as multipart `content`, `tag` and optional `image`.
    pub async fn create(&self, post: &NewPost) -> Result<()> {
        if post.content.trim().is_empty() && post.image.is_none() {
            return Err(Error::InvalidInput(
                "a post needs text or an image".to_string(),
            ));
        }

        let mut form = Form::new()
            .text("content", post.content.clone())
            .text("tag", post.tag.clone());
        if let Some(image) = &post.image {
            let part = Part::bytes(image.read().await?)
                .file_name(image.name.clone())
                .mime_str(&image.mime_type)?;
            form = form.part("image", part);
        }

        let response = self
            .client
            .request(Method::POST, "blog/posts")?
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Client::api_error(response).await);
        }
        info!(
            name: "blog.posted",
            tag = %post.tag,
            has_image = post.image.is_some(),
            "Post published"
        );
        Ok(())
    }

    /// Toggle the caller's like on a post.
    pub async fn like(&self, id: &str) -> Result<()> {
        let path = format!("blog/posts/{id}/like");
        let response = self.client.request(Method::POST, &path)?.send().await?;
        if !response.status().is_success() {
            return Err(Client::api_error(response).await);
        }
        Ok(())
    }
}
