//! `/auth/*` endpoints.

use reqwest::Method;
use tracing::info;

use super::{AuthResponse, Client, LoginRequest, RegisterRequest, User};
use crate::error::{Error, Result};

/// Auth API client.
#[derive(Debug)]
pub struct AuthApi<'a> {
    pub(super) client: &'a Client,
}

impl AuthApi<'_> {
    /// Create an account and return its token.
    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse> {
        let response = self
            .client
            .request(Method::POST, "auth/register")?
            .json(req)
            .send()
            .await?;
        let auth: AuthResponse = Client::handle_response(response).await?;
        info!(name: "auth.registered", email = %req.email, "Account registered");
        Ok(auth)
    }

    /// Log in and return a token.
    pub async fn login(&self, req: &LoginRequest) -> Result<AuthResponse> {
        let response = self
            .client
            .request(Method::POST, "auth/login")?
            .json(req)
            .send()
            .await?;
        let auth: AuthResponse = Client::handle_response(response).await?;
        info!(name: "auth.logged_in", email = %req.email, "Logged in");
        Ok(auth)
    }

    /// Fetch the user the client's bearer token belongs to.
    pub async fn me(&self) -> Result<User> {
        if self.client.bearer_token().is_none() {
            return Err(Error::MissingToken);
        }
        let response = self.client.request(Method::GET, "auth/me")?.send().await?;
        Client::handle_response(response).await
    }
}
