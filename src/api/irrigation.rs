//! `/irrigation/*` pump control and history.

use reqwest::Method;
use tracing::info;

use super::{Client, IrrigationOnRequest, IrrigationSession, PumpCommandResponse};
use crate::error::{Error, Result};

/// Highest moisture limit the pump accepts, in percent.
pub const MAX_MOISTURE_LIMIT: u32 = 100;

/// Irrigation API client.
#[derive(Debug)]
pub struct IrrigationApi<'a> {
    pub(super) client: &'a Client,
}

impl IrrigationApi<'_> {
    /// Start the pump; it stops by itself once soil moisture reaches `limit` percent.
    ///
    /// Limits above [`MAX_MOISTURE_LIMIT`] are rejected without a request.
    pub async fn on(&self, limit: u32) -> Result<PumpCommandResponse> {
        check_limit(limit)?;
        let response = self
            .client
            .request(Method::POST, "irrigation/on")?
            .json(&IrrigationOnRequest { limit })
            .send()
            .await?;
        let ack = Client::handle_response(response).await?;
        info!(name: "irrigation.on", limit, "Pump started");
        Ok(ack)
    }

    /// Stop the pump.
    pub async fn off(&self) -> Result<PumpCommandResponse> {
        let response = self
            .client
            .request(Method::POST, "irrigation/off")?
            .send()
            .await?;
        let ack = Client::handle_response(response).await?;
        info!(name: "irrigation.off", "Pump stopped");
        Ok(ack)
    }

    /// Past watering runs, newest first.
    pub async fn history(&self) -> Result<Vec<IrrigationSession>> {
        let response = self
            .client
            .request(Method::GET, "irrigation/history")?
            .send()
            .await?;
        Client::handle_response(response).await
    }
}

fn check_limit(limit: u32) -> Result<()> {
    if limit > MAX_MOISTURE_LIMIT {
        return Err(Error::InvalidInput(format!(
            "moisture limit must be between 0 and {MAX_MOISTURE_LIMIT}, got {limit}"
        )));
    }
    Ok(())
}
