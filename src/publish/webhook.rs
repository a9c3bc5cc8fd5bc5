//! JSON webhook sink

use super::MeasurementSink;
use crate::{
    error::{AppError, Result},
    models::Measurement,
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Accept only `https://` webhook URLs
pub fn parse_webhook_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())?;
    if url.scheme() != "https" {
        return Err(AppError::config(format!("Webhook URL must use HTTPS: {}", raw)));
    }
    Ok(url)
}

/// POSTs every measurement as a JSON record
#[derive(Clone)]
pub struct WebhookPublisher {
    client: Client,
    url: Url,
}

impl WebhookPublisher {
    pub fn new(url: Url) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(crate::defaults::USER_AGENT)
            .build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl MeasurementSink for WebhookPublisher {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn publish(&self, measurement: &Measurement, location: &str) -> Result<()> {
        let record = measurement.to_record(location);
        let response = self
            .client
            .post(self.url.clone())
            .json(&record)
            .send()
            .await
            .map_err(|e| AppError::sink(format!("Webhook POST to {} failed: {}", self.url, e)))?;

        let status = response.status();
        // always drain so the pooled connection can be reused
        let _ = response.bytes().await;

        if !status.is_success() {
            return Err(AppError::sink(format!("Webhook {} answered HTTP {}", self.url, status)));
        }
        Ok(())
    }
}
