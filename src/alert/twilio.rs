//! SMS delivery through the Twilio REST API

use super::AlertTransport;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_TWILIO_BASE_URL: &str = "https://api.twilio.com";

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: Option<String>,
}

/// Sends each alert as one SMS per recipient
#[derive(Clone)]
pub struct TwilioTransport {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    sender: String,
}

impl TwilioTransport {
    pub fn new(account_sid: String, auth_token: String, sender: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .user_agent(crate::defaults::USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_TWILIO_BASE_URL.to_string(),
            account_sid,
            auth_token,
            sender,
        })
    }

    /// Point the transport at another API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }
}

#[async_trait]
impl AlertTransport for TwilioTransport {
    fn name(&self) -> &str {
        "twilio"
    }

    async fn send(&self, message: &str, destination: &str) -> Result<String> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("To", destination), ("From", self.sender.as_str()), ("Body", message)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // drain so the connection can be reused
            let _ = response.bytes().await;
            return Err(AppError::alert(format!(
                "SMS to {} rejected with HTTP {}",
                destination, status
            )));
        }

        let body: MessageResponse = response.json().await?;
        Ok(body.sid.unwrap_or_default())
    }
}
