//! Sends notifications to dingtalk robot webhooks.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header::CONTENT_TYPE, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{error::Error, notification::Notification};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// response body of the robot webhook
pub struct DeliveryResponse {
    #[serde(rename = "errcode")]
    pub error_code: i64,
    #[serde(rename = "errmsg", default)]
    pub error_message: String,
}

impl DeliveryResponse {
    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }
}

#[derive(Debug, Clone)]
/// Client shared by all requests, connection pooling is done by reqwest.
pub struct DeliveryClient {
    client: reqwest::Client,
}

impl DeliveryClient {
    /// * `timeout` - total timeout of a single delivery, reqwest's default if `None`
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().context("failed to build http client")?;

        Ok(Self { client })
    }

    /// POSTs the notification and decodes the robot's answer.
    ///
    /// A non zero `errcode` is not an error here, the caller decides what to
    /// do with it.
    pub async fn deliver(
        &self,
        destination: &Url,
        notification: &Notification,
    ) -> Result<DeliveryResponse, Error> {
        let body = serde_json::to_vec(notification).map_err(Error::Encoding)?;

        let response = self
            .client
            .post(destination.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        if response.status() != StatusCode::OK {
            return Err(Error::UnexpectedStatus(response.status().as_u16()));
        }

        response
            .json::<DeliveryResponse>()
            .await
            .map_err(Error::ResponseDecode)
    }
}
