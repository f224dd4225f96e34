use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use tracing::debug;

use crate::error::TransmitError;
use crate::location::LocationReading;

const JSON: &str = "application/json";

/// Body of a location report. Field names are part of the wire format.
#[derive(Debug, Serialize)]
pub struct LocationPayload<'a> {
    pub lat: f64,
    pub lng: f64,
    pub alt: f64,
    pub dev: &'a str,
}

impl<'a> LocationPayload<'a> {
    pub fn new(reading: &LocationReading, device_id: &'a str) -> Self {
        Self {
            lat: reading.latitude,
            lng: reading.longitude,
            alt: reading.altitude,
            dev: device_id,
        }
    }

    pub fn to_json(&self) -> Result<String, TransmitError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Delivers a reading to the reporting server.
#[async_trait]
pub trait Transmit: Send + Sync {
    async fn send(
        &self,
        reading: &LocationReading,
        device_id: &str,
        url: &str,
    ) -> Result<(), TransmitError>;
}

pub struct HttpTransmitter {
    client: reqwest::Client,
}

impl HttpTransmitter {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transmit for HttpTransmitter {
    async fn send(
        &self,
        reading: &LocationReading,
        device_id: &str,
        url: &str,
    ) -> Result<(), TransmitError> {
        let body = LocationPayload::new(reading, device_id).to_json()?;
        debug!("[REPORT] PUT {} {}", url, body);

        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, JSON)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransmitError::Status(status));
        }
        Ok(())
    }
}
