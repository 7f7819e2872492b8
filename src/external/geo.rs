//! Client IP to country lookup.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::ExternalResult;
use crate::config::Geo;

#[async_trait]
pub trait GeoLocator: Send + Sync + std::fmt::Debug {
    /// ISO-3166 alpha-2 code of `ip`, `None` when unknown.
    async fn country_for(&self, ip: &str) -> Option<String>;
}

pub fn from_config(geo: &Geo) -> ExternalResult<Arc<dyn GeoLocator>> {
    if !geo.enabled() {
        return Ok(Arc::new(StaticLocator::none()));
    }
    Ok(Arc::new(IpApiLocator::new(geo.base_url())?))
}

/// Addresses that can never be located: loopback, private ranges, garbage.
pub fn is_locatable(ip: &str) -> bool {
    match ip.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            !(v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified())
        }
        Ok(IpAddr::V6(v6)) => !(v6.is_loopback() || v6.is_unspecified()),
        Err(_) => false,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    status: String,
    country_code: Option<String>,
}

#[derive(Debug)]
pub struct IpApiLocator {
    base_url: String,
    http_client: reqwest::Client,
}

impl IpApiLocator {
    pub fn new(base_url: impl Into<String>) -> ExternalResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(5))
            .build()?;

        let base_url: String = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    async fn lookup(&self, ip: &str) -> ExternalResult<Option<String>> {
        let url = format!("{}/json/{}?fields=status,countryCode", self.base_url, ip.trim());
        let body: IpApiResponse = self
            .http_client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if body.status != "success" {
            return Ok(None);
        }
        Ok(body.country_code.map(|c| c.to_uppercase()))
    }
}

#[async_trait]
impl GeoLocator for IpApiLocator {
    #[tracing::instrument(skip(self))]
    async fn country_for(&self, ip: &str) -> Option<String> {
        if !is_locatable(ip) {
            return None;
        }

        match self.lookup(ip).await {
            Ok(country) => country,
            Err(e) => {
                tracing::warn!("geolocation failed: {e}");
                None
            }
        }
    }
}

/// Answers the same country for every address.
#[derive(Debug, Clone, Default)]
pub struct StaticLocator {
    country: Option<String>,
}

impl StaticLocator {
    pub fn new(country: impl Into<String>) -> Self {
        let country: String = country.into();
        Self {
            country: Some(country.to_uppercase()),
        }
    }

    pub fn none() -> Self {
        Self { country: None }
    }
}

#[async_trait]
impl GeoLocator for StaticLocator {
    async fn country_for(&self, _ip: &str) -> Option<String> {
        self.country.clone()
    }
}
