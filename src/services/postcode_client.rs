//! Postcode lookup client (postcodes.io API shape)

use super::{PostcodeData, PostcodeLookupService};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Generic postcodes.io response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

/// Postcode record as served by the API
#[derive(Debug, Deserialize)]
struct RawPostcode {
    postcode: String,
    admin_county: Option<String>,
    admin_district: Option<String>,
    admin_ward: Option<String>,
    parish: Option<String>,
    parliamentary_constituency: Option<String>,
    region: Option<String>,
    country: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    eastings: Option<i64>,
    northings: Option<i64>,
}

impl From<RawPostcode> for PostcodeData {
    fn from(raw: RawPostcode) -> Self {
        PostcodeData {
            postcode: raw.postcode,
            county: raw.admin_county,
            district: raw.admin_district,
            ward: raw.admin_ward,
            parish: raw.parish,
            constituency: raw.parliamentary_constituency,
            region: raw.region,
            country: raw.country,
            latitude: raw.latitude,
            longitude: raw.longitude,
            easting: raw.eastings,
            northing: raw.northings,
        }
    }
}

/// HTTP client for the postcode lookup service
pub struct PostcodesIoClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl PostcodesIoClient {
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Upstream(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!(url = %url, "Querying postcode service");
        self.http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("postcode service: {}", e)))
    }
}

fn encode_path_segment(code: &str) -> String {
    code.replace(' ', "%20")
}

#[async_trait]
impl PostcodeLookupService for PostcodesIoClient {
    async fn validate(&self, code: &str) -> Result<bool> {
        let url = format!(
            "{}/postcodes/{}/validate",
            self.base_url,
            encode_path_segment(code)
        );
        let response = self.get(&url).await?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "postcode validation returned HTTP {}",
                response.status()
            )));
        }

        let envelope: Envelope<bool> = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("postcode validation parse: {}", e)))?;

        Ok(envelope.result)
    }

    async fn lookup(&self, code: &str) -> Result<PostcodeData> {
        let url = format!("{}/postcodes/{}", self.base_url, encode_path_segment(code));
        let response = self.get(&url).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("postcode {}", code)));
        }
        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "postcode lookup returned HTTP {}",
                response.status()
            )));
        }

        let envelope: Envelope<RawPostcode> = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("postcode lookup parse: {}", e)))?;

        Ok(envelope.result.into())
    }

    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<PostcodeData>> {
        let url = format!(
            "{}/postcodes?lat={}&lon={}",
            self.base_url, latitude, longitude
        );
        let response = self.get(&url).await?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "reverse geocode returned HTTP {}",
                response.status()
            )));
        }

        // result is null when no postcode is near the point
        let envelope: Envelope<Option<Vec<RawPostcode>>> = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("reverse geocode parse: {}", e)))?;

        Ok(envelope
            .result
            .and_then(|mut list| {
                if list.is_empty() {
                    None
                } else {
                    Some(list.remove(0))
                }
            })
            .map(Into::into))
    }

    async fn random(&self) -> Result<PostcodeData> {
        let url = format!("{}/random/postcodes", self.base_url);
        let response = self.get(&url).await?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "random postcode returned HTTP {}",
                response.status()
            )));
        }

        let envelope: Envelope<RawPostcode> = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("random postcode parse: {}", e)))?;

        Ok(envelope.result.into())
    }
}
