//! Street-level crime data client (data.police.uk API shape)

use super::{CrimeData, CrimeDataService};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Crime record as served by the API. Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct RawCrime {
    id: i64,
    category: String,
    month: Option<String>,
    location: Option<RawLocation>,
    outcome_status: Option<RawOutcome>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    latitude: Option<String>,
    longitude: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOutcome {
    category: Option<String>,
    date: Option<String>,
}

impl From<RawCrime> for CrimeData {
    fn from(raw: RawCrime) -> Self {
        let (latitude, longitude) = match &raw.location {
            Some(loc) => (
                loc.latitude.as_deref().and_then(|v| v.parse().ok()),
                loc.longitude.as_deref().and_then(|v| v.parse().ok()),
            ),
            None => (None, None),
        };

        CrimeData {
            external_id: raw.id,
            category: raw.category,
            month: raw.month,
            latitude,
            longitude,
            outcome_category: raw.outcome_status.as_ref().and_then(|o| o.category.clone()),
            outcome_date: raw.outcome_status.as_ref().and_then(|o| o.date.clone()),
        }
    }
}

/// HTTP client for the crime data service
pub struct PoliceUkClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl PoliceUkClient {
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
}

#[async_trait]
impl CrimeDataService for PoliceUkClient {
    async fn fetch_crimes(&self, latitude: f64, longitude: f64) -> Result<Vec<CrimeData>> {
        let url = format!(
            "{}/crimes-street/all-crime?lat={}&lng={}",
            self.base_url, latitude, longitude
        );
        debug!(url = %url, "Querying crime data service");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("crime service: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "crime service returned HTTP {}",
                response.status()
            )));
        }

        let raw: Vec<RawCrime> = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("crime service parse: {}", e)))?;

        Ok(raw.into_iter().map(Into::into).collect())
    }
}
