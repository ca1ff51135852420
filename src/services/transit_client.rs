//! Transit stop registry client (NaPTAN API shape)
//!
//! The registry serves the authority master list as plain text, one
//! `"Location / Region (Code)"` entry per line, and per-area stop data
//! as CSV. The CSV is parsed here so the trait hands structured rows to
//! the cache layer.

use super::{StopRow, TransitDataService};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Columns of the stop table this client consumes
const COL_LONG_CODE: &str = "ATCOCode";
const COL_SHORT_CODE: &str = "NaptanCode";
const COL_NAME: &str = "CommonName";
const COL_STREET: &str = "Street";
const COL_LATITUDE: &str = "Latitude";
const COL_LONGITUDE: &str = "Longitude";
const COL_STATUS: &str = "Status";

/// HTTP client for the stop registry
pub struct NaptanClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl NaptanClient {
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

    async fn get_text(&self, url: &str) -> Result<String> {
        debug!(url = %url, "Querying stop registry");
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("stop registry: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "stop registry returned HTTP {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Upstream(format!("stop registry body: {}", e)))
    }
}

#[async_trait]
impl TransitDataService for NaptanClient {
    async fn list_authority_entries(&self) -> Result<Vec<String>> {
        let url = format!("{}/atco-areas.txt", self.base_url);
        let body = self.get_text(&url).await?;

        Ok(body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn fetch_stops_table(&self, authority_code: &str) -> Result<Vec<StopRow>> {
        let url = format!(
            "{}/v1/access-nodes?atcoAreaCodes={}&dataFormat=csv",
            self.base_url, authority_code
        );
        let body = self.get_text(&url).await?;
        parse_stop_table(&body)
    }
}

/// Parse the CSV stop table into rows. The header row determines the
/// column positions; rows missing the long code column are dropped.
fn parse_stop_table(csv: &str) -> Result<Vec<StopRow>> {
    let mut lines = csv.lines();
    let header = lines
        .next()
        .ok_or_else(|| Error::Upstream("stop table is empty".to_string()))?;
    let columns = split_csv_line(header);

    let index_of = |name: &str| columns.iter().position(|c| c == name);
    let long_code_idx = index_of(COL_LONG_CODE).ok_or_else(|| {
        Error::Upstream(format!("stop table is missing the {} column", COL_LONG_CODE))
    })?;
    let name_idx = index_of(COL_NAME);
    let short_code_idx = index_of(COL_SHORT_CODE);
    let street_idx = index_of(COL_STREET);
    let latitude_idx = index_of(COL_LATITUDE);
    let longitude_idx = index_of(COL_LONGITUDE);
    let status_idx = index_of(COL_STATUS);

    let mut rows = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        let field = |idx: Option<usize>| -> Option<String> {
            idx.and_then(|i| fields.get(i))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let Some(long_code) = field(Some(long_code_idx)) else {
            continue;
        };

        rows.push(StopRow {
            long_code,
            short_code: field(short_code_idx),
            name: field(name_idx).unwrap_or_default(),
            street: field(street_idx),
            latitude: field(latitude_idx).and_then(|v| v.parse().ok()),
            longitude: field(longitude_idx).and_then(|v| v.parse().ok()),
            status: field(status_idx).unwrap_or_default(),
        });
    }

    Ok(rows)
}

/// Split one CSV line, honouring double-quoted fields and `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
