//! # postlocal
//!
//! Location-derived public data, aggregated per UK postcode: nearby
//! transit stops and local crime statistics, with every external lookup
//! cached as a durable record. The pipeline resolves a postcode (or
//! coordinate pair), matches its administrative metadata to a transport
//! authority, fetches stop and crime data at most once per distinct
//! key, and assembles an idempotent search aggregate with collision-safe
//! sequential identifiers.
//!
//! HTTP transport and credential handling are external collaborators;
//! this crate is the resolution/caching core behind them.

pub mod aggregator;
pub mod allocator;
pub mod caches;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod services;
pub mod users;

pub use config::Config;
pub use context::{permitted, Action, RequestContext, ResourceKind, Role};
pub use error::{Error, Result};
pub use pipeline::SearchPipeline;

use aggregator::SearchAggregator;
use allocator::SequentialIdAllocator;
use caches::{AuthorityCache, CrimeCache, PostcodeCache, StopCache};
use resolver::AuthorityResolver;
use services::{
    CrimeDataService, NaptanClient, PoliceUkClient, PostcodeLookupService, PostcodesIoClient,
    TransitDataService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Wired-up search service: the pipeline plus its shared handles
pub struct SearchService {
    pub db: SqlitePool,
    pub allocator: SequentialIdAllocator,
    pub pipeline: SearchPipeline,
}

impl SearchService {
    /// Build the service against the real external services.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = db::init_database(&config.database_path).await?;

        let postcode_service: Arc<dyn PostcodeLookupService> = Arc::new(PostcodesIoClient::new(
            &config.postcode_base_url,
            config.http_timeout_secs,
            &config.user_agent,
        )?);
        let transit_service: Arc<dyn TransitDataService> = Arc::new(NaptanClient::new(
            &config.transit_base_url,
            config.http_timeout_secs,
            &config.user_agent,
        )?);
        let crime_service: Arc<dyn CrimeDataService> = Arc::new(PoliceUkClient::new(
            &config.crime_base_url,
            config.http_timeout_secs,
            &config.user_agent,
        )?);

        Ok(Self::with_services(
            db,
            postcode_service,
            transit_service,
            crime_service,
        ))
    }

    /// Build the service from explicit collaborators (the test seam).
    pub fn with_services(
        db: SqlitePool,
        postcode_service: Arc<dyn PostcodeLookupService>,
        transit_service: Arc<dyn TransitDataService>,
        crime_service: Arc<dyn CrimeDataService>,
    ) -> Self {
        let allocator = SequentialIdAllocator::new(db.clone());

        let postcodes = PostcodeCache::new(db.clone(), postcode_service.clone());
        let authorities = AuthorityCache::new(db.clone(), transit_service.clone());
        let stops = StopCache::new(db.clone(), transit_service);
        let crimes = CrimeCache::new(db.clone(), crime_service, allocator.clone());

        let resolver = AuthorityResolver::new(db.clone(), authorities, stops);
        let aggregator = SearchAggregator::new(db.clone(), resolver, crimes);
        let pipeline = SearchPipeline::new(
            db.clone(),
            allocator.clone(),
            postcodes,
            postcode_service,
            aggregator,
        );

        Self {
            db,
            allocator,
            pipeline,
        }
    }
}
