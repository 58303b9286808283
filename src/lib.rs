pub mod aggregator;
pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod processor;
pub mod purchase;

use std::sync::Arc;

use crate::aggregator::Aggregator;
use crate::config::AppConfig;
use crate::db::InvestmentStore;
use crate::processor::PaymentProcessor;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InvestmentStore>,
    pub config: AppConfig,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    /// None when no processor credentials are configured.
    pub processor: Option<Arc<dyn PaymentProcessor>>,
    /// None when no aggregator credentials are configured.
    pub aggregator: Option<Arc<dyn Aggregator>>,
}
