//! The data-access capability set handlers depend on.

use super::SimStore;
use crate::{
    dataset::{CampaignRow, MetricRow},
    error::SimResult,
    rng::Seed,
    types::Platform,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which metric rows a find/count applies to. Always tenant-scoped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricFilter {
    pub scenario_id: Option<String>,
    pub platform:    Option<Platform>,
    pub start:       Option<NaiveDate>,
    pub end:         Option<NaiveDate>,
    pub mock_only:   Option<bool>,
    pub source:      Option<String>,
}

impl MetricFilter {
    pub fn scenario(scenario_id: &str) -> Self {
        Self { scenario_id: Some(scenario_id.to_string()), ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCounts {
    pub metrics:   u64,
    pub campaigns: u64,
    pub seed_runs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRunRecord {
    pub run_id:       String,
    pub tenant_id:    String,
    pub scenario_id:  String,
    pub seed:         Seed,
    pub days:         u32,
    pub platforms:    Vec<Platform>,
    pub rows_created: u64,
    pub created_at:   String,
}

/// Scoped create/find/delete/count over a tenant's synthetic data.
pub trait TenantDataClient {
    fn ping(&self) -> SimResult<()>;

    fn tenant_exists(&self, tenant_id: &str) -> SimResult<bool>;
    /// Returns false when the tenant already existed.
    fn create_tenant(&self, tenant_id: &str, name: &str) -> SimResult<bool>;

    /// Insert-or-ignore on (tenant, campaign_id). Returns rows inserted.
    fn insert_campaigns(&self, rows: &[CampaignRow]) -> SimResult<u64>;
    /// One transaction; insert-or-ignore on (tenant, external_id).
    /// Returns rows inserted; duplicates are skipped silently.
    fn insert_metric_batch(&self, rows: &[MetricRow]) -> SimResult<u64>;

    fn find_campaigns(&self, tenant_id: &str) -> SimResult<Vec<CampaignRow>>;
    fn find_metrics(&self, tenant_id: &str, filter: &MetricFilter) -> SimResult<Vec<MetricRow>>;
    fn count_metrics(&self, tenant_id: &str, filter: &MetricFilter) -> SimResult<u64>;
    /// `Some(source)` counts only mock campaigns written by that source.
    fn count_campaigns(&self, tenant_id: &str, mock_source: Option<&str>) -> SimResult<u64>;
    fn count_seed_runs(&self, tenant_id: &str, scenario_id: Option<&str>) -> SimResult<u64>;

    /// Removes only rows tagged as mock data from `source_prefix`,
    /// narrowed to one scenario when `scenario_id` is given.
    fn delete_mock_data(
        &self,
        tenant_id: &str,
        source_prefix: &str,
        scenario_id: Option<&str>,
    ) -> SimResult<DeleteCounts>;
    /// Removes every campaign, metric and seed run for the tenant.
    fn delete_tenant_data(&self, tenant_id: &str) -> SimResult<DeleteCounts>;

    fn record_seed_run(&self, record: &SeedRunRecord) -> SimResult<()>;
    fn last_seed_run(&self, tenant_id: &str, scenario_id: &str) -> SimResult<Option<SeedRunRecord>>;
}

impl TenantDataClient for SimStore {
    fn ping(&self) -> SimResult<()> { SimStore::ping(self) }

    fn tenant_exists(&self, tenant_id: &str) -> SimResult<bool> {
        SimStore::tenant_exists(self, tenant_id)
    }

    fn create_tenant(&self, tenant_id: &str, name: &str) -> SimResult<bool> {
        SimStore::create_tenant(self, tenant_id, name)
    }

    fn insert_campaigns(&self, rows: &[CampaignRow]) -> SimResult<u64> {
        SimStore::insert_campaigns(self, rows)
    }

    fn insert_metric_batch(&self, rows: &[MetricRow]) -> SimResult<u64> {
        SimStore::insert_metric_batch(self, rows)
    }

    fn find_campaigns(&self, tenant_id: &str) -> SimResult<Vec<CampaignRow>> {
        SimStore::find_campaigns(self, tenant_id)
    }

    fn find_metrics(&self, tenant_id: &str, filter: &MetricFilter) -> SimResult<Vec<MetricRow>> {
        SimStore::find_metrics(self, tenant_id, filter)
    }

    fn count_metrics(&self, tenant_id: &str, filter: &MetricFilter) -> SimResult<u64> {
        SimStore::count_metrics(self, tenant_id, filter)
    }

    fn count_campaigns(&self, tenant_id: &str, mock_source: Option<&str>) -> SimResult<u64> {
        SimStore::count_campaigns(self, tenant_id, mock_source)
    }

    fn count_seed_runs(&self, tenant_id: &str, scenario_id: Option<&str>) -> SimResult<u64> {
        SimStore::count_seed_runs(self, tenant_id, scenario_id)
    }

    fn delete_mock_data(
        &self,
        tenant_id: &str,
        source_prefix: &str,
        scenario_id: Option<&str>,
    ) -> SimResult<DeleteCounts> {
        SimStore::delete_mock_data(self, tenant_id, source_prefix, scenario_id)
    }

    fn delete_tenant_data(&self, tenant_id: &str) -> SimResult<DeleteCounts> {
        SimStore::delete_tenant_data(self, tenant_id)
    }

    fn record_seed_run(&self, record: &SeedRunRecord) -> SimResult<()> {
        SimStore::record_seed_run(self, record)
    }

    fn last_seed_run(&self, tenant_id: &str, scenario_id: &str) -> SimResult<Option<SeedRunRecord>> {
        SimStore::last_seed_run(self, tenant_id, scenario_id)
    }
}
