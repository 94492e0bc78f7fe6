//! get-metrics: read-only rollup of a tenant's daily metrics.

use super::{parse_platforms, require_id};
use crate::{
    command::CommandHandler,
    context::ExecutionContext,
    dataset::MetricRow,
    error::{SimError, SimResult},
    simulation::round2,
    store::{MetricFilter, TenantDataClient},
    types::{Platform, TenantId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct GetMetricsCommand {
    pub tenant_id:   String,
    pub scenario_id: Option<String>,
    pub platform:    Option<String>,
    pub start:       Option<NaiveDate>,
    pub end:         Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTotals {
    pub impressions: u64,
    pub clicks:      u64,
    pub conversions: u64,
    pub cost:        f64,
    pub revenue:     f64,
    pub ctr:         f64,
    pub cpc:         f64,
    pub cvr:         f64,
    pub roas:        f64,
    pub aov:         f64,
}

impl MetricTotals {
    fn add(&mut self, row: &MetricRow) {
        let m = &row.metrics;
        self.impressions = self.impressions.saturating_add(m.impressions);
        self.clicks = self.clicks.saturating_add(m.clicks);
        self.conversions = self.conversions.saturating_add(m.conversions);
        self.cost += m.cost;
        self.revenue += m.revenue;
    }

    fn finish(mut self) -> Self {
        let div = |a: f64, b: f64| if b > 0.0 { round2(a / b) } else { 0.0 };
        self.cost = round2(self.cost);
        self.revenue = round2(self.revenue);
        self.ctr = div(self.clicks as f64, self.impressions as f64);
        self.cpc = div(self.cost, self.clicks as f64);
        self.cvr = div(self.conversions as f64, self.clicks as f64);
        self.roas = div(self.revenue, self.cost);
        self.aov = div(self.revenue, self.conversions as f64);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub tenant_id:   TenantId,
    pub rows:        u64,
    pub first_date:  Option<NaiveDate>,
    pub last_date:   Option<NaiveDate>,
    pub totals:      MetricTotals,
    pub by_platform: BTreeMap<Platform, MetricTotals>,
}

pub struct GetMetricsHandler<'a> {
    client: &'a dyn TenantDataClient,
}

impl<'a> GetMetricsHandler<'a> {
    pub fn new(client: &'a dyn TenantDataClient) -> Self {
        Self { client }
    }
}

impl CommandHandler for GetMetricsHandler<'_> {
    type Command = GetMetricsCommand;
    type Valid = (TenantId, MetricFilter);
    type Output = MetricsSummary;

    fn name(&self) -> &'static str { "get-metrics" }

    fn validate(&self, cmd: &GetMetricsCommand) -> SimResult<(TenantId, MetricFilter)> {
        let tenant_id = require_id("tenant_id", &cmd.tenant_id)?;
        if let (Some(start), Some(end)) = (cmd.start, cmd.end) {
            if end < start {
                return Err(SimError::validation("end", format!("{end} is before start {start}")));
            }
        }
        let platform = match &cmd.platform {
            Some(p) => parse_platforms(std::slice::from_ref(p))?.first().copied(),
            None => None,
        };
        let scenario_id = cmd.scenario_id.as_deref().map(|s| require_id("scenario_id", s)).transpose()?;
        Ok((
            tenant_id,
            MetricFilter { scenario_id, platform, start: cmd.start, end: cmd.end, ..Default::default() },
        ))
    }

    fn execute(&self, valid: &(TenantId, MetricFilter), ctx: &ExecutionContext) -> SimResult<MetricsSummary> {
        let (tenant, filter) = valid;
        let rows = self
            .client
            .find_metrics(tenant, filter)
            .map_err(|e| SimError::dependency("get_metrics.find_metrics", tenant.as_str(), e))?;

        let mut totals = MetricTotals::default();
        let mut by_platform: BTreeMap<Platform, MetricTotals> = BTreeMap::new();
        for row in &rows {
            totals.add(row);
            by_platform.entry(row.platform).or_default().add(row);
        }

        let summary = MetricsSummary {
            tenant_id:   tenant.clone(),
            rows:        rows.len() as u64,
            first_date:  rows.first().map(|r| r.date),
            last_date:   rows.last().map(|r| r.date),
            totals:      totals.finish(),
            by_platform: by_platform.into_iter().map(|(p, t)| (p, t.finish())).collect(),
        };
        ctx.print(&format!(
            "{} rows: {} impressions, {} clicks, {} conversions, cost {:.2}, revenue {:.2}",
            summary.rows,
            summary.totals.impressions,
            summary.totals.clicks,
            summary.totals.conversions,
            summary.totals.cost,
            summary.totals.revenue
        ));
        Ok(summary)
    }
}
