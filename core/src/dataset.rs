//! Scenario projection: the exact campaigns and metric rows a scenario
//! materializes for one tenant and seed.
//!
//! Seeding writes a projection; verification re-derives it to compare.
//! Row order is fixed: date ascending, then platform (scenario order),
//! then campaign number.

use crate::{
    rng::{Seed, SeededRng},
    scenario::Scenario,
    simulation::{generate_date_range_metrics, DailyMetrics},
    types::{Platform, ScenarioId, TenantId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRow {
    pub campaign_id: String,
    pub tenant_id:   TenantId,
    pub scenario_id: ScenarioId,
    pub platform:    Platform,
    pub name:        String,
    pub is_mock:     bool,
    pub source:      String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    /// Stable idempotency key: `{campaign_id}:{date}`.
    pub external_id: String,
    pub tenant_id:   TenantId,
    pub campaign_id: String,
    pub scenario_id: ScenarioId,
    pub platform:    Platform,
    pub date:        NaiveDate,
    pub metrics:     DailyMetrics,
    pub is_mock:     bool,
    pub source:      String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub campaigns: Vec<CampaignRow>,
    pub metrics:   Vec<MetricRow>,
}

impl Dataset {
    pub fn checksum(&self) -> String {
        dataset_checksum(&self.metrics)
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.metrics.first()?.date;
        let last = self.metrics.last()?.date;
        Some((first, last))
    }
}

/// What to project: the scenario plus the run's overrides.
#[derive(Debug, Clone)]
pub struct ProjectionRequest<'a> {
    pub tenant_id:     &'a str,
    pub scenario:      &'a Scenario,
    pub seed:          &'a Seed,
    pub days:          u32,
    pub platforms:     &'a [Platform],
    pub source_prefix: &'a str,
}

pub fn campaign_key(prefix: &str, scenario_id: &str, platform: Platform, n: u32) -> String {
    format!("{prefix}{scenario_id}:{platform}:{n}")
}

pub fn project_scenario(req: &ProjectionRequest<'_>) -> Dataset {
    let scenario = req.scenario;
    let start = scenario.start_date;
    let end = scenario.end_date(req.days);
    let root = SeededRng::from_seed(req.seed).derive(&scenario.scenario_id);

    let mut campaigns = Vec::new();
    let mut series = Vec::new();
    for platform in req.platforms {
        for n in 1..=scenario.campaigns_per_platform.max(1) {
            let campaign_id = campaign_key(req.source_prefix, &scenario.scenario_id, *platform, n);
            let mut rng = root.derive(&format!("{platform}:{n}"));
            let days = generate_date_range_metrics(
                start,
                end,
                scenario.trend,
                scenario.base_impressions,
                Some(*platform),
                &mut rng,
            );
            campaigns.push(CampaignRow {
                campaign_id: campaign_id.clone(),
                tenant_id:   req.tenant_id.to_string(),
                scenario_id: scenario.scenario_id.clone(),
                platform:    *platform,
                name:        format!("[MOCK] {} {platform} #{n}", scenario.name),
                is_mock:     true,
                source:      req.source_prefix.to_string(),
            });
            series.push((campaign_id, *platform, days));
        }
    }

    // Interleave per-campaign series day by day so writes land in date order.
    let day_count = series.first().map(|(_, _, d)| d.len()).unwrap_or(0);
    let mut metrics = Vec::with_capacity(day_count * series.len());
    for day in 0..day_count {
        for (campaign_id, platform, days) in &series {
            let entry = &days[day];
            metrics.push(MetricRow {
                external_id: format!("{campaign_id}:{}", entry.date),
                tenant_id:   req.tenant_id.to_string(),
                campaign_id: campaign_id.clone(),
                scenario_id: scenario.scenario_id.clone(),
                platform:    *platform,
                date:        entry.date,
                metrics:     entry.metrics.clone(),
                is_mock:     true,
                source:      req.source_prefix.to_string(),
            });
        }
    }

    log::debug!(
        "projected scenario={} tenant={} campaigns={} rows={}",
        scenario.scenario_id,
        req.tenant_id,
        campaigns.len(),
        metrics.len()
    );
    Dataset { campaigns, metrics }
}

/// SHA-256 over the canonical row encoding, independent of row order
/// and of the tenant the rows were written for.
pub fn dataset_checksum(rows: &[MetricRow]) -> String {
    let mut lines: Vec<String> = rows
        .iter()
        .map(|r| {
            let m = &r.metrics;
            format!(
                "{}|{}|{}|{}|{:.2}|{:.2}\n",
                r.external_id, m.impressions, m.clicks, m.conversions, m.cost, m.revenue
            )
        })
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
