//! Verification of a tenant's seeded data against its scenario.
//!
//! Every check is independent and reports name, expected, actual and
//! status, so drift can be diagnosed from the report alone.
//!
//! Summary status: FAIL if any check failed, else WARN if any check
//! warned, else PASS.

use crate::{
    context::ExecutionContext,
    dataset::{dataset_checksum, project_scenario, Dataset, MetricRow, ProjectionRequest},
    error::{SimError, SimResult},
    fixture::{Fixture, FixtureProvider, FixtureShape},
    rng::Seed,
    scenario::{Scenario, ScenarioCatalog},
    store::{MetricFilter, TenantDataClient},
    types::{Platform, RunId, ScenarioId, TenantId},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Instant;

pub const REPORT_VERSION: &str = "1.0.0";
pub const GENERATOR: &str = concat!("adsim-core/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name:     String,
    pub status:   CheckStatus,
    pub expected: Value,
    pub actual:   Value,
    pub message:  String,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, expected: Value, actual: Value, message: impl Into<String>) -> Self {
        Self { name: name.into(), status, expected, actual, message: message.into() }
    }

    /// PASS when equal, otherwise `on_mismatch`.
    fn compare<T: PartialEq + Serialize>(name: &str, expected: T, actual: T, on_mismatch: CheckStatus) -> Self {
        let status = if expected == actual { CheckStatus::Pass } else { on_mismatch };
        let message = match status {
            CheckStatus::Pass => "matches".to_string(),
            _ => format!("{name} drifted"),
        };
        Self::new(name, status, json!(expected), json!(actual), message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSummary {
    pub status:       SummaryStatus,
    pub total_checks: u32,
    pub passed:       u32,
    pub failed:       u32,
    pub warnings:     u32,
    pub duration_ms:  u64,
}

impl VerificationSummary {
    pub fn from_results(results: &[CheckResult], duration_ms: u64) -> Self {
        let count = |s: CheckStatus| results.iter().filter(|r| r.status == s).count() as u32;
        let (passed, failed, warnings) = (count(CheckStatus::Pass), count(CheckStatus::Fail), count(CheckStatus::Warn));
        let status = if failed > 0 {
            SummaryStatus::Fail
        } else if warnings > 0 {
            SummaryStatus::Warn
        } else {
            SummaryStatus::Pass
        };
        Self {
            status,
            total_checks: passed + failed + warnings,
            passed,
            failed,
            warnings,
            duration_ms,
        }
    }

    /// Human rendering, e.g. "8 passed, 0 failed, 2 warnings".
    pub fn text(&self) -> String {
        format!("{} passed, {} failed, {} warnings", self.passed, self.failed, self.warnings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMeta {
    pub version:     String,
    pub generator:   String,
    pub created_at:  String,
    pub run_id:      RunId,
    pub scenario_id: ScenarioId,
    pub tenant_id:   TenantId,
    pub seed:        Seed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub is_mock_data:  bool,
    pub source_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub meta:       ReportMeta,
    pub summary:    VerificationSummary,
    pub results:    Vec<CheckResult>,
    pub provenance: Provenance,
}

impl VerificationReport {
    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// The seed and overrides a verification re-derives the dataset with.
struct Expectation {
    seed:       Seed,
    days:       u32,
    platforms:  Vec<Platform>,
    overridden: bool,
}

pub struct VerificationService<'a> {
    client:        &'a dyn TenantDataClient,
    scenarios:     &'a ScenarioCatalog,
    fixtures:      &'a FixtureProvider,
    source_prefix: &'a str,
}

impl<'a> VerificationService<'a> {
    pub fn new(
        client: &'a dyn TenantDataClient,
        scenarios: &'a ScenarioCatalog,
        fixtures: &'a FixtureProvider,
        source_prefix: &'a str,
    ) -> Self {
        Self { client, scenarios, fixtures, source_prefix }
    }

    /// `seed` overrides the seed recorded by the tenant's last seed run,
    /// which in turn overrides the scenario's default seed.
    pub fn verify_scenario(
        &self,
        scenario_id: &str,
        tenant_id: &str,
        seed: Option<&Seed>,
        ctx: &ExecutionContext,
    ) -> SimResult<VerificationReport> {
        let started = Instant::now();
        let scenario = self.scenarios.get(scenario_id)?;
        let fixture = self.fixtures.load_fixture(scenario_id)?;
        let expectation = self.expectation(scenario, tenant_id, seed)?;

        let projection = project_scenario(&ProjectionRequest {
            tenant_id,
            scenario,
            seed:          &expectation.seed,
            days:          expectation.days,
            platforms:     &expectation.platforms,
            source_prefix: self.source_prefix,
        });

        let stored = self
            .client
            .find_metrics(tenant_id, &MetricFilter::scenario(scenario_id))
            .map_err(|e| SimError::dependency("verify.find_metrics", tenant_id, e))?;
        let campaigns = self
            .client
            .find_campaigns(tenant_id)
            .map_err(|e| SimError::dependency("verify.find_campaigns", tenant_id, e))?;
        let foreign_rows = self
            .client
            .count_metrics(tenant_id, &MetricFilter { mock_only: Some(false), ..Default::default() })
            .map_err(|e| SimError::dependency("verify.count_metrics", tenant_id, e))?;

        let mut results = Vec::new();
        let shape = if expectation.overridden {
            results.push(CheckResult::new(
                "fixture_applicability",
                CheckStatus::Warn,
                json!(fixture.shape),
                json!({ "days": expectation.days, "platforms": expectation.platforms }),
                "seeded with overrides; shape compared against the projection",
            ));
            Fixture::from_dataset(scenario_id, &projection, false).shape
        } else {
            fixture.shape.clone()
        };

        results.extend(shape_checks(&shape, &stored));
        results.push(self.checksum_check(&fixture, &expectation, &projection, &stored));
        results.push(funnel_check(&stored));
        results.push(reference_check(&stored, &campaigns));
        results.push(self.provenance_check(&stored));
        results.push(isolation_check(foreign_rows));
        results.push(range_check(&projection, &stored));

        let summary = VerificationSummary::from_results(&results, started.elapsed().as_millis() as u64);
        ctx.logger().info(&format!(
            "verify scenario={scenario_id} tenant={tenant_id}: {:?} ({})",
            summary.status,
            summary.text()
        ));

        let is_mock_data = stored.iter().all(|r| r.is_mock && r.source == self.source_prefix);
        Ok(VerificationReport {
            meta: ReportMeta {
                version:     REPORT_VERSION.into(),
                generator:   GENERATOR.into(),
                created_at:  chrono::Utc::now().to_rfc3339(),
                run_id:      ctx.run_id.clone(),
                scenario_id: scenario_id.into(),
                tenant_id:   tenant_id.into(),
                seed:        expectation.seed,
            },
            summary,
            results,
            provenance: Provenance {
                is_mock_data,
                source_prefix: self.source_prefix.into(),
            },
        })
    }

    fn expectation(&self, scenario: &Scenario, tenant_id: &str, seed: Option<&Seed>) -> SimResult<Expectation> {
        let last = self
            .client
            .last_seed_run(tenant_id, &scenario.scenario_id)
            .map_err(|e| SimError::dependency("verify.last_seed_run", tenant_id, e))?;
        let (days, platforms) = match &last {
            Some(run) => (run.days, run.platforms.clone()),
            None => (scenario.days, scenario.platforms.clone()),
        };
        let seed = seed
            .cloned()
            .or_else(|| last.map(|run| run.seed))
            .unwrap_or_else(|| scenario.seed.clone());
        let overridden = days != scenario.days || platforms != scenario.platforms;
        Ok(Expectation { seed, days, platforms, overridden })
    }

    fn checksum_check(
        &self,
        fixture: &Fixture,
        expectation: &Expectation,
        projection: &Dataset,
        stored: &[MetricRow],
    ) -> CheckResult {
        let pinned = fixture
            .checksum
            .clone()
            .filter(|_| !expectation.overridden && expectation.seed == self.default_seed(fixture));
        let (expected, source) = match pinned {
            Some(sum) => (sum, "fixture"),
            None => (projection.checksum(), "projection"),
        };
        let actual = dataset_checksum(stored);
        let status = if expected == actual { CheckStatus::Pass } else { CheckStatus::Fail };
        CheckResult::new(
            "checksum",
            status,
            json!(expected),
            json!(actual),
            format!("expected checksum taken from {source}"),
        )
    }

    fn default_seed(&self, fixture: &Fixture) -> Seed {
        self.scenarios
            .get(&fixture.scenario_id)
            .map(|s| s.seed.clone())
            .unwrap_or(Seed::Number(0))
    }

    fn provenance_check(&self, stored: &[MetricRow]) -> CheckResult {
        let untagged = stored
            .iter()
            .filter(|r| !r.is_mock || r.source != self.source_prefix)
            .count();
        let status = if untagged == 0 { CheckStatus::Pass } else { CheckStatus::Fail };
        CheckResult::new(
            "provenance_tagging",
            status,
            json!({ "untagged": 0, "sourcePrefix": self.source_prefix }),
            json!({ "untagged": untagged }),
            "scenario rows must carry the mock flag and source prefix",
        )
    }
}

fn shape_checks(shape: &FixtureShape, stored: &[MetricRow]) -> Vec<CheckResult> {
    let dates: BTreeSet<_> = stored.iter().map(|r| r.date).collect();
    let platforms: BTreeSet<_> = stored.iter().map(|r| r.platform).collect();
    vec![
        CheckResult::compare("row_count", shape.total_metric_rows, stored.len() as u64, CheckStatus::Fail),
        CheckResult::compare("date_coverage", shape.days, dates.len() as u32, CheckStatus::Fail),
        CheckResult::compare("platform_coverage", shape.platforms, platforms.len() as u32, CheckStatus::Fail),
    ]
}

fn funnel_check(stored: &[MetricRow]) -> CheckResult {
    let violations: Vec<&str> = stored
        .iter()
        .filter(|r| !r.metrics.funnel_holds() || !r.metrics.all_finite())
        .map(|r| r.external_id.as_str())
        .collect();
    let status = if violations.is_empty() { CheckStatus::Pass } else { CheckStatus::Fail };
    CheckResult::new(
        "funnel_consistency",
        status,
        json!(0),
        json!(violations.len()),
        match violations.first() {
            Some(first) => format!("first violating row: {first}"),
            None => "clicks <= impressions and conversions <= clicks".into(),
        },
    )
}

fn reference_check(stored: &[MetricRow], campaigns: &[crate::dataset::CampaignRow]) -> CheckResult {
    let known: BTreeSet<&str> = campaigns.iter().map(|c| c.campaign_id.as_str()).collect();
    let orphans: BTreeSet<&str> = stored
        .iter()
        .map(|r| r.campaign_id.as_str())
        .filter(|id| !known.contains(id))
        .collect();
    let status = if orphans.is_empty() { CheckStatus::Pass } else { CheckStatus::Fail };
    CheckResult::new(
        "campaign_references",
        status,
        json!([]),
        json!(orphans),
        "every metric row must reference an existing campaign",
    )
}

fn isolation_check(foreign_rows: u64) -> CheckResult {
    let status = if foreign_rows == 0 { CheckStatus::Pass } else { CheckStatus::Warn };
    CheckResult::new(
        "tenant_isolation",
        status,
        json!(0),
        json!(foreign_rows),
        "non-mock rows share this tenant with synthetic data",
    )
}

fn range_check(projection: &Dataset, stored: &[MetricRow]) -> CheckResult {
    let outside = match projection.date_range() {
        Some((start, end)) => stored.iter().filter(|r| r.date < start || r.date > end).count(),
        None => stored.len(),
    };
    let status = if outside == 0 { CheckStatus::Pass } else { CheckStatus::Warn };
    CheckResult::new(
        "out_of_range_rows",
        status,
        json!(0),
        json!(outside),
        "scenario rows outside the projected date range",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: CheckStatus) -> CheckResult {
        CheckResult::new("x", status, json!(null), json!(null), "")
    }

    #[test]
    fn any_failure_fails_the_summary() {
        let s = VerificationSummary::from_results(
            &[result(CheckStatus::Pass), result(CheckStatus::Warn), result(CheckStatus::Fail)],
            5,
        );
        assert_eq!(s.status, SummaryStatus::Fail);
        assert_eq!(s.total_checks, 3);
        assert_eq!(s.text(), "1 passed, 1 failed, 1 warnings");
    }

    #[test]
    fn warnings_without_failures_warn() {
        let s = VerificationSummary::from_results(&[result(CheckStatus::Pass), result(CheckStatus::Warn)], 0);
        assert_eq!(s.status, SummaryStatus::Warn);
    }

    #[test]
    fn empty_results_pass() {
        let s = VerificationSummary::from_results(&[], 0);
        assert_eq!(s.status, SummaryStatus::Pass);
        assert_eq!(s.total_checks, 0);
    }
}
